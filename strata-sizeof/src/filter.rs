// Copyright 2026 strata Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    any::{type_name, TypeId},
    path::Path,
};

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use strata_common::error::{Error, ErrorKind, Result};

/// Exclusions applied while measuring.
///
/// Names follow [`std::any::type_name`] with generic arguments stripped:
///
/// - a type `my_crate::session::Token` excludes every value of that type, whatever its generic arguments;
/// - a module `my_crate::session` excludes every type declared in it or in its submodules;
/// - a field `my_crate::session::Session.token` excludes what the `token` field of `Session` reaches.
///
/// Excluded values contribute zero bytes beyond the inline bytes their owner already carries, so referencing an
/// excluded value measures the same as referencing nothing.
#[derive(Debug, Default)]
pub struct SizeOfFilter {
    types: HashSet<String>,
    modules: HashSet<String>,
    fields: HashMap<String, HashSet<String>>,

    decisions: RwLock<HashMap<TypeId, bool>>,
}

impl SizeOfFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude the type with the given name.
    pub fn with_excluded_type(mut self, name: impl Into<String>) -> Self {
        self.types.insert(name.into());
        self
    }

    /// Exclude type `T`, regardless of its generic arguments.
    pub fn with_excluded<T: ?Sized + 'static>(self) -> Self {
        self.with_excluded_type(strip_generics(type_name::<T>()))
    }

    /// Exclude every type declared in the module with the given path.
    pub fn with_excluded_module(mut self, path: impl Into<String>) -> Self {
        self.modules.insert(path.into());
        self
    }

    /// Exclude the field `field` of the type named `owner`.
    pub fn with_excluded_field(mut self, owner: impl Into<String>, field: impl Into<String>) -> Self {
        self.fields.entry(owner.into()).or_default().insert(field.into());
        self
    }

    /// Parse a filter resource.
    ///
    /// One name per line. Blank lines and lines starting with `#` are ignored. `path::Type.field` names a field,
    /// any other name excludes both the type and the module with that path.
    pub fn parse(text: &str) -> Result<Self> {
        let mut filter = Self::default();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let invalid = || {
                Error::new(ErrorKind::Parse, "invalid size-of filter entry")
                    .with_context("line", index + 1)
                    .with_context("entry", line)
            };
            match line.split_once('.') {
                Some((owner, field)) => {
                    if !is_path(owner) || !is_ident(field) {
                        return Err(invalid());
                    }
                    filter = filter.with_excluded_field(owner, field);
                }
                None => {
                    if !is_path(line) {
                        return Err(invalid());
                    }
                    filter = filter.with_excluded_type(line).with_excluded_module(line);
                }
            }
        }
        tracing::debug!(
            "[sizeof]: parsed filter, types: {}, modules: {}, fields: {}",
            filter.types.len(),
            filter.modules.len(),
            filter.fields.values().map(|fields| fields.len()).sum::<usize>()
        );
        Ok(filter)
    }

    /// Load a filter resource from a file. See [`SizeOfFilter::parse`] for the format.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io_error(e).with_context("path", path.display()))?;
        Self::parse(&text).map_err(|e| e.with_context("path", path.display()))
    }

    /// Whether the filter excludes nothing.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.modules.is_empty() && self.fields.is_empty()
    }

    /// Whether values of type `T` are excluded.
    ///
    /// Decisions are cached per type.
    pub fn excludes_type<T: ?Sized + 'static>(&self) -> bool {
        if self.types.is_empty() && self.modules.is_empty() {
            return false;
        }
        let id = TypeId::of::<T>();
        if let Some(excluded) = self.decisions.read().get(&id) {
            return *excluded;
        }
        let excluded = self.decide(type_name::<T>());
        self.decisions.write().insert(id, excluded);
        excluded
    }

    /// Whether the field `field` of the type named `owner` is excluded.
    pub fn excludes_field(&self, owner: &str, field: &str) -> bool {
        if self.fields.is_empty() {
            return false;
        }
        self.fields
            .get(strip_generics(owner))
            .is_some_and(|fields| fields.contains(field))
    }

    fn decide(&self, name: &str) -> bool {
        let base = strip_generics(name);
        self.types.contains(base)
            || self.types.contains(name)
            || self
                .modules
                .iter()
                .any(|module| base.strip_prefix(module.as_str()).is_some_and(|rest| rest.starts_with("::")))
    }
}

fn strip_generics(name: &str) -> &str {
    match name.find('<') {
        Some(index) => &name[..index],
        None => name,
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn is_path(s: &str) -> bool {
    s.split("::").all(is_ident)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    mod secrets {
        pub struct Token;
        pub struct Vault<T>(pub T);
    }

    struct Plain;

    #[test]
    fn test_type_exclusion() {
        let filter = SizeOfFilter::new().with_excluded::<secrets::Vault<u64>>();
        assert!(filter.excludes_type::<secrets::Vault<u64>>());
        assert!(filter.excludes_type::<secrets::Vault<String>>());
        assert!(!filter.excludes_type::<secrets::Token>());
        assert!(!filter.excludes_type::<Plain>());
        // Cached decisions stay stable.
        assert!(filter.excludes_type::<secrets::Vault<String>>());
    }

    #[test]
    fn test_module_exclusion() {
        let filter = SizeOfFilter::new().with_excluded_module(format!("{}::secrets", module_path!()));
        assert!(filter.excludes_type::<secrets::Token>());
        assert!(filter.excludes_type::<secrets::Vault<Plain>>());
        assert!(!filter.excludes_type::<Plain>());
        assert!(!filter.excludes_type::<String>());
    }

    #[test]
    fn test_parse() {
        let text = r#"
            # secrets are accounted elsewhere
            my_crate::secrets

            my_crate::session::Session.token
            alloc::string::String
        "#;
        let filter = SizeOfFilter::parse(text).unwrap();
        assert!(filter.types.contains("alloc::string::String"));
        assert!(filter.modules.contains("my_crate::secrets"));
        assert!(filter.excludes_field("my_crate::session::Session", "token"));
        assert!(filter.excludes_field("my_crate::session::Session<u64>", "token"));
        assert!(!filter.excludes_field("my_crate::session::Session", "user"));
        assert!(filter.excludes_type::<String>());
        assert!(!filter.excludes_type::<Vec<u8>>());
    }

    #[test]
    fn test_parse_invalid() {
        for text in ["my crate::Type", "my_crate::", ".field", "my_crate::Type.", "my_crate::Type.a.b"] {
            let e = SizeOfFilter::parse(text).unwrap_err();
            assert_eq!(e.kind(), ErrorKind::Parse, "{text}");
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# generated").unwrap();
        writeln!(file, "my_crate::Blob").unwrap();
        file.flush().unwrap();

        let filter = SizeOfFilter::from_file(file.path()).unwrap();
        assert!(filter.types.contains("my_crate::Blob"));
        assert!(!filter.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let e = SizeOfFilter::from_file(dir.path().join("missing")).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Io);
    }
}
