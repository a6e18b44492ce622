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

//! Deep measurement through the cache manager.

use std::io::Write;

use strata::{container_size, CacheManager, Config, ErrorKind, Result, SizeOf, Walker};

mod secret {
    use strata::{Result, SizeOf, Walker};

    pub struct Token(pub Vec<u8>);

    impl SizeOf for Token {
        fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
            walker.field("0", &self.0)
        }
    }
}

struct Blob {
    payload: Vec<u8>,
    note: String,
    token: secret::Token,
}

impl SizeOf for Blob {
    fn visit(&self, walker: &mut Walker<'_>) -> Result<()> {
        walker.field("payload", &self.payload)?;
        walker.field("note", &self.note)?;
        walker.field("token", &self.token)
    }
}

fn blob() -> Blob {
    Blob {
        payload: vec![0; 4096],
        note: String::from("hello"),
        token: secret::Token(vec![0; 1024]),
    }
}

#[test_log::test]
fn test_deep_size_with_filter_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# large buffers are accounted elsewhere").unwrap();
    writeln!(file, "deep_size_test::Blob.payload").unwrap();
    writeln!(file, "deep_size_test::secret").unwrap();
    file.flush().unwrap();

    let unfiltered = CacheManager::builder()
        .with_config(Config {
            capacity_bytes: Some(1 << 20),
            ..Default::default()
        })
        .build()
        .unwrap();
    let filtered = CacheManager::builder()
        .with_config(Config {
            capacity_bytes: Some(1 << 20),
            size_filter: Some(file.path().to_path_buf()),
            ..Default::default()
        })
        .build()
        .unwrap();

    let value = blob();
    let note = value.note.capacity();
    let shallow = std::mem::size_of::<u64>() + std::mem::size_of::<Blob>() + container_size::<u64, Blob>();

    let store = unfiltered.cache::<u64, Blob>("unfiltered");
    let record = store.insert(1, blob());
    assert_eq!(record.weight(), shallow + 4096 + note + 1024);

    let store = filtered.cache::<u64, Blob>("filtered");
    let record = store.insert(1, value);
    assert_eq!(record.weight(), shallow + note);
    assert_eq!(filtered.pool().used(), record.weight());
    assert!(!store.has_aborted_size_of());
}

#[test]
fn test_abort_falls_back_to_shallow_size() {
    let manager = CacheManager::builder()
        .with_config(Config {
            abort_on_size_overflow: true,
            max_objects_visited: 2,
            ..Default::default()
        })
        .build()
        .unwrap();
    let store = manager.cache::<u64, Vec<String>>("abort");

    let small = store.insert(1, vec![]);
    assert!(!store.has_aborted_size_of());
    assert_eq!(
        small.weight(),
        std::mem::size_of::<u64>() + std::mem::size_of::<Vec<String>>() + container_size::<u64, Vec<String>>()
    );

    let large = store.insert(2, (0..10).map(|i| i.to_string()).collect());
    assert!(store.has_aborted_size_of());
    assert_eq!(large.weight(), small.weight());
}

#[test]
fn test_truncated_measurement_is_partial() {
    let manager = CacheManager::builder()
        .with_config(Config {
            max_objects_visited: 3,
            ..Default::default()
        })
        .build()
        .unwrap();
    let store = manager.cache::<u64, Vec<String>>("partial");
    let record = store.insert(1, (0..10).map(|i| format!("{i:08}")).collect());
    assert!(!store.has_aborted_size_of());
    // The key, the vector and its buffer fit, the strings do not.
    assert_eq!(
        record.weight(),
        std::mem::size_of::<u64>()
            + std::mem::size_of::<Vec<String>>()
            + 10 * std::mem::size_of::<String>()
            + container_size::<u64, Vec<String>>()
    );
}

#[test]
fn test_missing_filter_file() {
    let e = CacheManager::builder()
        .with_config(Config {
            size_filter: Some("/nonexistent/strata/filter".into()),
            ..Default::default()
        })
        .build()
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::Io);
}
