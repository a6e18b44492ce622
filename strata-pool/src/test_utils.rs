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

//! Participants for tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Weak,
    },
};

use parking_lot::Mutex;

use crate::{
    participant::Participant,
    pool::{Accessor, Pool},
};

/// A participant holding a queue of entry sizes, evicting the oldest first.
#[derive(Debug)]
pub struct MockParticipant {
    accessor: Accessor,
    entries: Mutex<VecDeque<usize>>,
    evictable: AtomicBool,
    evict_calls: AtomicUsize,
}

impl MockParticipant {
    /// Create a participant registered with `pool`.
    pub fn new(pool: &Pool) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| Self {
            accessor: pool.register(this.clone()),
            entries: Mutex::new(VecDeque::new()),
            evictable: AtomicBool::new(true),
            evict_calls: AtomicUsize::new(0),
        })
    }

    /// Add an entry of `size` units and charge it to the pool.
    pub fn push(&self, size: usize) -> bool {
        self.entries.lock().push_back(size);
        self.accessor.reserve(size)
    }

    /// Refuse every eviction request if `evictable` is `false`.
    pub fn set_evictable(&self, evictable: bool) {
        self.evictable.store(evictable, Ordering::Release);
    }

    /// Number of entries held.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no entry is held.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of eviction requests received.
    pub fn evict_calls(&self) -> usize {
        self.evict_calls.load(Ordering::Acquire)
    }

    /// The accessor of the participant.
    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }
}

impl Participant for MockParticipant {
    fn evict(&self, count: usize, bytes_hint: usize) -> bool {
        self.evict_calls.fetch_add(1, Ordering::AcqRel);
        if !self.evictable.load(Ordering::Acquire) {
            return false;
        }

        let (evicted, freed) = {
            let mut entries = self.entries.lock();
            let (mut evicted, mut freed) = (0, 0);
            while evicted < count || freed < bytes_hint {
                let Some(size) = entries.pop_front() else { break };
                evicted += 1;
                freed += size;
            }
            (evicted, freed)
        };
        self.accessor.release(freed);
        evicted > 0
    }

    fn size(&self) -> usize {
        self.accessor.size()
    }
}
