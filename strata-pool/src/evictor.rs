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

use std::{fmt::Debug, sync::Arc};

use crate::participant::Participant;

/// Chooses which participants of a pool give space back.
pub trait Evictor: Send + Sync + 'static + Debug {
    /// Free at least `amount` units from `participants`.
    ///
    /// Returns `false` once no participant can free anything more. The pool then tolerates the overshoot.
    fn free_space(&self, participants: &[Arc<dyn Participant>], amount: usize) -> bool;
}

impl<E> Evictor for Arc<E>
where
    E: Evictor + ?Sized,
{
    fn free_space(&self, participants: &[Arc<dyn Participant>], amount: usize) -> bool {
        self.as_ref().free_space(participants, amount)
    }
}

/// Evict from the largest participant first.
///
/// Each participant is asked at most once per call, so a call terminates after at most `participants.len()` evict
/// attempts. Ties on size go to the participant registered first.
#[derive(Debug, Default, Clone, Copy)]
pub struct FromLargestEvictor;

impl FromLargestEvictor {
    fn largest(participants: &[Arc<dyn Participant>], tried: &[bool]) -> Option<usize> {
        let mut largest: Option<(usize, usize)> = None;
        for (index, participant) in participants.iter().enumerate() {
            if tried[index] {
                continue;
            }
            let size = participant.size();
            match largest {
                Some((_, s)) if s >= size => {}
                _ => largest = Some((index, size)),
            }
        }
        largest.map(|(index, _)| index)
    }
}

impl Evictor for FromLargestEvictor {
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "strata::pool::evictor::free_space"))]
    fn free_space(&self, participants: &[Arc<dyn Participant>], amount: usize) -> bool {
        if amount == 0 {
            return true;
        }

        let mut tried = vec![false; participants.len()];
        let mut remaining = amount;

        while let Some(index) = Self::largest(participants, &tried) {
            tried[index] = true;
            let participant = &participants[index];

            let before = participant.size();
            if !participant.evict(1, remaining) {
                tracing::trace!("[evictor]: participant {index} has nothing to evict, size: {before}");
                continue;
            }
            let freed = before.saturating_sub(participant.size());
            remaining = remaining.saturating_sub(freed);
            tracing::trace!("[evictor]: participant {index} freed {freed}, remaining: {remaining}");

            if remaining == 0 {
                return true;
            }
        }

        tracing::trace!("[evictor]: exhausted all participants, amount: {amount}, remaining: {remaining}");
        false
    }
}
