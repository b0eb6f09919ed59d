// Copyright 2022 Singularity Data
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Source queue set (component B).

use std::collections::{BTreeMap, HashSet, VecDeque};

use evb_common::Fragment;

/// FIFO of fragments in arrival order for one source.
#[derive(Default)]
pub struct SourceQueue {
    items: VecDeque<Fragment>,
}

impl SourceQueue {
    pub fn push_back(&mut self, fragment: Fragment) {
        self.items.push_back(fragment);
    }

    pub fn peek_front(&self) -> Option<&Fragment> {
        self.items.front()
    }

    pub fn pop_front(&mut self) -> Option<Fragment> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when the head fragment exists and is a barrier.
    pub fn head_is_barrier(&self) -> bool {
        self.items.front().is_some_and(Fragment::is_barrier)
    }
}

/// Mapping `source_id -> SourceQueue`, plus a liveness bit: a dead source
/// is skipped in barrier completion checks but its queue is preserved, and
/// receipt of any fragment reanimates it.
///
/// Backed by a `BTreeMap` so iteration (barrier scans, oldest-fragment
/// scans) is in ascending source-id order, matching the tie-break rule for
/// equal timestamps.
#[derive(Default)]
pub struct SourceQueueSet {
    queues: BTreeMap<u32, SourceQueue>,
    dead: HashSet<u32>,
}

impl SourceQueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the queue on demand and mark the source live (reanimating
    /// it if it had been marked dead).
    pub fn queue_for(&mut self, source_id: u32) -> &mut SourceQueue {
        self.dead.remove(&source_id);
        self.queues.entry(source_id).or_default()
    }

    /// Pre-declare a source without pushing data, per §4.H.
    pub fn pre_declare(&mut self, source_id: u32) {
        self.queue_for(source_id);
    }

    pub fn mark_dead(&mut self, source_id: u32) {
        self.dead.insert(source_id);
    }

    pub fn is_live(&self, source_id: u32) -> bool {
        self.queues.contains_key(&source_id) && !self.dead.contains(&source_id)
    }

    pub fn live_count(&self) -> usize {
        self.queues
            .keys()
            .filter(|id| !self.dead.contains(*id))
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.queues.len()
    }

    pub fn get(&self, source_id: u32) -> Option<&SourceQueue> {
        self.queues.get(&source_id)
    }

    pub fn get_mut(&mut self, source_id: u32) -> Option<&mut SourceQueue> {
        self.queues.get_mut(&source_id)
    }

    /// Ascending source-id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &SourceQueue)> {
        self.queues.iter().map(|(id, q)| (*id, q))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut SourceQueue)> {
        self.queues.iter_mut().map(|(id, q)| (*id, q))
    }

    pub fn source_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.queues.keys().copied()
    }

    pub fn depths(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.queues.iter().map(|(id, q)| (*id, q.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_for_creates_and_marks_live() {
        let mut set = SourceQueueSet::new();
        assert!(!set.is_live(5));
        set.queue_for(5);
        assert!(set.is_live(5));
        assert_eq!(set.total_count(), 1);
    }

    #[test]
    fn mark_dead_then_reanimates_on_new_fragment() {
        let mut set = SourceQueueSet::new();
        set.queue_for(1);
        set.mark_dead(1);
        assert!(!set.is_live(1));
        assert_eq!(set.live_count(), 0);

        set.queue_for(1).push_back(Fragment::new(10, 1, 0, &b""[..]));
        assert!(set.is_live(1));
        assert_eq!(set.live_count(), 1);
    }

    #[test]
    fn dead_source_queue_is_preserved() {
        let mut set = SourceQueueSet::new();
        set.queue_for(1)
            .push_back(Fragment::new(10, 1, 0, &b""[..]));
        set.mark_dead(1);
        assert_eq!(set.get(1).unwrap().len(), 1);
    }

    #[test]
    fn iteration_is_ascending_by_source_id() {
        let mut set = SourceQueueSet::new();
        for id in [3, 1, 2] {
            set.queue_for(id);
        }
        let ids: Vec<u32> = set.source_ids().collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
