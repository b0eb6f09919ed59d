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

//! Orderer core (component C): build-window policy, oldest-fragment
//! selection, and the barrier synchronization state machine.
//!
//! The barrier subsystem is this state machine:
//!
//! ```text
//! Quiet -> (any barrier reaches a queue head) -> BarrierPending
//! BarrierPending -> (every live source has a barrier at its head)
//!                 -> emit (Complete if no source is missing one, else Malformed)
//!                 -> Quiet
//! BarrierPending -> (complete flush) -> emit Malformed -> Quiet -> drain residual
//! ```

use evb_common::{
    decode_one, BarrierSummary, CompleteBarrierObserver, EventObserver, Fragment, LateData,
    LateDataObserver, ObserverKind, OrdererError, PartialBarrierObserver, Result, NULL_TIMESTAMP,
};
use prometheus::Registry;

use crate::observer_registry::{ObserverId, ObserverRegistry};
use crate::queue::SourceQueueSet;
use crate::stats::{PerQueueStat, StatisticsSnapshot, StatsRegistry};

pub struct Orderer {
    queues: SourceQueueSet,
    oldest: u64,
    newest: u64,
    barrier_pending: bool,
    build_window: u64,
    observers: ObserverRegistry,
    stats: StatsRegistry,
}

impl Orderer {
    pub fn new(build_window: u64) -> Self {
        Self {
            queues: SourceQueueSet::new(),
            oldest: u64::MAX,
            newest: 0,
            barrier_pending: false,
            build_window,
            observers: ObserverRegistry::new(),
            stats: StatsRegistry::unused(),
        }
    }

    /// Same as `new`, but metrics are exported through `registry` instead
    /// of a throwaway one.
    pub fn with_metrics_registry(build_window: u64, registry: Registry) -> Self {
        Self {
            stats: StatsRegistry::new(registry),
            ..Self::new(build_window)
        }
    }

    pub fn set_build_window(&mut self, window: u64) {
        self.build_window = window;
    }

    pub fn build_window(&self) -> u64 {
        self.build_window
    }

    pub fn oldest(&self) -> u64 {
        self.oldest
    }

    pub fn newest(&self) -> u64 {
        self.newest
    }

    pub fn barrier_pending(&self) -> bool {
        self.barrier_pending
    }

    pub fn metrics(&self) -> &StatsRegistry {
        &self.stats
    }

    pub fn is_live(&self, source_id: u32) -> bool {
        self.queues.is_live(source_id)
    }

    pub fn live_count(&self) -> usize {
        self.queues.live_count()
    }

    pub fn total_count(&self) -> usize {
        self.queues.total_count()
    }

    pub fn pre_declare_source(&mut self, source_id: u32) {
        self.queues.pre_declare(source_id);
    }

    // -- Observer registry pass-throughs (component D) -----------------

    pub fn add_event_observer(&mut self, observer: Box<dyn EventObserver>) -> ObserverId {
        self.observers.add_event_observer(observer)
    }

    pub fn add_late_data_observer(&mut self, observer: Box<dyn LateDataObserver>) -> ObserverId {
        self.observers.add_late_data_observer(observer)
    }

    pub fn add_complete_barrier_observer(
        &mut self,
        observer: Box<dyn CompleteBarrierObserver>,
    ) -> ObserverId {
        self.observers.add_complete_barrier_observer(observer)
    }

    pub fn add_partial_barrier_observer(
        &mut self,
        observer: Box<dyn PartialBarrierObserver>,
    ) -> ObserverId {
        self.observers.add_partial_barrier_observer(observer)
    }

    pub fn remove_observer(&mut self, kind: ObserverKind, id: ObserverId) {
        self.observers.remove_observer(kind, id);
    }

    // -- Ingest (component C: add_fragments) ---------------

    /// Decode a concatenated sequence of flat fragments and enqueue each
    /// one as soon as it decodes, so a framing error partway through the
    /// batch leaves everything decoded before it enqueued.
    pub fn add_fragments(&mut self, buf: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while let Some((fragment, next_offset)) = decode_one(buf, offset)? {
            self.ingest_one(fragment);
            offset = next_offset;
        }

        if self.oldest != u64::MAX && self.newest - self.oldest > 2 * self.build_window {
            self.flush_queues(false);
        }

        if self.should_emit_barrier() {
            let summary = self.generate_barrier();
            self.dispatch_barrier_summary(&summary);
        }

        Ok(())
    }

    fn ingest_one(&mut self, mut fragment: Fragment) {
        if fragment.timestamp == NULL_TIMESTAMP {
            fragment.timestamp = self.newest;
        }

        let source_id = fragment.source_id;
        let is_barrier = fragment.is_barrier();
        let ts = fragment.timestamp;

        if !is_barrier && ts < self.newest && self.newest - ts > self.build_window {
            let late = LateData {
                fragment: &fragment,
                newest: self.newest,
            };
            tracing::warn!(source_id, ts, newest = self.newest, "late fragment");
            self.observers.dispatch_late_data(&late);
            self.stats.late_fragments.inc();
        }

        self.stats
            .fragments_received
            .with_label_values(&[&source_id.to_string()])
            .inc();
        self.stats
            .bytes_received
            .with_label_values(&[&source_id.to_string()])
            .inc_by(fragment.payload.len() as u64);

        let queue = self.queues.queue_for(source_id);
        let was_empty = queue.is_empty();
        queue.push_back(fragment);

        if was_empty && is_barrier {
            self.barrier_pending = true;
        }

        if !is_barrier {
            self.oldest = self.oldest.min(ts);
            self.newest = self.newest.max(ts);
        }

        tracing::trace!(source_id, ts, is_barrier, "enqueued fragment");
    }

    fn should_emit_barrier(&self) -> bool {
        self.barrier_pending
            && self
                .queues
                .iter()
                .filter(|(id, _)| self.queues.is_live(*id))
                .all(|(_, queue)| queue.head_is_barrier())
    }

    // -- Draining (pop_oldest / flush_queues) ---------------

    /// Remove and return the fragment whose timestamp equals `oldest`
    /// among all non-empty, non-barrier-headed queues. Returns `None`
    /// when no such queue exists (the caller must then consult
    /// `barrier_pending`).
    pub fn pop_oldest(&mut self) -> Option<Fragment> {
        let mut match_source: Option<u32> = None;
        let mut next_oldest: Option<u64> = None;
        let mut any_barrier_head = false;

        for (source_id, queue) in self.queues.iter() {
            let Some(head) = queue.peek_front() else {
                continue;
            };
            if head.is_barrier() {
                any_barrier_head = true;
                continue;
            }

            let ts = head.timestamp;
            if match_source.is_none() && ts == self.oldest {
                match_source = Some(source_id);
                continue;
            }

            next_oldest = Some(match next_oldest {
                Some(cur) if cur <= ts => cur,
                _ => ts,
            });
        }

        if any_barrier_head {
            self.barrier_pending = true;
        }

        let source_id = match_source?;
        let fragment = self
            .queues
            .get_mut(source_id)
            .and_then(|q| q.pop_front())
            .expect("matched queue must have a non-barrier head");
        self.oldest = next_oldest.unwrap_or(self.newest);
        Some(fragment)
    }

    fn any_queue_nonempty(&self) -> bool {
        self.queues.iter().any(|(_, q)| !q.is_empty())
    }

    /// `partial` here names the *exhaustive* flush (the external
    /// `flush()` calls this with `partial = true`): it drains every
    /// queue regardless of the build window, forcing a stuck barrier
    /// through as malformed if one remains at the end. With
    /// `partial = false` (the internal, window-triggered path from
    /// `add_fragments`), draining stops as soon as `newest - oldest`
    /// falls back within the build window, and a stuck barrier is left
    /// untouched for more data (or an explicit `mark_source_dead`/
    /// `flush()`) to resolve.
    pub fn flush_queues(&mut self, partial: bool) {
        let mut batch = Vec::new();

        loop {
            if !self.any_queue_nonempty() {
                break;
            }
            let window_exceeded = self.oldest != u64::MAX && self.newest - self.oldest > self.build_window;
            if !(partial || window_exceeded) {
                break;
            }

            match self.pop_oldest() {
                Some(fragment) => batch.push(fragment),
                None if self.barrier_pending => {
                    let summary = self.generate_barrier();
                    self.dispatch_barrier_summary(&summary);
                }
                // `any_queue_nonempty` guarantees some queue has a head here;
                // `pop_oldest` returning nothing for it without setting
                // `barrier_pending` means that head is neither a barrier nor
                // at `oldest`, i.e. the oldest/newest scalars are out of
                // sync with the queues. A logic error, not a recoverable
                // condition.
                None => unreachable!(
                    "pop_oldest returned no fragment while a queue was non-empty and no barrier was pending"
                ),
            }
        }

        self.record_flush_stats(&batch);
        self.observers.dispatch_events(&batch);

        if partial && self.barrier_pending {
            let summary = self.generate_barrier();
            self.dispatch_barrier_summary(&summary);
            self.flush_queues(true);
        }
    }

    /// External `flush()`: drain everything, then reset the clock view.
    pub fn flush(&mut self) {
        self.flush_queues(true);
        self.oldest = u64::MAX;
        self.newest = 0;
    }

    // -- Barrier emission (generate_barrier) ----------------

    /// Pop a barrier off the head of every queue that has one, building a
    /// [`BarrierSummary`]. Every queue is scanned, dead or live: a dead
    /// source whose stale barrier is still at its head is counted present
    /// in `types_present`. But the emission as a whole is only complete
    /// when, in addition, no source is dead — `all_sources_live` carries
    /// that second condition so `BarrierSummary::is_complete` can gate on
    /// both, matching "complete if no sources are dead, malformed
    /// otherwise."
    pub fn generate_barrier(&mut self) -> BarrierSummary {
        let mut types_present = Vec::new();
        let mut missing_sources = Vec::new();
        let mut run_number = None;

        let source_ids: Vec<u32> = self.queues.source_ids().collect();
        for source_id in source_ids {
            let queue = self.queues.get_mut(source_id).expect("source_id came from this set");
            let popped = if queue.head_is_barrier() {
                queue.pop_front()
            } else {
                None
            };

            match popped {
                Some(fragment) => {
                    if run_number.is_none() {
                        run_number = fragment.barrier_run_number();
                    }
                    types_present.push((source_id, fragment.barrier_type));
                }
                None => missing_sources.push(source_id),
            }
        }

        let all_sources_live = self.queues.live_count() == self.queues.total_count();

        self.barrier_pending = false;
        self.recompute_oldest();

        BarrierSummary {
            types_present,
            missing_sources,
            run_number,
            all_sources_live,
        }
    }

    fn recompute_oldest(&mut self) {
        let min_head = self
            .queues
            .iter()
            .filter_map(|(_, q)| q.peek_front())
            .filter(|f| !f.is_barrier())
            .map(|f| f.timestamp)
            .min();
        self.oldest = min_head.unwrap_or(self.newest);
    }

    fn dispatch_barrier_summary(&mut self, summary: &BarrierSummary) {
        if summary.is_complete() {
            self.stats.barriers_completed.inc();
            self.observers.dispatch_complete_barrier(summary);
        } else {
            self.stats.barriers_malformed.inc();
            self.observers.dispatch_partial_barrier(summary);
        }
    }

    fn record_flush_stats(&mut self, batch: &[Fragment]) {
        if batch.is_empty() {
            return;
        }
        self.stats.fragments_flushed.inc_by(batch.len() as u64);
        let bytes: u64 = batch.iter().map(|f| f.payload.len() as u64).sum();
        self.stats.bytes_flushed.inc_by(bytes);
    }

    // -- Run-state coordination (component H) ---------------------------

    /// Drop all queued fragments, reset the clock view and barrier flag.
    /// Queues and the live-set are retained.
    pub fn reset(&mut self) {
        for (_, queue) in self.queues.iter_mut() {
            while queue.pop_front().is_some() {}
        }
        self.oldest = u64::MAX;
        self.newest = 0;
        self.barrier_pending = false;
    }

    pub fn flush_until_empty(&mut self) {
        self.flush();
    }

    /// Remove `source_id` from the live set. If a barrier was pending and
    /// every *remaining* live source already has one at its head, the
    /// barrier is forced through immediately rather than waiting for more
    /// data from a source that will never send any more.
    pub fn mark_source_dead(&mut self, source_id: u32) {
        self.queues.mark_dead(source_id);
        if self.should_emit_barrier() {
            let summary = self.generate_barrier();
            self.dispatch_barrier_summary(&summary);
        }
    }

    // -- Statistics (component G) ----------------------------------------

    pub fn statistics(&self) -> StatisticsSnapshot {
        let per_queue: Vec<PerQueueStat> = self
            .queues
            .iter()
            .map(|(source_id, queue)| PerQueueStat {
                source_id,
                depth: queue.len(),
                head_ts: queue.peek_front().map(|f| f.timestamp),
            })
            .collect();
        let total_queued = per_queue.iter().map(|s| s.depth).sum();

        StatisticsSnapshot {
            oldest: self.oldest,
            newest: self.newest,
            total_queued,
            per_queue,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;

    use super::*;

    fn flat_fragment(ts: u64, source_id: u32, barrier_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20 + payload.len());
        buf.extend_from_slice(&ts.to_le_bytes());
        buf.extend_from_slice(&source_id.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&barrier_type.to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    struct CollectingEventObserver {
        batches: Arc<Mutex<Vec<Vec<Fragment>>>>,
    }

    impl EventObserver for CollectingEventObserver {
        fn on_events(&mut self, events: &[Fragment]) {
            self.batches.lock().unwrap().push(events.to_vec());
        }
    }

    struct CollectingLateObserver {
        late: Arc<Mutex<Vec<(u64, u64)>>>,
    }

    impl LateDataObserver for CollectingLateObserver {
        fn on_late_data(&mut self, late: &LateData<'_>) {
            self.late
                .lock()
                .unwrap()
                .push((late.fragment.timestamp, late.newest));
        }
    }

    struct CollectingBarrierObserver {
        summaries: Arc<Mutex<Vec<BarrierSummary>>>,
    }

    impl CompleteBarrierObserver for CollectingBarrierObserver {
        fn on_complete_barrier(&mut self, summary: &BarrierSummary) {
            self.summaries.lock().unwrap().push(summary.clone());
        }
    }

    impl PartialBarrierObserver for CollectingBarrierObserver {
        fn on_partial_barrier(&mut self, summary: &BarrierSummary) {
            self.summaries.lock().unwrap().push(summary.clone());
        }
    }

    fn batches_of(orderer: &mut Orderer) -> Arc<Mutex<Vec<Vec<Fragment>>>> {
        let batches = Arc::new(Mutex::new(Vec::new()));
        orderer.add_event_observer(Box::new(CollectingEventObserver {
            batches: batches.clone(),
        }));
        batches
    }

    // S1 - pure ordering.
    #[test]
    fn s1_pure_ordering_across_two_sources() {
        let mut orderer = Orderer::new(100);
        let batches = batches_of(&mut orderer);

        for ts in [10u64, 30, 50] {
            orderer.add_fragments(&flat_fragment(ts, 0, 0, b"")).unwrap();
        }
        for ts in [20u64, 40, 60] {
            orderer.add_fragments(&flat_fragment(ts, 1, 0, b"")).unwrap();
        }
        orderer.flush();

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let timestamps: Vec<u64> = batches[0].iter().map(|f| f.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20, 30, 40, 50, 60]);
    }

    // S2 - build-window trigger.
    #[test]
    fn s2_build_window_forces_a_partial_drain() {
        let mut orderer = Orderer::new(100);
        let batches = batches_of(&mut orderer);

        orderer.add_fragments(&flat_fragment(0, 0, 0, b"")).unwrap();
        assert_eq!(orderer.newest() - orderer.oldest(), 0);

        orderer.add_fragments(&flat_fragment(201, 1, 0, b"")).unwrap();

        {
            let batches = batches.lock().unwrap();
            assert_eq!(batches.len(), 1);
            assert_eq!(
                batches[0].iter().map(|f| f.timestamp).collect::<Vec<_>>(),
                vec![0]
            );
        }
        assert_eq!(orderer.oldest(), 201);
        assert_eq!(orderer.newest(), 201);

        orderer.flush();
        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(
            batches[1].iter().map(|f| f.timestamp).collect::<Vec<_>>(),
            vec![201]
        );
    }

    // S3 - late data.
    #[test]
    fn s3_late_fragment_is_flagged_but_still_ordered() {
        let mut orderer = Orderer::new(100);
        let late = Arc::new(Mutex::new(Vec::new()));
        orderer.add_late_data_observer(Box::new(CollectingLateObserver { late: late.clone() }));
        let batches = batches_of(&mut orderer);

        orderer.add_fragments(&flat_fragment(1000, 0, 0, b"")).unwrap();
        orderer.add_fragments(&flat_fragment(800, 1, 0, b"")).unwrap();

        assert_eq!(*late.lock().unwrap(), vec![(800, 1000)]);

        orderer.flush();
        let batches = batches.lock().unwrap();
        let timestamps: Vec<u64> = batches[0].iter().map(|f| f.timestamp).collect();
        assert_eq!(timestamps, vec![800, 1000]);
    }

    // S4 - complete barrier.
    #[test]
    fn s4_complete_barrier_across_two_live_sources() {
        let mut orderer = Orderer::new(100);
        let summaries = Arc::new(Mutex::new(Vec::new()));
        orderer.add_complete_barrier_observer(Box::new(CollectingBarrierObserver {
            summaries: summaries.clone(),
        }));
        orderer.add_partial_barrier_observer(Box::new(CollectingBarrierObserver {
            summaries: summaries.clone(),
        }));

        orderer.add_fragments(&flat_fragment(10, 0, 0, b"")).unwrap();
        orderer.add_fragments(&flat_fragment(20, 1, 0, b"")).unwrap();
        orderer.add_fragments(&flat_fragment(30, 0, 1, b"")).unwrap();
        assert!(orderer.barrier_pending());
        orderer.add_fragments(&flat_fragment(40, 1, 1, b"")).unwrap();

        assert!(!orderer.barrier_pending());
        let summaries = summaries.lock().unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].is_complete());
        assert_eq!(summaries[0].types_present, vec![(0, 1), (1, 1)]);
    }

    // S5 - malformed barrier via dead source.
    #[test]
    fn s5_malformed_barrier_when_a_source_dies() {
        let mut orderer = Orderer::new(100);
        let summaries = Arc::new(Mutex::new(Vec::new()));
        orderer.add_partial_barrier_observer(Box::new(CollectingBarrierObserver {
            summaries: summaries.clone(),
        }));
        orderer.add_complete_barrier_observer(Box::new(CollectingBarrierObserver {
            summaries: summaries.clone(),
        }));

        orderer.pre_declare_source(0);
        orderer.pre_declare_source(1);
        orderer.add_fragments(&flat_fragment(10, 0, 7, b"")).unwrap();
        assert!(orderer.barrier_pending());

        orderer.mark_source_dead(1);

        let summaries = summaries.lock().unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(!summaries[0].is_complete());
        assert_eq!(summaries[0].types_present, vec![(0, 7)]);
        assert_eq!(summaries[0].missing_sources, vec![1]);
    }

    // A dead source's barrier can still be physically present at its
    // queue head; that alone must not make the emission complete.
    #[test]
    fn malformed_barrier_when_a_dead_source_still_has_one_queued() {
        let mut orderer = Orderer::new(100);
        let summaries = Arc::new(Mutex::new(Vec::new()));
        orderer.add_partial_barrier_observer(Box::new(CollectingBarrierObserver {
            summaries: summaries.clone(),
        }));
        orderer.add_complete_barrier_observer(Box::new(CollectingBarrierObserver {
            summaries: summaries.clone(),
        }));

        orderer.pre_declare_source(0);
        orderer.pre_declare_source(1);
        orderer.add_fragments(&flat_fragment(10, 1, 5, b"")).unwrap();
        orderer.mark_source_dead(1);
        // Source 1 is dead but its barrier is still sitting at its queue
        // head, unconsumed; only source 0 is checked for the trigger.
        orderer.add_fragments(&flat_fragment(20, 0, 5, b"")).unwrap();

        let summaries = summaries.lock().unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(!summaries[0].is_complete());
        assert_eq!(summaries[0].missing_sources, Vec::<u32>::new());
        assert_eq!(summaries[0].types_present, vec![(0, 5), (1, 5)]);
    }

    #[test]
    fn framing_error_leaves_prior_enqueues_intact() {
        let mut orderer = Orderer::new(100);
        let mut buf = flat_fragment(10, 0, 0, b"ok");
        buf.extend_from_slice(&20u64.to_le_bytes()); // truncated second header
        let err = orderer.add_fragments(&buf).unwrap_err();
        assert_matches!(err, OrdererError::Framing { .. });
        assert_eq!(orderer.statistics().total_queued, 1);
    }

    #[test]
    fn flush_on_empty_orderer_emits_nothing() {
        let mut orderer = Orderer::new(100);
        let batches = batches_of(&mut orderer);
        orderer.flush();
        assert!(batches.lock().unwrap().is_empty());
    }

    #[test]
    fn reset_twice_is_the_same_as_reset_once() {
        let mut orderer = Orderer::new(100);
        orderer.add_fragments(&flat_fragment(10, 0, 0, b"")).unwrap();
        orderer.reset();
        let after_one = orderer.statistics();
        orderer.reset();
        let after_two = orderer.statistics();
        assert_eq!(after_one, after_two);
        assert_eq!(after_one.total_queued, 0);
    }

    #[test]
    fn dead_source_reanimates_on_new_fragment() {
        let mut orderer = Orderer::new(100);
        orderer.pre_declare_source(0);
        orderer.mark_source_dead(0);
        assert!(!orderer.is_live(0));
        orderer.add_fragments(&flat_fragment(10, 0, 0, b"")).unwrap();
        assert!(orderer.is_live(0));
    }
}
