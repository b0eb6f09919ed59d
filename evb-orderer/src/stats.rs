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

//! Statistics collector (component G).
//!
//! Two views are kept distinct: [`StatisticsSnapshot`] is the point-in-time
//! view `statistics()` returns; [`StatsRegistry`] is the ambient Prometheus
//! counter set that can be read without quiescing the orderer.

use prometheus::core::{AtomicU64, GenericCounter, GenericCounterVec};
use prometheus::{register_int_counter_vec_with_registry, register_int_counter_with_registry, Registry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerQueueStat {
    pub source_id: u32,
    pub depth: usize,
    pub head_ts: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub oldest: u64,
    pub newest: u64,
    pub total_queued: usize,
    pub per_queue: Vec<PerQueueStat>,
}

/// Read-mostly counters updated incrementally as fragments flow, so
/// routine monitoring does not need to quiesce the orderer.
pub struct StatsRegistry {
    pub registry: Registry,
    pub fragments_received: GenericCounterVec<AtomicU64>,
    pub bytes_received: GenericCounterVec<AtomicU64>,
    pub fragments_flushed: GenericCounter<AtomicU64>,
    pub bytes_flushed: GenericCounter<AtomicU64>,
    pub barriers_completed: GenericCounter<AtomicU64>,
    pub barriers_malformed: GenericCounter<AtomicU64>,
    pub late_fragments: GenericCounter<AtomicU64>,
}

impl StatsRegistry {
    pub fn new(registry: Registry) -> Self {
        let fragments_received = register_int_counter_vec_with_registry!(
            "evb_fragments_received",
            "Total fragments received, labeled by source_id",
            &["source_id"],
            registry
        )
        .unwrap();

        let bytes_received = register_int_counter_vec_with_registry!(
            "evb_bytes_received",
            "Total payload bytes received, labeled by source_id",
            &["source_id"],
            registry
        )
        .unwrap();

        let fragments_flushed = register_int_counter_with_registry!(
            "evb_fragments_flushed",
            "Total fragments released to observers",
            registry
        )
        .unwrap();

        let bytes_flushed = register_int_counter_with_registry!(
            "evb_bytes_flushed",
            "Total payload bytes released to observers",
            registry
        )
        .unwrap();

        let barriers_completed = register_int_counter_with_registry!(
            "evb_barriers_completed",
            "Total complete-barrier emissions",
            registry
        )
        .unwrap();

        let barriers_malformed = register_int_counter_with_registry!(
            "evb_barriers_malformed",
            "Total malformed/partial-barrier emissions",
            registry
        )
        .unwrap();

        let late_fragments = register_int_counter_with_registry!(
            "evb_late_fragments",
            "Total fragments flagged as late data",
            registry
        )
        .unwrap();

        Self {
            registry,
            fragments_received,
            bytes_received,
            fragments_flushed,
            bytes_flushed,
            barriers_completed,
            barriers_malformed,
            late_fragments,
        }
    }

    /// A registry for tests and other places that don't care about
    /// exporting metrics.
    pub fn unused() -> Self {
        Self::new(Registry::new())
    }
}
