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

//! Observer registry vocabulary (component D).
//!
//! Modeled as a tagged [`ObserverKind`] plus one small trait per kind,
//! rather than a single heterogeneous listener list: each kind has a
//! distinct call shape and the orderer dispatches to each registry
//! separately.

use crate::fragment::Fragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverKind {
    Event,
    LateData,
    CompleteBarrier,
    PartialBarrier,
}

/// A fragment that arrived later than the build window tolerates.
#[derive(Debug, Clone, Copy)]
pub struct LateData<'a> {
    pub fragment: &'a Fragment,
    /// `newest` as it stood immediately before this fragment was enqueued.
    pub newest: u64,
}

/// Outcome of a barrier emission: which sources contributed a barrier
/// (with its type) and which were missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarrierSummary {
    pub types_present: Vec<(u32, u32)>,
    pub missing_sources: Vec<u32>,
    /// Run number recovered from a barrier payload, if any (see
    /// `Fragment::barrier_run_number`). `None` when no contributing
    /// barrier carried one.
    pub run_number: Option<u32>,
    /// `true` iff every known source was live at emission time. A dead
    /// source's stale barrier can still be physically present at its
    /// queue head (and so still counted in `types_present`), but its
    /// existence alone degrades the emission to malformed.
    pub all_sources_live: bool,
}

impl BarrierSummary {
    /// Complete iff no source was missing a barrier *and* no source was
    /// dead — a barrier sitting unconsumed at a dead source's queue head
    /// does not make the emission complete.
    pub fn is_complete(&self) -> bool {
        self.missing_sources.is_empty() && self.all_sources_live
    }
}

/// Receives every build-window batch, in non-decreasing timestamp order,
/// ties broken by source-id then arrival order.
pub trait EventObserver: Send {
    fn on_events(&mut self, events: &[Fragment]);
}

/// Receives fragments that arrived later than the build window tolerates.
/// Invoked before the fragment is enqueued.
pub trait LateDataObserver: Send {
    fn on_late_data(&mut self, late: &LateData<'_>);
}

/// Receives a barrier summary when every live source contributed and no
/// source was dead.
pub trait CompleteBarrierObserver: Send {
    fn on_complete_barrier(&mut self, summary: &BarrierSummary);
}

/// Receives a barrier summary when at least one source was missing or
/// dead at emission time.
pub trait PartialBarrierObserver: Send {
    fn on_partial_barrier(&mut self, summary: &BarrierSummary);
}
