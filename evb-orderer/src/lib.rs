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

//! Orderer crate: the build-window policy, barrier state machine, and
//! observer/statistics plumbing that sit downstream of fragment ingest.

pub mod handle;
pub mod observer_registry;
pub mod orderer;
pub mod queue;
pub mod stats;

pub use handle::OrdererHandle;
pub use observer_registry::{ObserverId, ObserverRegistry};
pub use orderer::Orderer;
pub use stats::{PerQueueStat, StatisticsSnapshot, StatsRegistry};
