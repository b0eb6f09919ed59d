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

//! Glommer crate (component F): downstream aggregation that groups
//! time-adjacent ordered fragments into composite events.

pub mod config;
pub mod glommer;
pub mod observer;
pub mod stats;
pub mod types;

pub use config::{GlomConfig, Policy};
pub use glommer::Glommer;
pub use observer::CompositeObserver;
pub use stats::GlomStats;
pub use types::{Composite, GlomParameters};
