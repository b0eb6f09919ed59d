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

//! Ring-source adapter crate (component E): reframes upstream raw items as
//! flat fragments and submits them to an [`evb_orderer::Orderer`].

pub mod adapter;
pub mod config;
pub mod transport;

pub use adapter::{RingSourceAdapter, TimestampExtractor};
pub use config::RingSourceConfig;
pub use transport::Transport;
