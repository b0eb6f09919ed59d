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

//! Transport abstraction: the ring-buffer client library underneath is
//! expected to have already decoded raw items, so the adapter consumes a
//! typed item stream rather than raw bytes.

use std::time::Duration;

use async_trait::async_trait;
use evb_common::RawItem;

/// One source of raw items, polled by [`crate::adapter::RingSourceAdapter`].
#[async_trait]
pub trait Transport: Send {
    /// Block up to `timeout` for data to become available.
    async fn data_ready(&mut self, timeout: Duration) -> bool;

    /// Pull whatever items are currently available. An empty result means
    /// no data was ready, not end-of-stream; ring sources are unbounded.
    async fn next_batch(&mut self) -> anyhow::Result<Vec<RawItem>>;
}
