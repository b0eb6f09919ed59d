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

//! Shared handle to one [`Orderer`]: a constructed-once, passed-by-reference
//! value rather than a process-wide singleton.

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::Registry;

use crate::orderer::Orderer;

#[derive(Clone)]
pub struct OrdererHandle {
    inner: Arc<Mutex<Orderer>>,
}

impl OrdererHandle {
    pub fn new(build_window: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Orderer::new(build_window))),
        }
    }

    pub fn with_metrics_registry(build_window: u64, registry: Registry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Orderer::with_metrics_registry(build_window, registry))),
        }
    }

    #[cfg(test)]
    pub fn for_test() -> Self {
        Self::new(100)
    }

    pub fn lock(&self) -> parking_lot::MutexGuard<'_, Orderer> {
        self.inner.lock()
    }
}
