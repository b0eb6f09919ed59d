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

//! Ring-source adapter (component E): pulls raw items from a [`Transport`],
//! reframes them as flat fragments, and submits them to the orderer.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use evb_common::{
    encode_into, inner_type, AdapterError, AdapterResult, Fragment, RawItem, END_RUN, NULL_TIMESTAMP,
    PHYSICS_EVENT,
};
use evb_orderer::OrdererHandle;

use crate::config::RingSourceConfig;
use crate::transport::Transport;

/// Maps a physics-event payload to an event timestamp. Optional: absent
/// physics-event timestamps fall back to `NULL_TIMESTAMP` unless
/// `expect_body_headers` requires one.
pub type TimestampExtractor = Box<dyn Fn(&[u8]) -> Option<u64> + Send + Sync>;

/// A timestamp delta backward past this many ticks is logged as
/// non-monotonic but never dropped.
const NON_MONOTONIC_THRESHOLD: u64 = 1 << 32;

pub struct RingSourceAdapter<T: Transport> {
    transport: T,
    config: RingSourceConfig,
    permitted: HashSet<u32>,
    extractor: Option<TimestampExtractor>,
    last_seen_timestamp: HashMap<u32, u64>,
    end_runs_seen: u32,
    last_data_at: Instant,
    /// Soft per-batch byte cap, seeded from `config.max_event` and grown
    /// (never shrunk) whenever a single reframed item would not fit under
    /// the current cap, so a batch is never truncated mid-item.
    max_event: usize,
}

impl<T: Transport> RingSourceAdapter<T> {
    /// Parse and validate `config`, failing with [`AdapterError::Config`]
    /// when the permitted-id list is missing/duplicated, or when
    /// `expect_body_headers` is set without an extractor to satisfy it.
    pub fn initialize(
        config: RingSourceConfig,
        transport: T,
        extractor: Option<TimestampExtractor>,
    ) -> AdapterResult<Self> {
        let permitted = config.validate()?;
        if config.expect_body_headers && extractor.is_none() {
            return Err(AdapterError::Config(
                "expect_body_headers requires a timestamp_extractor".to_string(),
            ));
        }

        let max_event = config.max_event;
        Ok(Self {
            transport,
            config,
            permitted,
            extractor,
            last_seen_timestamp: HashMap::new(),
            end_runs_seen: 0,
            last_data_at: Instant::now(),
            max_event,
        })
    }

    pub async fn data_ready(&mut self, timeout: Duration) -> bool {
        self.transport.data_ready(timeout).await
    }

    /// Pull raw items up to the configured soft byte cap, reframe each as
    /// a fragment, and submit the whole batch to `orderer` in one
    /// `add_fragments` call. Returns the number of fragments submitted.
    pub async fn get_events(&mut self, orderer: &OrdererHandle) -> AdapterResult<usize> {
        let items = self
            .transport
            .next_batch()
            .await
            .map_err(AdapterError::Transport)?;
        if items.is_empty() {
            return Ok(0);
        }
        self.last_data_at = Instant::now();

        let mut buf = Vec::new();
        let mut submitted = 0usize;

        for item in items {
            if !self.permitted.contains(&item.source_id) {
                return Err(AdapterError::Unauthorized {
                    source_id: item.source_id,
                });
            }

            if inner_type(item.item_type) == END_RUN {
                self.end_runs_seen += 1;
            }

            let fragment = self.reframe(item);
            let encoded_len = fragment.encoded_len();
            if encoded_len > self.max_event {
                tracing::warn!(
                    old_max_event = self.max_event,
                    new_max_event = encoded_len,
                    "growing max_event to fit an oversized item"
                );
                self.max_event = encoded_len;
            }
            encode_into(&mut buf, &fragment);
            submitted += 1;

            if buf.len() >= self.max_event {
                break;
            }
        }

        if submitted > 0 {
            orderer
                .lock()
                .add_fragments(&buf)
                .map_err(|e| AdapterError::Transport(anyhow::anyhow!(e)))?;
        }

        Ok(submitted)
    }

    fn reframe(&mut self, item: RawItem) -> Fragment {
        let barrier_type = item.barrier_type();
        let timestamp = self.extract_timestamp(&item);
        self.check_monotonic(item.source_id, timestamp);
        Fragment::new(timestamp, item.source_id, barrier_type, item.body)
    }

    fn extract_timestamp(&self, item: &RawItem) -> u64 {
        let raw = if let Some(ts) = item.timestamp {
            Some(ts)
        } else if inner_type(item.item_type) == PHYSICS_EVENT {
            self.extractor.as_ref().and_then(|extract| extract(&item.body))
        } else {
            None
        };

        match raw {
            Some(ts) => ts.wrapping_add(self.config.tick_offset as u64),
            None => NULL_TIMESTAMP,
        }
    }

    fn check_monotonic(&mut self, source_id: u32, ts: u64) {
        if ts == NULL_TIMESTAMP {
            return;
        }
        if let Some(&prev) = self.last_seen_timestamp.get(&source_id) {
            if prev > ts && prev - ts > NON_MONOTONIC_THRESHOLD {
                tracing::warn!(source_id, prev, ts, "non-monotonic timestamp");
            }
        }
        self.last_seen_timestamp.insert(source_id, ts);
    }

    /// True once one-shot mode has seen its configured number of end-run
    /// items and no further data has arrived within the configured
    /// timeout.
    pub fn should_exit(&self) -> bool {
        self.config.one_shot
            && self.end_runs_seen >= self.config.end_run_count
            && self.last_data_at.elapsed() >= Duration::from_secs(self.config.timeout_secs as u64)
    }

    /// Drive the adapter until one-shot mode signals exit. Never returns
    /// in non-one-shot mode; callers that want to run it on a task spawn
    /// this directly.
    ///
    /// A transport error is retried with a bounded exponential backoff
    /// (starting at 50ms, capped at 5s) rather than unwinding the loop;
    /// any other error is returned immediately. Retries still count
    /// toward the one-shot end-of-run timeout.
    pub async fn run(&mut self, orderer: &OrdererHandle) -> AdapterResult<()> {
        const MIN_BACKOFF: Duration = Duration::from_millis(50);
        const MAX_BACKOFF: Duration = Duration::from_secs(5);

        let poll_timeout = Duration::from_millis(200);
        let mut backoff = MIN_BACKOFF;
        loop {
            if self.data_ready(poll_timeout).await {
                match self.get_events(orderer).await {
                    Ok(_) => backoff = MIN_BACKOFF,
                    Err(AdapterError::Transport(err)) => {
                        tracing::warn!(error = %err, delay = ?backoff, "transport read failed, retrying");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                    Err(other) => return Err(other),
                }
            }
            if self.should_exit() {
                return Ok(());
            }
        }
    }
}
