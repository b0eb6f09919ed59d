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

//! Ring-source adapter configuration.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use evb_common::{AdapterError, AdapterResult};
use serde::Deserialize;

fn default_max_event() -> usize {
    10 * 1024 * 1024
}

fn default_end_run_count() -> u32 {
    1
}

fn default_timeout_secs() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct RingSourceConfig {
    pub transport_url: String,
    pub permitted_source_ids: Vec<u32>,

    #[serde(default)]
    pub expect_body_headers: bool,

    #[serde(default)]
    pub one_shot: bool,

    #[serde(default = "default_end_run_count")]
    pub end_run_count: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,

    #[serde(default)]
    pub tick_offset: i64,

    /// Initial soft byte cap per `get_events` batch. The adapter's runtime
    /// cap seeds from this value and grows (sticky, never shrinks) past it
    /// whenever a single reframed item wouldn't otherwise fit.
    #[serde(default = "default_max_event")]
    pub max_event: usize,
}

impl RingSourceConfig {
    /// Read and parse a TOML config file from `path`.
    pub fn init(path: impl AsRef<Path>) -> AdapterResult<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|e| {
            AdapterError::Config(format!(
                "failed to open config file '{}': {e}",
                path.display()
            ))
        })?;
        toml::from_str(&config_str)
            .map_err(|e| AdapterError::Config(format!("parse error: {e}")))
    }

    /// Validate and return the permitted-source-id set.
    pub fn validate(&self) -> AdapterResult<HashSet<u32>> {
        if self.transport_url.is_empty() {
            return Err(AdapterError::Config("transport_url must not be empty".to_string()));
        }
        if self.permitted_source_ids.is_empty() {
            return Err(AdapterError::Config(
                "permitted_source_ids must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.permitted_source_ids.len());
        for id in &self.permitted_source_ids {
            if !seen.insert(*id) {
                return Err(AdapterError::Config(format!(
                    "duplicate source id {id} in permitted_source_ids"
                )));
            }
        }
        Ok(seen)
    }
}
