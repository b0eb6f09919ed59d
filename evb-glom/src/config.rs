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

//! Glommer configuration.

use std::fs;
use std::path::Path;

use evb_common::{AdapterError, AdapterResult};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Policy {
    First,
    Last,
    Average,
}

impl Default for Policy {
    fn default() -> Self {
        Policy::First
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlomConfig {
    /// Coincidence window in ticks. Required when `building` is true.
    pub dt: Option<u64>,

    #[serde(default = "default_building")]
    pub building: bool,

    #[serde(default)]
    pub policy: Policy,

    pub source_id: u32,
}

fn default_building() -> bool {
    true
}

impl GlomConfig {
    /// Read and parse a TOML config file from `path`.
    pub fn init(path: impl AsRef<Path>) -> AdapterResult<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|e| {
            AdapterError::Config(format!(
                "failed to open config file '{}': {e}",
                path.display()
            ))
        })?;
        toml::from_str(&config_str).map_err(|e| AdapterError::Config(format!("parse error: {e}")))
    }

    pub fn validate(&self) -> AdapterResult<()> {
        if self.building && self.dt.is_none() {
            return Err(AdapterError::Config(
                "dt is required when building is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn building_without_dt_is_rejected() {
        let config = GlomConfig {
            dt: None,
            building: true,
            policy: Policy::First,
            source_id: 0,
        };
        assert_matches::assert_matches!(config.validate(), Err(AdapterError::Config(_)));
    }

    #[test]
    fn disabled_building_does_not_need_dt() {
        let config = GlomConfig {
            dt: None,
            building: false,
            policy: Policy::First,
            source_id: 0,
        };
        assert_matches::assert_matches!(config.validate(), Ok(()));
    }

    #[test]
    fn parses_a_toml_document_with_policy_defaulted() {
        let toml_str = r#"
            dt = 50
            source_id = 7
        "#;
        let config: GlomConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.policy, Policy::First);
        assert!(config.building);
    }

    #[test]
    fn init_reads_and_parses_a_config_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("evb_glom_test_{}.toml", std::process::id()));
        fs::write(&path, "dt = 50\nsource_id = 7\n").unwrap();

        let config = GlomConfig::init(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.dt, Some(50));
        assert_eq!(config.source_id, 7);
    }

    #[test]
    fn init_reports_missing_file_as_a_config_error() {
        let err = GlomConfig::init("/nonexistent/evb_glom.toml").unwrap_err();
        assert_matches::assert_matches!(err, AdapterError::Config(_));
    }
}
