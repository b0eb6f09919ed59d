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

//! Glommer counters (component G, glommer's share of the statistics
//! collector): total composites synthesized and total children folded
//! into them, mirroring the orderer's `StatsRegistry` shape.

use prometheus::core::{AtomicU64, GenericCounter};
use prometheus::{register_int_counter_with_registry, Registry};

pub struct GlomStats {
    pub registry: Registry,
    pub composites_emitted: GenericCounter<AtomicU64>,
    pub children_glommed: GenericCounter<AtomicU64>,
}

impl GlomStats {
    pub fn new(registry: Registry) -> Self {
        let composites_emitted = register_int_counter_with_registry!(
            "evb_glom_composites_emitted",
            "Total composite items synthesized",
            registry
        )
        .unwrap();

        let children_glommed = register_int_counter_with_registry!(
            "evb_glom_children_glommed",
            "Total input fragments folded into a composite",
            registry
        )
        .unwrap();

        Self {
            registry,
            composites_emitted,
            children_glommed,
        }
    }

    pub fn unused() -> Self {
        Self::new(Registry::new())
    }
}
