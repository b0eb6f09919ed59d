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

//! Downstream composite format: a ring item of type `COMPOSITE | inner_type`,
//! carrying `timestamp`, `source_id`, and a body of nested raw items in
//! emission order.

use evb_common::{encode_into, Fragment, COMPOSITE_BIT};

use crate::config::Policy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composite {
    pub item_type: u32,
    pub source_id: u32,
    pub timestamp: u64,
    pub children: Vec<Fragment>,
}

impl Composite {
    pub fn new(inner_type: u32, source_id: u32, timestamp: u64, children: Vec<Fragment>) -> Self {
        Self {
            item_type: inner_type | COMPOSITE_BIT,
            source_id,
            timestamp,
            children,
        }
    }

    /// Concatenate each child's flat-fragment wire encoding, in emission
    /// order, as the composite body.
    pub fn encode_body(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for child in &self.children {
            encode_into(&mut buf, child);
        }
        buf
    }
}

/// The "Glom Parameters" record emitted once at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlomParameters {
    pub dt: Option<u64>,
    pub building: bool,
    pub policy: Policy,
}

pub(crate) fn assign_timestamp(policy: Policy, first_ts: u64, last_ts: u64, sum_ts: u128, count: u64) -> u64 {
    match policy {
        Policy::First => first_ts,
        Policy::Last => last_ts,
        Policy::Average => {
            if count == 0 {
                first_ts
            } else {
                (sum_ts / count as u128) as u64
            }
        }
    }
}
