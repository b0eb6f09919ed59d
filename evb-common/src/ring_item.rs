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

//! Upstream raw-item vocabulary shared by the ring-source adapter and the
//! glommer.

use bytes::Bytes;

/// Bit OR-ed into a ring item's type to mark a composite (glommed) variant.
pub const COMPOSITE_BIT: u32 = 0x8000;

pub const BEGIN_RUN: u32 = 1;
pub const END_RUN: u32 = 2;
pub const PAUSE_RUN: u32 = 3;
pub const RESUME_RUN: u32 = 4;
pub const ABNORMAL_ENDRUN: u32 = 5;
pub const RING_FORMAT: u32 = 12;
pub const PERIODIC_SCALERS: u32 = 20;
pub const MONITORED_VARIABLES: u32 = 24;
pub const PHYSICS_EVENT: u32 = 30;
pub const PHYSICS_EVENT_COUNT: u32 = 31;
pub const EVB_GLOM_INFO: u32 = 42;

/// Strip the composite bit, returning the plain item type.
#[inline]
pub fn inner_type(item_type: u32) -> u32 {
    item_type & !COMPOSITE_BIT
}

#[inline]
pub fn is_composite(item_type: u32) -> bool {
    item_type & COMPOSITE_BIT != 0
}

/// State-change types gate barriers across sources; everything else
/// (physics events and all other record types) is plain data.
#[inline]
pub fn is_state_change(item_type: u32) -> bool {
    matches!(
        inner_type(item_type),
        BEGIN_RUN | END_RUN | PAUSE_RUN | RESUME_RUN
    )
}

/// A raw item as produced by the upstream transport: already decoded by
/// whatever ring-buffer client library sits underneath it. Out of scope
/// for this core, which consumes a typed item stream, not a raw byte
/// stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub item_type: u32,
    pub source_id: u32,
    /// Event timestamp carried in the item's body header, if any.
    pub timestamp: Option<u64>,
    pub body: Bytes,
}

impl RawItem {
    pub fn new(item_type: u32, source_id: u32, timestamp: Option<u64>, body: impl Into<Bytes>) -> Self {
        Self {
            item_type,
            source_id,
            timestamp,
            body: body.into(),
        }
    }

    /// The `barrier_type` a fragment built from this item should carry:
    /// nonzero for state-change items (composite bit stripped), zero for
    /// everything else, including physics events.
    pub fn barrier_type(&self) -> u32 {
        if is_state_change(self.item_type) {
            inner_type(self.item_type)
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_begin_run_strips_to_plain_begin_run() {
        let composite = BEGIN_RUN | COMPOSITE_BIT;
        assert!(is_composite(composite));
        assert_eq!(inner_type(composite), BEGIN_RUN);
        assert!(is_state_change(composite));
    }

    #[test]
    fn physics_events_are_never_barriers() {
        let item = RawItem::new(PHYSICS_EVENT, 0, Some(42), Bytes::new());
        assert_eq!(item.barrier_type(), 0);
    }

    #[test]
    fn end_run_is_a_barrier_with_its_type() {
        let item = RawItem::new(END_RUN, 3, None, Bytes::new());
        assert_eq!(item.barrier_type(), END_RUN);
    }
}
