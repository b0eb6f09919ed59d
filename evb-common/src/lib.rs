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

//! Shared vocabulary for the event-builder core: the owned fragment type
//! and its wire codec, the error taxonomy, the observer traits, and the
//! upstream raw-item constants used by both the ring-source adapter and
//! the glommer.

pub mod error;
pub mod fragment;
pub mod observer;
pub mod ring_item;

pub use error::{AdapterError, AdapterResult, OrdererError, Result};
pub use fragment::{
    decode_fragments, decode_one, encode_into, Fragment, FRAGMENT_HEADER_SIZE, NULL_TIMESTAMP,
};
pub use observer::{
    BarrierSummary, CompleteBarrierObserver, EventObserver, LateData, LateDataObserver,
    ObserverKind, PartialBarrierObserver,
};
pub use ring_item::{
    inner_type, is_composite, is_state_change, RawItem, ABNORMAL_ENDRUN, BEGIN_RUN, COMPOSITE_BIT,
    END_RUN, EVB_GLOM_INFO, MONITORED_VARIABLES, PAUSE_RUN, PERIODIC_SCALERS, PHYSICS_EVENT,
    PHYSICS_EVENT_COUNT, RESUME_RUN, RING_FORMAT,
};
