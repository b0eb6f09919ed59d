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

//! Error taxonomy for the orderer core and the ring-source adapter.
//!
//! `LateData` and `IncompleteBarrier` are deliberately absent here: per the
//! design, they are not errors, only records delivered to observers.

use thiserror::Error;

/// Errors raised by the fragment handler / orderer core.
#[derive(Debug, Error)]
pub enum OrdererError {
    /// An `add_fragments` buffer did not decode into a whole number of
    /// flat fragments, or a declared `payload_size` ran past the end of
    /// the buffer.
    #[error("framing error at offset {offset}: {reason}")]
    Framing { offset: usize, reason: String },

    /// `pop_oldest` returned no fragment while `barrier_pending` was
    /// false. This is a logic error, not a recoverable condition;
    /// callers that observe it should abort rather than retry.
    #[error("orderer logic error: {0}")]
    LogicError(String),
}

pub type Result<T> = std::result::Result<T, OrdererError>;

/// Errors raised by the ring-source adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unauthorized source id {source_id}")]
    Unauthorized { source_id: u32 },

    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;
