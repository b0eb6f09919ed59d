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

//! Fragment descriptor (component A) and the flat-fragment wire codec (§6).

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;

use crate::error::{OrdererError, Result};

/// Sentinel meaning "assign the current newest timestamp on ingest".
pub const NULL_TIMESTAMP: u64 = u64::MAX;

/// `timestamp(8) + source_id(4) + payload_size(4) + barrier_type(4)`.
pub const FRAGMENT_HEADER_SIZE: usize = 20;

/// An owned fragment: header fields plus opaque payload bytes.
///
/// Ingest always copies the caller's transport bytes into `payload`, so the
/// caller retains ownership of its own buffer. Once a
/// fragment is handed to an observer it is borrowed for the duration of
/// that call only; observers that need to retain data must copy it.
#[derive(Clone, PartialEq, Eq)]
pub struct Fragment {
    pub timestamp: u64,
    pub source_id: u32,
    pub barrier_type: u32,
    pub payload: Bytes,
}

impl Fragment {
    pub fn new(timestamp: u64, source_id: u32, barrier_type: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            source_id,
            barrier_type,
            payload: payload.into(),
        }
    }

    /// `barrier_type == 0` marks a data fragment; anything else is a barrier.
    #[inline]
    pub fn is_barrier(&self) -> bool {
        self.barrier_type != 0
    }

    /// Length this fragment would occupy in the flat wire format.
    pub fn encoded_len(&self) -> usize {
        FRAGMENT_HEADER_SIZE + self.payload.len()
    }

    /// Best-effort run number carried in a barrier's payload: first 4
    /// bytes, little-endian. Not interpreted for non-barrier fragments or
    /// short payloads.
    pub fn barrier_run_number(&self) -> Option<u32> {
        if !self.is_barrier() || self.payload.len() < 4 {
            return None;
        }
        Some(LittleEndian::read_u32(&self.payload[..4]))
    }
}

impl std::fmt::Debug for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const PREVIEW: usize = 16;
        let shown = &self.payload[..self.payload.len().min(PREVIEW)];
        f.debug_struct("Fragment")
            .field("timestamp", &self.timestamp)
            .field("source_id", &self.source_id)
            .field("barrier_type", &self.barrier_type)
            .field("payload_len", &self.payload.len())
            .field("payload_preview", &shown)
            .finish()
    }
}

/// Decode one flat fragment starting at `offset`. Returns `Ok(None)` when
/// `offset == buf.len()` (clean end of buffer), `Ok(Some((fragment,
/// next_offset)))` on a successful decode, or `Err` when the header or
/// declared payload runs past the buffer end.
///
/// Exposed so callers that must enqueue each fragment as it is decoded
/// (the orderer's `add_fragments`, which must preserve whatever was
/// already enqueued before a framing error) don't have to buffer the
/// whole batch up front.
pub fn decode_one(buf: &[u8], offset: usize) -> Result<Option<(Fragment, usize)>> {
    if offset == buf.len() {
        return Ok(None);
    }

    let remaining = buf.len() - offset;
    if remaining < FRAGMENT_HEADER_SIZE {
        return Err(OrdererError::Framing {
            offset,
            reason: format!(
                "only {remaining} bytes remain, need {FRAGMENT_HEADER_SIZE} for a header"
            ),
        });
    }

    let header = &buf[offset..offset + FRAGMENT_HEADER_SIZE];
    let timestamp = LittleEndian::read_u64(&header[0..8]);
    let source_id = LittleEndian::read_u32(&header[8..12]);
    let payload_size = LittleEndian::read_u32(&header[12..16]) as usize;
    let barrier_type = LittleEndian::read_u32(&header[16..20]);

    let body_start = offset + FRAGMENT_HEADER_SIZE;
    let body_end = body_start
        .checked_add(payload_size)
        .ok_or_else(|| OrdererError::Framing {
            offset,
            reason: "payload_size overflows buffer addressing".to_string(),
        })?;
    if body_end > buf.len() {
        return Err(OrdererError::Framing {
            offset,
            reason: format!(
                "declared payload_size {payload_size} runs past buffer end ({body_end} > {})",
                buf.len()
            ),
        });
    }

    let payload = Bytes::copy_from_slice(&buf[body_start..body_end]);
    let fragment = Fragment::new(timestamp, source_id, barrier_type, payload);
    Ok(Some((fragment, body_end)))
}

/// Append `fragment` to `buf` in the flat wire format (the inverse of
/// [`decode_one`]). Used by producers of `add_fragments` input, such as
/// the ring-source adapter, to assemble a batch.
pub fn encode_into(buf: &mut Vec<u8>, fragment: &Fragment) {
    let mut header = [0u8; FRAGMENT_HEADER_SIZE];
    LittleEndian::write_u64(&mut header[0..8], fragment.timestamp);
    LittleEndian::write_u32(&mut header[8..12], fragment.source_id);
    LittleEndian::write_u32(&mut header[12..16], fragment.payload.len() as u32);
    LittleEndian::write_u32(&mut header[16..20], fragment.barrier_type);
    buf.extend_from_slice(&header);
    buf.extend_from_slice(&fragment.payload);
}

/// Decode a concatenated sequence of flat fragments.
///
/// The final record's end must coincide with the end of `buf` exactly;
/// any short header or truncated payload at the tail is a `Framing` error.
/// On success the multiset and arrival order of decoded fragments is
/// exactly the order the records appear in `buf`.
pub fn decode_fragments(buf: &[u8]) -> Result<Vec<Fragment>> {
    let mut out = Vec::new();
    let mut offset = 0usize;

    while let Some((fragment, next_offset)) = decode_one(buf, offset)? {
        out.push(fragment);
        offset = next_offset;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(ts: u64, source_id: u32, barrier_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAGMENT_HEADER_SIZE + payload.len());
        buf.extend_from_slice(&ts.to_le_bytes());
        buf.extend_from_slice(&source_id.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&barrier_type.to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn round_trips_a_well_formed_sequence() {
        let mut buf = encode(10, 0, 0, b"abc");
        buf.extend(encode(20, 1, 0, b""));
        buf.extend(encode(30, 0, 1, b"\x07\x00\x00\x00"));

        let fragments = decode_fragments(&buf).unwrap();
        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0].timestamp, 10);
        assert_eq!(fragments[0].payload.as_ref(), b"abc");
        assert!(!fragments[0].is_barrier());
        assert!(fragments[2].is_barrier());
        assert_eq!(fragments[2].barrier_run_number(), Some(7));
    }

    #[test]
    fn empty_buffer_decodes_to_no_fragments() {
        assert_eq!(decode_fragments(&[]).unwrap().len(), 0);
    }

    #[test]
    fn truncated_header_is_a_framing_error() {
        let buf = encode(10, 0, 0, b"abc");
        let err = decode_fragments(&buf[..FRAGMENT_HEADER_SIZE - 1]).unwrap_err();
        assert!(matches!(err, OrdererError::Framing { offset: 0, .. }));
    }

    #[test]
    fn declared_payload_longer_than_buffer_is_a_framing_error() {
        let mut buf = encode(10, 0, 0, b"abc");
        let last = buf.len() - 1;
        buf.remove(last);
        let err = decode_fragments(&buf).unwrap_err();
        assert!(matches!(err, OrdererError::Framing { .. }));
    }

    #[test]
    fn trailing_garbage_after_last_record_is_a_framing_error() {
        let mut buf = encode(10, 0, 0, b"abc");
        buf.push(0xFF);
        let err = decode_fragments(&buf).unwrap_err();
        assert!(matches!(err, OrdererError::Framing { .. }));
    }

    #[test]
    fn encode_into_round_trips_through_decode_one() {
        let fragment = Fragment::new(99, 3, 2, &b"hello"[..]);
        let mut buf = Vec::new();
        encode_into(&mut buf, &fragment);
        let (decoded, next_offset) = decode_one(&buf, 0).unwrap().unwrap();
        assert_eq!(decoded, fragment);
        assert_eq!(next_offset, buf.len());
    }
}
