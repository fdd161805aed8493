//! # Outbound frame buffer
//!
//! A [`FrameBuf`] owns the encoded bytes of exactly one frame together with
//! the send-side metadata that packet protection and the retransmission
//! queue read later. Control frames fit the inline scratch; STREAM and
//! CRYPTO payloads spill to the heap.

#![forbid(unsafe_code)]

use crate::types::{StreamId, VarIntCodec};
use tinyvec::TinyVec;

/// Inline capacity before a frame spills to a heap allocation. Every
/// fixed-size control frame this core emits fits here.
const INLINE_FRAME_CAP: usize = 64;

/// Send-side book-keeping carried alongside the encoded bytes.
///
/// `frame_type` is stamped by [`frame_create`](crate::frames::frame_create)
/// unless the encoder already refined it (STREAM stores the type byte with
/// its OFF/LEN/FIN bits, CONNECTION_CLOSE keeps the 0x1c/0x1d distinction).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameMeta {
    /// Wire type byte, including STREAM subflag bits where applicable.
    pub frame_type: u8,

    /// Stream this frame belongs to, for STREAM and RESET_STREAM.
    pub stream_id: Option<StreamId>,

    /// Stream offset of the first payload byte (STREAM with OFF).
    pub stream_offset: u64,

    /// Number of application payload bytes carried (STREAM).
    pub data_bytes: u32,

    /// Error code carried by the frame (RESET_STREAM).
    pub err_code: u64,
}

/// One encoded outbound frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuf {
    data: TinyVec<[u8; INLINE_FRAME_CAP]>,
    /// Send metadata consumed by packet protection and retransmission.
    pub meta: FrameMeta,
}

impl FrameBuf {
    /// Empty buffer with zeroed metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty buffer that reserves room for `len` bytes up front.
    pub fn with_capacity(len: usize) -> Self {
        let mut data = TinyVec::new();
        if len > INLINE_FRAME_CAP {
            data.reserve(len);
        }
        Self {
            data,
            meta: FrameMeta::default(),
        }
    }

    /// Append a single byte.
    pub fn put_u8(&mut self, byte: u8) -> &mut Self {
        self.data.push(byte);
        self
    }

    /// Append `value` as a shortest-form VarInt.
    ///
    /// Values above `VARINT_MAX` cannot be produced by this core; they are
    /// clamped by the callers' own u62 domains.
    pub fn put_var(&mut self, value: u64) -> &mut Self {
        let mut scratch = [0u8; 8];
        if let Some(len) = VarIntCodec::encode(value, &mut scratch) {
            self.data.extend_from_slice(&scratch[..len]);
        }
        self
    }

    /// Append raw bytes.
    pub fn put_slice(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Append `count` zero bytes.
    pub fn put_zeroes(&mut self, count: usize) -> &mut Self {
        self.data.resize(self.data.len() + count, 0);
        self
    }

    /// Encoded wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
