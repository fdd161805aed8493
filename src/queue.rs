//! # Queue surfaces
//!
//! The outbound queue owns transmission, retransmission, and connection
//! close state; the inbound queue owns reassembly and the connection-level
//! receive window. The frame layer drives both through the narrow traits
//! below, and tests substitute recording doubles.

use crate::buf::FrameBuf;
use crate::error::Result;
use crate::types::StreamId;
use bytes::Bytes;

/// Pending CONNECTION_CLOSE parameters, owned by the outbound queue.
#[derive(Debug, Clone, Default)]
pub struct CloseInfo {
    /// Error code to report.
    pub errcode: u64,

    /// Frame type that triggered the close; serialized only in the
    /// transport-level form (0x1c).
    pub frame_type: u64,

    /// Optional human-readable reason. Serialized with a trailing NUL.
    pub phrase: Option<String>,
}

/// Outbound queue as seen from the frame layer.
pub trait OutboundQueue {
    /// Local `ack_delay_exponent` transport parameter.
    fn ack_delay_exponent(&self) -> u8;

    /// Close parameters for CONNECTION_CLOSE encoding.
    fn close_info(&self) -> &CloseInfo;

    /// Connection-level send limit granted by the peer.
    fn max_bytes(&self) -> u64;
    fn set_max_bytes(&mut self, max_bytes: u64);

    /// Whether sending is currently blocked on the connection limit.
    fn data_blocked(&self) -> bool;
    fn set_data_blocked(&mut self, blocked: bool);

    /// Release packets acknowledged by the range `[smallest, largest]` and,
    /// when `ack_pn` is the largest newly acknowledged number, seed RTT with
    /// `ack_delay` (already scaled to microseconds by the caller's
    /// exponent).
    fn retransmit_check(&mut self, largest: u64, smallest: u64, ack_pn: u64, ack_delay: u64);

    /// Append a control frame for transmission, preserving FIFO order.
    /// `urgent` requests front-of-line scheduling relative to stream data.
    ///
    /// Refusal (queue at capacity, connection torn down) is the soft
    /// failure point of the frame layer and surfaces as
    /// [`Error::NoMemory`](crate::error::Error::NoMemory).
    fn ctrl_tail(&mut self, frame: FrameBuf, urgent: bool) -> Result<()>;
}

/// A received run of stream payload handed to reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSegment {
    pub stream_id: StreamId,

    /// Stream offset of the first byte in `data`.
    pub offset: u64,

    /// FIN bit from the frame's type byte.
    pub fin: bool,

    /// Payload, cloned out of the packet buffer.
    pub data: Bytes,
}

/// Inbound queue as seen from the frame layer.
pub trait InboundQueue {
    /// Connection-level receive limit advertised to the peer.
    fn max_bytes(&self) -> u64;
    fn set_max_bytes(&mut self, max_bytes: u64);

    /// Bytes consumed from the connection receive window so far.
    fn bytes(&self) -> u64;

    /// Receive window size used when extending the limit.
    fn window(&self) -> u64;

    /// Queue a stream segment for reassembly.
    fn reasm_tail(&mut self, segment: StreamSegment) -> Result<()>;
}
