//! # QUIC frame layer (RFC 9000 Sections 12.4, 19)
//!
//! Serializes outbound frames, parses inbound ones, and applies the
//! per-frame side effects that drive connection, stream, flow-control,
//! path-validation, and connection-ID state.
//!
//! The entry points mirror the two directions of the wire:
//! - [`frame_create`] builds one encoded [`FrameBuf`] from a typed
//!   [`FramePayload`], committing encoder side effects (stream offset
//!   advance, CID set changes) before returning.
//! - [`process_frames`] walks a decrypted packet payload frame by frame,
//!   dispatching on the type byte and accumulating per-packet flags into a
//!   [`PacketInfo`] for the ACK scheduler.
//!
//! Dispatch runs through a fixed table indexed by the type byte; the
//! STREAM family (0x08-0x0f) shares one entry and handles its OFF/LEN/FIN
//! bits internally.

#![forbid(unsafe_code)]

mod decode;
mod encode;

use crate::buf::FrameBuf;
use crate::cid::ConnectionIdSet;
use crate::error::{Error, Result};
use crate::path::{PathPair, PathSide};
use crate::pnmap::PacketNumberMap;
use crate::queue::{InboundQueue, OutboundQueue};
use crate::rand::EntropySource;
use crate::socket::SocketCtl;
use crate::stream::StreamTable;
use crate::types::{Instant, StreamId, Token, PATH_ENTROPY_LEN};
use bytes::Bytes;
use std::sync::Once;
use tracing::{debug, warn};

// ============================================================================
// Frame type constants (RFC 9000 Section 19)
// ============================================================================

pub const FRAME_TYPE_PADDING: u8 = 0x00;
pub const FRAME_TYPE_PING: u8 = 0x01;
pub const FRAME_TYPE_ACK: u8 = 0x02;
pub const FRAME_TYPE_ACK_ECN: u8 = 0x03;
pub const FRAME_TYPE_RESET_STREAM: u8 = 0x04;
pub const FRAME_TYPE_STOP_SENDING: u8 = 0x05;
pub const FRAME_TYPE_CRYPTO: u8 = 0x06;
pub const FRAME_TYPE_NEW_TOKEN: u8 = 0x07;
pub const FRAME_TYPE_STREAM_BASE: u8 = 0x08; // 0x08-0x0f
pub const FRAME_TYPE_MAX_DATA: u8 = 0x10;
pub const FRAME_TYPE_MAX_STREAM_DATA: u8 = 0x11;
pub const FRAME_TYPE_MAX_STREAMS_BIDI: u8 = 0x12;
pub const FRAME_TYPE_MAX_STREAMS_UNI: u8 = 0x13;
pub const FRAME_TYPE_DATA_BLOCKED: u8 = 0x14;
pub const FRAME_TYPE_STREAM_DATA_BLOCKED: u8 = 0x15;
pub const FRAME_TYPE_STREAMS_BLOCKED_BIDI: u8 = 0x16;
pub const FRAME_TYPE_STREAMS_BLOCKED_UNI: u8 = 0x17;
pub const FRAME_TYPE_NEW_CONNECTION_ID: u8 = 0x18;
pub const FRAME_TYPE_RETIRE_CONNECTION_ID: u8 = 0x19;
pub const FRAME_TYPE_PATH_CHALLENGE: u8 = 0x1a;
pub const FRAME_TYPE_PATH_RESPONSE: u8 = 0x1b;
pub const FRAME_TYPE_CONNECTION_CLOSE: u8 = 0x1c;
pub const FRAME_TYPE_CONNECTION_CLOSE_APP: u8 = 0x1d;
pub const FRAME_TYPE_HANDSHAKE_DONE: u8 = 0x1e;

/// Highest frame type byte this core understands.
pub const FRAME_TYPE_MAX: u8 = FRAME_TYPE_HANDSHAKE_DONE;

/// STREAM type-byte subflags (RFC 9000 Section 19.8).
pub const STREAM_FRAME_BIT_FIN: u8 = 0x01;
pub const STREAM_FRAME_BIT_LEN: u8 = 0x02;
pub const STREAM_FRAME_BIT_OFF: u8 = 0x04;

/// True for the STREAM family 0x08-0x0f.
pub fn is_stream(frame_type: u8) -> bool {
    (FRAME_TYPE_STREAM_BASE..=FRAME_TYPE_STREAM_BASE | 0x07).contains(&frame_type)
}

// ============================================================================
// Frame classification (RFC 9000 Sections 9.2, 13.2)
// ============================================================================

/// Frames whose receipt mandates that the peer eventually emit an ACK:
/// everything except PADDING, ACK, and CONNECTION_CLOSE.
pub fn ack_eliciting(frame_type: u8) -> bool {
    !matches!(
        frame_type,
        FRAME_TYPE_PADDING
            | FRAME_TYPE_ACK
            | FRAME_TYPE_ACK_ECN
            | FRAME_TYPE_CONNECTION_CLOSE
            | FRAME_TYPE_CONNECTION_CLOSE_APP
    )
}

/// Frames that should accelerate the delayed-ACK timer: application data
/// and the control frames that gate it.
pub fn ack_immediate(frame_type: u8) -> bool {
    is_stream(frame_type)
        || matches!(
            frame_type,
            FRAME_TYPE_RESET_STREAM
                | FRAME_TYPE_STOP_SENDING
                | FRAME_TYPE_CRYPTO
                | FRAME_TYPE_HANDSHAKE_DONE
        )
}

/// Frames that, received from a new address, confirm the peer actually
/// moved there: everything except PATH_CHALLENGE, PATH_RESPONSE,
/// NEW_CONNECTION_ID, and PADDING.
pub fn non_probing(frame_type: u8) -> bool {
    !matches!(
        frame_type,
        FRAME_TYPE_PATH_CHALLENGE
            | FRAME_TYPE_PATH_RESPONSE
            | FRAME_TYPE_NEW_CONNECTION_ID
            | FRAME_TYPE_PADDING
    )
}

// ============================================================================
// Per-packet accumulator
// ============================================================================

/// Flags accumulated over one received packet's frames; the ACK scheduler
/// and path validation read them after [`process_frames`] returns.
///
/// All flags start false and are only ever set during the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketInfo {
    pub ack_eliciting: bool,
    pub ack_immediate: bool,
    pub non_probing: bool,
}

// ============================================================================
// Configuration
// ============================================================================

/// Tunables for the frame layer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Upper bound on the ACK Range Count accepted in a received ACK frame.
    /// Emission is separately bounded by
    /// [`MAX_GAP_BLOCKS`](crate::pnmap::MAX_GAP_BLOCKS).
    pub max_ack_ranges: u64,

    /// Longest accepted CONNECTION_CLOSE reason phrase, NUL included.
    pub max_close_phrase: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_ack_ranges: 16,
            max_close_phrase: 80,
        }
    }
}

// ============================================================================
// Typed encode requests
// ============================================================================

/// What to encode. One variant per frame kind this core emits; the wire
/// type byte is derived from the variant, so callers cannot mismatch the
/// two.
///
/// Variants carry only what the connection state does not already hold:
/// encoders read the rest (flow-control limits, close parameters, stream
/// offsets) from the [`FrameContext`] at encode time.
#[derive(Debug, Clone)]
pub enum FramePayload {
    /// Emit `len` padding bytes after the type byte.
    Padding { len: usize },
    Ping,
    /// ACK built from the packet number map's current state.
    Ack,
    ResetStream { id: StreamId, errcode: u64 },
    StopSending { id: StreamId, errcode: u64 },
    /// Session-ticket CRYPTO; this core only ever emits offset zero.
    Crypto { data: Bytes },
    NewToken { data: Bytes },
    Stream { id: StreamId, data: Bytes, fin: bool },
    MaxData,
    MaxStreamData { id: StreamId },
    MaxStreamsBidi { max: u64 },
    MaxStreamsUni { max: u64 },
    DataBlocked,
    StreamDataBlocked { id: StreamId },
    /// Carries the blocked stream-id-style limit; the encoder converts it
    /// to a stream count on the wire.
    StreamsBlockedBidi { limit: u64 },
    StreamsBlockedUni { limit: u64 },
    /// Issue the next source CID; `prior` is the Retire Prior To field.
    NewConnectionId { prior: u64 },
    RetireConnectionId { seqno: u64 },
    /// Probe the given path with fresh entropy.
    PathChallenge { side: PathSide },
    /// Echo of a received challenge.
    PathResponse { entropy: [u8; PATH_ENTROPY_LEN] },
    ConnectionClose { application: bool },
    HandshakeDone,
}

impl FramePayload {
    /// Base wire type byte for this payload. STREAM reports the base type;
    /// the encoder sets the OFF/LEN/FIN bits.
    pub fn frame_type(&self) -> u8 {
        match self {
            FramePayload::Padding { .. } => FRAME_TYPE_PADDING,
            FramePayload::Ping => FRAME_TYPE_PING,
            FramePayload::Ack => FRAME_TYPE_ACK,
            FramePayload::ResetStream { .. } => FRAME_TYPE_RESET_STREAM,
            FramePayload::StopSending { .. } => FRAME_TYPE_STOP_SENDING,
            FramePayload::Crypto { .. } => FRAME_TYPE_CRYPTO,
            FramePayload::NewToken { .. } => FRAME_TYPE_NEW_TOKEN,
            FramePayload::Stream { .. } => FRAME_TYPE_STREAM_BASE,
            FramePayload::MaxData => FRAME_TYPE_MAX_DATA,
            FramePayload::MaxStreamData { .. } => FRAME_TYPE_MAX_STREAM_DATA,
            FramePayload::MaxStreamsBidi { .. } => FRAME_TYPE_MAX_STREAMS_BIDI,
            FramePayload::MaxStreamsUni { .. } => FRAME_TYPE_MAX_STREAMS_UNI,
            FramePayload::DataBlocked => FRAME_TYPE_DATA_BLOCKED,
            FramePayload::StreamDataBlocked { .. } => FRAME_TYPE_STREAM_DATA_BLOCKED,
            FramePayload::StreamsBlockedBidi { .. } => FRAME_TYPE_STREAMS_BLOCKED_BIDI,
            FramePayload::StreamsBlockedUni { .. } => FRAME_TYPE_STREAMS_BLOCKED_UNI,
            FramePayload::NewConnectionId { .. } => FRAME_TYPE_NEW_CONNECTION_ID,
            FramePayload::RetireConnectionId { .. } => FRAME_TYPE_RETIRE_CONNECTION_ID,
            FramePayload::PathChallenge { .. } => FRAME_TYPE_PATH_CHALLENGE,
            FramePayload::PathResponse { .. } => FRAME_TYPE_PATH_RESPONSE,
            FramePayload::ConnectionClose { application: false } => FRAME_TYPE_CONNECTION_CLOSE,
            FramePayload::ConnectionClose { application: true } => FRAME_TYPE_CONNECTION_CLOSE_APP,
            FramePayload::HandshakeDone => FRAME_TYPE_HANDSHAKE_DONE,
        }
    }
}

// ============================================================================
// Frame context
// ============================================================================

/// Everything one frame operation may touch, borrowed for the duration of
/// the call.
///
/// All of it is owned by a single connection and mutated only under that
/// connection's lock; no frame operation suspends or blocks on I/O. The
/// entropy source must be callable with the lock held.
pub struct FrameContext<'a> {
    /// Received packet number map (read-only; ACK encoding).
    pub pn_map: &'a dyn PacketNumberMap,

    /// Outbound queue: retransmission release, control frame emission,
    /// connection-level send limit, close parameters.
    pub outq: &'a mut dyn OutboundQueue,

    /// Inbound queue: reassembly handoff and the connection receive window.
    pub inq: &'a mut dyn InboundQueue,

    pub streams: &'a mut StreamTable,

    /// Connection IDs we issued.
    pub source: &'a mut ConnectionIdSet,

    /// Connection IDs the peer issued.
    pub dest: &'a mut ConnectionIdSet,

    pub paths: &'a mut PathPair,

    pub socket: &'a mut dyn SocketCtl,

    pub entropy: &'a mut dyn EntropySource,

    /// Stored TLS session ticket (CRYPTO receipt replaces it).
    pub ticket: &'a mut Token,

    /// Stored address-validation token (NEW_TOKEN receipt replaces it).
    pub token: &'a mut Token,

    pub config: &'a FrameConfig,

    /// Whether this endpoint is the server side of the connection.
    pub is_server: bool,

    /// Current time, stamped by packet dispatch; used for ACK Delay.
    pub now: Instant,

    /// Largest frame the current packet can carry.
    pub max_payload: usize,
}

// ============================================================================
// Dispatch table
// ============================================================================

type CreateFn = fn(&mut FrameContext<'_>, &FramePayload, u8) -> Result<FrameBuf>;
type ProcessFn = fn(&mut FrameContext<'_>, &[u8], u8) -> Result<usize>;

struct FrameOps {
    create: CreateFn,
    process: ProcessFn,
}

macro_rules! frame_ops {
    ($name:ident) => {
        FrameOps {
            create: encode::$name,
            process: decode::$name,
        }
    };
}

static FRAME_OPS: [FrameOps; FRAME_TYPE_MAX as usize + 1] = [
    frame_ops!(padding), // 0x00
    frame_ops!(ping),
    frame_ops!(ack),
    frame_ops!(ack), // ack_ecn
    frame_ops!(reset_stream),
    frame_ops!(stop_sending),
    frame_ops!(crypto),
    frame_ops!(new_token),
    frame_ops!(stream), // 0x08-0x0f all dispatch here
    frame_ops!(stream),
    frame_ops!(stream),
    frame_ops!(stream),
    frame_ops!(stream),
    frame_ops!(stream),
    frame_ops!(stream),
    frame_ops!(stream),
    frame_ops!(max_data), // 0x10
    frame_ops!(max_stream_data),
    frame_ops!(max_streams_bidi),
    frame_ops!(max_streams_uni),
    frame_ops!(data_blocked),
    frame_ops!(stream_data_blocked),
    frame_ops!(streams_blocked_bidi),
    frame_ops!(streams_blocked_uni),
    frame_ops!(new_connection_id),
    frame_ops!(retire_connection_id),
    frame_ops!(path_challenge),
    frame_ops!(path_response),
    frame_ops!(connection_close),
    frame_ops!(connection_close), // application form
    frame_ops!(handshake_done),
];

// ============================================================================
// Entry points
// ============================================================================

/// Encode one frame.
///
/// Encoder side effects (stream send offset advance, CID set append or
/// remove, path entropy refresh) commit before the buffer is returned; on
/// error nothing usable was produced and the caller must not retry with
/// the same inputs blindly.
pub fn frame_create(ctx: &mut FrameContext<'_>, payload: &FramePayload) -> Result<FrameBuf> {
    let frame_type = payload.frame_type();
    debug!(frame_type, "frame create");
    let mut frame = (FRAME_OPS[frame_type as usize].create)(ctx, payload, frame_type)
        .map_err(|err| {
            warn!(frame_type, %err, "frame create failed");
            err
        })?;
    if frame.meta.frame_type == 0 {
        frame.meta.frame_type = frame_type;
    }
    Ok(frame)
}

static UNSUPPORTED_ONCE: Once = Once::new();

/// Walk all frames in a decrypted packet payload.
///
/// Frames are processed in wire order, so side effects of earlier frames
/// are visible to later ones within the same packet. On the first error
/// the packet is abandoned; decoders never advance the cursor past a
/// malformed frame. An empty payload is itself a protocol violation.
pub fn process_frames(
    ctx: &mut FrameContext<'_>,
    payload: &[u8],
    pki: &mut PacketInfo,
) -> Result<()> {
    if payload.is_empty() {
        return Err(Error::Invalid);
    }

    let mut buf = payload;
    while !buf.is_empty() {
        let frame_type = buf[0];
        buf = &buf[1..];

        if frame_type > FRAME_TYPE_MAX {
            UNSUPPORTED_ONCE.call_once(|| warn!(frame_type, "unsupported frame type"));
            return Err(Error::Unsupported(frame_type));
        }
        debug!(frame_type, "frame process");

        let consumed =
            (FRAME_OPS[frame_type as usize].process)(ctx, buf, frame_type).map_err(|err| {
                warn!(frame_type, %err, "frame process failed");
                err
            })?;

        if ack_eliciting(frame_type) {
            pki.ack_eliciting = true;
            if ack_immediate(frame_type) {
                pki.ack_immediate = true;
            }
        }
        if non_probing(frame_type) {
            pki.non_probing = true;
        }

        buf = buf.get(consumed..).ok_or(Error::Invalid)?;
    }
    Ok(())
}
