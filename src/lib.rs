//! # quic-frames: QUIC frame codec and frame-driven control core
//!
//! The frame layer of a QUIC transport (RFC 9000 Sections 12-19): encoding
//! outbound frames to wire bytes, parsing inbound frames, and applying the
//! per-frame side effects that drive connection, stream, flow-control,
//! path-validation, and connection-ID state machines.
//!
//! Packet protection, congestion control, loss detection, socket I/O, and
//! the TLS handshake are collaborators reached through the narrow surfaces
//! in [`pnmap`], [`queue`], and [`socket`]; this crate never performs I/O
//! and never blocks.
//!
//! ## Architecture
//!
//! ```text
//! quic-frames/
//! ├── error    - Invalid / NoMemory / Unsupported boundary errors
//! ├── types    - VarInt codec, stream and connection IDs, tokens, time
//! ├── buf      - FrameBuf: encoded bytes plus send-side metadata
//! ├── frames   - dispatch table, encoders, decoders, processing loop
//! ├── pnmap    - packet number map surface (ACK generation)
//! ├── queue    - outbound / inbound queue surfaces
//! ├── stream   - stream table and per-stream send/recv halves
//! ├── cid      - dense connection ID sets (source and dest)
//! ├── path     - path validation probes and address slots
//! ├── socket   - socket control surface (state, errors, wake-ups)
//! └── rand     - injectable entropy capability
//! ```
//!
//! ## Usage
//!
//! On send, build a frame from a typed payload; the returned [`FrameBuf`]
//! carries the metadata packet protection needs:
//!
//! ```rust,ignore
//! use quic_frames::frames::{frame_create, FramePayload};
//!
//! let frame = frame_create(&mut ctx, &FramePayload::Ping)?;
//! assert_eq!(frame.as_bytes(), &[0x01]);
//! ```
//!
//! On receive, walk a decrypted packet payload; per-packet flags accumulate
//! for the ACK scheduler:
//!
//! ```rust,ignore
//! use quic_frames::frames::{process_frames, PacketInfo};
//!
//! let mut pki = PacketInfo::default();
//! process_frames(&mut ctx, payload, &mut pki)?;
//! if pki.ack_eliciting {
//!     // schedule an ACK
//! }
//! ```
//!
//! Everything one frame operation may touch is bundled in
//! [`frames::FrameContext`], borrowed for the duration of the call under
//! the connection's lock. Decoders run in wire order within a packet, so a
//! later frame observes the side effects of an earlier one.

#![forbid(unsafe_code)]

pub mod buf;
pub mod cid;
pub mod error;
pub mod frames;
pub mod path;
pub mod pnmap;
pub mod queue;
pub mod rand;
pub mod socket;
pub mod stream;
pub mod types;

pub use buf::{FrameBuf, FrameMeta};
pub use error::{Error, Result};
pub use frames::{
    frame_create, process_frames, FrameConfig, FrameContext, FramePayload, PacketInfo,
};
pub use types::{ConnectionId, Instant, StreamId, Token, VarInt, VarIntCodec, VARINT_MAX};
