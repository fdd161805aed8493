//! # Stream table (RFC 9000 Sections 2, 3)
//!
//! Per-stream send/receive halves and the connection-wide stream table the
//! decoders mutate. Only the state the frame layer touches is modeled here;
//! buffering and application read/write live with the queues.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use crate::types::{StreamId, STREAM_TYPE_SERVER_BIT, STREAM_TYPE_UNI_BIT};
use std::collections::BTreeMap;

/// Send-side stream states (RFC 9000 Section 3.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamSendState {
    #[default]
    Ready,
    Send,
    DataSent,
    DataRecvd,
    ResetSent,
    ResetRecvd,
}

/// Receive-side stream states (RFC 9000 Section 3.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamRecvState {
    #[default]
    Recv,
    SizeKnown,
    DataRecvd,
    DataRead,
    ResetRecvd,
}

/// Sending half of a stream.
#[derive(Debug, Clone, Default)]
pub struct SendHalf {
    /// Next byte offset to transmit; advanced by the STREAM encoder.
    pub offset: u64,

    /// Stream-level send limit granted by the peer.
    pub max_bytes: u64,

    /// Whether sending is blocked on `max_bytes`.
    pub data_blocked: bool,

    pub state: StreamSendState,
}

/// Receiving half of a stream.
#[derive(Debug, Clone, Default)]
pub struct RecvHalf {
    /// Stream-level receive limit advertised to the peer.
    pub max_bytes: u64,

    /// Bytes consumed from the stream receive window so far.
    pub bytes: u64,

    /// Receive window size used when extending the limit.
    pub window: u64,

    pub state: StreamRecvState,
}

/// One stream's frame-layer state.
#[derive(Debug, Clone)]
pub struct Stream {
    pub id: StreamId,
    pub send: SendHalf,
    pub recv: RecvHalf,
}

impl Stream {
    fn new(id: StreamId, defaults: &StreamDefaults) -> Self {
        Self {
            id,
            send: SendHalf {
                max_bytes: defaults.send_max_bytes,
                ..SendHalf::default()
            },
            recv: RecvHalf {
                max_bytes: defaults.recv_window,
                window: defaults.recv_window,
                ..RecvHalf::default()
            },
        }
    }
}

/// Initial limits applied to streams created on frame receipt.
#[derive(Debug, Clone, Copy)]
pub struct StreamDefaults {
    pub send_max_bytes: u64,
    pub recv_window: u64,
}

impl Default for StreamDefaults {
    fn default() -> Self {
        Self {
            send_max_bytes: 64 * 1024,
            recv_window: 64 * 1024,
        }
    }
}

/// Send-direction limits shared across streams.
#[derive(Debug, Clone, Default)]
pub struct SendSide {
    /// Stream count limits granted by the peer via MAX_STREAMS.
    pub max_streams_uni: u64,
    pub max_streams_bidi: u64,

    /// Remaining creatable budget, refreshed together with the limits.
    pub streams_uni: u64,
    pub streams_bidi: u64,

    /// Highest stream id the current limits allow this endpoint to open.
    pub max_stream_id_uni: u64,
    pub max_stream_id_bidi: u64,

    /// Stream currently holding the send path; RESET_STREAM releases it so
    /// another stream may take over.
    pub stream_active: Option<StreamId>,
}

/// Receive-direction limits shared across streams.
#[derive(Debug, Clone, Default)]
pub struct RecvSide {
    /// Stream count limits we advertise; raised when answering
    /// STREAMS_BLOCKED.
    pub max_streams_uni: u64,
    pub max_streams_bidi: u64,
}

/// All streams of one connection.
#[derive(Debug, Default)]
pub struct StreamTable {
    streams: BTreeMap<u64, Stream>,
    defaults: StreamDefaults,
    pub send: SendSide,
    pub recv: RecvSide,
}

impl StreamTable {
    pub fn new(defaults: StreamDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Look up an existing stream.
    pub fn find(&mut self, id: StreamId) -> Option<&mut Stream> {
        self.streams.get_mut(&id.value())
    }

    /// Insert a locally created stream (the open/sendmsg path).
    pub fn insert(&mut self, stream: Stream) -> &mut Stream {
        self.streams.entry(stream.id.value()).or_insert(stream)
    }

    /// Stream to receive on, creating it when the peer legitimately opened
    /// a new one with this frame.
    pub fn recv_get(&mut self, id: StreamId, is_server: bool) -> Result<&mut Stream> {
        self.get_or_create(id, is_server)
    }

    /// Stream to act on the sending half of, with the same creation rules;
    /// a peer's STOP_SENDING may reference a bidirectional stream it just
    /// opened.
    pub fn send_get(&mut self, id: StreamId, is_server: bool) -> Result<&mut Stream> {
        self.get_or_create(id, is_server)
    }

    fn get_or_create(&mut self, id: StreamId, is_server: bool) -> Result<&mut Stream> {
        if self.streams.contains_key(&id.value()) {
            return Ok(self.streams.get_mut(&id.value()).ok_or(Error::Invalid)?);
        }

        // Only the peer can bring a stream into existence on receive.
        if id.is_server_initiated() == is_server {
            return Err(Error::Invalid);
        }
        let limit = if id.is_unidirectional() {
            self.recv.max_streams_uni
        } else {
            self.recv.max_streams_bidi
        };
        if id.ordinal() > limit {
            return Err(Error::Invalid);
        }

        let stream = Stream::new(id, &self.defaults);
        Ok(self.streams.entry(id.value()).or_insert(stream))
    }

    /// Number of streams currently tracked.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Compose the highest openable stream id from a MAX_STREAMS count.
///
/// The two low bits carry direction and initiator, so a count of `max`
/// streams tops out at id `((max - 1) << 2)` plus the type bits.
pub fn max_stream_id(max_streams: u64, uni: bool, is_server: bool) -> u64 {
    let mut id = max_streams.saturating_sub(1) << 2;
    if uni {
        id |= STREAM_TYPE_UNI_BIT;
    }
    if is_server {
        id |= STREAM_TYPE_SERVER_BIT;
    }
    id
}
