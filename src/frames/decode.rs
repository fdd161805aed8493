//! # Frame decoders (RFC 9000 Section 19)
//!
//! One decoder per frame kind, reached through the dispatch table in the
//! parent module. Each decoder consumes exactly its frame's wire bytes
//! (the type byte is already stripped), validates, applies side effects to
//! the connection state, and returns the byte count so the processing loop
//! can locate the next frame. Reciprocal frames (PATH_RESPONSE, MAX_*,
//! RESET_STREAM, RETIRE/NEW_CONNECTION_ID) are enqueued through the
//! outbound queue from inside the decoder, preserving FIFO order.

use super::{
    frame_create, FrameContext, FramePayload, FRAME_TYPE_ACK_ECN, FRAME_TYPE_CONNECTION_CLOSE,
    STREAM_FRAME_BIT_FIN, STREAM_FRAME_BIT_LEN, STREAM_FRAME_BIT_OFF,
};
use crate::cid::ConnectionIdEntry;
use crate::error::{Error, Result};
use crate::queue::StreamSegment;
use crate::socket::{ConnState, SockError};
use crate::stream::{max_stream_id, StreamRecvState, StreamSendState};
use crate::types::{ConnectionId, StreamId, VarIntCodec, MAX_CID_LENGTH, PATH_ENTROPY_LEN};
use bytes::Bytes;
use tracing::debug;

/// Bounds-checked reader over one frame's bytes. Never advances past the
/// end; every read failure is the caller's `Invalid`.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn get_var(&mut self) -> Result<u64> {
        let (value, len) = VarIntCodec::decode(&self.buf[self.pos..]).ok_or(Error::Invalid)?;
        self.pos += len;
        Ok(value)
    }

    fn get_bytes(&mut self, len: u64) -> Result<&'a [u8]> {
        if len > self.remaining() as u64 {
            return Err(Error::Invalid);
        }
        let len = len as usize;
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }
}

/// PADDING collapses: one decoder call swallows the rest of the payload.
pub(super) fn padding(
    _ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    Ok(buf.len())
}

pub(super) fn ping(_ctx: &mut FrameContext<'_>, _buf: &[u8], _frame_type: u8) -> Result<usize> {
    Ok(0) // no content
}

pub(super) fn handshake_done(
    _ctx: &mut FrameContext<'_>,
    _buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    Ok(0) // no content
}

/// ACK: release acknowledged ranges through the outbound queue, largest
/// range first. Only the first call carries the largest-acknowledged
/// packet number and the peer's delay, which seed the RTT estimator.
pub(super) fn ack(ctx: &mut FrameContext<'_>, buf: &[u8], frame_type: u8) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let mut largest = cur.get_var()?;
    let delay = cur.get_var()?;
    let count = cur.get_var()?;
    if count > ctx.config.max_ack_ranges {
        return Err(Error::Invalid);
    }
    let range = cur.get_var()?;

    let mut smallest = largest.checked_sub(range).ok_or(Error::Invalid)?;
    ctx.outq.retransmit_check(largest, smallest, largest, delay);

    for _ in 0..count {
        let gap = cur.get_var()?;
        let range = cur.get_var()?;
        largest = smallest
            .checked_sub(gap)
            .and_then(|pn| pn.checked_sub(2))
            .ok_or(Error::Invalid)?;
        smallest = largest.checked_sub(range).ok_or(Error::Invalid)?;
        ctx.outq.retransmit_check(largest, smallest, 0, 0);
    }

    if frame_type == FRAME_TYPE_ACK_ECN {
        // TODO: feed these into congestion control once it tracks ECN.
        let ect0 = cur.get_var()?;
        let ect1 = cur.get_var()?;
        let ce = cur.get_var()?;
        debug!(ect0, ect1, ce, "discarding ECN counts");
    }

    Ok(cur.pos())
}

/// STREAM: parse the subflagged header, make sure the stream exists (the
/// peer may be opening it with this very frame), and hand a clone of the
/// payload to reassembly.
pub(super) fn stream(ctx: &mut FrameContext<'_>, buf: &[u8], frame_type: u8) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let stream_id = StreamId::new(cur.get_var()?);
    let mut offset = 0;
    if frame_type & STREAM_FRAME_BIT_OFF != 0 {
        offset = cur.get_var()?;
    }
    let payload_len = if frame_type & STREAM_FRAME_BIT_LEN != 0 {
        cur.get_var()?
    } else {
        cur.remaining() as u64
    };

    ctx.streams.recv_get(stream_id, ctx.is_server)?;

    let data = cur.get_bytes(payload_len)?;
    ctx.inq.reasm_tail(StreamSegment {
        stream_id,
        offset,
        fin: frame_type & STREAM_FRAME_BIT_FIN != 0,
        data: Bytes::copy_from_slice(data),
    })?;

    Ok(cur.pos())
}

/// CRYPTO at the application level only carries TLS NewSessionTicket
/// messages (first byte 4) at offset zero; anything else is a violation.
pub(super) fn crypto(ctx: &mut FrameContext<'_>, buf: &[u8], _frame_type: u8) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let offset = cur.get_var()?;
    if offset != 0 {
        return Err(Error::Invalid);
    }
    let length = cur.get_var()?;
    let data = cur.get_bytes(length)?;
    if data.first() != Some(&4) {
        return Err(Error::Invalid);
    }

    ctx.ticket.replace(Bytes::copy_from_slice(data));
    Ok(cur.pos())
}

pub(super) fn new_token(ctx: &mut FrameContext<'_>, buf: &[u8], _frame_type: u8) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let length = cur.get_var()?;
    let data = cur.get_bytes(length)?;

    ctx.token.replace(Bytes::copy_from_slice(data));
    Ok(cur.pos())
}

pub(super) fn reset_stream(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let stream_id = StreamId::new(cur.get_var()?);
    let errcode = cur.get_var()?;
    let final_size = cur.get_var()?;
    debug!(stream_id = stream_id.value(), errcode, final_size, "peer reset stream");

    let stream = ctx.streams.recv_get(stream_id, ctx.is_server)?;
    stream.recv.state = StreamRecvState::ResetRecvd;

    Ok(cur.pos())
}

/// STOP_SENDING asks us to abandon our sending half: answer with
/// RESET_STREAM carrying the same error code.
pub(super) fn stop_sending(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let stream_id = StreamId::new(cur.get_var()?);
    let errcode = cur.get_var()?;

    ctx.streams.send_get(stream_id, ctx.is_server)?;

    let frame = frame_create(
        ctx,
        &FramePayload::ResetStream {
            id: stream_id,
            errcode,
        },
    )?;
    if let Some(stream) = ctx.streams.find(stream_id) {
        stream.send.state = StreamSendState::ResetSent;
    }
    ctx.outq.ctrl_tail(frame, true)?;

    Ok(cur.pos())
}

/// MAX_DATA raises the connection send limit; decreases are ignored.
pub(super) fn max_data(ctx: &mut FrameContext<'_>, buf: &[u8], _frame_type: u8) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let max_bytes = cur.get_var()?;
    if max_bytes >= ctx.outq.max_bytes() {
        ctx.outq.set_max_bytes(max_bytes);
        ctx.outq.set_data_blocked(false);
    }

    Ok(cur.pos())
}

pub(super) fn max_stream_data(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let stream_id = StreamId::new(cur.get_var()?);
    let max_bytes = cur.get_var()?;

    let stream = ctx.streams.find(stream_id).ok_or(Error::Invalid)?;
    if max_bytes >= stream.send.max_bytes {
        stream.send.max_bytes = max_bytes;
        stream.send.data_blocked = false;
    }

    Ok(cur.pos())
}

pub(super) fn max_streams_bidi(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let max = cur.get_var()?;
    if max >= ctx.streams.send.max_streams_bidi {
        ctx.streams.send.max_streams_bidi = max;
        ctx.streams.send.streams_bidi = max;
        if max > 0 {
            ctx.streams.send.max_stream_id_bidi = max_stream_id(max, false, ctx.is_server);
        }
        ctx.socket.write_space();
    }

    Ok(cur.pos())
}

pub(super) fn max_streams_uni(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let max = cur.get_var()?;
    if max >= ctx.streams.send.max_streams_uni {
        ctx.streams.send.max_streams_uni = max;
        ctx.streams.send.streams_uni = max;
        if max > 0 {
            ctx.streams.send.max_stream_id_uni = max_stream_id(max, true, ctx.is_server);
        }
        ctx.socket.write_space();
    }

    Ok(cur.pos())
}

/// The peer is blocked on our connection window: extend it and answer
/// with MAX_DATA. The window advance is rolled back if the answer cannot
/// be queued.
pub(super) fn data_blocked(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let peer_limit = cur.get_var()?;
    debug!(peer_limit, "peer blocked on connection data limit");

    let recv_max_bytes = ctx.inq.max_bytes();
    let advanced = ctx.inq.bytes() + ctx.inq.window();
    ctx.inq.set_max_bytes(advanced);

    let queued = frame_create(ctx, &FramePayload::MaxData)
        .and_then(|frame| ctx.outq.ctrl_tail(frame, true));
    if let Err(err) = queued {
        ctx.inq.set_max_bytes(recv_max_bytes);
        return Err(err);
    }

    Ok(cur.pos())
}

/// Per-stream variant of DATA_BLOCKED; only answers when the advance
/// actually moved the limit.
pub(super) fn stream_data_blocked(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let stream_id = StreamId::new(cur.get_var()?);
    let peer_limit = cur.get_var()?;
    debug!(stream_id = stream_id.value(), peer_limit, "peer blocked on stream data limit");

    let (recv_max_bytes, changed) = {
        let stream = ctx.streams.find(stream_id).ok_or(Error::Invalid)?;
        let previous = stream.recv.max_bytes;
        stream.recv.max_bytes = stream.recv.bytes + stream.recv.window;
        (previous, stream.recv.max_bytes != previous)
    };

    if changed {
        let queued = frame_create(ctx, &FramePayload::MaxStreamData { id: stream_id })
            .and_then(|frame| ctx.outq.ctrl_tail(frame, true));
        if let Err(err) = queued {
            if let Some(stream) = ctx.streams.find(stream_id) {
                stream.recv.max_bytes = recv_max_bytes;
            }
            return Err(err);
        }
    }

    Ok(cur.pos())
}

pub(super) fn streams_blocked_bidi(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let max = cur.get_var()?;
    if max >= ctx.streams.recv.max_streams_bidi {
        let frame = frame_create(ctx, &FramePayload::MaxStreamsBidi { max })?;
        ctx.outq.ctrl_tail(frame, true)?;
        ctx.streams.recv.max_streams_bidi = max;
    }

    Ok(cur.pos())
}

pub(super) fn streams_blocked_uni(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let max = cur.get_var()?;
    if max >= ctx.streams.recv.max_streams_uni {
        let frame = frame_create(ctx, &FramePayload::MaxStreamsUni { max })?;
        ctx.outq.ctrl_tail(frame, true)?;
        ctx.streams.recv.max_streams_uni = max;
    }

    Ok(cur.pos())
}

/// NEW_CONNECTION_ID: the sequence number must continue the dense set,
/// and `retire_prior_to` may force retirement of every ID below it, each
/// acknowledged with its own RETIRE_CONNECTION_ID.
pub(super) fn new_connection_id(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let seqno = cur.get_var()?;
    let prior = cur.get_var()?;
    let length = cur.get_var()?;
    if length == 0 || length > MAX_CID_LENGTH as u64 {
        return Err(Error::Invalid);
    }
    if length + 16 > cur.remaining() as u64 {
        return Err(Error::Invalid);
    }

    if seqno != ctx.dest.last_number() + 1 || prior > seqno {
        return Err(Error::Invalid);
    }

    let id = ConnectionId::from_slice(cur.get_bytes(length)?).ok_or(Error::Invalid)?;
    let mut reset_token = [0u8; 16];
    reset_token.copy_from_slice(cur.get_bytes(16)?);

    ctx.dest.append(ConnectionIdEntry {
        seqno,
        id,
        reset_token,
    })?;

    let mut first = ctx.dest.first_number();
    while first < prior {
        // Encoding the retirement also drops the ID from the dest set.
        let frame = frame_create(ctx, &FramePayload::RetireConnectionId { seqno: first })?;
        ctx.outq.ctrl_tail(frame, true)?;
        first += 1;
    }

    Ok(cur.pos())
}

/// RETIRE_CONNECTION_ID: only the oldest ID may be retired, never the
/// last one standing. Issue a replacement unless the set is still at its
/// target population.
pub(super) fn retire_connection_id(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let seqno = cur.get_var()?;
    let last = ctx.source.last_number();
    let first = ctx.source.first_number();
    if seqno != first || seqno == last {
        return Err(Error::Invalid);
    }

    ctx.source.remove(seqno);
    if last - seqno < ctx.source.max_count {
        let frame = frame_create(ctx, &FramePayload::NewConnectionId { prior: seqno + 1 })?;
        ctx.outq.ctrl_tail(frame, true)?;
    }

    Ok(cur.pos())
}

/// PATH_CHALLENGE: echo the entropy back immediately so the peer can
/// finish validating the path.
pub(super) fn path_challenge(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let mut entropy = [0u8; PATH_ENTROPY_LEN];
    entropy.copy_from_slice(cur.get_bytes(PATH_ENTROPY_LEN as u64)?);

    let frame = frame_create(ctx, &FramePayload::PathResponse { entropy })?;
    ctx.outq.ctrl_tail(frame, true)?;

    Ok(cur.pos())
}

/// PATH_RESPONSE: match the entropy against the pending probe on either
/// side. A match completes validation: the losing address slot is torn
/// down and the socket rebinds to the winner.
pub(super) fn path_response(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    _frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let mut entropy = [0u8; PATH_ENTROPY_LEN];
    entropy.copy_from_slice(cur.get_bytes(PATH_ENTROPY_LEN as u64)?);

    // Source address validation: our own migration probe came home.
    let path = &mut ctx.paths.src;
    if path.entropy == entropy && path.pending {
        path.pending = false;
        let inactive = path.inactive();
        ctx.socket.release_udp(inactive);
        path.addr[inactive] = None;
        if let Some(addr) = path.active_addr() {
            ctx.socket.set_addr(addr, true);
        }
    }

    // Destination address validation: the peer moved and proved it.
    let path = &mut ctx.paths.dst;
    if path.entropy == entropy && path.pending {
        path.pending = false;
        path.addr[path.inactive()] = None;
        if let Some(addr) = path.active_addr() {
            ctx.socket.set_addr(addr, false);
        }
    }

    Ok(cur.pos())
}

/// CONNECTION_CLOSE: validate the reason phrase (bounded, NUL-terminated)
/// and move the socket to `UserClosed` so blocked readers fail out with
/// a broken pipe.
pub(super) fn connection_close(
    ctx: &mut FrameContext<'_>,
    buf: &[u8],
    frame_type: u8,
) -> Result<usize> {
    let mut cur = Cursor::new(buf);

    let errcode = cur.get_var()?;
    let mut close_frame_type = 0;
    if frame_type == FRAME_TYPE_CONNECTION_CLOSE {
        close_frame_type = cur.get_var()?;
    }

    let phrase_len = cur.get_var()?;
    let phrase = cur.get_bytes(phrase_len)?;
    if !phrase.is_empty() {
        if phrase.len() > ctx.config.max_close_phrase || phrase[phrase.len() - 1] != 0 {
            return Err(Error::Invalid);
        }
        debug!(
            phrase = %String::from_utf8_lossy(&phrase[..phrase.len() - 1]),
            "close reason"
        );
    }
    debug!(errcode, close_frame_type, "peer closed connection");

    ctx.socket.set_error(SockError::BrokenPipe);
    ctx.socket.set_state(ConnState::UserClosed);
    // State is UserClosed now; wake the blocked reader so it observes it.
    ctx.socket.state_change();

    Ok(cur.pos())
}
