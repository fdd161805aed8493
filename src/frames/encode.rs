//! # Frame encoders (RFC 9000 Section 19)
//!
//! One encoder per frame kind, reached through the dispatch table in the
//! parent module. Encoders read connection state through the
//! [`FrameContext`] and commit their side effects before returning the
//! buffer; a failed encode leaves no buffer behind for the caller to
//! retry with.

use super::{
    FrameContext, FramePayload, FRAME_TYPE_CONNECTION_CLOSE, STREAM_FRAME_BIT_FIN,
    STREAM_FRAME_BIT_LEN, STREAM_FRAME_BIT_OFF,
};
use crate::buf::FrameBuf;
use crate::cid::ConnectionIdEntry;
use crate::error::{Error, Result};
use crate::pnmap::{GapBlock, MAX_GAP_BLOCKS};
use crate::types::{ConnectionId, VarIntCodec, LOCAL_CID_LEN};

pub(super) fn padding(
    _ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::Padding { len } = payload else {
        return Err(Error::Invalid);
    };
    // Exactly len + 1 bytes: the type byte plus len more zeroes.
    let mut frame = FrameBuf::with_capacity(len + 1);
    frame.put_u8(frame_type).put_zeroes(*len);
    Ok(frame)
}

pub(super) fn ping(
    _ctx: &mut FrameContext<'_>,
    _payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type);
    Ok(frame)
}

/// ACK built from the packet number map.
///
/// Ranges are written from the highest gap down; each Gap is the missing
/// run's width and each Range the acknowledged run below it, with the
/// final Range reaching down from the lowest gap (RFC 9000 Section
/// 19.3.1). ECN counts are never produced; the 0x03 form is receive-only
/// here.
pub(super) fn ack(
    ctx: &mut FrameContext<'_>,
    _payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let mut gabs = [GapBlock::default(); MAX_GAP_BLOCKS];
    let num_gabs = ctx.pn_map.gap_blocks(&mut gabs);

    let largest = ctx.pn_map.max_pn_seen();
    let mut smallest = ctx.pn_map.min_pn_seen();
    if num_gabs > 0 {
        smallest = ctx.pn_map.base_pn() + gabs[num_gabs - 1].end;
    }
    let delay = ctx
        .now
        .duration_since(ctx.pn_map.max_pn_ts())
        .map_or(0, |d| d.as_micros() as u64)
        >> ctx.outq.ack_delay_exponent();

    let mut frame = FrameBuf::new();
    frame
        .put_u8(frame_type)
        .put_var(largest)
        .put_var(delay)
        .put_var(num_gabs as u64)
        .put_var(largest - smallest);

    if num_gabs > 0 {
        for i in (1..num_gabs).rev() {
            frame.put_var(gabs[i].end - gabs[i].start);
            frame.put_var(gabs[i].start - gabs[i - 1].end - 2);
        }
        frame.put_var(gabs[0].end - gabs[0].start);
        frame.put_var(gabs[0].start - 2);
    }
    Ok(frame)
}

pub(super) fn reset_stream(
    ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::ResetStream { id, errcode } = payload else {
        return Err(Error::Invalid);
    };
    let final_size = ctx.streams.find(*id).ok_or(Error::Invalid)?.send.offset;

    let mut frame = FrameBuf::new();
    frame
        .put_u8(frame_type)
        .put_var(id.value())
        .put_var(*errcode)
        .put_var(final_size);
    frame.meta.stream_id = Some(*id);
    frame.meta.err_code = *errcode;

    // Release the send path so another stream may take over.
    if ctx.streams.send.stream_active == Some(*id) {
        ctx.streams.send.stream_active = None;
    }
    Ok(frame)
}

pub(super) fn stop_sending(
    _ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::StopSending { id, errcode } = payload else {
        return Err(Error::Invalid);
    };
    let mut frame = FrameBuf::new();
    frame
        .put_u8(frame_type)
        .put_var(id.value())
        .put_var(*errcode);
    Ok(frame)
}

/// Session-ticket CRYPTO; offset is always zero in this core.
pub(super) fn crypto(
    _ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::Crypto { data } = payload else {
        return Err(Error::Invalid);
    };
    let mut frame = FrameBuf::with_capacity(data.len() + 8);
    frame
        .put_u8(frame_type)
        .put_var(0)
        .put_var(data.len() as u64)
        .put_slice(data);
    Ok(frame)
}

pub(super) fn new_token(
    _ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::NewToken { data } = payload else {
        return Err(Error::Invalid);
    };
    let mut frame = FrameBuf::with_capacity(data.len() + 4);
    frame
        .put_u8(frame_type)
        .put_var(data.len() as u64)
        .put_slice(data);
    Ok(frame)
}

/// STREAM with OFF set iff the stream already has bytes in flight, LEN
/// always set, and FIN only when the whole remaining message fits the
/// packet budget. Advances `send.offset` once the payload is in place.
pub(super) fn stream(
    ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::Stream { id, data, fin } = payload else {
        return Err(Error::Invalid);
    };
    let max_frame_len = ctx.max_payload;
    let stream = ctx.streams.find(*id).ok_or(Error::Invalid)?;
    let mut frame_type = frame_type;

    let mut hlen = 1 + VarIntCodec::size(id.value());
    if stream.send.offset > 0 {
        frame_type |= STREAM_FRAME_BIT_OFF;
        hlen += VarIntCodec::size(stream.send.offset);
    }
    frame_type |= STREAM_FRAME_BIT_LEN;
    hlen += VarIntCodec::size(max_frame_len as u64);

    let budget = max_frame_len.checked_sub(hlen).ok_or(Error::Invalid)?;
    let mut msg_len = data.len();
    if msg_len <= budget {
        if *fin {
            frame_type |= STREAM_FRAME_BIT_FIN;
        }
    } else {
        msg_len = budget;
    }

    let mut frame = FrameBuf::with_capacity(hlen + msg_len);
    frame.put_u8(frame_type).put_var(id.value());
    if frame_type & STREAM_FRAME_BIT_OFF != 0 {
        frame.put_var(stream.send.offset);
        frame.meta.stream_offset = stream.send.offset;
    }
    frame.put_var(msg_len as u64).put_slice(&data[..msg_len]);

    frame.meta.frame_type = frame_type;
    frame.meta.stream_id = Some(*id);
    frame.meta.data_bytes = msg_len as u32;

    stream.send.offset += msg_len as u64;
    Ok(frame)
}

pub(super) fn max_data(
    ctx: &mut FrameContext<'_>,
    _payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type).put_var(ctx.inq.max_bytes());
    Ok(frame)
}

pub(super) fn max_stream_data(
    ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::MaxStreamData { id } = payload else {
        return Err(Error::Invalid);
    };
    let stream = ctx.streams.find(*id).ok_or(Error::Invalid)?;
    let mut frame = FrameBuf::new();
    frame
        .put_u8(frame_type)
        .put_var(id.value())
        .put_var(stream.recv.max_bytes);
    Ok(frame)
}

pub(super) fn max_streams_bidi(
    _ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::MaxStreamsBidi { max } = payload else {
        return Err(Error::Invalid);
    };
    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type).put_var(*max);
    Ok(frame)
}

pub(super) fn max_streams_uni(
    _ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::MaxStreamsUni { max } = payload else {
        return Err(Error::Invalid);
    };
    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type).put_var(*max);
    Ok(frame)
}

pub(super) fn data_blocked(
    ctx: &mut FrameContext<'_>,
    _payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type).put_var(ctx.outq.max_bytes());
    Ok(frame)
}

pub(super) fn stream_data_blocked(
    ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::StreamDataBlocked { id } = payload else {
        return Err(Error::Invalid);
    };
    let stream = ctx.streams.find(*id).ok_or(Error::Invalid)?;
    let mut frame = FrameBuf::new();
    frame
        .put_u8(frame_type)
        .put_var(id.value())
        .put_var(stream.send.max_bytes);
    Ok(frame)
}

pub(super) fn streams_blocked_bidi(
    _ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::StreamsBlockedBidi { limit } = payload else {
        return Err(Error::Invalid);
    };
    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type).put_var((*limit >> 2) + 1);
    Ok(frame)
}

pub(super) fn streams_blocked_uni(
    _ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::StreamsBlockedUni { limit } = payload else {
        return Err(Error::Invalid);
    };
    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type).put_var((*limit >> 2) + 1);
    Ok(frame)
}

/// Issue the next source connection ID. The new entry is appended to the
/// source set before the frame is returned; when the append is refused the
/// encoded buffer is dropped with it.
pub(super) fn new_connection_id(
    ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::NewConnectionId { prior } = payload else {
        return Err(Error::Invalid);
    };
    let seqno = ctx.source.last_number() + 1;

    let mut cid = [0u8; LOCAL_CID_LEN];
    let mut reset_token = [0u8; 16];
    ctx.entropy.fill(&mut cid);
    ctx.entropy.fill(&mut reset_token);

    let mut frame = FrameBuf::new();
    frame
        .put_u8(frame_type)
        .put_var(seqno)
        .put_var(*prior)
        .put_var(LOCAL_CID_LEN as u64)
        .put_slice(&cid)
        .put_slice(&reset_token);

    ctx.source.append(ConnectionIdEntry {
        seqno,
        id: ConnectionId::from_slice(&cid).ok_or(Error::Invalid)?,
        reset_token,
    })?;
    Ok(frame)
}

pub(super) fn retire_connection_id(
    ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::RetireConnectionId { seqno } = payload else {
        return Err(Error::Invalid);
    };
    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type).put_var(*seqno);

    ctx.dest.remove(*seqno);
    Ok(frame)
}

/// Probe a path: fresh entropy is stored on the path record and echoed
/// back to us in a PATH_RESPONSE if the peer is reachable there.
pub(super) fn path_challenge(
    ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::PathChallenge { side } = payload else {
        return Err(Error::Invalid);
    };
    let path = ctx.paths.get_mut(*side);
    ctx.entropy.fill(&mut path.entropy);

    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type).put_slice(&path.entropy);
    Ok(frame)
}

pub(super) fn path_response(
    _ctx: &mut FrameContext<'_>,
    payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let FramePayload::PathResponse { entropy } = payload else {
        return Err(Error::Invalid);
    };
    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type).put_slice(entropy);
    Ok(frame)
}

/// CONNECTION_CLOSE from the outbound queue's close parameters. The
/// transport form (0x1c) additionally names the offending frame type; the
/// reason phrase goes out with its trailing NUL.
pub(super) fn connection_close(
    ctx: &mut FrameContext<'_>,
    _payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let close = ctx.outq.close_info();

    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type).put_var(close.errcode);
    if frame_type == FRAME_TYPE_CONNECTION_CLOSE {
        frame.put_var(close.frame_type);
    }
    match &close.phrase {
        Some(phrase) => {
            frame
                .put_var(phrase.len() as u64 + 1)
                .put_slice(phrase.as_bytes())
                .put_u8(0);
        }
        None => {
            frame.put_var(0);
        }
    }
    frame.meta.frame_type = frame_type;
    Ok(frame)
}

pub(super) fn handshake_done(
    _ctx: &mut FrameContext<'_>,
    _payload: &FramePayload,
    frame_type: u8,
) -> Result<FrameBuf> {
    let mut frame = FrameBuf::new();
    frame.put_u8(frame_type);
    Ok(frame)
}
