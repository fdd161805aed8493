//! # Packet number map surface
//!
//! The received-packet-number map lives in the ACK scheduler; the frame
//! layer only queries it when building ACK frames. The trait below is the
//! whole contract.

use crate::types::Instant;

/// Compile-time bound on gap blocks emitted in one ACK frame. The limit
/// applied on receive is configurable separately
/// (see [`FrameConfig`](crate::frames::FrameConfig)).
pub const MAX_GAP_BLOCKS: usize = 16;

/// One run of *missing* packet numbers between two acknowledged runs.
///
/// Offsets are 1-based relative to the map's base: the run covers packet
/// numbers `base_pn() + start - 1 ..= base_pn() + end - 1`. `end >= start`,
/// blocks are reported lowest first, and consecutive blocks are separated
/// by at least one acknowledged number (`next.start >= prev.end + 2`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapBlock {
    pub start: u64,
    pub end: u64,
}

/// Read-only view of the received packet number map.
///
/// Implementations maintain these invariants for any state that can reach
/// the ACK encoder: `min_pn_seen() <= max_pn_seen()`, every reported gap
/// block lies within `[base_pn(), max_pn_seen()]`, and `max_pn_ts()` is the
/// arrival time of the packet numbered `max_pn_seen()`.
pub trait PacketNumberMap {
    /// Largest packet number received so far.
    fn max_pn_seen(&self) -> u64;

    /// Smallest packet number still tracked.
    fn min_pn_seen(&self) -> u64;

    /// Arrival time of the largest received packet number.
    fn max_pn_ts(&self) -> Instant;

    /// Base packet number the gap blocks are relative to.
    fn base_pn(&self) -> u64;

    /// Copy up to `out.len()` gap blocks into `out`, lowest first, and
    /// return how many were written.
    fn gap_blocks(&self, out: &mut [GapBlock]) -> usize;
}
