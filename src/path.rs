//! # Path validation state (RFC 9000 Sections 8.2, 9)
//!
//! Each connection probes at most one candidate path per direction. A probe
//! stores the PATH_CHALLENGE entropy and stays `pending` until a matching
//! PATH_RESPONSE arrives, at which point the inactive address slot is torn
//! down and the socket rebinds to the active one.

use crate::types::PATH_ENTROPY_LEN;
use std::net::SocketAddr;

/// Which of the connection's two path records a frame refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSide {
    /// Our addresses (migration of the local endpoint).
    Source,
    /// Peer addresses (migration of the remote endpoint).
    Dest,
}

/// One direction's path record: two address slots plus an in-flight probe.
#[derive(Debug, Clone, Default)]
pub struct PathAddr {
    /// Entropy of the outstanding PATH_CHALLENGE on this path.
    pub entropy: [u8; PATH_ENTROPY_LEN],

    /// True while a probe is awaiting its PATH_RESPONSE.
    pub pending: bool,

    /// Index (0 or 1) of the currently active address slot.
    pub active: usize,

    /// Address slots; the inactive one is cleared once validation
    /// completes.
    pub addr: [Option<SocketAddr>; 2],
}

impl PathAddr {
    /// Index of the slot that is not active.
    pub fn inactive(&self) -> usize {
        self.active ^ 1
    }

    /// Address in the active slot, if configured.
    pub fn active_addr(&self) -> Option<SocketAddr> {
        self.addr[self.active]
    }
}

/// Both directions' path records.
#[derive(Debug, Clone, Default)]
pub struct PathPair {
    pub src: PathAddr,
    pub dst: PathAddr,
}

impl PathPair {
    pub fn get_mut(&mut self, side: PathSide) -> &mut PathAddr {
        match side {
            PathSide::Source => &mut self.src,
            PathSide::Dest => &mut self.dst,
        }
    }
}
