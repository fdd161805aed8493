//! # Socket control surface
//!
//! Decoders drive the owning socket through this trait: error and state
//! transitions on CONNECTION_CLOSE, waiter wake-ups on MAX_STREAMS, and
//! address rebinding when path validation completes. Tests substitute a
//! recording double.

use std::net::SocketAddr;

/// Connection-level socket states the frame layer can observe or set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Closed,
    Listening,
    Establishing,
    Established,
    /// Peer closed the connection; readers drain and then fail.
    UserClosed,
}

/// Errors reported on the socket, typed rather than as a raw errno.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SockError {
    /// Peer sent CONNECTION_CLOSE (the EPIPE of this transport).
    BrokenPipe,
}

/// Control operations on the socket owning this connection.
pub trait SocketCtl {
    /// Record an error for the next application call to pick up.
    fn set_error(&mut self, err: SockError);

    /// Transition the connection state. Implementations signal the state
    /// change to any waiter as part of the transition.
    fn set_state(&mut self, state: ConnState);

    /// Wake threads blocked on a state change.
    fn state_change(&mut self);

    /// Wake threads blocked on write space (stream credit arrived).
    fn write_space(&mut self);

    /// Rebind the socket's local (`local == true`) or peer address.
    fn set_addr(&mut self, addr: SocketAddr, local: bool);

    /// Release the UDP socket bound to address slot `slot` after the other
    /// slot won path validation.
    fn release_udp(&mut self, slot: usize);
}
