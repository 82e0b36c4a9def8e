// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection and listener abstractions.
//!
//! A [`Conn`] is a bidirectional byte stream produced by a transport
//! layer. Its addresses are full multi-component addresses: every
//! layer wrapping a connection encapsulates its own protocol tag onto
//! the addresses of the layer beneath it, so the final Conn's
//! addresses spell out the whole chain.

use std::any::Any;
use std::io;
use std::time::{Duration, SystemTime};

use crate::error::Result;
use crate::multiaddr::Multiaddr;

/// A bidirectional byte stream within a transport chain.
///
/// Deadlines are absolute wall-clock times; `None` disables the
/// timeout. `close` is safe to call more than once and unblocks
/// pending reads and writes. Dropping a Conn closes it.
pub trait Conn: io::Read + io::Write + Send {
    /// Local address with every layer's tag encapsulated in order.
    fn local_addr(&self) -> &Multiaddr;

    /// Remote address with every layer's tag encapsulated in order.
    fn remote_addr(&self) -> &Multiaddr;

    /// Set both the read and write deadlines.
    fn set_deadline(&mut self, deadline: Option<SystemTime>) -> io::Result<()> {
        self.set_read_deadline(deadline)?;
        self.set_write_deadline(deadline)
    }

    /// Deadline for future and pending reads.
    fn set_read_deadline(&mut self, deadline: Option<SystemTime>) -> io::Result<()>;

    /// Deadline for future and pending writes.
    fn set_write_deadline(&mut self, deadline: Option<SystemTime>) -> io::Result<()>;

    /// Shut the connection down. Idempotent; cascades to the
    /// underlying connection.
    fn close(&mut self) -> io::Result<()>;

    /// The connection directly beneath this one; `None` at the
    /// native layer.
    fn underlying(&self) -> Option<&dyn Conn>;

    /// Concrete-type access for layers exposing extra surface beyond
    /// this trait (e.g. the TLS layer's identity keys).
    fn as_any(&self) -> &dyn Any;
}

/// Accepts connections for one listen address.
pub trait Listener: Send {
    /// Block until the next fully-composed connection arrives.
    fn accept(&mut self) -> Result<Box<dyn Conn>>;

    /// Stop accepting. Idempotent.
    fn close(&mut self) -> io::Result<()>;

    /// The full multi-component listen address.
    fn addr(&self) -> &Multiaddr;
}

/// Map an absolute deadline onto the socket-timeout form.
///
/// `None` disables the timeout. A deadline already in the past maps to
/// the smallest accepted timeout so the next operation fails fast
/// (std sockets reject a zero duration).
pub(crate) fn deadline_to_timeout(deadline: Option<SystemTime>) -> Option<Duration> {
    deadline.map(|d| {
        d.duration_since(SystemTime::now())
            .unwrap_or_default()
            .max(Duration::from_millis(1))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_disables_timeout() {
        assert_eq!(deadline_to_timeout(None), None);
    }

    #[test]
    fn test_past_deadline_maps_to_minimal_timeout() {
        let past = SystemTime::now() - Duration::from_secs(5);
        assert_eq!(deadline_to_timeout(Some(past)), Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_future_deadline_maps_to_remaining() {
        let future = SystemTime::now() + Duration::from_secs(10);
        let timeout = deadline_to_timeout(Some(future)).unwrap();
        assert!(timeout > Duration::from_secs(9));
        assert!(timeout <= Duration::from_secs(10));
    }
}
