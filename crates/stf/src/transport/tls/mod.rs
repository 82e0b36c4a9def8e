// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Identity-authenticated TLS tunnel.
//!
//! Layers TLS 1.3 over any lower connection. Instead of PKI, each
//! side proves a long-term identity key: the per-session certificate
//! carries a signature by that key over the session's ephemeral
//! public key (see [`cert`]), and the custom verifiers deliver the
//! peer's identity key to the connection during the handshake.
//!
//! The identity key is supplied per call through the options bag:
//!
//! ```ignore
//! use stf::transport::tls;
//!
//! let key = stf::key::random_key("p256")?;
//! let conn = stf::dial(&ctx, &addr, vec![tls::with_key(key)])?;
//! let remote = tls::tls_conn(conn.as_ref()).unwrap().remote_key().recv();
//! ```

/// Certificates, signed-key codec, and session configuration.
mod cert;

use std::io::{self, Read, Write};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use parking_lot::{Condvar, Mutex};
use rustls::pki_types::ServerName;

use crate::conn::Conn;
use crate::error::{Error, Result};
use crate::key::IdentityKey;
use crate::multiaddr::{Multiaddr, Protocol, ValueSize};
use crate::options::{Options, TransportOption};
use crate::registry::register_transport;
use crate::transport::{Transport, TransportEntry, TunnelTransport};

const TRANSPORT_NAME: &str = "stf-transport-tls";

/// Placeholder for rustls session construction; SNI itself is
/// disabled, so the name never reaches the wire.
const SNI_PLACEHOLDER: &str = "stf4go.invalid";

/// Register the TLS tunnel under the `tls` tag. Idempotent.
pub fn register() {
    static INSTANCE: OnceLock<Arc<TlsTransport>> = OnceLock::new();
    let instance = INSTANCE.get_or_init(|| Arc::new(TlsTransport)).clone();
    register_transport(TransportEntry::Tunnel(instance));
}

/// Install the caller's identity key for the TLS layer.
pub fn with_key(key: Arc<dyn IdentityKey>) -> TransportOption {
    Box::new(move |options: &mut Options| {
        options.set_object(Box::new(key), &["tls", "key"]);
        Ok(())
    })
}

fn key_from_options(options: &Options) -> Result<Arc<dyn IdentityKey>> {
    options
        .get_object::<Arc<dyn IdentityKey>>(&["tls", "key"])
        .cloned()
        .ok_or_else(|| Error::MissingResource("expect tls identity key (use with_key)".to_string()))
}

/// Borrow the TLS view of a composed connection, if its top layer is
/// this tunnel.
pub fn tls_conn(conn: &dyn Conn) -> Option<&TlsConn> {
    conn.as_any().downcast_ref()
}

// ============================================================================
// Remote-key slot
// ============================================================================

#[derive(Debug, Default)]
struct SlotState {
    value: Option<Vec<u8>>,
    closed: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SlotState>,
    cond: Condvar,
}

/// Create the one-shot channel between the certificate verifier and
/// the connection's consumer.
fn key_slot() -> (KeySender, KeyReceiver) {
    let shared = Arc::new(Shared {
        state: Mutex::new(SlotState::default()),
        cond: Condvar::new(),
    });
    (KeySender(shared.clone()), KeyReceiver(shared))
}

/// Producer half, owned by the verifier.
#[derive(Debug, Clone)]
struct KeySender(Arc<Shared>);

impl KeySender {
    fn deliver(&self, key: Vec<u8>) {
        let mut state = self.0.state.lock();
        if state.value.is_none() && !state.closed {
            state.value = Some(key);
            self.0.cond.notify_all();
        }
    }
}

/// Consumer half: yields the peer's identity key exactly once.
///
/// After the connection closes the slot, a pre-delivered key is still
/// yielded; every later receive reports the closed slot as `None`.
#[derive(Debug)]
pub struct KeyReceiver(Arc<Shared>);

impl KeyReceiver {
    /// Block until the key is delivered or the slot is closed.
    pub fn recv(&self) -> Option<Vec<u8>> {
        let mut state = self.0.state.lock();
        loop {
            if let Some(value) = state.value.take() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            self.0.cond.wait(&mut state);
        }
    }

    /// Non-blocking variant of [`Self::recv`].
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.0.state.lock().value.take()
    }

    /// Close the slot. Idempotent; wakes a blocked receive.
    fn close(&self) {
        let mut state = self.0.state.lock();
        if !state.closed {
            state.closed = true;
            self.0.cond.notify_all();
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Tunnel transport for the `tls` tag.
pub struct TlsTransport;

impl Transport for TlsTransport {
    fn name(&self) -> &str {
        TRANSPORT_NAME
    }

    fn protocols(&self) -> Vec<Protocol> {
        vec![Protocol::new("tls", 483, ValueSize::Zero, None)]
    }
}

impl TunnelTransport for TlsTransport {
    fn client(
        &self,
        inner: Box<dyn Conn>,
        _raddr: &Multiaddr,
        options: &Options,
    ) -> Result<Box<dyn Conn>> {
        let identity = key_from_options(options)?;
        let (config, remote_key) = cert::client_config(identity.as_ref())?;
        let server_name = ServerName::try_from(SNI_PLACEHOLDER)
            .map_err(|e| Error::Handshake(format!("server name: {}", e)))?;
        let session = rustls::ClientConnection::new(Arc::new(config), server_name)
            .map_err(|e| Error::Handshake(format!("tls client session: {}", e)))?;

        let conn = TlsConn::handshake(
            TlsSession::Client(session),
            inner,
            identity.public_bytes(),
            remote_key,
        )?;
        Ok(Box::new(conn))
    }

    fn server(
        &self,
        inner: Box<dyn Conn>,
        _laddr: &Multiaddr,
        options: &Options,
    ) -> Result<Box<dyn Conn>> {
        let identity = key_from_options(options)?;
        let (config, remote_key) = cert::server_config(identity.as_ref())?;
        let session = rustls::ServerConnection::new(Arc::new(config))
            .map_err(|e| Error::Handshake(format!("tls server session: {}", e)))?;

        let conn = TlsConn::handshake(
            TlsSession::Server(session),
            inner,
            identity.public_bytes(),
            remote_key,
        )?;
        Ok(Box::new(conn))
    }
}

// ============================================================================
// Connection
// ============================================================================

enum TlsSession {
    Client(rustls::ClientConnection),
    Server(rustls::ServerConnection),
}

impl TlsSession {
    fn is_handshaking(&self) -> bool {
        match self {
            Self::Client(c) => c.is_handshaking(),
            Self::Server(s) => s.is_handshaking(),
        }
    }

    fn complete_io<T: Read + Write>(&mut self, io: &mut T) -> io::Result<(usize, usize)> {
        match self {
            Self::Client(c) => c.complete_io(io),
            Self::Server(s) => s.complete_io(io),
        }
    }

    fn read_plain(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Client(c) => c.reader().read(buf),
            Self::Server(s) => s.reader().read(buf),
        }
    }

    fn write_plain(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Client(c) => c.writer().write(buf),
            Self::Server(s) => s.writer().write(buf),
        }
    }

    fn flush_plain(&mut self) -> io::Result<()> {
        match self {
            Self::Client(c) => c.writer().flush(),
            Self::Server(s) => s.writer().flush(),
        }
    }

    fn read_tls(&mut self, rd: &mut dyn Read) -> io::Result<usize> {
        match self {
            Self::Client(c) => c.read_tls(rd),
            Self::Server(s) => s.read_tls(rd),
        }
    }

    fn write_tls(&mut self, wr: &mut dyn Write) -> io::Result<usize> {
        match self {
            Self::Client(c) => c.write_tls(wr),
            Self::Server(s) => s.write_tls(wr),
        }
    }

    fn process_new_packets(&mut self) -> std::result::Result<(), rustls::Error> {
        match self {
            Self::Client(c) => c.process_new_packets().map(|_| ()),
            Self::Server(s) => s.process_new_packets().map(|_| ()),
        }
    }

    fn wants_write(&self) -> bool {
        match self {
            Self::Client(c) => c.wants_write(),
            Self::Server(s) => s.wants_write(),
        }
    }

    fn send_close_notify(&mut self) {
        match self {
            Self::Client(c) => c.send_close_notify(),
            Self::Server(s) => s.send_close_notify(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Handshaking,
    Established,
    Closed,
}

/// A connection protected by the identity-authenticated TLS layer.
pub struct TlsConn {
    session: TlsSession,
    inner: Box<dyn Conn>,
    laddr: Multiaddr,
    raddr: Multiaddr,
    local_key: Vec<u8>,
    remote_key: KeyReceiver,
    state: State,
}

impl TlsConn {
    /// Run the synchronous handshake over `inner`.
    fn handshake(
        session: TlsSession,
        inner: Box<dyn Conn>,
        local_key: Vec<u8>,
        remote_key: KeyReceiver,
    ) -> Result<Self> {
        let layer = Multiaddr::new("/tls")?;
        let laddr = inner.local_addr().encapsulate(&layer);
        let raddr = inner.remote_addr().encapsulate(&layer);

        let mut conn = Self {
            session,
            inner,
            laddr,
            raddr,
            local_key,
            remote_key,
            state: State::Fresh,
        };

        conn.state = State::Handshaking;
        while conn.session.is_handshaking() {
            if let Err(e) = conn.session.complete_io(&mut conn.inner) {
                log::warn!("tls handshake with {} failed: {}", conn.raddr, e);
                return Err(Error::Handshake(format!("tls handshake error: {}", e)));
            }
        }
        conn.state = State::Established;

        log::debug!("tls handshake complete with {}", conn.raddr);
        Ok(conn)
    }

    /// Own long-term identity public key.
    pub fn local_key(&self) -> &[u8] {
        &self.local_key
    }

    /// Slot yielding the peer's long-term identity public key,
    /// delivered by the verifier during the handshake.
    pub fn remote_key(&self) -> &KeyReceiver {
        &self.remote_key
    }

    fn flush_tls(&mut self) -> io::Result<()> {
        while self.session.wants_write() {
            self.session.write_tls(&mut self.inner)?;
        }
        Ok(())
    }

    fn check_established(&self) -> io::Result<()> {
        if self.state == State::Established {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("tls connection is {:?}", self.state),
            ))
        }
    }
}

impl Read for TlsConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_established()?;
        loop {
            match self.session.read_plain(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }

            // Pull more records off the wire.
            let n = self.session.read_tls(&mut self.inner)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "tls connection closed without close_notify",
                ));
            }
            self.session
                .process_new_packets()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            // Records may queue responses (alerts, key updates).
            self.flush_tls()?;
        }
    }
}

impl Write for TlsConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_established()?;
        let n = self.session.write_plain(buf)?;
        self.flush_tls()?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check_established()?;
        self.session.flush_plain()?;
        self.flush_tls()?;
        self.inner.flush()
    }
}

impl Conn for TlsConn {
    fn local_addr(&self) -> &Multiaddr {
        &self.laddr
    }

    fn remote_addr(&self) -> &Multiaddr {
        &self.raddr
    }

    fn set_read_deadline(&mut self, deadline: Option<SystemTime>) -> io::Result<()> {
        self.inner.set_read_deadline(deadline)
    }

    fn set_write_deadline(&mut self, deadline: Option<SystemTime>) -> io::Result<()> {
        self.inner.set_write_deadline(deadline)
    }

    fn close(&mut self) -> io::Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;

        // Best-effort close_notify before tearing the stream down.
        self.session.send_close_notify();
        while self.session.wants_write() {
            if self.session.write_tls(&mut self.inner).is_err() {
                break;
            }
        }
        let _ = self.inner.flush();

        self.remote_key.close();
        self.inner.close()
    }

    fn underlying(&self) -> Option<&dyn Conn> {
        Some(self.inner.as_ref())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for TlsConn {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
