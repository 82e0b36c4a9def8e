// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TCP native transport.
//!
//! Owns `/ip4|ip6|dns*/…/tcp/…` chain bottoms: converts the address
//! slices into an OS socket and wraps the socket in a [`Conn`] whose
//! addresses are the multiaddr form of the real socket addresses.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener as StdTcpListener, TcpStream};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use crate::conn::{deadline_to_timeout, Conn, Listener};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::multiaddr::{from_socket_addr, to_socket_addr, Multiaddr, Protocol, ValueCodec, ValueSize};
use crate::options::Options;
use crate::registry::register_transport;
use crate::transport::{NativeTransport, Transport, TransportEntry};

const TRANSPORT_NAME: &str = "stf-transport-tcp";

/// Register the TCP transport under the `tcp` tag. Idempotent.
pub fn register() {
    static INSTANCE: OnceLock<Arc<TcpTransport>> = OnceLock::new();
    let instance = INSTANCE.get_or_init(|| Arc::new(TcpTransport)).clone();
    register_transport(TransportEntry::Native(instance));
}

/// Native transport over OS TCP sockets.
pub struct TcpTransport;

impl Transport for TcpTransport {
    fn name(&self) -> &str {
        TRANSPORT_NAME
    }

    fn protocols(&self) -> Vec<Protocol> {
        // Matches the standard descriptor the address library seeds.
        vec![Protocol::new(
            "tcp",
            6,
            ValueSize::Fixed(16),
            Some(ValueCodec::Port),
        )]
    }
}

impl NativeTransport for TcpTransport {
    fn listen(&self, laddr: &Multiaddr, _options: &Options) -> Result<Box<dyn Listener>> {
        let sock = to_socket_addr(laddr)?;
        let listener = StdTcpListener::bind(sock)
            .map_err(|e| Error::io(format!("bind {}", laddr), e))?;

        log::info!("listen on {}", laddr);
        Ok(Box::new(TcpListener {
            listener: Some(listener),
            addr: laddr.clone(),
        }))
    }

    fn dial(&self, ctx: &Context, raddr: &Multiaddr, _options: &Options) -> Result<Box<dyn Conn>> {
        let sock = to_socket_addr(raddr)?;

        log::debug!("dial {}", raddr);
        let stream = match ctx.remaining() {
            Some(timeout) if timeout.is_zero() => {
                return Err(Error::io(
                    format!("dial {}", raddr),
                    io::Error::new(io::ErrorKind::TimedOut, "context deadline exceeded"),
                ));
            }
            Some(timeout) => TcpStream::connect_timeout(&sock, timeout),
            None => TcpStream::connect(sock),
        }
        .map_err(|e| Error::io(format!("connect {}", raddr), e))?;

        Ok(Box::new(TcpConn::new(stream)?))
    }
}

struct TcpListener {
    listener: Option<StdTcpListener>,
    addr: Multiaddr,
}

impl Listener for TcpListener {
    fn accept(&mut self) -> Result<Box<dyn Conn>> {
        let listener = self.listener.as_ref().ok_or_else(|| {
            Error::io(
                format!("accept on {}", self.addr),
                io::Error::new(io::ErrorKind::NotConnected, "listener closed"),
            )
        })?;
        let (stream, peer) = listener
            .accept()
            .map_err(|e| Error::io(format!("accept on {}", self.addr), e))?;

        log::debug!("accepted {} on {}", peer, self.addr);
        Ok(Box::new(TcpConn::new(stream)?))
    }

    fn close(&mut self) -> io::Result<()> {
        self.listener = None;
        Ok(())
    }

    fn addr(&self) -> &Multiaddr {
        &self.addr
    }
}

/// A TCP socket with multiaddr-form addresses.
pub struct TcpConn {
    stream: TcpStream,
    laddr: Multiaddr,
    raddr: Multiaddr,
    closed: bool,
}

impl TcpConn {
    fn new(stream: TcpStream) -> Result<Self> {
        let laddr = from_socket_addr(
            stream
                .local_addr()
                .map_err(|e| Error::io("local_addr", e))?,
            "tcp",
        )?;
        let raddr = from_socket_addr(
            stream.peer_addr().map_err(|e| Error::io("peer_addr", e))?,
            "tcp",
        )?;
        Ok(Self {
            stream,
            laddr,
            raddr,
            closed: false,
        })
    }
}

impl Read for TcpConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Conn for TcpConn {
    fn local_addr(&self) -> &Multiaddr {
        &self.laddr
    }

    fn remote_addr(&self) -> &Multiaddr {
        &self.raddr
    }

    fn set_read_deadline(&mut self, deadline: Option<SystemTime>) -> io::Result<()> {
        self.stream.set_read_timeout(deadline_to_timeout(deadline))
    }

    fn set_write_deadline(&mut self, deadline: Option<SystemTime>) -> io::Result<()> {
        self.stream.set_write_timeout(deadline_to_timeout(deadline))
    }

    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn underlying(&self) -> Option<&dyn Conn> {
        None
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for TcpConn {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
