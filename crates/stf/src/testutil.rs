// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transports for unit tests.
//!
//! `mem` is a native transport over in-memory pipes; `p2p2` is a
//! pass-through tunnel; `kcp` is a stand-in native transport used by
//! resolver tests (the real KCP transport is an external collaborator);
//! `failt` is a tunnel whose handshake always fails. All registration
//! helpers are process-wide singletons so repeated calls hit the
//! registry's idempotent path.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::SystemTime;

use crate::conn::{deadline_to_timeout, Conn, Listener};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::multiaddr::{Multiaddr, Protocol, ValueCodec, ValueSize};
use crate::options::Options;
use crate::registry::register_transport;
use crate::transport::{NativeTransport, Transport, TransportEntry, TunnelTransport};

// ============================================================================
// mem: native transport over in-memory pipes
// ============================================================================

fn mem_table() -> &'static Mutex<HashMap<String, Sender<MemConn>>> {
    static TABLE: OnceLock<Mutex<HashMap<String, Sender<MemConn>>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

pub(crate) struct MemConn {
    tx: Option<Sender<Vec<u8>>>,
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    laddr: Multiaddr,
    raddr: Multiaddr,
    read_deadline: Option<SystemTime>,
}

impl MemConn {
    pub(crate) fn pair(addr: &Multiaddr) -> (MemConn, MemConn) {
        let (a_tx, a_rx) = mpsc::channel();
        let (b_tx, b_rx) = mpsc::channel();
        let make = |tx, rx| MemConn {
            tx: Some(tx),
            rx,
            pending: Vec::new(),
            laddr: addr.clone(),
            raddr: addr.clone(),
            read_deadline: None,
        };
        (make(a_tx, b_rx), make(b_tx, a_rx))
    }
}

impl Read for MemConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            let chunk = match deadline_to_timeout(self.read_deadline) {
                None => match self.rx.recv() {
                    Ok(chunk) => chunk,
                    Err(_) => return Ok(0),
                },
                Some(timeout) => match self.rx.recv_timeout(timeout) {
                    Ok(chunk) => chunk,
                    Err(RecvTimeoutError::Disconnected) => return Ok(0),
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))
                    }
                },
            };
            self.pending = chunk;
        }
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Write for MemConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.tx {
            Some(tx) => tx
                .send(buf.to_vec())
                .map(|()| buf.len())
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer closed")),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Conn for MemConn {
    fn local_addr(&self) -> &Multiaddr {
        &self.laddr
    }

    fn remote_addr(&self) -> &Multiaddr {
        &self.raddr
    }

    fn set_read_deadline(&mut self, deadline: Option<SystemTime>) -> io::Result<()> {
        self.read_deadline = deadline;
        Ok(())
    }

    fn set_write_deadline(&mut self, _deadline: Option<SystemTime>) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.tx = None;
        Ok(())
    }

    fn underlying(&self) -> Option<&dyn Conn> {
        None
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

struct MemListener {
    key: String,
    addr: Multiaddr,
    incoming: Receiver<MemConn>,
}

impl Listener for MemListener {
    fn accept(&mut self) -> Result<Box<dyn Conn>> {
        let conn = self.incoming.recv().map_err(|_| {
            Error::io(
                format!("accept on {}", self.addr),
                io::Error::new(io::ErrorKind::NotConnected, "listener closed"),
            )
        })?;
        Ok(Box::new(conn))
    }

    fn close(&mut self) -> io::Result<()> {
        mem_table().lock().unwrap().remove(&self.key);
        Ok(())
    }

    fn addr(&self) -> &Multiaddr {
        &self.addr
    }
}

struct MemTransport;

impl Transport for MemTransport {
    fn name(&self) -> &str {
        "stub-mem"
    }

    fn protocols(&self) -> Vec<Protocol> {
        vec![Protocol::new(
            "mem",
            9301,
            ValueSize::Variable,
            Some(ValueCodec::Text),
        )]
    }
}

impl NativeTransport for MemTransport {
    fn listen(&self, laddr: &Multiaddr, _options: &Options) -> Result<Box<dyn Listener>> {
        let key = laddr.to_string();
        let (tx, rx) = mpsc::channel();
        mem_table().lock().unwrap().insert(key.clone(), tx);
        Ok(Box::new(MemListener {
            key,
            addr: laddr.clone(),
            incoming: rx,
        }))
    }

    fn dial(&self, _ctx: &Context, raddr: &Multiaddr, _options: &Options) -> Result<Box<dyn Conn>> {
        let (local, remote) = MemConn::pair(raddr);
        let table = mem_table().lock().unwrap();
        let tx = table.get(&raddr.to_string()).ok_or_else(|| {
            Error::io(
                format!("dial {}", raddr),
                io::Error::new(io::ErrorKind::ConnectionRefused, "no such listener"),
            )
        })?;
        tx.send(remote).map_err(|_| {
            Error::io(
                format!("dial {}", raddr),
                io::Error::new(io::ErrorKind::ConnectionRefused, "listener closed"),
            )
        })?;
        Ok(Box::new(local))
    }
}

pub(crate) fn register_mem() {
    static INSTANCE: OnceLock<Arc<MemTransport>> = OnceLock::new();
    let instance = INSTANCE.get_or_init(|| Arc::new(MemTransport)).clone();
    register_transport(TransportEntry::Native(instance));
}

// ============================================================================
// p2p2: pass-through tunnel
// ============================================================================

struct PassConn {
    inner: Box<dyn Conn>,
    laddr: Multiaddr,
    raddr: Multiaddr,
}

impl Read for PassConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for PassConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Conn for PassConn {
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
        self.inner.close()
    }

    fn underlying(&self) -> Option<&dyn Conn> {
        Some(self.inner.as_ref())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

struct StubTunnel;

impl StubTunnel {
    fn wrap(inner: Box<dyn Conn>, layer: &Multiaddr) -> Box<dyn Conn> {
        let laddr = inner.local_addr().encapsulate(layer);
        let raddr = inner.remote_addr().encapsulate(layer);
        Box::new(PassConn {
            inner,
            laddr,
            raddr,
        })
    }
}

impl Transport for StubTunnel {
    fn name(&self) -> &str {
        "stub-tunnel"
    }

    fn protocols(&self) -> Vec<Protocol> {
        vec![Protocol::new(
            "p2p2",
            9302,
            ValueSize::Variable,
            Some(ValueCodec::Text),
        )]
    }
}

impl TunnelTransport for StubTunnel {
    fn client(
        &self,
        inner: Box<dyn Conn>,
        raddr: &Multiaddr,
        _options: &Options,
    ) -> Result<Box<dyn Conn>> {
        Ok(Self::wrap(inner, raddr))
    }

    fn server(
        &self,
        inner: Box<dyn Conn>,
        laddr: &Multiaddr,
        _options: &Options,
    ) -> Result<Box<dyn Conn>> {
        Ok(Self::wrap(inner, laddr))
    }
}

pub(crate) fn register_stub_tunnel() {
    static INSTANCE: OnceLock<Arc<StubTunnel>> = OnceLock::new();
    let instance = INSTANCE.get_or_init(|| Arc::new(StubTunnel)).clone();
    register_transport(TransportEntry::Tunnel(instance));
}

// ============================================================================
// kcp stand-in and failing tunnel
// ============================================================================

struct StubKcp;

impl Transport for StubKcp {
    fn name(&self) -> &str {
        "stub-kcp"
    }

    fn protocols(&self) -> Vec<Protocol> {
        vec![Protocol::new("kcp", 482, ValueSize::Zero, None)]
    }
}

impl NativeTransport for StubKcp {
    fn listen(&self, _laddr: &Multiaddr, _options: &Options) -> Result<Box<dyn Listener>> {
        Err(Error::Config("kcp stand-in cannot listen".to_string()))
    }

    fn dial(&self, _ctx: &Context, _raddr: &Multiaddr, _options: &Options) -> Result<Box<dyn Conn>> {
        Err(Error::Config("kcp stand-in cannot dial".to_string()))
    }
}

pub(crate) fn register_stub_kcp() {
    static INSTANCE: OnceLock<Arc<StubKcp>> = OnceLock::new();
    let instance = INSTANCE.get_or_init(|| Arc::new(StubKcp)).clone();
    register_transport(TransportEntry::Native(instance));
}

struct FailTunnel;

impl Transport for FailTunnel {
    fn name(&self) -> &str {
        "stub-fail"
    }

    fn protocols(&self) -> Vec<Protocol> {
        vec![Protocol::new("failt", 9303, ValueSize::Zero, None)]
    }
}

impl TunnelTransport for FailTunnel {
    fn client(
        &self,
        _inner: Box<dyn Conn>,
        _raddr: &Multiaddr,
        _options: &Options,
    ) -> Result<Box<dyn Conn>> {
        Err(Error::Handshake("stub tunnel refuses every handshake".to_string()))
    }

    fn server(
        &self,
        _inner: Box<dyn Conn>,
        _laddr: &Multiaddr,
        _options: &Options,
    ) -> Result<Box<dyn Conn>> {
        Err(Error::Handshake("stub tunnel refuses every handshake".to_string()))
    }
}

pub(crate) fn register_fail_tunnel() {
    static INSTANCE: OnceLock<Arc<FailTunnel>> = OnceLock::new();
    let instance = INSTANCE.get_or_init(|| Arc::new(FailTunnel)).clone();
    register_transport(TransportEntry::Tunnel(instance));
}
