// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound connection composition.

use std::io;
use std::sync::Arc;

use crate::conn::{Conn, Listener};
use crate::error::Result;
use crate::multiaddr::Multiaddr;
use crate::options::{Options, TransportOption};
use crate::resolver::resolve;
use crate::transport::TunnelTransport;

/// Bind a listener for `laddr`, composing every layer the address
/// names.
///
/// The native layer is bound immediately; tunnel server handshakes
/// run per accepted connection. The returned listener reports the
/// user-supplied address unchanged.
pub fn listen(laddr: &Multiaddr, options: Vec<TransportOption>) -> Result<Box<dyn Listener>> {
    let mut bag = Options::new();
    for option in options {
        option(&mut bag)?;
    }
    bag.load()?;

    let chain = resolve(laddr)?;

    log::info!("listen on {} via native {}", laddr, chain.native.name());
    let native = chain
        .native
        .listen(&chain.groups[0], &bag)
        .map_err(|e| e.context(format!("call native transport {} listen", chain.native.name())))?;

    Ok(Box::new(ChainListener {
        laddr: laddr.clone(),
        options: bag,
        tunnels: chain.tunnels,
        tunnel_addrs: chain.groups[1..].to_vec(),
        native_name: chain.native.name().to_string(),
        native,
    }))
}

/// Listener that folds tunnel server handshakes over every accepted
/// native connection.
struct ChainListener {
    laddr: Multiaddr,
    options: Options,
    tunnels: Vec<Arc<dyn TunnelTransport>>,
    tunnel_addrs: Vec<Multiaddr>,
    native_name: String,
    native: Box<dyn Listener>,
}

impl Listener for ChainListener {
    fn accept(&mut self) -> Result<Box<dyn Conn>> {
        let mut conn = self.native.accept().map_err(|e| {
            e.context(format!(
                "call native transport {} listener accept",
                self.native_name
            ))
        })?;

        for (i, tunnel) in self.tunnels.iter().enumerate() {
            conn = tunnel
                .server(conn, &self.tunnel_addrs[i], &self.options)
                .map_err(|e| {
                    e.context(format!("call tunnel transport {} server", tunnel.name()))
                })?;
        }

        log::debug!("accepted connection on {}", self.laddr);
        Ok(conn)
    }

    fn close(&mut self) -> io::Result<()> {
        self.native.close()
    }

    fn addr(&self) -> &Multiaddr {
        &self.laddr
    }
}
