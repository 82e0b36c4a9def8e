// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outbound connection composition.

use crate::conn::Conn;
use crate::context::Context;
use crate::error::Result;
use crate::multiaddr::Multiaddr;
use crate::options::{Options, TransportOption};
use crate::resolver::resolve;

/// Open a connection to `raddr`, composing every layer the address
/// names.
///
/// Options are applied to a fresh bag in order; the first failing
/// option aborts the call. The native layer is dialed under `ctx`'s
/// deadline, then each tunnel's client handshake wraps the connection
/// bottom-up. A tunnel failure closes the partially built chain
/// before the error is returned.
pub fn dial(ctx: &Context, raddr: &Multiaddr, options: Vec<TransportOption>) -> Result<Box<dyn Conn>> {
    let mut bag = Options::new();
    for option in options {
        option(&mut bag)?;
    }
    bag.load()?;

    let chain = resolve(raddr)?;

    log::debug!("dial {} via native {}", raddr, chain.native.name());
    let mut conn = chain
        .native
        .dial(ctx, &chain.groups[0], &bag)
        .map_err(|e| e.context(format!("call native transport {} dial", chain.native.name())))?;

    for (i, tunnel) in chain.tunnels.iter().enumerate() {
        conn = tunnel
            .client(conn, &chain.groups[i + 1], &bag)
            .map_err(|e| e.context(format!("call tunnel transport {} client", tunnel.name())))?;
    }

    Ok(conn)
}
