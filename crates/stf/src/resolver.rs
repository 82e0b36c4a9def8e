// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Address-driven transport resolution.
//!
//! Walks a multi-component address from the top slice downwards,
//! collecting tunnel transports until it reaches the single native
//! transport that owns the bottom of the chain. The bottom slices are
//! joined into one native-layer address (so `/ip4/…/udp/…/kcp` reaches
//! the KCP transport as a single address), while each tunnel above
//! keeps its own slice.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::multiaddr::Multiaddr;
use crate::registry::lookup_transport;
use crate::transport::{NativeTransport, TransportEntry, TunnelTransport};

/// A resolved transport chain.
///
/// `groups[0]` is the native layer's address; `groups[1..]` carry one
/// address per tunnel, in the same bottom-to-top order as `tunnels`.
pub(crate) struct ResolvedChain {
    pub groups: Vec<Multiaddr>,
    pub native: Arc<dyn NativeTransport>,
    pub tunnels: Vec<Arc<dyn TunnelTransport>>,
}

pub(crate) fn resolve(addr: &Multiaddr) -> Result<ResolvedChain> {
    let slices = addr.split();
    let count = slices.len();
    let mut tunnels: Vec<Arc<dyn TunnelTransport>> = Vec::new();

    // Top-down over positions count-1 .. 1. Position 0 is raw address
    // material (ip4, ...) unless everything above it was a tunnel.
    for i in (1..count).rev() {
        let tag = slices[i].leading_tag();
        match lookup_transport(tag) {
            Some(TransportEntry::Tunnel(tunnel)) => tunnels.push(tunnel),
            Some(TransportEntry::Native(native)) => {
                return finish(addr, &slices, i, native, tunnels);
            }
            None => {
                return Err(Error::NoNativeTransport(format!(
                    "protocol {} is not bound to a transport in {}",
                    tag, addr
                )));
            }
        }
    }

    if count >= 2 {
        // Every slice above position 0 resolved to a tunnel; the base
        // itself must now be the native layer.
        let tag = slices[0].leading_tag();
        match lookup_transport(tag) {
            Some(TransportEntry::Native(native)) => {
                return finish(addr, &slices, 0, native, tunnels);
            }
            Some(TransportEntry::Tunnel(_)) => {
                return Err(Error::TransportRole(format!(
                    "tunnel transport {} cannot sit at the base of {}",
                    tag, addr
                )));
            }
            None => {
                return Err(Error::NoNativeTransport(format!(
                    "protocol {} is not bound to a transport in {}",
                    tag, addr
                )));
            }
        }
    }

    Err(Error::NoNativeTransport(format!(
        "expect native transport in {}",
        addr
    )))
}

/// Assemble the chain once the native layer at position `i` is known.
fn finish(
    addr: &Multiaddr,
    slices: &[Multiaddr],
    i: usize,
    native: Arc<dyn NativeTransport>,
    mut tunnels: Vec<Arc<dyn TunnelTransport>>,
) -> Result<ResolvedChain> {
    let mut groups = vec![Multiaddr::join(&slices[..=i])?];
    groups.extend(slices[i + 1..].iter().cloned());

    // Collected top-down; composition applies them bottom-up.
    tunnels.reverse();

    log::debug!(
        "resolved {} -> native {} + {} tunnel(s)",
        addr,
        native.name(),
        tunnels.len()
    );
    Ok(ResolvedChain {
        groups,
        native,
        tunnels,
    })
}
