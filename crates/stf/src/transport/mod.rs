// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport layer traits and concrete transports.
//!
//! A transport provides one or more protocol tags and is either
//! *native* (owns the bottom of a chain and opens OS sockets) or a
//! *tunnel* (wraps an existing connection with a new layer). The two
//! roles are kept apart by [`TransportEntry`], the capability-tagged
//! sum stored in the registry, so resolution pattern-matches instead
//! of downcasting.

/// TCP native transport.
pub mod tcp;
/// Identity-authenticated TLS tunnel.
pub mod tls;

use std::sync::Arc;

use crate::conn::{Conn, Listener};
use crate::context::Context;
use crate::error::Result;
use crate::multiaddr::{Multiaddr, Protocol};
use crate::options::Options;

/// Common surface of every transport.
pub trait Transport: Send + Sync {
    /// Display name used in logs and error contexts.
    fn name(&self) -> &str;

    /// The protocol descriptors this transport claims. Registering
    /// the transport binds each tag to it and installs descriptors
    /// the address library does not already know.
    fn protocols(&self) -> Vec<Protocol>;
}

/// A transport that terminates directly on the network.
pub trait NativeTransport: Transport {
    /// Bind a listener for the given native-layer address slice.
    fn listen(&self, laddr: &Multiaddr, options: &Options) -> Result<Box<dyn Listener>>;

    /// Open a connection to the given native-layer address slice.
    /// Only this step observes the dial context's deadline.
    fn dial(&self, ctx: &Context, raddr: &Multiaddr, options: &Options) -> Result<Box<dyn Conn>>;
}

/// A transport that layers a protocol over an existing connection.
///
/// Both operations take ownership of the inner connection; on error
/// the tunnel closes it before returning (dropping it suffices).
pub trait TunnelTransport: Transport {
    /// Run the client side of the layer's handshake over `inner`.
    fn client(
        &self,
        inner: Box<dyn Conn>,
        raddr: &Multiaddr,
        options: &Options,
    ) -> Result<Box<dyn Conn>>;

    /// Run the server side of the layer's handshake over `inner`.
    fn server(
        &self,
        inner: Box<dyn Conn>,
        laddr: &Multiaddr,
        options: &Options,
    ) -> Result<Box<dyn Conn>>;
}

/// Registry entry: a transport tagged by its role.
#[derive(Clone)]
pub enum TransportEntry {
    /// Owns the bottom of the chain.
    Native(Arc<dyn NativeTransport>),
    /// Wraps a lower connection.
    Tunnel(Arc<dyn TunnelTransport>),
}

impl TransportEntry {
    /// Display name of the wrapped transport.
    pub fn name(&self) -> &str {
        match self {
            Self::Native(t) => t.name(),
            Self::Tunnel(t) => t.name(),
        }
    }

    /// Protocol descriptors of the wrapped transport.
    pub fn protocols(&self) -> Vec<Protocol> {
        match self {
            Self::Native(t) => t.protocols(),
            Self::Tunnel(t) => t.protocols(),
        }
    }

    /// Whether both entries wrap the same transport instance.
    /// Registration is idempotent exactly for this case.
    pub(crate) fn same_instance(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Native(a), Self::Native(b)) => Arc::ptr_eq(a, b),
            (Self::Tunnel(a), Self::Tunnel(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
