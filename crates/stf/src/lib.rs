// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # STF - Stacked Transport Framework
//!
//! Builds a single byte-stream connection by composing an ordered
//! chain of transport layers named by a self-describing
//! multi-component address. The bottom layer (*native*) terminates on
//! the network; every layer above it (*tunnel*) transforms the bytes
//! of the stream beneath it on both ends.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stf::{dial, listen, Context, Multiaddr, Result};
//! use stf::transport::{tcp, tls};
//!
//! fn main() -> Result<()> {
//!     // Register transports once at startup.
//!     tcp::register();
//!     tls::register();
//!
//!     let key = stf::key::random_key("p256")?;
//!     let addr = Multiaddr::new("/ip4/127.0.0.1/tcp/1812/tls")?;
//!
//!     // TCP underneath, identity-authenticated TLS on top.
//!     let mut conn = dial(&Context::background(), &addr, vec![tls::with_key(key)])?;
//!     std::io::Write::write_all(&mut conn, b"hello")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                     dial() / listen()                        |
//! |     option application -> config tree -> composition         |
//! +--------------------------------------------------------------+
//! |                        Resolver                              |
//! |   walk address top-down, find native, order tunnels          |
//! +--------------------------------------------------------------+
//! |                   Transport registry                         |
//! |        protocol tag -> Native{dial,listen} | Tunnel{...}     |
//! +--------------------------------------------------------------+
//! |    Native: tcp, ...          Tunnels: tls, ...               |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Multiaddr`] | Stacked `/tag/value` address naming the whole chain |
//! | [`Conn`] | Byte stream carrying full-chain addresses |
//! | [`Listener`] | Accepts fully-composed connections |
//! | [`Options`] | Per-call config tree + object side-table |
//! | [`TransportEntry`] | Registered transport, tagged native or tunnel |
//!
//! Addresses are authoritative: there is no negotiation of layer
//! order. `/ip4/127.0.0.1/udp/1813/kcp/tls` always means "KCP native
//! transport, TLS tunnel on top".

/// Connection and listener abstractions.
pub mod conn;
/// Dial deadline context.
pub mod context;
/// Error taxonomy.
pub mod error;
/// Long-term identity keys and providers.
pub mod key;
/// Multi-component addresses and protocol descriptors.
pub mod multiaddr;
/// Per-call options bag.
pub mod options;
/// Transport traits and concrete transports.
pub mod transport;

mod dial;
mod listen;
mod registry;
mod resolver;

#[cfg(test)]
mod testutil;

pub use conn::{Conn, Listener};
pub use context::Context;
pub use dial::dial;
pub use error::{Error, Result};
pub use listen::listen;
pub use multiaddr::Multiaddr;
pub use options::{Options, TransportOption};
pub use registry::{lookup_transport, register_transport, try_register_transport};
pub use transport::{NativeTransport, Transport, TransportEntry, TunnelTransport};
