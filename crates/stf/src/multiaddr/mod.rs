// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-component addresses.
//!
//! An address is an ordered, non-empty stack of `/tag[/value]`
//! components, each tag backed by a registered [`Protocol`] descriptor:
//!
//! ```text
//! /ip4/127.0.0.1/udp/1813/kcp/tls
//! ```
//!
//! The bottom components name the wire (here ip4+udp+kcp); everything
//! above is a tunnel layer. Addresses are immutable values: splitting,
//! joining, and encapsulation all produce new addresses.

/// Protocol descriptors and the global descriptor table.
pub mod protocol;
/// ULEB128 encoding for protocol codes.
pub mod varint;

use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use crate::error::{Error, Result};

pub use protocol::{add_protocol, protocol as lookup_protocol, Protocol, ValueCodec, ValueSize};

/// One `/tag[/value]` component of an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    tag: String,
    value: Option<String>,
}

impl Component {
    /// The protocol tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The textual value, if the protocol carries one.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "/{}/{}", self.tag, value),
            None => write!(f, "/{}", self.tag),
        }
    }
}

/// A parsed multi-component address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Multiaddr {
    components: Vec<Component>,
}

impl Multiaddr {
    /// Parse an address from its textual form.
    ///
    /// Every tag must be known to the protocol table, and every value
    /// must satisfy its protocol's codec.
    pub fn new(text: &str) -> Result<Self> {
        let rest = text
            .strip_prefix('/')
            .ok_or_else(|| Error::Addr(format!("multiaddr must start with '/': {:?}", text)))?;
        if rest.is_empty() {
            return Err(Error::Addr("empty multiaddr".to_string()));
        }

        let mut segments = rest.split('/');
        let mut components = Vec::new();
        while let Some(tag) = segments.next() {
            if tag.is_empty() {
                return Err(Error::Addr(format!("empty protocol tag in {:?}", text)));
            }
            let proto =
                protocol::protocol(tag).ok_or_else(|| Error::UnknownProtocol(tag.to_string()))?;
            let value = if proto.has_value() {
                let value = segments.next().ok_or_else(|| {
                    Error::Addr(format!("protocol {} requires a value in {:?}", tag, text))
                })?;
                proto.validate_value(value)?;
                Some(value.to_string())
            } else {
                None
            };
            components.push(Component {
                tag: tag.to_string(),
                value,
            });
        }

        Ok(Self { components })
    }

    /// The components of this address, bottom first.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// The tag of the first (bottom-most) component.
    pub fn leading_tag(&self) -> &str {
        &self.components[0].tag
    }

    /// Split into single-component addresses, preserving order.
    pub fn split(&self) -> Vec<Multiaddr> {
        self.components
            .iter()
            .map(|c| Multiaddr {
                components: vec![c.clone()],
            })
            .collect()
    }

    /// Concatenate addresses back into one.
    pub fn join(addrs: &[Multiaddr]) -> Result<Multiaddr> {
        if addrs.is_empty() {
            return Err(Error::Addr("cannot join zero addresses".to_string()));
        }
        let components = addrs
            .iter()
            .flat_map(|a| a.components.iter().cloned())
            .collect();
        Ok(Multiaddr { components })
    }

    /// Append `other` on top of this address.
    pub fn encapsulate(&self, other: &Multiaddr) -> Multiaddr {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Multiaddr { components }
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for Multiaddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Multiaddr::new(s)
    }
}

/// Convert the bottom host+port components into a socket address.
///
/// The address must begin with an `ip4`, `ip6`, or `dns*` component
/// followed by a `tcp` or `udp` component; further components above
/// are ignored. DNS names are resolved through the system resolver.
pub fn to_socket_addr(addr: &Multiaddr) -> Result<SocketAddr> {
    let comps = addr.components();
    if comps.len() < 2 {
        return Err(Error::Addr(format!(
            "multiaddr stack needs host and port layers, got {}",
            addr
        )));
    }

    let port_comp = &comps[1];
    if port_comp.tag() != "tcp" && port_comp.tag() != "udp" {
        return Err(Error::Addr(format!(
            "expected tcp or udp above the host layer, got {} in {}",
            port_comp.tag(),
            addr
        )));
    }
    let port: u16 = port_comp
        .value()
        .unwrap_or_default()
        .parse()
        .map_err(|_| Error::Addr(format!("invalid port in {}", addr)))?;

    let host = &comps[0];
    let value = host.value().unwrap_or_default();
    match host.tag() {
        "ip4" | "ip6" => {
            let ip: IpAddr = value
                .parse()
                .map_err(|_| Error::Addr(format!("invalid ip in {}", addr)))?;
            Ok(SocketAddr::new(ip, port))
        }
        "dns" | "dns4" | "dns6" => (value, port)
            .to_socket_addrs()
            .map_err(|e| Error::io(format!("resolve {}", value), e))?
            .next()
            .ok_or_else(|| Error::Addr(format!("{} resolved to no addresses", value))),
        other => Err(Error::Addr(format!(
            "expected a host protocol at the base, got {} in {}",
            other, addr
        ))),
    }
}

/// Build an address from a socket address plus the port-layer tag
/// (`tcp` or `udp`).
pub fn from_socket_addr(addr: SocketAddr, port_tag: &str) -> Result<Multiaddr> {
    let text = match addr.ip() {
        IpAddr::V4(ip) => format!("/ip4/{}/{}/{}", ip, port_tag, addr.port()),
        IpAddr::V6(ip) => format!("/ip6/{}/{}/{}", ip, port_tag, addr.port()),
    };
    Multiaddr::new(&text)
}
