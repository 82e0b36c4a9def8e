// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protocol descriptors and the process-global descriptor table.
//!
//! Every tag that may appear in a multi-component address has a
//! descriptor here. The table is seeded with the standard network
//! protocols and extended at transport registration time for
//! framework-specific tags (`kcp`, `tls`, ...).

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

use parking_lot::RwLock;

use super::varint::encode_varint;
use crate::error::{Error, Result};

/// How many value bytes a protocol carries in the binary address form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSize {
    /// The protocol has no value (`/tls`).
    Zero,
    /// Fixed bit width (`/ip4/...` is 32 bits).
    Fixed(u32),
    /// Length-prefixed variable size (`/dns/...`).
    Variable,
}

/// Validation rules for the textual value of a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCodec {
    /// Dotted-quad IPv4 address.
    Ip4,
    /// IPv6 address.
    Ip6,
    /// 16-bit port number.
    Port,
    /// Free-form path segment.
    Text,
}

impl ValueCodec {
    fn validate(self, value: &str) -> Result<()> {
        let ok = match self {
            Self::Ip4 => value.parse::<Ipv4Addr>().is_ok(),
            Self::Ip6 => value.parse::<Ipv6Addr>().is_ok(),
            Self::Port => value.parse::<u16>().is_ok(),
            Self::Text => !value.is_empty(),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::Addr(format!("invalid {:?} value {:?}", self, value)))
        }
    }
}

/// Descriptor for one protocol tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    name: String,
    code: u32,
    vcode: Vec<u8>,
    size: ValueSize,
    codec: Option<ValueCodec>,
}

impl Protocol {
    /// Build a descriptor. `codec` must be given iff `size` is non-zero.
    pub fn new(name: &str, code: u32, size: ValueSize, codec: Option<ValueCodec>) -> Self {
        Self {
            name: name.to_string(),
            code,
            vcode: encode_varint(code),
            size,
            codec,
        }
    }

    /// The textual tag (`tcp`, `tls`, ...).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The numeric multiformats-style code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// ULEB128 encoding of [`Self::code`].
    pub fn vcode(&self) -> &[u8] {
        &self.vcode
    }

    /// Value width of this protocol.
    pub fn size(&self) -> ValueSize {
        self.size
    }

    /// Whether the protocol carries a value in the address text.
    pub fn has_value(&self) -> bool {
        self.size != ValueSize::Zero
    }

    pub(crate) fn validate_value(&self, value: &str) -> Result<()> {
        match self.codec {
            Some(codec) => codec.validate(value),
            None => Err(Error::Addr(format!(
                "protocol {} does not take a value",
                self.name
            ))),
        }
    }
}

fn table() -> &'static RwLock<HashMap<String, Protocol>> {
    static TABLE: OnceLock<RwLock<HashMap<String, Protocol>>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut map = HashMap::new();
        for proto in standard_protocols() {
            map.insert(proto.name.clone(), proto);
        }
        RwLock::new(map)
    })
}

/// The standard network protocols every address may use, with their
/// multiformats codes.
fn standard_protocols() -> Vec<Protocol> {
    vec![
        Protocol::new("ip4", 4, ValueSize::Fixed(32), Some(ValueCodec::Ip4)),
        Protocol::new("ip6", 41, ValueSize::Fixed(128), Some(ValueCodec::Ip6)),
        Protocol::new("tcp", 6, ValueSize::Fixed(16), Some(ValueCodec::Port)),
        Protocol::new("udp", 273, ValueSize::Fixed(16), Some(ValueCodec::Port)),
        Protocol::new("dns", 53, ValueSize::Variable, Some(ValueCodec::Text)),
        Protocol::new("dns4", 54, ValueSize::Variable, Some(ValueCodec::Text)),
        Protocol::new("dns6", 55, ValueSize::Variable, Some(ValueCodec::Text)),
    ]
}

/// Look up a protocol descriptor by tag.
pub fn protocol(name: &str) -> Option<Protocol> {
    table().read().get(name).cloned()
}

/// Register a protocol descriptor.
///
/// Re-registering an identical descriptor is a no-op; a conflicting
/// descriptor under an existing tag is rejected.
pub fn add_protocol(proto: Protocol) -> Result<()> {
    let mut map = table().write();
    match map.get(proto.name()) {
        Some(existing) if *existing == proto => Ok(()),
        Some(_) => Err(Error::Addr(format!(
            "protocol {} already registered with a different descriptor",
            proto.name()
        ))),
        None => {
            map.insert(proto.name().to_string(), proto);
            Ok(())
        }
    }
}

/// Install a descriptor only if the tag is not already known.
///
/// Used by transport registration, which must not disturb descriptors
/// the address library already carries.
pub(crate) fn install_protocol(proto: Protocol) {
    let mut map = table().write();
    map.entry(proto.name().to_string()).or_insert(proto);
}
