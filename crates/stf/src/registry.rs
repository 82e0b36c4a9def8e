// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-global transport registry.
//!
//! Maps protocol tags to registered transports. Registration happens
//! at program initialization through explicit `register()` calls on
//! the concrete transports; lookups dominate afterwards, so the map
//! sits behind a reader-writer lock.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::multiaddr::protocol::install_protocol;
use crate::transport::TransportEntry;

fn registry() -> &'static RwLock<HashMap<String, TransportEntry>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, TransportEntry>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a transport under every tag in its protocol list.
///
/// The call is atomic: if any tag is already bound to a *different*
/// transport, nothing is inserted. Re-registering the same transport
/// instance is a no-op. Descriptors for tags the address library does
/// not know yet are installed as a side effect; descriptors it already
/// carries are left untouched.
pub fn try_register_transport(entry: TransportEntry) -> Result<()> {
    let protocols = entry.protocols();
    if protocols.is_empty() {
        return Err(Error::Config(format!(
            "transport {} claims no protocols",
            entry.name()
        )));
    }

    let mut map = registry().write();

    for proto in &protocols {
        if let Some(existing) = map.get(proto.name()) {
            if !existing.same_instance(&entry) {
                return Err(Error::DuplicateTransport(format!(
                    "transport {} protocol {} already registered by {}",
                    entry.name(),
                    proto.name(),
                    existing.name()
                )));
            }
        }
    }

    for proto in &protocols {
        install_protocol(proto.clone());
        map.entry(proto.name().to_string())
            .or_insert_with(|| entry.clone());
    }

    log::debug!(
        "registered transport {} for {} protocol(s)",
        entry.name(),
        protocols.len()
    );
    Ok(())
}

/// Register a transport, panicking on conflict.
///
/// Duplicate registration of distinct transports is a programmer
/// error and fatal at initialization time.
pub fn register_transport(entry: TransportEntry) {
    if let Err(e) = try_register_transport(entry) {
        panic!("{}", e);
    }
}

/// Look up the transport bound to a protocol tag.
pub fn lookup_transport(tag: &str) -> Option<TransportEntry> {
    registry().read().get(tag).cloned()
}
