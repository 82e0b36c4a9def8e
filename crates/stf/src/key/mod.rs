// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Long-term identity keys.
//!
//! An identity key proves a peer's identity across TLS sessions: the
//! TLS tunnel signs each session's ephemeral certificate key with it
//! and ships the signature inside the certificate. Keys belong to a
//! named *provider* (signature scheme); verification is dispatched by
//! provider name, so peers can check signatures from any scheme they
//! have a provider for.
//!
//! Two providers are built in, both backed by `ring`:
//!
//! - `p256`: ECDSA P-256 with SHA-256, ASN.1 DER signatures
//! - `ed25519`: Ed25519
//!
//! Additional providers can be registered at process start with
//! [`register_provider`]. Verifying against an unregistered provider
//! name fails closed.

/// Ed25519 provider.
mod ed25519;
/// ECDSA P-256 provider.
mod p256;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// A long-term asymmetric identity key pair.
pub trait IdentityKey: Send + Sync {
    /// Name of the provider (signature scheme) this key belongs to.
    fn provider(&self) -> &str;

    /// Scheme-specific encoding of the public key.
    fn public_bytes(&self) -> Vec<u8>;

    /// Sign a message with the private key.
    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>>;
}

/// A named signature scheme: key generation plus verification.
pub trait KeyProvider: Send + Sync {
    /// The scheme name carried next to signatures on the wire.
    fn name(&self) -> &str;

    /// Generate a fresh key pair.
    fn generate(&self) -> Result<Arc<dyn IdentityKey>>;

    /// Verify `signature` over `msg` against an encoded public key.
    fn verify(&self, msg: &[u8], public_key: &[u8], signature: &[u8]) -> bool;
}

fn providers() -> &'static RwLock<HashMap<String, Arc<dyn KeyProvider>>> {
    static PROVIDERS: OnceLock<RwLock<HashMap<String, Arc<dyn KeyProvider>>>> = OnceLock::new();
    PROVIDERS.get_or_init(|| {
        let mut map: HashMap<String, Arc<dyn KeyProvider>> = HashMap::new();
        let p256: Arc<dyn KeyProvider> = Arc::new(p256::P256Provider);
        let ed25519: Arc<dyn KeyProvider> = Arc::new(ed25519::Ed25519Provider);
        map.insert(p256.name().to_string(), p256);
        map.insert(ed25519.name().to_string(), ed25519);
        RwLock::new(map)
    })
}

/// Register an additional key provider. Fails if the name is taken.
pub fn register_provider(provider: Arc<dyn KeyProvider>) -> Result<()> {
    let mut map = providers().write();
    if map.contains_key(provider.name()) {
        return Err(Error::Config(format!(
            "key provider {} already registered",
            provider.name()
        )));
    }
    map.insert(provider.name().to_string(), provider);
    Ok(())
}

/// Generate a fresh key pair under the named provider.
pub fn random_key(provider: &str) -> Result<Arc<dyn IdentityKey>> {
    let found = providers().read().get(provider).cloned();
    match found {
        Some(p) => p.generate(),
        None => Err(Error::Config(format!(
            "key provider {} not registered",
            provider
        ))),
    }
}

/// Verify a signature under the named provider.
///
/// Returns `false` for unknown providers: a signature from a scheme
/// this process cannot check never validates.
pub fn verify(provider: &str, msg: &[u8], public_key: &[u8], signature: &[u8]) -> bool {
    match providers().read().get(provider) {
        Some(p) => p.verify(msg, public_key, signature),
        None => false,
    }
}
