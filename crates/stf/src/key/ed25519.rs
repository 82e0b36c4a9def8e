// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ed25519 identity keys. Public keys are the raw 32-byte point.

use std::sync::Arc;

use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};

use super::{IdentityKey, KeyProvider};
use crate::error::{Error, Result};

const PROVIDER_NAME: &str = "ed25519";

pub(super) struct Ed25519Provider;

impl KeyProvider for Ed25519Provider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn generate(&self) -> Result<Arc<dyn IdentityKey>> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| Error::Config("ed25519 key generation failed".to_string()))?;
        let keypair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
            .map_err(|e| Error::Config(format!("ed25519 key rejected: {}", e)))?;
        Ok(Arc::new(Ed25519Key { keypair }))
    }

    fn verify(&self, msg: &[u8], public_key: &[u8], signature: &[u8]) -> bool {
        UnparsedPublicKey::new(&ED25519, public_key)
            .verify(msg, signature)
            .is_ok()
    }
}

struct Ed25519Key {
    keypair: Ed25519KeyPair,
}

impl IdentityKey for Ed25519Key {
    fn provider(&self) -> &str {
        PROVIDER_NAME
    }

    fn public_bytes(&self) -> Vec<u8> {
        self.keypair.public_key().as_ref().to_vec()
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        Ok(self.keypair.sign(msg).as_ref().to_vec())
    }
}
