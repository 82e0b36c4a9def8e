// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ECDSA P-256 identity keys.
//!
//! Public keys are the uncompressed SEC1 point (65 bytes); signatures
//! are ASN.1 DER as produced by `ECDSA_P256_SHA256_ASN1_SIGNING`.

use std::sync::Arc;

use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, UnparsedPublicKey, ECDSA_P256_SHA256_ASN1,
    ECDSA_P256_SHA256_ASN1_SIGNING,
};

use super::{IdentityKey, KeyProvider};
use crate::error::{Error, Result};

const PROVIDER_NAME: &str = "p256";

pub(super) struct P256Provider;

impl KeyProvider for P256Provider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn generate(&self) -> Result<Arc<dyn IdentityKey>> {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .map_err(|_| Error::Config("p256 key generation failed".to_string()))?;
        let keypair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
            .map_err(|e| Error::Config(format!("p256 key rejected: {}", e)))?;
        Ok(Arc::new(P256Key { keypair, rng }))
    }

    fn verify(&self, msg: &[u8], public_key: &[u8], signature: &[u8]) -> bool {
        UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, public_key)
            .verify(msg, signature)
            .is_ok()
    }
}

struct P256Key {
    keypair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl IdentityKey for P256Key {
    fn provider(&self) -> &str {
        PROVIDER_NAME
    }

    fn public_bytes(&self) -> Vec<u8> {
        self.keypair.public_key().as_ref().to_vec()
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        self.keypair
            .sign(&self.rng, msg)
            .map(|sig| sig.as_ref().to_vec())
            .map_err(|_| Error::Handshake("p256 signing failed".to_string()))
    }
}
