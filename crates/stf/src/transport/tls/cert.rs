// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ephemeral certificates and peer verification.
//!
//! Each session generates a fresh P-256 certificate whose public key
//! is signed by the long-term identity key. The signature travels in
//! a certificate extension:
//!
//! ```text
//! OID 1.3.6.1.4.1.53594.1.1, non-critical
//! value = SEQUENCE {
//!     provider   UTF8String    -- identity key scheme name
//!     pubKey     OCTET STRING  -- identity public key
//!     signature  OCTET STRING  -- over "stf4go-transport-tls-handshake:" || SPKI
//! }
//! ```
//!
//! The verifiers here replace PKI validation on both sides: they pin
//! the chain to exactly one self-signed certificate, check its own
//! signature, then check the identity signature over the certificate's
//! SPKI and hand the identity public key to the connection.

use std::sync::Arc;

use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_ASN1};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{CipherSuite, DigitallySignedStruct, DistinguishedName, SignatureScheme};
use x509_parser::prelude::*;

use super::{key_slot, KeyReceiver, KeySender};
use crate::error::{Error, Result};
use crate::key::{self, IdentityKey};

/// Prefix of the signed content, per the wire contract.
pub(crate) const CERT_PREFIX: &[u8] = b"stf4go-transport-tls-handshake:";

/// ALPN token both sides must offer.
pub(crate) const ALPN: &[u8] = b"stf4go-transport-tls";

/// Extension OID carrying the signed identity key.
const EXTENSION_OID: [u64; 9] = [1, 3, 6, 1, 4, 1, 53594, 1, 1];
const EXTENSION_OID_TEXT: &str = "1.3.6.1.4.1.53594.1.1";

/// Certificate lifetime, roughly 100 years.
const CERT_VALIDITY_DAYS: i64 = 100 * 365;

// ============================================================================
// Signed-key DER codec
// ============================================================================

const TAG_SEQUENCE: u8 = 0x30;
const TAG_UTF8_STRING: u8 = 0x0C;
const TAG_OCTET_STRING: u8 = 0x04;

/// The identity material embedded in the certificate extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignedKey {
    pub provider: String,
    pub public_key: Vec<u8>,
    pub signature: Vec<u8>,
}

fn der_push_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
}

fn der_read_tlv(input: &[u8], expected_tag: u8) -> Result<(&[u8], &[u8])> {
    let malformed = || Error::Handshake("malformed signed-key encoding".to_string());
    let (&tag, rest) = input.split_first().ok_or_else(malformed)?;
    if tag != expected_tag {
        return Err(Error::Handshake(format!(
            "unexpected tag {:#04x} in signed-key encoding",
            tag
        )));
    }
    let (&first, rest) = rest.split_first().ok_or_else(malformed)?;
    let (len, rest) = if first < 0x80 {
        (usize::from(first), rest)
    } else {
        let count = usize::from(first & 0x7F);
        // Four length bytes bound the value at 4 GiB, far beyond any
        // certificate extension.
        if count == 0 || count > 4 || rest.len() < count {
            return Err(malformed());
        }
        let mut len: usize = 0;
        for &b in &rest[..count] {
            len = (len << 8) | usize::from(b);
        }
        (len, &rest[count..])
    };
    if rest.len() < len {
        return Err(malformed());
    }
    Ok(rest.split_at(len))
}

pub(crate) fn encode_signed_key(sk: &SignedKey) -> Vec<u8> {
    let mut body = Vec::new();
    der_push_tlv(&mut body, TAG_UTF8_STRING, sk.provider.as_bytes());
    der_push_tlv(&mut body, TAG_OCTET_STRING, &sk.public_key);
    der_push_tlv(&mut body, TAG_OCTET_STRING, &sk.signature);

    let mut out = Vec::new();
    der_push_tlv(&mut out, TAG_SEQUENCE, &body);
    out
}

pub(crate) fn decode_signed_key(der: &[u8]) -> Result<SignedKey> {
    let (body, rest) = der_read_tlv(der, TAG_SEQUENCE)?;
    if !rest.is_empty() {
        return Err(Error::Handshake(
            "trailing bytes after signed-key sequence".to_string(),
        ));
    }
    let (provider, body) = der_read_tlv(body, TAG_UTF8_STRING)?;
    let (public_key, body) = der_read_tlv(body, TAG_OCTET_STRING)?;
    let (signature, body) = der_read_tlv(body, TAG_OCTET_STRING)?;
    if !body.is_empty() {
        return Err(Error::Handshake(
            "trailing bytes inside signed-key sequence".to_string(),
        ));
    }
    let provider = std::str::from_utf8(provider)
        .map_err(|_| Error::Handshake("signed-key provider is not utf-8".to_string()))?;
    Ok(SignedKey {
        provider: provider.to_string(),
        public_key: public_key.to_vec(),
        signature: signature.to_vec(),
    })
}

// ============================================================================
// Ephemeral certificate generation
// ============================================================================

fn random_serial() -> Result<u64> {
    let rng = ring::rand::SystemRandom::new();
    let bytes: [u8; 8] = ring::rand::generate(&rng)
        .map_err(|_| Error::Handshake("serial generation failed".to_string()))?
        .expose();
    // Serial must land in [0, 2^62).
    Ok(u64::from_be_bytes(bytes) & ((1 << 62) - 1))
}

/// Generate the per-session self-signed certificate binding a fresh
/// P-256 key to the long-term identity key.
pub(crate) fn generate_certificate(
    identity: &dyn IdentityKey,
) -> Result<(CertificateDer<'static>, PrivateKeyDer<'static>)> {
    let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
        .map_err(|e| Error::Handshake(format!("ephemeral key generation: {}", e)))?;

    let spki = key_pair.public_key_der();
    let mut msg = Vec::with_capacity(CERT_PREFIX.len() + spki.len());
    msg.extend_from_slice(CERT_PREFIX);
    msg.extend_from_slice(&spki);
    let signature = identity.sign(&msg)?;

    let signed = encode_signed_key(&SignedKey {
        provider: identity.provider().to_string(),
        public_key: identity.public_bytes(),
        signature,
    });

    let mut params = rcgen::CertificateParams::default();
    params.not_before = rcgen::date_time_ymd(1970, 1, 1);
    params.not_after = ::time::OffsetDateTime::now_utc() + ::time::Duration::days(CERT_VALIDITY_DAYS);
    params.serial_number = Some(rcgen::SerialNumber::from_slice(
        &random_serial()?.to_be_bytes(),
    ));
    params.distinguished_name = rcgen::DistinguishedName::new();
    params.custom_extensions = vec![rcgen::CustomExtension::from_oid_content(
        &EXTENSION_OID,
        signed,
    )];

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| Error::Handshake(format!("certificate generation: {}", e)))?;

    let cert_der = cert.der().clone();
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    Ok((cert_der, key_der))
}

// ============================================================================
// Peer verification
// ============================================================================

/// Check the peer's chain and extract its identity public key.
///
/// Exactly one self-signed certificate is accepted. The certificate's
/// own signature binds it to the ephemeral key; the extension's
/// identity signature binds that key to the long-term identity.
pub(crate) fn verify_peer_chain(
    end_entity: &CertificateDer<'_>,
    intermediates: &[CertificateDer<'_>],
) -> Result<Vec<u8>> {
    if !intermediates.is_empty() {
        return Err(Error::Handshake(
            "expected exactly one certificate in the chain".to_string(),
        ));
    }

    let (_, cert) = X509Certificate::from_der(end_entity.as_ref())
        .map_err(|e| Error::Handshake(format!("certificate parse: {}", e)))?;

    // Self-signature over the TBS bytes. Ephemeral certs are always
    // ECDSA P-256 with SHA-256.
    let spki_point = &cert.public_key().subject_public_key.data;
    let self_key = UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, spki_point.as_ref());
    self_key
        .verify(cert.tbs_certificate.as_ref(), cert.signature_value.as_ref())
        .map_err(|_| Error::Handshake("certificate self-signature invalid".to_string()))?;

    let ext = cert
        .extensions()
        .iter()
        .find(|e| e.oid.to_id_string() == EXTENSION_OID_TEXT)
        .ok_or_else(|| {
            Error::Handshake("expected certificate to contain the key extension".to_string())
        })?;
    let signed = decode_signed_key(ext.value)?;

    let spki = cert.public_key().raw;
    let mut msg = Vec::with_capacity(CERT_PREFIX.len() + spki.len());
    msg.extend_from_slice(CERT_PREFIX);
    msg.extend_from_slice(spki);

    if !key::verify(&signed.provider, &msg, &signed.public_key, &signed.signature) {
        return Err(Error::Handshake("signature invalid".to_string()));
    }

    Ok(signed.public_key)
}

/// Replaces PKI validation on both sides of the handshake.
///
/// On success the peer's identity key lands in the connection's
/// remote-key slot; TLS 1.3 CertificateVerify signatures are still
/// checked against the presented certificate.
struct PeerKeyVerifier {
    sender: KeySender,
    algorithms: WebPkiSupportedAlgorithms,
}

impl std::fmt::Debug for PeerKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerKeyVerifier").finish()
    }
}

impl PeerKeyVerifier {
    fn check(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
    ) -> std::result::Result<(), rustls::Error> {
        let public_key = verify_peer_chain(end_entity, intermediates)
            .map_err(|e| rustls::Error::General(e.to_string()))?;
        self.sender.deliver(public_key);
        Ok(())
    }
}

impl ServerCertVerifier for PeerKeyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        self.check(end_entity, intermediates)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

impl ClientCertVerifier for PeerKeyVerifier {
    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, rustls::Error> {
        self.check(end_entity, intermediates)?;
        Ok(ClientCertVerified::assertion())
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

// ============================================================================
// Session configuration
// ============================================================================

/// AES hardware detection, mirroring the cipher-suite policy of the
/// wire protocol: peers without AES acceleration should end up on
/// ChaCha20-Poly1305.
fn has_aes_hardware() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        std::arch::is_x86_feature_detected!("aes")
            && std::arch::is_x86_feature_detected!("pclmulqdq")
    }
    #[cfg(target_arch = "aarch64")]
    {
        std::arch::is_aarch64_feature_detected!("aes")
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        false
    }
}

fn crypto_provider() -> rustls::crypto::CryptoProvider {
    let mut provider = rustls::crypto::ring::default_provider();
    if !has_aes_hardware() {
        provider
            .cipher_suites
            .sort_by_key(|suite| match suite.suite() {
                CipherSuite::TLS13_CHACHA20_POLY1305_SHA256 => 0,
                _ => 1,
            });
    }
    provider
}

/// Client-side session config plus the slot the verifier will fill
/// with the server's identity key.
pub(crate) fn client_config(
    identity: &dyn IdentityKey,
) -> Result<(rustls::ClientConfig, KeyReceiver)> {
    let (cert, key_der) = generate_certificate(identity)?;
    let (sender, receiver) = key_slot();
    let provider = Arc::new(crypto_provider());
    let verifier = Arc::new(PeerKeyVerifier {
        sender,
        algorithms: provider.signature_verification_algorithms,
    });

    let mut config = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| Error::Handshake(format!("tls client config: {}", e)))?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_auth_cert(vec![cert], key_der)
        .map_err(|e| Error::Handshake(format!("tls client cert: {}", e)))?;

    config.alpn_protocols = vec![ALPN.to_vec()];
    config.resumption = rustls::client::Resumption::disabled();
    config.enable_sni = false;
    Ok((config, receiver))
}

/// Server-side session config plus the slot the verifier will fill
/// with the client's identity key.
pub(crate) fn server_config(
    identity: &dyn IdentityKey,
) -> Result<(rustls::ServerConfig, KeyReceiver)> {
    let (cert, key_der) = generate_certificate(identity)?;
    let (sender, receiver) = key_slot();
    let provider = Arc::new(crypto_provider());
    let verifier = Arc::new(PeerKeyVerifier {
        sender,
        algorithms: provider.signature_verification_algorithms,
    });

    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| Error::Handshake(format!("tls server config: {}", e)))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(vec![cert], key_der)
        .map_err(|e| Error::Handshake(format!("tls server cert: {}", e)))?;

    config.alpn_protocols = vec![ALPN.to_vec()];
    // Session resumption is disabled on the wire.
    config.send_tls13_tickets = 0;
    // Without AES hardware the local suite order (ChaCha first) wins;
    // with it, the client's preference is honored.
    config.ignore_client_order = !has_aes_hardware();
    Ok((config, receiver))
}
