// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end dial/listen with the identity-authenticated TLS tunnel
//! layered over TCP.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;

use stf::key::{random_key, IdentityKey};
use stf::transport::{tcp, tls};
use stf::{dial, listen, Context, Error, Multiaddr, Result};

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn register_all() {
    tcp::register();
    tls::register();
}

#[test]
fn tls_chain_exchanges_identity_keys() {
    register_all();
    let laddr = Multiaddr::new(&format!("/ip4/127.0.0.1/tcp/{}/tls", free_port())).unwrap();

    let client_key = random_key("p256").unwrap();
    let server_key = random_key("p256").unwrap();

    let mut listener = listen(&laddr, vec![tls::with_key(server_key.clone())]).unwrap();
    assert_eq!(listener.addr(), &laddr);

    let server = {
        let server_key = server_key.clone();
        std::thread::spawn(move || {
            let mut conn = listener.accept().unwrap();

            let mut buf = [0u8; 6];
            conn.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"secret");
            conn.write_all(b"indeed").unwrap();

            let view = tls::tls_conn(conn.as_ref()).unwrap();
            assert_eq!(view.local_key(), &server_key.public_bytes()[..]);
            view.remote_key().recv()
        })
    };

    let mut conn = dial(
        &Context::background(),
        &laddr,
        vec![tls::with_key(client_key.clone())],
    )
    .unwrap();

    conn.write_all(b"secret").unwrap();
    let mut buf = [0u8; 6];
    conn.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"indeed");

    let view = tls::tls_conn(conn.as_ref()).unwrap();
    assert_eq!(view.remote_key().recv(), Some(server_key.public_bytes()));

    let client_key_seen = server.join().unwrap();
    assert_eq!(client_key_seen, Some(client_key.public_bytes()));
}

#[test]
fn tls_chain_addresses_carry_chain_tags() {
    register_all();
    let laddr = Multiaddr::new(&format!("/ip4/127.0.0.1/tcp/{}/tls", free_port())).unwrap();

    let mut listener = listen(&laddr, vec![tls::with_key(random_key("p256").unwrap())]).unwrap();
    let server = std::thread::spawn(move || listener.accept().map(|_| ()));

    let conn = dial(
        &Context::background(),
        &laddr,
        vec![tls::with_key(random_key("ed25519").unwrap())],
    )
    .unwrap();

    let tags: Vec<&str> = conn
        .local_addr()
        .components()
        .iter()
        .map(|c| c.tag())
        .collect();
    assert_eq!(tags, ["ip4", "tcp", "tls"]);
    assert!(conn.remote_addr().to_string().ends_with("/tls"));

    // tls -> tcp -> nothing.
    let below = conn.underlying().unwrap();
    assert!(below.underlying().is_none());

    server.join().unwrap().unwrap();
}

#[test]
fn tls_chain_missing_key_fails() {
    register_all();
    let laddr = Multiaddr::new(&format!("/ip4/127.0.0.1/tcp/{}/tls", free_port())).unwrap();

    let mut listener = listen(&laddr, vec![tls::with_key(random_key("p256").unwrap())]).unwrap();
    let server = std::thread::spawn(move || {
        // The native accept sees the dialer's socket close as soon as
        // the keyless dial aborts, so the tunnel handshake errors out.
        let _ = listener.accept();
    });

    match dial(&Context::background(), &laddr, Vec::new()) {
        Err(Error::MissingResource(msg)) => assert!(msg.contains("key")),
        other => panic!("expected missing resource, got {:?}", other.err()),
    }

    server.join().unwrap();
}

/// A key whose provider name no local verifier knows.
struct EthKey {
    inner: Arc<dyn IdentityKey>,
}

impl IdentityKey for EthKey {
    fn provider(&self) -> &str {
        "eth"
    }

    fn public_bytes(&self) -> Vec<u8> {
        self.inner.public_bytes()
    }

    fn sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        self.inner.sign(msg)
    }
}

#[test]
fn tls_chain_unknown_provider_fails_handshake() {
    register_all();
    let laddr = Multiaddr::new(&format!("/ip4/127.0.0.1/tcp/{}/tls", free_port())).unwrap();

    // The server signs with a scheme the client cannot verify.
    let eth_key: Arc<dyn IdentityKey> = Arc::new(EthKey {
        inner: random_key("p256").unwrap(),
    });

    let mut listener = listen(&laddr, vec![tls::with_key(eth_key)]).unwrap();
    let server = std::thread::spawn(move || {
        // The accept side fails alongside the dialer.
        let _ = listener.accept();
    });

    match dial(
        &Context::background(),
        &laddr,
        vec![tls::with_key(random_key("p256").unwrap())],
    ) {
        Err(Error::Handshake(msg)) => assert!(msg.contains("signature invalid")),
        other => panic!("expected handshake failure, got {:?}", other.err()),
    }

    server.join().unwrap();
}
