// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end dial/listen over the TCP native transport.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::{Duration, SystemTime};

use stf::transport::tcp;
use stf::{dial, listen, Context, Multiaddr};

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[test]
fn tcp_chain_round_trip() {
    tcp::register();
    let laddr = Multiaddr::new(&format!("/ip4/127.0.0.1/tcp/{}", free_port())).unwrap();
    let mut listener = listen(&laddr, Vec::new()).unwrap();
    assert_eq!(listener.addr(), &laddr);

    let server = std::thread::spawn(move || {
        let mut conn = listener.accept().unwrap();
        let mut buf = [0u8; 11];
        conn.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello world");
        conn.write_all(b"hello back!").unwrap();
    });

    let mut conn = dial(&Context::background(), &laddr, Vec::new()).unwrap();
    conn.write_all(b"hello world").unwrap();
    let mut buf = [0u8; 11];
    conn.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"hello back!");

    server.join().unwrap();
}

#[test]
fn tcp_chain_addresses_carry_chain_tags() {
    tcp::register();
    let port = free_port();
    let laddr = Multiaddr::new(&format!("/ip4/127.0.0.1/tcp/{}", port)).unwrap();
    let mut listener = listen(&laddr, Vec::new()).unwrap();

    let server = std::thread::spawn(move || listener.accept().map(|_| ()));

    let conn = dial(&Context::background(), &laddr, Vec::new()).unwrap();
    let tags: Vec<&str> = conn
        .local_addr()
        .components()
        .iter()
        .map(|c| c.tag())
        .collect();
    assert_eq!(tags, ["ip4", "tcp"]);
    assert_eq!(
        conn.remote_addr().to_string(),
        format!("/ip4/127.0.0.1/tcp/{}", port)
    );
    assert!(conn.underlying().is_none());

    server.join().unwrap().unwrap();
}

#[test]
fn tcp_read_deadline_times_out() {
    tcp::register();
    let laddr = Multiaddr::new(&format!("/ip4/127.0.0.1/tcp/{}", free_port())).unwrap();
    let mut listener = listen(&laddr, Vec::new()).unwrap();

    let server = std::thread::spawn(move || {
        // Accept and hold the conn open without writing anything.
        let conn = listener.accept().unwrap();
        std::thread::sleep(Duration::from_millis(300));
        drop(conn);
    });

    let mut conn = dial(&Context::background(), &laddr, Vec::new()).unwrap();
    conn.set_read_deadline(Some(SystemTime::now() + Duration::from_millis(50)))
        .unwrap();

    let mut buf = [0u8; 1];
    let err = conn.read(&mut buf).expect_err("read must time out");
    assert!(
        matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ),
        "unexpected error kind: {:?}",
        err.kind()
    );

    // Clearing the deadline disables the timeout again.
    conn.set_read_deadline(None).unwrap();
    server.join().unwrap();
}
