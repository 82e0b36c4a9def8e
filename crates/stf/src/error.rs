// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the transport framework.

use std::fmt;
use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by address handling, transport resolution, and the
/// dial/listen engine.
#[derive(Debug)]
pub enum Error {
    /// Address text or component structure is malformed.
    Addr(String),

    /// Protocol tag is not known to the address library.
    UnknownProtocol(String),

    /// A transport with the wrong role sits at this chain position
    /// (e.g. a tunnel at the base of the chain).
    TransportRole(String),

    /// The chain resolved without ever reaching a native transport.
    NoNativeTransport(String),

    /// Two distinct transports claimed the same protocol tag.
    DuplicateTransport(String),

    /// A resource required by a layer (e.g. the TLS identity key) is
    /// missing from the options bag.
    MissingResource(String),

    /// TLS handshake error or peer-certificate rejection.
    Handshake(String),

    /// Config tree write or typed decode failed.
    Config(String),

    /// I/O failure from a transport, with the failing operation named.
    Io {
        /// What the framework was doing when the error occurred.
        context: String,
        /// The underlying I/O error.
        source: io::Error,
    },
}

impl Error {
    /// Wrap an I/O error with the failing operation's context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Prefix the error with the failing operation, keeping its kind.
    pub fn context(self, context: impl Into<String>) -> Self {
        let context = context.into();
        match self {
            Self::Io {
                context: inner,
                source,
            } => Self::Io {
                context: format!("{}: {}", context, inner),
                source,
            },
            Self::Addr(msg) => Self::Addr(format!("{}: {}", context, msg)),
            Self::Handshake(msg) => Self::Handshake(format!("{}: {}", context, msg)),
            Self::MissingResource(msg) => Self::MissingResource(format!("{}: {}", context, msg)),
            Self::Config(msg) => Self::Config(format!("{}: {}", context, msg)),
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Addr(msg) => write!(f, "multiaddr error: {}", msg),
            Self::UnknownProtocol(tag) => write!(f, "unknown protocol: {}", tag),
            Self::TransportRole(msg) => write!(f, "wrong transport role: {}", msg),
            Self::NoNativeTransport(msg) => write!(f, "no native transport in chain: {}", msg),
            Self::DuplicateTransport(msg) => write!(f, "duplicate transport registration: {}", msg),
            Self::MissingResource(msg) => write!(f, "missing resource: {}", msg),
            Self::Handshake(msg) => write!(f, "handshake failed: {}", msg),
            Self::Config(msg) => write!(f, "config error: {}", msg),
            Self::Io { context, source } => write!(f, "{}: {}", context, source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io {
            context: "i/o error".to_string(),
            source: e,
        }
    }
}
