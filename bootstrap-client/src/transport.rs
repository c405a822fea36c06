//! Transient link ownership.
//!
//! One session owns at most one link to the issuer endpoint. The concrete
//! transport (WebSocket, unix socket, in-memory test double) is injected via
//! [`LinkFactory`]; [`TransportSlot`] enforces the at-most-one and
//! close-exactly-once guarantees regardless of the implementation.

use async_trait::async_trait;
use std::sync::Arc;

/// Errors establishing a link.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum LinkError {
    /// The endpoint name could not be resolved.
    #[error("could not resolve {uri}")]
    Unresolvable { uri: String },

    /// The endpoint refused or dropped the connection attempt.
    #[error("connection to {uri} failed: {reason}")]
    Refused { uri: String, reason: String },

    /// The TLS handshake with the endpoint failed.
    #[error("TLS handshake with {uri} failed: {reason}")]
    Handshake { uri: String, reason: String },
}

/// An open link to the issuer endpoint.
///
/// All profile/probe/issuance exchanges of a session travel over its single
/// link. `close` may be called at most once through [`TransportSlot`]; an
/// implementation still in the middle of an exchange must tolerate a
/// concurrent close (the exchange then surfaces an error).
pub trait Link: Send + Sync {
    fn close(&self);
}

/// Opens links to issuer endpoints.
#[async_trait]
pub trait LinkFactory: Send + Sync {
    /// Open a link to `uri`. `local` marks a same-host forwarder.
    async fn open_link(&self, uri: &str, local: bool) -> Result<Arc<dyn Link>, LinkError>;
}

/// Single-link slot owned by one enrollment session.
///
/// `disconnect` takes the link out; whoever receives it performs the one and
/// only `close` call, outside any session lock. A second `disconnect` (or a
/// `disconnect` on a never-opened slot) returns `None`.
pub struct TransportSlot {
    link: Option<Arc<dyn Link>>,
}

impl TransportSlot {
    pub fn new() -> Self {
        Self { link: None }
    }

    /// The currently installed link, if any.
    pub fn current(&self) -> Option<Arc<dyn Link>> {
        self.link.clone()
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Install a freshly opened link. Installing over an existing link is a
    /// contract violation: acquisition must go through `current` first.
    pub fn install(&mut self, link: Arc<dyn Link>) {
        debug_assert!(self.link.is_none(), "transport slot already occupied");
        self.link = Some(link);
    }

    /// Take the link out for closing. Idempotent.
    pub fn disconnect(&mut self) -> Option<Arc<dyn Link>> {
        self.link.take()
    }
}

impl Default for TransportSlot {
    fn default() -> Self {
        Self::new()
    }
}
