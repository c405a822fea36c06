//! Interface to the certificate-issuing authority.
//!
//! The wire protocol (NDNCERT in production) is an external collaborator;
//! this module fixes only the shapes the orchestrator depends on: profile
//! retrieval, name probing, and the certificate request with its email
//! challenge. Implementations run every exchange over the session's link.

use async_trait::async_trait;
use bootstrap_core::{CodeOutcome, KeyMaterial, NamePrefix};

use crate::transport::Link;

/// Failures in a profile/probe/issuance exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The issuer answered with an error status.
    #[error("issuer rejected the request: {0}")]
    Rejected(String),

    /// The issuer's response could not be decoded.
    #[error("malformed issuer response: {0}")]
    Malformed(String),

    /// The exchange was cut short (link closed, timeout in the stack below).
    #[error("exchange interrupted: {0}")]
    Interrupted(String),
}

/// Failures of the certificate request specifically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RequestError {
    /// The challenge wait was released without a code; not a failure — the
    /// session unwinds to its cancelled outcome.
    #[error("challenge aborted before completion")]
    Aborted,

    /// The issuer rejected the supplied one-time code.
    #[error("one-time code rejected by issuer")]
    CodeRejected,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// The issuer's published policy. Opaque to the orchestrator beyond being a
/// required input to probing and issuance; immutable once retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaProfile {
    /// Name of the issuing CA.
    pub issuer: NamePrefix,
    /// Encoded profile payload, interpreted only by the protocol stack.
    pub data: Vec<u8>,
}

/// One assignable-name entry from a probe response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEntry {
    pub prefix: NamePrefix,
}

/// Issuer-ordered assignable names. The order is authoritative; the
/// orchestrator always proceeds with the first entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub entries: Vec<ProbeEntry>,
}

impl ProbeResult {
    pub fn first(&self) -> Option<&ProbeEntry> {
        self.entries.first()
    }
}

/// Source of the out-of-band one-time code.
///
/// Implemented by the orchestrator: the hook installs a fresh challenge gate
/// on the session and suspends until the code arrives or teardown releases
/// the wait.
#[async_trait]
pub trait CodeHook: Send + Sync {
    async fn one_time_code(&self) -> CodeOutcome;
}

/// The email challenge handed to the certificate request.
///
/// When the issuer demands the emailed code, the protocol implementation
/// calls [`EmailChallenge::one_time_code`]; an [`CodeOutcome::Aborted`]
/// result must surface as [`RequestError::Aborted`].
pub struct EmailChallenge {
    email: String,
    hook: std::sync::Arc<dyn CodeHook>,
}

impl EmailChallenge {
    /// Challenge kind identifier on the wire.
    pub const KIND: &'static str = "email";

    pub fn new(email: impl Into<String>, hook: std::sync::Arc<dyn CodeHook>) -> Self {
        Self {
            email: email.into(),
            hook,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Wire kind of this challenge; protocol stacks dispatch on it.
    pub fn kind(&self) -> &'static str {
        Self::KIND
    }

    /// Suspend until the user supplies the one-time code (or teardown).
    pub async fn one_time_code(&self) -> CodeOutcome {
        self.hook.one_time_code().await
    }
}

/// Protocol steps against the issuer, all over the session's single link.
#[async_trait]
pub trait IssuerProtocol: Send + Sync {
    /// Retrieve the CA profile published under the trust anchor.
    async fn fetch_profile(
        &self,
        link: &dyn Link,
        anchor: &NamePrefix,
    ) -> Result<CaProfile, ProtocolError>;

    /// Ask which names the holder of `email` may claim.
    async fn probe(
        &self,
        link: &dyn Link,
        profile: &CaProfile,
        email: &str,
    ) -> Result<ProbeResult, ProtocolError>;

    /// Run the certificate request, driving the email challenge through
    /// `challenge`. Returns the encoded certificate bytes.
    async fn request_certificate(
        &self,
        link: &dyn Link,
        profile: &CaProfile,
        keys: &KeyMaterial,
        challenge: EmailChallenge,
    ) -> Result<Vec<u8>, RequestError>;
}
