//! The enrollment orchestrator.
//!
//! One [`Enrollment`] drives one session: open the link, fetch the CA
//! profile, probe for an assignable name, generate a key pair, run the
//! certificate request (suspending on the email challenge), and hand the
//! assembled credential to the sink. Teardown is idempotent and callable
//! from any state; every failure path releases the pending gate and closes
//! the link before it is reported, and no credential leaves a session that
//! did not complete.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bootstrap_core::{
    ChallengeGate, CodeOutcome, Credential, KeyGenError, KeyMaterialFactory, LinkKind, NamePrefix,
    SessionState,
};

use crate::issuer::{CodeHook, EmailChallenge, IssuerProtocol, ProtocolError, RequestError};
use crate::transport::{Link, LinkError, LinkFactory, TransportSlot};

/// Terminal failure causes, one per `start` invocation at most.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EnrollError {
    /// Empty email or endpoint; nothing was acquired, state stays `Idle`.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// `start` was called on a session that already ran (or was torn down).
    /// Retrying means creating a fresh session.
    #[error("session already consumed; create a new session to retry")]
    SessionConsumed,

    /// The transient link could not be established.
    #[error("transport: {0}")]
    Transport(#[source] LinkError),

    /// CA profile retrieval failed.
    #[error("profile retrieval: {0}")]
    Profile(#[source] ProtocolError),

    /// The probe exchange itself failed.
    #[error("probe: {0}")]
    Probe(#[source] ProtocolError),

    /// The issuer offered no assignable name for this email.
    #[error("issuer offered no assignable name")]
    NoAssignableName,

    /// Key generation or export failed.
    #[error("key generation: {0}")]
    KeyGen(#[source] KeyGenError),

    /// The certificate request failed during or after the challenge.
    #[error("challenge: {0}")]
    Challenge(#[source] RequestError),
}

/// How a driven session ended, cancellation included.
///
/// Cancellation is an outcome, not an error: it produces neither a
/// credential nor a failure report.
#[derive(Debug)]
pub enum EnrollOutcome {
    Enrolled(Credential),
    Cancelled,
}

/// Receives the credential of a completed session, exactly once.
pub trait CredentialSink: Send + Sync {
    fn on_enrollment_complete(&self, credential: &Credential);
}

/// Mutable state of one run. Invariant: `pending_gate` is present iff
/// `state == AwaitingCode`.
struct Session {
    email: String,
    endpoint: String,
    state: SessionState,
    transport: TransportSlot,
    pending_gate: Option<Arc<ChallengeGate>>,
}

impl Session {
    fn new() -> Self {
        Self {
            email: String::new(),
            endpoint: String::new(),
            state: SessionState::Idle,
            transport: TransportSlot::new(),
            pending_gate: None,
        }
    }
}

/// Internal unwind channel: cancellation and failure take different exits.
enum Unwind {
    Aborted,
    Failed(EnrollError),
}

/// Orchestrates one enrollment session.
///
/// `start` runs the whole flow on the caller's task; `supply_code` and
/// `teardown` are the two entry points the outside world may use while it
/// is in flight. The session mutex is never held across an await, and
/// collaborator code (gate, link) never runs under it.
pub struct Enrollment {
    session: Arc<Mutex<Session>>,
    links: Arc<dyn LinkFactory>,
    issuer: Arc<dyn IssuerProtocol>,
    keys: Arc<dyn KeyMaterialFactory>,
    sink: Arc<dyn CredentialSink>,
    anchor: NamePrefix,
}

impl Enrollment {
    pub fn new(
        links: Arc<dyn LinkFactory>,
        issuer: Arc<dyn IssuerProtocol>,
        keys: Arc<dyn KeyMaterialFactory>,
        sink: Arc<dyn CredentialSink>,
        anchor: NamePrefix,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new())),
            links,
            issuer,
            keys,
            sink,
            anchor,
        }
    }

    /// Current session phase.
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Drive the session to `Completed`, `Failed`, or `Cancelled`.
    ///
    /// Fails fast on empty input (state stays `Idle`, nothing acquired).
    /// On success the sink receives the credential exactly once. An external
    /// `teardown` while in flight yields `Ok(EnrollOutcome::Cancelled)` even
    /// when the torn-down step surfaced an error.
    pub async fn start(&self, email: &str, endpoint: &str) -> Result<EnrollOutcome, EnrollError> {
        let email = email.trim().to_string();
        let endpoint = endpoint.trim().to_string();
        if email.is_empty() {
            return Err(EnrollError::InvalidInput("email must not be empty"));
        }
        if endpoint.is_empty() {
            return Err(EnrollError::InvalidInput("endpoint must not be empty"));
        }

        {
            let mut session = self.lock();
            if session.state != SessionState::Idle {
                return Err(EnrollError::SessionConsumed);
            }
            session.email = email.clone();
            session.endpoint = endpoint.clone();
            session.state = SessionState::Connecting;
        }

        let uri = ws_uri(&endpoint);
        tracing::info!(email = %email, uri = %uri, "Enrollment started");

        match self.drive(&email, &uri).await {
            Ok(credential) => {
                let cancelled = {
                    let mut session = self.lock();
                    if session.state == SessionState::Cancelled {
                        true
                    } else {
                        session.state = SessionState::Completed;
                        false
                    }
                };
                if cancelled {
                    // Torn down between issuance and completion: the
                    // credential is dropped, the sink never hears about it.
                    return Ok(EnrollOutcome::Cancelled);
                }
                tracing::info!(uri = %credential.uri, "Enrollment completed");
                self.sink.on_enrollment_complete(&credential);
                Ok(EnrollOutcome::Enrolled(credential))
            }
            Err(Unwind::Aborted) => {
                self.release();
                {
                    let mut session = self.lock();
                    if !session.state.is_terminal() {
                        session.state = SessionState::Cancelled;
                    }
                }
                tracing::info!("Enrollment cancelled");
                Ok(EnrollOutcome::Cancelled)
            }
            Err(Unwind::Failed(error)) => {
                self.release();
                let cancelled = {
                    let mut session = self.lock();
                    if session.state == SessionState::Cancelled {
                        true
                    } else {
                        session.state = SessionState::Failed;
                        false
                    }
                };
                if cancelled {
                    tracing::info!("Enrollment cancelled");
                    Ok(EnrollOutcome::Cancelled)
                } else {
                    tracing::warn!(error = %error, "Enrollment failed");
                    Err(error)
                }
            }
        }
    }

    /// Forward a one-time code to the pending challenge.
    ///
    /// No-op unless the session is in `AwaitingCode`. An empty code is a
    /// cancellation signal (the gate treats it as an abort).
    pub fn supply_code(&self, code: &str) {
        let gate = {
            let session = self.lock();
            if session.state != SessionState::AwaitingCode {
                return;
            }
            session.pending_gate.clone()
        };
        if let Some(gate) = gate {
            gate.supply(code);
        }
    }

    /// Tear the session down from any state.
    ///
    /// Releases a pending challenge wait, closes the link if open, and moves
    /// any non-terminal state to `Cancelled`. Idempotent and safe to call
    /// before `start`, after completion, and re-entrantly from error
    /// handling: after the first call the gate and link are gone, so later
    /// calls find nothing to do.
    pub fn teardown(&self) {
        let (gate, link, prior, email, endpoint) = {
            let mut session = self.lock();
            let prior = session.state;
            if !prior.is_terminal() {
                session.state = SessionState::Cancelled;
            }
            (
                session.pending_gate.take(),
                session.transport.disconnect(),
                prior,
                session.email.clone(),
                session.endpoint.clone(),
            )
        };
        if let Some(gate) = gate {
            gate.abort();
        }
        if let Some(link) = link {
            link.close();
        }
        if prior.is_active() {
            tracing::info!(from = %prior, email = %email, endpoint = %endpoint, "Session torn down");
        }
    }

    /// Release partial progress: abort a pending gate, close an open link.
    /// Runs collaborator code outside the session lock; idempotent because
    /// both take-outs yield `None` the second time.
    fn release(&self) {
        let (gate, link) = {
            let mut session = self.lock();
            (session.pending_gate.take(), session.transport.disconnect())
        };
        if let Some(gate) = gate {
            gate.abort();
        }
        if let Some(link) = link {
            link.close();
        }
    }

    async fn drive(&self, email: &str, uri: &str) -> Result<Credential, Unwind> {
        let link = self.acquire_link(uri).await?;

        self.advance(SessionState::ProfileFetch)?;
        let profile = self
            .issuer
            .fetch_profile(link.as_ref(), &self.anchor)
            .await
            .map_err(|e| Unwind::Failed(EnrollError::Profile(e)))?;
        tracing::debug!(issuer = %profile.issuer, "CA profile retrieved");

        self.advance(SessionState::Probing)?;
        let probe = self
            .issuer
            .probe(link.as_ref(), &profile, email)
            .await
            .map_err(|e| Unwind::Failed(EnrollError::Probe(e)))?;
        // Issuer order is authoritative; no re-ranking.
        let assigned = match probe.first() {
            Some(entry) => entry.prefix.clone(),
            None => {
                tracing::warn!(email = %email, "Probe returned no assignable name");
                return Err(Unwind::Failed(EnrollError::NoAssignableName));
            }
        };
        tracing::info!(prefix = %assigned, "Name assigned");

        self.advance(SessionState::KeyGen)?;
        let keys = self
            .keys
            .generate(&assigned)
            .map_err(|e| Unwind::Failed(EnrollError::KeyGen(e)))?;
        tracing::debug!(key = %keys.name(), "Key pair generated");

        self.advance(SessionState::Requesting)?;
        let challenge = EmailChallenge::new(
            email,
            Arc::new(SessionGate {
                session: self.session.clone(),
            }),
        );
        let certificate = self
            .issuer
            .request_certificate(link.as_ref(), &profile, &keys, challenge)
            .await
            .map_err(|e| match e {
                RequestError::Aborted => Unwind::Aborted,
                other => Unwind::Failed(EnrollError::Challenge(other)),
            })?;

        Ok(Credential::new(
            LinkKind::NfdWebSocket,
            uri,
            &certificate,
            keys.exported_private_key().as_bytes(),
        ))
    }

    /// Idempotent link acquisition: an existing link is reused, never
    /// re-created.
    async fn acquire_link(&self, uri: &str) -> Result<Arc<dyn Link>, Unwind> {
        if let Some(link) = self.lock().transport.current() {
            return Ok(link);
        }
        let link = self
            .links
            .open_link(uri, false)
            .await
            .map_err(|e| Unwind::Failed(EnrollError::Transport(e)))?;
        let raced = {
            let mut session = self.lock();
            if session.state == SessionState::Cancelled {
                true
            } else {
                session.transport.install(link.clone());
                false
            }
        };
        if raced {
            // Teardown won the race while the link was opening; the fresh
            // link was never installed, so it is ours to close.
            link.close();
            return Err(Unwind::Aborted);
        }
        Ok(link)
    }

    /// Move to the next phase, unless teardown already ended the session.
    fn advance(&self, next: SessionState) -> Result<(), Unwind> {
        let mut session = self.lock();
        if session.state.is_terminal() {
            return Err(Unwind::Aborted);
        }
        session.state = next;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().expect("session lock poisoned")
    }
}

/// Code hook wired to the session: installs a fresh gate, flips the state to
/// `AwaitingCode`, and clears both again when the wait resolves.
struct SessionGate {
    session: Arc<Mutex<Session>>,
}

#[async_trait]
impl CodeHook for SessionGate {
    async fn one_time_code(&self) -> CodeOutcome {
        let gate = {
            let mut session = self.session.lock().expect("session lock poisoned");
            if session.state.is_terminal() {
                return CodeOutcome::Aborted;
            }
            let gate = Arc::new(ChallengeGate::new());
            session.pending_gate = Some(gate.clone());
            session.state = SessionState::AwaitingCode;
            gate
        };
        tracing::info!("Waiting for one-time code");
        let outcome = gate.wait().await;
        {
            let mut session = self.session.lock().expect("session lock poisoned");
            session.pending_gate = None;
            if matches!(outcome, CodeOutcome::Supplied(_))
                && session.state == SessionState::AwaitingCode
            {
                session.state = SessionState::Issuing;
            }
        }
        outcome
    }
}

/// Normalize an endpoint locator to the issuer's WebSocket URI.
///
/// `host/ws/` becomes `wss://host/ws/`; anything already carrying a scheme
/// is passed through.
pub(crate) fn ws_uri(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("wss://{endpoint}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_uri_prefixes_bare_hosts() {
        assert_eq!(ws_uri("host/ws/"), "wss://host/ws/");
        assert_eq!(ws_uri("suns.cs.ucla.edu/ws/"), "wss://suns.cs.ucla.edu/ws/");
    }

    #[test]
    fn ws_uri_keeps_explicit_schemes() {
        assert_eq!(ws_uri("wss://host/ws/"), "wss://host/ws/");
        assert_eq!(ws_uri("ws://localhost:9696/"), "ws://localhost:9696/");
    }
}
