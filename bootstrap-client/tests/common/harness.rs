//! Test harness for the enrollment flow.
//!
//! No network: the link factory hands out an inert link and the issuer is a
//! script with switchable failure points, so every failure injection point
//! of the flow can be exercised deterministically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bootstrap_client::enroll::{CredentialSink, Enrollment};
use bootstrap_client::issuer::{
    CaProfile, EmailChallenge, IssuerProtocol, ProbeEntry, ProbeResult, ProtocolError,
    RequestError,
};
use bootstrap_client::transport::{Link, LinkError, LinkFactory};
use bootstrap_client::TESTBED_ANCHOR;
use bootstrap_core::{
    CodeOutcome, Credential, Ed25519KeyFactory, KeyGenError, KeyMaterial, KeyMaterialFactory,
    NamePrefix, SessionState,
};

/// An inert link that only counts its closes.
pub struct TestLink {
    pub closes: AtomicUsize,
}

impl Link for TestLink {
    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Link factory with an open counter and a failure switch.
pub struct TestLinks {
    pub fail_open: bool,
    pub opens: AtomicUsize,
    pub link: Arc<TestLink>,
}

impl TestLinks {
    pub fn new(fail_open: bool) -> Self {
        Self {
            fail_open,
            opens: AtomicUsize::new(0),
            link: Arc::new(TestLink {
                closes: AtomicUsize::new(0),
            }),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.link.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LinkFactory for TestLinks {
    async fn open_link(&self, uri: &str, _local: bool) -> Result<Arc<dyn Link>, LinkError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(LinkError::Refused {
                uri: uri.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.link.clone())
    }
}

/// Scripted issuer: each step can be told to fail; the certificate request
/// drives the email challenge exactly like a real protocol stack would.
pub struct ScriptedIssuer {
    pub fail_profile: bool,
    pub fail_probe: bool,
    pub probe_prefixes: Vec<&'static str>,
    /// `None` accepts any code.
    pub expected_code: Option<&'static str>,
    pub fail_issue_after_code: bool,
    pub certificate: Vec<u8>,
}

impl Default for ScriptedIssuer {
    fn default() -> Self {
        Self {
            fail_profile: false,
            fail_probe: false,
            probe_prefixes: vec!["/ndn/a-b/"],
            expected_code: None,
            fail_issue_after_code: false,
            certificate: b"test-certificate".to_vec(),
        }
    }
}

#[async_trait::async_trait]
impl IssuerProtocol for ScriptedIssuer {
    async fn fetch_profile(
        &self,
        _link: &dyn Link,
        anchor: &NamePrefix,
    ) -> Result<CaProfile, ProtocolError> {
        if self.fail_profile {
            return Err(ProtocolError::Interrupted("profile fetch cut off".into()));
        }
        Ok(CaProfile {
            issuer: anchor.clone(),
            data: b"profile".to_vec(),
        })
    }

    async fn probe(
        &self,
        _link: &dyn Link,
        _profile: &CaProfile,
        _email: &str,
    ) -> Result<ProbeResult, ProtocolError> {
        if self.fail_probe {
            return Err(ProtocolError::Rejected("probe not allowed".into()));
        }
        Ok(ProbeResult {
            entries: self
                .probe_prefixes
                .iter()
                .map(|p| ProbeEntry {
                    prefix: NamePrefix::new(*p),
                })
                .collect(),
        })
    }

    async fn request_certificate(
        &self,
        _link: &dyn Link,
        _profile: &CaProfile,
        _keys: &KeyMaterial,
        challenge: EmailChallenge,
    ) -> Result<Vec<u8>, RequestError> {
        // Dispatch on the challenge kind like a real protocol stack would.
        if challenge.kind() != EmailChallenge::KIND {
            return Err(RequestError::Protocol(ProtocolError::Rejected(format!(
                "unsupported challenge kind {}",
                challenge.kind()
            ))));
        }
        match challenge.one_time_code().await {
            CodeOutcome::Aborted => Err(RequestError::Aborted),
            CodeOutcome::Supplied(code) => {
                if self.fail_issue_after_code {
                    return Err(RequestError::Protocol(ProtocolError::Interrupted(
                        "issuance cut off".into(),
                    )));
                }
                if let Some(expected) = self.expected_code {
                    if code != expected {
                        return Err(RequestError::CodeRejected);
                    }
                }
                Ok(self.certificate.clone())
            }
        }
    }
}

/// Key factory wrapper that counts calls and records the assigned prefix.
pub struct CountingKeys {
    pub fail: bool,
    pub calls: AtomicUsize,
    pub last_prefix: Mutex<Option<String>>,
}

impl CountingKeys {
    pub fn new(fail: bool) -> Self {
        Self {
            fail,
            calls: AtomicUsize::new(0),
            last_prefix: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn assigned_prefix(&self) -> Option<String> {
        self.last_prefix.lock().unwrap().clone()
    }
}

impl KeyMaterialFactory for CountingKeys {
    fn generate(&self, assigned: &NamePrefix) -> Result<KeyMaterial, KeyGenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prefix.lock().unwrap() = Some(assigned.as_str().to_string());
        if self.fail {
            return Err(KeyGenError::Export);
        }
        Ed25519KeyFactory.generate(assigned)
    }
}

/// Sink that records every delivered credential.
pub struct CountingSink {
    pub delivered: Mutex<Vec<Credential>>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<Credential> {
        self.delivered.lock().unwrap().last().cloned()
    }
}

impl CredentialSink for CountingSink {
    fn on_enrollment_complete(&self, credential: &Credential) {
        self.delivered.lock().unwrap().push(credential.clone());
    }
}

/// One fully wired enrollment plus handles to all its doubles.
pub struct TestBed {
    pub links: Arc<TestLinks>,
    pub keys: Arc<CountingKeys>,
    pub sink: Arc<CountingSink>,
    pub enrollment: Arc<Enrollment>,
}

impl TestBed {
    pub fn new() -> Self {
        Self::build(ScriptedIssuer::default(), false, false)
    }

    pub fn with_issuer(issuer: ScriptedIssuer) -> Self {
        Self::build(issuer, false, false)
    }

    pub fn with_failing_link() -> Self {
        Self::build(ScriptedIssuer::default(), true, false)
    }

    pub fn with_failing_keys() -> Self {
        Self::build(ScriptedIssuer::default(), false, true)
    }

    fn build(issuer: ScriptedIssuer, fail_open: bool, fail_keys: bool) -> Self {
        let links = Arc::new(TestLinks::new(fail_open));
        let keys = Arc::new(CountingKeys::new(fail_keys));
        let sink = Arc::new(CountingSink::new());
        let enrollment = Arc::new(Enrollment::new(
            links.clone(),
            Arc::new(issuer),
            keys.clone(),
            sink.clone(),
            NamePrefix::new(TESTBED_ANCHOR),
        ));
        Self {
            links,
            keys,
            sink,
            enrollment,
        }
    }
}

/// Poll until the session reaches `want` (bounded; panics on timeout).
pub async fn await_state(enrollment: &Enrollment, want: SessionState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let state = enrollment.state();
        if state == want {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {want}; session is at {state}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
