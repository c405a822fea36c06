//! The portable credential bundle produced by a successful enrollment.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport kind recorded on the credential for the connection store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    /// NFD over WebSocket.
    #[serde(rename = "nfdWs")]
    NfdWebSocket,
}

/// Issued certificate plus private key, ready for the configuration store.
///
/// Produced exactly once per successful session and never partially
/// populated: both byte fields are base64-encoded at construction. Field
/// names follow the consuming store's JSON contract.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub kind: LinkKind,
    /// Normalized issuer link address, e.g. `wss://host/ws/`.
    pub uri: String,
    pub is_local: bool,
    pub certificate_b64: String,
    pub private_key_b64: String,
}

impl Credential {
    /// Assemble a credential from raw certificate and private-key bytes.
    pub fn new(kind: LinkKind, uri: impl Into<String>, certificate: &[u8], private_key: &[u8]) -> Self {
        Self {
            kind,
            uri: uri.into(),
            is_local: false,
            certificate_b64: STANDARD.encode(certificate),
            private_key_b64: STANDARD.encode(private_key),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Redact the private key; the certificate is public material.
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field("uri", &self.uri)
            .field("is_local", &self.is_local)
            .field("certificate_b64", &self.certificate_b64)
            .field("private_key_b64", &"<redacted>")
            .finish()
    }
}
