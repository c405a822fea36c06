//! Issuer-bound key material.
//!
//! A successful probe assigns the user a name prefix; the key pair generated
//! for the certificate request is bound to a key name derived from that
//! prefix. The private half leaves this crate exactly once, as PKCS#8 DER
//! wrapped in a zeroize-on-drop buffer — there is no keystore here, by
//! declared non-goal.

use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::Signer;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors from key generation and export.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum KeyGenError {
    /// The private key could not be encoded for export.
    #[error("private key export failed")]
    Export,
}

/// An issuer-assigned name prefix, e.g. `/ndn/a-b/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamePrefix(String);

impl NamePrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key-bearing name under an assigned prefix: `{prefix}KEY/{key-id}`.
///
/// The key id is 8 random bytes, rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyName {
    prefix: NamePrefix,
    key_id: [u8; 8],
}

impl KeyName {
    /// Derive a fresh key name under `prefix` with a random key id.
    pub fn derive(prefix: &NamePrefix) -> Self {
        Self {
            prefix: prefix.clone(),
            key_id: rand::random(),
        }
    }

    pub fn prefix(&self) -> &NamePrefix {
        &self.prefix
    }

    pub fn key_id(&self) -> [u8; 8] {
        self.key_id
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.prefix.as_str();
        let sep = if p.ends_with('/') { "" } else { "/" };
        write!(f, "{p}{sep}KEY/")?;
        for b in self.key_id {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// A zeroize-on-drop buffer for the exported private key DER.
///
/// The bytes are the only durable representation of the private key this
/// core keeps; copies made via `to_vec` are the caller's responsibility.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy out into a plain `Vec<u8>` that will NOT be zeroized.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.clone()
    }
}

impl AsRef<[u8]> for SecretBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// No Debug for SecretBytes: the exported key must not reach logs.

/// Key pair bound to one assigned name, plus its portable private-key export.
///
/// Created once per session; the signer/verifier serve only that session's
/// certificate request and the whole value is dropped (zeroizing the export)
/// once the credential is assembled.
pub struct KeyMaterial {
    name: KeyName,
    signer: ed25519_dalek::SigningKey,
    verifier: ed25519_dalek::VerifyingKey,
    exported: SecretBytes,
}

impl KeyMaterial {
    pub fn name(&self) -> &KeyName {
        &self.name
    }

    /// Sign a certificate-request payload with the session key.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signer.sign(message).to_bytes()
    }

    /// Raw public key bytes for the certificate request.
    pub fn verifier_bytes(&self) -> [u8; 32] {
        self.verifier.to_bytes()
    }

    /// The PKCS#8 DER export of the private key.
    pub fn exported_private_key(&self) -> &SecretBytes {
        &self.exported
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Name and public half only; never the export.
        f.debug_struct("KeyMaterial")
            .field("name", &format_args!("{}", self.name))
            .field("verifier", &self.verifier_bytes())
            .finish_non_exhaustive()
    }
}

/// Generates the key pair for an assigned name.
///
/// The issuer's profile dictates the algorithm family; implementations must
/// not retain any reference to the private half beyond the returned value.
pub trait KeyMaterialFactory: Send + Sync {
    fn generate(&self, assigned: &NamePrefix) -> Result<KeyMaterial, KeyGenError>;
}

/// Ed25519 key factory with PKCS#8 DER export.
pub struct Ed25519KeyFactory;

impl KeyMaterialFactory for Ed25519KeyFactory {
    fn generate(&self, assigned: &NamePrefix) -> Result<KeyMaterial, KeyGenError> {
        let name = KeyName::derive(assigned);
        let signer = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let verifier = signer.verifying_key();
        let exported = SecretBytes(
            signer
                .to_pkcs8_der()
                .map_err(|_| KeyGenError::Export)?
                .as_bytes()
                .to_vec(),
        );
        Ok(KeyMaterial {
            name,
            signer,
            verifier,
            exported,
        })
    }
}
