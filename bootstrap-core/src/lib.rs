//! IO-free core for NDN testbed enrollment.
//!
//! This crate is intentionally IO-free:
//! - No network calls
//! - No filesystem operations
//! - No logging
//!
//! It holds the types the enrollment orchestrator (in `bootstrap-client`)
//! shares with its collaborators:
//! - [`session::SessionState`] - lifecycle tags for one enrollment run
//! - [`gate::ChallengeGate`] - single-use rendezvous for the one-time code
//! - [`identity`] - issuer-bound key material and its portable export
//! - [`credential::Credential`] - the certificate + private-key bundle

pub mod credential;
pub mod gate;
pub mod identity;
pub mod session;

pub use credential::{Credential, LinkKind};
pub use gate::{ChallengeGate, CodeOutcome};
pub use identity::{
    Ed25519KeyFactory, KeyGenError, KeyMaterial, KeyMaterialFactory, KeyName, NamePrefix,
    SecretBytes,
};
pub use session::SessionState;
