//! Enrollment client for the NDN testbed.
//!
//! The enrollment flow is:
//! 1. (optionally) [`discovery::discover`] the nearest testbed endpoint
//! 2. [`enroll::Enrollment::start`] opens one transient link to the issuer
//! 3. The CA profile is retrieved from the fixed trust anchor
//! 4. A probe asks which name the email may claim; the first entry wins
//! 5. A key pair is generated for the assigned name
//! 6. The certificate request suspends on the email challenge until the
//!    user forwards the one-time code via [`enroll::Enrollment::supply_code`]
//! 7. The issued certificate and exported private key become a
//!    [`bootstrap_core::Credential`] handed to the configuration store
//!
//! Teardown at any point closes the link and releases the pending challenge;
//! no credential is ever emitted on a failure or cancellation path.
//!
//! Wire-level protocol handling is injected: implement
//! [`transport::LinkFactory`] and [`issuer::IssuerProtocol`] to bind a real
//! forwarder and NDNCERT stack.

pub mod discovery;
pub mod enroll;
pub mod issuer;
pub mod transport;

pub use enroll::{CredentialSink, EnrollError, EnrollOutcome, Enrollment};
pub use issuer::{CaProfile, EmailChallenge, IssuerProtocol, ProbeEntry, ProbeResult};
pub use transport::{Link, LinkError, LinkFactory};

/// Trust anchor of the public NDN testbed CA.
pub const TESTBED_ANCHOR: &str = "/ndn/";
