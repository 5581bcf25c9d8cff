//! # da-crypto
//!
//! Cryptographic primitives backed by aws-lc-rs.
//!
//! The service never signs anything itself. It only verifies signatures
//! produced by the identity provider, using the public key of a single
//! pinned [`TrustCertificate`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod certificate;
pub mod hash;
pub mod random;
pub mod signature;

pub use algorithm::{DigestAlgorithm, SignatureAlgorithm};
pub use certificate::TrustCertificate;
pub use hash::digest;
pub use signature::{SignatureError, SignatureVerifier};
