//! # da-test-utils
//!
//! Fixtures for exercising the SAML service provider without a real
//! identity provider.
//!
//! - [`TestIdp`] - a throwaway signing key and self-signed certificate
//! - [`ResponseBuilder`] - SAML responses with controllable conditions,
//!   signed the way production identity providers sign them
//!
//! ```rust,ignore
//! let idp = TestIdp::new();
//! let xml = idp.response_for("urn:my-sp").name_id("user@example.com").build();
//! let validator = ResponseValidator::new(idp.verifier(), clock, settings);
//! assert!(validator.validate(&xml).is_ok());
//! ```

#![warn(missing_docs)]

mod idp;
mod response;

pub use idp::TestIdp;
pub use response::{ResponseBuilder, Signing, GROUPS_ATTRIBUTE};
