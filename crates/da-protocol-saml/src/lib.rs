//! SAML 2.0 service provider protocol support.
//!
//! This crate implements the two halves of the Web Browser SSO profile that a
//! service provider needs:
//!
//! - **Outbound** - build an `AuthnRequest` and encode it for the
//!   HTTP-Redirect binding (XML, raw DEFLATE, base64).
//! - **Inbound** - decode an HTTP-POST `SAMLResponse`, verify its enveloped
//!   XML signature against a pinned certificate, check the assertion's
//!   conditions, and extract the subject and attributes.
//!
//! # Architecture
//!
//! - [`types`] - request and validated response types
//! - [`bindings`] - HTTP-Redirect and HTTP-POST encoding
//! - [`signature`] - XML signature parsing, canonicalization, and verification
//! - [`validator`] - the response validation pipeline
//! - [`error`] - error types
//!
//! # Example
//!
//! ```rust,ignore
//! use da_protocol_saml::{AuthnRequest, ResponseValidator, ValidatorSettings};
//!
//! let encoded = AuthnRequest::new("urn:my-sp").encode()?;
//!
//! let validator = ResponseValidator::new(verifier, clock, ValidatorSettings::new("urn:my-sp"));
//! let response = validator.validate(&xml)?;
//! println!("{}", response.name_id().value());
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [Exclusive XML Canonicalization](https://www.w3.org/TR/xml-exc-c14n/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod error;
pub mod signature;
pub mod types;
pub mod validator;

mod xml;

pub use error::{SamlError, SamlResult};
pub use types::*;
pub use validator::{ResponseValidator, ValidatorSettings};
