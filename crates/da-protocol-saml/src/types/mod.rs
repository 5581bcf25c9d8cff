//! SAML 2.0 types and data structures.

mod authn_request;
mod constants;
mod name_id;
mod response;

pub use authn_request::*;
pub use constants::*;
pub use name_id::*;
pub use response::*;
