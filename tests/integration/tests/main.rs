//! End-to-end tests.
//!
//! Each test starts the server on a random localhost port and drives it over
//! HTTP, with responses signed by an in-process test identity provider.

mod common;
mod login_flow;
mod rejections;
