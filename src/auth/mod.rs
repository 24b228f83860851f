//! Session credentials and token refresh
//!
//! # Module Layout
//!
//! - [`backend`]     -- Auth service endpoints (refresh, sign-in)
//! - [`claims`]      -- JWT payload decoding and expiry checks
//! - [`coordinator`] -- Single-flight refresh shared by concurrent requests
//! - [`session`]     -- Typed credential access, roles, logout
//! - [`store`]       -- Credential storage backends

pub mod backend;
pub mod claims;
pub mod coordinator;
pub mod session;
pub mod store;
