//! Domain services behind the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `user`, `credentials` and `session` are the storage and crypto seams;
//! `auth_store` composes them into the per-request session state machine and
//! `auth_check` decides when that state needs re-validating. Route handlers
//! only translate between HTTP and these types.

pub mod auth_check;
pub mod auth_store;
pub mod credentials;
pub mod session;
pub mod user;
