//! Network-level concerns for the listener.
//!
//! # Design Decisions
//! - TLS is optional; when configured, the listener terminates it before
//!   the request reaches the router
//! - Concurrency bounds are enforced in the middleware stack, not here

pub mod tls;
