//! Perimeter transform gateway library.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌────────────────────────────────────────────────┐
//!                   │              PERIMETER GATEWAY                  │
//!                   │                                                 │
//!  Client Request   │  ┌─────────┐   ┌────────────────────────────┐  │
//!  ─────────────────┼─▶│  http   │──▶│          pipeline          │  │
//!                   │  │ server  │   │ claim → reverse → forward  │──┼──▶ Origin
//!                   │  └─────────┘   └────────────────────────────┘  │
//!                   │                                                 │
//!  Client Response  │  ┌─────────┐                                   │
//!  ◀────────────────┼──│response │◀──────────────────────────────────┼──── Origin
//!                   │  │  relay  │                                   │     Response
//!                   │  └─────────┘                                   │
//!                   │                                                 │
//!                   │  ┌───────────────────────────────────────────┐ │
//!                   │  │           Cross-Cutting Concerns           │ │
//!                   │  │  config · observability · lifecycle · net  │ │
//!                   │  └───────────────────────────────────────────┘ │
//!                   └────────────────────────────────────────────────┘
//! ```
//!
//! The gateway sits behind an external routing/policy layer that owns
//! geo-distribution, throttling, and URL rewriting. It does one job per
//! request: swap the bearer credential for an identity header, reverse the
//! body, forward to the one configured origin, and relay the answer.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod pipeline;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
