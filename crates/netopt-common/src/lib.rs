//! Shared types for the netopt platform.
//!
//! This crate contains:
//! - **Data model** — links, gateways, probes, plans, checkpoints, transactions
//! - **Clock & exec** — monotonic time and deadline-bound subprocess invocation
//! - **Event sink** — structured event emission consumed by `tracing`
//! - **Configuration** — layered TOML/env/CLI config loader
//! - **Error taxonomy** — the typed errors every other netopt crate returns

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod model;

pub use error::NetoptError;
