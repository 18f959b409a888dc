//! Tollgate facilitator node.
//!
//! Wires the verifier and settlement crates behind an axum HTTP API and
//! loads everything from a TOML configuration file.

pub mod api;
pub mod config;
pub mod facilitator;
pub mod node;
pub mod state;

pub use config::TollgateConfig;
pub use facilitator::Facilitator;
pub use node::{build_facilitator, TollgateNode};
pub use state::NodeState;
