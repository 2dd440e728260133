//! tiergrid-core — shared types for the TierGrid routing simulator.
//!
//! Holds the request model, the `tiergrid.toml` configuration parser, the
//! structured event model every component reports through, and the
//! configuration error taxonomy.

pub mod config;
pub mod error;
pub mod event;
pub mod types;

pub use config::SimConfig;
pub use error::{ConfigError, ConfigResult};
pub use event::{
    DropReason, Event, EventKind, EventSink, FanoutSink, JsonLinesSink, MemorySink,
    PoolSummary, RunSummary, SharedSink, TracingSink,
};
pub use types::*;
