//! TierGrid perimeter filter.
//!
//! Sits between the traffic source and the worker pools and drops requests
//! before they reach any queue.
//!
//! # Components
//!
//! - **`range`** — CIDR parsing and `(addr & mask) == network` matching
//! - **`filter`** — Static range blocking plus a windowed per-source
//!   counter that permanently auto-blocks sources exceeding the rate limit

pub mod filter;
pub mod range;

pub use filter::PerimeterFilter;
pub use range::{AddressRange, ipv4_to_u32};
