//! tiergrid-dispatch — the simulation driver.
//!
//! The `Dispatcher` advances the simulation one tick at a time:
//!
//! - pulls a burst of requests from a `BurstSource`
//! - runs the burst through the `PerimeterFilter`
//! - partitions admitted requests by job class, keeping their order
//! - runs every `WorkerPool` cycle in class order (A, then B)
//!
//! # Architecture
//!
//! ```text
//! Dispatcher
//!   ├── BurstSource (RandomBurst with a seeded StdRng, or ScriptedBurst)
//!   ├── PerimeterFilter (shared across classes)
//!   └── BTreeMap<JobClass, WorkerPool>
//! ```

pub mod burst;
pub mod dispatcher;

pub use burst::{BurstSource, RandomBurst, ScriptedBurst};
pub use dispatcher::{Dispatcher, TickReport};
