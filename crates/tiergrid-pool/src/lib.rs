//! tiergrid-pool — per-class worker pools.
//!
//! A `WorkerPool` owns a FIFO queue of admitted requests and a set of
//! `WorkerNode`s. Once per tick it:
//!
//! - appends the tick's requests to the queue
//! - hands the queue head to each idle node, in node order
//! - advances every node by one tick
//! - asks the autoscaler whether to add or remove a node
//!
//! # Architecture
//!
//! ```text
//! WorkerPool
//!   ├── VecDeque<Request>          (oldest request served first)
//!   ├── BTreeMap<NodeId, WorkerNode> (id index, allocation order)
//!   └── Autoscaler                 (threshold + cooldown policy)
//! ```

pub mod error;
pub mod node;
pub mod pool;

pub use error::{AssignError, PoolResult};
pub use node::{NodeState, WorkerNode};
pub use pool::WorkerPool;
