//! Shared types used across TierGrid crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulation time step.
pub type Tick = u64;

/// Identifier of a worker node, unique within its pool for the whole run.
pub type NodeId = u64;

/// Category used to route a request to a specific worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobClass {
    A,
    B,
}

impl JobClass {
    /// Every class, in the order pools are driven each tick.
    pub const ALL: [JobClass; 2] = [JobClass::A, JobClass::B];

    pub fn label(&self) -> &'static str {
        match self {
            JobClass::A => "A",
            JobClass::B => "B",
        }
    }
}

impl fmt::Display for JobClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One unit of simulated traffic.
///
/// Fields are private so a request cannot change after the generator hands
/// it out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    source: String,
    dest: String,
    cost: u32,
    class: JobClass,
}

impl Request {
    /// Create a request. A zero cost is raised to one tick.
    pub fn new(
        source: impl Into<String>,
        dest: impl Into<String>,
        cost: u32,
        class: JobClass,
    ) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            cost: cost.max(1),
            class,
        }
    }

    /// Dotted-quad source address.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Dotted-quad destination address.
    pub fn dest(&self) -> &str {
        &self.dest
    }

    /// Ticks a worker needs to process this request.
    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn class(&self) -> JobClass {
        self.class
    }
}

/// Cumulative counters kept by a worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Requests accepted onto the queue.
    pub enqueued: u64,
    /// Requests handed to a worker node.
    pub dispatched: u64,
    /// Requests whose processing finished.
    pub completed: u64,
    pub allocations: u64,
    pub deallocations: u64,
    /// Scale-down evaluations that found no idle node.
    pub skipped_deallocations: u64,
    /// Largest node count observed.
    pub peak_nodes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_cost_is_raised_to_one() {
        let req = Request::new("10.0.0.1", "10.0.0.2", 0, JobClass::A);
        assert_eq!(req.cost(), 1);
    }

    #[test]
    fn class_order_is_a_then_b() {
        assert_eq!(JobClass::ALL, [JobClass::A, JobClass::B]);
        assert!(JobClass::A < JobClass::B);
        assert_eq!(JobClass::B.to_string(), "B");
    }

    #[test]
    fn request_serializes_with_class_label() {
        let req = Request::new("1.2.3.4", "5.6.7.8", 3, JobClass::B);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"class\":\"B\""));
        assert!(json.contains("\"cost\":3"));
    }
}
