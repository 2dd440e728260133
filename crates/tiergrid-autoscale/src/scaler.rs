//! Autoscaler — threshold scaling for a single worker pool.
//!
//! The pool hands over its queue depth and node count once per tick; the
//! autoscaler answers with a decision. Applying the decision (picking which
//! node to remove, minting ids) stays with the pool.

use serde::{Deserialize, Serialize};
use tracing::debug;

use tiergrid_core::{SimConfig, Tick};

/// A scaling decision for one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleDecision {
    /// Add one node.
    ScaleUp,
    /// Remove one idle node.
    ScaleDown,
    /// No change needed.
    NoChange,
}

/// Threshold multipliers and evaluation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    /// Shrink when queue depth < min_threshold * nodes.
    pub min_threshold: u32,
    /// Grow when queue depth > max_threshold * nodes.
    pub max_threshold: u32,
    /// Ticks between evaluations.
    pub cooldown: u32,
}

impl ScalingPolicy {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            min_threshold: config.min_threshold,
            max_threshold: config.max_threshold,
            cooldown: config.cooldown,
        }
    }
}

/// Evaluates a [`ScalingPolicy`] and remembers when it last acted.
#[derive(Debug, Clone)]
pub struct Autoscaler {
    policy: ScalingPolicy,
    /// Tick of the last ScaleUp or ScaleDown decision.
    last_decision: Option<Tick>,
}

impl Autoscaler {
    pub fn new(policy: ScalingPolicy) -> Self {
        Self {
            policy,
            last_decision: None,
        }
    }

    pub fn policy(&self) -> &ScalingPolicy {
        &self.policy
    }

    pub fn last_decision(&self) -> Option<Tick> {
        self.last_decision
    }

    /// Whether `tick` falls on a cooldown boundary.
    pub fn is_evaluation_tick(&self, tick: Tick) -> bool {
        tick % u64::from(self.policy.cooldown.max(1)) == 0
    }

    /// Decide how the pool should change at `tick`.
    ///
    /// Bounds are products of threshold and node count; nothing is divided
    /// by the node count, so an empty pool compares its queue against zero.
    pub fn evaluate(&mut self, tick: Tick, queue_depth: usize, nodes: usize) -> ScaleDecision {
        if !self.is_evaluation_tick(tick) {
            return ScaleDecision::NoChange;
        }

        let depth = queue_depth as u64;
        let lower = u64::from(self.policy.min_threshold).saturating_mul(nodes as u64);
        let upper = u64::from(self.policy.max_threshold).saturating_mul(nodes as u64);

        let decision = if depth < lower {
            ScaleDecision::ScaleDown
        } else if depth > upper {
            ScaleDecision::ScaleUp
        } else {
            ScaleDecision::NoChange
        };

        if decision != ScaleDecision::NoChange {
            self.last_decision = Some(tick);
            debug!(tick, queue_depth, nodes, lower, upper, ?decision, "scaling decision");
        }

        decision
    }
}
