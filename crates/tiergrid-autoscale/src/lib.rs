//! tiergrid-autoscale — queue-depth driven pool scaling.
//!
//! Compares a pool's queue depth against threshold multiples of its node
//! count and emits one-step scaling decisions. Evaluation only happens on
//! cooldown boundaries, so a pool grows or shrinks by at most one node per
//! cooldown window.
//!
//! # Scaling Algorithm
//!
//! ```text
//! if tick % cooldown != 0:
//!     NoChange
//! elif queue_depth < min_threshold * nodes:
//!     ScaleDown      // remove one idle node, if any
//! elif queue_depth > max_threshold * nodes:
//!     ScaleUp        // add one idle node
//! else:
//!     NoChange
//! ```
//!
//! The scale-down check runs first, so a policy with
//! `min_threshold > max_threshold` always prefers shrinking.

pub mod scaler;

pub use scaler::{Autoscaler, ScaleDecision, ScalingPolicy};
