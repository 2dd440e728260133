//! Worker node — a single-server busy/idle state machine.

use tiergrid_core::{NodeId, Request};

use crate::error::{AssignError, PoolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Idle,
    Busy,
}

/// Processes one request at a time over a countdown of ticks.
///
/// A node is busy exactly while `remaining_ticks > 0`.
#[derive(Debug, Clone)]
pub struct WorkerNode {
    id: NodeId,
    remaining_ticks: u32,
    current: Option<Request>,
}

impl WorkerNode {
    /// Create an idle node.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            remaining_ticks: 0,
            current: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn state(&self) -> NodeState {
        if self.remaining_ticks > 0 {
            NodeState::Busy
        } else {
            NodeState::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == NodeState::Idle
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.remaining_ticks
    }

    /// The request being processed, if any.
    pub fn current(&self) -> Option<&Request> {
        self.current.as_ref()
    }

    /// Start processing `request`.
    ///
    /// Fails and returns the request when the node is already busy.
    pub fn assign(&mut self, request: Request) -> PoolResult<()> {
        if !self.is_idle() {
            return Err(AssignError::NodeBusy {
                node: self.id,
                request,
            });
        }
        self.remaining_ticks = request.cost();
        self.current = Some(request);
        Ok(())
    }

    /// Advance one tick. Returns the request that finished on this tick.
    pub fn advance(&mut self) -> Option<Request> {
        if self.remaining_ticks == 0 {
            return None;
        }
        self.remaining_ticks -= 1;
        if self.remaining_ticks == 0 {
            self.current.take()
        } else {
            None
        }
    }
}
