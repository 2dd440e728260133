//! Worker pool — queues requests for one job class and scales its nodes.
//!
//! Nodes are addressed by id only. Allocation returns the new node's id and
//! every lookup goes through the id-keyed map, so no caller ever holds a
//! reference that a later allocation or removal could invalidate.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info};

use tiergrid_autoscale::{Autoscaler, ScaleDecision, ScalingPolicy};
use tiergrid_core::{
    Event, EventKind, JobClass, NodeId, PoolStats, PoolSummary, Request, SharedSink, Tick,
};

use crate::node::WorkerNode;

pub struct WorkerPool {
    class: JobClass,
    /// Admitted requests, oldest at the front.
    queue: VecDeque<Request>,
    /// Nodes keyed by id. Ids are minted in increasing order, so iteration
    /// follows allocation order.
    nodes: BTreeMap<NodeId, WorkerNode>,
    autoscaler: Autoscaler,
    /// Cycles run so far; also the tick stamped on this pool's events.
    tick: Tick,
    next_id: NodeId,
    stats: PoolStats,
    sink: SharedSink,
}

impl WorkerPool {
    /// Create a pool with `initial_nodes` idle nodes and an empty queue.
    pub fn new(
        class: JobClass,
        initial_nodes: u32,
        policy: ScalingPolicy,
        sink: SharedSink,
    ) -> Self {
        let nodes: BTreeMap<NodeId, WorkerNode> = (0..u64::from(initial_nodes))
            .map(|id| (id, WorkerNode::new(id)))
            .collect();

        info!(%class, nodes = initial_nodes, ?policy, "worker pool created");

        Self {
            class,
            queue: VecDeque::new(),
            stats: PoolStats {
                peak_nodes: nodes.len(),
                ..PoolStats::default()
            },
            nodes,
            autoscaler: Autoscaler::new(policy),
            tick: 0,
            next_id: u64::from(initial_nodes),
            sink,
        }
    }

    /// Append requests to the tail of the queue in the order given.
    pub fn enqueue<I>(&mut self, requests: I)
    where
        I: IntoIterator<Item = Request>,
    {
        let before = self.queue.len();
        self.queue.extend(requests);
        self.stats.enqueued += (self.queue.len() - before) as u64;
    }

    /// Run one tick: enqueue, dispatch, advance, autoscale.
    ///
    /// Returns the queue depth at the end of the cycle.
    pub fn run_cycle(&mut self, new_requests: Vec<Request>) -> usize {
        let tick = self.tick;
        if !new_requests.is_empty() {
            debug!(class = %self.class, tick, count = new_requests.len(), "enqueuing requests");
        }
        self.enqueue(new_requests);

        self.dispatch(tick);

        for node in self.nodes.values_mut() {
            if node.advance().is_some() {
                self.stats.completed += 1;
            }
        }

        match self
            .autoscaler
            .evaluate(tick, self.queue.len(), self.nodes.len())
        {
            ScaleDecision::ScaleUp => {
                self.allocate();
            }
            ScaleDecision::ScaleDown => {
                self.deallocate();
            }
            ScaleDecision::NoChange => {}
        }

        self.emit(EventKind::CycleCompleted {
            class: self.class,
            queue_depth: self.queue.len(),
            nodes: self.nodes.len(),
            busy: self.busy_count(),
        });

        self.tick += 1;
        self.queue.len()
    }

    /// Hand the queue head to each idle node, in node order.
    fn dispatch(&mut self, tick: Tick) {
        for node in self.nodes.values_mut() {
            if !node.is_idle() {
                continue;
            }
            let Some(request) = self.queue.pop_front() else {
                break;
            };

            let cost = request.cost();
            let source = request.source().to_string();
            match node.assign(request) {
                Ok(()) => {
                    self.stats.dispatched += 1;
                    self.sink.emit(&Event::new(
                        tick,
                        EventKind::Dispatched {
                            class: self.class,
                            node: node.id(),
                            cost,
                            source,
                        },
                    ));
                }
                Err(e) => {
                    // Unreachable while the idle check above holds.
                    self.queue.push_front(e.into_request());
                }
            }
        }
    }

    /// Add an idle node and return its id.
    pub fn allocate(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, WorkerNode::new(id));

        self.stats.allocations += 1;
        self.stats.peak_nodes = self.stats.peak_nodes.max(self.nodes.len());
        self.emit(EventKind::Allocated {
            class: self.class,
            node: id,
        });
        id
    }

    /// Remove the first idle node.
    ///
    /// Returns `None`, leaving the pool untouched, when every node is busy.
    pub fn deallocate(&mut self) -> Option<NodeId> {
        let id = self
            .nodes
            .values()
            .find(|node| node.is_idle())
            .map(WorkerNode::id);

        match id {
            Some(id) => {
                self.nodes.remove(&id);
                self.stats.deallocations += 1;
                self.emit(EventKind::Deallocated {
                    class: self.class,
                    node: id,
                });
            }
            None => {
                self.stats.skipped_deallocations += 1;
                self.emit(EventKind::DeallocationSkipped { class: self.class });
            }
        }
        id
    }

    fn emit(&self, kind: EventKind) {
        self.sink.emit(&Event::new(self.tick, kind));
    }

    pub fn class(&self) -> JobClass {
        self.class
    }

    /// Cycles completed so far.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Queued requests, oldest first.
    pub fn queued(&self) -> impl Iterator<Item = &Request> {
        self.queue.iter()
    }

    pub fn node(&self, id: NodeId) -> Option<&WorkerNode> {
        self.nodes.get(&id)
    }

    /// Nodes in allocation order.
    pub fn nodes(&self) -> impl Iterator<Item = &WorkerNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn idle_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_idle()).count()
    }

    pub fn busy_count(&self) -> usize {
        self.nodes.len() - self.idle_count()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub fn summary(&self) -> PoolSummary {
        PoolSummary {
            class: self.class,
            queue_depth: self.queue.len(),
            nodes: self.nodes.len(),
            stats: self.stats,
        }
    }
}
