//! Structured event reporting.
//!
//! Every component reports what it does as an [`Event`] handed to an
//! [`EventSink`]. Sinks decide how events are rendered or stored; the engine
//! never writes to the console or to files itself.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::{JobClass, NodeId, PoolStats, Tick};

/// A single record emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub tick: Tick,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(tick: Tick, kind: EventKind) -> Self {
        Self { tick, kind }
    }
}

/// Why the perimeter filter dropped a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    /// Source falls inside a configured CIDR range.
    Range { label: String },
    /// Source was auto-blocked earlier in the run.
    AutoBlocked,
    /// This request pushed the source over its per-window limit.
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    RangeAdded {
        label: String,
    },
    RangeRejected {
        cidr: String,
        error: String,
    },
    WindowReset,
    Dropped {
        source: String,
        dest: String,
        #[serde(flatten)]
        reason: DropReason,
    },
    AutoBlocked {
        source: String,
        limit: u32,
    },
    Dispatched {
        class: JobClass,
        node: NodeId,
        cost: u32,
        source: String,
    },
    Allocated {
        class: JobClass,
        node: NodeId,
    },
    Deallocated {
        class: JobClass,
        node: NodeId,
    },
    DeallocationSkipped {
        class: JobClass,
    },
    CycleCompleted {
        class: JobClass,
        queue_depth: usize,
        nodes: usize,
        busy: usize,
    },
    Summary(RunSummary),
}

/// Final state of one worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub class: JobClass,
    pub queue_depth: usize,
    pub nodes: usize,
    pub stats: PoolStats,
}

/// Report produced when a run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub ticks_run: Tick,
    pub total_dropped: u64,
    pub auto_blocked_sources: usize,
    pub ranges: Vec<String>,
    pub pools: Vec<PoolSummary>,
}

/// Receives engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);

    /// Push buffered output to its destination.
    fn flush(&self) {}
}

pub type SharedSink = Arc<dyn EventSink>;

/// Renders events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        let tick = event.tick;
        match &event.kind {
            EventKind::RangeAdded { label } => info!(tick, %label, "blocked range added"),
            EventKind::RangeRejected { cidr, error } => {
                warn!(tick, %cidr, %error, "skipping invalid blocked range")
            }
            EventKind::WindowReset => info!(tick, "rate-limit window reset"),
            EventKind::Dropped { source, dest, reason } => {
                debug!(tick, %source, %dest, ?reason, "request dropped")
            }
            EventKind::AutoBlocked { source, limit } => {
                warn!(tick, %source, limit, "DoS detected, source auto-blocked")
            }
            EventKind::Dispatched { class, node, cost, source } => {
                debug!(tick, %class, node, cost, %source, "request dispatched")
            }
            EventKind::Allocated { class, node } => {
                info!(tick, %class, node, "worker node allocated")
            }
            EventKind::Deallocated { class, node } => {
                info!(tick, %class, node, "worker node deallocated")
            }
            EventKind::DeallocationSkipped { class } => {
                info!(tick, %class, "no idle worker node to deallocate")
            }
            EventKind::CycleCompleted { class, queue_depth, nodes, busy } => {
                debug!(tick, %class, queue_depth, nodes, busy, "pool cycle completed")
            }
            EventKind::Summary(summary) => info!(
                tick,
                ticks_run = summary.ticks_run,
                total_dropped = summary.total_dropped,
                auto_blocked = summary.auto_blocked_sources,
                ranges = summary.ranges.len(),
                "run finished"
            ),
        }
    }
}

/// Writes one JSON object per event to a file.
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        debug!(?path, "event log opened");
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&self, event: &Event) {
        let mut writer = self.writer.lock().expect("event log lock");
        let result = serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"));
        if let Err(e) = result {
            warn!(error = %e, "failed to write event");
        }
    }

    fn flush(&self) {
        let mut writer = self.writer.lock().expect("event log lock");
        if let Err(e) = writer.flush() {
            warn!(error = %e, "failed to flush event log");
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events received so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("events lock").clone()
    }

    /// Events matching a predicate on their kind.
    pub fn filter<F>(&self, pred: F) -> Vec<Event>
    where
        F: Fn(&EventKind) -> bool,
    {
        self.events
            .lock()
            .expect("events lock")
            .iter()
            .filter(|e| pred(&e.kind))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("events lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &Event) {
        self.events.lock().expect("events lock").push(event.clone());
    }
}

/// Broadcasts each event to several sinks in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<SharedSink>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: SharedSink) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &Event) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }

    fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }
}
