//! Dispatcher — drives the filter and the worker pools tick by tick.
//!
//! A tick is fully committed (filter, partition, every pool cycle) before
//! the next one starts. Pools share no state, but they are still run one
//! after another in class order so a seeded run replays exactly.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use tiergrid_autoscale::ScalingPolicy;
use tiergrid_core::{
    Event, EventKind, JobClass, Request, RunSummary, SharedSink, SimConfig, Tick,
};
use tiergrid_firewall::PerimeterFilter;
use tiergrid_pool::WorkerPool;

use crate::burst::{BurstSource, RandomBurst};

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Tick,
    /// Requests produced by the burst source.
    pub generated: usize,
    /// Requests that passed the perimeter filter.
    pub admitted: usize,
    /// Queue depth per pool after its cycle, in class order.
    pub queue_depths: Vec<(JobClass, usize)>,
}

pub struct Dispatcher<B> {
    filter: PerimeterFilter,
    pools: BTreeMap<JobClass, WorkerPool>,
    burst: B,
    tick: Tick,
    sink: SharedSink,
}

impl<B: BurstSource> Dispatcher<B> {
    /// Assemble a dispatcher from prepared parts.
    ///
    /// Pools are keyed by their class; a later pool for the same class
    /// replaces an earlier one.
    pub fn new(
        filter: PerimeterFilter,
        pools: impl IntoIterator<Item = WorkerPool>,
        burst: B,
        sink: SharedSink,
    ) -> Self {
        let pools = pools.into_iter().map(|p| (p.class(), p)).collect();
        Self {
            filter,
            pools,
            burst,
            tick: 0,
            sink,
        }
    }

    /// One pool per job class and a filter built from `[firewall]`.
    pub fn from_config(config: &SimConfig, burst: B, sink: SharedSink) -> Self {
        let filter = PerimeterFilter::from_config(&config.firewall, sink.clone());
        let policy = ScalingPolicy::from_config(config);
        let pools: Vec<WorkerPool> = JobClass::ALL
            .into_iter()
            .map(|class| WorkerPool::new(class, config.initial_nodes, policy, sink.clone()))
            .collect();
        Self::new(filter, pools, burst, sink)
    }

    /// Queue requests on a pool before the run starts, bypassing the filter.
    pub fn preload(&mut self, class: JobClass, requests: Vec<Request>) {
        match self.pools.get_mut(&class) {
            Some(pool) => {
                debug!(%class, count = requests.len(), "preloading pool queue");
                pool.enqueue(requests);
            }
            None => warn!(%class, "no pool for class, backlog discarded"),
        }
    }

    /// Run a single tick.
    pub fn step(&mut self) -> TickReport {
        let tick = self.tick;

        let burst = self.burst.generate(tick);
        let generated = burst.len();

        let admitted = self.filter.filter(burst, tick);
        let admitted_count = admitted.len();

        let mut partitions: BTreeMap<JobClass, Vec<Request>> = BTreeMap::new();
        for request in admitted {
            partitions.entry(request.class()).or_default().push(request);
        }

        let mut queue_depths = Vec::with_capacity(self.pools.len());
        for (class, pool) in self.pools.iter_mut() {
            let batch = partitions.remove(class).unwrap_or_default();
            queue_depths.push((*class, pool.run_cycle(batch)));
        }

        for (class, orphans) in partitions {
            warn!(tick, %class, count = orphans.len(), "no pool for class, requests discarded");
        }

        self.tick += 1;

        TickReport {
            tick,
            generated,
            admitted: admitted_count,
            queue_depths,
        }
    }

    /// Run `total_ticks` ticks and report the outcome.
    pub fn run(&mut self, total_ticks: Tick) -> RunSummary {
        info!(total_ticks, pools = self.pools.len(), "simulation started");
        for _ in 0..total_ticks {
            self.step();
        }
        self.finish()
    }

    /// Build the run summary, emit it and flush the sink.
    pub fn finish(&self) -> RunSummary {
        let summary = self.summary();
        self.sink
            .emit(&Event::new(self.tick, EventKind::Summary(summary.clone())));
        self.sink.flush();
        summary
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks_run: self.tick,
            total_dropped: self.filter.total_dropped(),
            auto_blocked_sources: self.filter.auto_blocked_count(),
            ranges: self.filter.range_labels(),
            pools: self.pools.values().map(WorkerPool::summary).collect(),
        }
    }

    /// Ticks completed so far.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn filter(&self) -> &PerimeterFilter {
        &self.filter
    }

    pub fn pool(&self, class: JobClass) -> Option<&WorkerPool> {
        self.pools.get(&class)
    }

    pub fn pools(&self) -> impl Iterator<Item = &WorkerPool> {
        self.pools.values()
    }
}

impl Dispatcher<RandomBurst> {
    /// The stock simulation: random traffic and a pre-filled backlog of
    /// `initial_backlog_per_node * initial_nodes` requests per pool.
    pub fn with_random_traffic(config: &SimConfig, sink: SharedSink) -> Self {
        let mut burst = RandomBurst::from_config(config);
        let backlog = config.traffic.initial_backlog_per_node as usize
            * config.initial_nodes as usize;

        let prefill: Vec<(JobClass, Vec<Request>)> = JobClass::ALL
            .into_iter()
            .map(|class| (class, burst.backlog(class, backlog)))
            .collect();

        let mut dispatcher = Self::from_config(config, burst, sink);
        for (class, requests) in prefill {
            dispatcher.preload(class, requests);
        }
        dispatcher
    }
}
