//! End-to-end simulation tests.
//!
//! Drives full dispatchers (filter, partitioning, both pools) with scripted
//! and seeded traffic and checks the run-level guarantees.

use std::sync::Arc;

use tiergrid_core::{
    Event, EventKind, FanoutSink, JobClass, JsonLinesSink, MemorySink, Request, SimConfig,
};
use tiergrid_dispatch::{Dispatcher, ScriptedBurst};

fn base_config() -> SimConfig {
    let mut config = SimConfig::scaffold();
    config.initial_nodes = 2;
    config.min_threshold = 1;
    config.max_threshold = 3;
    config.cooldown = 5;
    config.firewall.rate_limit = 5;
    config.firewall.window_size = 20;
    config.firewall.blocked_ranges.clear();
    config
}

fn seeded_config(seed: u64) -> SimConfig {
    let mut config = base_config();
    config.total_ticks = 300;
    config.traffic.seed = Some(seed);
    config.traffic.burst_one_in = 3;
    config.traffic.max_burst = 40;
    config.traffic.initial_backlog_per_node = 20;
    config.firewall.blocked_ranges = vec!["0.0.0.0/2".to_string(), "200.0.0.0/8".to_string()];
    config
}

fn from_source(source: &str, n: usize) -> Vec<Request> {
    (0..n)
        .map(|_| Request::new(source, "198.51.100.20", 1, JobClass::A))
        .collect()
}

#[test]
fn dos_source_stays_blocked_across_windows() {
    let sink = Arc::new(MemorySink::new());
    let burst = ScriptedBurst::new()
        .at(1, from_source("203.0.113.7", 7))
        .at(21, from_source("203.0.113.7", 1))
        .at(21, from_source("203.0.113.8", 1));
    let mut dispatcher = Dispatcher::from_config(&base_config(), burst, sink.clone());

    dispatcher.step(); // tick 0
    let report = dispatcher.step(); // tick 1
    assert_eq!(report.generated, 7);
    assert_eq!(report.admitted, 5);
    assert_eq!(dispatcher.filter().total_dropped(), 2);
    assert!(dispatcher.filter().is_auto_blocked("203.0.113.7"));

    for _ in 2..21 {
        dispatcher.step();
    }
    let report = dispatcher.step(); // tick 21, counters were reset at 20
    assert_eq!(report.admitted, 1, "only the unrelated source gets through");
    assert_eq!(dispatcher.filter().total_dropped(), 3);

    let resets = sink.filter(|k| matches!(k, EventKind::WindowReset));
    assert_eq!(resets.iter().map(|e| e.tick).collect::<Vec<_>>(), vec![20]);
    let blocks = sink.filter(|k| matches!(k, EventKind::AutoBlocked { .. }));
    assert_eq!(blocks.len(), 1);
}

#[test]
fn pool_grows_when_queue_exceeds_max_threshold() {
    let sink = Arc::new(MemorySink::new());
    let requests: Vec<Request> = (0..9)
        .map(|i| Request::new(format!("100.64.0.{i}"), "198.51.100.20", 10, JobClass::A))
        .collect();
    let burst = ScriptedBurst::new().at(0, requests);
    let mut dispatcher = Dispatcher::from_config(&base_config(), burst, sink);

    let report = dispatcher.step();

    // Two dispatched, seven queued: 7 > 3 * 2.
    assert_eq!(report.queue_depths[0], (JobClass::A, 7));
    assert_eq!(dispatcher.pool(JobClass::A).unwrap().node_count(), 3);
    // Pool B had nothing to do: 0 < 1 * 2.
    assert_eq!(dispatcher.pool(JobClass::B).unwrap().node_count(), 1);
}

#[test]
fn seeded_runs_replay_exactly() {
    let config = seeded_config(2024);

    let sink_a = Arc::new(MemorySink::new());
    let summary_a =
        Dispatcher::with_random_traffic(&config, sink_a.clone()).run(config.total_ticks);

    let sink_b = Arc::new(MemorySink::new());
    let summary_b =
        Dispatcher::with_random_traffic(&config, sink_b.clone()).run(config.total_ticks);

    assert_eq!(summary_a, summary_b);
    assert_eq!(sink_a.events(), sink_b.events());
    assert!(summary_a.total_dropped > 0, "a quarter of the address space is blocked");
}

#[test]
fn requests_are_conserved() {
    let config = seeded_config(7);
    let sink = Arc::new(MemorySink::new());
    let mut dispatcher = Dispatcher::with_random_traffic(&config, sink);

    let mut generated = 0;
    let mut admitted = 0;
    for _ in 0..config.total_ticks {
        let report = dispatcher.step();
        generated += report.generated as u64;
        admitted += report.admitted as u64;
    }

    assert_eq!(generated, admitted + dispatcher.filter().total_dropped());

    let backlog = 2 * u64::from(config.traffic.initial_backlog_per_node)
        * u64::from(config.initial_nodes);
    let enqueued: u64 = dispatcher.pools().map(|p| p.stats().enqueued).sum();
    assert_eq!(enqueued, admitted + backlog);

    for pool in dispatcher.pools() {
        let stats = pool.stats();
        assert_eq!(stats.enqueued, stats.dispatched + pool.queue_depth() as u64);
        assert_eq!(stats.dispatched, stats.completed + pool.busy_count() as u64);
    }
}

#[test]
fn scaling_moves_one_node_per_cooldown_boundary() {
    let config = seeded_config(99);
    let sink = Arc::new(MemorySink::new());
    let mut dispatcher = Dispatcher::with_random_traffic(&config, sink);

    for _ in 0..config.total_ticks {
        let before: Vec<usize> = dispatcher.pools().map(|p| p.node_count()).collect();
        let report = dispatcher.step();
        let after: Vec<usize> = dispatcher.pools().map(|p| p.node_count()).collect();

        for (b, a) in before.iter().zip(&after) {
            if report.tick % u64::from(config.cooldown) == 0 {
                assert!(b.abs_diff(*a) <= 1, "tick {}: {b} -> {a}", report.tick);
            } else {
                assert_eq!(b, a, "tick {}", report.tick);
            }
        }
    }
}

#[test]
fn event_log_round_trips_through_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    let config = seeded_config(5);
    let memory = Arc::new(MemorySink::new());
    let file = Arc::new(JsonLinesSink::create(&path).unwrap());
    let sink = Arc::new(FanoutSink::new().with(memory.clone()).with(file));

    let summary = Dispatcher::with_random_traffic(&config, sink).run(50);

    let content = std::fs::read_to_string(&path).unwrap();
    let logged: Vec<Event> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(logged, memory.events());
    assert_eq!(logged.last().unwrap().kind, EventKind::Summary(summary));
}
