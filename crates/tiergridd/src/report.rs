//! Plain-text run summary.

use std::fmt::Write;

use tiergrid_core::RunSummary;

pub fn render_text(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Simulation finished after {} ticks", summary.ticks_run);
    let _ = writeln!(
        out,
        "Firewall dropped {} requests ({} sources auto-blocked)",
        summary.total_dropped, summary.auto_blocked_sources
    );
    let _ = writeln!(out, "Blocked ranges ({}):", summary.ranges.len());
    for range in &summary.ranges {
        let _ = writeln!(out, "  {range}");
    }
    for pool in &summary.pools {
        let s = &pool.stats;
        let _ = writeln!(
            out,
            "Pool {}: nodes={} (peak {}) queue={} enqueued={} dispatched={} completed={} \
             allocated={} deallocated={} skipped={}",
            pool.class,
            pool.nodes,
            s.peak_nodes,
            pool.queue_depth,
            s.enqueued,
            s.dispatched,
            s.completed,
            s.allocations,
            s.deallocations,
            s.skipped_deallocations,
        );
    }
    out
}
