//! Perimeter filter — drops blocked and abusive traffic.
//!
//! Each request is checked, in order, against:
//!
//! 1. the static CIDR ranges,
//! 2. the set of sources auto-blocked earlier in the run,
//! 3. the per-source counter for the current window.
//!
//! A source whose counter exceeds `rate_limit` is auto-blocked for the rest
//! of the run. Window resets clear the counters but never the block set.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use tiergrid_core::config::FirewallConfig;
use tiergrid_core::{DropReason, Event, EventKind, Request, SharedSink, Tick};

use crate::range::{AddressRange, ipv4_to_u32};

pub struct PerimeterFilter {
    ranges: Vec<AddressRange>,
    /// Requests per source in the current window.
    window_counts: HashMap<String, u32>,
    auto_blocked: HashSet<String>,
    rate_limit: u32,
    window_size: u32,
    total_dropped: u64,
    sink: SharedSink,
}

impl PerimeterFilter {
    /// Create a filter with no static ranges.
    pub fn new(rate_limit: u32, window_size: u32, sink: SharedSink) -> Self {
        Self {
            ranges: Vec::new(),
            window_counts: HashMap::new(),
            auto_blocked: HashSet::new(),
            rate_limit,
            window_size,
            total_dropped: 0,
            sink,
        }
    }

    /// Build a filter from the `[firewall]` config table.
    ///
    /// Invalid CIDR entries are reported and skipped.
    pub fn from_config(config: &FirewallConfig, sink: SharedSink) -> Self {
        let mut filter = Self::new(config.rate_limit, config.window_size, sink);
        for cidr in &config.blocked_ranges {
            filter.add_range(cidr);
        }
        filter
    }

    /// Register a static blocked range.
    ///
    /// Returns `false` and emits a `RangeRejected` event when `cidr` does not
    /// parse; the range list is left unchanged.
    pub fn add_range(&mut self, cidr: &str) -> bool {
        match AddressRange::parse(cidr) {
            Ok(range) => {
                self.sink.emit(&Event::new(
                    0,
                    EventKind::RangeAdded {
                        label: range.label().to_string(),
                    },
                ));
                self.ranges.push(range);
                true
            }
            Err(e) => {
                self.sink.emit(&Event::new(
                    0,
                    EventKind::RangeRejected {
                        cidr: cidr.to_string(),
                        error: e.to_string(),
                    },
                ));
                false
            }
        }
    }

    /// Filter one tick's burst, returning the admitted requests in input
    /// order.
    pub fn filter(&mut self, requests: Vec<Request>, tick: Tick) -> Vec<Request> {
        if self.window_size > 0 && tick != 0 && tick % self.window_size as u64 == 0 {
            debug!(tick, tracked = self.window_counts.len(), "clearing per-source counters");
            self.window_counts.clear();
            self.sink.emit(&Event::new(tick, EventKind::WindowReset));
        }

        let mut admitted = Vec::with_capacity(requests.len());

        for request in requests {
            if let Some(label) = self.matching_range(request.source()) {
                let reason = DropReason::Range { label };
                self.drop_request(&request, tick, reason);
                continue;
            }

            if self.auto_blocked.contains(request.source()) {
                self.drop_request(&request, tick, DropReason::AutoBlocked);
                continue;
            }

            let count = {
                let count = self
                    .window_counts
                    .entry(request.source().to_string())
                    .or_insert(0);
                *count += 1;
                *count
            };

            if count > self.rate_limit {
                if self.auto_blocked.insert(request.source().to_string()) {
                    self.sink.emit(&Event::new(
                        tick,
                        EventKind::AutoBlocked {
                            source: request.source().to_string(),
                            limit: self.rate_limit,
                        },
                    ));
                }
                self.drop_request(&request, tick, DropReason::RateLimited);
                continue;
            }

            admitted.push(request);
        }

        admitted
    }

    /// Label of the first static range covering `source`.
    fn matching_range(&self, source: &str) -> Option<String> {
        let addr = ipv4_to_u32(source);
        self.ranges
            .iter()
            .find(|r| r.contains(addr))
            .map(|r| r.label().to_string())
    }

    fn drop_request(&mut self, request: &Request, tick: Tick, reason: DropReason) {
        self.total_dropped += 1;
        self.sink.emit(&Event::new(
            tick,
            EventKind::Dropped {
                source: request.source().to_string(),
                dest: request.dest().to_string(),
                reason,
            },
        ));
    }

    /// Requests dropped since construction.
    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }

    /// Registered static ranges, in insertion order.
    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    pub fn range_labels(&self) -> Vec<String> {
        self.ranges.iter().map(|r| r.label().to_string()).collect()
    }

    pub fn is_auto_blocked(&self, source: &str) -> bool {
        self.auto_blocked.contains(source)
    }

    pub fn auto_blocked_count(&self) -> usize {
        self.auto_blocked.len()
    }

    /// Requests counted for `source` in the current window.
    pub fn window_count(&self, source: &str) -> u32 {
        self.window_counts.get(source).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tiergrid_core::{JobClass, MemorySink};

    fn make_request(source: &str) -> Request {
        Request::new(source, "203.0.113.10", 1, JobClass::A)
    }

    fn burst(source: &str, n: usize) -> Vec<Request> {
        (0..n).map(|_| make_request(source)).collect()
    }

    fn filter_with_sink(rate_limit: u32, window_size: u32) -> (PerimeterFilter, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (PerimeterFilter::new(rate_limit, window_size, sink.clone()), sink)
    }

    #[test]
    fn admits_clean_traffic_in_order() {
        let (mut filter, _) = filter_with_sink(5, 20);
        let input = vec![
            make_request("1.1.1.1"),
            make_request("2.2.2.2"),
            make_request("3.3.3.3"),
        ];

        let admitted = filter.filter(input.clone(), 0);

        assert_eq!(admitted, input);
        assert_eq!(filter.total_dropped(), 0);
    }

    #[test]
    fn drops_sources_in_blocked_range() {
        let (mut filter, sink) = filter_with_sink(5, 20);
        assert!(filter.add_range("192.168.0.0/16"));

        let admitted = filter.filter(
            vec![make_request("192.168.4.2"), make_request("192.169.0.1")],
            0,
        );

        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].source(), "192.169.0.1");
        assert_eq!(filter.total_dropped(), 1);

        let drops = sink.filter(|k| matches!(k, EventKind::Dropped { .. }));
        assert_eq!(
            drops[0].kind,
            EventKind::Dropped {
                source: "192.168.4.2".to_string(),
                dest: "203.0.113.10".to_string(),
                reason: DropReason::Range {
                    label: "192.168.0.0/16".to_string()
                },
            }
        );
    }

    #[test]
    fn range_blocked_requests_do_not_count_toward_rate_limit() {
        let (mut filter, _) = filter_with_sink(1, 20);
        filter.add_range("10.0.0.0/8");

        filter.filter(burst("10.0.0.1", 4), 0);

        assert_eq!(filter.window_count("10.0.0.1"), 0);
        assert!(!filter.is_auto_blocked("10.0.0.1"));
    }

    #[test]
    fn invalid_ranges_are_skipped() {
        let (mut filter, sink) = filter_with_sink(5, 20);

        assert!(!filter.add_range("10.0.0.0"));
        assert!(!filter.add_range("10.0.0.0/x"));
        assert!(!filter.add_range("10.0.0.0/40"));
        assert!(filter.add_range("10.0.0.0/8"));

        assert_eq!(filter.range_labels(), vec!["10.0.0.0/8"]);
        let rejected = sink.filter(|k| matches!(k, EventKind::RangeRejected { .. }));
        assert_eq!(rejected.len(), 3);
    }

    #[test]
    fn rate_limit_auto_blocks_and_survives_window_reset() {
        let (mut filter, sink) = filter_with_sink(5, 20);

        let admitted = filter.filter(burst("6.6.6.6", 7), 1);

        assert_eq!(admitted.len(), 5);
        assert_eq!(filter.total_dropped(), 2);
        assert!(filter.is_auto_blocked("6.6.6.6"));

        let blocks = sink.filter(|k| matches!(k, EventKind::AutoBlocked { .. }));
        assert_eq!(blocks.len(), 1, "auto-block is recorded once");
        assert_eq!(blocks[0].tick, 1);

        // Counters reset at tick 20, the block does not.
        filter.filter(Vec::new(), 20);
        assert_eq!(filter.window_count("6.6.6.6"), 0);

        let admitted = filter.filter(burst("6.6.6.6", 1), 21);
        assert!(admitted.is_empty());
        assert_eq!(filter.total_dropped(), 3);
        assert!(filter.is_auto_blocked("6.6.6.6"));
    }

    #[test]
    fn auto_blocked_drop_reason_after_first_crossing() {
        let (mut filter, sink) = filter_with_sink(1, 20);

        filter.filter(burst("7.7.7.7", 3), 2);

        let reasons: Vec<DropReason> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e.kind {
                EventKind::Dropped { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(reasons, vec![DropReason::RateLimited, DropReason::AutoBlocked]);
    }

    #[test]
    fn window_reset_lets_below_limit_sources_continue() {
        let (mut filter, sink) = filter_with_sink(3, 10);

        assert_eq!(filter.filter(burst("8.8.4.4", 3), 5).len(), 3);
        assert_eq!(filter.window_count("8.8.4.4"), 3);

        // New window: the counter starts over.
        assert_eq!(filter.filter(burst("8.8.4.4", 3), 10).len(), 3);
        assert!(!filter.is_auto_blocked("8.8.4.4"));

        let resets = sink.filter(|k| matches!(k, EventKind::WindowReset));
        assert_eq!(resets.len(), 1);
        assert_eq!(resets[0].tick, 10);
    }

    #[test]
    fn no_reset_at_tick_zero() {
        let (mut filter, sink) = filter_with_sink(3, 10);
        filter.filter(Vec::new(), 0);
        assert!(sink.filter(|k| matches!(k, EventKind::WindowReset)).is_empty());
    }

    #[test]
    fn unparseable_source_only_hits_zero_ranges() {
        let (mut filter, _) = filter_with_sink(100, 20);
        filter.add_range("0.0.0.0/32");

        let admitted = filter.filter(vec![make_request("garbage"), make_request("1.0.0.0")], 0);

        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].source(), "1.0.0.0");
    }

    #[test]
    fn from_config_registers_valid_ranges() {
        let sink = Arc::new(MemorySink::new());
        let config = FirewallConfig {
            rate_limit: 2,
            window_size: 5,
            blocked_ranges: vec!["10.0.0.0/8".to_string(), "bogus".to_string()],
        };

        let filter = PerimeterFilter::from_config(&config, sink.clone());

        assert_eq!(filter.ranges().len(), 1);
        assert_eq!(
            sink.filter(|k| matches!(k, EventKind::RangeAdded { .. })).len(),
            1
        );
    }
}
