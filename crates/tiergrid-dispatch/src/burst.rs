//! Traffic sources.
//!
//! A [`BurstSource`] yields the requests that arrive on a tick. The stock
//! [`RandomBurst`] draws everything from an injected RNG so a seed fully
//! determines a run; [`ScriptedBurst`] replays a fixed table for tests.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use tiergrid_core::{JobClass, Request, SimConfig, Tick};

/// Produces the requests arriving on each tick.
///
/// An empty vector means no traffic this tick.
pub trait BurstSource {
    fn generate(&mut self, tick: Tick) -> Vec<Request>;
}

impl<F> BurstSource for F
where
    F: FnMut(Tick) -> Vec<Request>,
{
    fn generate(&mut self, tick: Tick) -> Vec<Request> {
        self(tick)
    }
}

/// Random traffic: occasional bursts of random-sized batches.
#[derive(Debug, Clone)]
pub struct RandomBurst<R = StdRng> {
    rng: R,
    burst_one_in: u32,
    max_burst: u32,
    max_cost: u32,
}

impl RandomBurst<StdRng> {
    /// Build from config, seeding from `traffic.seed` or from entropy.
    pub fn from_config(config: &SimConfig) -> Self {
        let seed = config.traffic.seed.unwrap_or_else(rand::random);
        debug!(seed, "traffic generator seeded");
        Self::new(
            StdRng::seed_from_u64(seed),
            config.traffic.burst_one_in,
            config.traffic.max_burst,
            config.max_processing_cost,
        )
    }
}

impl<R: Rng> RandomBurst<R> {
    /// Zero bounds are raised to one.
    pub fn new(rng: R, burst_one_in: u32, max_burst: u32, max_cost: u32) -> Self {
        Self {
            rng,
            burst_one_in: burst_one_in.max(1),
            max_burst: max_burst.max(1),
            max_cost: max_cost.max(1),
        }
    }

    /// One request with a random class.
    pub fn request(&mut self) -> Request {
        let class = if self.rng.gen_bool(0.5) {
            JobClass::A
        } else {
            JobClass::B
        };
        self.request_for(class)
    }

    /// One request of a given class.
    pub fn request_for(&mut self, class: JobClass) -> Request {
        let cost = self.rng.gen_range(1..=self.max_cost);
        let source = self.address();
        let dest = self.address();
        Request::new(source, dest, cost, class)
    }

    /// `count` requests of one class, used to pre-fill a pool's queue.
    pub fn backlog(&mut self, class: JobClass, count: usize) -> Vec<Request> {
        (0..count).map(|_| self.request_for(class)).collect()
    }

    fn address(&mut self) -> String {
        let [a, b, c, d]: [u8; 4] = self.rng.r#gen();
        format!("{a}.{b}.{c}.{d}")
    }
}

impl<R: Rng> BurstSource for RandomBurst<R> {
    fn generate(&mut self, tick: Tick) -> Vec<Request> {
        if !self.rng.gen_ratio(1, self.burst_one_in) {
            return Vec::new();
        }
        let size = self.rng.gen_range(1..=self.max_burst);
        debug!(tick, size, "traffic burst");
        (0..size).map(|_| self.request()).collect()
    }
}

/// Replays a fixed tick → requests table.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBurst {
    script: BTreeMap<Tick, Vec<Request>>,
}

impl ScriptedBurst {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add requests arriving at `tick`, after any already scripted there.
    pub fn at(mut self, tick: Tick, requests: impl IntoIterator<Item = Request>) -> Self {
        self.script.entry(tick).or_default().extend(requests);
        self
    }
}

impl BurstSource for ScriptedBurst {
    fn generate(&mut self, tick: Tick) -> Vec<Request> {
        self.script.remove(&tick).unwrap_or_default()
    }
}
