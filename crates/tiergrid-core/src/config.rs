//! tiergrid.toml configuration parser.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Top-level simulation configuration.
///
/// The engine fields are required; a file that omits one fails to parse.
/// The `[traffic]` and `[firewall]` tables fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Worker nodes each pool starts with.
    pub initial_nodes: u32,
    /// Number of ticks to simulate.
    pub total_ticks: u64,
    /// Scale down when queue depth < min_threshold * nodes.
    pub min_threshold: u32,
    /// Scale up when queue depth > max_threshold * nodes.
    pub max_threshold: u32,
    /// Ticks between scaling evaluations.
    pub cooldown: u32,
    /// Upper bound for a generated request's processing cost.
    pub max_processing_cost: u32,
    #[serde(default)]
    pub traffic: TrafficConfig,
    #[serde(default)]
    pub firewall: FirewallConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// RNG seed. A fixed seed makes a run reproducible.
    pub seed: Option<u64>,
    /// A burst arrives on a tick with probability 1 / burst_one_in.
    pub burst_one_in: u32,
    /// Largest burst size.
    pub max_burst: u32,
    /// Requests queued per initial node before the first tick.
    pub initial_backlog_per_node: u32,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            seed: None,
            burst_one_in: 11,
            max_burst: 80,
            initial_backlog_per_node: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirewallConfig {
    /// Requests a source may send per window before it is auto-blocked.
    pub rate_limit: u32,
    /// Ticks per rate-limit window.
    pub window_size: u32,
    /// CIDR ranges blocked from the start, e.g. "192.168.0.0/16".
    pub blocked_ranges: Vec<String>,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            rate_limit: 5,
            window_size: 20,
            blocked_ranges: Vec::new(),
        }
    }
}

impl SimConfig {
    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the ranges the engine relies on.
    ///
    /// CIDR strings are not checked here; the firewall skips bad entries.
    pub fn validate(&self) -> ConfigResult<()> {
        positive("initial_nodes", self.initial_nodes as u64)?;
        positive("total_ticks", self.total_ticks)?;
        positive("min_threshold", self.min_threshold as u64)?;
        positive("max_threshold", self.max_threshold as u64)?;
        positive("cooldown", self.cooldown as u64)?;
        positive("max_processing_cost", self.max_processing_cost as u64)?;
        positive("traffic.burst_one_in", self.traffic.burst_one_in as u64)?;
        positive("traffic.max_burst", self.traffic.max_burst as u64)?;
        positive("firewall.rate_limit", self.firewall.rate_limit as u64)?;
        positive("firewall.window_size", self.firewall.window_size as u64)?;

        if self.min_threshold > self.max_threshold {
            return Err(ConfigError::InvalidField {
                field: "min_threshold",
                reason: format!(
                    "{} exceeds max_threshold {}",
                    self.min_threshold, self.max_threshold
                ),
            });
        }
        Ok(())
    }

    /// Scaffold a config with the stock traffic model.
    pub fn scaffold() -> Self {
        SimConfig {
            initial_nodes: 3,
            total_ticks: 1000,
            min_threshold: 1,
            max_threshold: 3,
            cooldown: 5,
            max_processing_cost: 10,
            traffic: TrafficConfig {
                seed: Some(42),
                ..TrafficConfig::default()
            },
            firewall: FirewallConfig {
                blocked_ranges: vec!["10.0.0.0/8".to_string(), "192.168.0.0/16".to_string()],
                ..FirewallConfig::default()
            },
        }
    }
}

fn positive(field: &'static str, value: u64) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::InvalidField {
            field,
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}
