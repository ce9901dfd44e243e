//! Runtime configuration
//!
//! Defaults match the production timings. `from_env` overlays
//! `LANEGUARD_*` variables; durations use humantime syntax (`30s`, `2m`).

use std::net::SocketAddr;
use std::time::Duration;

use laneguard_coordinator::{DEFAULT_DECISION_TIMEOUT, SUPPRESSION_TTL};
use laneguard_core::{LaneguardError, LaneguardResult};
use laneguard_liveness::LIVENESS_THRESHOLD;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,laneguard=debug";

/// Outbound notification to the cooperating incident system
#[derive(Clone, Debug, PartialEq)]
pub struct NotifyConfig {
    /// POST target; notifications are skipped when unset
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogConfig {
    pub filter: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

/// laneguard runtime configuration
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeConfig {
    pub bind_addr: SocketAddr,
    /// How long an incident waits for an operator
    pub decision_timeout: Duration,
    /// Heartbeat age after which a node goes OFFLINE
    pub liveness_threshold: Duration,
    /// Period of the background liveness sweep
    pub sweep_interval: Duration,
    /// Echo suppression window
    pub suppression_ttl: Duration,
    /// Dashboard event buffer per subscriber
    pub broadcast_capacity: usize,
    pub notify: NotifyConfig,
    pub log: LogConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            decision_timeout: DEFAULT_DECISION_TIMEOUT,
            liveness_threshold: LIVENESS_THRESHOLD,
            sweep_interval: Duration::from_secs(15),
            suppression_ttl: SUPPRESSION_TTL,
            broadcast_capacity: 256,
            notify: NotifyConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> LaneguardResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each
    /// `LANEGUARD_*` key
    pub fn from_lookup<F>(lookup: F) -> LaneguardResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("LANEGUARD_BIND_ADDR") {
            config.bind_addr = v
                .parse()
                .map_err(|e| invalid("LANEGUARD_BIND_ADDR", &v, e))?;
        }
        if let Some(v) = lookup("LANEGUARD_DECISION_TIMEOUT") {
            config.decision_timeout = duration("LANEGUARD_DECISION_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("LANEGUARD_LIVENESS_THRESHOLD") {
            config.liveness_threshold = duration("LANEGUARD_LIVENESS_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("LANEGUARD_SWEEP_INTERVAL") {
            config.sweep_interval = duration("LANEGUARD_SWEEP_INTERVAL", &v)?;
        }
        if let Some(v) = lookup("LANEGUARD_SUPPRESSION_TTL") {
            config.suppression_ttl = duration("LANEGUARD_SUPPRESSION_TTL", &v)?;
        }
        if let Some(v) = lookup("LANEGUARD_BROADCAST_CAPACITY") {
            config.broadcast_capacity = v
                .parse()
                .map_err(|e| invalid("LANEGUARD_BROADCAST_CAPACITY", &v, e))?;
        }
        if let Some(v) = lookup("LANEGUARD_NOTIFY_ENDPOINT") {
            let v = v.trim();
            config.notify.endpoint = (!v.is_empty()).then(|| v.to_string());
        }
        if let Some(v) = lookup("LANEGUARD_NOTIFY_TIMEOUT") {
            config.notify.timeout = duration("LANEGUARD_NOTIFY_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("LANEGUARD_LOG") {
            config.log.filter = v;
        }
        if let Some(v) = lookup("LANEGUARD_LOG_JSON") {
            config.log.json = match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => return Err(invalid("LANEGUARD_LOG_JSON", &v, "expected a boolean")),
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LaneguardResult<()> {
        let durations = [
            ("decision_timeout", self.decision_timeout),
            ("liveness_threshold", self.liveness_threshold),
            ("sweep_interval", self.sweep_interval),
            ("suppression_ttl", self.suppression_ttl),
            ("notify.timeout", self.notify.timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(LaneguardError::Configuration(format!("{} must be non-zero", name)));
            }
        }
        if self.broadcast_capacity == 0 {
            return Err(LaneguardError::Configuration(
                "broadcast_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str, reason: impl std::fmt::Display) -> LaneguardError {
    LaneguardError::Configuration(format!("{}={:?}: {}", key, value, reason))
}

fn duration(key: &str, value: &str) -> LaneguardResult<Duration> {
    humantime::parse_duration(value.trim()).map_err(|e| invalid(key, value, e))
}
