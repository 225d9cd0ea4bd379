//! Scheduler configuration
//!
//! Built once at process start (usually from the environment) and shared
//! read-only with every scheduler behind an `Arc`. Nothing here is global or
//! reloadable.
//!
//! Malformed values never abort start-up: each one is reported with a single
//! `warn!` and replaced by its documented default.

use crate::domain::Subscription;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// Default slice length in seconds
pub const DEFAULT_SLICE_LENGTH_SECS: u64 = 60;

/// Depth used when no prefix matches (0 = unlimited)
pub const DEFAULT_QUEUE_DEPTH: u32 = 0;

pub const ENV_SLICE_LENGTH: &str = "ROTA_SLICE_LENGTH";
pub const ENV_QUEUE_DEPTH: &str = "ROTA_QUEUE_DEPTH";
pub const ENV_QUEUE_DEPTHS: &str = "ROTA_QUEUE_DEPTHS";
pub const ENV_BUSY_FILTER: &str = "ROTA_BUSY_FILTER";
pub const ENV_QUEUES: &str = "ROTA_QUEUES";
pub const ENV_STRATEGY: &str = "ROTA_STRATEGY";

/// Per-family concurrency caps keyed by queue-name prefix
///
/// A queue belongs to prefix `p` when its name starts with `p_`. When several
/// prefixes match, the longest one wins, so lookups never depend on insertion
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDepths {
    limits: BTreeMap<String, u32>,
}

impl QueueDepths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, prefix: impl Into<String>, max: u32) -> Self {
        self.insert(prefix, max);
        self
    }

    pub fn insert(&mut self, prefix: impl Into<String>, max: u32) {
        self.limits.insert(prefix.into(), max);
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.limits.iter().map(|(p, m)| (p.as_str(), *m))
    }

    /// Prefix governing `queue`, if any
    pub fn matching_prefix(&self, queue: &str) -> Option<&str> {
        self.limits
            .keys()
            .filter(|prefix| {
                queue.len() > prefix.len()
                    && queue.starts_with(prefix.as_str())
                    && queue.as_bytes()[prefix.len()] == b'_'
            })
            .max_by_key(|prefix| prefix.len())
            .map(String::as_str)
    }

    /// Configured max for `queue`, `DEFAULT_QUEUE_DEPTH` when unmatched
    pub fn max_for(&self, queue: &str) -> u32 {
        self.matching_prefix(queue)
            .and_then(|prefix| self.limits.get(prefix).copied())
            .unwrap_or(DEFAULT_QUEUE_DEPTH)
    }

    /// Parse `prefix=max` pairs separated by commas. Bad entries are skipped
    /// and returned as messages so the caller can report them.
    pub fn parse(raw: &str) -> (Self, Vec<String>) {
        let mut depths = Self::new();
        let mut rejected = Vec::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((prefix, max)) = entry.split_once('=') else {
                rejected.push(format!("'{}' is not prefix=max", entry));
                continue;
            };
            let prefix = prefix.trim();
            if prefix.is_empty() {
                rejected.push(format!("'{}' has an empty prefix", entry));
                continue;
            }
            match max.trim().parse::<u32>() {
                Ok(max) => depths.insert(prefix, max),
                Err(_) => rejected.push(format!("'{}' has a non-numeric max", entry)),
            }
        }

        (depths, rejected)
    }
}

/// Which reservation strategy a worker runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Time-sliced rotation with depth-based admission
    #[default]
    RoundRobin,
    /// Probe queues in listed order, no rotation, no admission
    Ordered,
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round_robin" | "round-robin" | "roundrobin" => Ok(Strategy::RoundRobin),
            "ordered" => Ok(Strategy::Ordered),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::RoundRobin => write!(f, "round_robin"),
            Strategy::Ordered => write!(f, "ordered"),
        }
    }
}

/// Everything a scheduler needs to know about its environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How long the rotation stays put after switching queues
    pub slice_length: Duration,
    /// Replaces every prefix-derived max when set
    pub depth_override: Option<u32>,
    pub queue_depths: QueueDepths,
    /// Drop queues other workers are busy on before probing
    pub busy_filter: bool,
    pub subscription: Subscription,
    pub strategy: Strategy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slice_length: Duration::from_secs(DEFAULT_SLICE_LENGTH_SECS),
            depth_override: None,
            queue_depths: QueueDepths::new(),
            busy_filter: false,
            subscription: Subscription::Wildcard,
            strategy: Strategy::RoundRobin,
        }
    }
}

impl SchedulerConfig {
    /// Load from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup (environment, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let slice_length = match lookup(ENV_SLICE_LENGTH) {
            None => defaults.slice_length,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(
                        key = ENV_SLICE_LENGTH,
                        value = %raw,
                        default_secs = DEFAULT_SLICE_LENGTH_SECS,
                        "Invalid slice length, using default"
                    );
                    defaults.slice_length
                }
            },
        };

        let depth_override = match lookup(ENV_QUEUE_DEPTH) {
            None => None,
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(max) => Some(max),
                Err(_) => {
                    warn!(
                        key = ENV_QUEUE_DEPTH,
                        value = %raw,
                        "Invalid global queue depth, ignoring override"
                    );
                    None
                }
            },
        };

        let queue_depths = match lookup(ENV_QUEUE_DEPTHS) {
            None => defaults.queue_depths,
            Some(raw) => {
                let (depths, rejected) = QueueDepths::parse(&raw);
                for reason in rejected {
                    warn!(key = ENV_QUEUE_DEPTHS, %reason, "Skipping queue depth entry");
                }
                depths
            }
        };

        let busy_filter = match lookup(ENV_BUSY_FILTER) {
            None => defaults.busy_filter,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "" | "0" | "false" | "no" | "off" => false,
                _ => {
                    warn!(key = ENV_BUSY_FILTER, value = %raw, "Invalid boolean, using false");
                    false
                }
            },
        };

        let subscription = lookup(ENV_QUEUES)
            .map(|raw| Subscription::parse(&raw))
            .unwrap_or(defaults.subscription);

        let strategy = match lookup(ENV_STRATEGY) {
            None => defaults.strategy,
            Some(raw) => raw.parse().unwrap_or_else(|reason: String| {
                warn!(key = ENV_STRATEGY, %reason, "Using default strategy");
                defaults.strategy
            }),
        };

        let config = Self {
            slice_length,
            depth_override,
            queue_depths,
            busy_filter,
            subscription,
            strategy,
        };

        if config.depth_limits_ignored() {
            warn!(
                queues_key = ENV_QUEUES,
                "Depth limits are configured but this worker subscribes to every queue; \
                 wildcard workers are never depth limited"
            );
        }

        config
    }

    /// True when depth limits are set but cannot apply (wildcard subscription)
    pub fn depth_limits_ignored(&self) -> bool {
        self.is_wildcard() && (self.depth_override.is_some() || !self.queue_depths.is_empty())
    }

    pub fn slice_length_millis(&self) -> i64 {
        i64::try_from(self.slice_length.as_millis()).unwrap_or(i64::MAX)
    }

    pub fn is_wildcard(&self) -> bool {
        self.subscription.is_wildcard()
    }

    /// Effective max depth for `queue`: the override if set, else the prefix max
    pub fn max_depth_for(&self, queue: &str) -> u32 {
        self.depth_override
            .unwrap_or_else(|| self.queue_depths.max_for(queue))
    }
}
