//! Scheduler configuration structures.

use serde::{Deserialize, Serialize};

/// Prefix of the environment variables read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "SLOT_SCHEDULER_";

const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const DEFAULT_JOIN_GRACE_MS: u64 = 2_000;
const DEFAULT_THREAD_PREFIX: &str = "slot-item";
const DEFAULT_MAX_PASSES: u32 = 65_536;

/// Round source selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RoundSourceConfig {
    /// Internal timer producing `slots_per_period` slots every `period_ms`.
    Automated {
        /// Timer period in milliseconds.
        period_ms: u64,
        /// Slots produced per firing.
        slots_per_period: u32,
    },
    /// Rounds produced by `supply` calls.
    Supplied,
}

impl RoundSourceConfig {
    /// Validate source values.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Automated {
                period_ms,
                slots_per_period,
            } => {
                if *period_ms == 0 {
                    return Err("period_ms must be greater than 0".into());
                }
                if *slots_per_period == 0 {
                    return Err("slots_per_period must be greater than 0".into());
                }
                Ok(())
            }
            Self::Supplied => Ok(()),
        }
    }
}

/// Dedicated worker thread settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
    /// How long `dispose` waits for workers before detaching them.
    pub join_grace_ms: u64,
    /// Worker threads are named `{prefix}-{item id}`.
    pub thread_name_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_stack_size: DEFAULT_STACK_SIZE,
            join_grace_ms: DEFAULT_JOIN_GRACE_MS,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_owned(),
        }
    }
}

impl WorkerConfig {
    /// Default worker settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the dispose grace period.
    #[must_use]
    pub const fn with_join_grace_ms(mut self, ms: u64) -> Self {
        self.join_grace_ms = ms;
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate worker values.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Round source selection.
    pub rounds: RoundSourceConfig,
    /// Dedicated worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Upper bound on accrual passes when spending one supplied batch.
    #[serde(default = "default_max_passes")]
    pub max_passes_per_round: u32,
}

const fn default_max_passes() -> u32 {
    DEFAULT_MAX_PASSES
}

impl SchedulerConfig {
    /// Timer-driven configuration.
    #[must_use]
    pub fn automated(period_ms: u64, slots_per_period: u32) -> Self {
        Self {
            rounds: RoundSourceConfig::Automated {
                period_ms,
                slots_per_period,
            },
            worker: WorkerConfig::default(),
            max_passes_per_round: DEFAULT_MAX_PASSES,
        }
    }

    /// Externally supplied configuration.
    #[must_use]
    pub fn supplied() -> Self {
        Self {
            rounds: RoundSourceConfig::Supplied,
            worker: WorkerConfig::default(),
            max_passes_per_round: DEFAULT_MAX_PASSES,
        }
    }

    /// Replace the worker settings.
    #[must_use]
    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    /// Set the pass limit for supplied batches.
    #[must_use]
    pub const fn with_max_passes_per_round(mut self, passes: u32) -> Self {
        self.max_passes_per_round = passes;
        self
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), String> {
        self.rounds.validate().map_err(|e| format!("rounds invalid: {e}"))?;
        self.worker.validate().map_err(|e| format!("worker invalid: {e}"))?;
        if self.max_passes_per_round == 0 {
            return Err("max_passes_per_round must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `SLOT_SCHEDULER_*` keys resolved by `lookup`.
    ///
    /// | Key                         | Meaning                               |
    /// |-----------------------------|---------------------------------------|
    /// | `MODE`                      | `automated` (default) or `supplied`   |
    /// | `PERIOD_MS`                 | timer period, required when automated |
    /// | `SLOTS_PER_PERIOD`          | slots per firing, default 1           |
    /// | `MAX_PASSES_PER_ROUND`      | supplied pass limit                   |
    /// | `WORKER_STACK_SIZE`         | worker stack bytes                    |
    /// | `WORKER_JOIN_GRACE_MS`      | dispose grace period                  |
    /// | `WORKER_THREAD_PREFIX`      | worker thread name prefix             |
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

        let mode = get("MODE").unwrap_or_else(|| "automated".to_owned());
        let mut cfg = match mode.trim().to_ascii_lowercase().as_str() {
            "automated" => {
                let period_ms = parse_key(&get, "PERIOD_MS")?
                    .ok_or_else(|| format!("{ENV_PREFIX}PERIOD_MS is required in automated mode"))?;
                let slots = parse_key(&get, "SLOTS_PER_PERIOD")?.unwrap_or(1);
                Self::automated(period_ms, slots)
            }
            "supplied" => Self::supplied(),
            other => return Err(format!("unknown mode `{other}`")),
        };

        if let Some(passes) = parse_key(&get, "MAX_PASSES_PER_ROUND")? {
            cfg.max_passes_per_round = passes;
        }
        if let Some(bytes) = parse_key(&get, "WORKER_STACK_SIZE")? {
            cfg.worker.thread_stack_size = bytes;
        }
        if let Some(ms) = parse_key(&get, "WORKER_JOIN_GRACE_MS")? {
            cfg.worker.join_grace_ms = ms;
        }
        if let Some(prefix) = get("WORKER_THREAD_PREFIX") {
            cfg.worker.thread_name_prefix = prefix;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `.env` if present, then read `SLOT_SCHEDULER_*` variables.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

fn parse_key<T, G>(get: &G, key: &str) -> Result<Option<T>, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| format!("{ENV_PREFIX}{key}: {e}"))
        })
        .transpose()
}
