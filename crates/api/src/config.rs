use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `BLOG_VIEW_WINDOW_SECS=900`.
pub const ENV_PREFIX: &str = "BLOG_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Set to "production" for JSON logging and absolute asset URLs.
    #[serde(default)]
    pub env: String,
    /// Minimum time before the same viewer can bump an article's view count again.
    #[serde(default = "default_view_window_secs")]
    pub view_window_secs: u64,
    /// Live view records above this count trigger an immediate sweep.
    #[serde(default = "default_view_high_water_mark")]
    pub view_high_water_mark: usize,
    /// Lifetime of an emailed verification code.
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: u64,
    /// How often the background sweepers run.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Ports of local frontend dev servers that proxy `/uploads` back to us.
    #[serde(default = "default_dev_frontend_ports")]
    pub dev_frontend_ports: Vec<String>,
}

fn default_view_window_secs() -> u64 {
    15 * 60
}

fn default_view_high_water_mark() -> usize {
    10_000
}

fn default_code_ttl_secs() -> u64 {
    10 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

fn default_dev_frontend_ports() -> Vec<String> {
    ["5173", "3001", "8080", "5174", "5175"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: String::new(),
            view_window_secs: default_view_window_secs(),
            view_high_water_mark: default_view_high_water_mark(),
            code_ttl_secs: default_code_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            dev_frontend_ports: default_dev_frontend_ports(),
        }
    }
}

impl Config {
    /// Load configuration from `BLOG_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = envy::prefixed(ENV_PREFIX).from_env::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from explicit `(name, value)` pairs, e.g. a parsed env file.
    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::prefixed(ENV_PREFIX).from_iter::<_, Config>(vars)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject durations that cannot be represented or would stall the sweepers.
    pub fn validate(&self) -> anyhow::Result<()> {
        seconds_delta(self.view_window_secs).ok_or_else(|| {
            anyhow::anyhow!(
                "{ENV_PREFIX}VIEW_WINDOW_SECS out of range: {}",
                self.view_window_secs
            )
        })?;
        seconds_delta(self.code_ttl_secs).ok_or_else(|| {
            anyhow::anyhow!("{ENV_PREFIX}CODE_TTL_SECS out of range: {}", self.code_ttl_secs)
        })?;
        if self.sweep_interval_secs == 0 {
            anyhow::bail!("{ENV_PREFIX}SWEEP_INTERVAL_SECS must be greater than zero");
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    /// Saturates at `TimeDelta::MAX` for values `validate` would reject.
    pub fn view_window(&self) -> TimeDelta {
        seconds_delta(self.view_window_secs).unwrap_or(TimeDelta::MAX)
    }

    /// Saturates at `TimeDelta::MAX` for values `validate` would reject.
    pub fn code_ttl(&self) -> TimeDelta {
        seconds_delta(self.code_ttl_secs).unwrap_or(TimeDelta::MAX)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn seconds_delta(secs: u64) -> Option<TimeDelta> {
    i64::try_from(secs).ok().and_then(TimeDelta::try_seconds)
}
