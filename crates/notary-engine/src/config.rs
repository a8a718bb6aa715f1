use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use notary_ledger::LedgerConfig;

use crate::error::{EngineError, EngineResult};

/// Engine configuration: the `[scheduler]`, `[verification]` and `[ledger]`
/// sections of the service config file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub verification: VerificationConfig,
    pub ledger: LedgerConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Run the background anchoring loop. Manual triggers work either way.
    pub enabled: bool,
    pub interval_secs: u64,
    /// Maximum records claimed per run.
    pub batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            batch_size: 500,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerificationConfig {
    /// Upper bound on concurrent per-item checks in bulk verification.
    pub max_concurrency: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self { max_concurrency: 32 }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| EngineError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.scheduler.batch_size == 0 {
            return Err(EngineError::Config(
                "scheduler.batch_size must be greater than 0".into(),
            ));
        }
        if self.scheduler.enabled && self.scheduler.interval_secs == 0 {
            return Err(EngineError::Config(
                "scheduler.interval_secs must be greater than 0".into(),
            ));
        }
        if self.verification.max_concurrency == 0 {
            return Err(EngineError::Config(
                "verification.max_concurrency must be greater than 0".into(),
            ));
        }
        self.ledger
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))
    }
}
