//! Generation settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{SchedulerError, SchedulerResult};

pub const MIN_ITERATIONS: u32 = 1;
pub const MAX_ITERATIONS: u32 = 1000;
pub const MIN_TIMEOUT_SECS: u64 = 10;
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Which hitting-set solver the advisor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisorMode {
    #[default]
    Greedy,
    /// Integer program; needs the `exact-advisor` feature.
    Exact,
}

/// Options for one call to `ScheduleGenerator::run`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    /// Enumerate schedules with backtracking instead of the greedy placer.
    pub get_all_schedules: bool,
    pub optimize: bool,
    pub max_iterations: u32,
    /// Optimizer wall-clock budget in seconds.
    pub timeout: u64,
    /// Backtracking stops after this many complete schedules.
    pub max_found_schedules: usize,
    /// Upper bound on `requested_schedules`.
    pub max_saved_schedules: usize,
    pub requested_schedules: usize,
    pub seed: Option<u64>,
    /// Treat a save that matches no slot row as a failed run.
    pub strict_integrity: bool,
    pub advisor: AdvisorMode,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            get_all_schedules: false,
            optimize: false,
            max_iterations: 100,
            timeout: 60,
            max_found_schedules: 100,
            max_saved_schedules: 10,
            requested_schedules: 10,
            seed: None,
            strict_integrity: false,
            advisor: AdvisorMode::Greedy,
        }
    }
}

impl GenerationConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> SchedulerResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: GenerationConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.max_iterations) {
            return Err(SchedulerError::InvalidConfig(format!(
                "max_iterations must be between {} and {}, got {}",
                MIN_ITERATIONS, MAX_ITERATIONS, self.max_iterations
            )));
        }
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&self.timeout) {
            return Err(SchedulerError::InvalidConfig(format!(
                "timeout must be between {} and {} seconds, got {}",
                MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS, self.timeout
            )));
        }
        if self.max_found_schedules == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_found_schedules must be at least 1".to_string(),
            ));
        }
        if self.requested_schedules == 0 || self.requested_schedules > self.max_saved_schedules {
            return Err(SchedulerError::InvalidConfig(format!(
                "requested_schedules must be between 1 and {}, got {}",
                self.max_saved_schedules, self.requested_schedules
            )));
        }
        if self.advisor == AdvisorMode::Exact && !cfg!(feature = "exact-advisor") {
            return Err(SchedulerError::InvalidConfig(
                "exact advisor requires the `exact-advisor` feature".to_string(),
            ));
        }
        Ok(())
    }

    pub fn optimizer(&self) -> OptimizerConfig {
        OptimizerConfig {
            max_iterations: self.max_iterations,
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

/// Local search budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerConfig {
    pub max_iterations: u32,
    pub timeout: Duration,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            timeout: Duration::from_secs(60),
        }
    }
}
