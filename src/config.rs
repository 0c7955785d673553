// Tue Jan 20 2026 - Alex
//
// Layered configuration surface for running the analysis: a builder with a
// final `validate()` pass, so malformed combinations surface before the
// driver runs rather than partway through a fixpoint loop.

use crate::error::AnalysisError;
use crate::steensgaard::DriverMode;
use serde::{Deserialize, Serialize};

/// How the analysis should treat malformed IR (SPEC_FULL.md §7): a call
/// site whose callee operand is neither a function pointer nor a function,
/// and similar. Relaxed mode matches the analysis's own default ("skip the
/// site, log a debug message"); strict mode turns the same conditions into
/// a returned `AnalysisError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrictnessMode {
    Relaxed,
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub driver_mode: DriverMode,
    pub strictness: StrictnessMode,
    /// Emit the `-check-same-node`-style textual report after a run.
    pub emit_report: bool,
    /// Upper bound the driver's fixpoint loop is allowed to take before
    /// treating non-convergence as a configuration error rather than an
    /// assertion failure; `None` keeps the default "no cap, just a debug
    /// assertion" behavior (SPEC_FULL.md §4.3, §9).
    pub max_iterations: Option<usize>,
    pub log_level: log::LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver_mode: DriverMode::standard(),
            strictness: StrictnessMode::Relaxed,
            emit_report: false,
            max_iterations: None,
            log_level: log::LevelFilter::Info,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_driver_mode(mut self, mode: DriverMode) -> Self {
        self.driver_mode = mode;
        self
    }

    pub fn with_strictness(mut self, strictness: StrictnessMode) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn with_report(mut self, emit: bool) -> Self {
        self.emit_report = emit;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_log_level(mut self, level: log::LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if let Some(max) = self.max_iterations {
            if max == 0 {
                return Err(AnalysisError::ConfigError(
                    "max_iterations must be greater than 0 when set".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_max_iterations_is_rejected() {
        let cfg = Config::new().with_max_iterations(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn builder_methods_compose() {
        let cfg = Config::new()
            .with_strictness(StrictnessMode::Strict)
            .with_report(true)
            .with_log_level(log::LevelFilter::Debug);
        assert_eq!(cfg.strictness, StrictnessMode::Strict);
        assert!(cfg.emit_report);
        assert_eq!(cfg.log_level, log::LevelFilter::Debug);
    }
}
