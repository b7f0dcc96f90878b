//! # Configuration Management
//!
//! Hierarchical configuration for the screening platform, loaded in order of
//! precedence:
//!
//! 1. **Environment variables** (highest precedence)
//! 2. **Environment-specific TOML files** (e.g. `config/production.toml`)
//! 3. **Default TOML file** (`config/default.toml`) (lowest precedence)
//!
//! The environment is selected via the `ENVIRONMENT` variable
//! (`development` by default). `load()` validates the result and fails fast
//! on out-of-range thresholds so a misconfigured engine never starts.

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main configuration structure containing all engine settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScreeningConfig {
    /// SAR loop thresholds, iteration caps and fan-out limits
    pub engine: EngineConfig,
    /// Provider gateway limits, retry and circuit breaker settings
    pub gateway: GatewayConfig,
    /// Cache freshness tightening factors
    pub cache: CacheConfig,
    /// Monitoring scheduler settings
    pub monitoring: MonitoringSettings,
    /// Application-level settings
    pub app: AppConfig,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            gateway: GatewayConfig::default(),
            cache: CacheConfig::default(),
            monitoring: MonitoringSettings::default(),
            app: AppConfig::default(),
        }
    }
}

/// SAR iteration control and orchestration limits.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Confidence threshold for Records and Intelligence info types
    pub confidence_threshold: f64,
    /// Confidence threshold for Foundation info types
    pub foundation_confidence_threshold: f64,
    /// Iteration cap for Records and Intelligence info types
    pub max_iterations: u32,
    /// Iteration cap for Foundation info types
    pub foundation_max_iterations: u32,
    /// Minimum info-gain rate below which returns are diminishing
    pub min_gain_threshold: f64,
    /// Minimum confidence delta below which returns are diminishing
    pub min_confidence_delta: f64,
    /// Cap on connected entities expanded per degree
    pub network_max_entities_per_degree: usize,
    /// Global bound on concurrent queries within one investigation
    pub global_investigation_limit: usize,
    /// Per-screening deadline in seconds
    pub screening_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.85,
            foundation_confidence_threshold: 0.90,
            max_iterations: 3,
            foundation_max_iterations: 4,
            min_gain_threshold: 0.10,
            min_confidence_delta: 0.05,
            network_max_entities_per_degree: 20,
            global_investigation_limit: 32,
            screening_timeout_secs: 1800,
        }
    }
}

/// Default per-provider request limits. Individual providers may override.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ProviderLimits {
    /// Requests per minute
    pub rpm: u32,
    /// Requests per hour
    pub rph: u32,
    /// Requests per day
    pub rpd: u32,
    /// Burst allowance on top of rpm
    pub burst: u32,
}

impl Default for ProviderLimits {
    fn default() -> Self {
        Self {
            rpm: 60,
            rph: 1800,
            rpd: 20000,
            burst: 5,
        }
    }
}

/// Retry policy for transient provider failures.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    /// Exponential base applied per attempt
    pub backoff_base: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            backoff_base: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

/// Circuit breaker thresholds per provider.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CircuitConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before allowing probes
    pub recovery_timeout_secs: u64,
    /// Probe budget while half-open
    pub half_open_max_calls: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            half_open_max_calls: 1,
        }
    }
}

/// Provider gateway settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    /// Per-provider call timeout in seconds
    pub provider_timeout_secs: u64,
    pub default_limits: ProviderLimits,
    pub retry: RetryConfig,
    pub circuit: CircuitConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: 30,
            default_limits: ProviderLimits::default(),
            retry: RetryConfig::default(),
            circuit: CircuitConfig::default(),
        }
    }
}

/// Cache freshness tightening for the Enhanced tier.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CacheConfig {
    /// Enhanced-tier multiplier on the fresh window
    pub enhanced_fresh_factor: f64,
    /// Enhanced-tier multiplier on the stale window
    pub enhanced_stale_factor: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enhanced_fresh_factor: 0.5,
            enhanced_stale_factor: 0.7,
        }
    }
}

/// Monitoring scheduler settings.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct MonitoringSettings {
    /// Seconds between due-config polls
    pub poll_interval_secs: u64,
    /// Concurrent re-investigations allowed
    pub max_concurrent_runs: usize,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            max_concurrent_runs: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub environment: String,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ScreeningConfig {
    /// Load configuration from layered sources and validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            .add_source(Environment::with_prefix("SCREENING").separator("__"));

        let config = builder.build()?;
        let loaded: ScreeningConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject configurations an engine cannot run safely with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Message(format!(
                    "{} must be within [0, 1] (current: {})",
                    name, value
                )));
            }
            Ok(())
        }

        unit_interval("engine.confidence_threshold", self.engine.confidence_threshold)?;
        unit_interval(
            "engine.foundation_confidence_threshold",
            self.engine.foundation_confidence_threshold,
        )?;
        unit_interval("engine.min_gain_threshold", self.engine.min_gain_threshold)?;
        unit_interval("engine.min_confidence_delta", self.engine.min_confidence_delta)?;
        unit_interval("cache.enhanced_fresh_factor", self.cache.enhanced_fresh_factor)?;
        unit_interval("cache.enhanced_stale_factor", self.cache.enhanced_stale_factor)?;

        if self.engine.max_iterations == 0 || self.engine.foundation_max_iterations == 0 {
            return Err(ConfigError::Message(
                "iteration caps must be at least 1".to_string(),
            ));
        }

        if self.engine.global_investigation_limit == 0 {
            return Err(ConfigError::Message(
                "engine.global_investigation_limit must be at least 1".to_string(),
            ));
        }

        if self.engine.network_max_entities_per_degree == 0 {
            return Err(ConfigError::Message(
                "engine.network_max_entities_per_degree must be at least 1".to_string(),
            ));
        }

        if self.gateway.retry.backoff_base < 1.0 {
            return Err(ConfigError::Message(
                "gateway.retry.backoff_base must be >= 1.0".to_string(),
            ));
        }

        if self.gateway.circuit.failure_threshold == 0 {
            return Err(ConfigError::Message(
                "gateway.circuit.failure_threshold must be at least 1".to_string(),
            ));
        }

        if self.monitoring.max_concurrent_runs == 0 {
            return Err(ConfigError::Message(
                "monitoring.max_concurrent_runs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ScreeningConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.confidence_threshold, 0.85);
        assert_eq!(config.engine.foundation_confidence_threshold, 0.90);
        assert_eq!(config.engine.max_iterations, 3);
        assert_eq!(config.engine.foundation_max_iterations, 4);
        assert_eq!(config.gateway.circuit.failure_threshold, 5);
        assert_eq!(config.gateway.circuit.recovery_timeout_secs, 60);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = ScreeningConfig::default();
        config.engine.confidence_threshold = 1.3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iteration_cap_is_rejected() {
        let mut config = ScreeningConfig::default();
        config.engine.max_iterations = 0;
        assert!(config.validate().is_err());
    }
}
