use crate::{
    error::{ForecastError, ForecastResult},
    types::Ratio,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SIMULATION_COUNT: usize = 10_000;
pub const DEFAULT_SEED: u64 = 42;

// ── Hiring policy ──────────────────────────────────────────────────

/// Rule-based hiring policy. The two opex shares have no empirical basis
/// and are exposed here so callers can tune them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HiringPolicy {
    /// Share of the latest opex attributed to salaries.
    pub salary_share_of_opex: Ratio,
    /// Share of the latest opex that must stay in the bank before hiring.
    pub cash_buffer_share_of_opex: Ratio,
    /// Drawn growth must exceed this to hire.
    pub growth_threshold: Ratio,
    /// Alternative cash test: cash above this fraction of revenue.
    pub cash_to_revenue_floor: Ratio,
    /// Revenue per employee must exceed this multiple of salary cost.
    pub revenue_per_employee_multiple: f64,
    /// Fraction of annual salary paid up front in the hiring period.
    pub upfront_salary_fraction: Ratio,
}

impl Default for HiringPolicy {
    fn default() -> Self {
        Self {
            salary_share_of_opex: 0.65,
            cash_buffer_share_of_opex: 0.50,
            growth_threshold: 0.05,
            cash_to_revenue_floor: 0.10,
            revenue_per_employee_multiple: 2.0,
            upfront_salary_fraction: 0.5,
        }
    }
}

// ── Fitting fallbacks and domain bounds ────────────────────────────

/// Std used when a fitted sample has zero spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackStd {
    pub revenue_growth: f64,
    pub gross_margin: f64,
    pub opex_ratio: f64,
    pub cash_conversion: f64,
    pub capex_ratio: f64,
}

impl Default for FallbackStd {
    fn default() -> Self {
        Self {
            revenue_growth: 0.08,
            gross_margin: 0.04,
            opex_ratio: 0.05,
            cash_conversion: 0.15,
            capex_ratio: 0.03,
        }
    }
}

/// Closed interval used to clip a distribution's support.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Sanity floors and ceilings for the mean ± 3σ ratio supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatioBounds {
    pub gross_margin: Bounds,
    pub opex_ratio: Bounds,
    pub cash_conversion: Bounds,
    /// Width of the support in standard deviations either side of the mean.
    pub sigma_width: f64,
}

impl Default for RatioBounds {
    fn default() -> Self {
        Self {
            gross_margin: Bounds::new(0.05, 0.95),
            opex_ratio: Bounds::new(0.05, 0.90),
            cash_conversion: Bounds::new(0.20, 2.00),
            sigma_width: 3.0,
        }
    }
}

// ── Execution ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every draw from one stream, in order.
    Sequential,
    /// Fixed-size batches on the rayon pool, one derived stream per batch.
    /// Output is reproducible for a given batch_size, independent of the
    /// number of worker threads.
    Parallel { batch_size: usize },
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Sequential
    }
}

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub simulation_count: usize,
    pub seed: u64,
    /// Replaces the data-driven p95 capex cap when set.
    pub capex_cap_override: Option<Ratio>,
    pub execution: ExecutionMode,
    /// Wall-clock budget for a batch. When exhausted the batch stops
    /// starting new draws and returns what it has.
    pub time_budget_ms: Option<u64>,
    pub policy: HiringPolicy,
    pub fallback_std: FallbackStd,
    pub bounds: RatioBounds,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            simulation_count: DEFAULT_SIMULATION_COUNT,
            seed: DEFAULT_SEED,
            capex_cap_override: None,
            execution: ExecutionMode::Sequential,
            time_budget_ms: None,
            policy: HiringPolicy::default(),
            fallback_std: FallbackStd::default(),
            bounds: RatioBounds::default(),
        }
    }
}

impl ForecastConfig {
    /// Load from a JSON file. Fields absent from the file keep their defaults.
    pub fn load(path: &str) -> ForecastResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ForecastConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config with a small simulation count for use in tests.
    pub fn default_test() -> Self {
        Self {
            simulation_count: 2_000,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ForecastResult<()> {
        if self.simulation_count == 0 {
            return Err(ForecastError::InvalidConfig(
                "simulation_count must be > 0".into(),
            ));
        }
        if let ExecutionMode::Parallel { batch_size: 0 } = self.execution {
            return Err(ForecastError::InvalidConfig(
                "parallel batch_size must be > 0".into(),
            ));
        }
        if let Some(cap) = self.capex_cap_override {
            if !cap.is_finite() || cap < 0.0 {
                return Err(ForecastError::InvalidConfig(format!(
                    "capex_cap_override must be a non-negative ratio, got {cap}"
                )));
            }
        }
        for (name, b) in [
            ("gross_margin", self.bounds.gross_margin),
            ("opex_ratio", self.bounds.opex_ratio),
            ("cash_conversion", self.bounds.cash_conversion),
        ] {
            if b.min > b.max {
                return Err(ForecastError::InvalidConfig(format!(
                    "bounds.{name}: min {} exceeds max {}",
                    b.min, b.max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "simulation_count": 500, "policy": { "salary_share_of_opex": 0.7 } }"#;
        let config: ForecastConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.simulation_count, 500);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.policy.salary_share_of_opex, 0.7);
        assert_eq!(config.policy.cash_buffer_share_of_opex, 0.5);
        assert_eq!(config.execution, ExecutionMode::Sequential);
    }

    #[test]
    fn parallel_mode_deserializes() {
        let json = r#"{ "execution": { "mode": "parallel", "batch_size": 250 } }"#;
        let config: ForecastConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.execution, ExecutionMode::Parallel { batch_size: 250 });
    }

    #[test]
    fn zero_simulations_rejected() {
        let config = ForecastConfig {
            simulation_count: 0,
            ..ForecastConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
