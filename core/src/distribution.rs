//! Distribution builder: bounded per-factor distributions.
//!
//! Growth, margin, opex ratio and cash conversion are truncated normals.
//! Capex ratio is a log-normal whose cap is supplied at draw time, so the
//! cap can be revised without rebuilding the set.

use crate::{
    config::{Bounds, RatioBounds},
    metrics::{BaseMetrics, FactorFit},
    rng::ForecastRng,
};
use rand_distr::{Distribution, LogNormal};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// The simulated drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    RevenueGrowth,
    GrossMargin,
    OpexRatio,
    CashConversion,
    CapexRatio,
}

impl RiskFactor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RevenueGrowth => "revenue_growth",
            Self::GrossMargin => "gross_margin",
            Self::OpexRatio => "opex_ratio",
            Self::CashConversion => "cash_conversion",
            Self::CapexRatio => "capex_ratio",
        }
    }
}

// ── Truncated normal ───────────────────────────────────────────────

/// Normal(mean, std) restricted to [min, max].
/// Invariant: min <= mean <= max. A std of 0 is a point mass at mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruncatedNormal {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl TruncatedNormal {
    /// Normalizes its inputs so the invariant holds: swapped bounds are
    /// reordered and a mean outside the support is pulled onto it.
    pub fn new(mean: f64, std: f64, min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            mean: mean.clamp(min, max),
            std: std.max(0.0),
            min,
            max,
        }
    }

    /// Inverse-CDF draw restricted to the support.
    pub fn sample(&self, rng: &mut ForecastRng) -> f64 {
        if self.std == 0.0 || self.min == self.max {
            return self.mean;
        }
        let Ok(normal) = Normal::new(self.mean, self.std) else {
            return self.mean;
        };
        let lo = normal.cdf(self.min);
        let hi = normal.cdf(self.max);
        if hi - lo <= f64::EPSILON {
            return self.mean;
        }
        let u = lo + rng.next_f64() * (hi - lo);
        normal.inverse_cdf(u).clamp(self.min, self.max)
    }
}

// ── Capex log-normal ───────────────────────────────────────────────

/// Log-normal with scale = mean and shape = std / mean. This is a coarse
/// moment match, not a log-space fit; output distributions depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapexLogNormal {
    pub mean: f64,
    pub std: f64,
}

impl CapexLogNormal {
    /// Shape parameter, or None when the mean is not positive.
    pub fn shape(&self) -> Option<f64> {
        (self.mean > 0.0).then(|| (self.std / self.mean).max(0.0))
    }

    /// Draw a ratio clipped to `cap`. A non-positive mean draws 0.
    pub fn sample(&self, rng: &mut ForecastRng, cap: f64) -> f64 {
        let Some(shape) = self.shape() else {
            return 0.0;
        };
        let draw = if shape == 0.0 {
            self.mean
        } else {
            match LogNormal::new(self.mean.ln(), shape) {
                Ok(dist) => dist.sample(rng),
                Err(_) => self.mean,
            }
        };
        draw.min(cap).max(0.0)
    }
}

// ── Distribution set ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DistributionSpec {
    TruncatedNormal(TruncatedNormal),
    LogNormal(CapexLogNormal),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSet {
    pub revenue_growth: TruncatedNormal,
    pub gross_margin: TruncatedNormal,
    pub opex_ratio: TruncatedNormal,
    pub cash_conversion: TruncatedNormal,
    pub capex_ratio: CapexLogNormal,
}

impl DistributionSet {
    /// Factor name → spec view of the set.
    pub fn specs(&self) -> [(RiskFactor, DistributionSpec); 5] {
        [
            (RiskFactor::RevenueGrowth, DistributionSpec::TruncatedNormal(self.revenue_growth)),
            (RiskFactor::GrossMargin, DistributionSpec::TruncatedNormal(self.gross_margin)),
            (RiskFactor::OpexRatio, DistributionSpec::TruncatedNormal(self.opex_ratio)),
            (RiskFactor::CashConversion, DistributionSpec::TruncatedNormal(self.cash_conversion)),
            (RiskFactor::CapexRatio, DistributionSpec::LogNormal(self.capex_ratio)),
        ]
    }

    pub fn get(&self, factor: RiskFactor) -> DistributionSpec {
        match factor {
            RiskFactor::RevenueGrowth => DistributionSpec::TruncatedNormal(self.revenue_growth),
            RiskFactor::GrossMargin => DistributionSpec::TruncatedNormal(self.gross_margin),
            RiskFactor::OpexRatio => DistributionSpec::TruncatedNormal(self.opex_ratio),
            RiskFactor::CashConversion => DistributionSpec::TruncatedNormal(self.cash_conversion),
            RiskFactor::CapexRatio => DistributionSpec::LogNormal(self.capex_ratio),
        }
    }
}

/// Build the per-factor distributions from base statistics.
///
/// Growth uses the empirical p5/p95 directly. The ratios use
/// mean ± sigma_width·std, clipped to the configured sanity bounds.
pub fn build_distributions(base: &BaseMetrics, bounds: &RatioBounds) -> DistributionSet {
    let growth = &base.revenue_growth;
    let set = DistributionSet {
        revenue_growth: TruncatedNormal::new(growth.mean, growth.std, growth.p5, growth.p95),
        gross_margin: clipped(base.gross_margin, bounds.gross_margin, bounds.sigma_width),
        opex_ratio: clipped(base.opex_ratio, bounds.opex_ratio, bounds.sigma_width),
        cash_conversion: clipped(base.cash_conversion, bounds.cash_conversion, bounds.sigma_width),
        capex_ratio: CapexLogNormal {
            mean: base.capex_ratio.mean,
            std: base.capex_ratio.std,
        },
    };
    for (factor, spec) in set.specs() {
        log::debug!("{}: {:?}", factor.name(), spec);
    }
    set
}

fn clipped(fit: FactorFit, domain: Bounds, width: f64) -> TruncatedNormal {
    let min = (fit.mean - width * fit.std).clamp(domain.min, domain.max);
    let max = (fit.mean + width * fit.std).clamp(domain.min, domain.max);
    TruncatedNormal::new(fit.mean, fit.std, min, max)
}
