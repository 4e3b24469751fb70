//! Results assembler: percentile summary of a SimulationBatch.
//!
//! Reads the batch, never mutates it. The hiring-rule block echoes the
//! thresholds the scenarios were evaluated against; nothing in it is
//! recomputed from the outcomes.

use crate::{
    config::HiringPolicy,
    engine::SimulationBatch,
    history::FiscalPeriod,
    stats,
    types::{Currency, Ratio},
};
use serde::{Deserialize, Serialize};

/// Ordered tail and central percentiles of one outcome vector.
/// Invariant: p5 <= p10 <= median <= p90 <= p95.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileBands {
    pub p5: f64,
    pub p10: f64,
    pub median: f64,
    pub p90: f64,
    pub p95: f64,
}

impl PercentileBands {
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        stats::sort_ascending(&mut sorted);
        Self {
            p5: stats::percentile_sorted(&sorted, 5.0),
            p10: stats::percentile_sorted(&sorted, 10.0),
            median: stats::percentile_sorted(&sorted, 50.0),
            p90: stats::percentile_sorted(&sorted, 90.0),
            p95: stats::percentile_sorted(&sorted, 95.0),
        }
    }

    pub fn as_array(&self) -> [f64; 5] {
        [self.p5, self.p10, self.median, self.p90, self.p95]
    }

    pub fn is_ordered(&self) -> bool {
        self.as_array().windows(2).all(|w| w[0] <= w[1])
    }
}

/// Human-readable description of the hiring rule as applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiringParameters {
    pub avg_annual_salary_cost: Currency,
    pub min_cash_buffer_for_hiring: Currency,
    pub growth_threshold: Ratio,
    pub cash_to_revenue_floor: Ratio,
    pub revenue_per_employee_multiple: f64,
    pub upfront_salary_fraction: Ratio,
    pub starting_employee_count: u32,
    pub rules: Vec<String>,
}

impl HiringParameters {
    pub fn describe(batch: &SimulationBatch, policy: &HiringPolicy) -> Self {
        let base = &batch.base;
        let rules = vec![
            format!("revenue growth draw > {:.1}%", policy.growth_threshold * 100.0),
            format!(
                "cash > {:.0} (minimum buffer) or cash > {:.0}% of revenue",
                base.min_cash_buffer_for_hiring,
                policy.cash_to_revenue_floor * 100.0
            ),
            format!("employee count > 0 (starting at {})", base.employee_count),
            format!(
                "revenue per employee > {:.1} x average annual salary cost {:.0}",
                policy.revenue_per_employee_multiple, base.avg_annual_salary_cost
            ),
            format!(
                "on hire: {:.0}% of annual salary deducted from cash, headcount +1",
                policy.upfront_salary_fraction * 100.0
            ),
        ];
        Self {
            avg_annual_salary_cost: base.avg_annual_salary_cost,
            min_cash_buffer_for_hiring: base.min_cash_buffer_for_hiring,
            growth_threshold: policy.growth_threshold,
            cash_to_revenue_floor: policy.cash_to_revenue_floor,
            revenue_per_employee_multiple: policy.revenue_per_employee_multiple,
            upfront_salary_fraction: policy.upfront_salary_fraction,
            starting_employee_count: base.employee_count,
            rules,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    /// Period the starting position was taken from.
    pub anchor_period: FiscalPeriod,
    pub num_simulations: usize,
    pub starting_cash: Currency,
    pub starting_revenue: Currency,
    pub cash: PercentileBands,
    pub revenue: PercentileBands,
    pub probability_cash_negative: f64,
    pub probability_should_hire: f64,
    /// Mean simulated revenue relative to the starting revenue, minus one.
    pub expected_revenue_growth: Ratio,
    pub capex_cap_used: Ratio,
    pub hiring_parameters: HiringParameters,
}

/// Summarize a batch.
pub fn assemble_summary(batch: &SimulationBatch, policy: &HiringPolicy) -> ForecastSummary {
    let base = &batch.base;
    let cash = PercentileBands::from_values(&batch.cash);
    let revenue = PercentileBands::from_values(&batch.revenue);

    let probability_should_hire = if batch.is_empty() {
        0.0
    } else {
        batch.hired.iter().filter(|&&h| h).count() as f64 / batch.len() as f64
    };

    let expected_revenue_growth = if base.revenue > 0.0 && !batch.is_empty() {
        stats::mean(&batch.revenue) / base.revenue - 1.0
    } else {
        0.0
    };

    ForecastSummary {
        anchor_period: base.anchor_period,
        num_simulations: batch.len(),
        starting_cash: base.cash,
        starting_revenue: base.revenue,
        cash,
        revenue,
        probability_cash_negative: stats::fraction_where(&batch.cash, |c| c < 0.0),
        probability_should_hire,
        expected_revenue_growth,
        capex_cap_used: batch.capex_cap,
        hiring_parameters: HiringParameters::describe(batch, policy),
    }
}
