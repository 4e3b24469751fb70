//! Historical metrics deriver.
//!
//! Turns the cleaned statement table into a single BaseMetrics snapshot:
//! the starting position taken from the latest period with positive cash,
//! plus mean/std fits for every simulated driver. Pure function of its
//! inputs; computed once per analysis run and never mutated afterwards.

use crate::{
    config::{FallbackStd, ForecastConfig, HiringPolicy},
    error::{ForecastError, ForecastResult},
    history::{FiscalPeriod, HistoricalRow},
    stats,
    types::{Currency, Ratio},
};
use serde::{Deserialize, Serialize};

/// Quarter-over-quarter growth is annualized by this factor.
pub const ANNUALIZATION_FACTOR: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorFit {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthFit {
    pub mean: Ratio,
    pub std: Ratio,
    pub p5: Ratio,
    pub p95: Ratio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseMetrics {
    /// Period the starting position was taken from.
    pub anchor_period: FiscalPeriod,
    pub revenue: Currency,
    pub cash: Currency,
    /// Always >= 1.
    pub employee_count: u32,

    pub revenue_growth: GrowthFit,
    pub gross_margin: FactorFit,
    pub opex_ratio: FactorFit,
    pub cash_conversion: FactorFit,
    pub capex_ratio: FactorFit,
    /// 95th percentile of historical capex / revenue.
    pub capex_cap: Ratio,

    pub avg_annual_salary_cost: Currency,
    pub min_cash_buffer_for_hiring: Currency,

    /// Number of historical periods the fit was computed from.
    pub periods_used: usize,
}

/// Derive BaseMetrics from a chronologically sorted, cleaned table.
pub fn derive_base_metrics(
    rows: &[HistoricalRow],
    config: &ForecastConfig,
) -> ForecastResult<BaseMetrics> {
    let anchor = rows
        .iter()
        .rev()
        .find(|r| r.cash_end.is_some_and(|c| c > 0.0))
        .ok_or_else(|| ForecastError::InsufficientData {
            reason: "no period with positive ending cash".into(),
        })?;

    if rows.len() < 2 {
        return Err(ForecastError::InsufficientData {
            reason: format!("need at least 2 periods for growth, got {}", rows.len()),
        });
    }

    let fallback = &config.fallback_std;
    let revenue_growth = fit_growth(rows, fallback)?;

    let gross_margin = fit_factor(
        "gross_margin",
        ratio_sample(rows, |r| r.gross_profit.map(|gp| gp / r.revenue)),
        fallback.gross_margin,
    )?;
    let opex_ratio = fit_factor(
        "opex_ratio",
        ratio_sample(rows, |r| r.operating_expenses.map(|op| op / r.revenue)),
        fallback.opex_ratio,
    )?;
    let cash_conversion = fit_factor(
        "cash_conversion",
        ratio_sample(rows, |r| match (r.cash_from_operations, r.net_income) {
            (Some(cfo), Some(ni)) if ni != 0.0 => Some(cfo / ni),
            _ => None,
        }),
        fallback.cash_conversion,
    )?;

    let capex_sample = ratio_sample(rows, |r| r.capital_expenditure.map(|c| c.abs() / r.revenue));
    let capex_ratio = fit_factor("capex_ratio", capex_sample.clone(), fallback.capex_ratio)?;
    let capex_cap = stats::percentile(&capex_sample, 95.0);

    let employee_count = anchor
        .employee_count
        .filter(|e| e.is_finite() && *e >= 1.0)
        .map(|e| e.round().min(u32::MAX as f64) as u32)
        .unwrap_or(1);

    let latest_opex = anchor
        .operating_expenses
        .filter(|op| *op > 0.0)
        .unwrap_or(anchor.revenue * opex_ratio.mean);
    let (avg_annual_salary_cost, min_cash_buffer_for_hiring) =
        hiring_constants(&config.policy, latest_opex, employee_count);

    let base = BaseMetrics {
        anchor_period: anchor.period,
        revenue: anchor.revenue,
        cash: anchor.cash_end.unwrap_or_default(),
        employee_count,
        revenue_growth,
        gross_margin,
        opex_ratio,
        cash_conversion,
        capex_ratio,
        capex_cap,
        avg_annual_salary_cost,
        min_cash_buffer_for_hiring,
        periods_used: rows.len(),
    };

    log::debug!(
        "base metrics @ {}: revenue={:.0} cash={:.0} employees={} growth={:.3}±{:.3} [{:.3}, {:.3}] capex_cap={:.4}",
        base.anchor_period,
        base.revenue,
        base.cash,
        base.employee_count,
        base.revenue_growth.mean,
        base.revenue_growth.std,
        base.revenue_growth.p5,
        base.revenue_growth.p95,
        base.capex_cap
    );

    Ok(base)
}

/// Salary cost per head and the cash buffer required before hiring,
/// both proportional to the latest period's opex.
pub fn hiring_constants(
    policy: &HiringPolicy,
    latest_opex: Currency,
    employee_count: u32,
) -> (Currency, Currency) {
    let heads = employee_count.max(1) as f64;
    (
        policy.salary_share_of_opex * latest_opex / heads,
        policy.cash_buffer_share_of_opex * latest_opex,
    )
}

fn fit_growth(rows: &[HistoricalRow], fallback: &FallbackStd) -> ForecastResult<GrowthFit> {
    let growth: Vec<f64> = rows
        .windows(2)
        .filter(|w| w[0].revenue > 0.0)
        .map(|w| (w[1].revenue / w[0].revenue - 1.0) * ANNUALIZATION_FACTOR)
        .filter(|g| g.is_finite())
        .collect();

    if growth.is_empty() {
        return Err(ForecastError::InsufficientData {
            reason: "no consecutive periods with positive prior revenue".into(),
        });
    }

    Ok(GrowthFit {
        mean: stats::mean(&growth),
        std: non_zero_std(stats::std_dev(&growth), fallback.revenue_growth),
        p5: stats::percentile(&growth, 5.0),
        p95: stats::percentile(&growth, 95.0),
    })
}

fn ratio_sample(rows: &[HistoricalRow], ratio: impl Fn(&HistoricalRow) -> Option<f64>) -> Vec<f64> {
    rows.iter()
        .filter_map(ratio)
        .filter(|v| v.is_finite())
        .collect()
}

fn fit_factor(factor: &'static str, sample: Vec<f64>, fallback_std: f64) -> ForecastResult<FactorFit> {
    if sample.is_empty() {
        return Err(ForecastError::DegenerateDistribution { factor });
    }
    let std = stats::std_dev(&sample);
    if std == 0.0 {
        log::debug!("{factor}: zero spread over {} samples, using std {fallback_std}", sample.len());
    }
    Ok(FactorFit {
        mean: stats::mean(&sample),
        std: non_zero_std(std, fallback_std),
    })
}

fn non_zero_std(std: f64, fallback: f64) -> f64 {
    if std > 0.0 {
        std
    } else {
        fallback
    }
}
