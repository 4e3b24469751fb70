//! Risk facts derived from a finished batch.
//!
//! Question parsing happens upstream; it hands us a `QuestionCategory`
//! routing key and, optionally, a numeric threshold. Everything here is a
//! read-only computation over the batch vectors and produces typed facts
//! for the narrative step. No prose is generated in this crate.

use crate::{
    engine::SimulationBatch,
    error::ForecastError,
    history::HistoricalRow,
    stats,
    types::Currency,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default gross-margin threshold, in percent.
pub const DEFAULT_GROSS_MARGIN_THRESHOLD: f64 = 30.0;
/// Cash below this fraction of starting cash counts as low liquidity.
pub const LOW_LIQUIDITY_FRACTION: f64 = 0.3;
/// Number of drivers reported by the risk attribution.
pub const DEFAULT_TOP_DRIVERS: usize = 3;
/// Growth reduction applied by the downside revenue scenario.
pub const DEFAULT_SLOWDOWN: f64 = 0.05;

// ── Routing and levels ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Revenue,
    Cash,
    Margin,
    RiskAttribution,
    General,
}

impl QuestionCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Cash => "cash",
            Self::Margin => "margin",
            Self::RiskAttribution => "risk_attribution",
            Self::General => "general",
        }
    }
}

impl FromStr for QuestionCategory {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "revenue" | "growth" => Ok(Self::Revenue),
            "cash" | "liquidity" | "runway" => Ok(Self::Cash),
            "margin" | "profitability" | "ebitda" => Ok(Self::Margin),
            "risk" | "risk_attribution" | "drivers" => Ok(Self::RiskAttribution),
            "general" | "" => Ok(Self::General),
            other => Err(ForecastError::InvalidConfig(format!(
                "unknown question category '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// High above `high`, medium above `medium`, low otherwise.
    pub fn classify(value: f64, medium: f64, high: f64) -> Self {
        if value > high {
            Self::High
        } else if value > medium {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

// ── Descriptive statistics ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeStats {
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub p1: f64,
    pub p5: f64,
    pub p10: f64,
    pub p90: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
    pub coefficient_of_variation: f64,
}

impl OutcomeStats {
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        stats::sort_ascending(&mut sorted);
        let pct = |p| stats::percentile_sorted(&sorted, p);
        Self {
            mean: stats::mean(values),
            median: pct(50.0),
            std: stats::std_dev(values),
            p1: pct(1.0),
            p5: pct(5.0),
            p10: pct(10.0),
            p90: pct(90.0),
            p95: pct(95.0),
            min: sorted.first().copied().unwrap_or_default(),
            max: sorted.last().copied().unwrap_or_default(),
            coefficient_of_variation: stats::coefficient_of_variation(values),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub revenue: OutcomeStats,
    pub cash: OutcomeStats,
    pub gross_margin: OutcomeStats,
    pub operating_margin: OutcomeStats,
}

impl BatchStatistics {
    pub fn from_batch(batch: &SimulationBatch) -> Self {
        Self {
            revenue: OutcomeStats::from_values(&batch.revenue),
            cash: OutcomeStats::from_values(&batch.cash),
            gross_margin: OutcomeStats::from_values(&batch.gross_margin),
            operating_margin: OutcomeStats::from_values(&batch.operating_margin),
        }
    }
}

// ── Revenue ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProbability {
    pub probability: f64,
    pub threshold: f64,
    pub interpretation: RiskLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueRange {
    pub p10: Currency,
    pub median: Currency,
    pub p90: Currency,
    pub range: Currency,
    /// Share of outcomes between p10 and p90.
    pub confidence_interval: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueVolatility {
    pub coefficient_of_variation: f64,
    pub volatility_level: RiskLevel,
    pub probability_decline: f64,
    pub risk_level: RiskLevel,
    /// Coefficient of variation of the historical revenue series.
    pub historical_volatility: f64,
    pub periods_compared: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlowdownScenario {
    pub slowdown: f64,
    pub probability_revenue_declines: f64,
    pub expected_revenue: Currency,
}

/// P(revenue < threshold); the threshold defaults to starting revenue.
pub fn revenue_below(batch: &SimulationBatch, threshold: Option<f64>) -> ThresholdProbability {
    let threshold = threshold.unwrap_or(batch.base.revenue);
    let probability = stats::fraction_where(&batch.revenue, |r| r < threshold);
    ThresholdProbability {
        probability,
        threshold,
        interpretation: RiskLevel::classify(probability, 0.1, 0.3),
    }
}

pub fn revenue_range(batch: &SimulationBatch) -> RevenueRange {
    let mut sorted = batch.revenue.clone();
    stats::sort_ascending(&mut sorted);
    let p10 = stats::percentile_sorted(&sorted, 10.0);
    let p90 = stats::percentile_sorted(&sorted, 90.0);
    RevenueRange {
        p10,
        median: stats::percentile_sorted(&sorted, 50.0),
        p90,
        range: p90 - p10,
        confidence_interval: 0.80,
    }
}

pub fn revenue_volatility(batch: &SimulationBatch, history: &[HistoricalRow]) -> RevenueVolatility {
    let cv = stats::coefficient_of_variation(&batch.revenue);
    let historical: Vec<f64> = history.iter().map(|r| r.revenue).collect();
    RevenueVolatility {
        coefficient_of_variation: cv,
        volatility_level: RiskLevel::classify(cv, 0.1, 0.2),
        probability_decline: stats::fraction_where(&batch.revenue, |r| r < batch.base.revenue),
        risk_level: RiskLevel::classify(cv, 0.15, 0.25),
        historical_volatility: stats::coefficient_of_variation(&historical),
        periods_compared: history.len(),
    }
}

/// Re-evaluate revenue with every growth draw reduced by `slowdown`.
pub fn revenue_slowdown(batch: &SimulationBatch, slowdown: f64) -> SlowdownScenario {
    let base_revenue = batch.base.revenue;
    let adjusted: Vec<f64> = batch
        .revenue_growth
        .iter()
        .map(|g| base_revenue * (1.0 + g - slowdown))
        .collect();
    SlowdownScenario {
        slowdown,
        probability_revenue_declines: stats::fraction_where(&adjusted, |r| r < base_revenue),
        expected_revenue: stats::mean(&adjusted),
    }
}

// ── Cash ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CashThreshold {
    pub probability: f64,
    pub threshold: Currency,
    pub p5_cash: Currency,
    pub median_cash: Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CashRunway {
    pub monthly_burn_rate: Currency,
    /// None when there is no burn to exhaust cash.
    pub runway_months_p5: Option<f64>,
    pub runway_months_median: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityAssessment {
    pub probability_negative_cash: f64,
    pub probability_low_liquidity: f64,
    pub risk_level: RiskLevel,
}

/// P(cash < threshold); the threshold defaults to the hiring cash buffer.
pub fn cash_below(batch: &SimulationBatch, threshold: Option<f64>) -> CashThreshold {
    let threshold = threshold.unwrap_or(batch.base.min_cash_buffer_for_hiring);
    let mut sorted = batch.cash.clone();
    stats::sort_ascending(&mut sorted);
    CashThreshold {
        probability: stats::fraction_where(&batch.cash, |c| c < threshold),
        threshold,
        p5_cash: stats::percentile_sorted(&sorted, 5.0),
        median_cash: stats::percentile_sorted(&sorted, 50.0),
    }
}

/// Burn is the mean of the negative cash flows, or a twelfth of starting
/// cash when no scenario burns.
pub fn cash_runway(batch: &SimulationBatch) -> CashRunway {
    let burning: Vec<f64> = batch.cash_flow.iter().copied().filter(|f| *f < 0.0).collect();
    let monthly_burn_rate = if burning.is_empty() {
        batch.base.cash / 12.0
    } else {
        -stats::mean(&burning)
    };

    let mut sorted = batch.cash.clone();
    stats::sort_ascending(&mut sorted);
    let months = |cash: f64| (monthly_burn_rate > 0.0).then(|| cash / monthly_burn_rate);

    CashRunway {
        monthly_burn_rate,
        runway_months_p5: months(stats::percentile_sorted(&sorted, 5.0)),
        runway_months_median: months(stats::percentile_sorted(&sorted, 50.0)),
    }
}

pub fn liquidity(batch: &SimulationBatch) -> LiquidityAssessment {
    let low_water = batch.base.cash * LOW_LIQUIDITY_FRACTION;
    let probability_negative_cash = stats::fraction_where(&batch.cash, |c| c < 0.0);
    LiquidityAssessment {
        probability_negative_cash,
        probability_low_liquidity: stats::fraction_where(&batch.cash, |c| c < low_water),
        risk_level: RiskLevel::classify(probability_negative_cash, 0.05, 0.15),
    }
}

// ── Margins ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginThreshold {
    pub probability: f64,
    /// Percent.
    pub threshold: f64,
    pub p5_gross_margin: f64,
    pub median_gross_margin: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorstCaseMargin {
    pub worst_case_5th_percentile: f64,
    pub worst_case_1st_percentile: f64,
    pub median: f64,
}

/// P(gross margin % < threshold); the threshold defaults to 30%.
pub fn gross_margin_below(batch: &SimulationBatch, threshold: Option<f64>) -> MarginThreshold {
    let threshold = threshold.unwrap_or(DEFAULT_GROSS_MARGIN_THRESHOLD);
    let mut sorted = batch.gross_margin.clone();
    stats::sort_ascending(&mut sorted);
    MarginThreshold {
        probability: stats::fraction_where(&batch.gross_margin, |m| m < threshold),
        threshold,
        p5_gross_margin: stats::percentile_sorted(&sorted, 5.0),
        median_gross_margin: stats::percentile_sorted(&sorted, 50.0),
    }
}

pub fn worst_case_operating_margin(batch: &SimulationBatch) -> WorstCaseMargin {
    let mut sorted = batch.operating_margin.clone();
    stats::sort_ascending(&mut sorted);
    WorstCaseMargin {
        worst_case_5th_percentile: stats::percentile_sorted(&sorted, 5.0),
        worst_case_1st_percentile: stats::percentile_sorted(&sorted, 1.0),
        median: stats::percentile_sorted(&sorted, 50.0),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostComponentRisk {
    pub primary_risk_driver: String,
    pub opex_volatility: f64,
}

/// Opex is the only simulated cost line, so it is the driver reported.
pub fn cost_component_risk(batch: &SimulationBatch) -> CostComponentRisk {
    CostComponentRisk {
        primary_risk_driver: "operating_expenses".to_string(),
        opex_volatility: positive_cv(&batch.opex),
    }
}

// ── Risk attribution ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDriver {
    pub driver: String,
    pub volatility: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSource {
    Revenue,
    Costs,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueVsCost {
    pub revenue_volatility: f64,
    pub cost_volatility: f64,
    pub primary_risk_source: RiskSource,
    /// Revenue volatility over cost volatility; None when costs never vary.
    pub ratio: Option<f64>,
}

/// CV for strictly positive-mean series; margins with a non-positive
/// mean report 0.
fn positive_cv(values: &[f64]) -> f64 {
    if stats::mean(values) > 0.0 {
        stats::coefficient_of_variation(values)
    } else {
        0.0
    }
}

/// Drivers ranked by coefficient of variation, highest first.
pub fn top_risk_drivers(batch: &SimulationBatch, top_n: usize) -> Vec<RiskDriver> {
    let mut drivers = vec![
        ("revenue_volatility", positive_cv(&batch.revenue)),
        ("gross_margin_volatility", positive_cv(&batch.gross_margin)),
        ("operating_margin_volatility", positive_cv(&batch.operating_margin)),
        ("cash_volatility", stats::coefficient_of_variation(&batch.cash)),
        ("opex_volatility", positive_cv(&batch.opex)),
    ];
    drivers.sort_by(|a, b| b.1.total_cmp(&a.1));
    drivers
        .into_iter()
        .take(top_n)
        .map(|(driver, volatility)| RiskDriver {
            driver: driver.to_string(),
            volatility,
        })
        .collect()
}

pub fn revenue_vs_cost(batch: &SimulationBatch) -> RevenueVsCost {
    let revenue_volatility = positive_cv(&batch.revenue);
    let cost_volatility = positive_cv(&batch.opex);
    RevenueVsCost {
        revenue_volatility,
        cost_volatility,
        primary_risk_source: if revenue_volatility > cost_volatility {
            RiskSource::Revenue
        } else {
            RiskSource::Costs
        },
        ratio: (cost_volatility > 0.0).then(|| revenue_volatility / cost_volatility),
    }
}

// ── General ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevenueRiskAssessment {
    pub risk_level: RiskLevel,
    pub coefficient_of_variation: f64,
    pub probability_decline: f64,
    pub p10: Currency,
    pub median: Currency,
    pub p90: Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CashRiskAssessment {
    pub risk_level: RiskLevel,
    pub probability_negative_cash: f64,
    pub p5: Currency,
    pub median: Currency,
    pub p95: Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryRisk {
    RevenueVolatility,
    CashLiquidity,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneralAssessment {
    pub revenue: RevenueRiskAssessment,
    pub cash: CashRiskAssessment,
    pub primary_risk: PrimaryRisk,
}

pub fn general_assessment(batch: &SimulationBatch) -> GeneralAssessment {
    let revenue_stats = OutcomeStats::from_values(&batch.revenue);
    let cash_stats = OutcomeStats::from_values(&batch.cash);
    let revenue_cv = revenue_stats.coefficient_of_variation;
    let cash_cv = cash_stats.coefficient_of_variation;
    let probability_negative_cash = stats::fraction_where(&batch.cash, |c| c < 0.0);

    GeneralAssessment {
        revenue: RevenueRiskAssessment {
            risk_level: RiskLevel::classify(revenue_cv, 0.15, 0.25),
            coefficient_of_variation: revenue_cv,
            probability_decline: stats::fraction_where(&batch.revenue, |r| r < batch.base.revenue),
            p10: revenue_stats.p10,
            median: revenue_stats.median,
            p90: revenue_stats.p90,
        },
        cash: CashRiskAssessment {
            risk_level: RiskLevel::classify(probability_negative_cash, 0.05, 0.15),
            probability_negative_cash,
            p5: cash_stats.p5,
            median: cash_stats.median,
            p95: cash_stats.p95,
        },
        primary_risk: if revenue_cv > cash_cv {
            PrimaryRisk::RevenueVolatility
        } else {
            PrimaryRisk::CashLiquidity
        },
    }
}

// ── Routing ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RiskFacts {
    Revenue {
        below_threshold: ThresholdProbability,
        range: RevenueRange,
        volatility: RevenueVolatility,
        slowdown: SlowdownScenario,
    },
    Cash {
        below_threshold: CashThreshold,
        runway: CashRunway,
        liquidity: LiquidityAssessment,
    },
    Margin {
        gross_below_threshold: MarginThreshold,
        worst_case_operating: WorstCaseMargin,
        cost_component: CostComponentRisk,
    },
    RiskAttribution {
        top_drivers: Vec<RiskDriver>,
        revenue_vs_cost: RevenueVsCost,
    },
    General(GeneralAssessment),
}

/// The fact sheet handed to the narrative step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFacts {
    pub periods_analyzed: usize,
    pub periods: Vec<String>,
    pub statistics: BatchStatistics,
    pub facts: RiskFacts,
}

/// Compute the facts for one question category. `history` is the table the
/// base metrics were derived from; `threshold` is the optional figure the
/// question named (currency for revenue and cash, percent for margins).
pub fn assess(
    category: QuestionCategory,
    batch: &SimulationBatch,
    history: &[HistoricalRow],
    threshold: Option<f64>,
) -> AnalysisFacts {
    let facts = match category {
        QuestionCategory::Revenue => RiskFacts::Revenue {
            below_threshold: revenue_below(batch, threshold),
            range: revenue_range(batch),
            volatility: revenue_volatility(batch, history),
            slowdown: revenue_slowdown(batch, DEFAULT_SLOWDOWN),
        },
        QuestionCategory::Cash => RiskFacts::Cash {
            below_threshold: cash_below(batch, threshold),
            runway: cash_runway(batch),
            liquidity: liquidity(batch),
        },
        QuestionCategory::Margin => RiskFacts::Margin {
            gross_below_threshold: gross_margin_below(batch, threshold),
            worst_case_operating: worst_case_operating_margin(batch),
            cost_component: cost_component_risk(batch),
        },
        QuestionCategory::RiskAttribution => RiskFacts::RiskAttribution {
            top_drivers: top_risk_drivers(batch, DEFAULT_TOP_DRIVERS),
            revenue_vs_cost: revenue_vs_cost(batch),
        },
        QuestionCategory::General => RiskFacts::General(general_assessment(batch)),
    };

    AnalysisFacts {
        periods_analyzed: history.len(),
        periods: history.iter().map(|r| r.label.clone()).collect(),
        statistics: BatchStatistics::from_batch(batch),
        facts,
    }
}
