//! Scenario generator: one synthetic future period.
//!
//! A scenario is split into two steps so the business rules can be
//! exercised without randomness:
//!   1. `ScenarioDraws::draw` consumes random numbers, in a fixed order.
//!   2. `apply_draws` is a pure function of (base, draws, policy).

use crate::{
    config::HiringPolicy,
    distribution::DistributionSet,
    metrics::BaseMetrics,
    rng::ForecastRng,
    types::{Currency, Ratio},
};
use serde::{Deserialize, Serialize};

/// The random inputs of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDraws {
    pub revenue_growth: Ratio,
    pub gross_margin: Ratio,
    pub opex_ratio: Ratio,
    pub cash_conversion: Ratio,
    /// Already clipped to the capex cap.
    pub capex_ratio: Ratio,
}

impl ScenarioDraws {
    /// Draw order is part of the reproducibility contract: growth, margin,
    /// opex ratio, cash conversion, capex. Never reorder.
    pub fn draw(dists: &DistributionSet, capex_cap: Ratio, rng: &mut ForecastRng) -> Self {
        Self {
            revenue_growth: dists.revenue_growth.sample(rng),
            gross_margin: dists.gross_margin.sample(rng),
            opex_ratio: dists.opex_ratio.sample(rng),
            cash_conversion: dists.cash_conversion.sample(rng),
            capex_ratio: dists.capex_ratio.sample(rng, capex_cap),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub cash: Currency,
    pub revenue: Currency,
    pub hired: bool,
    pub employee_count: u32,
    /// Percent, e.g. 40.0 for a 40% margin.
    pub gross_margin: f64,
    /// Percent.
    pub operating_margin: f64,
    /// Equal to operating income; depreciation is not modeled.
    pub ebitda: Currency,
    /// Free cash flow: CFO minus capex.
    pub cash_flow: Currency,
    pub revenue_growth: Ratio,
    pub opex: Currency,
    pub capex: Currency,
    pub cash_from_operations: Currency,
}

/// Outcome of the hiring rule for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HiringCheck {
    pub growth_ok: bool,
    pub cash_ok: bool,
    pub headcount_ok: bool,
    pub productivity_ok: bool,
}

impl HiringCheck {
    /// Every condition is evaluated; hiring needs all four.
    pub fn evaluate(
        base: &BaseMetrics,
        policy: &HiringPolicy,
        growth: Ratio,
        cash: Currency,
        revenue: Currency,
    ) -> Self {
        let employees = base.employee_count;
        Self {
            growth_ok: growth > policy.growth_threshold,
            cash_ok: cash > base.min_cash_buffer_for_hiring
                || cash > policy.cash_to_revenue_floor * revenue,
            headcount_ok: employees > 0,
            productivity_ok: employees > 0
                && revenue / employees as f64
                    > policy.revenue_per_employee_multiple * base.avg_annual_salary_cost,
        }
    }

    pub fn should_hire(&self) -> bool {
        self.growth_ok && self.cash_ok && self.headcount_ok && self.productivity_ok
    }
}

/// Apply the deterministic business rules to one set of draws.
pub fn apply_draws(base: &BaseMetrics, draws: &ScenarioDraws, policy: &HiringPolicy) -> ScenarioOutcome {
    let revenue = base.revenue * (1.0 + draws.revenue_growth);

    let gross_profit = revenue * draws.gross_margin;
    let opex = revenue * draws.opex_ratio;
    let operating_income = gross_profit - opex;
    let cash_from_operations = operating_income * draws.cash_conversion;
    let capex = revenue * draws.capex_ratio;

    let mut cash = base.cash;
    let mut employee_count = base.employee_count;
    let hired = HiringCheck::evaluate(base, policy, draws.revenue_growth, cash, revenue).should_hire();
    if hired {
        cash -= policy.upfront_salary_fraction * base.avg_annual_salary_cost;
        employee_count = employee_count.saturating_add(1);
    }

    let cash_flow = cash_from_operations - capex;
    cash += cash_flow;

    let pct = |x: Currency| if revenue != 0.0 { x / revenue * 100.0 } else { 0.0 };

    ScenarioOutcome {
        cash,
        revenue,
        hired,
        employee_count,
        gross_margin: pct(gross_profit),
        operating_margin: pct(operating_income),
        ebitda: operating_income,
        cash_flow,
        revenue_growth: draws.revenue_growth,
        opex,
        capex,
        cash_from_operations,
    }
}

/// Draw and evaluate one scenario.
pub fn simulate_scenario(
    base: &BaseMetrics,
    dists: &DistributionSet,
    capex_cap: Ratio,
    policy: &HiringPolicy,
    rng: &mut ForecastRng,
) -> ScenarioOutcome {
    let draws = ScenarioDraws::draw(dists, capex_cap, rng);
    apply_draws(base, &draws, policy)
}
