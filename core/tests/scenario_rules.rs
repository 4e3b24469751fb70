//! Business rules of a single scenario, exercised with hand-picked draws
//! so no randomness is involved.

use runway_core::{
    config::{ForecastConfig, HiringPolicy},
    engine::ForecastEngine,
    history::{read_financials, FiscalPeriod},
    metrics::{hiring_constants, BaseMetrics, FactorFit, GrowthFit},
    scenario::{apply_draws, HiringCheck, ScenarioDraws},
};

fn base() -> BaseMetrics {
    let policy = HiringPolicy::default();
    let (salary, buffer) = hiring_constants(&policy, 300_000.0, 50);
    BaseMetrics {
        anchor_period: FiscalPeriod { year: 2024, quarter: 4 },
        revenue: 1_000_000.0,
        cash: 200_000.0,
        employee_count: 50,
        revenue_growth: GrowthFit { mean: 0.08, std: 0.05, p5: -0.05, p95: 0.20 },
        gross_margin: FactorFit { mean: 0.40, std: 0.05 },
        opex_ratio: FactorFit { mean: 0.30, std: 0.04 },
        cash_conversion: FactorFit { mean: 0.90, std: 0.10 },
        capex_ratio: FactorFit { mean: 0.05, std: 0.02 },
        capex_cap: 0.12,
        avg_annual_salary_cost: salary,
        min_cash_buffer_for_hiring: buffer,
        periods_used: 8,
    }
}

fn draws(growth: f64) -> ScenarioDraws {
    ScenarioDraws {
        revenue_growth: growth,
        gross_margin: 0.40,
        opex_ratio: 0.30,
        cash_conversion: 0.90,
        capex_ratio: 0.05,
    }
}

#[test]
fn hiring_constants_scale_with_opex() {
    let (salary, buffer) = hiring_constants(&HiringPolicy::default(), 300_000.0, 50);
    assert!((salary - 3_900.0).abs() < 1e-9, "salary {salary}");
    assert!((buffer - 150_000.0).abs() < 1e-9, "buffer {buffer}");

    let (solo, _) = hiring_constants(&HiringPolicy::default(), 300_000.0, 0);
    assert!((solo - 195_000.0).abs() < 1e-9, "zero headcount treated as one");
}

#[test]
fn growth_at_threshold_never_hires() {
    let base = base();
    let policy = HiringPolicy::default();
    for g in [-0.05, 0.0, 0.03, 0.05] {
        let outcome = apply_draws(&base, &draws(g), &policy);
        assert!(!outcome.hired, "hired at growth {g}");
        assert_eq!(outcome.employee_count, 50);
    }
}

#[test]
fn growth_above_threshold_hires_when_other_checks_pass() {
    let outcome = apply_draws(&base(), &draws(0.08), &HiringPolicy::default());
    assert!(outcome.hired);
    assert_eq!(outcome.employee_count, 51);
}

#[test]
fn hire_deducts_half_a_salary_before_cash_flow() {
    let base = base();
    let policy = HiringPolicy::default();
    let no_hire_policy = HiringPolicy {
        growth_threshold: 1.0,
        ..HiringPolicy::default()
    };

    let hired = apply_draws(&base, &draws(0.08), &policy);
    let not_hired = apply_draws(&base, &draws(0.08), &no_hire_policy);

    assert!(hired.hired && !not_hired.hired);
    let diff = not_hired.cash - hired.cash;
    assert!(
        (diff - 0.5 * base.avg_annual_salary_cost).abs() < 1e-6,
        "expected deduction {}, got {diff}",
        0.5 * base.avg_annual_salary_cost
    );
}

#[test]
fn derived_quantities_follow_the_income_statement() {
    let base = base();
    let outcome = apply_draws(&base, &draws(0.10), &HiringPolicy::default());

    let revenue = 1_100_000.0;
    let operating_income = revenue * 0.40 - revenue * 0.30;
    let cfo = operating_income * 0.90;
    let capex = revenue * 0.05;

    assert!((outcome.revenue - revenue).abs() < 1e-6);
    assert!((outcome.ebitda - operating_income).abs() < 1e-6);
    assert!((outcome.cash_from_operations - cfo).abs() < 1e-6);
    assert!((outcome.cash_flow - (cfo - capex)).abs() < 1e-6);
    assert!((outcome.gross_margin - 40.0).abs() < 1e-9, "gross margin is reported in percent");
    assert!((outcome.operating_margin - 10.0).abs() < 1e-9);

    let expected_cash = 200_000.0 - 0.5 * base.avg_annual_salary_cost + cfo - capex;
    assert!((outcome.cash - expected_cash).abs() < 1e-6);
}

#[test]
fn cash_check_uses_pre_update_cash() {
    let mut base = base();
    // Below the buffer and below 10% of revenue before the period's cash
    // flow, comfortably above both after it.
    base.cash = 50_000.0;
    let policy = HiringPolicy::default();
    let strong = ScenarioDraws {
        revenue_growth: 0.50,
        gross_margin: 0.60,
        opex_ratio: 0.20,
        cash_conversion: 1.0,
        capex_ratio: 0.0,
    };
    let outcome = apply_draws(&base, &strong, &policy);

    assert!(outcome.cash > base.min_cash_buffer_for_hiring);
    assert!(!outcome.hired, "cash check must look at cash before the period");
}

#[test]
fn either_cash_condition_is_enough() {
    let mut base = base();
    let policy = HiringPolicy::default();
    // Below the 150k buffer but above 10% of the 1.08M revenue.
    base.cash = 120_000.0;
    let check = HiringCheck::evaluate(&base, &policy, 0.08, base.cash, 1_080_000.0);
    assert!(check.cash_ok);

    base.cash = 100_000.0;
    let check = HiringCheck::evaluate(&base, &policy, 0.08, base.cash, 1_080_000.0);
    assert!(!check.cash_ok);
    assert!(!check.should_hire());
}

#[test]
fn productivity_check_blocks_overstaffed_companies() {
    let mut base = base();
    base.employee_count = 500;
    base.avg_annual_salary_cost = 3_900.0;
    // 1.08M / 500 = 2,160 per head, under 2 x 3,900.
    let check = HiringCheck::evaluate(&base, &HiringPolicy::default(), 0.08, base.cash, 1_080_000.0);
    assert!(check.growth_ok && check.cash_ok && check.headcount_ok);
    assert!(!check.productivity_ok);
    assert!(!check.should_hire());
}

#[test]
fn hiring_at_maximum_headcount_does_not_overflow() {
    let policy = HiringPolicy::default();
    let mut base = base();
    base.employee_count = u32::MAX;
    let (salary, buffer) = hiring_constants(&policy, 300_000.0, u32::MAX);
    base.avg_annual_salary_cost = salary;
    base.min_cash_buffer_for_hiring = buffer;

    let outcome = apply_draws(&base, &draws(0.08), &policy);
    assert!(outcome.hired, "all four checks pass");
    assert_eq!(outcome.employee_count, u32::MAX);
}

#[test]
fn huge_headcount_in_history_runs_to_completion() {
    let csv = "period,revenue_total,gross_profit,operating_expenses_total,net_income,cash_from_operations,capital_expenditure,cash_end_period,employee_count\n\
               Q2 FY24,1000000,500000,100000,400000,380000,(20000),900000,5000000000\n\
               Q3 FY24,1100000,560000,110000,440000,410000,(25000),950000,5000000000\n\
               Q4 FY24,1250000,620000,120000,500000,470000,(30000),1000000,5000000000\n";
    let rows = read_financials(csv.as_bytes(), "inline").expect("parses");
    let engine = ForecastEngine::new("headcount".into(), ForecastConfig::default_test()).expect("engine");
    let analysis = engine.analyze(&rows).expect("analysis runs");

    assert_eq!(analysis.batch.base.employee_count, u32::MAX);
    assert_eq!(analysis.summary.num_simulations, 2_000);
    assert!(analysis.summary.probability_should_hire > 0.0);
}
