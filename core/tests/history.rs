use runway_core::{
    config::ForecastConfig,
    error::ForecastError,
    history::{parse_period, read_financials, safe_float, select_recent_periods, FiscalPeriod},
    metrics::derive_base_metrics,
};

const FIXTURE: &str = include_str!("fixtures/quarterly.csv");

#[test]
fn fixture_loads_sorted_and_cleaned() {
    let rows = read_financials(FIXTURE.as_bytes(), "fixture").expect("fixture parses");

    // "Unknown Period" and the N/A revenue row are dropped.
    assert_eq!(rows.len(), 7);
    assert!(rows.windows(2).all(|w| w[0].period < w[1].period), "rows not chronological");
    assert!(rows.iter().all(|r| r.revenue > 0.0));

    let q1 = &rows[4];
    assert_eq!(q1.period, FiscalPeriod { year: 2024, quarter: 1 });
    assert_eq!(q1.revenue, 972_000.0, "thousands separators are ignored");
    assert_eq!(q1.capital_expenditure, Some(-52_000.0), "parentheses mean negative");
    assert_eq!(rows[5].revenue, 988_000.0, "currency symbol is ignored");
}

#[test]
fn rows_are_sorted_regardless_of_file_order() {
    let csv = "period,revenue_total,cash_end_period\n\
               Q3 FY24,300,10\n\
               Q1 FY24,100,10\n\
               Q2 FY24,200,10\n";
    let rows = read_financials(csv.as_bytes(), "inline").expect("parses");
    let revenue: Vec<f64> = rows.iter().map(|r| r.revenue).collect();
    assert_eq!(revenue, vec![100.0, 200.0, 300.0]);
}

#[test]
fn missing_required_column_is_a_load_error() {
    let csv = "period,revenue_total\nQ1 FY24,100\n";
    match read_financials(csv.as_bytes(), "no-cash.csv") {
        Err(ForecastError::DataLoad { path, reason }) => {
            assert_eq!(path, "no-cash.csv");
            assert!(reason.contains("cash_end_period"), "reason: {reason}");
        }
        other => panic!("expected DataLoad, got {other:?}"),
    }
}

#[test]
fn missing_file_is_a_load_error() {
    let err = runway_core::history::load_financials("/nonexistent/statements.csv")
        .expect_err("file does not exist");
    assert!(matches!(err, ForecastError::DataLoad { .. }));
}

#[test]
fn safe_float_cases() {
    assert_eq!(safe_float("1,234.50"), Some(1234.5));
    assert_eq!(safe_float(" $2,000 "), Some(2000.0));
    assert_eq!(safe_float("(1,200)"), Some(-1200.0));
    assert_eq!(safe_float("-35"), Some(-35.0));
    for missing in ["", "N/A", "na", "NaN", "null", "None", "-", "abc"] {
        assert_eq!(safe_float(missing), None, "'{missing}' should be missing");
    }
}

#[test]
fn period_labels() {
    let q2 = FiscalPeriod { year: 2024, quarter: 2 };
    assert_eq!(parse_period("Q2 FY24 (September 2023)"), Some(q2));
    assert_eq!(parse_period("Q2 FY2024"), Some(q2));
    assert_eq!(parse_period("2024-Q2"), Some(q2));
    assert_eq!(parse_period("q2 2024"), Some(q2));
    assert_eq!(parse_period("Unknown Period"), None);
    assert_eq!(parse_period("Q5 FY24"), None);
    assert_eq!(parse_period(""), None);
    assert_eq!(q2.to_string(), "Q2 FY2024");
}

#[test]
fn recent_period_window() {
    let rows = read_financials(FIXTURE.as_bytes(), "fixture").expect("fixture parses");
    let last4 = select_recent_periods(&rows, 4);
    assert_eq!(last4.len(), 4);
    assert_eq!(last4.last().map(|r| r.period), rows.last().map(|r| r.period));
    assert_eq!(select_recent_periods(&rows, 0).len(), rows.len());
    assert_eq!(select_recent_periods(&rows, 100).len(), rows.len());
}

// ── Metrics ────────────────────────────────────────────────────────

#[test]
fn base_metrics_from_fixture() {
    let rows = read_financials(FIXTURE.as_bytes(), "fixture").expect("fixture parses");
    let config = ForecastConfig::default_test();
    let base = derive_base_metrics(&rows, &config).expect("derives");

    assert_eq!(base.anchor_period, FiscalPeriod { year: 2024, quarter: 4 });
    assert_eq!(base.revenue, 1_000_000.0);
    assert_eq!(base.cash, 200_000.0);
    assert_eq!(base.employee_count, 50);
    assert_eq!(base.periods_used, 7);
    assert!((base.avg_annual_salary_cost - 0.65 * 300_000.0 / 50.0).abs() < 1e-9);
    assert!((base.min_cash_buffer_for_hiring - 150_000.0).abs() < 1e-9);

    assert!(base.revenue_growth.p5 <= base.revenue_growth.mean);
    assert!(base.revenue_growth.mean <= base.revenue_growth.p95);
    assert!(base.gross_margin.mean > 0.35 && base.gross_margin.mean < 0.45);
    assert!(base.capex_ratio.mean > 0.0, "capex is taken as an absolute value");
    assert!(base.capex_cap >= base.capex_ratio.mean);
}

#[test]
fn anchor_skips_periods_without_positive_cash() {
    let csv = "period,revenue_total,gross_profit,operating_expenses_total,net_income,cash_from_operations,capital_expenditure,cash_end_period\n\
               Q1 FY24,100,40,30,10,9,5,50\n\
               Q2 FY24,110,44,33,11,10,5,60\n\
               Q3 FY24,120,48,36,12,11,6,N/A\n";
    let rows = read_financials(csv.as_bytes(), "inline").expect("parses");
    let base = derive_base_metrics(&rows, &ForecastConfig::default_test()).expect("derives");

    assert_eq!(base.anchor_period, FiscalPeriod { year: 2024, quarter: 2 });
    assert_eq!(base.cash, 60.0);
    assert_eq!(base.employee_count, 1, "missing headcount defaults to one");
}

#[test]
fn single_period_is_insufficient() {
    let csv = "period,revenue_total,gross_profit,cash_end_period\nQ1 FY24,100,40,50\n";
    let rows = read_financials(csv.as_bytes(), "inline").expect("parses");
    let err = derive_base_metrics(&rows, &ForecastConfig::default_test()).expect_err("one row");
    assert!(matches!(err, ForecastError::InsufficientData { .. }), "got {err:?}");
}

#[test]
fn no_positive_cash_is_insufficient() {
    let csv = "period,revenue_total,cash_end_period\nQ1 FY24,100,0\nQ2 FY24,110,-5\n";
    let rows = read_financials(csv.as_bytes(), "inline").expect("parses");
    let err = derive_base_metrics(&rows, &ForecastConfig::default_test()).expect_err("no cash");
    assert!(matches!(err, ForecastError::InsufficientData { .. }), "got {err:?}");
}

#[test]
fn factor_without_samples_is_degenerate() {
    let csv = "period,revenue_total,cash_end_period\nQ1 FY24,100,50\nQ2 FY24,110,60\n";
    let rows = read_financials(csv.as_bytes(), "inline").expect("parses");
    let err = derive_base_metrics(&rows, &ForecastConfig::default_test()).expect_err("no margins");
    match err {
        ForecastError::DegenerateDistribution { factor } => assert_eq!(factor, "gross_margin"),
        other => panic!("expected DegenerateDistribution, got {other:?}"),
    }
}

#[test]
fn constant_ratio_falls_back_to_configured_std() {
    let csv = "period,revenue_total,gross_profit,operating_expenses_total,net_income,cash_from_operations,capital_expenditure,cash_end_period\n\
               Q1 FY24,100,50,25,20,20,12.5,50\n\
               Q2 FY24,200,100,50,40,40,25,60\n\
               Q3 FY24,300,150,75,60,60,37.5,70\n";
    let rows = read_financials(csv.as_bytes(), "inline").expect("parses");
    let config = ForecastConfig::default_test();
    let base = derive_base_metrics(&rows, &config).expect("derives");

    assert_eq!(base.gross_margin.mean, 0.5);
    assert_eq!(base.gross_margin.std, config.fallback_std.gross_margin);
    assert_eq!(base.opex_ratio.std, config.fallback_std.opex_ratio);
    assert_eq!(base.cash_conversion.std, config.fallback_std.cash_conversion);
    assert_eq!(base.capex_ratio.std, config.fallback_std.capex_ratio);
}
