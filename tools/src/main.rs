//! forecast-runner: headless Monte Carlo forecast from a statements CSV.
//!
//! Usage:
//!   forecast-runner --csv statements.csv --sims 10000 --seed 42
//!   forecast-runner --csv statements.csv --periods 4 --category cash --threshold 150000
//!   forecast-runner --csv statements.csv --parallel 1000 --db runs.db --json summary.json

use anyhow::{Context, Result};
use runway_core::{
    analysis::{assess, QuestionCategory},
    config::{ExecutionMode, ForecastConfig},
    engine::{new_run_id, Analysis, ForecastEngine},
    history::{load_financials, select_recent_periods},
    store::ForecastStore,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let csv_path = str_arg(&args, "--csv").context("--csv <statements.csv> is required")?;

    let mut config = match str_arg(&args, "--config") {
        Some(path) => ForecastConfig::load(path)?,
        None => ForecastConfig::default(),
    };
    config.simulation_count = parse_arg(&args, "--sims", config.simulation_count);
    config.seed = parse_arg(&args, "--seed", config.seed);
    if let Some(cap) = opt_arg::<f64>(&args, "--capex-cap") {
        config.capex_cap_override = Some(cap);
    }
    if let Some(batch_size) = opt_arg::<usize>(&args, "--parallel") {
        config.execution = ExecutionMode::Parallel { batch_size };
    }
    let periods = parse_arg(&args, "--periods", 0usize);
    let threshold = opt_arg::<f64>(&args, "--threshold");
    let category = str_arg(&args, "--category")
        .map(str::parse::<QuestionCategory>)
        .transpose()?;

    println!("Runway: forecast-runner");
    println!("  csv:         {csv_path}");
    println!("  simulations: {}", config.simulation_count);
    println!("  seed:        {}", config.seed);
    println!("  execution:   {:?}", config.execution);
    println!();

    let history = load_financials(csv_path)?;
    let window = select_recent_periods(&history, periods);
    log::info!("using {} of {} periods", window.len(), history.len());

    let engine = ForecastEngine::new(new_run_id(), config)?;
    let analysis = engine.analyze(window)?;
    print_summary(&analysis);

    if let Some(category) = category {
        let facts = assess(category, &analysis.batch, window, threshold);
        println!();
        println!("=== {} FACTS ===", category.name().to_uppercase());
        println!("{}", serde_json::to_string_pretty(&facts)?);

        if let Some(db) = str_arg(&args, "--db") {
            let store = open_store(db)?;
            record_run(&store, &engine, &analysis)?;
            store.save_facts(&analysis.run_id, category, &facts)?;
        }
    } else if let Some(db) = str_arg(&args, "--db") {
        let store = open_store(db)?;
        record_run(&store, &engine, &analysis)?;
    }

    if let Some(path) = str_arg(&args, "--json") {
        std::fs::write(path, serde_json::to_string_pretty(&analysis.summary)?)
            .with_context(|| format!("Cannot write {path}"))?;
        println!("summary written to {path}");
    }
    if let Some(path) = str_arg(&args, "--raw-csv") {
        write_raw_outcomes(path, &analysis)?;
        println!("raw outcomes written to {path}");
    }

    Ok(())
}

fn open_store(path: &str) -> Result<ForecastStore> {
    let store = ForecastStore::open(path)?;
    store.migrate()?;
    Ok(store)
}

fn record_run(store: &ForecastStore, engine: &ForecastEngine, analysis: &Analysis) -> Result<()> {
    store.insert_run(
        &analysis.run_id,
        engine.config().seed,
        analysis.summary.num_simulations,
        env!("CARGO_PKG_VERSION"),
    )?;
    store.save_summary(&analysis.run_id, &analysis.summary)?;
    Ok(())
}

fn print_summary(analysis: &Analysis) {
    let s = &analysis.summary;
    let base = &analysis.batch.base;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:          {}", analysis.run_id);
    println!("  anchor period:   {}", s.anchor_period);
    println!("  periods used:    {}", base.periods_used);
    println!("  simulations:     {}", s.num_simulations);
    println!("  starting cash:   ${:.0}", s.starting_cash);
    println!("  starting rev:    ${:.0}", s.starting_revenue);
    println!("  employees:       {}", base.employee_count);
    println!("  capex cap:       {:.2}%", s.capex_cap_used * 100.0);

    println!();
    println!("=== NEXT PERIOD ===");
    println!("             {:>12} {:>12} {:>12} {:>12} {:>12}", "P5", "P10", "Median", "P90", "P95");
    for (name, bands) in [("cash", &s.cash), ("revenue", &s.revenue)] {
        let [p5, p10, median, p90, p95] = bands.as_array();
        println!("  {name:<10} {p5:>12.0} {p10:>12.0} {median:>12.0} {p90:>12.0} {p95:>12.0}");
    }
    println!();
    println!("  P(cash < 0):         {:.1}%", s.probability_cash_negative * 100.0);
    println!("  P(should hire):      {:.1}%", s.probability_should_hire * 100.0);
    println!("  expected rev growth: {:.2}%", s.expected_revenue_growth * 100.0);

    println!();
    println!("=== HIRING RULE ===");
    for rule in &s.hiring_parameters.rules {
        println!("  - {rule}");
    }
}

/// One row per draw, every outcome vector as a column.
fn write_raw_outcomes(path: &str, analysis: &Analysis) -> Result<()> {
    let b = &analysis.batch;
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("Cannot write {path}"))?;
    writer.write_record([
        "draw",
        "cash",
        "revenue",
        "revenue_growth",
        "gross_margin_pct",
        "operating_margin_pct",
        "ebitda",
        "opex",
        "capex",
        "cash_from_operations",
        "cash_flow",
        "hired",
    ])?;
    for i in 0..b.len() {
        writer.write_record([
            i.to_string(),
            b.cash[i].to_string(),
            b.revenue[i].to_string(),
            b.revenue_growth[i].to_string(),
            b.gross_margin[i].to_string(),
            b.operating_margin[i].to_string(),
            b.ebitda[i].to_string(),
            b.opex[i].to_string(),
            b.capex[i].to_string(),
            b.cash_from_operations[i].to_string(),
            b.cash_flow[i].to_string(),
            b.hired[i].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn opt_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    str_arg(args, flag).and_then(|v| v.parse().ok())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    opt_arg(args, flag).unwrap_or(default)
}
