//! The batch engine.
//!
//! PIPELINE (fixed order):
//!   1. Historical metrics deriver  -> BaseMetrics
//!   2. Distribution builder        -> DistributionSet
//!   3. Scenario generator x N      -> SimulationBatch
//!   4. Results assembler           -> ForecastSummary
//!
//! RULES:
//!   - Draws share nothing mutable except their random stream.
//!   - All randomness flows through ForecastRng handles passed in
//!     explicitly; there is no process-wide RNG.
//!   - Sequential mode uses one stream for the whole batch. Parallel mode
//!     gives each fixed-size chunk its own derived stream, so output is
//!     identical for a given chunk size whatever the thread count.
//!   - A time budget stops new draws from starting; it never interrupts
//!     one in flight.

use crate::{
    config::{ExecutionMode, ForecastConfig, HiringPolicy},
    distribution::{build_distributions, DistributionSet},
    error::ForecastResult,
    history::HistoricalRow,
    metrics::{derive_base_metrics, BaseMetrics},
    results::{assemble_summary, ForecastSummary},
    rng::{ForecastRng, StreamBank},
    scenario::{simulate_scenario, ScenarioOutcome},
    types::{Ratio, RunId},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Fresh identifier for a forecast run.
pub fn new_run_id() -> RunId {
    format!("run-{}", Uuid::new_v4())
}

/// N outcomes stored as parallel vectors; index i of every vector belongs
/// to draw i.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationBatch {
    pub base: BaseMetrics,
    /// Cap applied to every capex draw in this batch.
    pub capex_cap: Ratio,
    pub cash: Vec<f64>,
    pub revenue: Vec<f64>,
    pub gross_margin: Vec<f64>,
    pub operating_margin: Vec<f64>,
    pub ebitda: Vec<f64>,
    pub cash_flow: Vec<f64>,
    pub revenue_growth: Vec<f64>,
    pub opex: Vec<f64>,
    pub capex: Vec<f64>,
    pub cash_from_operations: Vec<f64>,
    pub hired: Vec<bool>,
}

impl SimulationBatch {
    pub fn with_capacity(base: BaseMetrics, capex_cap: Ratio, n: usize) -> Self {
        Self {
            base,
            capex_cap,
            cash: Vec::with_capacity(n),
            revenue: Vec::with_capacity(n),
            gross_margin: Vec::with_capacity(n),
            operating_margin: Vec::with_capacity(n),
            ebitda: Vec::with_capacity(n),
            cash_flow: Vec::with_capacity(n),
            revenue_growth: Vec::with_capacity(n),
            opex: Vec::with_capacity(n),
            capex: Vec::with_capacity(n),
            cash_from_operations: Vec::with_capacity(n),
            hired: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, outcome: &ScenarioOutcome) {
        self.cash.push(outcome.cash);
        self.revenue.push(outcome.revenue);
        self.gross_margin.push(outcome.gross_margin);
        self.operating_margin.push(outcome.operating_margin);
        self.ebitda.push(outcome.ebitda);
        self.cash_flow.push(outcome.cash_flow);
        self.revenue_growth.push(outcome.revenue_growth);
        self.opex.push(outcome.opex);
        self.capex.push(outcome.capex);
        self.cash_from_operations.push(outcome.cash_from_operations);
        self.hired.push(outcome.hired);
    }

    pub fn len(&self) -> usize {
        self.cash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cash.is_empty()
    }
}

/// Everything one analysis call produces.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub run_id: RunId,
    pub distributions: DistributionSet,
    pub batch: SimulationBatch,
    pub summary: ForecastSummary,
}

pub struct ForecastEngine {
    pub run_id: RunId,
    config: ForecastConfig,
    streams: StreamBank,
}

impl ForecastEngine {
    pub fn new(run_id: RunId, config: ForecastConfig) -> ForecastResult<Self> {
        config.validate()?;
        Ok(Self {
            streams: StreamBank::new(config.seed),
            run_id,
            config,
        })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Derive, build, simulate and summarize in one call.
    pub fn analyze(&self, rows: &[HistoricalRow]) -> ForecastResult<Analysis> {
        let base = derive_base_metrics(rows, &self.config)?;
        let distributions = build_distributions(&base, &self.config.bounds);
        let batch = self.run_batch(&base, &distributions);
        let summary = assemble_summary(&batch, &self.config.policy);
        Ok(Analysis {
            run_id: self.run_id.clone(),
            distributions,
            batch,
            summary,
        })
    }

    /// The capex cap for this engine: the override if set, otherwise the
    /// data-driven cap carried by `base`.
    pub fn capex_cap(&self, base: &BaseMetrics) -> Ratio {
        self.config.capex_cap_override.unwrap_or(base.capex_cap)
    }

    /// Run the configured number of draws.
    pub fn run_batch(&self, base: &BaseMetrics, dists: &DistributionSet) -> SimulationBatch {
        let n = self.config.simulation_count;
        let cap = self.capex_cap(base);
        let deadline = self
            .config
            .time_budget_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        let started = Instant::now();

        log::info!(
            "run {}: {} draws, seed={}, mode={:?}, capex_cap={:.4}",
            self.run_id,
            n,
            self.config.seed,
            self.config.execution,
            cap
        );

        let batch = match self.config.execution {
            ExecutionMode::Sequential => {
                let mut rng = self.streams.master();
                run_sequential(base, dists, cap, &self.config.policy, n, &mut rng, deadline)
            }
            ExecutionMode::Parallel { batch_size } => run_parallel(
                base,
                dists,
                cap,
                &self.config.policy,
                n,
                batch_size,
                &self.streams,
                deadline,
            ),
        };

        if batch.len() < n {
            log::warn!(
                "run {}: time budget exhausted after {} of {} draws",
                self.run_id,
                batch.len(),
                n
            );
        }
        log::info!(
            "run {}: {} draws in {:.1?}",
            self.run_id,
            batch.len(),
            started.elapsed()
        );
        batch
    }
}

/// Draw `n` scenarios from a single stream, in order.
pub fn run_sequential(
    base: &BaseMetrics,
    dists: &DistributionSet,
    capex_cap: Ratio,
    policy: &HiringPolicy,
    n: usize,
    rng: &mut ForecastRng,
    deadline: Option<Instant>,
) -> SimulationBatch {
    let mut batch = SimulationBatch::with_capacity(base.clone(), capex_cap, n);
    for _ in 0..n {
        if expired(deadline) {
            break;
        }
        let outcome = simulate_scenario(base, dists, capex_cap, policy, rng);
        batch.push(&outcome);
    }
    batch
}

/// Draw `n` scenarios in chunks of `batch_size` on the rayon pool.
#[allow(clippy::too_many_arguments)]
pub fn run_parallel(
    base: &BaseMetrics,
    dists: &DistributionSet,
    capex_cap: Ratio,
    policy: &HiringPolicy,
    n: usize,
    batch_size: usize,
    streams: &StreamBank,
    deadline: Option<Instant>,
) -> SimulationBatch {
    let batch_size = batch_size.max(1);
    let num_chunks = n.div_ceil(batch_size);

    let chunks: Vec<Vec<ScenarioOutcome>> = (0..num_chunks)
        .into_par_iter()
        .map(|chunk| {
            if expired(deadline) {
                return Vec::new();
            }
            let mut rng = streams.for_batch(chunk as u64);
            let size = batch_size.min(n - chunk * batch_size);
            (0..size)
                .map(|_| simulate_scenario(base, dists, capex_cap, policy, &mut rng))
                .collect()
        })
        .collect();

    let mut batch = SimulationBatch::with_capacity(base.clone(), capex_cap, n);
    for outcome in chunks.iter().flatten() {
        batch.push(outcome);
    }
    batch
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
