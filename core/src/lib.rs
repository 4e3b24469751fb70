//! Monte Carlo forecasting core: quarterly history in, next-period
//! distributions of cash and revenue out, plus the hiring decision rule.

pub mod analysis;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod history;
pub mod metrics;
pub mod results;
pub mod rng;
pub mod scenario;
pub mod stats;
pub mod store;
pub mod types;
