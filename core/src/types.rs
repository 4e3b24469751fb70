//! Shared primitive types used across the forecasting engine.

/// An absolute currency amount in the reporting currency of the input table.
pub type Currency = f64;

/// A dimensionless fraction (0.25 = 25%), never a percentage.
pub type Ratio = f64;

/// The canonical analysis run identifier.
pub type RunId = String;
