//! Historical statement table: CSV loading and cleaning.
//!
//! The table is produced upstream by statement extraction and arrives with
//! loosely formatted cells: thousands separators, currency symbols, blanks
//! and "N/A" placeholders. Cleaning normalizes every cell to `Option<f64>`,
//! drops rows whose period cannot be placed on a calendar or whose revenue
//! is not positive, and sorts the rest chronologically.

use crate::{
    error::{ForecastError, ForecastResult},
    types::Currency,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

pub const COL_PERIOD: &str = "period";
pub const COL_REVENUE: &str = "revenue_total";
pub const COL_GROSS_PROFIT: &str = "gross_profit";
pub const COL_OPEX: &str = "operating_expenses_total";
pub const COL_NET_INCOME: &str = "net_income";
pub const COL_CFO: &str = "cash_from_operations";
pub const COL_CAPEX: &str = "capital_expenditure";
pub const COL_CASH_END: &str = "cash_end_period";
pub const COL_EMPLOYEES: &str = "employee_count";

/// Columns without which no analysis is possible.
const REQUIRED_COLUMNS: [&str; 3] = [COL_PERIOD, COL_REVENUE, COL_CASH_END];

/// Cell texts that mean "no value".
const MISSING_MARKERS: [&str; 7] = ["", "N/A", "NA", "NAN", "NULL", "NONE", "-"];

// ── Periods ────────────────────────────────────────────────────────

/// A fiscal quarter. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiscalPeriod {
    pub year: i32,
    pub quarter: u8,
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{} FY{}", self.quarter, self.year)
    }
}

/// Parse a period label into a fiscal quarter.
///
/// Accepts `Q2 FY24`, `Q2 FY2024 (September 2023)`, `Q2 2024`, `2024-Q2`
/// and `2024 Q2`. Placeholders such as `Unknown Period` yield `None`.
pub fn parse_period(label: &str) -> Option<FiscalPeriod> {
    let normalized = label
        .trim()
        .to_ascii_uppercase()
        .replace(['-', '_', '/'], " ");
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    match tokens.as_slice() {
        [q, rest @ ..] if quarter_token(q).is_some() => {
            let quarter = quarter_token(q)?;
            let year = match rest {
                ["FY", y, ..] => year_token(y)?,
                [y, ..] => year_token(y.strip_prefix("FY").unwrap_or(*y))?,
                [] => return None,
            };
            Some(FiscalPeriod { year, quarter })
        }
        [y, q, ..] => {
            let year = year_token(y.strip_prefix("FY").unwrap_or(*y))?;
            let quarter = quarter_token(q)?;
            Some(FiscalPeriod { year, quarter })
        }
        _ => None,
    }
}

fn quarter_token(token: &str) -> Option<u8> {
    let digits = token.strip_prefix('Q')?;
    match digits.parse::<u8>() {
        Ok(q @ 1..=4) if digits.len() == 1 => Some(q),
        _ => None,
    }
}

fn year_token(token: &str) -> Option<i32> {
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match token.len() {
        2 => token.parse::<i32>().ok().map(|y| 2000 + y),
        4 => token.parse::<i32>().ok(),
        _ => None,
    }
}

// ── Cells ──────────────────────────────────────────────────────────

/// Normalize a numeric cell. Thousands separators, currency symbols and
/// surrounding whitespace are ignored; `(1,200)` is read as -1200.
/// Blank and placeholder cells, and anything unparseable, yield `None`.
pub fn safe_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if MISSING_MARKERS
        .iter()
        .any(|m| trimmed.eq_ignore_ascii_case(m))
    {
        return None;
    }

    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | ' ' | '_'))
        .collect();
    let value = cleaned.parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(if negative { -value } else { value })
}

// ── Rows ───────────────────────────────────────────────────────────

/// One cleaned reporting period. `revenue` is always > 0; every other
/// figure may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRow {
    pub label: String,
    pub period: FiscalPeriod,
    pub revenue: Currency,
    pub gross_profit: Option<Currency>,
    pub operating_expenses: Option<Currency>,
    pub net_income: Option<Currency>,
    pub cash_from_operations: Option<Currency>,
    pub capital_expenditure: Option<Currency>,
    pub cash_end: Option<Currency>,
    pub employee_count: Option<f64>,
}

/// Load and clean a statements CSV from disk.
pub fn load_financials(path: &str) -> ForecastResult<Vec<HistoricalRow>> {
    let file = std::fs::File::open(path).map_err(|e| ForecastError::DataLoad {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    read_financials(file, path)
}

/// Read and clean a statements table from any reader. `source` names the
/// input in error messages.
pub fn read_financials<R: Read>(reader: R, source: &str) -> ForecastResult<Vec<HistoricalRow>> {
    let load_err = |reason: String| ForecastError::DataLoad {
        path: source.to_string(),
        reason,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| load_err(e.to_string()))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    for required in REQUIRED_COLUMNS {
        if column(required).is_none() {
            return Err(load_err(format!("missing required column '{required}'")));
        }
    }

    let idx_period = column(COL_PERIOD);
    let idx_revenue = column(COL_REVENUE);
    let idx_gross = column(COL_GROSS_PROFIT);
    let idx_opex = column(COL_OPEX);
    let idx_net = column(COL_NET_INCOME);
    let idx_cfo = column(COL_CFO);
    let idx_capex = column(COL_CAPEX);
    let idx_cash = column(COL_CASH_END);
    let idx_emp = column(COL_EMPLOYEES);

    let mut rows = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| load_err(e.to_string()))?;
        let text = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");
        let num = |idx: Option<usize>| safe_float(text(idx));

        let label = text(idx_period).to_string();
        let Some(period) = parse_period(&label) else {
            log::warn!("row {}: skipping unparseable period '{label}'", line + 2);
            continue;
        };
        let revenue = match num(idx_revenue) {
            Some(r) if r > 0.0 => r,
            other => {
                log::warn!("row {}: skipping {label} with revenue {other:?}", line + 2);
                continue;
            }
        };

        rows.push(HistoricalRow {
            label,
            period,
            revenue,
            gross_profit: num(idx_gross),
            operating_expenses: num(idx_opex),
            net_income: num(idx_net),
            cash_from_operations: num(idx_cfo),
            capital_expenditure: num(idx_capex),
            cash_end: num(idx_cash),
            employee_count: num(idx_emp),
        });
    }

    rows.sort_by_key(|r| r.period);
    log::debug!("loaded {} usable periods from {source}", rows.len());
    Ok(rows)
}

/// The most recent `n` periods of a chronologically sorted table.
/// `n == 0` keeps everything.
pub fn select_recent_periods(rows: &[HistoricalRow], n: usize) -> &[HistoricalRow] {
    if n == 0 {
        return rows;
    }
    &rows[rows.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_formats() {
        let q = |y, q| Some(FiscalPeriod { year: y, quarter: q });
        assert_eq!(parse_period("Q2 FY24 (September 2023)"), q(2024, 2));
        assert_eq!(parse_period("Q1 FY 2023"), q(2023, 1));
        assert_eq!(parse_period("q4 2022"), q(2022, 4));
        assert_eq!(parse_period("2021-Q3"), q(2021, 3));
        assert_eq!(parse_period("Unknown Period"), None);
        assert_eq!(parse_period("Q5 2024"), None);
        assert_eq!(parse_period(""), None);
    }

    #[test]
    fn accounting_negatives() {
        assert_eq!(safe_float("(1,200)"), Some(-1200.0));
        assert_eq!(safe_float(" $3,000.25 "), Some(3000.25));
        assert_eq!(safe_float("abc"), None);
    }
}
