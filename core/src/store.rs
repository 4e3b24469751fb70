//! SQLite persistence for analysis runs.
//!
//! RULE: Only store.rs talks to the database.
//! The engine never writes; callers persist what they choose.

use crate::{
    analysis::{AnalysisFacts, QuestionCategory},
    error::ForecastResult,
    results::ForecastSummary,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

pub struct ForecastStore {
    conn: Connection,
}

impl ForecastStore {
    /// Open (or create) the run database at `path`.
    pub fn open(path: &str) -> ForecastResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only takes effect for real files.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ForecastResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ForecastResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id: &str,
        seed: u64,
        simulation_count: usize,
        version: &str,
    ) -> ForecastResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, seed, simulation_count, version, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                seed as i64,
                simulation_count as i64,
                version,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn run_count(&self) -> ForecastResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM run", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Seed recorded for a run, if the run exists.
    pub fn run_seed(&self, run_id: &str) -> ForecastResult<Option<u64>> {
        let seed = self
            .conn
            .query_row(
                "SELECT seed FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(seed.map(|s| s as u64))
    }

    // ── Summary ────────────────────────────────────────────────

    pub fn save_summary(&self, run_id: &str, summary: &ForecastSummary) -> ForecastResult<()> {
        let json = serde_json::to_string(summary)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO forecast_summary (run_id, anchor_period, summary_json, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                summary.anchor_period.to_string(),
                json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load_summary(&self, run_id: &str) -> ForecastResult<Option<ForecastSummary>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT summary_json FROM forecast_summary WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    // ── Facts ──────────────────────────────────────────────────

    pub fn save_facts(
        &self,
        run_id: &str,
        category: QuestionCategory,
        facts: &AnalysisFacts,
    ) -> ForecastResult<()> {
        self.conn.execute(
            "INSERT INTO analysis_facts (run_id, category, facts_json, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_id, category.name(), serde_json::to_string(facts)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn facts_for_run(&self, run_id: &str) -> ForecastResult<Vec<AnalysisFacts>> {
        let mut stmt = self.conn.prepare(
            "SELECT facts_json FROM analysis_facts WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|j| Ok(serde_json::from_str::<AnalysisFacts>(j)?))
            .collect()
    }
}
