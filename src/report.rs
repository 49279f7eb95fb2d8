// =============================================================================
// Audit Report — ranked rows, Top/Bottom extremes, narrative, error summary
// =============================================================================
//
// A report is built once at the end of a run and never mutated afterwards;
// consumers always receive it behind an `Arc` (see `app_state`).
//
// Ranking is a stable descending sort on score, so equal scores keep the
// order in which symbols were processed.  Top-N and Bottom-N are the head
// and tail of that single sequence: with fewer than 2N rows they overlap.
// =============================================================================

use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::SymbolAuditError;
use crate::types::{Direction, RiskProfile};

// =============================================================================
// Rows and errors
// =============================================================================

/// One successfully audited symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRow {
    pub symbol: String,
    /// 1-based position after ranking; 0 until ranked.
    pub rank: usize,
    pub score: f64,
    pub variation_score: f64,
    /// Sentiment in [0, 1] (0.5 when the provider had nothing).
    pub sentiment: f64,
    /// Freshness of the sentiment value; `None` for the neutral default.
    pub sentiment_as_of: Option<DateTime<Utc>>,
    pub variation_10m: Option<f64>,
    pub variation_1h: Option<f64>,
    pub variation_24h: Option<f64>,
    pub completeness: f64,
    pub risk_profile: RiskProfile,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub direction: Direction,
    /// Model P(up); 0.0 when the direction is unknown.
    pub confidence: f64,
    /// Model columns that had to be backfilled with 0.0.
    pub backfilled_features: Vec<String>,
}

impl AuditRow {
    /// One-line human-readable explanation of the row.
    pub fn explanation(&self) -> String {
        format!(
            "Variation 10m: {} | RSI: {} | MACD: {} | Sentiment: {:.1}% | Model: {}",
            fmt_opt(self.variation_10m, "%"),
            fmt_opt(self.rsi, ""),
            fmt_opt(self.macd, ""),
            self.sentiment * 100.0,
            self.direction
        )
    }
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{v:.2}{suffix}"),
        None => "n/a".to_string(),
    }
}

/// Terminal state of a symbol that produced no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditErrorStatus {
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditErrorKind {
    UnlistedSymbol,
    DataFetch,
    InsufficientData,
}

/// A symbol that was skipped or failed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditError {
    pub symbol: String,
    pub status: AuditErrorStatus,
    pub kind: AuditErrorKind,
    pub reason: String,
}

impl AuditError {
    pub fn from_failure(symbol: impl Into<String>, err: &SymbolAuditError) -> Self {
        let (status, kind) = match err {
            SymbolAuditError::UnlistedSymbol { .. } => {
                (AuditErrorStatus::Skipped, AuditErrorKind::UnlistedSymbol)
            }
            SymbolAuditError::DataFetch { .. } => {
                (AuditErrorStatus::Failed, AuditErrorKind::DataFetch)
            }
            SymbolAuditError::InsufficientData(_) => {
                (AuditErrorStatus::Skipped, AuditErrorKind::InsufficientData)
            }
        };
        Self {
            symbol: symbol.into(),
            status,
            kind,
            reason: err.to_string(),
        }
    }
}

// =============================================================================
// Ranking
// =============================================================================

/// Stable descending sort on score, then assign 1-based ranks.
pub fn rank_rows(mut rows: Vec<AuditRow>) -> Vec<AuditRow> {
    rows.sort_by(|a, b| b.score.total_cmp(&a.score));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

/// Head and tail of an already ranked sequence.
pub fn top_and_bottom(ranked: &[AuditRow], n: usize) -> (Vec<AuditRow>, Vec<AuditRow>) {
    let k = n.min(ranked.len());
    let top = ranked[..k].to_vec();
    let bottom = ranked[ranked.len() - k..].to_vec();
    (top, bottom)
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    /// Unique identifier for this run (UUID v4).
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Wall-clock duration of the whole run.
    pub duration_ms: u64,
    /// Symbols the run was asked to audit.
    pub universe_size: usize,
    /// Every successful row, best first.
    pub ranked: Vec<AuditRow>,
    pub top: Vec<AuditRow>,
    pub bottom: Vec<AuditRow>,
    pub errors: Vec<AuditError>,
    /// Why the report is empty or partial, when it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The run stopped early on request; unprocessed symbols are absent.
    pub cancelled: bool,
}

impl AuditReport {
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Human-readable report: header, Top-N, Bottom-N, error summary.
    pub fn narrative(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Audit {} completed {} in {:.1}s",
            self.run_id,
            self.completed_at.to_rfc3339(),
            self.duration_ms as f64 / 1000.0
        );
        let _ = writeln!(out, "{} of {} symbols scored.", self.ranked.len(), self.universe_size);
        if let Some(msg) = &self.message {
            let _ = writeln!(out, "{msg}");
        }

        for (title, rows) in [("Top", &self.top), ("Bottom", &self.bottom)] {
            if rows.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n{title} {}:", rows.len());
            for row in rows {
                let _ = writeln!(
                    out,
                    "→ #{} {} (score {:.2}, {})\n   {}",
                    row.rank,
                    row.symbol,
                    row.score,
                    row.risk_profile,
                    row.explanation()
                );
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nErrors ({}):", self.errors.len());
            for err in &self.errors {
                let _ = writeln!(out, "{} → {}", err.symbol, err.reason);
            }
        }
        out
    }

    /// Write the report as pretty JSON using an atomic tmp + rename.
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create report directory {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise audit report")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp report to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp report to {}", path.display()))?;

        info!(path = %path.display(), rows = self.ranked.len(), "audit report exported");
        Ok(())
    }
}

/// Collects run metadata while the batch is in progress.
#[derive(Debug)]
pub struct ReportBuilder {
    run_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    universe_size: usize,
    top_n: usize,
}

impl ReportBuilder {
    pub fn start(universe_size: usize, top_n: usize) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            universe_size,
            top_n,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Rank `rows` and freeze everything into a report.
    pub fn finish(
        self,
        rows: Vec<AuditRow>,
        errors: Vec<AuditError>,
        message: Option<String>,
        cancelled: bool,
    ) -> AuditReport {
        let ranked = rank_rows(rows);
        let (top, bottom) = top_and_bottom(&ranked, self.top_n);
        AuditReport {
            run_id: self.run_id,
            started_at: self.started_at,
            completed_at: Utc::now(),
            duration_ms: self.started.elapsed().as_millis() as u64,
            universe_size: self.universe_size,
            ranked,
            top,
            bottom,
            errors,
            message,
            cancelled,
        }
    }
}
