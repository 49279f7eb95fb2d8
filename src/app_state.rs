// =============================================================================
// Central Application State — Crypto Audit Service
// =============================================================================
//
// The single source of truth shared by the scheduler loop and the batch
// orchestrator.  Each subsystem manages its own interior mutability; AppState
// ties them together and exposes the latest finished report.
//
// Thread safety:
//   - Atomic counter for lock-free report version tracking.
//   - parking_lot::RwLock for the config, the error log and the report slot.
//   - The report slot holds an `Arc<AuditReport>`: publishing swaps the
//     pointer under a write lock held only for the assignment, so readers
//     always get a complete report.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::audit::UniverseCache;
use crate::inference::ModelStore;
use crate::report::AuditReport;
use crate::runtime_config::AuditConfig;
use crate::sentiment::SentimentCache;

// =============================================================================
// Error Record
// =============================================================================

/// A run-level failure kept for the status log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Maximum number of recent run errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

// =============================================================================
// Latest report holder
// =============================================================================

/// Result of reading the latest report.
#[derive(Debug, Clone)]
pub enum LatestReport {
    /// No run has finished since start-up.
    NotYet,
    Ready(Arc<AuditReport>),
}

impl LatestReport {
    pub fn report(&self) -> Option<&Arc<AuditReport>> {
        match self {
            Self::NotYet => None,
            Self::Ready(report) => Some(report),
        }
    }
}

/// Single-writer, multi-reader slot for the most recent report.
#[derive(Debug, Default)]
pub struct ReportHolder {
    latest: RwLock<Option<Arc<AuditReport>>>,
}

impl ReportHolder {
    pub fn latest(&self) -> LatestReport {
        match self.latest.read().as_ref() {
            Some(report) => LatestReport::Ready(Arc::clone(report)),
            None => LatestReport::NotYet,
        }
    }

    /// Replace the current report wholesale.
    pub fn publish(&self, report: Arc<AuditReport>) {
        *self.latest.write() = Some(report);
    }
}

// =============================================================================
// AppState
// =============================================================================

/// Central application state shared across async tasks via `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented every time a report is published.
    pub report_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub config: RwLock<AuditConfig>,

    // ── Shared resources ────────────────────────────────────────────────
    pub models: ModelStore,
    pub sentiment: SentimentCache,
    pub universe: UniverseCache,

    // ── Output ──────────────────────────────────────────────────────────
    reports: ReportHolder,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Build the state from `config`; caches are sized from its settings.
    /// No model is loaded yet.
    pub fn new(config: AuditConfig) -> Self {
        Self {
            report_version: AtomicU64::new(0),
            models: ModelStore::new(),
            sentiment: SentimentCache::new(config.sentiment_ttl()),
            universe: UniverseCache::new(
                config.universe_cache_ttl(),
                config.universe_cache_max_hits,
            ),
            config: RwLock::new(config),
            reports: ReportHolder::default(),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    /// Clone of the current configuration.
    pub fn config_snapshot(&self) -> AuditConfig {
        self.config.read().clone()
    }

    // ── Reports ─────────────────────────────────────────────────────────

    /// Never blocks on a run in progress: returns the last finished report
    /// or [`LatestReport::NotYet`].
    pub fn latest_report(&self) -> LatestReport {
        self.reports.latest()
    }

    pub fn publish_report(&self, report: Arc<AuditReport>) -> u64 {
        self.reports.publish(report);
        self.report_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record a run-level error.  The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted first.
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Compact status summary for the periodic status log line.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let latest = self.latest_report();
        let report = latest.report();
        StateSnapshot {
            report_version: self.report_version.load(Ordering::SeqCst),
            last_run_id: report.map(|r| r.run_id.clone()),
            last_completed_at: report.map(|r| r.completed_at),
            last_row_count: report.map(|r| r.ranked.len()).unwrap_or(0),
            last_error_count: report.map(|r| r.errors.len()).unwrap_or(0),
            model_loaded: self.models.is_loaded(),
            sentiment_as_of: self.sentiment.as_of(),
            recent_run_errors: self.recent_errors.read().len(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

/// Serialisable status summary.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub report_version: u64,
    pub last_run_id: Option<String>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub last_row_count: usize,
    pub last_error_count: usize,
    pub model_loaded: bool,
    pub sentiment_as_of: Option<DateTime<Utc>>,
    pub recent_run_errors: usize,
    pub uptime_secs: u64,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportBuilder;

    #[test]
    fn no_report_yet_sentinel() {
        let state = AppState::new(AuditConfig::default());
        assert!(matches!(state.latest_report(), LatestReport::NotYet));
        let snap = state.build_snapshot();
        assert_eq!(snap.report_version, 0);
        assert!(snap.last_run_id.is_none());
        assert!(!snap.model_loaded);
    }

    #[test]
    fn publish_swaps_whole_report() {
        let state = AppState::new(AuditConfig::default());
        let first = Arc::new(ReportBuilder::start(0, 5).finish(
            vec![],
            vec![],
            Some("first".into()),
            false,
        ));
        assert_eq!(state.publish_report(Arc::clone(&first)), 1);

        // A reader holding the old snapshot keeps it intact.
        let held = state.latest_report().report().cloned().unwrap();

        let second = Arc::new(ReportBuilder::start(0, 5).finish(
            vec![],
            vec![],
            Some("second".into()),
            false,
        ));
        assert_eq!(state.publish_report(second), 2);

        assert_eq!(held.message.as_deref(), Some("first"));
        let now = state.latest_report().report().cloned().unwrap();
        assert_eq!(now.message.as_deref(), Some("second"));
        assert_eq!(state.build_snapshot().last_run_id.as_deref(), Some(now.run_id.as_str()));
    }

    #[test]
    fn error_log_is_bounded() {
        let state = AppState::new(AuditConfig::default());
        for i in 0..(MAX_RECENT_ERRORS + 10) {
            state.push_error(format!("error {i}"));
        }
        let errors = state.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "error 10");
    }
}
