// =============================================================================
// Audit Module
// =============================================================================
//
// Per-symbol pipeline and the batch run around it:
// - Bounded retry policy for transient data-source failures
// - Universe cache bounded by age and by number of reads
// - Symbol auditor (validate, fetch, enrich, sentiment, infer, score)
// - Batch orchestrator (sequential sweep, fault isolation, report)

pub mod auditor;
pub mod orchestrator;
pub mod retry;
pub mod universe;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::BatchOrchestrator;
pub use retry::RetryPolicy;
pub use universe::UniverseCache;
