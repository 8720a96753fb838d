//! Pipeline configuration.

use std::time::Duration;

/// Timeouts and bounds for pipeline runs.
///
/// Every external call a run makes — fetch, publish, store writes —
/// carries one of these caller-specified timeouts. A timeout is fatal
/// for the run and surfaces to the scheduler; the pipeline never retries
/// internally (retry policy belongs to the scheduler).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Deadline for one adapter fetch call.
    pub fetch_timeout: Duration,
    /// Deadline for publishing the run's batch.
    pub publish_timeout: Duration,
    /// Deadline for each store write.
    pub store_timeout: Duration,
    /// Bound on alert-reconcile CAS retries.
    pub max_reconcile_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            publish_timeout: Duration::from_secs(10),
            store_timeout: Duration::from_secs(10),
            max_reconcile_attempts: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PipelineConfig::default();
        assert!(config.fetch_timeout >= config.publish_timeout);
        assert!(config.max_reconcile_attempts >= 1);
    }
}
