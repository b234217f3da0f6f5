//! Evaluation context and configuration

use quarry_db_core::TermDict;
use quarry_db_index::RecordSource;
use std::sync::Arc;

/// Tunables for one evaluation.
#[derive(Clone, Debug)]
pub struct EvalConfig {
    /// Rows a materializing operator (Distinct/OrderBy/Group) may hold
    /// in memory before spilling sorted runs to temp files.
    pub materialize_budget: usize,
    /// Capacity of the background producer queue.
    pub producer_queue_capacity: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            materialize_budget: 100_000,
            producer_queue_capacity: 10,
        }
    }
}

/// Everything an operator needs to evaluate: the record source (a
/// transaction view or a bare snapshot), the dictionary, and options.
#[derive(Clone)]
pub struct EvalContext {
    pub source: Arc<dyn RecordSource + Send + Sync>,
    pub dict: Arc<TermDict>,
    /// Include inferred records in pattern matches.
    pub include_inferred: bool,
    pub config: EvalConfig,
}

impl EvalContext {
    /// Context over a source and dictionary with default config.
    pub fn new(source: Arc<dyn RecordSource + Send + Sync>, dict: Arc<TermDict>) -> Self {
        Self {
            source,
            dict,
            include_inferred: true,
            config: EvalConfig::default(),
        }
    }

    /// Toggle inferred-record visibility.
    pub fn with_inferred(mut self, include_inferred: bool) -> Self {
        self.include_inferred = include_inferred;
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }
}
