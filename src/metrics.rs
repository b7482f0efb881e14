//! Prometheus metrics for dictionary operations
//!
//! Counters are process-wide and exposed on `GET /metrics`.
use crate::error::DictionaryError;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;

/// Global metrics registry instance
pub static METRICS: Lazy<Arc<MetricsCollector>> = Lazy::new(|| Arc::new(MetricsCollector::new()));

/// Labels for operation metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    /// Operation name (e.g., "add_example", "examples_for_word")
    pub operation: String,
    /// "success" or "error"
    pub status: String,
}

/// Labels for error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub operation: String,
    pub category: String,
}

/// Labels for fan-out metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FanOutLabels {
    /// Kind of child fetched ("example" or "word")
    pub entity: String,
}

/// Counter names are registered without the `_total` suffix; the encoder
/// appends it.
pub struct MetricsCollector {
    registry: RwLock<Registry>,

    /// Total operations by name and status
    pub dictionary_operations_total: Family<OperationLabels, Counter>,

    /// Total errors by operation and category
    pub dictionary_errors_total: Family<ErrorLabels, Counter>,

    /// Total child lookup tasks spawned by fan-out calls
    pub dictionary_fanout_tasks_total: Family<FanOutLabels, Counter>,

    /// Number of children per fan-out call
    pub dictionary_fanout_width: Family<FanOutLabels, Histogram>,

    /// Creates that lost a uniqueness race and returned the winner instead
    pub dictionary_create_conflicts_total: Counter,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let dictionary_operations_total = Family::<OperationLabels, Counter>::default();
        registry.register(
            "dictionary_operations",
            "Total number of dictionary operations",
            dictionary_operations_total.clone(),
        );

        let dictionary_errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "dictionary_errors",
            "Total number of failed operations by error category",
            dictionary_errors_total.clone(),
        );

        let dictionary_fanout_tasks_total = Family::<FanOutLabels, Counter>::default();
        registry.register(
            "dictionary_fanout_tasks",
            "Total number of child lookup tasks spawned",
            dictionary_fanout_tasks_total.clone(),
        );

        let dictionary_fanout_width = Family::<FanOutLabels, Histogram>::new_with_constructor(|| {
            // Buckets: 1, 2, 4, ... 512 children
            Histogram::new(exponential_buckets(1.0, 2.0, 10))
        });
        registry.register(
            "dictionary_fanout_width",
            "Number of children fetched per fan-out call",
            dictionary_fanout_width.clone(),
        );

        let dictionary_create_conflicts_total = Counter::default();
        registry.register(
            "dictionary_create_conflicts",
            "Creates that hit a uniqueness conflict and returned the existing row",
            dictionary_create_conflicts_total.clone(),
        );

        Self {
            registry: RwLock::new(registry),
            dictionary_operations_total,
            dictionary_errors_total,
            dictionary_fanout_tasks_total,
            dictionary_fanout_width,
            dictionary_create_conflicts_total,
        }
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        let registry = self.registry.read();
        if let Err(error) = encode(&mut buffer, &registry) {
            tracing::warn!(?error, "failed to encode metrics");
        }
        buffer
    }

    /// Record the outcome of one core operation
    pub fn record_operation<T>(&self, operation: &str, result: &Result<T, DictionaryError>) {
        let status = if result.is_ok() { "success" } else { "error" };
        self.dictionary_operations_total
            .get_or_create(&OperationLabels {
                operation: operation.to_string(),
                status: status.to_string(),
            })
            .inc();

        if let Err(error) = result {
            self.dictionary_errors_total
                .get_or_create(&ErrorLabels {
                    operation: operation.to_string(),
                    category: error.category().to_string(),
                })
                .inc();
        }
    }

    pub fn record_fanout(&self, entity: &str, width: usize) {
        let labels = FanOutLabels {
            entity: entity.to_string(),
        };
        self.dictionary_fanout_tasks_total
            .get_or_create(&labels)
            .inc_by(width as u64);
        self.dictionary_fanout_width
            .get_or_create(&labels)
            .observe(width as f64);
    }

    pub fn record_create_conflict(&self) {
        self.dictionary_create_conflicts_total.inc();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
