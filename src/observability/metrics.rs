//! Metrics recording for the pipeline, using standard Prometheus naming
//! conventions. Names live in one enum so call sites never carry magic
//! strings.

use std::fmt;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Feed metrics
    FeedRequestsSuccess,
    FeedRequestsError,
    FeedRecordsFetched,
    FeedRequestDuration,

    // Transform metrics
    TransformRecordsAccepted,
    TransformRecordsRejected,
    TransformDuplicatesDiscarded,
    TransformMissingIdentity,
    TransformBatchesProcessed,
    TransformDuration,

    // Store metrics
    StoreRecordsInserted,
    StoreInsertErrors,

    // Aggregate metrics
    AggregateRecordsScanned,
    AggregateDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FeedRequestsSuccess => "persona_feed_requests_success_total",
            MetricName::FeedRequestsError => "persona_feed_requests_error_total",
            MetricName::FeedRecordsFetched => "persona_feed_records_fetched_total",
            MetricName::FeedRequestDuration => "persona_feed_request_duration_seconds",
            MetricName::TransformRecordsAccepted => "persona_transform_records_accepted_total",
            MetricName::TransformRecordsRejected => "persona_transform_records_rejected_total",
            MetricName::TransformDuplicatesDiscarded => {
                "persona_transform_duplicates_discarded_total"
            }
            MetricName::TransformMissingIdentity => "persona_transform_missing_identity_total",
            MetricName::TransformBatchesProcessed => "persona_transform_batches_processed_total",
            MetricName::TransformDuration => "persona_transform_duration_seconds",
            MetricName::StoreRecordsInserted => "persona_store_records_inserted_total",
            MetricName::StoreInsertErrors => "persona_store_insert_errors_total",
            MetricName::AggregateRecordsScanned => "persona_aggregate_records_scanned_total",
            MetricName::AggregateDuration => "persona_aggregate_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn emit_counter(name: MetricName, value: u64) {
    metrics::counter!(name.as_str()).increment(value);
}

pub fn emit_histogram(name: MetricName, value: f64) {
    metrics::histogram!(name.as_str()).record(value);
}
