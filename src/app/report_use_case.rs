use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::app::ports::CanonicalStorePort;
use crate::observability::metrics::{emit_counter, emit_histogram, MetricName};
use crate::pipeline::aggregate::{Aggregator, DemographicReport};
use crate::pipeline::processing::BracketScheme;
use crate::pipeline::storage::{verify_records, VerificationReport};

/// Use case for computing the demographic report from the stored canonical
/// set. Read-only: the set is scanned, never mutated.
pub struct ReportUseCase {
    store: Arc<dyn CanonicalStorePort>,
    aggregator: Aggregator,
    scheme: BracketScheme,
}

impl ReportUseCase {
    pub fn new(store: Arc<dyn CanonicalStorePort>, aggregator: Aggregator, scheme: BracketScheme) -> Self {
        Self {
            store,
            aggregator,
            scheme,
        }
    }

    pub async fn generate(&self) -> Result<DemographicReport> {
        let started = std::time::Instant::now();
        let records = self.store.scan_all().await?;
        emit_counter(MetricName::AggregateRecordsScanned, records.len() as u64);

        let report = self.aggregator.report(&records);
        emit_histogram(
            MetricName::AggregateDuration,
            started.elapsed().as_secs_f64(),
        );
        info!(
            records = records.len(),
            ranked_countries = report.top_gmail_countries.len(),
            "report generated"
        );
        Ok(report)
    }

    /// Runs the storage verification pass against the current set.
    pub async fn verify(&self) -> Result<VerificationReport> {
        let records = self.store.scan_all().await?;
        Ok(verify_records(&records, self.scheme))
    }
}
