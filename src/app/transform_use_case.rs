use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info};

use crate::app::ports::{CanonicalStorePort, PersonFeedPort};
use crate::observability::metrics::{emit_counter, emit_histogram, MetricName};
use crate::pipeline::ingestion::num_batches;
use crate::pipeline::processing::{RecordTransformer, RunState, TransformStats};

/// What one ingestion-and-transform run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub batches: u32,
    pub stats: TransformStats,
    pub stored: usize,
}

/// Use case for one full run: fetch raw batches from the feed, transform
/// them with run-wide deduplication, and hand the canonical set to the
/// store. The store is only written after every batch has transformed, so
/// an aborted run never leaves partial canonical output behind.
pub struct TransformUseCase {
    feed: Arc<dyn PersonFeedPort>,
    store: Arc<dyn CanonicalStorePort>,
    transformer: RecordTransformer,
}

impl TransformUseCase {
    pub fn new(
        feed: Arc<dyn PersonFeedPort>,
        store: Arc<dyn CanonicalStorePort>,
        transformer: RecordTransformer,
    ) -> Self {
        Self {
            feed,
            store,
            transformer,
        }
    }

    /// Runs the pipeline for `total` records in batches of `batch_size`.
    /// A feed failure is fatal: counts collected so far are discarded and
    /// the error surfaces to the caller with the failing stage attached.
    pub async fn run(&self, total: u32, batch_size: u32) -> Result<RunSummary> {
        let started = std::time::Instant::now();
        let num_batches = num_batches(total, batch_size);
        info!(total, batch_size, num_batches, "starting transform run");

        let mut state = RunState::new();
        let mut records = Vec::new();
        let mut stats = TransformStats::default();
        let mut remaining = total;

        for batch_id in 0..num_batches {
            let quantity = remaining.min(batch_size);
            let batch = match self.feed.fetch_batch(batch_id, quantity).await {
                Ok(batch) => batch,
                Err(e) => {
                    error!(
                        batch_id,
                        accepted = stats.accepted,
                        rejected = stats.rejected(),
                        "feed failed, aborting run and discarding partial output"
                    );
                    return Err(anyhow::Error::new(e)
                        .context(format!("ingestion failed at batch {}", batch_id)));
                }
            };
            remaining -= quantity.min(remaining);

            let outcome = self.transformer.transform_batch(&mut state, &batch);
            emit_counter(MetricName::TransformBatchesProcessed, 1);
            emit_counter(MetricName::TransformRecordsAccepted, outcome.stats.accepted);
            emit_counter(
                MetricName::TransformRecordsRejected,
                outcome.stats.rejected(),
            );
            emit_counter(
                MetricName::TransformDuplicatesDiscarded,
                outcome.stats.duplicates_discarded,
            );
            emit_counter(
                MetricName::TransformMissingIdentity,
                outcome.stats.missing_identity,
            );

            records.extend(outcome.records);
            stats.merge(&outcome.stats);
        }

        self.store
            .insert_batch(&records)
            .await
            .map_err(|e| anyhow::Error::new(e).context("storing canonical records failed"))?;

        emit_histogram(
            MetricName::TransformDuration,
            started.elapsed().as_secs_f64(),
        );
        info!(
            accepted = stats.accepted,
            rejected = stats.rejected(),
            duplicates = stats.duplicates_discarded,
            "transform run complete"
        );

        Ok(RunSummary {
            batches: num_batches,
            stats,
            stored: records.len(),
        })
    }
}
