use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::app::ports::PersonFeedPort;
use crate::constants::DEFAULT_FEED_URL;
use crate::domain::RawPersonRecord;
use crate::error::{PipelineError, Result};
use crate::observability::metrics::{emit_counter, emit_histogram, MetricName};

/// Number of batches needed to cover `total` records at `batch_size` each,
/// rounding up for a short final batch.
pub fn num_batches(total: u32, batch_size: u32) -> u32 {
    (total + batch_size - 1) / batch_size
}

/// Settings for the persons feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub gender: String,
    pub batch_size: u32,
    pub total: u32,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_URL.to_string(),
            gender: "male".to_string(),
            batch_size: 1000,
            total: 30000,
            timeout_seconds: 20,
            max_retries: 3,
        }
    }
}

impl FeedConfig {
    /// Rejects parameter combinations the feed cannot serve.
    pub fn validate(&self) -> Result<()> {
        if self.total == 0 {
            return Err(PipelineError::Config(
                "total must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::Config(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if self.gender != "male" && self.gender != "female" {
            return Err(PipelineError::Config(
                "gender must be either 'male' or 'female'".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of batches needed to reach the configured total.
    pub fn num_batches(&self) -> u32 {
        num_batches(self.total, self.batch_size)
    }
}

/// Feed response envelope: records arrive under a `data` key.
#[derive(Debug, Deserialize)]
struct FeedResponse {
    data: Vec<RawPersonRecord>,
}

/// HTTP client for a fakerapi-style persons endpoint. Batches are addressed
/// by seed, so fetching the same batch id twice yields the same records.
pub struct PersonFeedClient {
    client: reqwest::Client,
    config: FeedConfig,
}

impl PersonFeedClient {
    pub fn new(config: FeedConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    async fn get_batch(&self, batch_id: u32, quantity: u32) -> Result<Vec<RawPersonRecord>> {
        let started = std::time::Instant::now();
        let quantity = quantity.to_string();
        let seed = batch_id.to_string();
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("gender", self.config.gender.as_str()),
                ("_quantity", quantity.as_str()),
                ("_seed", seed.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: FeedResponse = response.json().await?;
        emit_histogram(
            MetricName::FeedRequestDuration,
            started.elapsed().as_secs_f64(),
        );
        Ok(body.data)
    }
}

#[async_trait]
impl PersonFeedPort for PersonFeedClient {
    /// Fetches one batch with bounded retries and linear backoff. A batch
    /// that still fails after the last attempt is fatal to the run.
    async fn fetch_batch(&self, batch_id: u32, quantity: u32) -> Result<Vec<RawPersonRecord>> {
        let max_retries = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=max_retries {
            match self.get_batch(batch_id, quantity).await {
                Ok(records) => {
                    emit_counter(MetricName::FeedRequestsSuccess, 1);
                    emit_counter(MetricName::FeedRecordsFetched, records.len() as u64);
                    info!(batch_id, records = records.len(), "fetched feed batch");
                    return Ok(records);
                }
                Err(e) => {
                    emit_counter(MetricName::FeedRequestsError, 1);
                    warn!(batch_id, attempt, error = %e, "feed batch attempt failed");
                    last_error = Some(e);
                    if attempt < max_retries {
                        tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PipelineError::Feed {
            message: format!("batch {} failed with no recorded error", batch_id),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_zero_total() {
        let config = FeedConfig {
            total: 0,
            ..FeedConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn config_rejects_zero_batch_size() {
        let config = FeedConfig {
            batch_size: 0,
            ..FeedConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_rejects_unknown_gender_filter() {
        let config = FeedConfig {
            gender: "other".to_string(),
            ..FeedConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn batch_count_rounds_up() {
        let config = FeedConfig {
            total: 2500,
            batch_size: 1000,
            ..FeedConfig::default()
        };
        assert_eq!(config.num_batches(), 3);
    }

    #[test]
    fn feed_response_parses_records_under_data_key() {
        let body = r#"{
            "status": "OK",
            "total": 1,
            "data": [{
                "id": 1,
                "firstname": "Ada",
                "lastname": "Lovelace",
                "email": "ada@gmail.com",
                "phone": "+4930123",
                "birthday": "1990-06-15",
                "gender": "female",
                "address": {
                    "street": "Unter den Linden 1",
                    "city": "Berlin",
                    "zipcode": "10117",
                    "country": "Germany"
                }
            }]
        }"#;

        let parsed: FeedResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].id, Some(1));
        assert_eq!(parsed.data[0].address.country, "Germany");
    }
}
