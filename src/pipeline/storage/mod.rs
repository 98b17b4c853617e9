use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::app::ports::CanonicalStorePort;
use crate::constants::MASK_PLACEHOLDER;
use crate::domain::{CanonicalPersonRecord, RawPersonRecord};
use crate::error::{PipelineError, Result};
use crate::observability::metrics::{emit_counter, MetricName};
use crate::pipeline::processing::bucketize::BracketScheme;

/// In-memory canonical store for development and testing. Enforces the
/// primary-key uniqueness the persistence boundary promises.
pub struct InMemoryStore {
    records: Arc<Mutex<Vec<CanonicalPersonRecord>>>,
    ids: Arc<Mutex<HashSet<i64>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            ids: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CanonicalStorePort for InMemoryStore {
    async fn insert_batch(&self, batch: &[CanonicalPersonRecord]) -> Result<()> {
        let mut ids = self.ids.lock().unwrap();
        let mut records = self.records.lock().unwrap();

        // Reject the whole batch before touching the table, so a failed
        // insert leaves the store unchanged.
        for record in batch {
            if ids.contains(&record.id) {
                emit_counter(MetricName::StoreInsertErrors, 1);
                return Err(PipelineError::Storage(format!(
                    "duplicate id {} violates primary-key uniqueness",
                    record.id
                )));
            }
        }

        for record in batch {
            ids.insert(record.id);
            records.push(record.clone());
        }
        emit_counter(MetricName::StoreRecordsInserted, batch.len() as u64);
        debug!(inserted = batch.len(), total = records.len(), "stored canonical batch");
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<CanonicalPersonRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.lock().unwrap().len())
    }
}

/// Writes a raw feed snapshot so a later transform stage can pick it up.
pub fn write_raw_snapshot<P: AsRef<Path>>(path: P, records: &[RawPersonRecord]) -> Result<()> {
    write_json(path.as_ref(), records)?;
    info!(records = records.len(), path = %path.as_ref().display(), "wrote raw snapshot");
    Ok(())
}

pub fn read_raw_snapshot<P: AsRef<Path>>(path: P) -> Result<Vec<RawPersonRecord>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Writes the canonical record set so a later report stage can pick it up.
pub fn write_canonical_snapshot<P: AsRef<Path>>(
    path: P,
    records: &[CanonicalPersonRecord],
) -> Result<()> {
    write_json(path.as_ref(), records)?;
    info!(records = records.len(), path = %path.as_ref().display(), "wrote canonical snapshot");
    Ok(())
}

pub fn read_canonical_snapshot<P: AsRef<Path>>(path: P) -> Result<Vec<CanonicalPersonRecord>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// One failed verification check.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationIssue {
    pub check: &'static str,
    pub detail: String,
}

/// Result of verifying a stored canonical set against its invariants.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub records_checked: usize,
    pub issues: Vec<VerificationIssue>,
}

impl VerificationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Verifies that a stored canonical set honors the pipeline invariants: ids
/// unique, analytic fields populated, brackets drawn from the configured
/// scheme, and direct identifiers fully masked.
pub fn verify_records(
    records: &[CanonicalPersonRecord],
    scheme: BracketScheme,
) -> VerificationReport {
    let mut issues = Vec::new();

    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.id) {
            issues.push(VerificationIssue {
                check: "id_uniqueness",
                detail: format!("id {} appears more than once", record.id),
            });
        }
        if record.email_provider.is_empty() {
            issues.push(VerificationIssue {
                check: "email_provider_present",
                detail: format!("id {} has an empty email provider", record.id),
            });
        }
        if record.country.is_empty() {
            issues.push(VerificationIssue {
                check: "country_present",
                detail: format!("id {} has an empty country", record.id),
            });
        }
        if !scheme.brackets().contains(&record.age_group) {
            issues.push(VerificationIssue {
                check: "age_group_scheme",
                detail: format!(
                    "id {} carries bracket {} from the wrong scheme",
                    record.id, record.age_group
                ),
            });
        }
        let masked = record.masked_name == MASK_PLACEHOLDER
            && record.masked_contact == MASK_PLACEHOLDER
            && record.masked_city == MASK_PLACEHOLDER
            && record.masked_address == MASK_PLACEHOLDER;
        if !record.location_masked || !masked {
            issues.push(VerificationIssue {
                check: "masking_completeness",
                detail: format!("id {} is not fully masked", record.id),
            });
        }
    }

    VerificationReport {
        records_checked: records.len(),
        issues,
    }
}
