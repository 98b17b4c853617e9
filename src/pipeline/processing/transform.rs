use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::{CanonicalPersonRecord, RawPersonRecord};
use crate::pipeline::processing::bucketize::BracketScheme;
use crate::pipeline::processing::dedupe::Deduplicator;
use crate::pipeline::processing::mask::{extract_email_provider, mask_identity};

/// Why a raw record was excluded from canonical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Derived age falls outside the accepted domain range.
    AgeOutOfRange,
    /// No explicit age and the birth date is absent or unparseable.
    MalformedBirthDate,
    /// Record carries no email address.
    MissingEmail,
    /// Email address has no extractable provider domain.
    InvalidEmail,
}

/// Per-run accounting of accepted and rejected records. Validation failures
/// are counted here, never raised past the per-record boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    pub input: u64,
    pub accepted: u64,
    pub age_out_of_range: u64,
    pub malformed_birth_date: u64,
    pub missing_email: u64,
    pub invalid_email: u64,
    /// Records admitted without an identity key (kept, flagged as ambiguous).
    pub missing_identity: u64,
    pub duplicates_discarded: u64,
}

impl TransformStats {
    pub fn rejected(&self) -> u64 {
        self.age_out_of_range + self.malformed_birth_date + self.missing_email + self.invalid_email
    }

    /// Accumulates another batch's counts into this run total.
    pub fn merge(&mut self, other: &TransformStats) {
        self.input += other.input;
        self.accepted += other.accepted;
        self.age_out_of_range += other.age_out_of_range;
        self.malformed_birth_date += other.malformed_birth_date;
        self.missing_email += other.missing_email;
        self.invalid_email += other.invalid_email;
        self.missing_identity += other.missing_identity;
        self.duplicates_discarded += other.duplicates_discarded;
    }

    fn count_rejection(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::AgeOutOfRange => self.age_out_of_range += 1,
            RejectReason::MalformedBirthDate => self.malformed_birth_date += 1,
            RejectReason::MissingEmail => self.missing_email += 1,
            RejectReason::InvalidEmail => self.invalid_email += 1,
        }
    }
}

/// Canonical record set produced from one run, with its accounting.
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub records: Vec<CanonicalPersonRecord>,
    pub stats: TransformStats,
}

/// Mutable state for one transformation run: the identity-key table and the
/// allocator for synthetic ids. Built once per run, discarded at run end;
/// nothing persists across runs.
#[derive(Debug, Default)]
pub struct RunState {
    dedup: Deduplicator,
    synthetic_ids_allocated: i64,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids handed to records that arrive without an identity key. Negative
    /// and descending, so they can never collide with feed-assigned ids.
    fn next_synthetic_id(&mut self) -> i64 {
        self.synthetic_ids_allocated += 1;
        -self.synthetic_ids_allocated
    }
}

/// Composes bucketizer, masker and deduplicator into one batch pass:
/// bucketize each record's derived age (dropping out-of-range ages), mask
/// the survivors, then deduplicate by identity key in arrival order.
/// Re-running the same batches through a fresh `RunState` produces an
/// identical canonical set.
pub struct RecordTransformer {
    scheme: BracketScheme,
    reference_date: NaiveDate,
}

impl RecordTransformer {
    pub fn new(scheme: BracketScheme) -> Self {
        Self {
            scheme,
            reference_date: Utc::now().date_naive(),
        }
    }

    /// Pins the date ages are computed against. Used by tests to keep
    /// birthday-derived ages stable.
    pub fn with_reference_date(scheme: BracketScheme, reference_date: NaiveDate) -> Self {
        Self {
            scheme,
            reference_date,
        }
    }

    pub fn scheme(&self) -> BracketScheme {
        self.scheme
    }

    /// Transforms one batch, threading run-level dedup state so uniqueness
    /// holds across all batches of the run.
    #[instrument(skip(self, state, batch), fields(batch_len = batch.len()))]
    pub fn transform_batch(
        &self,
        state: &mut RunState,
        batch: &[RawPersonRecord],
    ) -> TransformOutcome {
        let mut stats = TransformStats::default();
        let mut records = Vec::with_capacity(batch.len());
        let duplicates_before = state.dedup.duplicates_discarded();
        let unkeyed_before = state.dedup.unkeyed_admitted();

        for raw in batch {
            stats.input += 1;
            match self.transform_record(state, raw) {
                Ok(Some(record)) => {
                    stats.accepted += 1;
                    records.push(record);
                }
                Ok(None) => {} // duplicate, accounted below
                Err(reason) => {
                    debug!(?reason, id = ?raw.id, "record rejected");
                    stats.count_rejection(reason);
                }
            }
        }

        stats.duplicates_discarded = state.dedup.duplicates_discarded() - duplicates_before;
        stats.missing_identity = state.dedup.unkeyed_admitted() - unkeyed_before;

        TransformOutcome { records, stats }
    }

    /// Transforms a whole run of batches as a single serialized reduction in
    /// arrival order, which is what guarantees cross-batch uniqueness.
    pub fn transform_run(&self, batches: &[Vec<RawPersonRecord>]) -> TransformOutcome {
        let mut state = RunState::new();
        let mut records = Vec::new();
        let mut stats = TransformStats::default();

        for batch in batches {
            let outcome = self.transform_batch(&mut state, batch);
            records.extend(outcome.records);
            stats.merge(&outcome.stats);
        }

        TransformOutcome { records, stats }
    }

    fn transform_record(
        &self,
        state: &mut RunState,
        raw: &RawPersonRecord,
    ) -> Result<Option<CanonicalPersonRecord>, RejectReason> {
        // 1. Bucketize; out-of-range ages are dropped, never retained with a
        //    null bracket.
        let age = self.derive_age(raw)?;
        let age_group = self
            .scheme
            .bucketize(age)
            .ok_or(RejectReason::AgeOutOfRange)?;

        let email = raw.email.as_deref().ok_or(RejectReason::MissingEmail)?;
        let email_provider = extract_email_provider(email).ok_or(RejectReason::InvalidEmail)?;

        // 2. Mask direct identifiers.
        let masked = mask_identity(raw);

        // 3. Deduplicate by identity key, first arrival wins.
        let admission = state.dedup.observe(raw.id);
        if !admission.retained {
            return Ok(None);
        }

        let id = match raw.id {
            Some(id) => id,
            None => state.next_synthetic_id(),
        };

        Ok(Some(CanonicalPersonRecord {
            id,
            age: age as u8,
            age_group,
            email_provider,
            country: raw.address.country.clone(),
            masked_name: masked.masked_name,
            masked_contact: masked.masked_contact,
            masked_city: masked.masked_city,
            masked_address: masked.masked_address,
            masked_zipcode: masked.masked_zipcode,
            location_masked: true,
        }))
    }

    /// Derives an integer age, preferring an explicit `age` field and
    /// falling back to the `YYYY-MM-DD` birth date.
    fn derive_age(&self, raw: &RawPersonRecord) -> Result<i64, RejectReason> {
        if let Some(age) = raw.age {
            return Ok(age);
        }

        let birthday = raw
            .birthday
            .as_deref()
            .ok_or(RejectReason::MalformedBirthDate)?;
        let birth_date = NaiveDate::parse_from_str(birthday, "%Y-%m-%d")
            .map_err(|_| RejectReason::MalformedBirthDate)?;

        let today = self.reference_date;
        let mut age = i64::from(today.year()) - i64::from(birth_date.year());
        if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
            age -= 1;
        }
        Ok(age)
    }
}
