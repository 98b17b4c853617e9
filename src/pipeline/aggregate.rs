use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::instrument;

use crate::constants::{DEFAULT_TOP_N, GERMANY, GMAIL_DOMAIN, MASK_PLACEHOLDER, ZIPCODE_MASK_SUFFIX};
use crate::domain::{
    CanonicalPersonRecord, CountryGmailRank, GermanyGmailShare, SeniorGmailAdoption,
};
use crate::pipeline::processing::bucketize::BracketScheme;

static AGE_GROUP_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[[0-9]+-[0-9]+\]$|^\[60\+\]$").unwrap());
static EMAIL_PROVIDER_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static DIGITS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());

/// Per-field quality of the analytic dimensions, computed over the canonical
/// set as part of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldQuality {
    pub field: &'static str,
    /// Fraction of records with a non-empty value.
    pub completeness: f64,
    /// Distinct values over non-empty values.
    pub uniqueness: f64,
    /// Fraction of records whose value matches the field's expected shape.
    pub format_validity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualitySummary {
    pub total_records: u64,
    pub fields: Vec<FieldQuality>,
    /// Fraction of records with every direct identifier masked.
    pub pii_masking: f64,
    /// Mean of all per-field scores and the masking score.
    pub overall_score: f64,
}

/// The full set of derived metrics for one canonical record set.
#[derive(Debug, Clone, Serialize)]
pub struct DemographicReport {
    pub top_gmail_countries: Vec<CountryGmailRank>,
    pub germany_gmail: GermanyGmailShare,
    pub senior_gmail: SeniorGmailAdoption,
    pub quality: DataQualitySummary,
}

/// Computes the reporting metrics from a canonical record set. Every
/// computation is a pure read-only scan; nothing here mutates the set.
pub struct Aggregator {
    scheme: BracketScheme,
    gmail_domain: String,
    top_n: u32,
}

impl Aggregator {
    pub fn new(scheme: BracketScheme) -> Self {
        Self {
            scheme,
            gmail_domain: GMAIL_DOMAIN.to_string(),
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_top_n(scheme: BracketScheme, top_n: u32) -> Self {
        Self {
            top_n,
            ..Self::new(scheme)
        }
    }

    /// Suffix match on the provider domain, case-insensitive.
    fn is_gmail(&self, provider: &str) -> bool {
        provider.to_lowercase().ends_with(&self.gmail_domain)
    }

    /// Countries ranked by Gmail user count, descending, dense-ranked: two
    /// countries with equal counts share a rank and both appear when that
    /// rank clears the top-N threshold. Ties in ordering break by ascending
    /// country name.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn top_gmail_countries(&self, records: &[CanonicalPersonRecord]) -> Vec<CountryGmailRank> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for record in records {
            if self.is_gmail(&record.email_provider) {
                *counts.entry(record.country.as_str()).or_insert(0) += 1;
            }
        }

        let mut grouped: Vec<(&str, u64)> = counts.into_iter().collect();
        grouped.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut ranked = Vec::new();
        let mut rank = 0u32;
        let mut previous_count = None;
        for (country, gmail_users) in grouped {
            if previous_count != Some(gmail_users) {
                rank += 1;
                previous_count = Some(gmail_users);
            }
            if rank > self.top_n {
                break;
            }
            ranked.push(CountryGmailRank {
                rank,
                country: country.to_string(),
                gmail_users,
            });
        }
        ranked
    }

    /// Percentage of all canonical records that are Gmail users in Germany.
    /// An empty set yields `None`, never a division fault.
    pub fn germany_gmail_share(&self, records: &[CanonicalPersonRecord]) -> GermanyGmailShare {
        let total_records = records.len() as u64;
        let gmail_users_germany = records
            .iter()
            .filter(|r| r.country == GERMANY && self.is_gmail(&r.email_provider))
            .count() as u64;

        GermanyGmailShare {
            gmail_users_germany,
            total_records,
            percentage: percentage_of(gmail_users_germany, total_records),
        }
    }

    /// Gmail adoption within the configured scheme's senior bracket.
    pub fn senior_gmail_adoption(&self, records: &[CanonicalPersonRecord]) -> SeniorGmailAdoption {
        let senior_bracket = self.scheme.senior_bracket();
        let seniors: Vec<&CanonicalPersonRecord> = records
            .iter()
            .filter(|r| r.age_group == senior_bracket)
            .collect();

        let total_seniors = seniors.len() as u64;
        let gmail_seniors = seniors
            .iter()
            .filter(|r| self.is_gmail(&r.email_provider))
            .count() as u64;

        SeniorGmailAdoption {
            total_seniors,
            gmail_seniors,
            percentage: percentage_of(gmail_seniors, total_seniors),
        }
    }

    /// Quality summary over the analytic dimensions: completeness,
    /// uniqueness, and format validity per field, plus a masking score and
    /// the overall mean of all of them.
    pub fn data_quality(&self, records: &[CanonicalPersonRecord]) -> DataQualitySummary {
        let total = records.len() as u64;
        let fields = vec![
            field_quality(
                "email_provider",
                records,
                |r| Some(r.email_provider.clone()),
                |v| EMAIL_PROVIDER_FORMAT.is_match(v),
            ),
            field_quality(
                "country",
                records,
                |r| Some(r.country.clone()),
                |v| !DIGITS_ONLY.is_match(v),
            ),
            field_quality(
                "age_group",
                records,
                |r| Some(r.age_group.label().to_string()),
                |v| AGE_GROUP_FORMAT.is_match(v),
            ),
        ];
        let pii_masking = masking_score(records);
        let score_sum: f64 = fields
            .iter()
            .map(|f| f.completeness + f.uniqueness + f.format_validity)
            .sum::<f64>()
            + pii_masking;
        let overall_score = score_sum / (3.0 * fields.len() as f64 + 1.0);

        DataQualitySummary {
            total_records: total,
            fields,
            pii_masking,
            overall_score,
        }
    }

    /// Computes the whole report in one pass over the set.
    pub fn report(&self, records: &[CanonicalPersonRecord]) -> DemographicReport {
        DemographicReport {
            top_gmail_countries: self.top_gmail_countries(records),
            germany_gmail: self.germany_gmail_share(records),
            senior_gmail: self.senior_gmail_adoption(records),
            quality: self.data_quality(records),
        }
    }
}

fn field_quality(
    field: &'static str,
    records: &[CanonicalPersonRecord],
    value: impl Fn(&CanonicalPersonRecord) -> Option<String>,
    valid: impl Fn(&str) -> bool,
) -> FieldQuality {
    let total = records.len() as f64;
    let values: Vec<String> = records
        .iter()
        .filter_map(&value)
        .filter(|v| !v.is_empty())
        .collect();
    let non_empty = values.len() as f64;
    let distinct = values.iter().collect::<HashSet<_>>().len() as f64;
    let well_formed = values.iter().filter(|v| valid(v)).count() as f64;

    FieldQuality {
        field,
        completeness: if total == 0.0 { 0.0 } else { non_empty / total },
        uniqueness: if non_empty == 0.0 {
            0.0
        } else {
            distinct / non_empty
        },
        format_validity: if total == 0.0 { 0.0 } else { well_formed / total },
    }
}

/// Fraction of records with every direct identifier replaced by the fixed
/// placeholder and the zipcode reduced to its masked form.
fn masking_score(records: &[CanonicalPersonRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let masked = records
        .iter()
        .filter(|r| {
            r.location_masked
                && r.masked_name == MASK_PLACEHOLDER
                && r.masked_contact == MASK_PLACEHOLDER
                && r.masked_city == MASK_PLACEHOLDER
                && r.masked_address == MASK_PLACEHOLDER
                && r.masked_zipcode.ends_with(ZIPCODE_MASK_SUFFIX)
        })
        .count() as f64;
    masked / records.len() as f64
}

/// `round(100 * numerator / denominator, 2)` with a zero-denominator guard.
/// Rounding is pinned to half-away-from-zero, which is what `f64::round`
/// implements.
fn percentage_of(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    Some(round2(100.0 * numerator as f64 / denominator as f64))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Distribution of canonical records per bracket, in scheme order. Used by
/// the report rendering to show the shape of the set.
pub fn bracket_distribution(
    scheme: BracketScheme,
    records: &[CanonicalPersonRecord],
) -> BTreeMap<&'static str, u64> {
    let mut counts: BTreeMap<&'static str, u64> = scheme
        .brackets()
        .iter()
        .map(|bracket| (bracket.label(), 0))
        .collect();
    for record in records {
        if let Some(count) = counts.get_mut(record.age_group.label()) {
            *count += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgeGroup;

    fn record(
        id: i64,
        age: u8,
        group: AgeGroup,
        provider: &str,
        country: &str,
    ) -> CanonicalPersonRecord {
        CanonicalPersonRecord {
            id,
            age,
            age_group: group,
            email_provider: provider.to_string(),
            country: country.to_string(),
            masked_name: "****".to_string(),
            masked_contact: "****".to_string(),
            masked_city: "****".to_string(),
            masked_address: "****".to_string(),
            masked_zipcode: "12***".to_string(),
            location_masked: true,
        }
    }

    fn gmail(id: i64, country: &str) -> CanonicalPersonRecord {
        record(id, 30, AgeGroup::Age21To30, "gmail.com", country)
    }

    #[test]
    fn equal_counts_share_a_dense_rank() {
        // Germany and France both at 5, Spain at 2, Italy at 1.
        let mut records = Vec::new();
        let mut id = 0;
        for _ in 0..5 {
            id += 1;
            records.push(gmail(id, "Germany"));
            records.push(gmail(id + 100, "France"));
        }
        records.push(gmail(201, "Spain"));
        records.push(gmail(202, "Spain"));
        records.push(gmail(203, "Italy"));

        let aggregator = Aggregator::new(BracketScheme::FixedSix);
        let ranked = aggregator.top_gmail_countries(&records);

        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].country, "France");
        assert_eq!(ranked[1].rank, 1);
        assert_eq!(ranked[1].country, "Germany");
        assert_eq!(ranked[2].rank, 2);
        assert_eq!(ranked[2].country, "Spain");
        assert_eq!(ranked[3].rank, 3);
        assert_eq!(ranked[3].country, "Italy");
    }

    #[test]
    fn rank_threshold_cuts_after_top_n_dense_ranks() {
        let mut records = vec![
            gmail(1, "A"),
            gmail(2, "A"),
            gmail(3, "A"),
            gmail(4, "B"),
            gmail(5, "B"),
            gmail(6, "C"),
            gmail(7, "D"),
        ];
        records.push(record(8, 30, AgeGroup::Age21To30, "yahoo.com", "E"));

        let aggregator = Aggregator::with_top_n(BracketScheme::FixedSix, 2);
        let ranked = aggregator.top_gmail_countries(&records);

        // C and D tie at rank 3, past the threshold; E has no Gmail users.
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].country, "A");
        assert_eq!(ranked[1].country, "B");
    }

    #[test]
    fn gmail_match_is_case_insensitive_suffix() {
        let records = vec![
            record(1, 30, AgeGroup::Age21To30, "GMAIL.COM", "Germany"),
            record(2, 30, AgeGroup::Age21To30, "mail.gmail.com", "Germany"),
            record(3, 30, AgeGroup::Age21To30, "yahoo.com", "Germany"),
        ];

        let aggregator = Aggregator::new(BracketScheme::FixedSix);
        let ranked = aggregator.top_gmail_countries(&records);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].gmail_users, 2);
    }

    #[test]
    fn germany_share_counts_against_all_records() {
        let records = vec![
            gmail(1, "Germany"),
            record(2, 65, AgeGroup::Age61To80, "yahoo.com", "US"),
        ];

        let aggregator = Aggregator::new(BracketScheme::FixedSix);
        let share = aggregator.germany_gmail_share(&records);
        assert_eq!(share.gmail_users_germany, 1);
        assert_eq!(share.total_records, 2);
        assert_eq!(share.percentage, Some(50.0));
    }

    #[test]
    fn empty_set_yields_undefined_percentages() {
        let aggregator = Aggregator::new(BracketScheme::FixedSix);

        let share = aggregator.germany_gmail_share(&[]);
        assert_eq!(share.percentage, None);

        let seniors = aggregator.senior_gmail_adoption(&[]);
        assert_eq!(seniors.total_seniors, 0);
        assert_eq!(seniors.percentage, None);

        assert!(aggregator.top_gmail_countries(&[]).is_empty());
    }

    #[test]
    fn senior_adoption_respects_the_configured_scheme() {
        let records = vec![
            record(1, 65, AgeGroup::Age61To80, "gmail.com", "Germany"),
            record(2, 70, AgeGroup::Age61To80, "yahoo.com", "US"),
            record(3, 30, AgeGroup::Age21To30, "gmail.com", "France"),
        ];

        let aggregator = Aggregator::new(BracketScheme::FixedSix);
        let seniors = aggregator.senior_gmail_adoption(&records);
        assert_eq!(seniors.total_seniors, 2);
        assert_eq!(seniors.gmail_seniors, 1);
        assert_eq!(seniors.percentage, Some(50.0));
    }

    #[test]
    fn percentages_round_half_away_from_zero() {
        // 1 of 3 → 33.333... → 33.33; 2 of 3 → 66.666... → 66.67
        assert_eq!(percentage_of(1, 3), Some(33.33));
        assert_eq!(percentage_of(2, 3), Some(66.67));
        assert_eq!(round2(12.125), 12.13);
        assert_eq!(round2(-12.125), -12.13);
    }

    #[test]
    fn quality_summary_reports_completeness_and_uniqueness() {
        let records = vec![gmail(1, "Germany"), gmail(2, "Germany"), gmail(3, "France")];

        let aggregator = Aggregator::new(BracketScheme::FixedSix);
        let quality = aggregator.data_quality(&records);
        assert_eq!(quality.total_records, 3);

        let country = quality
            .fields
            .iter()
            .find(|f| f.field == "country")
            .unwrap();
        assert_eq!(country.completeness, 1.0);
        assert!((country.uniqueness - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(country.format_validity, 1.0);
    }

    #[test]
    fn format_validity_flags_malformed_analytic_values() {
        let records = vec![
            record(1, 30, AgeGroup::Age21To30, "gmail.com", "Germany"),
            // Provider without a TLD, country that is all digits.
            record(2, 30, AgeGroup::Age21To30, "not-a-domain", "12345"),
        ];

        let aggregator = Aggregator::new(BracketScheme::FixedSix);
        let quality = aggregator.data_quality(&records);

        let by_field = |name: &str| {
            quality
                .fields
                .iter()
                .find(|f| f.field == name)
                .unwrap()
        };
        assert_eq!(by_field("email_provider").format_validity, 0.5);
        assert_eq!(by_field("country").format_validity, 0.5);
        // Bracket labels always come from the enum, so they stay well formed.
        assert_eq!(by_field("age_group").format_validity, 1.0);
    }

    #[test]
    fn masking_score_drops_when_an_identifier_leaks() {
        let mut leaked = gmail(2, "France");
        leaked.masked_city = "Paris".to_string();
        let records = vec![gmail(1, "Germany"), leaked];

        let aggregator = Aggregator::new(BracketScheme::FixedSix);
        let quality = aggregator.data_quality(&records);
        assert_eq!(quality.pii_masking, 0.5);
        assert!(quality.overall_score < 1.0);
    }

    #[test]
    fn overall_score_averages_all_quality_dimensions() {
        // Two fully masked, well-formed records sharing a provider: all
        // scores are 1.0 except uniqueness for email_provider (0.5) and
        // age_group (0.5).
        let records = vec![gmail(1, "Germany"), gmail(2, "France")];

        let aggregator = Aggregator::new(BracketScheme::FixedSix);
        let quality = aggregator.data_quality(&records);
        assert_eq!(quality.pii_masking, 1.0);
        assert!((quality.overall_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn empty_set_quality_scores_are_zero() {
        let aggregator = Aggregator::new(BracketScheme::FixedSix);
        let quality = aggregator.data_quality(&[]);
        assert_eq!(quality.pii_masking, 0.0);
        assert_eq!(quality.overall_score, 0.0);
    }

    #[test]
    fn bracket_distribution_covers_all_brackets() {
        let records = vec![
            record(1, 65, AgeGroup::Age61To80, "gmail.com", "Germany"),
            gmail(2, "France"),
        ];
        let counts = bracket_distribution(BracketScheme::FixedSix, &records);
        assert_eq!(counts.len(), 6);
        assert_eq!(counts["[61-80]"], 1);
        assert_eq!(counts["[21-30]"], 1);
        assert_eq!(counts["[18-20]"], 0);
    }
}
