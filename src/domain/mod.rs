use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Postal address portion of a raw feed record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAddress {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub zipcode: String,
}

/// One row as received from the persons feed. Identity key (`id`) is not
/// guaranteed unique within a batch; duplicates are resolved downstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPersonRecord {
    /// Identity key. Absent or malformed keys never merge with other records.
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub gender: String,
    /// Birth date in `YYYY-MM-DD` form. Used when `age` is absent.
    #[serde(default)]
    pub birthday: Option<String>,
    /// Explicit age. Takes precedence over `birthday` when both are set.
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub address: RawAddress,
}

/// The feed does not guarantee the identity key's type. A key that is not
/// an integer is read as absent rather than failing the whole batch, so the
/// record is admitted as unique downstream.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_i64())
}

/// Fixed categorical age brackets. The first six variants belong to the
/// six-bracket scheme; the remaining six to the decade scheme with a
/// top-coded `[60+]` bracket. A pipeline instance only ever produces
/// brackets from the one scheme it was configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "[18-20]")]
    Age18To20,
    #[serde(rename = "[21-30]")]
    Age21To30,
    #[serde(rename = "[31-40]")]
    Age31To40,
    #[serde(rename = "[41-50]")]
    Age41To50,
    #[serde(rename = "[51-60]")]
    Age51To60,
    #[serde(rename = "[61-80]")]
    Age61To80,
    #[serde(rename = "[10-19]")]
    Age10To19,
    #[serde(rename = "[20-29]")]
    Age20To29,
    #[serde(rename = "[30-39]")]
    Age30To39,
    #[serde(rename = "[40-49]")]
    Age40To49,
    #[serde(rename = "[50-59]")]
    Age50To59,
    #[serde(rename = "[60+]")]
    Age60Plus,
}

impl AgeGroup {
    /// Bracket label as stored and reported.
    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Age18To20 => "[18-20]",
            AgeGroup::Age21To30 => "[21-30]",
            AgeGroup::Age31To40 => "[31-40]",
            AgeGroup::Age41To50 => "[41-50]",
            AgeGroup::Age51To60 => "[51-60]",
            AgeGroup::Age61To80 => "[61-80]",
            AgeGroup::Age10To19 => "[10-19]",
            AgeGroup::Age20To29 => "[20-29]",
            AgeGroup::Age30To39 => "[30-39]",
            AgeGroup::Age40To49 => "[40-49]",
            AgeGroup::Age50To59 => "[50-59]",
            AgeGroup::Age60Plus => "[60+]",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row per unique identity after transformation. Immutable once created;
/// matches the fixed schema expected by the storage boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPersonRecord {
    /// Unique within the output set.
    pub id: i64,
    /// Constrained to `[18, 80]`.
    pub age: u8,
    pub age_group: AgeGroup,
    /// Domain portion of the raw email, lower-cased. Never empty.
    pub email_provider: String,
    /// Preserved verbatim as an analytic dimension.
    pub country: String,
    pub masked_name: String,
    pub masked_contact: String,
    pub masked_city: String,
    pub masked_address: String,
    /// Retains the first two raw characters, then a fixed mask suffix.
    pub masked_zipcode: String,
    /// Always true for output of this pipeline.
    pub location_masked: bool,
}

/// One ranked row of the top-Gmail-countries metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryGmailRank {
    /// Dense rank: equal counts share a rank, the next distinct count gets
    /// the previous rank + 1.
    pub rank: u32,
    pub country: String,
    pub gmail_users: u64,
}

/// Share of records that are Gmail users located in Germany.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GermanyGmailShare {
    pub gmail_users_germany: u64,
    pub total_records: u64,
    /// None when the canonical set is empty.
    pub percentage: Option<f64>,
}

/// Gmail adoption within the senior bracket of the configured scheme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeniorGmailAdoption {
    pub total_seniors: u64,
    pub gmail_seniors: u64,
    /// None when the senior bracket is empty.
    pub percentage: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_identity_key_is_kept() {
        let raw: RawPersonRecord = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(raw.id, Some(7));
    }

    #[test]
    fn wrong_typed_identity_key_reads_as_absent() {
        // A stray string id must not abort the batch parse.
        let raw: RawPersonRecord =
            serde_json::from_str(r#"{"id": "abc", "firstname": "Ada"}"#).unwrap();
        assert_eq!(raw.id, None);
        assert_eq!(raw.firstname, "Ada");
    }

    #[test]
    fn null_and_fractional_identity_keys_read_as_absent() {
        let null_id: RawPersonRecord = serde_json::from_str(r#"{"id": null}"#).unwrap();
        assert_eq!(null_id.id, None);

        let fractional: RawPersonRecord = serde_json::from_str(r#"{"id": 7.5}"#).unwrap();
        assert_eq!(fractional.id, None);
    }
}
