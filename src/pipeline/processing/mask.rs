use crate::constants::{MASK_PLACEHOLDER, ZIPCODE_MASK_SUFFIX, ZIPCODE_PREFIX_LEN};
use crate::domain::RawPersonRecord;

/// Placeholder replacements for a record's direct identifiers. Country and
/// the derived email provider / age group are deliberately left untouched:
/// they are the analytic payload the pipeline exists to preserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedFields {
    pub masked_name: String,
    pub masked_contact: String,
    pub masked_city: String,
    pub masked_address: String,
    pub masked_zipcode: String,
}

/// Masks the identifying fields of a raw record with fixed placeholders.
pub fn mask_identity(raw: &RawPersonRecord) -> MaskedFields {
    MaskedFields {
        masked_name: MASK_PLACEHOLDER.to_string(),
        masked_contact: MASK_PLACEHOLDER.to_string(),
        masked_city: MASK_PLACEHOLDER.to_string(),
        masked_address: MASK_PLACEHOLDER.to_string(),
        masked_zipcode: mask_zipcode(&raw.address.zipcode),
    }
}

/// Partially masks a zipcode: the first two characters survive, the rest is
/// replaced with a fixed suffix. Shorter zipcodes keep whatever they have.
pub fn mask_zipcode(zipcode: &str) -> String {
    let prefix: String = zipcode.chars().take(ZIPCODE_PREFIX_LEN).collect();
    format!("{}{}", prefix, ZIPCODE_MASK_SUFFIX)
}

/// Extracts the provider domain from an email address: the substring after
/// the first `@`, lower-cased so provider comparisons are case-insensitive.
/// Returns `None` for addresses without an `@` or with an empty domain.
pub fn extract_email_provider(email: &str) -> Option<String> {
    let (_, domain) = email.split_once('@')?;
    if domain.is_empty() {
        return None;
    }
    Some(domain.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawAddress;

    fn raw_record() -> RawPersonRecord {
        RawPersonRecord {
            id: Some(1),
            firstname: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            email: Some("ada@gmail.com".to_string()),
            phone: "+49 30 1234567".to_string(),
            gender: "female".to_string(),
            birthday: Some("1990-06-15".to_string()),
            age: None,
            address: RawAddress {
                country: "Germany".to_string(),
                city: "Berlin".to_string(),
                street: "Unter den Linden 1".to_string(),
                zipcode: "10117".to_string(),
            },
        }
    }

    #[test]
    fn direct_identifiers_become_placeholders() {
        let raw = raw_record();
        let masked = mask_identity(&raw);

        assert_eq!(masked.masked_name, "****");
        assert_eq!(masked.masked_contact, "****");
        assert_eq!(masked.masked_city, "****");
        assert_eq!(masked.masked_address, "****");
        assert_ne!(masked.masked_name, raw.firstname);
        assert_ne!(masked.masked_contact, raw.phone);
        assert_ne!(masked.masked_city, raw.address.city);
        assert_ne!(masked.masked_address, raw.address.street);
    }

    #[test]
    fn zipcode_keeps_two_character_prefix() {
        assert_eq!(mask_zipcode("10117"), "10***");
        assert_eq!(mask_zipcode("98052"), "98***");
    }

    #[test]
    fn short_zipcode_keeps_what_it_has() {
        assert_eq!(mask_zipcode("7"), "7***");
        assert_eq!(mask_zipcode(""), "***");
    }

    #[test]
    fn provider_extraction_is_case_insensitive() {
        assert_eq!(
            extract_email_provider("X@GMAIL.com"),
            Some("gmail.com".to_string())
        );
        assert_eq!(
            extract_email_provider("x@gmail.com"),
            Some("gmail.com".to_string())
        );
    }

    #[test]
    fn provider_extraction_splits_on_first_at() {
        assert_eq!(
            extract_email_provider("weird@name@yahoo.com"),
            Some("name@yahoo.com".to_string())
        );
    }

    #[test]
    fn malformed_email_yields_no_provider() {
        assert_eq!(extract_email_provider("no-at-sign"), None);
        assert_eq!(extract_email_provider("trailing@"), None);
    }
}
