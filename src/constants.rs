/// Default persons feed endpoint (fakerapi-compatible).
pub const DEFAULT_FEED_URL: &str = "https://fakerapi.it/api/v2/persons";

/// Inclusive age domain accepted by the pipeline. Records outside this
/// range are rejected, never retained with a null bracket.
pub const MIN_AGE: i64 = 18;
pub const MAX_AGE: i64 = 80;

/// Fixed placeholder written over direct identifiers.
pub const MASK_PLACEHOLDER: &str = "****";

/// Zipcodes keep this many leading characters, followed by the mask suffix.
pub const ZIPCODE_PREFIX_LEN: usize = 2;
pub const ZIPCODE_MASK_SUFFIX: &str = "***";

/// Provider domain used by the Gmail adoption metrics (suffix match).
pub const GMAIL_DOMAIN: &str = "gmail.com";

/// Country singled out by the share-of-total metric.
pub const GERMANY: &str = "Germany";

/// How many ranked countries the top-countries metric returns by default.
pub const DEFAULT_TOP_N: u32 = 3;
