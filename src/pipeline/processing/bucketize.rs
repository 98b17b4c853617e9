use serde::{Deserialize, Serialize};

use crate::constants::{MAX_AGE, MIN_AGE};
use crate::domain::AgeGroup;

/// Which age-bucketing scheme a pipeline instance uses. The repository
/// history carries two schemes; a single run picks exactly one and never
/// mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketScheme {
    /// Six brackets with non-uniform edges: `[18-20]` spans 3 years, the
    /// middle brackets span 10 ending on multiples of 10, `[61-80]` spans 20.
    FixedSix,
    /// Decade brackets with a top-coded `[60+]` bracket.
    DecadeTopCoded,
}

impl Default for BracketScheme {
    fn default() -> Self {
        BracketScheme::FixedSix
    }
}

impl BracketScheme {
    /// Maps an age to exactly one bracket of this scheme, or `None` for ages
    /// outside `[18, 80]`. Boundaries are inclusive on both ends. Pure.
    pub fn bucketize(&self, age: i64) -> Option<AgeGroup> {
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return None;
        }
        let group = match self {
            BracketScheme::FixedSix => match age {
                18..=20 => AgeGroup::Age18To20,
                21..=30 => AgeGroup::Age21To30,
                31..=40 => AgeGroup::Age31To40,
                41..=50 => AgeGroup::Age41To50,
                51..=60 => AgeGroup::Age51To60,
                _ => AgeGroup::Age61To80,
            },
            BracketScheme::DecadeTopCoded => match age {
                18..=19 => AgeGroup::Age10To19,
                20..=29 => AgeGroup::Age20To29,
                30..=39 => AgeGroup::Age30To39,
                40..=49 => AgeGroup::Age40To49,
                50..=59 => AgeGroup::Age50To59,
                _ => AgeGroup::Age60Plus,
            },
        };
        Some(group)
    }

    /// The bracket the senior-adoption metric is restricted to.
    pub fn senior_bracket(&self) -> AgeGroup {
        match self {
            BracketScheme::FixedSix => AgeGroup::Age61To80,
            BracketScheme::DecadeTopCoded => AgeGroup::Age60Plus,
        }
    }

    /// All brackets this scheme can produce, in ascending age order.
    pub fn brackets(&self) -> &'static [AgeGroup] {
        match self {
            BracketScheme::FixedSix => &[
                AgeGroup::Age18To20,
                AgeGroup::Age21To30,
                AgeGroup::Age31To40,
                AgeGroup::Age41To50,
                AgeGroup::Age51To60,
                AgeGroup::Age61To80,
            ],
            BracketScheme::DecadeTopCoded => &[
                AgeGroup::Age10To19,
                AgeGroup::Age20To29,
                AgeGroup::Age30To39,
                AgeGroup::Age40To49,
                AgeGroup::Age50To59,
                AgeGroup::Age60Plus,
            ],
        }
    }
}
