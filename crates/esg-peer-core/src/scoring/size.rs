//! Company size tiers.
//!
//! Revenue and headcount thresholds are evaluated independently: a company
//! qualifies for a tier if *either* dimension crosses its threshold, and the
//! tiers are tested from largest to smallest so the highest match wins.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::error::EsgPeerError;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::EsgPeerResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeTier {
    #[serde(alias = "S")]
    Small,
    #[serde(alias = "LM")]
    LowerMid,
    #[serde(alias = "UM")]
    UpperMid,
    #[serde(alias = "L")]
    Large,
}

impl SizeTier {
    /// Short code used in benchmark storage paths.
    pub fn code(&self) -> &'static str {
        match self {
            SizeTier::Small => "S",
            SizeTier::LowerMid => "LM",
            SizeTier::UpperMid => "UM",
            SizeTier::Large => "L",
        }
    }

    pub fn from_code(code: &str) -> Option<SizeTier> {
        match code.trim() {
            "S" => Some(SizeTier::Small),
            "LM" => Some(SizeTier::LowerMid),
            "UM" => Some(SizeTier::UpperMid),
            "L" => Some(SizeTier::Large),
            _ => None,
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeClassificationInput {
    pub revenue: Money,
    pub employees: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeClassificationOutput {
    pub tier: SizeTier,
    pub tier_code: String,
    /// Which dimension put the company in its tier: "revenue", "employees",
    /// "both" or "none" for the Small fallback.
    pub deciding_dimension: String,
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

const LARGE_REVENUE: Decimal = dec!(1_000_000_000);
const UPPER_MID_REVENUE: Decimal = dec!(250_000_000);
const LOWER_MID_REVENUE: Decimal = dec!(50_000_000);

const LARGE_EMPLOYEES: u64 = 2500;
const UPPER_MID_EMPLOYEES: u64 = 500;
const LOWER_MID_EMPLOYEES: u64 = 100;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Map revenue and headcount onto a size tier. Total over its domain:
/// anything that matches no threshold is `Small`.
pub fn classify_company_size(revenue: Money, employees: u64) -> SizeTier {
    let (by_revenue, by_employees) = tier_matches(revenue, employees);
    by_revenue.max(by_employees)
}

/// Classify with the standard output envelope.
pub fn classify_size(
    input: &SizeClassificationInput,
) -> EsgPeerResult<ComputationOutput<SizeClassificationOutput>> {
    let start = Instant::now();
    if input.revenue < Decimal::ZERO {
        return Err(EsgPeerError::InvalidInput {
            field: "revenue".into(),
            reason: "Revenue must be non-negative.".into(),
        });
    }

    let tier = classify_company_size(input.revenue, input.employees);
    let (by_revenue, by_employees) = tier_matches(input.revenue, input.employees);
    let deciding_dimension = match (by_revenue == tier, by_employees == tier) {
        _ if tier == SizeTier::Small => "none",
        (true, true) => "both",
        (true, false) => "revenue",
        _ => "employees",
    };

    let output = SizeClassificationOutput {
        tier,
        tier_code: tier.code().to_string(),
        deciding_dimension: deciding_dimension.to_string(),
    };

    let assumptions = serde_json::json!({
        "large": "revenue >= 1bn or employees >= 2500",
        "upper_mid": "revenue >= 250m or employees >= 500",
        "lower_mid": "revenue >= 50m or employees >= 100",
        "rule": "either dimension qualifies; highest tier wins",
    });

    Ok(with_metadata(
        "Revenue / headcount size tiering",
        &assumptions,
        Vec::new(),
        start.elapsed().as_micros() as u64,
        output,
    ))
}

/// The tier each dimension qualifies for on its own.
fn tier_matches(revenue: Money, employees: u64) -> (SizeTier, SizeTier) {
    let by_revenue = if revenue >= LARGE_REVENUE {
        SizeTier::Large
    } else if revenue >= UPPER_MID_REVENUE {
        SizeTier::UpperMid
    } else if revenue >= LOWER_MID_REVENUE {
        SizeTier::LowerMid
    } else {
        SizeTier::Small
    };

    let by_employees = if employees >= LARGE_EMPLOYEES {
        SizeTier::Large
    } else if employees >= UPPER_MID_EMPLOYEES {
        SizeTier::UpperMid
    } else if employees >= LOWER_MID_EMPLOYEES {
        SizeTier::LowerMid
    } else {
        SizeTier::Small
    };

    (by_revenue, by_employees)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revenue_alone_makes_large() {
        assert_eq!(
            classify_company_size(dec!(2_000_000_000), 10),
            SizeTier::Large
        );
    }

    #[test]
    fn test_employees_alone_make_large() {
        assert_eq!(classify_company_size(dec!(1_000_000), 2500), SizeTier::Large);
    }

    #[test]
    fn test_lower_mid_by_revenue() {
        assert_eq!(
            classify_company_size(dec!(100_000_000), 50),
            SizeTier::LowerMid
        );
    }

    #[test]
    fn test_small_fallback() {
        assert_eq!(classify_company_size(dec!(1_000_000), 10), SizeTier::Small);
        assert_eq!(classify_company_size(Decimal::ZERO, 0), SizeTier::Small);
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(
            classify_company_size(dec!(999_999_999), 0),
            SizeTier::UpperMid
        );
        assert_eq!(classify_company_size(dec!(250_000_000), 0), SizeTier::UpperMid);
        assert_eq!(classify_company_size(dec!(249_999_999), 0), SizeTier::LowerMid);
        assert_eq!(classify_company_size(dec!(50_000_000), 0), SizeTier::LowerMid);
        assert_eq!(classify_company_size(dec!(49_999_999), 0), SizeTier::Small);
        assert_eq!(classify_company_size(Decimal::ZERO, 2499), SizeTier::UpperMid);
        assert_eq!(classify_company_size(Decimal::ZERO, 500), SizeTier::UpperMid);
        assert_eq!(classify_company_size(Decimal::ZERO, 499), SizeTier::LowerMid);
        assert_eq!(classify_company_size(Decimal::ZERO, 100), SizeTier::LowerMid);
        assert_eq!(classify_company_size(Decimal::ZERO, 99), SizeTier::Small);
    }

    #[test]
    fn test_higher_dimension_wins() {
        // Revenue says LowerMid, headcount says UpperMid.
        assert_eq!(
            classify_company_size(dec!(60_000_000), 800),
            SizeTier::UpperMid
        );
    }

    #[test]
    fn test_deterministic() {
        let a = classify_company_size(dec!(300_000_000), 120);
        let b = classify_company_size(dec!(300_000_000), 120);
        assert_eq!(a, b);
    }

    #[test]
    fn test_codes_roundtrip() {
        for tier in [
            SizeTier::Small,
            SizeTier::LowerMid,
            SizeTier::UpperMid,
            SizeTier::Large,
        ] {
            assert_eq!(SizeTier::from_code(tier.code()), Some(tier));
        }
        assert_eq!(SizeTier::from_code("XL"), None);
    }

    #[test]
    fn test_classify_size_envelope() {
        let out = classify_size(&SizeClassificationInput {
            revenue: dec!(300_000_000),
            employees: 50,
        })
        .unwrap();
        assert_eq!(out.result.tier, SizeTier::UpperMid);
        assert_eq!(out.result.tier_code, "UM");
        assert_eq!(out.result.deciding_dimension, "revenue");
    }

    #[test]
    fn test_classify_size_both_dimensions() {
        let out = classify_size(&SizeClassificationInput {
            revenue: dec!(5_000_000_000),
            employees: 10_000,
        })
        .unwrap();
        assert_eq!(out.result.deciding_dimension, "both");
    }

    #[test]
    fn test_classify_size_rejects_negative_revenue() {
        let err = classify_size(&SizeClassificationInput {
            revenue: dec!(-1),
            employees: 10,
        });
        assert!(err.is_err());
    }
}
