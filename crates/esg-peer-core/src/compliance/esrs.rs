//! ESRS disclosure checklist and the CSRD readiness summary built on it.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput};
use crate::EsgPeerResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "accepted", rename_all = "snake_case")]
pub enum EsrsExpectation {
    OneOf(&'static [&'static str]),
    /// Any number ≥ 0.
    NonNegative,
    /// A number in [0, 100].
    Percentage,
}

impl EsrsExpectation {
    pub fn is_met(&self, response: &str) -> bool {
        match self {
            EsrsExpectation::OneOf(accepted) => accepted.contains(&response),
            EsrsExpectation::NonNegative => {
                parse_decimal(response).is_some_and(|v| v >= Decimal::ZERO)
            }
            EsrsExpectation::Percentage => {
                parse_decimal(response).is_some_and(|v| v >= Decimal::ZERO && v <= dec!(100))
            }
        }
    }

    pub fn response_type(&self) -> &'static str {
        match self {
            EsrsExpectation::OneOf(accepted) if *accepted == YES => "Yes/No",
            EsrsExpectation::OneOf(_) => "Drop-down",
            _ => "Numeric",
        }
    }
}

impl fmt::Display for EsrsExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EsrsExpectation::OneOf(accepted) => write!(f, "{}", accepted.join(", ")),
            EsrsExpectation::NonNegative => write!(f, "numeric ≥ 0"),
            EsrsExpectation::Percentage => write!(f, "numeric 0–100"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EsrsRequirement {
    pub id: &'static str,
    /// Short description used in the narrative summary.
    pub label: &'static str,
    pub expectation: EsrsExpectation,
    pub note: &'static str,
}

/// One row of a disclosure questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureRow {
    #[serde(rename = "Disclosure ID", alias = "disclosure_id")]
    pub disclosure_id: String,
    #[serde(rename = "Section", alias = "section", default)]
    pub section: String,
    #[serde(rename = "Response Type", alias = "response", default)]
    pub response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    /// Disclosure id not in the checklist.
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsrsCheckResult {
    pub disclosure_id: String,
    pub section: String,
    pub response: String,
    pub status: ComplianceStatus,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsrsCheckInput {
    pub rows: Vec<DisclosureRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsrsCheckOutput {
    pub results: Vec<EsrsCheckResult>,
    pub compliant: usize,
    pub non_compliant: usize,
    pub not_applicable: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    Strong,
    Moderate,
    Poor,
}

impl ComplianceLevel {
    pub fn from_count(compliant: usize) -> Self {
        match compliant {
            c if c >= 9 => ComplianceLevel::Strong,
            c if c >= 6 => ComplianceLevel::Moderate,
            _ => ComplianceLevel::Poor,
        }
    }

    pub fn overall_status(&self) -> &'static str {
        match self {
            ComplianceLevel::Strong => "largely compliant",
            ComplianceLevel::Moderate => "partially compliant",
            ComplianceLevel::Poor => "non-compliant",
        }
    }
}

impl fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComplianceLevel::Strong => "strong",
            ComplianceLevel::Moderate => "moderate",
            ComplianceLevel::Poor => "poor",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonCompliantItem {
    pub disclosure_id: String,
    pub label: String,
    pub reported: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrdSummary {
    pub compliant_count: usize,
    pub total_checks: usize,
    pub non_compliant_count: usize,
    pub level: ComplianceLevel,
    pub overall_status: String,
    pub sections: Vec<String>,
    pub compliant_labels: Vec<String>,
    pub non_compliant: Vec<NonCompliantItem>,
    pub narrative: String,
}

// ---------------------------------------------------------------------------
// Checklist
// ---------------------------------------------------------------------------

const YES: &[&str] = &["Yes"];

const ESRS_REQUIREMENTS: [EsrsRequirement; 10] = [
    EsrsRequirement {
        id: "ESRS 2-GOV-1",
        label: "dedicated governance body",
        expectation: EsrsExpectation::OneOf(YES),
        note: "Must explicitly confirm a governing body with sustainability oversight.",
    },
    EsrsRequirement {
        id: "ESRS 2-GOV-2",
        label: "governance meeting frequency",
        expectation: EsrsExpectation::OneOf(&["Monthly", "Quarterly", "Annually"]),
        note: "Any frequency above “None” is acceptable.",
    },
    EsrsRequirement {
        id: "ESRS 2-SBM-3",
        label: "double materiality assessment",
        expectation: EsrsExpectation::OneOf(YES),
        note: "Required under ESRS 2 to identify IROs.",
    },
    EsrsRequirement {
        id: "ESRS 2-SBM-3a",
        label: "materiality update frequency",
        expectation: EsrsExpectation::OneOf(&["Annually", "Biennially"]),
        note: "“Not yet conducted” is non-compliant unless company is in transition period.",
    },
    EsrsRequirement {
        id: "ESRS E1-6",
        label: "Scope 1 emissions disclosure",
        expectation: EsrsExpectation::NonNegative,
        note: "Can be 0 only if explained as immaterial and justified elsewhere.",
    },
    EsrsRequirement {
        id: "ESRS E1-4",
        label: "climate target-setting",
        expectation: EsrsExpectation::OneOf(YES),
        note: "Required if climate is material; must be time-bound and specific.",
    },
    EsrsRequirement {
        id: "ESRS E2-3",
        label: "pollutant monitoring",
        expectation: EsrsExpectation::OneOf(YES),
        note: "Required if pollution is material; “No” is non-compliant unless well-justified.",
    },
    EsrsRequirement {
        id: "ESRS S1-6",
        label: "gender diversity disclosure",
        expectation: EsrsExpectation::Percentage,
        note: "Even low numbers are compliant if disclosed; must be numeric.",
    },
    EsrsRequirement {
        id: "ESRS G1-1",
        label: "anti-corruption policy",
        expectation: EsrsExpectation::OneOf(YES),
        note: "Mandatory under ESRS G1; “No” is always non-compliant.",
    },
    EsrsRequirement {
        id: "ESRS 2-IRO-1",
        label: "risk & opportunity disclosure",
        expectation: EsrsExpectation::OneOf(YES),
        note: "Required to identify sustainability risks, impacts, and opportunities.",
    },
];

pub fn esrs_requirements() -> &'static [EsrsRequirement] {
    &ESRS_REQUIREMENTS
}

pub fn find_requirement(disclosure_id: &str) -> Option<&'static EsrsRequirement> {
    esrs_requirements()
        .iter()
        .find(|r| r.id == disclosure_id.trim())
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn check_disclosure(row: &DisclosureRow) -> EsrsCheckResult {
    let response = row.response.trim();
    let (status, note) = match find_requirement(&row.disclosure_id) {
        Some(req) if req.expectation.is_met(response) => {
            (ComplianceStatus::Compliant, req.note.to_string())
        }
        Some(req) => (ComplianceStatus::NonCompliant, req.note.to_string()),
        None => (ComplianceStatus::NotApplicable, String::new()),
    };
    EsrsCheckResult {
        disclosure_id: row.disclosure_id.trim().to_string(),
        section: row.section.trim().to_string(),
        response: response.to_string(),
        status,
        note,
    }
}

pub fn check_esrs_disclosures(
    input: &EsrsCheckInput,
) -> EsgPeerResult<ComputationOutput<EsrsCheckOutput>> {
    let start = Instant::now();
    let results: Vec<EsrsCheckResult> = input.rows.iter().map(check_disclosure).collect();
    let count = |s: ComplianceStatus| results.iter().filter(|r| r.status == s).count();
    let compliant = count(ComplianceStatus::Compliant);
    let non_compliant = count(ComplianceStatus::NonCompliant);
    let not_applicable = count(ComplianceStatus::NotApplicable);

    let mut warnings = Vec::new();
    if not_applicable > 0 {
        warnings.push(format!(
            "{not_applicable} row(s) reference disclosures outside the ESRS checklist"
        ));
    }

    Ok(with_metadata(
        "ESRS disclosure checklist",
        &serde_json::json!({ "checklist": esrs_requirements() }),
        warnings,
        start.elapsed().as_micros() as u64,
        EsrsCheckOutput {
            results,
            compliant,
            non_compliant,
            not_applicable,
        },
    ))
}

fn display_reported(reported: &str) -> String {
    if reported.is_empty() || reported.eq_ignore_ascii_case("nan") {
        "missing data".to_string()
    } else {
        reported.to_string()
    }
}

/// Summarise checklist coverage for CSRD readiness.
pub fn summarize_csrd(rows: &[DisclosureRow]) -> CsrdSummary {
    let mut compliant_labels = Vec::new();
    let mut non_compliant = Vec::new();
    let mut sections = BTreeSet::new();

    for row in rows {
        let Some(req) = find_requirement(&row.disclosure_id) else {
            continue;
        };
        sections.insert(row.section.trim().to_string());
        let response = row.response.trim();
        if req.expectation.is_met(response) {
            compliant_labels.push(req.label.to_string());
        } else {
            non_compliant.push(NonCompliantItem {
                disclosure_id: req.id.to_string(),
                label: req.label.to_string(),
                reported: response.to_string(),
                expected: req.expectation.to_string(),
            });
        }
    }

    let compliant_count = compliant_labels.len();
    let level = ComplianceLevel::from_count(compliant_count);
    let sections: Vec<String> = sections.into_iter().collect();

    let mut summary = CsrdSummary {
        compliant_count,
        total_checks: ESRS_REQUIREMENTS.len(),
        non_compliant_count: non_compliant.len(),
        level,
        overall_status: level.overall_status().to_string(),
        sections,
        compliant_labels,
        non_compliant,
        narrative: String::new(),
    };
    summary.narrative = render_narrative(&summary);
    summary
}

fn render_narrative(s: &CsrdSummary) -> String {
    let areas = s
        .non_compliant
        .iter()
        .map(|i| format!("**{}**", i.label))
        .collect::<Vec<_>>()
        .join(", ");
    let reported: BTreeSet<String> = s
        .non_compliant
        .iter()
        .map(|i| display_reported(&i.reported))
        .collect();
    let expected: BTreeSet<&str> = s.non_compliant.iter().map(|i| i.expected.as_str()).collect();

    let mut lines = vec![
        format!(
            "Compliance Summary: The company demonstrates {} alignment with CSRD and ESRS requirements, \
             achieving {} out of {} compliant disclosures across the core areas of {}.",
            s.level,
            s.compliant_count,
            s.total_checks,
            s.sections.join(", ")
        ),
        format!(
            "Key strengths include {}, all of which meet disclosure expectations under ESRS.",
            s.compliant_labels.join(", ")
        ),
    ];
    if !s.non_compliant.is_empty() {
        lines.push(format!(
            "However, the company is non-compliant in {} disclosure(s), notably in {}.",
            s.non_compliant_count, areas
        ));
        lines.push(format!(
            "Reported values include: {}, where the expected values were {}.",
            reported.into_iter().collect::<Vec<_>>().join(", "),
            expected.into_iter().collect::<Vec<_>>().join(", ")
        ));
        lines.push(
            "To close these compliance gaps, the company should review and update missing \
             disclosures, and align with expected ESRS reporting standards."
                .to_string(),
        );
    }
    lines.push(format!(
        "Overall, the company is {} in terms of readiness for CSRD-aligned sustainability reporting.",
        s.overall_status
    ));
    lines.join("\n")
}

pub fn generate_csrd_summary(input: &EsrsCheckInput) -> EsgPeerResult<ComputationOutput<CsrdSummary>> {
    let start = Instant::now();
    let summary = summarize_csrd(&input.rows);
    let mut warnings = Vec::new();
    if summary.compliant_count + summary.non_compliant_count < summary.total_checks {
        warnings.push(format!(
            "Only {} of {} checklist disclosures were reported",
            summary.compliant_count + summary.non_compliant_count,
            summary.total_checks
        ));
    }
    Ok(with_metadata(
        "CSRD readiness summary over the ESRS checklist",
        &serde_json::json!({
            "strong_threshold": 9,
            "moderate_threshold": 6,
        }),
        warnings,
        start.elapsed().as_micros() as u64,
        summary,
    ))
}

/// Read questionnaire rows from CSV with `Disclosure ID`, `Section` and
/// `Response Type` columns.
pub fn read_disclosure_rows<R: Read>(reader: R) -> EsgPeerResult<Vec<DisclosureRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
