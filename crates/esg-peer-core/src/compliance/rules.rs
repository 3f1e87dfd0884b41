//! Regulatory rule checks on a single fund/product disclosure row.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use std::time::Instant;

use crate::types::{with_metadata, ComputationOutput};
use crate::EsgPeerResult;

/// One disclosure row: column name → reported value.
pub type ComplianceRow = BTreeMap<String, Value>;

pub const PRODUCT_TYPE_FIELD: &str = "Product_Type";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// When a rule applies to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "when", content = "values", rename_all = "snake_case")]
pub enum RuleCondition {
    Always,
    ProductTypeIn(&'static [&'static str]),
}

/// What the reported value must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "check", content = "expected", rename_all = "snake_case")]
pub enum RuleCheck {
    /// Present, not an empty string and not zero.
    Disclosed,
    Equals(&'static str),
    /// A string ending in `%`.
    PercentString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComplianceRule {
    pub field: &'static str,
    pub condition: RuleCondition,
    pub check: RuleCheck,
    pub message: &'static str,
    pub regulation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub field: String,
    /// Reported value; `null` when the column is absent.
    pub value: Value,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regulation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceCheckInput {
    pub rows: Vec<ComplianceRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowCompliance {
    /// 1-based position in the input.
    pub row: usize,
    pub results: Vec<RuleResult>,
    pub passed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceCheckOutput {
    pub rows: Vec<RowCompliance>,
    pub total_failed: usize,
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

const SFDR_ARTICLE_8_9: &[&str] = &["Article 8", "Article 9"];

const COMPLIANCE_RULES: [ComplianceRule; 4] = [
    ComplianceRule {
        field: "GHG_Emissions_Scope_3",
        condition: RuleCondition::ProductTypeIn(SFDR_ARTICLE_8_9),
        check: RuleCheck::Disclosed,
        message: "Scope 3 must be disclosed for Article 8/9 products.",
        regulation: "ESRS E1 §47",
    },
    ComplianceRule {
        field: "Principal_Adverse_Impacts_Disclosed",
        condition: RuleCondition::ProductTypeIn(SFDR_ARTICLE_8_9),
        check: RuleCheck::Equals("Yes"),
        message: "PAI must be disclosed for Article 8/9 products.",
        regulation: "SFDR Art. 4",
    },
    ComplianceRule {
        field: "Board_Climate_Oversight",
        condition: RuleCondition::Always,
        check: RuleCheck::Equals("Yes"),
        message: "Board oversight of climate issues is required.",
        regulation: "IFRS S2 – Governance",
    },
    ComplianceRule {
        field: "Green_Taxonomy_Alignment (%)",
        condition: RuleCondition::Always,
        check: RuleCheck::PercentString,
        message: "Green alignment must be reported as a percentage.",
        regulation: "EU Taxonomy Art. 8",
    },
];

pub fn compliance_rules() -> &'static [ComplianceRule] {
    &COMPLIANCE_RULES
}

impl RuleCondition {
    pub fn applies(&self, row: &ComplianceRow) -> bool {
        match self {
            RuleCondition::Always => true,
            RuleCondition::ProductTypeIn(types) => row
                .get(PRODUCT_TYPE_FIELD)
                .and_then(Value::as_str)
                .is_some_and(|t| types.contains(&t)),
        }
    }
}

impl RuleCheck {
    pub fn passes(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (_, None) | (_, Some(Value::Null)) => false,
            (RuleCheck::Disclosed, Some(Value::String(s))) => !s.is_empty(),
            (RuleCheck::Disclosed, Some(Value::Number(n))) => n.as_f64() != Some(0.0),
            (RuleCheck::Disclosed, Some(Value::Bool(b))) => *b,
            (RuleCheck::Disclosed, Some(_)) => true,
            (RuleCheck::Equals(expected), Some(Value::String(s))) => s == expected,
            (RuleCheck::PercentString, Some(Value::String(s))) => s.ends_with('%'),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Evaluate every applicable rule against one row, in table order.
pub fn check_compliance(row: &ComplianceRow) -> Vec<RuleResult> {
    compliance_rules()
        .iter()
        .filter(|rule| rule.condition.applies(row))
        .map(|rule| {
            let value = row.get(rule.field);
            let passed = rule.check.passes(value);
            RuleResult {
                field: rule.field.to_string(),
                value: value.cloned().unwrap_or(Value::Null),
                passed,
                message: (!passed).then(|| rule.message.to_string()),
                regulation: (!passed).then(|| rule.regulation.to_string()),
            }
        })
        .collect()
}

pub fn check_compliance_rows(
    input: &ComplianceCheckInput,
) -> EsgPeerResult<ComputationOutput<ComplianceCheckOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let rows: Vec<RowCompliance> = input
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            if !row.contains_key(PRODUCT_TYPE_FIELD) {
                warnings.push(format!(
                    "Row {}: no {PRODUCT_TYPE_FIELD}; Article 8/9 rules not applied",
                    i + 1
                ));
            }
            let results = check_compliance(row);
            let passed = results.iter().filter(|r| r.passed).count();
            RowCompliance {
                row: i + 1,
                failed: results.len() - passed,
                passed,
                results,
            }
        })
        .collect();
    let total_failed = rows.iter().map(|r| r.failed).sum();

    Ok(with_metadata(
        "SFDR / ESRS / IFRS S2 / EU Taxonomy rule checks",
        &serde_json::json!({ "rules": compliance_rules() }),
        warnings,
        start.elapsed().as_micros() as u64,
        ComplianceCheckOutput { rows, total_failed },
    ))
}

/// Read disclosure rows from CSV. Numeric cells become numbers and empty
/// cells become `null`; everything else stays a string.
pub fn read_compliance_rows<R: Read>(reader: R) -> EsgPeerResult<Vec<ComplianceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, cell)| (h.to_string(), cell_value(cell)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn cell_value(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match cell.parse::<f64>() {
        Ok(n) if n.is_finite() => serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(cell.to_string())),
        _ => Value::String(cell.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
