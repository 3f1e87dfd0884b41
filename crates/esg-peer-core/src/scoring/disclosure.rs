//! Peer disclosure rates for qualitative metrics.
//!
//! Binary fields ("ESG KPIs tied to executive pay") score 100 when the
//! company answers "yes"; tiered fields (transition plans) score through a
//! fixed label table. The peer disclosure rate is informational: the
//! company's own score does not depend on it.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::metric_spec::{transition_plan_tiers, DisclosureTier};
use crate::error::EsgPeerError;
use crate::types::{with_metadata, ComputationOutput, Score};
use crate::EsgPeerResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisclosureKind {
    Binary,
    Tiered {
        #[serde(default = "transition_plan_tiers")]
        tiers: Vec<DisclosureTier>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureResult {
    pub company_value: String,
    /// Binary: answered "yes". Tiered: a recognised label.
    pub company_compliant: bool,
    /// 0-100, carried into aggregation without a percentile transform.
    pub company_score: Score,
    /// Percentage of peers disclosing; `None` without peer data.
    pub peer_disclosure_rate: Option<f64>,
    pub peer_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisclosureRateInput {
    pub metric: String,
    pub kind: DisclosureKind,
    pub company_value: String,
    #[serde(default)]
    pub benchmark: Vec<String>,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

pub fn is_affirmative(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("yes")
}

/// Score of a tiered label; unrecognised labels score 0.
pub fn tier_score(value: &str, tiers: &[DisclosureTier]) -> Score {
    let value = value.trim();
    tiers
        .iter()
        .find(|t| t.label == value)
        .map(|t| t.score)
        .unwrap_or(0.0)
}

fn share(peers: &[String], pred: impl Fn(&str) -> bool) -> Option<f64> {
    if peers.is_empty() {
        return None;
    }
    let hits = peers.iter().filter(|p| pred(p.trim())).count();
    Some(hits as f64 / peers.len() as f64 * 100.0)
}

pub fn score_binary_disclosure(company_value: &str, peers: Option<&[String]>) -> DisclosureResult {
    let compliant = is_affirmative(company_value);
    DisclosureResult {
        company_value: company_value.trim().to_string(),
        company_compliant: compliant,
        company_score: if compliant { 100.0 } else { 0.0 },
        peer_disclosure_rate: peers.and_then(|p| share(p, is_affirmative)),
        peer_count: peers.map_or(0, <[String]>::len),
    }
}

pub fn score_tiered_disclosure(
    company_value: &str,
    tiers: &[DisclosureTier],
    peers: Option<&[String]>,
) -> DisclosureResult {
    let recognised = |v: &str| tiers.iter().any(|t| t.label == v.trim());
    DisclosureResult {
        company_value: company_value.trim().to_string(),
        company_compliant: recognised(company_value),
        company_score: tier_score(company_value, tiers),
        peer_disclosure_rate: peers.and_then(|p| share(p, |v| tier_score(v, tiers) > 0.0)),
        peer_count: peers.map_or(0, <[String]>::len),
    }
}

pub fn score_disclosure(
    kind: &DisclosureKind,
    company_value: &str,
    peers: Option<&[String]>,
) -> DisclosureResult {
    match kind {
        DisclosureKind::Binary => score_binary_disclosure(company_value, peers),
        DisclosureKind::Tiered { tiers } => score_tiered_disclosure(company_value, tiers, peers),
    }
}

/// Disclosure rate with the standard output envelope.
pub fn calculate_disclosure_rate(
    input: &DisclosureRateInput,
) -> EsgPeerResult<ComputationOutput<DisclosureResult>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if input.metric.trim().is_empty() {
        return Err(EsgPeerError::InvalidInput {
            field: "metric".into(),
            reason: "Metric name must not be empty.".into(),
        });
    }

    let peers: Vec<String> = input
        .benchmark
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if peers.is_empty() {
        warnings.push(format!(
            "No peer values for '{}'; disclosure rate unavailable.",
            input.metric
        ));
    }

    let result = score_disclosure(&input.kind, &input.company_value, Some(peers.as_slice()));
    if !result.company_compliant {
        warnings.push(format!(
            "'{}' is below peer best practice for '{}'.",
            result.company_value, input.metric
        ));
    }

    let assumptions = serde_json::json!({
        "binary": "\"yes\" (case-insensitive) counts as disclosed",
        "tiered": "recognised labels count as disclosed; score from tier table",
    });

    Ok(with_metadata(
        "Peer disclosure rate",
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_binary_case_insensitive() {
        let peers = strings(&["Yes", "no", " YES ", "No"]);
        let r = score_binary_disclosure(" yes ", Some(peers.as_slice()));
        assert!(r.company_compliant);
        assert_eq!(r.company_score, 100.0);
        assert_eq!(r.peer_disclosure_rate, Some(50.0));
        assert_eq!(r.peer_count, 4);

        let r = score_binary_disclosure("No", Some(peers.as_slice()));
        assert!(!r.company_compliant);
        assert_eq!(r.company_score, 0.0);
    }

    #[test]
    fn test_tier_scores() {
        let tiers = transition_plan_tiers();
        assert_eq!(tier_score("SBTi 2030", &tiers), 100.0);
        assert_eq!(tier_score("Net Zero 2040", &tiers), 80.0);
        assert_eq!(tier_score(" SBTi 2050 ", &tiers), 60.0);
        assert_eq!(tier_score("Carbon Neutral", &tiers), 40.0);
        assert_eq!(tier_score("Planning", &tiers), 0.0);
    }

    #[test]
    fn test_tiered_peer_rate() {
        let tiers = transition_plan_tiers();
        let peers = strings(&["SBTi 2030", "None", "Carbon Neutral", "Net Zero 2050", "TBD"]);
        let r = score_tiered_disclosure("Net Zero 2040", &tiers, Some(peers.as_slice()));
        assert!(r.company_compliant);
        assert_eq!(r.company_score, 80.0);
        assert_eq!(r.peer_disclosure_rate, Some(60.0));
    }

    #[test]
    fn test_no_peers_still_scores_company() {
        let r = score_binary_disclosure("Yes", None);
        assert_eq!(r.company_score, 100.0);
        assert_eq!(r.peer_disclosure_rate, None);
        assert_eq!(r.peer_count, 0);
    }

    #[test]
    fn test_envelope_warns_on_non_compliance() {
        let out = calculate_disclosure_rate(&DisclosureRateInput {
            metric: "Transition Plan".into(),
            kind: DisclosureKind::Tiered {
                tiers: transition_plan_tiers(),
            },
            company_value: "Under review".into(),
            benchmark: strings(&["SBTi 2030", ""]),
        })
        .unwrap();
        assert_eq!(out.result.company_score, 0.0);
        assert_eq!(out.result.peer_disclosure_rate, Some(100.0));
        assert!(out.warnings.iter().any(|w| w.contains("below peer")));
    }

    #[test]
    fn test_input_deserialises_default_tiers() {
        let input: DisclosureRateInput = serde_json::from_value(serde_json::json!({
            "metric": "Transition Plan",
            "kind": { "type": "tiered" },
            "company_value": "SBTi 2030"
        }))
        .unwrap();
        let out = calculate_disclosure_rate(&input).unwrap();
        assert_eq!(out.result.company_score, 100.0);
        assert_eq!(out.result.peer_disclosure_rate, None);
    }
}
