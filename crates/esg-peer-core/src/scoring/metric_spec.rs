//! Data-driven metric configuration.
//!
//! Every scored metric is described by a [`MetricSpec`]; the pipeline picks
//! the estimator, direction and pillar from the table, so adding a metric is
//! a configuration change only.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::EsgPeerError;
use crate::types::{Pillar, Score};
use crate::EsgPeerResult;

pub const EMPLOYEES_COLUMN: &str = "Number of employees";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A recognised label on a tiered disclosure and the score it earns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisclosureTier {
    pub label: String,
    pub score: Score,
}

/// How a metric is turned into a 0-100 value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EstimatorKind {
    /// OLS of the metric on a covariate column, residual percentile.
    Regression {
        #[serde(default = "default_covariate")]
        covariate: String,
    },
    /// Beta moment-matching on a 0-100 percentage metric.
    Beta,
    /// "yes"/"no" disclosure, scored 100 or 0.
    BinaryDisclosure,
    /// Labelled disclosure with a fixed ordinal score table.
    TieredDisclosure {
        #[serde(default = "transition_plan_tiers")]
        tiers: Vec<DisclosureTier>,
    },
}

impl EstimatorKind {
    pub fn label(&self) -> &'static str {
        match self {
            EstimatorKind::Regression { .. } => "regression",
            EstimatorKind::Beta => "beta",
            EstimatorKind::BinaryDisclosure => "binary_disclosure",
            EstimatorKind::TieredDisclosure { .. } => "tiered_disclosure",
        }
    }

    pub fn is_disclosure(&self) -> bool {
        matches!(
            self,
            EstimatorKind::BinaryDisclosure | EstimatorKind::TieredDisclosure { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    /// Lower values are better; the percentile is inverted.
    #[serde(alias = "inverse")]
    LowerIsBetter,
    /// Already an absolute 0-100 score; used as-is.
    Absolute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Column name in the company record and value column in the benchmark.
    pub name: String,
    /// Name used to derive the benchmark file, when it differs from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_name: Option<String>,
    pub estimator: EstimatorKind,
    pub direction: Direction,
    pub pillar: Pillar,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl MetricSpec {
    pub fn lookup_name(&self) -> &str {
        self.benchmark_name.as_deref().unwrap_or(&self.name)
    }

    pub fn covariate(&self) -> Option<&str> {
        match &self.estimator {
            EstimatorKind::Regression { covariate } => Some(covariate.as_str()),
            _ => None,
        }
    }

    /// Orient a 0-100 value so that higher always means better.
    pub fn directional_value(&self, value: Score) -> Score {
        match self.direction {
            Direction::HigherIsBetter | Direction::Absolute => value,
            Direction::LowerIsBetter => 100.0 - value,
        }
    }
}

/// Maximum points each pillar can contribute to the composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PillarCaps {
    pub environmental: Score,
    pub social: Score,
    pub governance: Score,
}

impl PillarCaps {
    /// E 60 / S 30 / G 10.
    pub fn observed() -> Self {
        PillarCaps {
            environmental: 60.0,
            social: 30.0,
            governance: 10.0,
        }
    }

    pub fn get(&self, pillar: Pillar) -> Score {
        match pillar {
            Pillar::Environmental => self.environmental,
            Pillar::Social => self.social,
            Pillar::Governance => self.governance,
        }
    }

    pub fn total(&self) -> Score {
        self.environmental + self.social + self.governance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum WeightingScheme {
    #[default]
    Observed,
    /// CSRD-aligned: 100 points split across pillars in proportion to the
    /// metric weight configured in each.
    MetricProportional,
    Custom(PillarCaps),
}

impl WeightingScheme {
    pub fn caps(&self, metrics: &[MetricSpec]) -> PillarCaps {
        match self {
            WeightingScheme::Observed => PillarCaps::observed(),
            WeightingScheme::Custom(caps) => *caps,
            WeightingScheme::MetricProportional => {
                let total: f64 = metrics.iter().map(|m| m.weight).sum();
                if total <= 0.0 {
                    return PillarCaps {
                        environmental: 0.0,
                        social: 0.0,
                        governance: 0.0,
                    };
                }
                let share = |pillar: Pillar| {
                    metrics
                        .iter()
                        .filter(|m| m.pillar == pillar)
                        .map(|m| m.weight)
                        .sum::<f64>()
                        * 100.0
                        / total
                };
                PillarCaps {
                    environmental: share(Pillar::Environmental),
                    social: share(Pillar::Social),
                    governance: share(Pillar::Governance),
                }
            }
        }
    }
}

/// What a metric without a usable value contributes to its pillar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingMetricPolicy {
    /// Counts as 0 but stays in the pillar denominator.
    #[default]
    ZeroContribution,
    /// Dropped from numerator and denominator; the pillar renormalises.
    ExcludeFromDenominator,
}

/// Everything the pipeline needs besides the company and the benchmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_metric_specs")]
    pub metrics: Vec<MetricSpec>,
    #[serde(default)]
    pub weighting: WeightingScheme,
    #[serde(default)]
    pub missing_policy: MissingMetricPolicy,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            metrics: default_metric_specs(),
            weighting: WeightingScheme::default(),
            missing_policy: MissingMetricPolicy::default(),
        }
    }
}

impl ScoringConfig {
    pub fn caps(&self) -> PillarCaps {
        self.weighting.caps(&self.metrics)
    }

    pub fn validate(&self) -> EsgPeerResult<()> {
        if self.metrics.is_empty() {
            return Err(EsgPeerError::InvalidInput {
                field: "metrics".into(),
                reason: "At least one metric must be configured.".into(),
            });
        }

        let mut seen = HashSet::new();
        for metric in &self.metrics {
            if metric.name.trim().is_empty() {
                return Err(EsgPeerError::InvalidInput {
                    field: "metrics.name".into(),
                    reason: "Metric names must not be empty.".into(),
                });
            }
            if !seen.insert(metric.name.as_str()) {
                return Err(EsgPeerError::InvalidInput {
                    field: "metrics.name".into(),
                    reason: format!("Duplicate metric '{}'.", metric.name),
                });
            }
            if !metric.weight.is_finite() || metric.weight <= 0.0 {
                return Err(EsgPeerError::InvalidInput {
                    field: format!("metrics.{}.weight", metric.name),
                    reason: "Weight must be a positive finite number.".into(),
                });
            }
            if let EstimatorKind::TieredDisclosure { tiers } = &metric.estimator {
                if tiers
                    .iter()
                    .any(|t| !(0.0..=100.0).contains(&t.score) || t.label.trim().is_empty())
                {
                    return Err(EsgPeerError::InvalidInput {
                        field: format!("metrics.{}.tiers", metric.name),
                        reason: "Tier labels must be non-empty with scores in 0-100.".into(),
                    });
                }
            }
        }

        if let WeightingScheme::Custom(caps) = self.weighting {
            if caps.environmental < 0.0 || caps.social < 0.0 || caps.governance < 0.0 {
                return Err(EsgPeerError::InvalidInput {
                    field: "weighting".into(),
                    reason: "Pillar caps must be non-negative.".into(),
                });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_covariate() -> String {
    EMPLOYEES_COLUMN.to_string()
}

fn default_weight() -> f64 {
    1.0
}

/// Transition-plan commitments and their scores.
pub fn transition_plan_tiers() -> Vec<DisclosureTier> {
    [
        ("SBTi 2030", 100.0),
        ("Net Zero 2030", 100.0),
        ("SBTi 2040", 80.0),
        ("Net Zero 2040", 80.0),
        ("SBTi 2050", 60.0),
        ("Net Zero 2050", 60.0),
        ("Carbon Neutral", 40.0),
    ]
    .into_iter()
    .map(|(label, score)| DisclosureTier {
        label: label.to_string(),
        score,
    })
    .collect()
}

fn spec(
    name: &str,
    benchmark_name: Option<&str>,
    estimator: EstimatorKind,
    direction: Direction,
    pillar: Pillar,
) -> MetricSpec {
    MetricSpec {
        name: name.to_string(),
        benchmark_name: benchmark_name.map(str::to_string),
        estimator,
        direction,
        pillar,
        weight: 1.0,
    }
}

/// The standard peer-score metric table.
pub fn default_metric_specs() -> Vec<MetricSpec> {
    let regression = || EstimatorKind::Regression {
        covariate: default_covariate(),
    };
    vec![
        spec(
            "GHG Emissions (tCO₂e)",
            Some("GHG Emissions"),
            regression(),
            Direction::LowerIsBetter,
            Pillar::Environmental,
        ),
        spec(
            "Water usage (m³)",
            Some("Water usage"),
            regression(),
            Direction::LowerIsBetter,
            Pillar::Environmental,
        ),
        spec(
            "Renewable Energy %",
            None,
            EstimatorKind::Beta,
            Direction::HigherIsBetter,
            Pillar::Environmental,
        ),
        spec(
            "Waste Recycled %",
            None,
            EstimatorKind::Beta,
            Direction::HigherIsBetter,
            Pillar::Environmental,
        ),
        spec(
            "Biodiversity Risk %",
            None,
            EstimatorKind::Beta,
            Direction::LowerIsBetter,
            Pillar::Environmental,
        ),
        spec(
            "Transition Plan",
            None,
            EstimatorKind::TieredDisclosure {
                tiers: transition_plan_tiers(),
            },
            Direction::Absolute,
            Pillar::Environmental,
        ),
        spec(
            "Gender Pay Gap %",
            None,
            EstimatorKind::Beta,
            Direction::LowerIsBetter,
            Pillar::Social,
        ),
        spec(
            "Board Diversity %",
            None,
            EstimatorKind::Beta,
            Direction::HigherIsBetter,
            Pillar::Social,
        ),
        spec(
            "ESG KPI's in Exec Pay",
            None,
            EstimatorKind::BinaryDisclosure,
            Direction::Absolute,
            Pillar::Governance,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        let config = ScoringConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.metrics.len(), 9);
    }

    #[test]
    fn test_observed_caps_sum_to_100() {
        assert_eq!(PillarCaps::observed().total(), 100.0);
    }

    #[test]
    fn test_metric_proportional_caps() {
        let caps = WeightingScheme::MetricProportional.caps(&default_metric_specs());
        // 6 E, 2 S, 1 G of 9 metrics.
        assert!((caps.environmental - 600.0 / 9.0).abs() < 1e-9);
        assert!((caps.social - 200.0 / 9.0).abs() < 1e-9);
        assert!((caps.governance - 100.0 / 9.0).abs() < 1e-9);
        assert!((caps.total() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_directional_value() {
        let specs = default_metric_specs();
        let ghg = &specs[0];
        let renewable = &specs[2];
        let transition = &specs[5];
        assert_eq!(ghg.directional_value(30.0), 70.0);
        assert_eq!(renewable.directional_value(30.0), 30.0);
        assert_eq!(transition.directional_value(80.0), 80.0);
    }

    #[test]
    fn test_lookup_name_falls_back_to_name() {
        let specs = default_metric_specs();
        assert_eq!(specs[0].lookup_name(), "GHG Emissions");
        assert_eq!(specs[2].lookup_name(), "Renewable Energy %");
        assert_eq!(specs[0].covariate(), Some(EMPLOYEES_COLUMN));
        assert_eq!(specs[2].covariate(), None);
    }

    #[test]
    fn test_duplicate_metric_rejected() {
        let mut config = ScoringConfig::default();
        let first = config.metrics[0].clone();
        config.metrics.push(first);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_weight_rejected() {
        let mut config = ScoringConfig::default();
        config.metrics[1].weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_custom_cap_rejected() {
        let config = ScoringConfig {
            weighting: WeightingScheme::Custom(PillarCaps {
                environmental: -1.0,
                social: 50.0,
                governance: 51.0,
            }),
            ..ScoringConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spec_deserialises_with_defaults() {
        let json = serde_json::json!({
            "name": "Scope 1",
            "estimator": { "type": "regression" },
            "direction": "inverse",
            "pillar": "E"
        });
        let spec: MetricSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.weight, 1.0);
        assert_eq!(spec.direction, Direction::LowerIsBetter);
        assert_eq!(spec.covariate(), Some(EMPLOYEES_COLUMN));
    }

    #[test]
    fn test_config_deserialises_from_empty_object() {
        let config: ScoringConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.metrics, default_metric_specs());
        assert_eq!(config.weighting, WeightingScheme::Observed);
        assert_eq!(config.missing_policy, MissingMetricPolicy::ZeroContribution);
    }
}
