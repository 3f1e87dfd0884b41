//! Pillar and composite roll-up.
//!
//! ```text
//! pillar    = Σ wᵢ·vᵢ × cap / (Σ wᵢ × 100)
//! composite = E + S + G
//! ```
//!
//! where vᵢ is the metric's directional value (percentile, 100 − percentile
//! for inverse metrics, or an absolute disclosure score). With unit weights
//! this is `raw_sum × cap / (count × 100)`.

use serde::{Deserialize, Serialize};

use super::metric_spec::{MetricSpec, MissingMetricPolicy, PillarCaps};
use crate::types::{Pillar, Score};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricContribution {
    pub metric: String,
    pub pillar: Pillar,
    pub weight: f64,
    /// Directional 0-100 value, `None` when the metric was skipped.
    pub value: Option<Score>,
}

impl MetricContribution {
    /// Orient a raw percentile or score according to the spec.
    pub fn from_spec(spec: &MetricSpec, raw: Option<Score>) -> Self {
        MetricContribution {
            metric: spec.name.clone(),
            pillar: spec.pillar,
            weight: spec.weight,
            value: raw.map(|v| spec.directional_value(v)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarScore {
    pub pillar: Pillar,
    pub score: Score,
    pub cap: Score,
    /// Σ wᵢ·vᵢ over metrics that count towards the pillar.
    pub raw_sum: f64,
    /// Σ wᵢ in the denominator.
    pub weight_total: f64,
    pub scored_metrics: usize,
    pub missing_metrics: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateScore {
    pub environmental: PillarScore,
    pub social: PillarScore,
    pub governance: PillarScore,
    pub composite: Score,
    pub max_composite: Score,
}

impl AggregateScore {
    pub fn pillar(&self, pillar: Pillar) -> &PillarScore {
        match pillar {
            Pillar::Environmental => &self.environmental,
            Pillar::Social => &self.social,
            Pillar::Governance => &self.governance,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

pub fn score_pillar(
    pillar: Pillar,
    contributions: &[MetricContribution],
    cap: Score,
    policy: MissingMetricPolicy,
) -> PillarScore {
    let mut raw_sum = 0.0;
    let mut weight_total = 0.0;
    let mut scored_metrics = 0;
    let mut missing_metrics = 0;

    for c in contributions.iter().filter(|c| c.pillar == pillar) {
        match c.value {
            Some(v) => {
                raw_sum += c.weight * v;
                weight_total += c.weight;
                scored_metrics += 1;
            }
            None => {
                missing_metrics += 1;
                if policy == MissingMetricPolicy::ZeroContribution {
                    weight_total += c.weight;
                }
            }
        }
    }

    let score = if weight_total > 0.0 {
        (raw_sum * cap / (weight_total * 100.0)).clamp(0.0, cap.max(0.0))
    } else {
        0.0
    };

    PillarScore {
        pillar,
        score,
        cap,
        raw_sum,
        weight_total,
        scored_metrics,
        missing_metrics,
    }
}

pub fn aggregate_scores(
    contributions: &[MetricContribution],
    caps: &PillarCaps,
    policy: MissingMetricPolicy,
) -> AggregateScore {
    let pillar = |p: Pillar| score_pillar(p, contributions, caps.get(p), policy);
    let environmental = pillar(Pillar::Environmental);
    let social = pillar(Pillar::Social);
    let governance = pillar(Pillar::Governance);
    let composite = environmental.score + social.score + governance.score;

    AggregateScore {
        environmental,
        social,
        governance,
        composite,
        max_composite: caps.total(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::metric_spec::{default_metric_specs, Direction};
    use pretty_assertions::assert_eq;

    /// Best possible raw value for each default metric: 100th percentile
    /// when higher is better, 0th when lower is better, top disclosure score.
    fn best_case() -> Vec<MetricContribution> {
        default_metric_specs()
            .iter()
            .map(|s| {
                let raw = match s.direction {
                    Direction::HigherIsBetter | Direction::Absolute => 100.0,
                    Direction::LowerIsBetter => 0.0,
                };
                MetricContribution::from_spec(s, Some(raw))
            })
            .collect()
    }

    #[test]
    fn test_best_case_reaches_sum_of_caps() {
        let agg = aggregate_scores(
            &best_case(),
            &PillarCaps::observed(),
            MissingMetricPolicy::ZeroContribution,
        );
        assert_eq!(agg.environmental.score, 60.0);
        assert_eq!(agg.social.score, 30.0);
        assert_eq!(agg.governance.score, 10.0);
        assert_eq!(agg.composite, 100.0);
        assert_eq!(agg.max_composite, 100.0);
    }

    #[test]
    fn test_inverse_metric_flips_percentile() {
        let specs = default_metric_specs();
        let ghg = MetricContribution::from_spec(&specs[0], Some(25.0));
        assert_eq!(ghg.value, Some(75.0));
        let renewable = MetricContribution::from_spec(&specs[2], Some(25.0));
        assert_eq!(renewable.value, Some(25.0));
    }

    #[test]
    fn test_unit_weight_formula() {
        let contributions = vec![
            MetricContribution {
                metric: "Gender Pay Gap %".into(),
                pillar: Pillar::Social,
                weight: 1.0,
                value: Some(40.0),
            },
            MetricContribution {
                metric: "Board Diversity %".into(),
                pillar: Pillar::Social,
                weight: 1.0,
                value: Some(80.0),
            },
        ];
        let s = score_pillar(
            Pillar::Social,
            &contributions,
            30.0,
            MissingMetricPolicy::ZeroContribution,
        );
        // 120 × 30 / 200
        assert!((s.score - 18.0).abs() < 1e-12);
        assert_eq!(s.scored_metrics, 2);
    }

    #[test]
    fn test_missing_metric_zero_contribution_vs_exclusion() {
        let contributions = vec![
            MetricContribution {
                metric: "a".into(),
                pillar: Pillar::Environmental,
                weight: 1.0,
                value: Some(90.0),
            },
            MetricContribution {
                metric: "b".into(),
                pillar: Pillar::Environmental,
                weight: 1.0,
                value: None,
            },
        ];
        let zero = score_pillar(
            Pillar::Environmental,
            &contributions,
            60.0,
            MissingMetricPolicy::ZeroContribution,
        );
        assert!((zero.score - 27.0).abs() < 1e-12);
        assert_eq!(zero.missing_metrics, 1);

        let excluded = score_pillar(
            Pillar::Environmental,
            &contributions,
            60.0,
            MissingMetricPolicy::ExcludeFromDenominator,
        );
        assert!((excluded.score - 54.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_missing_pillar_scores_zero() {
        let contributions = vec![MetricContribution {
            metric: "exec pay".into(),
            pillar: Pillar::Governance,
            weight: 1.0,
            value: None,
        }];
        for policy in [
            MissingMetricPolicy::ZeroContribution,
            MissingMetricPolicy::ExcludeFromDenominator,
        ] {
            let g = score_pillar(Pillar::Governance, &contributions, 10.0, policy);
            assert_eq!(g.score, 0.0);
        }
    }

    #[test]
    fn test_weights_shift_pillar() {
        let contributions = vec![
            MetricContribution {
                metric: "heavy".into(),
                pillar: Pillar::Social,
                weight: 3.0,
                value: Some(100.0),
            },
            MetricContribution {
                metric: "light".into(),
                pillar: Pillar::Social,
                weight: 1.0,
                value: Some(0.0),
            },
        ];
        let s = score_pillar(
            Pillar::Social,
            &contributions,
            40.0,
            MissingMetricPolicy::ZeroContribution,
        );
        assert!((s.score - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_composite_is_sum_and_pillars_bounded() {
        let mut contributions = best_case();
        contributions[2].value = Some(250.0);
        let agg = aggregate_scores(
            &contributions,
            &PillarCaps::observed(),
            MissingMetricPolicy::ZeroContribution,
        );
        for p in Pillar::ALL {
            let ps = agg.pillar(p);
            assert!(ps.score >= 0.0 && ps.score <= ps.cap);
        }
        assert_eq!(
            agg.composite,
            agg.environmental.score + agg.social.score + agg.governance.score
        );
    }

    #[test]
    fn test_empty_pillar_scores_zero() {
        let agg = aggregate_scores(
            &[],
            &PillarCaps::observed(),
            MissingMetricPolicy::ZeroContribution,
        );
        assert_eq!(agg.composite, 0.0);
    }
}
