//! Company scoring pipeline.
//!
//! classify size → load peer benchmark per metric → estimate → aggregate.
//! Per-metric failures are caught at the metric boundary and become a
//! skip with a diagnostic; only a record missing required fields aborts.

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::time::Instant;

use super::aggregate::{aggregate_scores, MetricContribution, PillarScore};
use super::benchmark::{BenchmarkKey, BenchmarkRepository};
use super::beta::{beta_percentile, BetaPercentile};
use super::company::{
    read_company_records, CompanyRecord, MetricValue, RejectedRow, REVENUE_COLUMN,
};
use super::disclosure::{score_binary_disclosure, score_tiered_disclosure, DisclosureResult};
use super::metric_spec::{
    Direction, EstimatorKind, MetricSpec, MissingMetricPolicy, PillarCaps, ScoringConfig,
    EMPLOYEES_COLUMN,
};
use super::regression::{regression_percentile, RegressionPercentile};
use super::size::{classify_company_size, SizeTier};
use crate::error::EsgPeerError;
use crate::types::{with_metadata, ComputationOutput, Pillar, Score};
use crate::EsgPeerResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why a metric produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BenchmarkNotFound,
    InsufficientData,
    DegenerateFit,
    MissingValue,
    MalformedBenchmark,
}

impl SkipReason {
    /// `None` for errors that must abort the request.
    pub fn from_error(err: &EsgPeerError) -> Option<SkipReason> {
        match err {
            EsgPeerError::BenchmarkNotFound { .. } => Some(SkipReason::BenchmarkNotFound),
            EsgPeerError::InsufficientData(_) => Some(SkipReason::InsufficientData),
            EsgPeerError::DegenerateFit { .. } => Some(SkipReason::DegenerateFit),
            EsgPeerError::MissingValue { .. } => Some(SkipReason::MissingValue),
            EsgPeerError::BenchmarkFormat { .. } => Some(SkipReason::MalformedBenchmark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricOutcome {
    Regression(RegressionPercentile),
    Beta(BetaPercentile),
    Disclosure(DisclosureResult),
    Skipped { reason: SkipReason, message: String },
}

impl MetricOutcome {
    /// The 0-100 value before orientation: a percentile or a disclosure score.
    pub fn raw_value(&self) -> Option<Score> {
        match self {
            MetricOutcome::Regression(r) => Some(r.percentile),
            MetricOutcome::Beta(b) => Some(b.percentile),
            MetricOutcome::Disclosure(d) => Some(d.company_score),
            MetricOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, MetricOutcome::Skipped { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric: String,
    pub pillar: Pillar,
    pub estimator: String,
    pub direction: Direction,
    pub outcome: MetricOutcome,
    /// Percentile or score, 0-100.
    pub raw_value: Option<Score>,
    /// Oriented so higher is better; what the aggregator sums.
    pub directional_value: Option<Score>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub metric: String,
    pub reason: SkipReason,
    /// Whether the metric was dropped from scoring.
    pub skipped: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub company: String,
    pub industry: String,
    pub size_tier: SizeTier,
    pub metrics: Vec<MetricScore>,
    pub environmental: PillarScore,
    pub social: PillarScore,
    pub governance: PillarScore,
    pub composite: Score,
    pub max_composite: Score,
    pub caps: PillarCaps,
    pub missing_policy: MissingMetricPolicy,
    pub diagnostics: Vec<Diagnostic>,
}

impl ScoreReport {
    pub fn metric(&self, name: &str) -> Option<&MetricScore> {
        self.metrics.iter().find(|m| m.metric == name)
    }

    pub fn pillar(&self, pillar: Pillar) -> &PillarScore {
        match pillar {
            Pillar::Environmental => &self.environmental,
            Pillar::Social => &self.social,
            Pillar::Governance => &self.governance,
        }
    }
}

/// A report together with the enriched copy of the input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub record: CompanyRecord,
    pub report: ScoreReport,
}

// ---------------------------------------------------------------------------
// Per-metric evaluation
// ---------------------------------------------------------------------------

fn numeric_value(record: &CompanyRecord, metric: &str) -> EsgPeerResult<f64> {
    match metric {
        EMPLOYEES_COLUMN => return Ok(record.employees as f64),
        REVENUE_COLUMN => {
            return record.revenue.to_f64().ok_or_else(|| EsgPeerError::MissingValue {
                metric: metric.to_string(),
            })
        }
        _ => {}
    }
    record
        .metric(metric)
        .and_then(MetricValue::as_f64)
        .ok_or_else(|| EsgPeerError::MissingValue {
            metric: metric.to_string(),
        })
}

fn text_value(record: &CompanyRecord, metric: &str) -> String {
    record
        .metric(metric)
        .map(MetricValue::as_text)
        .unwrap_or_default()
}

/// Evaluate one metric. Recoverable errors are returned as `Err` so the
/// caller decides how to record the skip.
pub fn evaluate_metric(
    spec: &MetricSpec,
    record: &CompanyRecord,
    tier: SizeTier,
    repository: &dyn BenchmarkRepository,
    diagnostics: &mut Vec<Diagnostic>,
) -> EsgPeerResult<MetricOutcome> {
    let key = BenchmarkKey::new(spec.lookup_name(), &record.industry, tier);

    match &spec.estimator {
        EstimatorKind::Regression { covariate } => {
            let actual = numeric_value(record, &spec.name)?;
            let company_covariate = numeric_value(record, covariate)?;
            let dataset = repository.load(&key)?;
            let pairs = dataset.numeric_pairs(covariate, &spec.name)?;
            let r = regression_percentile(&spec.name, &pairs, company_covariate, actual)?;
            Ok(MetricOutcome::Regression(r))
        }
        EstimatorKind::Beta => {
            let actual = numeric_value(record, &spec.name)?;
            let dataset = repository.load(&key)?;
            let values = dataset.numeric_values(&spec.name)?;
            let b = beta_percentile(&spec.name, &values, actual)?;
            Ok(MetricOutcome::Beta(b))
        }
        EstimatorKind::BinaryDisclosure | EstimatorKind::TieredDisclosure { .. } => {
            let company_value = text_value(record, &spec.name);
            let peers = match repository
                .load(&key)
                .and_then(|ds| ds.text_values(&spec.name))
            {
                Ok(peers) => Some(peers),
                Err(e) => {
                    let Some(reason) = SkipReason::from_error(&e) else {
                        return Err(e);
                    };
                    let message = format!("{e}; peer disclosure rate unavailable");
                    tracing::warn!(metric = %spec.name, %message, "disclosure benchmark missing");
                    diagnostics.push(Diagnostic {
                        metric: spec.name.clone(),
                        reason,
                        skipped: false,
                        message,
                    });
                    None
                }
            };
            let result = match &spec.estimator {
                EstimatorKind::TieredDisclosure { tiers } => {
                    score_tiered_disclosure(&company_value, tiers, peers.as_deref())
                }
                _ => score_binary_disclosure(&company_value, peers.as_deref()),
            };
            Ok(MetricOutcome::Disclosure(result))
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full pipeline on a snapshot of `record`; the input is untouched
/// and an enriched copy is returned alongside the report.
pub fn analyze_company(
    record: &CompanyRecord,
    config: &ScoringConfig,
    repository: &dyn BenchmarkRepository,
) -> EsgPeerResult<AnalysisResult> {
    config.validate()?;
    record.ensure_complete(&config.metrics)?;

    let tier = classify_company_size(record.revenue, record.employees);
    let caps = config.caps();
    let mut diagnostics = Vec::new();
    let mut metrics = Vec::with_capacity(config.metrics.len());
    let mut enriched = record.clone();
    enriched.size_tier = Some(tier);

    for spec in &config.metrics {
        let outcome = match evaluate_metric(spec, record, tier, repository, &mut diagnostics) {
            Ok(outcome) => outcome,
            Err(e) => match SkipReason::from_error(&e) {
                Some(reason) => {
                    let message = e.to_string();
                    tracing::warn!(metric = %spec.name, ?reason, %message, "metric skipped");
                    diagnostics.push(Diagnostic {
                        metric: spec.name.clone(),
                        reason,
                        skipped: true,
                        message: message.clone(),
                    });
                    MetricOutcome::Skipped { reason, message }
                }
                None => return Err(e),
            },
        };

        let raw_value = outcome.raw_value();
        if let Some(v) = raw_value {
            let suffix = if spec.estimator.is_disclosure() {
                "Score"
            } else {
                "Percentile"
            };
            enriched.derived.insert(format!("{} {}", spec.name, suffix), v);
        }

        metrics.push(MetricScore {
            metric: spec.name.clone(),
            pillar: spec.pillar,
            estimator: spec.estimator.label().to_string(),
            direction: spec.direction,
            outcome,
            raw_value,
            directional_value: raw_value.map(|v| spec.directional_value(v)),
        });
    }

    let contributions: Vec<MetricContribution> = config
        .metrics
        .iter()
        .zip(&metrics)
        .map(|(spec, m)| MetricContribution::from_spec(spec, m.raw_value))
        .collect();
    let aggregate = aggregate_scores(&contributions, &caps, config.missing_policy);

    tracing::debug!(
        company = %record.company,
        tier = %tier,
        composite = aggregate.composite,
        "company scored"
    );

    let report = ScoreReport {
        company: record.company.clone(),
        industry: record.industry.clone(),
        size_tier: tier,
        metrics,
        environmental: aggregate.environmental,
        social: aggregate.social,
        governance: aggregate.governance,
        composite: aggregate.composite,
        max_composite: aggregate.max_composite,
        caps,
        missing_policy: config.missing_policy,
        diagnostics,
    };

    Ok(AnalysisResult {
        record: enriched,
        report,
    })
}

/// Score one company with the standard output envelope. Diagnostics are
/// repeated as envelope warnings.
pub fn score_company(
    record: &CompanyRecord,
    config: &ScoringConfig,
    repository: &dyn BenchmarkRepository,
) -> EsgPeerResult<ComputationOutput<ScoreReport>> {
    let start = Instant::now();
    let analysis = analyze_company(record, config, repository)?;
    let report = analysis.report;

    let mut warnings: Vec<String> = report
        .diagnostics
        .iter()
        .map(|d| d.message.clone())
        .collect();
    if (report.max_composite - 100.0).abs() > 1e-9 {
        warnings.push(format!(
            "Pillar caps sum to {:.2}; the composite is not on a 0-100 scale.",
            report.max_composite
        ));
    }

    let assumptions = serde_json::json!({
        "size_tier": report.size_tier.code(),
        "caps": report.caps,
        "missing_policy": report.missing_policy,
        "continuous_metrics": "OLS residual percentile vs employees",
        "percentage_metrics": "Beta moment-matching percentile",
        "disclosure_metrics": "absolute 0-100 score, not percentile-transformed",
    });

    Ok(with_metadata(
        "ESG peer score: modeled percentiles with capped pillar roll-up",
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// An uploaded company table and the configuration it is scored with.
/// Analyses read from the session; they never write back into it.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    records: Vec<CompanyRecord>,
    rejected: Vec<RejectedRow>,
    config: ScoringConfig,
}

impl AnalysisSession {
    pub fn new(records: Vec<CompanyRecord>, config: ScoringConfig) -> EsgPeerResult<Self> {
        config.validate()?;
        Ok(AnalysisSession {
            records,
            rejected: Vec::new(),
            config,
        })
    }

    /// Rows that fail on their own are kept as rejections; they do not stop
    /// the rest of the table from loading.
    pub fn from_csv<R: Read>(reader: R, config: ScoringConfig) -> EsgPeerResult<Self> {
        config.validate()?;
        let table = read_company_records(reader, &config.metrics)?;
        for row in &table.rejected {
            tracing::warn!(
                line = row.line,
                company = %row.company,
                error = %row.error,
                "company row rejected"
            );
        }
        Ok(AnalysisSession {
            records: table.records,
            rejected: table.rejected,
            config,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn records(&self) -> &[CompanyRecord] {
        &self.records
    }

    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }

    /// Distinct company names in upload order.
    pub fn companies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for r in &self.records {
            if !names.contains(&r.company.as_str()) {
                names.push(&r.company);
            }
        }
        names
    }

    /// First record for `company`.
    pub fn record(&self, company: &str) -> Option<&CompanyRecord> {
        self.records.iter().find(|r| r.company == company)
    }

    /// Copies of every record with the size tier attached.
    pub fn classified(&self) -> Vec<CompanyRecord> {
        self.records
            .iter()
            .map(|r| {
                let mut r = r.clone();
                r.size_tier = Some(classify_company_size(r.revenue, r.employees));
                r
            })
            .collect()
    }

    pub fn analyze(
        &self,
        company: &str,
        repository: &dyn BenchmarkRepository,
    ) -> EsgPeerResult<AnalysisResult> {
        if let Some(record) = self.record(company) {
            return analyze_company(record, &self.config, repository);
        }
        if let Some(row) = self.rejected.iter().find(|r| r.company == company) {
            return Err(row.error.clone());
        }
        Err(EsgPeerError::InvalidInput {
            field: "company".into(),
            reason: format!("No company named '{company}' in the session."),
        })
    }

    /// Analyze every record in upload order, then report rejected rows. One
    /// company failing does not stop the others.
    pub fn analyze_all(
        &self,
        repository: &dyn BenchmarkRepository,
    ) -> Vec<(String, EsgPeerResult<AnalysisResult>)> {
        self.records
            .iter()
            .map(|r| (r.company.clone(), analyze_company(r, &self.config, repository)))
            .chain(
                self.rejected
                    .iter()
                    .map(|r| (r.company.clone(), Err(r.error.clone()))),
            )
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
