use clap::{Args, ValueEnum};
use serde_json::{json, Value};

use esg_peer_core::scoring::benchmark::{CachedBenchmarkRepository, FsBenchmarkRepository};
use esg_peer_core::scoring::company::CompanyRecord;
use esg_peer_core::scoring::metric_spec::{MissingMetricPolicy, ScoringConfig, WeightingScheme};
use esg_peer_core::scoring::pipeline::{self, AnalysisSession};

use crate::input;

#[derive(Debug, Clone, ValueEnum)]
pub enum MissingPolicyArg {
    /// Missing metrics count as zero against the pillar denominator
    Zero,
    /// Missing metrics are dropped from the pillar denominator
    Exclude,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum WeightingArg {
    /// Fixed 60 / 30 / 10 pillar caps
    Observed,
    /// Caps proportional to the metric weight in each pillar
    Proportional,
}

/// Arguments for peer scoring
#[derive(Args)]
pub struct ScoreArgs {
    /// Company table (CSV, or JSON array of records)
    #[arg(long)]
    pub companies: String,

    /// Root directory of the benchmark tree
    #[arg(long)]
    pub benchmarks: String,

    /// Score only this company (full report); otherwise summarise all
    #[arg(long)]
    pub company: Option<String>,

    /// Scoring configuration (YAML or JSON)
    #[arg(long)]
    pub config: Option<String>,

    /// Treatment of metrics that could not be scored
    #[arg(long)]
    pub missing_policy: Option<MissingPolicyArg>,

    /// Pillar cap scheme
    #[arg(long)]
    pub weighting: Option<WeightingArg>,
}

fn load_config(args: &ScoreArgs) -> Result<ScoringConfig, Box<dyn std::error::Error>> {
    let mut config: ScoringConfig = match args.config.as_deref() {
        Some(path) => input::file::read_config(path)?,
        None => ScoringConfig::default(),
    };
    if let Some(policy) = &args.missing_policy {
        config.missing_policy = match policy {
            MissingPolicyArg::Zero => MissingMetricPolicy::ZeroContribution,
            MissingPolicyArg::Exclude => MissingMetricPolicy::ExcludeFromDenominator,
        };
    }
    if let Some(weighting) = &args.weighting {
        config.weighting = match weighting {
            WeightingArg::Observed => WeightingScheme::Observed,
            WeightingArg::Proportional => WeightingScheme::MetricProportional,
        };
    }
    tracing::debug!(
        metrics = config.metrics.len(),
        missing_policy = ?config.missing_policy,
        "scoring configuration resolved"
    );
    Ok(config)
}

pub fn run_score(args: ScoreArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config = load_config(&args)?;
    let session = if input::file::is_csv(&args.companies) {
        AnalysisSession::from_csv(input::file::open(&args.companies)?, config)?
    } else {
        let records: Vec<CompanyRecord> = input::file::read_json(&args.companies)?;
        AnalysisSession::new(records, config)?
    };
    tracing::info!(
        companies = session.records().len(),
        rejected = session.rejected().len(),
        benchmarks = %args.benchmarks,
        "scoring session loaded"
    );
    let repo = CachedBenchmarkRepository::new(FsBenchmarkRepository::new(&args.benchmarks));

    if let Some(company) = args.company.as_deref() {
        let Some(record) = session.record(company) else {
            return Err(match session.rejected().iter().find(|r| r.company == company) {
                Some(row) => format!("{} line {}: {}", args.companies, row.line, row.error),
                None => format!("No company named '{company}' in {}", args.companies),
            }
            .into());
        };
        let result = pipeline::score_company(record, session.config(), &repo)?;
        return Ok(serde_json::to_value(result)?);
    }

    let mut results = Vec::new();
    let mut warnings = Vec::new();
    for (company, outcome) in session.analyze_all(&repo) {
        match outcome {
            Ok(analysis) => {
                let r = analysis.report;
                let skipped = r.metrics.iter().filter(|m| m.outcome.is_skipped()).count();
                results.push(json!({
                    "company": r.company,
                    "industry": r.industry,
                    "size_tier": r.size_tier.code(),
                    "environmental": r.environmental.score,
                    "social": r.social.score,
                    "governance": r.governance.score,
                    "composite": r.composite,
                    "skipped_metrics": skipped,
                }));
            }
            Err(e) => warnings.push(format!("{company}: {e}")),
        }
    }

    Ok(json!({
        "results": results,
        "warnings": warnings,
        "methodology": "ESG peer score: modeled percentiles with capped pillar roll-up",
    }))
}
