//! Beta-distribution percentiles for bounded percentage metrics.
//!
//! Benchmark percentages are rescaled to [0, 1] and a Beta(α, β) is fitted
//! by matching the sample mean μ and sample variance σ²:
//!
//! ```text
//! α = ((1 − μ) / σ² − 1 / μ) · μ²
//! β = α · (1 / μ − 1)
//! ```
//!
//! The fit only exists for 0 < μ < 1 and 0 < σ² < μ(1 − μ); anything else
//! is a `DegenerateFit` and the metric is skipped rather than scored.

use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};
use std::time::Instant;

use crate::error::EsgPeerError;
use crate::types::{with_metadata, ComputationOutput, Percentile};
use crate::EsgPeerResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaFit {
    pub alpha: f64,
    pub beta: f64,
    /// Sample mean of the rescaled values.
    pub mean: f64,
    /// Sample variance (n − 1) of the rescaled values.
    pub variance: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaPercentile {
    pub percentile: Percentile,
    /// Company value as reported, 0-100.
    pub company_value: f64,
    /// Company value on [0, 1] as fed to the CDF.
    pub rescaled_value: f64,
    pub fit: BetaFit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetaPercentileInput {
    pub metric: String,
    /// Peer values on the 0-100 scale.
    pub benchmark: Vec<f64>,
    pub company_value: f64,
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

fn degenerate(metric: &str, reason: String) -> EsgPeerError {
    EsgPeerError::DegenerateFit {
        metric: metric.to_string(),
        reason,
    }
}

/// Method-of-moments Beta fit over 0-100 percentages. Non-finite values are
/// dropped before fitting.
pub fn fit_beta_moments(metric: &str, percentages: &[f64]) -> EsgPeerResult<BetaFit> {
    let values: Vec<f64> = percentages
        .iter()
        .filter(|v| v.is_finite())
        .map(|v| v / 100.0)
        .collect();
    let n = values.len();
    if n < 2 {
        return Err(EsgPeerError::InsufficientData(format!(
            "beta fit for '{metric}' needs at least 2 benchmark values, got {n}"
        )));
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;

    if mean <= 0.0 || mean >= 1.0 {
        return Err(degenerate(
            metric,
            format!("benchmark mean {mean:.4} is not strictly inside (0, 1)"),
        ));
    }
    if variance <= 0.0 {
        return Err(degenerate(metric, "benchmark variance is zero".into()));
    }
    let max_variance = mean * (1.0 - mean);
    if variance >= max_variance {
        return Err(degenerate(
            metric,
            format!(
                "benchmark variance {variance:.4} exceeds the Beta maximum μ(1−μ) = {max_variance:.4}"
            ),
        ));
    }

    let alpha = ((1.0 - mean) / variance - 1.0 / mean) * mean.powi(2);
    let beta = alpha * (1.0 / mean - 1.0);
    if !(alpha.is_finite() && beta.is_finite() && alpha > 0.0 && beta > 0.0) {
        return Err(degenerate(
            metric,
            format!("moment-matched parameters are invalid (α = {alpha}, β = {beta})"),
        ));
    }

    Ok(BetaFit {
        alpha,
        beta,
        mean,
        variance,
        sample_size: n,
    })
}

/// Beta CDF of the company's percentage under a fitted distribution.
pub fn percentile_from_fit(
    metric: &str,
    fit: &BetaFit,
    company_value: f64,
) -> EsgPeerResult<BetaPercentile> {
    if !company_value.is_finite() {
        return Err(EsgPeerError::InvalidInput {
            field: metric.to_string(),
            reason: "Company value must be finite.".into(),
        });
    }
    let dist = Beta::new(fit.alpha, fit.beta)
        .map_err(|e| degenerate(metric, format!("invalid Beta parameters: {e}")))?;
    let rescaled_value = (company_value / 100.0).clamp(0.0, 1.0);
    let percentile = dist.cdf(rescaled_value) * 100.0;
    if !percentile.is_finite() {
        return Err(degenerate(metric, "Beta CDF evaluated to NaN".into()));
    }

    Ok(BetaPercentile {
        percentile,
        company_value,
        rescaled_value,
        fit: *fit,
    })
}

/// Fit the benchmark and position the company in one step.
pub fn beta_percentile(
    metric: &str,
    percentages: &[f64],
    company_value: f64,
) -> EsgPeerResult<BetaPercentile> {
    let fit = fit_beta_moments(metric, percentages)?;
    tracing::debug!(
        metric,
        alpha = fit.alpha,
        beta = fit.beta,
        n = fit.sample_size,
        "fitted benchmark beta distribution"
    );
    percentile_from_fit(metric, &fit, company_value)
}

/// Beta percentile with the standard output envelope.
pub fn calculate_beta_percentile(
    input: &BetaPercentileInput,
) -> EsgPeerResult<ComputationOutput<BetaPercentile>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if !(0.0..=100.0).contains(&input.company_value) {
        warnings.push(format!(
            "Company value {} is outside 0-100 and was clamped.",
            input.company_value
        ));
    }
    let dropped = input.benchmark.iter().filter(|v| !v.is_finite()).count();
    if dropped > 0 {
        warnings.push(format!("{dropped} non-finite benchmark value(s) dropped."));
    }

    let result = beta_percentile(&input.metric, &input.benchmark, input.company_value)?;

    let assumptions = serde_json::json!({
        "scale": "values divided by 100",
        "fit": "method of moments, sample variance (n - 1)",
        "percentile": "Beta CDF at the company value",
    });

    Ok(with_metadata(
        "Beta distribution moment-matching percentile",
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
