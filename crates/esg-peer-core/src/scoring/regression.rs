//! Regression-residual percentiles.
//!
//! For metrics that scale with a covariate (emissions and water use scale
//! with headcount), the benchmark population is fitted with ordinary least
//! squares and the company is positioned by its standardised residual:
//!
//! ```text
//! residual   = actual - (slope * covariate + intercept)
//! z          = residual / sd(benchmark residuals)      (population sd, / n)
//! percentile = Phi(z) * 100
//! ```

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::time::Instant;

use crate::error::EsgPeerError;
use crate::types::{with_metadata, ComputationOutput, Percentile};
use crate::EsgPeerResult;

/// Residual spread below this (relative to the metric's scale) is treated
/// as zero.
const DEGENERATE_RESIDUAL_TOLERANCE: f64 = 1e-10;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Population standard deviation of the benchmark residuals.
    pub residual_std: f64,
    pub r_squared: f64,
    pub sample_size: usize,
}

impl LinearFit {
    pub fn predict(&self, covariate: f64) -> f64 {
        self.slope * covariate + self.intercept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionPercentile {
    pub percentile: Percentile,
    pub actual: f64,
    pub covariate: f64,
    pub predicted: f64,
    pub residual: f64,
    pub standardized_residual: f64,
    pub fit: LinearFit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub covariate: f64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionPercentileInput {
    pub metric: String,
    pub benchmark: Vec<BenchmarkPoint>,
    pub company_covariate: f64,
    pub company_value: f64,
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Ordinary least squares of `value` on `covariate` over `(covariate, value)`
/// pairs. Needs at least two distinct covariate values.
pub fn fit_linear(pairs: &[(f64, f64)]) -> EsgPeerResult<LinearFit> {
    let n = pairs.len();
    if n < 2 {
        return Err(EsgPeerError::InsufficientData(format!(
            "regression needs at least 2 benchmark rows, got {n}"
        )));
    }

    let nf = n as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let sxx: f64 = pairs.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return Err(EsgPeerError::InsufficientData(
            "regression needs at least 2 distinct covariate values".into(),
        ));
    }
    let sxy: f64 = pairs
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let ss_res: f64 = pairs
        .iter()
        .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
        .sum();
    let ss_tot: f64 = pairs.iter().map(|(_, y)| (y - mean_y).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else {
        0.0
    };

    Ok(LinearFit {
        slope,
        intercept,
        residual_std: (ss_res / nf).sqrt(),
        r_squared,
        sample_size: n,
    })
}

/// Position a company against a fitted benchmark line.
pub fn percentile_from_fit(
    metric: &str,
    fit: &LinearFit,
    covariate: f64,
    actual: f64,
    value_scale: f64,
) -> EsgPeerResult<RegressionPercentile> {
    let tolerance = DEGENERATE_RESIDUAL_TOLERANCE * value_scale.abs().max(1.0);
    if !(fit.residual_std > tolerance) {
        return Err(EsgPeerError::DegenerateFit {
            metric: metric.to_string(),
            reason: format!(
                "benchmark residual standard deviation is zero ({})",
                fit.residual_std
            ),
        });
    }

    let predicted = fit.predict(covariate);
    let residual = actual - predicted;
    let standardized_residual = residual / fit.residual_std;

    let normal = Normal::new(0.0, 1.0).map_err(|e| EsgPeerError::InvalidInput {
        field: "distribution".into(),
        reason: format!("Invalid Normal parameters: {e}"),
    })?;
    let percentile = normal.cdf(standardized_residual) * 100.0;

    Ok(RegressionPercentile {
        percentile,
        actual,
        covariate,
        predicted,
        residual,
        standardized_residual,
        fit: *fit,
    })
}

/// Fit the benchmark and position the company in one step.
pub fn regression_percentile(
    metric: &str,
    pairs: &[(f64, f64)],
    covariate: f64,
    actual: f64,
) -> EsgPeerResult<RegressionPercentile> {
    let fit = fit_linear(pairs)?;
    let scale = pairs.iter().map(|(_, y)| y.abs()).sum::<f64>() / pairs.len() as f64;
    tracing::debug!(
        metric,
        slope = fit.slope,
        intercept = fit.intercept,
        residual_std = fit.residual_std,
        n = fit.sample_size,
        "fitted benchmark regression"
    );
    percentile_from_fit(metric, &fit, covariate, actual, scale)
}

/// Regression percentile with the standard output envelope.
pub fn calculate_regression_percentile(
    input: &RegressionPercentileInput,
) -> EsgPeerResult<ComputationOutput<RegressionPercentile>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if !input.company_value.is_finite() || !input.company_covariate.is_finite() {
        return Err(EsgPeerError::InvalidInput {
            field: "company_value".into(),
            reason: "Company value and covariate must be finite.".into(),
        });
    }

    let pairs: Vec<(f64, f64)> = input
        .benchmark
        .iter()
        .filter(|p| p.covariate.is_finite() && p.value.is_finite())
        .map(|p| (p.covariate, p.value))
        .collect();
    if pairs.len() < input.benchmark.len() {
        warnings.push(format!(
            "{} benchmark point(s) with non-finite values dropped.",
            input.benchmark.len() - pairs.len()
        ));
    }

    let result = regression_percentile(
        &input.metric,
        &pairs,
        input.company_covariate,
        input.company_value,
    )?;

    if result.fit.sample_size < 5 {
        warnings.push(format!(
            "Only {} benchmark points; the residual spread is a rough estimate.",
            result.fit.sample_size
        ));
    }

    let assumptions = serde_json::json!({
        "model": "OLS value ~ covariate",
        "residual_std": "population (divide by n)",
        "percentile": "standard normal CDF of standardised residual",
    });

    Ok(with_metadata(
        "Linear regression residual percentile",
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

    /// Points on y = 0.5x + 1000 with residuals +50, -50, -50, +50, which
    /// are orthogonal to both the intercept and x, so OLS recovers the line
    /// exactly and the population residual sd is 50.
    fn technology_large_ghg() -> Vec<(f64, f64)> {
        vec![
            (1000.0, 1550.0),
            (2000.0, 1950.0),
            (3000.0, 2450.0),
            (4000.0, 3050.0),
        ]
    }

    fn assert_close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() < eps, "expected {b}, got {a}");
    }

    #[test]
    fn test_fit_recovers_line() {
        let fit = fit_linear(&technology_large_ghg()).unwrap();
        assert_close(fit.slope, 0.5, 1e-9);
        assert_close(fit.intercept, 1000.0, 1e-6);
        assert_close(fit.residual_std, 50.0, 1e-9);
        assert_eq!(fit.sample_size, 4);
    }

    #[test]
    fn test_two_sigma_company() {
        let r = regression_percentile("GHG", &technology_large_ghg(), 5000.0, 3600.0).unwrap();
        assert_close(r.predicted, 3500.0, 1e-6);
        assert_close(r.residual, 100.0, 1e-6);
        assert_close(r.standardized_residual, 2.0, 1e-9);
        assert_close(r.percentile, 97.724_986_805_182_08, 1e-6);
    }

    #[test]
    fn test_on_the_line_is_exactly_median() {
        let pairs = technology_large_ghg();
        let fit = fit_linear(&pairs).unwrap();
        let on_line = fit.predict(2750.0);
        let r = percentile_from_fit("GHG", &fit, 2750.0, on_line, 1.0).unwrap();
        assert_eq!(r.residual, 0.0);
        assert_close(r.percentile, 50.0, 1e-12);
    }

    #[test]
    fn test_percentile_monotone_in_value() {
        let pairs = technology_large_ghg();
        let mut last = -1.0;
        for value in [2000.0, 2500.0, 3000.0, 3400.0, 3500.0, 3600.0, 4000.0] {
            let r = regression_percentile("GHG", &pairs, 5000.0, value).unwrap();
            assert!(r.percentile > last, "{} not above {}", r.percentile, last);
            assert!((0.0..=100.0).contains(&r.percentile));
            last = r.percentile;
        }
    }

    #[test]
    fn test_single_row_is_insufficient() {
        let err = regression_percentile("GHG", &[(10.0, 5.0)], 10.0, 5.0).unwrap_err();
        assert!(matches!(err, EsgPeerError::InsufficientData(_)));
    }

    #[test]
    fn test_identical_covariates_are_insufficient() {
        let pairs = [(10.0, 5.0), (10.0, 7.0), (10.0, 9.0)];
        let err = regression_percentile("GHG", &pairs, 10.0, 5.0).unwrap_err();
        assert!(matches!(err, EsgPeerError::InsufficientData(_)));
    }

    #[test]
    fn test_perfect_line_is_degenerate() {
        let pairs = [(1.0, 3.0), (2.0, 5.0), (3.0, 7.0), (4.0, 9.0)];
        let err = regression_percentile("GHG", &pairs, 5.0, 11.0).unwrap_err();
        assert!(matches!(err, EsgPeerError::DegenerateFit { .. }));
    }

    #[test]
    fn test_envelope_drops_non_finite_points() {
        let mut benchmark: Vec<BenchmarkPoint> = technology_large_ghg()
            .into_iter()
            .map(|(covariate, value)| BenchmarkPoint { covariate, value })
            .collect();
        benchmark.push(BenchmarkPoint {
            covariate: f64::NAN,
            value: 1.0,
        });
        let out = calculate_regression_percentile(&RegressionPercentileInput {
            metric: "GHG Emissions".into(),
            benchmark,
            company_covariate: 5000.0,
            company_value: 3600.0,
        })
        .unwrap();
        assert_close(out.result.standardized_residual, 2.0, 1e-9);
        assert!(out.warnings.iter().any(|w| w.contains("dropped")));
        assert!(out.warnings.iter().any(|w| w.contains("rough estimate")));
    }
}
