//! Logistic link between composite ESG score and expected return.
//!
//! r(s) = L / (1 + exp(-k (s - s0))), fitted by Levenberg-Marquardt least
//! squares on (score, return) observations.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EsgPeerError;
use crate::types::{with_metadata, ComputationOutput, Score};
use crate::EsgPeerResult;

const MAX_ITERATIONS: u32 = 500;
const STEP_TOLERANCE: f64 = 1e-10;
const MAX_DAMPING: f64 = 1e12;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnObservation {
    pub score: Score,
    pub expected_return: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Upper asymptote
    pub l: f64,
    /// Steepness
    pub k: f64,
    /// Midpoint score
    pub s0: f64,
}

impl LogisticParams {
    pub fn evaluate(&self, score: Score) -> f64 {
        self.l / (1.0 + (-self.k * (score - self.s0)).exp())
    }

    fn as_array(&self) -> [f64; 3] {
        [self.l, self.k, self.s0]
    }

    fn from_array(p: [f64; 3]) -> Self {
        LogisticParams {
            l: p[0],
            k: p[1],
            s0: p[2],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnCorrelationInput {
    pub observations: Vec<ReturnObservation>,
    /// Starting point for the solver; derived from the data when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_params: Option<LogisticParams>,
    /// Scores to evaluate the fitted curve at.
    #[serde(default)]
    pub predict_at: Vec<Score>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticFit {
    pub params: LogisticParams,
    pub r_squared: f64,
    pub rmse: f64,
    pub iterations: u32,
    pub sample_size: usize,
}

impl LogisticFit {
    pub fn predict(&self, score: Score) -> f64 {
        self.params.evaluate(score)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnCorrelationOutput {
    pub fit: LogisticFit,
    pub predictions: Vec<ReturnObservation>,
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

fn sse(obs: &[ReturnObservation], params: &LogisticParams) -> f64 {
    obs.iter()
        .map(|o| {
            let r = o.expected_return - params.evaluate(o.score);
            r * r
        })
        .sum()
}

/// Partial derivatives of the model w.r.t. (L, k, s0).
fn gradient(params: &LogisticParams, score: Score) -> [f64; 3] {
    let e = (-params.k * (score - params.s0)).exp();
    let d = 1.0 + e;
    let d2 = d * d;
    [
        1.0 / d,
        params.l * e * (score - params.s0) / d2,
        -params.l * e * params.k / d2,
    ]
}

fn det3(a: &[[f64; 3]; 3]) -> f64 {
    a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0])
}

/// Cramer's rule; `None` when the system is singular.
fn solve_3x3(a: [[f64; 3]; 3], b: [f64; 3]) -> Option<[f64; 3]> {
    let det_a = det3(&a);
    if det_a.abs() < f64::MIN_POSITIVE || !det_a.is_finite() {
        return None;
    }
    let mut x = [0.0; 3];
    for col in 0..3 {
        let mut a_mod = a;
        for row in 0..3 {
            a_mod[row][col] = b[row];
        }
        x[col] = det3(&a_mod) / det_a;
    }
    Some(x)
}

fn initial_guess(obs: &[ReturnObservation]) -> LogisticParams {
    let n = obs.len() as f64;
    let min_s = obs.iter().map(|o| o.score).fold(f64::INFINITY, f64::min);
    let max_s = obs.iter().map(|o| o.score).fold(f64::NEG_INFINITY, f64::max);
    let mean_s = obs.iter().map(|o| o.score).sum::<f64>() / n;
    let mean_r = obs.iter().map(|o| o.expected_return).sum::<f64>() / n;
    let peak = obs
        .iter()
        .map(|o| o.expected_return)
        .fold(0.0_f64, |acc, r| if r.abs() > acc.abs() { r } else { acc });
    let cov: f64 = obs
        .iter()
        .map(|o| (o.score - mean_s) * (o.expected_return - mean_r))
        .sum();
    // Curve rises towards L when score and return move together.
    let sign = if cov * peak >= 0.0 { 1.0 } else { -1.0 };
    LogisticParams {
        l: if peak == 0.0 { 1.0 } else { peak * 1.05 },
        k: sign * 4.0 / (max_s - min_s),
        s0: mean_s,
    }
}

/// Fit the logistic curve. Needs at least four observations spread over at
/// least two distinct scores.
pub fn fit_logistic(
    observations: &[ReturnObservation],
    initial: Option<LogisticParams>,
) -> EsgPeerResult<LogisticFit> {
    let obs: Vec<ReturnObservation> = observations
        .iter()
        .copied()
        .filter(|o| o.score.is_finite() && o.expected_return.is_finite())
        .collect();
    if obs.len() < 4 {
        return Err(EsgPeerError::InsufficientData(format!(
            "Logistic fit needs at least 4 observations, got {}",
            obs.len()
        )));
    }
    let first = obs[0].score;
    if obs.iter().all(|o| (o.score - first).abs() < f64::EPSILON) {
        return Err(EsgPeerError::InsufficientData(
            "Logistic fit needs at least 2 distinct scores".into(),
        ));
    }

    let mut params = initial.unwrap_or_else(|| initial_guess(&obs));
    let mut current_sse = sse(&obs, &params);
    let mut damping = 1e-3;
    let mut last_delta = f64::INFINITY;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < MAX_ITERATIONS {
        iterations += 1;

        let mut jtj = [[0.0; 3]; 3];
        let mut jtr = [0.0; 3];
        for o in &obs {
            let g = gradient(&params, o.score);
            let resid = o.expected_return - params.evaluate(o.score);
            for i in 0..3 {
                jtr[i] += g[i] * resid;
                for j in 0..3 {
                    jtj[i][j] += g[i] * g[j];
                }
            }
        }

        let mut damped = jtj;
        for (i, row) in damped.iter_mut().enumerate() {
            row[i] += damping * jtj[i][i].max(1e-12);
        }

        let Some(step) = solve_3x3(damped, jtr) else {
            damping *= 10.0;
            if damping > MAX_DAMPING {
                break;
            }
            continue;
        };

        let p = params.as_array();
        let candidate = LogisticParams::from_array([p[0] + step[0], p[1] + step[1], p[2] + step[2]]);
        let candidate_sse = sse(&obs, &candidate);

        if candidate_sse.is_finite() && candidate_sse <= current_sse {
            let step_norm = step.iter().map(|s| s * s).sum::<f64>().sqrt();
            let param_norm = p.iter().map(|v| v * v).sum::<f64>().sqrt();
            last_delta = step_norm;
            params = candidate;
            current_sse = candidate_sse;
            damping = (damping / 10.0).max(1e-15);
            if step_norm <= STEP_TOLERANCE * (param_norm + STEP_TOLERANCE) {
                converged = true;
                break;
            }
        } else {
            damping *= 10.0;
            if damping > MAX_DAMPING {
                // No descent direction left: a local minimum.
                converged = true;
                break;
            }
        }
    }

    if !converged || !params.as_array().iter().all(|v| v.is_finite()) {
        return Err(EsgPeerError::ConvergenceFailure {
            function: "logistic_return_fit".into(),
            iterations,
            last_delta,
        });
    }

    let n = obs.len() as f64;
    let mean_r = obs.iter().map(|o| o.expected_return).sum::<f64>() / n;
    let ss_tot: f64 = obs
        .iter()
        .map(|o| (o.expected_return - mean_r).powi(2))
        .sum();
    let r_squared = if ss_tot > 0.0 {
        1.0 - current_sse / ss_tot
    } else {
        1.0
    };

    tracing::debug!(
        l = params.l,
        k = params.k,
        s0 = params.s0,
        iterations,
        "logistic return curve fitted"
    );

    Ok(LogisticFit {
        params,
        r_squared,
        rmse: (current_sse / n).sqrt(),
        iterations,
        sample_size: obs.len(),
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn fit_return_correlation(
    input: &ReturnCorrelationInput,
) -> EsgPeerResult<ComputationOutput<ReturnCorrelationOutput>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let dropped = input
        .observations
        .iter()
        .filter(|o| !(o.score.is_finite() && o.expected_return.is_finite()))
        .count();
    if dropped > 0 {
        warnings.push(format!("{dropped} non-finite observation(s) ignored"));
    }

    let fit = fit_logistic(&input.observations, input.initial_params)?;
    if fit.r_squared < 0.5 {
        warnings.push(format!(
            "Weak fit (R² = {:.3}); the logistic link explains little of the return variation.",
            fit.r_squared
        ));
    }

    let predictions = input
        .predict_at
        .iter()
        .map(|&score| ReturnObservation {
            score,
            expected_return: fit.predict(score),
        })
        .collect();

    let assumptions = serde_json::json!({
        "model": "r(s) = L / (1 + exp(-k (s - s0)))",
        "solver": "Levenberg-Marquardt",
        "max_iterations": MAX_ITERATIONS,
    });

    Ok(with_metadata(
        "Logistic ESG score / return fit",
        &assumptions,
        warnings,
        start.elapsed().as_micros() as u64,
        ReturnCorrelationOutput { fit, predictions },
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(l: f64, k: f64, s0: f64) -> Vec<ReturnObservation> {
        let truth = LogisticParams { l, k, s0 };
        (1..=9)
            .map(|i| {
                let score = i as f64 * 10.0;
                ReturnObservation {
                    score,
                    expected_return: truth.evaluate(score),
                }
            })
            .collect()
    }

    #[test]
    fn test_recovers_known_curve() {
        let fit = fit_logistic(&synthetic(12.0, 0.08, 50.0), None).unwrap();
        assert!((fit.params.l - 12.0).abs() < 1e-4, "L = {}", fit.params.l);
        assert!((fit.params.k - 0.08).abs() < 1e-5, "k = {}", fit.params.k);
        assert!((fit.params.s0 - 50.0).abs() < 1e-3, "s0 = {}", fit.params.s0);
        assert!(fit.r_squared > 0.999_999);
        assert!(fit.rmse < 1e-4);
    }

    #[test]
    fn test_midpoint_prediction_is_half_of_asymptote() {
        let fit = fit_logistic(&synthetic(12.0, 0.08, 50.0), None).unwrap();
        assert!((fit.predict(fit.params.s0) - fit.params.l / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_points() {
        let obs = &synthetic(12.0, 0.08, 50.0)[..3];
        let err = fit_logistic(obs, None).unwrap_err();
        assert!(matches!(err, EsgPeerError::InsufficientData(_)));
    }

    #[test]
    fn test_single_distinct_score_rejected() {
        let obs: Vec<ReturnObservation> = (0..5)
            .map(|i| ReturnObservation {
                score: 40.0,
                expected_return: i as f64,
            })
            .collect();
        let err = fit_logistic(&obs, None).unwrap_err();
        assert!(matches!(err, EsgPeerError::InsufficientData(_)));
    }

    #[test]
    fn test_envelope_predictions() {
        let input = ReturnCorrelationInput {
            observations: synthetic(12.0, 0.08, 50.0),
            initial_params: None,
            predict_at: vec![50.0, 90.0],
        };
        let out = fit_return_correlation(&input).unwrap();
        assert_eq!(out.result.predictions.len(), 2);
        assert!((out.result.predictions[0].expected_return - 6.0).abs() < 1e-3);
        assert!(out.warnings.is_empty());
    }
}
