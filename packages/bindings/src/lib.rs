use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use esg_peer_core::scoring::benchmark::FsBenchmarkRepository;
use esg_peer_core::scoring::company::CompanyRecord;
use esg_peer_core::scoring::metric_spec::ScoringConfig;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Request body for `scoreCompany`.
#[derive(Deserialize)]
struct ScoreCompanyRequest {
    record: CompanyRecord,
    benchmark_root: String,
    #[serde(default)]
    config: ScoringConfig,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[napi]
pub fn classify_size(input_json: String) -> NapiResult<String> {
    let input: esg_peer_core::scoring::size::SizeClassificationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = esg_peer_core::scoring::size::classify_size(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn score_company(input_json: String) -> NapiResult<String> {
    let request: ScoreCompanyRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let repo = FsBenchmarkRepository::new(request.benchmark_root);
    let output =
        esg_peer_core::scoring::pipeline::score_company(&request.record, &request.config, &repo)
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn default_scoring_config() -> NapiResult<String> {
    serde_json::to_string(&ScoringConfig::default()).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Estimators
// ---------------------------------------------------------------------------

#[napi]
pub fn regression_percentile(input_json: String) -> NapiResult<String> {
    let input: esg_peer_core::scoring::regression::RegressionPercentileInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = esg_peer_core::scoring::regression::calculate_regression_percentile(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn beta_percentile(input_json: String) -> NapiResult<String> {
    let input: esg_peer_core::scoring::beta::BetaPercentileInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        esg_peer_core::scoring::beta::calculate_beta_percentile(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn disclosure_rate(input_json: String) -> NapiResult<String> {
    let input: esg_peer_core::scoring::disclosure::DisclosureRateInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = esg_peer_core::scoring::disclosure::calculate_disclosure_rate(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn fit_return_correlation(input_json: String) -> NapiResult<String> {
    let input: esg_peer_core::returns::logistic::ReturnCorrelationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = esg_peer_core::returns::logistic::fit_return_correlation(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Compliance
// ---------------------------------------------------------------------------

#[napi]
pub fn compliance_check(input_json: String) -> NapiResult<String> {
    let input: esg_peer_core::compliance::rules::ComplianceCheckInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = esg_peer_core::compliance::rules::check_compliance_rows(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn esrs_check(input_json: String) -> NapiResult<String> {
    let input: esg_peer_core::compliance::esrs::EsrsCheckInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = esg_peer_core::compliance::esrs::check_esrs_disclosures(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn csrd_summary(input_json: String) -> NapiResult<String> {
    let input: esg_peer_core::compliance::esrs::EsrsCheckInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = esg_peer_core::compliance::esrs::generate_csrd_summary(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
