use clap::Args;
use serde_json::Value;

use esg_peer_core::scoring::beta::{self, BetaPercentileInput};
use esg_peer_core::scoring::disclosure::{self, DisclosureRateInput};
use esg_peer_core::scoring::regression::{self, RegressionPercentileInput};

use crate::input;

/// Arguments for a regression percentile
#[derive(Args)]
pub struct RegressionArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a Beta percentile
#[derive(Args)]
pub struct BetaArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for disclosure scoring
#[derive(Args)]
pub struct DisclosureArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_regression(args: RegressionArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let reg_input: RegressionPercentileInput =
        input::stdin::read_input(args.input.as_deref(), "regression percentile")?;
    let result = regression::calculate_regression_percentile(&reg_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_beta(args: BetaArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let beta_input: BetaPercentileInput =
        input::stdin::read_input(args.input.as_deref(), "beta percentile")?;
    let result = beta::calculate_beta_percentile(&beta_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_disclosure(args: DisclosureArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let disc_input: DisclosureRateInput =
        input::stdin::read_input(args.input.as_deref(), "disclosure scoring")?;
    let result = disclosure::calculate_disclosure_rate(&disc_input)?;
    Ok(serde_json::to_value(result)?)
}
