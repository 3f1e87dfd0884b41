use clap::Args;
use serde_json::Value;

use esg_peer_core::returns::logistic::{self, ReturnCorrelationInput};

use crate::input;

/// Arguments for the score / return curve fit
#[derive(Args)]
pub struct FitReturnsArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Additional scores to predict returns for
    #[arg(long, value_delimiter = ',')]
    pub predict: Vec<f64>,
}

pub fn run_fit_returns(args: FitReturnsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut fit_input: ReturnCorrelationInput =
        input::stdin::read_input(args.input.as_deref(), "return curve fitting")?;
    fit_input.predict_at.extend(args.predict);
    let result = logistic::fit_return_correlation(&fit_input)?;
    Ok(serde_json::to_value(result)?)
}
