use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use esg_peer_core::scoring::size::{self, SizeClassificationInput};

use crate::input;

/// Arguments for size classification
#[derive(Args)]
pub struct ClassifySizeArgs {
    /// Annual revenue
    #[arg(long)]
    pub revenue: Option<Decimal>,

    /// Number of employees
    #[arg(long)]
    pub employees: Option<u64>,

    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_classify_size(args: ClassifySizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let size_input: SizeClassificationInput = match (args.revenue, args.employees) {
        (Some(revenue), Some(employees)) => SizeClassificationInput { revenue, employees },
        (None, None) => input::stdin::read_input(args.input.as_deref(), "size classification")?,
        _ => return Err("--revenue and --employees must be given together".into()),
    };
    let result = size::classify_size(&size_input)?;
    Ok(serde_json::to_value(result)?)
}
