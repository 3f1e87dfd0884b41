use clap::Args;
use serde_json::Value;

use esg_peer_core::compliance::esrs::{self, EsrsCheckInput};
use esg_peer_core::compliance::rules::{self, ComplianceCheckInput};

use crate::input;

/// Arguments for product rule checks
#[derive(Args)]
pub struct ComplianceCheckArgs {
    /// Path to JSON (`{"rows": [...]}`) or CSV input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the ESRS questionnaire check
#[derive(Args)]
pub struct EsrsCheckArgs {
    /// Path to JSON (`{"rows": [...]}`) or CSV questionnaire
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the CSRD readiness summary
#[derive(Args)]
pub struct CsrdSummaryArgs {
    /// Path to JSON (`{"rows": [...]}`) or CSV questionnaire
    #[arg(long)]
    pub input: Option<String>,

    /// Print only the narrative paragraph
    #[arg(long)]
    pub narrative_only: bool,
}

fn read_questionnaire(path: Option<&str>) -> Result<EsrsCheckInput, Box<dyn std::error::Error>> {
    match path {
        Some(p) if input::file::is_csv(p) => Ok(EsrsCheckInput {
            rows: esrs::read_disclosure_rows(input::file::open(p)?)?,
        }),
        _ => input::stdin::read_input(path, "the ESRS questionnaire"),
    }
}

pub fn run_compliance_check(
    args: ComplianceCheckArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let check_input: ComplianceCheckInput = match args.input.as_deref() {
        Some(p) if input::file::is_csv(p) => ComplianceCheckInput {
            rows: rules::read_compliance_rows(input::file::open(p)?)?,
        },
        path => input::stdin::read_input(path, "compliance checks")?,
    };
    let result = rules::check_compliance_rows(&check_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_esrs_check(args: EsrsCheckArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let questionnaire = read_questionnaire(args.input.as_deref())?;
    let result = esrs::check_esrs_disclosures(&questionnaire)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_csrd_summary(args: CsrdSummaryArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let questionnaire = read_questionnaire(args.input.as_deref())?;
    let result = esrs::generate_csrd_summary(&questionnaire)?;
    if args.narrative_only {
        return Ok(Value::String(result.result.narrative));
    }
    Ok(serde_json::to_value(result)?)
}
