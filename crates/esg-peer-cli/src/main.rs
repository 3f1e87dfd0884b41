mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::compliance::{ComplianceCheckArgs, CsrdSummaryArgs, EsrsCheckArgs};
use commands::estimators::{BetaArgs, DisclosureArgs, RegressionArgs};
use commands::returns::FitReturnsArgs;
use commands::scoring::ScoreArgs;
use commands::size::ClassifySizeArgs;

/// Peer-benchmarked ESG scoring
#[derive(Parser)]
#[command(
    name = "esgp",
    version,
    about = "Peer-benchmarked ESG scoring and disclosure compliance",
    long_about = "Scores a company's ESG metrics against industry and size-tier peer \
                  benchmarks using regression and Beta-distribution percentiles, rolls \
                  them up into capped E/S/G pillars, and checks SFDR/ESRS/CSRD \
                  disclosure compliance."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a company into a size tier from revenue and headcount
    ClassifySize(ClassifySizeArgs),
    /// Score companies against peer benchmarks
    Score(ScoreArgs),
    /// Regression residual percentile against a benchmark table
    RegressionPercentile(RegressionArgs),
    /// Beta-distribution percentile of a percentage metric
    BetaPercentile(BetaArgs),
    /// Score a disclosure and compute the peer disclosure rate
    DisclosureRate(DisclosureArgs),
    /// Fit the logistic ESG score / expected return curve
    FitReturns(FitReturnsArgs),
    /// Run SFDR / ESRS / IFRS S2 / EU Taxonomy rule checks
    ComplianceCheck(ComplianceCheckArgs),
    /// Check an ESRS disclosure questionnaire
    EsrsCheck(EsrsCheckArgs),
    /// Summarise CSRD readiness from an ESRS questionnaire
    CsrdSummary(CsrdSummaryArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::ClassifySize(args) => commands::size::run_classify_size(args),
        Commands::Score(args) => commands::scoring::run_score(args),
        Commands::RegressionPercentile(args) => commands::estimators::run_regression(args),
        Commands::BetaPercentile(args) => commands::estimators::run_beta(args),
        Commands::DisclosureRate(args) => commands::estimators::run_disclosure(args),
        Commands::FitReturns(args) => commands::returns::run_fit_returns(args),
        Commands::ComplianceCheck(args) => commands::compliance::run_compliance_check(args),
        Commands::EsrsCheck(args) => commands::compliance::run_esrs_check(args),
        Commands::CsrdSummary(args) => commands::compliance::run_csrd_summary(args),
        Commands::Version => {
            println!("esgp {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
