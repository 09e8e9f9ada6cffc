use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use af_harvester::batch::{BatchReport, Harvester};
use af_harvester::config::{HarvestConfig, HttpConfig};
use af_harvester::error::HarvestError;
use af_harvester::http::ReqwestTransport;
use af_harvester::output::{JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "af-harvest")]
#[command(about = "Batch retrieval of AlphaFold and SWISS-MODEL structure predictions")]
#[command(version, author)]
struct Cli {
    /// Two-column tab-separated table: referenceId<TAB>crossRefId
    table: Utf8PathBuf,

    /// Output directory for downloaded structure files
    #[arg(long, default_value = "structures")]
    out: Utf8PathBuf,

    /// Maximum SWISS-MODEL downloads per record
    #[arg(long, default_value_t = 1)]
    swm_max: usize,

    /// Automatic retry count for transient failures
    #[arg(long, default_value_t = 3)]
    retries: usize,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Total per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::InputRead(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let config = HarvestConfig {
        output_dir: cli.out,
        swm_max: cli.swm_max,
        http: HttpConfig {
            connect_timeout: Duration::from_secs(cli.connect_timeout),
            total_timeout: Duration::from_secs(cli.timeout),
            max_retries: cli.retries,
        },
    };

    let transport = ReqwestTransport::new(config.http).into_diagnostic()?;
    let harvester = Harvester::new(transport, &config);
    let report = harvester.run(&cli.table).into_diagnostic()?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => print_summary(&report),
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let red = "\x1b[31m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    let (resolved, skipped, exhausted) = report.counts();
    println!("{cyan}af-harvest summary{reset}");
    println!("{green}resolved:  {resolved}{reset}");
    println!("{yellow}skipped:   {skipped}{reset}");
    println!("{red}exhausted: {exhausted}{reset}");

    for record in &report.records {
        match record.outcome.as_str() {
            "resolved" => {
                let mechanism = record
                    .mechanism
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "{green}  {} via {} ({}){reset}",
                    record.reference_id,
                    mechanism,
                    record.source_id.as_deref().unwrap_or("?")
                );
                for file in &record.files {
                    println!("{green}    {file}{reset}");
                }
            }
            "skipped" => println!("{yellow}  {} skipped{reset}", record.reference_id),
            _ => println!("{red}  {} exhausted{reset}", record.reference_id),
        }
    }
}
