use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oppreport", about = "Closed-won opportunity report generator")]
struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process trigger events from a JSON file (one event or an array)
    Run {
        /// Path to the events file
        events: PathBuf,
    },
    /// Render a PDF locally from a records file, without collaborators
    Render {
        /// Path to a JSON array of opportunity records
        records: PathBuf,
        /// Path to the summary text to lay out
        #[arg(long)]
        summary: PathBuf,
        /// Output PDF path
        #[arg(long, default_value = "Business_Opportunities_Report.pdf")]
        out: PathBuf,
    },
}

fn read_events(path: &PathBuf) -> anyhow::Result<Vec<oppreport::Event>> {
    let raw = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let events = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        _ => vec![serde_json::from_value(value)?],
    };
    Ok(events)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Run { events } => {
            let events = read_events(&events)?;
            let reports = oppreport::run_events(&events).await;
            let mut failed = 0usize;
            for (index, report) in reports.iter().enumerate() {
                match report.status {
                    oppreport::RunStatus::Delivered => {
                        eprintln!("[{}] delivered", index + 1);
                    }
                    oppreport::RunStatus::Halted => {
                        eprintln!(
                            "[{}] halted: {}",
                            index + 1,
                            report.detail.as_deref().unwrap_or("")
                        );
                    }
                    oppreport::RunStatus::Failed => {
                        failed += 1;
                        eprintln!(
                            "[{}] failed: {}",
                            index + 1,
                            report.detail.as_deref().unwrap_or("")
                        );
                    }
                }
            }
            println!("{}", serde_json::to_string_pretty(&reports)?);
            if failed > 0 {
                anyhow::bail!("{failed} of {} events failed", reports.len());
            }
        }
        Commands::Render {
            records,
            summary,
            out,
        } => {
            let raw = fs::read_to_string(&records)?;
            let records: Vec<oppreport::OpportunityRecord> = serde_json::from_str(&raw)?;
            let summary = fs::read_to_string(&summary)?;
            let aggregates = oppreport::OwnerAggregates::from_records(&records);
            let bytes = oppreport::report::render(&summary, &aggregates)?;
            fs::write(&out, &bytes)?;
            eprintln!("wrote {} bytes to {}", bytes.len(), out.display());
        }
    }

    Ok(())
}
