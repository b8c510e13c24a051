use anyhow::Context;
use bursa_etl::app::ports::RunStorePort;
use bursa_etl::config::Config;
use bursa_etl::domain::Layer;
use bursa_etl::infra::run_store::SqliteRunStore;
use bursa_etl::logging;
use bursa_etl::observability::metrics;
use bursa_etl::pipeline::processing::quality_gate::Ruleset;
use bursa_etl::pipeline::{BursaJob, JobReport, JobRun};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "bursa_etl")]
#[command(about = "Bursa market share curation job: raw to silver and gold")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config (defaults to $BURSA_CONFIG or ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the job once: dedup, silver and gold transforms, data quality, sinks
    Run {
        /// Name the run is recorded under
        #[arg(long)]
        job_name: String,
    },
    /// Print the shaped output of one layer as JSON lines without writing it
    Preview {
        #[arg(long, value_enum)]
        layer: Layer,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show recent runs of a job
    History {
        #[arg(long)]
        job_name: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Parse a ruleset file and print the normalized rules
    CheckRuleset { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = logging::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { job_name } => {
            let config = Config::load(cli.config.as_deref())?;
            metrics::init();

            let store: Arc<dyn RunStorePort> = Arc::new(
                SqliteRunStore::open(&config.run_store.path)
                    .with_context(|| format!("opening run store {}", config.run_store.path.display()))?,
            );
            let job = BursaJob::from_config(&config)?;
            let run = JobRun::init(&job_name, store)?;
            let run_id = run.run_id().to_string();

            println!("🚀 Running {} ({})...", job_name, run_id);
            let outcome = job.run(run).await;

            if let Some(url) = config.metrics.pushgateway_url.as_deref() {
                if let Err(e) = metrics::push_to_gateway(url, &job_name, &run_id).await {
                    warn!("Failed to push metrics to {}: {}", url, e);
                }
            }

            match outcome {
                Ok(report) => {
                    print_report(&report);
                    println!("✅ Job completed successfully");
                }
                Err(e) => {
                    error!("Job {} failed: {}", job_name, e);
                    println!("❌ Job failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Preview { layer, limit } => {
            let config = Config::load(cli.config.as_deref())?;
            let job = BursaJob::from_config(&config)?;
            let frame = job.preview(layer, Some(limit)).await?;

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for row in frame.iter() {
                serde_json::to_writer(&mut out, &row)?;
                out.write_all(b"\n")?;
            }
            info!("Previewed {} {} rows", frame.row_count(), layer);
        }
        Commands::History { job_name, limit } => {
            let config = Config::load(cli.config.as_deref())?;
            let store = SqliteRunStore::open(&config.run_store.path)?;
            let runs = store.recent_runs(&job_name, limit)?;
            if runs.is_empty() {
                println!("No runs recorded for {}", job_name);
            }
            for run in runs {
                let finished = run
                    .finished_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<9}  started {}  finished {}  rows {}{}",
                    run.run_id,
                    run.status,
                    run.started_at.to_rfc3339(),
                    finished,
                    run.rows_read,
                    run.message.map(|m| format!("  ({})", m)).unwrap_or_default()
                );
            }
        }
        Commands::CheckRuleset { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading ruleset {}", file.display()))?;
            let ruleset = Ruleset::parse(&text)?;
            println!("{}", ruleset);
        }
    }

    Ok(())
}

fn print_report(report: &JobReport) {
    println!("\n📊 Results for run {}:", report.run_id);
    println!("   Rows read: {}", report.rows_read);
    println!("   Duplicates dropped: {}", report.duplicates_dropped);
    for output in &report.outputs {
        let dq = if output.data_quality.passed {
            "passed".to_string()
        } else {
            format!("{} rule(s) failed", output.data_quality.failed_count())
        };
        println!("   {}: {} rows, data quality {}", output.layer, output.rows, dq);
        println!("      File: {}", output.receipt.path.display());
        if let Some(table) = &output.receipt.catalog_table {
            println!("      Catalog: {}", table);
        }
    }
}
