//! eth-log-ingest CLI - Ethereum contract log ingestion into Redis

mod cli;

use clap::Parser;
use cli::config::ConfigCommands;
use cli::endpoints::EndpointCommands;
use cli::{Cli, Commands, RunArgs};
use eth_log_ingest::config::{
    RedisFileConfig, Settings, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES,
    DEFAULT_PROBE_TIMEOUT, DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT, DEFAULT_WINDOW,
};
use eth_log_ingest::{
    create_store, select_fastest, ConfigFile, EndpointConfig, Exporter, IngestProgress,
    LatencyProber, Pipeline, ProbeSettings, RunSummary, StoreConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    match &cli.command {
        Some(Commands::Export { output }) => run_export(&cli.run, output).await,
        Some(Commands::Endpoints { action }) => handle_endpoints(action, &cli.run).await,
        Some(Commands::Config { action }) => handle_config(action, &cli.run),
        Some(Commands::Ingest) | None => run_ingest(&cli).await,
    }
}

async fn run_ingest(cli: &Cli) -> anyhow::Result<()> {
    let file = cli.run.load_file()?;
    let config = cli.run.build_config(file.as_ref())?;

    if !cli.quiet {
        eprintln!("Probing {} RPC endpoints...", config.endpoints.len());
        if config.store == StoreConfig::InMemory {
            eprintln!("Dry run: records are kept in memory only");
        }
    }

    // Set up progress bar
    let pb = if !cli.quiet {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% ({msg})",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let pb_clone = pb.clone();
    let pipeline = Pipeline::new(config).with_progress(move |progress: IngestProgress| {
        if let Some(ref pb) = pb_clone {
            pb.set_position(progress.percent as u64);
            pb.set_message(format!(
                "{}/{} logs, {} stored, {} dropped",
                progress.completed, progress.total, progress.persisted, progress.dropped
            ));
        }
    });

    let start = Instant::now();
    let result = pipeline.run().await;

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    let summary = result?;
    if !cli.quiet {
        print_summary(&summary, start.elapsed());
    }

    Ok(())
}

fn print_summary(summary: &RunSummary, elapsed: Duration) {
    let ingest = &summary.ingest;
    let report = &ingest.report;

    if let Some(endpoint) = &summary.endpoint {
        eprintln!("Endpoint: {} ({:?})", endpoint.url, endpoint.latency);
    }
    eprintln!(
        "Blocks {}..={} (head {})",
        ingest.filter.from_block, ingest.filter.to_block, ingest.head
    );
    if let Some(count) = ingest.unfiltered_count {
        eprintln!(
            "No logs matched the topic; {} logs on the contract without it",
            count
        );
    }
    eprintln!(
        "Stored {} of {} logs in {:.2}s ({} flushes, {} failed, {} dropped)",
        report.persisted,
        report.dispatched,
        elapsed.as_secs_f64(),
        report.flushes,
        report.failed_flushes,
        report.dropped()
    );
    if !report.dropped_keys.is_empty() {
        eprintln!("Missing keys: {:?}", report.dropped_keys);
    }
    if let Some(export) = &summary.export {
        eprintln!(
            "Exported {} of {} keys ({} unreadable)",
            export.exported, export.keys_found, export.skipped
        );
    }
}

async fn run_export(run: &RunArgs, output: &Path) -> anyhow::Result<()> {
    let file = run.load_file()?;
    let store = create_store(&run.store_config(file.as_ref())).await?;
    store.ping().await?;

    let summary = Exporter::new(store).export_to_path(output).await?;
    println!(
        "Exported {} keys to {} ({} skipped)",
        summary.exported,
        output.display(),
        summary.skipped
    );
    Ok(())
}

async fn handle_endpoints(action: &EndpointCommands, run: &RunArgs) -> anyhow::Result<()> {
    let file = run.load_file()?;
    let endpoints = run.endpoints(file.as_ref());

    match action {
        EndpointCommands::List => {
            if endpoints.is_empty() {
                println!("No endpoints configured. Use --rpc, RPC_ENDPOINTS or the config file.");
                return Ok(());
            }

            println!("RPC ENDPOINTS ({})\n", endpoints.len());
            for url in &endpoints {
                let note = file
                    .as_ref()
                    .and_then(|f| f.endpoints.iter().find(|e| &e.url == url))
                    .and_then(|e| e.note.as_ref())
                    .map(|n| format!(" ({})", n))
                    .unwrap_or_default();
                println!("  {}{}", url, note);
            }
        }

        EndpointCommands::Probe => {
            let mut probe = ProbeSettings::default();
            if let Some(ms) = file.as_ref().and_then(|f| f.settings.probe_timeout_ms) {
                probe.timeout = Duration::from_millis(ms);
            }

            let prober = LatencyProber::new(probe)?;
            let latencies = prober.measure(&endpoints).await;
            let selection = select_fastest(&endpoints, &latencies)?;

            for (i, (url, latency)) in endpoints.iter().zip(&latencies).enumerate() {
                let status = if *latency >= prober.failure_latency() {
                    "unreachable".to_string()
                } else {
                    format!("{:?}", latency)
                };
                let marker = if i == selection.index { "*" } else { " " };
                println!("{} {:<60} {}", marker, url, status);
            }
            println!("\nSelected: {}", selection.url);
        }
    }

    Ok(())
}

fn handle_config(action: &ConfigCommands, run: &RunArgs) -> anyhow::Result<()> {
    let path = run
        .config_path
        .clone()
        .unwrap_or_else(ConfigFile::default_path);

    match action {
        ConfigCommands::Path => {
            println!("{}", path.display());
        }

        ConfigCommands::Show => {
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                println!("# {}\n", path.display());
                println!("{}", content);
            } else {
                println!("No config file found at: {}", path.display());
                println!("\nCreate one with:");
                println!("  eth-log-ingest config init");
            }
        }

        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            starter_config().save(&path)?;
            println!("Config written to {}", path.display());
        }
    }

    Ok(())
}

fn starter_config() -> ConfigFile {
    ConfigFile {
        endpoints: vec![
            EndpointConfig::new("https://ethereum-sepolia-rpc.publicnode.com")
                .with_note("PublicNode"),
            EndpointConfig::new("https://rpc.sepolia.org").with_note("Sepolia community"),
        ],
        settings: Settings {
            window: Some(DEFAULT_WINDOW),
            batch_size: Some(DEFAULT_BATCH_SIZE),
            max_retries: Some(DEFAULT_MAX_RETRIES),
            concurrency: Some(DEFAULT_CONCURRENCY),
            probe_timeout_ms: Some(DEFAULT_PROBE_TIMEOUT.as_millis() as u64),
            topic_fallback: Some(true),
        },
        redis: Some(RedisFileConfig {
            host: Some(DEFAULT_REDIS_HOST.to_string()),
            port: Some(DEFAULT_REDIS_PORT),
            password: None,
            db: Some(0),
        }),
        ..Default::default()
    }
}
