use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use planboard::cli::{Cli, Commands};
use planboard::config::Config;
use planboard::domain::{DurationBucket, NewAnnotation};
use planboard::id::generate_detail_id;
use planboard::server::{self, AppContext};
use planboard::storage::{self, Storage, clamp_count};
use planboard::summary::build_summary;

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("planboard")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("planboard.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let env = env_logger::Env::default().default_filter_or(level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let storage = storage::open(&config.storage).context("Failed to open storage")?;
    if cli.is_verbose() {
        println!(
            "{} {} at {}",
            "Storage:".green(),
            storage.backend(),
            config.storage.data_dir.display()
        );
    }

    match &cli.command {
        Commands::Serve { host, port } => handle_serve(storage, config, host.clone(), *port).await,
        Commands::Counts { duration, ids } => handle_counts(storage.as_ref(), duration, ids.as_deref()),
        Commands::Bump { item_id, duration, dec } => handle_bump(storage.as_ref(), item_id, duration, *dec),
        Commands::Set { item_id, duration, value } => handle_set(storage.as_ref(), item_id, duration, *value),
        Commands::Annotate {
            item_id,
            section,
            text,
            detail_id,
            parent_title,
            phase_title,
            durations,
            author,
        } => {
            let detail_id = detail_id.clone().unwrap_or_else(|| generate_detail_id(item_id));
            let mut record = NewAnnotation::new(detail_id, item_id.as_str(), section.as_str(), text.as_str())?;
            record.parent_title = parent_title.clone();
            record.phase_title = phase_title.clone();
            record.allowed_durations = durations.clone();
            record.author = author.clone();
            handle_annotate(storage.as_ref(), &record)
        }
        Commands::Annotations => handle_annotations(storage.as_ref()),
        Commands::Summary => handle_summary(storage.as_ref()),
        Commands::Backend => {
            println!("{}", storage.backend());
            Ok(())
        }
    }
}

async fn handle_serve(storage: Arc<dyn Storage>, config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut server_config = config.server;
    if let Some(host) = host {
        server_config.host = host;
    }
    if let Some(port) = port {
        server_config.port = port;
    }

    let addr = server_config.bind_addr();
    println!(
        "{} http://{} ({} backend)",
        "Serving".green(),
        addr,
        storage.backend()
    );

    let ctx = Arc::new(AppContext::new(storage));
    server::serve(ctx, &addr).await.context(format!("Server on {} failed", addr))?;
    println!("{}", "Server stopped".cyan());
    Ok(())
}

fn handle_counts(storage: &dyn Storage, duration: &str, ids: Option<&str>) -> Result<()> {
    let duration: DurationBucket = duration.parse()?;
    info!("Listing counts for duration {}", duration);

    if let Some(ids) = ids {
        for id in ids.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            storage.ensure_seed(id, duration)?;
        }
    }

    let counts = storage.counts_for_duration(duration)?;
    println!("{} {}", "Counts for".green(), duration.display_name());
    if counts.is_empty() {
        println!("  (none)");
    }
    for (id, count) in counts {
        println!("  {:>4}  {}", count, id);
    }
    Ok(())
}

fn handle_bump(storage: &dyn Storage, item_id: &str, duration: &str, dec: bool) -> Result<()> {
    let duration: DurationBucket = duration.parse()?;
    let delta = if dec { -1 } else { 1 };
    info!("Bumping {} for {} by {}", item_id, duration, delta);

    storage.increment(item_id, duration, delta)?;
    let count = storage
        .counts_for_duration(duration)?
        .get(item_id)
        .copied()
        .unwrap_or(0);
    println!("{} {} -> {}", "Updated:".green(), item_id, count);
    Ok(())
}

fn handle_set(storage: &dyn Storage, item_id: &str, duration: &str, value: i64) -> Result<()> {
    let duration: DurationBucket = duration.parse()?;
    info!("Setting {} for {} to {}", item_id, duration, value);

    storage.set_count(item_id, duration, value)?;
    println!("{} {} -> {}", "Set:".green(), item_id, clamp_count(value));
    Ok(())
}

fn handle_annotate(storage: &dyn Storage, record: &NewAnnotation) -> Result<()> {
    info!("Upserting annotation {}", record.detail_id);
    storage.upsert(record)?;
    println!("{} {}", "Saved:".green(), record.detail_id);
    Ok(())
}

fn handle_annotations(storage: &dyn Storage) -> Result<()> {
    let rows = storage.list_all()?;
    if rows.is_empty() {
        println!("{}", "No annotations yet".yellow());
    }
    for row in rows {
        let when = chrono::DateTime::from_timestamp_millis(row.created_at)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{} {} [{}] {}", when.dimmed(), row.detail_id.cyan(), row.section, row.text);
        if let Some(author) = &row.author {
            println!("    by {}", author);
        }
    }
    Ok(())
}

fn handle_summary(storage: &dyn Storage) -> Result<()> {
    let summary = build_summary(storage)?;
    let header: Vec<&str> = DurationBucket::ALL.iter().map(|d| d.display_name()).collect();
    println!("{}", header.join(" | ").bold());

    for row in &summary.rows {
        let cells: Vec<String> = DurationBucket::ALL
            .iter()
            .map(|d| match row.per_duration.get(d.as_str()).copied().flatten() {
                Some(n) => n.to_string(),
                None => "-".to_string(),
            })
            .collect();
        println!("{}  {}", cells.join(" | "), row.text);
    }

    if !summary.items.is_empty() {
        println!("{}", "Per item".bold());
        for item in &summary.items {
            let cells: Vec<String> = DurationBucket::ALL
                .iter()
                .map(|d| item.per_duration.get(d.as_str()).copied().unwrap_or(0).to_string())
                .collect();
            let title = item.parent_title.as_deref().unwrap_or(&item.item_id);
            println!("{}  {}", cells.join(" | "), title);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}
