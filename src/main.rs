//! ovh-ddns - keeps OVH DNS records pointed at your public IP.

use clap::{Parser, Subcommand};
use ovh_ddns::config::Config;
use ovh_ddns::detector::HttpIpSource;
use ovh_ddns::engine::{DomainStatus, Engine, PassReport};
use ovh_ddns::ovh::{OvhClient, ZoneRecordStore};
use ovh_ddns::resolver::AuthoritativeResolver;
use ovh_ddns::scheduler::Scheduler;
use ovh_ddns::server::EchoServer;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "ovh-ddns")]
#[command(about = "Keeps OVH-hosted DNS records in sync with your public IP")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the public IP and what DNS currently answers
    Status,

    /// Run a single reconciliation pass
    Update,

    /// Run as daemon (background service)
    Daemon {
        /// Check interval in seconds (overrides the config, still raised to the lowest TTL)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Delete every managed record
    Clean,

    /// Serve the caller's IP from proxy headers
    Server,

    /// Request an OVH consumer key and store it in the config
    Setup,

    /// Validate configuration and API access
    Validate,
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    // Default locations
    let candidates = [
        dirs::config_dir().map(|p| p.join("ovh-ddns/config.toml")),
        Some(PathBuf::from("/etc/ovh-ddns/config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    // Return default even if it doesn't exist
    Config::default_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = get_config_path(cli.config);
    let config = Config::load_from(&config_path)?;

    match cli.command {
        Commands::Status => cmd_status(config).await?,
        Commands::Update => cmd_update(config).await?,
        Commands::Daemon { interval } => cmd_daemon(config, interval).await?,
        Commands::Clean => cmd_clean(config).await?,
        Commands::Server => cmd_server(config).await?,
        Commands::Setup => cmd_setup(config, &config_path).await?,
        Commands::Validate => cmd_validate(config).await?,
    }

    Ok(())
}

async fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    config.validate()?;

    let timeout = config.request_timeout();
    let resolver = AuthoritativeResolver::new(config.dns_server_addr().await?, timeout);
    tracing::debug!(dns_server = %resolver.server(), "Using authoritative DNS server");

    let client = OvhClient::new(&config.ovh.resolved(), timeout)?;

    Ok(Engine::new(
        Box::new(HttpIpSource::new(timeout)?),
        Box::new(resolver),
        ZoneRecordStore::new(Box::new(client)),
        config.domains.clone(),
        config.ip_url.clone(),
    ))
}

/// Check the credentials can reach every configured zone.
async fn check_access(engine: &Engine) -> anyhow::Result<()> {
    let mut seen = HashSet::new();

    for domain in engine.domains() {
        if seen.insert(domain.zone.as_str()) {
            engine
                .store()
                .check_access(domain)
                .await
                .map_err(|e| anyhow::anyhow!("cannot access zone {}: {}", domain.zone, e))?;
        }
    }

    Ok(())
}

/// Resolves once SIGINT or SIGTERM arrives.
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for SIGTERM, only Ctrl-C will stop");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = tx.send(true);
    });

    rx
}

fn print_report(report: &PassReport) {
    println!("Current IP: {}", report.external_ip);
    println!();

    for domain in &report.domains {
        print!("  {}: ", domain.hostname);

        match &domain.outcome {
            Ok(DomainStatus::InSync) => println!("in sync"),
            Ok(DomainStatus::Created(record)) => println!("created ({})", record.target),
            Ok(DomainStatus::Updated { previous, record }) => {
                println!("updated ({} -> {})", previous, record.target)
            }
            Ok(DomainStatus::TargetAlreadyCurrent) => {
                println!("record already current, waiting for DNS to catch up")
            }
            Err(e) => println!("FAILED - {}", e),
        }
    }
}

async fn cmd_status(config: Config) -> anyhow::Result<()> {
    let engine = build_engine(&config).await?;

    println!("ovh-ddns Status");
    println!("===============\n");

    match engine.external_ip().await {
        Ok(ip) => println!("Current Public IP: {}", ip),
        Err(e) => println!("Failed to detect IP: {}", e),
    }

    println!("\nDomains:");
    println!("--------");

    for (hostname, answer) in engine.lookup_all().await {
        match answer {
            Ok(Some(ip)) => println!("  {}: {}", hostname, ip),
            Ok(None) => println!("  {}: (no record)", hostname),
            Err(e) => println!("  {}: error: {}", hostname, e),
        }
    }

    Ok(())
}

async fn cmd_update(config: Config) -> anyhow::Result<()> {
    let engine = build_engine(&config).await?;
    let report = engine.run_pass().await?;

    print_report(&report);

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} domains failed",
            report.failures(),
            report.domains.len()
        );
    }

    Ok(())
}

async fn cmd_daemon(mut config: Config, interval: Option<u64>) -> anyhow::Result<()> {
    if let Some(interval) = interval {
        config.check_interval_secs = interval;
    }

    let engine = build_engine(&config).await?;
    check_access(&engine).await?;

    let scheduler = Scheduler::from_config(&config);
    let shutdown = shutdown_channel();

    tracing::info!(
        interval_secs = scheduler.interval().as_secs(),
        "Starting ovh-ddns daemon"
    );
    scheduler.run(&engine, shutdown).await;
    tracing::info!("ovh-ddns daemon stopped");

    Ok(())
}

async fn cmd_clean(config: Config) -> anyhow::Result<()> {
    let engine = build_engine(&config).await?;
    let mut failed = 0;

    for domain in engine.domains() {
        print!("Deleting {}... ", domain.hostname());

        match engine.store().delete_record(domain).await {
            Ok(true) => println!("OK"),
            Ok(false) => println!("skipped (no record)"),
            Err(e) => {
                println!("ERROR: {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} records could not be deleted", failed);
    }

    Ok(())
}

async fn cmd_server(config: Config) -> anyhow::Result<()> {
    let server = EchoServer::bind(&config.server_address).await?;
    server.serve(shutdown_channel()).await?;
    Ok(())
}

async fn cmd_setup(mut config: Config, config_path: &PathBuf) -> anyhow::Result<()> {
    let ovh = config.ovh.resolved();
    let client = OvhClient::new(&ovh, config.request_timeout())?;
    let request = client.request_consumer_key().await?;

    config.ovh.consumer_key = request.consumer_key.clone();
    config.save_to(config_path)?;

    println!("Consumer key saved to {}", config_path.display());
    println!();
    println!("Open this URL to grant access before running the daemon:");
    println!("  {}", request.validation_url);

    Ok(())
}

async fn cmd_validate(config: Config) -> anyhow::Result<()> {
    println!("Validating configuration...\n");

    let engine = build_engine(&config).await?;
    println!(
        "  {} domains, check interval {}s",
        engine.domains().len(),
        Scheduler::from_config(&config).interval().as_secs()
    );

    match check_access(&engine).await {
        Ok(()) => {
            println!("  OVH API access: OK");
            println!("\nConfiguration is valid.");
            Ok(())
        }
        Err(e) => {
            println!("  OVH API access: FAILED - {}", e);
            std::process::exit(1);
        }
    }
}
