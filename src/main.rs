use anyhow::{bail, Context, Result};
use bibliofetch::config::{default_config_path, find_config_file, load_config, ConfigFile};
use bibliofetch::sources::{ScholarFetcher, ScopusApiFetcher, ScopusBatchFetcher};
use bibliofetch::{CancelSignal, FetchResult, FetcherRegistry};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// bibliofetch - fetch bibliographic records from Google Scholar and Scopus
#[derive(Parser, Debug)]
#[command(name = "bibliofetch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch bibliographic records from Google Scholar and Scopus", long_about = None)]
struct Cli {
    /// Search query
    #[arg(required_unless_present = "init_config")]
    query: Option<String>,

    /// Fetch from Google Scholar
    #[arg(long, short = 'g')]
    scholar: bool,

    /// Fetch with the Scopus batch export
    #[arg(long, short = 'b')]
    scopus_batch: bool,

    /// Fetch from the Scopus Search API
    #[arg(long, short = 's')]
    scopus_api: bool,

    /// Fetch from every provider
    #[arg(long, short = 'a')]
    all: bool,

    /// Egress proxy (repeat for a rotation pool)
    #[arg(long = "proxy", short = 'p')]
    proxies: Vec<String>,

    /// Send all traffic through this proxy instead of the pool
    #[arg(long)]
    debug_proxy: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    ssl_insecure: bool,

    /// Parse this export dump instead of exporting from Scopus
    #[arg(long)]
    scopus_batch_file: Option<PathBuf>,

    /// Write the raw Scopus export here
    #[arg(long)]
    raw_output: Option<PathBuf>,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,

    /// Enable verbose logging (-v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Write results here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn init_tracing(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("bibliofetch={}", level)),
    );

    // Logs go to stderr so stdout stays valid JSON
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if cli.init_config {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => default_config_path().context("no configuration directory on this system")?,
        };
        if path.exists() {
            bail!("{} already exists", path.display());
        }
        ConfigFile::save(&Default::default(), &path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config_path = cli.config.clone().or_else(find_config_file);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }
    let mut config = load_config(config_path.as_deref()).context("failed to load configuration")?;

    if !cli.proxies.is_empty() {
        config.http.proxies = cli.proxies.clone();
    }
    if cli.debug_proxy.is_some() {
        config.http.debug_proxy = cli.debug_proxy.clone();
    }
    if cli.ssl_insecure {
        config.http.ssl_insecure = true;
    }

    let query = cli.query.clone().unwrap_or_default();
    let request = config.http.request(query);

    let mut registry = FetcherRegistry::new();
    if cli.scholar || cli.all {
        registry = registry.with(ScholarFetcher::from_config(&config.scholar, &config.http));
    }
    if cli.scopus_batch || cli.all {
        let mut fetcher = ScopusBatchFetcher::from_config(&config.scopus_batch);
        if let Some(path) = &cli.scopus_batch_file {
            fetcher = fetcher.input_file(path);
        }
        if let Some(path) = &cli.raw_output {
            fetcher = fetcher.raw_output(path);
        }
        registry = registry.with(fetcher);
    }
    if cli.scopus_api || cli.all {
        registry = registry.with(ScopusApiFetcher::from_config(&config.scopus_api, &config.http));
    }
    if registry.is_empty() {
        bail!("no provider selected (use -g, -b, -s or -a)");
    }

    let (cancel_tx, cancel) = CancelSignal::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, returning partial results");
            let _ = cancel_tx.send(true);
        }
    });

    let results = registry.run_all(&request, cancel).await;
    report(&results);

    let json = serde_json::to_string_pretty(&results)?;
    match &cli.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", json),
    }

    Ok(())
}

fn report(results: &[FetchResult]) {
    for result in results {
        tracing::info!(
            module = %result.module,
            entities = result.payload.len(),
            errors = result.errors.len(),
            "fetch finished"
        );
        for error in &result.errors {
            eprintln!("[{}] {}", result.module, error);
        }
    }
}
