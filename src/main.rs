//! Scenarist - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use scenarist::{HttpRequestContext, Scenarist, ScenaristConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "scenarist",
    about = "Scenario-based HTTP mock selection - validate scenario files and dry-run requests",
    version
)]
struct Args {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long, default_value = "scenarist.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Method of the request to resolve
    #[arg(short, long, default_value = "GET")]
    method: String,

    /// URL of the request to resolve; enables dry-run mode
    #[arg(short, long)]
    url: Option<String>,

    /// JSON request body
    #[arg(short, long)]
    body: Option<String>,

    /// Request header as `name:value` (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    headers: Vec<String>,

    /// Test id to resolve under (defaults to the test-id header, then settings)
    #[arg(short, long)]
    test_id: Option<String>,

    /// Scenario to activate before resolving
    #[arg(short, long)]
    scenario: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print default config if requested
    if args.print_config {
        let default_config = include_str!("../config/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        ScenaristConfig::from_file(&args.config)?
    } else if args.validate || args.url.is_some() {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no scenarios)");
        ScenaristConfig::default()
    };

    // Validate and exit if requested
    if args.validate {
        config.validate()?;
        let mocks: usize = config.scenarios.iter().map(|s| s.mocks.len()).sum();
        println!(
            "Configuration is valid ({} scenarios, {} mocks defined)",
            config.scenarios.len(),
            mocks
        );
        return Ok(());
    }

    let Some(url) = args.url else {
        println!("Nothing to do: pass --validate, --print-config or --url");
        return Ok(());
    };

    let scenarist = Scenarist::new(config)?;

    let mut request = HttpRequestContext::new(&args.method, &url);
    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Header must be NAME:VALUE, got {header:?}"))?;
        request = request.with_header(name.trim(), value.trim());
    }
    if let Some(body) = &args.body {
        let body = serde_json::from_str(body).context("Request body is not valid JSON")?;
        request = request.with_body(body);
    }

    let test_id = args
        .test_id
        .unwrap_or_else(|| scenarist.test_id_for(&request.headers));

    if let Some(scenario) = &args.scenario {
        scenarist.switch_scenario(&test_id, scenario)?;
    }

    info!(
        test_id = %test_id,
        scenario = %scenarist.active_scenario(&test_id),
        method = %request.method,
        url = %request.url,
        "Resolving request"
    );

    let response = scenarist.respond(&test_id, &request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
