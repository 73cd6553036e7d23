//! pokepricer — Pokemon card price aggregator
//!
//! Entry point. Initialises structured logging, loads configuration,
//! registers the price sources and either prices a single card given on
//! the command line or runs an interactive prompt loop.
//!
//! Usage:
//!   pokepricer [--json] <card name> [language] [condition]
//!   pokepricer            (interactive)

use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use pokepricer::config;
use pokepricer::engine::aggregator::PriceAggregator;
use pokepricer::sources::build_sources;
use pokepricer::sources::ebay::EbayCondition;
use pokepricer::types::PriceQuery;

const BANNER: &str = r#"
  ╔════════════════════════════════════════════════════════╗
  ║          POKEMON CARD PRICING TOOL                     ║
  ║  Get prices from eBay, TCGPlayer & more!               ║
  ╚════════════════════════════════════════════════════════╝
"#;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("POKEPRICER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    init_logging();

    let cfg = config::AppConfig::load_or_default(&config_path)?;

    let sources = build_sources(&cfg.sources)?;
    let aggregator = PriceAggregator::new(
        sources,
        Duration::from_secs(cfg.aggregator.source_timeout_secs),
    );
    info!(
        name = %cfg.app.name,
        sources = ?aggregator.source_names(),
        timeout_secs = cfg.aggregator.source_timeout_secs,
        "pokepricer ready"
    );

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let json = args.first().is_some_and(|a| a == "--json");
    if json {
        args.remove(0);
    }

    if let Some(card_name) = args.first() {
        let query = PriceQuery::new(
            card_name,
            args.get(1).map(String::as_str),
            args.get(2).map(String::as_str),
        )?;
        let result = aggregator.aggregate(&query).await;
        if json {
            let body = serde_json::to_string_pretty(&result)
                .context("Failed to serialise pricing result")?;
            println!("{body}");
        } else {
            println!("\n{result}\n");
        }
        return Ok(());
    }

    println!("{BANNER}");
    tokio::select! {
        res = interactive(&aggregator) => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    println!("\nThank you for using Pokemon Card Pricing Tool!");
    Ok(())
}

/// Prompt for cards until the user quits or stdin closes.
async fn interactive(aggregator: &PriceAggregator) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let Some(card_name) =
            prompt(&mut lines, "\nEnter Pokemon card name (or 'quit' to exit): ").await?
        else {
            return Ok(());
        };

        if matches!(card_name.to_lowercase().as_str(), "quit" | "exit" | "q") {
            return Ok(());
        }
        if card_name.is_empty() {
            println!("Please enter a valid card name.");
            continue;
        }

        println!("\nAvailable languages: English, Japanese, French, German, Spanish, Italian, etc.");
        let language = prompt(&mut lines, "Enter card language (default: English): ")
            .await?
            .unwrap_or_default();

        println!("\nAvailable conditions:");
        for condition in EbayCondition::ALL {
            println!("  - {condition}");
        }
        let condition = prompt(&mut lines, "Enter card condition (default: Near Mint): ")
            .await?
            .unwrap_or_default();

        match PriceQuery::new(&card_name, Some(&language), Some(&condition)) {
            Ok(query) => {
                let result = aggregator.aggregate(&query).await;
                println!("\n{result}\n");
            }
            Err(e) => println!("{e}"),
        }

        let again = prompt(&mut lines, "Search for another card? (y/n): ")
            .await?
            .unwrap_or_default()
            .to_lowercase();
        if !matches!(again.as_str(), "y" | "yes" | "") {
            return Ok(());
        }
    }
}

/// Print a prompt and read one trimmed line; `None` at end of input.
async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> Result<Option<String>> {
    print!("{text}");
    std::io::stdout().flush().context("Failed to flush stdout")?;
    let line = lines.next_line().await.context("Failed to read stdin")?;
    Ok(line.map(|l| l.trim().to_string()))
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pokepricer=info"));

    let json_logging = std::env::var("POKEPRICER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
