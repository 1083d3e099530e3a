//! CLI commands for kyotei-api.
//!
//! Supports API server mode plus one-shot chat and fetch commands for
//! checking the pipeline from a terminal.

use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::dispatcher::{RaceCache, RequestDispatcher};
use crate::query::{parse_date, today_jst};
use crate::scraper::parsers::BeforeInfoParser;
use crate::scraper::{Clock, HttpFetcher, PageFetcher, SystemClock};
use crate::summary::build_summary;
use crate::types::RaceId;

#[derive(Parser)]
#[command(name = "kyotei-api")]
#[command(version, about = "Kyotei pre-race info responder", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer one chat message, e.g. `ask 丸亀 8`
    Ask {
        #[arg(value_name = "TEXT", required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Fetch and parse one race page
    Fetch {
        /// Venue code (1-24)
        #[arg(short, long)]
        jcd: u8,

        /// Race number (1-12)
        #[arg(short, long)]
        rno: u8,

        /// Race date YYYYMMDD (default: today in JST)
        #[arg(long)]
        hd: Option<String>,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

/// Wire the production pipeline from configuration.
pub fn build_dispatcher(
    config: &AppConfig,
    fetcher: Arc<dyn PageFetcher>,
    clock: Arc<dyn Clock>,
) -> RequestDispatcher {
    let cache = Arc::new(RaceCache::new(
        chrono::Duration::seconds(config.cache.ttl_secs),
        config.cache.capacity,
        clock.clone(),
    ));
    tracing::info!(
        "Race cache: ttl {}s, capacity {}",
        cache.ttl().num_seconds(),
        config.cache.capacity
    );
    RequestDispatcher::new(cache, fetcher, clock)
}

/// Answer one message and print the reply.
pub async fn run_ask(text: Vec<String>) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);
    let dispatcher = build_dispatcher(&config, fetcher, Arc::new(SystemClock));

    let reply = dispatcher.handle(&text.join(" ")).await;
    println!("{}", reply);
    Ok(())
}

/// Fetch one race page and print the extraction result.
pub async fn run_fetch(jcd: u8, rno: u8, hd: Option<String>, format: String) -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    let date = match hd {
        Some(hd) => parse_date(&hd).ok_or_else(|| anyhow::anyhow!("Invalid date: {} (YYYYMMDD)", hd))?,
        None => today_jst(SystemClock.now()),
    };
    let id = RaceId::new(jcd, rno, date)
        .ok_or_else(|| anyhow::anyhow!("Invalid race: jcd={} rno={} (jcd 1-24, rno 1-12)", jcd, rno))?;

    let fetcher = HttpFetcher::new(&config.fetch)?;
    eprintln!("Fetching: {}", fetcher.url_for(&id));
    let page = fetcher.fetch(&id).await?;
    let info = BeforeInfoParser::parse(&page)?;
    eprintln!("Parsed {} lanes", info.entries.len());

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&info)?),
        _ => println!("{}", build_summary(&info, &page.url)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask_joins_words() {
        let cli = Cli::try_parse_from(["kyotei-api", "ask", "丸亀", "8"]).unwrap();
        match cli.command {
            Commands::Ask { text } => assert_eq!(text.join(" "), "丸亀 8"),
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "kyotei-api", "fetch", "--jcd", "15", "--rno", "8", "--hd", "20250811", "-f", "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Fetch { jcd, rno, hd, format } => {
                assert_eq!((jcd, rno), (15, 8));
                assert_eq!(hd.as_deref(), Some("20250811"));
                assert_eq!(format, "json");
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_serve_defaults_to_config() {
        let cli = Cli::try_parse_from(["kyotei-api", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert!(host.is_none());
                assert!(port.is_none());
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_ask_requires_text() {
        assert!(Cli::try_parse_from(["kyotei-api", "ask"]).is_err());
    }

    #[tokio::test]
    async fn test_build_dispatcher_uses_cache_config() {
        use crate::scraper::cache::ManualClock;
        use chrono::{TimeZone, Utc};

        let mut config = AppConfig::default();
        config.fetch.base_url = "http://127.0.0.1:9".to_string();
        config.fetch.timeout_secs = 1;
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.fetch).unwrap());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 8, 11, 3, 0, 0).unwrap()));
        let dispatcher = build_dispatcher(&config, fetcher, clock);

        // Help never touches the network
        assert_eq!(dispatcher.handle("help").await, crate::dispatcher::USAGE);
    }
}
