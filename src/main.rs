use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use weatherai::history::HistoryOrder;
use weatherai::{FjallHistoryStore, HistoryStore, QueryOrchestrator, WeatherAiConfig, telemetry, web};

const ABOUT: &str = "Conversational weather assistant";

const LONG_ABOUT: &str = "
Ask about the weather in plain language: current conditions, forecasts for the next few days
and historical weather for past dates. Questions without a city use your approximate location.

Previous questions and answers are kept on disk and used as context for follow-up questions.
";

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default())
    .usage(AnsiColor::Green.on_default())
    .literal(AnsiColor::Green.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, Debug)]
#[command(version, styles = STYLES, about = ABOUT, long_about = LONG_ABOUT)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a single question
    Ask {
        #[arg(help = "The question, e.g. \"Will it rain in Dhaka tomorrow evening?\"")]
        query: Vec<String>,
    },
    /// Interactive session reading questions from stdin
    Chat,
    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show recent exchanges
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = WeatherAiConfig::load_from_path(cli.config.clone())?;
    let _telemetry = telemetry::init(&config.logging, cli.verbose)?;

    match cli.command {
        Command::Ask { query } => {
            let query = query.join(" ");
            if query.trim().is_empty() {
                anyhow::bail!("Please provide a question");
            }
            let orchestrator = QueryOrchestrator::from_config(&config)?;
            println!("{}", orchestrator.handle(query.trim()).await);
        }
        Command::Chat => chat(QueryOrchestrator::from_config(&config)?).await?,
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("Invalid listen address {host}:{port}"))?;
            let orchestrator = Arc::new(QueryOrchestrator::from_config(&config)?);
            web::run(orchestrator, addr).await?;
        }
        Command::History { limit } => {
            let store = FjallHistoryStore::open(&config.history.path)?;
            let mut exchanges = store.recent(limit).await?;
            if store.order() == HistoryOrder::NewestFirst {
                exchanges.reverse();
            }
            if exchanges.is_empty() {
                println!("No previous questions.");
            }
            for exchange in exchanges {
                let lookup = match (&exchange.city, &exchange.date) {
                    (Some(city), Some(date)) => format!(" [{city}, {date}]"),
                    _ => String::new(),
                };
                println!(
                    "{}{}\nUser: {}\nAssistant: {}\n",
                    exchange.timestamp.format("%Y-%m-%d %H:%M"),
                    lookup,
                    exchange.query,
                    exchange.response
                );
            }
        }
    }

    Ok(())
}

async fn chat(orchestrator: QueryOrchestrator) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Ask about the weather. Type 'exit' to quit.");
    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }

        println!("Assistant: {}\n", orchestrator.handle(query).await);
    }

    Ok(())
}
