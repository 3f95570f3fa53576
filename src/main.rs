//! CLI for tracking-pubsub
//!
//! Subcommands:
//! - `server`: run the broker behind its WebSocket server
//! - `subscribe`: print account events published on a topic
//! - `publish`: read `accountId data...` lines from stdin and publish them

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use tracking_pubsub::broker::{ActionType, Broker};
use tracking_pubsub::client::{AccountEvent, ClientOptions, ConnectionClient, EventDisplay};
use tracking_pubsub::config::{Settings, load_config};
use tracking_pubsub::transport::start_websocket_server;
use tracking_pubsub::utils::{Result, logging};

#[derive(Parser)]
#[command(name = "tracking-pubsub")]
enum Command {
    /// Start the broker server
    Server,
    /// Subscribe to a topic and print incoming account events
    Subscribe {
        /// Topic to subscribe to (defaults to `client.topic`)
        #[arg(long)]
        topic: Option<String>,
        /// Only show events of these account ids
        #[arg(short, long = "filter", num_args = 1..)]
        filter: Vec<String>,
    },
    /// Publish account events read from stdin, one `accountId data...` per line
    Publish {
        /// Topic to publish to (defaults to `client.topic`)
        #[arg(long)]
        topic: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            return;
        }
    };
    logging::init(&settings.log.level);

    let result = match cmd {
        Command::Server => run_server(&settings).await,
        Command::Subscribe { topic, filter } => run_subscriber(&settings, topic, filter).await,
        Command::Publish { topic } => run_publisher(&settings, topic).await,
    };
    if let Err(e) = result {
        error!("{e}");
    }
}

async fn run_server(settings: &Settings) -> Result<()> {
    let broker = Arc::new(Broker::new());

    tokio::select! {
        result = start_websocket_server(settings.server.addr(), settings.server.path.clone(), broker) => {
            result?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_subscriber(settings: &Settings, topic: Option<String>, filter: Vec<String>) -> Result<()> {
    let topic = topic.unwrap_or_else(|| settings.client.topic.clone());
    let options = ClientOptions::from(&settings.client).subscribe_to(topic.clone());
    let display = EventDisplay::new(filter);
    if display.is_filtering() {
        info!("Showing only filtered account ids on {topic}");
    }

    let client = ConnectionClient::connect(options, Some(Arc::new(display)));
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully.");
    client.shutdown();
    Ok(())
}

async fn run_publisher(settings: &Settings, topic: Option<String>) -> Result<()> {
    let topic = topic.unwrap_or_else(|| settings.client.topic.clone());
    let client = ConnectionClient::connect(ClientOptions::from(&settings.client), None);
    let patience = Duration::from_millis(settings.client.connect_timeout_ms + settings.client.reconnect_delay_ms);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some((account_id, data)) = split_line(&line) else {
            warn!("Expected `accountId data...`, got {line:?}");
            continue;
        };
        wait_open(&client, patience).await;

        let event = AccountEvent::new(account_id, data);
        if let Err(e) = client.send_message(ActionType::Publish, &topic, Some(&event.encode())) {
            warn!("Event for account {account_id} dropped: {e}");
        }
    }

    // let the writer flush before closing
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.shutdown();
    Ok(())
}

fn split_line(line: &str) -> Option<(&str, &str)> {
    let (account_id, data) = line.trim().split_once(char::is_whitespace)?;
    let data = data.trim();
    (!account_id.is_empty() && !data.is_empty()).then_some((account_id, data))
}

async fn wait_open(client: &ConnectionClient, patience: Duration) {
    let deadline = tokio::time::Instant::now() + patience;
    while !client.is_open() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
