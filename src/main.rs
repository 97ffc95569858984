//! CLI for HubSub
//!
//! Subcommands:
//! - `server`: run the WebSocket server
//! - `listen`: subscribe to one topic and print what arrives (useful for smoke tests)

use std::process::ExitCode;

use clap::Parser;
use futures_util::StreamExt;
use hubsub::config::load_config_from;
use hubsub::hub::Hubs;
use hubsub::transport::start_websocket_server;
use hubsub::utils::logging;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "hubsub")]
enum Command {
    /// Start the WebSocket server
    Server {
        /// Configuration file, extension optional
        #[arg(long, default_value = hubsub::config::DEFAULT_CONFIG_PATH)]
        config: String,
    },
    /// Subscribe to a topic and print every event received
    Listen {
        /// Endpoint to subscribe to, e.g. ws://127.0.0.1:8080/ws/invitations/me@example.com
        #[arg(long, default_value = "ws://127.0.0.1:8080/ws/demo")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cmd = Command::parse();

    let result = match cmd {
        Command::Server { config } => run_server(&config).await,
        Command::Listen { url } => {
            logging::init("info");
            run_listener(&url).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match load_config_from(config_path) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            return Err(e.into());
        }
    };
    logging::init(&settings.log.level);
    settings.validate()?;

    let hubs = Hubs::new(&settings.hub);
    let addr = settings.server.address();

    tokio::select! {
        res = start_websocket_server(&addr, hubs.clone()) => {
            res?;
            error!("WebSocket server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    let closed = hubs.close_all();
    info!(closed, "disconnected remaining subscribers");
    Ok(())
}

async fn run_listener(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (mut ws_stream, _response) = connect_async(url).await?;
    info!("subscribed to {url}");

    while let Some(frame) = ws_stream.next().await {
        match frame? {
            WsMessage::Text(text) => println!("{text}"),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    info!("server closed the connection");
    Ok(())
}
