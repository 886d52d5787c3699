mod cli;
mod config;
mod ws_client;

use std::io;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::ChatContext;
use crate::config::ChatConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    chat: ChatArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat(ChatArgs),
}

#[derive(Args, Clone, Default)]
struct ChatArgs {
    /// Send a single message, print the reply and exit
    #[arg(short, long)]
    input: Option<String>,

    /// WebSocket endpoint (overrides WEBSOCKET_URL)
    #[arg(long)]
    url: Option<String>,

    /// Seconds to wait for a reply before giving up on it
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();
    let args = match cli.command {
        Some(Commands::Chat(args)) => args,
        None => cli.chat,
    };

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };

    // Logs go to stderr so the transcript on stdout stays clean.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = ChatConfig::from_env()?;
    if let Some(url) = &args.url {
        config = config.with_endpoint(url)?;
    }
    if let Some(secs) = args.timeout {
        config = config.with_timeout_secs(secs)?;
    }

    info!("Starting travel chat against {}", config.endpoint);

    let interactive = args.input.is_none();
    let mut chat_context = ChatContext::new(Box::new(io::stdout()), args.input, interactive, config);
    chat_context.run().await
}
