//! chatmem CLI entry point.

use chatmem::config::Config;
use chatmem::message::{WireMessage, decode, encode};
use chatmem::{ConversationMemory, Message};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use std::io::Read as _;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "chatmem")]
#[command(about = "Read and append conversation history in a remote message store")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Use this channel instead of the configured one
    #[arg(long)]
    channel: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the channel history as JSON
    History,
    /// Append a single message
    Say {
        #[arg(long, value_enum, default_value_t = Speaker::User)]
        role: Speaker,
        text: String,
    },
    /// Append a JSON array of messages from a file ("-" reads stdin)
    Append { file: PathBuf },
    /// Apply the configured clear behaviour
    Clear,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Speaker {
    User,
    Ai,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        Config::load().with_context(|| "failed to load configuration")?
    };
    if let Some(channel_id) = cli.channel {
        config.memory.channel_id = channel_id;
    }

    tracing::info!(
        url = %config.connection.messages_url(),
        channel_id = %config.memory.channel_id,
        "configuration loaded"
    );

    let memory = ConversationMemory::from_config(&config)
        .with_context(|| "failed to create conversation memory")?;

    match cli.command {
        Command::History => {
            let messages = memory.get_messages().await?;
            print_messages(&messages)?;
        }
        Command::Say { role, text } => {
            memory.get_messages().await?;
            match role {
                Speaker::User => memory.add_user_message(text).await?,
                Speaker::Ai => memory.add_ai_message(text).await?,
            }
            tracing::info!("message appended");
        }
        Command::Append { file } => {
            let messages = read_messages(&file)?;
            let count = messages.len();
            memory.get_messages().await?;
            memory.add_messages(messages).await?;
            tracing::info!(count, "messages appended");
        }
        Command::Clear => {
            memory.clear().await?;
            tracing::info!(policy = ?config.memory.clear, "clear applied");
        }
    }

    Ok(())
}

fn read_messages(path: &Path) -> anyhow::Result<Vec<Message>> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read messages from stdin")?;
        raw
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read messages from {}", path.display()))?
    };

    let wire: Vec<WireMessage> =
        serde_json::from_str(&raw).context("expected a JSON array of messages")?;
    Ok(wire.into_iter().map(decode).collect())
}

fn print_messages(messages: &[Message]) -> anyhow::Result<()> {
    let encoded: Vec<_> = messages.iter().map(encode).collect();
    println!("{}", serde_json::to_string_pretty(&encoded)?);
    Ok(())
}
