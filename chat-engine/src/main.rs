//! chatd: the chat orchestration engine behind a console gateway.

use anyhow::Result;
use chat_engine::{run_console, EngineConfig};
use clap::{Parser, Subcommand};
use std::path::Path;

#[derive(Parser)]
#[command(name = "chatd", about = "Chat orchestration engine console")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine, reading messages from stdin
    Run {
        /// OpenAI API key; falls back to OPENAI_API_KEY
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { api_key } => {
            let config = EngineConfig::load(api_key)?;
            if let Some(parent) = Path::new(&config.log_file).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            chat_core::init_tracing(&config.log_file)?;
            run_console(config).await
        }
    }
}
