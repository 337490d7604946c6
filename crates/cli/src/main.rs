//! Toolwright CLI: the main entry point.
//!
//! Commands:
//! - `init`: Write a default config and a sample agent
//! - `agents`: List agent definitions
//! - `tools`: List built-in tools
//! - `chat`: Talk to an agent, one message or interactively

use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(
    name = "toolwright",
    about = "Toolwright — tool-calling agent engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create ~/.toolwright with a default config and sample agent
    Init,

    /// List configured agents
    Agents,

    /// List built-in tools
    Tools,

    /// Chat with an agent
    Chat {
        /// Agent slug (file stem in the agents directory)
        #[arg(short, long, default_value = "assistant")]
        agent: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Print events as they happen
        #[arg(long)]
        stream: bool,

        /// Override the round budget
        #[arg(long)]
        max_iterations: Option<u32>,

        /// User id passed to tools (retrieval is scoped to it)
        #[arg(long, env = "TOOLWRIGHT_USER_ID")]
        user: Option<Uuid>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Agents => commands::agents::run().await?,
        Commands::Tools => commands::tools::run().await?,
        Commands::Chat {
            agent,
            message,
            stream,
            max_iterations,
            user,
            json,
        } => {
            commands::chat::run(commands::chat::ChatArgs {
                agent,
                message,
                stream,
                max_iterations,
                user,
                json,
            })
            .await?
        }
    }

    Ok(())
}
