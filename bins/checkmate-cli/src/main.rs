mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "checkmate-cli")]
#[command(about = "Checkmate CLI - Grade submitted functions against literal test cases", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a request JSON file (stdin when omitted or "-")
    Eval {
        /// Request file
        file: Option<PathBuf>,

        /// Harness configuration JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the per-call budget in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Pretty-print the results
        #[arg(long, default_value = "false")]
        pretty: bool,
    },

    /// Check source syntax and list its top-level functions
    Check {
        /// Source file (stdin when omitted or "-")
        file: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Eval {
            file,
            config,
            timeout_ms,
            pretty,
        } => {
            commands::eval(file.as_deref(), config.as_deref(), timeout_ms, pretty).await?;
        }
        Commands::Check { file } => {
            commands::check(file.as_deref())?;
        }
    }

    Ok(())
}
