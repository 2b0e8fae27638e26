// Sandbox process: hosts one Python interpreter and serves grading jobs
// as JSON lines on stdin/stdout. Logs go to stderr.
use anyhow::{Context, Result};
use checkmate_runtime::{serve, WorkerOptions};
use clap::Parser;

#[derive(Parser)]
#[command(name = "checkmate-sandbox")]
#[command(about = "Checkmate sandbox - run submitted Python for the grading harness", long_about = None)]
struct Args {
    /// Stack for the interpreter thread, in MiB
    #[arg(long, default_value_t = 256)]
    stack_mb: usize,

    #[arg(long, default_value_t = 1000)]
    recursion_limit: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    serve(WorkerOptions {
        stack_bytes: args.stack_mb.max(1) * 1024 * 1024,
        recursion_limit: args.recursion_limit,
    })
    .context("Sandbox job loop failed")
}
