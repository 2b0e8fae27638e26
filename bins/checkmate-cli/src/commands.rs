// CLI commands for grading requests
use anyhow::{Context, Result};
use checkmate_common::config::HarnessConfig;
use checkmate_common::types::Request;
use checkmate_harness::resolver::{parse_source, top_level_functions};
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Read a file, or stdin when no path (or "-") is given
fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read stdin")?;
            Ok(content)
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

/// Evaluate a request and print the results array
pub async fn eval(
    file: Option<&Path>,
    config_path: Option<&Path>,
    timeout_ms: Option<u64>,
    pretty: bool,
) -> Result<()> {
    let mut config = HarnessConfig::load(config_path).context("Failed to load harness configuration")?;
    if let Some(timeout_ms) = timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    let content = read_input(file)?;
    let request: Request = serde_json::from_str(&content).context("Failed to parse request JSON")?;
    info!(
        tests = request.tests.len(),
        timeout_ms = config.timeout_ms,
        "Evaluating request"
    );

    let results = checkmate_harness::evaluate(&request, &config)
        .await
        .context("Evaluation failed")?;
    print_json(&results, pretty)
}

#[derive(Serialize)]
struct FunctionSummary {
    name: String,
    params: Vec<String>,
}

#[derive(Serialize)]
struct CheckReport {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    functions: Vec<FunctionSummary>,
}

/// Report syntax validity and the top-level functions of a source file
pub fn check(file: Option<&Path>) -> Result<()> {
    let source = read_input(file)?;
    let report = match parse_source(&source) {
        Ok(program) => CheckReport {
            valid: true,
            error: None,
            functions: top_level_functions(&program)
                .into_iter()
                .map(|function| FunctionSummary {
                    name: function.name,
                    params: function.params,
                })
                .collect(),
        },
        Err(err) => CheckReport {
            valid: false,
            error: Some(err.to_string()),
            functions: Vec::new(),
        },
    };
    print_json(&report, true)
}
