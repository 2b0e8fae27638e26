/// Execution Sandbox - Running Submitted Code in a Child Process
///
/// **Core Responsibility:**
/// Execute module-level code, then call the function under test with
/// decoded arguments and capture the raw outcome.
///
/// **Critical Architectural Boundary:**
/// - The sandbox knows HOW to run code (child process, budget, cancellation)
/// - It does NOT compare results or know the result taxonomy
/// - It returns an `ExecutionOutcome` for the evaluator to judge
///
/// **Worker Model:**
/// - One `checkmate-sandbox` process per request hosts the interpreter
/// - Jobs go in as JSON lines on its stdin, replies come back on its stdout
/// - Every call runs against a freshly executed module namespace
/// - A budget expiry sends a cancel; a worker that does not acknowledge
///   within the grace period is killed and replaced lazily
/// - A worker that dies (stack overflow, abort) costs one test, never the harness

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use checkmate_common::config::HarnessConfig;
use checkmate_runtime::{Job, Literal, Reply as WireReply, Report, Variant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::HarnessError;

/// Raw result of one call, before any comparison
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// The call returned; every argument is captured after the call
    Completed {
        output: Literal,
        output_args: Vec<Literal>,
    },
    /// Submitted code raised inside the call
    Raised { error: String },
    /// Module-level code raised before any call could run
    Outside { error: String },
    TimedOut,
}

/// Result of running the module body, cached for the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleState {
    Ready,
    Outside(String),
    TimedOut,
}

struct Worker {
    child: Child,
    stdin: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
}

enum Reply {
    Ready(Report),
    Expired,
    /// The worker exited or hung up without answering
    Lost,
}

const WORKER_LOST: &str = "sandbox worker terminated";

pub struct Sandbox {
    source: Arc<str>,
    variant: Variant,
    program: PathBuf,
    recursion_limit: usize,
    stack_mb: usize,
    grace: Duration,
    startup: Duration,
    worker: Option<Worker>,
    module: Option<ModuleState>,
    next_id: u64,
}

impl Sandbox {
    /// Start a worker with `source` loaded; module-level code has not run yet
    pub async fn spawn(source: Arc<str>, variant: Variant, config: &HarnessConfig) -> Result<Self, HarnessError> {
        let mut sandbox = Self {
            source,
            variant,
            program: config.sandbox_program(),
            recursion_limit: config.recursion_limit,
            stack_mb: config.worker_stack_mb.max(1),
            grace: config.cancel_grace(),
            startup: config.startup_timeout(),
            worker: None,
            module: None,
            next_id: 0,
        };
        sandbox.worker = Some(sandbox.start_worker().await?);
        Ok(sandbox)
    }

    async fn start_worker(&self) -> Result<Worker, HarnessError> {
        let mut child = Command::new(&self.program)
            .arg("--stack-mb")
            .arg(self.stack_mb.to_string())
            .arg("--recursion-limit")
            .arg(self.recursion_limit.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(HarnessError::Worker)?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(HarnessError::Worker(std::io::Error::other("sandbox pipes unavailable")));
        };
        let pid = child.id();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "checkmate::sandbox", pid, "{}", line);
            }
        });

        let mut worker = Worker {
            child,
            stdin,
            replies: BufReader::new(stdout).lines(),
        };
        let load = Job::Load {
            source: self.source.to_string(),
            variant: self.variant,
        };
        if !write_job(&mut worker.stdin, &load).await {
            return Err(HarnessError::Worker(std::io::Error::other("sandbox exited during startup")));
        }
        match timeout(self.startup, next_reply(&mut worker.replies)).await {
            Ok(Some(WireReply::Ready)) => {
                debug!(pid, stack_mb = self.stack_mb, "Sandbox worker started");
                Ok(worker)
            }
            Ok(_) => Err(HarnessError::Worker(std::io::Error::other("sandbox exited during startup"))),
            Err(_) => Err(HarnessError::Worker(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "sandbox did not become ready",
            ))),
        }
    }

    async fn ensure_worker(&mut self) -> Result<(), HarnessError> {
        if self.worker.is_none() {
            self.worker = Some(self.start_worker().await?);
        }
        Ok(())
    }

    /// Run module-level code once per request and cache how it ended
    pub async fn prepare(&mut self, budget: Option<Duration>) -> Result<ModuleState, HarnessError> {
        if let Some(state) = &self.module {
            return Ok(state.clone());
        }
        self.ensure_worker().await?;
        let id = self.job_id();
        let state = match self.submit(Job::RunModule { id }, id, budget).await {
            Reply::Ready(Report::ModuleReady) | Reply::Ready(Report::Completed { .. }) => ModuleState::Ready,
            Reply::Ready(Report::Outside { error }) | Reply::Ready(Report::Raised { error }) => {
                ModuleState::Outside(error)
            }
            Reply::Ready(Report::Interrupted) | Reply::Expired => ModuleState::TimedOut,
            Reply::Lost => ModuleState::Outside(WORKER_LOST.to_string()),
        };
        match &state {
            ModuleState::Ready => debug!("Module-level code completed"),
            ModuleState::Outside(error) => warn!(error = %error, "Module-level code failed"),
            ModuleState::TimedOut => warn!("Module-level code timed out"),
        }
        self.module = Some(state.clone());
        Ok(state)
    }

    /// Call `name` on a fresh module namespace with `args` under `budget`
    pub async fn invoke(
        &mut self,
        name: &str,
        args: &[Literal],
        budget: Option<Duration>,
    ) -> Result<ExecutionOutcome, HarnessError> {
        match self.prepare(budget).await? {
            ModuleState::Ready => {}
            ModuleState::Outside(error) => return Ok(ExecutionOutcome::Outside { error }),
            ModuleState::TimedOut => return Ok(ExecutionOutcome::TimedOut),
        }
        self.ensure_worker().await?;
        let id = self.job_id();
        let job = Job::Call {
            id,
            name: name.to_string(),
            args: args.iter().map(Literal::repr).collect(),
        };
        let variant = self.variant;
        Ok(match self.submit(job, id, budget).await {
            Reply::Ready(Report::Completed { output, output_args }) => ExecutionOutcome::Completed {
                output: output.into_literal(variant),
                output_args: output_args
                    .into_iter()
                    .map(|snapshot| snapshot.into_literal(variant))
                    .collect(),
            },
            Reply::Ready(Report::Raised { error }) => ExecutionOutcome::Raised { error },
            Reply::Ready(Report::Outside { error }) => ExecutionOutcome::Outside { error },
            Reply::Ready(Report::Interrupted) | Reply::Expired => ExecutionOutcome::TimedOut,
            Reply::Ready(Report::ModuleReady) => ExecutionOutcome::Raised {
                error: "sandbox answered a call with a module report".to_string(),
            },
            Reply::Lost => ExecutionOutcome::Raised {
                error: WORKER_LOST.to_string(),
            },
        })
    }

    fn job_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Send `job` and wait for its report under `budget`
    async fn submit(&mut self, job: Job, id: u64, budget: Option<Duration>) -> Reply {
        let Some(worker) = self.worker.as_mut() else {
            return Reply::Lost;
        };
        if !write_job(&mut worker.stdin, &job).await {
            self.discard_worker();
            return Reply::Lost;
        }

        let Some(budget) = budget else {
            return match report_for(&mut worker.replies, id).await {
                Some(report) => Reply::Ready(report),
                None => {
                    self.discard_worker();
                    Reply::Lost
                }
            };
        };
        match timeout(budget, report_for(&mut worker.replies, id)).await {
            Ok(Some(report)) => return Reply::Ready(report),
            Ok(None) => {
                self.discard_worker();
                return Reply::Lost;
            }
            Err(_) => {}
        }
        // A reply that landed as the timer fired still counts
        if let Ok(Some(report)) = timeout(Duration::ZERO, report_for(&mut worker.replies, id)).await {
            return Reply::Ready(report);
        }

        warn!(budget_ms = budget.as_millis() as u64, "Execution timed out; cancelling");
        let acknowledged = write_job(&mut worker.stdin, &Job::Cancel { id }).await
            && matches!(
                timeout(self.grace, report_for(&mut worker.replies, id)).await,
                Ok(Some(_))
            );
        if acknowledged {
            debug!("Sandbox worker acknowledged cancellation");
        } else {
            warn!(
                grace_ms = self.grace.as_millis() as u64,
                "Sandbox worker unresponsive; killing"
            );
            self.discard_worker();
        }
        Reply::Expired
    }

    /// Kill the worker; the next job starts a fresh one
    fn discard_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            if let Err(err) = worker.child.start_kill() {
                debug!(error = %err, "Sandbox worker already gone");
            }
            tokio::spawn(async move {
                let status = worker.child.wait().await;
                debug!(?status, "Sandbox worker reaped");
            });
        }
    }
}

async fn write_job(stdin: &mut ChildStdin, job: &Job) -> bool {
    let Ok(mut line) = serde_json::to_string(job) else {
        return false;
    };
    line.push('\n');
    stdin.write_all(line.as_bytes()).await.is_ok() && stdin.flush().await.is_ok()
}

/// Next protocol line; anything else the process printed is skipped.
/// Only `next_line` is awaited, so dropping this future loses nothing.
async fn next_reply(replies: &mut Lines<BufReader<ChildStdout>>) -> Option<WireReply> {
    loop {
        let line = replies.next_line().await.ok()??;
        match serde_json::from_str(&line) {
            Ok(reply) => return Some(reply),
            Err(_) => debug!(target: "checkmate::sandbox", "{}", line),
        }
    }
}

/// The report for job `id`; `None` once the worker is gone
async fn report_for(replies: &mut Lines<BufReader<ChildStdout>>, id: u64) -> Option<Report> {
    loop {
        match next_reply(replies).await? {
            WireReply::Finished { id: finished, report } if finished == id => return Some(report),
            other => debug!(?other, "Skipping stale reply"),
        }
    }
}
