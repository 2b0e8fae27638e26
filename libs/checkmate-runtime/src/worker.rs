// Job loop of a sandbox process.
//
// The main thread reads jobs from stdin. Cancels are answered on the spot by
// queueing a user signal into the interpreter; every other job goes to the
// interpreter thread, which owns the `PythonHost` and writes replies to stdout.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use rustpython::vm::signal::{user_signal_channel, UserSignal, UserSignalReceiver};
use rustpython::vm::VirtualMachine;
use tracing::{debug, error, info, warn};

use crate::host::{HostError, PythonHost};
use crate::protocol::{Job, Reply, Report};

const IDLE: u64 = 0;

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub stack_bytes: usize,
    pub recursion_limit: usize,
}

/// Ids of the running job and of the last cancel received
#[derive(Default)]
struct JobSlots {
    running: AtomicU64,
    cancelled: AtomicU64,
}

/// Serve jobs until stdin closes
pub fn serve(options: WorkerOptions) -> io::Result<()> {
    let (signals, receiver) = user_signal_channel();
    let (jobs, queue) = mpsc::channel::<Job>();
    let slots = Arc::new(JobSlots::default());

    let interpreter_slots = Arc::clone(&slots);
    let recursion_limit = options.recursion_limit;
    thread::Builder::new()
        .name("checkmate-python".to_string())
        .stack_size(options.stack_bytes)
        .spawn(move || run_jobs(recursion_limit, receiver, queue, interpreter_slots))?;
    info!(stack_bytes = options.stack_bytes, recursion_limit, "Sandbox started");

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let job: Job = match serde_json::from_str(&line) {
            Ok(job) => job,
            Err(err) => {
                warn!(error = %err, "Ignoring malformed job");
                continue;
            }
        };
        if let Job::Cancel { id } = job {
            slots.cancelled.store(id, Ordering::SeqCst);
            if signals.send(interrupt(Arc::clone(&slots), id)).is_err() {
                warn!(id, "Interpreter gone; cancel dropped");
            }
            continue;
        }
        if jobs.send(job).is_err() {
            // interpreter thread exited
            break;
        }
    }
    debug!("Job stream closed");
    Ok(())
}

/// Raise `KeyboardInterrupt` in job `id`, or do nothing once it is over
fn interrupt(slots: Arc<JobSlots>, id: u64) -> UserSignal {
    Box::new(move |vm: &VirtualMachine| {
        if slots.running.load(Ordering::SeqCst) == id {
            Err(vm.new_exception_empty(vm.ctx.exceptions.keyboard_interrupt.to_owned()))
        } else {
            Ok(())
        }
    })
}

fn run_jobs(
    recursion_limit: usize,
    signals: UserSignalReceiver,
    queue: mpsc::Receiver<Job>,
    slots: Arc<JobSlots>,
) {
    let host = match PythonHost::new(recursion_limit, signals) {
        Ok(host) => host,
        Err(err) => {
            error!(error = %err, "Failed to start interpreter");
            return;
        }
    };

    for job in queue {
        let reply = match job {
            Job::Load { source, variant } => match host.load(&source, variant) {
                Ok(()) => Reply::Ready,
                Err(err) => {
                    error!(error = %err, "Failed to load source");
                    return;
                }
            },
            Job::RunModule { id } => Reply::Finished {
                id,
                report: run_job(&slots, id, || host.run_module()),
            },
            Job::Call { id, name, args } => Reply::Finished {
                id,
                report: run_job(&slots, id, || host.call(&name, &args)),
            },
            Job::Cancel { .. } => continue,
        };
        if let Err(err) = write_reply(&reply) {
            error!(error = %err, "Failed to write reply");
            return;
        }
    }
}

fn run_job(slots: &JobSlots, id: u64, job: impl FnOnce() -> Result<Report, HostError>) -> Report {
    slots.running.store(id, Ordering::SeqCst);
    let result = job();
    slots.running.store(IDLE, Ordering::SeqCst);
    match result {
        Ok(report) => report,
        // the interrupt landed in driver code outside its own handlers
        Err(HostError::Driver(_)) if slots.cancelled.load(Ordering::SeqCst) == id => Report::Interrupted,
        Err(err) => Report::Raised {
            error: format!("sandbox driver failed: {}", err),
        },
    }
}

fn write_reply(reply: &Reply) -> io::Result<()> {
    let line = serde_json::to_string(reply)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_job_tracks_running_id() {
        let slots = JobSlots::default();
        let report = run_job(&slots, 4, || {
            assert_eq!(slots.running.load(Ordering::SeqCst), 4);
            Ok(Report::ModuleReady)
        });
        assert_eq!(report, Report::ModuleReady);
        assert_eq!(slots.running.load(Ordering::SeqCst), IDLE);
    }

    #[test]
    fn test_driver_failure_after_cancel_is_interrupt() {
        let slots = JobSlots::default();
        slots.cancelled.store(9, Ordering::SeqCst);
        let report = run_job(&slots, 9, || Err(HostError::Driver("KeyboardInterrupt".to_string())));
        assert_eq!(report, Report::Interrupted);

        let report = run_job(&slots, 10, || Err(HostError::Driver("TypeError".to_string())));
        assert!(matches!(report, Report::Raised { error } if error.starts_with("sandbox driver failed")));
    }
}
