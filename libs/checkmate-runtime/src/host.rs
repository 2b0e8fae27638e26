// Embedded Python interpreter running the grading driver.
//
// The driver (driver.py) owns everything that touches user objects: the
// fresh module namespace per job, node materialization and snapshots. The
// host binds job parameters as globals, runs a precompiled entry snippet and
// reads the reply back as literal text.

use rustpython::vm::builtins::PyCode;
use rustpython::vm::scope::Scope;
use rustpython::vm::signal::UserSignalReceiver;
use rustpython::vm::{Interpreter, PyRef, PyResult, VirtualMachine};
use rustpython::InterpreterConfig;
use rustpython_compiler::Mode;
use tracing::debug;

use crate::literal::{decode, Literal, Variant};
use crate::protocol::{Report, Snapshot};

const DRIVER: &str = include_str!("driver.py");
const DRIVER_PATH: &str = "<checkmate-driver>";
const CONFIGURE_ENTRY: &str = "_reply = configure(int(_limit))";
const LOAD_ENTRY: &str = "_reply = load(_source, _variant)";
const JOB_ENTRY: &str = "_reply = handle(_kind, _name, _args)";
const REPLY_SLOT: &str = "_reply";

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to compile {path}: {message}")]
    Compile { path: &'static str, message: String },
    #[error("driver raised {0}")]
    Driver(String),
    #[error("unreadable driver reply {0:?}")]
    Reply(String),
}

pub struct PythonHost {
    interpreter: Interpreter,
    scope: Scope,
    load_entry: PyRef<PyCode>,
    job_entry: PyRef<PyCode>,
}

impl PythonHost {
    /// Start an interpreter with the standard library and the driver loaded.
    /// Closures sent through the matching `UserSignalSender` run between
    /// bytecode instructions; an `Err` from one unwinds the running job.
    pub fn new(recursion_limit: usize, signals: UserSignalReceiver) -> Result<Self, HostError> {
        let interpreter = InterpreterConfig::new()
            .init_stdlib()
            .init_hook(Box::new(move |vm| vm.set_user_signal_channel(signals)))
            .interpreter();

        let (scope, configure_entry, load_entry, job_entry) = interpreter.enter(|vm| {
            let driver = compile(vm, DRIVER, DRIVER_PATH)?;
            let scope = vm.new_scope_with_builtins();
            vm.run_code_obj(driver, scope.clone())
                .map_err(|exc| driver_error(vm, exc))?;
            Ok::<_, HostError>((
                scope,
                compile(vm, CONFIGURE_ENTRY, "<configure>")?,
                compile(vm, LOAD_ENTRY, "<load>")?,
                compile(vm, JOB_ENTRY, "<job>")?,
            ))
        })?;

        let host = Self {
            interpreter,
            scope,
            load_entry,
            job_entry,
        };
        host.run(&configure_entry, &[("_limit", recursion_limit.to_string().as_str())])?;
        debug!(recursion_limit, "Interpreter ready");
        Ok(host)
    }

    /// Compile the submitted source; a compile error surfaces on the first job
    pub fn load(&self, source: &str, variant: Variant) -> Result<(), HostError> {
        self.run(
            &self.load_entry,
            &[("_source", source), ("_variant", variant_name(variant))],
        )?;
        Ok(())
    }

    pub fn run_module(&self) -> Result<Report, HostError> {
        let reply = self.run(&self.job_entry, &[("_kind", "module"), ("_name", ""), ("_args", "")])?;
        parse_report(&reply)
    }

    /// Call `name` on a fresh module namespace; `args` are literal reprs
    pub fn call(&self, name: &str, args: &[String]) -> Result<Report, HostError> {
        let args = format!("[{}]", args.join(", "));
        let reply = self.run(&self.job_entry, &[("_kind", "call"), ("_name", name), ("_args", args.as_str())])?;
        parse_report(&reply)
    }

    fn run(&self, entry: &PyRef<PyCode>, bindings: &[(&str, &str)]) -> Result<String, HostError> {
        self.interpreter.enter(|vm| {
            let outcome = (|| -> PyResult<String> {
                for (name, value) in bindings {
                    self.scope
                        .globals
                        .set_item(*name, vm.ctx.new_str(*value).into(), vm)?;
                }
                vm.run_code_obj(entry.clone(), self.scope.clone())?;
                let reply = self.scope.globals.get_item(REPLY_SLOT, vm)?;
                Ok(reply.str(vm)?.as_str().to_owned())
            })();
            outcome.map_err(|exc| driver_error(vm, exc))
        })
    }
}

fn compile(vm: &VirtualMachine, source: &str, path: &'static str) -> Result<PyRef<PyCode>, HostError> {
    vm.compile(source, Mode::Exec, path.to_string())
        .map_err(|err| HostError::Compile {
            path,
            message: format!("{:?}", err),
        })
}

fn driver_error(vm: &VirtualMachine, exc: rustpython::vm::builtins::PyBaseExceptionRef) -> HostError {
    let message = format!("{:?}", exc);
    vm.print_exception(exc);
    HostError::Driver(message)
}

fn variant_name(variant: Variant) -> &'static str {
    match variant {
        Variant::Plain => "plain",
        Variant::LinkedList => "linked_list",
        Variant::Tree => "tree",
    }
}

/// Replies are tuple reprs: a status tag followed by its fields
fn parse_report(text: &str) -> Result<Report, HostError> {
    let bad = || HostError::Reply(text.chars().take(200).collect());
    let Ok(Literal::Tuple(fields)) = decode(text) else {
        return Err(bad());
    };
    let mut fields = fields.into_iter();
    let Some(Literal::Str(tag)) = fields.next() else {
        return Err(bad());
    };
    let report = match (tag.as_str(), fields.next(), fields.next()) {
        ("module_ready", None, None) => Report::ModuleReady,
        ("interrupted", None, None) => Report::Interrupted,
        ("raised", Some(Literal::Str(error)), None) => Report::Raised { error },
        ("outside", Some(Literal::Str(error)), None) => Report::Outside { error },
        ("completed", Some(output), Some(Literal::List(args))) => Report::Completed {
            output: snapshot(output).ok_or_else(bad)?,
            output_args: args
                .into_iter()
                .map(snapshot)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(bad)?,
        },
        _ => return Err(bad()),
    };
    Ok(report)
}

fn snapshot(literal: Literal) -> Option<Snapshot> {
    let Literal::Tuple(pair) = literal else {
        return None;
    };
    match <[Literal; 2]>::try_from(pair) {
        Ok([Literal::Str(text), Literal::Bool(exact)]) => Some(Snapshot { text, exact }),
        _ => None,
    }
}
