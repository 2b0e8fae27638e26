/// Result Classifier - Turning Outcomes into the Result Taxonomy
///
/// **Core Responsibility:**
/// Compare a raw execution outcome against decoded expectations and assign
/// exactly one result kind per test.
///
/// **Critical Properties:**
/// - Knows nothing about processes, budgets or the interpreter
/// - Pure function: (test, resolution, outcome) -> TestResult
///
/// **Precedence (first match wins):**
/// 1. Source failed to parse -> SYNTAX_ERROR
/// 2. Resolution, arity or fixture fault -> SPECIFICATION_ERROR
/// 3. Module-level fault -> RUNTIME_ERROR
/// 4. Timeout -> TIMEOUT
/// 5. Fault inside the call -> RUNTIME_ERROR
/// 6. Return value or any argument differs -> FAIL, otherwise SUCCESS

use checkmate_common::types::{ErrorContext, TestResult};
use checkmate_runtime::Literal;

use crate::engine::ExecutionOutcome;
use crate::resolver::ResolvedFunction;

/// Decoded literals of one test
#[derive(Debug, Clone, PartialEq)]
pub struct Fixtures {
    pub inputs: Vec<Literal>,
    /// Expected return value, in the request variant's canonical shape
    pub output: Option<Literal>,
    pub output_args: Option<Vec<Literal>>,
}

impl Fixtures {
    fn context(&self, function: &ResolvedFunction) -> ErrorContext {
        ErrorContext {
            arg_names: function.params.clone(),
            input_args: reprs(&self.inputs),
            expected_output_args: self.output_args.as_deref().map(reprs),
            expected_output: self.output.as_ref().map(Literal::repr),
        }
    }
}

fn reprs(literals: &[Literal]) -> Vec<String> {
    literals.iter().map(Literal::repr).collect()
}

/// Everything known about a test by the time it is classified
#[derive(Debug)]
pub enum Outcome<'a> {
    Unparsable(String),
    Unspecified(String),
    Executed {
        function: &'a ResolvedFunction,
        fixtures: Fixtures,
        outcome: ExecutionOutcome,
    },
}

pub fn classify(outcome: Outcome<'_>) -> TestResult {
    let (function, fixtures, outcome) = match outcome {
        Outcome::Unparsable(error) => return TestResult::SyntaxError { error },
        Outcome::Unspecified(error) => return TestResult::SpecificationError { error },
        Outcome::Executed {
            function,
            fixtures,
            outcome,
        } => (function, fixtures, outcome),
    };
    let context = fixtures.context(function);
    match outcome {
        ExecutionOutcome::Outside { error } | ExecutionOutcome::Raised { error } => {
            TestResult::RuntimeError { context, error }
        }
        ExecutionOutcome::TimedOut => TestResult::Timeout { context },
        ExecutionOutcome::Completed {
            output,
            output_args,
        } => {
            if matches(&fixtures, &output, &output_args) {
                TestResult::Success
            } else {
                TestResult::Fail {
                    context,
                    output_args: reprs(&output_args),
                    output: output.repr(),
                }
            }
        }
    }
}

/// Only the expectations a test supplies are checked
fn matches(fixtures: &Fixtures, output: &Literal, output_args: &[Literal]) -> bool {
    let output_ok = fixtures
        .output
        .as_ref()
        .map_or(true, |expected| output.equals(expected));
    let args_ok = fixtures.output_args.as_ref().map_or(true, |expected| {
        expected.len() == output_args.len()
            && expected
                .iter()
                .zip(output_args)
                .all(|(expected, actual)| actual.equals(expected))
    });
    output_ok && args_ok
}
