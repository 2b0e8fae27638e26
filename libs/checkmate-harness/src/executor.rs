/// Harness Orchestrator - Request-Level Coordination
///
/// **Responsibility:**
/// Coordinate resolver, sandbox and evaluator to produce one result per test.
///
/// **Architecture:**
/// 1. Validate the request and parse the source once (resolver.rs)
/// 2. Resolve the function under test once per effective name
/// 3. Decode fixtures and run each test in the request's sandbox (engine.rs)
/// 4. Classify every outcome (evaluator.rs), preserving input order
///
/// This module is the glue layer; it knows nothing about:
/// - How code executes (engine's job)
/// - How outcomes are compared (evaluator's job)

use std::collections::HashMap;
use std::sync::Arc;

use checkmate_common::config::HarnessConfig;
use checkmate_common::types::{Request, Test, TestResult, ValidationError};
use checkmate_runtime::{decode, decode_with, Literal, Variant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::engine::Sandbox;
use crate::error::HarnessError;
use crate::evaluator::{classify, Fixtures, Outcome};
use crate::resolver::{parse_source, resolve, Program, ResolvedFunction, SpecificationFault};

/// Grade every test of `request`; results come back in test order
pub async fn evaluate(request: &Request, config: &HarnessConfig) -> Result<Vec<TestResult>, HarnessError> {
    request.validate()?;
    if request.source.len() > config.max_source_bytes {
        return Err(ValidationError::SourceTooLarge {
            size: request.source.len(),
            limit: config.max_source_bytes,
        }
        .into());
    }

    let evaluation_id = Uuid::new_v4();
    let span = info_span!("evaluate", evaluation_id = %evaluation_id);
    run(request, config).instrument(span).await
}

async fn run(request: &Request, config: &HarnessConfig) -> Result<Vec<TestResult>, HarnessError> {
    info!(
        test_count = request.tests.len(),
        source_size = request.source.len(),
        check_timeout = request.check_timeout,
        "Starting evaluation"
    );
    if request.tests.is_empty() {
        return Ok(Vec::new());
    }

    let program = match parse_source(&request.source) {
        Ok(program) => program,
        Err(err) => {
            warn!(error = %err, "Source failed to parse");
            let error = err.to_string();
            return Ok(request
                .tests
                .iter()
                .map(|_| classify(Outcome::Unparsable(error.clone())))
                .collect());
        }
    };

    let mut grader = Grader {
        program,
        source: Arc::from(request.source.as_str()),
        variant: Variant::from_flags(request.is_linked_list, request.is_level5),
        budget: request.check_timeout.then(|| config.timeout()),
        config,
        resolutions: HashMap::new(),
        sandbox: None,
    };

    let mut results = Vec::with_capacity(request.tests.len());
    for (index, test) in request.tests.iter().enumerate() {
        let name = test.function_name.as_deref().or(request.function_name.as_deref());
        let result = grader.grade(test, name).await?;
        debug!(test = index, function = name.unwrap_or("<first>"), result = %result.kind(), "Test graded");
        results.push(result);
    }

    let passed = results.iter().filter(|result| result.is_success()).count();
    info!(passed, total = results.len(), "Evaluation complete");
    Ok(results)
}

/// Per-request state shared by all tests
struct Grader<'a> {
    program: Program,
    source: Arc<str>,
    variant: Variant,
    budget: Option<std::time::Duration>,
    config: &'a HarnessConfig,
    resolutions: HashMap<Option<String>, Result<ResolvedFunction, SpecificationFault>>,
    sandbox: Option<Sandbox>,
}

impl Grader<'_> {
    async fn grade(&mut self, test: &Test, name: Option<&str>) -> Result<TestResult, HarnessError> {
        let program = &self.program;
        let resolution = self
            .resolutions
            .entry(name.map(str::to_string))
            .or_insert_with(|| resolve(program, name))
            .clone();
        let function = match resolution.and_then(|function| {
            function.check_arity(test.input_args.len())?;
            Ok(function)
        }) {
            Ok(function) => function,
            Err(fault) => return Ok(classify(Outcome::Unspecified(fault.to_string()))),
        };
        let fixtures = match self.decode_fixtures(test) {
            Ok(fixtures) => fixtures,
            Err(fault) => return Ok(classify(Outcome::Unspecified(fault.to_string()))),
        };

        let sandbox = match &mut self.sandbox {
            Some(sandbox) => sandbox,
            slot => slot.insert(Sandbox::spawn(self.source.clone(), self.variant, self.config).await?),
        };
        let outcome = sandbox.invoke(&function.name, &fixtures.inputs, self.budget).await?;
        Ok(classify(Outcome::Executed {
            function: &function,
            fixtures,
            outcome,
        }))
    }

    /// Inputs stay in raw form for the sandbox to give structure; expectations
    /// are brought into the variant's canonical shape
    fn decode_fixtures(&self, test: &Test) -> Result<Fixtures, SpecificationFault> {
        let decode_one = |text: &str, structured: bool| -> Result<Literal, SpecificationFault> {
            if text.len() > self.config.max_literal_bytes {
                return Err(SpecificationFault::LiteralTooLarge {
                    size: text.len(),
                    limit: self.config.max_literal_bytes,
                });
            }
            let decoded = if structured {
                decode_with(text, self.variant)
            } else {
                decode(text)
            };
            decoded.map_err(|err| SpecificationFault::Literal(err.to_string()))
        };
        let inputs = test
            .input_args
            .iter()
            .map(|text| decode_one(text, false))
            .collect::<Result<Vec<_>, _>>()?;
        let output = test
            .output
            .as_deref()
            .map(|text| decode_one(text, true))
            .transpose()?;
        let output_args = test
            .output_args
            .as_ref()
            .map(|texts| {
                texts
                    .iter()
                    .map(|text| decode_one(text, true))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        Ok(Fixtures {
            inputs,
            output,
            output_args,
        })
    }
}
