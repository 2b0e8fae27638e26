use serde::{Deserialize, Serialize};
use std::fmt;

/// One invocation of the function under test.
///
/// Every argument and expectation is literal text in the submitted
/// language's syntax, e.g. `"[1, 2]"` or `"(1, 'a')"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Test {
    pub input_args: Vec<String>,
    /// Expected state of every argument after the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_args: Option<Vec<String>>,
    /// Expected return value; unchecked when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Overrides the request's function name for this test only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

impl Test {
    pub fn new<I, S>(input_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input_args: input_args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_output_args<I, S>(mut self, output_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args = Some(output_args.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.output_args {
            Some(output_args) if output_args.len() != self.input_args.len() => {
                Err(ValidationError::OutputArgsLength {
                    input_args: self.input_args.len(),
                    output_args: output_args.len(),
                })
            }
            _ => Ok(()),
        }
    }
}

fn default_check_timeout() -> bool {
    true
}

/// A grading request: submitted source plus the tests to run against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub source: String,
    pub tests: Vec<Test>,
    /// Function under test; the first top-level function when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Flat list arguments and expectations are singly-linked `ListNode` chains
    #[serde(default)]
    pub is_linked_list: bool,
    /// Level-order list arguments and expectations are `TreeNode` trees
    #[serde(default)]
    pub is_level5: bool,
    #[serde(default = "default_check_timeout")]
    pub check_timeout: bool,
}

impl Request {
    pub fn new(source: impl Into<String>, tests: Vec<Test>) -> Self {
        Self {
            source: source.into(),
            tests,
            function_name: None,
            is_linked_list: false,
            is_level5: false,
            check_timeout: true,
        }
    }

    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// Reject requests the harness cannot grade meaningfully
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_linked_list && self.is_level5 {
            return Err(ValidationError::ConflictingVariants);
        }
        self.tests.iter().try_for_each(Test::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("The length of input_args and output_args are not equal ({input_args} != {output_args})")]
    OutputArgsLength { input_args: usize, output_args: usize },
    #[error("is_linked_list and is_level5 cannot both be set")]
    ConflictingVariants,
    #[error("source is {size} bytes, limit is {limit}")]
    SourceTooLarge { size: usize, limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    SyntaxError,
    SpecificationError,
    RuntimeError,
    Timeout,
    Fail,
    Success,
}

impl ResultType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultType::SyntaxError => "syntax_error",
            ResultType::SpecificationError => "specification_error",
            ResultType::RuntimeError => "runtime_error",
            ResultType::Timeout => "timeout",
            ResultType::Fail => "fail",
            ResultType::Success => "success",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a failing test was called with and expected to produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub arg_names: Vec<String>,
    pub input_args: Vec<String>,
    pub expected_output_args: Option<Vec<String>>,
    pub expected_output: Option<String>,
}

/// Outcome of a single test; exactly one per test, in request order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestResult {
    SyntaxError {
        error: String,
    },
    SpecificationError {
        error: String,
    },
    RuntimeError {
        #[serde(flatten)]
        context: ErrorContext,
        error: String,
    },
    Timeout {
        #[serde(flatten)]
        context: ErrorContext,
    },
    Fail {
        #[serde(flatten)]
        context: ErrorContext,
        /// Every argument after the call
        output_args: Vec<String>,
        /// The value returned
        output: String,
    },
    Success,
}

impl TestResult {
    pub fn kind(&self) -> ResultType {
        match self {
            TestResult::SyntaxError { .. } => ResultType::SyntaxError,
            TestResult::SpecificationError { .. } => ResultType::SpecificationError,
            TestResult::RuntimeError { .. } => ResultType::RuntimeError,
            TestResult::Timeout { .. } => ResultType::Timeout,
            TestResult::Fail { .. } => ResultType::Fail,
            TestResult::Success => ResultType::Success,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            TestResult::RuntimeError { context, .. }
            | TestResult::Timeout { context }
            | TestResult::Fail { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TestResult::SyntaxError { error }
            | TestResult::SpecificationError { error }
            | TestResult::RuntimeError { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestResult::Success)
    }
}
