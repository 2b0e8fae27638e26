/// Source Resolver - Static Lookup of the Function Under Test
///
/// **Responsibility:**
/// Parse submitted source once and pick the function each test calls.
///
/// **Rules:**
/// - Only module-scope `def` statements are candidates, in source order
/// - No name given: the first top-level function
/// - Functions nested in other functions or classes are never targets
/// - Parameter names come from the declaration alone, so they are known
///   even when the body or module-level code would fail at runtime

use rustpython_parser::ast::{self, Arguments};
use rustpython_parser::{Parse, ParseError};

const SOURCE_PATH: &str = "<source>";

/// Top-level statements of a submission
pub type Program = ast::Suite;

/// Parse the whole submission; a failure here is a syntax error for every test
pub fn parse_source(source: &str) -> Result<Program, ParseError> {
    ast::Suite::parse(source, SOURCE_PATH)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFunction {
    pub name: String,
    /// Positional parameters, including positional-only ones
    pub params: Vec<String>,
    /// Positional parameters without a default
    pub required: usize,
    /// Declares `*args`
    pub variadic: bool,
}

impl ResolvedFunction {
    fn from_def(name: &str, args: &Arguments) -> Self {
        let positional: Vec<_> = args.posonlyargs.iter().chain(&args.args).collect();
        Self {
            name: name.to_string(),
            params: positional.iter().map(|param| param.def.arg.as_str().to_string()).collect(),
            required: positional.iter().filter(|param| param.default.is_none()).count(),
            variadic: args.vararg.is_some(),
        }
    }

    /// A test must supply every required parameter and no more than the
    /// function accepts positionally
    pub fn check_arity(&self, given: usize) -> Result<(), SpecificationFault> {
        let expected = if given < self.required {
            self.required
        } else if given > self.params.len() && !self.variadic {
            self.params.len()
        } else {
            return Ok(());
        };
        Err(SpecificationFault::WrongArgumentCount {
            name: self.name.clone(),
            expected,
            got: given,
        })
    }
}

/// Why a test cannot be run as specified
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecificationFault {
    #[error("no function in source")]
    NoFunction,
    #[error("function not found: {0}")]
    NotFound(String),
    #[error("wrong argument count: {name}() takes {expected} arguments but {got} were given")]
    WrongArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid test literal: {0}")]
    Literal(String),
    #[error("test literal is {size} bytes, limit is {limit}")]
    LiteralTooLarge { size: usize, limit: usize },
}

/// Every top-level function with its parameters, in source order
pub fn top_level_functions(program: &Program) -> Vec<ResolvedFunction> {
    program
        .iter()
        .filter_map(|stmt| match stmt {
            ast::Stmt::FunctionDef(def) => Some(ResolvedFunction::from_def(def.name.as_str(), &def.args)),
            ast::Stmt::AsyncFunctionDef(def) => {
                Some(ResolvedFunction::from_def(def.name.as_str(), &def.args))
            }
            _ => None,
        })
        .collect()
}

/// Resolve `name` (or the first function) against the top-level definitions
pub fn resolve(program: &Program, name: Option<&str>) -> Result<ResolvedFunction, SpecificationFault> {
    let mut functions = top_level_functions(program).into_iter();
    match name {
        None => functions.next().ok_or(SpecificationFault::NoFunction),
        Some(name) => functions
            .find(|function| function.name == name)
            .ok_or_else(|| SpecificationFault::NotFound(name.to_string())),
    }
}
