//! Grading harness: resolve the function under test, run every test in a
//! sandbox process under a wall-clock budget, and classify the outcome.

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod resolver;

pub use checkmate_common::config::HarnessConfig;
pub use checkmate_common::types::{ErrorContext, Request, ResultType, Test, TestResult};
pub use error::HarnessError;
pub use executor::evaluate;
