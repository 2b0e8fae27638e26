//! Python execution side of checkmate.
//!
//! `literal` is the fixture codec shared with the harness, `protocol` the
//! line-delimited JSON spoken with a sandbox process, and `worker` the loop
//! such a process runs around an embedded [`PythonHost`].

pub mod host;
pub mod literal;
pub mod protocol;
pub mod worker;

pub use host::{HostError, PythonHost};
pub use literal::{decode, decode_with, Literal, LiteralError, Variant};
pub use protocol::{Job, Reply, Report, Snapshot};
pub use worker::{serve, WorkerOptions};
