// Messages between the harness and a sandbox process.
//
// One JSON object per line in each direction. Jobs carry ids so a reply can
// be matched to the call that produced it; a cancel names the job it targets.

use serde::{Deserialize, Serialize};

use crate::literal::{decode, Literal, Variant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    /// Install the submitted source; answered with `Reply::Ready`
    Load { source: String, variant: Variant },
    /// Execute module-level code once in a scratch namespace
    RunModule { id: u64 },
    /// Call `name` with argument literals, each in its repr form
    Call { id: u64, name: String, args: Vec<String> },
    /// Interrupt job `id` if it is still running
    Cancel { id: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Ready,
    Finished { id: u64, report: Report },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Report {
    ModuleReady,
    Completed {
        output: Snapshot,
        output_args: Vec<Snapshot>,
    },
    /// The call itself raised
    Raised { error: String },
    /// Module-level code raised, or the source failed to compile
    Outside { error: String },
    /// The job was cancelled, or submitted code raised `KeyboardInterrupt`
    Interrupted,
}

/// The repr of a value after a call, and whether every part of it has a literal form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub text: String,
    pub exact: bool,
}

impl Snapshot {
    /// Decode into a literal in the variant's canonical shape; anything
    /// without a literal form stays opaque and compares unequal.
    pub fn into_literal(self, variant: Variant) -> Literal {
        if !self.exact {
            return Literal::Opaque(self.text);
        }
        match decode(&self.text) {
            Ok(literal) => variant.normalize(literal),
            Err(_) => Literal::Opaque(self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(text: &str, exact: bool) -> Snapshot {
        Snapshot {
            text: text.to_string(),
            exact,
        }
    }

    #[test]
    fn test_job_wire_shape() {
        let job = Job::Call {
            id: 7,
            name: "f".to_string(),
            args: vec!["[1, 2]".to_string()],
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["job"], "call");
        assert_eq!(value["args"][0], "[1, 2]");

        let load: Job = serde_json::from_str(r#"{"job":"load","source":"x = 1","variant":"tree"}"#).unwrap();
        assert_eq!(
            load,
            Job::Load {
                source: "x = 1".to_string(),
                variant: Variant::Tree
            }
        );
    }

    #[test]
    fn test_reply_wire_shape() {
        let reply = Reply::Finished {
            id: 3,
            report: Report::Raised {
                error: "ZeroDivisionError: division by zero".to_string(),
            },
        };
        let text = serde_json::to_string(&reply).unwrap();
        assert!(text.contains(r#""reply":"finished""#));
        assert!(text.contains(r#""status":"raised""#));
        assert_eq!(serde_json::from_str::<Reply>(&text).unwrap(), reply);
        assert_eq!(serde_json::from_str::<Reply>(r#"{"reply":"ready"}"#).unwrap(), Reply::Ready);
    }

    #[test]
    fn test_snapshot_normalized_like_expectations() {
        assert_eq!(snapshot("[]", true).into_literal(Variant::LinkedList), Literal::None);
        assert_eq!(
            snapshot("[]", true).into_literal(Variant::Plain),
            Literal::List(Vec::new())
        );
        assert_eq!(
            snapshot("[1, None, None]", true).into_literal(Variant::Tree),
            Literal::List(vec![Literal::Int(1)])
        );
    }

    #[test]
    fn test_inexact_snapshot_is_opaque() {
        assert_eq!(
            snapshot("[<object>]", false).into_literal(Variant::Plain),
            Literal::Opaque("[<object>]".to_string())
        );
        assert!(matches!(
            snapshot("<generator object g>", true).into_literal(Variant::Plain),
            Literal::Opaque(_)
        ));
    }
}
