use serde::{Deserialize, Serialize};

/// Terminal classification of a judged submission
///
/// Exactly one verdict is produced per submission. `InternalError` marks a
/// failure of the service itself (workspace, staging, process launch) and is
/// never caused by the submitted program.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verdict {
    CorrectAnswer,
    WrongAnswer,
    RuntimeError,
    TimedOut,
    CompileError,
    InternalError,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CorrectAnswer => "CorrectAnswer",
            Self::WrongAnswer => "WrongAnswer",
            Self::RuntimeError => "RuntimeError",
            Self::TimedOut => "TimedOut",
            Self::CompileError => "CompileError",
            Self::InternalError => "InternalError",
        };
        write!(f, "{name}")
    }
}

/// Compares normalized actual output against normalized expected output
///
/// Equality is exact over the whole sequence: same line count, same bytes per
/// line, same order.
pub fn decide(actual: &[&str], expected: &[&str]) -> Verdict {
    if actual == expected {
        Verdict::CorrectAnswer
    } else {
        Verdict::WrongAnswer
    }
}
