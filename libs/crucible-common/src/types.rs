use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One learner submission: the raw source text plus the challenge contract
/// it is graded against. Immutable once constructed; the `id` also names the
/// submission's private working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub source: String,
    pub challenge: Challenge,
}

impl Submission {
    pub fn new(source: impl Into<String>, challenge: Challenge) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            challenge,
        }
    }

    pub fn mode(&self) -> SubmissionMode {
        match self.challenge {
            Challenge::RawProgram { .. } => SubmissionMode::RawProgram,
            Challenge::FunctionBody { .. } => SubmissionMode::FunctionBody,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMode {
    /// The learner submits a complete program; grading uses a criteria tree.
    RawProgram,
    /// The learner submits a function body; grading wraps it in a generated
    /// harness and compares per-test-case output segments.
    FunctionBody,
}

/// Challenge contract supplied by the level/quest collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Challenge {
    RawProgram {
        criteria: SuccessCriteria,
        #[serde(default)]
        hint: Option<String>,
    },
    FunctionBody {
        signature: FunctionSignature,
        test_cases: Vec<TestCase>,
        /// Diagnostics policy: when true, hidden test cases also report
        /// expected/actual text instead of pass/fail only.
        #[serde(default)]
        reveal_hidden: bool,
        #[serde(default)]
        hint: Option<String>,
    },
}

impl Challenge {
    pub fn hint(&self) -> Option<&str> {
        match self {
            Challenge::RawProgram { hint, .. } => hint.as_deref(),
            Challenge::FunctionBody { hint, .. } => hint.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: String,
}

/// One test case for a function-harness challenge. `args` are positional
/// literals rendered into the generated harness; order across the test-case
/// list determines output segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub args: Vec<serde_json::Value>,
    pub expected: String,
    #[serde(default)]
    pub sample: bool,
}

/// Composable grading predicate for raw-program challenges. Trees are
/// supplied by the level collaborator and trusted to be acyclic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuccessCriteria {
    /// Output must match exactly (surrounding whitespace ignored)
    ExactMatch { expected_stdout: String },

    /// Output must contain a match for the regex (unanchored search)
    RegexMatch { regex: String },

    /// Token must occur in output exactly `count` times
    OutputCount { token: String, count: usize },

    /// Code must compile without errors (no output check)
    CompileOnly,

    /// Every child criterion must pass
    All { criteria: Vec<SuccessCriteria> },

    /// At least one child criterion must pass
    Any { criteria: Vec<SuccessCriteria> },
}

/// Captured result of compiling and running a submission. At most one of
/// these exists per submission (one compile, one run, regardless of how
/// many test cases the challenge carries).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub compile_error: Option<String>,
    pub runtime_error: Option<String>,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u64,
    pub timed_out: bool,
}

impl ExecutionOutput {
    pub fn compile_success(&self) -> bool {
        self.compile_error.is_none()
    }

    pub fn run_success(&self) -> bool {
        self.compile_success()
            && self.runtime_error.is_none()
            && !self.timed_out
            && self.exit_code == Some(0)
    }
}

/// Per-test-case grading result. `executed = false` means the program never
/// reached this case's output (e.g. it crashed partway through the suite).
/// `expected`/`actual` are withheld for hidden cases unless the challenge's
/// reveal policy says otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub index: usize,
    pub passed: bool,
    pub executed: bool,
    pub sample: bool,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Terminal classification of a submission. Exactly one of these is
/// produced per submission; `Infrastructure` marks host faults that are
/// never attributed to the learner's code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictOutcome {
    Passed,
    CompileError,
    RuntimeError,
    TimedOut,
    WrongOutput,
    Infrastructure,
}

/// The one artifact handed back to the game/progression collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub success: bool,
    pub outcome: VerdictOutcome,
    pub feedback: String,
    pub hint: Option<String>,
    pub compile_error: Option<String>,
    /// Raw stdout, surfaced for raw-program challenges only; harness-mode
    /// stdout would leak hidden test-case output.
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub test_results: Option<Vec<TestCaseResult>>,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}
