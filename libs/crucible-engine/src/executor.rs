//! Submission orchestration.
//!
//! Sequences harness generation, compilation, sandboxed execution, and
//! evaluation into exactly one verdict per submission, short-circuiting on
//! compile failure and timeout. Holds no state across calls; concurrent
//! submissions only share the engine's immutable configuration and the
//! sandbox backend.

use std::sync::Arc;
use std::time::Instant;

use crucible_common::config::EngineConfig;
use crucible_common::types::{
    Challenge, ExecutionOutput, Submission, Verdict, VerdictOutcome,
};
use tracing::{debug, error, info, instrument};

use crate::compiler::{self, CompileOutcome, Workspace};
use crate::error::EngineError;
use crate::evaluator;
use crate::harness;
use crate::sandbox::{ProcessSandbox, RunOutcome, Sandbox};

const FEEDBACK_COMPILE: &str = "Code failed to compile. Check for syntax errors.";
const FEEDBACK_TIMEOUT: &str = "Code execution timed out. Check for infinite loops.";
const FEEDBACK_SUCCESS: &str = "Success! Your code produced the correct output.";
const FEEDBACK_MISMATCH: &str = "Output doesn't match expected result. Try again!";
const FEEDBACK_INFRA: &str =
    "The grading environment hit an internal problem. Please try again.";
const FEEDBACK_BAD_CHALLENGE: &str =
    "This challenge is misconfigured. Please report it.";

pub struct Engine {
    config: EngineConfig,
    sandbox: Arc<dyn Sandbox>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_sandbox(config, Arc::new(ProcessSandbox))
    }

    /// Construct with a custom isolation backend.
    pub fn with_sandbox(config: EngineConfig, sandbox: Arc<dyn Sandbox>) -> Self {
        Self { config, sandbox }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Grade one submission. Never panics and never returns an error:
    /// infrastructure faults are logged and folded into an
    /// `Infrastructure` verdict with a retry message, so every code path
    /// terminates in exactly one outcome.
    #[instrument(skip(self, submission), fields(submission_id = %submission.id))]
    pub async fn submit(&self, submission: &Submission) -> Verdict {
        let start = Instant::now();

        let verdict = match self.grade(submission, start).await {
            Ok(verdict) => verdict,
            Err(e) if e.is_structural() => {
                error!(error = %e, "challenge definition rejected by harness generator");
                failure_verdict(
                    VerdictOutcome::Infrastructure,
                    FEEDBACK_BAD_CHALLENGE,
                    submission,
                    start,
                )
            }
            Err(e) => {
                error!(error = %e, "submission failed on an environment fault");
                failure_verdict(
                    VerdictOutcome::Infrastructure,
                    FEEDBACK_INFRA,
                    submission,
                    start,
                )
            }
        };

        info!(
            outcome = ?verdict.outcome,
            success = verdict.success,
            elapsed_ms = verdict.elapsed_ms,
            "submission graded"
        );
        verdict
    }

    async fn grade(
        &self,
        submission: &Submission,
        start: Instant,
    ) -> Result<Verdict, EngineError> {
        let max_bytes = self.config.compiler.max_source_bytes;
        if submission.source.len() > max_bytes {
            return Ok(Verdict {
                compile_error: Some(format!(
                    "Code size exceeds maximum limit of {} bytes",
                    max_bytes
                )),
                ..failure_verdict(
                    VerdictOutcome::CompileError,
                    FEEDBACK_COMPILE,
                    submission,
                    start,
                )
            });
        }

        let source = match &submission.challenge {
            Challenge::RawProgram { .. } => submission.source.clone(),
            Challenge::FunctionBody {
                signature,
                test_cases,
                ..
            } => harness::generate(&submission.source, signature, test_cases)?,
        };

        let workspace = Workspace::create(&self.config.work_root, submission.id)?;
        debug!(workspace = %workspace.dir().display(), "workspace acquired");

        match compiler::compile(&workspace, &source, &self.config.compiler).await? {
            CompileOutcome::Failure { stderr } => {
                debug!("compile failed; runner and evaluator skipped");
                return Ok(Verdict {
                    compile_error: Some(stderr),
                    ..failure_verdict(
                        VerdictOutcome::CompileError,
                        FEEDBACK_COMPILE,
                        submission,
                        start,
                    )
                });
            }
            CompileOutcome::Success => {}
        }

        let run = self
            .sandbox
            .execute(&workspace.binary_path(), &self.config.limits)
            .await?;

        let output = match run {
            RunOutcome::TimedOut { elapsed_ms } => {
                debug!(elapsed_ms, "run timed out; evaluator skipped");
                return Ok(Verdict {
                    timed_out: true,
                    ..failure_verdict(
                        VerdictOutcome::TimedOut,
                        FEEDBACK_TIMEOUT,
                        submission,
                        start,
                    )
                });
            }
            RunOutcome::Completed {
                stdout,
                stderr,
                exit_code,
                signal,
                elapsed_ms,
            } => ExecutionOutput {
                stdout,
                stderr,
                compile_error: None,
                runtime_error: runtime_error_text(exit_code, signal),
                exit_code,
                execution_time_ms: elapsed_ms,
                timed_out: false,
            },
        };

        Ok(self.evaluate(submission, output, start))
        // Workspace guard drops here, on success and on every early return
    }

    fn evaluate(
        &self,
        submission: &Submission,
        output: ExecutionOutput,
        start: Instant,
    ) -> Verdict {
        match &submission.challenge {
            Challenge::RawProgram { criteria, hint } => {
                let success = evaluator::criteria_met(criteria, &output);
                let (outcome, feedback) = if success {
                    (VerdictOutcome::Passed, FEEDBACK_SUCCESS.to_string())
                } else if let Some(reason) = &output.runtime_error {
                    (
                        VerdictOutcome::RuntimeError,
                        format!("Your program crashed: {}.", reason),
                    )
                } else {
                    (VerdictOutcome::WrongOutput, FEEDBACK_MISMATCH.to_string())
                };

                Verdict {
                    success,
                    outcome,
                    feedback,
                    hint: if success { None } else { hint.clone() },
                    compile_error: None,
                    stdout: Some(output.stdout),
                    stderr: Some(output.stderr),
                    test_results: None,
                    timed_out: false,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                }
            }

            Challenge::FunctionBody {
                test_cases,
                reveal_hidden,
                hint,
                ..
            } => {
                let evaluation =
                    evaluator::evaluate_suite(test_cases, &output.stdout, *reveal_hidden);
                let success = evaluation.all_passed;
                let (outcome, feedback) = if success {
                    (VerdictOutcome::Passed, evaluator::suite_feedback(&evaluation))
                } else if let Some(reason) = &output.runtime_error {
                    (
                        VerdictOutcome::RuntimeError,
                        format!("Your program crashed: {}.", reason),
                    )
                } else {
                    (
                        VerdictOutcome::WrongOutput,
                        evaluator::suite_feedback(&evaluation),
                    )
                };

                Verdict {
                    success,
                    outcome,
                    feedback,
                    hint: if success { None } else { hint.clone() },
                    compile_error: None,
                    // Raw stdout would leak hidden test-case output
                    stdout: None,
                    stderr: Some(output.stderr),
                    test_results: Some(evaluation.results),
                    timed_out: false,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                }
            }
        }
    }
}

fn runtime_error_text(exit_code: Option<i32>, signal: Option<i32>) -> Option<String> {
    match (exit_code, signal) {
        (Some(0), _) => None,
        (Some(code), _) => Some(format!("process exited with code {}", code)),
        (None, Some(sig)) => Some(format!("process terminated by signal {}", sig)),
        (None, None) => Some("process ended abnormally".to_string()),
    }
}

fn failure_verdict(
    outcome: VerdictOutcome,
    feedback: &str,
    submission: &Submission,
    start: Instant,
) -> Verdict {
    // Infrastructure faults keep the hint out of it - the learner's code
    // was never the problem
    let hint = if outcome == VerdictOutcome::Infrastructure {
        None
    } else {
        submission.challenge.hint().map(str::to_string)
    };
    Verdict {
        success: false,
        outcome,
        feedback: feedback.to_string(),
        hint,
        compile_error: None,
        stdout: None,
        stderr: None,
        test_results: None,
        timed_out: false,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }
}
