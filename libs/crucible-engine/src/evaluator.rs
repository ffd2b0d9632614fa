//! Result evaluation - pure grading logic.
//!
//! Two independent modes, selected by the submission mode and never mixed:
//! a recursive criteria tree for raw-program challenges, and per-test-case
//! segment comparison for harness challenges. Knows nothing about
//! processes, files, or how the output was produced.

use crucible_common::types::{ExecutionOutput, SuccessCriteria, TestCase, TestCaseResult};
use regex::Regex;

use crate::harness::CASE_DELIMITER;

/// Evaluate a criteria tree against the captured output. `All`/`Any`
/// recurse structurally; an invalid regex simply fails its node.
pub fn criteria_met(criteria: &SuccessCriteria, output: &ExecutionOutput) -> bool {
    match criteria {
        SuccessCriteria::ExactMatch { expected_stdout } => {
            output.stdout.trim() == expected_stdout.trim()
        }

        SuccessCriteria::RegexMatch { regex } => Regex::new(regex)
            .map(|re| re.is_match(&output.stdout))
            .unwrap_or(false),

        SuccessCriteria::OutputCount { token, count } => {
            output.stdout.matches(token.as_str()).count() == *count
        }

        SuccessCriteria::CompileOnly => output.compile_success(),

        SuccessCriteria::All { criteria } => criteria.iter().all(|c| criteria_met(c, output)),

        SuccessCriteria::Any { criteria } => criteria.iter().any(|c| criteria_met(c, output)),
    }
}

/// Graded outcome of a harness-mode suite.
#[derive(Debug)]
pub struct SuiteEvaluation {
    pub results: Vec<TestCaseResult>,
    pub all_passed: bool,
    /// Set when stdout did not segment cleanly into one piece per test
    /// case, e.g. the delimiter itself appeared in learner output.
    pub structural_error: Option<String>,
}

/// Split harness stdout into per-case segments and compare each against its
/// own expected value, independently.
///
/// Fewer segments than cases means the program died partway through the
/// suite: the missing cases are reported as not executed, never shifted
/// onto later comparisons. More segments than cases means learner output
/// contained the delimiter, which fails the whole suite structurally.
pub fn evaluate_suite(
    cases: &[TestCase],
    stdout: &str,
    reveal_hidden: bool,
) -> SuiteEvaluation {
    let segments: Vec<&str> = {
        let mut parts = stdout.split(CASE_DELIMITER);
        // Everything before the first delimiter is pre-suite noise
        parts.next();
        parts.collect()
    };

    if segments.len() > cases.len() {
        let results = cases
            .iter()
            .enumerate()
            .map(|(index, case)| masked_result(index, case, false, true, None, reveal_hidden))
            .collect();
        return SuiteEvaluation {
            results,
            all_passed: false,
            structural_error: Some(format!(
                "output produced {} segments for {} test cases",
                segments.len(),
                cases.len()
            )),
        };
    }

    let mut results = Vec::with_capacity(cases.len());
    let mut all_passed = true;

    for (index, case) in cases.iter().enumerate() {
        match segments.get(index) {
            Some(segment) => {
                let actual = segment.trim();
                let passed = actual == case.expected.trim();
                all_passed &= passed;
                results.push(masked_result(
                    index,
                    case,
                    passed,
                    true,
                    Some(actual.to_string()),
                    reveal_hidden,
                ));
            }
            None => {
                all_passed = false;
                results.push(masked_result(index, case, false, false, None, reveal_hidden));
            }
        }
    }

    SuiteEvaluation {
        results,
        all_passed,
        structural_error: None,
    }
}

/// Apply the diagnostics visibility policy: sample cases always carry their
/// expected/actual text, hidden cases report pass/fail only unless the
/// challenge reveals them.
fn masked_result(
    index: usize,
    case: &TestCase,
    passed: bool,
    executed: bool,
    actual: Option<String>,
    reveal_hidden: bool,
) -> TestCaseResult {
    let visible = case.sample || reveal_hidden;
    TestCaseResult {
        index,
        passed,
        executed,
        sample: case.sample,
        expected: visible.then(|| case.expected.clone()),
        actual: if visible { actual } else { None },
    }
}

/// Learner-facing feedback for a harness suite that compiled and ran.
pub fn suite_feedback(evaluation: &SuiteEvaluation) -> String {
    if let Some(reason) = &evaluation.structural_error {
        return format!(
            "Your output couldn't be matched against the test cases ({}). \
             Make sure you only print what the challenge asks for.",
            reason
        );
    }
    if evaluation.all_passed {
        return "Success! All test cases passed.".to_string();
    }

    let passed = evaluation.results.iter().filter(|r| r.passed).count();
    let total = evaluation.results.len();
    if let Some(first_skipped) = evaluation.results.iter().find(|r| !r.executed) {
        format!(
            "{} of {} test cases passed. Test {} did not execute - your code \
             likely crashed before reaching it.",
            passed,
            total,
            first_skipped.index + 1
        )
    } else {
        format!("{} of {} test cases passed. Try again!", passed, total)
    }
}
