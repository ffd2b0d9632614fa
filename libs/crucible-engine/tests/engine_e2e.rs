//! Full-pipeline tests against a real C compiler.
//!
//! Each test bails out quietly when no `gcc` is on PATH, so the suite
//! stays green on machines without a toolchain (the unit tests cover all
//! engine logic with fakes).

use crucible_common::config::EngineConfig;
use crucible_common::types::{
    Challenge, FunctionSignature, Parameter, Submission, SuccessCriteria, TestCase,
    VerdictOutcome,
};
use crucible_engine::Engine;

fn gcc_available() -> bool {
    std::process::Command::new("gcc")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! require_gcc {
    () => {
        if !gcc_available() {
            eprintln!("gcc not found on PATH; skipping");
            return;
        }
    };
}

fn test_engine() -> (Engine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.work_root = dir.path().to_path_buf();
    config.limits.wall_time_ms = 3_000;
    (Engine::new(config), dir)
}

fn add_challenge(cases: Vec<TestCase>) -> Challenge {
    Challenge::FunctionBody {
        signature: FunctionSignature {
            name: "add".to_string(),
            return_type: "int".to_string(),
            parameters: vec![
                Parameter {
                    name: "a".to_string(),
                    param_type: "int".to_string(),
                },
                Parameter {
                    name: "b".to_string(),
                    param_type: "int".to_string(),
                },
            ],
        },
        test_cases: cases,
        reveal_hidden: false,
        hint: None,
    }
}

fn case(args: Vec<serde_json::Value>, expected: &str, sample: bool) -> TestCase {
    TestCase {
        args,
        expected: expected.to_string(),
        sample,
    }
}

#[tokio::test]
async fn add_function_passes_its_suite() {
    require_gcc!();
    let (engine, _dir) = test_engine();

    let challenge = add_challenge(vec![
        case(vec![serde_json::json!(3), serde_json::json!(4)], "7", true),
        case(vec![serde_json::json!(-1), serde_json::json!(1)], "0", false),
        case(vec![serde_json::json!(10), serde_json::json!(20)], "30", false),
    ]);
    let submission = Submission::new("int add(int a, int b) { return a + b; }", challenge);

    let verdict = engine.submit(&submission).await;
    assert!(verdict.success, "feedback: {}", verdict.feedback);
    assert_eq!(verdict.outcome, VerdictOutcome::Passed);

    // One result per supplied case, each graded against its own expectation
    let results = verdict.test_results.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.passed && r.executed));
    // Hidden cases stay masked even on success
    assert!(results[1].actual.is_none());
    assert_eq!(results[0].actual.as_deref(), Some("7"));
}

#[tokio::test]
async fn wrong_function_fails_only_the_wrong_cases() {
    require_gcc!();
    let (engine, _dir) = test_engine();

    let challenge = add_challenge(vec![
        case(vec![serde_json::json!(0), serde_json::json!(0)], "0", true),
        case(vec![serde_json::json!(3), serde_json::json!(4)], "7", true),
    ]);
    // Multiplies instead of adding: first case passes (0*0 == 0+0)
    let submission = Submission::new("int add(int a, int b) { return a * b; }", challenge);

    let verdict = engine.submit(&submission).await;
    assert!(!verdict.success);
    assert_eq!(verdict.outcome, VerdictOutcome::WrongOutput);

    let results = verdict.test_results.unwrap();
    assert!(results[0].passed);
    assert!(!results[1].passed);
    assert_eq!(results[1].actual.as_deref(), Some("12"));
}

#[tokio::test]
async fn compile_error_short_circuits() {
    require_gcc!();
    let (engine, _dir) = test_engine();

    let challenge = Challenge::RawProgram {
        criteria: SuccessCriteria::CompileOnly,
        hint: None,
    };
    // Unterminated string literal
    let submission = Submission::new(
        "#include <stdio.h>\nint main(void) { printf(\"oops); return 0; }\n",
        challenge,
    );

    let verdict = engine.submit(&submission).await;
    assert!(!verdict.success);
    assert_eq!(verdict.outcome, VerdictOutcome::CompileError);
    let diag = verdict.compile_error.expect("compiler diagnostics");
    assert!(!diag.is_empty());
    // No run happened, so no captured output exists
    assert!(verdict.stdout.is_none());
}

#[tokio::test]
async fn infinite_loop_times_out() {
    require_gcc!();
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.work_root = dir.path().to_path_buf();
    config.limits.wall_time_ms = 500;
    let engine = Engine::new(config);

    let challenge = Challenge::RawProgram {
        criteria: SuccessCriteria::ExactMatch {
            expected_stdout: "partial".to_string(),
        },
        hint: None,
    };
    // Prints, then spins forever; the partial output must not be scored
    let submission = Submission::new(
        "#include <stdio.h>\nint main(void) { printf(\"partial\"); fflush(stdout); for(;;); }\n",
        challenge,
    );

    let verdict = engine.submit(&submission).await;
    assert!(!verdict.success);
    assert!(verdict.timed_out);
    assert_eq!(verdict.outcome, VerdictOutcome::TimedOut);
}

#[tokio::test]
async fn exact_match_trims_surrounding_whitespace() {
    require_gcc!();
    let (engine, _dir) = test_engine();

    let challenge = Challenge::RawProgram {
        criteria: SuccessCriteria::ExactMatch {
            expected_stdout: "Hello World\n".to_string(),
        },
        hint: None,
    };
    let submission = Submission::new(
        "#include <stdio.h>\nint main(void) { printf(\"Hello World\\n\"); }\n",
        challenge,
    );

    let verdict = engine.submit(&submission).await;
    assert!(verdict.success, "feedback: {}", verdict.feedback);
    assert_eq!(verdict.stdout.as_deref(), Some("Hello World\n"));
}

#[tokio::test]
async fn identical_submissions_get_identical_verdict_shapes() {
    require_gcc!();
    let (engine, _dir) = test_engine();

    let challenge = add_challenge(vec![
        case(vec![serde_json::json!(3), serde_json::json!(4)], "7", true),
        case(vec![serde_json::json!(5), serde_json::json!(5)], "11", true),
    ]);
    let source = "int add(int a, int b) { return a + b; }";

    let first = engine
        .submit(&Submission::new(source, challenge.clone()))
        .await;
    let second = engine
        .submit(&Submission::new(source, challenge))
        .await;

    assert_eq!(first.success, second.success);
    assert_eq!(first.outcome, second.outcome);
    let (a, b) = (first.test_results.unwrap(), second.test_results.unwrap());
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.passed, y.passed);
        assert_eq!(x.executed, y.executed);
    }
}

#[tokio::test]
async fn slow_submission_does_not_delay_a_fast_one() {
    require_gcc!();
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.work_root = dir.path().to_path_buf();
    config.limits.wall_time_ms = 2_000;
    let engine = std::sync::Arc::new(Engine::new(config));

    let loop_challenge = Challenge::RawProgram {
        criteria: SuccessCriteria::CompileOnly,
        hint: None,
    };
    let fast_challenge = Challenge::RawProgram {
        criteria: SuccessCriteria::ExactMatch {
            expected_stdout: "fast".to_string(),
        },
        hint: None,
    };

    let slow = Submission::new("int main(void) { for(;;); }", loop_challenge);
    let fast = Submission::new(
        "#include <stdio.h>\nint main(void) { printf(\"fast\"); return 0; }\n",
        fast_challenge,
    );

    let slow_engine = engine.clone();
    let slow_task = tokio::spawn(async move { slow_engine.submit(&slow).await });

    let started = std::time::Instant::now();
    let fast_verdict = engine.submit(&fast).await;
    let fast_elapsed = started.elapsed();

    assert!(fast_verdict.success);
    // The fast one resolves well before the slow one's 2s deadline
    assert!(
        fast_elapsed < std::time::Duration::from_millis(1_900),
        "fast submission took {:?}",
        fast_elapsed
    );

    let slow_verdict = slow_task.await.unwrap();
    assert!(slow_verdict.timed_out);
}

#[tokio::test]
async fn crash_partway_reports_unreached_tests() {
    require_gcc!();
    let (engine, _dir) = test_engine();

    let challenge = Challenge::FunctionBody {
        signature: FunctionSignature {
            name: "reciprocal".to_string(),
            return_type: "int".to_string(),
            parameters: vec![Parameter {
                name: "n".to_string(),
                param_type: "int".to_string(),
            }],
        },
        test_cases: vec![
            case(vec![serde_json::json!(1)], "100", true),
            case(vec![serde_json::json!(0)], "0", true),
            case(vec![serde_json::json!(2)], "50", true),
        ],
        reveal_hidden: false,
        hint: None,
    };
    // Divides by zero on the second case and dies there
    let submission = Submission::new("int reciprocal(int n) { return 100 / n; }", challenge);

    let verdict = engine.submit(&submission).await;
    assert!(!verdict.success);
    assert_eq!(verdict.outcome, VerdictOutcome::RuntimeError);

    let results = verdict.test_results.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].passed);
    assert!(!results[2].executed);
}
