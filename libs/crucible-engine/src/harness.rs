//! Test harness generator for function-based challenges.
//!
//! Wraps a learner-written function in a generated `main` that calls it
//! once per test case and prints each result behind a delimiter line, so a
//! single compile and a single run cover the whole suite. The evaluator
//! later splits stdout on the same delimiter to recover per-case segments.

use crucible_common::types::{FunctionSignature, Parameter, TestCase};

use crate::error::EngineError;

/// Marker printed on its own line before each test case's output. Chosen so
/// it will not appear in normal program output; a learner printing it
/// anyway is caught as a structural failure at evaluation time.
pub const CASE_DELIMITER: &str = "<<crucible:case>>";

/// Generate a complete C program wrapping the learner's function with one
/// `main` that exercises every test case in order.
///
/// Fails fast, before any compiler invocation, when the challenge
/// definition uses a parameter or return type the generator cannot render,
/// or when a test case's argument count disagrees with the signature.
pub fn generate(
    user_code: &str,
    signature: &FunctionSignature,
    test_cases: &[TestCase],
) -> Result<String, EngineError> {
    let print_format = print_format_for(&signature.return_type)?;

    let mut body = String::new();
    for (index, case) in test_cases.iter().enumerate() {
        let call_args = format_call_args(&signature.parameters, case, index)?;
        body.push_str("    {\n");
        body.push_str(&format!("        puts(\"{}\");\n", CASE_DELIMITER));
        if signature.return_type == "void" {
            body.push_str(&format!(
                "        {}({});\n        puts(\"done\");\n",
                signature.name, call_args
            ));
        } else {
            body.push_str(&format!(
                "        {} result = {}({});\n",
                signature.return_type, signature.name, call_args
            ));
            body.push_str(&format!(
                "        printf(\"{}\\n\", result);\n",
                print_format
            ));
        }
        body.push_str("    }\n");
    }

    // stdout must stay unbuffered: when the learner's function crashes
    // partway through the suite, output from cases that already ran has to
    // survive so the evaluator can tell executed cases from unreached ones
    Ok(format!(
        "#include <stdio.h>\n\
         #include <stdlib.h>\n\
         #include <string.h>\n\
         \n\
         /* learner's function */\n\
         {user_code}\n\
         \n\
         int main(void) {{\n\
         \x20   setvbuf(stdout, NULL, _IONBF, 0);\n\
         {body}    return 0;\n\
         }}\n"
    ))
}

fn format_call_args(
    params: &[Parameter],
    case: &TestCase,
    case_index: usize,
) -> Result<String, EngineError> {
    if params.len() != case.args.len() {
        return Err(EngineError::Harness(format!(
            "test case {} supplies {} argument(s), signature takes {}",
            case_index,
            case.args.len(),
            params.len()
        )));
    }

    let args: Result<Vec<String>, EngineError> = params
        .iter()
        .zip(case.args.iter())
        .map(|(param, value)| format_single_arg(&param.param_type, value))
        .collect();

    Ok(args?.join(", "))
}

/// Render one argument literal for its declared C type.
fn format_single_arg(param_type: &str, value: &serde_json::Value) -> Result<String, EngineError> {
    // Pointer-to-int accepts NULL, a single value, or an array
    if param_type.contains("int*") || param_type.contains("int *") {
        if let Some(s) = value.as_str() {
            if s == "NULL" {
                return Ok("NULL".to_string());
            }
        }
        if let Some(arr) = value.as_array() {
            let elements: Result<Vec<String>, EngineError> = arr
                .iter()
                .map(|v| {
                    v.as_i64().map(|n| n.to_string()).ok_or_else(|| {
                        EngineError::Harness(format!("array element must be an integer: {:?}", v))
                    })
                })
                .collect();
            return Ok(format!("(int[]){{ {} }}", elements?.join(", ")));
        }
        let n = value.as_i64().ok_or_else(|| {
            EngineError::Harness(format!("expected integer, array, or \"NULL\", got {:?}", value))
        })?;
        return Ok(format!("&(int){{{}}}", n));
    }

    match param_type {
        "int" | "long" | "short" => {
            let n = value.as_i64().ok_or_else(|| {
                EngineError::Harness(format!("expected integer, got {:?}", value))
            })?;
            Ok(n.to_string())
        }
        "unsigned int" | "unsigned long" | "size_t" => {
            let n = value.as_u64().ok_or_else(|| {
                EngineError::Harness(format!("expected unsigned integer, got {:?}", value))
            })?;
            Ok(n.to_string())
        }
        "float" | "double" => {
            let n = value.as_f64().ok_or_else(|| {
                EngineError::Harness(format!("expected float, got {:?}", value))
            })?;
            Ok(format!("{:.6}", n))
        }
        "char" => {
            let s = value.as_str().ok_or_else(|| {
                EngineError::Harness(format!("expected char string, got {:?}", value))
            })?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(format!("'{}'", c)),
                _ => Err(EngineError::Harness(format!(
                    "expected a single char, got '{}'",
                    s
                ))),
            }
        }
        t if t.contains("char*") || t.contains("char *") || t == "string" => {
            let s = value.as_str().ok_or_else(|| {
                EngineError::Harness(format!("expected string, got {:?}", value))
            })?;
            Ok(format!("\"{}\"", escape_c_string(s)))
        }
        other => Err(EngineError::Harness(format!(
            "unsupported parameter type: {}",
            other
        ))),
    }
}

/// printf format specifier for a supported return type.
fn print_format_for(return_type: &str) -> Result<&'static str, EngineError> {
    match return_type {
        "int" | "short" => Ok("%d"),
        "long" => Ok("%ld"),
        "unsigned int" => Ok("%u"),
        "unsigned long" | "size_t" => Ok("%lu"),
        "float" => Ok("%f"),
        "double" => Ok("%lf"),
        "char" => Ok("%c"),
        "char*" | "char *" | "string" => Ok("%s"),
        "void" => Ok(""),
        other => Err(EngineError::Harness(format!(
            "unsupported return type: {}",
            other
        ))),
    }
}

fn escape_c_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
}
