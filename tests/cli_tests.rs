//! Integration tests for the jqfunc CLI.
//!
//! Run with: cargo test --features cli --test cli_tests

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::Result;
use tempfile::NamedTempFile;

const DEFS: &str = r#"
[[jqfunction]]
name = "get_name"
query = ".name"

[[jqfunction]]
name = "get_field"
params = ["field"]
query = ".[$field]"
"#;

/// Run the CLI with `input` on stdin, returning stdout, stderr and the exit code.
fn run(args: &[&str], input: &str) -> Result<(String, String, i32)> {
    let mut cmd = Command::new("cargo")
        .args(["run", "--quiet", "--features", "cli", "--bin", "jqfunc", "--"])
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = cmd.stdin.take() {
        stdin.write_all(input.as_bytes())?;
    }

    let output = cmd.wait_with_output()?;
    let stdout = String::from_utf8(output.stdout)?;
    let stderr = String::from_utf8(output.stderr)?;
    let exit_code = output.status.code().unwrap_or(-1);

    Ok((stdout, stderr, exit_code))
}

fn defs_file(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn test_call_text_subject() -> Result<()> {
    let (stdout, _, code) = run(&["call", "--query", ".name"], r#"{"name":"Alice"}"#)?;
    assert_eq!(code, 0);
    assert_eq!(stdout, "Alice\n");
    Ok(())
}

#[test]
fn test_call_with_params() -> Result<()> {
    let (stdout, _, code) = run(
        &["call", "--query", "$x + $y", "--param", "x", "--param", "y", "5", "3"],
        "null",
    )?;
    assert_eq!(code, 0);
    assert_eq!(stdout, "8\n");
    Ok(())
}

#[test]
fn test_call_typed_subject() -> Result<()> {
    let (stdout, _, code) = run(&["call", "--typed", "--query", ".[]"], r#"{"a":1,"b":2}"#)?;
    assert_eq!(code, 0);
    assert_eq!(stdout, "[1,2]\n");
    Ok(())
}

#[test]
fn test_call_compile_error() -> Result<()> {
    let (_, stderr, code) = run(&["call", "--query", "$nope"], "null")?;
    assert_ne!(code, 0);
    assert!(stderr.contains("variable not defined: $nope"), "stderr: {}", stderr);
    Ok(())
}

#[test]
fn test_run_from_definitions() -> Result<()> {
    let defs = defs_file(DEFS)?;
    let path = defs.path().to_str().unwrap();
    let (stdout, _, code) = run(
        &["run", "--defs", path, "get_field", r#""age""#],
        r#"{"name":"Alice","age":30}"#,
    )?;
    assert_eq!(code, 0);
    assert_eq!(stdout, "30\n");
    Ok(())
}

#[test]
fn test_check_lists_functions() -> Result<()> {
    let defs = defs_file(DEFS)?;
    let (stdout, _, code) = run(&["check", "--defs", defs.path().to_str().unwrap()], "")?;
    assert_eq!(code, 0);
    assert_eq!(stdout, "get_name(input)\nget_field(input, field)\n");
    Ok(())
}

#[test]
fn test_check_reports_errors() -> Result<()> {
    let defs = defs_file("[[jqfunction]]\nname = \"bad\"\nquery = \".[\"\n")?;
    let (_, stderr, code) = run(&["check", "--defs", defs.path().to_str().unwrap()], "")?;
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid jq query"), "stderr: {}", stderr);
    Ok(())
}
