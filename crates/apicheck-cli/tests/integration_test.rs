//! End-to-end integration tests for the apicheck CLI

mod test_utils;

use anyhow::Result;
use std::fs;

use test_utils::{
    apicheck, assert_file_contains, create_temp_dir, create_unresolved_spec, fixture,
    run_with_stdin,
};

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_valid_openapi_v3_file() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let output = apicheck(&home)
        .arg("validate")
        .arg(fixture("petstore.openapi.v3.yaml")?)
        .output()?;

    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout(&output).trim_end(), "Valid Swagger Specification");
    Ok(())
}

#[test]
fn test_valid_swagger_v2_file() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let output = apicheck(&home)
        .arg("validate")
        .arg(fixture("petstore.swagger.v2.json")?)
        .output()?;

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Valid Swagger Specification"));
    Ok(())
}

#[test]
fn test_invalid_document_reports_violation() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let output = apicheck(&home)
        .arg("validate")
        .arg(fixture("invalid.openapi.v3.json")?)
        .output()?;

    assert_eq!(output.status.code(), Some(1));
    let text = stdout(&output);
    assert!(text.contains("Validation failed due to: \"version\" is a required property"));
    assert!(text.contains("Keyword: required"));
    assert!(text.contains("Path: info"));
    Ok(())
}

#[test]
fn test_json_report() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let output = apicheck(&home)
        .args(["validate", "--output", "json"])
        .arg(fixture("invalid.openapi.v3.json")?)
        .output()?;

    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["status"], "invalid");
    assert_eq!(report["violations"][0]["keyword"], "required");
    Ok(())
}

#[test]
fn test_split_document_with_external_references() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let output = apicheck(&home)
        .args(["--no-remote", "validate"])
        .arg(fixture("split/openapi.yaml")?)
        .output()?;

    assert_eq!(output.status.code(), Some(0), "stdout: {}", stdout(&output));
    Ok(())
}

#[test]
fn test_cyclic_reference_fails() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let output = apicheck(&home)
        .args(["validate", "--output", "json"])
        .arg(fixture("cyclic.openapi.v3.yaml")?)
        .output()?;

    assert_eq!(output.status.code(), Some(2));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["status"], "failed");
    assert_eq!(report["error"]["kind"], "CyclicReference");
    Ok(())
}

#[test]
fn test_unresolved_reference_fails() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let spec = create_unresolved_spec(&home)?;
    let output = apicheck(&home).arg("validate").arg(&spec).output()?;

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("unresolved reference '#/components/responses/Missing'"));
    Ok(())
}

#[test]
fn test_missing_file_fails() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let output = apicheck(&home)
        .arg("validate")
        .arg(home.join("nope.yaml"))
        .output()?;

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("not found"));
    Ok(())
}

#[test]
fn test_validate_from_stdin() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let mut command = apicheck(&home);
    command.args(["validate", "-"]);
    let output = run_with_stdin(
        command,
        r#"{"openapi":"3.0.0","info":{"title":"t","version":"1"},"paths":{}}"#,
    )?;

    assert_eq!(output.status.code(), Some(0));

    let mut command = apicheck(&home);
    command.args(["validate", "-"]);
    let output = run_with_stdin(command, "{openapi: 3.0.0}")?;
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).starts_with("Invalid JSON"));
    Ok(())
}

#[test]
fn test_convert_yaml_to_json_stdout() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let mut command = apicheck(&home);
    command.args(["convert", "-", "--to", "json"]);
    let output = run_with_stdin(
        command,
        "openapi: \"3.0.0\"\ninfo:\n  title: t\n  version: \"1\"\npaths: {}\n",
    )?;

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout(&output),
        "{\n  \"openapi\": \"3.0.0\",\n  \"info\": {\n    \"title\": \"t\",\n    \"version\": \"1\"\n  },\n  \"paths\": {}\n}\n"
    );
    Ok(())
}

#[test]
fn test_convert_into_directory_uses_suggested_name() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let out_dir = home.join("out");
    fs::create_dir_all(&out_dir)?;

    let output = apicheck(&home)
        .arg("convert")
        .arg(fixture("petstore.swagger.v2.json")?)
        .args(["--to", "yaml", "--out"])
        .arg(&out_dir)
        .output()?;

    assert_eq!(output.status.code(), Some(0));
    assert_file_contains(
        out_dir.join("swagger.yaml"),
        &["swagger: '2.0'", "operationId: listPets", "$ref: '#/definitions/Pet'"],
    )?;
    Ok(())
}

#[test]
fn test_session_records_history() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let valid = fixture("petstore.openapi.v3.yaml")?;
    let invalid = fixture("invalid.openapi.v3.json")?;
    let input = format!(
        "validate {}\nconvert {} yaml\nhistory\nquit\nvalidate {}\n",
        valid.display(),
        invalid.display(),
        valid.display()
    );

    let mut command = apicheck(&home);
    command.arg("session");
    let output = run_with_stdin(command, &input)?;

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("1. Validate\n"));
    assert!(text.contains("2. Convert JSON to YAML\n"));
    assert!(text.contains("       title: Missing version\n"));
    // Nothing runs after quit
    assert_eq!(text.matches("Valid Swagger Specification").count(), 2);
    Ok(())
}

#[test]
fn test_convert_to_the_same_format_fails() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let output = apicheck(&home)
        .arg("convert")
        .arg(fixture("petstore.openapi.v3.yaml")?)
        .args(["--to", "yaml"])
        .output()?;

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("document is already YAML"));
    Ok(())
}

#[test]
fn test_session_labels_conversions_by_source_format() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let yaml = fixture("petstore.openapi.v3.yaml")?;
    let input = format!(
        "convert {0} yaml\nconvert {0} json\nhistory\n",
        yaml.display()
    );

    let mut command = apicheck(&home);
    command.arg("session");
    let output = run_with_stdin(command, &input)?;

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("document is already YAML\n"));
    assert!(text.contains("1. Convert YAML to JSON\n"));
    assert!(!text.contains("2. "));
    assert!(!text.contains("Convert JSON to YAML"));
    Ok(())
}

#[test]
fn test_config_file_is_honored() -> Result<()> {
    let (_tmp, home) = create_temp_dir()?;
    let config = home.join("apicheck.toml");
    fs::write(&config, "allow_file_refs = false\n")?;

    // The root document itself is read through the configured source
    let output = apicheck(&home)
        .arg("--config")
        .arg(&config)
        .arg("validate")
        .arg(fixture("petstore.openapi.v3.yaml")?)
        .output()?;

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("file references are disabled"));
    Ok(())
}
