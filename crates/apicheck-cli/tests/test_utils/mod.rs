//! Test utilities for apicheck integration tests

// Internal imports (std, crate)
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

// External imports (alphabetized)
use anyhow::Context;
use tempfile::TempDir;

/// Creates a temporary directory for test outputs
pub fn create_temp_dir() -> anyhow::Result<(TempDir, PathBuf)> {
    let temp_dir = tempfile::tempdir()?;
    let temp_path = temp_dir.path().to_path_buf();
    Ok((temp_dir, temp_path))
}

/// Get the workspace root directory
pub fn project_root() -> anyhow::Result<PathBuf> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .map(PathBuf::from)
        .context("Failed to determine project root directory")
}

/// Absolute path of a file under `tests/fixtures/openapi`
pub fn fixture(name: &str) -> anyhow::Result<PathBuf> {
    let path = project_root()?.join("tests/fixtures/openapi").join(name);
    if !path.exists() {
        anyhow::bail!("Fixture not found: {}", path.display());
    }
    Ok(path)
}

/// Command for the freshly built binary, isolated from any user config
pub fn apicheck(config_home: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_apicheck"));
    command
        .env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .env_remove("RUST_LOG");
    command
}

/// Run `command` with `input` on stdin and collect its output
pub fn run_with_stdin(mut command: Command, input: &str) -> anyhow::Result<Output> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn apicheck")?;
    child
        .stdin
        .take()
        .context("stdin was not captured")?
        .write_all(input.as_bytes())?;
    Ok(child.wait_with_output()?)
}

/// Writes an OpenAPI document with a dangling reference into `dir`
pub fn create_unresolved_spec(dir: &Path) -> anyhow::Result<PathBuf> {
    let spec_path = dir.join("unresolved.yaml");
    let spec_content = r#"
openapi: 3.0.0
info:
  title: Dangling
  version: 1.0.0
paths:
  /pets:
    get:
      responses:
        '200':
          $ref: '#/components/responses/Missing'
"#;
    fs::write(&spec_path, spec_content)?;
    Ok(spec_path)
}

/// Asserts that a file contains specific content
pub fn assert_file_contains<P: AsRef<Path>>(path: P, contents: &[&str]) -> anyhow::Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(anyhow::anyhow!("File not found: {}", path.display()));
    }

    let file_content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let missing_contents: Vec<&str> = contents
        .iter()
        .copied()
        .filter(|expected| !file_content.contains(expected))
        .collect();

    if !missing_contents.is_empty() {
        return Err(anyhow::anyhow!(
            "File {} is missing expected content:\n  {}",
            path.display(),
            missing_contents.join("\n  ")
        ));
    }

    Ok(())
}
