//! Shared output layer for human/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: readable text for humans, stable JSON for agents.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--json` flag
//! 2. `FORMAT` env var → `"human"` | `"json"`
//! 3. User config `output` value
//! 4. Default: human.

use serde::Serialize;
use std::io::{self, Write};

/// The two output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Readable text with labels.
    Human,
    /// Machine-readable JSON (one object per result).
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    #[must_use]
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Core resolution logic, separated from I/O for testability.
fn resolve_output_mode_inner(
    json_flag: bool,
    format_env: Option<&str>,
    user_output: Option<&str>,
) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    for raw in [format_env, user_output].into_iter().flatten() {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "human" | "pretty" | "text" => return OutputMode::Human,
            _ => {} // unknown value — fall through
        }
    }
    OutputMode::Human
}

/// Resolve the output mode from the CLI flag, environment, and user config.
#[must_use]
pub fn resolve_output_mode(json_flag: bool, user_output: Option<&str>) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    resolve_output_mode_inner(json_flag, env_val.as_deref(), user_output)
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E2002").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Create a simple error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    /// Create an error with a suggestion and error code.
    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(error_code.into()),
        }
    }

    /// Build from a core gate error, carrying its code and hint.
    #[must_use]
    pub fn from_gate_error(err: &gatehouse_core::GateError) -> Self {
        let code = err.code();
        Self {
            message: err.to_string(),
            suggestion: code.hint().map(ToString::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

/// Render a serializable value to stdout in the requested format.
///
/// In JSON mode, the value is serialized with `serde_json`. In human mode,
/// the provided `human_fn` closure produces text output.
///
/// # Errors
///
/// Propagates serialization and write failures.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Human => human_fn(value, &mut out)?,
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
///
/// # Errors
///
/// Propagates serialization and write failures.
pub fn render_error(mode: OutputMode, err: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, err)?;
            writeln!(out)?;
        }
        OutputMode::Human => {
            match &err.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", err.message)?,
                None => writeln!(out, "error: {}", err.message)?,
            }
            if let Some(suggestion) = &err.suggestion {
                writeln!(out, "  hint: {suggestion}")?;
            }
        }
    }
    Ok(())
}

/// Render a one-line success message (human) or `{"ok": true, ...}` (JSON).
///
/// # Errors
///
/// Propagates serialization and write failures.
pub fn render_success(mode: OutputMode, message: &str) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct Ok<'a> {
        ok: bool,
        message: &'a str,
    }
    render(
        mode,
        &Ok { ok: true, message },
        |v, w| writeln!(w, "{}", v.message),
    )
}
