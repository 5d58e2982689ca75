//! Shared output layer for pretty/text/JSON parity across all commands.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--json`
//! 2. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. `output` in the user config
//! 4. Default: [`OutputMode::Pretty`] on a TTY, [`OutputMode::Text`] when piped.
//!
//! Resolution itself lives in `defer_core::config::resolve_config`; this
//! module maps the resolved string and renders.

use std::io::{self, Write};

use defer_core::RecordId;
use defer_core::error::ErrorCode;
use defer_graph::EngineError;
use serde::Serialize;

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 48;

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-optimized output (sections, separators).
    Pretty,
    /// Plain text for pipes and scripts.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    /// Map a resolved output string. Unknown values fall back to pretty.
    pub fn from_resolved(raw: &str) -> Self {
        match raw {
            "json" => Self::Json,
            "text" => Self::Text,
            _ => Self::Pretty,
        }
    }

    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<24} {}", format!("{key}:"), value.as_ref())
}

/// Space-separated id list, `-` when empty.
pub fn id_list(ids: &[RecordId]) -> String {
    if ids.is_empty() {
        return "-".to_string();
    }
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a serializable value to stdout in the requested format.
///
/// JSON mode serializes `value`; pretty and text modes call `human_fn`.
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
        OutputMode::Pretty | OutputMode::Text => human_fn(value, &mut out)?,
    }
    Ok(())
}

/// Render with distinct text and pretty renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Text => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            text_fn(value, &mut out)?;
            Ok(())
        }
        OutputMode::Json | OutputMode::Pretty => render(mode, value, pretty_fn),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable code (`E####`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Offending loop for cycle and self-dependency rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<RecordId>>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
            path: None,
        }
    }

    fn with_code(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
            path: None,
        }
    }
}

impl From<&EngineError> for CliError {
    fn from(err: &EngineError) -> Self {
        let mut out = Self::with_code(err.to_string(), err.code());
        out.path = err.cycle_path();
        out
    }
}

impl From<&anyhow::Error> for CliError {
    fn from(err: &anyhow::Error) -> Self {
        if let Some(engine) = err.downcast_ref::<EngineError>() {
            return Self::from(engine);
        }
        if let Some(store) = err.downcast_ref::<defer_core::StoreError>() {
            return Self::with_code(store.to_string(), store.code());
        }
        Self::new(format!("{err:#}"))
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({ "error": error });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use defer_core::StoreError;
    use defer_graph::CycleWarning;

    #[test]
    fn resolved_strings_map_to_modes() {
        assert_eq!(OutputMode::from_resolved("json"), OutputMode::Json);
        assert_eq!(OutputMode::from_resolved("text"), OutputMode::Text);
        assert_eq!(OutputMode::from_resolved("pretty"), OutputMode::Pretty);
        assert_eq!(OutputMode::from_resolved("whatever"), OutputMode::Pretty);
        assert!(OutputMode::Json.is_json());
    }

    #[test]
    fn id_list_formats() {
        assert_eq!(id_list(&[]), "-");
        assert_eq!(id_list(&[RecordId(3), RecordId(10)]), "3 10");
    }

    #[test]
    fn cycle_rejection_carries_code_and_path() {
        let err = EngineError::CycleRejected(CycleWarning {
            path: vec![RecordId(1), RecordId(2), RecordId(1)],
            source: RecordId(1),
            target: RecordId(2),
        });
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E2004"));
        assert_eq!(cli.path, Some(vec![RecordId(1), RecordId(2), RecordId(1)]));
        assert!(cli.suggestion.is_some());

        let json = serde_json::to_value(&cli).unwrap();
        assert_eq!(json["path"], serde_json::json!([1, 2, 1]));
    }

    #[test]
    fn anyhow_errors_are_downcast() {
        let err = anyhow::Error::new(EngineError::SelfDependency(RecordId(4)));
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E2003"));
        assert_eq!(cli.path, Some(vec![RecordId(4)]));

        let err = anyhow::Error::new(StoreError::RecordNotFound(RecordId(9)));
        assert_eq!(CliError::from(&err).error_code.as_deref(), Some("E2001"));

        let err = anyhow::anyhow!("plain failure");
        let cli = CliError::from(&err);
        assert_eq!(cli.message, "plain failure");
        assert!(cli.error_code.is_none());
    }
}
