//! Output formatting for script results.
//!
//! Results go to stdout, errors to stderr, as text or as one JSON object per
//! line.

use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};
use ufs_core::ErrorKind;

use crate::session::Outcome;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    out: Box<dyn Write>,
    err: Box<dyn Write>,
}

impl OutputWriter {
    /// Create a new OutputWriter on stdout/stderr.
    pub fn new(json: bool) -> Self {
        Self::with_writers(json, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Create an OutputWriter on arbitrary sinks.
    pub fn with_writers(json: bool, out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            out,
            err,
        }
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Write the result of the command on `line`.
    pub fn write_outcome(&mut self, line: usize, outcome: &Outcome) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let step = StepOutput {
                    success: true,
                    line,
                    outcome,
                };
                writeln!(self.out, "{}", serde_json::to_string(&step)?)?;
            }
            OutputFormat::Text => {
                let text = outcome.to_text();
                if !text.is_empty() {
                    write!(self.out, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    pub fn write_error(&mut self, line: Option<usize>, error: &anyhow::Error) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    line,
                    kind: error_kind(error),
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string(&error_output) {
                    let _ = writeln!(self.err, "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(self.err, "Error: {:#}", error);
            }
        }
    }

    /// Print an interactive prompt.
    pub fn prompt(&mut self) {
        let _ = write!(self.err, "ufs> ");
        let _ = self.err.flush();
    }
}

/// Engine error kind behind an anyhow error, if there is one.
pub fn error_kind(error: &anyhow::Error) -> Option<ErrorKind> {
    error
        .downcast_ref::<ufs_core::Error>()
        .map(ufs_core::Error::kind)
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Successful step.
#[derive(Debug, Serialize)]
pub struct StepOutput<'a> {
    pub success: bool,
    pub line: usize,
    #[serde(flatten)]
    pub outcome: &'a Outcome,
}

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_step_output_flattens_outcome() {
        let outcome = Outcome::Close { fd: 3 };
        let step = StepOutput {
            success: true,
            line: 7,
            outcome: &outcome,
        };
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["line"], 7);
        assert_eq!(value["op"], "close");
        assert_eq!(value["fd"], 3);
    }

    #[test]
    fn test_error_kind_through_context() {
        let result: std::result::Result<(), ufs_core::Error> =
            Err(ufs_core::Error::bad_descriptor(4));
        let error = result.context("line 2: close 4").unwrap_err();
        assert_eq!(error_kind(&error), Some(ErrorKind::NoSuchFile));

        let plain = anyhow::anyhow!("Unknown command: x");
        assert_eq!(error_kind(&plain), None);
    }

    #[test]
    fn test_error_output_skips_missing_fields() {
        let output = ErrorOutput {
            success: false,
            line: None,
            kind: None,
            error: "boom".to_string(),
        };
        let json = serde_json::to_string(&output).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"boom"}"#);
    }

    #[test]
    fn test_is_json() {
        let writer = OutputWriter::with_writers(true, Box::new(io::sink()), Box::new(io::sink()));
        assert!(writer.is_json());
    }
}
