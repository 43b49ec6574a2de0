//! Output layer for the run report and fatal errors.
//!
//! The report goes to stdout, errors go to stderr. Logs are written to stderr
//! by the tracing subscriber, so `--json` stdout is always a single document.
//!
//! # Output mode resolution
//!
//! 1. `--json` selects [`OutputMode::Json`].
//! 2. `-v`, `--debug` or simulate mode select [`OutputMode::Text`].
//! 3. Otherwise [`OutputMode::Quiet`]: nothing on success, suited to cron.

use serde::Serialize;
use std::io::{self, Write};
use zsnap_core::run::RunReport;

/// The output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// No report on stdout.
    Quiet,
    /// One line per created, destroyed or failed snapshot.
    Text,
    /// The full report as one JSON object.
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E2001").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl From<&zsnap_core::Error> for CliError {
    fn from(err: &zsnap_core::Error) -> Self {
        Self {
            message: err.to_string(),
            suggestion: err.hint().map(str::to_string),
            error_code: Some(err.code().code().to_string()),
        }
    }
}

/// Render the run report to stdout.
pub fn render_report(mode: OutputMode, report: &RunReport) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_report(&mut out, mode, report)
}

fn write_report(out: &mut dyn Write, mode: OutputMode, report: &RunReport) -> anyhow::Result<()> {
    match mode {
        OutputMode::Quiet => {}
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
        OutputMode::Text => {
            let prefix = if report.simulated { "would " } else { "" };
            for name in &report.created {
                writeln!(out, "{prefix}create {name}")?;
            }
            for name in &report.destroyed {
                writeln!(out, "{prefix}destroy {name}")?;
            }
            for failure in &report.failures {
                writeln!(
                    out,
                    "failed {} {} [{}]: {}",
                    failure.action, failure.target, failure.code, failure.message
                )?;
            }
        }
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(&mut out, mode, error)
}

fn write_error(out: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    if mode.is_json() {
        let wrapper = serde_json::json!({
            "error": error,
        });
        serde_json::to_writer_pretty(&mut *out, &wrapper)?;
        writeln!(out)?;
    } else {
        match &error.error_code {
            Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
            None => writeln!(out, "error: {}", error.message)?,
        }
        if let Some(ref suggestion) = error.suggestion {
            writeln!(out, "  suggestion: {suggestion}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zsnap_core::run::{Action, Failure};

    fn report(simulated: bool) -> RunReport {
        RunReport {
            simulated,
            volumes: vec!["tank".into()],
            created: vec!["tank@zsnap_2010-06-15_12:30_0100".into()],
            destroyed: vec!["tank@zsnap_2010-06-01_12:30_0100".into()],
            failures: vec![],
        }
    }

    fn rendered(mode: OutputMode, report: &RunReport) -> String {
        let mut buf = Vec::new();
        write_report(&mut buf, mode, report).expect("render");
        String::from_utf8(buf).expect("utf-8")
    }

    #[test]
    fn quiet_mode_prints_nothing() {
        assert_eq!(rendered(OutputMode::Quiet, &report(false)), "");
    }

    #[test]
    fn text_mode_lists_actions() {
        assert_eq!(
            rendered(OutputMode::Text, &report(false)),
            "create tank@zsnap_2010-06-15_12:30_0100\ndestroy tank@zsnap_2010-06-01_12:30_0100\n"
        );
    }

    #[test]
    fn simulated_text_says_would() {
        let text = rendered(OutputMode::Text, &report(true));
        assert!(text.starts_with("would create tank@"));
        assert!(text.contains("would destroy tank@"));
    }

    #[test]
    fn text_mode_lists_failures() {
        let mut report = report(false);
        report.failures.push(Failure {
            action: Action::Destroy,
            target: "tank@zsnap_2010-06-02_12:30_0100".into(),
            code: "E4001".into(),
            message: "dataset is busy".into(),
        });
        let text = rendered(OutputMode::Text, &report);
        assert!(text.ends_with(
            "failed destroy tank@zsnap_2010-06-02_12:30_0100 [E4001]: dataset is busy\n"
        ));
    }

    #[test]
    fn json_mode_is_one_document() {
        let json: serde_json::Value =
            serde_json::from_str(&rendered(OutputMode::Json, &report(false))).expect("valid json");
        assert_eq!(json["volumes"][0], "tank");
        assert_eq!(json["created"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["simulated"], false);
    }

    #[test]
    fn errors_carry_code_and_hint() {
        let err = zsnap_core::Error::VolumeNotFound("idonotexist".into());
        let cli_error = CliError::from(&err);

        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Text, &cli_error).expect("render");
        let text = String::from_utf8(buf).expect("utf-8");
        assert!(text.starts_with("error[E2001]: volume 'idonotexist' not found\n"));
        assert!(text.contains("suggestion:"));

        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Json, &cli_error).expect("render");
        let json: serde_json::Value = serde_json::from_slice(&buf).expect("valid json");
        assert_eq!(json["error"]["error_code"], "E2001");
    }
}
