//! Output formatting abstraction for text vs JSON rendering
//!
//! All subcommand output flows through [`OutputWriter`], which handles format switching.
//! Command handlers never branch on the output format themselves.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes CLI output to stdout in the selected format.
///
/// Payloads implement both `Serialize` (for JSON) and [`Render`] (for text).
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    /// Create a new output writer with the specified format.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a report to stdout. JSON output is pretty-printed.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(&mut handle, payload, true)
    }

    /// Render one streaming event to stdout and flush.
    ///
    /// JSON output is compact, one object per line.
    pub fn render_line<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(&mut handle, payload, false)?;
        handle.flush()?;
        Ok(())
    }

    fn render_to<T: Render + Serialize>(
        &self,
        w: &mut dyn Write,
        payload: &T,
        pretty: bool,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => {
                payload.render_text(w)?;
            }
            OutputFormat::Json => {
                if pretty {
                    serde_json::to_writer_pretty(&mut *w, payload)?;
                } else {
                    serde_json::to_writer(&mut *w, payload)?;
                }
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Trait for human-readable text rendering.
///
/// Implemented by every CLI output payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestPayload {
        text: String,
        count: u32,
    }

    impl Render for TestPayload {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "Text: {}", self.text)?;
            writeln!(w, "Count: {}", self.count)?;
            Ok(())
        }
    }

    fn payload() -> TestPayload {
        TestPayload {
            text: "ABC123".to_owned(),
            count: 3,
        }
    }

    fn rendered(format: OutputFormat, pretty: bool) -> String {
        let writer = OutputWriter::new(format);
        let mut buffer = Vec::new();
        writer
            .render_to(&mut buffer, &payload(), pretty)
            .expect("rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn test_text_format_uses_render_text() {
        let output = rendered(OutputFormat::Text, true);
        assert_eq!(output, "Text: ABC123\nCount: 3\n");
    }

    #[test]
    fn test_json_line_is_single_line() {
        let output = rendered(OutputFormat::Json, false);
        assert_eq!(output, "{\"text\":\"ABC123\",\"count\":3}\n");
    }

    #[test]
    fn test_json_report_is_pretty() {
        let output = rendered(OutputFormat::Json, true);
        assert!(output.contains('\n'));
        assert!(output.contains("  \"text\": \"ABC123\""));

        let parsed: serde_json::Value =
            serde_json::from_str(&output).expect("pretty output should parse back");
        assert_eq!(parsed["count"].as_u64(), Some(3));
    }
}
