//! The single writer of the chat transcript.
//!
//! Incoming events, local notices and the prompt all go through one
//! [`Console`], owned by the chat loop, so output never interleaves mid-line.

use std::io::{self, Write};

use serde_json::json;
use tether::{Event, SentFile};

use crate::OutputFormat;

const RULE: &str = "----------------------------------------";

#[derive(Debug)]
pub struct Console<W> {
    out: W,
    format: OutputFormat,
    local: &'static str,
    peer: &'static str,
    prompt_shown: bool,
}

impl<W: Write> Console<W> {
    pub const fn new(
        out: W,
        format: OutputFormat,
        local: &'static str,
        peer: &'static str,
    ) -> Self {
        Self {
            out,
            format,
            local,
            peer,
            prompt_shown: false,
        }
    }

    /// Shows the prompt unless it is already on screen. JSON output has none.
    pub fn prompt(&mut self, in_block: bool) -> io::Result<()> {
        if self.prompt_shown || matches!(self.format, OutputFormat::Json) {
            return Ok(());
        }
        if in_block {
            write!(self.out, "... ")?;
        } else {
            write!(self.out, "{} > ", self.local)?;
        }
        self.out.flush()?;
        self.prompt_shown = true;
        Ok(())
    }

    /// The user pressed enter, so the prompt line is finished.
    pub const fn line_entered(&mut self) {
        self.prompt_shown = false;
    }

    pub fn banner(&mut self, peer: impl std::fmt::Display) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.json(&json!({
                "event": "connected",
                "peer": peer.to_string(),
            })),
            OutputFormat::Text => {
                self.line(&format!("connected to {peer}"))?;
                self.help()
            }
        }
    }

    pub fn help(&mut self) -> io::Result<()> {
        if matches!(self.format, OutputFormat::Json) {
            return Ok(());
        }
        self.line(concat!(
            "commands:\n",
            "  /text              send multi-line text, finish with //end\n",
            "  /sendfile <path>   send a file\n",
            "  /help              show this list\n",
            "  /exit              leave the chat",
        ))
    }

    /// Renders something the peer did.
    pub fn event(&mut self, event: &Event) -> io::Result<()> {
        if matches!(self.format, OutputFormat::Json) {
            return self.json(event);
        }
        let text = match event {
            Event::Text { text } => format!("{RULE}\n{} >\n{text}\n{RULE}", self.peer),
            Event::FileStarted {
                name,
                size,
                checksum,
            } => format!(
                "{RULE}\nreceiving file: {name} ({})\nMD5 checksum: {checksum}\n{RULE}",
                kilobytes(*size)
            ),
            Event::FileReceived { path, elapsed, .. } => format!(
                "file received successfully, saved to {}\ntransfer time: {:.2} seconds",
                path.display(),
                elapsed.as_secs_f64()
            ),
            Event::FileFailed { name, error } => format!("file {name} failed: {error}"),
            Event::Closed { reason: None } => "connection closed".to_owned(),
            Event::Closed {
                reason: Some(reason),
            } => format!("connection closed: {reason}"),
            other => format!("{other:?}"),
        };
        self.line(&text)
    }

    /// A status line for humans. JSON output drops it.
    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        if matches!(self.format, OutputFormat::Json) {
            return Ok(());
        }
        self.line(text)
    }

    pub fn sent(&mut self, file: &SentFile) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.json(&json!({
                "event": "file_sent",
                "name": file.name,
                "size": file.size,
                "checksum": file.checksum.to_string(),
                "elapsed": file.elapsed.as_secs_f64(),
            })),
            OutputFormat::Text => self.line(&format!(
                "file sent successfully: {} ({}), time: {:.2} seconds",
                file.name,
                kilobytes(file.size),
                file.elapsed.as_secs_f64()
            )),
        }
    }

    /// Reports a local failure that does not end the chat.
    pub fn error(&mut self, error: &dyn std::fmt::Display) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.json(&json!({
                "event": "error",
                "error": error.to_string(),
            })),
            OutputFormat::Text => self.line(&format!("error: {error}")),
        }
    }

    fn json(&mut self, value: &impl serde::Serialize) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    /// Writes a message on its own lines, moving off a pending prompt first.
    fn line(&mut self, text: &str) -> io::Result<()> {
        if self.prompt_shown {
            writeln!(self.out)?;
            self.prompt_shown = false;
        }
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }
}

/// File sizes are always shown in kilobytes.
#[allow(clippy::cast_precision_loss)]
fn kilobytes(bytes: u64) -> String {
    format!("{:.1}KB", bytes as f64 / 1024.0)
}
