//! Parsing of the lines typed at the chat prompt.

use std::path::PathBuf;

/// Terminates a `/text` block.
const END_OF_BLOCK: &str = "//end";

/// What the user asked for.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    /// Send a text message.
    Text(String),
    /// Send the file at this path.
    SendFile(PathBuf),
    /// Print the command list.
    Help,
    /// Leave the chat.
    Exit,
    /// The line was a malformed command.
    Usage(&'static str),
}

/// Turns prompt lines into [`Input`]s, holding state across a `/text` block.
#[derive(Debug, Default)]
pub struct Composer {
    block: Option<Vec<String>>,
}

impl Composer {
    /// Whether a multi-line block is being collected.
    pub const fn in_block(&self) -> bool {
        self.block.is_some()
    }

    /// Feeds one line (without its newline).
    ///
    /// Returns `None` when the line was consumed without producing an
    /// action: blank lines, the start of a block and lines inside it.
    pub fn feed(&mut self, line: &str) -> Option<Input> {
        if let Some(lines) = &mut self.block {
            if line.trim() != END_OF_BLOCK {
                lines.push(line.to_owned());
                return None;
            }
            let text = self.block.take().unwrap_or_default().join("\n");
            return (!text.is_empty()).then_some(Input::Text(text));
        }

        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line.eq_ignore_ascii_case("/exit") || line.eq_ignore_ascii_case("exit") {
            return Some(Input::Exit);
        }
        match line {
            "/help" => Some(Input::Help),
            "/text" => {
                self.block = Some(Vec::new());
                None
            }
            "/sendfile" => Some(Input::Usage("usage: /sendfile <path>")),
            _ => match line.strip_prefix("/sendfile ") {
                Some(path) => Some(Input::SendFile(PathBuf::from(path.trim()))),
                None => Some(Input::Text(line.to_owned())),
            },
        }
    }

    /// Flushes an unterminated block, e.g. when stdin reaches end of file.
    pub fn finish(&mut self) -> Option<Input> {
        let text = self.block.take()?.join("\n");
        (!text.is_empty()).then_some(Input::Text(text))
    }
}
