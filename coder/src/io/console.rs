//! Line-based terminal surface for the conversation.
//!
//! stdout carries only the conversation (assistant replies and tool notices);
//! diagnostics go through `tracing` to stderr.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

pub const INPUT_PROMPT: &str = "You: ";

/// Where user input comes from and where replies go.
pub trait Console {
    /// Next line of user input without its line terminator, or `None` at end
    /// of input.
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Show a final assistant reply.
    fn show_reply(&mut self, reply: &str) -> Result<()>;

    /// Show a short progress line such as a written file path.
    fn show_notice(&mut self, notice: &str) -> Result<()>;
}

/// Console over arbitrary reader/writer pairs; [`StdConsole::stdio`] binds it
/// to the process terminal.
pub struct StdConsole<R, W> {
    input: R,
    output: W,
}

impl StdConsole<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> StdConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Console for StdConsole<R, W> {
    fn read_line(&mut self) -> Result<Option<String>> {
        write!(self.output, "{INPUT_PROMPT}").context("write input prompt")?;
        self.output.flush().context("flush stdout")?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read stdin")?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }

    fn show_reply(&mut self, reply: &str) -> Result<()> {
        writeln!(self.output, "{reply}").context("write reply")
    }

    fn show_notice(&mut self, notice: &str) -> Result<()> {
        writeln!(self.output, "{notice}").context("write notice")
    }
}
