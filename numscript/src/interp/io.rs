//! Input sources and output sinks of the interpreter

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;

/// Result of asking for one line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C at the prompt
    Interrupted,
    Eof,
}

/// Source of interactive input for the REPL and the debugger
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome;
}

/// Always at end of input
#[derive(Debug, Default)]
pub struct NoInput;

impl LineReader for NoInput {
    fn read_line(&mut self, _prompt: &str) -> ReadOutcome {
        ReadOutcome::Eof
    }
}

/// Pre-recorded input lines, optionally logging the prompts shown
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
    transcript: Option<SharedBuffer>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedInput {
            lines: lines.into_iter().map(Into::into).collect(),
            transcript: None,
        }
    }

    /// Write each prompt and the line answered to `buffer`
    pub fn with_transcript(mut self, buffer: SharedBuffer) -> Self {
        self.transcript = Some(buffer);
        self
    }
}

impl LineReader for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        let line = self.lines.pop_front();
        if let Some(t) = &mut self.transcript {
            // writes to an in-memory buffer cannot fail
            let _ = writeln!(t, "{prompt}{}", line.as_deref().unwrap_or(""));
        }
        match line {
            Some(line) => ReadOutcome::Line(line),
            None => ReadOutcome::Eof,
        }
    }
}

/// Cloneable in-memory sink; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Return the contents and empty the buffer
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.borrow_mut());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input_then_eof() {
        let mut input = ScriptedInput::new(["a = 1", "dbcont"]);
        assert_eq!(input.read_line(">> "), ReadOutcome::Line("a = 1".into()));
        assert_eq!(input.read_line(">> "), ReadOutcome::Line("dbcont".into()));
        assert_eq!(input.read_line(">> "), ReadOutcome::Eof);
    }

    #[test]
    fn test_transcript_records_prompts() {
        let log = SharedBuffer::new();
        let mut input = ScriptedInput::new(["x"]).with_transcript(log.clone());
        input.read_line("debug> ");
        assert_eq!(log.contents(), "debug> x\n");
    }

    #[test]
    fn test_shared_buffer_take() {
        let mut buf = SharedBuffer::new();
        write!(buf, "hello").unwrap();
        assert_eq!(buf.take(), "hello");
        assert_eq!(buf.contents(), "");
    }
}
