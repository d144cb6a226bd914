//! Interactive driver
//!
//! The top-level loop itself lives in the interpreter; this module supplies
//! the line readers it pulls from: a `rustyline` editor with history for a
//! terminal and a plain buffered reader for piped input.

use crate::interp::{Interpreter, LineReader, ReadOutcome};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;

const HISTORY_FILE: &str = ".numscript_history";

/// Terminal line editor with persistent history
pub struct EditorReader {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
}

impl EditorReader {
    pub fn new() -> rustyline::Result<Self> {
        let mut editor = DefaultEditor::new()?;
        let history_path = dirs_home().map(|h| h.join(HISTORY_FILE));
        if let Some(path) = &history_path {
            // a missing history file is normal on first use
            let _ = editor.load_history(path);
        }
        Ok(EditorReader {
            editor,
            history_path,
        })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> ReadOutcome {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                ReadOutcome::Line(line)
            }
            Err(ReadlineError::Interrupted) => ReadOutcome::Interrupted,
            Err(ReadlineError::Eof) => ReadOutcome::Eof,
            Err(err) => {
                tracing::warn!(%err, "line editor failed");
                ReadOutcome::Eof
            }
        }
    }
}

impl Drop for EditorReader {
    fn drop(&mut self) {
        if let Some(path) = &self.history_path
            && let Err(err) = self.editor.save_history(path)
        {
            tracing::debug!(%err, path = %path.display(), "history not saved");
        }
    }
}

/// Lines from any buffered stream; prompts are not shown
pub struct StreamReader<R> {
    input: R,
}

impl<R: BufRead> StreamReader<R> {
    pub fn new(input: R) -> Self {
        StreamReader { input }
    }
}

impl<R: BufRead> LineReader for StreamReader<R> {
    fn read_line(&mut self, _prompt: &str) -> ReadOutcome {
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => ReadOutcome::Eof,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                ReadOutcome::Line(line)
            }
            Err(err) => {
                tracing::warn!(%err, "reading input failed");
                ReadOutcome::Eof
            }
        }
    }
}

/// Run the top-level loop on standard input; returns the exit status
pub fn run(interp: &mut Interpreter, quiet: bool) -> i32 {
    attach_stdin(interp, quiet);
    interp.run_repl()
}

/// Make standard input the interpreter's line source
///
/// A terminal gets the line editor and interactive error recovery; piped
/// input runs as a batch and stops at the first uncaught error.
pub fn attach_stdin(interp: &mut Interpreter, quiet: bool) {
    let editor = if io::stdin().is_terminal() {
        match EditorReader::new() {
            Ok(editor) => Some(editor),
            Err(err) => {
                tracing::warn!(%err, "falling back to plain input");
                None
            }
        }
    } else {
        None
    };

    match editor {
        Some(editor) => {
            interp.set_input(Box::new(editor));
            interp.set_interactive(true);
            if !quiet {
                println!("numscript {}", env!("CARGO_PKG_VERSION"));
                println!("Type exit or press Ctrl-D to leave.\n");
            }
        }
        None => {
            interp.set_input(Box::new(StreamReader::new(io::stdin().lock())));
            interp.set_interactive(false);
        }
    }
}

fn dirs_home() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::SharedBuffer;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_stream_reader_strips_line_endings() {
        let mut reader = StreamReader::new(Cursor::new("a = 1\r\nb = 2\nc"));
        assert_eq!(reader.read_line(">> "), ReadOutcome::Line("a = 1".to_string()));
        assert_eq!(reader.read_line(">> "), ReadOutcome::Line("b = 2".to_string()));
        assert_eq!(reader.read_line(">> "), ReadOutcome::Line("c".to_string()));
        assert_eq!(reader.read_line(">> "), ReadOutcome::Eof);
    }

    #[test]
    fn test_piped_session_runs_as_batch() {
        let out = SharedBuffer::new();
        let mut interp = Interpreter::new()
            .with_output(out.clone())
            .with_error_output(SharedBuffer::new())
            .with_input(StreamReader::new(Cursor::new("x = 2;\ny = x * 3\n")));
        assert_eq!(interp.run_repl(), 0);
        assert_eq!(out.contents(), "y = 6\n");
    }
}
