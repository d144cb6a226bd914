//! Runtime errors, interrupts and the error/warning state of the interpreter

use crate::value::ValueError;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Kinds of execution errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    General,
    /// Syntax error in code handed to `eval`, `source` or the REPL
    Parse,
    /// Undefined variable or function
    Undefined,
    /// Index out of bounds or invalid subscript
    Index,
    /// Operation not defined for the operand types
    Type,
    /// Call depth exceeded `max_recursion_depth`
    RecursionLimit,
    /// Too few values for the targets of a multi-assignment
    MissingValue,
    /// Magic colon passed for a parameter without a default value
    NoDefaultValue,
    OutOfMemory,
    /// Raised by `error(...)`
    User,
}

/// One entry of an error's call trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEntry {
    pub name: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
}

/// Runtime fault carrying a message, an identifier and a call trace
#[derive(Debug, Clone)]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
    pub identifier: String,
    pub stack: Vec<StackEntry>,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ExecutionError {
            kind,
            message: message.into(),
            identifier: String::new(),
            stack: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn general(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::General, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn undefined(name: &str) -> Self {
        Self::new(ErrorKind::Undefined, format!("'{name}' undefined"))
            .with_identifier("Octave:undefined-function")
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Index, message).with_identifier("Octave:index-out-of-bounds")
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn recursion_limit() -> Self {
        Self::new(
            ErrorKind::RecursionLimit,
            "max_recursion_depth exceeded",
        )
        .with_identifier("Octave:recursion-depth")
    }

    pub fn missing_value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingValue, message)
    }

    pub fn no_default_value(position: usize) -> Self {
        Self::new(
            ErrorKind::NoDefaultValue,
            format!("no default value for argument {position}"),
        )
    }

    pub fn out_of_memory() -> Self {
        Self::new(
            ErrorKind::OutOfMemory,
            "out of memory or dimension too large for Octave's index type",
        )
        .with_identifier("Octave:bad-alloc")
    }

    pub fn user(identifier: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User, message).with_identifier(identifier)
    }

    /// Record the frame the error is leaving
    pub fn push_frame(&mut self, entry: StackEntry) {
        self.stack.push(entry);
    }

    /// Text printed when the error reaches the top level
    pub fn report(&self) -> String {
        // a message ending in a newline suppresses the traceback
        if self.message.ends_with('\n') {
            return format!("error: {}", self.message);
        }
        let mut out = format!("error: {}\n", self.message);
        if !self.stack.is_empty() {
            out.push_str("error: called from\n");
            for entry in &self.stack {
                out.push_str(&format!(
                    "    {} at line {} column {}\n",
                    entry.name, entry.line, entry.column
                ));
            }
        }
        out
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExecutionError {}

impl From<ValueError> for ExecutionError {
    fn from(e: ValueError) -> Self {
        match &e {
            ValueError::Index(_) | ValueError::OutOfBound { .. } => ExecutionError::index(e.to_string()),
            ValueError::Type(_) => ExecutionError::type_error(e.to_string()),
            ValueError::General(_) => ExecutionError::general(e.to_string()),
            ValueError::OutOfMemory => ExecutionError::out_of_memory(),
        }
    }
}

/// Everything that unwinds evaluation
#[derive(Debug, Clone, Error)]
pub enum Exception {
    #[error("{0}")]
    Execution(ExecutionError),
    /// Asynchronous cancellation, or leaving the debugger with `dbquit`
    #[error("interrupted")]
    Interrupt,
    /// `exit(n)` / `quit(n)`
    #[error("exit with status {0}")]
    Exit(i32),
}

impl From<ExecutionError> for Exception {
    fn from(e: ExecutionError) -> Self {
        Exception::Execution(e)
    }
}

impl From<ValueError> for Exception {
    fn from(e: ValueError) -> Self {
        Exception::Execution(e.into())
    }
}

/// Result type alias
pub type EvalResult<T> = Result<T, Exception>;

/// Shared pending-interrupt flag; may be set from another thread
#[derive(Debug, Clone)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Error and warning bookkeeping
#[derive(Debug)]
pub struct ErrorState {
    pub last_error: Option<ExecutionError>,
    pub last_warning: String,
    pub last_warning_id: String,
    /// Depth of enclosing try blocks
    pub in_try_catch: usize,
    interrupt: Arc<AtomicBool>,
    disabled_warnings: HashSet<String>,
    all_warnings_off: bool,
}

impl Default for ErrorState {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorState {
    pub fn new() -> Self {
        ErrorState {
            last_error: None,
            last_warning: String::new(),
            last_warning_id: String::new(),
            in_try_catch: 0,
            interrupt: Arc::new(AtomicBool::new(false)),
            disabled_warnings: HashSet::new(),
            all_warnings_off: false,
        }
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(Arc::clone(&self.interrupt))
    }

    /// Consume a pending interrupt request
    pub fn take_interrupt(&self) -> bool {
        self.interrupt.swap(false, Ordering::SeqCst)
    }

    pub fn interrupt_pending(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Forget pending signals after an exception has been handled
    pub fn recover_from_exception(&mut self) {
        self.interrupt.store(false, Ordering::SeqCst);
    }

    pub fn save_exception(&mut self, e: &ExecutionError) {
        self.last_error = Some(e.clone());
    }

    pub fn last_error_message(&self) -> &str {
        self.last_error.as_ref().map_or("", |e| e.message.as_str())
    }

    pub fn set_warning_enabled(&mut self, id: &str, enabled: bool) {
        if id == "all" {
            self.all_warnings_off = !enabled;
            if enabled {
                self.disabled_warnings.clear();
            }
        } else if enabled {
            self.disabled_warnings.remove(id);
        } else {
            self.disabled_warnings.insert(id.to_string());
        }
    }

    pub fn warning_enabled(&self, id: &str) -> bool {
        !self.all_warnings_off && (id.is_empty() || !self.disabled_warnings.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_with_trace() {
        let mut e = ExecutionError::general("boom");
        e.push_frame(StackEntry {
            name: "f".into(),
            file: String::new(),
            line: 2,
            column: 3,
        });
        assert_eq!(
            e.report(),
            "error: boom\nerror: called from\n    f at line 2 column 3\n"
        );
    }

    #[test]
    fn test_value_error_conversion_keeps_kind() {
        let e: ExecutionError = ValueError::out_of_bound("(4)".into(), 3, (1, 3)).into();
        assert_eq!(e.kind, ErrorKind::Index);
        assert_eq!(e.identifier, "Octave:index-out-of-bounds");
    }

    #[test]
    fn test_interrupt_handle_sets_pending_flag() {
        let state = ErrorState::new();
        state.interrupt_handle().request();
        assert!(state.interrupt_pending());
        assert!(state.take_interrupt());
        assert!(!state.interrupt_pending());
    }

    #[test]
    fn test_warning_suppression() {
        let mut state = ErrorState::new();
        state.set_warning_enabled("Octave:some-id", false);
        assert!(!state.warning_enabled("Octave:some-id"));
        assert!(state.warning_enabled(""));
        state.set_warning_enabled("all", false);
        assert!(!state.warning_enabled(""));
    }
}
