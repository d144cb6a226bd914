//! Tree-walking evaluator
//!
//! The [`Interpreter`] is the explicit context object: it owns the call
//! stack, the function table, the debugger and echo state, and the
//! input/output channels. Everything that evaluates code takes it by
//! `&mut`.
//!
//! Layout:
//! - `eval`: expressions and the evaluation register
//! - `exec`: statements and control flow
//! - `lvalue`: assignment targets
//! - `call`: user functions, scripts and anonymous functions
//! - `toplevel`: the read-eval-print loop, `eval` strings and sourcing files
//! - `debugger`, `echo`, `breakpoints`, `autoload`, `profiler`: the state machines

mod autoload;
mod breakpoints;
mod call;
mod call_stack;
mod config;
mod debugger;
mod echo;
mod error;
mod eval;
mod exec;
mod guard;
mod io;
mod lvalue;
mod profiler;
mod symtab;
mod toplevel;

pub use autoload::{AutoloadMap, ResolvedFile, resolve_file};
pub use breakpoints::{Breakpoint, BreakpointTable};
pub use call_stack::{CallStack, Frame, FrameKind, Workspace};
pub use config::{ConfigError, Knob, Settings};
pub use debugger::{DEBUG_PROMPT, Debugger, Step};
pub use echo::{EchoMode, EchoState, file_key as echo_file_key};
pub use error::{
    ErrorKind, ErrorState, EvalResult, Exception, ExecutionError, InterruptHandle, StackEntry,
};
pub use io::{LineReader, NoInput, ReadOutcome, ScriptedInput, SharedBuffer};
pub use lvalue::Lvalue;
pub use profiler::Profiler;
pub use toplevel::{CONTINUATION_PROMPT, PROMPT, valid_identifier};
pub use symtab::{BuiltinFn, Callable, FunctionKind, SymbolTable, UserFunction, UserScript};

use crate::value::display::DisplayOptions;
use crate::value::{Value, ValueList};
use debugger::DebugState;
use std::io::Write;
use std::path::PathBuf;

/// Stack space kept free before growing onto a new segment
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each new stack segment
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Kind of code the current statement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementContext {
    #[default]
    Other,
    Function,
    Script,
}

/// Value being indexed and subscript position that `end` refers to
#[derive(Debug, Clone, Default)]
pub(crate) struct IndexContext {
    /// Dimensions of the indexed value; `None` outside any index expression
    pub dims: Option<(usize, usize)>,
    /// The indexed value itself when it is an object with an `end` method
    pub object: Option<Value>,
    pub position: usize,
    pub count: usize,
}

/// The evaluator
pub struct Interpreter {
    pub settings: Settings,
    pub call_stack: CallStack,
    pub symbols: SymbolTable,
    pub errors: ErrorState,
    pub breakpoints: BreakpointTable,
    pub autoload: AutoloadMap,
    pub profiler: Profiler,
    pub(crate) debug: DebugState,
    pub(crate) echo: EchoState,

    pub(crate) breaking: usize,
    pub(crate) continuing: usize,
    pub(crate) returning: usize,
    pub(crate) in_loop: bool,
    pub(crate) context: StatementContext,

    nargout_stack: Vec<usize>,
    pub(crate) indexed: IndexContext,
    /// Outputs the next user-function call discards, set by `[~, b] = ...`
    pub(crate) pending_ignored: Option<Vec<bool>>,
    /// Executing statements typed at the debug prompt
    pub(crate) typed_code: bool,

    output: Box<dyn Write>,
    err_out: Box<dyn Write>,
    input: Box<dyn LineReader>,
    pub(crate) interactive: bool,
    pub(crate) echo_commands: bool,
    pub(crate) source_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let mut symbols = SymbolTable::new();
        let mut path = vec![PathBuf::from(".")];
        path.extend(settings.path.iter().cloned());
        symbols.set_path(path);
        crate::builtins::install(&mut symbols);

        Interpreter {
            echo: EchoState::from_setting(&settings.echo),
            settings,
            call_stack: CallStack::new(),
            symbols,
            errors: ErrorState::new(),
            breakpoints: BreakpointTable::new(),
            autoload: AutoloadMap::new(),
            profiler: Profiler::new(),
            debug: DebugState::default(),
            breaking: 0,
            continuing: 0,
            returning: 0,
            in_loop: false,
            context: StatementContext::Other,
            nargout_stack: Vec::new(),
            indexed: IndexContext::default(),
            pending_ignored: None,
            typed_code: false,
            output: Box::new(std::io::stdout()),
            err_out: Box::new(std::io::stderr()),
            input: Box::new(NoInput),
            interactive: false,
            echo_commands: false,
            source_depth: 0,
        }
    }

    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.output = Box::new(out);
        self
    }

    pub fn with_error_output(mut self, err: impl Write + 'static) -> Self {
        self.err_out = Box::new(err);
        self
    }

    pub fn with_input(mut self, input: impl LineReader + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    pub fn set_input(&mut self, input: Box<dyn LineReader>) {
        self.input = input;
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Print each unit read by the top-level loop before running it
    pub fn set_echo_commands(&mut self, on: bool) {
        self.echo_commands = on;
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.errors.interrupt_handle()
    }

    /// Current (breaking, continuing, returning) counters
    pub fn control_flags(&self) -> (usize, usize, usize) {
        (self.breaking, self.continuing, self.returning)
    }

    pub fn statement_context(&self) -> StatementContext {
        self.context
    }

    // ====================================================================
    // Variable access
    // ====================================================================

    pub fn varval(&self, name: &str) -> Option<Value> {
        self.call_stack.varval(name)
    }

    pub fn assign(&mut self, name: &str, value: Value) {
        self.call_stack.assign(name, value);
    }

    pub fn global_varval(&self, name: &str) -> Option<Value> {
        self.call_stack.global_varval(name)
    }

    pub fn global_assign(&mut self, name: &str, value: Value) {
        self.call_stack.global_assign(name, value);
    }

    pub fn is_variable(&self, name: &str) -> bool {
        self.call_stack.is_variable(name)
    }

    pub fn clear_variable(&mut self, name: &str) -> bool {
        self.call_stack.clear_variable(name)
    }

    pub fn clear_all_variables(&mut self) {
        self.call_stack.clear_all_variables();
    }

    pub fn clear_global_variable(&mut self, name: &str) {
        self.call_stack.clear_global(name);
    }

    pub fn clear_all_globals(&mut self) {
        self.call_stack.clear_all_globals();
    }

    // ====================================================================
    // Output
    // ====================================================================

    pub(crate) fn write_out(&mut self, text: &str) {
        // a closed stdout is not an evaluation error
        let _ = self.output.write_all(text.as_bytes());
        let _ = self.output.flush();
    }

    pub(crate) fn write_err(&mut self, text: &str) {
        let _ = self.err_out.write_all(text.as_bytes());
        let _ = self.err_out.flush();
    }

    pub(crate) fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            print_empty_dimensions: self.settings.print_empty_dimensions,
        }
    }

    /// Show `name = value` the way an unterminated statement does
    pub(crate) fn display_value(&mut self, name: &str, value: &Value) {
        let text = crate::value::display::display(name, value, &self.display_options());
        self.write_out(&text);
    }

    /// Emit a warning unless its identifier is disabled
    pub fn warning(&mut self, id: &str, message: &str) {
        if !self.errors.warning_enabled(id) {
            return;
        }
        self.errors.last_warning = message.to_string();
        self.errors.last_warning_id = id.to_string();
        tracing::warn!(id, "{message}");
        self.write_err(&format!("warning: {message}\n"));
    }

    // ====================================================================
    // Output-count bookkeeping
    // ====================================================================

    pub(crate) fn nargout_top(&self) -> usize {
        self.nargout_stack.last().copied().unwrap_or(0)
    }

    pub(crate) fn push_nargout(&mut self, n: usize) {
        self.nargout_stack.push(n);
    }

    pub(crate) fn pop_nargout(&mut self) {
        self.nargout_stack.pop();
    }

    /// Raise a pending asynchronous interrupt
    pub(crate) fn poll_interrupt(&mut self) -> EvalResult<()> {
        if self.errors.take_interrupt() {
            tracing::debug!("interrupt delivered");
            return Err(Exception::Interrupt);
        }
        Ok(())
    }

    pub(crate) fn statement_printing_enabled(&self) -> bool {
        !(self.settings.silent_functions
            && matches!(
                self.context,
                StatementContext::Function | StatementContext::Script
            ))
    }

    /// Clear evaluator state left over after an aborted top-level command
    pub(crate) fn reset_evaluation_state(&mut self) {
        self.nargout_stack.clear();
        self.indexed = IndexContext::default();
        self.pending_ignored = None;
        self.typed_code = false;
        self.context = StatementContext::Other;
        self.in_loop = false;
        self.breaking = 0;
        self.continuing = 0;
        self.returning = 0;
    }

    /// `ans = value` (each element of a cs-list in turn), displayed if `print`
    pub(crate) fn bind_ans(&mut self, value: Value, print: bool) {
        match value {
            Value::CsList(list) => {
                for v in list {
                    self.bind_ans(v, print);
                }
            }
            v => {
                if print {
                    self.display_value("ans", &v);
                }
                self.assign("ans", v);
            }
        }
    }

    /// Values of `list` with any cs-list elements spliced in
    pub(crate) fn flatten(list: ValueList) -> ValueList {
        let mut out = Vec::with_capacity(list.len());
        for v in list {
            match v {
                Value::CsList(inner) => out.extend(inner),
                v => out.push(v),
            }
        }
        out
    }
}
