//! Reading and running top-level input
//!
//! Covers the read-eval-print loop, `eval` strings and sourced files.

use super::error::{ErrorKind, EvalResult, Exception, ExecutionError};
use super::io::ReadOutcome;
use super::symtab::UserScript;
use super::Interpreter;
use crate::ast::{Expr, PostfixOp, PrefixOp, SourceFile, Spanned, StatementList, Stmt};
use crate::error::render_error;
use crate::lexer::is_keyword;
use crate::parser::{parse, parse_file};
use crate::value::{Value, ValueList};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const PROMPT: &str = ">> ";
pub const CONTINUATION_PROMPT: &str = "> ";

/// One complete piece of input
pub(crate) enum Unit {
    /// Parsed statements and the text they came from
    Parsed(StatementList, String),
    /// Rendered diagnostic
    SyntaxError(String),
    Interrupted,
    Eof,
}

/// Whether `name` can be used as a variable name
pub fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Interpreter {
    /// Read lines until they form a complete statement list
    pub(crate) fn read_unit(&mut self, prompt: &str, continuation: &str) -> Unit {
        let mut text = String::new();
        let mut current = prompt;
        loop {
            match self.input.read_line(current) {
                ReadOutcome::Interrupted => return Unit::Interrupted,
                ReadOutcome::Eof if text.is_empty() => return Unit::Eof,
                ReadOutcome::Eof => {
                    return match parse(&text) {
                        Ok(list) => Unit::Parsed(list, text),
                        Err(e) => Unit::SyntaxError(render_error("<stdin>", &text, &e)),
                    };
                }
                ReadOutcome::Line(line) => {
                    text.push_str(&line);
                    text.push('\n');
                    match parse(&text) {
                        Ok(list) => return Unit::Parsed(list, text),
                        Err(e) if e.is_incomplete() => current = continuation,
                        Err(e) => return Unit::SyntaxError(render_error("<stdin>", &text, &e)),
                    }
                }
            }
        }
    }

    /// Read and run input until end of file; returns the exit status
    pub fn run_repl(&mut self) -> i32 {
        let interactive = self.interactive;
        let (prompt, continuation) = if interactive {
            (PROMPT, CONTINUATION_PROMPT)
        } else {
            ("", "")
        };
        loop {
            if self.call_stack.at_top_level() {
                self.drop_finished_debuggers();
                self.reset_debug_state();
            }

            let list = match self.read_unit(prompt, continuation) {
                Unit::Eof => {
                    if interactive {
                        self.write_out("\n");
                    }
                    return 0;
                }
                Unit::Interrupted => {
                    self.errors.recover_from_exception();
                    if interactive {
                        self.write_out("\n");
                    }
                    continue;
                }
                Unit::SyntaxError(report) => {
                    self.write_err(&report);
                    if interactive {
                        continue;
                    }
                    return 1;
                }
                Unit::Parsed(list, text) => {
                    if self.echo_commands {
                        self.write_out(&text);
                    }
                    list
                }
            };

            let result = self.exec_list(&list).and_then(|()| self.poll_interrupt());
            match result {
                Ok(()) if interactive => {
                    self.breaking = 0;
                    self.continuing = 0;
                    self.returning = 0;
                }
                Ok(()) => {
                    let quit = self.returning > 0 || self.breaking > 0;
                    self.returning = 0;
                    self.breaking = self.breaking.saturating_sub(1);
                    if quit {
                        return 0;
                    }
                }
                Err(e) => {
                    if let Some(status) = self.handle_toplevel_exception(e) {
                        return status;
                    }
                }
            }
        }
    }

    /// Report an exception that reached the top level; `Some` ends the session
    pub(crate) fn handle_toplevel_exception(&mut self, e: Exception) -> Option<i32> {
        match e {
            Exception::Exit(status) => {
                tracing::debug!(status, "exit requested");
                Some(status)
            }
            Exception::Interrupt => {
                self.recover_toplevel();
                if self.interactive {
                    self.write_out("\n");
                }
                None
            }
            Exception::Execution(err) if err.kind == ErrorKind::OutOfMemory => {
                self.recover_toplevel();
                self.write_err("error: out of memory -- trying to return to prompt\n");
                None
            }
            Exception::Execution(err) => {
                tracing::debug!(message = %err.message, "error at top level");
                let report = err.report();
                self.write_err(&report);
                self.errors.save_exception(&err);
                if self.interactive {
                    self.recover_toplevel();
                    None
                } else {
                    Some(1)
                }
            }
        }
    }

    fn recover_toplevel(&mut self) {
        self.errors.recover_from_exception();
        self.reset_evaluation_state();
        self.call_stack.restore_frame(0);
        // no debug prompt survives an unwind to the top level
        self.debug.stack.clear();
        self.debug.step = super::Step::Off;
        self.reset_debug_state();
    }

    // ========================================================================
    // eval strings
    // ========================================================================

    /// Parse and run `code` in the current frame
    ///
    /// A lone expression is evaluated for `nargout` values; anything else is
    /// run as statements and may not be asked for values. `silent`
    /// suppresses the display of a lone expression's result.
    pub fn eval_string(&mut self, code: &str, silent: bool, nargout: usize) -> EvalResult<ValueList> {
        let list = parse(code).map_err(|e| {
            ExecutionError::parse(format!("parse error:\n\n{}", render_error("eval", code, &e)))
        })?;

        if let [stmt] = list.as_slice()
            && let Stmt::Expression(expr) = &stmt.kind
        {
            let print = !silent && stmt.print_result;
            return self.eval_expression_unit(expr, nargout, print);
        }
        if nargout > 0 {
            return Err(ExecutionError::general("eval: invalid use of statement list").into());
        }
        self.exec_list(&list)?;
        Ok(Vec::new())
    }

    fn eval_expression_unit(
        &mut self,
        expr: &Spanned<Expr>,
        nargout: usize,
        print: bool,
    ) -> EvalResult<ValueList> {
        let (values, bind_ans) = match &expr.node {
            Expr::Assign { lhs, op, rhs } => {
                self.push_nargout(nargout);
                let result = self.eval_assign(lhs, *op, rhs, print);
                self.pop_nargout();
                (result?, false)
            }
            Expr::MultiAssign { lhs, rhs } => {
                self.push_nargout(nargout);
                let result = self.eval_multi_assign(lhs, rhs, print);
                self.pop_nargout();
                (result?, false)
            }
            Expr::Prefix {
                op: PrefixOp::Incr | PrefixOp::Decr,
                ..
            }
            | Expr::Postfix {
                op: PostfixOp::Incr | PostfixOp::Decr,
                ..
            } => (self.evaluate_n(expr, nargout)?, false),
            Expr::Ident(name) if self.is_variable(name) => {
                let value = self.varval(name).unwrap_or_default();
                if print {
                    self.display_value(name, &value);
                }
                (vec![value], false)
            }
            _ => (self.evaluate_n(expr, nargout)?, true),
        };
        if bind_ans && let Some(first) = values.first() {
            self.bind_ans(first.clone(), print);
        }
        Ok(if nargout == 0 { Vec::new() } else { values })
    }

    /// `eval(try, catch)`: run `catch_code` if `try_code` fails
    pub fn eval_with_catch(&mut self, try_code: &str, catch_code: Option<&str>, nargout: usize) -> EvalResult<ValueList> {
        let silent = nargout > 0;
        let Some(catch_code) = catch_code else {
            return self.eval_string(try_code, silent, nargout);
        };
        let saved = self.errors.in_try_catch;
        self.errors.in_try_catch += 1;
        let result = self.eval_string(try_code, silent, nargout);
        self.errors.in_try_catch = saved;
        match result {
            Ok(values) => Ok(if nargout > 0 { values } else { Vec::new() }),
            Err(Exception::Execution(e)) => {
                self.errors.recover_from_exception();
                self.errors.save_exception(&e);
                let values = self.eval_string(catch_code, silent, nargout)?;
                Ok(if nargout > 0 { values } else { Vec::new() })
            }
            Err(other) => Err(other),
        }
    }

    /// Move to the frame named by an `evalin`/`assignin` context
    fn goto_context(&mut self, who: &str, context: &str) -> EvalResult<()> {
        let target = match context {
            "caller" => self.call_stack.caller_index(),
            "base" => 0,
            _ => {
                return Err(ExecutionError::general(format!(
                    "{who}: CONTEXT must be \"caller\" or \"base\""
                ))
                .into());
            }
        };
        self.call_stack.goto_frame(target);
        Ok(())
    }

    /// `evalin(context, try, catch)`
    pub fn evalin(
        &mut self,
        context: &str,
        try_code: &str,
        catch_code: Option<&str>,
        nargout: usize,
    ) -> EvalResult<ValueList> {
        let saved = self.call_stack.current_index();
        let mut g = self.unwind(move |i| i.call_stack.restore_frame(saved));
        g.goto_context("evalin", context)?;
        g.eval_with_catch(try_code, catch_code, nargout)
    }

    /// `assignin(context, name, value)`
    pub fn assignin(&mut self, context: &str, name: &str, value: Value) -> EvalResult<()> {
        let saved = self.call_stack.current_index();
        let mut g = self.unwind(move |i| i.call_stack.restore_frame(saved));
        g.goto_context("assignin", context)?;
        if !valid_identifier(name) {
            return Err(
                ExecutionError::general(format!("assignin: invalid variable name '{name}'")).into(),
            );
        }
        if is_keyword(name) {
            return Err(ExecutionError::general(format!(
                "assignin: invalid assignment to keyword '{name}'"
            ))
            .into());
        }
        g.assign(name, value);
        Ok(())
    }

    // ========================================================================
    // Source files
    // ========================================================================

    /// Run a script file in the current (or `context`) workspace
    ///
    /// A file of functions has its functions installed instead.
    pub fn source_file(&mut self, file: &Path, context: Option<&str>) -> EvalResult<()> {
        if self.source_depth >= self.settings.max_recursion_depth {
            return Err(ExecutionError::recursion_limit().into());
        }
        let saved_frame = self.call_stack.current_index();
        let mut g = self.unwind(move |i| {
            i.source_depth -= 1;
            i.call_stack.restore_frame(saved_frame);
        });
        g.source_depth += 1;

        if let Some(context) = context {
            let target = match context {
                "caller" => g.call_stack.caller_index(),
                "base" => 0,
                _ => {
                    return Err(ExecutionError::general(
                        "source: context must be \"caller\" or \"base\"",
                    )
                    .into());
                }
            };
            g.call_stack.goto_frame(target);
        }

        let path = resolve_source_path(file);
        let full = std::path::absolute(&path).unwrap_or_else(|_| path.clone());
        let text = std::fs::read_to_string(&path).map_err(|e| {
            tracing::debug!(file = %full.display(), error = %e, "cannot read source file");
            ExecutionError::general(format!("source: error sourcing file '{}'", full.display()))
        })?;
        let parsed = parse_file(&text).map_err(|e| {
            let name = path.display().to_string();
            ExecutionError::parse(format!(
                "source: error sourcing file '{}'\n{}",
                full.display(),
                render_error(&name, &text, &e)
            ))
        })?;

        match parsed {
            SourceFile::Script(body) => {
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                tracing::debug!(script = %name, file = %full.display(), "sourcing");
                let script = Rc::new(UserScript {
                    name,
                    file: Some(path.clone()),
                    body: Rc::new(body),
                    source: Some(Rc::from(text.as_str())),
                });
                g.execute_user_script(&script, &[], 0)?;
            }
            SourceFile::Functions(_) => {
                g.symbols.load_file(&path, None)?;
            }
        }
        Ok(())
    }

    /// Run a file as the main program; returns the exit status
    pub fn run_file(&mut self, file: &Path) -> i32 {
        match self.source_file(file, None) {
            Ok(()) => 0,
            Err(e) => self.handle_toplevel_exception(e).unwrap_or(1),
        }
    }

    /// Run a file, then keep reading input; an error in the file is
    /// reported without ending the session
    pub fn run_file_persistent(&mut self, file: &Path) -> i32 {
        if let Err(e) = self.source_file(file, None) {
            let interactive = std::mem::replace(&mut self.interactive, true);
            let status = self.handle_toplevel_exception(e);
            self.interactive = interactive;
            if let Some(status) = status {
                return status;
            }
        }
        self.run_repl()
    }

    /// Run `code` as a batch unit, displaying unterminated results
    pub fn run_string(&mut self, code: &str) -> i32 {
        match self.eval_string(code, false, 0) {
            Ok(_) => 0,
            Err(e) => self.handle_toplevel_exception(e).unwrap_or(1),
        }
    }
}

/// `name` as given, or with `.m` appended when that exists instead
fn resolve_source_path(file: &Path) -> PathBuf {
    if file.exists() || file.extension().is_some() {
        return file.to_path_buf();
    }
    let with_ext = file.with_extension("m");
    if with_ext.exists() { with_ext } else { file.to_path_buf() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{ScriptedInput, SharedBuffer};
    use pretty_assertions::assert_eq;

    fn session(lines: &[&str], interactive: bool) -> (Interpreter, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let mut interp = Interpreter::new()
            .with_output(out.clone())
            .with_error_output(err.clone())
            .with_input(ScriptedInput::new(lines.iter().copied()));
        interp.set_interactive(interactive);
        (interp, out, err)
    }

    #[test]
    fn test_valid_identifier() {
        assert!(valid_identifier("_x1"));
        assert!(!valid_identifier("1x"));
        assert!(!valid_identifier(""));
    }

    #[test]
    fn test_repl_continues_multiline_block() {
        let (mut interp, out, _) = session(&["for k = 1:2", "  k", "end"], false);
        assert_eq!(interp.run_repl(), 0);
        assert_eq!(out.contents(), "k = 1\nk = 2\n");
    }

    #[test]
    fn test_batch_error_sets_status() {
        let (mut interp, _, err) = session(&["x = 1;", "error('stop here')", "y = 2;"], false);
        assert_eq!(interp.run_repl(), 1);
        assert_eq!(err.contents(), "error: stop here\n");
        assert!(!interp.is_variable("y"));
    }

    #[test]
    fn test_interactive_error_recovers() {
        let (mut interp, _, err) = session(&["undefined_thing", "z = 3;"], true);
        assert_eq!(interp.run_repl(), 0);
        assert!(err.contents().contains("'undefined_thing' undefined"));
        assert!(interp.is_variable("z"));
    }

    #[test]
    fn test_oversized_arrays_return_to_prompt() {
        let (mut interp, _, err) = session(
            &["x = zeros(1e6, 1e6);", "r = (1:1e12)';", "y = 1;"],
            true,
        );
        assert_eq!(interp.run_repl(), 0);
        assert_eq!(
            err.contents(),
            "error: out of memory -- trying to return to prompt\n".repeat(2)
        );
        assert!(!interp.is_variable("x"));
        assert!(interp.is_variable("y"));
        assert_eq!(interp.call_stack.size(), 1);
    }

    #[test]
    fn test_syntax_error_in_batch_mode() {
        let (mut interp, _, err) = session(&["x = )"], false);
        assert_eq!(interp.run_repl(), 1);
        assert!(err.contents().contains("parse error"));
    }

    #[test]
    fn test_eval_string_value_and_statement_list() {
        let mut interp = Interpreter::new().with_output(SharedBuffer::new());
        let values = interp.eval_string("1 + 1", true, 1).unwrap();
        assert_eq!(values.len(), 1);
        assert!(interp.eval_string("a = 1; b = 2;", true, 1).is_err());
        assert!(interp.eval_string("a = 1; b = 2;", true, 0).unwrap().is_empty());
    }

    #[test]
    fn test_eval_with_catch_runs_handler() {
        let mut interp = Interpreter::new().with_output(SharedBuffer::new());
        interp
            .eval_with_catch("error('nope')", Some("handled = 1;"), 0)
            .unwrap();
        assert!(interp.is_variable("handled"));
        assert_eq!(interp.errors.last_error_message(), "nope");
    }

    #[test]
    fn test_assignin_rejects_keyword() {
        let mut interp = Interpreter::new();
        let Err(Exception::Execution(e)) = interp.assignin("base", "for", Value::scalar(1.0)) else {
            panic!("expected error");
        };
        assert_eq!(e.message, "assignin: invalid assignment to keyword 'for'");
    }
}
