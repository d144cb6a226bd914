//! Statement execution and control flow
//!
//! `break`, `continue` and `return` set counters on the interpreter; a
//! statement list stops as soon as one is set and the enclosing loop or
//! call consumes it.

use super::error::{EvalResult, Exception, ExecutionError};
use super::{FrameKind, Interpreter, StatementContext};
use crate::ast::{
    AssignOp, DeclElt, DeclScope, Expr, IfClause, PostfixOp, PrefixOp, Spanned, Statement, Stmt,
    SwitchCase,
};
use crate::value::{StructValue, Value};
use std::rc::Rc;

impl Interpreter {
    /// Run statements until one raises or sets a control flag
    pub(crate) fn exec_list(&mut self, list: &[Statement]) -> EvalResult<()> {
        for stmt in list {
            self.poll_interrupt()?;
            self.visit_statement(stmt)?;
            if self.breaking > 0 || self.continuing > 0 || self.returning > 0 {
                break;
            }
        }
        Ok(())
    }

    /// End-of-iteration bookkeeping; true when the loop must stop
    fn quit_loop_now(&mut self) -> EvalResult<bool> {
        self.poll_interrupt()?;
        if self.continuing > 0 {
            self.continuing -= 1;
        }
        let quit = self.returning > 0 || self.breaking > 0 || self.continuing > 0;
        if self.breaking > 0 {
            self.breaking -= 1;
        }
        Ok(quit)
    }

    fn in_user_code(&self) -> bool {
        matches!(
            self.context,
            StatementContext::Function | StatementContext::Script
        )
    }

    fn set_location(&mut self, line: usize, column: usize) {
        if self.in_user_code() && !self.typed_code {
            self.call_stack.set_location(line, column);
        }
    }

    pub(crate) fn visit_statement(&mut self, stmt: &Statement) -> EvalResult<()> {
        self.set_location(stmt.line, stmt.column);
        match self.dispatch_statement(stmt) {
            // while debugging, an interrupt only abandons the statement
            Err(Exception::Interrupt) if self.debug.mode => {
                self.errors.recover_from_exception();
                Ok(())
            }
            other => other,
        }
    }

    fn dispatch_statement(&mut self, stmt: &Statement) -> EvalResult<()> {
        let line = stmt.line;
        match &stmt.kind {
            Stmt::Expression(expr) => {
                self.echo_statement(line, true);
                self.check_breakpoint(line, false)?;
                let print = stmt.print_result && self.statement_printing_enabled();
                self.exec_expression(expr, print)
            }
            Stmt::Decl { scope, elts } => {
                self.echo_statement(line, true);
                self.check_breakpoint(line, false)?;
                self.exec_decl(*scope, elts)
            }
            Stmt::For { var, iter, body } => self.exec_for(stmt, var, iter, body),
            Stmt::ComplexFor {
                value,
                key,
                iter,
                body,
            } => self.exec_complex_for(stmt, value, key, iter, body),
            Stmt::While { cond, body } => self.exec_while(stmt, cond, body),
            Stmt::DoUntil {
                body,
                cond,
                cond_line,
            } => self.exec_do_until(stmt, body, cond, *cond_line),
            Stmt::If(clauses) => {
                self.echo_statement(line, true);
                self.exec_if(stmt, clauses)
            }
            Stmt::Switch { value, cases } => {
                self.echo_statement(line, true);
                self.check_breakpoint(line, false)?;
                self.exec_switch(stmt, value, cases)
            }
            Stmt::TryCatch {
                body,
                ident,
                handler,
            } => {
                self.echo_statement(line, true);
                self.exec_try_catch(body, ident.as_deref(), handler)
            }
            Stmt::UnwindProtect { body, cleanup } => {
                self.echo_statement(line, true);
                self.exec_unwind_protect(body, cleanup)
            }
            Stmt::Break => {
                self.echo_statement(line, true);
                self.check_breakpoint(line, false)?;
                if !self.in_loop {
                    return Err(ExecutionError::general(
                        "break must appear in a loop in the same file as loop command",
                    )
                    .into());
                }
                self.breaking = 1;
                Ok(())
            }
            Stmt::Continue => {
                self.echo_statement(line, true);
                self.check_breakpoint(line, false)?;
                if self.in_loop {
                    self.continuing = 1;
                }
                Ok(())
            }
            Stmt::Return => {
                self.echo_statement(line, true);
                self.check_breakpoint(line, false)?;
                if self.in_debug_repl() && self.call_stack.current_index() == self.debug.frame {
                    // return at the debug prompt resumes the program
                    self.dbcont()
                } else {
                    self.returning = 1;
                    Ok(())
                }
            }
            Stmt::NoOp { end_of_code } => {
                self.echo_statement(line, true);
                if *end_of_code {
                    self.check_breakpoint(line, true)?;
                }
                Ok(())
            }
            Stmt::FunctionDef(def) => {
                tracing::debug!(function = %def.name, "defining command-line function");
                self.symbols.install_cmdline_function(Rc::clone(def));
                Ok(())
            }
        }
    }

    /// Expression statement: assignments display themselves, other values go to `ans`
    fn exec_expression(&mut self, expr: &Spanned<Expr>, print: bool) -> EvalResult<()> {
        match &expr.node {
            Expr::Assign { lhs, op, rhs } => {
                self.eval_assign(lhs, *op, rhs, print)?;
            }
            Expr::MultiAssign { lhs, rhs } => {
                self.eval_multi_assign(lhs, rhs, print)?;
            }
            Expr::Prefix {
                op: PrefixOp::Incr | PrefixOp::Decr,
                operand,
            }
            | Expr::Postfix {
                op: PostfixOp::Incr | PostfixOp::Decr,
                operand,
            } => {
                self.evaluate(expr, 0)?;
                if print
                    && let Some(name) = operand.node.base_name()
                    && let Some(v) = self.varval(name)
                {
                    self.display_value(name, &v);
                }
            }
            Expr::Ident(name) if self.is_variable(name) => {
                if print && let Some(v) = self.varval(name) {
                    self.display_value(name, &v);
                }
            }
            _ => {
                if let Some(v) = self.evaluate(expr, 0)? {
                    self.bind_ans(v, print);
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Echo
    // ========================================================================

    fn echo_statement(&mut self, line: usize, advance: bool) {
        if !self.echo.active || self.typed_code || line == 0 {
            return;
        }
        self.echo_code(line);
        if advance {
            self.echo.file_pos = line + 1;
        }
    }

    /// Print source lines from the echo position through `line`, prefixed by PS4
    pub(crate) fn echo_code(&mut self, line: usize) {
        let source = match &self.call_stack.current_frame().kind {
            FrameKind::Function(f) => f.source.clone(),
            FrameKind::Script(s) => s.source.clone(),
            _ => None,
        };
        let Some(source) = source else {
            return;
        };
        let text = self.echo.render_lines(&source, line, &self.settings.ps4);
        self.write_out(&text);
    }

    /// Echo a loop header and return the line each iteration restarts from
    fn echo_loop_header(&mut self, line: usize) -> usize {
        if self.echo.active && !self.typed_code && line > 0 {
            self.echo_code(line);
            line + 1
        } else {
            line
        }
    }

    fn set_echo_pos(&mut self, line: usize) {
        if self.echo.active {
            self.echo.file_pos = line;
        }
    }

    // ========================================================================
    // Declarations and conditionals
    // ========================================================================

    fn exec_decl(&mut self, scope: DeclScope, elts: &[DeclElt]) -> EvalResult<()> {
        for elt in elts {
            match scope {
                DeclScope::Global => self.call_stack.make_global(&elt.name),
                DeclScope::Persistent => self.call_stack.make_persistent(&elt.name)?,
            }
            if !self.is_variable(&elt.name) {
                let init = match &elt.init {
                    Some(e) => self.eval_operand(e)?,
                    None => Value::empty(),
                };
                self.assign(&elt.name, init);
            }
        }
        Ok(())
    }

    pub(crate) fn is_logically_true(&mut self, expr: &Spanned<Expr>, who: &str) -> EvalResult<bool> {
        match self.evaluate(expr, 1)? {
            Some(v) => Ok(v.is_true()?),
            None => Err(ExecutionError::general(format!(
                "{who}: undefined value used in conditional expression"
            ))
            .into()),
        }
    }

    fn exec_if(&mut self, stmt: &Statement, clauses: &[IfClause]) -> EvalResult<()> {
        for clause in clauses {
            self.set_location(clause.line, stmt.column);
            let taken = match &clause.cond {
                None => true,
                Some(cond) => {
                    self.check_breakpoint(clause.line, false)?;
                    self.is_logically_true(cond, "if")?
                }
            };
            if taken {
                return self.exec_list(&clause.body);
            }
        }
        Ok(())
    }

    fn exec_switch(&mut self, stmt: &Statement, value: &Spanned<Expr>, cases: &[SwitchCase]) -> EvalResult<()> {
        let Some(value) = self.evaluate(value, 1)? else {
            return Err(ExecutionError::general(format!(
                "missing value in switch command near line {}, column {}",
                stmt.line, stmt.column
            ))
            .into());
        };
        for case in cases {
            let matched = match &case.label {
                None => true,
                Some(label) => {
                    let label = self.eval_operand(label)?;
                    value.switch_matches(&label)
                }
            };
            if matched {
                return self.exec_list(&case.body);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Loops
    // ========================================================================

    fn exec_for(
        &mut self,
        stmt: &Statement,
        var: &Spanned<Expr>,
        iter: &Spanned<Expr>,
        body: &[Statement],
    ) -> EvalResult<()> {
        let line = self.echo_loop_header(stmt.line);
        self.check_breakpoint(stmt.line, false)?;

        let saved = self.in_loop;
        let mut g = self.unwind(move |i| i.in_loop = saved);
        g.in_loop = true;

        let Some(rhs) = g.evaluate(iter, 1)? else {
            return Ok(());
        };
        let lv = g.make_lvalue(var)?;

        match rhs {
            Value::Range(r) => {
                for k in 0..r.numel() {
                    g.set_echo_pos(line);
                    g.assign_lvalue(&lv, AssignOp::Eq, Value::scalar(r.elem(k)))?;
                    g.exec_list(body)?;
                    if g.quit_loop_now()? {
                        break;
                    }
                }
            }
            v @ (Value::Num(_) | Value::Bool(_)) if v.is_scalar() => {
                g.set_echo_pos(line);
                g.assign_lvalue(&lv, AssignOp::Eq, v)?;
                g.exec_list(body)?;
                g.quit_loop_now()?;
            }
            v @ (Value::Num(_) | Value::Bool(_) | Value::Str(_) | Value::Cell(_) | Value::Struct(_)) => {
                let (rows, cols) = v.dims();
                if rows == 0 || cols == 0 {
                    // no iterations, but the loop variable is still set
                    g.assign_lvalue(&lv, AssignOp::Eq, v)?;
                    return Ok(());
                }
                for c in 1..=cols {
                    g.set_echo_pos(line);
                    let column = Value::scalar(c as f64);
                    let item = if rows == 1 {
                        v.paren_index(&[column])?
                    } else {
                        v.paren_index(&[Value::MagicColon, column])?
                    };
                    g.assign_lvalue(&lv, AssignOp::Eq, item)?;
                    g.exec_list(body)?;
                    if g.quit_loop_now()? {
                        break;
                    }
                }
            }
            _ => {
                return Err(ExecutionError::general(format!(
                    "invalid type in for loop expression near line {}, column {}",
                    stmt.line, stmt.column
                ))
                .into());
            }
        }
        Ok(())
    }

    fn exec_complex_for(
        &mut self,
        stmt: &Statement,
        value: &Spanned<Expr>,
        key: &Spanned<Expr>,
        iter: &Spanned<Expr>,
        body: &[Statement],
    ) -> EvalResult<()> {
        let line = self.echo_loop_header(stmt.line);
        self.check_breakpoint(stmt.line, false)?;

        let saved = self.in_loop;
        let mut g = self.unwind(move |i| i.in_loop = saved);
        g.in_loop = true;

        let Some(rhs) = g.evaluate(iter, 1)? else {
            return Ok(());
        };
        let Value::Struct(fields) = rhs else {
            return Err(ExecutionError::general(
                "in statement 'for [X, Y] = VAL', VAL must be a structure",
            )
            .into());
        };
        let value_lv = g.make_lvalue(value)?;
        let key_lv = g.make_lvalue(key)?;
        let entries: Vec<(String, Value)> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        for (name, v) in entries {
            g.set_echo_pos(line);
            g.assign_lvalue(&value_lv, AssignOp::Eq, v)?;
            g.assign_lvalue(&key_lv, AssignOp::Eq, Value::string(&name))?;
            g.exec_list(body)?;
            if g.quit_loop_now()? {
                break;
            }
        }
        Ok(())
    }

    fn exec_while(&mut self, stmt: &Statement, cond: &Spanned<Expr>, body: &[Statement]) -> EvalResult<()> {
        let line = self.echo_loop_header(stmt.line);

        let saved = self.in_loop;
        let mut g = self.unwind(move |i| i.in_loop = saved);
        g.in_loop = true;

        loop {
            g.set_echo_pos(line);
            g.set_location(stmt.line, stmt.column);
            g.check_breakpoint(stmt.line, false)?;
            if !g.is_logically_true(cond, "while")? {
                break;
            }
            g.exec_list(body)?;
            if g.quit_loop_now()? {
                break;
            }
        }
        Ok(())
    }

    fn exec_do_until(
        &mut self,
        stmt: &Statement,
        body: &[Statement],
        cond: &Spanned<Expr>,
        cond_line: usize,
    ) -> EvalResult<()> {
        let line = self.echo_loop_header(stmt.line);

        let saved = self.in_loop;
        let mut g = self.unwind(move |i| i.in_loop = saved);
        g.in_loop = true;

        loop {
            g.set_echo_pos(line);
            g.exec_list(body)?;
            if g.quit_loop_now()? {
                break;
            }
            g.check_breakpoint(cond_line, false)?;
            g.set_location(cond_line, stmt.column);
            if g.is_logically_true(cond, "do-until")? {
                break;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Error handling blocks
    // ========================================================================

    fn exec_try_catch(&mut self, body: &[Statement], ident: Option<&str>, handler: &[Statement]) -> EvalResult<()> {
        let saved = self.errors.in_try_catch;
        self.errors.in_try_catch += 1;
        let result = self.exec_list(body);
        self.errors.in_try_catch = saved;

        let err = match result {
            Ok(()) => return Ok(()),
            Err(Exception::Execution(e)) => e,
            Err(other) => return Err(other),
        };
        self.errors.recover_from_exception();
        self.errors.save_exception(&err);
        tracing::debug!(message = %err.message, "error caught");

        if let Some(name) = ident {
            let info = self.error_struct(&err);
            self.assign(name, info);
        }
        self.exec_list(handler)
    }

    /// `struct(message, identifier, stack)` describing an error
    pub(crate) fn error_struct(&self, err: &ExecutionError) -> Value {
        let stack = match err.stack.first() {
            Some(entry) => StructValue::from_iter([
                ("file", Value::string(&entry.file)),
                ("name", Value::string(&entry.name)),
                ("line", Value::scalar(entry.line as f64)),
                ("column", Value::scalar(entry.column as f64)),
            ]),
            None => {
                let frame = self.call_stack.current_frame();
                StructValue::from_iter([
                    (
                        "file",
                        Value::string(
                            &frame
                                .file()
                                .map(|p| p.display().to_string())
                                .unwrap_or_default(),
                        ),
                    ),
                    ("name", Value::string(frame.name())),
                    ("line", Value::scalar(frame.line as f64)),
                    ("column", Value::scalar(frame.column as f64)),
                ])
            }
        };
        Value::from(StructValue::from_iter([
            ("message", Value::string(&err.message)),
            ("identifier", Value::string(&err.identifier)),
            ("stack", Value::from(stack)),
        ]))
    }

    fn exec_unwind_protect(&mut self, body: &[Statement], cleanup: &[Statement]) -> EvalResult<()> {
        match self.exec_list(body) {
            Ok(()) => self.run_cleanup(cleanup),
            Err(Exception::Execution(e)) => {
                self.errors.recover_from_exception();
                self.errors.save_exception(&e);
                self.run_cleanup(cleanup)?;
                Err(Exception::Execution(e))
            }
            Err(other) => {
                self.run_cleanup(cleanup)?;
                Err(other)
            }
        }
    }

    /// Cleanup block: runs with interrupts, `return` and `break` cleared
    fn run_cleanup(&mut self, cleanup: &[Statement]) -> EvalResult<()> {
        let interrupt_pending = self.errors.take_interrupt();
        let line = self.call_stack.current_line();
        let column = self.call_stack.current_column();
        let saved_returning = std::mem::take(&mut self.returning);
        let saved_breaking = std::mem::take(&mut self.breaking);

        let result = self.exec_list(cleanup);

        // a return or break inside the cleanup wins over the saved one
        if self.returning == 0 && self.breaking == 0 {
            self.returning = saved_returning;
            self.breaking = saved_breaking;
        }
        if interrupt_pending {
            self.interrupt_handle().request();
        }
        match result {
            Ok(()) => {
                self.call_stack.set_location(line, column);
                Ok(())
            }
            Err(e) => {
                if matches!(e, Exception::Execution(_)) {
                    self.errors.recover_from_exception();
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::SharedBuffer;
    use pretty_assertions::assert_eq;

    fn run(code: &str) -> (Interpreter, String) {
        let out = SharedBuffer::new();
        let mut interp = Interpreter::new()
            .with_output(out.clone())
            .with_error_output(SharedBuffer::new());
        interp.eval_string(code, false, 0).unwrap();
        (interp, out.contents())
    }

    fn num(i: &Interpreter, name: &str) -> Vec<f64> {
        i.varval(name).unwrap().to_numeric().unwrap().into_data()
    }

    fn error_message(code: &str) -> String {
        let mut interp = Interpreter::new().with_error_output(SharedBuffer::new());
        match interp.eval_string(code, true, 0) {
            Err(Exception::Execution(e)) => e.message,
            other => panic!("expected an execution error, got {other:?}"),
        }
    }

    #[test]
    fn test_for_over_matrix_columns() {
        let (i, _) = run("s = 0; for c = [1 2; 3 4]\n s = s + c(2);\nend");
        assert_eq!(num(&i, "s"), vec![6.0]);
    }

    #[test]
    fn test_for_over_empty_assigns_loop_variable() {
        let (i, _) = run("n = 0; for k = []\n n = n + 1;\nend");
        assert_eq!(num(&i, "n"), vec![0.0]);
        assert!(i.varval("k").unwrap().is_empty());
    }

    #[test]
    fn test_break_and_continue() {
        let (i, _) = run(
            "s = 0;\nfor k = 1:10\n if k == 3\n continue;\n end\n if k > 5\n break;\n end\n s = s + k;\nend",
        );
        assert_eq!(num(&i, "s"), vec![12.0]);
        assert_eq!(i.control_flags(), (0, 0, 0));
    }

    #[test]
    fn test_break_outside_loop() {
        assert_eq!(
            error_message("break"),
            "break must appear in a loop in the same file as loop command"
        );
    }

    #[test]
    fn test_while_and_do_until() {
        let (i, _) = run("k = 0; while k < 4\n k++;\nend\nj = 0;\ndo\n j += 2;\nuntil j >= 5");
        assert_eq!(num(&i, "k"), vec![4.0]);
        assert_eq!(num(&i, "j"), vec![6.0]);
    }

    #[test]
    fn test_switch_with_cell_label() {
        let (i, _) = run("x = 'b';\nswitch x\n case {'a', 'b'}\n r = 1;\n otherwise\n r = 2;\nend");
        assert_eq!(num(&i, "r"), vec![1.0]);
    }

    #[test]
    fn test_try_catch_binds_error_struct() {
        let (i, _) = run("try\n error('my:id', 'went %s', 'wrong');\ncatch err\n m = err.message;\n id = err.identifier;\nend");
        assert_eq!(i.varval("m").unwrap().as_string().unwrap(), "went wrong");
        assert_eq!(i.varval("id").unwrap().as_string().unwrap(), "my:id");
    }

    #[test]
    fn test_unwind_protect_runs_cleanup_on_error() {
        let mut interp = Interpreter::new().with_error_output(SharedBuffer::new());
        let r = interp.eval_string(
            "unwind_protect\n error('boom');\nunwind_protect_cleanup\n cleaned = 1;\nend_unwind_protect",
            true,
            0,
        );
        assert!(r.is_err());
        assert_eq!(num(&interp, "cleaned"), vec![1.0]);
    }

    #[test]
    fn test_break_in_protected_body_exits_loop() {
        let (i, _) = run(
            "n = 0; c = 0;\nfor k = 1:5\n unwind_protect\n  n = n + 1;\n  if k == 2\n   break;\n  end\n unwind_protect_cleanup\n  c = c + 1;\n end_unwind_protect\nend",
        );
        assert_eq!(num(&i, "n"), vec![2.0]);
        assert_eq!(num(&i, "c"), vec![2.0]);
        assert_eq!(num(&i, "k"), vec![2.0]);
    }

    #[test]
    fn test_return_in_protected_body_runs_cleanup() {
        let (i, _) = run(
            "function r = f()\n r = 1;\n unwind_protect\n  return;\n unwind_protect_cleanup\n  r = 2;\n end_unwind_protect\n r = 3;\nend\nx = f();",
        );
        assert_eq!(num(&i, "x"), vec![2.0]);
    }

    #[test]
    fn test_cleanup_return_overrides_body_break() {
        let code = "function r = g(stop)\n r = 0;\n for k = 1:3\n  unwind_protect\n   r = k;\n   break;\n  unwind_protect_cleanup\n   if stop\n    return;\n   end\n  end_unwind_protect\n end\n r = -1;\nend\nx = g(true); y = g(false);";
        let (i, _) = run(code);
        assert_eq!(num(&i, "x"), vec![1.0]);
        assert_eq!(num(&i, "y"), vec![-1.0]);
    }

    #[test]
    fn test_interrupt_in_protected_body_runs_cleanup() {
        let out = SharedBuffer::new();
        let mut interp = Interpreter::new()
            .with_output(out.clone())
            .with_error_output(SharedBuffer::new());
        interp.symbols.install_builtin("raise_interrupt", |interp, _, _| {
            interp.interrupt_handle().request();
            Ok(Vec::new())
        });
        interp
            .eval_string(
                "function r = h()\n r = 0;\n unwind_protect\n  raise_interrupt();\n  r = 1;\n unwind_protect_cleanup\n  disp('cleanup');\n end_unwind_protect\nend",
                true,
                0,
            )
            .unwrap();
        let r = interp.eval_string("x = h();", true, 0);
        assert!(matches!(r, Err(Exception::Interrupt)));
        assert_eq!(out.contents(), "cleanup\n");
        assert_eq!(interp.call_stack.size(), 1);
        assert!(interp.varval("x").is_none());
        assert!(!interp.errors.take_interrupt());
    }

    #[test]
    fn test_complex_for_over_struct() {
        let (i, _) = run("s.a = 1; s.b = 2; keys = '';\nfor [v, k] = s\n keys = [keys k];\nend");
        assert_eq!(i.varval("keys").unwrap().as_string().unwrap(), "ab");
    }

    #[test]
    fn test_undefined_condition_value() {
        let mut interp = Interpreter::new().with_error_output(SharedBuffer::new());
        interp
            .eval_string("function r = nothing()\nend", true, 0)
            .unwrap();
        let Err(Exception::Execution(e)) = interp.eval_string("if nothing()\nend", true, 0) else {
            panic!("expected error");
        };
        assert_eq!(e.message, "if: undefined value used in conditional expression");
    }

    #[test]
    fn test_expression_statement_binds_ans() {
        let (i, out) = run("1 + 2");
        assert_eq!(num(&i, "ans"), vec![3.0]);
        assert_eq!(out, "ans = 3\n");
    }
}
