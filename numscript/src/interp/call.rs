//! Calling builtins, user functions, scripts and anonymous functions

use super::echo::{self, EchoMode};
use super::error::{EvalResult, Exception, ExecutionError, StackEntry};
use super::symtab::{Callable, FunctionKind, LookupScope, UserFunction, UserScript};
use super::{Frame, FrameKind, Interpreter, StatementContext, Workspace};
use crate::ast::{FunctionDef, Param};
use crate::value::{AnonymousFunction, FunctionHandle, Object, StructValue, Value, ValueList};
use std::path::{Path, PathBuf};
use std::rc::Rc;

impl Interpreter {
    /// Resolve `name` for a call with `args`
    pub fn lookup_function(&mut self, name: &str, args: &[Value]) -> EvalResult<Option<Callable>> {
        let dispatch_class = args.iter().find_map(|a| match a {
            Value::Object(o) => Some(o.class.clone()),
            _ => None,
        });
        let current_file = self.current_code_file();
        let scope = LookupScope {
            dispatch_class: dispatch_class.as_deref(),
            current_file: current_file.as_deref(),
        };
        if let Some(found) = self.symbols.find_function(name, scope)? {
            return Ok(Some(found));
        }
        if let Some(file) = self.autoload.lookup(name).map(Path::to_path_buf) {
            tracing::debug!(function = name, file = %file.display(), "autoloading");
            return Ok(Some(self.symbols.load_file(&file, Some(name))?.into()));
        }
        Ok(self.symbols.find_on_path(name)?)
    }

    /// File of the function or script whose frame is current
    pub(crate) fn current_code_file(&self) -> Option<PathBuf> {
        self.call_stack.current_frame().file().map(Path::to_path_buf)
    }

    /// Key under which `echo NAME on|off` records its override
    pub(crate) fn echo_key(&mut self, name: &str) -> String {
        let file = match self.lookup_function(name, &[]) {
            Ok(Some(Callable::Function(f))) => f.file.clone(),
            Ok(Some(Callable::Script(s))) => s.file.clone(),
            _ => None,
        };
        echo::file_key(file.as_deref(), name)
    }

    /// Call the function `name`; an unknown name is an undefined-symbol error
    pub fn call_function(&mut self, name: &str, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
        match self.lookup_function(name, args)? {
            Some(callable) => self.call(callable, args, nargout),
            None => {
                self.pending_ignored = None;
                Err(ExecutionError::undefined(name).into())
            }
        }
    }

    /// Invoke a resolved callable; at most `max(nargout, 1)` values come back
    pub(crate) fn call(&mut self, callable: Callable, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
        let ignored = self.pending_ignored.take().unwrap_or_default();
        let mut out = match callable {
            Callable::Builtin(f) => f(self, args, nargout)?,
            Callable::Function(f) => self.execute_user_function(&f, args, nargout, ignored)?,
            Callable::Script(s) => self.execute_user_script(&s, args, nargout)?,
        };
        out.truncate(nargout.max(1));
        Ok(out)
    }

    /// Call a function handle value
    pub fn call_handle(&mut self, handle: &FunctionHandle, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
        match handle {
            FunctionHandle::Named(name) => self.call_function(name, args, nargout),
            FunctionHandle::Anonymous(f) => self.execute_anonymous(f, args, nargout),
        }
    }

    /// Call a string naming a function, or a function handle
    pub fn feval(&mut self, target: &Value, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
        if let Some(h) = target.as_function_handle() {
            let h = Rc::clone(h);
            return self.call_handle(&h, args, nargout);
        }
        match target.as_string() {
            Some(name) => self.call_function(&name, args, nargout),
            None => Err(ExecutionError::general(
                "feval: FUNC must be a string or function handle",
            )
            .into()),
        }
    }

    /// Add the current location of the frame being left to an error's trace
    fn annotate(&self, e: Exception) -> Exception {
        match e {
            Exception::Execution(mut err) => {
                let frame = self.call_stack.current_frame();
                err.push_frame(StackEntry {
                    name: frame.name().to_string(),
                    file: frame
                        .file()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                    line: frame.line,
                    column: frame.column,
                });
                Exception::Execution(err)
            }
            other => other,
        }
    }

    /// Bind parameters, `varargin` and defaults in the callee's frame
    fn bind_parameters(&mut self, params: &[Param], varargin: bool, args: &[Value]) -> EvalResult<()> {
        for (i, p) in params.iter().enumerate() {
            match args.get(i) {
                Some(Value::MagicColon) => match &p.default {
                    Some(d) => {
                        let v = self.eval_operand(d)?;
                        self.assign(&p.name, v);
                    }
                    None => return Err(ExecutionError::no_default_value(i + 1).into()),
                },
                Some(v) => {
                    if !p.is_ignored() {
                        self.assign(&p.name, v.clone());
                    }
                }
                None => {
                    if let Some(d) = &p.default {
                        let v = self.eval_operand(d)?;
                        self.assign(&p.name, v);
                    }
                }
            }
        }
        if varargin {
            let extra = args.get(params.len()..).unwrap_or_default().to_vec();
            self.assign("varargin", Value::cell_row(extra));
        }
        Ok(())
    }

    pub fn execute_user_function(
        &mut self,
        f: &Rc<UserFunction>,
        args: &[Value],
        nargout: usize,
        ignored: Vec<bool>,
    ) -> EvalResult<ValueList> {
        let def = Rc::clone(&f.def);
        let name = f.name.clone();
        if args.len() > def.params.len() && !def.varargin {
            return Err(ExecutionError::general(format!("{name}: function called with too many inputs")).into());
        }
        if nargout > def.outputs.len() && !def.varargout {
            return Err(ExecutionError::general(format!("{name}: function called with too many outputs")).into());
        }

        let mut ws = Workspace::for_function(Rc::clone(&f.persistent));
        ws.nargin = Some(args.len());
        ws.nargout = Some(nargout);
        ws.ignored = ignored;
        let frame = Frame::new(FrameKind::Function(Rc::clone(f)), ws.into_ref());
        let max_depth = self.settings.max_recursion_depth;
        self.call_stack.push(frame, max_depth)?;
        tracing::debug!(function = %name, depth = self.call_stack.size(), "call");

        let saved_context = self.context;
        let saved_in_loop = self.in_loop;
        let saved_typed = self.typed_code;
        let saved_echo = self.echo.snapshot();
        let profiled = self.profiler.is_enabled();
        if profiled {
            self.profiler.enter(&name);
        }
        let profile_name = name.clone();
        let mut g = self.unwind(move |i| {
            if let Some(frame) = i.call_stack.pop() {
                i.restore_knobs(frame.knob_restores);
            }
            i.context = saved_context;
            i.in_loop = saved_in_loop;
            i.typed_code = saved_typed;
            i.echo.restore(saved_echo);
            if profiled {
                i.profiler.exit(&profile_name);
            }
        });

        g.context = StatementContext::Function;
        g.in_loop = false;
        g.typed_code = false;
        if g.echo.mode.is_empty() {
            g.echo.active = false;
        } else {
            let key = echo::file_key(f.file.as_deref(), &name);
            g.echo.enter(EchoMode::FUNCTIONS, &key, def.line);
        }

        let result = g.run_function_body(f, &def, args, nargout);
        result.map_err(|e| g.annotate(e))
    }

    fn run_function_body(
        &mut self,
        f: &UserFunction,
        def: &FunctionDef,
        args: &[Value],
        nargout: usize,
    ) -> EvalResult<ValueList> {
        self.bind_parameters(&def.params, def.varargin, args)?;

        if let FunctionKind::Constructor { class } = &f.kind {
            let Some(out) = def.outputs.first() else {
                return Err(ExecutionError::general(format!(
                    "{class}: invalid constructor, no output argument defined"
                ))
                .into());
            };
            self.assign(
                out,
                Value::Object(Object {
                    class: class.clone(),
                    fields: StructValue::new(),
                }),
            );
        }

        self.exec_list(&def.body)?;
        self.returning = 0;
        self.breaking = self.breaking.saturating_sub(1);

        let mut out = self.collect_outputs(def, nargout)?;
        if let FunctionKind::Constructor { class } = &f.kind
            && let Some(first) = out.first_mut()
            && let Value::Struct(fields) = first
        {
            *first = Value::Object(Object {
                class: class.clone(),
                fields: std::mem::take(fields),
            });
        }
        Ok(out)
    }

    /// Values of the output variables for a call asking for `nargout` values
    fn collect_outputs(&mut self, def: &FunctionDef, nargout: usize) -> EvalResult<ValueList> {
        let varargout = if def.varargout {
            match self.varval("varargout") {
                Some(Value::Cell(c)) => c.into_data(),
                Some(_) => {
                    return Err(ExecutionError::general("varargout must be a cell array object").into());
                }
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        let len = def.outputs.len();
        if len == 0 {
            return Ok(varargout);
        }
        let mut out = Vec::with_capacity(len);
        if nargout <= len {
            // unset outputs before a set one stay as gaps; trailing ones are dropped
            for name in def.outputs.iter().take(nargout.max(1)) {
                out.push(self.varval(name).unwrap_or(Value::Undefined));
            }
            while out.last().is_some_and(|v| !v.is_defined()) {
                out.pop();
            }
        } else {
            for name in &def.outputs {
                match self.varval(name) {
                    Some(v) => out.push(v),
                    None => return Err(ExecutionError::undefined(name).into()),
                }
            }
            out.extend(varargout);
        }
        Ok(out)
    }

    /// Run a script in the caller's workspace
    pub fn execute_user_script(
        &mut self,
        script: &Rc<UserScript>,
        args: &[Value],
        nargout: usize,
    ) -> EvalResult<ValueList> {
        if !args.is_empty() || nargout != 0 {
            let file = script
                .file
                .as_ref()
                .map_or_else(|| script.name.clone(), |p| p.display().to_string());
            return Err(ExecutionError::general(format!("invalid call to script {file}")).into());
        }

        let workspace = Rc::clone(&self.call_stack.current_frame().workspace);
        let frame = Frame::new(FrameKind::Script(Rc::clone(script)), workspace);
        let max_depth = self.settings.max_recursion_depth;
        self.call_stack.push(frame, max_depth)?;
        tracing::debug!(script = %script.name, "run script");

        let saved_context = self.context;
        let saved_typed = self.typed_code;
        let saved_echo = self.echo.snapshot();
        let profiled = self.profiler.is_enabled();
        if profiled {
            self.profiler.enter(&script.name);
        }
        let profile_name = script.name.clone();
        let mut g = self.unwind(move |i| {
            if let Some(frame) = i.call_stack.pop() {
                i.restore_knobs(frame.knob_restores);
            }
            i.context = saved_context;
            i.typed_code = saved_typed;
            i.echo.restore(saved_echo);
            if profiled {
                i.profiler.exit(&profile_name);
            }
        });

        g.context = StatementContext::Script;
        g.typed_code = false;
        if g.echo.mode.is_empty() {
            g.echo.active = false;
        } else {
            let key = echo::file_key(script.file.as_deref(), &script.name);
            g.echo.enter(EchoMode::SCRIPTS, &key, 1);
        }

        let result = g.exec_list(&script.body);
        if let Err(e) = result {
            return Err(g.annotate(e));
        }
        g.returning = 0;
        g.breaking = g.breaking.saturating_sub(1);
        Ok(Vec::new())
    }

    /// Evaluate an anonymous function's body in a fresh frame holding its captures
    pub fn execute_anonymous(
        &mut self,
        f: &AnonymousFunction,
        args: &[Value],
        nargout: usize,
    ) -> EvalResult<ValueList> {
        if args.len() > f.params.len() && !f.varargin {
            return Err(ExecutionError::general("@<anonymous>: function called with too many inputs").into());
        }
        let mut ws = Workspace::new();
        ws.nargin = Some(args.len());
        ws.nargout = Some(nargout);
        let frame = Frame::new(FrameKind::Anonymous, ws.into_ref());
        let max_depth = self.settings.max_recursion_depth;
        self.call_stack.push(frame, max_depth)?;

        let saved_context = self.context;
        let saved_in_loop = self.in_loop;
        let mut g = self.unwind(move |i| {
            i.call_stack.pop();
            i.context = saved_context;
            i.in_loop = saved_in_loop;
        });
        g.context = StatementContext::Function;
        g.in_loop = false;

        for (name, value) in &f.captured {
            g.assign(name, value.clone());
        }
        g.bind_parameters(&f.params, f.varargin, args)?;
        g.evaluate_n(&f.body, nargout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{ErrorKind, SharedBuffer};
    use pretty_assertions::assert_eq;

    fn interp() -> Interpreter {
        Interpreter::new()
            .with_output(SharedBuffer::new())
            .with_error_output(SharedBuffer::new())
    }

    fn num(i: &Interpreter, name: &str) -> Vec<f64> {
        i.varval(name).unwrap().to_numeric().unwrap().into_data()
    }

    fn exec_error(i: &mut Interpreter, code: &str) -> ExecutionError {
        match i.eval_string(code, true, 0) {
            Err(Exception::Execution(e)) => e,
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn test_outputs_truncated_to_nargout() {
        let mut i = interp();
        i.eval_string(
            "function [a, b, varargout] = f()\n a = 1; b = 2; varargout = {3, 4};\nend\n[x, y, z] = f();",
            true,
            0,
        )
        .unwrap();
        assert_eq!(num(&i, "z"), vec![3.0]);
    }

    #[test]
    fn test_ignored_unset_output_leaves_gap() {
        let mut i = interp();
        i.eval_string("function [a, b] = f()\n b = 2;\nend\n[~, y] = f();", true, 0)
            .unwrap();
        assert_eq!(num(&i, "y"), vec![2.0]);

        let e = exec_error(&mut i, "[x, y] = f();");
        assert_eq!(e.message, "element number 1 undefined in return list");
        assert!(i.varval("x").is_none());
    }

    #[test]
    fn test_unset_trailing_output_is_missing() {
        let mut i = interp();
        i.eval_string("function [a, b] = f()\n a = 1;\nend", true, 0).unwrap();
        let e = exec_error(&mut i, "[p, q] = f();");
        assert_eq!(e.message, "element number 2 undefined in return list");
        assert_eq!(num(&i, "p"), vec![1.0]);
    }

    #[test]
    fn test_too_many_inputs() {
        let mut i = interp();
        i.eval_string("function r = g(a)\n r = a;\nend", true, 0).unwrap();
        let e = exec_error(&mut i, "g(1, 2)");
        assert_eq!(e.message, "g: function called with too many inputs");
    }

    #[test]
    fn test_magic_colon_uses_default() {
        let mut i = interp();
        i.eval_string("function r = h(a = 7)\n r = a;\nend\nv = h(:);", true, 0)
            .unwrap();
        assert_eq!(num(&i, "v"), vec![7.0]);
    }

    #[test]
    fn test_magic_colon_without_default() {
        let mut i = interp();
        i.eval_string("function r = k(a)\n r = 1;\nend", true, 0).unwrap();
        let e = exec_error(&mut i, "k(:)");
        assert_eq!(e.kind, ErrorKind::NoDefaultValue);
        assert_eq!(e.message, "no default value for argument 1");
    }

    #[test]
    fn test_recursion_limit() {
        let mut i = interp();
        i.eval_string("function r = inf_rec(n)\n r = inf_rec(n + 1);\nend", true, 0)
            .unwrap();
        let e = exec_error(&mut i, "inf_rec(1)");
        assert_eq!(e.kind, ErrorKind::RecursionLimit);
        assert_eq!(i.call_stack.size(), 1);
    }

    #[test]
    fn test_error_trace_names_function() {
        let mut i = interp();
        i.eval_string("function boom()\n error('bad thing');\nend", true, 0)
            .unwrap();
        let e = exec_error(&mut i, "boom()");
        assert_eq!(e.stack[0].name, "boom");
        assert_eq!(e.stack[0].line, 2);
    }

    #[test]
    fn test_undefined_function() {
        let mut i = interp();
        let e = exec_error(&mut i, "no_such_function_here(1)");
        assert_eq!(e.message, "'no_such_function_here' undefined");
    }
}
