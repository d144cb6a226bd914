//! Printing, errors and warnings, and leaving the interpreter

use super::format::{format, template_text};
use super::{check_nargin, invalid_call, none, one, string_arg};
use crate::interp::{EvalResult, Exception, ExecutionError, Interpreter, StackEntry, SymbolTable};
use crate::value::display::disp;
use crate::value::{Value, ValueList};

pub(super) fn install(symbols: &mut SymbolTable) {
    symbols.install_builtin("disp", builtin_disp);
    symbols.install_builtin("display", builtin_display);
    symbols.install_builtin("fdisp", builtin_fdisp);
    symbols.install_builtin("puts", builtin_puts);
    symbols.install_builtin("fputs", builtin_fputs);
    symbols.install_builtin("printf", builtin_printf);
    symbols.install_builtin("fprintf", builtin_fprintf);
    symbols.install_builtin("sprintf", builtin_sprintf);
    symbols.install_builtin("error", builtin_error);
    symbols.install_builtin("warning", builtin_warning);
    symbols.install_builtin("lasterr", builtin_lasterr);
    symbols.install_builtin("rethrow", builtin_rethrow);
    symbols.install_builtin("exit", builtin_exit);
    symbols.install_builtin("quit", builtin_exit);
}

/// Stream numbers accepted by `fprintf` and friends
enum Stream {
    Out,
    Err,
}

fn stream_arg(who: &str, v: &Value) -> EvalResult<Stream> {
    match v.scalar_value() {
        Ok(1.0) => Ok(Stream::Out),
        Ok(2.0) => Ok(Stream::Err),
        Ok(n) => Err(ExecutionError::general(format!("{who}: invalid stream number = {n}")).into()),
        Err(_) => Err(ExecutionError::general(format!("{who}: invalid stream number")).into()),
    }
}

fn write_stream(interp: &mut Interpreter, stream: Stream, text: &str) {
    match stream {
        Stream::Out => interp.write_out(text),
        Stream::Err => interp.write_err(text),
    }
}

// ============================================================================
// Printing
// ============================================================================

fn builtin_disp(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    check_nargin("disp", args, 1, 1)?;
    let text = disp(&args[0], &interp.display_options());
    if nargout > 0 {
        return one(text);
    }
    interp.write_out(&text);
    none()
}

fn builtin_display(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("display", args, 1, 1)?;
    let text = disp(&args[0], &interp.display_options());
    interp.write_out(&text);
    none()
}

fn builtin_fdisp(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("fdisp", args, 2, 2)?;
    let stream = stream_arg("fdisp", &args[0])?;
    let text = disp(&args[1], &interp.display_options());
    write_stream(interp, stream, &text);
    none()
}

fn builtin_puts(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("puts", args, 1, 1)?;
    let text = string_arg("puts", args, 0, "STRING")?;
    interp.write_out(&text);
    none()
}

fn builtin_fputs(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("fputs", args, 2, 2)?;
    let stream = stream_arg("fputs", &args[0])?;
    let text = string_arg("fputs", args, 1, "STRING")?;
    write_stream(interp, stream, &text);
    none()
}

fn format_args(who: &str, args: &[Value]) -> EvalResult<String> {
    let Some(template) = args.first() else {
        return Err(invalid_call(who));
    };
    let template = template_text(template)
        .ok_or_else(|| ExecutionError::general(format!("{who}: format TEMPLATE must be a string")))?;
    Ok(format(who, &template, &args[1..])?)
}

fn builtin_printf(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    let text = format_args("printf", args)?;
    interp.write_out(&text);
    none()
}

fn builtin_fprintf(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    let (stream, rest) = match args.first() {
        None => return Err(invalid_call("fprintf")),
        Some(first) if first.is_string() => (Stream::Out, args),
        Some(first) => (stream_arg("fprintf", first)?, &args[1..]),
    };
    let text = if rest.is_empty() {
        String::new()
    } else {
        format_args("fprintf", rest)?
    };
    write_stream(interp, stream, &text);
    if nargout > 0 {
        return one(text.len() as f64);
    }
    none()
}

fn builtin_sprintf(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    one(format_args("sprintf", args)?)
}

// ============================================================================
// Errors and warnings
// ============================================================================

/// Whether `s` has the shape of a message identifier such as `Octave:some-id`
fn looks_like_identifier(s: &str) -> bool {
    !s.contains(['%', ' ', '\x0c', '\n', '\r', '\t', '\x0b'])
        && s.contains(':')
        && !s.starts_with(':')
        && !s.ends_with(':')
}

/// Split `(id, fmt, args...)` into identifier and formatted message
///
/// A lone argument is used literally; with more arguments the first may be
/// an identifier and the rest are formatted like `sprintf`.
fn message_and_id(who: &str, args: &[Value]) -> EvalResult<(String, Option<String>)> {
    let first = args.first().and_then(Value::as_string);
    if args.len() == 1 {
        let Some(text) = first else {
            return Err(ExecutionError::general(format!("{who}: MSG must be a string")).into());
        };
        if looks_like_identifier(&text) {
            return Ok((
                String::new(),
                Some(format!(
                    "call to {who} with message identifier '{text}' requires message"
                )),
            ));
        }
        return Ok((String::new(), Some(text)));
    }
    let (id, rest) = match first {
        Some(text) if looks_like_identifier(&text) => (text, &args[1..]),
        _ => (String::new(), args),
    };
    if rest.is_empty() {
        return Ok((id, None));
    }
    Ok((id, Some(format_args(who, rest)?)))
}

fn builtin_error(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    if args.is_empty() {
        return Err(invalid_call("error"));
    }
    if let [Value::Struct(s)] = args {
        let message = s.get("message").and_then(Value::as_string).unwrap_or_default();
        if message.is_empty() {
            return none();
        }
        let id = s.get("identifier").and_then(Value::as_string).unwrap_or_default();
        let mut err = ExecutionError::user(&id, message);
        err.stack = stack_entries(s.get("stack"));
        return Err(err.into());
    }
    let (id, message) = message_and_id("error", args)?;
    let message = message.unwrap_or_else(|| "unspecified error".to_string());
    tracing::debug!(id = %id, "error raised");
    Err(ExecutionError::user(&id, message).into())
}

fn builtin_warning(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    let first = args.first().and_then(Value::as_string);
    match (first.as_deref(), args.len()) {
        (None, 0) => {
            let text = if interp.errors.warning_enabled("all") {
                "By default, warnings are enabled.\n"
            } else {
                "By default, warnings are disabled.\n"
            };
            interp.write_out(text);
            none()
        }
        (Some(state @ ("on" | "off")), 1 | 2) => {
            let id = match args.get(1) {
                Some(v) => v
                    .as_string()
                    .ok_or_else(|| ExecutionError::general("warning: ID must be a string"))?,
                None => "all".to_string(),
            };
            interp.errors.set_warning_enabled(&id, state == "on");
            none()
        }
        (Some("query"), 2) => {
            let id = string_arg("warning", args, 1, "ID")?;
            let state = if interp.errors.warning_enabled(&id) { "on" } else { "off" };
            if nargout > 0 {
                let mut s = crate::value::StructValue::new();
                s.set("identifier", Value::string(&id));
                s.set("state", Value::string(state));
                return one(s);
            }
            interp.write_out(&format!("\"{id}\" warning state is \"{state}\"\n"));
            none()
        }
        _ => {
            let (id, message) = message_and_id("warning", args)?;
            let message = message.unwrap_or_else(|| "unspecified warning".to_string());
            if !message.is_empty() {
                interp.warning(&id, &message);
            }
            none()
        }
    }
}

fn builtin_lasterr(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    check_nargin("lasterr", args, 0, 2)?;
    let message = interp.errors.last_error_message().to_string();
    let id = interp
        .errors
        .last_error
        .as_ref()
        .map(|e| e.identifier.clone())
        .unwrap_or_default();
    if let Some(new) = args.first() {
        let text = new
            .as_string()
            .ok_or_else(|| ExecutionError::general("lasterr: MSG must be a string"))?;
        let new_id = match args.get(1) {
            Some(v) => v
                .as_string()
                .ok_or_else(|| ExecutionError::general("lasterr: ID must be a string"))?,
            None => String::new(),
        };
        interp.errors.last_error = Some(ExecutionError::user(&new_id, text));
    }
    let mut out = vec![Value::string(&message)];
    if nargout > 1 {
        out.push(Value::string(&id));
    }
    Ok(out)
}

/// Trace entries stored in an error struct's `stack` field
fn stack_entries(stack: Option<&Value>) -> Vec<StackEntry> {
    let Some(Value::Struct(s)) = stack else {
        return Vec::new();
    };
    let text = |name: &str| s.get(name).and_then(Value::as_string).unwrap_or_default();
    let number = |name: &str| s.get(name).and_then(|v| v.index_value().ok()).unwrap_or(0);
    let name = text("name");
    if name.is_empty() {
        return Vec::new();
    }
    vec![StackEntry {
        name,
        file: text("file"),
        line: number("line"),
        column: number("column"),
    }]
}

fn builtin_rethrow(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("rethrow", args, 1, 1)?;
    let Value::Struct(s) = &args[0] else {
        return Err(ExecutionError::general("rethrow: ERR must be a struct").into());
    };
    let (Some(message), Some(id)) = (s.get("message"), s.get("identifier")) else {
        return Err(ExecutionError::general(
            "rethrow: ERR must contain the fields 'message' and 'identifier'",
        )
        .into());
    };
    let mut err = ExecutionError::user(
        &id.as_string().unwrap_or_default(),
        message.as_string().unwrap_or_default(),
    );
    err.stack = stack_entries(s.get("stack"));
    Err(err.into())
}

// ============================================================================
// Leaving
// ============================================================================

fn builtin_exit(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("exit", args, 0, 2)?;
    let status = match args.first() {
        None => 0,
        Some(v) => {
            let x = v
                .scalar_value()
                .map_err(|_| ExecutionError::general("exit: STATUS must be an integer"))?;
            if x.fract() != 0.0 {
                return Err(ExecutionError::general("exit: STATUS must be an integer").into());
            }
            x as i32
        }
    };
    tracing::debug!(status, "exit requested");
    Err(Exception::Exit(status))
}

#[cfg(test)]
mod tests {
    use crate::interp::{Exception, Interpreter, SharedBuffer};
    use pretty_assertions::assert_eq;

    fn session() -> (Interpreter, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let interp = Interpreter::new()
            .with_output(out.clone())
            .with_error_output(err.clone());
        (interp, out, err)
    }

    fn error_of(interp: &mut Interpreter, code: &str) -> crate::interp::ExecutionError {
        match interp.eval_string(code, true, 0) {
            Err(Exception::Execution(e)) => e,
            other => panic!("expected an execution error, got {other:?}"),
        }
    }

    // ====================================================================
    // Printing
    // ====================================================================

    #[test]
    fn test_printf_and_disp() {
        let (mut interp, out, _) = session();
        interp.eval_string("printf('%d-%s\\n', 4, 'x'); disp(7)", true, 0).unwrap();
        assert_eq!(out.contents(), "4-x\n7\n");
    }

    #[test]
    fn test_fprintf_to_stderr_and_sprintf() {
        let (mut interp, out, err) = session();
        interp.eval_string("fprintf(2, 'oops\\n'); s = sprintf('%5.1f', pi);", true, 0).unwrap();
        assert_eq!(err.contents(), "oops\n");
        assert_eq!(out.contents(), "");
        assert_eq!(interp.varval("s").unwrap().as_string().unwrap(), "  3.1");
    }

    // ====================================================================
    // Errors
    // ====================================================================

    #[test]
    fn test_error_with_identifier_and_format() {
        let (mut interp, _, _) = session();
        let e = error_of(&mut interp, "error('my:id', 'value %d too big', 5)");
        assert_eq!(e.identifier, "my:id");
        assert_eq!(e.message, "value 5 too big");
    }

    #[test]
    fn test_single_argument_error_is_literal() {
        let (mut interp, _, _) = session();
        let e = error_of(&mut interp, "error('50% done')");
        assert_eq!(e.message, "50% done");
        let e = error_of(&mut interp, "error('Octave:some-id')");
        assert_eq!(
            e.message,
            "call to error with message identifier 'Octave:some-id' requires message"
        );
    }

    #[test]
    fn test_rethrow_and_lasterr() {
        let (mut interp, _, _) = session();
        interp
            .eval_string("try\n  error('a:b', 'first');\ncatch err\nend", true, 0)
            .unwrap();
        let e = error_of(&mut interp, "rethrow(err)");
        assert_eq!((e.identifier.as_str(), e.message.as_str()), ("a:b", "first"));
        let v = interp.eval_string("lasterr()", true, 1).unwrap();
        assert_eq!(v[0].as_string().unwrap(), "first");
    }

    #[test]
    fn test_warning_can_be_disabled_by_id() {
        let (mut interp, _, err) = session();
        interp
            .eval_string("warning('my:w', 'careful'); warning('off', 'my:w'); warning('my:w', 'hidden')", true, 0)
            .unwrap();
        assert_eq!(err.contents(), "warning: careful\n");
    }

    #[test]
    fn test_exit_status() {
        let (mut interp, _, _) = session();
        assert!(matches!(interp.eval_string("exit(3)", true, 0), Err(Exception::Exit(3))));
        assert!(matches!(interp.eval_string("quit", true, 0), Err(Exception::Exit(0))));
    }
}
