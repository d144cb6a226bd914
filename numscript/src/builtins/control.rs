//! Internal variables, echo, autoload and the profiler

use super::{check_nargin, none, one, string_arg, string_args};
use crate::interp::{
    EchoMode, EvalResult, ExecutionError, FrameKind, Interpreter, Knob, SymbolTable, echo_file_key,
    resolve_file,
};
use crate::value::{Array, StructValue, Value, ValueList};

pub(super) fn install(symbols: &mut SymbolTable) {
    symbols.install_builtin("max_recursion_depth", builtin_max_recursion_depth);
    symbols.install_builtin("silent_functions", builtin_silent_functions);
    symbols.install_builtin("string_fill_char", builtin_string_fill_char);
    symbols.install_builtin("PS4", builtin_ps4);
    symbols.install_builtin("print_empty_dimensions", builtin_print_empty_dimensions);
    symbols.install_builtin("echo", builtin_echo);
    symbols.install_builtin("autoload", builtin_autoload);
    symbols.install_builtin("profile", builtin_profile);
}

// ============================================================================
// Internal variables
// ============================================================================

fn builtin_max_recursion_depth(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    interp.set_internal_variable(Knob::MaxRecursionDepth, args, nargout)
}

fn builtin_silent_functions(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    interp.set_internal_variable(Knob::SilentFunctions, args, nargout)
}

fn builtin_string_fill_char(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    interp.set_internal_variable(Knob::StringFillChar, args, nargout)
}

fn builtin_ps4(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    interp.set_internal_variable(Knob::Ps4, args, nargout)
}

fn builtin_print_empty_dimensions(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    interp.set_internal_variable(Knob::PrintEmptyDimensions, args, nargout)
}

// ============================================================================
// echo
// ============================================================================

/// `echo`, `echo on|off`, `echo on all`, `echo off all`, `echo FCN on|off`
fn builtin_echo(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    if nargout > 0 {
        return Err(super::invalid_call("echo"));
    }
    let words: Vec<String> = string_args("echo", args)?
        .into_iter()
        .map(|w| match w.as_str() {
            "on" | "off" | "all" => w,
            name => interp.echo_key(name),
        })
        .collect();
    interp
        .echo
        .command(&words)
        .map_err(ExecutionError::general)?;

    // code that is already running starts or stops echoing at its next line
    let frame = interp.call_stack.current_frame();
    let kind = match &frame.kind {
        FrameKind::Function(_) => Some(EchoMode::FUNCTIONS),
        FrameKind::Script(_) => Some(EchoMode::SCRIPTS),
        _ => None,
    };
    if let Some(kind) = kind {
        let key = echo_file_key(frame.file(), frame.name());
        let next_line = frame.line + 1;
        interp.echo.enter(kind, &key, next_line);
    }
    none()
}

// ============================================================================
// autoload
// ============================================================================

/// `autoload()`, `autoload(fcn, file)`, `autoload(fcn, file, "remove")`
fn builtin_autoload(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("autoload", args, 0, 3)?;
    if args.is_empty() {
        let entries: Vec<Value> = interp
            .autoload
            .iter()
            .map(|(function, file)| {
                Value::from(StructValue::from_iter([
                    ("function", Value::string(function)),
                    ("file", Value::string(&file.display().to_string())),
                ]))
            })
            .collect();
        return one(Value::Cell(Array::column(entries)));
    }
    if args.len() == 1 {
        return Err(super::invalid_call("autoload"));
    }
    let function = string_arg("autoload", args, 0, "FCN_NAME")?;
    let file = string_arg("autoload", args, 1, "FILE")?;

    let caller = interp.current_code_file();
    let resolved = resolve_file(&file, caller.as_deref());
    if resolved.relative {
        interp.warning(
            "Octave:autoload-relative-file-name",
            &format!("autoload: '{file}' is not an absolute filename"),
        );
    }

    if args.len() == 3 {
        let opt = string_arg("autoload", args, 2, "OPT")?;
        if opt != "remove" {
            return Err(ExecutionError::general("autoload: third argument can only be 'remove'").into());
        }
        interp.autoload.remove(&function);
        interp.symbols.clear_function(&function);
        return none();
    }
    interp.autoload.add(&function, resolved.path);
    none()
}

// ============================================================================
// profile
// ============================================================================

/// `profile on|off|resume|clear|status|info`
fn builtin_profile(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("profile", args, 1, 1)?;
    let option = string_arg("profile", args, 0, "OPTION")?;
    match option.as_str() {
        "on" => interp.profiler.start(),
        "off" => interp.profiler.stop(),
        "resume" => interp.profiler.resume(),
        "clear" => interp.profiler.clear(),
        "status" => {
            return one(if interp.profiler.is_enabled() { "on" } else { "off" });
        }
        "info" => return one(interp.profiler.info()),
        other => {
            return Err(ExecutionError::general(format!("profile: Unrecognized option '{other}'")).into());
        }
    }
    tracing::debug!(option = %option, "profiler");
    none()
}

#[cfg(test)]
mod tests {
    use crate::interp::{EchoMode, Interpreter, Settings, SharedBuffer};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_knob_returns_old_value() {
        let mut interp = Interpreter::new();
        let old = interp.eval_string("max_recursion_depth(50)", true, 1).unwrap();
        assert_eq!(old[0].scalar_value().unwrap(), 256.0);
        assert_eq!(interp.settings.max_recursion_depth, 50);
    }

    #[test]
    fn test_local_knob_restored_after_return() {
        let mut interp = Interpreter::new();
        interp
            .eval_string(
                "function f()\n  silent_functions(true, 'local');\nend\nf();",
                true,
                0,
            )
            .unwrap();
        assert!(!interp.settings.silent_functions);
    }

    #[test]
    fn test_echo_commands_change_mode() {
        let mut interp = Interpreter::new();
        interp.eval_string("echo on all", true, 0).unwrap();
        assert!(interp.echo.mode.contains(EchoMode::all()));
        interp.eval_string("echo off all", true, 0).unwrap();
        assert!(interp.echo.mode.is_empty());
        interp.eval_string("echo on", true, 0).unwrap();
        assert_eq!(interp.echo.mode, EchoMode::SCRIPTS);
        let err = interp.eval_string("echo a b c", true, 0).unwrap_err();
        assert!(matches!(err, crate::interp::Exception::Execution(e) if e.message == "Invalid call to echo"));
    }

    #[test]
    fn test_echo_override_keyed_by_file() {
        let dir = std::env::temp_dir().join(format!("numscript-echo-key-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("echoed.m");
        std::fs::write(&file, "function echoed()\nend\n").unwrap();

        let settings = Settings {
            path: vec![dir.clone()],
            ..Settings::default()
        };
        let mut interp = Interpreter::with_settings(settings);
        interp.eval_string("echo echoed on", true, 0).unwrap();
        let key = std::path::absolute(&file).unwrap().display().to_string();
        assert!(interp.echo.echo_this_file(&key, EchoMode::FUNCTIONS));
        assert!(!interp.echo.echo_this_file("echoed", EchoMode::FUNCTIONS));

        interp.eval_string("function typed()\nend", true, 0).unwrap();
        interp.eval_string("echo typed on", true, 0).unwrap();
        assert!(interp.echo.echo_this_file("typed", EchoMode::FUNCTIONS));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_autoload_relative_name_warns_and_lists() {
        let err = SharedBuffer::new();
        let mut interp = Interpreter::new().with_error_output(err.clone());
        interp
            .eval_string("autoload('later_fn', 'no_such_dir/later_fn.m');", true, 0)
            .unwrap();
        assert_eq!(
            err.contents(),
            "warning: autoload: 'no_such_dir/later_fn.m' is not an absolute filename\n"
        );
        let list = interp.eval_string("autoload()", true, 1).unwrap();
        assert_eq!(list[0].numel(), 1);
        interp
            .eval_string("autoload('later_fn', 'no_such_dir/later_fn.m', 'remove');", true, 0)
            .unwrap();
        assert!(interp.autoload.is_empty());
    }

    #[test]
    fn test_profile_counts_calls() {
        let mut interp = Interpreter::new();
        interp
            .eval_string("function z()\nend\nprofile on\nz(); z();\nprofile off", true, 0)
            .unwrap();
        assert_eq!(interp.profiler.stats("z").unwrap().calls, 2);
        let status = interp.eval_string("profile('status')", true, 1).unwrap();
        assert_eq!(status[0].as_string().unwrap(), "off");
    }
}
