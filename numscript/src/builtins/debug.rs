//! Debugger commands

use super::{check_nargin, count_arg, invalid_call, none, one, string_arg};
use crate::interp::{
    Callable, DEBUG_PROMPT, EvalResult, ExecutionError, Interpreter, Step, SymbolTable,
};
use crate::value::{Array, StructValue, Value, ValueList};
use std::path::PathBuf;

pub(super) fn install(symbols: &mut SymbolTable) {
    symbols.install_builtin("dbstop", builtin_dbstop);
    symbols.install_builtin("dbclear", builtin_dbclear);
    symbols.install_builtin("dbstatus", builtin_dbstatus);
    symbols.install_builtin("dbstep", builtin_dbstep);
    symbols.install_builtin("dbnext", builtin_dbstep);
    symbols.install_builtin("dbcont", builtin_dbcont);
    symbols.install_builtin("dbquit", builtin_dbquit);
    symbols.install_builtin("dbup", builtin_dbup);
    symbols.install_builtin("dbdown", builtin_dbdown);
    symbols.install_builtin("dbstack", builtin_dbstack);
    symbols.install_builtin("dbwhere", builtin_dbwhere);
    symbols.install_builtin("keyboard", builtin_keyboard);
    symbols.install_builtin("isdebugmode", builtin_isdebugmode);
}

// ============================================================================
// Breakpoint locations
// ============================================================================

/// Words of a breakpoint command, from either call form
fn location_words(who: &str, args: &[Value]) -> EvalResult<Vec<String>> {
    let mut words = Vec::new();
    for arg in args {
        if let Some(s) = arg.as_string() {
            words.extend(s.split_whitespace().map(str::to_string));
        } else {
            let nums = arg
                .to_numeric()
                .map_err(|_| ExecutionError::general(format!("{who}: invalid argument")))?;
            words.extend(nums.data().iter().map(|n| format!("{n}")));
        }
    }
    Ok(words)
}

#[derive(Debug, Default, PartialEq)]
struct Location {
    name: Option<String>,
    lines: Vec<usize>,
    condition: Option<String>,
}

/// `[in] NAME [at] LINE... [if COND]`
fn parse_location(who: &str, words: &[String]) -> EvalResult<Location> {
    let mut loc = Location::default();
    let mut rest = words;
    if let [first, tail @ ..] = rest
        && first == "in"
    {
        rest = tail;
    }
    if let [first, tail @ ..] = rest
        && first.parse::<f64>().is_err()
        && first != "if"
    {
        loc.name = Some(first.clone());
        rest = tail;
    }
    if let [first, tail @ ..] = rest
        && first == "at"
    {
        rest = tail;
    }
    while let [first, tail @ ..] = rest {
        let Ok(n) = first.parse::<f64>() else { break };
        if n < 1.0 || n.fract() != 0.0 {
            return Err(ExecutionError::general(format!("{who}: invalid line number '{first}'")).into());
        }
        loc.lines.push(n as usize);
        rest = tail;
    }
    if let [first, tail @ ..] = rest
        && first == "if"
    {
        rest = tail;
    }
    if !rest.is_empty() {
        loc.condition = Some(rest.join(" "));
    }
    Ok(loc)
}

/// Name of the function the debugger is stopped in, for a location without one
fn current_function_name(interp: &Interpreter) -> Option<String> {
    if !interp.in_debug_repl() {
        return None;
    }
    interp.call_stack.current_user_frame().map(|f| f.name().to_string())
}

fn function_file(interp: &mut Interpreter, name: &str) -> Option<PathBuf> {
    match interp.lookup_function(name, &[]).ok()?? {
        Callable::Function(f) => f.file.clone(),
        Callable::Script(s) => s.file.clone(),
        Callable::Builtin(_) => None,
    }
}

// ============================================================================
// dbstop / dbclear / dbstatus
// ============================================================================

/// `dbstop in NAME at LINE if COND`, `dbstop(NAME, LINE, ...)`
fn builtin_dbstop(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    if args.is_empty() {
        return Err(invalid_call("dbstop"));
    }
    let words = location_words("dbstop", args)?;
    let loc = parse_location("dbstop", &words)?;
    let Some(name) = loc.name.or_else(|| current_function_name(interp)) else {
        return Err(invalid_call("dbstop"));
    };

    let not_found = || ExecutionError::general(format!("dbstop: unable to find function '{name}'"));
    let target = interp.lookup_function(&name, &[])?.ok_or_else(not_found)?;
    let lines = if loc.lines.is_empty() { vec![1] } else { loc.lines };

    let mut set = Vec::new();
    match target {
        Callable::Function(f) => {
            for line in lines {
                set.extend(interp.breakpoints.add(&name, &f.def.body, line, loc.condition.clone()));
            }
        }
        Callable::Script(s) => {
            for line in lines {
                set.extend(interp.breakpoints.add(&name, &s.body, line, loc.condition.clone()));
            }
        }
        Callable::Builtin(_) => return Err(not_found().into()),
    }
    interp.reset_debug_state();
    one(Value::row(set.into_iter().map(|l| l as f64).collect()))
}

/// `dbclear all`, `dbclear NAME`, `dbclear in NAME at LINE`
fn builtin_dbclear(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    let words = location_words("dbclear", args)?;
    if words.first().is_some_and(|w| w == "all") {
        interp.breakpoints.clear();
        interp.reset_debug_state();
        return none();
    }
    let loc = parse_location("dbclear", &words)?;
    let Some(name) = loc.name.or_else(|| current_function_name(interp)) else {
        return Err(invalid_call("dbclear"));
    };
    if loc.lines.is_empty() {
        interp.breakpoints.remove_all_in(&name);
    } else {
        for line in loc.lines {
            interp.breakpoints.remove(&name, line);
        }
    }
    interp.reset_debug_state();
    none()
}

/// `dbstatus [NAME]`
fn builtin_dbstatus(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    check_nargin("dbstatus", args, 0, 1)?;
    let filter = match args.first() {
        Some(_) => Some(string_arg("dbstatus", args, 0, "FUNC")?),
        None => None,
    };
    let list: Vec<_> = interp
        .breakpoints
        .list()
        .into_iter()
        .filter(|(name, _)| filter.as_ref().is_none_or(|f| f == name))
        .collect();

    if nargout > 0 {
        let mut entries = Vec::new();
        for (name, bps) in list {
            let file = function_file(interp, &name)
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            for bp in bps {
                entries.push(Value::from(StructValue::from_iter([
                    ("name", Value::string(&name)),
                    ("file", Value::string(&file)),
                    ("line", Value::scalar(bp.line as f64)),
                    ("cond", Value::string(bp.condition.as_deref().unwrap_or(""))),
                ])));
            }
        }
        return one(Value::Cell(Array::column(entries)));
    }

    let mut text = String::new();
    for (name, bps) in list {
        let lines: Vec<String> = bps
            .iter()
            .map(|bp| match &bp.condition {
                Some(cond) => format!("{} if {cond}", bp.line),
                None => bp.line.to_string(),
            })
            .collect();
        let plural = if lines.len() == 1 { "" } else { "s" };
        text.push_str(&format!(
            "breakpoint{plural} in {name} at line{plural} {}\n",
            lines.join(" ")
        ));
    }
    interp.write_out(&text);
    none()
}

// ============================================================================
// Moving through a paused program
// ============================================================================

/// `dbstep`, `dbstep N`, `dbstep in`, `dbstep out`
fn builtin_dbstep(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("dbstep", args, 0, 1)?;
    let step = match args.first() {
        None => Step::Count(1),
        Some(arg) => match arg.as_string().as_deref() {
            Some("in") => Step::In,
            Some("out") => Step::Out,
            Some(word) => match word.parse::<usize>() {
                Ok(n) if n > 0 => Step::Count(n),
                _ => return Err(invalid_call("dbstep")),
            },
            None => Step::Count(count_arg("dbstep", args, 0)?),
        },
    };
    interp.dbstep(step)?;
    none()
}

fn builtin_dbcont(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("dbcont", args, 0, 0)?;
    interp.dbcont()?;
    none()
}

fn builtin_dbquit(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("dbquit", args, 0, 0)?;
    interp.dbquit()?;
    none()
}

fn dbupdown(interp: &mut Interpreter, who: &str, args: &[Value], sign: isize) -> EvalResult<ValueList> {
    check_nargin(who, args, 0, 1)?;
    if !interp.in_debug_repl() {
        return Err(ExecutionError::general(format!("{who}: can only be called in debug mode")).into());
    }
    let n = match args.first() {
        Some(arg) => match arg.as_string() {
            Some(s) => s.parse::<usize>().map_err(|_| invalid_call(who))?,
            None => count_arg(who, args, 0)?,
        },
        None => 1,
    };
    interp.dbupdown(sign * n as isize);
    let msg = interp.stopped_in_message();
    interp.write_out(&msg);
    none()
}

/// `dbup [N]`: toward the caller
fn builtin_dbup(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    dbupdown(interp, "dbup", args, -1)
}

/// `dbdown [N]`: back toward the innermost frame
fn builtin_dbdown(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    dbupdown(interp, "dbdown", args, 1)
}

/// `dbstack [N]`: the user-code frames, innermost first, skipping N of them
fn builtin_dbstack(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    check_nargin("dbstack", args, 0, 1)?;
    let skip = match args.first() {
        Some(_) => count_arg("dbstack", args, 0)?,
        None => 0,
    };
    let current = interp.call_stack.current_index();
    let frames: Vec<(bool, String, usize, usize, Option<String>)> = (1..=interp.call_stack.top_index())
        .rev()
        .filter_map(|i| interp.call_stack.frame(i).map(|f| (i, f)))
        .filter(|(_, f)| f.is_user_code())
        .skip(skip)
        .map(|(i, f)| {
            (
                i == current,
                f.name().to_string(),
                f.line,
                f.column,
                f.file().map(|p| p.display().to_string()),
            )
        })
        .collect();

    if nargout > 0 {
        let entries = frames
            .into_iter()
            .map(|(_, name, line, column, file)| {
                Value::from(StructValue::from_iter([
                    ("file", Value::string(file.as_deref().unwrap_or(""))),
                    ("name", Value::string(&name)),
                    ("line", Value::scalar(line as f64)),
                    ("column", Value::scalar(column as f64)),
                ]))
            })
            .collect();
        return one(Value::Cell(Array::column(entries)));
    }
    if frames.is_empty() {
        return none();
    }

    let width = frames.iter().map(|f| f.1.len()).max().unwrap_or(0);
    let mut text = String::from("stopped in:\n\n");
    for (is_current, name, line, _, file) in frames {
        let marker = if is_current { "  --> " } else { "      " };
        text.push_str(&format!("{marker}{name:>width$} at line {line}"));
        if let Some(file) = file {
            text.push_str(&format!(" [{file}]"));
        }
        text.push('\n');
    }
    interp.write_out(&text);
    none()
}

fn builtin_dbwhere(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("dbwhere", args, 0, 0)?;
    let msg = interp.stopped_in_message();
    interp.write_out(&msg);
    none()
}

/// `keyboard`, `keyboard(PROMPT)`
fn builtin_keyboard(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("keyboard", args, 0, 1)?;
    let prompt = match args.first() {
        Some(_) => string_arg("keyboard", args, 0, "PROMPT")?,
        None => DEBUG_PROMPT.to_string(),
    };
    interp.enter_debugger(&prompt)?;
    none()
}

fn builtin_isdebugmode(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("isdebugmode", args, 0, 0)?;
    one(interp.in_debug_repl())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{Exception, ScriptedInput, SharedBuffer};
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "function r = f(x)\n  y = x + 1;\n  r = y * 2;\nend\n";

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn interp_with(lines: &[&str]) -> (Interpreter, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let mut interp = Interpreter::new()
            .with_output(out.clone())
            .with_error_output(err.clone())
            .with_input(ScriptedInput::new(lines.iter().copied()));
        interp.eval_string(SOURCE, true, 0).unwrap();
        (interp, out, err)
    }

    // ========================================================================
    // Location parsing
    // ========================================================================

    #[test]
    fn test_parse_command_form() {
        let loc = parse_location("dbstop", &words("in f at 3 if x > 2")).unwrap();
        assert_eq!(
            loc,
            Location {
                name: Some("f".to_string()),
                lines: vec![3],
                condition: Some("x > 2".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_function_form() {
        let loc = parse_location("dbstop", &words("f 2 3")).unwrap();
        assert_eq!(loc.name.as_deref(), Some("f"));
        assert_eq!(loc.lines, vec![2, 3]);
        assert_eq!(loc.condition, None);
    }

    #[test]
    fn test_parse_bad_line() {
        assert!(parse_location("dbstop", &words("f 0")).is_err());
    }

    // ========================================================================
    // Breakpoint table commands
    // ========================================================================

    #[test]
    fn test_dbstop_snaps_and_dbstatus_lists() {
        let (mut interp, out, _) = interp_with(&[]);
        let set = interp.eval_string("dbstop('f', 1)", true, 1).unwrap();
        assert_eq!(set[0].scalar_value().unwrap(), 2.0);
        interp.eval_string("dbstop in f at 3 if x > 5", true, 0).unwrap();
        interp.eval_string("dbstatus", true, 0).unwrap();
        assert_eq!(out.contents(), "breakpoints in f at lines 2 3 if x > 5\n");

        let status = interp.eval_string("dbstatus", true, 1).unwrap();
        assert_eq!(status[0].numel(), 2);
    }

    #[test]
    fn test_dbstop_unknown_function() {
        let (mut interp, _, _) = interp_with(&[]);
        let err = interp.eval_string("dbstop no_such_fn", true, 0).unwrap_err();
        assert_eq!(err.to_string(), "dbstop: unable to find function 'no_such_fn'");
    }

    #[test]
    fn test_dbclear_forms() {
        let (mut interp, _, _) = interp_with(&[]);
        interp.eval_string("dbstop f 2 3", true, 0).unwrap();
        interp.eval_string("dbclear in f at 2", true, 0).unwrap();
        assert_eq!(interp.breakpoints.lines("f"), vec![3]);
        interp.eval_string("dbclear all", true, 0).unwrap();
        assert!(!interp.breakpoints.have_breakpoints());
        assert!(!interp.debug_mode());
    }

    // ========================================================================
    // Pausing
    // ========================================================================

    #[test]
    fn test_breakpoint_pauses_and_continues() {
        let (mut interp, out, err) = interp_with(&["y", "dbcont"]);
        interp.eval_string("dbstop in f at 3", true, 0).unwrap();
        let r = interp.eval_string("z = f(1);", true, 0);
        assert!(r.is_ok());
        assert!(err.contents().contains("stopped in f at line 3"));
        assert!(out.contents().contains("y = 2"));
        assert_eq!(interp.call_stack.varval("z").unwrap().scalar_value().unwrap(), 4.0);
    }

    #[test]
    fn test_false_condition_does_not_pause() {
        let (mut interp, _, err) = interp_with(&[]);
        interp.eval_string("dbstop in f at 3 if x > 5", true, 0).unwrap();
        interp.eval_string("z = f(1);", true, 0).unwrap();
        assert_eq!(err.contents(), "");
    }

    #[test]
    fn test_dbstep_runs_one_statement() {
        let (mut interp, out, _) = interp_with(&["dbstep", "y", "dbcont"]);
        interp.eval_string("dbstop f 2", true, 0).unwrap();
        interp.eval_string("f(4);", true, 0).unwrap();
        assert!(out.contents().contains("y = 5"));
    }

    #[test]
    fn test_nested_pause_returns_to_outer_prompt() {
        let (mut interp, out, err) = interp_with(&["keyboard", "q = 7;", "dbcont", "q", "dbcont"]);
        interp.eval_string("dbstop f 2", true, 0).unwrap();
        interp.eval_string("z = f(1);", true, 0).unwrap();
        let err = err.contents();
        assert_eq!(err.matches("stopped in f at line 2").count(), 2);
        assert!(!err.contains("can only be called in debug mode"));
        assert!(out.contents().contains("q = 7"));
        assert_eq!(interp.call_stack.varval("z").unwrap().scalar_value().unwrap(), 4.0);
        assert_eq!(interp.debugger_depth(), 0);
    }

    #[test]
    fn test_dbquit_in_nested_pause_unwinds() {
        let (mut interp, _, _) = interp_with(&["keyboard", "dbquit", "dbcont"]);
        interp.eval_string("dbstop f 2", true, 0).unwrap();
        let r = interp.eval_string("z = f(1);", true, 0);
        assert!(matches!(r, Err(Exception::Interrupt)));
        assert!(interp.call_stack.varval("z").is_none());
    }

    #[test]
    fn test_dbstep_in_and_out_across_call() {
        let (mut interp, out, err) = interp_with(&["dbstep in", "x", "dbstep out", "r", "dbcont"]);
        interp
            .eval_string("function r = g(x)\n  r = f(x) + 1;\n  r = r * 10;\nend\n", true, 0)
            .unwrap();
        interp.eval_string("dbstop g 2", true, 0).unwrap();
        interp.eval_string("z = g(1);", true, 0).unwrap();

        let err = err.contents();
        let stops: Vec<usize> = ["stopped in g at line 2", "stopped in f at line 2", "stopped in g at line 3"]
            .iter()
            .map(|banner| err.find(banner).unwrap())
            .collect();
        assert!(stops.windows(2).all(|w| w[0] < w[1]), "{err}");
        let out = out.contents();
        assert!(out.contains("x = 1"));
        assert!(out.contains("r = 5"));
        assert_eq!(interp.call_stack.varval("z").unwrap().scalar_value().unwrap(), 50.0);
    }

    #[test]
    fn test_dbstack_marks_current_frame() {
        let (mut interp, out, _) = interp_with(&["dbstack", "isdebugmode", "dbcont"]);
        interp.eval_string("dbstop f 3", true, 0).unwrap();
        interp.eval_string("f(1);", true, 0).unwrap();
        let text = out.contents();
        assert!(text.starts_with("stopped in:\n\n  --> f at line 3\n"));
        assert!(text.contains("ans = 1"));
    }

    #[test]
    fn test_dbup_outside_debugger() {
        let mut interp = Interpreter::new();
        let err = interp.eval_string("dbup", true, 0).unwrap_err();
        assert_eq!(err.to_string(), "dbup: can only be called in debug mode");
    }

    #[test]
    fn test_isdebugmode_at_top_level() {
        let mut interp = Interpreter::new();
        let v = interp.eval_string("isdebugmode()", true, 1).unwrap();
        assert!(!v[0].is_true().unwrap());
    }
}
