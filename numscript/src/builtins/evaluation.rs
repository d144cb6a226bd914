//! Evaluating code, calling functions by name and inspecting the workspace

use super::{check_nargin, glob_match, invalid_call, is_pattern, none, one, string_arg, string_args};
use crate::interp::{
    Callable, EvalResult, ExecutionError, FrameKind, Interpreter, SymbolTable, valid_identifier,
};
use crate::lexer::is_keyword;
use crate::value::{Array, FunctionHandle, Value, ValueList};
use std::path::Path;

pub(super) fn install(symbols: &mut SymbolTable) {
    symbols.install_builtin("eval", builtin_eval);
    symbols.install_builtin("evalin", builtin_evalin);
    symbols.install_builtin("assignin", builtin_assignin);
    symbols.install_builtin("feval", builtin_feval);
    symbols.install_builtin("func2str", builtin_func2str);
    symbols.install_builtin("str2func", builtin_str2func);
    symbols.install_builtin("source", builtin_source);
    symbols.install_builtin("run", builtin_run);
    symbols.install_builtin("mfilename", builtin_mfilename);
    symbols.install_builtin("nargin", builtin_nargin);
    symbols.install_builtin("nargout", builtin_nargout);
    symbols.install_builtin("isargout", builtin_isargout);
    symbols.install_builtin("print_usage", builtin_print_usage);
    symbols.install_builtin("exist", builtin_exist);
    symbols.install_builtin("isvarname", builtin_isvarname);
    symbols.install_builtin("iskeyword", builtin_iskeyword);
    symbols.install_builtin("who", builtin_who);
    symbols.install_builtin("clear", builtin_clear);
    symbols.install_builtin("methods", builtin_methods);
    symbols.install_builtin("ismethod", builtin_ismethod);
}

// ============================================================================
// Evaluating strings and files
// ============================================================================

fn builtin_eval(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    check_nargin("eval", args, 1, 2)?;
    let try_code = string_arg("eval", args, 0, "TRY")?;
    let catch_code = match args.get(1) {
        Some(_) => Some(string_arg("eval", args, 1, "CATCH")?),
        None => None,
    };
    interp.eval_with_catch(&try_code, catch_code.as_deref(), nargout)
}

fn builtin_evalin(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    check_nargin("evalin", args, 2, 3)?;
    let context = string_arg("evalin", args, 0, "CONTEXT")?;
    let try_code = string_arg("evalin", args, 1, "TRY")?;
    let catch_code = match args.get(2) {
        Some(_) => Some(string_arg("evalin", args, 2, "CATCH")?),
        None => None,
    };
    interp.evalin(&context, &try_code, catch_code.as_deref(), nargout)
}

fn builtin_assignin(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("assignin", args, 3, 3)?;
    let context = string_arg("assignin", args, 0, "CONTEXT")?;
    let name = string_arg("assignin", args, 1, "VARNAME")?;
    interp.assignin(&context, &name, args[2].clone())?;
    none()
}

fn builtin_feval(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    let Some((target, rest)) = args.split_first() else {
        return Err(invalid_call("feval"));
    };
    interp.feval(target, rest, nargout)
}

fn builtin_func2str(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("func2str", args, 1, 1)?;
    let h = args[0].as_function_handle().ok_or_else(|| {
        ExecutionError::general("func2str: FCN_HANDLE argument must be a valid function handle")
    })?;
    one(h.text())
}

/// `str2func("name")` or `str2func("@(x) ...")`
fn builtin_str2func(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("str2func", args, 1, 2)?;
    let text = string_arg("str2func", args, 0, "FCN_NAME")?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ExecutionError::general("str2func: invalid function string").into());
    }
    if text.starts_with('@') {
        let mut values = interp.eval_string(text, true, 1)?;
        return match values.pop() {
            Some(v) if v.is_function_handle() => Ok(vec![v]),
            _ => Err(ExecutionError::general("str2func: invalid function string").into()),
        };
    }
    one(Value::handle(FunctionHandle::Named(text.to_string())))
}

fn builtin_source(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("source", args, 1, 2)?;
    let file = string_arg("source", args, 0, "FILE")?;
    let context = match args.get(1) {
        Some(_) => Some(string_arg("source", args, 1, "CONTEXT")?),
        None => None,
    };
    interp.source_file(Path::new(&file), context.as_deref())?;
    none()
}

fn builtin_run(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("run", args, 1, 1)?;
    let file = string_arg("run", args, 0, "SCRIPT")?;
    let path = Path::new(&file);
    if path.extension().is_some() && !path.exists() {
        return Err(ExecutionError::general("run: file SCRIPT must exist and be a valid Octave scriptfile").into());
    }
    interp.source_file(path, None)?;
    none()
}

// ============================================================================
// Information about the running function
// ============================================================================

/// `mfilename`, `mfilename("fullpath")`, `mfilename("fullpathext")`
fn builtin_mfilename(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("mfilename", args, 0, 1)?;
    let opt = match args.first() {
        Some(_) => string_arg("mfilename", args, 0, "OPT")?,
        None => String::new(),
    };
    let Some(file) = interp
        .call_stack
        .current_user_frame()
        .and_then(|f| f.file())
        .map(Path::to_path_buf)
    else {
        return one("");
    };
    let full = std::path::absolute(&file).unwrap_or(file);
    let text = match opt.as_str() {
        "fullpathext" => full.display().to_string(),
        "fullpath" => full.with_extension("").display().to_string(),
        _ => full
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    one(text)
}

/// Declared argument count of a function: negative when it takes a variable number
fn declared_count(
    interp: &mut Interpreter,
    who: &str,
    target: &Value,
    outputs: bool,
) -> EvalResult<f64> {
    let signed = |n: usize, variable: bool| {
        if variable { -(n as f64) - 1.0 } else { n as f64 }
    };
    if let Some(h) = target.as_function_handle() {
        match h.as_ref() {
            FunctionHandle::Anonymous(f) => {
                return Ok(if outputs { -1.0 } else { signed(f.params.len(), f.varargin) });
            }
            FunctionHandle::Named(_) => {}
        }
    }
    let name = match (target.as_function_handle(), target.as_string()) {
        (Some(h), _) => h.text(),
        (None, Some(name)) => name,
        _ => return Err(ExecutionError::general(format!("{who}: FCN must be a string or function handle")).into()),
    };
    match interp.lookup_function(&name, &[])? {
        Some(Callable::Function(f)) => Ok(if outputs {
            signed(f.def.outputs.len(), f.def.varargout)
        } else {
            signed(f.def.params.len(), f.def.varargin)
        }),
        Some(Callable::Builtin(_)) => Ok(-1.0),
        Some(Callable::Script(_)) => Err(ExecutionError::general(format!(
            "{who}: number of {} arguments unavailable for script files",
            if outputs { "output" } else { "input" }
        ))
        .into()),
        None => Err(ExecutionError::general(format!("{who}: invalid function name: {name}")).into()),
    }
}

fn builtin_nargin(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("nargin", args, 0, 1)?;
    if let Some(target) = args.first() {
        return one(declared_count(interp, "nargin", target, false)?);
    }
    let n = interp.call_stack.current_frame().workspace.borrow().nargin;
    one(n.unwrap_or(0) as f64)
}

fn builtin_nargout(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("nargout", args, 0, 1)?;
    if let Some(target) = args.first() {
        return one(declared_count(interp, "nargout", target, true)?);
    }
    let n = interp.call_stack.current_frame().workspace.borrow().nargout;
    one(n.unwrap_or(0) as f64)
}

/// Whether output `k` of the running function will be used by its caller
fn builtin_isargout(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("isargout", args, 1, 1)?;
    if interp.call_stack.at_top_level() {
        return Err(ExecutionError::general("isargout: invalid use at top level").into());
    }
    let (nargout, ignored) = {
        let ws = interp.call_stack.current_frame().workspace.borrow();
        (ws.nargout.unwrap_or(0), ws.ignored.clone())
    };
    let ks = args[0].to_numeric()?;
    let mut flags = Vec::with_capacity(ks.numel());
    for &k in ks.data() {
        if k.fract() != 0.0 || k <= 0.0 {
            return Err(ExecutionError::general("isargout: K must be a positive integer").into());
        }
        let k = k as usize;
        let discarded = ignored.get(k - 1).copied().unwrap_or(false);
        flags.push((k == 1 || k <= nargout) && !discarded);
    }
    one(Value::Bool(Array::new(ks.rows(), ks.cols(), flags)))
}

fn builtin_print_usage(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("print_usage", args, 0, 1)?;
    let name = match args.first() {
        Some(_) => string_arg("print_usage", args, 0, "NAME")?,
        None => match &interp.call_stack.current_frame().kind {
            FrameKind::Function(f) => f.name.clone(),
            _ => {
                return Err(ExecutionError::general("print_usage: only valid inside functions").into());
            }
        },
    };
    Err(invalid_call(&name))
}

// ============================================================================
// Symbols
// ============================================================================

/// Codes returned by `exist`
const EXIST_VARIABLE: f64 = 1.0;
const EXIST_FILE: f64 = 2.0;
const EXIST_BUILTIN: f64 = 5.0;
const EXIST_DIRECTORY: f64 = 7.0;
const EXIST_CMDLINE_FUNCTION: f64 = 103.0;

fn builtin_exist(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("exist", args, 1, 2)?;
    let name = string_arg("exist", args, 0, "NAME")?;
    let kind = match args.get(1) {
        Some(_) => string_arg("exist", args, 1, "TYPE")?,
        None => "any".to_string(),
    };
    if !matches!(kind.as_str(), "any" | "var" | "builtin" | "file" | "dir" | "class") {
        return Err(ExecutionError::general(format!("exist: unrecognized type argument \"{kind}\"")).into());
    }
    let any = kind == "any";
    let path = Path::new(&name);

    if (any || kind == "var") && interp.is_variable(&name) {
        return one(EXIST_VARIABLE);
    }
    if any && interp.symbols.is_cmdline_function(&name) {
        return one(EXIST_CMDLINE_FUNCTION);
    }
    if any || kind == "file" {
        let found = interp.symbols.is_file_function(&name)
            || interp.autoload.lookup(&name).is_some()
            || interp.symbols.locate_file(&name).is_some()
            || path.is_file();
        if found {
            return one(EXIST_FILE);
        }
    }
    if (any || kind == "dir") && path.is_dir() {
        return one(EXIST_DIRECTORY);
    }
    if (any || kind == "builtin") && interp.symbols.is_builtin(&name) {
        return one(EXIST_BUILTIN);
    }
    if kind == "class" && interp.symbols.is_class(&name) {
        return one(EXIST_FILE);
    }
    one(0.0)
}

fn builtin_isvarname(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("isvarname", args, 1, 1)?;
    let ok = args[0]
        .as_string()
        .is_some_and(|name| valid_identifier(&name) && !is_keyword(&name));
    one(ok)
}

fn builtin_iskeyword(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("iskeyword", args, 1, 1)?;
    let name = string_arg("iskeyword", args, 0, "NAME")?;
    one(is_keyword(&name))
}

/// Names laid out in columns across an 80-character line
fn list_in_columns(names: &[String]) -> String {
    const WIDTH: usize = 80;
    let Some(longest) = names.iter().map(|n| n.chars().count()).max() else {
        return String::new();
    };
    let column = longest + 2;
    let ncols = (WIDTH / column).max(1);
    let nrows = names.len().div_ceil(ncols);
    let mut out = String::new();
    for row in 0..nrows {
        let mut i = row;
        loop {
            let name = &names[i];
            out.push_str(name);
            i += nrows;
            if i >= names.len() {
                break;
            }
            out.push_str(&" ".repeat(column - name.chars().count()));
        }
        out.push('\n');
    }
    out
}

fn builtin_who(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    let patterns = string_args("who", args)?;
    let global_only = patterns.first().is_some_and(|p| p == "global" || p == "-global");
    let patterns = if global_only { &patterns[1..] } else { &patterns[..] };
    let mut names = if global_only {
        interp.call_stack.global_names()
    } else {
        interp.call_stack.variable_names()
    };
    names.retain(|n| patterns.is_empty() || patterns.iter().any(|p| glob_match(p, n)));
    names.sort();
    if nargout > 0 {
        let cells = names.iter().map(|n| Value::string(n)).collect();
        return one(Value::Cell(Array::column(cells)));
    }
    if names.is_empty() {
        return none();
    }
    let header = if global_only {
        "Global variables:\n\n"
    } else {
        "Variables visible from the current scope:\n\n"
    };
    let text = format!("{header}{}\n", list_in_columns(&names));
    interp.write_out(&text);
    none()
}

// ============================================================================
// clear
// ============================================================================

fn clear_variables_matching(interp: &mut Interpreter, pattern: &str) -> bool {
    if !is_pattern(pattern) {
        return interp.clear_variable(pattern);
    }
    let mut any = false;
    for name in interp.call_stack.variable_names() {
        if glob_match(pattern, &name) {
            any |= interp.clear_variable(&name);
        }
    }
    any
}

fn clear_functions_matching(interp: &mut Interpreter, pattern: &str) {
    if !is_pattern(pattern) {
        interp.symbols.clear_function(pattern);
        return;
    }
    for name in interp.symbols.cmdline_function_names() {
        if glob_match(pattern, &name) {
            interp.symbols.clear_function(&name);
        }
    }
}

fn clear_globals(interp: &mut Interpreter, names: &[String]) {
    if names.is_empty() {
        interp.clear_all_globals();
        return;
    }
    for name in interp.call_stack.global_names() {
        if names.iter().any(|p| glob_match(p, &name)) {
            interp.clear_global_variable(&name);
        }
    }
}

fn clear_all(interp: &mut Interpreter) {
    interp.clear_all_variables();
    interp.clear_all_globals();
    interp.symbols.clear_functions();
}

/// `clear`, `clear NAME...`, `clear -g`, `clear -f`, `clear -x NAME...`, `clear all`
fn builtin_clear(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    let words = string_args("clear", args)?;
    let mut idx = 0;
    let mut option = None;
    if let Some(first) = words.first() {
        option = match first.as_str() {
            "-all" | "-a" => Some("all"),
            "-exclusive" | "-x" => Some("exclusive"),
            "-functions" | "-f" => Some("functions"),
            "-global" | "-g" => Some("global"),
            "-variables" | "-v" => Some("variables"),
            "-classes" | "-c" => Some("classes"),
            s if s.starts_with('-') => {
                return Err(ExecutionError::general(format!("clear: unrecognized option '{s}'")).into());
            }
            _ => None,
        };
        if option.is_some() {
            idx = 1;
        }
    }
    let names = &words[idx..];
    tracing::debug!(?option, count = names.len(), "clear");

    match option {
        None if names.is_empty() => interp.clear_all_variables(),
        None => clear_words(interp, names),
        Some("all") | Some("classes") => clear_all(interp),
        Some("exclusive") => {
            for name in interp.call_stack.variable_names() {
                if !names.iter().any(|p| glob_match(p, &name)) {
                    interp.clear_variable(&name);
                }
            }
        }
        Some("functions") => {
            if names.is_empty() {
                interp.symbols.clear_functions();
            }
            for name in names {
                clear_functions_matching(interp, name);
            }
        }
        Some("global") => clear_globals(interp, names),
        Some(_) => {
            if names.is_empty() {
                interp.clear_all_variables();
            }
            for name in names {
                clear_variables_matching(interp, name);
            }
        }
    }
    none()
}

/// Plain `clear` arguments: keywords unless shadowed by a variable, else names
fn clear_words(interp: &mut Interpreter, words: &[String]) {
    let mut i = 0;
    while i < words.len() {
        let word = words[i].as_str();
        let shadowed = interp.is_variable(word);
        match word {
            "all" if !shadowed => clear_all(interp),
            "functions" if !shadowed => {
                let rest = &words[i + 1..];
                if rest.is_empty() {
                    interp.symbols.clear_functions();
                }
                for name in rest {
                    clear_functions_matching(interp, name);
                }
                return;
            }
            "global" if !shadowed => {
                clear_globals(interp, &words[i + 1..]);
                return;
            }
            "variables" if !shadowed => interp.clear_all_variables(),
            "classes" if !shadowed => clear_all(interp),
            name => {
                if !clear_variables_matching(interp, name) {
                    clear_functions_matching(interp, name);
                }
            }
        }
        i += 1;
    }
}

// ============================================================================
// Classes
// ============================================================================

fn class_arg(who: &str, v: &Value) -> EvalResult<String> {
    match v {
        Value::Object(o) => Ok(o.class.clone()),
        other => other
            .as_string()
            .ok_or_else(|| ExecutionError::general(format!("{who}: input must be a class object or a string")).into()),
    }
}

fn builtin_methods(interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    check_nargin("methods", args, 1, 1)?;
    let class = class_arg("methods", &args[0])?;
    let mut names = interp.symbols.methods(&class);
    if names.is_empty() && interp.symbols.find_constructor(&class)?.is_none() {
        return Err(ExecutionError::general("methods: invalid input argument").into());
    }
    names.sort();
    if nargout > 0 {
        let cells = names.iter().map(|n| Value::string(n)).collect();
        return one(Value::Cell(Array::column(cells)));
    }
    let text = format!("Methods for class {class}:\n{}\n", names.join("  "));
    interp.write_out(&format!("{text}\n"));
    none()
}

fn builtin_ismethod(interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("ismethod", args, 2, 2)?;
    let class = class_arg("ismethod", &args[0])?;
    let method = string_arg("ismethod", args, 1, "METHOD")?;
    let found = interp.symbols.find_method(&class, &method)?.is_some();
    one(found)
}

#[cfg(test)]
mod tests {
    use super::list_in_columns;
    use crate::interp::{Exception, Interpreter, SharedBuffer};
    use pretty_assertions::assert_eq;

    fn session() -> (Interpreter, SharedBuffer) {
        let out = SharedBuffer::new();
        let interp = Interpreter::new().with_output(out.clone());
        (interp, out)
    }

    fn scalar(interp: &mut Interpreter, code: &str) -> f64 {
        let v = interp.eval_string(code, true, 1).unwrap();
        v[0].scalar_value().unwrap()
    }

    // ====================================================================
    // eval / feval / handles
    // ====================================================================

    #[test]
    fn test_eval_with_catch_string() {
        let (mut interp, _) = session();
        interp
            .eval_string("eval('error(\"boom\")', 'msg = lasterr();')", true, 0)
            .unwrap();
        assert_eq!(interp.varval("msg").unwrap().as_string().unwrap(), "boom");
    }

    #[test]
    fn test_eval_returns_values() {
        let (mut interp, _) = session();
        assert_eq!(scalar(&mut interp, "eval('1 + 2')"), 3.0);
    }

    #[test]
    fn test_feval_and_handles() {
        let (mut interp, _) = session();
        interp
            .eval_string("f = str2func('@(x) x * 2'); y = feval(f, 4); s = func2str(f);", true, 0)
            .unwrap();
        assert_eq!(interp.varval("y").unwrap().scalar_value().unwrap(), 8.0);
        assert_eq!(interp.varval("s").unwrap().as_string().unwrap(), "@(x) x * 2");
        assert_eq!(scalar(&mut interp, "feval('numel', [1 2 3])"), 3.0);
    }

    #[test]
    fn test_nargin_of_named_function() {
        let (mut interp, _) = session();
        interp
            .eval_string("function varargout = f(a, b, varargin)\nend", true, 0)
            .unwrap();
        assert_eq!(scalar(&mut interp, "nargin('f')"), -3.0);
        assert_eq!(scalar(&mut interp, "nargout('f')"), -1.0);
        assert_eq!(scalar(&mut interp, "nargin(@(x, y) x)"), 2.0);
    }

    #[test]
    fn test_nargin_inside_function() {
        let (mut interp, _) = session();
        interp
            .eval_string("function r = g(a, b)\n  r = nargin;\nend\nk = g(1);", true, 0)
            .unwrap();
        assert_eq!(interp.varval("k").unwrap().scalar_value().unwrap(), 1.0);
    }

    #[test]
    fn test_isargout_with_ignored_output() {
        let (mut interp, _) = session();
        interp
            .eval_string(
                "function [a, b] = h()\n  a = isargout(1);\n  b = isargout(2);\nend\n[~, q] = h();\n[p] = h();",
                true,
                0,
            )
            .unwrap();
        assert!(interp.varval("q").unwrap().is_true().unwrap());
        assert!(interp.varval("p").unwrap().is_true().unwrap());
    }

    #[test]
    fn test_print_usage_names_function() {
        let (mut interp, _) = session();
        let err = interp
            .eval_string("function u()\n  print_usage();\nend\nu()", true, 0)
            .unwrap_err();
        let Exception::Execution(e) = err else {
            panic!("expected execution error");
        };
        assert_eq!(e.message, "Invalid call to u");
    }

    // ====================================================================
    // Workspace
    // ====================================================================

    #[test]
    fn test_exist_codes() {
        let (mut interp, _) = session();
        interp.eval_string("v = 1;\nfunction c()\nend", true, 0).unwrap();
        assert_eq!(scalar(&mut interp, "exist('v')"), 1.0);
        assert_eq!(scalar(&mut interp, "exist('c')"), 103.0);
        assert_eq!(scalar(&mut interp, "exist('disp')"), 5.0);
        assert_eq!(scalar(&mut interp, "exist('no_such_thing_here')"), 0.0);
    }

    #[test]
    fn test_clear_patterns_and_exclusive() {
        let (mut interp, _) = session();
        interp
            .eval_string("abc = 1; abd = 2; xyz = 3; clear ab*", true, 0)
            .unwrap();
        assert!(!interp.is_variable("abc"));
        assert!(!interp.is_variable("abd"));
        assert!(interp.is_variable("xyz"));
        interp.eval_string("k = 1; m = 2; clear -x k", true, 0).unwrap();
        assert!(interp.is_variable("k"));
        assert!(!interp.is_variable("m"));
    }

    #[test]
    fn test_clear_global() {
        let (mut interp, _) = session();
        interp.eval_string("global G\nG = 5;\nclear -g G", true, 0).unwrap();
        assert!(interp.global_varval("G").is_none());
    }

    #[test]
    fn test_who_lists_sorted_names() {
        let (mut interp, out) = session();
        interp.eval_string("b = 1; a = 2; who", true, 0).unwrap();
        assert_eq!(
            out.contents(),
            "Variables visible from the current scope:\n\na  b\n\n"
        );
    }

    #[test]
    fn test_list_in_columns_wraps() {
        let names: Vec<String> = (0..30).map(|i| format!("variable_{i:02}")).collect();
        let text = list_in_columns(&names);
        assert!(text.lines().all(|l| l.len() <= 80));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_isvarname() {
        let (mut interp, _) = session();
        assert_eq!(scalar(&mut interp, "isvarname('a_1')"), 1.0);
        assert_eq!(scalar(&mut interp, "isvarname('1a')"), 0.0);
        assert_eq!(scalar(&mut interp, "isvarname('for')"), 0.0);
    }
}
