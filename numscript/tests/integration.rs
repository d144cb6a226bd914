//! Integration tests for numscript
//!
//! Tests whole sessions through the public API:
//! - Batch and interactive top-level loops
//! - Function files, scripts, classes and autoload on the search path
//! - The debugger driven by scripted input
//! - Echo, profiling and the settings file

use numscript::interp::{ScriptedInput, SharedBuffer};
use numscript::{Interpreter, Settings};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

/// Output of one session
struct Session {
    status: i32,
    out: String,
    err: String,
}

fn interpreter(settings: Settings, lines: &str) -> (Interpreter, SharedBuffer, SharedBuffer) {
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let interp = Interpreter::with_settings(settings)
        .with_output(out.clone())
        .with_error_output(err.clone())
        .with_input(ScriptedInput::new(lines.lines()));
    (interp, out, err)
}

/// Run `code` as a batch session, one unit at a time
fn batch_with(settings: Settings, code: &str) -> Session {
    let (mut interp, out, err) = interpreter(settings, code);
    let status = interp.run_repl();
    Session {
        status,
        out: out.contents(),
        err: err.contents(),
    }
}

fn batch(code: &str) -> Session {
    batch_with(Settings::default(), code)
}

/// Fresh directory under the system temp dir
fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("numscript-it-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn settings_with_path(dir: &PathBuf) -> Settings {
    Settings {
        path: vec![dir.clone()],
        ..Settings::default()
    }
}

// ============================================
// Display and ans
// ============================================

#[test]
fn test_display_and_ans() {
    let s = batch("x = 5\ny = [1 2 3]\n3 + 4\nans * 2\nz = 1;");
    assert_eq!(s.status, 0);
    insta::assert_snapshot!(s.out, @r"
x = 5
y =

   1   2   3

ans = 7
ans = 14
");
}

#[test]
fn test_struct_and_cell_display() {
    let s = batch("s.a = 1\nc = {1, 'abc'}");
    insta::assert_snapshot!(s.out, @r"
s =

  scalar structure containing the fields:

    a = 1

c =
{
  [1,1] = 1
  [1,2] = abc
}
");
}

#[test]
fn test_formatted_output() {
    let s = batch("printf('%d-%s\\n', 4, 'four')\nfprintf('%5.2f|\\n', [1.5 2.25])\ndisp(sprintf('%x', 255))\ndisp(num2str(pi))");
    assert_eq!(s.out, "4-four\n 1.50|\n 2.25|\nff\n3.1416\n");
}

// ============================================
// Functions
// ============================================

#[test]
fn test_command_line_function_with_defaults() {
    let s = batch("function r = scale(x, k = 2)\n  r = x * k;\nend\ndisp(scale(3))\ndisp(scale(3, 5))");
    assert_eq!(s.out, "6\n15\n");
}

#[test]
fn test_varargout_and_nargout() {
    let s = batch(
        "function varargout = multi()\n  for k = 1:nargout\n    varargout{k} = k * 10;\n  end\nend\n[a, b] = multi();\nprintf('%d %d\\n', a, b)",
    );
    assert_eq!(s.out, "10 20\n");
}

#[test]
fn test_ignored_output_seen_by_isargout() {
    let s = batch(
        "function [a, b] = pair()\n  a = isargout(1);\n  b = isargout(2);\nend\n[~, q] = pair();\ndisp(q)\n[p, q] = pair();\ndisp(p)",
    );
    assert_eq!(s.out, "1\n1\n");
}

#[test]
fn test_persistent_counter() {
    let s = batch(
        "function n = counter()\n  persistent k = 0;\n  k++;\n  n = k;\nend\ncounter();\ncounter();\ndisp(counter())",
    );
    assert_eq!(s.out, "3\n");
}

#[test]
fn test_global_shared_between_functions() {
    let s = batch(
        "function bump()\n  global G\n  G = G + 1;\nend\nglobal G\nG = 10;\nbump();\nbump();\ndisp(G)",
    );
    assert_eq!(s.out, "12\n");
}

#[test]
fn test_function_file_with_subfunction_on_path() {
    let dir = temp_dir("funcs");
    std::fs::write(
        dir.join("twice.m"),
        "function y = twice(x)\n  y = helper(x);\nend\nfunction z = helper(x)\n  z = 2 * x;\nend\n",
    )
    .unwrap();
    let s = batch_with(settings_with_path(&dir), "disp(twice(21))\nexist('twice')");
    assert_eq!(s.out, "42\nans = 2\n");
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_anonymous_function_handles() {
    let s = batch("k = 3;\nf = @(x) x + k;\nk = 100;\ndisp(f(1))\ndisp(func2str(f))\ng = str2func('numel');\ndisp(g([1 2 3]))");
    assert_eq!(s.out, "4\n@(x) x + k\n3\n");
}

// ============================================
// Errors and status
// ============================================

#[test]
fn test_uncaught_error_in_batch_stops_with_trace() {
    let s = batch("function f()\n  error('MyPkg:bad', 'bad value %d', 7);\nend\nf()\ndisp('not reached')");
    assert_eq!(s.status, 1);
    assert!(s.err.starts_with("error: bad value 7\nerror: called from\n    f at line 2 column"));
    assert_eq!(s.out, "");
}

#[test]
fn test_try_catch_identifier_and_message() {
    let s = batch("try\n  error('A:b', 'oops');\ncatch err\n  disp(err.identifier);\n  disp(err.message);\nend");
    assert_eq!(s.status, 0);
    assert_eq!(s.out, "A:b\noops\n");
}

#[test]
fn test_unwind_protect_cleanup_runs_before_exit_status() {
    let s = batch("unwind_protect\n  error('boom');\nunwind_protect_cleanup\n  disp('cleanup');\nend_unwind_protect");
    assert_eq!(s.status, 1);
    assert_eq!(s.out, "cleanup\n");
    assert_eq!(s.err, "error: boom\n");
}

#[test]
fn test_exit_status_and_cleanup() {
    let s = batch("disp(1)\nunwind_protect\n  exit(3)\nunwind_protect_cleanup\n  disp('bye');\nend_unwind_protect\ndisp(2)");
    assert_eq!(s.status, 3);
    assert_eq!(s.out, "1\nbye\n");
}

#[test]
fn test_return_at_top_level_ends_batch() {
    let s = batch("x = 1;\nreturn\ndisp('after')");
    assert_eq!(s.status, 0);
    assert_eq!(s.out, "");
}

#[test]
fn test_interactive_session_recovers_from_errors() {
    let (mut interp, out, err) = interpreter(Settings::default(), "undefined_thing\nx = 2");
    interp.set_interactive(true);
    assert_eq!(interp.run_repl(), 0);
    assert!(err.contents().contains("'undefined_thing' undefined"));
    assert!(out.contents().contains("x = 2\n"));
}

#[test]
fn test_eval_with_catch_and_lasterr() {
    let s = batch("eval('error(''first'')', 'disp(lasterr())')\nx = eval('1 + 2');\ndisp(x)");
    assert_eq!(s.out, "first\n3\n");
}

#[test]
fn test_recursion_limit_from_settings() {
    let settings = Settings::from_toml_str("max_recursion_depth = 10").unwrap();
    let s = batch_with(settings, "function r = down(n)\n  r = down(n + 1);\nend\ndown(1)");
    assert_eq!(s.status, 1);
    assert!(s.err.starts_with("error: max_recursion_depth exceeded\n"));
}

// ============================================
// Drivers
// ============================================

#[test]
fn test_run_string_displays_result() {
    let (mut interp, out, _) = interpreter(Settings::default(), "");
    assert_eq!(interp.run_string("x = 3"), 0);
    assert_eq!(out.contents(), "x = 3\n");
    assert_eq!(interp.run_string("error('no')"), 1);
}

#[test]
fn test_run_file_and_persist() {
    let dir = temp_dir("persist");
    let script = dir.join("broken.m");
    std::fs::write(&script, "a = 1;\nerror('half way');\n").unwrap();

    let (mut interp, _, _) = interpreter(Settings::default(), "");
    assert_eq!(interp.run_file(&script), 1);

    let (mut interp, out, err) = interpreter(Settings::default(), "disp(a + 1)");
    assert_eq!(interp.run_file_persistent(&script), 0);
    assert!(err.contents().starts_with("error: half way\n"));
    assert_eq!(out.contents(), "2\n");
    std::fs::remove_dir_all(&dir).unwrap();
}

// ============================================
// Classes and autoload
// ============================================

#[test]
fn test_class_constructor_and_method_dispatch() {
    let dir = temp_dir("class");
    let class_dir = dir.join("@Pt");
    std::fs::create_dir_all(&class_dir).unwrap();
    std::fs::write(class_dir.join("Pt.m"), "function p = Pt(x)\n  p.x = x;\nend\n").unwrap();
    std::fs::write(class_dir.join("norm1.m"), "function n = norm1(p)\n  n = -p.x;\nend\n").unwrap();

    let s = batch_with(
        settings_with_path(&dir),
        "p = Pt(-4);\ndisp(class(p))\ndisp(norm1(p))\ndisp(isobject(p))",
    );
    assert_eq!(s.err, "");
    assert_eq!(s.out, "Pt\n4\n1\n");
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_autoload_absolute_file() {
    let dir = temp_dir("autoload");
    let file = dir.join("later.m");
    std::fs::write(&file, "function y = later(x)\n  y = x + 1;\nend\n").unwrap();
    let code = format!("autoload('later', '{}');\ndisp(later(1))", file.display());
    let s = batch(&code);
    assert_eq!(s.err, "");
    assert_eq!(s.out, "2\n");
    std::fs::remove_dir_all(&dir).unwrap();
}

// ============================================
// Debugger
// ============================================

#[test]
fn test_keyboard_prompt_transcript() {
    let transcript = SharedBuffer::new();
    let out = SharedBuffer::new();
    let err = SharedBuffer::new();
    let input = ScriptedInput::new("function g()\n  v = 7;\n  keyboard\nend\ng()\nv\ndbcont".lines())
        .with_transcript(transcript.clone());
    let mut interp = Interpreter::new()
        .with_output(out.clone())
        .with_error_output(err.clone())
        .with_input(input);

    assert_eq!(interp.run_repl(), 0);
    assert!(transcript.contents().contains("debug> v\ndebug> dbcont\n"));
    assert_eq!(out.contents(), "v = 7\n");
    assert!(err.contents().starts_with("stopped in g at line 3"));
}

#[test]
fn test_breakpoint_with_dbquit_aborts_call() {
    let s = batch(
        "function r = f(x)\n  y = x + 1;\n  r = y * 2;\nend\ndbstop('f', 3);\nz = f(1)\ny\ndbquit\ndisp(exist('z'))",
    );
    assert!(s.err.contains("stopped in f at line 3"));
    assert_eq!(s.out, "y = 2\n0\n");
}

// ============================================
// Echo and profiling
// ============================================

#[test]
fn test_echo_script_lines() {
    let dir = temp_dir("echo");
    std::fs::write(dir.join("steps.m"), "a = 1;\nb = a + 1;\n").unwrap();
    let s = batch_with(settings_with_path(&dir), "echo on\nsteps\necho off\ndisp(b)");
    assert_eq!(s.out, "+ a = 1;\n+ b = a + 1;\n2\n");
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_profile_info_counts_calls() {
    let s = batch(
        "function z()\nend\nprofile on\nz();\nz();\nprofile off\nT = profile('info');\nfor k = 1:numel(T.FunctionTable)\n  e = T.FunctionTable{k};\n  if strcmp(e.FunctionName, 'z')\n    disp(e.NumCalls)\n  end\nend",
    );
    assert_eq!(s.err, "");
    assert_eq!(s.out, "2\n");
}

// ============================================
// Workspace queries
// ============================================

#[test]
fn test_who_clear_and_exist() {
    let s = batch("beta = 1;\nalpha = 2;\nwho\nclear a*\ndisp(exist('alpha'))\ndisp(exist('beta'))\ndisp(exist('disp'))");
    insta::assert_snapshot!(s.out, @r"
Variables visible from the current scope:

alpha  beta

0
1
5
");
}
