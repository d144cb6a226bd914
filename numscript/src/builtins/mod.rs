//! Native functions
//!
//! Every builtin has the [`BuiltinFn`] shape: the interpreter, the evaluated
//! arguments and the number of outputs the caller asked for. Builtins that
//! only print return an empty list; the rest return their value even when
//! `nargout` is zero so that a bare call binds `ans`.

mod control;
mod data;
mod debug;
mod evaluation;
pub mod format;
mod output;

use crate::interp::{EvalResult, Exception, ExecutionError, SymbolTable};
use crate::value::{Value, ValueList};

/// Register every builtin
pub fn install(symbols: &mut SymbolTable) {
    output::install(symbols);
    data::install(symbols);
    evaluation::install(symbols);
    control::install(symbols);
    debug::install(symbols);
}

// ============================================================================
// Argument helpers
// ============================================================================

pub(crate) fn one(v: impl Into<Value>) -> EvalResult<ValueList> {
    Ok(vec![v.into()])
}

pub(crate) fn none() -> EvalResult<ValueList> {
    Ok(Vec::new())
}

/// Error raised for a call with the wrong number or kind of arguments
pub(crate) fn invalid_call(name: &str) -> Exception {
    ExecutionError::general(format!("Invalid call to {name}"))
        .with_identifier("Octave:invalid-fun-call")
        .into()
}

pub(crate) fn check_nargin(name: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        return Err(invalid_call(name));
    }
    Ok(())
}

/// Argument `i` as a string; `what` names it in the error
pub(crate) fn string_arg(who: &str, args: &[Value], i: usize, what: &str) -> EvalResult<String> {
    args.get(i)
        .and_then(Value::as_string)
        .ok_or_else(|| ExecutionError::general(format!("{who}: {what} must be a string")).into())
}

/// Every argument as a string, for command-syntax builtins
pub(crate) fn string_args(who: &str, args: &[Value]) -> EvalResult<Vec<String>> {
    args.iter()
        .map(|a| {
            a.as_string().ok_or_else(|| {
                ExecutionError::general(format!("{who}: all arguments must be strings")).into()
            })
        })
        .collect()
}

/// Argument `i` as a non-negative integer
pub(crate) fn count_arg(who: &str, args: &[Value], i: usize) -> EvalResult<usize> {
    let v = args.get(i).ok_or_else(|| invalid_call(who))?;
    v.index_value().map_err(|_| {
            ExecutionError::general(format!("{who}: argument {} must be a non-negative integer", i + 1)).into()
        })
}

/// `*` and `?` wildcard match, as used by `clear` and `who`
pub(crate) fn glob_match(pattern: &str, name: &str) -> bool {
    fn go(p: &[char], n: &[char]) -> bool {
        match p.split_first() {
            None => n.is_empty(),
            Some(('*', rest)) => (0..=n.len()).any(|k| go(rest, &n[k..])),
            Some(('?', rest)) => !n.is_empty() && go(rest, &n[1..]),
            Some((c, rest)) => n.first() == Some(c) && go(rest, &n[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    go(&p, &n)
}

pub(crate) fn is_pattern(s: &str) -> bool {
    s.contains(['*', '?'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("a*", "abc"));
        assert!(glob_match("*c", "abc"));
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "ac"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("b*", "abc"));
    }
}
