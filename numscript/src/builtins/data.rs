//! Constructors, predicates and conversions on values

use super::format::format;
use super::{check_nargin, count_arg, invalid_call, one, string_arg};
use crate::interp::{EvalResult, ExecutionError, Interpreter, SymbolTable};
use crate::value::{Array, CharArray, Object, StructValue, Value, ValueList, checked_numel};

pub(super) fn install(symbols: &mut SymbolTable) {
    symbols.install_builtin("size", builtin_size);
    symbols.install_builtin("numel", builtin_numel);
    symbols.install_builtin("length", builtin_length);
    symbols.install_builtin("ndims", builtin_ndims);
    symbols.install_builtin("rows", builtin_rows);
    symbols.install_builtin("columns", builtin_columns);
    symbols.install_builtin("isempty", builtin_isempty);
    symbols.install_builtin("isscalar", builtin_isscalar);
    symbols.install_builtin("isvector", builtin_isvector);
    symbols.install_builtin("zeros", builtin_zeros);
    symbols.install_builtin("ones", builtin_ones);
    symbols.install_builtin("cell", builtin_cell);
    symbols.install_builtin("struct", builtin_struct);
    symbols.install_builtin("fieldnames", builtin_fieldnames);
    symbols.install_builtin("isfield", builtin_isfield);
    symbols.install_builtin("class", builtin_class);
    symbols.install_builtin("isa", builtin_isa);
    symbols.install_builtin("ischar", builtin_ischar);
    symbols.install_builtin("iscellstr", builtin_iscellstr);
    symbols.install_builtin("isnumeric", builtin_isnumeric);
    symbols.install_builtin("isreal", builtin_isreal);
    symbols.install_builtin("islogical", builtin_islogical);
    symbols.install_builtin("isbool", builtin_islogical);
    symbols.install_builtin("iscell", builtin_iscell);
    symbols.install_builtin("isstruct", builtin_isstruct);
    symbols.install_builtin("isobject", builtin_isobject);
    symbols.install_builtin("is_function_handle", builtin_is_function_handle);
    symbols.install_builtin("double", builtin_double);
    symbols.install_builtin("logical", builtin_logical);
    symbols.install_builtin("char", builtin_char);
    symbols.install_builtin("num2str", builtin_num2str);
    symbols.install_builtin("strcmp", builtin_strcmp);
    symbols.install_builtin("deal", builtin_deal);
    symbols.install_builtin("true", builtin_true);
    symbols.install_builtin("false", builtin_false);
    symbols.install_builtin("pi", builtin_pi);
    symbols.install_builtin("e", builtin_e);
    symbols.install_builtin("Inf", builtin_inf);
    symbols.install_builtin("inf", builtin_inf);
    symbols.install_builtin("NaN", builtin_nan);
    symbols.install_builtin("nan", builtin_nan);
    symbols.install_builtin("eps", builtin_eps);
}

/// Dimensions from `(n)`, `(r, c)` or `([r c])`, within the element limit
fn dims_from_args(who: &str, args: &[Value]) -> EvalResult<(usize, usize)> {
    let (r, c) = requested_dims(who, args)?;
    checked_numel(r, c)?;
    Ok((r, c))
}

fn requested_dims(who: &str, args: &[Value]) -> EvalResult<(usize, usize)> {
    let to_count = |x: f64| if x > 0.0 { x as usize } else { 0 };
    match args {
        [] => Ok((1, 1)),
        [v] if v.is_scalar() => {
            let n = to_count(v.scalar_value()?);
            Ok((n, n))
        }
        [v] => {
            let a = v.to_numeric()?;
            match a.data() {
                [r, c] => Ok((to_count(*r), to_count(*c))),
                _ => Err(ExecutionError::general(format!("{who}: dimensions must be a 2-element vector")).into()),
            }
        }
        [r, c] => Ok((to_count(r.scalar_value()?), to_count(c.scalar_value()?))),
        _ => Err(ExecutionError::general(format!("{who}: only 2-D arrays are supported")).into()),
    }
}

fn filled(who: &str, args: &[Value], x: f64) -> EvalResult<ValueList> {
    let (r, c) = dims_from_args(who, args)?;
    one(Value::Num(Array::filled(r, c, x)))
}

// ============================================================================
// Shape
// ============================================================================

fn builtin_size(_interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    check_nargin("size", args, 1, 2)?;
    let (r, c) = args[0].dims();
    if let Some(d) = args.get(1) {
        let d = d.index_value().map_err(|_| {
            ExecutionError::general("size: requested dimension DIM (= 0) out of range")
        })?;
        return match d {
            0 => Err(ExecutionError::general("size: requested dimension DIM (= 0) out of range").into()),
            1 => one(r as f64),
            2 => one(c as f64),
            _ => one(1.0),
        };
    }
    if nargout <= 1 {
        return one(Value::row(vec![r as f64, c as f64]));
    }
    let mut out = vec![Value::scalar(r as f64), Value::scalar(c as f64)];
    out.resize(nargout, Value::scalar(1.0));
    Ok(out)
}

fn builtin_numel(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    let Some(v) = args.first() else {
        return Err(invalid_call("numel"));
    };
    one(v.numel() as f64)
}

fn builtin_length(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("length", args, 1, 1)?;
    let (r, c) = args[0].dims();
    one(if r == 0 || c == 0 { 0.0 } else { r.max(c) as f64 })
}

fn builtin_ndims(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("ndims", args, 1, 1)?;
    one(2.0)
}

fn builtin_rows(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("rows", args, 1, 1)?;
    one(args[0].dims().0 as f64)
}

fn builtin_columns(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("columns", args, 1, 1)?;
    one(args[0].dims().1 as f64)
}

fn builtin_isempty(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("isempty", args, 1, 1)?;
    one(args[0].is_empty())
}

fn builtin_isscalar(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("isscalar", args, 1, 1)?;
    one(args[0].is_scalar())
}

fn builtin_isvector(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("isvector", args, 1, 1)?;
    let (r, c) = args[0].dims();
    one((r == 1 || c == 1) && r * c >= 1)
}

// ============================================================================
// Constructors
// ============================================================================

fn builtin_zeros(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    filled("zeros", args, 0.0)
}

fn builtin_ones(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    filled("ones", args, 1.0)
}

fn builtin_cell(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    let (r, c) = dims_from_args("cell", args)?;
    one(Value::Cell(Array::filled(r, c, Value::empty())))
}

/// `struct("a", 1, "b", {2})`: a 1x1 cell value stores its content
fn builtin_struct(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    if args.len() % 2 != 0 {
        return Err(ExecutionError::general(
            "struct: additional arguments must occur as \"field\", VALUE pairs",
        )
        .into());
    }
    let mut s = StructValue::new();
    for pair in args.chunks(2) {
        let name = pair[0]
            .as_string()
            .ok_or_else(|| ExecutionError::general("struct: additional arguments must occur as \"field\", VALUE pairs"))?;
        let value = match &pair[1] {
            Value::Cell(c) if c.is_scalar() => c.data()[0].clone(),
            Value::Cell(c) if c.is_empty() => Value::empty(),
            Value::Cell(_) => {
                return Err(ExecutionError::general(
                    "struct: struct arrays are not supported",
                )
                .into());
            }
            v => v.clone(),
        };
        s.set(name, value);
    }
    one(s)
}

fn builtin_fieldnames(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("fieldnames", args, 1, 1)?;
    let fields = match &args[0] {
        Value::Struct(s) => s,
        Value::Object(o) => &o.fields,
        _ => {
            return Err(ExecutionError::general("fieldnames: Invalid input argument").into());
        }
    };
    let names = fields.names().map(Value::string).collect();
    one(Value::Cell(Array::column(names)))
}

fn builtin_isfield(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("isfield", args, 2, 2)?;
    let fields = match &args[0] {
        Value::Struct(s) => Some(s),
        Value::Object(o) => Some(&o.fields),
        _ => None,
    };
    let has = |name: &Value| match (fields, name.as_string()) {
        (Some(f), Some(n)) => f.contains(&n),
        _ => false,
    };
    match &args[1] {
        Value::Cell(names) => one(Value::Bool(names.map(has))),
        name => one(has(name)),
    }
}

// ============================================================================
// Classes and predicates
// ============================================================================

/// `class(x)`, or `class(s, name)` to make an object of a user class
fn builtin_class(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("class", args, 1, 2)?;
    let Some(name) = args.get(1) else {
        return one(args[0].class_name());
    };
    let class = name
        .as_string()
        .ok_or_else(|| ExecutionError::general("class: ID must be a string"))?;
    let fields = match &args[0] {
        Value::Struct(s) => s.clone(),
        Value::Object(o) => o.fields.clone(),
        _ => return Err(ExecutionError::general("class: S must be a valid structure").into()),
    };
    tracing::trace!(class = %class, "object created");
    one(Value::Object(Object { class, fields }))
}

fn builtin_isa(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("isa", args, 2, 2)?;
    let class = string_arg("isa", args, 1, "CLASSNAME")?;
    let v = &args[0];
    let numeric = matches!(v, Value::Num(_) | Value::Range(_));
    one(match class.as_str() {
        "numeric" | "float" => numeric,
        "integer" => false,
        _ => v.class_name() == class,
    })
}

fn predicate(who: &str, args: &[Value], test: impl Fn(&Value) -> bool) -> EvalResult<ValueList> {
    check_nargin(who, args, 1, 1)?;
    one(test(&args[0]))
}

fn builtin_ischar(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    predicate("ischar", args, |v| matches!(v, Value::Str(_)))
}

fn builtin_iscellstr(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    predicate("iscellstr", args, |v| match v {
        Value::Cell(c) => c.data().iter().all(|x| matches!(x, Value::Str(_))),
        _ => false,
    })
}

fn builtin_isnumeric(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    predicate("isnumeric", args, |v| matches!(v, Value::Num(_) | Value::Range(_)))
}

fn builtin_isreal(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    predicate("isreal", args, |v| {
        matches!(v, Value::Num(_) | Value::Range(_) | Value::Bool(_) | Value::Str(_))
    })
}

fn builtin_islogical(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    predicate("islogical", args, |v| matches!(v, Value::Bool(_)))
}

fn builtin_iscell(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    predicate("iscell", args, Value::is_cell)
}

fn builtin_isstruct(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    predicate("isstruct", args, Value::is_struct)
}

fn builtin_isobject(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    predicate("isobject", args, Value::is_object)
}

fn builtin_is_function_handle(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    predicate("is_function_handle", args, Value::is_function_handle)
}

// ============================================================================
// Conversions
// ============================================================================

fn builtin_double(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("double", args, 1, 1)?;
    one(Value::Num(args[0].to_numeric()?))
}

fn builtin_logical(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("logical", args, 1, 1)?;
    let a = args[0].to_numeric()?;
    if a.data().iter().any(|x| x.is_nan()) {
        return Err(ExecutionError::general("logical: NaN can't be converted to logical value").into());
    }
    one(Value::Bool(a.map(|&x| x != 0.0)))
}

fn builtin_char(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("char", args, 1, 1)?;
    if let Value::Str(_) = &args[0] {
        return one(args[0].clone());
    }
    let a = args[0].to_numeric()?;
    let chars = a.map(|&x| char::from_u32(x.max(0.0) as u32).unwrap_or('\0'));
    one(Value::Str(CharArray {
        chars,
        double_quoted: false,
    }))
}

/// Significant digits `num2str` uses for a non-integer matrix
fn num2str_digits(values: &[f64]) -> usize {
    let max = values
        .iter()
        .filter(|x| x.is_finite())
        .fold(0.0_f64, |m, x| m.max(x.abs()));
    let magnitude = if max == 0.0 { 0 } else { max.log10().floor() as i64 };
    (magnitude + 5).clamp(5, 16) as usize
}

fn builtin_num2str(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("num2str", args, 1, 2)?;
    let v = &args[0];
    if let Value::Str(_) = v {
        return one(v.clone());
    }
    let a = v
        .to_numeric()
        .map_err(|_| ExecutionError::general("num2str: X must be a numeric, logical, or character array"))?;
    let template = match args.get(1) {
        Some(f) if f.is_string() => f.as_string().unwrap_or_default(),
        Some(_) => {
            let prec = count_arg("num2str", args, 1)
                .map_err(|_| ExecutionError::general("num2str: PREC must be a scalar integer >= 0"))?;
            format!("%.{prec}g")
        }
        None if a.data().iter().all(|x| x.fract() == 0.0 || !x.is_finite()) => "%d".to_string(),
        None => format!("%.{}g", num2str_digits(a.data())),
    };
    let rows: Vec<String> = (0..a.rows())
        .map(|r| {
            let cells = a
                .row_values(r)
                .into_iter()
                .map(|x| format("num2str", &template, &[Value::scalar(x)]))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(cells.join("  "))
        })
        .collect::<Result<_, ExecutionError>>()?;
    match rows.as_slice() {
        [] => one(""),
        [row] => one(row.trim().to_string()),
        _ => {
            let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
            let data: Vec<Vec<char>> = rows
                .iter()
                .map(|r| format!("{r:>width$}").chars().collect())
                .collect();
            let mut chars = Vec::with_capacity(rows.len() * width);
            for c in 0..width {
                for row in &data {
                    chars.push(row[c]);
                }
            }
            one(Value::Str(CharArray {
                chars: Array::new(rows.len(), width, chars),
                double_quoted: false,
            }))
        }
    }
}

fn strings_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x.chars.dims() == y.chars.dims() && x.chars.data() == y.chars.data(),
        _ => false,
    }
}

fn builtin_strcmp(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    check_nargin("strcmp", args, 2, 2)?;
    match (&args[0], &args[1]) {
        (Value::Cell(a), Value::Cell(b)) if a.dims() == b.dims() => {
            let flags = a.data().iter().zip(b.data()).map(|(x, y)| strings_equal(x, y)).collect();
            one(Value::Bool(Array::new(a.rows(), a.cols(), flags)))
        }
        (Value::Cell(c), s @ Value::Str(_)) | (s @ Value::Str(_), Value::Cell(c)) => {
            one(Value::Bool(c.map(|x| strings_equal(x, s))))
        }
        (a, b) => one(strings_equal(a, b)),
    }
}

/// `[a, b] = deal(x)` copies; `[a, b] = deal(x, y)` distributes
fn builtin_deal(_interp: &mut Interpreter, args: &[Value], nargout: usize) -> EvalResult<ValueList> {
    let n = nargout.max(1);
    match args {
        [] => Err(invalid_call("deal")),
        [v] => Ok(vec![v.clone(); n]),
        _ if args.len() == n => Ok(args.to_vec()),
        _ => Err(ExecutionError::general("deal: nargin > 1 and nargin != nargout").into()),
    }
}

// ============================================================================
// Constants
// ============================================================================

fn builtin_true(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    let (r, c) = dims_from_args("true", args)?;
    one(Value::Bool(Array::filled(r, c, true)))
}

fn builtin_false(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    let (r, c) = dims_from_args("false", args)?;
    one(Value::Bool(Array::filled(r, c, false)))
}

fn builtin_pi(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    filled("pi", args, std::f64::consts::PI)
}

fn builtin_e(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    filled("e", args, std::f64::consts::E)
}

fn builtin_inf(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    filled("Inf", args, f64::INFINITY)
}

fn builtin_nan(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    filled("NaN", args, f64::NAN)
}

fn builtin_eps(_interp: &mut Interpreter, args: &[Value], _nargout: usize) -> EvalResult<ValueList> {
    filled("eps", args, f64::EPSILON)
}

#[cfg(test)]
mod tests {
    use crate::interp::Interpreter;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn eval1(interp: &mut Interpreter, code: &str) -> Value {
        interp
            .eval_string(code, true, 1)
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
    }

    fn text(interp: &mut Interpreter, code: &str) -> String {
        eval1(interp, code).as_string().unwrap()
    }

    #[test]
    fn test_constructors_refuse_oversized_dimensions() {
        use crate::interp::{ErrorKind, Exception};
        let mut interp = Interpreter::new();
        for code in ["zeros(1e10, 1e10)", "ones(1e6, 1e6)", "cell(1e5)", "true([1e9 1e9])"] {
            match interp.eval_string(code, true, 1) {
                Err(Exception::Execution(e)) => {
                    assert_eq!(e.kind, ErrorKind::OutOfMemory, "{code}");
                    assert_eq!(e.identifier, "Octave:bad-alloc");
                }
                other => panic!("{code}: expected out of memory, got {other:?}"),
            }
        }
        assert_eq!(eval1(&mut interp, "numel(zeros(3, 0))").scalar_value().unwrap(), 0.0);
    }

    #[test]
    fn test_size_forms() {
        let mut interp = Interpreter::new();
        interp.eval_string("x = zeros(2, 3); [r, c] = size(x);", true, 0).unwrap();
        assert_eq!(interp.varval("r").unwrap().scalar_value().unwrap(), 2.0);
        assert_eq!(interp.varval("c").unwrap().scalar_value().unwrap(), 3.0);
        assert_eq!(eval1(&mut interp, "size(x, 2)").scalar_value().unwrap(), 3.0);
        assert_eq!(eval1(&mut interp, "numel(ones(4))").scalar_value().unwrap(), 16.0);
    }

    #[test]
    fn test_struct_and_fieldnames() {
        let mut interp = Interpreter::new();
        interp.eval_string("s = struct('a', 1, 'b', {'x'}); f = fieldnames(s);", true, 0).unwrap();
        assert_eq!(interp.varval("f").unwrap().dims(), (2, 1));
        assert_eq!(text(&mut interp, "s.b"), "x");
        assert!(eval1(&mut interp, "isfield(s, 'a')").is_true().unwrap());
        assert!(!eval1(&mut interp, "isfield(s, 'z')").is_true().unwrap());
    }

    #[test]
    fn test_class_and_isa() {
        let mut interp = Interpreter::new();
        assert_eq!(text(&mut interp, "class(1)"), "double");
        assert_eq!(text(&mut interp, "class('a')"), "char");
        assert_eq!(text(&mut interp, "class({})"), "cell");
        assert_eq!(text(&mut interp, "class(@sin)"), "function_handle");
        assert_eq!(text(&mut interp, "class(class(struct('v', 1), 'Point'))"), "Point");
        assert!(eval1(&mut interp, "isa(2, 'numeric')").is_true().unwrap());
    }

    #[test]
    fn test_num2str() {
        let mut interp = Interpreter::new();
        assert_eq!(text(&mut interp, "num2str(42)"), "42");
        assert_eq!(text(&mut interp, "num2str(pi)"), "3.1416");
        assert_eq!(text(&mut interp, "num2str([1 2 3])"), "1  2  3");
        assert_eq!(text(&mut interp, "num2str(true)"), "1");
    }

    #[test]
    fn test_strcmp_and_deal() {
        let mut interp = Interpreter::new();
        assert!(eval1(&mut interp, "strcmp('ab', 'ab')").is_true().unwrap());
        assert!(!eval1(&mut interp, "strcmp('ab', 'abc')").is_true().unwrap());
        assert_eq!(eval1(&mut interp, "strcmp({'a', 'b'}, 'b')").numel(), 2);
        interp.eval_string("[p, q] = deal(7);", true, 0).unwrap();
        assert_eq!(interp.varval("q").unwrap().scalar_value().unwrap(), 7.0);
    }
}
