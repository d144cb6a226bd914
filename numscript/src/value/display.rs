//! Textual rendering of values for `x = ...` output and `disp`

use super::{Array, FunctionHandle, Value};

/// Significant digits of the short output format
const PRECISION: i32 = 5;

/// Knobs that affect printing
#[derive(Debug, Clone, Copy)]
pub struct DisplayOptions {
    pub print_empty_dimensions: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            print_empty_dimensions: true,
        }
    }
}

fn is_int(x: f64) -> bool {
    x.is_finite() && x.fract() == 0.0
}

fn special(x: f64) -> Option<&'static str> {
    if x.is_nan() {
        Some("NaN")
    } else if x == f64::INFINITY {
        Some("Inf")
    } else if x == f64::NEG_INFINITY {
        Some("-Inf")
    } else {
        None
    }
}

fn digits_of(x: f64) -> i32 {
    if x == 0.0 {
        0
    } else {
        x.abs().log10().floor() as i32 + 1
    }
}

/// Digits before and after the point for a magnitude
fn real_format(max_abs: f64) -> (usize, usize) {
    let digits = digits_of(max_abs);
    let (ld, rd) = if digits > 0 {
        (digits, if PRECISION > digits { PRECISION - digits } else { PRECISION })
    } else if digits < 0 {
        (1, PRECISION - digits)
    } else {
        (1, PRECISION - 1)
    };
    (ld as usize, rd as usize)
}

fn needs_exponent(finite: impl Iterator<Item = f64> + Clone) -> bool {
    let max = finite.clone().fold(0.0_f64, |m, x| m.max(x.abs()));
    let min = finite.filter(|x| *x != 0.0).fold(f64::INFINITY, |m, x| m.min(x.abs()));
    max >= 1e5 || (min.is_finite() && min < 1e-5)
}

fn exponent(x: f64) -> String {
    let s = format!("{:.4e}", x);
    // Rust prints `1.2346e4`; the output format wants `1.2346e+04`
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

/// Short form of one number, as used inside messages
pub fn format_scalar_short(x: f64) -> String {
    if let Some(s) = special(x) {
        return s.to_string();
    }
    if is_int(x) {
        return format!("{}", x as i64);
    }
    let s = format!("{x:.4}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// A real scalar the way `x = ...` prints it
pub fn format_real(x: f64) -> String {
    if let Some(s) = special(x) {
        return s.to_string();
    }
    if is_int(x) {
        if x.abs() >= 1e10 {
            return exponent(x);
        }
        return format!("{}", x as i64);
    }
    if needs_exponent(std::iter::once(x)) {
        return exponent(x);
    }
    let (_, rd) = real_format(x.abs());
    format!("{x:.rd$}")
}

/// Column-aligned rows of a real matrix
fn matrix_rows(a: &Array<f64>, indent: usize) -> Vec<String> {
    let finite: Vec<f64> = a.data().iter().copied().filter(|x| x.is_finite()).collect();
    let all_int = a.data().iter().all(|&x| is_int(x) || !x.is_finite());
    let max_abs = finite.iter().fold(0.0_f64, |m, x| m.max(x.abs()));

    let cells: Vec<String> = if all_int {
        a.data()
            .iter()
            .map(|&x| special(x).map(str::to_string).unwrap_or_else(|| format!("{}", x as i64)))
            .collect()
    } else if needs_exponent(finite.iter().copied()) {
        a.data()
            .iter()
            .map(|&x| special(x).map(str::to_string).unwrap_or_else(|| exponent(x)))
            .collect()
    } else {
        let (_, rd) = real_format(max_abs);
        a.data()
            .iter()
            .map(|&x| special(x).map(str::to_string).unwrap_or_else(|| format!("{x:.rd$}")))
            .collect()
    };

    let width = cells
        .iter()
        .map(|c| c.trim_start_matches('-').len())
        .max()
        .unwrap_or(1)
        + 3;
    let pad = " ".repeat(indent);
    (0..a.rows())
        .map(|r| {
            let mut line = pad.clone();
            for c in 0..a.cols() {
                let cell = &cells[c * a.rows() + r];
                line.push_str(&format!("{cell:>width$}"));
            }
            line
        })
        .collect()
}

fn bool_rows(a: &Array<bool>, indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    (0..a.rows())
        .map(|r| {
            let mut line = pad.clone();
            for c in 0..a.cols() {
                line.push_str(if *a.at(r, c) { "  1" } else { "  0" });
            }
            line
        })
        .collect()
}

fn empty_dims(v: &Value, opts: &DisplayOptions) -> String {
    if opts.print_empty_dimensions {
        let (r, c) = v.dims();
        format!("({r}x{c})")
    } else {
        String::new()
    }
}

fn handle_text(h: &FunctionHandle) -> String {
    match h {
        FunctionHandle::Named(name) => format!("@{name}"),
        FunctionHandle::Anonymous(_) => h.text(),
    }
}

/// Numeric view of anything that prints as a number grid
fn as_grid(v: &Value) -> Option<Array<f64>> {
    match v {
        Value::Num(a) => Some(a.clone()),
        Value::Range(r) => Some(r.to_array()),
        _ => None,
    }
}

/// `name = value` as printed for an unterminated statement
pub fn display(name: &str, v: &Value, opts: &DisplayOptions) -> String {
    let mut out = String::new();
    display_into(&mut out, name, v, 0, opts);
    out
}

fn display_into(out: &mut String, name: &str, v: &Value, indent: usize, opts: &DisplayOptions) {
    let pad = " ".repeat(indent);
    match v {
        Value::Cell(c) if c.is_empty() => {
            out.push_str(&format!("{pad}{name} = {{}}{}\n", empty_dims(v, opts)));
        }
        Value::Cell(c) => {
            out.push_str(&format!("{pad}{name} =\n{pad}{{\n"));
            for col in 0..c.cols() {
                for row in 0..c.rows() {
                    let label = format!("[{},{}]", row + 1, col + 1);
                    display_into(out, &label, c.at(row, col), indent + 2, opts);
                }
            }
            out.push_str(&format!("{pad}}}\n"));
            if indent == 0 {
                out.push('\n');
            }
        }
        Value::Struct(s) => {
            out.push_str(&format!("{pad}{name} =\n\n{pad}  scalar structure containing the fields:\n\n"));
            for (field, value) in s.iter() {
                display_into(out, field, value, indent + 4, opts);
            }
            if indent == 0 {
                out.push('\n');
            }
        }
        Value::Object(o) => {
            out.push_str(&format!("{pad}{name} =\n\n{pad}  <object {}>\n\n", o.class));
        }
        Value::Handle(h) => match h.as_ref() {
            FunctionHandle::Named(_) => out.push_str(&format!("{pad}{name} = {}\n", handle_text(h))),
            FunctionHandle::Anonymous(_) => {
                out.push_str(&format!("{pad}{name} =\n\n{pad}{}\n\n", handle_text(h)));
            }
        },
        Value::Str(s) if s.chars.rows() <= 1 => {
            let text: String = s.chars.data().iter().collect();
            out.push_str(&format!("{pad}{name} = {text}\n"));
        }
        Value::Str(_) => {
            out.push_str(&format!("{pad}{name} =\n\n"));
            for row in v.string_rows().unwrap_or_default() {
                out.push_str(&format!("{pad}{row}\n"));
            }
            out.push('\n');
        }
        Value::Bool(b) if b.is_scalar() => {
            out.push_str(&format!("{pad}{name} = {}\n", if b.data()[0] { 1 } else { 0 }));
        }
        Value::Bool(b) if b.is_empty() => {
            out.push_str(&format!("{pad}{name} = []{}\n", empty_dims(v, opts)));
        }
        Value::Bool(b) => {
            out.push_str(&format!("{pad}{name} =\n\n"));
            for line in bool_rows(b, indent) {
                out.push_str(&line);
                out.push('\n');
            }
            out.push('\n');
        }
        Value::CsList(values) => {
            for value in values {
                display_into(out, name, value, indent, opts);
            }
        }
        Value::MagicColon => out.push_str(&format!("{pad}{name} = :\n")),
        Value::Undefined => {}
        _ => {
            let Some(a) = as_grid(v) else { return };
            if a.is_empty() {
                out.push_str(&format!("{pad}{name} = []{}\n", empty_dims(v, opts)));
            } else if a.is_scalar() {
                out.push_str(&format!("{pad}{name} = {}\n", format_real(a.data()[0])));
            } else {
                out.push_str(&format!("{pad}{name} =\n\n"));
                for line in matrix_rows(&a, indent) {
                    out.push_str(&line);
                    out.push('\n');
                }
                out.push('\n');
            }
        }
    }
}

/// Value without its name, as printed by `disp`
pub fn disp(v: &Value, opts: &DisplayOptions) -> String {
    match v {
        Value::Str(_) => v
            .string_rows()
            .unwrap_or_default()
            .into_iter()
            .map(|row| row + "\n")
            .collect(),
        Value::Bool(b) if b.is_scalar() => format!("{}\n", if b.data()[0] { 1 } else { 0 }),
        Value::Bool(b) => bool_rows(b, 0).into_iter().map(|l| l + "\n").collect(),
        Value::Handle(h) => format!("{}\n", handle_text(h)),
        Value::Cell(c) if c.is_empty() => format!("{{}}{}\n", empty_dims(v, opts)),
        Value::Cell(_) | Value::Struct(_) | Value::Object(_) => {
            // drop the `name =` header line
            let text = display("", v, opts);
            let body = text.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
            body.trim_start_matches('\n').to_string()
        }
        Value::CsList(values) => values.iter().map(|x| disp(x, opts)).collect(),
        _ => match as_grid(v) {
            Some(a) if a.is_empty() => String::new(),
            Some(a) if a.is_scalar() => format!("{}\n", format_real(a.data()[0])),
            Some(a) => matrix_rows(&a, 0).into_iter().map(|l| l + "\n").collect(),
            None => String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{StructValue, Value};

    fn show(name: &str, v: &Value) -> String {
        display(name, v, &DisplayOptions::default())
    }

    #[test]
    fn test_scalars() {
        assert_eq!(show("x", &Value::scalar(5.0)), "x = 5\n");
        assert_eq!(show("x", &Value::scalar(std::f64::consts::PI)), "x = 3.1416\n");
        assert_eq!(show("x", &Value::scalar(0.5)), "x = 0.5000\n");
        assert_eq!(show("x", &Value::scalar(123456.7)), "x = 1.2346e+05\n");
        assert_eq!(show("x", &Value::scalar(f64::NAN)), "x = NaN\n");
    }

    #[test]
    fn test_integer_matrix() {
        assert_eq!(
            show("x", &Value::row(vec![1.0, 2.0, 3.0])),
            "x =\n\n   1   2   3\n\n"
        );
        assert_eq!(show("x", &Value::row(vec![-1.0, 2.0])), "x =\n\n  -1   2\n\n");
    }

    #[test]
    fn test_empty_and_strings() {
        assert_eq!(show("x", &Value::empty()), "x = [](0x0)\n");
        let opts = DisplayOptions {
            print_empty_dimensions: false,
        };
        assert_eq!(display("x", &Value::empty(), &opts), "x = []\n");
        assert_eq!(show("s", &Value::string("hello")), "s = hello\n");
    }

    #[test]
    fn test_cell_display() {
        let c = Value::cell_row(vec![Value::scalar(1.0), Value::string("abc")]);
        assert_eq!(show("c", &c), "c =\n{\n  [1,1] = 1\n  [1,2] = abc\n}\n\n");
        assert_eq!(show("c", &Value::empty_cell()), "c = {}(0x0)\n");
    }

    #[test]
    fn test_struct_display() {
        let s: StructValue = [("a", Value::scalar(1.0))].into_iter().collect();
        assert_eq!(
            show("s", &Value::Struct(s)),
            "s =\n\n  scalar structure containing the fields:\n\n    a = 1\n\n"
        );
    }

    #[test]
    fn test_disp_forms() {
        let opts = DisplayOptions::default();
        assert_eq!(disp(&Value::scalar(42.0), &opts), "42\n");
        assert_eq!(disp(&Value::string("boom"), &opts), "boom\n");
        assert_eq!(disp(&Value::row(vec![1.0, 2.0]), &opts), "   1   2\n");
    }

    #[test]
    fn test_format_scalar_short() {
        assert_eq!(format_scalar_short(1.5), "1.5");
        assert_eq!(format_scalar_short(3.0), "3");
    }
}
