//! printf-style formatting
//!
//! The template is applied to the flattened arguments: numeric arrays
//! contribute one datum per element, character arrays one string. A `%s`
//! consumes a whole string; a numeric conversion consumes one character
//! of it. The template is reused while data remains.

use crate::interp::ExecutionError;
use crate::value::Value;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
}

#[derive(Debug, Clone, Copy)]
enum Count {
    Fixed(usize),
    /// `*`: taken from the data
    Star,
}

#[derive(Debug, Clone, Copy)]
struct Conversion {
    flags: Flags,
    width: Option<Count>,
    precision: Option<Count>,
    kind: char,
}

#[derive(Debug, Clone)]
enum Element {
    Text(String),
    Conv(Conversion),
}

#[derive(Debug, Clone)]
enum Datum {
    Text(Vec<char>),
    Num(f64),
}

/// Replace backslash escape sequences
pub fn do_string_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(d @ '0'..='7') => {
                let mut code = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(v) => {
                            code = code * 8 + v;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(code));
            }
            Some('x') => {
                let mut code = 0;
                let mut digits = 0;
                while digits < 2 {
                    match chars.peek().and_then(|c| c.to_digit(16)) {
                        Some(v) => {
                            code = code * 16 + v;
                            chars.next();
                            digits += 1;
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    out.push_str("\\x");
                } else {
                    out.extend(char::from_u32(code));
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Template text of a format argument; single-quoted strings get escapes processed
pub fn template_text(v: &Value) -> Option<String> {
    let text = v.as_string()?;
    Some(match v {
        Value::Str(s) if !s.double_quoted => do_string_escapes(&text),
        _ => text,
    })
}

fn parse_template(template: &str) -> Vec<Element> {
    let chars: Vec<char> = template.chars().collect();
    let mut elements = Vec::new();
    let mut text = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '%' {
            text.push(chars[i]);
            i += 1;
            continue;
        }
        if chars.get(i + 1) == Some(&'%') {
            text.push('%');
            i += 2;
            continue;
        }
        let start = i;
        i += 1;
        let mut flags = Flags::default();
        while let Some(&c) = chars.get(i) {
            match c {
                '-' => flags.left = true,
                '+' => flags.plus = true,
                ' ' => flags.space = true,
                '0' => flags.zero = true,
                '#' => flags.alt = true,
                _ => break,
            }
            i += 1;
        }
        let count = |i: &mut usize| -> Option<Count> {
            if chars.get(*i) == Some(&'*') {
                *i += 1;
                return Some(Count::Star);
            }
            let begin = *i;
            while chars.get(*i).is_some_and(char::is_ascii_digit) {
                *i += 1;
            }
            let digits: String = chars[begin..*i].iter().collect();
            digits.parse().ok().map(Count::Fixed)
        };
        let width = count(&mut i);
        let precision = if chars.get(i) == Some(&'.') {
            i += 1;
            Some(count(&mut i).unwrap_or(Count::Fixed(0)))
        } else {
            None
        };
        while chars.get(i).is_some_and(|c| matches!(c, 'l' | 'h' | 'L')) {
            i += 1;
        }
        match chars.get(i) {
            Some(&kind) if "diouxXfFeEgGcs".contains(kind) => {
                if !text.is_empty() {
                    elements.push(Element::Text(std::mem::take(&mut text)));
                }
                elements.push(Element::Conv(Conversion {
                    flags,
                    width,
                    precision,
                    kind,
                }));
                i += 1;
            }
            // not a conversion: keep it as text
            _ => {
                let end = (i + 1).min(chars.len());
                text.extend(&chars[start..end]);
                i = end;
            }
        }
    }
    if !text.is_empty() {
        elements.push(Element::Text(text));
    }
    elements
}

fn collect_data(who: &str, args: &[Value]) -> Result<VecDeque<Datum>, ExecutionError> {
    let mut data = VecDeque::new();
    for arg in args {
        match arg {
            Value::Str(s) => {
                if !s.chars.is_empty() {
                    data.push_back(Datum::Text(s.chars.data().to_vec()));
                }
            }
            Value::Num(_) | Value::Bool(_) | Value::Range(_) => {
                let values = arg.to_numeric()?;
                data.extend(values.data().iter().map(|&x| Datum::Num(x)));
            }
            Value::CsList(list) => data.extend(collect_data(who, list)?),
            other => {
                let desc = match other {
                    Value::Cell(_) => "cell array",
                    _ => other.type_desc(),
                };
                return Err(ExecutionError::general(format!(
                    "{who}: wrong type argument '{desc}'"
                )));
            }
        }
    }
    Ok(data)
}

/// Next datum as a number; a string gives up its first character
fn next_number(data: &mut VecDeque<Datum>) -> Option<f64> {
    match data.pop_front()? {
        Datum::Num(x) => Some(x),
        Datum::Text(mut chars) => {
            let first = chars.remove(0);
            if !chars.is_empty() {
                data.push_front(Datum::Text(chars));
            }
            Some(first as u32 as f64)
        }
    }
}

/// Format `args` with `template`
pub fn format(who: &str, template: &str, args: &[Value]) -> Result<String, ExecutionError> {
    let elements = parse_template(template);
    let mut data = collect_data(who, args)?;
    let has_conversions = elements.iter().any(|e| matches!(e, Element::Conv(_)));
    let no_data = data.is_empty();
    let mut out = String::new();
    loop {
        let mut exhausted = false;
        for element in &elements {
            match element {
                Element::Text(t) => out.push_str(t),
                Element::Conv(conv) => {
                    if no_data || exhausted {
                        continue;
                    }
                    match convert(conv, &mut data) {
                        Some(text) => out.push_str(&text),
                        None => exhausted = true,
                    }
                }
            }
        }
        if no_data || exhausted || data.is_empty() || !has_conversions {
            break;
        }
    }
    Ok(out)
}

fn resolve_count(count: Option<Count>, data: &mut VecDeque<Datum>) -> Option<Option<usize>> {
    match count {
        None => Some(None),
        Some(Count::Fixed(n)) => Some(Some(n)),
        Some(Count::Star) => {
            let n = next_number(data)?;
            Some(Some(n.max(0.0) as usize))
        }
    }
}

/// Text of one conversion, or `None` when the data ran out
fn convert(conv: &Conversion, data: &mut VecDeque<Datum>) -> Option<String> {
    let width = resolve_count(conv.width, data)?;
    let precision = resolve_count(conv.precision, data)?;
    let flags = conv.flags;

    if conv.kind == 's' {
        let text: String = match data.pop_front()? {
            Datum::Text(chars) => chars.into_iter().collect(),
            Datum::Num(x) => number_as_text(x),
        };
        let text = match precision {
            Some(p) => text.chars().take(p).collect(),
            None => text,
        };
        return Some(pad(text, width, flags.left, false));
    }

    let x = next_number(data)?;
    if conv.kind == 'c' {
        let text = char::from_u32(x as u32).map(String::from).unwrap_or_default();
        return Some(pad(text, width, flags.left, false));
    }
    Some(format_number(conv.kind, flags, width, precision, x))
}

/// `%s` of a number: a character code prints as that character
fn number_as_text(x: f64) -> String {
    if x.fract() == 0.0
        && (0.0..=0x10FFFF as f64).contains(&x)
        && let Some(c) = char::from_u32(x as u32)
    {
        return c.to_string();
    }
    format_general(x, 5, Flags::default())
}

fn sign_prefix(negative: bool, flags: Flags) -> &'static str {
    if negative {
        "-"
    } else if flags.plus {
        "+"
    } else if flags.space {
        " "
    } else {
        ""
    }
}

fn pad(body: String, width: Option<usize>, left: bool, zero: bool) -> String {
    let Some(width) = width else {
        return body;
    };
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = width - len;
    if left {
        return body + &" ".repeat(fill);
    }
    if zero {
        // zeros go after the sign
        let sign_len = body
            .chars()
            .take_while(|c| matches!(c, '-' | '+' | ' '))
            .count();
        let (sign, digits) = body.split_at(sign_len);
        return format!("{sign}{}{digits}", "0".repeat(fill));
    }
    " ".repeat(fill) + &body
}

fn format_number(kind: char, flags: Flags, width: Option<usize>, precision: Option<usize>, x: f64) -> String {
    if !x.is_finite() {
        let text = if x.is_nan() {
            "NaN".to_string()
        } else {
            format!("{}Inf", sign_prefix(x < 0.0, flags))
        };
        return pad(text, width, flags.left, false);
    }
    let negative = x < 0.0;
    let sign = sign_prefix(negative, flags);
    let a = x.abs();
    let is_int = x.fract() == 0.0;
    let body = match kind {
        'd' | 'i' | 'u' if is_int => format!("{sign}{a:.0}"),
        'd' | 'i' | 'u' | 'o' | 'x' | 'X' if !is_int => {
            // non-integers switch to a floating format
            format_general(x, precision.unwrap_or(6).max(1), flags)
        }
        'o' => format!("{sign}{:o}", a as u64),
        'x' => format!("{sign}{}{:x}", if flags.alt { "0x" } else { "" }, a as u64),
        'X' => format!("{sign}{}{:X}", if flags.alt { "0X" } else { "" }, a as u64),
        'f' | 'F' => {
            let p = precision.unwrap_or(6);
            let digits = format!("{a:.p$}");
            let digits = if flags.alt && p == 0 { digits + "." } else { digits };
            format!("{sign}{digits}")
        }
        'e' | 'E' => {
            let body = format_exp(a, precision.unwrap_or(6), flags.alt);
            let body = if kind == 'E' { body.to_uppercase() } else { body };
            format!("{sign}{body}")
        }
        _ => {
            let body = format_general(x, precision.unwrap_or(6), flags);
            if kind == 'G' { body.to_uppercase() } else { body }
        }
    };
    pad(body, width, flags.left, flags.zero && !flags.left)
}

/// `%e` digits of a non-negative number
fn format_exp(a: f64, precision: usize, alt: bool) -> String {
    let text = format!("{a:.precision$e}");
    let (mantissa, exp) = text.split_once('e').unwrap_or((text.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let mantissa = if alt && precision == 0 {
        format!("{mantissa}.")
    } else {
        mantissa.to_string()
    };
    format!(
        "{mantissa}e{}{:02}",
        if exp < 0 { '-' } else { '+' },
        exp.abs()
    )
}

/// `%g`: fixed or exponent form, whichever is shorter, trailing zeros dropped
fn format_general(x: f64, precision: usize, flags: Flags) -> String {
    let sign = sign_prefix(x < 0.0, flags);
    let a = x.abs();
    let p = precision.max(1);
    let exp = if a == 0.0 {
        0
    } else {
        let text = format!("{a:.prec$e}", prec = p - 1);
        text.split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };
    let mut body = if exp < -4 || exp >= p as i32 {
        format_exp(a, p - 1, flags.alt)
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        format!("{a:.decimals$}")
    };
    if !flags.alt {
        body = strip_trailing_zeros(&body);
    }
    format!("{sign}{body}")
}

fn strip_trailing_zeros(s: &str) -> String {
    let (mantissa, exp) = match s.find('e') {
        Some(i) => s.split_at(i),
        None => (s, ""),
    };
    if !mantissa.contains('.') {
        return s.to_string();
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{exp}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fmt(template: &str, args: &[Value]) -> String {
        format("sprintf", template, args).unwrap()
    }

    #[test]
    fn test_basic_conversions() {
        assert_eq!(fmt("%d|%5.2f|%s", &[Value::scalar(3.0), Value::scalar(2.5), Value::string("ab")]), "3| 2.50|ab");
        assert_eq!(fmt("%-4d|", &[Value::scalar(7.0)]), "7   |");
        assert_eq!(fmt("%05d", &[Value::scalar(-42.0)]), "-0042");
        assert_eq!(fmt("%x %o %c", &[Value::scalar(255.0), Value::scalar(8.0), Value::scalar(65.0)]), "ff 10 A");
        assert_eq!(fmt("100%%", &[]), "100%");
    }

    #[test]
    fn test_general_and_exponent() {
        assert_eq!(fmt("%g", &[Value::scalar(0.0001)]), "0.0001");
        assert_eq!(fmt("%g", &[Value::scalar(1e-5)]), "1e-05");
        assert_eq!(fmt("%g", &[Value::scalar(123456789.0)]), "1.23457e+08");
        assert_eq!(fmt("%e", &[Value::scalar(1234.5)]), "1.234500e+03");
        assert_eq!(fmt("%d", &[Value::scalar(1.5)]), "1.5");
    }

    #[test]
    fn test_template_recycles_over_data() {
        assert_eq!(fmt("%d,", &[Value::row(vec![1.0, 2.0, 3.0])]), "1,2,3,");
        assert_eq!(fmt("%s and %s", &[Value::string("a")]), "a and ");
        assert_eq!(fmt("[%d]", &[]), "[]");
    }

    #[test]
    fn test_numeric_conversion_of_string_uses_codes() {
        assert_eq!(fmt("%d ", &[Value::string("ab")]), "97 98 ");
    }

    #[test]
    fn test_inf_and_nan() {
        assert_eq!(fmt("%d %f", &[Value::scalar(f64::INFINITY), Value::scalar(f64::NAN)]), "Inf NaN");
    }

    #[test]
    fn test_escapes() {
        assert_eq!(do_string_escapes(r"a\tb\n\101"), "a\tb\nA");
        assert_eq!(template_text(&Value::string(r"x\n")).unwrap(), "x\n");
        assert_eq!(template_text(&Value::dq_string(r"x\n")).unwrap(), "x\\n");
    }

    #[test]
    fn test_cell_argument_rejected() {
        let err = format("printf", "%d", &[Value::empty_cell()]).unwrap_err();
        assert_eq!(err.message, "printf: wrong type argument 'cell array'");
    }
}
