//! Operators and concatenation

use super::{Array, CharArray, Value, ValueError, ValueResult};
use crate::ast::{BinOp, CompoundOp};

/// Unary operators applied to a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    Transpose,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::Transpose => "transpose",
        };
        write!(f, "{s}")
    }
}

fn binary_type_error(op: impl std::fmt::Display, a: &Value, b: &Value) -> ValueError {
    ValueError::type_error(format!(
        "binary operator '{op}' not implemented for '{}' by '{}' operations",
        a.type_desc(),
        b.type_desc()
    ))
}

/// Numeric operand, or the operator's type error
fn numeric_operand(op: BinOp, v: &Value, a: &Value, b: &Value) -> ValueResult<Array<f64>> {
    match v {
        Value::Num(_) | Value::Bool(_) | Value::Str(_) | Value::Range(_) => v.to_numeric(),
        _ => Err(binary_type_error(op, a, b)),
    }
}

/// Element-wise combination with scalar expansion and broadcasting
fn broadcast<T: Clone, U: Clone>(
    op: &str,
    a: &Array<T>,
    b: &Array<T>,
    f: impl Fn(&T, &T) -> U,
) -> ValueResult<Array<U>> {
    let (ar, ac) = a.dims();
    let (br, bc) = b.dims();
    let rows = match (ar, br) {
        _ if ar == br => ar,
        (1, _) => br,
        (_, 1) => ar,
        _ => return Err(ValueError::nonconformant(op, a.dims(), b.dims())),
    };
    let cols = match (ac, bc) {
        _ if ac == bc => ac,
        (1, _) => bc,
        (_, 1) => ac,
        _ => return Err(ValueError::nonconformant(op, a.dims(), b.dims())),
    };
    let mut data = Vec::with_capacity(rows * cols);
    for c in 0..cols {
        for r in 0..rows {
            let x = a.at(if ar == 1 { 0 } else { r }, if ac == 1 { 0 } else { c });
            let y = b.at(if br == 1 { 0 } else { r }, if bc == 1 { 0 } else { c });
            data.push(f(x, y));
        }
    }
    Ok(Array::new(rows, cols, data))
}

fn matmul(a: &Array<f64>, b: &Array<f64>) -> ValueResult<Array<f64>> {
    if a.is_scalar() || b.is_scalar() {
        return broadcast("*", a, b, |x, y| x * y);
    }
    if a.cols() != b.rows() {
        return Err(ValueError::nonconformant("*", a.dims(), b.dims()));
    }
    let (n, m, p) = (a.rows(), a.cols(), b.cols());
    let mut data = vec![0.0; n * p];
    for j in 0..p {
        for i in 0..n {
            data[j * n + i] = (0..m).map(|k| a.at(i, k) * b.at(k, j)).sum();
        }
    }
    Ok(Array::new(n, p, data))
}

fn power(a: &Array<f64>, b: &Array<f64>) -> ValueResult<Array<f64>> {
    if a.is_scalar() && b.is_scalar() {
        return Ok(Array::scalar(a.data()[0].powf(b.data()[0])));
    }
    if b.is_scalar() && a.rows() == a.cols() {
        let e = b.data()[0];
        if e.fract() == 0.0 && e >= 0.0 {
            let n = a.rows();
            let mut result = Array::new(
                n,
                n,
                (0..n * n).map(|k| if k % (n + 1) == 0 { 1.0 } else { 0.0 }).collect(),
            );
            for _ in 0..e as usize {
                result = matmul(&result, a)?;
            }
            return Ok(result);
        }
    }
    Err(ValueError::general(
        "for x^y, only square matrix arguments are permitted and one argument must be scalar.  Use .^ for elementwise power.",
    ))
}

fn to_bool(v: &Value, op: impl std::fmt::Display, a: &Value, b: &Value) -> ValueResult<Array<bool>> {
    match v {
        Value::Bool(x) => Ok(x.clone()),
        Value::Num(_) | Value::Str(_) | Value::Range(_) => {
            let n = v.to_numeric()?;
            if n.data().iter().any(|x| x.is_nan()) {
                return Err(ValueError::type_error("logical conversion from NaN value"));
            }
            Ok(n.map(|&x| x != 0.0))
        }
        _ => Err(binary_type_error(op, a, b)),
    }
}

fn logical_op(op: BinOp, a: &Value, b: &Value) -> ValueResult<Value> {
    let x = to_bool(a, op, a, b)?;
    let y = to_bool(b, op, a, b)?;
    let r = match op {
        BinOp::ElAnd => broadcast(&op.to_string(), &x, &y, |p, q| *p && *q)?,
        _ => broadcast(&op.to_string(), &x, &y, |p, q| *p || *q)?,
    };
    Ok(Value::Bool(r))
}

/// `a op b`
pub fn binary_op(op: BinOp, a: &Value, b: &Value) -> ValueResult<Value> {
    if matches!(op, BinOp::ElAnd | BinOp::ElOr) {
        return logical_op(op, a, b);
    }

    let x = numeric_operand(op, a, a, b)?;
    let y = numeric_operand(op, b, a, b)?;
    let name = op.to_string();
    let num = |r: Array<f64>| -> ValueResult<Value> { Ok(Value::Num(r)) };
    let cmp = |f: fn(&f64, &f64) -> bool| -> ValueResult<Value> {
        Ok(Value::Bool(broadcast(&name, &x, &y, f)?))
    };
    match op {
        BinOp::Add => num(broadcast(&name, &x, &y, |p, q| p + q)?),
        BinOp::Sub => num(broadcast(&name, &x, &y, |p, q| p - q)?),
        BinOp::ElMul => num(broadcast(&name, &x, &y, |p, q| p * q)?),
        BinOp::ElDiv => num(broadcast(&name, &x, &y, |p, q| p / q)?),
        BinOp::ElLeftDiv => num(broadcast(&name, &x, &y, |p, q| q / p)?),
        BinOp::ElPow => num(broadcast(&name, &x, &y, |p, q| p.powf(*q))?),
        BinOp::Mul => num(matmul(&x, &y)?),
        BinOp::Div => {
            if !y.is_scalar() {
                return Err(ValueError::general(format!(
                    "operator /: only division by a scalar is supported (op2 is {}x{})",
                    y.rows(),
                    y.cols()
                )));
            }
            num(broadcast(&name, &x, &y, |p, q| p / q)?)
        }
        BinOp::LeftDiv => {
            if !x.is_scalar() {
                return Err(ValueError::general(format!(
                    "operator \\: only a scalar left operand is supported (op1 is {}x{})",
                    x.rows(),
                    x.cols()
                )));
            }
            num(broadcast(&name, &x, &y, |p, q| q / p)?)
        }
        BinOp::Pow => num(power(&x, &y)?),
        BinOp::Lt => cmp(|p, q| p < q),
        BinOp::Le => cmp(|p, q| p <= q),
        BinOp::Eq => cmp(|p, q| p == q),
        BinOp::Ne => cmp(|p, q| p != q),
        BinOp::Ge => cmp(|p, q| p >= q),
        BinOp::Gt => cmp(|p, q| p > q),
        BinOp::ElAnd | BinOp::ElOr => logical_op(op, a, b),
    }
}

/// `op a`
pub fn unary_op(op: UnaryOp, a: &Value) -> ValueResult<Value> {
    match (op, a) {
        (UnaryOp::Transpose, Value::Cell(c)) => Ok(Value::Cell(c.transpose())),
        (UnaryOp::Transpose, Value::Str(s)) => Ok(Value::Str(CharArray {
            chars: s.chars.transpose(),
            double_quoted: s.double_quoted,
        })),
        (UnaryOp::Transpose, Value::Bool(b)) => Ok(Value::Bool(b.transpose())),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(b.map(|x| !x))),
        (UnaryOp::Plus, Value::Bool(_)) => Ok(Value::Num(a.to_numeric()?)),
        (_, Value::Num(_) | Value::Bool(_) | Value::Str(_) | Value::Range(_)) => {
            let x = a.to_numeric()?;
            match op {
                UnaryOp::Neg => Ok(Value::Num(x.map(|v| -v))),
                UnaryOp::Plus => Ok(Value::Num(x)),
                UnaryOp::Not => {
                    if x.data().iter().any(|v| v.is_nan()) {
                        return Err(ValueError::type_error("logical conversion from NaN value"));
                    }
                    Ok(Value::Bool(x.map(|&v| v == 0.0)))
                }
                UnaryOp::Transpose => Ok(Value::Num(x.transpose())),
            }
        }
        _ => Err(ValueError::type_error(format!(
            "unary operator '{op}' not implemented for '{}' operations",
            a.type_desc()
        ))),
    }
}

/// Fused operator, evaluated as its two-step equivalent
pub fn compound_op(op: CompoundOp, a: &Value, b: &Value) -> ValueResult<Value> {
    let t = |v: &Value| unary_op(UnaryOp::Transpose, v);
    let n = |v: &Value| unary_op(UnaryOp::Not, v);
    match op {
        CompoundOp::TransMul => binary_op(BinOp::Mul, &t(a)?, b),
        CompoundOp::MulTrans => binary_op(BinOp::Mul, a, &t(b)?),
        CompoundOp::TransLeftDiv => binary_op(BinOp::LeftDiv, &t(a)?, b),
        CompoundOp::NotAnd => binary_op(BinOp::ElAnd, &n(a)?, b),
        CompoundOp::NotOr => binary_op(BinOp::ElOr, &n(a)?, b),
        CompoundOp::AndNot => binary_op(BinOp::ElAnd, a, &n(b)?),
        CompoundOp::OrNot => binary_op(BinOp::ElOr, a, &n(b)?),
    }
}

/// `base:increment:limit` from evaluated operands
pub fn make_range(base: &Value, increment: Option<&Value>, limit: &Value) -> ValueResult<Value> {
    let scalar = |v: &Value| -> ValueResult<f64> {
        let a = v.to_numeric()?;
        match a.data().first() {
            Some(x) => Ok(*x),
            None => Err(ValueError::general("invalid use of an empty matrix in a range")),
        }
    };
    let range = super::Range {
        base: scalar(base)?,
        increment: match increment {
            Some(v) => scalar(v)?,
            None => 1.0,
        },
        limit: scalar(limit)?,
    };
    range.check_size()?;
    Ok(Value::Range(range))
}

// ============================================================================
// Concatenation
// ============================================================================

/// `[...]` from evaluated rows
pub fn concat(rows: Vec<Vec<Value>>, fill_char: char) -> ValueResult<Value> {
    let all: Vec<&Value> = rows.iter().flatten().collect();
    if all.is_empty() {
        return Ok(Value::empty());
    }

    if all.iter().any(|v| v.is_cell()) {
        let cell_rows = rows
            .into_iter()
            .map(|row| {
                let parts = row
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Cell(c) => Some(c),
                        v if v.is_null_matrix() => None,
                        v => Some(Array::scalar(v)),
                    })
                    .collect();
                Array::hcat(parts)
            })
            .collect::<ValueResult<Vec<_>>>()?;
        return Ok(Value::Cell(Array::vcat(cell_rows)?));
    }

    if all.len() == 1 {
        if let Value::Struct(_) | Value::Object(_) | Value::Handle(_) = all[0] {
            return Ok(all[0].clone());
        }
    }
    if let Some(bad) = all
        .iter()
        .find(|v| matches!(v, Value::Struct(_) | Value::Object(_) | Value::Handle(_)))
    {
        return Err(ValueError::type_error(format!(
            "concatenation operator not implemented for '{}' by 'matrix' operations",
            bad.type_desc()
        )));
    }

    if all.iter().any(|v| matches!(v, Value::Str(_))) {
        let double_quoted = all
            .iter()
            .any(|v| matches!(v, Value::Str(s) if s.double_quoted));
        let all_strings = all.iter().all(|v| matches!(v, Value::Str(_)));
        let mut char_rows = rows
            .into_iter()
            .map(|row| {
                let parts = row
                    .into_iter()
                    .map(|v| match v {
                        Value::Str(s) => Ok(s.chars),
                        other => Ok(other
                            .to_numeric()?
                            .map(|&x| char::from_u32(x as u32).unwrap_or('\0'))),
                    })
                    .collect::<ValueResult<Vec<_>>>()?;
                Array::hcat(parts)
            })
            .collect::<ValueResult<Vec<_>>>()?;
        if all_strings {
            let width = char_rows.iter().map(|r| r.cols()).max().unwrap_or(0);
            for r in &mut char_rows {
                if r.cols() < width && !r.is_empty() {
                    let mut padded: Vec<Vec<char>> = (0..r.rows()).map(|i| r.row_values(i)).collect();
                    for line in &mut padded {
                        line.resize(width, fill_char);
                    }
                    let parts = padded.into_iter().map(Array::row).collect();
                    *r = Array::vcat(parts)?;
                }
            }
        }
        return Ok(Value::Str(CharArray {
            chars: Array::vcat(char_rows)?,
            double_quoted,
        }));
    }

    if all.iter().all(|v| matches!(v, Value::Bool(_))) {
        let bool_rows = rows
            .into_iter()
            .map(|row| {
                let parts = row
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Bool(b) => Some(b),
                        _ => None,
                    })
                    .collect();
                Array::hcat(parts)
            })
            .collect::<ValueResult<Vec<_>>>()?;
        return Ok(Value::Bool(Array::vcat(bool_rows)?));
    }

    let num_rows = rows
        .into_iter()
        .map(|row| {
            let parts = row.iter().map(Value::to_numeric).collect::<ValueResult<Vec<_>>>()?;
            Array::hcat(parts)
        })
        .collect::<ValueResult<Vec<_>>>()?;
    Ok(Value::Num(Array::vcat(num_rows)?))
}

/// `{...}` from evaluated rows; cell elements concatenate, others nest
pub fn cell_concat(rows: Vec<Vec<Value>>) -> ValueResult<Value> {
    let cell_rows = rows
        .into_iter()
        .map(|row| {
            let parts = row
                .into_iter()
                .map(|v| match v {
                    Value::Cell(c) => c,
                    v => Array::scalar(v),
                })
                .collect();
            Array::hcat(parts)
        })
        .collect::<ValueResult<Vec<_>>>()?;
    Ok(Value::Cell(Array::vcat(cell_rows)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: &Value) -> Vec<f64> {
        v.to_numeric().unwrap().into_data()
    }

    #[test]
    fn test_scalar_arithmetic() {
        let r = binary_op(BinOp::Mul, &Value::scalar(21.0), &Value::scalar(2.0)).unwrap();
        assert_eq!(num(&r), vec![42.0]);
        let r = binary_op(BinOp::Pow, &Value::scalar(2.0), &Value::scalar(10.0)).unwrap();
        assert_eq!(num(&r), vec![1024.0]);
    }

    #[test]
    fn test_broadcast_row_and_column() {
        let row = Value::row(vec![1.0, 2.0]);
        let col = Value::Num(Array::column(vec![10.0, 20.0]));
        let r = binary_op(BinOp::Add, &row, &col).unwrap();
        assert_eq!(r.dims(), (2, 2));
        assert_eq!(num(&r), vec![11.0, 21.0, 12.0, 22.0]);
    }

    #[test]
    fn test_nonconformant_message() {
        let err = binary_op(
            BinOp::Add,
            &Value::row(vec![1.0, 2.0, 3.0]),
            &Value::row(vec![1.0, 2.0]),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "operator +: nonconformant arguments (op1 is 1x3, op2 is 1x2)"
        );
    }

    #[test]
    fn test_matrix_multiply() {
        let a = Value::Num(Array::new(2, 2, vec![1.0, 3.0, 2.0, 4.0]));
        let r = binary_op(BinOp::Mul, &a, &a).unwrap();
        assert_eq!(num(&r), vec![7.0, 15.0, 10.0, 22.0]);
    }

    #[test]
    fn test_binary_type_error() {
        let err = binary_op(BinOp::Add, &Value::empty_cell(), &Value::scalar(1.0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "binary operator '+' not implemented for 'cell' by 'double' operations"
        );
    }

    #[test]
    fn test_comparison_yields_logical() {
        let r = binary_op(BinOp::Eq, &Value::scalar(2.0), &Value::scalar(2.0)).unwrap();
        assert!(matches!(r, Value::Bool(_)));
        assert!(r.is_true().unwrap());
    }

    #[test]
    fn test_unary_not_and_transpose() {
        let r = unary_op(UnaryOp::Not, &Value::row(vec![0.0, 2.0])).unwrap();
        assert!(matches!(&r, Value::Bool(b) if b.data() == [true, false]));
        let t = unary_op(UnaryOp::Transpose, &Value::row(vec![1.0, 2.0])).unwrap();
        assert_eq!(t.dims(), (2, 1));
    }

    #[test]
    fn test_concat_strings_pads_rows() {
        let rows = vec![
            vec![Value::string("these")],
            vec![Value::string("are")],
            vec![Value::string("strings")],
        ];
        let v = concat(rows, 'X').unwrap();
        assert_eq!(
            v.string_rows().unwrap(),
            vec!["theseXX".to_string(), "areXXXX".into(), "strings".into()]
        );
    }

    #[test]
    fn test_concat_empty_and_cell() {
        let v = concat(vec![vec![Value::empty(), Value::cell_row(vec![Value::scalar(1.0)])]], ' ').unwrap();
        assert!(v.is_cell());
        assert_eq!(v.dims(), (1, 1));
    }

    #[test]
    fn test_concat_numbers_and_ranges() {
        let r = make_range(&Value::scalar(1.0), None, &Value::scalar(3.0)).unwrap();
        let v = concat(vec![vec![r, Value::scalar(4.0)]], ' ').unwrap();
        assert_eq!(num(&v), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
