//! Runtime values: arrays, strings, cells, structs, objects and function handles

mod array;
pub mod display;
pub mod ops;

pub use array::{Array, Idx, MAX_ARRAY_ELEMENTS, checked_numel};

use crate::ast::{Expr, Param, Spanned};
use std::rc::Rc;
use thiserror::Error;

/// Failure of a value operation; the evaluator turns it into an execution error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("{0}")]
    General(String),
    #[error("{0}")]
    Index(String),
    #[error("{0}")]
    Type(String),
    #[error("{}({position}): out of bound {bound} (dimensions are {}x{})", variable.as_deref().unwrap_or("index "), dims.0, dims.1)]
    OutOfBound {
        variable: Option<String>,
        position: String,
        bound: usize,
        dims: (usize, usize),
    },
    #[error("out of memory or dimension too large for Octave's index type")]
    OutOfMemory,
}

impl ValueError {
    pub fn general(message: impl Into<String>) -> Self {
        ValueError::General(message.into())
    }

    pub fn index(message: impl Into<String>) -> Self {
        ValueError::Index(message.into())
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        ValueError::Type(message.into())
    }

    pub fn out_of_bound(position: String, bound: usize, dims: (usize, usize)) -> Self {
        ValueError::OutOfBound {
            variable: None,
            position,
            bound,
            dims,
        }
    }

    pub fn nonconformant(op: &str, a: (usize, usize), b: (usize, usize)) -> Self {
        ValueError::General(format!(
            "operator {op}: nonconformant arguments (op1 is {}x{}, op2 is {}x{})",
            a.0, a.1, b.0, b.1
        ))
    }

    /// Name the indexed variable in an out-of-bound message
    pub fn with_variable(self, name: &str) -> Self {
        match self {
            ValueError::OutOfBound {
                position,
                bound,
                dims,
                ..
            } => ValueError::OutOfBound {
                variable: Some(name.to_string()),
                position,
                bound,
                dims,
            },
            other => other,
        }
    }

    pub fn is_index_error(&self) -> bool {
        matches!(self, ValueError::Index(_) | ValueError::OutOfBound { .. })
    }
}

pub type ValueResult<T> = Result<T, ValueError>;

/// Ordered list of values: function arguments and results
pub type ValueList = Vec<Value>;

/// Character array; strings are 1xN rows
#[derive(Debug, Clone, PartialEq)]
pub struct CharArray {
    pub chars: Array<char>,
    pub double_quoted: bool,
}

/// Scalar struct with fields in insertion order
#[derive(Debug, Clone, Default)]
pub struct StructValue {
    fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for StructValue {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        let mut s = StructValue::new();
        for (name, value) in iter {
            s.set(name, value);
        }
        s
    }
}

/// Instance of a user class
#[derive(Debug, Clone)]
pub struct Object {
    pub class: String,
    pub fields: StructValue,
}

/// Lazy `base:increment:limit`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub base: f64,
    pub increment: f64,
    pub limit: f64,
}

impl Range {
    pub fn numel(&self) -> usize {
        // make_range refuses counts past the element limit
        self.count().min(MAX_ARRAY_ELEMENTS as f64) as usize
    }

    /// Element count before any limit; infinite for `1:Inf`
    fn count(&self) -> f64 {
        if self.increment == 0.0
            || self.base.is_nan()
            || self.limit.is_nan()
            || self.increment.is_nan()
            || (self.increment > 0.0 && self.base > self.limit)
            || (self.increment < 0.0 && self.base < self.limit)
        {
            return 0.0;
        }
        ((self.limit - self.base) / self.increment * (1.0 + f64::EPSILON)).floor() + 1.0
    }

    pub fn check_size(&self) -> ValueResult<()> {
        let n = self.count();
        if n.is_finite() && n <= MAX_ARRAY_ELEMENTS as f64 {
            Ok(())
        } else {
            Err(ValueError::OutOfMemory)
        }
    }

    pub fn elem(&self, i: usize) -> f64 {
        self.base + i as f64 * self.increment
    }

    pub fn to_array(&self) -> Array<f64> {
        let n = self.numel();
        Array::new(1, n, (0..n).map(|i| self.elem(i)).collect())
    }
}

/// Anonymous function with the values it captured when created
#[derive(Debug, Clone)]
pub struct AnonymousFunction {
    pub params: Vec<Param>,
    pub varargin: bool,
    pub body: Rc<Spanned<Expr>>,
    pub text: String,
    pub captured: Vec<(String, Value)>,
}

#[derive(Debug, Clone)]
pub enum FunctionHandle {
    /// `@name`, resolved at call time
    Named(String),
    Anonymous(AnonymousFunction),
}

impl FunctionHandle {
    /// Source form used by `func2str` and display
    pub fn text(&self) -> String {
        match self {
            FunctionHandle::Named(name) => name.clone(),
            FunctionHandle::Anonymous(f) => {
                let mut params: Vec<&str> = f.params.iter().map(|p| p.name.as_str()).collect();
                if f.varargin {
                    params.push("varargin");
                }
                format!("@({}) {}", params.join(", "), f.text)
            }
        }
    }
}

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Num(Array<f64>),
    Bool(Array<bool>),
    Str(CharArray),
    Cell(Array<Value>),
    Struct(StructValue),
    Object(Object),
    Range(Range),
    Handle(Rc<FunctionHandle>),
    /// Comma-separated list produced by `c{:}` or `s.f` expansion
    CsList(ValueList),
    /// `:` passed as an argument
    MagicColon,
    /// Unset slot in a function's return list, followed by a set one
    Undefined,
}

/// One step of a subscript chain with evaluated arguments
#[derive(Debug, Clone)]
pub enum Sub {
    Paren(ValueList),
    Brace(ValueList),
    Field(String),
}

impl Sub {
    pub fn type_str(&self) -> &'static str {
        match self {
            Sub::Paren(_) => "()",
            Sub::Brace(_) => "{}",
            Sub::Field(_) => ".",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::empty()
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::scalar(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(Array::scalar(b))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(&s)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

impl Value {
    pub fn scalar(x: f64) -> Self {
        Value::Num(Array::scalar(x))
    }

    pub fn empty() -> Self {
        Value::Num(Array::empty())
    }

    pub fn string(s: &str) -> Self {
        Value::Str(CharArray {
            chars: Array::row(s.chars().collect()),
            double_quoted: false,
        })
    }

    pub fn dq_string(s: &str) -> Self {
        Value::Str(CharArray {
            chars: Array::row(s.chars().collect()),
            double_quoted: true,
        })
    }

    pub fn row(values: Vec<f64>) -> Self {
        Value::Num(Array::row(values))
    }

    pub fn cell_row(values: ValueList) -> Self {
        Value::Cell(Array::row(values))
    }

    pub fn empty_cell() -> Self {
        Value::Cell(Array::empty())
    }

    pub fn handle(h: FunctionHandle) -> Self {
        Value::Handle(Rc::new(h))
    }

    /// Class name as reported by `class`
    pub fn class_name(&self) -> &str {
        match self {
            Value::Num(_) | Value::Range(_) => "double",
            Value::Bool(_) => "logical",
            Value::Str(_) => "char",
            Value::Cell(_) => "cell",
            Value::Struct(_) => "struct",
            Value::Object(o) => &o.class,
            Value::Handle(_) => "function_handle",
            Value::CsList(_) => "cs-list",
            Value::MagicColon => "magic-colon",
            Value::Undefined => "undefined",
        }
    }

    /// Type description used in operator error messages
    pub fn type_desc(&self) -> &str {
        match self {
            Value::Num(a) if a.is_scalar() => "double",
            Value::Num(_) => "matrix",
            Value::Bool(a) if a.is_scalar() => "bool",
            Value::Bool(_) => "bool matrix",
            Value::Str(_) => "string",
            Value::Cell(_) => "cell",
            Value::Struct(_) => "scalar struct",
            Value::Object(_) => "object",
            Value::Range(_) => "range",
            Value::Handle(_) => "function handle",
            Value::CsList(_) => "cs-list",
            Value::MagicColon => "magic-colon",
            Value::Undefined => "undefined",
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        match self {
            Value::Num(a) => a.dims(),
            Value::Bool(a) => a.dims(),
            Value::Str(s) => s.chars.dims(),
            Value::Cell(c) => c.dims(),
            Value::Range(r) => (1, r.numel()),
            Value::CsList(l) => (1, l.len()),
            Value::Undefined => (0, 0),
            Value::Struct(_) | Value::Object(_) | Value::Handle(_) | Value::MagicColon => (1, 1),
        }
    }

    pub fn numel(&self) -> usize {
        let (r, c) = self.dims();
        r * c
    }

    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    pub fn is_scalar(&self) -> bool {
        self.dims() == (1, 1)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(s) if s.chars.rows() <= 1)
    }

    pub fn is_cell(&self) -> bool {
        matches!(self, Value::Cell(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Value::Struct(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_function_handle(&self) -> bool {
        matches!(self, Value::Handle(_))
    }

    pub fn is_cs_list(&self) -> bool {
        matches!(self, Value::CsList(_))
    }

    pub fn is_magic_colon(&self) -> bool {
        matches!(self, Value::MagicColon)
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, Value::Undefined)
    }

    /// `[]` exactly, the deletion marker of indexed assignment
    pub fn is_null_matrix(&self) -> bool {
        matches!(self, Value::Num(a) if a.dims() == (0, 0))
    }

    /// Contents of a character row
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Str(s) if s.chars.rows() <= 1 => Some(s.chars.data().iter().collect()),
            _ => None,
        }
    }

    /// Character rows of a char matrix
    pub fn string_rows(&self) -> Option<Vec<String>> {
        match self {
            Value::Str(s) => Some(
                (0..s.chars.rows())
                    .map(|r| s.chars.row_values(r).into_iter().collect())
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn as_function_handle(&self) -> Option<&Rc<FunctionHandle>> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// Numeric view of numbers, logicals, characters and ranges
    pub fn to_numeric(&self) -> ValueResult<Array<f64>> {
        match self {
            Value::Num(a) => Ok(a.clone()),
            Value::Bool(a) => Ok(a.map(|&b| if b { 1.0 } else { 0.0 })),
            Value::Str(s) => Ok(s.chars.map(|&c| c as u32 as f64)),
            Value::Range(r) => Ok(r.to_array()),
            other => Err(ValueError::type_error(format!(
                "wrong type argument '{}'",
                other.type_desc()
            ))),
        }
    }

    /// Value of a numeric 1x1
    pub fn scalar_value(&self) -> ValueResult<f64> {
        let a = self.to_numeric()?;
        match a.data() {
            [x] => Ok(*x),
            _ => Err(ValueError::type_error(format!(
                "expected a scalar value, found {}x{}",
                a.rows(),
                a.cols()
            ))),
        }
    }

    /// Non-negative integer from a numeric 1x1
    pub fn index_value(&self) -> ValueResult<usize> {
        let x = self.scalar_value()?;
        if x < 0.0 || x.fract() != 0.0 {
            return Err(ValueError::type_error(format!(
                "expected a non-negative integer, found {x}"
            )));
        }
        Ok(x as usize)
    }

    /// Truth value for `if`/`while`: non-empty and all elements nonzero
    pub fn is_true(&self) -> ValueResult<bool> {
        match self {
            Value::Bool(a) => Ok(!a.is_empty() && a.data().iter().all(|&b| b)),
            Value::Num(_) | Value::Str(_) | Value::Range(_) => {
                let a = self.to_numeric()?;
                if a.data().iter().any(|x| x.is_nan()) {
                    return Err(ValueError::type_error("logical conversion from NaN value"));
                }
                Ok(!a.is_empty() && a.data().iter().all(|&x| x != 0.0))
            }
            Value::CsList(l) if l.len() == 1 => l[0].is_true(),
            other => Err(ValueError::type_error(format!(
                "wrong type argument '{}'",
                match other {
                    Value::Cell(_) => "cell array",
                    _ => other.type_desc(),
                }
            ))),
        }
    }

    /// Equality used by `switch`: strings compare as strings, cells match any element
    pub fn switch_matches(&self, label: &Value) -> bool {
        if let Value::Cell(c) = label {
            return c.data().iter().any(|l| self.switch_matches(l));
        }
        match (self.as_string(), label.as_string()) {
            (Some(a), Some(b)) => return a == b,
            (Some(_), None) | (None, Some(_)) => return false,
            (None, None) => {}
        }
        let (Ok(a), Ok(b)) = (self.to_numeric(), label.to_numeric()) else {
            return false;
        };
        if a.is_empty() && b.is_empty() {
            return true;
        }
        if a.is_scalar() || b.is_scalar() || a.dims() == b.dims() {
            let x = if a.is_scalar() { Some(a.data()[0]) } else { None };
            let y = if b.is_scalar() { Some(b.data()[0]) } else { None };
            let n = a.numel().max(b.numel());
            return n > 0
                && (0..n).all(|i| {
                    let l = x.unwrap_or_else(|| a.data()[i]);
                    let r = y.unwrap_or_else(|| b.data()[i]);
                    l == r
                });
        }
        false
    }

    /// Turn an argument into a subscript against an extent
    pub fn to_idx(&self) -> ValueResult<Idx> {
        match self {
            Value::MagicColon => Ok(Idx::Colon),
            Value::Str(s) if s.chars.data() == [':'] => Ok(Idx::Colon),
            Value::Bool(mask) => {
                let positions: Vec<usize> = mask
                    .data()
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &b)| b.then_some(i))
                    .collect();
                let n = positions.len();
                let (rows, cols) = if mask.rows() > 1 && mask.cols() == 1 { (n, 1) } else { (1, n) };
                Ok(Idx::List { positions, rows, cols })
            }
            Value::Num(_) | Value::Range(_) => {
                let a = self.to_numeric()?;
                let mut positions = Vec::with_capacity(a.numel());
                for &x in a.data() {
                    if x.fract() != 0.0 || x.is_nan() {
                        return Err(ValueError::index(format!(
                            "index ({}): subscripts must be either integers 1 to (2^63)-1 or logicals",
                            display::format_scalar_short(x)
                        )));
                    }
                    if x < 1.0 {
                        return Err(ValueError::index(format!(
                            "index ({}): out of bound; value {} out of bound",
                            x as i64, x as i64
                        )));
                    }
                    positions.push(x as usize - 1);
                }
                Ok(Idx::List {
                    positions,
                    rows: a.rows(),
                    cols: a.cols(),
                })
            }
            Value::Str(s) => {
                // char subscripts index by character code
                let a = s.chars.map(|&c| c as u32 as f64);
                Value::Num(a).to_idx()
            }
            other => Err(ValueError::index(format!(
                "subscript indices must be either positive integers or logicals, not {}",
                other.class_name()
            ))),
        }
    }

    // ====================================================================
    // Indexing
    // ====================================================================

    /// `v(args)` on a plain value
    pub fn paren_index(&self, args: &[Value]) -> ValueResult<Value> {
        let idx = args.iter().map(Value::to_idx).collect::<ValueResult<Vec<_>>>()?;
        match self {
            Value::Num(a) => Ok(Value::Num(a.index(&idx)?)),
            Value::Bool(a) => Ok(Value::Bool(a.index(&idx)?)),
            Value::Str(s) => Ok(Value::Str(CharArray {
                chars: s.chars.index(&idx)?,
                double_quoted: s.double_quoted,
            })),
            Value::Cell(c) => Ok(Value::Cell(c.index(&idx)?)),
            Value::Range(r) => Ok(Value::Num(r.to_array().index(&idx)?)),
            Value::Struct(_) | Value::Object(_) => {
                Array::scalar(()).index(&idx)?;
                Ok(self.clone())
            }
            Value::Handle(_) => Err(ValueError::index("function handle cannot be indexed with (")),
            Value::CsList(_) => Err(ValueError::index("a cs-list cannot be further indexed")),
            Value::MagicColon => Err(ValueError::index("invalid use of colon")),
            Value::Undefined => Err(ValueError::index("indexing undefined value")),
        }
    }

    /// `c{args}`: the selected cell elements
    pub fn brace_index(&self, args: &[Value]) -> ValueResult<ValueList> {
        match self {
            Value::Cell(c) => {
                let idx = args.iter().map(Value::to_idx).collect::<ValueResult<Vec<_>>>()?;
                Ok(c.index(&idx)?.into_data())
            }
            Value::CsList(_) => Err(ValueError::index("a cs-list cannot be further indexed")),
            Value::Struct(_) => Err(ValueError::index(
                "'{' undefined for arguments of type 'struct'",
            )),
            other => Err(ValueError::index(format!(
                "{}cannot be indexed with {{",
                index_kind(other)
            ))),
        }
    }

    /// `s.name`
    pub fn field(&self, name: &str) -> ValueResult<Value> {
        match self {
            Value::Struct(s) => s
                .get(name)
                .cloned()
                .ok_or_else(|| ValueError::index(format!("invalid use of undefined value (field '{name}')"))),
            Value::Object(o) => o.fields.get(name).cloned().ok_or_else(|| {
                ValueError::index(format!("invalid use of a {} object: no property '{name}'", o.class))
            }),
            Value::CsList(_) => Err(ValueError::index("a cs-list cannot be further indexed")),
            other => Err(ValueError::index(format!(
                "{}cannot be indexed with .",
                index_kind(other)
            ))),
        }
    }

    /// Apply a whole subscript chain step by step
    pub fn subsref(&self, chain: &[Sub]) -> ValueResult<ValueList> {
        let mut current = vec![self.clone()];
        for sub in chain {
            let base = match current.len() {
                1 => current.remove(0),
                _ => return Err(ValueError::index("a cs-list cannot be further indexed")),
            };
            current = match sub {
                Sub::Paren(args) => vec![base.paren_index(args)?],
                Sub::Brace(args) => base.brace_index(args)?,
                Sub::Field(name) => vec![base.field(name)?],
            };
        }
        Ok(current)
    }

    // ====================================================================
    // Indexed assignment
    // ====================================================================

    /// Assign `rhs` through `chain` into `base` (undefined when `None`)
    pub fn subsasgn(base: Option<Value>, chain: &[Sub], rhs: Value) -> ValueResult<Value> {
        let Some((first, rest)) = chain.split_first() else {
            return Ok(rhs);
        };
        match first {
            Sub::Field(name) => {
                let mut s = match base {
                    None => StructValue::new(),
                    Some(Value::Struct(s)) => s,
                    Some(Value::Object(mut o)) => {
                        let current = o.fields.get(name).cloned();
                        let updated = Value::subsasgn(current, rest, rhs)?;
                        o.fields.set(name.clone(), updated);
                        return Ok(Value::Object(o));
                    }
                    Some(v) if v.is_null_matrix() => StructValue::new(),
                    Some(other) => {
                        return Err(ValueError::type_error(format!(
                            "invalid use of a N_-D array in indexed assignment (cannot set field of {})",
                            other.class_name()
                        )));
                    }
                };
                let current = s.get(name).cloned();
                let updated = Value::subsasgn(current, rest, rhs)?;
                s.set(name.clone(), updated);
                Ok(Value::Struct(s))
            }
            Sub::Brace(args) => {
                let mut cell = match base {
                    None => Array::empty(),
                    Some(Value::Cell(c)) => c,
                    Some(v) if v.is_null_matrix() => Array::empty(),
                    Some(other) => {
                        return Err(ValueError::type_error(format!(
                            "matrix cannot be indexed with {{ (value of class {})",
                            other.class_name()
                        )));
                    }
                };
                let idx = args.iter().map(Value::to_idx).collect::<ValueResult<Vec<_>>>()?;
                if rest.is_empty() {
                    let values = match rhs {
                        Value::CsList(values) => values,
                        other => vec![other],
                    };
                    let rhs_cell = match values.len() {
                        1 => Array::scalar(values.into_iter().next().unwrap_or_default()),
                        _ => Array::row(values),
                    };
                    cell.assign(&idx, &rhs_cell, &Value::empty())?;
                } else {
                    let current = match cell.index(&idx) {
                        Ok(sel) if sel.numel() == 1 => sel.into_data().pop(),
                        Ok(sel) if sel.numel() > 1 => {
                            return Err(ValueError::index("a cs-list cannot be further indexed"));
                        }
                        _ => None,
                    };
                    let updated = Value::subsasgn(current, rest, rhs)?;
                    cell.assign(&idx, &Array::scalar(updated), &Value::empty())?;
                }
                Ok(Value::Cell(cell))
            }
            Sub::Paren(args) => {
                if !rest.is_empty() {
                    return match base {
                        Some(v @ (Value::Struct(_) | Value::Object(_))) => {
                            v.paren_index(args)?;
                            Value::subsasgn(Some(v), rest, rhs)
                        }
                        None => {
                            Array::scalar(()).index(
                                &args.iter().map(Value::to_idx).collect::<ValueResult<Vec<_>>>()?,
                            )?;
                            Value::subsasgn(None, rest, rhs)
                        }
                        Some(_) => Err(ValueError::index(
                            "() must be followed by . or close the index chain",
                        )),
                    };
                }
                let idx = args.iter().map(Value::to_idx).collect::<ValueResult<Vec<_>>>()?;
                paren_assign(base, &idx, rhs)
            }
        }
    }
}

fn index_kind(v: &Value) -> &'static str {
    if v.is_scalar() { "scalar " } else { "matrix " }
}

/// `A(idx) = rhs`, including deletion and type promotion
fn paren_assign(base: Option<Value>, idx: &[Idx], rhs: Value) -> ValueResult<Value> {
    if rhs.is_null_matrix() {
        if let Some(mut base) = base {
            match &mut base {
                Value::Num(a) => a.delete(idx)?,
                Value::Bool(a) => a.delete(idx)?,
                Value::Str(s) => s.chars.delete(idx)?,
                Value::Cell(c) => c.delete(idx)?,
                Value::Range(r) => {
                    let mut a = r.to_array();
                    a.delete(idx)?;
                    return Ok(Value::Num(a));
                }
                _ => {
                    return Err(ValueError::type_error(format!(
                        "a null assignment is not defined for {}",
                        base.class_name()
                    )));
                }
            }
            return Ok(base);
        }
    }

    let base = match base {
        Some(Value::Range(r)) => Value::Num(r.to_array()),
        Some(v) => v,
        None => match &rhs {
            Value::Cell(_) => Value::empty_cell(),
            Value::Bool(_) => Value::Bool(Array::empty()),
            Value::Str(s) => Value::Str(CharArray {
                chars: Array::empty(),
                double_quoted: s.double_quoted,
            }),
            Value::Struct(_) | Value::Object(_) => {
                Array::scalar(()).index(idx)?;
                return Ok(rhs);
            }
            _ => Value::empty(),
        },
    };

    match (base, rhs) {
        (Value::Cell(mut c), Value::Cell(r)) => {
            c.assign(idx, &r, &Value::empty())?;
            Ok(Value::Cell(c))
        }
        (Value::Cell(mut c), other) => {
            c.assign(idx, &Array::scalar(other), &Value::empty())?;
            Ok(Value::Cell(c))
        }
        (Value::Bool(mut a), Value::Bool(r)) => {
            a.assign(idx, &r, &false)?;
            Ok(Value::Bool(a))
        }
        (Value::Str(mut s), Value::Str(r)) => {
            s.chars.assign(idx, &r.chars, &'\0')?;
            Ok(Value::Str(s))
        }
        (v @ (Value::Struct(_) | Value::Object(_)), r @ (Value::Struct(_) | Value::Object(_))) => {
            v.paren_index(&idx_as_values(idx))?;
            Ok(r)
        }
        (base @ (Value::Num(_) | Value::Bool(_) | Value::Str(_)), rhs) => {
            let mut a = base.to_numeric()?;
            let r = rhs.to_numeric().map_err(|_| {
                ValueError::type_error(format!(
                    "operator = undefined for '{}' by '{}' operations",
                    base.type_desc(),
                    rhs.type_desc()
                ))
            })?;
            a.assign(idx, &r, &0.0)?;
            Ok(Value::Num(a))
        }
        (base, rhs) => Err(ValueError::type_error(format!(
            "operator = undefined for '{}' by '{}' operations",
            base.type_desc(),
            rhs.type_desc()
        ))),
    }
}

fn idx_as_values(idx: &[Idx]) -> ValueList {
    idx.iter()
        .map(|i| match i {
            Idx::Colon => Value::MagicColon,
            Idx::List { positions, .. } => Value::row(positions.iter().map(|&p| p as f64 + 1.0).collect()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_chain(names: &[&str]) -> Vec<Sub> {
        names.iter().map(|n| Sub::Field(n.to_string())).collect()
    }

    // ====================================================================
    // Predicates
    // ====================================================================

    #[test]
    fn test_is_true() {
        assert!(Value::scalar(1.0).is_true().unwrap());
        assert!(!Value::row(vec![1.0, 0.0]).is_true().unwrap());
        assert!(!Value::empty().is_true().unwrap());
        assert!(Value::cell_row(vec![]).is_true().is_err());
    }

    #[test]
    fn test_class_names() {
        assert_eq!(Value::scalar(1.0).class_name(), "double");
        assert_eq!(Value::from(true).class_name(), "logical");
        assert_eq!(Value::string("a").class_name(), "char");
        assert_eq!(Value::empty_cell().class_name(), "cell");
    }

    #[test]
    fn test_range_numel() {
        let r = Range { base: 1.0, increment: 1.0, limit: 3.0 };
        assert_eq!(r.numel(), 3);
        let r = Range { base: 0.0, increment: 0.1, limit: 0.3 };
        assert_eq!(r.numel(), 4);
        let r = Range { base: 3.0, increment: 1.0, limit: 1.0 };
        assert_eq!(r.numel(), 0);
    }

    #[test]
    fn test_range_size_limit() {
        let r = Range { base: 1.0, increment: 1.0, limit: 1e12 };
        assert_eq!(r.check_size(), Err(ValueError::OutOfMemory));
        let r = Range { base: 1.0, increment: 1.0, limit: f64::INFINITY };
        assert_eq!(r.check_size(), Err(ValueError::OutOfMemory));
        let r = Range { base: 1.0, increment: 1.0, limit: 1e6 };
        assert_eq!(r.check_size(), Ok(()));
        assert_eq!(checked_numel(usize::MAX, 2), Err(ValueError::OutOfMemory));
        assert_eq!(checked_numel(4, 5), Ok(20));
    }

    #[test]
    fn test_switch_matches() {
        assert!(Value::scalar(2.0).switch_matches(&Value::scalar(2.0)));
        assert!(Value::string("abc").switch_matches(&Value::string("abc")));
        assert!(!Value::string("a").switch_matches(&Value::scalar(97.0)));
        let label = Value::cell_row(vec![Value::scalar(1.0), Value::scalar(3.0)]);
        assert!(Value::scalar(3.0).switch_matches(&label));
        assert!(!Value::scalar(2.0).switch_matches(&label));
    }

    // ====================================================================
    // Indexing
    // ====================================================================

    #[test]
    fn test_paren_index_with_logical_mask() {
        let v = Value::row(vec![5.0, 6.0, 7.0]);
        let mask = Value::Bool(Array::row(vec![true, false, true]));
        match v.paren_index(&[mask]).unwrap() {
            Value::Num(a) => assert_eq!(a.data(), &[5.0, 7.0]),
            other => panic!("Expected Num, got {other:?}"),
        }
    }

    #[test]
    fn test_index_zero_is_error() {
        let err = Value::row(vec![1.0]).paren_index(&[Value::scalar(0.0)]).unwrap_err();
        assert!(err.to_string().starts_with("index (0): out of bound"));
    }

    #[test]
    fn test_brace_index_on_matrix_fails() {
        let err = Value::row(vec![1.0, 2.0]).brace_index(&[Value::scalar(1.0)]).unwrap_err();
        assert_eq!(err.to_string(), "matrix cannot be indexed with {");
    }

    #[test]
    fn test_out_of_bound_names_variable() {
        let err = Value::row(vec![1.0, 2.0, 3.0])
            .paren_index(&[Value::scalar(5.0)])
            .unwrap_err()
            .with_variable("x");
        assert_eq!(err.to_string(), "x(5): out of bound 3 (dimensions are 1x3)");
    }

    // ====================================================================
    // Assignment
    // ====================================================================

    #[test]
    fn test_subsasgn_creates_nested_struct() {
        let v = Value::subsasgn(None, &field_chain(&["a", "b"]), Value::scalar(1.0)).unwrap();
        let inner = v.field("a").unwrap().field("b").unwrap();
        assert_eq!(inner.scalar_value().unwrap(), 1.0);
    }

    #[test]
    fn test_subsasgn_brace_grows_cell() {
        let chain = vec![Sub::Brace(vec![Value::scalar(3.0)])];
        let v = Value::subsasgn(None, &chain, Value::string("x")).unwrap();
        assert_eq!(v.dims(), (1, 3));
    }

    #[test]
    fn test_subsasgn_deletion() {
        let chain = vec![Sub::Paren(vec![Value::scalar(2.0)])];
        let v = Value::subsasgn(Some(Value::row(vec![1.0, 2.0, 3.0])), &chain, Value::empty()).unwrap();
        assert_eq!(v.dims(), (1, 2));
    }

    #[test]
    fn test_subsasgn_cs_list_into_cell_range() {
        let chain = vec![Sub::Brace(vec![Value::row(vec![1.0, 2.0])])];
        let rhs = Value::CsList(vec![Value::scalar(1.0), Value::scalar(2.0)]);
        let v = Value::subsasgn(None, &chain, rhs).unwrap();
        assert_eq!(v.dims(), (1, 2));
    }
}
