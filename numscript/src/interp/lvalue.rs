//! Assignment targets
//!
//! An [`Lvalue`] is the left-hand side of an assignment with its subscripts
//! already evaluated. Subscripts are evaluated against the partial value
//! reached so far, so `end` inside `x.a(end+1)` refers to `x.a`.

use super::error::{EvalResult, ExecutionError};
use super::Interpreter;
use crate::value::MAX_ARRAY_ELEMENTS;
use crate::ast::{AssignOp, Expr, Spanned, Subscript};
use crate::value::ops::binary_op;
use crate::value::{Sub, Value};

/// Evaluated assignment target
#[derive(Debug, Clone)]
pub enum Lvalue {
    /// `~`: the value is discarded
    BlackHole,
    Var {
        name: String,
        chain: Vec<Sub>,
        /// Values the target takes: more than one for `c{1:3}`
        numel: usize,
    },
}

impl Lvalue {
    pub fn numel(&self) -> usize {
        match self {
            Lvalue::BlackHole => 1,
            Lvalue::Var { numel, .. } => *numel,
        }
    }

    pub fn is_black_hole(&self) -> bool {
        matches!(self, Lvalue::BlackHole)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Lvalue::BlackHole => None,
            Lvalue::Var { name, .. } => Some(name),
        }
    }

    /// Whether the target is `name{idx}` with an index selecting nothing
    pub(crate) fn is_empty_brace_index(&self) -> bool {
        match self {
            Lvalue::Var { chain, .. } => matches!(
                chain.last(),
                Some(Sub::Brace(args)) if args.iter().any(|a| !a.is_magic_colon() && a.is_empty())
            ),
            Lvalue::BlackHole => false,
        }
    }
}

/// Number of cells `c{args}` selects from a value of the given dimensions
fn brace_count(dims: (usize, usize), args: &[Value]) -> usize {
    let (rows, cols) = dims;
    let n = args.len();
    args.iter()
        .enumerate()
        .map(|(k, a)| {
            let extent = match (n, k) {
                (1, _) => rows * cols,
                (_, 0) => rows,
                (_, 1) => cols,
                _ => 1,
            };
            a.to_idx().map_or(1, |idx| idx.count(extent))
        })
        .product()
}

/// Value reached by one subscript step, if any
fn step(value: &Value, sub: &Sub) -> Option<Value> {
    match sub {
        Sub::Paren(args) => value.paren_index(args).ok(),
        Sub::Brace(args) => match value.brace_index(args) {
            Ok(mut list) if list.len() == 1 => list.pop(),
            _ => None,
        },
        Sub::Field(name) => value.field(name).ok(),
    }
}

/// Refuse index assignments that would grow an array past the element limit
fn check_allocation(chain: &[Sub]) -> Result<(), ExecutionError> {
    for sub in chain {
        let (Sub::Paren(args) | Sub::Brace(args)) = sub else {
            continue;
        };
        let mut total = 1.0_f64;
        for a in args {
            if a.is_magic_colon() {
                continue;
            }
            if let Ok(values) = a.to_numeric() {
                total *= values.data().iter().copied().fold(1.0, f64::max);
            }
        }
        if total > MAX_ARRAY_ELEMENTS as f64 {
            return Err(ExecutionError::out_of_memory());
        }
    }
    Ok(())
}

impl Interpreter {
    /// Evaluate the subscripts of an assignment target
    pub(crate) fn make_lvalue(&mut self, expr: &Spanned<Expr>) -> EvalResult<Lvalue> {
        match &expr.node {
            Expr::Tilde => Ok(Lvalue::BlackHole),
            Expr::Ident(name) => Ok(Lvalue::Var {
                name: name.clone(),
                chain: Vec::new(),
                numel: 1,
            }),
            Expr::Index { base, chain } => {
                let Expr::Ident(name) = &base.node else {
                    return Err(ExecutionError::general("invalid assignment to an expression").into());
                };
                // an undefined target indexes like an empty matrix
                let mut current = Some(self.varval(name).unwrap_or_default());
                let mut subs = Vec::with_capacity(chain.len());
                let mut numel = 1;
                for (i, sub) in chain.iter().enumerate() {
                    let object = current.take().unwrap_or_default();
                    let evaluated = match sub {
                        Subscript::Paren(args) => Sub::Paren(self.eval_index_args(args, Some(&object))?),
                        Subscript::Brace(args) => Sub::Brace(self.eval_index_args(args, Some(&object))?),
                        Subscript::Field(field) => Sub::Field(field.clone()),
                        Subscript::DynField(e) => Sub::Field(self.dynamic_field_name(e)?),
                    };
                    if i + 1 == chain.len() {
                        if let Sub::Brace(args) = &evaluated {
                            numel = brace_count(object.dims(), args);
                        }
                    } else {
                        current = step(&object, &evaluated);
                    }
                    subs.push(evaluated);
                }
                Ok(Lvalue::Var {
                    name: name.clone(),
                    chain: subs,
                    numel,
                })
            }
            _ => Err(ExecutionError::general("invalid assignment target").into()),
        }
    }

    /// Current value of the target, if defined
    pub(crate) fn lvalue_value(&self, lv: &Lvalue) -> EvalResult<Option<Value>> {
        let Lvalue::Var { name, chain, .. } = lv else {
            return Ok(None);
        };
        let Some(current) = self.varval(name) else {
            return Ok(None);
        };
        if chain.is_empty() {
            return Ok(Some(current));
        }
        let mut values = current.subsref(chain).map_err(|e| e.with_variable(name))?;
        Ok(match values.len() {
            1 => values.pop(),
            0 => None,
            _ => Some(Value::CsList(values)),
        })
    }

    /// `target OP= rhs`
    pub(crate) fn assign_lvalue(&mut self, lv: &Lvalue, op: AssignOp, rhs: Value) -> EvalResult<()> {
        let Lvalue::Var { name, chain, .. } = lv else {
            return Ok(());
        };
        let rhs = match op.binary_op() {
            None => rhs,
            Some(bop) => {
                let Some(current) = self.lvalue_value(lv)? else {
                    return Err(ExecutionError::general(format!(
                        "in computed assignment A {bop}= X, A must be defined first"
                    ))
                    .into());
                };
                binary_op(bop, &current, &rhs)?
            }
        };
        if chain.is_empty() {
            self.assign(name, rhs);
            return Ok(());
        }
        check_allocation(chain)?;
        let current = self.varval(name);
        let updated = Value::subsasgn(current, chain, rhs).map_err(|e| e.with_variable(name))?;
        self.assign(name, updated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brace_count_against_dims() {
        let all = Value::MagicColon;
        assert_eq!(brace_count((2, 3), &[all.clone()]), 6);
        assert_eq!(brace_count((2, 3), &[all, Value::scalar(1.0)]), 2);
        assert_eq!(brace_count((0, 0), &[Value::row(vec![1.0, 2.0])]), 2);
    }

    #[test]
    fn test_huge_index_is_out_of_memory() {
        let chain = vec![Sub::Paren(vec![Value::scalar(1e12)])];
        let err = check_allocation(&chain).unwrap_err();
        assert_eq!(err.kind, crate::interp::ErrorKind::OutOfMemory);
    }

    #[test]
    fn test_end_plus_one_on_undefined_variable() {
        let mut interp = Interpreter::new();
        interp.eval_string("x(end+1) = 5;", true, 0).unwrap();
        assert_eq!(interp.varval("x").unwrap().scalar_value().unwrap(), 5.0);
        interp.eval_string("x(end+1) = 6;", true, 0).unwrap();
        assert_eq!(interp.varval("x").unwrap().numel(), 2);
    }

    #[test]
    fn test_computed_assignment_requires_definition() {
        let mut interp = Interpreter::new();
        let err = interp.eval_string("y += 1;", true, 0).unwrap_err();
        let crate::interp::Exception::Execution(e) = err else {
            panic!("expected execution error");
        };
        assert_eq!(e.message, "in computed assignment A += X, A must be defined first");
    }
}
