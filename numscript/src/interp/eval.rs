//! Expression evaluation
//!
//! Every expression yields a list of values: usually one, none for a call
//! that returns nothing, several for `c{:}` or a call asked for several
//! outputs. The number of outputs the consumer wants is kept on the
//! nargout stack while the expression is evaluated.

use super::error::{EvalResult, ExecutionError};
use super::lvalue::Lvalue;
use super::symtab::Callable;
use super::{IndexContext, Interpreter, STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::ast::{
    AssignOp, BinOp, BoolOp, Expr, Param, PostfixOp, PrefixOp, Spanned, Subscript,
};
use crate::value::ops::{self, UnaryOp};
use crate::value::{
    AnonymousFunction, Array, FunctionHandle, StructValue, Sub, Value, ValueList,
};
use std::collections::BTreeSet;
use std::rc::Rc;

fn one(v: Value) -> ValueList {
    vec![v]
}

impl Interpreter {
    /// Evaluate `expr` to at most one value; several values come back as a cs-list
    pub fn evaluate(&mut self, expr: &Spanned<Expr>, nargout: usize) -> EvalResult<Option<Value>> {
        let mut values = self.evaluate_n(expr, nargout)?;
        Ok(match values.len() {
            0 => None,
            1 => values.pop(),
            _ => Some(Value::CsList(values)),
        })
    }

    /// Evaluate `expr` asking for `nargout` values
    pub fn evaluate_n(&mut self, expr: &Spanned<Expr>, nargout: usize) -> EvalResult<ValueList> {
        self.push_nargout(nargout);
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.visit(expr));
        self.pop_nargout();
        result
    }

    /// Operand of an operator: exactly one defined value
    pub(crate) fn eval_operand(&mut self, expr: &Spanned<Expr>) -> EvalResult<Value> {
        self.evaluate(expr, 1)?
            .ok_or_else(|| ExecutionError::general("invalid use of undefined value").into())
    }

    /// Function arguments; cs-lists are spliced in
    pub(crate) fn eval_args(&mut self, args: &[Spanned<Expr>]) -> EvalResult<ValueList> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.extend(self.evaluate_n(arg, 1)?);
        }
        Ok(Self::flatten(values))
    }

    /// Subscripts of `object(args)`; `end` inside them refers to `object`
    pub(crate) fn eval_index_args(
        &mut self,
        args: &[Spanned<Expr>],
        object: Option<&Value>,
    ) -> EvalResult<ValueList> {
        let count = args.len();
        let mut values = Vec::with_capacity(count);
        for (position, arg) in args.iter().enumerate() {
            if !arg.node.has_magic_end() {
                values.extend(self.evaluate_n(arg, 1)?);
                continue;
            }
            let ctx = IndexContext {
                dims: object.map(Value::dims),
                object: object.filter(|o| o.is_object()).cloned(),
                position,
                count,
            };
            let saved = std::mem::replace(&mut self.indexed, ctx);
            let result = self.evaluate_n(arg, 1);
            self.indexed = saved;
            values.extend(result?);
        }
        Ok(Self::flatten(values))
    }

    /// Name computed by `s.(expr)`
    pub(crate) fn dynamic_field_name(&mut self, expr: &Spanned<Expr>) -> EvalResult<String> {
        self.eval_operand(expr)?.as_string().ok_or_else(|| {
            ExecutionError::general("dynamic structure field names must be strings").into()
        })
    }

    fn visit(&mut self, expr: &Spanned<Expr>) -> EvalResult<ValueList> {
        match &expr.node {
            Expr::Number(x) => Ok(one(Value::scalar(*x))),
            Expr::Str {
                value,
                double_quoted,
            } => Ok(one(if *double_quoted {
                Value::dq_string(value)
            } else {
                Value::string(value)
            })),
            Expr::Ident(name) => self.visit_identifier(name),
            Expr::Binary {
                op,
                left,
                right,
                braindead,
            } => self.visit_binary(*op, left, right, *braindead).map(one),
            Expr::Boolean { op, left, right } => self.visit_boolean(*op, left, right).map(one),
            Expr::Compound { op, left, right } => {
                let a = self.eval_operand(left)?;
                let b = self.eval_operand(right)?;
                Ok(one(ops::compound_op(*op, &a, &b)?))
            }
            Expr::Prefix { op, operand } => self.visit_prefix(*op, operand).map(one),
            Expr::Postfix { op, operand } => self.visit_postfix(*op, operand).map(one),
            Expr::Range {
                base,
                increment,
                limit,
            } => {
                let base = self.eval_operand(base)?;
                let increment = match increment {
                    Some(e) => Some(self.eval_operand(e)?),
                    None => None,
                };
                let limit = self.eval_operand(limit)?;
                Ok(one(ops::make_range(&base, increment.as_ref(), &limit)?))
            }
            Expr::Matrix(rows) => {
                let rows = self.eval_rows(rows)?;
                Ok(one(ops::concat(rows, self.settings.string_fill_char)?))
            }
            Expr::Cell(rows) => {
                let rows = self
                    .eval_rows(rows)?
                    .into_iter()
                    .map(|row| row.into_iter().map(|v| Value::Cell(Array::scalar(v))).collect())
                    .collect();
                Ok(one(ops::cell_concat(rows)?))
            }
            Expr::Index { base, chain } => self.visit_index(base, chain),
            Expr::AnonFn {
                params,
                varargin,
                body,
                text,
            } => Ok(one(self.make_anonymous(params, *varargin, body, text))),
            Expr::FnHandle(name) => Ok(one(Value::handle(FunctionHandle::Named(name.clone())))),
            Expr::SuperclassRef { method, class } => {
                let nargout = self.nargout_top();
                self.call_superclass_method(method, class, &[], nargout)
            }
            Expr::MetaclassQuery(class) => self.metaclass(class).map(one),
            Expr::MagicColon => Ok(one(Value::MagicColon)),
            Expr::MagicEnd => self.visit_magic_end().map(one),
            Expr::Tilde => Err(ExecutionError::general("invalid use of '~' in expression").into()),
            Expr::Assign { lhs, op, rhs } => self.eval_assign(lhs, *op, rhs, false),
            Expr::MultiAssign { lhs, rhs } => self.eval_multi_assign(lhs, rhs, false),
        }
    }

    fn eval_rows(&mut self, rows: &[Vec<Spanned<Expr>>]) -> EvalResult<Vec<ValueList>> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.eval_args(row)?);
        }
        Ok(out)
    }

    /// A variable's value, or the result of calling the function of that name
    fn visit_identifier(&mut self, name: &str) -> EvalResult<ValueList> {
        if let Some(v) = self.varval(name) {
            return Ok(one(v));
        }
        let nargout = self.nargout_top();
        self.call_function(name, &[], nargout)
    }

    fn visit_binary(
        &mut self,
        op: BinOp,
        left: &Spanned<Expr>,
        right: &Spanned<Expr>,
        braindead: bool,
    ) -> EvalResult<Value> {
        let a = self.eval_operand(left)?;

        // `|` and `&` in an if/while condition short-circuit on a 1x1 lhs
        if braindead && matches!(op, BinOp::ElOr | BinOp::ElAnd) && a.dims() == (1, 1) && !a.is_cs_list() {
            let a_true = a.is_true()?;
            if (op == BinOp::ElOr && a_true) || (op == BinOp::ElAnd && !a_true) {
                self.warning(
                    "Octave:possible-matlab-short-circuit-operator",
                    &format!("Matlab-style short-circuit operation performed for operator {op}"),
                );
                return Ok(Value::from(a_true));
            }
            let b = self.eval_operand(right)?;
            return Ok(Value::from(b.is_true()?));
        }

        let b = self.eval_operand(right)?;
        let profiled = self.profiler.is_enabled();
        let label = format!("binary {op}");
        if profiled {
            self.profiler.enter(&label);
        }
        let result = ops::binary_op(op, &a, &b);
        if profiled {
            self.profiler.exit(&label);
        }
        Ok(result?)
    }

    fn logical_operand(&mut self, expr: &Spanned<Expr>) -> EvalResult<bool> {
        let v = self.eval_operand(expr)?;
        if v.is_empty() {
            return Err(
                ExecutionError::general("invalid conversion from empty value to real scalar").into(),
            );
        }
        Ok(v.is_true()?)
    }

    fn visit_boolean(&mut self, op: BoolOp, left: &Spanned<Expr>, right: &Spanned<Expr>) -> EvalResult<Value> {
        let a = self.logical_operand(left)?;
        match op {
            BoolOp::Or if a => return Ok(Value::from(true)),
            BoolOp::And if !a => return Ok(Value::from(false)),
            _ => {}
        }
        Ok(Value::from(self.logical_operand(right)?))
    }

    fn visit_prefix(&mut self, op: PrefixOp, operand: &Spanned<Expr>) -> EvalResult<Value> {
        let unary = match op {
            PrefixOp::Neg => UnaryOp::Neg,
            PrefixOp::Plus => UnaryOp::Plus,
            PrefixOp::Not => UnaryOp::Not,
            PrefixOp::Incr => return self.increment(operand, AssignOp::Add).map(|(_, new)| new),
            PrefixOp::Decr => return self.increment(operand, AssignOp::Sub).map(|(_, new)| new),
        };
        let v = self.eval_operand(operand)?;
        Ok(ops::unary_op(unary, &v)?)
    }

    fn visit_postfix(&mut self, op: PostfixOp, operand: &Spanned<Expr>) -> EvalResult<Value> {
        match op {
            PostfixOp::Transpose | PostfixOp::CTranspose => {
                let v = self.eval_operand(operand)?;
                Ok(ops::unary_op(UnaryOp::Transpose, &v)?)
            }
            PostfixOp::Incr => self.increment(operand, AssignOp::Add).map(|(old, _)| old),
            PostfixOp::Decr => self.increment(operand, AssignOp::Sub).map(|(old, _)| old),
        }
    }

    /// `x++` / `--x`: returns the (old, new) value
    fn increment(&mut self, operand: &Spanned<Expr>, op: AssignOp) -> EvalResult<(Value, Value)> {
        let lv = self.make_lvalue(operand)?;
        let old = self.lvalue_value(&lv)?.ok_or_else(|| {
            ExecutionError::general(format!(
                "in x{}, x must be defined first",
                if op == AssignOp::Add { "++" } else { "--" }
            ))
        })?;
        self.assign_lvalue(&lv, op, Value::scalar(1.0))?;
        let new = self.lvalue_value(&lv)?.unwrap_or_default();
        Ok((old, new))
    }

    // ========================================================================
    // Index expressions
    // ========================================================================

    fn visit_index(&mut self, base: &Spanned<Expr>, chain: &[Subscript]) -> EvalResult<ValueList> {
        let nargout = self.nargout_top();

        let (mut current, rest, variable): (ValueList, &[Subscript], Option<&str>) = match &base.node {
            Expr::Ident(name) if !self.is_variable(name) => {
                let (args, rest) = match chain.split_first() {
                    Some((Subscript::Paren(args), rest)) => (args.as_slice(), rest),
                    _ => (&[][..], chain),
                };
                // `[~, x] = f(g(y))`: the mask belongs to f, not to g
                let pending = self.pending_ignored.take();
                let values = self.eval_args(args)?;
                self.pending_ignored = if rest.is_empty() { pending } else { None };
                let n = if rest.is_empty() { nargout } else { 1 };
                (self.call_function(name, &values, n)?, rest, None)
            }
            Expr::SuperclassRef { method, class } => {
                let (args, rest) = match chain.split_first() {
                    Some((Subscript::Paren(args), rest)) => (args.as_slice(), rest),
                    _ => (&[][..], chain),
                };
                let values = self.eval_args(args)?;
                let n = if rest.is_empty() { nargout } else { 1 };
                (self.call_superclass_method(method, class, &values, n)?, rest, None)
            }
            Expr::Ident(name) => (self.visit_identifier(name)?, chain, Some(name.as_str())),
            _ => (one(self.eval_operand(base)?), chain, None),
        };

        for (i, sub) in rest.iter().enumerate() {
            let value = match current.len() {
                1 => current.pop().unwrap_or_default(),
                0 => return Err(ExecutionError::index("indexing undefined value").into()),
                _ => return Err(ExecutionError::index("a cs-list cannot be further indexed").into()),
            };
            let last = i + 1 == rest.len();
            let n = if last { nargout } else { 1 };

            if let Value::Handle(h) = &value
                && let Subscript::Paren(args) = sub
            {
                let h = Rc::clone(h);
                let args = self.eval_args(args)?;
                current = self.call_handle(&h, &args, n)?;
                continue;
            }

            if let Value::Object(obj) = &value {
                let class = obj.class.clone();
                if !self.in_method_of(&class) {
                    if self.symbols.find_method(&class, "subsref")?.is_some() {
                        return self.overloaded_subsref(value, &rest[i..], nargout);
                    }
                    if let Subscript::Field(method) = sub
                        && !obj.fields.contains(method)
                        && let Some(m) = self.symbols.find_method(&class, method)?
                    {
                        // obj.method(args)
                        let mut args = vec![value];
                        let skip = match rest.get(i + 1) {
                            Some(Subscript::Paren(extra)) => {
                                args.extend(self.eval_args(extra)?);
                                2
                            }
                            _ => 1,
                        };
                        let remaining = &rest[i + skip..];
                        let n = if remaining.is_empty() { nargout } else { 1 };
                        let result = self.call(Callable::Function(m), &args, n)?;
                        return self.index_results(result, remaining);
                    }
                }
            }

            let evaluated = self.eval_subscript(sub, &value)?;
            current = value
                .subsref(std::slice::from_ref(&evaluated))
                .map_err(|e| match variable {
                    Some(name) if i == 0 => e.with_variable(name),
                    _ => e,
                })?;
        }
        Ok(current)
    }

    /// Continue indexing values returned by a method call
    fn index_results(&mut self, mut values: ValueList, rest: &[Subscript]) -> EvalResult<ValueList> {
        if rest.is_empty() {
            return Ok(values);
        }
        let value = match values.len() {
            1 => values.pop().unwrap_or_default(),
            _ => return Err(ExecutionError::index("indexing undefined value").into()),
        };
        let mut current = one(value);
        for sub in rest {
            let value = match current.len() {
                1 => current.pop().unwrap_or_default(),
                _ => return Err(ExecutionError::index("a cs-list cannot be further indexed").into()),
            };
            let evaluated = self.eval_subscript(sub, &value)?;
            current = value.subsref(std::slice::from_ref(&evaluated))?;
        }
        Ok(current)
    }

    fn eval_subscript(&mut self, sub: &Subscript, object: &Value) -> EvalResult<Sub> {
        Ok(match sub {
            Subscript::Paren(args) => Sub::Paren(self.eval_index_args(args, Some(object))?),
            Subscript::Brace(args) => Sub::Brace(self.eval_index_args(args, Some(object))?),
            Subscript::Field(name) => Sub::Field(name.clone()),
            Subscript::DynField(e) => Sub::Field(self.dynamic_field_name(e)?),
        })
    }

    /// Whether the code running now is a method or constructor of `class`
    pub(crate) fn in_method_of(&self, class: &str) -> bool {
        self.call_stack
            .current_frame()
            .function()
            .and_then(|f| f.class())
            .is_some_and(|c| c == class)
    }

    /// Hand the remaining subscripts to the class's `subsref` method
    fn overloaded_subsref(&mut self, object: Value, rest: &[Subscript], nargout: usize) -> EvalResult<ValueList> {
        let Value::Object(obj) = &object else {
            return Ok(one(object));
        };
        let class = obj.class.clone();
        let mut entries = Vec::with_capacity(rest.len());
        for sub in rest {
            let evaluated = self.eval_subscript(sub, &object)?;
            let subs = match &evaluated {
                Sub::Paren(args) | Sub::Brace(args) => Value::cell_row(args.clone()),
                Sub::Field(name) => Value::string(name),
            };
            entries.push(Value::from(StructValue::from_iter([
                ("type", Value::string(evaluated.type_str())),
                ("subs", subs),
            ])));
        }
        let Some(m) = self.symbols.find_method(&class, "subsref")? else {
            return Err(ExecutionError::undefined("subsref").into());
        };
        self.call(Callable::Function(m), &[object, Value::cell_row(entries)], nargout)
    }

    /// Value of `end` for the innermost index expression
    fn visit_magic_end(&mut self) -> EvalResult<Value> {
        let ctx = self.indexed.clone();
        if let Some(obj @ Value::Object(o)) = &ctx.object
            && let Some(m) = self.symbols.find_method(&o.class, "end")?
        {
            let args = [
                obj.clone(),
                Value::scalar((ctx.position + 1) as f64),
                Value::scalar(ctx.count as f64),
            ];
            let mut out = self.call(Callable::Function(m), &args, 1)?;
            return out
                .pop()
                .ok_or_else(|| ExecutionError::general("end: method returned no value").into());
        }
        let Some((rows, cols)) = ctx.dims else {
            return Err(ExecutionError::general(
                "invalid use of 'end': may only be used to index existing value",
            )
            .into());
        };
        let n = match (ctx.count, ctx.position) {
            (1, _) => rows * cols,
            (_, 0) => rows,
            (_, 1) => cols,
            _ => 1,
        };
        Ok(Value::scalar(n as f64))
    }

    // ========================================================================
    // Function values and classes
    // ========================================================================

    /// Anonymous function capturing the current values of its free variables
    fn make_anonymous(
        &self,
        params: &[Param],
        varargin: bool,
        body: &Rc<Spanned<Expr>>,
        text: &str,
    ) -> Value {
        let mut bound: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        if varargin {
            bound.push("varargin");
        }
        let mut free = BTreeSet::new();
        free_identifiers(&body.node, &bound, &mut free);
        let captured = free
            .into_iter()
            .filter_map(|name| self.varval(&name).map(|v| (name, v)))
            .collect();
        Value::handle(FunctionHandle::Anonymous(AnonymousFunction {
            params: params.to_vec(),
            varargin,
            body: Rc::clone(body),
            text: text.to_string(),
            captured,
        }))
    }

    /// `method@Class(args)`: the parent's constructor or method
    pub(crate) fn call_superclass_method(
        &mut self,
        method: &str,
        class: &str,
        args: &[Value],
        nargout: usize,
    ) -> EvalResult<ValueList> {
        let target = if method == class {
            self.symbols.find_constructor(class)?
        } else {
            self.symbols.find_method(class, method)?
        };
        match target {
            Some(f) => self.call(Callable::Function(f), args, nargout),
            None => Err(ExecutionError::undefined(&format!("{method}@{class}")).into()),
        }
    }

    /// `?Class`: name and method list of a class
    fn metaclass(&mut self, class: &str) -> EvalResult<Value> {
        if self.symbols.find_constructor(class)?.is_none() && !self.symbols.is_class(class) {
            return Err(ExecutionError::general(format!(
                "invalid use of metaclass query: class '{class}' not found"
            ))
            .into());
        }
        let methods = self.symbols.methods(class).iter().map(|m| Value::string(m)).collect();
        Ok(Value::from(StructValue::from_iter([
            ("Name", Value::string(class)),
            ("Methods", Value::cell_row(methods)),
        ])))
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    /// `lhs OP= rhs`; displays the variable when `print` is set
    pub(crate) fn eval_assign(
        &mut self,
        lhs: &Spanned<Expr>,
        op: AssignOp,
        rhs: &Spanned<Expr>,
        print: bool,
    ) -> EvalResult<ValueList> {
        let lv = self.make_lvalue(lhs)?;
        if lv.numel() != 1 {
            return Err(ExecutionError::general(
                "invalid number of elements on LHS of assignment to a cs-list",
            )
            .into());
        }
        let value = match self.evaluate(rhs, 1)? {
            Some(Value::CsList(list)) => list.into_iter().next().ok_or_else(|| {
                ExecutionError::general("invalid number of elements on RHS of assignment")
            })?,
            Some(v) => v,
            None => {
                return Err(ExecutionError::general(
                    "value on right hand side of assignment is undefined",
                )
                .into());
            }
        };
        self.assign_lvalue(&lv, op, value)?;
        let name = lv.name().unwrap_or_default().to_string();
        if print && let Some(v) = self.varval(&name) {
            self.display_value(&name, &v);
        }
        if self.nargout_top() > 0 {
            return Ok(self.varval(&name).into_iter().collect());
        }
        Ok(Vec::new())
    }

    /// `[a, ~, c{1:2}] = rhs`
    pub(crate) fn eval_multi_assign(
        &mut self,
        lhs: &[Spanned<Expr>],
        rhs: &Spanned<Expr>,
        print: bool,
    ) -> EvalResult<ValueList> {
        let mut lvalues = Vec::with_capacity(lhs.len());
        for e in lhs {
            lvalues.push(self.make_lvalue(e)?);
        }
        let n_out: usize = lvalues.iter().map(Lvalue::numel).sum();
        let mask: Vec<bool> = lvalues
            .iter()
            .flat_map(|lv| std::iter::repeat_n(lv.is_black_hole(), lv.numel()))
            .collect();

        let saved = self.pending_ignored.replace(mask);
        let result = self.evaluate_n(rhs, n_out);
        self.pending_ignored = saved;
        let mut values = result?;
        if values.len() == 1 && values[0].is_cs_list() {
            values = Self::flatten(values);
        }
        let n = values.len();
        let single = lvalues.len() == 1;

        let mut assigned = Vec::new();
        let mut k = 0;
        for mut lv in lvalues {
            let mut nel = lv.numel();
            if nel != 1 {
                // [varargout{1:nargout}] = f() with nargout == 0
                if single
                    && nel == 0
                    && n > 0
                    && let Some(name) = lv.name()
                    && !self.is_variable(name)
                    && lv.is_empty_brace_index()
                    && let Lvalue::Var { chain, numel, .. } = &mut lv
                {
                    if let Some(last) = chain.last_mut() {
                        *last = Sub::Brace(vec![Value::scalar(1.0)]);
                    }
                    *numel = 1;
                    nel = 1;
                }
            }
            if nel != 1 {
                if k + nel > n {
                    return Err(
                        ExecutionError::missing_value("some elements undefined in return list").into(),
                    );
                }
                if let Some(gap) = values[k..k + nel].iter().position(|v| !v.is_defined()) {
                    return Err(ExecutionError::missing_value(format!(
                        "element number {} undefined in return list",
                        k + gap + 1
                    ))
                    .into());
                }
                if nel > 0 {
                    let slice = values[k..k + nel].to_vec();
                    self.assign_lvalue(&lv, AssignOp::Eq, Value::CsList(slice.clone()))?;
                    assigned.extend(slice);
                }
                k += nel;
            } else {
                if k < n && values[k].is_defined() {
                    if !lv.is_black_hole() {
                        let v = values[k].clone();
                        self.assign_lvalue(&lv, AssignOp::Eq, v.clone())?;
                        assigned.push(v);
                    }
                } else if !lv.is_black_hole() {
                    return Err(ExecutionError::missing_value(format!(
                        "element number {} undefined in return list",
                        k + 1
                    ))
                    .into());
                }
                k += 1;
            }
            if print
                && let Some(name) = lv.name()
                && let Some(v) = self.varval(name)
            {
                self.display_value(name, &v);
            }
        }
        if self.nargout_top() > 0 {
            return Ok(assigned);
        }
        Ok(Vec::new())
    }
}

/// Identifiers used in `expr` that are not in `bound`
fn free_identifiers(expr: &Expr, bound: &[&str], out: &mut BTreeSet<String>) {
    let walk = |e: &Spanned<Expr>, out: &mut BTreeSet<String>| free_identifiers(&e.node, bound, out);
    match expr {
        Expr::Ident(name) => {
            if !bound.contains(&name.as_str()) {
                out.insert(name.clone());
            }
        }
        Expr::Binary { left, right, .. }
        | Expr::Boolean { left, right, .. }
        | Expr::Compound { left, right, .. } => {
            walk(left, out);
            walk(right, out);
        }
        Expr::Prefix { operand, .. } | Expr::Postfix { operand, .. } => walk(operand, out),
        Expr::Range {
            base,
            increment,
            limit,
        } => {
            walk(base, out);
            if let Some(inc) = increment {
                walk(inc, out);
            }
            walk(limit, out);
        }
        Expr::Matrix(rows) | Expr::Cell(rows) => {
            for e in rows.iter().flatten() {
                walk(e, out);
            }
        }
        Expr::Index { base, chain } => {
            walk(base, out);
            for sub in chain {
                match sub {
                    Subscript::DynField(e) => walk(e, out),
                    _ => {
                        for a in sub.args() {
                            walk(a, out);
                        }
                    }
                }
            }
        }
        Expr::AnonFn {
            params,
            varargin,
            body,
            ..
        } => {
            let mut inner: Vec<&str> = bound.to_vec();
            inner.extend(params.iter().map(|p| p.name.as_str()));
            if *varargin {
                inner.push("varargin");
            }
            free_identifiers(&body.node, &inner, out);
        }
        Expr::Assign { lhs, rhs, .. } => {
            walk(lhs, out);
            walk(rhs, out);
        }
        Expr::MultiAssign { lhs, rhs } => {
            for e in lhs {
                walk(e, out);
            }
            walk(rhs, out);
        }
        Expr::Number(_)
        | Expr::Str { .. }
        | Expr::FnHandle(_)
        | Expr::SuperclassRef { .. }
        | Expr::MetaclassQuery(_)
        | Expr::MagicColon
        | Expr::MagicEnd
        | Expr::Tilde => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::{Exception, SharedBuffer};
    use pretty_assertions::assert_eq;

    fn run(code: &str) -> (Interpreter, String) {
        let out = SharedBuffer::new();
        let mut interp = Interpreter::new().with_output(out.clone());
        interp.eval_string(code, false, 0).unwrap();
        (interp, out.contents())
    }

    fn num(interp: &Interpreter, name: &str) -> Vec<f64> {
        interp.varval(name).unwrap().to_numeric().unwrap().into_data()
    }

    fn error_message(code: &str) -> String {
        let mut interp = Interpreter::new().with_error_output(SharedBuffer::new());
        match interp.eval_string(code, true, 0) {
            Err(Exception::Execution(e)) => e.message,
            other => panic!("expected an execution error, got {other:?}"),
        }
    }

    #[test]
    fn test_end_in_nested_index() {
        let (interp, _) = run("x = [1 2 3]; y = [4 5]; z = x(y(end) - 3);");
        assert_eq!(num(&interp, "z"), vec![2.0]);
    }

    #[test]
    fn test_end_outside_index_is_error() {
        assert_eq!(
            error_message("z = end;"),
            "invalid use of 'end': may only be used to index existing value"
        );
    }

    #[test]
    fn test_cell_literal_nests_cells() {
        let (interp, _) = run("c = {{1, 2}, 3};");
        let c = interp.varval("c").unwrap();
        assert_eq!(c.dims(), (1, 2));
        assert!(c.brace_index(&[Value::scalar(1.0)]).unwrap()[0].is_cell());
    }

    #[test]
    fn test_cs_list_splices_into_matrix() {
        let (interp, _) = run("c = {1, 2, 3}; m = [c{:}];");
        assert_eq!(num(&interp, "m"), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_anonymous_function_captures_by_value() {
        let (interp, _) = run("a = 2; f = @(x) a * x; a = 100; y = f(21);");
        assert_eq!(num(&interp, "y"), vec![42.0]);
    }

    #[test]
    fn test_short_circuit_boolean() {
        let (interp, _) = run("t = true || undefined_thing(); f = false && undefined_thing();");
        assert_eq!(num(&interp, "t"), vec![1.0]);
        assert_eq!(num(&interp, "f"), vec![0.0]);
    }

    #[test]
    fn test_empty_operand_of_boolean_is_error() {
        assert_eq!(
            error_message("x = [] || 1;"),
            "invalid conversion from empty value to real scalar"
        );
    }

    #[test]
    fn test_multi_assign_with_black_hole() {
        let (interp, _) = run("c = {1, 2, 3}; [a, ~, b] = c{:};");
        assert_eq!(num(&interp, "a"), vec![1.0]);
        assert_eq!(num(&interp, "b"), vec![3.0]);
    }

    #[test]
    fn test_multi_assign_too_few_values() {
        assert_eq!(
            error_message("c = {1}; [a, b] = c{:};"),
            "element number 2 undefined in return list"
        );
    }

    #[test]
    fn test_assignment_display() {
        let (_, out) = run("x = 3");
        assert_eq!(out, "x = 3\n");
    }

    #[test]
    fn test_increment_operators() {
        let (interp, _) = run("x = 1; x++; ++x; y = x;");
        assert_eq!(num(&interp, "y"), vec![3.0]);
    }

    #[test]
    fn test_free_identifiers_skip_params() {
        let mut free = BTreeSet::new();
        let body = Expr::Binary {
            op: BinOp::Add,
            left: Box::new(Spanned::new(Expr::Ident("x".into()), Default::default())),
            right: Box::new(Spanned::new(Expr::Ident("k".into()), Default::default())),
            braindead: false,
        };
        free_identifiers(&body, &["x"], &mut free);
        assert_eq!(free.into_iter().collect::<Vec<_>>(), vec!["k".to_string()]);
    }
}
