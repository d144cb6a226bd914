//! Expression parsing, lowest to highest precedence:
//! `||`, `&&`, `|`, `&`, comparison, `:`, `+ -`, `* /`, prefix unary, `^`, postfix.

use super::{Nesting, Parser};
use crate::ast::{
    BinOp, BoolOp, CompoundOp, Expr, Param, PostfixOp, PrefixOp, Span, Spanned, Subscript,
};
use crate::error::{Result, SyntaxError};
use crate::lexer::Token;
use std::rc::Rc;

type Node = Spanned<Expr>;

fn binary(op: BinOp, left: Node, right: Node) -> Node {
    let span = left.span.merge(right.span);
    Spanned::new(
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            braindead: false,
        },
        span,
    )
}

fn compound(op: CompoundOp, left: Node, right: Node) -> Node {
    let span = left.span.merge(right.span);
    Spanned::new(
        Expr::Compound {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

/// Operand of a `!x` node, if that is what `node` is
fn strip_not(node: Node) -> std::result::Result<Node, Node> {
    match node.node {
        Expr::Prefix {
            op: PrefixOp::Not,
            operand,
        } => Ok(*operand),
        other => Err(Spanned::new(other, node.span)),
    }
}

/// Operand of a transpose node, if that is what `node` is
fn strip_transpose(node: Node) -> std::result::Result<Node, Node> {
    match node.node {
        Expr::Postfix {
            op: PostfixOp::Transpose | PostfixOp::CTranspose,
            operand,
        } => Ok(*operand),
        other => Err(Spanned::new(other, node.span)),
    }
}

/// `a & b` / `a | b`, folding a negated operand into a compound operator
fn logical(op: BinOp, left: Node, right: Node) -> Node {
    let (not_left, left_not) = match op {
        BinOp::ElAnd => (CompoundOp::NotAnd, CompoundOp::AndNot),
        _ => (CompoundOp::NotOr, CompoundOp::OrNot),
    };
    match strip_not(left) {
        Ok(inner) => compound(not_left, inner, right),
        Err(left) => match strip_not(right) {
            Ok(inner) => compound(left_not, left, inner),
            Err(right) => binary(op, left, right),
        },
    }
}

/// `a * b` / `a \ b`, folding a transposed operand into a compound operator
fn multiplicative(op: BinOp, left: Node, right: Node) -> Node {
    match op {
        BinOp::Mul => match strip_transpose(left) {
            Ok(inner) => compound(CompoundOp::TransMul, inner, right),
            Err(left) => match strip_transpose(right) {
                Ok(inner) => compound(CompoundOp::MulTrans, left, inner),
                Err(right) => binary(op, left, right),
            },
        },
        BinOp::LeftDiv => match strip_transpose(left) {
            Ok(inner) => compound(CompoundOp::TransLeftDiv, inner, right),
            Err(left) => binary(op, left, right),
        },
        _ => binary(op, left, right),
    }
}

impl Parser<'_> {
    pub(super) fn parse_expr(&mut self) -> Result<Node> {
        self.parse_oror()
    }

    fn parse_oror(&mut self) -> Result<Node> {
        let mut left = self.parse_andand()?;
        while self.check(&Token::PipePipe) {
            self.advance();
            self.skip_newlines_in_parens();
            let right = self.parse_andand()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Boolean {
                    op: BoolOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_andand(&mut self) -> Result<Node> {
        let mut left = self.parse_elor()?;
        while self.check(&Token::AmpAmp) {
            self.advance();
            self.skip_newlines_in_parens();
            let right = self.parse_elor()?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Boolean {
                    op: BoolOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_elor(&mut self) -> Result<Node> {
        let mut left = self.parse_eland()?;
        while self.check(&Token::Pipe) {
            self.advance();
            let right = self.parse_eland()?;
            left = logical(BinOp::ElOr, left, right);
        }
        Ok(left)
    }

    fn parse_eland(&mut self) -> Result<Node> {
        let mut left = self.parse_comparison()?;
        while self.check(&Token::Amp) {
            self.advance();
            let right = self.parse_comparison()?;
            left = logical(BinOp::ElAnd, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let mut left = self.parse_range()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::LtEq) => BinOp::Le,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::GtEq) => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_range()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// `base:limit` or `base:increment:limit`
    fn parse_range(&mut self) -> Result<Node> {
        let base = self.parse_additive()?;
        if !self.check(&Token::Colon) || self.colon_is_magic() {
            return Ok(base);
        }
        self.advance();
        let second = self.parse_additive()?;
        let (increment, limit) = if self.check(&Token::Colon) && !self.colon_is_magic() {
            self.advance();
            let third = self.parse_additive()?;
            (Some(Box::new(second)), third)
        } else {
            (None, second)
        };
        let span = base.span.merge(limit.span);
        Ok(Spanned::new(
            Expr::Range {
                base: Box::new(base),
                increment,
                limit: Box::new(limit),
            },
            span,
        ))
    }

    /// A `:` followed by `,` or a closing delimiter
    fn colon_is_magic(&self) -> bool {
        matches!(
            self.peek_at(1),
            Some(Token::Comma) | Some(Token::RParen) | Some(Token::RBrace) | Some(Token::RBracket)
        )
    }

    fn parse_additive(&mut self) -> Result<Node> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let (op, unary) = match self.peek() {
                Some(Token::Plus) => (BinOp::Add, None),
                Some(Token::Minus) => (BinOp::Sub, None),
                // `a++b` is `a + (+b)`
                Some(Token::PlusPlus) => (BinOp::Add, Some(PrefixOp::Plus)),
                Some(Token::MinusMinus) => (BinOp::Sub, Some(PrefixOp::Neg)),
                _ => break,
            };
            // `[1 -2]` holds two elements, `[1 - 2]` one
            if self.in_matrix() && self.blank_before() && !self.blank_after() {
                break;
            }
            if unary.is_some() && self.ends_statement_after_current() {
                break;
            }
            let op_span = self.current_span();
            self.advance();
            let mut right = self.parse_multiplicative()?;
            if let Some(prefix) = unary {
                let span = op_span.merge(right.span);
                right = Spanned::new(
                    Expr::Prefix {
                        op: prefix,
                        operand: Box::new(right),
                    },
                    span,
                );
            }
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Node> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Backslash) => BinOp::LeftDiv,
                Some(Token::DotStar) => BinOp::ElMul,
                Some(Token::DotSlash) => BinOp::ElDiv,
                Some(Token::DotBackslash) => BinOp::ElLeftDiv,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = multiplicative(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        let op = match self.peek() {
            Some(Token::Minus) => PrefixOp::Neg,
            Some(Token::Plus) => PrefixOp::Plus,
            Some(Token::Not) => PrefixOp::Not,
            Some(Token::PlusPlus) => PrefixOp::Incr,
            Some(Token::MinusMinus) => PrefixOp::Decr,
            _ => return self.parse_power(),
        };
        let start = self.current_span();
        self.advance();
        let operand = self.parse_unary()?;
        let span = start.merge(operand.span);
        Ok(Spanned::new(
            Expr::Prefix {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// `^` and `.^` are left-associative and bind tighter than prefix minus
    fn parse_power(&mut self) -> Result<Node> {
        let mut left = self.parse_postfix()?;
        loop {
            let op = match self.peek() {
                Some(Token::Caret) => BinOp::Pow,
                Some(Token::DotCaret) => BinOp::ElPow,
                _ => break,
            };
            self.advance();
            let right = self.parse_power_operand()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    /// `2^-1` allows a prefix operator on the exponent
    fn parse_power_operand(&mut self) -> Result<Node> {
        let op = match self.peek() {
            Some(Token::Minus) => PrefixOp::Neg,
            Some(Token::Plus) => PrefixOp::Plus,
            Some(Token::Not) => PrefixOp::Not,
            _ => return self.parse_postfix(),
        };
        let start = self.current_span();
        self.advance();
        let operand = self.parse_power_operand()?;
        let span = start.merge(operand.span);
        Ok(Spanned::new(
            Expr::Prefix {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// Primary expression followed by indexing, field access and postfix operators
    pub(super) fn parse_postfix(&mut self) -> Result<Node> {
        let mut expr = self.parse_primary()?;
        let mut chain: Vec<Subscript> = Vec::new();
        let mut end = expr.span;

        loop {
            let boundary = self.in_matrix() && self.blank_before();
            match self.peek() {
                Some(Token::LParen) if !boundary => {
                    self.advance();
                    let args = self.parse_args(&Token::RParen, "')'")?;
                    end = self.previous_span();
                    chain.push(Subscript::Paren(args));
                }
                Some(Token::LBrace) if !boundary => {
                    self.advance();
                    let args = self.parse_args(&Token::RBrace, "'}'")?;
                    end = self.previous_span();
                    chain.push(Subscript::Brace(args));
                }
                Some(Token::Dot) if !boundary => {
                    self.advance();
                    match self.peek().cloned() {
                        Some(Token::Ident(name)) => {
                            self.advance();
                            chain.push(Subscript::Field(name));
                        }
                        Some(Token::LParen) => {
                            self.advance();
                            self.nesting.push(Nesting::Paren);
                            let field = self.parse_expr();
                            self.nesting.pop();
                            let field = field?;
                            self.expect(&Token::RParen, "')'")?;
                            chain.push(Subscript::DynField(Box::new(field)));
                        }
                        _ => return Err(self.unexpected("expected field name")),
                    }
                    end = self.previous_span();
                }
                Some(Token::Quote) | Some(Token::DotQuote) => {
                    let op = if self.check(&Token::Quote) {
                        PostfixOp::CTranspose
                    } else {
                        PostfixOp::Transpose
                    };
                    self.advance();
                    expr = self.close_chain(expr, &mut chain, end);
                    end = self.previous_span();
                    let span = expr.span.merge(end);
                    expr = Spanned::new(
                        Expr::Postfix {
                            op,
                            operand: Box::new(expr),
                        },
                        span,
                    );
                }
                Some(Token::PlusPlus) | Some(Token::MinusMinus) if self.ends_statement_after_current() => {
                    let op = if self.check(&Token::PlusPlus) {
                        PostfixOp::Incr
                    } else {
                        PostfixOp::Decr
                    };
                    self.advance();
                    expr = self.close_chain(expr, &mut chain, end);
                    end = self.previous_span();
                    let span = expr.span.merge(end);
                    expr = Spanned::new(
                        Expr::Postfix {
                            op,
                            operand: Box::new(expr),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(self.close_chain(expr, &mut chain, end))
    }

    fn close_chain(&self, base: Node, chain: &mut Vec<Subscript>, end: Span) -> Node {
        if chain.is_empty() {
            return base;
        }
        let span = base.span.merge(end);
        Spanned::new(
            Expr::Index {
                base: Box::new(base),
                chain: std::mem::take(chain),
            },
            span,
        )
    }

    /// Index or call arguments up to `close`, which is consumed
    fn parse_args(&mut self, close: &Token, what: &str) -> Result<Vec<Node>> {
        self.nesting.push(Nesting::Paren);
        self.index_depth += 1;
        let result = self.parse_args_inner(close, what);
        self.index_depth -= 1;
        self.nesting.pop();
        result
    }

    fn parse_args_inner(&mut self, close: &Token, what: &str) -> Result<Vec<Node>> {
        let mut args = Vec::new();
        self.skip_newlines();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            self.skip_newlines();
            if self.check(&Token::Colon) && self.colon_is_magic() {
                let span = self.current_span();
                self.advance();
                args.push(Spanned::new(Expr::MagicColon, span));
            } else {
                args.push(self.parse_expr()?);
            }
            self.skip_newlines();
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(close, what)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let span = self.current_span();
        let Some(tok) = self.peek().cloned() else {
            return Err(self.unexpected("expected expression"));
        };
        match tok {
            Token::Number(n) => {
                self.advance();
                Ok(Spanned::new(Expr::Number(n), span))
            }
            Token::DqString(value) => {
                self.advance();
                Ok(Spanned::new(
                    Expr::Str {
                        value,
                        double_quoted: true,
                    },
                    span,
                ))
            }
            Token::SqString(value) => {
                self.advance();
                Ok(Spanned::new(
                    Expr::Str {
                        value,
                        double_quoted: false,
                    },
                    span,
                ))
            }
            Token::Ident(name) => {
                self.advance();
                // `method@Class`
                if self.check(&Token::At) && !self.blank_before() {
                    if let Some(Token::Ident(class)) = self.peek_at(1).cloned() {
                        self.advance();
                        let end = self.current_span();
                        self.advance();
                        return Ok(Spanned::new(
                            Expr::SuperclassRef {
                                method: name,
                                class,
                            },
                            span.merge(end),
                        ));
                    }
                }
                Ok(Spanned::new(Expr::Ident(name), span))
            }
            Token::End if self.index_depth > 0 => {
                self.advance();
                Ok(Spanned::new(Expr::MagicEnd, span))
            }
            Token::LParen => {
                self.advance();
                self.nesting.push(Nesting::Paren);
                self.skip_newlines();
                let inner = self.parse_expr();
                self.nesting.pop();
                let inner = inner?;
                self.expect(&Token::RParen, "')'")?;
                Ok(Spanned::new(inner.node, span.merge(self.previous_span())))
            }
            Token::LBracket => {
                self.advance();
                let rows = self.parse_matrix_rows(&Token::RBracket, "']'")?;
                Ok(Spanned::new(Expr::Matrix(rows), span.merge(self.previous_span())))
            }
            Token::LBrace => {
                self.advance();
                let rows = self.parse_matrix_rows(&Token::RBrace, "'}'")?;
                Ok(Spanned::new(Expr::Cell(rows), span.merge(self.previous_span())))
            }
            Token::At => {
                self.advance();
                self.parse_handle(span)
            }
            Token::Question => {
                self.advance();
                let class = self.expect_ident()?;
                Ok(Spanned::new(Expr::MetaclassQuery(class), span.merge(self.previous_span())))
            }
            _ => Err(self.unexpected("parse error")),
        }
    }

    /// After `@`: a named handle or an anonymous function
    fn parse_handle(&mut self, start: Span) -> Result<Node> {
        if !self.eat(&Token::LParen) {
            let name = self.expect_ident()?;
            return Ok(Spanned::new(Expr::FnHandle(name), start.merge(self.previous_span())));
        }

        self.nesting.push(Nesting::Paren);
        let params = self.parse_anon_params();
        self.nesting.pop();
        let (params, varargin) = params?;

        // The body is a fresh expression context: `end` is not the magic end
        // of an enclosing index.
        let saved_depth = std::mem::replace(&mut self.index_depth, 0);
        let body = self.parse_expr();
        self.index_depth = saved_depth;
        let body = body?;

        let text = self.source[body.span.start..body.span.end].to_string();
        let span = start.merge(body.span);
        Ok(Spanned::new(
            Expr::AnonFn {
                params,
                varargin,
                body: Rc::new(body),
                text,
            },
            span,
        ))
    }

    fn parse_anon_params(&mut self) -> Result<(Vec<Param>, bool)> {
        let mut params = Vec::new();
        let mut varargin = false;
        if self.eat(&Token::RParen) {
            return Ok((params, varargin));
        }
        loop {
            match self.peek().cloned() {
                Some(Token::Ident(name)) if name == "varargin" => {
                    self.advance();
                    varargin = true;
                }
                Some(Token::Ident(name)) => {
                    self.advance();
                    params.push(Param::new(name));
                }
                Some(Token::Not) => {
                    self.advance();
                    params.push(Param::new("~"));
                }
                _ => return Err(self.unexpected("expected parameter name")),
            }
            if self.eat(&Token::Comma) {
                if varargin {
                    return Err(self.unexpected("varargin must be the last parameter"));
                }
                continue;
            }
            self.expect(&Token::RParen, "')'")?;
            return Ok((params, varargin));
        }
    }

    /// Rows of a `[]` or `{}` literal up to `close`, which is consumed
    fn parse_matrix_rows(&mut self, close: &Token, what: &str) -> Result<Vec<Vec<Node>>> {
        self.nesting.push(Nesting::Matrix);
        let result = self.parse_matrix_rows_inner(close, what);
        self.nesting.pop();
        result
    }

    fn parse_matrix_rows_inner(&mut self, close: &Token, what: &str) -> Result<Vec<Vec<Node>>> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(SyntaxError::incomplete(
                        format!("unterminated matrix literal, expected {what}"),
                        self.current_span(),
                    ));
                }
                Some(tok) if std::mem::discriminant(tok) == std::mem::discriminant(close) => {
                    self.advance();
                    break;
                }
                Some(Token::Semi) | Some(Token::Newline) => {
                    self.advance();
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::RParen) | Some(Token::RBracket) | Some(Token::RBrace) => {
                    return Err(self.unexpected(&format!("expected {what}")));
                }
                Some(_) => row.push(self.parse_expr()?),
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Inside parentheses a line break after a binary operator continues the expression
    fn skip_newlines_in_parens(&mut self) {
        if self.nesting.last() == Some(&Nesting::Paren) {
            self.skip_newlines();
        }
    }

    /// The token after the current one ends the statement or argument
    fn ends_statement_after_current(&self) -> bool {
        matches!(
            self.peek_at(1),
            None | Some(Token::Newline)
                | Some(Token::Semi)
                | Some(Token::Comma)
                | Some(Token::RParen)
                | Some(Token::RBracket)
                | Some(Token::RBrace)
        )
    }
}
