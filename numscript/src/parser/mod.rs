//! Recursive descent parser producing statement lists

mod expr;

use crate::ast::{
    DeclElt, DeclScope, Expr, FunctionDef, IfClause, LineIndex, Param, SourceFile, Span, Spanned,
    Statement, StatementList, Stmt, Subscript, SwitchCase,
};
use crate::error::{Result, SyntaxError};
use crate::lexer::{Token, tokenize};
use std::rc::Rc;

/// Parse a script, a command-line chunk or an `eval` string
pub fn parse(source: &str) -> Result<StatementList> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(source, tokens);
    let list = parser.parse_block(false)?;
    parser.expect_end_of_input()?;
    Ok(list)
}

/// Parse a file: function files start with `function`, anything else is a script
pub fn parse_file(source: &str) -> Result<SourceFile> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(source, tokens);
    parser.skip_separators();
    if !parser.check(&Token::Function) {
        let mut list = parser.parse_block(false)?;
        parser.expect_end_of_input()?;
        let line = parser.lines.line_count();
        list.push(parser.end_of_code(line));
        return Ok(SourceFile::Script(list));
    }

    let mut functions = Vec::new();
    loop {
        parser.skip_separators();
        if parser.at_end() {
            break;
        }
        if !parser.check(&Token::Function) {
            return Err(parser.unexpected("expected 'function'"));
        }
        functions.push(parser.parse_function(true)?);
    }
    Ok(SourceFile::Functions(functions))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nesting {
    /// `[]` or `{}` literal: blanks and newlines separate elements and rows
    Matrix,
    /// Parentheses or an index argument list
    Paren,
}

/// Parser state.
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(Token, Span)>,
    pos: usize,
    lines: LineIndex,
    nesting: Vec<Nesting>,
    /// Depth of index argument lists, where `end` is the magic end
    index_depth: usize,
    /// Inside a function of a function file: `function` ends the body
    implicit_function_end: bool,
    function_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: Vec<(Token, Span)>) -> Self {
        Parser {
            source,
            tokens,
            pos: 0,
            lines: LineIndex::new(source),
            nesting: Vec::new(),
            index_depth: 0,
            implicit_function_end: false,
            function_depth: 0,
        }
    }

    // ====================================================================
    // Statement lists
    // ====================================================================

    /// Parse statements until a block keyword or the end of input
    fn parse_block(&mut self, stop_at_function: bool) -> Result<StatementList> {
        let mut list = Vec::new();
        loop {
            self.skip_separators();
            let Some(tok) = self.peek() else { break };
            if tok.is_block_terminator() {
                break;
            }
            if stop_at_function && *tok == Token::Function {
                break;
            }
            list.push(self.parse_statement()?);
        }
        Ok(list)
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();
        let (line, column) = self.lines.line_col(start.start);

        let kind = match self.peek() {
            Some(Token::If) => self.parse_if()?,
            Some(Token::For) => self.parse_for()?,
            Some(Token::While) => self.parse_while()?,
            Some(Token::Do) => self.parse_do()?,
            Some(Token::Switch) => self.parse_switch()?,
            Some(Token::Try) => self.parse_try()?,
            Some(Token::UnwindProtect) => self.parse_unwind_protect()?,
            Some(Token::Break) => {
                self.advance();
                Stmt::Break
            }
            Some(Token::Continue) => {
                self.advance();
                Stmt::Continue
            }
            Some(Token::Return) => {
                self.advance();
                Stmt::Return
            }
            Some(Token::Global) => self.parse_decl(DeclScope::Global)?,
            Some(Token::Persistent) => self.parse_decl(DeclScope::Persistent)?,
            Some(Token::Function) => {
                if self.function_depth > 0 {
                    return Err(self.unexpected("nested functions are not supported"));
                }
                Stmt::FunctionDef(Rc::new(self.parse_function(false)?))
            }
            _ if self.is_command_syntax() => self.parse_command_syntax()?,
            _ => Stmt::Expression(self.parse_expression_statement()?),
        };

        let span = start.merge(self.previous_span());
        let print_result = self.finish_statement()?;
        Ok(Statement {
            kind,
            span,
            line,
            column,
            print_result,
        })
    }

    /// Consume the statement separator; returns whether the result is printed
    fn finish_statement(&mut self) -> Result<bool> {
        match self.peek() {
            None => Ok(true),
            Some(Token::Semi) => {
                self.advance();
                Ok(false)
            }
            Some(Token::Comma) | Some(Token::Newline) => {
                self.advance();
                Ok(true)
            }
            Some(tok) if tok.is_block_terminator() => Ok(true),
            Some(Token::Function) if self.implicit_function_end => Ok(true),
            Some(_) => Err(self.unexpected("parse error")),
        }
    }

    fn end_of_code(&self, line: usize) -> Statement {
        Statement {
            kind: Stmt::NoOp { end_of_code: true },
            span: Span::new(self.source.len(), self.source.len()),
            line,
            column: 1,
            print_result: false,
        }
    }

    // ====================================================================
    // Control statements
    // ====================================================================

    fn parse_if(&mut self) -> Result<Stmt> {
        let mut clauses = Vec::new();
        let mut line = self.current_line();
        self.advance(); // if
        let mut cond = Some(self.parse_condition()?);

        loop {
            let body = self.parse_block(false)?;
            clauses.push(IfClause {
                cond: cond.take(),
                body,
                line,
            });
            line = self.current_line();
            match self.peek() {
                Some(Token::Elseif) => {
                    self.advance();
                    self.skip_separators();
                    cond = Some(self.parse_condition()?);
                }
                Some(Token::Else) => {
                    self.advance();
                    let body = self.parse_block(false)?;
                    clauses.push(IfClause {
                        cond: None,
                        body,
                        line,
                    });
                    self.expect_block_end(&Token::EndIf, "if")?;
                    break;
                }
                _ => {
                    self.expect_block_end(&Token::EndIf, "if")?;
                    break;
                }
            }
        }
        Ok(Stmt::If(clauses))
    }

    /// `if`/`while` condition: `|` and `&` become eligible for short-circuiting
    fn parse_condition(&mut self) -> Result<Spanned<Expr>> {
        let mut cond = self.parse_expr()?;
        mark_braindead(&mut cond);
        Ok(cond)
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.advance(); // for
        let parenthesized = self.eat(&Token::LParen);
        if parenthesized {
            self.nesting.push(Nesting::Paren);
        }

        let stmt = if self.check(&Token::LBracket) {
            self.advance();
            let value = self.parse_postfix()?;
            self.eat(&Token::Comma);
            let key = self.parse_postfix()?;
            self.expect(&Token::RBracket, "']'")?;
            self.expect(&Token::Eq, "'='")?;
            let iter = self.parse_expr()?;
            if parenthesized {
                self.nesting.pop();
                self.expect(&Token::RParen, "')'")?;
            }
            let body = self.parse_block(false)?;
            Stmt::ComplexFor {
                value,
                key,
                iter,
                body,
            }
        } else {
            let var = self.parse_postfix()?;
            self.expect(&Token::Eq, "'='")?;
            let iter = self.parse_expr()?;
            if parenthesized {
                self.nesting.pop();
                self.expect(&Token::RParen, "')'")?;
            }
            let body = self.parse_block(false)?;
            Stmt::For { var, iter, body }
        };
        self.expect_block_end(&Token::EndFor, "for")?;
        Ok(stmt)
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        self.advance(); // while
        let cond = self.parse_condition()?;
        let body = self.parse_block(false)?;
        self.expect_block_end(&Token::EndWhile, "while")?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_do(&mut self) -> Result<Stmt> {
        self.advance(); // do
        let body = self.parse_block(false)?;
        let cond_line = self.current_line();
        self.expect(&Token::Until, "'until'")?;
        let cond = self.parse_condition()?;
        Ok(Stmt::DoUntil {
            body,
            cond,
            cond_line,
        })
    }

    fn parse_switch(&mut self) -> Result<Stmt> {
        self.advance(); // switch
        let value = self.parse_expr()?;
        let mut cases = Vec::new();
        loop {
            self.skip_separators();
            let line = self.current_line();
            match self.peek() {
                Some(Token::Case) => {
                    self.advance();
                    let label = self.parse_expr()?;
                    let body = self.parse_block(false)?;
                    cases.push(SwitchCase {
                        label: Some(label),
                        body,
                        line,
                    });
                }
                Some(Token::Otherwise) => {
                    self.advance();
                    let body = self.parse_block(false)?;
                    cases.push(SwitchCase {
                        label: None,
                        body,
                        line,
                    });
                }
                _ => break,
            }
        }
        self.expect_block_end(&Token::EndSwitch, "switch")?;
        Ok(Stmt::Switch { value, cases })
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        self.advance(); // try
        self.eat(&Token::Comma);
        let body = self.parse_block(false)?;
        let mut ident = None;
        let mut handler = Vec::new();
        if self.eat(&Token::Catch) {
            if let Some(Token::Ident(name)) = self.peek().cloned() {
                let follows = self.tokens.get(self.pos + 1).map(|(t, _)| t);
                if matches!(follows, None | Some(Token::Newline) | Some(Token::Semi)) {
                    self.advance();
                    ident = Some(name);
                }
            }
            handler = self.parse_block(false)?;
        }
        self.expect_block_end(&Token::EndTryCatch, "try")?;
        Ok(Stmt::TryCatch {
            body,
            ident,
            handler,
        })
    }

    fn parse_unwind_protect(&mut self) -> Result<Stmt> {
        self.advance(); // unwind_protect
        let body = self.parse_block(false)?;
        let mut cleanup = Vec::new();
        if self.eat(&Token::UnwindProtectCleanup) {
            cleanup = self.parse_block(false)?;
        }
        self.expect_block_end(&Token::EndUnwindProtect, "unwind_protect")?;
        Ok(Stmt::UnwindProtect { body, cleanup })
    }

    fn parse_decl(&mut self, scope: DeclScope) -> Result<Stmt> {
        self.advance(); // global / persistent
        let mut elts = Vec::new();
        while let Some(Token::Ident(name)) = self.peek().cloned() {
            self.advance();
            let init = if self.eat(&Token::Eq) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            elts.push(DeclElt { name, init });
        }
        if elts.is_empty() {
            return Err(self.unexpected("expected variable name in declaration"));
        }
        Ok(Stmt::Decl { scope, elts })
    }

    // ====================================================================
    // Functions
    // ====================================================================

    /// `function [o1, o2] = name (p1, p2 = default, varargin) ... end`
    fn parse_function(&mut self, in_file: bool) -> Result<FunctionDef> {
        let start = self.current_span();
        let line = self.current_line();
        self.advance(); // function

        let mut outputs = Vec::new();
        let name;
        if self.eat(&Token::LBracket) {
            while let Some(Token::Ident(out)) = self.peek().cloned() {
                self.advance();
                outputs.push(out);
                self.eat(&Token::Comma);
            }
            self.expect(&Token::RBracket, "']'")?;
            self.expect(&Token::Eq, "'='")?;
            name = self.expect_ident()?;
        } else {
            let first = self.expect_ident()?;
            if self.eat(&Token::Eq) {
                outputs.push(first);
                name = self.expect_ident()?;
            } else {
                name = first;
            }
        }

        let varargout = outputs.last().is_some_and(|o| o == "varargout");
        if varargout {
            outputs.pop();
        }

        let mut params = Vec::new();
        let mut varargin = false;
        if self.eat(&Token::LParen) {
            self.nesting.push(Nesting::Paren);
            let parsed = self.parse_param_list();
            self.nesting.pop();
            (params, varargin) = parsed?;
        }

        let saved_implicit = self.implicit_function_end;
        self.implicit_function_end = in_file;
        self.function_depth += 1;
        let body = self.parse_block(in_file);
        self.function_depth -= 1;
        self.implicit_function_end = saved_implicit;
        let mut body = body?;

        let end_line = self.current_line();
        let explicit_end = matches!(self.peek(), Some(Token::End) | Some(Token::EndFunction));
        if explicit_end {
            self.advance();
        } else if !in_file || !(self.at_end() || self.check(&Token::Function)) {
            return Err(self.block_end_error("function"));
        }
        let end_line = if explicit_end || !self.at_end() {
            end_line
        } else {
            self.lines.line_count()
        };
        body.push(self.end_of_code(end_line));

        Ok(FunctionDef {
            name,
            params,
            varargin,
            outputs,
            varargout,
            body,
            span: start.merge(self.previous_span()),
            line,
        })
    }

    /// Parameters after `(`, consuming the closing `)`
    fn parse_param_list(&mut self) -> Result<(Vec<Param>, bool)> {
        let mut params = Vec::new();
        let mut varargin = false;
        if self.eat(&Token::RParen) {
            return Ok((params, varargin));
        }
        loop {
            if varargin {
                return Err(self.unexpected("varargin must be the last parameter"));
            }
            match self.peek().cloned() {
                Some(Token::Not) => {
                    self.advance();
                    params.push(Param::new("~"));
                }
                Some(Token::Ident(name)) if name == "varargin" => {
                    self.advance();
                    varargin = true;
                }
                Some(Token::Ident(name)) => {
                    self.advance();
                    let default = if self.eat(&Token::Eq) {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    params.push(Param { name, default });
                }
                _ => return Err(self.unexpected("expected parameter name")),
            }
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(&Token::RParen, "')'")?;
            return Ok((params, varargin));
        }
    }

    // ====================================================================
    // Expression statements and command syntax
    // ====================================================================

    fn parse_expression_statement(&mut self) -> Result<Spanned<Expr>> {
        if self.check(&Token::LBracket) {
            let saved = self.pos;
            if let Some(lhs) = self.try_parse_output_list()? {
                let rhs = self.parse_expr()?;
                let span = self.tokens[saved].1.merge(rhs.span);
                return Ok(Spanned::new(
                    Expr::MultiAssign {
                        lhs,
                        rhs: Box::new(rhs),
                    },
                    span,
                ));
            }
            self.pos = saved;
        }

        let lhs = self.parse_expr()?;
        let Some(op) = self.peek().and_then(assign_op) else {
            return Ok(lhs);
        };
        if !is_assignable(&lhs.node) {
            return Err(SyntaxError::parser("invalid assignment target", lhs.span));
        }
        self.advance();
        let rhs = self.parse_expr()?;
        let span = lhs.span.merge(rhs.span);
        Ok(Spanned::new(
            Expr::Assign {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            },
            span,
        ))
    }

    /// `[a, ~, b] =`; returns `None` (without consuming) if this is not an output list
    fn try_parse_output_list(&mut self) -> Result<Option<Vec<Spanned<Expr>>>> {
        self.advance(); // [
        let saved_nesting = self.nesting.len();
        let saved_index_depth = self.index_depth;
        self.nesting.push(Nesting::Matrix);
        let mut targets = Vec::new();
        let ok = loop {
            match self.peek() {
                Some(Token::RBracket) => {
                    self.advance();
                    break true;
                }
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(Token::Not) => {
                    let span = self.current_span();
                    self.advance();
                    targets.push(Spanned::new(Expr::Tilde, span));
                }
                Some(Token::Ident(_)) => match self.parse_postfix() {
                    Ok(target) if is_assignable(&target.node) => targets.push(target),
                    _ => break false,
                },
                _ => break false,
            }
        };
        self.nesting.truncate(saved_nesting);
        self.index_depth = saved_index_depth;
        if ok && self.eat(&Token::Eq) {
            Ok(Some(targets))
        } else {
            Ok(None)
        }
    }

    /// `word arg1 arg2` where the arguments are taken as strings
    fn is_command_syntax(&self) -> bool {
        let Some((Token::Ident(_), name_span)) = self.tokens.get(self.pos) else {
            return false;
        };
        let Some((next, next_span)) = self.tokens.get(self.pos + 1) else {
            return false;
        };
        if next_span.start == name_span.end || !matches!(next, Token::Ident(_) | Token::Number(_)) {
            return false;
        }
        matches!(
            self.tokens.get(self.pos + 2).map(|(t, _)| t),
            None | Some(Token::Newline)
                | Some(Token::Semi)
                | Some(Token::Comma)
                | Some(Token::Ident(_))
                | Some(Token::Number(_))
        )
    }

    fn parse_command_syntax(&mut self) -> Result<Stmt> {
        let (name, name_span) = match self.advance_token() {
            Some((Token::Ident(name), span)) => (name, span),
            _ => return Err(self.unexpected("expected command name")),
        };
        let args_start = self.current_span().start;
        let mut args_end = args_start;
        while let Some(tok) = self.peek() {
            if matches!(tok, Token::Newline | Token::Semi | Token::Comma) {
                break;
            }
            args_end = self.current_span().end;
            self.advance();
        }
        let args = self.source[args_start..args_end]
            .split_whitespace()
            .map(|word| {
                Spanned::new(
                    Expr::Str {
                        value: word.to_string(),
                        double_quoted: false,
                    },
                    Span::new(args_start, args_end),
                )
            })
            .collect();
        let span = name_span.merge(Span::new(args_start, args_end));
        Ok(Stmt::Expression(Spanned::new(
            Expr::Index {
                base: Box::new(Spanned::new(Expr::Ident(name), name_span)),
                chain: vec![Subscript::Paren(args)],
            },
            span,
        )))
    }

    // ====================================================================
    // Token helpers
    // ====================================================================

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, tok: &Token) -> bool {
        self.peek().is_some_and(|t| std::mem::discriminant(t) == std::mem::discriminant(tok))
    }

    fn advance(&mut self) {
        if !self.at_end() {
            self.pos += 1;
        }
    }

    fn advance_token(&mut self) -> Option<(Token, Span)> {
        let tok = self.tokens.get(self.pos).cloned();
        self.advance();
        tok
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Token, what: &str) -> Result<Span> {
        if self.check(tok) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(self.unexpected(&format!("expected {what}")))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("expected identifier")),
        }
    }

    /// `end` or the block-specific `endXXX` keyword
    fn expect_block_end(&mut self, specific: &Token, block: &str) -> Result<()> {
        if self.eat(&Token::End) || self.eat(specific) {
            Ok(())
        } else {
            Err(self.block_end_error(block))
        }
    }

    fn block_end_error(&self, block: &str) -> SyntaxError {
        if self.at_end() {
            SyntaxError::incomplete(format!("'{block}' command not terminated"), self.current_span())
        } else {
            self.unexpected(&format!("'{block}' command matched by wrong keyword"))
        }
    }

    fn expect_end_of_input(&self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("parse error"))
        }
    }

    fn skip_separators(&mut self) {
        while self.peek().is_some_and(Token::is_separator) {
            self.advance();
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&Token::Newline) {
            self.advance();
        }
    }

    fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => *span,
            None => Span::new(self.source.len(), self.source.len()),
        }
    }

    fn previous_span(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some((_, span)) => *span,
            None => Span::new(0, 0),
        }
    }

    fn current_line(&self) -> usize {
        self.lines.line_col(self.current_span().start).0
    }

    /// Blank between the current token and the previous one
    fn blank_before(&self) -> bool {
        self.pos > 0
            && self
                .tokens
                .get(self.pos)
                .is_some_and(|(_, span)| span.start > self.tokens[self.pos - 1].1.end)
    }

    /// Blank between the current token and the next one
    fn blank_after(&self) -> bool {
        match (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)) {
            (Some((_, cur)), Some((_, next))) => next.start > cur.end,
            _ => true,
        }
    }

    fn in_matrix(&self) -> bool {
        self.nesting.last() == Some(&Nesting::Matrix)
    }

    fn unexpected(&self, message: &str) -> SyntaxError {
        match self.tokens.get(self.pos) {
            Some((tok, span)) => {
                let text = &self.source[span.start..span.end];
                let shown = if matches!(tok, Token::Newline) { "end of line" } else { text };
                SyntaxError::parser(format!("{message} near '{shown}'"), *span)
            }
            None => SyntaxError::incomplete(format!("{message} at end of input"), self.current_span()),
        }
    }
}

fn assign_op(tok: &Token) -> Option<crate::ast::AssignOp> {
    use crate::ast::AssignOp;
    match tok {
        Token::Eq => Some(AssignOp::Eq),
        Token::PlusEq => Some(AssignOp::Add),
        Token::MinusEq => Some(AssignOp::Sub),
        Token::StarEq => Some(AssignOp::Mul),
        Token::SlashEq => Some(AssignOp::Div),
        Token::CaretEq => Some(AssignOp::Pow),
        _ => None,
    }
}

fn is_assignable(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_) | Expr::Tilde => true,
        Expr::Index { base, .. } => matches!(base.node, Expr::Ident(_)),
        _ => false,
    }
}

fn mark_braindead(expr: &mut Spanned<Expr>) {
    use crate::ast::BinOp;
    if let Expr::Binary {
        op: BinOp::ElAnd | BinOp::ElOr,
        left,
        right,
        braindead,
    } = &mut expr.node
    {
        *braindead = true;
        mark_braindead(left);
        mark_braindead(right);
    }
}
