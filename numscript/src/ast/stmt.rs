//! Statement AST nodes

use super::{Expr, Param, Span, Spanned};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

pub type StatementList = Vec<Statement>;

/// A statement with its source position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub kind: Stmt,
    pub span: Span,
    pub line: usize,
    pub column: usize,
    /// Not terminated by `;`
    pub print_result: bool,
}

impl Statement {
    pub fn is_expression(&self) -> bool {
        matches!(self.kind, Stmt::Expression(_))
    }

    pub fn is_end_of_code(&self) -> bool {
        matches!(self.kind, Stmt::NoOp { end_of_code: true })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Expression(Spanned<Expr>),

    /// `global a b = 1` / `persistent n`
    Decl { scope: DeclScope, elts: Vec<DeclElt> },

    For {
        var: Spanned<Expr>,
        iter: Spanned<Expr>,
        body: StatementList,
    },

    /// `for [val, key] = s`
    ComplexFor {
        value: Spanned<Expr>,
        key: Spanned<Expr>,
        iter: Spanned<Expr>,
        body: StatementList,
    },

    While {
        cond: Spanned<Expr>,
        body: StatementList,
    },

    DoUntil {
        body: StatementList,
        cond: Spanned<Expr>,
        /// Line of the `until` clause
        cond_line: usize,
    },

    /// Clauses in order; the `else` clause has no condition
    If(Vec<IfClause>),

    Switch {
        value: Spanned<Expr>,
        cases: Vec<SwitchCase>,
    },

    TryCatch {
        body: StatementList,
        ident: Option<String>,
        handler: StatementList,
    },

    UnwindProtect {
        body: StatementList,
        cleanup: StatementList,
    },

    Break,
    Continue,
    Return,

    /// Placeholder; `end_of_code` marks the end of a function or script body
    NoOp { end_of_code: bool },

    /// Function defined at the command line or inside a script
    FunctionDef(Rc<FunctionDef>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclScope {
    Global,
    Persistent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclElt {
    pub name: String,
    pub init: Option<Spanned<Expr>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfClause {
    pub cond: Option<Spanned<Expr>>,
    pub body: StatementList,
    pub line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for `otherwise`
    pub label: Option<Spanned<Expr>>,
    pub body: StatementList,
    pub line: usize,
}

impl SwitchCase {
    pub fn is_default(&self) -> bool {
        self.label.is_none()
    }
}

/// A parsed `function` block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    /// Trailing `varargin` in the parameter list
    pub varargin: bool,
    pub outputs: Vec<String>,
    /// Trailing `varargout` in the output list
    pub varargout: bool,
    pub body: StatementList,
    pub span: Span,
    pub line: usize,
}

/// Result of parsing a source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceFile {
    /// Plain statements executed in the caller's workspace
    Script(StatementList),
    /// Main function followed by its subfunctions
    Functions(Vec<FunctionDef>),
}

/// Line of the first statement at or after `line`, searching nested blocks
pub fn first_statement_line_from(list: &[Statement], line: usize) -> Option<usize> {
    let mut best: Option<usize> = None;
    let mut consider = |l: usize| {
        if l >= line && best.is_none_or(|b| l < b) {
            best = Some(l);
        }
    };
    for stmt in list {
        if !matches!(stmt.kind, Stmt::FunctionDef(_)) {
            consider(stmt.line);
        }
        for child in child_lists(&stmt.kind) {
            if let Some(l) = first_statement_line_from(child, line) {
                consider(l);
            }
        }
    }
    best
}

fn child_lists(kind: &Stmt) -> Vec<&StatementList> {
    match kind {
        Stmt::For { body, .. }
        | Stmt::ComplexFor { body, .. }
        | Stmt::While { body, .. }
        | Stmt::DoUntil { body, .. } => vec![body],
        Stmt::If(clauses) => clauses.iter().map(|c| &c.body).collect(),
        Stmt::Switch { cases, .. } => cases.iter().map(|c| &c.body).collect(),
        Stmt::TryCatch { body, handler, .. } => vec![body, handler],
        Stmt::UnwindProtect { body, cleanup } => vec![body, cleanup],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(kind: Stmt, line: usize) -> Statement {
        Statement {
            kind,
            span: Span::default(),
            line,
            column: 1,
            print_result: false,
        }
    }

    #[test]
    fn test_first_statement_line_snaps_forward() {
        let body = vec![
            stmt(Stmt::Break, 2),
            stmt(
                Stmt::While {
                    cond: Spanned::new(Expr::Number(1.0), Span::default()),
                    body: vec![stmt(Stmt::Continue, 5)],
                },
                4,
            ),
        ];
        assert_eq!(first_statement_line_from(&body, 1), Some(2));
        assert_eq!(first_statement_line_from(&body, 3), Some(4));
        assert_eq!(first_statement_line_from(&body, 5), Some(5));
        assert_eq!(first_statement_line_from(&body, 6), None);
    }
}
