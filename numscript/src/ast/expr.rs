//! Expression AST nodes

use super::Spanned;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// Variable or function reference
    Ident(String),

    /// Numeric constant
    Number(f64),
    /// Character string constant
    Str { value: String, double_quoted: bool },

    /// Element-wise or matrix binary operation
    Binary {
        op: BinOp,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
        /// `|`/`&` in an if/while condition: short-circuits on 1x1 operands
        braindead: bool,
    },

    /// Short-circuit `&&` / `||`
    Boolean {
        op: BoolOp,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },

    /// Fused operation such as `a' * b` or `!a & b`
    Compound {
        op: CompoundOp,
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },

    Prefix {
        op: PrefixOp,
        operand: Box<Spanned<Expr>>,
    },

    Postfix {
        op: PostfixOp,
        operand: Box<Spanned<Expr>>,
    },

    /// `base:limit` or `base:increment:limit`
    Range {
        base: Box<Spanned<Expr>>,
        increment: Option<Box<Spanned<Expr>>>,
        limit: Box<Spanned<Expr>>,
    },

    /// `[a, b; c, d]`, rows of elements
    Matrix(Vec<Vec<Spanned<Expr>>>),
    /// `{a, b; c, d}`
    Cell(Vec<Vec<Spanned<Expr>>>),

    /// Indexing or call chain: `f(x)`, `s.a{2}(3)`
    Index {
        base: Box<Spanned<Expr>>,
        chain: Vec<Subscript>,
    },

    /// `@(params) body`
    AnonFn {
        params: Vec<Param>,
        varargin: bool,
        body: Rc<Spanned<Expr>>,
        /// Source text of the body, used by `func2str` and display
        text: String,
    },

    /// `@name`
    FnHandle(String),

    /// `method@Class`
    SuperclassRef { method: String, class: String },
    /// `?Class`
    MetaclassQuery(String),

    /// `:` used as a whole-dimension index
    MagicColon,
    /// `end` inside an index expression
    MagicEnd,
    /// `~` placeholder in an output list
    Tilde,

    /// `lhs = rhs`, `lhs += rhs`, ...
    Assign {
        lhs: Box<Spanned<Expr>>,
        op: AssignOp,
        rhs: Box<Spanned<Expr>>,
    },

    /// `[a, ~, c{1:2}] = rhs`
    MultiAssign {
        lhs: Vec<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
}

impl Expr {
    pub fn is_identifier(&self) -> bool {
        matches!(self, Expr::Ident(_))
    }

    pub fn is_assignment(&self) -> bool {
        matches!(self, Expr::Assign { .. } | Expr::MultiAssign { .. })
    }

    /// Name of the variable an assignment target ultimately writes to
    pub fn base_name(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            Expr::Index { base, .. } => base.node.base_name(),
            _ => None,
        }
    }

    /// Whether `end` appears in this expression outside of a nested index
    pub fn has_magic_end(&self) -> bool {
        match self {
            Expr::MagicEnd => true,
            Expr::Binary { left, right, .. }
            | Expr::Boolean { left, right, .. }
            | Expr::Compound { left, right, .. } => left.node.has_magic_end() || right.node.has_magic_end(),
            Expr::Prefix { operand, .. } | Expr::Postfix { operand, .. } => operand.node.has_magic_end(),
            Expr::Range { base, increment, limit } => {
                base.node.has_magic_end()
                    || increment.as_ref().is_some_and(|e| e.node.has_magic_end())
                    || limit.node.has_magic_end()
            }
            Expr::Matrix(rows) | Expr::Cell(rows) => {
                rows.iter().flatten().any(|e| e.node.has_magic_end())
            }
            Expr::Index { base, .. } => base.node.has_magic_end(),
            _ => false,
        }
    }
}

/// One link of an index chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Subscript {
    Paren(Vec<Spanned<Expr>>),
    Brace(Vec<Spanned<Expr>>),
    Field(String),
    /// `s.(expr)`
    DynField(Box<Spanned<Expr>>),
}

impl Subscript {
    pub fn args(&self) -> &[Spanned<Expr>] {
        match self {
            Subscript::Paren(args) | Subscript::Brace(args) => args,
            Subscript::Field(_) | Subscript::DynField(_) => &[],
        }
    }

    pub fn has_magic_end(&self) -> bool {
        self.args().iter().any(|a| a.node.has_magic_end())
    }

    pub fn type_char(&self) -> char {
        match self {
            Subscript::Paren(_) => '(',
            Subscript::Brace(_) => '{',
            Subscript::Field(_) | Subscript::DynField(_) => '.',
        }
    }
}

/// Function or anonymous-function parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    /// `~` for an ignored parameter
    pub name: String,
    pub default: Option<Spanned<Expr>>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.name == "~"
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    LeftDiv,
    Pow,
    ElMul,
    ElDiv,
    ElLeftDiv,
    ElPow,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    ElAnd,
    ElOr,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::LeftDiv => "\\",
            BinOp::Pow => "^",
            BinOp::ElMul => ".*",
            BinOp::ElDiv => "./",
            BinOp::ElLeftDiv => ".\\",
            BinOp::ElPow => ".^",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Ge => ">=",
            BinOp::Gt => ">",
            BinOp::ElAnd => "&",
            BinOp::ElOr => "|",
        };
        write!(f, "{s}")
    }
}

/// Short-circuit operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

impl std::fmt::Display for BoolOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoolOp::And => write!(f, "&&"),
            BoolOp::Or => write!(f, "||"),
        }
    }
}

/// Fused operators produced by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompoundOp {
    /// `a' * b`
    TransMul,
    /// `a * b'`
    MulTrans,
    /// `a' \ b`
    TransLeftDiv,
    /// `!a & b`
    NotAnd,
    /// `!a | b`
    NotOr,
    /// `a & !b`
    AndNot,
    /// `a | !b`
    OrNot,
}

impl std::fmt::Display for CompoundOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CompoundOp::TransMul => "transtimes",
            CompoundOp::MulTrans => "timestrans",
            CompoundOp::TransLeftDiv => "transldiv",
            CompoundOp::NotAnd => "notand",
            CompoundOp::NotOr => "notor",
            CompoundOp::AndNot => "andnot",
            CompoundOp::OrNot => "ornot",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrefixOp {
    Neg,
    Plus,
    Not,
    Incr,
    Decr,
}

impl std::fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PrefixOp::Neg => "-",
            PrefixOp::Plus => "+",
            PrefixOp::Not => "!",
            PrefixOp::Incr => "++",
            PrefixOp::Decr => "--",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostfixOp {
    Transpose,
    CTranspose,
    Incr,
    Decr,
}

impl std::fmt::Display for PostfixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PostfixOp::Transpose => ".'",
            PostfixOp::CTranspose => "'",
            PostfixOp::Incr => "++",
            PostfixOp::Decr => "--",
        };
        write!(f, "{s}")
    }
}

/// Assignment operator; `Eq` is plain `=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Eq,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl AssignOp {
    /// Binary operator applied before storing, if any
    pub fn binary_op(self) -> Option<BinOp> {
        match self {
            AssignOp::Eq => None,
            AssignOp::Add => Some(BinOp::Add),
            AssignOp::Sub => Some(BinOp::Sub),
            AssignOp::Mul => Some(BinOp::Mul),
            AssignOp::Div => Some(BinOp::Div),
            AssignOp::Pow => Some(BinOp::Pow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn node(e: Expr) -> Spanned<Expr> {
        Spanned::new(e, Span::default())
    }

    #[test]
    fn test_base_name_through_index_chain() {
        let e = Expr::Index {
            base: Box::new(node(Expr::Ident("s".into()))),
            chain: vec![Subscript::Field("a".into())],
        };
        assert_eq!(e.base_name(), Some("s"));
        assert_eq!(Expr::Number(1.0).base_name(), None);
    }

    #[test]
    fn test_has_magic_end_stops_at_nested_index() {
        let direct = Expr::Binary {
            op: BinOp::Sub,
            left: Box::new(node(Expr::MagicEnd)),
            right: Box::new(node(Expr::Number(1.0))),
            braindead: false,
        };
        assert!(direct.has_magic_end());

        let nested = Expr::Index {
            base: Box::new(node(Expr::Ident("y".into()))),
            chain: vec![Subscript::Paren(vec![node(Expr::MagicEnd)])],
        };
        assert!(!nested.has_magic_end());
    }

    #[test]
    fn test_assign_op_binary_op() {
        assert_eq!(AssignOp::Eq.binary_op(), None);
        assert_eq!(AssignOp::Add.binary_op(), Some(BinOp::Add));
    }
}
