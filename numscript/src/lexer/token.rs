//! Token definitions

use logos::Logos;
use serde::{Deserialize, Serialize};

/// Source token
///
/// Single-quoted strings are not matched here: a lone `'` is either a
/// transpose or the start of a string depending on what precedes it, and
/// `tokenize` resolves that.
#[derive(Logos, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"\.\.\.[^\n]*\n?")]
#[logos(skip r"[%#][^\n]*")]
pub enum Token {
    // Keywords
    #[token("if")]
    If,
    #[token("elseif")]
    Elseif,
    #[token("else")]
    Else,
    #[token("end")]
    End,
    #[token("endif")]
    EndIf,
    #[token("while")]
    While,
    #[token("endwhile")]
    EndWhile,
    #[token("for")]
    #[token("parfor")]
    For,
    #[token("endfor")]
    #[token("endparfor")]
    EndFor,
    #[token("do")]
    Do,
    #[token("until")]
    Until,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("otherwise")]
    Otherwise,
    #[token("endswitch")]
    EndSwitch,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("end_try_catch")]
    EndTryCatch,
    #[token("unwind_protect")]
    UnwindProtect,
    #[token("unwind_protect_cleanup")]
    UnwindProtectCleanup,
    #[token("end_unwind_protect")]
    EndUnwindProtect,
    #[token("function")]
    Function,
    #[token("endfunction")]
    EndFunction,
    #[token("return")]
    Return,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("global")]
    Global,
    #[token("persistent")]
    Persistent,

    // Literals
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\\n]|\\.|"")*""#, |lex| unescape_double_quoted(lex.slice()))]
    DqString(String),

    /// Single-quoted string, produced by `tokenize`
    SqString(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("\\")]
    Backslash,
    #[token("^")]
    #[token("**")]
    Caret,
    #[token(".*")]
    DotStar,
    #[token("./")]
    DotSlash,
    #[token(".\\")]
    DotBackslash,
    #[token(".^")]
    #[token(".**")]
    DotCaret,
    #[token("'")]
    Quote,
    #[token(".'")]
    DotQuote,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,

    #[token("==")]
    EqEq,
    #[token("!=")]
    #[token("~=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,

    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("!")]
    #[token("~")]
    Not,

    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("^=")]
    CaretEq,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("@")]
    At,
    #[token("?")]
    Question,

    #[regex(r"\r?\n")]
    Newline,
}

impl Token {
    /// Whether a following `'` is a transpose rather than a string
    pub fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Ident(_)
                | Token::Number(_)
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Quote
                | Token::DotQuote
                | Token::End
                | Token::SqString(_)
                | Token::DqString(_)
        )
    }

    /// Keywords that close or continue a block
    pub fn is_block_terminator(&self) -> bool {
        matches!(
            self,
            Token::End
                | Token::EndIf
                | Token::EndWhile
                | Token::EndFor
                | Token::EndSwitch
                | Token::EndTryCatch
                | Token::EndUnwindProtect
                | Token::EndFunction
                | Token::Else
                | Token::Elseif
                | Token::Case
                | Token::Otherwise
                | Token::Catch
                | Token::UnwindProtectCleanup
                | Token::Until
        )
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, Token::Newline | Token::Semi | Token::Comma)
    }
}

fn unescape_double_quoted(slice: &str) -> Option<String> {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = match chars.next()? {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'a' => '\x07',
                    '0' => '\0',
                    '\\' => '\\',
                    '"' => '"',
                    '\'' => '\'',
                    other => other,
                };
                out.push(escaped);
            }
            '"' => {
                // doubled quote inside a double-quoted string
                chars.next();
                out.push('"');
            }
            other => out.push(other),
        }
    }
    Some(out)
}
