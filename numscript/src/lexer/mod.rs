//! Lexer implementation using logos

mod token;

pub use token::Token;

use crate::ast::Span;
use crate::error::{Result, SyntaxError};
use logos::Logos;

/// Tokenize source code
///
/// Decides whether each `'` is a transpose or opens a single-quoted string:
/// it transposes when it directly follows an operand, except that inside
/// `[]`/`{}` a preceding blank starts a new (string) element.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
    let mut tokens: Vec<(Token, Span)> = Vec::new();
    let mut brackets: Vec<Token> = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = Span::new(lexer.span().start, lexer.span().end);
        let token = match result {
            Ok(token) => token,
            Err(_) => {
                return Err(SyntaxError::lexer(
                    format!("unexpected character: {:?}", lexer.slice()),
                    span,
                ));
            }
        };

        match token {
            Token::Quote => {
                let in_matrix = matches!(brackets.last(), Some(Token::LBracket | Token::LBrace));
                let transpose = tokens.last().is_some_and(|(prev, prev_span)| {
                    let spaced = prev_span.end < span.start;
                    prev.ends_operand() && !(spaced && in_matrix)
                });
                if transpose {
                    tokens.push((Token::Quote, span));
                    continue;
                }
                let Some((text, consumed)) = scan_single_quoted(lexer.remainder()) else {
                    return Err(SyntaxError::lexer(
                        "unterminated character string constant",
                        Span::new(span.start, source.len()),
                    ));
                };
                lexer.bump(consumed);
                tokens.push((Token::SqString(text), Span::new(span.start, span.end + consumed)));
                continue;
            }
            Token::LParen | Token::LBracket | Token::LBrace => brackets.push(token.clone()),
            Token::RParen | Token::RBracket | Token::RBrace => {
                brackets.pop();
            }
            _ => {}
        }

        tokens.push((token, span));
    }

    Ok(tokens)
}

/// Reserved words; none of them can name a variable
const KEYWORDS: &[&str] = &[
    "break", "case", "catch", "continue", "do", "else", "elseif", "end", "end_try_catch",
    "end_unwind_protect", "endfor", "endfunction", "endif", "endparfor", "endswitch", "endwhile",
    "for", "function", "global", "if", "otherwise", "parfor", "persistent", "return", "switch",
    "try", "until", "unwind_protect", "unwind_protect_cleanup", "while",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Scan the body of a single-quoted string; `''` is an embedded quote.
/// Returns the text and the number of bytes consumed including the closing quote.
fn scan_single_quoted(rest: &str) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => {
                if let Some((_, '\'')) = chars.peek() {
                    chars.next();
                    text.push('\'');
                } else {
                    return Some((text, i + 1));
                }
            }
            '\n' => return None,
            other => text.push(other),
        }
    }
    None
}
