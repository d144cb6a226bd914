//! Syntax error types and reporting

use crate::ast::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SyntaxError>;

/// Error raised while turning source text into statements
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("lexer error at {span}: {message}")]
    Lexer { message: String, span: Span },

    #[error("parse error at {span}: {message}")]
    Parser { message: String, span: Span },

    /// Input ended inside an open block or bracket
    #[error("parse error at {span}: {message}")]
    Incomplete { message: String, span: Span },
}

impl SyntaxError {
    pub fn lexer(message: impl Into<String>, span: Span) -> Self {
        Self::Lexer {
            message: message.into(),
            span,
        }
    }

    pub fn parser(message: impl Into<String>, span: Span) -> Self {
        Self::Parser {
            message: message.into(),
            span,
        }
    }

    pub fn incomplete(message: impl Into<String>, span: Span) -> Self {
        Self::Incomplete {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Lexer { span, .. } | Self::Parser { span, .. } | Self::Incomplete { span, .. } => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lexer { message, .. }
            | Self::Parser { message, .. }
            | Self::Incomplete { message, .. } => message,
        }
    }

    /// More input could complete the statement
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}

/// Render a syntax error with ariadne into a string
pub fn render_error(filename: &str, source: &str, error: &SyntaxError) -> String {
    use ariadne::{Color, Config, Label, Report, ReportKind, Source};

    let kind = match error {
        SyntaxError::Lexer { .. } => "lexer",
        SyntaxError::Parser { .. } | SyntaxError::Incomplete { .. } => "parse",
    };

    let span = error.span();
    let end = span.end.min(source.len()).max(span.start.min(source.len()));
    let start = span.start.min(end);

    let mut out = Vec::new();
    let written = Report::build(ReportKind::Error, (filename, start..end))
        .with_config(Config::default().with_color(false))
        .with_message(format!("{kind} error"))
        .with_label(
            Label::new((filename, start..end))
                .with_message(error.message())
                .with_color(Color::Red),
        )
        .finish()
        .write((filename, Source::from(source)), &mut out);

    match written {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => format!("{kind} error: {}\n", error.message()),
    }
}

/// Report error with ariadne on stderr
pub fn report_error(filename: &str, source: &str, error: &SyntaxError) {
    eprint!("{}", render_error(filename, source, error));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_is_distinguished() {
        let err = SyntaxError::incomplete("missing end", Span::new(0, 2));
        assert!(err.is_incomplete());
        assert!(!SyntaxError::parser("bad", Span::new(0, 1)).is_incomplete());
    }

    #[test]
    fn test_render_error_mentions_message() {
        let err = SyntaxError::parser("unexpected ')'", Span::new(4, 5));
        let text = render_error("t.m", "x = )", &err);
        assert!(text.contains("parse error"));
        assert!(text.contains("unexpected ')'"));
    }
}
