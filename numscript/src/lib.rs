//! numscript
//!
//! Tree-walking evaluator for an Octave-like numerical scripting language,
//! with an interactive prompt, a source-level debugger and statement echo.

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod value;

pub use ast::Span;
pub use error::{Result, SyntaxError};
pub use interp::{EvalResult, Exception, ExecutionError, Interpreter, Settings};
pub use value::Value;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing to stderr.
///
/// Safe to call more than once. Enable with `RUST_LOG=numscript=debug`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(filter)
                .init();
        }
    });
}
