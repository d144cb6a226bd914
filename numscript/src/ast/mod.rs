//! Abstract Syntax Tree definitions

mod expr;
mod span;
mod stmt;

pub use expr::*;
pub use span::*;
pub use stmt::*;
