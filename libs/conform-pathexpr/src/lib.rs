//! A small, self-contained path-expression compiler and evaluator.
//!
//! Expressions navigate a JSON-shaped resource tree using member access,
//! indexing, boolean connectives, comparisons, union, and a fixed set of
//! collection functions (`exists`, `empty`, `count`, `where`, `all`,
//! `length`, `matches`, `startsWith`, `not`, `ofType`, `extension`).
//! Evaluation always produces a collection; see [`value::truthy`] for how a
//! collection is interpreted as a boolean.

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;
mod value;

pub use ast::Expression;
pub use error::{Error, Result};
pub use value::{truthy, Collection};

use serde_json::Value;

/// Compiles a path-expression once so it can be evaluated repeatedly.
pub fn compile(text: &str) -> Result<Expression> {
    let root = parser::parse(text)?;
    Ok(Expression {
        root,
        source: text.to_string(),
    })
}

/// Evaluates a compiled expression against a starting focus collection.
pub fn evaluate(expr: &Expression, focus: &[Value]) -> Result<Collection> {
    eval::eval(&expr.root, &focus.to_vec())
}
