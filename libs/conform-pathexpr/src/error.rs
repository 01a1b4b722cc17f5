//! Error types for compiling and evaluating path-expressions.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unexpected end of expression, expected {0}")]
    UnexpectedEof(&'static str),

    #[error("unexpected token '{0}', expected {1}")]
    UnexpectedToken(String, &'static str),

    #[error("trailing input after expression: '{0}'")]
    TrailingInput(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("function '{0}' expects {1} argument(s), got {2}")]
    ArityMismatch(String, usize, usize),

    #[error("{0}")]
    EvalError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
