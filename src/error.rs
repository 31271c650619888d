use std::fmt;

use thiserror::Error;

use crate::lexer::Token;

pub type CompileResult<T> = Result<T, CompileError>;

/// Fatal front-end errors. Either one aborts the compilation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("parse error at {line}:{column}: {message} (at token '{lexeme}')")]
    Parse {
        lexeme: String,
        message: String,
        line: u32,
        column: u32,
    },

    #[error("semantic error: {0}")]
    Semantic(String),
}

impl CompileError {
    pub fn parse(tok: &Token, message: impl Into<String>) -> Self {
        Self::Parse {
            lexeme: tok.lexeme.clone(),
            message: message.into(),
            line: tok.line,
            column: tok.column,
        }
    }

    pub fn semantic(message: impl Into<String>) -> Self {
        Self::Semantic(message.into())
    }
}

/// Non-fatal diagnostic, analysis continues after one is reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning: {}", self.message)
    }
}
