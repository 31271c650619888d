pub mod ast;
pub mod compiler;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod lower;
pub mod parser;
