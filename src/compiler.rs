use anyhow::Result;

use crate::ast::typecheck::typecheck;
use crate::ast::Ast;
use crate::error::Warning;
use crate::ir::{IrGen, IrProgram};
use crate::lexer::tokenize;
use crate::lower::Assembler;
use crate::parser::Parser;

/// Everything the front end produced for one source text.
#[derive(Debug)]
pub struct Compilation {
    /// annotated with the resolved type of every expression
    pub ast: Ast,
    pub warnings: Vec<Warning>,
    pub ir: IrProgram,
}

/// Lex, parse, check and lower `source` to IR. A `CompileError` from the
/// parser or the checker is returned inside the `anyhow::Error`.
pub fn compile(source: &str) -> Result<Compilation> {
    let tokens = tokenize(source);
    let mut ast = Parser::new(tokens).parse()?;
    let warnings = typecheck(&mut ast)?;
    let ir = IrGen::generate(&ast)?;
    return Ok(Compilation { ast, warnings, ir });
}

/// `compile` followed by the assembler, into memory.
pub fn compile_to_asm(source: &str) -> Result<String> {
    let compilation = compile(source)?;
    let out = Assembler::new(Vec::new()).assemble(&compilation.ir)?;
    return Ok(String::from_utf8(out)?);
}
