use anyhow::{Context, Result};

use crate::ast::{Ast, Binop, EIndex, Expr, Stmt, Type};

pub mod stringify;

#[derive(Debug, PartialEq, Clone)]
pub enum Operand {
    Int(i64),
    Float(f64),
    /// user variable, or an external function when used as a callee
    Name(String),
    /// compiler generated `tN`, written once and read once
    Temp(String),
}

/// Three-address instruction. `dest` is a user variable for `Assign` and a
/// temporary for everything else.
#[derive(Debug, PartialEq, Clone)]
pub enum Inst {
    Binop {
        op: Binop,
        lhs: Operand,
        rhs: Operand,
        dest: String,
    },
    Assign {
        src: Operand,
        dest: String,
    },
    Cast {
        src: Operand,
        from: Type,
        to: Type,
        dest: String,
    },
    /// pass one argument to the next call
    Param(Operand),
    Call {
        callee: Operand,
        argc: usize,
        dest: String,
    },
}

impl Inst {
    /// the name this instruction writes to, if any
    pub fn dest(&self) -> Option<&str> {
        match self {
            Inst::Binop { dest, .. }
            | Inst::Assign { dest, .. }
            | Inst::Cast { dest, .. }
            | Inst::Call { dest, .. } => Some(dest),
            Inst::Param(_) => None,
        }
    }

    /// operands read by this instruction, in evaluation order
    pub fn sources(&self) -> Vec<&Operand> {
        match self {
            Inst::Binop { lhs, rhs, .. } => vec![lhs, rhs],
            Inst::Assign { src, .. } | Inst::Cast { src, .. } | Inst::Param(src) => vec![src],
            Inst::Call { callee, .. } => vec![callee],
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct IrProgram {
    pub insts: Vec<Inst>,
}

/// Lowers a type-checked `Ast` in one depth-first, left-to-right pass.
pub struct IrGen<'ast> {
    ast: &'ast Ast,
    insts: Vec<Inst>,
    temp_counter: usize,
    /// value of the most recently visited expression, read by its parent
    last: Option<Operand>,
}

impl<'ast> IrGen<'ast> {
    pub fn generate(ast: &'ast Ast) -> Result<IrProgram> {
        let mut this = IrGen {
            ast,
            insts: vec![],
            temp_counter: 0,
            last: None,
        };
        this._generate()?;
        log::debug!(
            "generated {} instructions using {} temporaries",
            this.insts.len(),
            this.temp_counter
        );
        return Ok(IrProgram { insts: this.insts });
    }

    fn _generate(&mut self) -> Result<()> {
        let ast = self.ast;
        for stmt in &ast.stmts {
            match *stmt {
                Stmt::Let { name, value } => {
                    self.gen_expr(value)?;
                    let src = self.take_last()?;
                    let dest = ast.get_ident(name).to_string();
                    self.push(Inst::Assign { src, dest });
                }
                Stmt::Expr(value) => {
                    self.gen_expr(value)?;
                    // the value is unused
                    self.last = None;
                }
            }
        }
        Ok(())
    }

    fn push(&mut self, inst: Inst) {
        self.insts.push(inst);
    }

    fn new_temp(&mut self) -> String {
        let name = format!("t{}", self.temp_counter);
        self.temp_counter += 1;
        return name;
    }

    fn take_last(&mut self) -> Result<Operand> {
        return self.last.take().context("expression produced no value");
    }

    fn gen_expr(&mut self, i: EIndex) -> Result<()> {
        let ast = self.ast;
        let expr = ast.exprs[i];
        match expr {
            Expr::Int(value) => self.last = Some(Operand::Int(value)),
            Expr::Float(value) => self.last = Some(Operand::Float(value)),
            Expr::Ident(name) => {
                self.last = Some(Operand::Name(ast.get_ident(name).to_string()))
            }
            Expr::Binop { op, lhs, rhs } => {
                self.gen_expr(lhs)?;
                let lhs = self.take_last()?;
                self.gen_expr(rhs)?;
                let rhs = self.take_last()?;
                let dest = self.new_temp();
                self.push(Inst::Binop {
                    op,
                    lhs,
                    rhs,
                    dest: dest.clone(),
                });
                self.last = Some(Operand::Temp(dest));
            }
            Expr::Cast { target, inner } => {
                self.gen_expr(inner)?;
                let src = self.take_last()?;
                let dest = self.new_temp();
                self.push(Inst::Cast {
                    src,
                    from: ast.type_of(inner),
                    to: target,
                    dest: dest.clone(),
                });
                self.last = Some(Operand::Temp(dest));
            }
            Expr::FunCall { callee, args } => {
                let argc = ast.extra.len_of(args);
                // last argument first, each param right after its value
                for arg in ast.call_args(args).rev() {
                    self.gen_expr(arg)?;
                    let src = self.take_last()?;
                    self.push(Inst::Param(src));
                }
                self.gen_expr(callee)?;
                let callee = self.take_last()?;
                let dest = self.new_temp();
                self.push(Inst::Call {
                    callee,
                    argc,
                    dest: dest.clone(),
                });
                self.last = Some(Operand::Temp(dest));
            }
        }
        Ok(())
    }
}
