use super::{Ast, EIndex, Expr, Stmt, Type};
use crate::error::{CompileError, CompileResult, Warning};

/// Resolves the type of every expression reachable from a statement,
/// writing it into `ast.types`. Children are always checked before their
/// parent. Returns the non-fatal warnings in the order they were found.
pub fn typecheck(ast: &mut Ast) -> CompileResult<Vec<Warning>> {
    let mut checker = TypeChecker {
        ast,
        warnings: Vec::new(),
    };
    for i in 0..checker.ast.stmts.len() {
        let stmt = checker.ast.stmts[i];
        match stmt {
            Stmt::Let { value, .. } | Stmt::Expr(value) => {
                checker.check_expr(value)?;
            }
        }
    }
    log::debug!(
        "typecheck done: {} expressions, {} warnings",
        checker.ast.exprs.len(),
        checker.warnings.len()
    );
    Ok(checker.warnings)
}

struct TypeChecker<'ast> {
    ast: &'ast mut Ast,
    warnings: Vec<Warning>,
}

impl TypeChecker<'_> {
    fn check_expr(&mut self, expr_i: EIndex) -> CompileResult<Type> {
        let expr = self.ast.exprs[expr_i];
        let ty = match expr {
            // typed at construction
            Expr::Int(_) | Expr::Float(_) => return Ok(self.ast.types[expr_i]),
            // NOTE: no symbol table yet, every variable is assumed to be an int
            Expr::Ident(_) => Type::Int,
            Expr::Binop { lhs, rhs, .. } => self.check_binop(lhs, rhs)?,
            Expr::Cast { target, inner } => self.check_cast(target, inner)?,
            Expr::FunCall { callee, args } => {
                self.check_expr(callee)?;
                // index range because the arg list lives in `self.ast`
                for arg_i in self.ast.extra.range(args) {
                    let arg = self.ast.extra[arg_i] as EIndex;
                    self.check_expr(arg)?;
                }
                // NOTE: no function signatures yet, every call returns an int
                Type::Int
            }
        };
        debug_assert_eq!(self.ast.types[expr_i], Type::Unknown, "expr typed twice");
        self.ast.types[expr_i] = ty;
        return Ok(ty);
    }

    fn check_binop(&mut self, lhs: EIndex, rhs: EIndex) -> CompileResult<Type> {
        let lhs_type = self.check_expr(lhs)?;
        let rhs_type = self.check_expr(rhs)?;
        let ty = match (lhs_type, rhs_type) {
            (Type::Float, _) | (_, Type::Float) => Type::Float,
            (Type::Int, Type::Int) => Type::Int,
            _ => {
                return Err(CompileError::semantic(format!(
                    "incompatible types for binary operator ({:?} and {:?})",
                    lhs_type, rhs_type
                )))
            }
        };
        return Ok(ty);
    }

    fn check_cast(&mut self, target: Type, inner: EIndex) -> CompileResult<Type> {
        let source = self.check_expr(inner)?;
        match source {
            Type::Unknown | Type::Void => {
                return Err(CompileError::semantic(format!(
                    "cannot cast from {:?} to {:?}",
                    source, target
                )))
            }
            Type::Float if target == Type::Int => {
                let warning = Warning {
                    message: "possible loss of precision in conversion from float to int"
                        .to_string(),
                };
                log::warn!("{}", warning.message);
                self.warnings.push(warning);
            }
            _ => {}
        }
        return Ok(target);
    }
}
