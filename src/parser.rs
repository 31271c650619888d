use phf::phf_map;

use crate::ast::{Ast, Binop, EIndex, Expr, Stmt, TIndex, Type, XIndex};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{Token, TokenKind};

/// Names that turn `(name)` into a cast
static KNOWN_TYPES: phf::Map<&'static str, Type> = phf_map! {
    "int" => Type::Int,
    "float" => Type::Float,
};

pub struct Parser {
    tokens: Vec<Token>,
    tok_i: TIndex,
    ast: Ast,
}

macro_rules! eat {
    ($self:ident, $kind:pat, $message:expr) => {{
        let kind = $self.peek().kind;
        match kind {
            $kind => Ok($self.advance()),
            _ => Err(CompileError::parse($self.peek(), $message)),
        }
    }};
}

impl Parser {
    /// `tokens` should end with `TokenKind::Eof`, as produced by
    /// `lexer::tokenize`. One is appended if missing.
    pub fn new(mut tokens: Vec<Token>) -> Parser {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let (line, offset) = tokens
                .last()
                .map(|t| (t.line, t.offset + t.lexeme.len()))
                .unwrap_or((1, 0));
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                line,
                column: 0,
                offset,
            });
        }
        Parser {
            tokens,
            tok_i: 0,
            ast: Ast::default(),
        }
    }

    /// Parses the whole program. One error aborts everything, the partial
    /// tree is dropped.
    pub fn parse(mut self) -> CompileResult<Ast> {
        self._parse()?;
        self.ast.tokens = self.tokens;
        log::debug!(
            "parsed {} statements ({} expressions)",
            self.ast.stmts.len(),
            self.ast.exprs.len()
        );
        Ok(self.ast)
    }

    fn _parse(&mut self) -> CompileResult<()> {
        while !self.at_end() {
            let stmt = self.statement()?;
            self.ast.stmts.push(stmt);
        }
        Ok(())
    }

    fn peek(&self) -> &Token {
        return &self.tokens[self.tok_i];
    }

    fn peek_next(&self) -> Option<&Token> {
        return self.tokens.get(self.tok_i + 1);
    }

    fn at_end(&self) -> bool {
        return self.peek().kind == TokenKind::Eof;
    }

    /// returns the index of the consumed token
    fn advance(&mut self) -> TIndex {
        let i = self.tok_i;
        if !self.at_end() {
            self.tok_i += 1;
        }
        return i;
    }

    fn check(&self, kind: TokenKind) -> bool {
        return self.peek().kind == kind;
    }

    fn push(&mut self, expr: Expr) -> EIndex {
        return self.ast.push_expr(expr);
    }

    fn statement(&mut self) -> CompileResult<Stmt> {
        if self.check(TokenKind::Let) {
            self.advance();
            return self.let_statement();
        }
        let value = self.expression()?;
        eat!(self, TokenKind::Semicolon, "expected ';' after expression")?;
        Ok(Stmt::Expr(value))
    }

    fn let_statement(&mut self) -> CompileResult<Stmt> {
        let name = eat!(self, TokenKind::Ident, "expected variable name after 'let'")?;
        eat!(self, TokenKind::Eq, "expected '=' after variable name")?;
        let value = self.expression()?;
        eat!(self, TokenKind::Semicolon, "expected ';' after variable declaration")?;
        Ok(Stmt::Let { name, value })
    }

    fn expression(&mut self) -> CompileResult<EIndex> {
        return self.addition();
    }

    fn addition(&mut self) -> CompileResult<EIndex> {
        let mut lhs = self.multiplication()?;
        while let Some(op) = self.binop(&[TokenKind::Plus, TokenKind::Minus]) {
            let rhs = self.multiplication()?;
            lhs = self.push(Expr::Binop { op, lhs, rhs });
        }
        Ok(lhs)
    }

    fn multiplication(&mut self) -> CompileResult<EIndex> {
        let mut lhs = self.call()?;
        while let Some(op) = self.binop(&[TokenKind::Mul, TokenKind::Div]) {
            let rhs = self.call()?;
            lhs = self.push(Expr::Binop { op, lhs, rhs });
        }
        Ok(lhs)
    }

    /// consumes the next token if it is one of `kinds`
    fn binop(&mut self, kinds: &[TokenKind]) -> Option<Binop> {
        let kind = self.peek().kind;
        if !kinds.contains(&kind) {
            return None;
        }
        self.advance();
        return Binop::from_token(kind);
    }

    fn call(&mut self) -> CompileResult<EIndex> {
        let mut callee = self.primary()?;
        // `f(x)(y)` calls the result of `f(x)`
        while self.check(TokenKind::LParen) {
            self.advance();
            let args = self.arguments()?;
            callee = self.push(Expr::FunCall { callee, args });
        }
        Ok(callee)
    }

    fn arguments(&mut self) -> CompileResult<XIndex> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.check(TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        eat!(self, TokenKind::RParen, "expected ')' after arguments")?;
        return Ok(self.ast.extra.append_slice(&args));
    }

    fn primary(&mut self) -> CompileResult<EIndex> {
        let tok = self.peek();
        let expr = match tok.kind {
            TokenKind::Float => {
                let value = tok.lexeme.parse::<f64>().map_err(|_| {
                    CompileError::parse(tok, "invalid float literal")
                })?;
                Expr::Float(value)
            }
            TokenKind::Int => {
                let value = tok.lexeme.parse::<i64>().map_err(|_| {
                    CompileError::parse(tok, "integer literal out of range")
                })?;
                Expr::Int(value)
            }
            TokenKind::Ident => Expr::Ident(self.tok_i),
            TokenKind::LParen => {
                self.advance();
                return self.cast_or_group();
            }
            _ => {
                return Err(CompileError::parse(
                    tok,
                    "unexpected token when expecting an expression",
                ))
            }
        };
        self.advance();
        Ok(self.push(expr))
    }

    /// the `(` is already consumed
    fn cast_or_group(&mut self) -> CompileResult<EIndex> {
        if let Some(target) = self.cast_target() {
            self.advance();
            eat!(self, TokenKind::RParen, "expected ')' after type name in cast")?;
            // `(int)f()` casts the call
            let inner = self.call()?;
            return Ok(self.push(Expr::Cast { target, inner }));
        }
        let expr = self.expression()?;
        eat!(self, TokenKind::RParen, "expected ')' after expression")?;
        Ok(expr)
    }

    /// `Some` only for `IDENT )` where IDENT is a known type name
    fn cast_target(&self) -> Option<Type> {
        let name = self.peek();
        let closes = self
            .peek_next()
            .is_some_and(|next| next.kind == TokenKind::RParen);
        if name.kind != TokenKind::Ident || !closes {
            return None;
        }
        return KNOWN_TYPES.get(name.lexeme.as_str()).copied();
    }
}
