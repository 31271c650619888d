use std::ops::Range;

use crate::lexer::{Token, TokenKind};

pub mod stringify;
pub mod typecheck;

/// Expression index
pub type EIndex = usize;

/// Token index
pub type TIndex = usize;

/// An index into the `extra` field of `Ast`
pub type XIndex = usize;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Type {
    /// not yet checked
    Unknown,
    Void,
    Int,
    Float,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Binop {
    Add,
    Sub,
    Mul,
    Div,
}

impl Binop {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        let op = match kind {
            TokenKind::Plus => Binop::Add,
            TokenKind::Minus => Binop::Sub,
            TokenKind::Mul => Binop::Mul,
            TokenKind::Div => Binop::Div,
            _ => return None,
        };
        return Some(op);
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Binop::Add => "+",
            Binop::Sub => "-",
            Binop::Mul => "*",
            Binop::Div => "/",
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Ident(TIndex),
    Binop {
        op: Binop,
        lhs: EIndex,
        rhs: EIndex,
    },
    Cast {
        target: Type,
        inner: EIndex,
    },
    /// args points to a length-prefixed slice of expr indices in extra
    FunCall {
        callee: EIndex,
        args: XIndex,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Stmt {
    Let { name: TIndex, value: EIndex },
    Expr(EIndex),
}

/// Length-prefixed lists of indices
#[derive(Debug, Default)]
pub struct Extra {
    data: Vec<u32>,
}

impl Extra {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn append_slice(&mut self, items: &[EIndex]) -> XIndex {
        let i = self.data.len();
        self.data.push(items.len() as u32);
        self.data.extend(items.iter().map(|&item| item as u32));
        return i;
    }

    /// range of the items (not the length prefix) of the list at `i`
    pub fn range(&self, i: XIndex) -> Range<usize> {
        let len = self.data[i] as usize;
        return (i + 1)..(i + 1 + len);
    }

    pub fn slice(&self, i: XIndex) -> &[u32] {
        return &self.data[self.range(i)];
    }

    pub fn len_of(&self, i: XIndex) -> usize {
        return self.data[i] as usize;
    }
}

impl std::ops::Index<usize> for Extra {
    type Output = u32;

    fn index(&self, i: usize) -> &u32 {
        &self.data[i]
    }
}

/// Arena holding one parsed program. Every expression is owned by exactly
/// one parent (or statement), `types` is parallel to `exprs`.
#[derive(Debug, Default)]
pub struct Ast {
    pub tokens: Vec<Token>,
    pub exprs: Vec<Expr>,
    pub types: Vec<Type>,
    pub stmts: Vec<Stmt>,
    pub extra: Extra,
}

impl Ast {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            exprs: Vec::new(),
            types: Vec::new(),
            stmts: Vec::new(),
            extra: Extra::new(),
        }
    }

    /// literals get their type here, everything else starts out unknown
    pub fn push_expr(&mut self, expr: Expr) -> EIndex {
        let ty = match expr {
            Expr::Int(_) => Type::Int,
            Expr::Float(_) => Type::Float,
            _ => Type::Unknown,
        };
        self.exprs.push(expr);
        self.types.push(ty);
        debug_assert_eq!(self.exprs.len(), self.types.len());
        return self.exprs.len() - 1;
    }

    pub fn get_ident(&self, i: TIndex) -> &str {
        return &self.tokens[i].lexeme;
    }

    pub fn call_args(
        &self,
        args: XIndex,
    ) -> impl DoubleEndedIterator<Item = EIndex> + ExactSizeIterator + '_ {
        self.extra.slice(args).iter().map(|&arg| arg as EIndex)
    }

    pub fn type_of(&self, i: EIndex) -> Type {
        return self.types[i];
    }
}
