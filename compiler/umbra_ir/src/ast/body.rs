//! Flat storage for function bodies.
//!
//! Expressions and statements are allocated in an [`ExprArena`] and referred
//! to by 32-bit ids; there are no boxed expression trees.

use std::fmt;

use crate::{Name, ParsedArg, ParsedType, Span};

#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        ExprId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExprId({})", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StmtId(u32);

impl StmtId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        StmtId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StmtId({})", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn as_symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprKind {
    Int(i64),
    /// IEEE-754 bits, so the node stays `Eq`/`Hash`.
    Float(u64),
    Bool(bool),
    /// Local, parameter, or value generic parameter.
    Ident(Name),
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    /// `target = value` or `target op= value`.
    Assign {
        op: Option<BinaryOp>,
        target: ExprId,
        value: ExprId,
    },
    /// Call of a free function: `callee<type_args>(args)`.
    Call {
        callee: Name,
        type_args: Vec<ParsedArg>,
        args: Vec<ExprId>,
    },
    MethodCall {
        receiver: ExprId,
        method: Name,
        args: Vec<ExprId>,
    },
    Field {
        base: ExprId,
        name: Name,
    },
    /// Array/vector element or `__subscript` call.
    Index {
        base: ExprId,
        args: Vec<ExprId>,
    },
    /// `T(args)`: conversion or constructor call.
    Construct {
        ty: ParsedType,
        args: Vec<ExprId>,
    },
    Tuple(Vec<ExprId>),
    /// `Subject is Target`, a compile-time predicate.
    TypeIs {
        subject: ParsedType,
        target: ParsedType,
    },
    /// `countof(P)` for a type or value pack.
    CountOf(ParsedType),
    Expand(ExprId),
    Each(ExprId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StmtKind {
    Let {
        name: Name,
        ty: Option<ParsedType>,
        init: Option<ExprId>,
    },
    Expr(ExprId),
    Return(Option<ExprId>),
    If {
        cond: ExprId,
        then_branch: StmtId,
        else_branch: Option<StmtId>,
    },
    Block(Vec<StmtId>),
}

/// Arena owning every expression and statement of a module.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExprArena {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an expression.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` expressions are allocated.
    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = u32::try_from(self.exprs.len())
            .unwrap_or_else(|_| panic!("expression arena exceeded u32::MAX entries"));
        self.exprs.push(Expr { kind, span });
        ExprId(id)
    }

    /// Allocate a statement.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` statements are allocated.
    pub fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = u32::try_from(self.stmts.len())
            .unwrap_or_else(|_| panic!("statement arena exceeded u32::MAX entries"));
        self.stmts.push(Stmt { kind, span });
        StmtId(id)
    }

    /// # Panics
    /// Panics if `id` was not allocated by this arena.
    #[inline]
    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    /// # Panics
    /// Panics if `id` was not allocated by this arena.
    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense() {
        let mut arena = ExprArena::new();
        let a = arena.alloc_expr(ExprKind::Int(1), Span::new(0, 1));
        let b = arena.alloc_expr(ExprKind::Int(2), Span::new(2, 3));
        let sum = arena.alloc_expr(
            ExprKind::Binary {
                op: BinaryOp::Add,
                lhs: a,
                rhs: b,
            },
            Span::new(0, 3),
        );
        assert_eq!((a.raw(), b.raw(), sum.raw()), (0, 1, 2));
        assert_eq!(arena.expr_count(), 3);
        assert!(matches!(arena.expr(sum).kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn operator_classes() {
        assert!(BinaryOp::Rem.is_arithmetic());
        assert!(BinaryOp::Ge.is_comparison());
        assert!(BinaryOp::Or.is_logical());
        assert_eq!(BinaryOp::Le.as_symbol(), "<=");
    }
}
