//! Monomorphic output: what code generation receives.
//!
//! Nothing here mentions a generic parameter. Pack parameters appear as one
//! entry per element, `expand` has been unrolled, and static `is` tests are
//! folded to the branch they select.

use smallvec::SmallVec;
use umbra_ir::{BinaryOp, Name, UnaryOp};
use umbra_types::{TypeId, ValueArg};

use super::InstanceId;

/// A parameter or local. Elements of a pack parameter share its name and
/// are told apart by `element`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MonoVar {
    pub name: Name,
    pub element: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonoParam {
    pub var: MonoVar,
    pub ty: TypeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonoFunction {
    pub params: Vec<MonoParam>,
    pub ret: TypeId,
    /// Receiver type of a member; `None` for free and static functions.
    pub this: Option<TypeId>,
    pub body: Option<MonoStmt>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonoExpr {
    pub kind: MonoExprKind,
    pub ty: TypeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonoExprKind {
    Int(i64),
    /// IEEE-754 bits.
    Float(u64),
    Bool(bool),
    Var(MonoVar),
    This,
    /// Value generic parameter, now a constant.
    Value(ValueArg),
    Binary {
        op: BinaryOp,
        lhs: Box<MonoExpr>,
        rhs: Box<MonoExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<MonoExpr>,
    },
    Assign {
        op: Option<BinaryOp>,
        target: Box<MonoExpr>,
        value: Box<MonoExpr>,
    },
    Call {
        callee: InstanceId,
        receiver: Option<Box<MonoExpr>>,
        args: Vec<MonoExpr>,
    },
    Field {
        base: Box<MonoExpr>,
        name: Name,
    },
    Swizzle {
        base: Box<MonoExpr>,
        components: SmallVec<[u8; 4]>,
    },
    TupleElement {
        base: Box<MonoExpr>,
        index: u32,
    },
    Index {
        base: Box<MonoExpr>,
        args: Vec<MonoExpr>,
    },
    Convert(Box<MonoExpr>),
    /// Vector, struct or tuple built from its components.
    Construct(Vec<MonoExpr>),
    Tuple(Vec<MonoExpr>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonoStmt {
    Let {
        var: MonoVar,
        ty: TypeId,
        init: Option<MonoExpr>,
    },
    Expr(MonoExpr),
    Return(Option<MonoExpr>),
    If {
        cond: MonoExpr,
        then_branch: Box<MonoStmt>,
        else_branch: Option<Box<MonoStmt>>,
    },
    Block(Vec<MonoStmt>),
}

impl MonoStmt {
    /// Statements in evaluation order, blocks flattened; for tests and
    /// quick inspection.
    pub fn walk(&self, f: &mut impl FnMut(&MonoStmt)) {
        f(self);
        match self {
            MonoStmt::Block(stmts) => {
                for s in stmts {
                    s.walk(f);
                }
            }
            MonoStmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                then_branch.walk(f);
                if let Some(e) = else_branch {
                    e.walk(f);
                }
            }
            MonoStmt::Let { .. } | MonoStmt::Expr(_) | MonoStmt::Return(_) => {}
        }
    }
}
