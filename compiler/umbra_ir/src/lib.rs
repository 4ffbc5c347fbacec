//! Umbra IR: identifiers, spans and declaration syntax.
//!
//! This crate is the boundary between the parser and the generics front end:
//! - `Name` / `StringInterner` for interned identifiers
//! - `Span` for source locations
//! - `ParsedType` for type annotations as written
//! - `Module` / `Decl` for generic declarations with their `where` clauses
//! - `ExprArena` for flat function bodies
//!
//! All types are `Clone + Eq + Hash` so that later phases can key caches on
//! them directly.

/// Compile-time assertion that a type has a specific size.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

pub mod ast;
mod interner;
mod name;
mod parsed_type;
mod span;

pub use ast::{
    AssocTypeDecl, BinaryOp, Decl, DeclKind, EnumDecl, Expr, ExprArena, ExprId, ExprKind,
    ExtensionDecl, FieldDecl, FunctionDecl, GenericParamDecl, GenericParamKind, InterfaceDecl,
    Module, ParamDecl, Stmt, StmtId, StmtKind, StructDecl, TypeMember, UnaryOp, WhereClause,
    WhereKind,
};
pub use interner::{InternError, SharedInterner, StringInterner};
pub use name::Name;
pub use parsed_type::{ParsedArg, ParsedType};
pub use span::Span;

#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::{ExprId, Name, Span, StmtId};
    static_assert_size!(Name, 4);
    static_assert_size!(Span, 8);
    static_assert_size!(ExprId, 4);
    static_assert_size!(StmtId, 4);
}
