//! Declaration syntax consumed by the generics front end.
//!
//! This is the parser's output shape: every generic declaration carries its
//! parameter list and `where` clauses as written, and bodies live in a
//! shared [`ExprArena`].
//!
//! ```text
//! struct TestStruct<T, let size : uint> { T data[size]; }
//! int sumInts<each T>(expand each T terms) where T == int { ... }
//! extension<T : IArithmetic> Wrapper<T> : IScalable where T(int) { ... }
//! ```

mod body;

pub use body::{
    BinaryOp, Expr, ExprArena, ExprId, ExprKind, Stmt, StmtId, StmtKind, UnaryOp,
};

use crate::{Name, ParsedArg, ParsedType, Span};

/// A parsed compilation unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Module {
    pub decls: Vec<Decl>,
}

/// Any declaration that may carry a generic parameter list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decl {
    pub name: Name,
    /// `<...>` parameters in source order.
    pub generics: Vec<GenericParamDecl>,
    /// Trailing `where` clauses in source order.
    pub where_clauses: Vec<WhereClause>,
    pub kind: DeclKind,
    pub span: Span,
}

impl Decl {
    pub fn new(name: Name, kind: DeclKind, span: Span) -> Self {
        Decl {
            name,
            generics: Vec::new(),
            where_clauses: Vec::new(),
            kind,
            span,
        }
    }

    #[must_use]
    pub fn with_generics(mut self, generics: Vec<GenericParamDecl>) -> Self {
        self.generics = generics;
        self
    }

    #[must_use]
    pub fn with_where(mut self, clause: WhereClause) -> Self {
        self.where_clauses.push(clause);
        self
    }

    pub fn is_generic(&self) -> bool {
        !self.generics.is_empty()
    }
}

/// One entry of a `generic-params-decl`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericParamDecl {
    pub name: Name,
    pub kind: GenericParamKind,
    /// Inline `T : IFoo, IBar` bounds.
    pub bounds: Vec<ParsedType>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenericParamKind {
    /// `T` or `T = Default`.
    Type { default: Option<ParsedType> },
    /// `let N : uint` or `let N : uint = 4`.
    Value {
        ty: ParsedType,
        default: Option<ParsedArg>,
    },
    /// `each T`.
    Pack,
}

impl GenericParamDecl {
    pub fn ty(name: Name, span: Span) -> Self {
        GenericParamDecl {
            name,
            kind: GenericParamKind::Type { default: None },
            bounds: Vec::new(),
            span,
        }
    }

    pub fn value(name: Name, ty: ParsedType, span: Span) -> Self {
        GenericParamDecl {
            name,
            kind: GenericParamKind::Value { ty, default: None },
            bounds: Vec::new(),
            span,
        }
    }

    pub fn pack(name: Name, span: Span) -> Self {
        GenericParamDecl {
            name,
            kind: GenericParamKind::Pack,
            bounds: Vec::new(),
            span,
        }
    }

    #[must_use]
    pub fn with_bound(mut self, bound: ParsedType) -> Self {
        self.bounds.push(bound);
        self
    }

    #[must_use]
    pub fn with_default_type(mut self, default: ParsedType) -> Self {
        if let GenericParamKind::Type { default: slot } = &mut self.kind {
            *slot = Some(default);
        }
        self
    }

    #[must_use]
    pub fn with_default_value(mut self, default: ParsedArg) -> Self {
        if let GenericParamKind::Value { default: slot, .. } = &mut self.kind {
            *slot = Some(default);
        }
        self
    }
}

/// `where [optional] Subject (: I, J | == T | (U) [implicit])`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WhereClause {
    pub optional: bool,
    pub subject: ParsedType,
    pub kind: WhereKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WhereKind {
    Conformance(Vec<ParsedType>),
    Equality(ParsedType),
    /// `Subject(From)`: `From` must convert to `Subject`.
    Coercion { from: ParsedType, implicit: bool },
}

impl WhereClause {
    pub fn conforms(subject: ParsedType, interfaces: Vec<ParsedType>, span: Span) -> Self {
        WhereClause {
            optional: false,
            subject,
            kind: WhereKind::Conformance(interfaces),
            span,
        }
    }

    pub fn equals(subject: ParsedType, target: ParsedType, span: Span) -> Self {
        WhereClause {
            optional: false,
            subject,
            kind: WhereKind::Equality(target),
            span,
        }
    }

    pub fn coerces(subject: ParsedType, from: ParsedType, implicit: bool, span: Span) -> Self {
        WhereClause {
            optional: false,
            subject,
            kind: WhereKind::Coercion { from, implicit },
            span,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclKind {
    Struct(StructDecl),
    Interface(InterfaceDecl),
    Alias(ParsedType),
    Function(FunctionDecl),
    Subscript(FunctionDecl),
    Constructor(FunctionDecl),
    Extension(ExtensionDecl),
    Enum(EnumDecl),
}

impl DeclKind {
    pub fn describe(&self) -> &'static str {
        match self {
            DeclKind::Struct(_) => "struct",
            DeclKind::Interface(_) => "interface",
            DeclKind::Alias(_) => "typealias",
            DeclKind::Function(_) => "function",
            DeclKind::Subscript(_) => "subscript",
            DeclKind::Constructor(_) => "constructor",
            DeclKind::Extension(_) => "extension",
            DeclKind::Enum(_) => "enum",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructDecl {
    /// Declared conformances: `struct S : IFoo`.
    pub bases: Vec<ParsedType>,
    pub fields: Vec<FieldDecl>,
    /// `typealias Assoc = int;` members witnessing associated types.
    pub type_members: Vec<TypeMember>,
    /// Methods, constructors and subscripts.
    pub members: Vec<Decl>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: Name,
    pub ty: ParsedType,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeMember {
    pub name: Name,
    pub ty: ParsedType,
    pub span: Span,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterfaceDecl {
    pub bases: Vec<ParsedType>,
    pub assoc_types: Vec<AssocTypeDecl>,
    /// Requirement signatures; bodies are ignored.
    pub requirements: Vec<Decl>,
}

/// `associatedtype Assoc : IFoo;`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssocTypeDecl {
    pub name: Name,
    pub bounds: Vec<ParsedType>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDecl {
    pub params: Vec<ParamDecl>,
    pub ret: ParsedType,
    /// Block statement; `None` for requirements and intrinsics.
    pub body: Option<StmtId>,
    /// Members only: no implicit `this`.
    pub is_static: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: Name,
    pub ty: ParsedType,
    pub span: Span,
}

impl ParamDecl {
    pub fn new(name: Name, ty: ParsedType, span: Span) -> Self {
        ParamDecl { name, ty, span }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionDecl {
    pub target: ParsedType,
    pub bases: Vec<ParsedType>,
    pub type_members: Vec<TypeMember>,
    pub members: Vec<Decl>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnumDecl {
    pub cases: Vec<Name>,
}
