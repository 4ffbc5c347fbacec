//! Errors produced by the generics front end.
//!
//! Every failure is a [`GenericError`]: a kind plus the span it is reported
//! at. Kinds carry ids, not strings; [`GenericError::to_diagnostic`] renders
//! them against the session's interners at reporting time.

use thiserror::Error;
use umbra_diagnostic::{Diagnostic, ErrorCode};
use umbra_ir::{Name, Span, StringInterner};
use umbra_types::{DeclId, ParamRef, TypeFormatter, TypeId, TypeNames, ValueArg};

use crate::decl::ParamKind;

/// A generics failure located at `span`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericError {
    pub kind: GenericErrorKind,
    pub span: Span,
}

impl GenericError {
    pub fn new(kind: impl Into<GenericErrorKind>, span: Span) -> Self {
        GenericError {
            kind: kind.into(),
            span,
        }
    }

    /// Re-locate an error raised without a useful span.
    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        if self.span == Span::DUMMY {
            self.span = span;
        }
        self
    }

    /// Whether this error only restates an earlier one.
    pub fn is_follow_on(&self) -> bool {
        matches!(self.kind, GenericErrorKind::DeclarationPoisoned { .. })
    }
}

impl std::fmt::Display for GenericError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {:?}", self.kind, self.span)
    }
}

impl std::error::Error for GenericError {}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum GenericErrorKind {
    #[error("malformed generic declaration: {0}")]
    MalformedGenericDecl(MalformedReason),

    #[error("constraint is not satisfied")]
    UnsatisfiedConstraint {
        /// Constraint subject after substitution.
        subject: TypeId,
        requirement: Requirement,
        /// Where the constraint was written.
        declared_at: Span,
    },

    #[error("cannot infer generic parameter")]
    UninferredParameter { param: Name },

    #[error("conflicting types inferred for a generic parameter")]
    AmbiguousTypeArgument { param: Name, candidates: Vec<TypeId> },

    #[error("conflicting values inferred for a generic parameter")]
    AmbiguousValueArgument {
        param: Name,
        candidates: Vec<ValueArg>,
    },

    #[error("packs expanded together have different lengths")]
    ArityMismatch { lengths: Vec<(ParamRef, usize)> },

    #[error("illegal pack position: {0}")]
    IllegalPackPosition(PackPosition),

    #[error("coercion constraints are only allowed on generic extensions")]
    InvalidCoercionContext,

    #[error("too many generic arguments: expected at most {expected}, found {found}")]
    TooManyArguments { expected: usize, found: usize },

    #[error("generic argument does not match the parameter kind")]
    ArgumentKindMismatch { param: Name, expected: ParamKind },

    #[error("expected {expected} arguments, found {found}")]
    ArgumentCountMismatch { expected: usize, found: usize },

    #[error("argument {index} has the wrong type")]
    ArgumentTypeMismatch {
        index: usize,
        expected: TypeId,
        found: TypeId,
    },

    #[error("instantiation depth limit of {limit} exceeded")]
    InstantiationDepthExceeded { limit: usize },

    #[error("unknown generic declaration")]
    UnknownDeclaration { name: Name },

    /// Use of a declaration whose own checking failed; already reported.
    #[error("declaration has errors")]
    DeclarationPoisoned { decl: DeclId },

    #[error(transparent)]
    Body(#[from] BodyError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum MalformedReason {
    #[error("value parameters must have a bool, integer or enum type")]
    ValueParamType,
    #[error("duplicate declaration")]
    DuplicateDecl,
    #[error("duplicate generic parameter")]
    DuplicateParam,
    #[error("constraint target is not an interface")]
    NotAnInterface,
    #[error("default does not match the parameter kind")]
    DefaultKind,
    #[error("extension target must be a type")]
    ExtensionTarget,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum PackPosition {
    #[error("a type pack must be the last generic parameter")]
    PackNotLast,
    #[error("pack-typed parameters must follow every other parameter")]
    PackParamNotLast,
    #[error("`each` must appear inside `expand`")]
    EachOutsideExpand,
    #[error("`expand` must contain an `each`")]
    ExpandWithoutEach,
    #[error("a pack can only be used through `each`")]
    BarePack,
    #[error("`each` must be applied to a type pack or pack-typed value")]
    NotAPack,
}

/// What an unsatisfied constraint asked for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Requirement {
    Conforms(TypeId),
    Equals(TypeId),
    ConvertibleFrom { from: TypeId, implicit: bool },
}

/// Failures found while checking a generic body before specialization.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum BodyError {
    #[error("type mismatch")]
    Mismatch { expected: TypeId, found: TypeId },
    #[error("unknown type")]
    UnknownType { name: Name },
    #[error("unknown identifier")]
    UnknownIdent { name: Name },
    #[error("no such member")]
    UnknownMember { ty: TypeId, name: Name },
    #[error("operator not supported for this type")]
    OperatorNotSupported { op: &'static str, ty: TypeId },
    #[error("no conversion between these types")]
    NotConvertible { from: TypeId, to: TypeId },
    #[error("expression is not assignable")]
    NotAssignable,
    #[error("not a function")]
    NotCallable { name: Name },
}

impl From<MalformedReason> for GenericErrorKind {
    fn from(reason: MalformedReason) -> Self {
        GenericErrorKind::MalformedGenericDecl(reason)
    }
}

impl From<PackPosition> for GenericErrorKind {
    fn from(position: PackPosition) -> Self {
        GenericErrorKind::IllegalPackPosition(position)
    }
}

impl GenericErrorKind {
    pub fn code(&self) -> ErrorCode {
        match self {
            GenericErrorKind::MalformedGenericDecl(_) => ErrorCode::E2101,
            GenericErrorKind::UnsatisfiedConstraint { .. } => ErrorCode::E2102,
            GenericErrorKind::UninferredParameter { .. } => ErrorCode::E2103,
            GenericErrorKind::AmbiguousTypeArgument { .. } => ErrorCode::E2104,
            GenericErrorKind::AmbiguousValueArgument { .. } => ErrorCode::E2105,
            GenericErrorKind::ArityMismatch { .. } => ErrorCode::E2106,
            GenericErrorKind::IllegalPackPosition(_) => ErrorCode::E2107,
            GenericErrorKind::InvalidCoercionContext => ErrorCode::E2108,
            GenericErrorKind::TooManyArguments { .. } => ErrorCode::E2109,
            GenericErrorKind::ArgumentKindMismatch { .. } => ErrorCode::E2110,
            GenericErrorKind::ArgumentCountMismatch { .. } => ErrorCode::E2111,
            GenericErrorKind::ArgumentTypeMismatch { .. } => ErrorCode::E2112,
            GenericErrorKind::InstantiationDepthExceeded { .. } => ErrorCode::E2113,
            GenericErrorKind::UnknownDeclaration { .. } => ErrorCode::E2114,
            GenericErrorKind::Body(body) => match body {
                BodyError::Mismatch { .. }
                | BodyError::NotConvertible { .. }
                | BodyError::NotAssignable => ErrorCode::E2001,
                BodyError::UnknownType { .. } => ErrorCode::E2002,
                BodyError::UnknownIdent { .. } | BodyError::NotCallable { .. } => {
                    ErrorCode::E2003
                }
                BodyError::UnknownMember { .. } => ErrorCode::E2004,
                BodyError::OperatorNotSupported { .. } => ErrorCode::E2005,
            },
            GenericErrorKind::DeclarationPoisoned { .. } | GenericErrorKind::Internal(_) => {
                ErrorCode::E9001
            }
        }
    }
}

/// Renders error payloads with source names.
struct Render<'a> {
    strings: &'a StringInterner,
    fmt: &'a TypeFormatter<'a>,
    names: &'a dyn TypeNames,
}

impl Render<'_> {
    fn ty(&self, ty: TypeId) -> String {
        format!("`{}`", self.fmt.format(ty))
    }

    fn name(&self, name: Name) -> &str {
        self.strings.lookup(name)
    }

    fn list<T: Copy>(&self, items: &[T], each: impl Fn(T) -> String) -> String {
        items.iter().map(|&t| each(t)).collect::<Vec<_>>().join(", ")
    }
}

impl GenericError {
    /// Render with source names.
    ///
    /// `names` resolves declaration and parameter identities; it is usually
    /// the session's declaration table, which `fmt` also renders through.
    pub fn to_diagnostic(
        &self,
        strings: &StringInterner,
        fmt: &TypeFormatter<'_>,
        names: &dyn TypeNames,
    ) -> Diagnostic {
        let r = Render {
            strings,
            fmt,
            names,
        };
        let span = self.span;
        let diag = Diagnostic::error(self.kind.code());
        match &self.kind {
            GenericErrorKind::MalformedGenericDecl(reason) => diag
                .with_message(format!("malformed generic declaration: {reason}"))
                .with_label(span, reason.to_string()),
            GenericErrorKind::UnsatisfiedConstraint {
                subject,
                requirement,
                declared_at,
            } => {
                let wanted = match *requirement {
                    Requirement::Conforms(iface) => {
                        format!("{} does not conform to {}", r.ty(*subject), r.ty(iface))
                    }
                    Requirement::Equals(target) => {
                        format!("{} is not {}", r.ty(*subject), r.ty(target))
                    }
                    Requirement::ConvertibleFrom { from, implicit } => format!(
                        "{} cannot be {}converted to {}",
                        r.ty(from),
                        if implicit { "implicitly " } else { "" },
                        r.ty(*subject)
                    ),
                };
                diag.with_message(format!("unsatisfied constraint: {wanted}"))
                    .with_label(span, "required by this use")
                    .with_secondary_label(*declared_at, "constraint declared here")
            }
            GenericErrorKind::UninferredParameter { param } => diag
                .with_message(format!(
                    "cannot infer generic parameter `{}`",
                    r.name(*param)
                ))
                .with_label(span, "specify it explicitly")
                .with_note("add an explicit argument or a default"),
            GenericErrorKind::AmbiguousTypeArgument { param, candidates } => diag
                .with_message(format!(
                    "conflicting types inferred for `{}`: {}",
                    r.name(*param),
                    r.list(candidates, |t| r.ty(t))
                ))
                .with_label(span, "ambiguous here"),
            GenericErrorKind::AmbiguousValueArgument { param, candidates } => diag
                .with_message(format!(
                    "conflicting values inferred for `{}`: {}",
                    r.name(*param),
                    r.list(candidates, |v| r.fmt.format_value(v))
                ))
                .with_label(span, "ambiguous here"),
            GenericErrorKind::ArityMismatch { lengths } => {
                let detail = lengths
                    .iter()
                    .map(|&(p, n)| format!("`{}` has {n}", r.name(r.names.param_name(p))))
                    .collect::<Vec<_>>()
                    .join(", ");
                diag.with_message(format!(
                    "packs expanded together have different lengths: {detail}"
                ))
                .with_label(span, "expanded here")
            }
            GenericErrorKind::IllegalPackPosition(position) => diag
                .with_message(format!("illegal pack position: {position}"))
                .with_label(span, position.to_string()),
            GenericErrorKind::InvalidCoercionContext => diag
                .with_message(self.kind.to_string())
                .with_label(span, "coercion constraint here"),
            GenericErrorKind::TooManyArguments { .. }
            | GenericErrorKind::ArgumentCountMismatch { .. }
            | GenericErrorKind::InstantiationDepthExceeded { .. } => {
                diag.with_message(self.kind.to_string()).with_label(span, "")
            }
            GenericErrorKind::ArgumentKindMismatch { param, expected } => diag
                .with_message(format!(
                    "generic parameter `{}` expects a {expected} argument",
                    r.name(*param)
                ))
                .with_label(span, "wrong kind of argument"),
            GenericErrorKind::ArgumentTypeMismatch {
                index,
                expected,
                found,
            } => diag
                .with_message(format!(
                    "argument {} has type {}, expected {}",
                    index + 1,
                    r.ty(*found),
                    r.ty(*expected)
                ))
                .with_label(span, "no implicit conversion"),
            GenericErrorKind::UnknownDeclaration { name } => diag
                .with_message(format!("unknown generic declaration `{}`", r.name(*name)))
                .with_label(span, "not found"),
            GenericErrorKind::DeclarationPoisoned { decl } => diag
                .with_message(format!(
                    "`{}` has errors",
                    r.name(r.names.decl_name(*decl))
                ))
                .with_label(span, ""),
            GenericErrorKind::Body(body) => body_diagnostic(&r, diag, body, span),
            GenericErrorKind::Internal(msg) => diag
                .with_message(format!("internal error: {msg}"))
                .with_label(span, ""),
        }
    }
}

fn body_diagnostic(r: &Render<'_>, diag: Diagnostic, body: &BodyError, span: Span) -> Diagnostic {
    match *body {
        BodyError::Mismatch { expected, found } => diag
            .with_message(format!(
                "type mismatch: expected {}, found {}",
                r.ty(expected),
                r.ty(found)
            ))
            .with_label(span, "here"),
        BodyError::UnknownType { name } => diag
            .with_message(format!("unknown type `{}`", r.name(name)))
            .with_label(span, "not found in scope"),
        BodyError::UnknownIdent { name } => diag
            .with_message(format!("unknown identifier `{}`", r.name(name)))
            .with_label(span, "not found in scope"),
        BodyError::UnknownMember { ty, name } => diag
            .with_message(format!("{} has no member `{}`", r.ty(ty), r.name(name)))
            .with_label(span, "unknown member"),
        BodyError::OperatorNotSupported { op, ty } => diag
            .with_message(format!("operator `{op}` is not supported for {}", r.ty(ty)))
            .with_label(span, "")
            .with_note("constrain the parameter with `IArithmetic` or `IComparable`"),
        BodyError::NotConvertible { from, to } => diag
            .with_message(format!(
                "cannot convert {} to {}",
                r.ty(from),
                r.ty(to)
            ))
            .with_label(span, ""),
        BodyError::NotAssignable => diag
            .with_message("expression is not assignable")
            .with_label(span, ""),
        BodyError::NotCallable { name } => diag
            .with_message(format!("`{}` is not a function", r.name(name)))
            .with_label(span, ""),
    }
}
