//! Resolution of parsed types into interned types.
//!
//! Names are looked up innermost first: generic parameters of the scope
//! declaration and its owners, then built-in types, then global
//! declarations. Type aliases are substituted transparently, so an alias
//! never appears in a resolved type.

use umbra_ir::{Name, ParsedArg, ParsedType, Span, StringInterner};
use umbra_types::{
    ArrayLen, DeclId, GenericArg, ParamRef, ScalarKind, TypeData, TypeFlags, TypeId,
    TypeInterner, ValueArg,
};

use super::{DeclShape, DeclTable, GenericDeclKind, GenericParam, ParamKind};
use crate::binder::complete_explicit;
use crate::error::{BodyError, GenericError, GenericErrorKind, PackPosition};
use crate::stack::ensure_sufficient_stack;
use crate::subst::Subst;

/// Where a type is being resolved.
#[derive(Copy, Clone, Default)]
struct Ctx {
    in_expand: bool,
    in_each: bool,
    /// Constraint subjects may name a pack directly.
    subject: bool,
}

#[derive(Copy, Clone)]
pub(crate) struct Resolver<'a> {
    table: &'a DeclTable,
    types: &'a TypeInterner,
    strings: &'a StringInterner,
    scope: Option<DeclId>,
    span: Span,
}

impl<'a> Resolver<'a> {
    pub fn new(
        table: &'a DeclTable,
        types: &'a TypeInterner,
        strings: &'a StringInterner,
        scope: Option<DeclId>,
        span: Span,
    ) -> Self {
        Resolver {
            table,
            types,
            strings,
            scope,
            span,
        }
    }

    #[must_use]
    pub fn at(self, span: Span) -> Self {
        Resolver { span, ..self }
    }

    fn err(&self, kind: impl Into<GenericErrorKind>) -> GenericError {
        GenericError::new(kind, self.span)
    }

    pub fn resolve(&self, ty: &ParsedType) -> Result<TypeId, GenericError> {
        self.resolve_in(ty, Ctx::default())
    }

    /// Resolve a `where` subject, where a bare pack name means its element.
    pub fn resolve_subject(&self, ty: &ParsedType) -> Result<TypeId, GenericError> {
        self.resolve_in(
            ty,
            Ctx {
                subject: true,
                ..Ctx::default()
            },
        )
    }

    /// Resolve a type written inside an `expand` expression, where `each`
    /// is allowed.
    pub fn resolve_element(&self, ty: &ParsedType) -> Result<TypeId, GenericError> {
        self.resolve_in(
            ty,
            Ctx {
                in_expand: true,
                ..Ctx::default()
            },
        )
    }

    /// Innermost visible generic parameter called `name`.
    pub fn lookup_param(&self, name: Name) -> Option<(ParamRef, &'a GenericParam)> {
        let scope = self.scope?;
        let chain = self.table.scope_chain(scope);
        chain.iter().rev().find_map(|&d| {
            self.table
                .get(d)
                .param_refs()
                .find(|(_, p)| p.name() == name)
        })
    }

    fn in_scope(&self, decl: DeclId) -> bool {
        self.scope
            .is_some_and(|s| self.table.scope_chain(s).contains(&decl))
    }

    fn resolve_in(&self, ty: &ParsedType, ctx: Ctx) -> Result<TypeId, GenericError> {
        ensure_sufficient_stack(|| match ty {
            ParsedType::Named { name, args } => self.named(*name, args, ctx),
            ParsedType::Array { elem, len } => {
                let elem = self.resolve_in(elem, ctx)?;
                let len = match len {
                    Some(arg) => ArrayLen::Sized(self.resolve_value(arg)?),
                    None => ArrayLen::Unsized,
                };
                Ok(self.types.array(elem, len))
            }
            ParsedType::Tuple(elems) => {
                let elems = elems
                    .iter()
                    .map(|e| self.resolve_in(e, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.types.tuple(elems))
            }
            ParsedType::Member { base, name } => {
                let base = self.resolve_in(base, ctx)?;
                Ok(self.types.assoc(base, *name))
            }
            ParsedType::This => self
                .scope
                .and_then(|s| self.table.self_type(self.types, s))
                .ok_or_else(|| {
                    self.err(BodyError::UnknownType {
                        name: self.strings.intern("This"),
                    })
                }),
            ParsedType::Each(inner) => {
                if !(ctx.in_expand || ctx.subject) {
                    return Err(self.err(PackPosition::EachOutsideExpand));
                }
                let inner = self.resolve_in(
                    inner,
                    Ctx {
                        in_each: true,
                        ..ctx
                    },
                )?;
                if self.types.flags(inner).contains(TypeFlags::HAS_PACK) {
                    Ok(inner)
                } else {
                    Err(self.err(PackPosition::NotAPack))
                }
            }
            ParsedType::Expand(inner) => {
                let inner = self.resolve_in(
                    inner,
                    Ctx {
                        in_expand: true,
                        in_each: false,
                        subject: false,
                    },
                )?;
                if self.types.flags(inner).contains(TypeFlags::HAS_PACK) {
                    Ok(self.types.expand(inner))
                } else {
                    Err(self.err(PackPosition::ExpandWithoutEach))
                }
            }
        })
    }

    fn named(&self, name: Name, args: &[ParsedArg], ctx: Ctx) -> Result<TypeId, GenericError> {
        let types = self.types;
        if args.is_empty() {
            if let Some((p, param)) = self.lookup_param(name) {
                return match param.kind() {
                    ParamKind::Type => Ok(types.param(p)),
                    ParamKind::Pack if ctx.in_each || ctx.subject => Ok(types.pack(p)),
                    ParamKind::Pack => Err(self.err(PackPosition::BarePack)),
                    ParamKind::Value => Err(self.err(BodyError::UnknownType { name })),
                };
            }
            if let Some(kind) = ScalarKind::from_name(self.strings.lookup(name)) {
                return Ok(types.scalar(kind));
            }
            if name == self.table.names.void {
                return Ok(TypeId::VOID);
            }
        }

        let names = &self.table.names;
        if name == names.vector {
            return match args {
                [elem, count] => {
                    let elem = self.resolve_arg_type(elem, ctx)?;
                    Ok(types.vector(elem, self.resolve_value(count)?))
                }
                _ => Err(self.err(GenericErrorKind::ArgumentCountMismatch {
                    expected: 2,
                    found: args.len(),
                })),
            };
        }
        if name == names.tuple {
            let elems = args
                .iter()
                .map(|a| self.resolve_arg_type(a, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(types.tuple(elems));
        }

        let Some(decl) = self.table.lookup(name) else {
            return Err(self.err(BodyError::UnknownType { name }));
        };
        let kind = self.table.get(decl).kind;
        if args.is_empty() && kind.is_type() && self.in_scope(decl) {
            return Ok(self.table.identity_type(types, decl));
        }
        let args = args
            .iter()
            .map(|a| self.resolve_arg_in(a, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        self.apply(decl, &args)
    }

    /// `decl<args>` as a type: explicit arguments, then defaults.
    pub fn apply(&self, decl: DeclId, args: &[GenericArg]) -> Result<TypeId, GenericError> {
        let d = self.table.get(decl);
        let not_a_type = || self.err(BodyError::UnknownType { name: d.name });
        match d.kind {
            GenericDeclKind::Struct | GenericDeclKind::Interface | GenericDeclKind::Enum => {
                let binding = complete_explicit(self.table, self.types, decl, args, self.span)?;
                Ok(self.types.named(decl, binding.args_for(decl)))
            }
            GenericDeclKind::Alias => {
                let DeclShape::Alias(target) = d.shape else {
                    return Err(not_a_type());
                };
                let binding = complete_explicit(self.table, self.types, decl, args, self.span)?;
                Subst::new(self.types, &binding)
                    .ty(target)
                    .map_err(|kind| self.err(kind))
            }
            _ => Err(not_a_type()),
        }
    }

    fn resolve_arg_type(&self, arg: &ParsedArg, ctx: Ctx) -> Result<TypeId, GenericError> {
        match self.resolve_arg_in(arg, ctx)? {
            GenericArg::Type(ty) => Ok(ty),
            GenericArg::Value(_) => Err(self.err(GenericErrorKind::ArgumentKindMismatch {
                param: Name::EMPTY,
                expected: ParamKind::Type,
            })),
        }
    }

    pub fn resolve_arg(&self, arg: &ParsedArg) -> Result<GenericArg, GenericError> {
        self.resolve_arg_in(arg, Ctx::default())
    }

    fn resolve_arg_in(&self, arg: &ParsedArg, ctx: Ctx) -> Result<GenericArg, GenericError> {
        match arg {
            ParsedArg::Type(ParsedType::Named { name, args }) if args.is_empty() => {
                match self.lookup_param(*name) {
                    Some((p, GenericParam::Value { .. })) => {
                        Ok(GenericArg::Value(ValueArg::Param(p)))
                    }
                    _ => Ok(GenericArg::Type(self.named(*name, args, ctx)?)),
                }
            }
            ParsedArg::Type(ty) => Ok(GenericArg::Type(self.resolve_in(ty, ctx)?)),
            ParsedArg::Int(_) | ParsedArg::Bool(_) | ParsedArg::EnumCase { .. } => {
                Ok(GenericArg::Value(self.resolve_value(arg)?))
            }
        }
    }

    pub fn resolve_value(&self, arg: &ParsedArg) -> Result<ValueArg, GenericError> {
        match arg {
            ParsedArg::Int(n) => Ok(ValueArg::Int(*n)),
            ParsedArg::Bool(b) => Ok(ValueArg::Bool(*b)),
            ParsedArg::EnumCase { ty, case } => self.enum_case(*ty, *case),
            ParsedArg::Type(ParsedType::Named { name, args }) if args.is_empty() => {
                match self.lookup_param(*name) {
                    Some((p, GenericParam::Value { .. })) => Ok(ValueArg::Param(p)),
                    Some((_, param)) => Err(self.err(GenericErrorKind::ArgumentKindMismatch {
                        param: param.name(),
                        expected: ParamKind::Value,
                    })),
                    None => Err(self.err(BodyError::UnknownIdent { name: *name })),
                }
            }
            ParsedArg::Type(_) => Err(self.err(GenericErrorKind::ArgumentKindMismatch {
                param: Name::EMPTY,
                expected: ParamKind::Value,
            })),
        }
    }

    pub fn enum_case(&self, ty: Name, case: Name) -> Result<ValueArg, GenericError> {
        let decl = self
            .table
            .lookup(ty)
            .filter(|&d| self.table.get(d).kind == GenericDeclKind::Enum)
            .ok_or_else(|| self.err(BodyError::UnknownType { name: ty }))?;
        let index = self
            .table
            .enum_case(decl, case)
            .ok_or_else(|| self.err(BodyError::UnknownIdent { name: case }))?;
        Ok(ValueArg::Enum { decl, case: index })
    }

    /// Whether `ty` names an interface.
    pub fn interface_decl(&self, ty: TypeId) -> Option<DeclId> {
        match self.types.lookup(ty) {
            TypeData::Named { decl, .. }
                if self.table.get(decl).kind == GenericDeclKind::Interface =>
            {
                Some(decl)
            }
            _ => None,
        }
    }
}

/// Whether a value argument fits a value parameter's declared type.
pub(crate) fn value_fits(types: &TypeInterner, ty: TypeId, value: ValueArg) -> bool {
    match (types.lookup(ty), value) {
        (_, ValueArg::Param(_)) | (TypeData::Error, _) => true,
        (TypeData::Scalar(ScalarKind::Bool), ValueArg::Bool(_)) => true,
        (TypeData::Scalar(kind), ValueArg::Int(_)) => kind.is_integer(),
        (TypeData::Named { decl, .. }, ValueArg::Enum { decl: case_decl, .. }) => {
            decl == case_decl
        }
        _ => false,
    }
}
