//! Module registration: syntax declarations into the declaration table.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use umbra_ir::{
    Decl, DeclKind, ExprArena, FunctionDecl, GenericParamKind, Module, Name, ParsedType, Span,
    StringInterner, WhereKind,
};
use umbra_types::{
    AssocTypeDef, ConformanceEntry, ConformanceHead, DeclId, InterfaceEntry, ParamRef, TypeData,
    TypeId, TypeInterner,
};

use super::resolve::value_fits;
use super::{
    CallableShape, Constraint, ConstraintKind, DeclShape, DeclTable, ExtensionShape, FieldSig,
    GenericDecl, GenericDeclKind, GenericParam, InterfaceShape, ParamKind, ParamSig, Resolver,
    StructShape,
};
use crate::error::{GenericError, GenericErrorKind, MalformedReason, PackPosition};
use crate::pack::{groups_in, PackGroup};

/// Declarations allocated by the declare pass, in allocation order.
struct Pending<'m> {
    syntax: Vec<(DeclId, &'m Decl)>,
    members: FxHashMap<DeclId, Vec<DeclId>>,
}

/// Everything the define pass computes for one declaration before it is
/// written back into the table.
#[derive(Default)]
struct Defined {
    shape: Option<DeclShape>,
    constraints: Vec<Constraint>,
    pack_groups: Vec<PackGroup>,
    interface: Option<InterfaceEntry>,
    conformances: Vec<(ConformanceHead, ConformanceEntry)>,
    conversions: Vec<(TypeId, TypeId)>,
    errors: Vec<GenericError>,
}

impl Defined {
    fn fail(&mut self, kind: impl Into<GenericErrorKind>, span: Span) {
        self.errors.push(GenericError::new(kind, span));
    }

    /// Resolution result, or `ERROR` with the failure recorded.
    fn recover(&mut self, result: Result<TypeId, GenericError>) -> TypeId {
        result.unwrap_or_else(|e| {
            self.errors.push(e);
            TypeId::ERROR
        })
    }
}

fn kind_of(kind: &DeclKind) -> GenericDeclKind {
    match kind {
        DeclKind::Struct(_) => GenericDeclKind::Struct,
        DeclKind::Interface(_) => GenericDeclKind::Interface,
        DeclKind::Alias(_) => GenericDeclKind::Alias,
        DeclKind::Function(_) => GenericDeclKind::Function,
        DeclKind::Subscript(_) => GenericDeclKind::Subscript,
        DeclKind::Constructor(_) => GenericDeclKind::Constructor,
        DeclKind::Extension(_) => GenericDeclKind::Extension,
        DeclKind::Enum(_) => GenericDeclKind::Enum,
    }
}

fn nested(decl: &Decl) -> &[Decl] {
    match &decl.kind {
        DeclKind::Struct(s) => &s.members,
        DeclKind::Interface(i) => &i.requirements,
        DeclKind::Extension(e) => &e.members,
        _ => &[],
    }
}

impl DeclTable {
    /// Register every declaration of `module`; returns the top-level ids in
    /// source order. Declaration errors are recorded, never returned.
    #[tracing::instrument(level = "debug", skip_all, fields(decls = module.decls.len()))]
    pub fn register_module(
        &mut self,
        module: &Module,
        arena: ExprArena,
        types: &TypeInterner,
        strings: &StringInterner,
    ) -> Vec<DeclId> {
        let module_index = self.push_arena(arena);
        let mut pending = Pending {
            syntax: Vec::new(),
            members: FxHashMap::default(),
        };
        let top: Vec<DeclId> = module
            .decls
            .iter()
            .map(|d| self.declare(d, None, module_index, &mut pending))
            .collect();

        for &(id, syntax) in &pending.syntax {
            self.define_params(id, syntax, types, strings);
        }
        for &(id, syntax) in &pending.syntax {
            if let DeclKind::Alias(target) = &syntax.kind {
                let result = Resolver::new(self, types, strings, Some(id), syntax.span).resolve(target);
                let target = result.unwrap_or_else(|e| {
                    self.record_error(id, e);
                    TypeId::ERROR
                });
                self.decls[id.index()].shape = DeclShape::Alias(target);
            }
        }
        for &(id, syntax) in &pending.syntax {
            if matches!(syntax.kind, DeclKind::Alias(_) | DeclKind::Enum(_)) {
                continue;
            }
            let members = pending.members.get(&id).map_or(&[][..], Vec::as_slice);
            let defined = self.define(id, syntax, members, types, strings);
            self.apply(id, defined);
        }

        tracing::debug!(registered = pending.syntax.len(), "module registered");
        top
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "module count is far below u32::MAX"
    )]
    fn push_arena(&mut self, arena: ExprArena) -> u32 {
        self.arenas.push(Arc::new(arena));
        (self.arenas.len() - 1) as u32
    }

    // === Pass 1: declare ===

    fn declare<'m>(
        &mut self,
        syntax: &'m Decl,
        parent: Option<DeclId>,
        module: u32,
        pending: &mut Pending<'m>,
    ) -> DeclId {
        let kind = kind_of(&syntax.kind);
        let mut params: Vec<GenericParam> = Vec::with_capacity(syntax.generics.len());
        let mut duplicate = None;
        for p in &syntax.generics {
            if params.iter().any(|q| q.name() == p.name) {
                duplicate.get_or_insert(p.span);
            }
            params.push(match &p.kind {
                GenericParamKind::Type { .. } => GenericParam::Type {
                    name: p.name,
                    default: None,
                    span: p.span,
                },
                GenericParamKind::Value { .. } => GenericParam::Value {
                    name: p.name,
                    ty: TypeId::ERROR,
                    default: None,
                    span: p.span,
                },
                GenericParamKind::Pack => GenericParam::Pack {
                    name: p.name,
                    span: p.span,
                },
            });
        }
        let shape = match &syntax.kind {
            DeclKind::Enum(e) => DeclShape::Enum(e.cases.clone()),
            _ => DeclShape::Pending,
        };

        let id = self.alloc(GenericDecl {
            id: DeclId::new(0),
            name: syntax.name,
            kind,
            parent,
            params,
            constraints: Vec::new(),
            shape,
            pack_groups: Vec::new(),
            module,
            span: syntax.span,
        });
        if let Some(span) = duplicate {
            self.record_error(id, GenericError::new(MalformedReason::DuplicateParam, span));
        }
        if kind == GenericDeclKind::Extension {
            self.extensions.push(id);
        } else if parent.is_none() {
            if self.globals.contains_key(&syntax.name) {
                self.record_error(id, GenericError::new(MalformedReason::DuplicateDecl, syntax.span));
            } else {
                self.globals.insert(syntax.name, id);
            }
        }

        pending.syntax.push((id, syntax));
        let members: Vec<DeclId> = nested(syntax)
            .iter()
            .map(|m| self.declare(m, Some(id), module, pending))
            .collect();
        if !members.is_empty() {
            pending.members.insert(id, members);
        }
        id
    }

    // === Pass 2: parameters ===

    fn define_params(
        &mut self,
        id: DeclId,
        syntax: &Decl,
        types: &TypeInterner,
        strings: &StringInterner,
    ) {
        let mut updated = self.get(id).params.clone();
        let mut errors = Vec::new();
        {
            let r = Resolver::new(self, types, strings, Some(id), syntax.span);
            let mut seen_pack = false;
            for (slot, p) in updated.iter_mut().zip(&syntax.generics) {
                let r = r.at(p.span);
                match (&p.kind, slot) {
                    (GenericParamKind::Type { default: Some(t) }, GenericParam::Type { default, .. }) => {
                        match r.resolve(t) {
                            Ok(ty) => *default = Some(ty),
                            Err(e) => errors.push(e),
                        }
                    }
                    (
                        GenericParamKind::Value { ty: parsed, default: parsed_default },
                        GenericParam::Value { ty, default, .. },
                    ) => {
                        match r.resolve(parsed) {
                            Ok(resolved) if self.is_value_param_type(types, resolved) => {
                                *ty = resolved;
                            }
                            Ok(_) => errors.push(GenericError::new(MalformedReason::ValueParamType, p.span)),
                            Err(e) => errors.push(e),
                        }
                        if let Some(d) = parsed_default {
                            match r.resolve_value(d) {
                                Ok(v) if value_fits(types, *ty, v) => *default = Some(v),
                                Ok(_) => errors.push(GenericError::new(MalformedReason::DefaultKind, p.span)),
                                Err(e) => errors.push(e),
                            }
                        }
                    }
                    _ => {}
                }
                if seen_pack && !matches!(p.kind, GenericParamKind::Pack) {
                    errors.push(GenericError::new(PackPosition::PackNotLast, p.span));
                }
                seen_pack |= matches!(p.kind, GenericParamKind::Pack);
            }
        }
        self.decls[id.index()].params = updated;
        for e in errors {
            self.record_error(id, e);
        }
    }

    fn is_value_param_type(&self, types: &TypeInterner, ty: TypeId) -> bool {
        match types.lookup(ty) {
            TypeData::Scalar(kind) => kind.is_valid_value_param(),
            TypeData::Named { decl, .. } => self.get(decl).kind == GenericDeclKind::Enum,
            // Already reported.
            TypeData::Error => true,
            _ => false,
        }
    }

    // === Pass 4: define ===

    fn define(
        &self,
        id: DeclId,
        syntax: &Decl,
        members: &[DeclId],
        types: &TypeInterner,
        strings: &StringInterner,
    ) -> Defined {
        let r = Resolver::new(self, types, strings, Some(id), syntax.span);
        let mut out = Defined::default();
        let decl = self.get(id);

        match &syntax.kind {
            DeclKind::Struct(s) => {
                let bases = self.interface_list(r, &s.bases, syntax.span, &mut out);
                let fields = s
                    .fields
                    .iter()
                    .map(|f| FieldSig {
                        name: f.name,
                        ty: out.recover(r.at(f.span).resolve(&f.ty)),
                        span: f.span,
                    })
                    .collect();
                let type_members: Vec<_> = s
                    .type_members
                    .iter()
                    .map(|m| (m.name, out.recover(r.at(m.span).resolve(&m.ty))))
                    .collect();
                let subject = self.identity_type(types, id);
                for &base in &bases {
                    out.conformances.push((
                        ConformanceHead::Decl(id),
                        self.conformance(types, subject, base, id, &type_members, members),
                    ));
                }
                out.shape = Some(DeclShape::Struct(StructShape {
                    bases,
                    fields,
                    type_members,
                    members: members.to_vec(),
                }));
            }
            DeclKind::Interface(i) => {
                let bases = self.interface_list(r, &i.bases, syntax.span, &mut out);
                let assoc_types = i
                    .assoc_types
                    .iter()
                    .map(|a| AssocTypeDef {
                        name: a.name,
                        bounds: self.interface_list(r.at(a.span), &a.bounds, a.span, &mut out),
                        span: a.span,
                    })
                    .collect();
                let requirements = members.iter().map(|&m| (self.get(m).name, m)).collect();
                out.interface = Some(InterfaceEntry {
                    decl: id,
                    name: decl.name,
                    supers: bases.iter().filter_map(|&b| r.interface_decl(b)).collect(),
                    assoc_types,
                    requirements,
                    span: syntax.span,
                });
                out.shape = Some(DeclShape::Interface(InterfaceShape {
                    bases,
                    requirements: members.to_vec(),
                }));
            }
            DeclKind::Function(f) | DeclKind::Subscript(f) | DeclKind::Constructor(f) => {
                let shape = self.callable(r, decl, f, types, &mut out);
                if decl.kind == GenericDeclKind::Constructor {
                    if let Some(conv) = self.constructor_conversion(types, decl, &shape) {
                        out.conversions.push(conv);
                    }
                }
                out.shape = Some(DeclShape::Callable(shape));
            }
            DeclKind::Extension(e) => {
                let mut target = out.recover(r.resolve(&e.target));
                let head = ConformanceHead::of(types, target);
                if head.is_none() && !target.is_error() {
                    out.fail(MalformedReason::ExtensionTarget, syntax.span);
                    target = TypeId::ERROR;
                }
                let bases = self.interface_list(r, &e.bases, syntax.span, &mut out);
                let type_members: Vec<_> = e
                    .type_members
                    .iter()
                    .map(|m| (m.name, out.recover(r.at(m.span).resolve(&m.ty))))
                    .collect();
                if let Some(head) = head.filter(|_| !target.is_error()) {
                    for &base in &bases {
                        out.conformances.push((
                            head,
                            self.conformance(types, target, base, id, &type_members, members),
                        ));
                    }
                }
                out.shape = Some(DeclShape::Extension(ExtensionShape {
                    target,
                    bases,
                    type_members,
                    members: members.to_vec(),
                }));
            }
            DeclKind::Alias(_) | DeclKind::Enum(_) => {}
        }

        self.constraints(r, id, syntax, types, &mut out);

        // Packs of one parameter list are bound side by side and must agree
        // in length even when no single `expand` mentions them all.
        let packs: SmallVec<[ParamRef; 2]> = decl
            .param_refs()
            .filter(|(_, p)| p.kind() == ParamKind::Pack)
            .map(|(p, _)| p)
            .collect();
        if packs.len() > 1 {
            out.pack_groups.push(PackGroup {
                packs,
                span: syntax.span,
            });
        }
        out
    }

    fn conformance(
        &self,
        types: &TypeInterner,
        subject: TypeId,
        interface: TypeId,
        source: DeclId,
        type_members: &[(Name, TypeId)],
        members: &[DeclId],
    ) -> ConformanceEntry {
        let interface_decl = match types.lookup(interface) {
            TypeData::Named { decl, .. } => decl,
            _ => source,
        };
        ConformanceEntry {
            subject,
            interface,
            interface_decl,
            params_of: self.get(source).is_generic().then_some(source),
            source,
            assoc: type_members.iter().copied().collect(),
            members: members.to_vec(),
            span: self.get(source).span,
        }
    }

    /// Resolve a list that must name interfaces; non-interfaces are
    /// reported and dropped.
    fn interface_list(
        &self,
        r: Resolver<'_>,
        list: &[ParsedType],
        span: Span,
        out: &mut Defined,
    ) -> Vec<TypeId> {
        let mut resolved = Vec::with_capacity(list.len());
        for parsed in list {
            match r.resolve(parsed) {
                Ok(ty) if r.interface_decl(ty).is_some() => resolved.push(ty),
                Ok(ty) if ty.is_error() => {}
                Ok(_) => out.fail(MalformedReason::NotAnInterface, span),
                Err(e) => out.errors.push(e),
            }
        }
        resolved
    }

    fn callable(
        &self,
        r: Resolver<'_>,
        decl: &GenericDecl,
        f: &FunctionDecl,
        types: &TypeInterner,
        out: &mut Defined,
    ) -> CallableShape {
        let mut params = Vec::with_capacity(f.params.len());
        let mut seen_expand = false;
        for p in &f.params {
            let ty = out.recover(r.at(p.span).resolve(&p.ty));
            let is_expand = matches!(types.lookup(ty), TypeData::Expand(_));
            if seen_expand && !is_expand {
                out.fail(PackPosition::PackParamNotLast, p.span);
            }
            seen_expand |= is_expand;
            out.pack_groups.extend(groups_in(types, ty, p.span));
            params.push(ParamSig {
                name: p.name,
                ty,
                span: p.span,
            });
        }
        let ret = if decl.kind == GenericDeclKind::Constructor {
            self.self_type(types, decl.id).unwrap_or(TypeId::ERROR)
        } else {
            out.recover(r.resolve(&f.ret))
        };
        out.pack_groups.extend(groups_in(types, ret, decl.span));
        CallableShape {
            params,
            ret,
            body: f.body,
            is_static: f.is_static || decl.parent.is_none(),
        }
    }

    /// A one-argument constructor of a non-generic struct is an explicit
    /// conversion from its argument type.
    fn constructor_conversion(
        &self,
        types: &TypeInterner,
        decl: &GenericDecl,
        shape: &CallableShape,
    ) -> Option<(TypeId, TypeId)> {
        let owner = self.owner_of(decl.id)?;
        if decl.is_generic() || owner.is_generic() || owner.kind != GenericDeclKind::Struct {
            return None;
        }
        match shape.params.as_slice() {
            [only] if types.is_concrete(only.ty) && !only.ty.is_error() => Some((only.ty, shape.ret)),
            _ => None,
        }
    }

    fn constraints(
        &self,
        r: Resolver<'_>,
        id: DeclId,
        syntax: &Decl,
        types: &TypeInterner,
        out: &mut Defined,
    ) {
        let refs = self.get(id).param_refs().map(|(param, _)| param);
        for (p, param) in syntax.generics.iter().zip(refs) {
            if p.bounds.is_empty() {
                continue;
            }
            let subject = match p.kind {
                GenericParamKind::Pack => types.pack(param),
                _ => types.param(param),
            };
            let bounds = self.interface_list(r.at(p.span), &p.bounds, p.span, out);
            if !bounds.is_empty() {
                out.constraints.push(Constraint {
                    subject,
                    kind: ConstraintKind::Conformance(bounds),
                    optional: false,
                    span: p.span,
                });
            }
        }

        let in_extension = self
            .scope_chain(id)
            .iter()
            .any(|&d| self.get(d).kind == GenericDeclKind::Extension);
        for w in &syntax.where_clauses {
            let r = r.at(w.span);
            let subject = match r.resolve_subject(&w.subject) {
                Ok(ty) => ty,
                Err(e) => {
                    out.errors.push(e);
                    continue;
                }
            };
            let kind = match &w.kind {
                WhereKind::Conformance(list) => {
                    ConstraintKind::Conformance(self.interface_list(r, list, w.span, out))
                }
                WhereKind::Equality(target) => {
                    ConstraintKind::Equality(out.recover(r.resolve_subject(target)))
                }
                WhereKind::Coercion { from, implicit } => {
                    if !in_extension {
                        out.fail(GenericErrorKind::InvalidCoercionContext, w.span);
                        continue;
                    }
                    ConstraintKind::Coercion {
                        from: out.recover(r.resolve_subject(from)),
                        implicit: *implicit,
                    }
                }
            };
            out.constraints.push(Constraint {
                subject,
                kind,
                optional: w.optional,
                span: w.span,
            });
        }
    }

    fn apply(&mut self, id: DeclId, defined: Defined) {
        let Defined {
            shape,
            constraints,
            pack_groups,
            interface,
            conformances,
            conversions,
            errors,
        } = defined;
        {
            let decl = &mut self.decls[id.index()];
            if let Some(shape) = shape {
                decl.shape = shape;
            }
            decl.constraints = constraints;
            decl.pack_groups = pack_groups;
        }
        if let Some(entry) = interface {
            self.interfaces.register_interface(entry);
        }
        for (head, entry) in conformances {
            self.interfaces.register_conformance(head, entry);
        }
        for (from, to) in conversions {
            self.conversions.register(from, to, false);
        }
        for e in errors {
            self.record_error(id, e);
        }
    }
}
