//! Expression checking.

use smallvec::SmallVec;
use umbra_ir::{BinaryOp, ExprId, ExprKind, Name, ParsedArg, ParsedType, Span, UnaryOp};
use umbra_types::{DeclId, GenericArg, ScalarKind, TypeData, TypeFlags, TypeId, ValueArg};

use super::{CallResolution, Callee, Checker, ConstructKind, FieldAccess, IdentKind, LocalKind, TypeTest};
use crate::binder::{BindRequest, Binder};
use crate::binding::BindingSet;
use crate::decl::{DeclShape, GenericDeclKind, GenericParam};
use crate::error::{BodyError, GenericError, PackPosition};
use crate::pack::{packs_in, PackGroup};
use crate::stack::ensure_sufficient_stack;
use crate::subst::Subst;

impl Checker<'_> {
    pub(super) fn expr(&mut self, id: ExprId) -> TypeId {
        let ty = ensure_sufficient_stack(|| self.expr_inner(id));
        self.out.expr_types.insert(id, ty);
        ty
    }

    fn expr_inner(&mut self, id: ExprId) -> TypeId {
        let arena = self.arena;
        let expr = arena.expr(id);
        let span = expr.span;
        match &expr.kind {
            ExprKind::Int(_) => TypeId::INT,
            ExprKind::Float(_) => TypeId::FLOAT,
            ExprKind::Bool(_) => TypeId::BOOL,
            ExprKind::Ident(name) => self.ident(id, *name, span),
            ExprKind::Binary { op, lhs, rhs } => self.binary(*op, *lhs, *rhs, span),
            ExprKind::Unary { op, operand } => self.unary(*op, *operand, span),
            ExprKind::Assign { op, target, value } => self.assign(*op, *target, *value, span),
            ExprKind::Call {
                callee,
                type_args,
                args,
            } => self.call(id, *callee, type_args, args, span),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => self.method_call(id, *receiver, *method, args, span),
            ExprKind::Field { base, name } => self.field(id, *base, *name, span),
            ExprKind::Index { base, args } => self.index(id, *base, args, span),
            ExprKind::Construct { ty, args } => {
                let target = self.resolve_type(ty, span);
                let arg_types = self.exprs(args);
                self.construct(id, target, &arg_types, span)
            }
            ExprKind::Tuple(elems) => {
                let elems = self.exprs(elems);
                self.types.tuple(elems)
            }
            ExprKind::TypeIs { subject, target } => {
                let subject = self.resolve_type(subject, span);
                let target = self.resolve_type(target, span);
                self.out.type_tests.insert(id, TypeTest { subject, target });
                TypeId::BOOL
            }
            ExprKind::CountOf(ty) => self.count_of(id, ty, span),
            ExprKind::Expand(inner) => self.expand(id, *inner, span),
            ExprKind::Each(inner) => self.each(*inner, span),
        }
    }

    fn exprs(&mut self, ids: &[ExprId]) -> Vec<TypeId> {
        ids.iter().map(|&e| self.expr(e)).collect()
    }

    fn builtin(&self, decl: DeclId) -> TypeId {
        self.types.named(decl, Vec::<GenericArg>::new())
    }

    // === Names ===

    fn ident(&mut self, id: ExprId, name: Name, span: Span) -> TypeId {
        if let Some(local) = self.lookup_local(name) {
            if local.kind == LocalKind::PackParam {
                return self.error(PackPosition::BarePack, span);
            }
            self.out.idents.insert(id, IdentKind::Local);
            return local.ty;
        }
        if name == self.table.names.this {
            if let Some(this) = self.this {
                self.out.idents.insert(id, IdentKind::This);
                return this;
            }
        }
        if let Some((p, GenericParam::Value { ty, .. })) = self.resolver.lookup_param(name) {
            self.out.idents.insert(id, IdentKind::ValueParam(p));
            return *ty;
        }
        self.error(BodyError::UnknownIdent { name }, span)
    }

    /// `each xs`: one element of a pack-typed parameter.
    fn each(&mut self, inner: ExprId, span: Span) -> TypeId {
        if self.frames.is_empty() {
            return self.error(PackPosition::EachOutsideExpand, span);
        }
        let arena = self.arena;
        let ExprKind::Ident(name) = arena.expr(inner).kind else {
            return self.error(PackPosition::NotAPack, span);
        };
        let Some(local) = self.lookup_local(name) else {
            return self.error(PackPosition::NotAPack, span);
        };
        let (pattern, tuple) = match (local.kind, self.types.lookup(local.ty)) {
            (LocalKind::PackParam, TypeData::Expand(pattern)) => (pattern, false),
            // `Tuple<expand P>`-typed values project one element.
            (_, TypeData::Tuple(elems)) => match *elems {
                [only] => match self.types.lookup(only) {
                    TypeData::Expand(pattern) => (pattern, true),
                    _ => return self.error(PackPosition::NotAPack, span),
                },
                _ => return self.error(PackPosition::NotAPack, span),
            },
            _ => return self.error(PackPosition::NotAPack, span),
        };
        self.note_packs(pattern);
        if let Some(&p) = packs_in(self.types, pattern).first() {
            let kind = if tuple {
                IdentKind::TupleElement(p)
            } else {
                IdentKind::PackElement(p)
            };
            self.out.idents.insert(inner, kind);
        }
        self.out.expr_types.insert(inner, pattern);
        pattern
    }

    fn expand(&mut self, id: ExprId, inner: ExprId, span: Span) -> TypeId {
        self.frames.push(SmallVec::new());
        let elem = self.expr(inner);
        let packs = self.frames.pop().unwrap_or_default();
        if packs.is_empty() {
            return self.error(PackPosition::ExpandWithoutEach, span);
        }
        if packs.len() > 1 {
            self.out.pack_groups.push(PackGroup {
                packs: packs.clone(),
                span,
            });
        }
        self.out.expansions.insert(id, packs);
        if elem.is_error() {
            return elem;
        }
        self.types.expand(elem)
    }

    fn count_of(&mut self, id: ExprId, ty: &ParsedType, span: Span) -> TypeId {
        let resolved = match self.resolver.at(span).resolve_subject(ty) {
            Ok(t) => t,
            Err(e) => {
                self.errors.push(e);
                return TypeId::ERROR;
            }
        };
        if !self.types.flags(resolved).contains(TypeFlags::HAS_PACK) {
            return self.error(PackPosition::NotAPack, span);
        }
        self.out.countofs.insert(id, resolved);
        TypeId::INT
    }

    // === Operators ===

    /// Type both operands convert to implicitly, preferring the left.
    fn common_type(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        let (a, b) = (self.solver.normalize(&self.env, a), self.solver.normalize(&self.env, b));
        if a == b || self.solver.convertible(&self.env, b, a, true) {
            Some(a)
        } else if self.solver.convertible(&self.env, a, b, true) {
            Some(b)
        } else {
            None
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId, span: Span) -> TypeId {
        let (lt, rt) = (self.expr(lhs), self.expr(rhs));
        if lt.is_error() || rt.is_error() {
            return TypeId::ERROR;
        }
        if op.is_logical() {
            for t in [lt, rt] {
                if !self.solver.convertible(&self.env, t, TypeId::BOOL, true) {
                    return self.error(
                        BodyError::Mismatch {
                            expected: TypeId::BOOL,
                            found: t,
                        },
                        span,
                    );
                }
            }
            return TypeId::BOOL;
        }
        let Some(common) = self.common_type(lt, rt) else {
            return self.error(
                BodyError::Mismatch {
                    expected: lt,
                    found: rt,
                },
                span,
            );
        };
        self.operator(op, common, span)
    }

    /// Result of `op` on two values of type `ty`.
    fn operator(&mut self, op: BinaryOp, ty: TypeId, span: Span) -> TypeId {
        let builtins = self.table.builtins();
        let is_vector = matches!(self.types.lookup(ty), TypeData::Vector { .. });
        let needed = if op.is_arithmetic() {
            Some(builtins.arithmetic)
        } else if is_vector && matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            None
        } else {
            Some(builtins.comparable)
        };
        if let Some(iface) = needed {
            if !self.solver.conforms(&self.env, ty, self.builtin(iface)) {
                return self.error(
                    BodyError::OperatorNotSupported {
                        op: op.as_symbol(),
                        ty,
                    },
                    span,
                );
            }
        }
        if op.is_arithmetic() {
            ty
        } else {
            TypeId::BOOL
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: ExprId, span: Span) -> TypeId {
        let t = self.expr(operand);
        if t.is_error() {
            return t;
        }
        match op {
            UnaryOp::Neg => {
                let arithmetic = self.builtin(self.table.builtins().arithmetic);
                if self.solver.conforms(&self.env, t, arithmetic) {
                    t
                } else {
                    self.error(BodyError::OperatorNotSupported { op: "-", ty: t }, span)
                }
            }
            UnaryOp::Not => {
                if self.solver.convertible(&self.env, t, TypeId::BOOL, true) {
                    TypeId::BOOL
                } else {
                    self.error(BodyError::OperatorNotSupported { op: "!", ty: t }, span)
                }
            }
        }
    }

    fn assign(&mut self, op: Option<BinaryOp>, target: ExprId, value: ExprId, span: Span) -> TypeId {
        let tt = self.expr(target);
        let vt = self.expr(value);
        if !self.is_assignable(target) {
            return self.error(BodyError::NotAssignable, span);
        }
        if tt.is_error() || vt.is_error() {
            return TypeId::ERROR;
        }
        if let Some(op) = op {
            if self.operator(op, tt, span).is_error() {
                return TypeId::ERROR;
            }
        }
        if !self.solver.convertible(&self.env, vt, tt, true) {
            return self.error(
                BodyError::Mismatch {
                    expected: tt,
                    found: vt,
                },
                span,
            );
        }
        tt
    }

    fn is_assignable(&self, id: ExprId) -> bool {
        match &self.arena.expr(id).kind {
            ExprKind::Ident(name) => self
                .lookup_local(*name)
                .is_some_and(|l| l.kind != LocalKind::PackParam),
            ExprKind::Field { base, .. } | ExprKind::Index { base, .. } => {
                self.is_assignable(*base)
                    || self.out.idents.get(base) == Some(&IdentKind::This)
            }
            ExprKind::Each(_) => true,
            _ => false,
        }
    }

    // === Calls ===

    fn resolve_args(&mut self, args: &[ParsedArg], span: Span) -> Option<Vec<GenericArg>> {
        let r = self.resolver.at(span);
        match args.iter().map(|a| r.resolve_arg(a)).collect::<Result<Vec<_>, _>>() {
            Ok(args) => Some(args),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    fn call(
        &mut self,
        id: ExprId,
        callee: Name,
        type_args: &[ParsedArg],
        args: &[ExprId],
        span: Span,
    ) -> TypeId {
        let arg_types = self.exprs(args);
        let names = self.table.names;
        if callee == names.vector
            || callee == names.tuple
            || ScalarKind::from_name(self.strings.lookup(callee)).is_some()
        {
            let ty = self.resolve_type(
                &ParsedType::Named {
                    name: callee,
                    args: type_args.to_vec(),
                },
                span,
            );
            return self.construct(id, ty, &arg_types, span);
        }
        let Some(explicit) = self.resolve_args(type_args, span) else {
            return TypeId::ERROR;
        };

        if let Some(decl) = self.table.lookup(callee) {
            let d = self.table.get(decl);
            if d.kind.is_callable() {
                let outer = BindingSet::new();
                return self.call_candidates(id, vec![(decl, outer)], &explicit, &arg_types, None, span);
            }
            if !d.kind.is_type() {
                return self.error(BodyError::NotCallable { name: callee }, span);
            }
            if explicit.is_empty() && d.is_generic() && d.kind == GenericDeclKind::Struct {
                let inits: Vec<(DeclId, BindingSet)> = d
                    .members()
                    .iter()
                    .filter(|&&m| self.table.get(m).kind == GenericDeclKind::Constructor)
                    .map(|&m| (m, BindingSet::new()))
                    .collect();
                if !inits.is_empty() {
                    let ty = self.call_candidates(id, inits, &[], &arg_types, None, span);
                    if !ty.is_error() {
                        self.out.constructs.insert(id, ConstructKind::Init);
                    }
                    return ty;
                }
            }
            let ty = match self.resolver.at(span).apply(decl, &explicit) {
                Ok(ty) => ty,
                Err(e) => {
                    self.errors.push(e);
                    return TypeId::ERROR;
                }
            };
            self.validate_type(ty, span);
            return self.construct(id, ty, &arg_types, span);
        }

        // Sibling member called without a receiver.
        if let Some(this) = self.this {
            let cands = self.solver.find_members(&self.env, this, callee);
            if !cands.is_empty() {
                return self.call_candidates(id, cands, &explicit, &arg_types, Some(this), span);
            }
        }
        self.error(BodyError::UnknownIdent { name: callee }, span)
    }

    fn method_call(&mut self, id: ExprId, receiver: ExprId, method: Name, args: &[ExprId], span: Span) -> TypeId {
        let rt = self.expr(receiver);
        let arg_types = self.exprs(args);
        if rt.is_error() {
            return rt;
        }
        let cands = self.solver.find_members(&self.env, rt, method);
        if !cands.is_empty() {
            return self.call_candidates(id, cands, &[], &arg_types, Some(rt), span);
        }
        if let Some((interface, requirement)) = self.solver.find_requirement(&self.env, rt, method) {
            return self.call_requirement(id, interface, requirement, &arg_types, rt, span);
        }
        self.error(BodyError::UnknownMember { ty: rt, name: method }, span)
    }

    fn call_requirement(
        &mut self,
        id: ExprId,
        interface: TypeId,
        requirement: DeclId,
        arg_types: &[TypeId],
        receiver: TypeId,
        span: Span,
    ) -> TypeId {
        let TypeData::Named { decl, args } = self.types.lookup(interface) else {
            return TypeId::ERROR;
        };
        let outer = self.table.binding_for_args(decl, &args);
        match self.try_call(requirement, &outer, &[], arg_types, Some(receiver), span) {
            Ok((binding, ret)) => {
                self.out.calls.insert(
                    id,
                    CallResolution {
                        callee: Callee::Requirement {
                            interface,
                            requirement,
                        },
                        binding,
                    },
                );
                ret
            }
            Err(e) => {
                self.errors.push(e);
                TypeId::ERROR
            }
        }
    }

    /// First candidate that binds and validates; otherwise the first
    /// candidate's failure is reported.
    fn call_candidates(
        &mut self,
        id: ExprId,
        cands: Vec<(DeclId, BindingSet)>,
        explicit: &[GenericArg],
        arg_types: &[TypeId],
        this: Option<TypeId>,
        span: Span,
    ) -> TypeId {
        let mut first_err = None;
        for (decl, outer) in cands {
            match self.try_call(decl, &outer, explicit, arg_types, this, span) {
                Ok((binding, ret)) => {
                    self.out.calls.insert(
                        id,
                        CallResolution {
                            callee: Callee::Decl(decl),
                            binding,
                        },
                    );
                    return ret;
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_err {
            self.errors.push(e);
        }
        TypeId::ERROR
    }

    fn try_call(
        &self,
        decl: DeclId,
        outer: &BindingSet,
        explicit: &[GenericArg],
        arg_types: &[TypeId],
        this: Option<TypeId>,
        span: Span,
    ) -> Result<(BindingSet, TypeId), GenericError> {
        let binder = Binder::new(self.table, self.types, &self.solver, self.config);
        let req = BindRequest::new(decl, outer, span)
            .with_explicit(explicit)
            .with_args(arg_types)
            .with_this(this);
        let binding = binder.bind(&self.env, &req)?;
        self.solver.validate(&self.env, decl, &binding, span)?;
        let ret = self.table.get(decl).callable().map_or(TypeId::VOID, |c| c.ret);
        let ret = Subst::new(self.types, &binding)
            .with_this(this)
            .with_projector(&self.solver)
            .ty(ret)
            .map_err(|kind| GenericError::new(kind, span))?;
        Ok((binding, self.solver.normalize(&self.env, ret)))
    }

    // === Members ===

    fn field(&mut self, id: ExprId, base: ExprId, name: Name, span: Span) -> TypeId {
        let bt = self.expr(base);
        if bt.is_error() {
            return bt;
        }
        let bt = self.solver.normalize(&self.env, bt);
        let found = match self.types.lookup(bt) {
            TypeData::Named { decl, args } => self.struct_field(decl, &args, name),
            TypeData::Vector { elem, count } => swizzle(self.strings.lookup(name))
                .filter(|s| count.as_int().is_none_or(|n| s.iter().all(|&i| i64::from(i) < n)))
                .map(|s| {
                    let ty = match s.len() {
                        1 => elem,
                        n => self
                            .types
                            .vector(elem, ValueArg::Int(i64::try_from(n).unwrap_or(0))),
                    };
                    (FieldAccess::Swizzle(s), ty)
                }),
            TypeData::Tuple(elems) => {
                let index = self
                    .strings
                    .lookup(name)
                    .strip_prefix('_')
                    .and_then(|i| i.parse::<u32>().ok());
                // Elements after a symbolic expansion have no fixed index.
                let fixed: Vec<TypeId> = elems
                    .iter()
                    .copied()
                    .take_while(|&e| !matches!(self.types.lookup(e), TypeData::Expand(_)))
                    .collect();
                index.and_then(|i| {
                    let ty = *fixed.get(i as usize)?;
                    Some((FieldAccess::TupleElement(i), ty))
                })
            }
            _ => None,
        };
        match found {
            Some((access, ty)) => {
                self.out.fields.insert(id, access);
                ty
            }
            None => self.error(BodyError::UnknownMember { ty: bt, name }, span),
        }
    }

    fn struct_field(&self, decl: DeclId, args: &[GenericArg], name: Name) -> Option<(FieldAccess, TypeId)> {
        let DeclShape::Struct(shape) = &self.table.get(decl).shape else {
            return None;
        };
        let field = shape.fields.iter().find(|f| f.name == name)?;
        let binding = self.table.binding_for_args(decl, args);
        let ty = Subst::new(self.types, &binding)
            .with_projector(&self.solver)
            .ty(field.ty)
            .ok()?;
        Some((FieldAccess::Field(name), ty))
    }

    fn index(&mut self, id: ExprId, base: ExprId, args: &[ExprId], span: Span) -> TypeId {
        let bt = self.expr(base);
        let arg_types = self.exprs(args);
        if bt.is_error() {
            return bt;
        }
        let bt = self.solver.normalize(&self.env, bt);
        match self.types.lookup(bt) {
            TypeData::Array { elem, .. } | TypeData::Vector { elem, .. } => {
                for &a in &arg_types {
                    let integer = a.is_error() || a.as_scalar().is_some_and(ScalarKind::is_integer);
                    if !integer {
                        return self.error(
                            BodyError::Mismatch {
                                expected: TypeId::INT,
                                found: a,
                            },
                            span,
                        );
                    }
                }
                elem
            }
            _ => {
                let subscript = self.table.names.subscript;
                let cands = self.solver.find_members(&self.env, bt, subscript);
                if cands.is_empty() {
                    return self.error(BodyError::UnknownMember { ty: bt, name: subscript }, span);
                }
                self.call_candidates(id, cands, &[], &arg_types, Some(bt), span)
            }
        }
    }

    // === Construction ===

    /// `ty(args)`: conversion, vector construction, constructor call or
    /// aggregate initialization, in that order.
    pub(super) fn construct(&mut self, id: ExprId, ty: TypeId, args: &[TypeId], span: Span) -> TypeId {
        let ty = self.solver.normalize(&self.env, ty);
        if ty.is_error() || args.iter().any(|a| a.is_error()) {
            return TypeId::ERROR;
        }
        let kind = match self.types.lookup(ty) {
            TypeData::Scalar(_) => self.conversion(ty, args),
            TypeData::Vector { elem, count } => self
                .vector_args_fit(elem, count, args)
                .then_some(ConstructKind::Vector),
            TypeData::Named { decl, args: type_args } => {
                let d = self.table.get(decl);
                if d.kind != GenericDeclKind::Struct {
                    None
                } else {
                    let inits: Vec<(DeclId, BindingSet)> = self
                        .solver
                        .find_members(&self.env, ty, self.table.names.init)
                        .into_iter()
                        .filter(|(m, _)| self.table.get(*m).kind == GenericDeclKind::Constructor)
                        .collect();
                    if !inits.is_empty() {
                        let ret = self.call_candidates(id, inits, &[], args, Some(ty), span);
                        if !ret.is_error() {
                            self.out.constructs.insert(id, ConstructKind::Init);
                        }
                        return ret;
                    }
                    self.conversion(ty, args).or_else(|| {
                        let DeclShape::Struct(shape) = &d.shape else {
                            return None;
                        };
                        let binding = self.table.binding_for_args(decl, &type_args);
                        let subst = Subst::new(self.types, &binding).with_projector(&self.solver);
                        let fields: Vec<TypeId> = shape
                            .fields
                            .iter()
                            .map(|f| subst.ty(f.ty).unwrap_or(TypeId::ERROR))
                            .collect();
                        self.all_convert(args, &fields).then_some(ConstructKind::Aggregate)
                    })
                }
            }
            TypeData::Tuple(elems) => self
                .all_convert(args, &elems)
                .then_some(ConstructKind::Aggregate),
            TypeData::Param(_) | TypeData::Pack(_) | TypeData::Assoc { .. } | TypeData::This => {
                self.conversion(ty, args)
            }
            _ => None,
        };
        match kind {
            Some(kind) => {
                self.out.constructs.insert(id, kind);
                ty
            }
            None => self.error(
                BodyError::NotConvertible {
                    from: args.first().copied().unwrap_or(TypeId::VOID),
                    to: ty,
                },
                span,
            ),
        }
    }

    fn conversion(&self, ty: TypeId, args: &[TypeId]) -> Option<ConstructKind> {
        match args {
            [from] if self.solver.convertible(&self.env, *from, ty, false) => {
                Some(ConstructKind::Convert)
            }
            _ => None,
        }
    }

    fn all_convert(&self, args: &[TypeId], params: &[TypeId]) -> bool {
        args.len() == params.len()
            && args
                .iter()
                .zip(params)
                .all(|(&a, &p)| self.solver.convertible(&self.env, a, p, true))
    }

    /// A single scalar splats; otherwise the components must add up.
    fn vector_args_fit(&self, elem: TypeId, count: ValueArg, args: &[TypeId]) -> bool {
        let component = |t: TypeId| self.solver.convertible(&self.env, t, elem, false);
        if let [only] = args {
            if only.as_scalar().is_some() || self.solver.equal(&self.env, *only, elem) {
                return component(*only);
            }
        }
        let mut total = 0_i64;
        for &a in args {
            match self.types.lookup(a) {
                TypeData::Vector {
                    elem: e,
                    count: ValueArg::Int(n),
                } if component(e) => total += n,
                _ if component(a) => total += 1,
                _ => return false,
            }
        }
        count.as_int().is_some_and(|n| n == total)
    }
}

/// Component indices of a swizzle like `xy` or `rgba`.
fn swizzle(s: &str) -> Option<SmallVec<[u8; 4]>> {
    if s.is_empty() || s.len() > 4 {
        return None;
    }
    s.chars()
        .map(|c| match c {
            'x' | 'r' => Some(0),
            'y' | 'g' => Some(1),
            'z' | 'b' => Some(2),
            'w' | 'a' => Some(3),
            _ => None,
        })
        .collect()
}
