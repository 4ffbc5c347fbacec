//! Constraint solving.
//!
//! Every question is asked under a set of [`Assumptions`]: the constraints
//! in force inside the generic body being checked, plus any a static `is`
//! test has established. Under empty assumptions only facts about concrete
//! types hold.
//!
//! ```text
//! conforms(ty, I)
//!     ├── normalize ty (equalities, associated type projection)
//!     ├── built-in scalar and vector conformances
//!     ├── assumed bounds, including associated type bounds
//!     └── declared conformances whose subject matches ty
//!           └── extension constraints, recursively (depth-limited)
//! ```

use smallvec::SmallVec;
use umbra_ir::{Name, Span};
use umbra_types::{
    ConformanceEntry, ConformanceHead, DeclId, GenericArg, ParamRef, TypeData, TypeId,
    TypeInterner,
};

use crate::binder::Matcher;
use crate::binding::BindingSet;
use crate::config::GenericsConfig;
use crate::decl::{Constraint, ConstraintKind, DeclShape, DeclTable, GenericDeclKind};
use crate::error::{GenericError, GenericErrorKind, Requirement};
use crate::pack::packs_in;
use crate::stack::ensure_sufficient_stack;
use crate::subst::{Projector, Subst};

/// Limit on equality rewrites while normalizing one type.
const MAX_REWRITES: usize = 16;

/// Why a constraint does not hold.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Unmet {
    /// An element (or the subject itself) misses a requirement.
    Requirement(TypeId, Requirement),
    /// Packs the constraint iterates together have different lengths.
    Arity(Vec<(ParamRef, usize)>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Coercion {
    from: TypeId,
    to: TypeId,
    implicit: bool,
}

/// Facts taken as given while solving.
#[derive(Clone, Debug, Default)]
pub struct Assumptions {
    /// `(subject, interface type)`.
    bounds: Vec<(TypeId, TypeId)>,
    /// `subject == target`, applied left to right.
    equalities: Vec<(TypeId, TypeId)>,
    coercions: Vec<Coercion>,
}

impl Assumptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-optional constraints of `decl` and its owners. Inside an
    /// interface, `This` conforms to the interface.
    pub fn for_decl(table: &DeclTable, types: &TypeInterner, decl: DeclId) -> Self {
        let mut env = Assumptions::new();
        for c in table.constraints_in_scope(decl) {
            if !c.optional {
                env.assume(c);
            }
        }
        for id in table.scope_chain(decl) {
            if table.get(id).kind == GenericDeclKind::Interface {
                env.bounds.push((TypeId::THIS, table.identity_type(types, id)));
            }
        }
        env
    }

    pub fn assume(&mut self, c: &Constraint) {
        match &c.kind {
            ConstraintKind::Conformance(list) => {
                self.bounds.extend(list.iter().map(|&i| (c.subject, i)));
            }
            ConstraintKind::Equality(target) => self.equalities.push((c.subject, *target)),
            ConstraintKind::Coercion { from, implicit } => self.coercions.push(Coercion {
                from: *from,
                to: c.subject,
                implicit: *implicit,
            }),
        }
    }

    pub fn assume_conforms(&mut self, subject: TypeId, interface: TypeId) {
        self.bounds.push((subject, interface));
    }

    pub fn assume_equal(&mut self, subject: TypeId, target: TypeId) {
        self.equalities.push((subject, target));
    }

    fn bounds_of(&self, ty: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        self.bounds
            .iter()
            .filter(move |(s, _)| *s == ty)
            .map(|(_, i)| *i)
    }

    fn equality(&self, ty: TypeId) -> Option<TypeId> {
        self.equalities
            .iter()
            .find(|(s, t)| *s == ty && *t != ty)
            .map(|(_, t)| *t)
    }
}

pub struct Solver<'a> {
    table: &'a DeclTable,
    types: &'a TypeInterner,
    config: &'a GenericsConfig,
}

impl<'a> Solver<'a> {
    pub fn new(table: &'a DeclTable, types: &'a TypeInterner, config: &'a GenericsConfig) -> Self {
        Solver {
            table,
            types,
            config,
        }
    }

    // === Normalization ===

    /// Rewrite `ty` by assumed equalities and resolve associated types of
    /// concrete bases.
    pub fn normalize(&self, env: &Assumptions, ty: TypeId) -> TypeId {
        self.normalize_at(env, ty, 0)
    }

    fn normalize_at(&self, env: &Assumptions, ty: TypeId, rewrites: usize) -> TypeId {
        let types = self.types;
        if types.flags(ty).is_concrete() || rewrites > MAX_REWRITES {
            return ty;
        }
        if let Some(target) = env.equality(ty) {
            return self.normalize_at(env, target, rewrites + 1);
        }
        let rebuilt = ensure_sufficient_stack(|| match types.lookup(ty) {
            TypeData::Vector { elem, count } => {
                types.vector(self.normalize_at(env, elem, rewrites), count)
            }
            TypeData::Array { elem, len } => types.array(self.normalize_at(env, elem, rewrites), len),
            TypeData::Tuple(elems) => types.tuple(
                elems
                    .iter()
                    .map(|&e| self.normalize_at(env, e, rewrites))
                    .collect::<Vec<_>>(),
            ),
            TypeData::Named { decl, args } => types.named(
                decl,
                args.iter()
                    .map(|&a| match a {
                        GenericArg::Type(t) => GenericArg::Type(self.normalize_at(env, t, rewrites)),
                        GenericArg::Value(_) => a,
                    })
                    .collect::<Vec<_>>(),
            ),
            TypeData::Expand(pattern) => types.expand(self.normalize_at(env, pattern, rewrites)),
            TypeData::Assoc { base, name } => {
                let base = self.normalize_at(env, base, rewrites);
                match self.project_assoc(env, base, name) {
                    Some(witness) => self.normalize_at(env, witness, rewrites + 1),
                    None => types.assoc(base, name),
                }
            }
            _ => ty,
        });
        match env.equality(rebuilt) {
            Some(target) if rebuilt != ty => self.normalize_at(env, target, rewrites + 1),
            _ => rebuilt,
        }
    }

    /// `base.name` for a base whose conformances are known: a type member
    /// of the struct or of a matching extension.
    pub fn project_assoc(&self, env: &Assumptions, base: TypeId, name: Name) -> Option<TypeId> {
        let types = self.types;
        match types.lookup(base) {
            TypeData::Named { decl, args } if self.table.get(decl).kind == GenericDeclKind::Struct => {
                let d = self.table.get(decl);
                if let Some(&(_, ty)) = d.type_members().iter().find(|(n, _)| *n == name) {
                    let binding = self.table.binding_for_args(decl, &args);
                    return Subst::new(types, &binding).ty(ty).ok();
                }
            }
            TypeData::Param(_)
            | TypeData::Pack(_)
            | TypeData::This
            | TypeData::Assoc { .. }
            | TypeData::Expand(_)
            | TypeData::Error => return None,
            _ => {}
        }
        self.table.extensions().iter().find_map(|&ext| {
            let &(_, ty) = self
                .table
                .get(ext)
                .type_members()
                .iter()
                .find(|(n, _)| *n == name)?;
            let binding = self.match_extension(env, ext, base, 0)?;
            Subst::new(types, &binding).ty(ty).ok()
        })
    }

    // === Relations ===

    pub fn equal(&self, env: &Assumptions, a: TypeId, b: TypeId) -> bool {
        let (a, b) = (self.normalize(env, a), self.normalize(env, b));
        a == b || a.is_error() || b.is_error()
    }

    /// Whether a value of type `from` may be used where `to` is expected.
    pub fn convertible(&self, env: &Assumptions, from: TypeId, to: TypeId, implicit_only: bool) -> bool {
        let types = self.types;
        let (from, to) = (self.normalize(env, from), self.normalize(env, to));
        if from == to || from.is_error() || to.is_error() {
            return true;
        }
        if let (TypeData::Expand(a), TypeData::Expand(b)) = (types.lookup(from), types.lookup(to)) {
            return self.convertible(env, a, b, implicit_only);
        }
        let conversions = self.table.conversions();
        let declared = if implicit_only {
            conversions.is_implicit(types, from, to)
        } else {
            conversions.is_explicit(types, from, to)
        };
        declared
            || env.coercions.iter().any(|c| {
                (c.implicit || !implicit_only)
                    && self.equal(env, c.from, from)
                    && self.equal(env, c.to, to)
            })
    }

    pub fn conforms(&self, env: &Assumptions, ty: TypeId, interface: TypeId) -> bool {
        self.conforms_at(env, ty, interface, 0)
    }

    fn conforms_at(&self, env: &Assumptions, ty: TypeId, interface: TypeId, depth: usize) -> bool {
        if depth > self.config.max_conformance_depth {
            tracing::debug!(depth, "conformance search depth exceeded");
            return false;
        }
        let types = self.types;
        let ty = self.normalize(env, ty);
        let interface = self.normalize(env, interface);
        if ty.is_error() || interface.is_error() {
            return true;
        }
        let TypeData::Named {
            decl: target,
            args: target_args,
        } = types.lookup(interface)
        else {
            return false;
        };
        if let TypeData::Expand(inner) = types.lookup(ty) {
            return self.conforms_at(env, inner, interface, depth);
        }
        let registry = self.table.interfaces();
        if target_args.is_empty() && registry.builtin_conforms(types, ty, target) {
            return true;
        }
        if env
            .bounds_of(ty)
            .any(|b| self.bound_implies(b, target, interface))
        {
            return true;
        }
        if let TypeData::Assoc { base, name } = types.lookup(ty) {
            let implied = env.bounds_of(base).any(|b| {
                let TypeData::Named { decl, .. } = types.lookup(b) else {
                    return false;
                };
                registry.find_assoc(decl, name).is_some_and(|(_, def)| {
                    def.bounds
                        .iter()
                        .any(|&bound| self.bound_implies(bound, target, interface))
                })
            });
            if implied {
                return true;
            }
        }

        let Some(head) = ConformanceHead::of(types, ty) else {
            return false;
        };
        registry.candidates(head).any(|(_, c)| {
            if !registry.implies(c.interface_decl, target) {
                return false;
            }
            let Some(binding) = self.match_conformance(env, c, ty, depth + 1) else {
                return false;
            };
            if c.interface_decl != target || target_args.is_empty() {
                return true;
            }
            Subst::new(types, &binding)
                .ty(c.interface)
                .is_ok_and(|applied| self.equal(env, applied, interface))
        })
    }

    /// Whether knowing `bound` establishes conformance to `interface`.
    fn bound_implies(&self, bound: TypeId, target: DeclId, interface: TypeId) -> bool {
        let TypeData::Named { decl, .. } = self.types.lookup(bound) else {
            return false;
        };
        if decl == target {
            return bound == interface
                || matches!(self.types.lookup(interface), TypeData::Named { args, .. } if args.is_empty());
        }
        matches!(self.types.lookup(interface), TypeData::Named { args, .. } if args.is_empty())
            && self.table.interfaces().implies(decl, target)
    }

    fn match_conformance(
        &self,
        env: &Assumptions,
        c: &ConformanceEntry,
        ty: TypeId,
        depth: usize,
    ) -> Option<BindingSet> {
        match c.params_of {
            None => self.equal(env, c.subject, ty).then(BindingSet::new),
            Some(owner) if self.table.get(owner).kind == GenericDeclKind::Extension => {
                self.match_extension(env, owner, ty, depth)
            }
            Some(owner) => match self.types.lookup(ty) {
                TypeData::Named { decl, args } if decl == owner => {
                    Some(self.table.binding_for_args(owner, &args))
                }
                _ => None,
            },
        }
    }

    /// Binding of `ext`'s parameters under which its target is `ty` and its
    /// constraints hold.
    pub(crate) fn match_extension(
        &self,
        env: &Assumptions,
        ext: DeclId,
        ty: TypeId,
        depth: usize,
    ) -> Option<BindingSet> {
        if self.table.is_poisoned(ext) {
            return None;
        }
        let d = self.table.get(ext);
        let DeclShape::Extension(shape) = &d.shape else {
            return None;
        };
        if shape.target.is_error() {
            return None;
        }
        if !d.is_generic() {
            return self.equal(env, shape.target, ty).then(BindingSet::new);
        }
        let params: SmallVec<[ParamRef; 4]> = d.param_refs().map(|(p, _)| p).collect();
        let mut matcher = Matcher::new(self.types, params.iter().copied());
        matcher.match_type(shape.target, ty);
        let binding = matcher.exact_binding(self.table, &params)?;
        let applied = Subst::new(self.types, &binding).ty(shape.target).ok()?;
        if !self.equal(env, applied, ty) {
            return None;
        }
        d.constraints
            .iter()
            .filter(|c| !c.optional)
            .all(|c| self.check(env, &binding, c, depth + 1).is_ok())
            .then_some(binding)
    }

    // === Constraints ===

    /// Whether `c` holds under `binding`.
    pub fn satisfies(&self, env: &Assumptions, binding: &BindingSet, c: &Constraint) -> bool {
        self.check(env, binding, c, 0).is_ok()
    }

    /// Truth of an optional constraint; never an error.
    pub fn evaluate_optional(&self, env: &Assumptions, binding: &BindingSet, c: &Constraint) -> bool {
        let holds = self.satisfies(env, binding, c);
        tracing::trace!(holds, span = ?c.span, "optional constraint evaluated");
        holds
    }

    /// First unmet part of `c`. Constraints on a pack are checked for each
    /// element, so the packs involved must agree in length.
    fn check(
        &self,
        env: &Assumptions,
        binding: &BindingSet,
        c: &Constraint,
        depth: usize,
    ) -> Result<(), Unmet> {
        let types = self.types;
        let base = Subst::new(types, binding).with_projector(self);
        let mut packs = packs_in(types, c.subject);
        let targets: SmallVec<[TypeId; 2]> = match &c.kind {
            ConstraintKind::Conformance(list) => list.iter().copied().collect(),
            ConstraintKind::Equality(t) => SmallVec::from_elem(*t, 1),
            ConstraintKind::Coercion { from, .. } => SmallVec::from_elem(*from, 1),
        };
        for &t in &targets {
            for p in packs_in(types, t) {
                if !packs.contains(&p) {
                    packs.push(p);
                }
            }
        }
        let whole = |subst: &Subst<'_>| {
            self.check_one(env, subst, c, depth)
                .map_err(|(subject, requirement)| Unmet::Requirement(subject, requirement))
        };
        if packs.is_empty() {
            return whole(&base);
        }

        let mut lists: SmallVec<[&[TypeId]; 2]> = SmallVec::new();
        for &p in &packs {
            match binding.pack_of(p) {
                Some(list) => lists.push(list),
                // Rigid pack: holds element-wise exactly when assumed.
                None => return whole(&base),
            }
        }
        let len = lists[0].len();
        if lists.iter().any(|l| l.len() != len) {
            let lengths = packs.iter().zip(&lists).map(|(&p, l)| (p, l.len())).collect();
            return Err(Unmet::Arity(lengths));
        }
        for k in 0..len {
            let column = packs.iter().zip(&lists).map(|(&p, list)| {
                let elem = match types.lookup(list[k]) {
                    TypeData::Expand(inner) => inner,
                    _ => list[k],
                };
                (p, elem)
            });
            self.check_one(env, &base.fork().with_elements(column), c, depth)
                .map_err(|(subject, requirement)| Unmet::Requirement(subject, requirement))?;
        }
        Ok(())
    }

    fn check_one(
        &self,
        env: &Assumptions,
        subst: &Subst<'_>,
        c: &Constraint,
        depth: usize,
    ) -> Result<(), (TypeId, Requirement)> {
        let ty = |t: TypeId| subst.ty(t).unwrap_or(TypeId::ERROR);
        let subject = ty(c.subject);
        match &c.kind {
            ConstraintKind::Conformance(list) => {
                for &i in list {
                    let i = ty(i);
                    if !self.conforms_at(env, subject, i, depth) {
                        return Err((subject, Requirement::Conforms(i)));
                    }
                }
                Ok(())
            }
            ConstraintKind::Equality(target) => {
                let target = ty(*target);
                if self.equal(env, subject, target) {
                    Ok(())
                } else {
                    Err((subject, Requirement::Equals(target)))
                }
            }
            ConstraintKind::Coercion { from, implicit } => {
                let from = ty(*from);
                if self.convertible(env, from, subject, *implicit) {
                    Ok(())
                } else {
                    Err((
                        subject,
                        Requirement::ConvertibleFrom {
                            from,
                            implicit: *implicit,
                        },
                    ))
                }
            }
        }
    }

    /// Check every non-optional constraint in scope of `decl` and every
    /// pack group of its signature and body under `binding`. Failures are
    /// reported at the use site `span`.
    #[tracing::instrument(level = "trace", skip(self, env, binding))]
    pub fn validate(
        &self,
        env: &Assumptions,
        decl: DeclId,
        binding: &BindingSet,
        span: Span,
    ) -> Result<(), GenericError> {
        if self.table.is_poisoned(decl) {
            return Err(self.table.poisoned_error(decl, span));
        }
        let body_groups = self
            .table
            .checked(decl)
            .map_or(&[][..], |b| b.pack_groups.as_slice());
        let chain = self.table.scope_chain(decl);
        let scope_groups = chain.iter().flat_map(|&d| self.table.get(d).pack_groups.iter());
        for group in scope_groups.chain(body_groups) {
            group
                .check(binding)
                .map_err(|e| GenericError::new(e.kind, span))?;
        }
        for c in self.table.constraints_in_scope(decl) {
            if c.optional {
                continue;
            }
            match self.check(env, binding, c, 0) {
                Ok(()) => {}
                Err(Unmet::Requirement(subject, requirement)) => {
                    return Err(GenericError::new(
                        GenericErrorKind::UnsatisfiedConstraint {
                            subject,
                            requirement,
                            declared_at: c.span,
                        },
                        span,
                    ))
                }
                Err(Unmet::Arity(lengths)) => {
                    return Err(GenericError::new(GenericErrorKind::ArityMismatch { lengths }, span))
                }
            }
        }
        Ok(())
    }

    // === Members ===

    /// Members called `name` on `ty`, each with the binding of its owner's
    /// parameters: struct members first, then matching extensions.
    pub fn find_members(&self, env: &Assumptions, ty: TypeId, name: Name) -> Vec<(DeclId, BindingSet)> {
        let ty = self.normalize(env, ty);
        let mut out = Vec::new();
        if let TypeData::Named { decl, args } = self.types.lookup(ty) {
            let d = self.table.get(decl);
            if d.kind == GenericDeclKind::Struct {
                let binding = self.table.binding_for_args(decl, &args);
                for &m in d.members() {
                    if self.table.get(m).name == name {
                        out.push((m, binding.clone()));
                    }
                }
            }
        }
        for &ext in self.table.extensions() {
            let members: SmallVec<[DeclId; 2]> = self
                .table
                .get(ext)
                .members()
                .iter()
                .copied()
                .filter(|&m| self.table.get(m).name == name)
                .collect();
            if members.is_empty() {
                continue;
            }
            if let Some(binding) = self.match_extension(env, ext, ty, 0) {
                out.extend(members.into_iter().map(|m| (m, binding.clone())));
            }
        }
        out
    }

    /// Interface requirement called `name` available on a type through an
    /// assumed bound: `(interface type, requirement)`.
    pub fn find_requirement(&self, env: &Assumptions, ty: TypeId, name: Name) -> Option<(TypeId, DeclId)> {
        let ty = self.normalize(env, ty);
        let registry = self.table.interfaces();
        let mut bounds: SmallVec<[TypeId; 4]> = env.bounds_of(ty).collect();
        if let TypeData::Assoc { base, name: assoc } = self.types.lookup(ty) {
            for b in env.bounds_of(base) {
                if let TypeData::Named { decl, .. } = self.types.lookup(b) {
                    if let Some((_, def)) = registry.find_assoc(decl, assoc) {
                        bounds.extend(def.bounds.iter().copied());
                    }
                }
            }
        }
        bounds.into_iter().find_map(|b| {
            let TypeData::Named { decl, .. } = self.types.lookup(b) else {
                return None;
            };
            registry
                .find_requirement(decl, name)
                .map(|(_, requirement)| (b, requirement))
        })
    }

    /// The member implementing `requirement` for the concrete type `ty`.
    pub fn witness(&self, ty: TypeId, requirement: DeclId) -> Option<(DeclId, BindingSet)> {
        let env = Assumptions::new();
        let req = self.table.get(requirement);
        let arity = req.callable().map(|c| c.params.len());
        self.find_members(&env, ty, req.name)
            .into_iter()
            .find(|(m, _)| self.table.get(*m).callable().map(|c| c.params.len()) == arity)
    }
}

impl Projector for Solver<'_> {
    fn project(&self, base: TypeId, name: Name) -> Option<TypeId> {
        self.project_assoc(&Assumptions::new(), base, name)
    }
}
