//! Substitution of bindings into types.
//!
//! Substitution is where packs are expanded: a type list containing
//! `expand pattern` is spliced with one entry per element of the packs
//! the pattern mentions. Inside a generic body a pack may itself be bound
//! to `expand` elements of the caller's packs; those stay symbolic.

use smallvec::SmallVec;
use umbra_ir::Name;
use umbra_types::{ArrayLen, GenericArg, ParamRef, TypeData, TypeId, TypeInterner, ValueArg};

use crate::binding::{BindingSet, Bound};
use crate::error::GenericErrorKind;
use crate::pack::packs_in;
use crate::stack::ensure_sufficient_stack;

/// Resolves associated type projections on concrete types.
pub trait Projector {
    fn project(&self, base: TypeId, name: Name) -> Option<TypeId>;
}

pub struct Subst<'a> {
    types: &'a TypeInterner,
    binding: &'a BindingSet,
    this: Option<TypeId>,
    /// Current element of packs being expanded.
    elems: SmallVec<[(ParamRef, TypeId); 2]>,
    projector: Option<&'a dyn Projector>,
}

impl<'a> Subst<'a> {
    pub fn new(types: &'a TypeInterner, binding: &'a BindingSet) -> Self {
        Subst {
            types,
            binding,
            this: None,
            elems: SmallVec::new(),
            projector: None,
        }
    }

    #[must_use]
    pub fn with_this(mut self, this: Option<TypeId>) -> Self {
        self.this = this;
        self
    }

    #[must_use]
    pub fn with_projector(mut self, projector: &'a dyn Projector) -> Self {
        self.projector = Some(projector);
        self
    }

    /// Fix the current element of some packs, as inside one copy of an
    /// expanded expression.
    #[must_use]
    pub fn with_elements(mut self, elems: impl IntoIterator<Item = (ParamRef, TypeId)>) -> Self {
        for (p, ty) in elems {
            self.elems.retain(|(q, _)| *q != p);
            self.elems.push((p, ty));
        }
        self
    }

    pub(crate) fn fork(&self) -> Subst<'a> {
        Subst {
            types: self.types,
            binding: self.binding,
            this: self.this,
            elems: self.elems.clone(),
            projector: self.projector,
        }
    }

    fn element(&self, p: ParamRef) -> Option<TypeId> {
        self.elems.iter().find(|(q, _)| *q == p).map(|(_, ty)| *ty)
    }

    pub fn value(&self, value: ValueArg) -> ValueArg {
        match value {
            ValueArg::Param(p) => self.binding.value_of(p).unwrap_or(value),
            _ => value,
        }
    }

    /// Substitute into one type.
    ///
    /// A standalone `expand` is substituted structurally; use
    /// [`list`](Self::list) where it should be spliced.
    pub fn ty(&self, ty: TypeId) -> Result<TypeId, GenericErrorKind> {
        if !self.types.flags(ty).needs_subst() {
            return Ok(ty);
        }
        ensure_sufficient_stack(|| self.ty_inner(ty))
    }

    fn ty_inner(&self, ty: TypeId) -> Result<TypeId, GenericErrorKind> {
        let types = self.types;
        Ok(match types.lookup(ty) {
            TypeData::Param(p) => self.binding.type_of(p).unwrap_or(ty),
            TypeData::Pack(p) => self.element(p).unwrap_or(ty),
            TypeData::This => self.this.unwrap_or(ty),
            TypeData::Vector { elem, count } => types.vector(self.ty(elem)?, self.value(count)),
            TypeData::Array { elem, len } => {
                let len = match len {
                    ArrayLen::Sized(v) => ArrayLen::Sized(self.value(v)),
                    ArrayLen::Unsized => ArrayLen::Unsized,
                };
                types.array(self.ty(elem)?, len)
            }
            TypeData::Tuple(elems) => types.tuple(self.list(&elems)?),
            TypeData::Named { decl, args } => types.named(decl, self.args(&args)?),
            TypeData::Expand(pattern) => types.expand(self.ty(pattern)?),
            TypeData::Assoc { base, name } => {
                let base = self.ty(base)?;
                let projected = match self.projector {
                    Some(projector) if types.is_concrete(base) => projector.project(base, name),
                    _ => None,
                };
                projected.unwrap_or_else(|| types.assoc(base, name))
            }
            TypeData::Void | TypeData::Scalar(_) | TypeData::Error => ty,
        })
    }

    /// Substitute into a type list, splicing `expand` entries.
    pub fn list(&self, elems: &[TypeId]) -> Result<Vec<TypeId>, GenericErrorKind> {
        let mut out = Vec::with_capacity(elems.len());
        for &elem in elems {
            match self.types.lookup(elem) {
                TypeData::Expand(pattern) => out.extend(self.expand(pattern)?),
                _ => out.push(self.ty(elem)?),
            }
        }
        Ok(out)
    }

    /// Substitute into a flattened generic argument list.
    pub fn args(&self, args: &[GenericArg]) -> Result<Vec<GenericArg>, GenericErrorKind> {
        let mut out = Vec::with_capacity(args.len());
        for &arg in args {
            match arg {
                GenericArg::Type(ty) => match self.types.lookup(ty) {
                    TypeData::Expand(pattern) => {
                        out.extend(self.expand(pattern)?.into_iter().map(GenericArg::Type));
                    }
                    _ => out.push(GenericArg::Type(self.ty(ty)?)),
                },
                GenericArg::Value(v) => out.push(GenericArg::Value(self.value(v))),
            }
        }
        Ok(out)
    }

    /// Elements of `expand pattern` under this substitution.
    ///
    /// Stays a single symbolic `expand` while any pack in the pattern is
    /// unbound. Packs expanded together must have equal lengths.
    pub fn expand(&self, pattern: TypeId) -> Result<Vec<TypeId>, GenericErrorKind> {
        let packs: SmallVec<[ParamRef; 2]> = packs_in(self.types, pattern)
            .into_iter()
            .filter(|&p| self.element(p).is_none())
            .collect();
        let mut lists: SmallVec<[(ParamRef, &[TypeId]); 2]> = SmallVec::new();
        for &p in &packs {
            match self.binding.pack_of(p) {
                Some(list) => lists.push((p, list)),
                None => return Ok(vec![self.types.expand(self.ty(pattern)?)]),
            }
        }
        let Some(&(_, first)) = lists.first() else {
            return Ok(vec![self.types.expand(self.ty(pattern)?)]);
        };
        let len = first.len();
        let mismatch = || GenericErrorKind::ArityMismatch {
            lengths: lists.iter().map(|&(p, l)| (p, l.len())).collect(),
        };
        if lists.iter().any(|(_, l)| l.len() != len) {
            return Err(mismatch());
        }

        let mut out = Vec::with_capacity(len);
        for k in 0..len {
            let column: SmallVec<[(ParamRef, TypeId); 2]> =
                lists.iter().map(|&(p, l)| (p, l[k])).collect();
            let symbolic: SmallVec<[Option<TypeId>; 2]> = column
                .iter()
                .map(|&(_, e)| match self.types.lookup(e) {
                    TypeData::Expand(inner) => Some(inner),
                    _ => None,
                })
                .collect();
            if symbolic.iter().all(Option::is_some) {
                let sub = self
                    .fork()
                    .with_elements(column.iter().zip(&symbolic).filter_map(|(&(p, _), s)| {
                        s.map(|inner| (p, inner))
                    }));
                out.push(self.types.expand(sub.ty(pattern)?));
            } else if symbolic.iter().all(Option::is_none) {
                out.push(self.fork().with_elements(column).ty(pattern)?);
            } else {
                return Err(mismatch());
            }
        }
        Ok(out)
    }

    /// Substitute into every entry of another binding.
    pub fn binding(&self, binding: &BindingSet) -> Result<BindingSet, GenericErrorKind> {
        let mut out = BindingSet::new();
        for (p, bound) in binding.entries() {
            let bound = match bound {
                Bound::Type(ty) => Bound::Type(self.ty(*ty)?),
                Bound::Value(v) => Bound::Value(self.value(*v)),
                Bound::Pack(elems) => Bound::Pack(self.list(elems)?.into_iter().collect()),
            };
            out.bind(p, bound);
        }
        Ok(out)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;
    use umbra_types::DeclId;

    use super::*;

    fn p(index: u32) -> ParamRef {
        ParamRef::new(DeclId::new(7), index)
    }

    #[test]
    fn params_and_values_are_replaced() {
        let types = TypeInterner::new();
        let mut b = BindingSet::new();
        b.bind(p(0), Bound::Type(TypeId::FLOAT));
        b.bind(p(1), Bound::Value(ValueArg::Int(3)));
        let v = types.vector(types.param(p(0)), ValueArg::Param(p(1)));
        let out = Subst::new(&types, &b).ty(v).unwrap();
        assert_eq!(out, types.vector(TypeId::FLOAT, ValueArg::Int(3)));
    }

    #[test]
    fn unbound_params_survive() {
        let types = TypeInterner::new();
        let b = BindingSet::new();
        let t = types.param(p(0));
        assert_eq!(Subst::new(&types, &b).ty(t).unwrap(), t);
    }

    #[test]
    fn expand_splices_elements() {
        let types = TypeInterner::new();
        let mut b = BindingSet::new();
        b.bind(p(0), Bound::Pack(smallvec![TypeId::INT, TypeId::FLOAT]));
        let pattern = types.vector(types.pack(p(0)), ValueArg::Int(2));
        let tuple = types.tuple(vec![TypeId::BOOL, types.expand(pattern)]);
        let out = Subst::new(&types, &b).ty(tuple).unwrap();
        assert_eq!(
            out,
            types.tuple(vec![
                TypeId::BOOL,
                types.vector(TypeId::INT, ValueArg::Int(2)),
                types.vector(TypeId::FLOAT, ValueArg::Int(2)),
            ])
        );
    }

    #[test]
    fn empty_pack_expands_to_nothing() {
        let types = TypeInterner::new();
        let mut b = BindingSet::new();
        b.bind(p(0), Bound::Pack(SmallVec::new()));
        let list = [types.expand(types.pack(p(0)))];
        assert_eq!(Subst::new(&types, &b).list(&list).unwrap(), Vec::<TypeId>::new());
    }

    #[test]
    fn packs_expanded_together_must_agree() {
        let types = TypeInterner::new();
        let mut b = BindingSet::new();
        b.bind(p(0), Bound::Pack(smallvec![TypeId::INT, TypeId::FLOAT]));
        b.bind(p(1), Bound::Pack(smallvec![TypeId::INT]));
        let pattern = types.tuple(vec![types.pack(p(0)), types.pack(p(1))]);
        let err = Subst::new(&types, &b).expand(pattern).unwrap_err();
        assert_eq!(
            err,
            GenericErrorKind::ArityMismatch {
                lengths: vec![(p(0), 2), (p(1), 1)]
            }
        );
    }

    #[test]
    fn symbolic_elements_stay_expanded() {
        let types = TypeInterner::new();
        let caller = ParamRef::new(DeclId::new(1), 0);
        let mut b = BindingSet::new();
        b.bind(
            p(0),
            Bound::Pack(smallvec![TypeId::BOOL, types.expand(types.pack(caller))]),
        );
        let out = Subst::new(&types, &b)
            .list(&[types.expand(types.pack(p(0)))])
            .unwrap();
        assert_eq!(out, vec![TypeId::BOOL, types.expand(types.pack(caller))]);
    }
}
