//! Generic argument bindings.

use smallvec::SmallVec;
use umbra_types::{DeclId, GenericArg, ParamRef, TypeId, TypeInterner, ValueArg};

/// What one generic parameter is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Bound {
    Type(TypeId),
    Value(ValueArg),
    /// Pack elements in order. Inside a generic body an element may be an
    /// `Expand` of the caller's own pack, standing for a run of elements.
    Pack(SmallVec<[TypeId; 4]>),
}

impl Bound {
    pub fn is_concrete(&self, types: &TypeInterner) -> bool {
        match self {
            Bound::Type(ty) => types.is_concrete(*ty),
            Bound::Value(v) => v.is_concrete(),
            Bound::Pack(elems) => elems.iter().all(|&e| types.is_concrete(e)),
        }
    }
}

/// A complete or partial assignment of generic arguments.
///
/// Entries are ordered outermost declaration first, then by parameter
/// index, so two bindings of the same declaration compare and hash equal
/// exactly when they bind the same arguments. This is the canonical form
/// used as the instantiation cache key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BindingSet {
    entries: Vec<(ParamRef, Bound)>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `param`, replacing any previous binding.
    pub fn bind(&mut self, param: ParamRef, bound: Bound) {
        match self.entries.binary_search_by(|(p, _)| p.cmp(&param)) {
            Ok(i) => self.entries[i].1 = bound,
            Err(i) => self.entries.insert(i, (param, bound)),
        }
    }

    pub fn get(&self, param: ParamRef) -> Option<&Bound> {
        self.entries
            .binary_search_by(|(p, _)| p.cmp(&param))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn contains(&self, param: ParamRef) -> bool {
        self.get(param).is_some()
    }

    pub fn type_of(&self, param: ParamRef) -> Option<TypeId> {
        match self.get(param)? {
            Bound::Type(ty) => Some(*ty),
            _ => None,
        }
    }

    pub fn value_of(&self, param: ParamRef) -> Option<ValueArg> {
        match self.get(param)? {
            Bound::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn pack_of(&self, param: ParamRef) -> Option<&[TypeId]> {
        match self.get(param)? {
            Bound::Pack(elems) => Some(elems),
            _ => None,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (ParamRef, &Bound)> {
        self.entries.iter().map(|(p, b)| (*p, b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_concrete(&self, types: &TypeInterner) -> bool {
        self.entries.iter().all(|(_, b)| b.is_concrete(types))
    }

    /// Keep only the parameters owned by `owners`.
    #[must_use]
    pub fn restricted_to(&self, owners: &[DeclId]) -> BindingSet {
        BindingSet {
            entries: self
                .entries
                .iter()
                .filter(|(p, _)| owners.contains(&p.owner))
                .cloned()
                .collect(),
        }
    }

    /// Add every entry of `other` not already bound here.
    pub fn extend_from(&mut self, other: &BindingSet) {
        for (p, b) in &other.entries {
            if !self.contains(*p) {
                self.bind(*p, b.clone());
            }
        }
    }

    /// Flattened argument list for the parameters of `decl`, in the form
    /// stored in `TypeData::Named`: pack elements are spliced in place.
    pub fn args_for(&self, decl: DeclId) -> Vec<GenericArg> {
        let mut args = Vec::new();
        for (p, bound) in &self.entries {
            if p.owner != decl {
                continue;
            }
            match bound {
                Bound::Type(ty) => args.push(GenericArg::Type(*ty)),
                Bound::Value(v) => args.push(GenericArg::Value(*v)),
                Bound::Pack(elems) => args.extend(elems.iter().map(|&e| GenericArg::Type(e))),
            }
        }
        args
    }

    /// Every argument in binding order, flattened like [`args_for`](Self::args_for).
    pub fn all_args(&self) -> Vec<GenericArg> {
        let mut args = Vec::new();
        for (_, bound) in &self.entries {
            match bound {
                Bound::Type(ty) => args.push(GenericArg::Type(*ty)),
                Bound::Value(v) => args.push(GenericArg::Value(*v)),
                Bound::Pack(elems) => args.extend(elems.iter().map(|&e| GenericArg::Type(e))),
            }
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;

    use super::*;

    fn p(owner: u32, index: u32) -> ParamRef {
        ParamRef::new(DeclId::new(owner), index)
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut a = BindingSet::new();
        a.bind(p(2, 1), Bound::Value(ValueArg::Int(10)));
        a.bind(p(2, 0), Bound::Type(TypeId::FLOAT));
        a.bind(p(1, 0), Bound::Type(TypeId::INT));

        let mut b = BindingSet::new();
        b.bind(p(1, 0), Bound::Type(TypeId::INT));
        b.bind(p(2, 0), Bound::Type(TypeId::FLOAT));
        b.bind(p(2, 1), Bound::Value(ValueArg::Int(10)));

        assert_eq!(a, b);
        assert_eq!(
            a.entries().map(|(p, _)| p).collect::<Vec<_>>(),
            vec![p(1, 0), p(2, 0), p(2, 1)]
        );
    }

    #[test]
    fn args_for_flattens_packs() {
        let mut b = BindingSet::new();
        b.bind(p(1, 0), Bound::Type(TypeId::BOOL));
        b.bind(p(3, 0), Bound::Type(TypeId::DOUBLE));
        b.bind(p(3, 1), Bound::Pack(smallvec![TypeId::INT, TypeId::FLOAT]));
        assert_eq!(
            b.args_for(DeclId::new(3)),
            vec![
                GenericArg::Type(TypeId::DOUBLE),
                GenericArg::Type(TypeId::INT),
                GenericArg::Type(TypeId::FLOAT)
            ]
        );
        assert_eq!(b.all_args().len(), 4);
    }

    #[test]
    fn rebinding_replaces() {
        let mut b = BindingSet::new();
        b.bind(p(0, 0), Bound::Type(TypeId::INT));
        b.bind(p(0, 0), Bound::Type(TypeId::UINT));
        assert_eq!(b.len(), 1);
        assert_eq!(b.type_of(p(0, 0)), Some(TypeId::UINT));
        assert_eq!(b.value_of(p(0, 0)), None);
    }

    #[test]
    fn restriction_keeps_named_owners() {
        let mut b = BindingSet::new();
        b.bind(p(1, 0), Bound::Type(TypeId::INT));
        b.bind(p(2, 0), Bound::Type(TypeId::FLOAT));
        let outer = b.restricted_to(&[DeclId::new(1)]);
        assert_eq!(outer.len(), 1);
        assert!(outer.contains(p(1, 0)));
    }
}
