//! Type pack helpers.
//!
//! A pack group is the set of packs one `expand` mentions; after binding,
//! every pack in a group must have the same length. Groups are collected
//! from signatures at registration and from bodies during checking, and
//! re-checked whenever a binding becomes concrete.

use smallvec::SmallVec;
use umbra_ir::Span;
use umbra_types::{
    ArrayLen, GenericArg, ParamRef, TypeData, TypeFlags, TypeId, TypeInterner, ValueArg,
};

use crate::binding::BindingSet;
use crate::error::{GenericError, GenericErrorKind};

/// Packs expanded together by one `expand`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackGroup {
    pub packs: SmallVec<[ParamRef; 2]>,
    pub span: Span,
}

impl PackGroup {
    /// Group of `expand pattern`, or `None` if it mentions fewer than two
    /// packs and so cannot disagree.
    pub fn of_pattern(types: &TypeInterner, pattern: TypeId, span: Span) -> Option<PackGroup> {
        let packs = packs_in(types, pattern);
        (packs.len() > 1).then_some(PackGroup { packs, span })
    }

    /// Lengths must agree wherever every pack in the group is bound to a
    /// concrete element list.
    pub fn check(&self, binding: &BindingSet) -> Result<(), GenericError> {
        let mut lengths: Vec<(ParamRef, usize)> = Vec::with_capacity(self.packs.len());
        for &p in &self.packs {
            match binding.pack_of(p) {
                Some(elems) => lengths.push((p, elems.len())),
                None => return Ok(()),
            }
        }
        match lengths.first() {
            Some(&(_, n)) if lengths.iter().any(|&(_, m)| m != n) => Err(GenericError::new(
                GenericErrorKind::ArityMismatch { lengths },
                self.span,
            )),
            _ => Ok(()),
        }
    }
}

/// Packs mentioned through `each` in `ty`, in order of first appearance.
pub fn packs_in(types: &TypeInterner, ty: TypeId) -> SmallVec<[ParamRef; 2]> {
    let mut out = SmallVec::new();
    collect(types, ty, &mut out);
    out
}

fn collect(types: &TypeInterner, ty: TypeId, out: &mut SmallVec<[ParamRef; 2]>) {
    if !types.flags(ty).contains(TypeFlags::HAS_PACK) {
        return;
    }
    match types.lookup(ty) {
        TypeData::Pack(p) => {
            if !out.contains(&p) {
                out.push(p);
            }
        }
        TypeData::Vector { elem, .. } | TypeData::Array { elem, .. } => collect(types, elem, out),
        TypeData::Tuple(elems) => {
            for &e in &*elems {
                collect(types, e, out);
            }
        }
        TypeData::Named { args, .. } => {
            for arg in &*args {
                if let GenericArg::Type(t) = *arg {
                    collect(types, t, out);
                }
            }
        }
        TypeData::Expand(inner) | TypeData::Assoc { base: inner, .. } => {
            collect(types, inner, out);
        }
        TypeData::Void
        | TypeData::Scalar(_)
        | TypeData::Error
        | TypeData::This
        | TypeData::Param(_) => {}
    }
}

/// Pack groups of every `expand` inside `ty`.
pub fn groups_in(types: &TypeInterner, ty: TypeId, span: Span) -> Vec<PackGroup> {
    let mut groups = Vec::new();
    expansions(types, ty, span, &mut groups);
    groups
}

fn expansions(types: &TypeInterner, ty: TypeId, span: Span, out: &mut Vec<PackGroup>) {
    if !types.flags(ty).contains(TypeFlags::HAS_EXPAND) {
        return;
    }
    match types.lookup(ty) {
        TypeData::Expand(pattern) => {
            out.extend(PackGroup::of_pattern(types, pattern, span));
            expansions(types, pattern, span, out);
        }
        TypeData::Vector { elem, .. } | TypeData::Array { elem, .. } => {
            expansions(types, elem, span, out);
        }
        TypeData::Tuple(elems) => {
            for &e in &*elems {
                expansions(types, e, span, out);
            }
        }
        TypeData::Named { args, .. } => {
            for arg in &*args {
                if let GenericArg::Type(t) = *arg {
                    expansions(types, t, span, out);
                }
            }
        }
        TypeData::Assoc { base, .. } => expansions(types, base, span, out),
        _ => {}
    }
}

/// Every generic parameter `ty` mentions, packs included.
pub fn params_in(types: &TypeInterner, ty: TypeId, out: &mut SmallVec<[ParamRef; 4]>) {
    if types.flags(ty).is_concrete() {
        return;
    }
    match types.lookup(ty) {
        TypeData::Param(p) | TypeData::Pack(p) => push_unique(out, p),
        TypeData::Vector { elem, count } => {
            if let ValueArg::Param(p) = count {
                push_unique(out, p);
            }
            params_in(types, elem, out);
        }
        TypeData::Array { elem, len } => {
            if let ArrayLen::Sized(ValueArg::Param(p)) = len {
                push_unique(out, p);
            }
            params_in(types, elem, out);
        }
        TypeData::Tuple(elems) => {
            for &e in &*elems {
                params_in(types, e, out);
            }
        }
        TypeData::Named { args, .. } => {
            for arg in &*args {
                match *arg {
                    GenericArg::Type(t) => params_in(types, t, out),
                    GenericArg::Value(ValueArg::Param(p)) => push_unique(out, p),
                    GenericArg::Value(_) => {}
                }
            }
        }
        TypeData::Expand(inner) | TypeData::Assoc { base: inner, .. } => {
            params_in(types, inner, out);
        }
        TypeData::Void | TypeData::Scalar(_) | TypeData::Error | TypeData::This => {}
    }
}

fn push_unique(out: &mut SmallVec<[ParamRef; 4]>, p: ParamRef) {
    if !out.contains(&p) {
        out.push(p);
    }
}
