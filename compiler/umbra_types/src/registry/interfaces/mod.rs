//! Registry for interfaces and conformances.
//!
//! # Design
//!
//! - Interfaces indexed by declaration identity
//! - Conformances indexed by the head constructor of their subject type, so
//!   a query for `Wrapper<int>` only looks at conformances written for
//!   `Wrapper<...>` plus the blanket ones written for a bare parameter
//! - Secondary index by interface for witness lookup

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use umbra_ir::{Name, Span};

use crate::{DeclId, ScalarKind, TypeData, TypeId, TypeInterner};

/// Registry for interfaces and the types that conform to them.
#[derive(Clone, Debug, Default)]
pub struct InterfaceRegistry {
    interfaces: Vec<InterfaceEntry>,
    by_decl: FxHashMap<DeclId, usize>,
    conformances: Vec<ConformanceEntry>,
    by_head: FxHashMap<ConformanceHead, Vec<usize>>,
    by_interface: FxHashMap<DeclId, Vec<usize>>,
    builtins: Option<BuiltinInterfaces>,
}

/// A registered interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceEntry {
    pub decl: DeclId,
    pub name: Name,
    /// Direct super-interfaces.
    pub supers: Vec<DeclId>,
    pub assoc_types: Vec<AssocTypeDef>,
    /// Requirement name to requirement declaration.
    pub requirements: FxHashMap<Name, DeclId>,
    pub span: Span,
}

/// `associatedtype Name : Bounds` inside an interface.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssocTypeDef {
    pub name: Name,
    /// Interface types every witness must conform to.
    pub bounds: Vec<TypeId>,
    pub span: Span,
}

/// A declared conformance: `subject : interface`.
///
/// `subject` may mention the parameters of `params_of` (the generic struct
/// or extension that wrote it); a query matches it against a concrete type
/// to recover those parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConformanceEntry {
    pub subject: TypeId,
    /// Interface type, `Named { decl: interface, .. }`.
    pub interface: TypeId,
    pub interface_decl: DeclId,
    /// Declaration whose generic parameters appear in `subject`.
    pub params_of: Option<DeclId>,
    /// Struct or extension that declared it.
    pub source: DeclId,
    /// Associated type witnesses.
    pub assoc: FxHashMap<Name, TypeId>,
    /// Members an extension contributes alongside the conformance.
    pub members: Vec<DeclId>,
    pub span: Span,
}

/// Head constructor used to index conformances.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ConformanceHead {
    Scalar(ScalarKind),
    Vector,
    Array,
    Tuple,
    Decl(DeclId),
    /// Blanket conformance on a bare type parameter.
    Any,
}

impl ConformanceHead {
    /// Head of `ty`, or `None` for types nothing can be written against.
    pub fn of(interner: &TypeInterner, ty: TypeId) -> Option<ConformanceHead> {
        match interner.lookup(ty) {
            TypeData::Scalar(kind) => Some(ConformanceHead::Scalar(kind)),
            TypeData::Vector { .. } => Some(ConformanceHead::Vector),
            TypeData::Array { .. } => Some(ConformanceHead::Array),
            TypeData::Tuple(_) => Some(ConformanceHead::Tuple),
            TypeData::Named { decl, .. } => Some(ConformanceHead::Decl(decl)),
            TypeData::Param(_) | TypeData::Pack(_) => Some(ConformanceHead::Any),
            TypeData::Void
            | TypeData::Error
            | TypeData::This
            | TypeData::Expand(_)
            | TypeData::Assoc { .. } => None,
        }
    }
}

/// Declarations of the built-in interface hierarchy.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BuiltinInterfaces {
    pub comparable: DeclId,
    pub arithmetic: DeclId,
    pub integer: DeclId,
    pub float: DeclId,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // === Registration ===

    pub fn register_interface(&mut self, entry: InterfaceEntry) {
        let idx = self.interfaces.len();
        self.by_decl.insert(entry.decl, idx);
        self.interfaces.push(entry);
    }

    /// Register a conformance, indexed under `head`.
    pub fn register_conformance(
        &mut self,
        head: ConformanceHead,
        entry: ConformanceEntry,
    ) -> usize {
        let idx = self.conformances.len();
        tracing::trace!(?head, interface = ?entry.interface_decl, source = ?entry.source, "conformance registered");
        self.by_head.entry(head).or_default().push(idx);
        self.by_interface
            .entry(entry.interface_decl)
            .or_default()
            .push(idx);
        self.conformances.push(entry);
        idx
    }

    pub fn set_builtins(&mut self, builtins: BuiltinInterfaces) {
        self.builtins = Some(builtins);
    }

    // === Interface Lookup ===

    #[inline]
    pub fn get(&self, decl: DeclId) -> Option<&InterfaceEntry> {
        self.by_decl.get(&decl).and_then(|&i| self.interfaces.get(i))
    }

    #[inline]
    pub fn is_interface(&self, decl: DeclId) -> bool {
        self.by_decl.contains_key(&decl)
    }

    #[inline]
    pub fn builtins(&self) -> Option<BuiltinInterfaces> {
        self.builtins
    }

    /// All super-interfaces transitively, breadth-first and de-duplicated.
    ///
    /// Unknown interfaces contribute nothing, so registration order does
    /// not matter.
    pub fn all_super_interfaces(&self, decl: DeclId) -> Vec<DeclId> {
        let mut visited = FxHashSet::default();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();
        visited.insert(decl);

        if let Some(entry) = self.get(decl) {
            for &s in &entry.supers {
                if visited.insert(s) {
                    queue.push_back(s);
                }
            }
        }

        while let Some(idx) = queue.pop_front() {
            result.push(idx);
            if let Some(entry) = self.get(idx) {
                for &s in &entry.supers {
                    if visited.insert(s) {
                        queue.push_back(s);
                    }
                }
            }
        }

        result
    }

    /// Whether conforming to `iface` also means conforming to `target`.
    pub fn implies(&self, iface: DeclId, target: DeclId) -> bool {
        iface == target || self.all_super_interfaces(iface).contains(&target)
    }

    /// Find an associated type declared by `iface` or one of its supers.
    pub fn find_assoc(&self, iface: DeclId, name: Name) -> Option<(DeclId, &AssocTypeDef)> {
        std::iter::once(iface)
            .chain(self.all_super_interfaces(iface))
            .find_map(|decl| {
                self.get(decl)?
                    .assoc_types
                    .iter()
                    .find(|a| a.name == name)
                    .map(|a| (decl, a))
            })
    }

    /// Find a requirement declared by `iface` or one of its supers.
    pub fn find_requirement(&self, iface: DeclId, name: Name) -> Option<(DeclId, DeclId)> {
        std::iter::once(iface)
            .chain(self.all_super_interfaces(iface))
            .find_map(|decl| {
                self.get(decl)?
                    .requirements
                    .get(&name)
                    .map(|&req| (decl, req))
            })
    }

    // === Conformance Lookup ===

    #[inline]
    pub fn conformance(&self, idx: usize) -> Option<&ConformanceEntry> {
        self.conformances.get(idx)
    }

    /// Conformances that might apply to a type with this head: those
    /// written for the head itself, then blanket ones.
    pub fn candidates(
        &self,
        head: ConformanceHead,
    ) -> impl Iterator<Item = (usize, &ConformanceEntry)> {
        let exact = self.by_head.get(&head).into_iter().flatten();
        let blanket = if head == ConformanceHead::Any {
            None
        } else {
            self.by_head.get(&ConformanceHead::Any)
        };
        exact
            .chain(blanket.into_iter().flatten())
            .filter_map(|&i| self.conformances.get(i).map(|c| (i, c)))
    }

    /// Conformances to a specific interface.
    pub fn conformances_to(&self, iface: DeclId) -> impl Iterator<Item = &ConformanceEntry> {
        self.by_interface
            .get(&iface)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.conformances.get(i))
    }

    /// Built-in conformance rules:
    /// - numeric scalars: `IArithmetic`, `IComparable`
    /// - integer scalars: `IInteger`; floating scalars: `IFloat`
    /// - `bool`: `IComparable`
    /// - numeric vectors: `IArithmetic`
    pub fn builtin_conforms(&self, interner: &TypeInterner, ty: TypeId, iface: DeclId) -> bool {
        let Some(b) = self.builtins else {
            return false;
        };
        let direct = match interner.lookup(ty) {
            TypeData::Scalar(ScalarKind::Bool) => Some(b.comparable),
            TypeData::Scalar(kind) if kind.is_integer() => Some(b.integer),
            TypeData::Scalar(kind) if kind.is_float() => Some(b.float),
            TypeData::Vector { elem, .. } => match interner.lookup(elem) {
                TypeData::Scalar(kind) if kind.is_numeric() => Some(b.arithmetic),
                _ => None,
            },
            _ => None,
        };
        direct.is_some_and(|d| self.implies(d, iface))
    }
}

#[cfg(test)]
mod tests;
