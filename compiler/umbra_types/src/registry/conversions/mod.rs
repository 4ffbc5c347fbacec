//! The coercion relation.
//!
//! Built-in rules:
//! - numeric scalars convert to each other explicitly, and implicitly when
//!   the promotion rank does not decrease
//! - `bool` and numeric scalars convert to each other explicitly only
//! - vectors of equal length convert element-wise
//!
//! Further conversions (user constructors) are registered per type pair.

use rustc_hash::FxHashMap;

use crate::{ScalarKind, TypeData, TypeId, TypeInterner};

/// How a conversion may be applied.
///
/// Ordered from least to most restrictive, so the kind of a compound
/// conversion is the `max` of its parts.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub enum ConversionKind {
    Identity,
    Implicit,
    Explicit,
}

#[derive(Clone, Debug, Default)]
pub struct ConversionRegistry {
    user: FxHashMap<(TypeId, TypeId), ConversionKind>,
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user conversion `from -> to`.
    pub fn register(&mut self, from: TypeId, to: TypeId, implicit: bool) {
        let kind = if implicit {
            ConversionKind::Implicit
        } else {
            ConversionKind::Explicit
        };
        self.user
            .entry((from, to))
            .and_modify(|k| *k = (*k).min(kind))
            .or_insert(kind);
    }

    /// Classify the conversion from `from` to `to`, if any.
    ///
    /// The error type converts both ways so that one failure does not
    /// cascade into conversion errors.
    pub fn conversion(
        &self,
        interner: &TypeInterner,
        from: TypeId,
        to: TypeId,
    ) -> Option<ConversionKind> {
        if from == to || from.is_error() || to.is_error() {
            return Some(ConversionKind::Identity);
        }
        if let Some(&kind) = self.user.get(&(from, to)) {
            return Some(kind);
        }
        match (interner.lookup(from), interner.lookup(to)) {
            (TypeData::Scalar(a), TypeData::Scalar(b)) => Some(Self::scalar(a, b)),
            (
                TypeData::Vector {
                    elem: ea,
                    count: ca,
                },
                TypeData::Vector {
                    elem: eb,
                    count: cb,
                },
            ) if ca == cb => {
                self.conversion(interner, ea, eb)
            }
            _ => None,
        }
    }

    fn scalar(from: ScalarKind, to: ScalarKind) -> ConversionKind {
        if from == to {
            return ConversionKind::Identity;
        }
        match (from.promotion_rank(), to.promotion_rank()) {
            (Some(a), Some(b)) if b >= a => ConversionKind::Implicit,
            _ => ConversionKind::Explicit,
        }
    }

    /// Whether `from` may be used where `to` is expected without a cast.
    pub fn is_implicit(&self, interner: &TypeInterner, from: TypeId, to: TypeId) -> bool {
        matches!(
            self.conversion(interner, from, to),
            Some(ConversionKind::Identity | ConversionKind::Implicit)
        )
    }

    /// Whether `to(from_value)` is a legal conversion.
    pub fn is_explicit(&self, interner: &TypeInterner, from: TypeId, to: TypeId) -> bool {
        self.conversion(interner, from, to).is_some()
    }
}

#[cfg(test)]
mod tests;
