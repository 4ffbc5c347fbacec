//! Sharded type interner.
//!
//! O(1) type equality via `TypeId`, following the same sharding scheme as
//! `StringInterner` in `umbra_ir`. Each entry carries its [`TypeFlags`],
//! computed once at interning time.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use umbra_ir::Name;

use crate::{
    ArrayLen, DeclId, GenericArg, ParamRef, ScalarKind, TypeData, TypeFlags, TypeId, ValueArg,
};

/// Error when interning a type fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeInternError {
    /// Shard exceeded its 28-bit local index space.
    ShardOverflow { shard_idx: usize },
}

impl std::fmt::Display for TypeInternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeInternError::ShardOverflow { shard_idx } => {
                write!(f, "type interner shard {shard_idx} exceeded capacity")
            }
        }
    }
}

impl std::error::Error for TypeInternError {}

struct TypeShard {
    map: FxHashMap<TypeData, u32>,
    types: Vec<(TypeData, TypeFlags)>,
}

impl TypeShard {
    fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            types: Vec::with_capacity(256),
        }
    }

    /// Shard 0 with primitives at the indices matching the `TypeId` constants.
    fn with_primitives() -> Self {
        let mut shard = Self::new();
        let mut push = |data: TypeData, flags: TypeFlags| {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "primitive count is fixed and small"
            )]
            let local = shard.types.len() as u32;
            shard.map.insert(data.clone(), local);
            shard.types.push((data, flags));
        };

        push(TypeData::Void, TypeFlags::empty());
        for kind in ScalarKind::ALL {
            push(TypeData::Scalar(kind), TypeFlags::empty());
        }
        push(TypeData::Error, TypeFlags::HAS_ERROR);
        push(TypeData::This, TypeFlags::HAS_THIS);
        shard
    }
}

const NUM_SHARDS: usize = 16;

/// Sharded type interner for concurrent access.
///
/// Interning and lookup take `&self`, so specialization threads share one
/// interner through [`SharedTypeInterner`].
pub struct TypeInterner {
    shards: [RwLock<TypeShard>; NUM_SHARDS],
}

impl TypeInterner {
    pub fn new() -> Self {
        let shards = std::array::from_fn(|i| {
            if i == 0 {
                RwLock::new(TypeShard::with_primitives())
            } else {
                RwLock::new(TypeShard::new())
            }
        });
        Self { shards }
    }

    #[inline]
    fn shard_for(data: &TypeData) -> usize {
        let mut hasher = rustc_hash::FxHasher::default();
        data.hash(&mut hasher);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "truncation is fine for hash-based shard selection"
        )]
        let hash_usize = hasher.finish() as usize;
        hash_usize % NUM_SHARDS
    }

    fn value_flags(value: ValueArg) -> TypeFlags {
        match value {
            ValueArg::Param(_) => TypeFlags::HAS_VALUE_PARAM,
            _ => TypeFlags::empty(),
        }
    }

    fn compute_flags(&self, data: &TypeData) -> TypeFlags {
        match data {
            TypeData::Void | TypeData::Scalar(_) => TypeFlags::empty(),
            TypeData::Error => TypeFlags::HAS_ERROR,
            TypeData::This => TypeFlags::HAS_THIS,
            TypeData::Param(_) => TypeFlags::HAS_PARAM,
            TypeData::Pack(_) => TypeFlags::HAS_PACK,
            TypeData::Vector { elem, count } => self.flags(*elem) | Self::value_flags(*count),
            TypeData::Array { elem, len } => {
                let len_flags = match len {
                    ArrayLen::Unsized => TypeFlags::empty(),
                    ArrayLen::Sized(v) => Self::value_flags(*v),
                };
                self.flags(*elem) | len_flags
            }
            TypeData::Tuple(elems) => elems
                .iter()
                .fold(TypeFlags::empty(), |acc, &t| acc | self.flags(t)),
            TypeData::Named { args, .. } => {
                args.iter().fold(TypeFlags::empty(), |acc, arg| match arg {
                    GenericArg::Type(t) => acc | self.flags(*t),
                    GenericArg::Value(v) => acc | Self::value_flags(*v),
                })
            }
            TypeData::Expand(pattern) => self.flags(*pattern) | TypeFlags::HAS_EXPAND,
            TypeData::Assoc { base, .. } => self.flags(*base) | TypeFlags::HAS_ASSOC,
        }
    }

    /// Try to intern a type, returning an error on shard overflow.
    ///
    /// Primitives always map to their fixed `TypeId` constants.
    pub fn try_intern(&self, data: TypeData) -> Result<TypeId, TypeInternError> {
        match &data {
            TypeData::Void => return Ok(TypeId::VOID),
            TypeData::Scalar(kind) => return Ok(kind.type_id()),
            TypeData::Error => return Ok(TypeId::ERROR),
            TypeData::This => return Ok(TypeId::THIS),
            _ => {}
        }

        let shard_idx = Self::shard_for(&data);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "shard_idx is bounded by NUM_SHARDS (16)"
        )]
        let shard_u32 = shard_idx as u32;
        let shard = &self.shards[shard_idx];

        {
            let guard = shard.read();
            if let Some(&local) = guard.map.get(&data) {
                return Ok(TypeId::from_shard_local(shard_u32, local));
            }
        }

        // Children live in other shards; read their flags before locking ours.
        let flags = self.compute_flags(&data);

        let mut guard = shard.write();
        if let Some(&local) = guard.map.get(&data) {
            return Ok(TypeId::from_shard_local(shard_u32, local));
        }

        let local = u32::try_from(guard.types.len())
            .ok()
            .filter(|&l| l <= TypeId::MAX_LOCAL)
            .ok_or(TypeInternError::ShardOverflow { shard_idx })?;
        guard.types.push((data.clone(), flags));
        guard.map.insert(data, local);

        Ok(TypeId::from_shard_local(shard_u32, local))
    }

    /// Intern a type.
    ///
    /// # Panics
    /// Panics if a shard overflows. Use [`try_intern`](Self::try_intern) to
    /// handle that case.
    pub fn intern(&self, data: TypeData) -> TypeId {
        self.try_intern(data).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Look up the data for a `TypeId`; ids from another interner read as
    /// `Error`.
    pub fn lookup(&self, id: TypeId) -> TypeData {
        let guard = self.shards[id.shard()].read();
        guard
            .types
            .get(id.local())
            .map_or(TypeData::Error, |(data, _)| data.clone())
    }

    pub fn flags(&self, id: TypeId) -> TypeFlags {
        let guard = self.shards[id.shard()].read();
        guard
            .types
            .get(id.local())
            .map_or(TypeFlags::HAS_ERROR, |(_, flags)| *flags)
    }

    #[inline]
    pub fn is_concrete(&self, id: TypeId) -> bool {
        self.flags(id).is_concrete()
    }

    // Convenience constructors. All go through `intern`, so equal inputs
    // yield equal ids.

    pub fn scalar(&self, kind: ScalarKind) -> TypeId {
        kind.type_id()
    }

    pub fn vector(&self, elem: TypeId, count: ValueArg) -> TypeId {
        self.intern(TypeData::Vector { elem, count })
    }

    pub fn array(&self, elem: TypeId, len: ArrayLen) -> TypeId {
        self.intern(TypeData::Array { elem, len })
    }

    pub fn sized_array(&self, elem: TypeId, len: i64) -> TypeId {
        self.array(elem, ArrayLen::Sized(ValueArg::Int(len)))
    }

    pub fn tuple(&self, elems: impl Into<Box<[TypeId]>>) -> TypeId {
        self.intern(TypeData::Tuple(elems.into()))
    }

    pub fn named(&self, decl: DeclId, args: impl Into<Box<[GenericArg]>>) -> TypeId {
        self.intern(TypeData::Named {
            decl,
            args: args.into(),
        })
    }

    pub fn param(&self, param: ParamRef) -> TypeId {
        self.intern(TypeData::Param(param))
    }

    pub fn pack(&self, param: ParamRef) -> TypeId {
        self.intern(TypeData::Pack(param))
    }

    pub fn expand(&self, pattern: TypeId) -> TypeId {
        self.intern(TypeData::Expand(pattern))
    }

    pub fn assoc(&self, base: TypeId, name: Name) -> TypeId {
        self.intern(TypeData::Assoc { base, name })
    }

    /// Number of interned types, primitives included.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().types.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference-counted type interner shared by the session and its
/// specialization workers.
#[derive(Clone)]
pub struct SharedTypeInterner(Arc<TypeInterner>);

impl SharedTypeInterner {
    pub fn new() -> Self {
        SharedTypeInterner(Arc::new(TypeInterner::new()))
    }
}

impl Default for SharedTypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for SharedTypeInterner {
    type Target = TypeInterner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests;
