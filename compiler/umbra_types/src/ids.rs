//! Compact handles for types and generic declarations.

use std::fmt;

use crate::ScalarKind;

/// Interned type handle.
///
/// Layout mirrors `Name`: the top 4 bits select a shard, the low 28 bits
/// index into it. Shard 0 starts with the primitives at the fixed ids below.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    const SHARD_BITS: u32 = 4;
    const LOCAL_BITS: u32 = 32 - Self::SHARD_BITS;
    const LOCAL_MASK: u32 = (1 << Self::LOCAL_BITS) - 1;

    pub const MAX_LOCAL: u32 = Self::LOCAL_MASK;

    pub const VOID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const INT8: TypeId = TypeId(2);
    pub const UINT8: TypeId = TypeId(3);
    pub const INT16: TypeId = TypeId(4);
    pub const UINT16: TypeId = TypeId(5);
    pub const INT: TypeId = TypeId(6);
    pub const UINT: TypeId = TypeId(7);
    pub const INT64: TypeId = TypeId(8);
    pub const UINT64: TypeId = TypeId(9);
    pub const FLOAT: TypeId = TypeId(10);
    pub const DOUBLE: TypeId = TypeId(11);
    pub const ERROR: TypeId = TypeId(12);
    /// `This` inside an interface declaration.
    pub const THIS: TypeId = TypeId(13);

    /// Number of pre-interned ids in shard 0.
    pub const PRIMITIVE_COUNT: u32 = 14;

    #[inline]
    pub const fn from_shard_local(shard: u32, local: u32) -> Self {
        TypeId((shard << Self::LOCAL_BITS) | (local & Self::LOCAL_MASK))
    }

    #[inline]
    pub const fn shard(self) -> usize {
        (self.0 >> Self::LOCAL_BITS) as usize
    }

    #[inline]
    pub const fn local(self) -> usize {
        (self.0 & Self::LOCAL_MASK) as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        TypeId(raw)
    }

    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::PRIMITIVE_COUNT
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0
    }

    /// Scalar kind for the pre-interned scalar ids.
    #[inline]
    pub fn as_scalar(self) -> Option<ScalarKind> {
        ScalarKind::from_type_id(self)
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TypeId::VOID => write!(f, "TypeId(void)"),
            TypeId::ERROR => write!(f, "TypeId(<error>)"),
            TypeId::THIS => write!(f, "TypeId(This)"),
            _ => match self.as_scalar() {
                Some(kind) => write!(f, "TypeId({})", kind.name()),
                None => write!(f, "TypeId({}:{})", self.shard(), self.local()),
            },
        }
    }
}

/// Identity of a registered generic declaration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct DeclId(u32);

impl DeclId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        DeclId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A generic parameter: position `index` in the parameter list of `owner`.
///
/// Members of generic structs see their owner's parameters through refs
/// whose `owner` is the enclosing declaration.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub struct ParamRef {
    pub owner: DeclId,
    pub index: u32,
}

impl ParamRef {
    #[inline]
    pub const fn new(owner: DeclId, index: u32) -> Self {
        ParamRef { owner, index }
    }
}
