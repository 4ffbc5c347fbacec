//! Fundamental scalar types and their promotion order.

use crate::TypeId;

/// A fundamental scalar type.
///
/// Declaration order is the promotion order for numeric kinds: every
/// variant after `Bool` outranks the ones before it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub enum ScalarKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 11] = [
        ScalarKind::Bool,
        ScalarKind::Int8,
        ScalarKind::UInt8,
        ScalarKind::Int16,
        ScalarKind::UInt16,
        ScalarKind::Int32,
        ScalarKind::UInt32,
        ScalarKind::Int64,
        ScalarKind::UInt64,
        ScalarKind::Float,
        ScalarKind::Double,
    ];

    /// Rank used to resolve conflicting inferences; `None` for `bool`.
    #[inline]
    pub fn promotion_rank(self) -> Option<u8> {
        match self {
            ScalarKind::Bool => None,
            other => Some(other as u8 - 1),
        }
    }

    #[inline]
    pub fn is_numeric(self) -> bool {
        self != ScalarKind::Bool
    }

    #[inline]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarKind::Int8
                | ScalarKind::UInt8
                | ScalarKind::Int16
                | ScalarKind::UInt16
                | ScalarKind::Int32
                | ScalarKind::UInt32
                | ScalarKind::Int64
                | ScalarKind::UInt64
        )
    }

    #[inline]
    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::Float | ScalarKind::Double)
    }

    /// Value generic parameters may only be declared with these kinds.
    #[inline]
    pub fn is_valid_value_param(self) -> bool {
        !self.is_float()
    }

    /// The higher-ranked of two numeric kinds; `None` if either is `bool`.
    pub fn join(self, other: ScalarKind) -> Option<ScalarKind> {
        match (self.promotion_rank(), other.promotion_rank()) {
            (Some(a), Some(b)) => Some(if a >= b { self } else { other }),
            _ if self == other => Some(self),
            _ => None,
        }
    }

    #[inline]
    pub const fn type_id(self) -> TypeId {
        TypeId::from_raw(self as u32 + 1)
    }

    pub fn from_type_id(id: TypeId) -> Option<ScalarKind> {
        let raw = id.raw();
        if (1..=11).contains(&raw) {
            Self::ALL.get(raw as usize - 1).copied()
        } else {
            None
        }
    }

    /// Source spelling.
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int8 => "int8_t",
            ScalarKind::UInt8 => "uint8_t",
            ScalarKind::Int16 => "int16_t",
            ScalarKind::UInt16 => "uint16_t",
            ScalarKind::Int32 => "int",
            ScalarKind::UInt32 => "uint",
            ScalarKind::Int64 => "int64_t",
            ScalarKind::UInt64 => "uint64_t",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Option<ScalarKind> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}
