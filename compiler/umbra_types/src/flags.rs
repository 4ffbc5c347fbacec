//! Pre-computed type metadata flags.
//!
//! Computed once when a type is interned so that substitution and
//! concreteness checks can skip types that contain nothing to replace.

use bitflags::bitflags;

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct TypeFlags: u16 {
        /// Contains a type parameter.
        const HAS_PARAM = 1 << 0;
        /// Contains a value parameter (vector count, array length, argument).
        const HAS_VALUE_PARAM = 1 << 1;
        /// Contains `each T`.
        const HAS_PACK = 1 << 2;
        /// Contains `expand`.
        const HAS_EXPAND = 1 << 3;
        /// Contains an associated type projection.
        const HAS_ASSOC = 1 << 4;
        /// Contains `This`.
        const HAS_THIS = 1 << 5;
        /// Contains the error type.
        const HAS_ERROR = 1 << 6;
    }
}

impl TypeFlags {
    /// Any of these means the type still depends on a binding.
    pub const GENERIC_MASK: Self = Self::from_bits_truncate(
        Self::HAS_PARAM.bits()
            | Self::HAS_VALUE_PARAM.bits()
            | Self::HAS_PACK.bits()
            | Self::HAS_EXPAND.bits()
            | Self::HAS_ASSOC.bits()
            | Self::HAS_THIS.bits(),
    );

    #[inline]
    pub const fn is_concrete(self) -> bool {
        !self.intersects(Self::GENERIC_MASK)
    }

    #[inline]
    pub const fn needs_subst(self) -> bool {
        self.intersects(Self::GENERIC_MASK)
    }

    #[inline]
    pub const fn has_errors(self) -> bool {
        self.contains(Self::HAS_ERROR)
    }
}
