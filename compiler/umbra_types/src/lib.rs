//! Type representation for the Umbra front end.
//!
//! - All types are interned: `TypeId` equality is type equality
//! - Generic parameters are rigid leaves (`Param`, `Pack`) identified by
//!   `ParamRef`, never fresh inference variables
//! - Interfaces and conversions live in registries consulted by the
//!   generics solver
//!
//! Use `TypeInterner` (or `SharedTypeInterner` across threads) to intern
//! types and obtain `TypeId` handles.

mod data;
mod flags;
mod format;
mod ids;
mod registry;
mod scalar;
mod type_interner;

pub use data::{ArrayLen, GenericArg, TypeData, ValueArg};
pub use flags::TypeFlags;
pub use format::{TypeFormatter, TypeNames};
pub use ids::{DeclId, ParamRef, TypeId};
pub use registry::{
    AssocTypeDef, BuiltinInterfaces, ConformanceEntry, ConformanceHead, ConversionKind,
    ConversionRegistry, InterfaceEntry, InterfaceRegistry,
};
pub use scalar::ScalarKind;
pub use type_interner::{SharedTypeInterner, TypeInternError, TypeInterner};

#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::{DeclId, ParamRef, TypeId};
    umbra_ir::static_assert_size!(TypeId, 4);
    umbra_ir::static_assert_size!(DeclId, 4);
    umbra_ir::static_assert_size!(ParamRef, 8);
}
