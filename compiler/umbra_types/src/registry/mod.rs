//! Registries consulted by constraint solving.
//!
//! - [`InterfaceRegistry`]: interfaces, their super-interface DAG, associated
//!   types, and every declared or extension-provided conformance
//! - [`ConversionRegistry`]: the coercion relation between types

mod conversions;
mod interfaces;

pub use conversions::{ConversionKind, ConversionRegistry};
pub use interfaces::{
    AssocTypeDef, BuiltinInterfaces, ConformanceEntry, ConformanceHead, InterfaceEntry,
    InterfaceRegistry,
};
