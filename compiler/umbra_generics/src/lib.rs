//! Generics for the Umbra shading language.
//!
//! Generic declarations are checked once against their constraints, bound
//! at each use site, and specialized into concrete entities that code
//! generation consumes. No generic parameter survives specialization.
//!
//! ```text
//! parser output (umbra_ir)
//!     │
//!     ▼
//! DeclTable ──► check (bodies) ──► Binder ──► Solver::validate ──► Specializer
//!                                    ▲              │                  │
//!                                    └── Subst ◄────┴── packs ─────────┘
//! ```
//!
//! [`GenericsSession`] drives the pipeline for one compilation unit and
//! owns every table it uses.

mod binder;
mod binding;
mod check;
mod config;
mod decl;
mod error;
mod pack;
mod session;
mod solver;
mod specialize;
mod stack;
mod subst;
mod tracing_setup;

#[cfg(test)]
mod test_support;

pub use binder::{BindRequest, Binder};
pub use binding::{BindingSet, Bound};
pub use check::{
    check_body, check_declarations, CallResolution, Callee, CheckedBody, ConstructKind,
    FieldAccess, IdentKind, TypeTest,
};
pub use config::GenericsConfig;
pub use decl::{
    CallableShape, Constraint, ConstraintKind, DeclShape, DeclTable, ExtensionShape, FieldSig,
    GenericDecl, GenericDeclKind, GenericParam, InterfaceShape, ParamKind, ParamSig, StructShape,
};
pub use error::{
    BodyError, GenericError, GenericErrorKind, MalformedReason, PackPosition, Requirement,
};
pub use pack::{groups_in, packs_in, params_in, PackGroup};
pub use session::{GenericsSession, UseSite};
pub use solver::{Assumptions, Solver};
pub use specialize::{
    Entity, InstanceId, InstanceKey, Instantiation, InstantiationCache, MonoExpr, MonoExprKind,
    MonoFunction, MonoParam, MonoStmt, MonoVar, Specializer,
};
pub use stack::ensure_sufficient_stack;
pub use subst::{Projector, Subst};
pub use tracing_setup::init_tracing;
