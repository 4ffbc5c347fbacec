//! The generics pipeline for one compilation unit.
//!
//! ```text
//! GenericsSession
//!     ├── register_module      declaration table (declare, define, validate)
//!     ├── check_declarations   bodies checked once, against their constraints
//!     ├── bind / validate      use-site binding and constraint checks
//!     ├── specialize           concrete entities, through the shared cache
//!     └── diagnostics          declaration errors once, use-site errors each
//! ```
//!
//! The session owns every table; nothing is process-wide. Dropping the
//! session tears the unit down.

use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use umbra_diagnostic::{Diagnostic, DiagnosticQueue};
use umbra_ir::{ExprArena, Module, SharedInterner, Span, StringInterner};
use umbra_types::{DeclId, GenericArg, SharedTypeInterner, TypeFormatter, TypeId, TypeInterner};

use crate::binder::{BindRequest, Binder};
use crate::binding::BindingSet;
use crate::check;
use crate::config::GenericsConfig;
use crate::decl::{Constraint, DeclTable, GenericDeclKind};
use crate::error::GenericError;
use crate::solver::{Assumptions, Solver};
use crate::specialize::{Entity, Instantiation, InstantiationCache, Specializer};

/// Outcome of one use site: the type it denotes, or `ERROR` after a
/// reported failure so the enclosing check can continue.
#[derive(Clone, Debug)]
pub struct UseSite {
    pub ty: TypeId,
    pub instance: Option<Arc<Instantiation>>,
    pub error: Option<GenericError>,
}

pub struct GenericsSession {
    strings: SharedInterner,
    types: SharedTypeInterner,
    table: DeclTable,
    config: GenericsConfig,
    cache: InstantiationCache,
    diagnostics: DiagnosticQueue,
    /// Declaration errors already turned into diagnostics, per declaration.
    reported: FxHashMap<DeclId, usize>,
}

impl GenericsSession {
    pub fn new(strings: SharedInterner, config: GenericsConfig) -> Self {
        let table = DeclTable::new(&strings);
        let diagnostics = DiagnosticQueue::with_config(config.diagnostics.clone());
        GenericsSession {
            strings,
            types: SharedTypeInterner::new(),
            table,
            config,
            cache: InstantiationCache::new(),
            diagnostics,
            reported: FxHashMap::default(),
        }
    }

    pub fn strings(&self) -> &StringInterner {
        &self.strings
    }

    pub fn types(&self) -> &TypeInterner {
        &self.types
    }

    pub fn table(&self) -> &DeclTable {
        &self.table
    }

    pub fn config(&self) -> &GenericsConfig {
        &self.config
    }

    pub fn cache(&self) -> &InstantiationCache {
        &self.cache
    }

    pub fn lookup(&self, name: &str) -> Option<DeclId> {
        self.table.lookup(self.strings.intern(name))
    }

    // === Declarations ===

    #[tracing::instrument(level = "debug", skip_all, fields(decls = module.decls.len()))]
    pub fn register_module(&mut self, module: &Module, arena: ExprArena) -> Vec<DeclId> {
        let ids = self
            .table
            .register_module(module, arena, &self.types, &self.strings);
        self.report_declaration_errors();
        ids
    }

    /// Check every pending body. Returns the number checked.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn check_declarations(&mut self) -> usize {
        let checked =
            check::check_declarations(&mut self.table, &self.types, &self.strings, &self.config);
        self.report_declaration_errors();
        checked
    }

    fn report_declaration_errors(&mut self) {
        let mut fresh = Vec::new();
        for d in self.table.iter() {
            let errors = self.table.errors_for(d.id);
            let seen = self.reported.get(&d.id).copied().unwrap_or(0);
            if errors.len() > seen {
                fresh.extend(errors[seen..].iter().cloned());
                self.reported.insert(d.id, errors.len());
            }
        }
        for e in &fresh {
            self.report(e);
        }
    }

    // === Use sites ===

    /// Bind `decl` at a use site. Argument types drive inference for
    /// callables and are ignored otherwise.
    pub fn bind(
        &self,
        decl: DeclId,
        explicit: &[GenericArg],
        arg_types: &[TypeId],
        span: Span,
    ) -> Result<BindingSet, GenericError> {
        let solver = self.solver();
        let binder = Binder::new(&self.table, &self.types, &solver, &self.config);
        let outer = BindingSet::new();
        let mut req = BindRequest::new(decl, &outer, span).with_explicit(explicit);
        if self.table.get(decl).kind.is_callable() {
            req = req.with_args(arg_types);
        }
        binder.bind(&Assumptions::new(), &req)
    }

    pub fn validate(&self, decl: DeclId, binding: &BindingSet, span: Span) -> Result<(), GenericError> {
        self.solver()
            .validate(&Assumptions::new(), decl, binding, span)
    }

    /// Value of an optional constraint under `binding`.
    pub fn evaluate_optional(&self, binding: &BindingSet, constraint: &Constraint) -> bool {
        self.solver()
            .evaluate_optional(&Assumptions::new(), binding, constraint)
    }

    pub fn specialize(
        &self,
        decl: DeclId,
        binding: &BindingSet,
        span: Span,
    ) -> Result<Arc<Instantiation>, GenericError> {
        self.specializer().specialize(decl, binding, span)
    }

    /// Bind, validate and specialize; a failure is reported and the use
    /// site gets the error type.
    #[tracing::instrument(level = "debug", skip(self, explicit, arg_types))]
    pub fn instantiate(
        &mut self,
        decl: DeclId,
        explicit: &[GenericArg],
        arg_types: &[TypeId],
        span: Span,
    ) -> UseSite {
        let result = self
            .bind(decl, explicit, arg_types, span)
            .and_then(|binding| {
                self.validate(decl, &binding, span)?;
                self.specialize(decl, &binding, span)
            });
        match result {
            Ok(instance) => UseSite {
                ty: entity_type(&instance.entity),
                instance: Some(instance),
                error: None,
            },
            Err(e) => {
                self.report(&e);
                UseSite {
                    ty: TypeId::ERROR,
                    instance: None,
                    error: Some(e),
                }
            }
        }
    }

    /// Specialize every non-generic free function with a body, in parallel
    /// over the shared cache.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn specialize_entry_points(&mut self) -> Vec<(DeclId, Result<Arc<Instantiation>, GenericError>)> {
        let entries: Vec<(DeclId, Span)> = self
            .table
            .iter()
            .filter(|d| {
                d.kind == GenericDeclKind::Function
                    && d.parent.is_none()
                    && !d.is_generic()
                    && d.callable().is_some_and(|c| c.body.is_some())
                    && !self.table.is_poisoned(d.id)
            })
            .map(|d| (d.id, d.span))
            .collect();
        tracing::debug!(entries = entries.len(), "specializing entry points");

        let specializer = self.specializer();
        let empty = BindingSet::new();
        let results: Vec<_> = entries
            .par_iter()
            .map(|&(decl, span)| (decl, specializer.specialize(decl, &empty, span)))
            .collect();
        for (_, result) in &results {
            if let Err(e) = result {
                self.report(e);
            }
        }
        results
    }

    // === Diagnostics ===

    /// Sorted diagnostics reported so far; clears the queue.
    pub fn diagnostics(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.flush()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors().is_some()
    }

    fn report(&mut self, e: &GenericError) {
        if e.is_follow_on() {
            return;
        }
        let fmt = TypeFormatter::new(&self.types, &self.strings, &self.table);
        let diag = e.to_diagnostic(&self.strings, &fmt, &self.table);
        self.diagnostics.add(diag);
    }

    fn solver(&self) -> Solver<'_> {
        Solver::new(&self.table, &self.types, &self.config)
    }

    fn specializer(&self) -> Specializer<'_> {
        Specializer::new(&self.table, &self.types, &self.strings, &self.config, &self.cache)
    }
}

fn entity_type(entity: &Entity) -> TypeId {
    match entity {
        Entity::Struct { ty, .. } | Entity::Interface(ty) | Entity::Enum(ty) | Entity::Alias(ty) => *ty,
        Entity::Function(f) => f.ret,
    }
}
