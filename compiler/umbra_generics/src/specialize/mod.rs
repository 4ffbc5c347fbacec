//! Specialization: concrete entities from generic declarations.
//!
//! ```text
//! instantiate(decl, binding)
//!     ├── canonical key: decl + binding of every parameter in scope
//!     ├── cache claim (see cache.rs); hits return without re-validation
//!     └── build
//!           ├── validate under no assumptions (pack lengths now known)
//!           ├── struct: field types, struct types they mention instantiated
//!           └── callable: parameters (packs unrolled), then the checked
//!                 body lowered: calls instantiated recursively,
//!                 `expand` unrolled, static `is` branches selected
//! ```

mod cache;
mod lower;
mod mono;

use std::sync::Arc;

pub use cache::{InstanceId, InstanceKey, InstantiationCache};
pub use mono::{MonoExpr, MonoExprKind, MonoFunction, MonoParam, MonoStmt, MonoVar};

use umbra_ir::{Name, Span, StringInterner};
use umbra_types::{DeclId, GenericArg, TypeData, TypeFormatter, TypeId, TypeInterner};

use crate::binding::BindingSet;
use crate::config::GenericsConfig;
use crate::decl::{DeclShape, DeclTable, GenericDeclKind};
use crate::error::{GenericError, GenericErrorKind};
use crate::solver::{Assumptions, Solver};
use crate::stack::ensure_sufficient_stack;
use crate::subst::Subst;
use cache::Claim;

/// A concrete entity with no generic parameters left.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instantiation {
    pub id: InstanceId,
    pub decl: DeclId,
    pub binding: BindingSet,
    /// Mangled name, e.g. `TestStruct<float,10>` or `Box<int>.get`.
    pub name: String,
    pub entity: Entity,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entity {
    Struct {
        ty: TypeId,
        fields: Vec<(Name, TypeId)>,
        /// Instances of the struct types the fields mention.
        nested: Vec<InstanceId>,
    },
    Interface(TypeId),
    Enum(TypeId),
    Alias(TypeId),
    Function(MonoFunction),
}

pub struct Specializer<'a> {
    table: &'a DeclTable,
    types: &'a TypeInterner,
    strings: &'a StringInterner,
    config: &'a GenericsConfig,
    solver: Solver<'a>,
    cache: &'a InstantiationCache,
}

impl<'a> Specializer<'a> {
    pub fn new(
        table: &'a DeclTable,
        types: &'a TypeInterner,
        strings: &'a StringInterner,
        config: &'a GenericsConfig,
        cache: &'a InstantiationCache,
    ) -> Self {
        Specializer {
            table,
            types,
            strings,
            config,
            solver: Solver::new(table, types, config),
            cache,
        }
    }

    /// Specialize `decl` under a complete, concrete `binding`.
    #[tracing::instrument(level = "debug", skip(self, binding))]
    pub fn specialize(
        &self,
        decl: DeclId,
        binding: &BindingSet,
        span: Span,
    ) -> Result<Arc<Instantiation>, GenericError> {
        let id = self.instantiate(decl, binding, span, 0)?;
        self.cache.get(id).ok_or_else(|| {
            GenericError::new(
                GenericErrorKind::Internal("instance is still being built".to_owned()),
                span,
            )
        })
    }

    pub(crate) fn instantiate(
        &self,
        decl: DeclId,
        binding: &BindingSet,
        span: Span,
        depth: usize,
    ) -> Result<InstanceId, GenericError> {
        if self.table.is_poisoned(decl) {
            return Err(self.table.poisoned_error(decl, span));
        }
        let scope = self.table.scope_chain(decl);
        let binding = binding.restricted_to(&scope);
        for (p, param) in self.table.params_in_scope(decl) {
            if !binding.contains(p) {
                return Err(GenericError::new(
                    GenericErrorKind::UninferredParameter {
                        param: param.name(),
                    },
                    span,
                ));
            }
        }
        if !binding.is_concrete(self.types) {
            return Err(GenericError::new(
                GenericErrorKind::Internal("specialization needs a concrete binding".to_owned()),
                span,
            ));
        }

        let key = InstanceKey { decl, binding };
        match self.cache.claim(&key) {
            Claim::Ready(id) | Claim::Reserved(id) => Ok(id),
            Claim::Failed(kind) => Err(GenericError::new(kind, span)),
            Claim::Build(id) => {
                let result = if depth > self.config.max_instantiation_depth {
                    Err(GenericError::new(
                        GenericErrorKind::InstantiationDepthExceeded {
                            limit: self.config.max_instantiation_depth,
                        },
                        span,
                    ))
                } else {
                    ensure_sufficient_stack(|| self.build(id, decl, &key.binding, span, depth))
                };
                self.cache
                    .complete(key, id, result)
                    .map(|instance| instance.id)
            }
        }
    }

    fn build(
        &self,
        id: InstanceId,
        decl: DeclId,
        binding: &BindingSet,
        span: Span,
        depth: usize,
    ) -> Result<Instantiation, GenericError> {
        self.solver.validate(&Assumptions::new(), decl, binding, span)?;
        let d = self.table.get(decl);
        let subst = Subst::new(self.types, binding).with_projector(&self.solver);
        let sub = |ty: TypeId| subst.ty(ty).map_err(|kind| GenericError::new(kind, span));
        let identity = || sub(self.table.identity_type(self.types, decl));

        let entity = match &d.shape {
            DeclShape::Struct(shape) => {
                let fields = shape
                    .fields
                    .iter()
                    .map(|f| Ok((f.name, sub(f.ty)?)))
                    .collect::<Result<Vec<_>, GenericError>>()?;
                let mut nested = Vec::new();
                for &(_, ty) in &fields {
                    self.instantiate_structs_in(ty, span, depth + 1, &mut nested)?;
                }
                Entity::Struct {
                    ty: identity()?,
                    fields,
                    nested,
                }
            }
            DeclShape::Interface(_) => Entity::Interface(identity()?),
            DeclShape::Enum(_) => Entity::Enum(identity()?),
            DeclShape::Alias(target) => Entity::Alias(sub(*target)?),
            DeclShape::Callable(callable) => {
                Entity::Function(lower::lower_function(self, decl, callable, binding, span, depth)?)
            }
            DeclShape::Extension(_) | DeclShape::Pending => {
                return Err(GenericError::new(
                    GenericErrorKind::Internal(format!("{:?} cannot be specialized", d.kind)),
                    span,
                ))
            }
        };
        let name = self.mangle(decl, binding);
        tracing::debug!(%name, "specialized");
        Ok(Instantiation {
            id,
            decl,
            binding: binding.clone(),
            name,
            entity,
        })
    }

    /// Instantiate every struct type `ty` mentions.
    fn instantiate_structs_in(
        &self,
        ty: TypeId,
        span: Span,
        depth: usize,
        out: &mut Vec<InstanceId>,
    ) -> Result<(), GenericError> {
        match self.types.lookup(ty) {
            TypeData::Named { decl, args } => {
                for arg in &*args {
                    if let GenericArg::Type(t) = *arg {
                        self.instantiate_structs_in(t, span, depth, out)?;
                    }
                }
                if self.table.get(decl).kind == GenericDeclKind::Struct {
                    let binding = self.table.binding_for_args(decl, &args);
                    let id = self.instantiate(decl, &binding, span, depth)?;
                    if !out.contains(&id) {
                        out.push(id);
                    }
                }
                Ok(())
            }
            TypeData::Vector { elem, .. } | TypeData::Array { elem, .. } => {
                self.instantiate_structs_in(elem, span, depth, out)
            }
            TypeData::Tuple(elems) => {
                for &e in &*elems {
                    self.instantiate_structs_in(e, span, depth, out)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// `Owner<args>.member<args>`, with extensions named by their target.
    fn mangle(&self, decl: DeclId, binding: &BindingSet) -> String {
        let fmt = TypeFormatter::new(self.types, self.strings, self.table);
        self.table
            .scope_chain(decl)
            .into_iter()
            .map(|id| {
                let d = self.table.get(id);
                match &d.shape {
                    DeclShape::Extension(ext) => {
                        let target = Subst::new(self.types, binding)
                            .ty(ext.target)
                            .unwrap_or(ext.target);
                        fmt.format(target)
                    }
                    _ => fmt.format_applied(d.name, &binding.args_for(id)),
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
