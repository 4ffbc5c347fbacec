//! Binding generic arguments at a use site.
//!
//! ```text
//! bind
//!     ├── explicit arguments, by position; a pack takes the rest
//!     ├── inference (call sites only)
//!     │     ├── structural matching collects candidates per parameter
//!     │     └── candidates are unified by scalar promotion rank
//!     ├── defaults, in declaration order
//!     ├── packs nobody constrained become empty
//!     └── every argument must convert implicitly to its parameter
//! ```
//!
//! Constraint validation is separate ([`Solver::validate`]), so that
//! callers can bind once and report binding and constraint failures
//! differently.
//!
//! [`Solver::validate`]: crate::solver::Solver::validate

mod matcher;

pub(crate) use matcher::Matcher;

use smallvec::SmallVec;
use umbra_ir::Span;
use umbra_types::{
    DeclId, GenericArg, ParamRef, ScalarKind, TypeData, TypeId, TypeInterner, ValueArg,
};

use crate::binding::{BindingSet, Bound};
use crate::config::GenericsConfig;
use crate::decl::{CallableShape, DeclTable, GenericParam, ParamKind};
use crate::error::{GenericError, GenericErrorKind};
use crate::solver::{Assumptions, Solver};
use crate::subst::Subst;

/// One use of a generic declaration.
#[derive(Clone, Debug)]
pub struct BindRequest<'r> {
    pub decl: DeclId,
    /// Arguments of enclosing declarations, already known at the use.
    pub outer: &'r BindingSet,
    pub explicit: &'r [GenericArg],
    /// Argument types of a call; `None` when the declaration is only named.
    pub args: Option<&'r [TypeId]>,
    /// Receiver type standing in for `This` in requirement signatures.
    pub this: Option<TypeId>,
    pub span: Span,
}

impl<'r> BindRequest<'r> {
    pub fn new(decl: DeclId, outer: &'r BindingSet, span: Span) -> Self {
        BindRequest {
            decl,
            outer,
            explicit: &[],
            args: None,
            this: None,
            span,
        }
    }

    #[must_use]
    pub fn with_explicit(mut self, explicit: &'r [GenericArg]) -> Self {
        self.explicit = explicit;
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: &'r [TypeId]) -> Self {
        self.args = Some(args);
        self
    }

    #[must_use]
    pub fn with_this(mut self, this: Option<TypeId>) -> Self {
        self.this = this;
        self
    }
}

pub struct Binder<'a> {
    table: &'a DeclTable,
    types: &'a TypeInterner,
    solver: &'a Solver<'a>,
    config: &'a GenericsConfig,
}

impl<'a> Binder<'a> {
    pub fn new(
        table: &'a DeclTable,
        types: &'a TypeInterner,
        solver: &'a Solver<'a>,
        config: &'a GenericsConfig,
    ) -> Self {
        Binder {
            table,
            types,
            solver,
            config,
        }
    }

    /// Complete binding for `req`, or the first failure.
    #[tracing::instrument(level = "trace", skip_all, fields(decl = ?req.decl))]
    pub fn bind(&self, env: &Assumptions, req: &BindRequest<'_>) -> Result<BindingSet, GenericError> {
        if self.table.is_poisoned(req.decl) {
            return Err(self.table.poisoned_error(req.decl, req.span));
        }
        let decl = self.table.get(req.decl);
        let mut binding = req.outer.clone();
        bind_explicit(self.table, self.types, req.decl, req.explicit, &mut binding, req.span)?;

        let call = req.args.zip(decl.callable());
        if let Some((args, callable)) = call {
            self.infer(req, callable, args, &mut binding)?;
        }
        apply_defaults(self.table, self.types, req.decl, &mut binding, req.span)?;
        finish(
            self.table,
            req.decl,
            &mut binding,
            self.config.empty_pack_when_uninferred,
            req.span,
        )?;
        if let Some((args, callable)) = call {
            self.check_arguments(env, req, callable, args, &binding)?;
        }
        tracing::trace!(bound = binding.len(), "binding complete");
        Ok(binding)
    }

    fn infer(
        &self,
        req: &BindRequest<'_>,
        callable: &CallableShape,
        args: &[TypeId],
        binding: &mut BindingSet,
    ) -> Result<(), GenericError> {
        let err = |kind: GenericErrorKind| GenericError::new(kind, req.span);
        let raw: Vec<TypeId> = callable.params.iter().map(|p| p.ty).collect();
        let params = Subst::new(self.types, binding)
            .with_this(req.this)
            .list(&raw)
            .map_err(err)?;

        let inferable: Vec<(ParamRef, &GenericParam)> = self
            .table
            .params_in_scope(req.decl)
            .into_iter()
            .filter(|(p, _)| !binding.contains(*p))
            .collect();
        let mut matcher = Matcher::new(self.types, inferable.iter().map(|(p, _)| *p));
        matcher.match_list(&params, args).map_err(|c| {
            err(GenericErrorKind::ArgumentCountMismatch {
                expected: c.expected,
                found: c.found,
            })
        })?;

        for (p, param) in inferable {
            match param {
                GenericParam::Type { name, .. } => {
                    if let Some(cands) = matcher.type_candidates(p) {
                        let ty = unify_candidates(self.types, cands).ok_or_else(|| {
                            err(GenericErrorKind::AmbiguousTypeArgument {
                                param: *name,
                                candidates: dedup(cands),
                            })
                        })?;
                        binding.bind(p, Bound::Type(ty));
                    }
                }
                GenericParam::Value { name, .. } => {
                    if let Some(cands) = matcher.value_candidates(p) {
                        match dedup(cands).as_slice() {
                            [only] => binding.bind(p, Bound::Value(*only)),
                            many => {
                                return Err(err(GenericErrorKind::AmbiguousValueArgument {
                                    param: *name,
                                    candidates: many.to_vec(),
                                }))
                            }
                        }
                    }
                }
                GenericParam::Pack { name, .. } => match matcher.pack_elements(p) {
                    Some(Ok(elems)) => binding.bind(p, Bound::Pack(elems)),
                    Some(Err(())) => {
                        return Err(err(GenericErrorKind::UninferredParameter { param: *name }))
                    }
                    None => {}
                },
            }
        }
        Ok(())
    }

    fn check_arguments(
        &self,
        env: &Assumptions,
        req: &BindRequest<'_>,
        callable: &CallableShape,
        args: &[TypeId],
        binding: &BindingSet,
    ) -> Result<(), GenericError> {
        let err = |kind: GenericErrorKind| GenericError::new(kind, req.span);
        let raw: Vec<TypeId> = callable.params.iter().map(|p| p.ty).collect();
        let params = Subst::new(self.types, binding)
            .with_this(req.this)
            .with_projector(self.solver)
            .list(&raw)
            .map_err(err)?;
        if params.len() != args.len() {
            return Err(err(GenericErrorKind::ArgumentCountMismatch {
                expected: params.len(),
                found: args.len(),
            }));
        }
        for (index, (&expected, &found)) in params.iter().zip(args).enumerate() {
            if !self.solver.convertible(env, found, expected, true) {
                return Err(err(GenericErrorKind::ArgumentTypeMismatch {
                    index,
                    expected,
                    found,
                }));
            }
        }
        Ok(())
    }
}

/// Bind explicit arguments to the own parameters of `decl`, in order.
pub(crate) fn bind_explicit(
    table: &DeclTable,
    types: &TypeInterner,
    decl: DeclId,
    explicit: &[GenericArg],
    binding: &mut BindingSet,
    span: Span,
) -> Result<(), GenericError> {
    let d = table.get(decl);
    let kind_mismatch = |param: &GenericParam| {
        GenericError::new(
            GenericErrorKind::ArgumentKindMismatch {
                param: param.name(),
                expected: param.kind(),
            },
            span,
        )
    };
    let is_expand = |ty: TypeId| matches!(types.lookup(ty), TypeData::Expand(_));

    let mut next = 0;
    for (p, param) in d.param_refs() {
        let Some(&arg) = explicit.get(next) else {
            break;
        };
        let bound = match (param, arg) {
            (GenericParam::Type { .. }, GenericArg::Type(ty)) if !is_expand(ty) => Bound::Type(ty),
            (GenericParam::Value { ty, .. }, GenericArg::Value(v))
                if crate::decl::value_fits(types, *ty, v) =>
            {
                Bound::Value(v)
            }
            (GenericParam::Pack { .. }, _) => {
                let elems = explicit[next..]
                    .iter()
                    .map(|a| a.as_type().ok_or_else(|| kind_mismatch(param)))
                    .collect::<Result<SmallVec<_>, _>>()?;
                next = explicit.len();
                binding.bind(p, Bound::Pack(elems));
                continue;
            }
            _ => return Err(kind_mismatch(param)),
        };
        binding.bind(p, bound);
        next += 1;
    }
    if next < explicit.len() {
        return Err(GenericError::new(
            GenericErrorKind::TooManyArguments {
                expected: d.params.len(),
                found: explicit.len(),
            },
            span,
        ));
    }
    Ok(())
}

/// Fill unbound parameters that declare a default. Defaults may mention
/// earlier parameters, so each is substituted with the binding so far.
pub(crate) fn apply_defaults(
    table: &DeclTable,
    types: &TypeInterner,
    decl: DeclId,
    binding: &mut BindingSet,
    span: Span,
) -> Result<(), GenericError> {
    for (p, param) in table.params_in_scope(decl) {
        if binding.contains(p) {
            continue;
        }
        let bound = {
            let subst = Subst::new(types, binding);
            match param {
                GenericParam::Type {
                    default: Some(ty), ..
                } => Bound::Type(subst.ty(*ty).map_err(|k| GenericError::new(k, span))?),
                GenericParam::Value {
                    default: Some(v), ..
                } => Bound::Value(subst.value(*v)),
                _ => continue,
            }
        };
        binding.bind(p, bound);
    }
    Ok(())
}

/// Every parameter in scope must now be bound; packs may be left empty.
pub(crate) fn finish(
    table: &DeclTable,
    decl: DeclId,
    binding: &mut BindingSet,
    empty_packs: bool,
    span: Span,
) -> Result<(), GenericError> {
    for (p, param) in table.params_in_scope(decl) {
        if binding.contains(p) {
            continue;
        }
        if empty_packs && param.kind() == ParamKind::Pack {
            binding.bind(p, Bound::Pack(SmallVec::new()));
            continue;
        }
        return Err(GenericError::new(
            GenericErrorKind::UninferredParameter {
                param: param.name(),
            },
            span,
        ));
    }
    Ok(())
}

/// Binding from explicit arguments and defaults alone, as when a generic
/// type is named in a signature.
pub(crate) fn complete_explicit(
    table: &DeclTable,
    types: &TypeInterner,
    decl: DeclId,
    explicit: &[GenericArg],
    span: Span,
) -> Result<BindingSet, GenericError> {
    let mut binding = BindingSet::new();
    bind_explicit(table, types, decl, explicit, &mut binding, span)?;
    apply_defaults(table, types, decl, &mut binding, span)?;
    // Only the declaration's own parameters are required here.
    for (p, param) in table.get(decl).param_refs() {
        if binding.contains(p) {
            continue;
        }
        if param.kind() == ParamKind::Pack {
            binding.bind(p, Bound::Pack(SmallVec::new()));
        } else {
            return Err(GenericError::new(
                GenericErrorKind::UninferredParameter {
                    param: param.name(),
                },
                span,
            ));
        }
    }
    Ok(binding)
}

/// One type for conflicting inferences, if they are reconcilable.
///
/// Numeric scalars join at the highest promotion rank. When a vector is
/// among the candidates, scalars count as one-element vectors, so every
/// candidate must then have the same length. Distinct candidates that
/// involve `bool` never unify.
pub(crate) fn unify_candidates(types: &TypeInterner, cands: &[TypeId]) -> Option<TypeId> {
    let first = *cands.first()?;
    if cands.iter().all(|&c| c == first) {
        return Some(first);
    }
    let mut kind: Option<ScalarKind> = None;
    let mut count: Option<ValueArg> = None;
    let mut saw_scalar = false;
    for &c in cands {
        let (k, n) = match types.lookup(c) {
            TypeData::Scalar(k) => {
                saw_scalar = true;
                (k, None)
            }
            TypeData::Vector { elem, count } => match types.lookup(elem) {
                TypeData::Scalar(k) => (k, Some(count)),
                _ => return None,
            },
            _ => return None,
        };
        if k == ScalarKind::Bool {
            return None;
        }
        kind = Some(match kind {
            None => k,
            Some(prev) => prev.join(k)?,
        });
        if let Some(n) = n {
            if count.is_some_and(|m| m != n) {
                return None;
            }
            count = Some(n);
        }
    }
    let scalar = types.scalar(kind?);
    match count {
        None => Some(scalar),
        Some(n) if saw_scalar && n != ValueArg::Int(1) => None,
        Some(n) => Some(types.vector(scalar, n)),
    }
}

fn dedup<T: Copy + PartialEq>(items: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for &item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
