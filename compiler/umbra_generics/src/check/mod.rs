//! Checking generic bodies against their constraints.
//!
//! A body is checked once, with its generic parameters rigid: it may only
//! rely on what the constraints in scope (and static `is` tests around it)
//! guarantee. The result is a [`CheckedBody`] recording every resolution
//! specialization needs, so specialization never looks a name up again.

mod expr;
mod stmt;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use umbra_ir::{ExprArena, ExprId, Name, ParsedType, Span, StmtId, StringInterner};
use umbra_types::{DeclId, ParamRef, TypeData, TypeFlags, TypeId, TypeInterner};

use crate::binding::BindingSet;
use crate::config::GenericsConfig;
use crate::decl::{DeclTable, GenericDeclKind, Resolver};
use crate::error::{GenericError, GenericErrorKind};
use crate::pack::{packs_in, PackGroup};
use crate::solver::{Assumptions, Solver};

/// What a call expression resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callee {
    Decl(DeclId),
    /// Requirement of an interface the receiver is only known to conform
    /// to; the implementing member is chosen at specialization.
    Requirement {
        interface: TypeId,
        requirement: DeclId,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallResolution {
    pub callee: Callee,
    /// In terms of the checked body's own parameters.
    pub binding: BindingSet,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IdentKind {
    Local,
    This,
    ValueParam(ParamRef),
    /// `each xs` for a pack-typed parameter; the pack drives the element.
    PackElement(ParamRef),
    /// `each t` for a local of type `Tuple<expand ...>`.
    TupleElement(ParamRef),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldAccess {
    Field(Name),
    Swizzle(SmallVec<[u8; 4]>),
    TupleElement(u32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConstructKind {
    Convert,
    Vector,
    Aggregate,
    /// Call to a constructor member; the call is in [`CheckedBody::calls`].
    Init,
}

/// `subject is target`: conformance when `target` is an interface,
/// otherwise type equality.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeTest {
    pub subject: TypeId,
    pub target: TypeId,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckedBody {
    pub expr_types: FxHashMap<ExprId, TypeId>,
    pub calls: FxHashMap<ExprId, CallResolution>,
    pub idents: FxHashMap<ExprId, IdentKind>,
    pub fields: FxHashMap<ExprId, FieldAccess>,
    pub constructs: FxHashMap<ExprId, ConstructKind>,
    pub type_tests: FxHashMap<ExprId, TypeTest>,
    /// Pack-bearing type each `countof` counts.
    pub countofs: FxHashMap<ExprId, TypeId>,
    /// Packs each `expand` expression iterates.
    pub expansions: FxHashMap<ExprId, SmallVec<[ParamRef; 2]>>,
    pub locals: FxHashMap<StmtId, TypeId>,
    /// Groups of packs expanded together in the body.
    pub pack_groups: Vec<PackGroup>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LocalKind {
    Var,
    Param,
    PackParam,
}

#[derive(Copy, Clone, Debug)]
struct Local {
    name: Name,
    ty: TypeId,
    kind: LocalKind,
}

pub(crate) struct Checker<'a> {
    table: &'a DeclTable,
    types: &'a TypeInterner,
    strings: &'a StringInterner,
    config: &'a GenericsConfig,
    solver: Solver<'a>,
    resolver: Resolver<'a>,
    arena: &'a ExprArena,
    env: Assumptions,
    ret: TypeId,
    this: Option<TypeId>,
    scopes: Vec<Vec<Local>>,
    /// Packs seen through `each` by each enclosing `expand`.
    frames: Vec<SmallVec<[ParamRef; 2]>>,
    out: CheckedBody,
    errors: Vec<GenericError>,
}

/// Check the body of `decl`, if it has one.
#[tracing::instrument(level = "debug", skip(table, types, strings, config))]
pub fn check_body(
    table: &DeclTable,
    types: &TypeInterner,
    strings: &StringInterner,
    config: &GenericsConfig,
    decl: DeclId,
) -> Option<(CheckedBody, Vec<GenericError>)> {
    let d = table.get(decl);
    let callable = d.callable()?;
    let body = callable.body?;
    let this = if d.parent.is_some() && !callable.is_static {
        table.self_type(types, decl)
    } else {
        None
    };
    let mut checker = Checker {
        table,
        types,
        strings,
        config,
        solver: Solver::new(table, types, config),
        resolver: Resolver::new(table, types, strings, Some(decl), d.span),
        arena: table.arena(decl),
        env: Assumptions::for_decl(table, types, decl),
        ret: callable.ret,
        this,
        scopes: vec![Vec::new()],
        frames: Vec::new(),
        out: CheckedBody::default(),
        errors: Vec::new(),
    };
    for p in &callable.params {
        let kind = if matches!(types.lookup(p.ty), TypeData::Expand(_)) {
            LocalKind::PackParam
        } else {
            LocalKind::Param
        };
        checker.declare_local(p.name, p.ty, kind);
    }
    checker.stmt(body);
    tracing::debug!(errors = checker.errors.len(), "body checked");
    Some((checker.out, checker.errors))
}

/// Check every body not yet checked whose declaration has no errors, in
/// parallel, and store the results. Returns the number of bodies checked.
pub fn check_declarations(
    table: &mut DeclTable,
    types: &TypeInterner,
    strings: &StringInterner,
    config: &GenericsConfig,
) -> usize {
    let pending: Vec<DeclId> = table
        .iter()
        .filter(|d| d.callable().is_some_and(|c| c.body.is_some()))
        .map(|d| d.id)
        .filter(|&id| table.checked(id).is_none() && !table.is_poisoned(id))
        .collect();
    let shared: &DeclTable = table;
    let results: Vec<_> = pending
        .par_iter()
        .filter_map(|&id| check_body(shared, types, strings, config, id).map(|r| (id, r)))
        .collect();
    let checked = results.len();
    for (id, (body, errors)) in results {
        for e in errors {
            table.record_error(id, e);
        }
        table.set_checked(id, body);
    }
    checked
}

impl<'a> Checker<'a> {
    fn error(&mut self, kind: impl Into<GenericErrorKind>, span: Span) -> TypeId {
        self.errors.push(GenericError::new(kind, span));
        TypeId::ERROR
    }

    fn declare_local(&mut self, name: Name, ty: TypeId, kind: LocalKind) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(Local { name, ty, kind });
        }
    }

    fn lookup_local(&self, name: Name) -> Option<Local> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.iter().rev())
            .find(|l| l.name == name)
            .copied()
    }

    fn scoped(&mut self, f: impl FnOnce(&mut Self)) {
        self.scopes.push(Vec::new());
        f(self);
        self.scopes.pop();
    }

    /// Record that the innermost `expand` iterates the packs in `ty`.
    fn note_packs(&mut self, ty: TypeId) {
        let packs = packs_in(self.types, ty);
        if let Some(frame) = self.frames.last_mut() {
            for p in packs {
                if !frame.contains(&p) {
                    frame.push(p);
                }
            }
        }
    }

    /// Resolve a type written in the body and check that every generic
    /// application in it satisfies its constraints.
    fn resolve_type(&mut self, ty: &ParsedType, span: Span) -> TypeId {
        let r = self.resolver.at(span);
        let result = if self.frames.is_empty() {
            r.resolve(ty)
        } else {
            r.resolve_element(ty)
        };
        match result {
            Ok(resolved) => {
                if self.types.flags(resolved).contains(TypeFlags::HAS_PACK) {
                    self.note_packs(resolved);
                }
                self.validate_type(resolved, span);
                resolved
            }
            Err(e) => {
                self.errors.push(e);
                TypeId::ERROR
            }
        }
    }

    fn validate_type(&mut self, ty: TypeId, span: Span) {
        let TypeData::Named { decl, args } = self.types.lookup(ty) else {
            return;
        };
        for arg in &*args {
            if let Some(t) = arg.as_type() {
                self.validate_type(t, span);
            }
        }
        let d = self.table.get(decl);
        if !d.is_generic() || d.kind == GenericDeclKind::Interface {
            return;
        }
        let binding = self.table.binding_for_args(decl, &args);
        if let Err(e) = self.solver.validate(&self.env, decl, &binding, span) {
            self.errors.push(e);
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
