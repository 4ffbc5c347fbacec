//! Lowering a checked generic body under a concrete binding.
//!
//! Every resolution comes from the [`CheckedBody`]; nothing is looked up
//! by name again. Types are substituted with the binding, the receiver
//! type, and the pack elements of every enclosing `expand` copy.

use smallvec::SmallVec;
use umbra_ir::{ExprArena, ExprId, ExprKind, Span, StmtId, StmtKind};
use umbra_types::{DeclId, ParamRef, TypeData, TypeId, ValueArg};

use super::mono::{MonoExpr, MonoExprKind, MonoFunction, MonoParam, MonoStmt, MonoVar};
use super::Specializer;
use crate::binder::{BindRequest, Binder};
use crate::binding::BindingSet;
use crate::check::{CallResolution, Callee, CheckedBody, ConstructKind, FieldAccess, IdentKind, TypeTest};
use crate::decl::{CallableShape, GenericDeclKind};
use crate::error::{GenericError, GenericErrorKind};
use crate::solver::Assumptions;
use crate::stack::ensure_sufficient_stack;
use crate::subst::Subst;

pub(super) fn lower_function(
    sp: &Specializer<'_>,
    decl: DeclId,
    callable: &CallableShape,
    binding: &BindingSet,
    span: Span,
    depth: usize,
) -> Result<MonoFunction, GenericError> {
    let d = sp.table.get(decl);
    let plain = Subst::new(sp.types, binding).with_projector(&sp.solver);
    let err = |kind: GenericErrorKind| GenericError::new(kind, span);

    let this = if d.parent.is_some() && !callable.is_static {
        sp.table
            .self_type(sp.types, decl)
            .map(|t| plain.ty(t))
            .transpose()
            .map_err(err)?
    } else {
        None
    };
    let subst = plain.with_this(this);

    let mut params = Vec::with_capacity(callable.params.len());
    for p in &callable.params {
        if let TypeData::Expand(pattern) = sp.types.lookup(p.ty) {
            for (k, ty) in subst.expand(pattern).map_err(err)?.into_iter().enumerate() {
                params.push(MonoParam {
                    var: MonoVar {
                        name: p.name,
                        element: Some(element_index(k)),
                    },
                    ty,
                });
            }
        } else {
            params.push(MonoParam {
                var: MonoVar {
                    name: p.name,
                    element: None,
                },
                ty: subst.ty(p.ty).map_err(err)?,
            });
        }
    }
    let ret = subst.ty(callable.ret).map_err(err)?;

    let body = match callable.body {
        None => None,
        Some(stmt) => {
            let Some(checked) = sp.table.checked(decl) else {
                return Err(err(GenericErrorKind::Internal(
                    "body specialized before it was checked".to_owned(),
                )));
            };
            let mut lowerer = Lowerer {
                sp,
                body: checked,
                arena: sp.table.arena(decl),
                binding,
                this,
                elements: SmallVec::new(),
                depth,
            };
            Some(lowerer.stmt(stmt)?)
        }
    };
    Ok(MonoFunction {
        params,
        ret,
        this,
        body,
    })
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "pack lengths are bounded by the argument count of one call"
)]
fn element_index(k: usize) -> u32 {
    k as u32
}

struct Lowerer<'s, 'a> {
    sp: &'s Specializer<'a>,
    body: &'s CheckedBody,
    arena: &'s ExprArena,
    binding: &'s BindingSet,
    this: Option<TypeId>,
    /// Pack, element index and element type for every enclosing copy.
    elements: SmallVec<[(ParamRef, u32, TypeId); 2]>,
    depth: usize,
}

impl<'s> Lowerer<'s, '_> {
    fn subst(&self) -> Subst<'_> {
        Subst::new(self.sp.types, self.binding)
            .with_this(self.this)
            .with_projector(&self.sp.solver)
            .with_elements(self.elements.iter().map(|&(p, _, ty)| (p, ty)))
    }

    fn ty(&self, ty: TypeId, span: Span) -> Result<TypeId, GenericError> {
        let ty = self
            .subst()
            .ty(ty)
            .map_err(|kind| GenericError::new(kind, span))?;
        Ok(self.sp.solver.normalize(&Assumptions::new(), ty))
    }

    fn expr_ty(&self, id: ExprId, span: Span) -> Result<TypeId, GenericError> {
        match self.body.expr_types.get(&id) {
            Some(&ty) => self.ty(ty, span),
            None => Err(internal("expression was not checked", span)),
        }
    }

    fn element_of(&self, p: ParamRef, span: Span) -> Result<u32, GenericError> {
        self.elements
            .iter()
            .rev()
            .find(|(q, _, _)| *q == p)
            .map(|&(_, k, _)| k)
            .ok_or_else(|| internal("pack element outside its expansion", span))
    }

    // === Statements ===

    fn stmt(&mut self, id: StmtId) -> Result<MonoStmt, GenericError> {
        let arena = self.arena;
        let stmt = arena.stmt(id);
        let span = stmt.span;
        Ok(match &stmt.kind {
            StmtKind::Let { name, init, .. } => {
                let Some(&local) = self.body.locals.get(&id) else {
                    return Err(internal("local was not checked", span));
                };
                MonoStmt::Let {
                    var: MonoVar {
                        name: *name,
                        element: None,
                    },
                    ty: self.ty(local, span)?,
                    init: init.map(|e| self.expr(e)).transpose()?,
                }
            }
            StmtKind::Expr(e) => match arena.expr(*e).kind {
                ExprKind::Expand(inner) => MonoStmt::Block(
                    self.expand(*e, inner)?
                        .into_iter()
                        .map(MonoStmt::Expr)
                        .collect(),
                ),
                _ => MonoStmt::Expr(self.expr(*e)?),
            },
            StmtKind::Return(value) => MonoStmt::Return(value.map(|e| self.expr(e)).transpose()?),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if let Some(&test) = self.body.type_tests.get(cond) {
                    let taken = self.test(test, span)?;
                    tracing::trace!(taken, "static branch selected");
                    return match (taken, else_branch) {
                        (true, _) => self.stmt(*then_branch),
                        (false, Some(e)) => self.stmt(*e),
                        (false, None) => Ok(MonoStmt::Block(Vec::new())),
                    };
                }
                MonoStmt::If {
                    cond: self.expr(*cond)?,
                    then_branch: Box::new(self.stmt(*then_branch)?),
                    else_branch: else_branch
                        .map(|e| self.stmt(e).map(Box::new))
                        .transpose()?,
                }
            }
            StmtKind::Block(stmts) => MonoStmt::Block(
                stmts
                    .iter()
                    .map(|&s| self.stmt(s))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    // === Expressions ===

    fn expr(&mut self, id: ExprId) -> Result<MonoExpr, GenericError> {
        ensure_sufficient_stack(|| self.expr_inner(id))
    }

    fn expr_inner(&mut self, id: ExprId) -> Result<MonoExpr, GenericError> {
        let (arena, body) = (self.arena, self.body);
        let expr = arena.expr(id);
        let span = expr.span;
        let ty = self.expr_ty(id, span)?;
        let kind = match &expr.kind {
            ExprKind::Int(v) => MonoExprKind::Int(*v),
            ExprKind::Float(bits) => MonoExprKind::Float(*bits),
            ExprKind::Bool(b) => MonoExprKind::Bool(*b),
            ExprKind::Ident(name) => match body.idents.get(&id) {
                Some(IdentKind::This) => MonoExprKind::This,
                Some(&IdentKind::ValueParam(p)) => {
                    MonoExprKind::Value(self.subst().value(ValueArg::Param(p)))
                }
                Some(&IdentKind::PackElement(p)) => MonoExprKind::Var(MonoVar {
                    name: *name,
                    element: Some(self.element_of(p, span)?),
                }),
                Some(&IdentKind::TupleElement(p)) => {
                    let index = self.element_of(p, span)?;
                    let tuple = self.whole_tuple(id, span)?;
                    MonoExprKind::TupleElement {
                        base: Box::new(MonoExpr {
                            kind: MonoExprKind::Var(MonoVar {
                                name: *name,
                                element: None,
                            }),
                            ty: tuple,
                        }),
                        index,
                    }
                }
                Some(IdentKind::Local) | None => MonoExprKind::Var(MonoVar {
                    name: *name,
                    element: None,
                }),
            },
            ExprKind::Each(inner) => return self.expr(*inner),
            ExprKind::Binary { op, lhs, rhs } => MonoExprKind::Binary {
                op: *op,
                lhs: Box::new(self.expr(*lhs)?),
                rhs: Box::new(self.expr(*rhs)?),
            },
            ExprKind::Unary { op, operand } => MonoExprKind::Unary {
                op: *op,
                operand: Box::new(self.expr(*operand)?),
            },
            ExprKind::Assign { op, target, value } => MonoExprKind::Assign {
                op: *op,
                target: Box::new(self.expr(*target)?),
                value: Box::new(self.expr(*value)?),
            },
            ExprKind::Call { args, .. } => match body.constructs.get(&id) {
                Some(&kind) => self.construct(id, kind, args, span)?,
                None => {
                    let call = self.resolution(id, span)?;
                    self.call(call, Receiver::Implicit, args, span)?
                }
            },
            ExprKind::MethodCall { receiver, args, .. } => {
                let call = self.resolution(id, span)?;
                self.call(call, Receiver::Explicit(*receiver), args, span)?
            }
            ExprKind::Field { base, .. } => {
                let Some(access) = body.fields.get(&id) else {
                    return Err(internal("field access was not checked", span));
                };
                let base = Box::new(self.expr(*base)?);
                match access {
                    FieldAccess::Field(name) => MonoExprKind::Field { base, name: *name },
                    FieldAccess::Swizzle(components) => MonoExprKind::Swizzle {
                        base,
                        components: components.clone(),
                    },
                    FieldAccess::TupleElement(index) => MonoExprKind::TupleElement {
                        base,
                        index: *index,
                    },
                }
            }
            ExprKind::Index { base, args } => match body.calls.get(&id) {
                Some(call) => self.call(call, Receiver::Explicit(*base), args, span)?,
                None => MonoExprKind::Index {
                    base: Box::new(self.expr(*base)?),
                    args: self.list(args)?,
                },
            },
            ExprKind::Construct { args, .. } => {
                let Some(&kind) = body.constructs.get(&id) else {
                    return Err(internal("construction was not checked", span));
                };
                self.construct(id, kind, args, span)?
            }
            ExprKind::Tuple(elems) => MonoExprKind::Tuple(self.list(elems)?),
            ExprKind::TypeIs { .. } => {
                let Some(&test) = body.type_tests.get(&id) else {
                    return Err(internal("type test was not checked", span));
                };
                MonoExprKind::Bool(self.test(test, span)?)
            }
            ExprKind::CountOf(_) => {
                let Some(&counted) = body.countofs.get(&id) else {
                    return Err(internal("countof was not checked", span));
                };
                MonoExprKind::Int(self.count(counted, span)?)
            }
            ExprKind::Expand(inner) => MonoExprKind::Tuple(self.expand(id, *inner)?),
        };
        Ok(MonoExpr { kind, ty })
    }

    /// Lower an argument list, splicing `expand` entries.
    fn list(&mut self, ids: &[ExprId]) -> Result<Vec<MonoExpr>, GenericError> {
        let arena = self.arena;
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            match arena.expr(id).kind {
                ExprKind::Expand(inner) => out.extend(self.expand(id, inner)?),
                _ => out.push(self.expr(id)?),
            }
        }
        Ok(out)
    }

    /// One copy of `inner` per element of the packs the expansion iterates.
    fn expand(&mut self, id: ExprId, inner: ExprId) -> Result<Vec<MonoExpr>, GenericError> {
        let span = self.arena.expr(id).span;
        let (body, binding) = (self.body, self.binding);
        let Some(packs) = body.expansions.get(&id) else {
            return Err(internal("expansion was not checked", span));
        };
        let mut lists: SmallVec<[(ParamRef, &[TypeId]); 2]> = SmallVec::new();
        for &p in packs {
            match binding.pack_of(p) {
                Some(list) => lists.push((p, list)),
                None => return Err(internal("expanded pack is unbound", span)),
            }
        }
        let len = lists.first().map_or(0, |(_, l)| l.len());
        if lists.iter().any(|(_, l)| l.len() != len) {
            return Err(GenericError::new(
                GenericErrorKind::ArityMismatch {
                    lengths: lists.iter().map(|&(p, l)| (p, l.len())).collect(),
                },
                span,
            ));
        }

        let mut out = Vec::with_capacity(len);
        let base = self.elements.len();
        for k in 0..len {
            for &(p, list) in &lists {
                self.elements.push((p, element_index(k), list[k]));
            }
            let copy = self.expr(inner);
            self.elements.truncate(base);
            out.push(copy?);
        }
        tracing::trace!(copies = len, "expansion unrolled");
        Ok(out)
    }

    /// Type of the tuple local an `each t` element is projected from.
    fn whole_tuple(&self, ident: ExprId, span: Span) -> Result<TypeId, GenericError> {
        let Some(&pattern) = self.body.expr_types.get(&ident) else {
            return Err(internal("expression was not checked", span));
        };
        let types = self.sp.types;
        let tuple = types.tuple(vec![types.expand(pattern)]);
        Subst::new(types, self.binding)
            .with_this(self.this)
            .with_projector(&self.sp.solver)
            .ty(tuple)
            .map_err(|kind| GenericError::new(kind, span))
    }

    fn test(&self, test: TypeTest, span: Span) -> Result<bool, GenericError> {
        let subject = self.ty(test.subject, span)?;
        let target = self.ty(test.target, span)?;
        let env = Assumptions::new();
        let is_interface = match self.sp.types.lookup(target) {
            TypeData::Named { decl, .. } => {
                self.sp.table.get(decl).kind == GenericDeclKind::Interface
            }
            _ => false,
        };
        Ok(if is_interface {
            self.sp.solver.conforms(&env, subject, target)
        } else {
            self.sp.solver.equal(&env, subject, target)
        })
    }

    fn count(&self, counted: TypeId, span: Span) -> Result<i64, GenericError> {
        let types = self.sp.types;
        let elems = Subst::new(types, self.binding)
            .with_projector(&self.sp.solver)
            .list(&[types.expand(counted)])
            .map_err(|kind| GenericError::new(kind, span))?;
        i64::try_from(elems.len()).map_err(|_| internal("pack too long to count", span))
    }

    // === Calls ===

    fn resolution(&self, id: ExprId, span: Span) -> Result<&'s CallResolution, GenericError> {
        self.body
            .calls
            .get(&id)
            .ok_or_else(|| internal("call was not checked", span))
    }

    fn construct(
        &mut self,
        id: ExprId,
        kind: ConstructKind,
        args: &[ExprId],
        span: Span,
    ) -> Result<MonoExprKind, GenericError> {
        match kind {
            ConstructKind::Init => {
                let call = self.resolution(id, span)?;
                self.call(call, Receiver::None, args, span)
            }
            ConstructKind::Convert => {
                let mut args = self.list(args)?;
                match args.pop() {
                    Some(from) if args.is_empty() => Ok(MonoExprKind::Convert(Box::new(from))),
                    _ => Err(internal("conversion takes one argument", span)),
                }
            }
            ConstructKind::Vector | ConstructKind::Aggregate => {
                Ok(MonoExprKind::Construct(self.list(args)?))
            }
        }
    }

    fn call(
        &mut self,
        call: &CallResolution,
        receiver: Receiver,
        args: &[ExprId],
        span: Span,
    ) -> Result<MonoExprKind, GenericError> {
        let receiver = match receiver {
            Receiver::Explicit(r) => Some(self.expr(r)?),
            Receiver::Implicit => self.implicit_receiver(&call.callee),
            Receiver::None => None,
        };
        let args = self.list(args)?;
        let sp = self.sp;

        let (decl, binding) = match call.callee {
            Callee::Decl(decl) => {
                let binding = self
                    .subst()
                    .binding(&call.binding)
                    .map_err(|kind| GenericError::new(kind, span))?;
                (decl, binding)
            }
            Callee::Requirement { requirement, .. } => {
                let Some(recv) = receiver.as_ref().map(|r| r.ty) else {
                    return Err(internal("requirement call without a receiver", span));
                };
                let Some((member, outer)) = sp.solver.witness(recv, requirement) else {
                    return Err(GenericError::new(
                        GenericErrorKind::Internal(format!(
                            "no member implements requirement {requirement:?}"
                        )),
                        span,
                    ));
                };
                let arg_types: Vec<TypeId> = args.iter().map(|a| a.ty).collect();
                let binder = Binder::new(sp.table, sp.types, &sp.solver, sp.config);
                let req = BindRequest::new(member, &outer, span)
                    .with_args(&arg_types)
                    .with_this(Some(recv));
                (member, binder.bind(&Assumptions::new(), &req)?)
            }
        };
        let callee = sp.instantiate(decl, &binding, span, self.depth + 1)?;
        Ok(MonoExprKind::Call {
            callee,
            receiver: receiver.map(Box::new),
            args,
        })
    }

    /// `this` for a sibling member called without a receiver.
    fn implicit_receiver(&self, callee: &Callee) -> Option<MonoExpr> {
        let Callee::Decl(decl) = callee else {
            return None;
        };
        let d = self.sp.table.get(*decl);
        let is_member = d.parent.is_some()
            && d.kind != GenericDeclKind::Constructor
            && !d.is_static();
        let ty = self.this.filter(|_| is_member)?;
        Some(MonoExpr {
            kind: MonoExprKind::This,
            ty,
        })
    }
}

#[derive(Copy, Clone)]
enum Receiver {
    /// `recv.method(...)` or `base[...]`.
    Explicit(ExprId),
    /// `method(...)`, which may be a sibling member.
    Implicit,
    None,
}

fn internal(what: &str, span: Span) -> GenericError {
    GenericError::new(GenericErrorKind::Internal(what.to_owned()), span)
}
