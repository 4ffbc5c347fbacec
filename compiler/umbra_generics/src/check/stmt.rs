//! Statement checking and scoping.

use umbra_ir::{ExprId, StmtId, StmtKind};
use umbra_types::{TypeData, TypeId};

use super::{Checker, LocalKind, TypeTest};
use crate::error::{BodyError, PackPosition};

impl Checker<'_> {
    pub(super) fn stmt(&mut self, id: StmtId) {
        let arena = self.arena;
        let stmt = arena.stmt(id);
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::Let { name, ty, init } => {
                let declared = ty.as_ref().map(|t| self.resolve_type(t, span));
                let init_ty = init.map(|e| self.expr(e));
                let mut local = match (declared, init_ty) {
                    (Some(d), Some(i)) => {
                        if !self.solver.convertible(&self.env, i, d, true) {
                            self.error(
                                BodyError::Mismatch {
                                    expected: d,
                                    found: i,
                                },
                                span,
                            );
                        }
                        d
                    }
                    (Some(t), None) | (None, Some(t)) => t,
                    (None, None) => self.error(BodyError::UnknownType { name: *name }, span),
                };
                if matches!(self.types.lookup(local), TypeData::Expand(_)) {
                    local = self.error(PackPosition::BarePack, span);
                }
                self.out.locals.insert(id, local);
                self.declare_local(*name, local, LocalKind::Var);
            }
            StmtKind::Expr(e) => {
                self.expr(*e);
            }
            StmtKind::Return(value) => {
                let found = value.map_or(TypeId::VOID, |e| self.expr(e));
                if !self.solver.convertible(&self.env, found, self.ret, true) {
                    self.error(
                        BodyError::Mismatch {
                            expected: self.ret,
                            found,
                        },
                        span,
                    );
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let ct = self.expr(*cond);
                if !self.solver.convertible(&self.env, ct, TypeId::BOOL, true) {
                    self.error(
                        BodyError::Mismatch {
                            expected: TypeId::BOOL,
                            found: ct,
                        },
                        span,
                    );
                }
                // `if (T is I)` lets the then-branch rely on the test.
                let saved = self.static_test(*cond).map(|test| {
                    let saved = self.env.clone();
                    self.assume_test(test);
                    saved
                });
                self.scoped(|c| c.stmt(*then_branch));
                if let Some(saved) = saved {
                    self.env = saved;
                }
                if let Some(e) = else_branch {
                    self.scoped(|c| c.stmt(*e));
                }
            }
            StmtKind::Block(stmts) => self.scoped(|c| {
                for &s in stmts {
                    c.stmt(s);
                }
            }),
        }
    }

    fn static_test(&self, cond: ExprId) -> Option<TypeTest> {
        self.out.type_tests.get(&cond).copied()
    }

    fn assume_test(&mut self, test: TypeTest) {
        if test.subject.is_error() || test.target.is_error() {
            return;
        }
        if self.resolver.interface_decl(test.target).is_some() {
            self.env.assume_conforms(test.subject, test.target);
        } else {
            self.env.assume_equal(test.subject, test.target);
        }
    }
}
