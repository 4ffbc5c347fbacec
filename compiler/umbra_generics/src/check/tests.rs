use pretty_assertions::assert_eq;
use umbra_ir::{BinaryOp, ExprKind, ParsedType, StmtKind};
use umbra_types::{GenericArg, ParamRef, TypeId};

use super::*;
use crate::error::{BodyError, PackPosition, Requirement};
use crate::test_support::Fixture;

/// `T add<T [: bound]>(T a, T b) { return a + b; }`
fn add_fn(f: &mut Fixture, name: &str, bound: Option<&str>) {
    let (ta, tb, ret) = (f.ty("T"), f.ty("T"), f.ty("T"));
    let (a, b) = (f.param("a", ta), f.param("b", tb));
    let (lhs, rhs) = (f.ident("a"), f.ident("b"));
    let sum = f.expr(ExprKind::Binary {
        op: BinaryOp::Add,
        lhs,
        rhs,
    });
    let body = f.ret(sum);
    let mut t = f.type_param("T");
    if let Some(bound) = bound {
        t = t.with_bound(f.ty(bound));
    }
    let decl = f.func(name, vec![a, b], ret, Some(body)).with_generics(vec![t]);
    f.add(decl);
}

/// `void name<each T>(expand each T xs) { <stmt>; }` where the statement
/// is built by `make`.
fn pack_fn(f: &mut Fixture, name: &str, make: impl FnOnce(&mut Fixture) -> ExprId) {
    let xs = f.param("xs", ParsedType::expand_each(f.name("T")));
    let e = make(f);
    let stmt = f.stmt(StmtKind::Expr(e));
    let body = f.block(vec![stmt]);
    let void = f.ty("void");
    let generics = vec![f.pack_param("T")];
    let decl = f.func(name, vec![xs], void, Some(body)).with_generics(generics);
    f.add(decl);
}

fn param_ty(f: &Fixture, decl: &str, index: u32) -> TypeId {
    f.types.param(ParamRef::new(f.decl(decl), index))
}

fn pos(p: PackPosition) -> GenericErrorKind {
    GenericErrorKind::IllegalPackPosition(p)
}

// === Operators and bounds ===

#[test]
fn operator_needs_a_bound() {
    let mut f = Fixture::new();
    add_fn(&mut f, "loose", None);
    add_fn(&mut f, "bounded", Some("IArithmetic"));
    f.register();
    assert_eq!(f.check(), 2);

    assert_eq!(
        f.errors("loose"),
        vec![GenericErrorKind::Body(BodyError::OperatorNotSupported {
            op: "+",
            ty: param_ty(&f, "loose", 0),
        })]
    );
    assert!(f.errors("bounded").is_empty());
    let checked = f.table.checked(f.decl("bounded")).unwrap();
    assert!(checked.expr_types.values().any(|&t| t == param_ty(&f, "bounded", 0)));
}

#[test]
fn static_is_test_extends_the_then_branch() {
    let mut f = Fixture::new();
    let subject = f.ty("T");
    let target = f.ty("IArithmetic");
    let cond = f.expr(ExprKind::TypeIs { subject, target });
    let (lhs, rhs) = (f.ident("x"), f.ident("x"));
    let doubled = f.expr(ExprKind::Binary {
        op: BinaryOp::Add,
        lhs,
        rhs,
    });
    let then_branch = f.ret(doubled);
    let guarded = f.stmt(StmtKind::If {
        cond,
        then_branch,
        else_branch: None,
    });
    let x = f.ident("x");
    let fallback = f.stmt(StmtKind::Return(Some(x)));
    let body = f.block(vec![guarded, fallback]);
    let (tx, ret) = (f.ty("T"), f.ty("T"));
    let x = f.param("x", tx);
    let generics = vec![f.type_param("T")];
    let decl = f.func("twice", vec![x], ret, Some(body)).with_generics(generics);
    f.add(decl);
    f.register();
    f.check();

    assert!(f.errors("twice").is_empty());
    let checked = f.table.checked(f.decl("twice")).unwrap();
    let arithmetic = f.types.named(f.table.builtins().arithmetic, Vec::<GenericArg>::new());
    assert_eq!(
        checked.type_tests.get(&cond),
        Some(&TypeTest {
            subject: param_ty(&f, "twice", 0),
            target: arithmetic,
        })
    );
}

#[test]
fn requirement_call_through_a_bound() {
    let mut f = Fixture::new();
    let float = f.ty("float");
    let requirement = f.func("area", Vec::new(), float, None);
    let shape = f.interface("IShape", vec![requirement], &[]);
    let receiver = f.ident("s");
    let area = f.name("area");
    let call = f.expr(ExprKind::MethodCall {
        receiver,
        method: area,
        args: Vec::new(),
    });
    let body = f.ret(call);
    let (ts, float) = (f.ty("T"), f.ty("float"));
    let s = f.param("s", ts);
    let bound = f.ty("IShape");
    let generics = vec![f.type_param("T").with_bound(bound)];
    let decl = f.func("measure", vec![s], float, Some(body)).with_generics(generics);
    f.add(shape);
    f.add(decl);
    f.register();
    f.check();

    assert!(f.errors("measure").is_empty());
    let ishape = f.decl("IShape");
    let checked = f.table.checked(f.decl("measure")).unwrap();
    assert_eq!(
        checked.calls[&call].callee,
        Callee::Requirement {
            interface: f.types.named(ishape, Vec::<GenericArg>::new()),
            requirement: f.table.get(ishape).members()[0],
        }
    );
    assert_eq!(checked.expr_types[&call], TypeId::FLOAT);
}

// === Packs ===

#[test]
fn each_needs_an_enclosing_expand() {
    let mut f = Fixture::new();
    pack_fn(&mut f, "stray", |f| {
        let xs = f.ident("xs");
        f.expr(ExprKind::Each(xs))
    });
    f.register();
    f.check();
    assert_eq!(f.errors("stray"), vec![pos(PackPosition::EachOutsideExpand)]);
}

#[test]
fn expand_needs_an_each() {
    let mut f = Fixture::new();
    pack_fn(&mut f, "hollow", |f| {
        let one = f.expr(ExprKind::Int(1));
        f.expr(ExprKind::Expand(one))
    });
    f.register();
    f.check();
    assert_eq!(f.errors("hollow"), vec![pos(PackPosition::ExpandWithoutEach)]);
}

#[test]
fn packs_are_used_through_each() {
    let mut f = Fixture::new();
    pack_fn(&mut f, "bare", |f| f.ident("xs"));
    pack_fn(&mut f, "scalar", |f| {
        let one = f.expr(ExprKind::Int(1));
        let each = f.expr(ExprKind::Each(one));
        f.expr(ExprKind::Expand(each))
    });
    f.register();
    f.check();
    assert_eq!(f.errors("bare"), vec![pos(PackPosition::BarePack)]);
    assert_eq!(
        f.errors("scalar"),
        vec![pos(PackPosition::NotAPack), pos(PackPosition::ExpandWithoutEach)]
    );
}

#[test]
fn countof_counts_packs_only() {
    let mut f = Fixture::new();
    pack_fn(&mut f, "counted", |f| {
        let t = f.ty("T");
        f.expr(ExprKind::CountOf(t))
    });
    let t = f.ty("T");
    let count = f.expr(ExprKind::CountOf(t));
    let body = f.ret(count);
    let (tx, int) = (f.ty("T"), f.ty("int"));
    let x = f.param("x", tx);
    let generics = vec![f.type_param("T")];
    let decl = f.func("single", vec![x], int, Some(body)).with_generics(generics);
    f.add(decl);
    f.register();
    f.check();

    assert!(f.errors("counted").is_empty());
    assert_eq!(f.errors("single"), vec![pos(PackPosition::NotAPack)]);
    let checked = f.table.checked(f.decl("counted")).unwrap();
    assert_eq!(checked.countofs.len(), 1);
}

#[test]
fn expansion_records_the_packs_it_iterates() {
    let mut f = Fixture::new();
    let decl = f.sum_ints();
    f.add(decl);
    f.register();
    assert_eq!(f.check(), 1);

    assert!(f.errors("sumInts").is_empty());
    let id = f.decl("sumInts");
    let checked = f.table.checked(id).unwrap();
    let iterated: Vec<_> = checked.expansions.values().cloned().collect();
    assert_eq!(iterated.len(), 1);
    assert_eq!(iterated[0].as_slice(), &[ParamRef::new(id, 0)]);
    assert!(checked.pack_groups.is_empty());
}

// === Plain errors ===

#[test]
fn return_value_must_convert() {
    let mut f = Fixture::new();
    let truth = f.expr(ExprKind::Bool(true));
    let body = f.ret(truth);
    let int = f.ty("int");
    let decl = f.func("answer", Vec::new(), int, Some(body));
    f.add(decl);
    let missing = f.ident("missing");
    let body = f.ret(missing);
    let int = f.ty("int");
    let decl = f.func("lost", Vec::new(), int, Some(body));
    f.add(decl);
    f.register();
    f.check();

    assert_eq!(
        f.errors("answer"),
        vec![GenericErrorKind::Body(BodyError::Mismatch {
            expected: TypeId::INT,
            found: TypeId::BOOL,
        })]
    );
    assert_eq!(
        f.errors("lost"),
        vec![GenericErrorKind::Body(BodyError::UnknownIdent {
            name: f.name("missing")
        })]
    );
}

// === Calls ===

#[test]
fn generic_calls_are_bound_and_validated() {
    let mut f = Fixture::new();
    let decl = f.sum_ints();
    f.add(decl);
    let args = vec![
        f.expr(ExprKind::Int(1)),
        f.expr(ExprKind::Int(2)),
        f.expr(ExprKind::Int(3)),
    ];
    let good = f.call("sumInts", args);
    let body = f.ret(good);
    let int = f.ty("int");
    let decl = f.func("total", Vec::new(), int, Some(body));
    f.add(decl);
    let args = vec![
        f.expr(ExprKind::Int(1)),
        f.expr(ExprKind::Float(2.5f64.to_bits())),
    ];
    let bad = f.call("sumInts", args);
    let body = f.ret(bad);
    let int = f.ty("int");
    let decl = f.func("mixed", Vec::new(), int, Some(body));
    f.add(decl);
    f.register();
    assert_eq!(f.check(), 3);

    let sum_ints = f.decl("sumInts");
    assert!(f.errors("total").is_empty());
    let checked = f.table.checked(f.decl("total")).unwrap();
    let resolution = &checked.calls[&good];
    assert_eq!(resolution.callee, Callee::Decl(sum_ints));
    assert_eq!(
        resolution.binding.pack_of(ParamRef::new(sum_ints, 0)),
        Some(&[TypeId::INT; 3][..])
    );

    let errors = f.table.errors_for(f.decl("mixed"));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].span, f.table.arena(f.decl("mixed")).expr(bad).span);
    assert_eq!(
        errors[0].kind,
        GenericErrorKind::UnsatisfiedConstraint {
            subject: TypeId::FLOAT,
            requirement: Requirement::Equals(TypeId::INT),
            declared_at: f.table.get(sum_ints).constraints[0].span,
        }
    );
}

#[test]
fn poisoned_and_bodiless_declarations_are_skipped() {
    let mut f = Fixture::new();
    let body = f.block(Vec::new());
    let void = f.ty("void");
    let generics = vec![f.pack_param("T"), f.type_param("U")];
    let broken = f.func("broken", Vec::new(), void, Some(body)).with_generics(generics);
    let void = f.ty("void");
    let declared = f.func("declared", Vec::new(), void, None);
    let body = f.block(Vec::new());
    let void = f.ty("void");
    let fine = f.func("fine", Vec::new(), void, Some(body));
    f.add(broken);
    f.add(declared);
    f.add(fine);
    f.register();

    assert_eq!(f.check(), 1);
    assert!(f.table.checked(f.decl("broken")).is_none());
    assert!(f.table.checked(f.decl("fine")).is_some());
    // Already checked bodies are not checked again.
    assert_eq!(f.check(), 0);
}
