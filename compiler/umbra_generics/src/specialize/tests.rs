use pretty_assertions::assert_eq;
use proptest::prelude::*;
use umbra_ir::{DeclKind, ExprKind, ParsedArg, ParsedType, StmtKind};
use umbra_types::{ParamRef, ValueArg};

use super::*;
use crate::binding::Bound;
use crate::test_support::Fixture;

const USE: Span = Span::new(1000, 1001);

fn specialize(
    f: &Fixture,
    cache: &InstantiationCache,
    decl: DeclId,
    binding: &BindingSet,
) -> Result<Arc<Instantiation>, GenericError> {
    Specializer::new(&f.table, &f.types, &f.strings, &f.config, cache).specialize(decl, binding, USE)
}

fn test_struct(f: &mut Fixture) -> DeclId {
    let decl = f.test_struct();
    f.add(decl);
    f.register();
    f.decl("TestStruct")
}

fn sized(decl: DeclId, elem: TypeId, size: i64) -> BindingSet {
    let mut binding = BindingSet::new();
    binding.bind(ParamRef::new(decl, 0), Bound::Type(elem));
    binding.bind(ParamRef::new(decl, 1), Bound::Value(ValueArg::Int(size)));
    binding
}

fn of_type(decl: DeclId, ty: TypeId) -> BindingSet {
    let mut binding = BindingSet::new();
    binding.bind(ParamRef::new(decl, 0), Bound::Type(ty));
    binding
}

fn function(instance: &Instantiation) -> &MonoFunction {
    match &instance.entity {
        Entity::Function(func) => func,
        other => panic!("expected a function, got {other:?}"),
    }
}

/// Every statement of `func`'s body, blocks flattened.
fn statements(func: &MonoFunction) -> Vec<MonoStmt> {
    let mut out = Vec::new();
    if let Some(body) = &func.body {
        body.walk(&mut |s| out.push(s.clone()));
    }
    out
}

// === Structs ===

#[test]
fn value_argument_sizes_the_field() {
    let mut f = Fixture::new();
    let id = test_struct(&mut f);
    let cache = InstantiationCache::new();

    let instance = specialize(&f, &cache, id, &sized(id, TypeId::FLOAT, 10)).unwrap();
    assert_eq!(instance.name, "TestStruct<float,10>");
    let Entity::Struct { ty, fields, nested } = &instance.entity else {
        panic!("expected a struct");
    };
    assert_eq!(
        *ty,
        f.types.named(
            id,
            vec![GenericArg::Type(TypeId::FLOAT), GenericArg::Value(ValueArg::Int(10))]
        )
    );
    assert_eq!(fields, &vec![(f.name("data"), f.types.sized_array(TypeId::FLOAT, 10))]);
    assert!(nested.is_empty());

    let empty = specialize(&f, &cache, id, &sized(id, TypeId::FLOAT, 0)).unwrap();
    let Entity::Struct { fields, .. } = &empty.entity else {
        panic!("expected a struct");
    };
    assert_eq!(fields[0].1, f.types.sized_array(TypeId::FLOAT, 0));
}

#[test]
fn self_referential_struct_names_itself() {
    let mut f = Fixture::new();
    let node = ParsedType::named_with_args(f.name("Node"), vec![ParsedArg::Type(f.ty("T"))]);
    let fields = vec![("value", f.ty("T")), ("next", ParsedType::unsized_array(node))];
    let generics = vec![f.type_param("T")];
    let decl = f.structure("Node", fields).with_generics(generics);
    f.add(decl);
    f.register();

    let id = f.decl("Node");
    let cache = InstantiationCache::new();
    let instance = specialize(&f, &cache, id, &of_type(id, TypeId::INT)).unwrap();
    let Entity::Struct { nested, .. } = &instance.entity else {
        panic!("expected a struct");
    };
    assert_eq!(nested, &vec![instance.id]);
    assert_eq!(cache.len(), 1);
}

// === Cache ===

#[test]
fn equal_bindings_share_one_instance() {
    let mut f = Fixture::new();
    let id = test_struct(&mut f);
    let cache = InstantiationCache::new();

    let first = specialize(&f, &cache, id, &sized(id, TypeId::INT, 4)).unwrap();
    let again = specialize(&f, &cache, id, &sized(id, TypeId::INT, 4)).unwrap();
    let other = specialize(&f, &cache, id, &sized(id, TypeId::INT, 5)).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_ne!(first.id, other.id);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(first.id), Some(first));
}

#[test]
fn concurrent_first_use_builds_once() {
    let mut f = Fixture::new();
    let id = test_struct(&mut f);
    let cache = InstantiationCache::new();
    let binding = sized(id, TypeId::FLOAT, 3);

    let instances: Vec<Arc<Instantiation>> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| s.spawn(|| specialize(&f, &cache, id, &binding).unwrap()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    assert_eq!(cache.len(), 1);
    assert_eq!(instances[0].name, "TestStruct<float,3>");
}

#[test]
fn cached_failure_is_reported_at_each_use() {
    let mut f = Fixture::new();
    let decl = f.sum_ints();
    f.add(decl);
    f.register();
    f.check();

    let id = f.decl("sumInts");
    let mut binding = BindingSet::new();
    binding.bind(
        ParamRef::new(id, 0),
        Bound::Pack(smallvec::smallvec![TypeId::INT, TypeId::FLOAT]),
    );
    let cache = InstantiationCache::new();
    let specializer = Specializer::new(&f.table, &f.types, &f.strings, &f.config, &cache);
    let (first, second) = (Span::new(10, 11), Span::new(20, 21));
    let a = specializer.specialize(id, &binding, first).unwrap_err();
    let b = specializer.specialize(id, &binding, second).unwrap_err();
    assert_eq!(a.span, first);
    assert_eq!(b.span, second);
    assert_eq!(a.kind, b.kind);
    assert!(cache.is_empty());
}

proptest! {
    #[test]
    fn instance_per_distinct_size(sizes in proptest::collection::vec(0i64..8, 1..12)) {
        let mut f = Fixture::new();
        let id = test_struct(&mut f);
        let cache = InstantiationCache::new();
        let mut distinct = sizes.clone();
        distinct.sort_unstable();
        distinct.dedup();

        for &n in &sizes {
            specialize(&f, &cache, id, &sized(id, TypeId::DOUBLE, n)).unwrap();
        }
        prop_assert_eq!(cache.len(), distinct.len());
        let mut names: Vec<String> = cache.snapshot().iter().map(|i| i.name.clone()).collect();
        names.sort();
        names.dedup();
        prop_assert_eq!(names.len(), distinct.len());
    }
}

// === Functions ===

#[test]
fn expansion_unrolls_once_per_element() {
    let mut f = Fixture::new();
    let decl = f.sum_ints();
    f.add(decl);
    f.register();
    f.check();

    let id = f.decl("sumInts");
    let mut binding = BindingSet::new();
    binding.bind(ParamRef::new(id, 0), Bound::Pack(smallvec::smallvec![TypeId::INT; 7]));
    let cache = InstantiationCache::new();
    let instance = specialize(&f, &cache, id, &binding).unwrap();
    let func = function(&instance);

    let terms = f.name("terms");
    let expected: Vec<MonoParam> = (0..7)
        .map(|k| MonoParam {
            var: MonoVar {
                name: terms,
                element: Some(k),
            },
            ty: TypeId::INT,
        })
        .collect();
    assert_eq!(func.params, expected);
    assert_eq!(func.ret, TypeId::INT);

    let additions: Vec<Option<u32>> = statements(func)
        .iter()
        .filter_map(|s| match s {
            MonoStmt::Expr(MonoExpr {
                kind: MonoExprKind::Assign { value, .. },
                ..
            }) => match value.kind {
                MonoExprKind::Var(var) => Some(var.element),
                _ => None,
            },
            _ => None,
        })
        .collect();
    assert_eq!(additions, (0..7).map(Some).collect::<Vec<_>>());
}

#[test]
fn packs_expanded_together_must_have_one_length() {
    let mut f = Fixture::new();
    let pattern = ParsedType::named_with_args(
        f.name("Tuple"),
        vec![
            ParsedArg::Type(ParsedType::each(f.ty("T"))),
            ParsedArg::Type(ParsedType::each(f.ty("U"))),
        ],
    );
    let pairs = f.param("pairs", ParsedType::expand(pattern));
    let void = f.ty("void");
    let generics = vec![f.pack_param("T"), f.pack_param("U")];
    let decl = f.func("zip", vec![pairs], void, None).with_generics(generics);
    f.add(decl);
    f.register();

    let id = f.decl("zip");
    let (t, u) = (ParamRef::new(id, 0), ParamRef::new(id, 1));
    let mut binding = BindingSet::new();
    binding.bind(t, Bound::Pack(smallvec::smallvec![TypeId::INT; 2]));
    binding.bind(u, Bound::Pack(smallvec::smallvec![TypeId::FLOAT]));
    let cache = InstantiationCache::new();
    let expected = GenericError::new(
        GenericErrorKind::ArityMismatch {
            lengths: vec![(t, 2), (u, 1)],
        },
        USE,
    );
    assert_eq!(specialize(&f, &cache, id, &binding).unwrap_err(), expected);
    // The failure is remembered for the key.
    assert_eq!(specialize(&f, &cache, id, &binding).unwrap_err(), expected);
    assert!(cache.is_empty());
}

#[test]
fn static_type_test_selects_one_branch() {
    let mut f = Fixture::new();
    let subject = f.ty("T");
    let target = f.ty("IInteger");
    let cond = f.expr(ExprKind::TypeIs { subject, target });
    let one = f.expr(ExprKind::Int(1));
    let then_branch = f.ret(one);
    let two = f.expr(ExprKind::Int(2));
    let else_branch = f.ret(two);
    let branch = f.stmt(StmtKind::If {
        cond,
        then_branch,
        else_branch: Some(else_branch),
    });
    let body = f.block(vec![branch]);
    let (tx, int) = (f.ty("T"), f.ty("int"));
    let x = f.param("x", tx);
    let generics = vec![f.type_param("T")];
    let decl = f.func("pick", vec![x], int, Some(body)).with_generics(generics);
    f.add(decl);
    f.register();
    f.check();

    let id = f.decl("pick");
    let cache = InstantiationCache::new();
    let returned = |ty: TypeId| -> Vec<MonoStmt> {
        let instance = specialize(&f, &cache, id, &of_type(id, ty)).unwrap();
        statements(function(&instance))
            .into_iter()
            .filter(|s| matches!(s, MonoStmt::Return(_) | MonoStmt::If { .. }))
            .collect()
    };
    let int_return = |v: i64| {
        MonoStmt::Return(Some(MonoExpr {
            kind: MonoExprKind::Int(v),
            ty: TypeId::INT,
        }))
    };
    assert_eq!(returned(TypeId::UINT), vec![int_return(1)]);
    assert_eq!(returned(TypeId::DOUBLE), vec![int_return(2)]);
}

#[test]
fn polymorphic_recursion_hits_the_depth_limit() {
    let mut f = Fixture::new();
    let x = f.ident("x");
    let wrapped = f.expr(ExprKind::Tuple(vec![x]));
    let call = f.call("grow", vec![wrapped]);
    let stmt = f.stmt(StmtKind::Expr(call));
    let body = f.block(vec![stmt]);
    let (tx, void) = (f.ty("T"), f.ty("void"));
    let x = f.param("x", tx);
    let generics = vec![f.type_param("T")];
    let decl = f.func("grow", vec![x], void, Some(body)).with_generics(generics);
    f.add(decl);
    f.register();
    assert_eq!(f.check(), 1);
    assert!(f.errors("grow").is_empty());
    f.config = GenericsConfig::default().with_max_instantiation_depth(8);

    let id = f.decl("grow");
    let cache = InstantiationCache::new();
    let err = specialize(&f, &cache, id, &of_type(id, TypeId::INT)).unwrap_err();
    assert_eq!(err.kind, GenericErrorKind::InstantiationDepthExceeded { limit: 8 });
    assert!(cache.is_empty());
}

#[test]
fn member_of_generic_struct_is_named_by_its_owner() {
    let mut f = Fixture::new();
    let this = f.ident("this");
    let value = f.name("value");
    let field = f.expr(ExprKind::Field { base: this, name: value });
    let body = f.ret(field);
    let t = f.ty("T");
    let get = f.func("get", Vec::new(), t, Some(body));
    let t = f.ty("T");
    let generics = vec![f.type_param("T")];
    let mut boxed = f.structure("Box", vec![("value", t)]).with_generics(generics);
    if let DeclKind::Struct(s) = &mut boxed.kind {
        s.members.push(get);
    }
    f.add(boxed);
    f.register();
    f.check();

    let owner = f.decl("Box");
    let get = f.table.get(owner).members()[0];
    let cache = InstantiationCache::new();
    let instance = specialize(&f, &cache, get, &of_type(owner, TypeId::INT)).unwrap();
    assert_eq!(instance.name, "Box<int>.get");
    let func = function(&instance);
    let boxed_int = f.types.named(owner, vec![GenericArg::Type(TypeId::INT)]);
    assert_eq!(func.this, Some(boxed_int));
    assert_eq!(func.ret, TypeId::INT);
    assert!(statements(func).contains(&MonoStmt::Return(Some(MonoExpr {
        kind: MonoExprKind::Field {
            base: Box::new(MonoExpr {
                kind: MonoExprKind::This,
                ty: boxed_int,
            }),
            name: value,
        },
        ty: TypeId::INT,
    }))));
}
