use pretty_assertions::assert_eq;
use proptest::prelude::*;
use umbra_ir::{ParsedArg, ParsedType, Span};
use umbra_types::{GenericArg, ParamRef, ScalarKind, TypeId, TypeInterner, ValueArg};

use super::*;
use crate::config::GenericsConfig;
use crate::test_support::Fixture;

const USE: Span = Span::new(1000, 1001);

fn bind(
    f: &Fixture,
    name: &str,
    explicit: &[GenericArg],
    args: Option<&[TypeId]>,
) -> Result<BindingSet, GenericError> {
    let solver = Solver::new(&f.table, &f.types, &f.config);
    let binder = Binder::new(&f.table, &f.types, &solver, &f.config);
    let outer = BindingSet::new();
    let mut req = BindRequest::new(f.decl(name), &outer, USE).with_explicit(explicit);
    if let Some(args) = args {
        req = req.with_args(args);
    }
    binder.bind(&Assumptions::new(), &req)
}

fn kind_of(result: Result<BindingSet, GenericError>) -> GenericErrorKind {
    let err = result.unwrap_err();
    assert_eq!(err.span, USE);
    err.kind
}

/// `T pick<T>(T a, T b)`.
fn with_pick(f: &mut Fixture) {
    let (ta, tb, ret) = (f.ty("T"), f.ty("T"), f.ty("T"));
    let (a, b) = (f.param("a", ta), f.param("b", tb));
    let generics = vec![f.type_param("T")];
    let decl = f.func("pick", vec![a, b], ret, None).with_generics(generics);
    f.add(decl);
    f.register();
}

// === Inference ===

#[test]
fn conflicting_scalars_join_by_promotion_rank() {
    let mut f = Fixture::new();
    with_pick(&mut f);
    let binding = bind(&f, "pick", &[], Some(&[TypeId::INT16, TypeId::INT8])).unwrap();
    assert_eq!(
        binding.type_of(ParamRef::new(f.decl("pick"), 0)),
        Some(TypeId::INT16)
    );
}

#[test]
fn bool_never_joins_a_number() {
    let mut f = Fixture::new();
    with_pick(&mut f);
    assert_eq!(
        kind_of(bind(&f, "pick", &[], Some(&[TypeId::BOOL, TypeId::INT]))),
        GenericErrorKind::AmbiguousTypeArgument {
            param: f.name("T"),
            candidates: vec![TypeId::BOOL, TypeId::INT],
        }
    );
}

#[test]
fn conflicting_array_lengths_are_ambiguous() {
    let mut f = Fixture::new();
    let sized = |f: &Fixture| ParsedType::array(f.ty("int"), ParsedArg::Type(f.ty("N")));
    let (ta, tb) = (sized(&f), sized(&f));
    let (a, b) = (f.param("a", ta), f.param("b", tb));
    let int = f.ty("int");
    let generics = vec![f.value_param("N", "uint")];
    let decl = f.func("len", vec![a, b], int, None).with_generics(generics);
    f.add(decl);
    f.register();

    let args = [f.types.sized_array(TypeId::INT, 7), f.types.sized_array(TypeId::INT, 6)];
    assert_eq!(
        kind_of(bind(&f, "len", &[], Some(&args))),
        GenericErrorKind::AmbiguousValueArgument {
            param: f.name("N"),
            candidates: vec![ValueArg::Int(7), ValueArg::Int(6)],
        }
    );

    let agreeing = [f.types.sized_array(TypeId::INT, 7); 2];
    let binding = bind(&f, "len", &[], Some(&agreeing)).unwrap();
    assert_eq!(
        binding.value_of(ParamRef::new(f.decl("len"), 0)),
        Some(ValueArg::Int(7))
    );
}

#[test]
fn pack_absorbs_every_argument() {
    let mut f = Fixture::new();
    let decl = f.sum_ints();
    f.add(decl);
    f.register();

    let args = [TypeId::INT; 7];
    let binding = bind(&f, "sumInts", &[], Some(&args)).unwrap();
    assert_eq!(
        binding.pack_of(ParamRef::new(f.decl("sumInts"), 0)),
        Some(&args[..])
    );
}

#[test]
fn unconstrained_pack_is_empty_when_configured() {
    let mut f = Fixture::new();
    let void = f.ty("void");
    let generics = vec![f.pack_param("T")];
    let decl = f.func("tail", Vec::new(), void, None).with_generics(generics);
    f.add(decl);
    f.register();

    let binding = bind(&f, "tail", &[], Some(&[])).unwrap();
    assert_eq!(binding.pack_of(ParamRef::new(f.decl("tail"), 0)), Some(&[][..]));

    f.config = GenericsConfig::default().with_empty_pack_when_uninferred(false);
    assert_eq!(
        kind_of(bind(&f, "tail", &[], Some(&[]))),
        GenericErrorKind::UninferredParameter { param: f.name("T") }
    );
}

#[test]
fn parameter_without_evidence_is_uninferred() {
    let mut f = Fixture::new();
    let t = f.ty("T");
    let generics = vec![f.type_param("T")];
    let decl = f.func("make", Vec::new(), t, None).with_generics(generics);
    f.add(decl);
    f.register();

    assert_eq!(
        kind_of(bind(&f, "make", &[], Some(&[]))),
        GenericErrorKind::UninferredParameter { param: f.name("T") }
    );
    let binding = bind(&f, "make", &[GenericArg::Type(TypeId::FLOAT)], Some(&[])).unwrap();
    assert_eq!(binding.type_of(ParamRef::new(f.decl("make"), 0)), Some(TypeId::FLOAT));
}

// === Explicit arguments ===

#[test]
fn explicit_arguments_bind_in_order() {
    let mut f = Fixture::new();
    let decl = f.test_struct();
    f.add(decl);
    f.register();

    let id = f.decl("TestStruct");
    let explicit = [GenericArg::Type(TypeId::FLOAT), GenericArg::Value(ValueArg::Int(10))];
    let binding = bind(&f, "TestStruct", &explicit, None).unwrap();
    assert_eq!(binding.type_of(ParamRef::new(id, 0)), Some(TypeId::FLOAT));
    assert_eq!(binding.value_of(ParamRef::new(id, 1)), Some(ValueArg::Int(10)));
    assert_eq!(binding.args_for(id), explicit.to_vec());
}

#[test]
fn too_many_explicit_arguments() {
    let mut f = Fixture::new();
    let decl = f.test_struct();
    f.add(decl);
    f.register();

    let explicit = [
        GenericArg::Type(TypeId::FLOAT),
        GenericArg::Value(ValueArg::Int(10)),
        GenericArg::Type(TypeId::INT),
    ];
    assert_eq!(
        kind_of(bind(&f, "TestStruct", &explicit, None)),
        GenericErrorKind::TooManyArguments {
            expected: 2,
            found: 3
        }
    );
}

#[test]
fn explicit_argument_of_the_wrong_kind() {
    let mut f = Fixture::new();
    let decl = f.test_struct();
    f.add(decl);
    f.register();

    let swapped = [GenericArg::Value(ValueArg::Int(10)), GenericArg::Type(TypeId::FLOAT)];
    assert_eq!(
        kind_of(bind(&f, "TestStruct", &swapped, None)),
        GenericErrorKind::ArgumentKindMismatch {
            param: f.name("T"),
            expected: ParamKind::Type,
        }
    );
    let bool_len = [GenericArg::Type(TypeId::FLOAT), GenericArg::Value(ValueArg::Bool(true))];
    assert_eq!(
        kind_of(bind(&f, "TestStruct", &bool_len, None)),
        GenericErrorKind::ArgumentKindMismatch {
            param: f.name("size"),
            expected: ParamKind::Value,
        }
    );
}

#[test]
fn defaults_fill_what_is_left() {
    let mut f = Fixture::new();
    let u_default = f.ty("T");
    let generics = vec![
        f.type_param("T"),
        f.type_param("U").with_default_type(u_default),
        f.value_param("N", "int").with_default_value(ParsedArg::Int(4)),
    ];
    let decl = f.structure("Triple", Vec::new()).with_generics(generics);
    f.add(decl);
    f.register();

    let id = f.decl("Triple");
    let binding = bind(&f, "Triple", &[GenericArg::Type(TypeId::DOUBLE)], None).unwrap();
    assert_eq!(
        binding.args_for(id),
        vec![
            GenericArg::Type(TypeId::DOUBLE),
            GenericArg::Type(TypeId::DOUBLE),
            GenericArg::Value(ValueArg::Int(4)),
        ]
    );
}

// === Argument checks ===

#[test]
fn argument_count_must_match() {
    let mut f = Fixture::new();
    with_pick(&mut f);
    assert_eq!(
        kind_of(bind(&f, "pick", &[], Some(&[TypeId::INT]))),
        GenericErrorKind::ArgumentCountMismatch {
            expected: 2,
            found: 1
        }
    );
}

#[test]
fn arguments_must_convert_implicitly() {
    let mut f = Fixture::new();
    let (t, int, void) = (f.ty("T"), f.ty("int"), f.ty("void"));
    let (a, b) = (f.param("a", t), f.param("b", int));
    let generics = vec![f.type_param("T")];
    let decl = f.func("mixed", vec![a, b], void, None).with_generics(generics);
    f.add(decl);
    f.register();

    assert!(bind(&f, "mixed", &[], Some(&[TypeId::FLOAT, TypeId::INT8])).is_ok());
    assert_eq!(
        kind_of(bind(&f, "mixed", &[], Some(&[TypeId::FLOAT, TypeId::FLOAT]))),
        GenericErrorKind::ArgumentTypeMismatch {
            index: 1,
            expected: TypeId::INT,
            found: TypeId::FLOAT,
        }
    );
}

#[test]
fn poisoned_declarations_do_not_bind() {
    let mut f = Fixture::new();
    let generics = vec![f.pack_param("T"), f.type_param("U")];
    let void = f.ty("void");
    let decl = f.func("broken", Vec::new(), void, None).with_generics(generics);
    f.add(decl);
    f.register();

    assert_eq!(
        kind_of(bind(&f, "broken", &[], Some(&[]))),
        GenericErrorKind::DeclarationPoisoned {
            decl: f.decl("broken")
        }
    );
}

// === Candidate unification ===

#[test]
fn scalars_join_one_element_vectors_only() {
    let types = TypeInterner::new();
    let vec1 = types.vector(TypeId::FLOAT, ValueArg::Int(1));
    let vec3 = types.vector(TypeId::FLOAT, ValueArg::Int(3));
    assert_eq!(unify_candidates(&types, &[TypeId::INT, vec1]), Some(vec1));
    assert_eq!(unify_candidates(&types, &[TypeId::INT, vec3]), None);
    assert_eq!(
        unify_candidates(&types, &[types.vector(TypeId::INT, ValueArg::Int(3)), vec3]),
        Some(vec3)
    );
    assert_eq!(unify_candidates(&types, &[]), None);
}

proptest! {
    #[test]
    fn numeric_candidates_join_upward(a in 1usize..11, b in 1usize..11) {
        let types = TypeInterner::new();
        let (ka, kb) = (ScalarKind::ALL[a], ScalarKind::ALL[b]);
        let joined = unify_candidates(&types, &[types.scalar(ka), types.scalar(kb)]);
        prop_assert_eq!(joined, Some(types.scalar(ka.max(kb))));
    }

    #[test]
    fn bool_only_joins_itself(a in 0usize..11) {
        let types = TypeInterner::new();
        let k = ScalarKind::ALL[a];
        let joined = unify_candidates(&types, &[TypeId::BOOL, types.scalar(k)]);
        prop_assert_eq!(joined.is_some(), k == ScalarKind::Bool);
    }
}
