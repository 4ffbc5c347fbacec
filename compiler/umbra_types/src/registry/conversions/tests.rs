use proptest::prelude::*;

use super::*;
use crate::{DeclId, ValueArg};

#[test]
fn widening_is_implicit() {
    let types = TypeInterner::new();
    let conv = ConversionRegistry::new();
    assert_eq!(
        conv.conversion(&types, TypeId::INT8, TypeId::INT16),
        Some(ConversionKind::Implicit)
    );
    assert_eq!(
        conv.conversion(&types, TypeId::UINT, TypeId::FLOAT),
        Some(ConversionKind::Implicit)
    );
    assert_eq!(
        conv.conversion(&types, TypeId::DOUBLE, TypeId::INT),
        Some(ConversionKind::Explicit)
    );
}

#[test]
fn bool_needs_a_cast() {
    let types = TypeInterner::new();
    let conv = ConversionRegistry::new();
    assert!(!conv.is_implicit(&types, TypeId::BOOL, TypeId::INT));
    assert!(conv.is_explicit(&types, TypeId::BOOL, TypeId::INT));
    assert!(!conv.is_implicit(&types, TypeId::INT, TypeId::BOOL));
}

#[test]
fn vectors_convert_elementwise_at_equal_length() {
    let types = TypeInterner::new();
    let conv = ConversionRegistry::new();
    let i3 = types.vector(TypeId::INT, ValueArg::Int(3));
    let f3 = types.vector(TypeId::FLOAT, ValueArg::Int(3));
    let f4 = types.vector(TypeId::FLOAT, ValueArg::Int(4));
    assert!(conv.is_implicit(&types, i3, f3));
    assert!(!conv.is_implicit(&types, f3, i3));
    assert!(conv.is_explicit(&types, f3, i3));
    assert_eq!(conv.conversion(&types, f3, f4), None);
}

#[test]
fn user_conversions_keep_the_loosest_kind() {
    let types = TypeInterner::new();
    let mut conv = ConversionRegistry::new();
    let s = types.named(DeclId::new(4), Vec::new());
    assert_eq!(conv.conversion(&types, TypeId::INT, s), None);
    conv.register(TypeId::INT, s, false);
    assert!(!conv.is_implicit(&types, TypeId::INT, s));
    conv.register(TypeId::INT, s, true);
    assert!(conv.is_implicit(&types, TypeId::INT, s));
    conv.register(TypeId::INT, s, false);
    assert!(conv.is_implicit(&types, TypeId::INT, s));
}

#[test]
fn error_converts_silently() {
    let types = TypeInterner::new();
    let conv = ConversionRegistry::new();
    assert!(conv.is_implicit(&types, TypeId::ERROR, TypeId::BOOL));
    assert!(conv.is_implicit(&types, TypeId::FLOAT, TypeId::ERROR));
}

fn numeric() -> impl Strategy<Value = ScalarKind> {
    (1usize..ScalarKind::ALL.len()).prop_map(|i| ScalarKind::ALL[i])
}

proptest! {
    #[test]
    fn implicit_iff_rank_does_not_decrease(a in numeric(), b in numeric()) {
        let types = TypeInterner::new();
        let conv = ConversionRegistry::new();
        let implicit = conv.is_implicit(&types, a.type_id(), b.type_id());
        prop_assert_eq!(implicit, b.promotion_rank() >= a.promotion_rank());
        prop_assert!(conv.is_explicit(&types, a.type_id(), b.type_id()));
    }
}
