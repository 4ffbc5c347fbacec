use pretty_assertions::assert_eq;
use umbra_ir::{Name, Span};

use super::*;
use crate::ValueArg;

fn decl(n: u32) -> DeclId {
    DeclId::new(n)
}

fn iface(id: DeclId, supers: Vec<DeclId>) -> InterfaceEntry {
    InterfaceEntry {
        decl: id,
        name: Name::from_raw(100 + id.raw()),
        supers,
        assoc_types: Vec::new(),
        requirements: FxHashMap::default(),
        span: Span::DUMMY,
    }
}

/// IComparable(0), IArithmetic(1), IInteger(2) : 1, 0, IFloat(3) : 1, 0.
fn builtin_registry() -> InterfaceRegistry {
    let mut registry = InterfaceRegistry::new();
    registry.register_interface(iface(decl(0), vec![]));
    registry.register_interface(iface(decl(1), vec![]));
    registry.register_interface(iface(decl(2), vec![decl(1), decl(0)]));
    registry.register_interface(iface(decl(3), vec![decl(1), decl(0)]));
    registry.set_builtins(BuiltinInterfaces {
        comparable: decl(0),
        arithmetic: decl(1),
        integer: decl(2),
        float: decl(3),
    });
    registry
}

#[test]
fn super_interfaces_are_transitive_and_deduplicated() {
    let mut registry = InterfaceRegistry::new();
    // 13 : 12, 11; 12 : 10; 11 : 10
    registry.register_interface(iface(decl(10), vec![]));
    registry.register_interface(iface(decl(11), vec![decl(10)]));
    registry.register_interface(iface(decl(12), vec![decl(10)]));
    registry.register_interface(iface(decl(13), vec![decl(12), decl(11)]));

    assert_eq!(
        registry.all_super_interfaces(decl(13)),
        vec![decl(12), decl(11), decl(10)]
    );
    assert!(registry.implies(decl(13), decl(10)));
    assert!(!registry.implies(decl(10), decl(13)));
}

#[test]
fn super_interface_cycles_terminate() {
    let mut registry = InterfaceRegistry::new();
    registry.register_interface(iface(decl(1), vec![decl(2)]));
    registry.register_interface(iface(decl(2), vec![decl(1)]));
    assert_eq!(registry.all_super_interfaces(decl(1)), vec![decl(2)]);
}

#[test]
fn builtin_scalar_conformances() {
    let registry = builtin_registry();
    let types = TypeInterner::new();

    assert!(registry.builtin_conforms(&types, TypeId::INT16, decl(2)));
    assert!(registry.builtin_conforms(&types, TypeId::INT16, decl(1)));
    assert!(registry.builtin_conforms(&types, TypeId::INT16, decl(0)));
    assert!(!registry.builtin_conforms(&types, TypeId::INT16, decl(3)));
    assert!(registry.builtin_conforms(&types, TypeId::DOUBLE, decl(3)));
    assert!(registry.builtin_conforms(&types, TypeId::BOOL, decl(0)));
    assert!(!registry.builtin_conforms(&types, TypeId::BOOL, decl(1)));
}

#[test]
fn numeric_vectors_are_arithmetic_only() {
    let registry = builtin_registry();
    let types = TypeInterner::new();
    let v = types.vector(TypeId::FLOAT, ValueArg::Int(3));
    assert!(registry.builtin_conforms(&types, v, decl(1)));
    assert!(!registry.builtin_conforms(&types, v, decl(0)));
    let b = types.vector(TypeId::BOOL, ValueArg::Int(3));
    assert!(!registry.builtin_conforms(&types, b, decl(1)));
}

#[test]
fn candidates_include_blanket_conformances() {
    let mut registry = InterfaceRegistry::new();
    let types = TypeInterner::new();
    let entry = |subject: TypeId, source: DeclId| ConformanceEntry {
        subject,
        interface: types.named(decl(50), Vec::new()),
        interface_decl: decl(50),
        params_of: None,
        source,
        assoc: FxHashMap::default(),
        members: Vec::new(),
        span: Span::DUMMY,
    };
    let s = types.named(decl(7), Vec::new());
    registry.register_conformance(ConformanceHead::Decl(decl(7)), entry(s, decl(7)));
    let blanket = types.param(crate::ParamRef::new(decl(8), 0));
    registry.register_conformance(ConformanceHead::Any, entry(blanket, decl(8)));

    let sources: Vec<DeclId> = registry
        .candidates(ConformanceHead::Decl(decl(7)))
        .map(|(_, c)| c.source)
        .collect();
    assert_eq!(sources, vec![decl(7), decl(8)]);

    let sources: Vec<DeclId> = registry
        .candidates(ConformanceHead::Scalar(ScalarKind::Int32))
        .map(|(_, c)| c.source)
        .collect();
    assert_eq!(sources, vec![decl(8)]);
    assert_eq!(registry.conformances_to(decl(50)).count(), 2);
}

#[test]
fn assoc_and_requirements_found_through_supers() {
    let mut registry = InterfaceRegistry::new();
    let assoc_name = Name::from_raw(900);
    let req_name = Name::from_raw(901);
    let mut base = iface(decl(1), vec![]);
    base.assoc_types.push(AssocTypeDef {
        name: assoc_name,
        bounds: Vec::new(),
        span: Span::DUMMY,
    });
    base.requirements.insert(req_name, decl(5));
    registry.register_interface(base);
    registry.register_interface(iface(decl(2), vec![decl(1)]));

    assert_eq!(
        registry.find_assoc(decl(2), assoc_name).map(|(owner, _)| owner),
        Some(decl(1))
    );
    assert_eq!(registry.find_requirement(decl(2), req_name), Some((decl(1), decl(5))));
    assert_eq!(registry.find_requirement(decl(2), assoc_name), None);
}
