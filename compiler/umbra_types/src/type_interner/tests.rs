use pretty_assertions::assert_eq;

use super::*;

fn param(owner: u32, index: u32) -> ParamRef {
    ParamRef::new(DeclId::new(owner), index)
}

#[test]
fn primitives_have_fixed_ids() {
    let interner = TypeInterner::new();
    assert_eq!(interner.intern(TypeData::Void), TypeId::VOID);
    assert_eq!(interner.intern(TypeData::Scalar(ScalarKind::Float)), TypeId::FLOAT);
    assert_eq!(interner.intern(TypeData::Error), TypeId::ERROR);
    assert_eq!(interner.lookup(TypeId::UINT8), TypeData::Scalar(ScalarKind::UInt8));
    assert_eq!(interner.lookup(TypeId::THIS), TypeData::This);
}

#[test]
fn structural_types_are_deduplicated() {
    let interner = TypeInterner::new();
    let a = interner.vector(TypeId::FLOAT, ValueArg::Int(3));
    let b = interner.vector(TypeId::FLOAT, ValueArg::Int(3));
    let c = interner.vector(TypeId::FLOAT, ValueArg::Int(4));
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(
        interner.lookup(a),
        TypeData::Vector {
            elem: TypeId::FLOAT,
            count: ValueArg::Int(3)
        }
    );
}

#[test]
fn flags_propagate_from_children() {
    let interner = TypeInterner::new();
    let t = interner.param(param(0, 0));
    let n = ValueArg::Param(param(0, 1));
    let arr = interner.array(t, ArrayLen::Sized(n));
    let flags = interner.flags(arr);
    assert!(flags.contains(TypeFlags::HAS_PARAM | TypeFlags::HAS_VALUE_PARAM));
    assert!(!interner.is_concrete(arr));

    let concrete = interner.sized_array(TypeId::FLOAT, 10);
    assert!(interner.is_concrete(concrete));

    let expanded = interner.tuple(vec![interner.expand(interner.pack(param(1, 0)))]);
    let flags = interner.flags(expanded);
    assert!(flags.contains(TypeFlags::HAS_PACK | TypeFlags::HAS_EXPAND));
}

#[test]
fn foreign_ids_read_as_error() {
    let interner = TypeInterner::new();
    let bogus = TypeId::from_shard_local(5, 999_999);
    assert_eq!(interner.lookup(bogus), TypeData::Error);
    assert!(interner.flags(bogus).has_errors());
}

#[test]
fn concurrent_interning_agrees() {
    let interner = SharedTypeInterner::new();
    let ids: Vec<Vec<TypeId>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let interner = interner.clone();
                scope.spawn(move || {
                    (0..32)
                        .map(|n| interner.sized_array(TypeId::INT, n))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .collect()
    });
    for other in &ids[1..] {
        assert_eq!(&ids[0], other);
    }
}
