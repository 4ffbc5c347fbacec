//! Interned type payloads.

use umbra_ir::Name;

use crate::{DeclId, ParamRef, ScalarKind, TypeId};

/// Structure of an interned type.
///
/// Generic parameters appear as rigid `Param`/`Pack` leaves; a type is
/// concrete once none of those (nor `Assoc` or `This`) remain.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeData {
    Void,
    Scalar(ScalarKind),
    Error,
    /// The conforming type inside an interface.
    This,
    /// `vector<elem, count>`.
    Vector { elem: TypeId, count: ValueArg },
    Array { elem: TypeId, len: ArrayLen },
    /// `Tuple<...>`; elements may be `Expand` before specialization.
    Tuple(Box<[TypeId]>),
    /// A struct, interface or enum applied to its arguments.
    ///
    /// Pack arguments are flattened: a declaration `S<A, each P>` bound with
    /// `P = [x, y]` has `args = [A, x, y]`.
    Named {
        decl: DeclId,
        args: Box<[GenericArg]>,
    },
    /// A type parameter.
    Param(ParamRef),
    /// One element of a type pack, as denoted by `each T`.
    Pack(ParamRef),
    /// `expand pattern`: a sequence with one entry per pack element.
    Expand(TypeId),
    /// Associated type projection `base.name`.
    Assoc { base: TypeId, name: Name },
}

/// A compile-time value argument.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
pub enum ValueArg {
    Int(i64),
    Bool(bool),
    Enum { decl: DeclId, case: u32 },
    /// A value generic parameter.
    Param(ParamRef),
}

impl ValueArg {
    #[inline]
    pub fn is_concrete(self) -> bool {
        !matches!(self, ValueArg::Param(_))
    }

    #[inline]
    pub fn as_int(self) -> Option<i64> {
        match self {
            ValueArg::Int(n) => Some(n),
            _ => None,
        }
    }
}

/// Length of an array type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ArrayLen {
    /// `T[]`.
    Unsized,
    Sized(ValueArg),
}

/// One argument in a generic argument list.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum GenericArg {
    Type(TypeId),
    Value(ValueArg),
}

impl GenericArg {
    #[inline]
    pub fn as_type(self) -> Option<TypeId> {
        match self {
            GenericArg::Type(ty) => Some(ty),
            GenericArg::Value(_) => None,
        }
    }

    #[inline]
    pub fn as_value(self) -> Option<ValueArg> {
        match self {
            GenericArg::Value(v) => Some(v),
            GenericArg::Type(_) => None,
        }
    }
}

impl From<TypeId> for GenericArg {
    fn from(ty: TypeId) -> Self {
        GenericArg::Type(ty)
    }
}

impl From<ValueArg> for GenericArg {
    fn from(value: ValueArg) -> Self {
        GenericArg::Value(value)
    }
}
