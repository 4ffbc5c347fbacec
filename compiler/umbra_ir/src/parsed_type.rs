//! Parsed type syntax.
//!
//! `ParsedType` preserves type annotations exactly as written. The
//! declaration table resolves them into interned types once the names in
//! scope (generic parameters, declarations, builtins) are known.

use crate::Name;

/// A type expression as written in source.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum ParsedType {
    /// A named type with optional generic arguments: `float`,
    /// `vector<float, 3>`, `TestStruct<T, size>`.
    Named { name: Name, args: Vec<ParsedArg> },

    /// Array type `elem[len]`; `None` is an unsized array `elem[]`.
    Array {
        elem: Box<ParsedType>,
        len: Option<Box<ParsedArg>>,
    },

    /// `Tuple<A, B, ...>`.
    Tuple(Vec<ParsedType>),

    /// Associated type projection: `T.Assoc`.
    Member { base: Box<ParsedType>, name: Name },

    /// `This` inside an interface.
    This,

    /// `each T`: one element of a type pack.
    Each(Box<ParsedType>),

    /// `expand P`: a pack-shaped type built from `each` sub-forms.
    Expand(Box<ParsedType>),
}

/// An argument inside `<...>` or an array length.
///
/// A bare identifier is always parsed as [`ParsedArg::Type`]; whether it
/// names a type or a value parameter is decided during resolution.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum ParsedArg {
    Type(ParsedType),
    Int(i64),
    Bool(bool),
    /// `Enum.Case`.
    EnumCase { ty: Name, case: Name },
}

impl ParsedType {
    #[inline]
    pub fn named(name: Name) -> Self {
        ParsedType::Named {
            name,
            args: Vec::new(),
        }
    }

    #[inline]
    pub fn named_with_args(name: Name, args: Vec<ParsedArg>) -> Self {
        ParsedType::Named { name, args }
    }

    #[inline]
    pub fn array(elem: ParsedType, len: ParsedArg) -> Self {
        ParsedType::Array {
            elem: Box::new(elem),
            len: Some(Box::new(len)),
        }
    }

    #[inline]
    pub fn unsized_array(elem: ParsedType) -> Self {
        ParsedType::Array {
            elem: Box::new(elem),
            len: None,
        }
    }

    #[inline]
    pub fn member(base: ParsedType, name: Name) -> Self {
        ParsedType::Member {
            base: Box::new(base),
            name,
        }
    }

    #[inline]
    pub fn each(inner: ParsedType) -> Self {
        ParsedType::Each(Box::new(inner))
    }

    #[inline]
    pub fn expand(inner: ParsedType) -> Self {
        ParsedType::Expand(Box::new(inner))
    }

    /// `expand each T`, the usual spelling of a pack-typed parameter.
    #[inline]
    pub fn expand_each(pack: Name) -> Self {
        Self::expand(Self::each(Self::named(pack)))
    }

    /// Whether an `expand` appears anywhere in this type.
    pub fn contains_expand(&self) -> bool {
        match self {
            ParsedType::Expand(_) => true,
            ParsedType::Named { args, .. } => args.iter().any(|a| match a {
                ParsedArg::Type(t) => t.contains_expand(),
                _ => false,
            }),
            ParsedType::Array { elem, .. } => elem.contains_expand(),
            ParsedType::Tuple(elems) => elems.iter().any(ParsedType::contains_expand),
            ParsedType::Member { base, .. } | ParsedType::Each(base) => base.contains_expand(),
            ParsedType::This => false,
        }
    }
}

impl From<ParsedType> for ParsedArg {
    fn from(ty: ParsedType) -> Self {
        ParsedArg::Type(ty)
    }
}
