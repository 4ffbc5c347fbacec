//! Human-readable type rendering.
//!
//! The same rendering is used for diagnostics and for mangled instance
//! names, so it is deterministic and free of whitespace inside argument
//! lists: `TestStruct<float,10>`, `vector<T,N>`, `Tuple<expand each T>`.

use umbra_ir::{Name, StringInterner};

use crate::{ArrayLen, DeclId, GenericArg, ParamRef, TypeData, TypeId, TypeInterner, ValueArg};

/// Source names for the identities that appear inside types.
pub trait TypeNames {
    fn decl_name(&self, decl: DeclId) -> Name;
    fn param_name(&self, param: ParamRef) -> Name;
    fn enum_case_name(&self, decl: DeclId, case: u32) -> Name;
}

pub struct TypeFormatter<'a> {
    types: &'a TypeInterner,
    strings: &'a StringInterner,
    names: &'a dyn TypeNames,
}

impl<'a> TypeFormatter<'a> {
    pub fn new(
        types: &'a TypeInterner,
        strings: &'a StringInterner,
        names: &'a dyn TypeNames,
    ) -> Self {
        TypeFormatter {
            types,
            strings,
            names,
        }
    }

    pub fn format(&self, ty: TypeId) -> String {
        let mut out = String::new();
        self.write_type(&mut out, ty);
        out
    }

    pub fn format_value(&self, value: ValueArg) -> String {
        let mut out = String::new();
        self.write_value(&mut out, value);
        out
    }

    pub fn format_arg(&self, arg: GenericArg) -> String {
        match arg {
            GenericArg::Type(ty) => self.format(ty),
            GenericArg::Value(v) => self.format_value(v),
        }
    }

    /// `name<a,b,...>`, or just `name` for an empty list.
    pub fn format_applied(&self, name: Name, args: &[GenericArg]) -> String {
        let mut out = self.strings.lookup(name).to_owned();
        self.write_args(&mut out, args);
        out
    }

    fn write_args(&self, out: &mut String, args: &[GenericArg]) {
        if args.is_empty() {
            return;
        }
        out.push('<');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            match *arg {
                GenericArg::Type(ty) => self.write_type(out, ty),
                GenericArg::Value(v) => self.write_value(out, v),
            }
        }
        out.push('>');
    }

    fn write_value(&self, out: &mut String, value: ValueArg) {
        match value {
            ValueArg::Int(n) => out.push_str(&n.to_string()),
            ValueArg::Bool(b) => out.push_str(if b { "true" } else { "false" }),
            ValueArg::Enum { decl, case } => {
                out.push_str(self.strings.lookup(self.names.decl_name(decl)));
                out.push('.');
                out.push_str(self.strings.lookup(self.names.enum_case_name(decl, case)));
            }
            ValueArg::Param(p) => out.push_str(self.strings.lookup(self.names.param_name(p))),
        }
    }

    fn write_type(&self, out: &mut String, ty: TypeId) {
        match self.types.lookup(ty) {
            TypeData::Void => out.push_str("void"),
            TypeData::Scalar(kind) => out.push_str(kind.name()),
            TypeData::Error => out.push_str("<error>"),
            TypeData::This => out.push_str("This"),
            TypeData::Vector { elem, count } => {
                out.push_str("vector<");
                self.write_type(out, elem);
                out.push(',');
                self.write_value(out, count);
                out.push('>');
            }
            TypeData::Array { elem, len } => {
                self.write_type(out, elem);
                out.push('[');
                if let ArrayLen::Sized(v) = len {
                    self.write_value(out, v);
                }
                out.push(']');
            }
            TypeData::Tuple(elems) => {
                out.push_str("Tuple<");
                for (i, &elem) in elems.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write_type(out, elem);
                }
                out.push('>');
            }
            TypeData::Named { decl, args } => {
                out.push_str(self.strings.lookup(self.names.decl_name(decl)));
                self.write_args(out, &args);
            }
            TypeData::Param(p) => out.push_str(self.strings.lookup(self.names.param_name(p))),
            TypeData::Pack(p) => {
                out.push_str("each ");
                out.push_str(self.strings.lookup(self.names.param_name(p)));
            }
            TypeData::Expand(pattern) => {
                out.push_str("expand ");
                self.write_type(out, pattern);
            }
            TypeData::Assoc { base, name } => {
                self.write_type(out, base);
                out.push('.');
                out.push_str(self.strings.lookup(name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rustc_hash::FxHashMap;

    use super::*;

    struct FixedNames {
        decls: FxHashMap<DeclId, Name>,
        params: FxHashMap<ParamRef, Name>,
    }

    impl TypeNames for FixedNames {
        fn decl_name(&self, decl: DeclId) -> Name {
            self.decls.get(&decl).copied().unwrap_or(Name::EMPTY)
        }

        fn param_name(&self, param: ParamRef) -> Name {
            self.params.get(&param).copied().unwrap_or(Name::EMPTY)
        }

        fn enum_case_name(&self, _decl: DeclId, _case: u32) -> Name {
            Name::EMPTY
        }
    }

    #[test]
    fn renders_generic_shapes() {
        let strings = StringInterner::new();
        let types = TypeInterner::new();
        let decl = DeclId::new(0);
        let t = ParamRef::new(decl, 0);
        let n = ParamRef::new(decl, 1);
        let names = FixedNames {
            decls: [(decl, strings.intern("TestStruct"))].into_iter().collect(),
            params: [(t, strings.intern("T")), (n, strings.intern("size"))]
                .into_iter()
                .collect(),
        };
        let fmt = TypeFormatter::new(&types, &strings, &names);

        let concrete = types.named(
            decl,
            vec![GenericArg::Type(TypeId::FLOAT), GenericArg::Value(ValueArg::Int(10))],
        );
        assert_eq!(fmt.format(concrete), "TestStruct<float,10>");

        let field = types.array(types.param(t), ArrayLen::Sized(ValueArg::Param(n)));
        assert_eq!(fmt.format(field), "T[size]");

        let tuple = types.tuple(vec![types.expand(types.pack(t))]);
        assert_eq!(fmt.format(tuple), "Tuple<expand each T>");

        let v = types.vector(TypeId::INT16, ValueArg::Int(1));
        assert_eq!(fmt.format(v), "vector<int16_t,1>");
        assert_eq!(fmt.format(types.array(TypeId::INT, ArrayLen::Unsized)), "int[]");
    }
}
