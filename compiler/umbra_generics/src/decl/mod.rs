//! Declaration table.
//!
//! Every generic declaration of every registered module, resolved into
//! interned types. Registration runs in passes so that declarations may
//! refer to each other in any order:
//!
//! ```text
//! register_module
//!     ├── Pass 1: declare
//!     │     └── allocate DeclIds (members after their owner), parameter
//!     │         names and kinds, global names
//!     ├── Pass 2: parameters
//!     │     └── defaults, value parameter types, pack position
//!     ├── Pass 3: aliases
//!     │     └── resolve typealias targets, in source order
//!     └── Pass 4: define
//!           ├── shapes (fields, signatures, extension targets)
//!           ├── inline bounds and where clauses into constraints
//!           └── interfaces and conformances into the registry
//! ```
//!
//! Declaration errors are stored per declaration and reported once; uses
//! of a declaration with errors fail silently with
//! [`GenericErrorKind::DeclarationPoisoned`].

mod register;
mod resolve;

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use umbra_ir::{ExprArena, Name, Span, StmtId, StringInterner};
use umbra_types::{
    BuiltinInterfaces, ConversionRegistry, DeclId, GenericArg, InterfaceEntry, InterfaceRegistry,
    ParamRef, TypeId, TypeInterner, TypeNames, ValueArg,
};

pub(crate) use resolve::{value_fits, Resolver};

use crate::binding::{BindingSet, Bound};
use crate::check::CheckedBody;
use crate::error::{GenericError, GenericErrorKind};
use crate::pack::PackGroup;

/// Kind of a generic parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Type,
    Value,
    Pack,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParamKind::Type => "type",
            ParamKind::Value => "value",
            ParamKind::Pack => "type pack",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenericParam {
    Type {
        name: Name,
        default: Option<TypeId>,
        span: Span,
    },
    /// `let N : ty`; `ty` is a non-floating scalar or an enum.
    Value {
        name: Name,
        ty: TypeId,
        default: Option<ValueArg>,
        span: Span,
    },
    Pack {
        name: Name,
        span: Span,
    },
}

impl GenericParam {
    pub fn name(&self) -> Name {
        match self {
            GenericParam::Type { name, .. }
            | GenericParam::Value { name, .. }
            | GenericParam::Pack { name, .. } => *name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            GenericParam::Type { span, .. }
            | GenericParam::Value { span, .. }
            | GenericParam::Pack { span, .. } => *span,
        }
    }

    pub fn kind(&self) -> ParamKind {
        match self {
            GenericParam::Type { .. } => ParamKind::Type,
            GenericParam::Value { .. } => ParamKind::Value,
            GenericParam::Pack { .. } => ParamKind::Pack,
        }
    }
}

/// A requirement on generic arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Constraint {
    /// Type the constraint is about; `Pack` subjects apply per element.
    pub subject: TypeId,
    pub kind: ConstraintKind,
    /// Optional constraints never fail a binding.
    pub optional: bool,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// `subject : I, J`.
    Conformance(Vec<TypeId>),
    /// `subject == target`.
    Equality(TypeId),
    /// `subject(from)`, optionally `implicit`.
    Coercion { from: TypeId, implicit: bool },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GenericDeclKind {
    Struct,
    Interface,
    Alias,
    Function,
    Subscript,
    Constructor,
    Extension,
    Enum,
}

impl GenericDeclKind {
    pub fn is_callable(self) -> bool {
        matches!(
            self,
            GenericDeclKind::Function | GenericDeclKind::Subscript | GenericDeclKind::Constructor
        )
    }

    /// Declarations that denote a type when named.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            GenericDeclKind::Struct | GenericDeclKind::Interface | GenericDeclKind::Enum
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSig {
    pub name: Name,
    pub ty: TypeId,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamSig {
    pub name: Name,
    /// `expand P` for a pack-typed parameter.
    pub ty: TypeId,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallableShape {
    pub params: Vec<ParamSig>,
    pub ret: TypeId,
    pub body: Option<StmtId>,
    pub is_static: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructShape {
    pub bases: Vec<TypeId>,
    pub fields: Vec<FieldSig>,
    pub type_members: Vec<(Name, TypeId)>,
    pub members: Vec<DeclId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterfaceShape {
    pub bases: Vec<TypeId>,
    pub requirements: Vec<DeclId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionShape {
    pub target: TypeId,
    pub bases: Vec<TypeId>,
    pub type_members: Vec<(Name, TypeId)>,
    pub members: Vec<DeclId>,
}

/// Resolved body of a declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclShape {
    /// Between the declare and define passes.
    Pending,
    Struct(StructShape),
    Interface(InterfaceShape),
    Alias(TypeId),
    Callable(CallableShape),
    Extension(ExtensionShape),
    Enum(Vec<Name>),
}

/// A registered generic declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericDecl {
    pub id: DeclId,
    pub name: Name,
    pub kind: GenericDeclKind,
    /// Owning struct, interface or extension for members.
    pub parent: Option<DeclId>,
    pub params: Vec<GenericParam>,
    /// Inline bounds first, then `where` clauses, in source order.
    pub constraints: Vec<Constraint>,
    pub shape: DeclShape,
    /// Signature-level pack groups.
    pub pack_groups: Vec<PackGroup>,
    /// Index of the module arena holding the body.
    pub module: u32,
    pub span: Span,
}

impl GenericDecl {
    pub fn is_generic(&self) -> bool {
        !self.params.is_empty()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "parameter lists are far smaller than u32::MAX"
    )]
    pub fn param_refs(&self) -> impl Iterator<Item = (ParamRef, &GenericParam)> {
        let id = self.id;
        self.params
            .iter()
            .enumerate()
            .map(move |(i, p)| (ParamRef::new(id, i as u32), p))
    }

    pub fn callable(&self) -> Option<&CallableShape> {
        match &self.shape {
            DeclShape::Callable(c) => Some(c),
            _ => None,
        }
    }

    pub fn members(&self) -> &[DeclId] {
        match &self.shape {
            DeclShape::Struct(s) => &s.members,
            DeclShape::Interface(i) => &i.requirements,
            DeclShape::Extension(e) => &e.members,
            _ => &[],
        }
    }

    pub fn type_members(&self) -> &[(Name, TypeId)] {
        match &self.shape {
            DeclShape::Struct(s) => &s.type_members,
            DeclShape::Extension(e) => &e.type_members,
            _ => &[],
        }
    }

    pub fn is_static(&self) -> bool {
        self.callable().is_none_or(|c| c.is_static)
    }
}

/// Well-known names, interned once.
#[derive(Copy, Clone, Debug)]
pub(crate) struct WellKnown {
    pub vector: Name,
    pub tuple: Name,
    pub void: Name,
    pub this: Name,
    pub init: Name,
    pub subscript: Name,
}

impl WellKnown {
    fn new(strings: &StringInterner) -> Self {
        WellKnown {
            vector: strings.intern("vector"),
            tuple: strings.intern("Tuple"),
            void: strings.intern("void"),
            this: strings.intern("this"),
            init: strings.intern("__init"),
            subscript: strings.intern("__subscript"),
        }
    }
}

pub struct DeclTable {
    decls: Vec<GenericDecl>,
    globals: FxHashMap<Name, DeclId>,
    errors: FxHashMap<DeclId, Vec<GenericError>>,
    interfaces: InterfaceRegistry,
    conversions: ConversionRegistry,
    extensions: Vec<DeclId>,
    arenas: Vec<Arc<ExprArena>>,
    checked: FxHashMap<DeclId, Arc<CheckedBody>>,
    builtins: BuiltinInterfaces,
    pub(crate) names: WellKnown,
}

impl DeclTable {
    /// Empty table holding only the built-in interfaces:
    /// `IInteger` and `IFloat` refine `IArithmetic` and `IComparable`.
    pub fn new(strings: &StringInterner) -> Self {
        let mut table = DeclTable {
            decls: Vec::new(),
            globals: FxHashMap::default(),
            errors: FxHashMap::default(),
            interfaces: InterfaceRegistry::new(),
            conversions: ConversionRegistry::new(),
            extensions: Vec::new(),
            arenas: Vec::new(),
            checked: FxHashMap::default(),
            builtins: BuiltinInterfaces {
                comparable: DeclId::new(0),
                arithmetic: DeclId::new(1),
                integer: DeclId::new(2),
                float: DeclId::new(3),
            },
            names: WellKnown::new(strings),
        };
        let comparable = table.builtin_interface(strings.intern("IComparable"), &[]);
        let arithmetic = table.builtin_interface(strings.intern("IArithmetic"), &[]);
        let integer =
            table.builtin_interface(strings.intern("IInteger"), &[arithmetic, comparable]);
        let float = table.builtin_interface(strings.intern("IFloat"), &[arithmetic, comparable]);
        table.builtins = BuiltinInterfaces {
            comparable,
            arithmetic,
            integer,
            float,
        };
        table.interfaces.set_builtins(table.builtins);
        table
    }

    fn builtin_interface(&mut self, name: Name, supers: &[DeclId]) -> DeclId {
        let id = self.alloc(GenericDecl {
            id: DeclId::new(0),
            name,
            kind: GenericDeclKind::Interface,
            parent: None,
            params: Vec::new(),
            constraints: Vec::new(),
            shape: DeclShape::Interface(InterfaceShape::default()),
            pack_groups: Vec::new(),
            module: u32::MAX,
            span: Span::DUMMY,
        });
        self.globals.insert(name, id);
        self.interfaces.register_interface(InterfaceEntry {
            decl: id,
            name,
            supers: supers.to_vec(),
            assoc_types: Vec::new(),
            requirements: FxHashMap::default(),
            span: Span::DUMMY,
        });
        id
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "declaration count is far below u32::MAX"
    )]
    fn alloc(&mut self, mut decl: GenericDecl) -> DeclId {
        let id = DeclId::new(self.decls.len() as u32);
        decl.id = id;
        self.decls.push(decl);
        id
    }

    // === Lookup ===

    /// # Panics
    /// Panics if `id` was not allocated by this table.
    #[inline]
    pub fn get(&self, id: DeclId) -> &GenericDecl {
        &self.decls[id.index()]
    }

    #[inline]
    pub fn try_get(&self, id: DeclId) -> Option<&GenericDecl> {
        self.decls.get(id.index())
    }

    pub fn lookup(&self, name: Name) -> Option<DeclId> {
        self.globals.get(&name).copied()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GenericDecl> {
        self.decls.iter()
    }

    pub fn interfaces(&self) -> &InterfaceRegistry {
        &self.interfaces
    }

    pub fn conversions(&self) -> &ConversionRegistry {
        &self.conversions
    }

    pub fn builtins(&self) -> BuiltinInterfaces {
        self.builtins
    }

    pub fn extensions(&self) -> &[DeclId] {
        &self.extensions
    }

    pub fn param(&self, p: ParamRef) -> Option<&GenericParam> {
        self.try_get(p.owner)?.params.get(p.index as usize)
    }

    /// # Panics
    /// Panics if `decl` has no registered body arena.
    pub fn arena(&self, decl: DeclId) -> &ExprArena {
        &self.arenas[self.get(decl).module as usize]
    }

    // === Errors ===

    /// Errors recorded against `decl` during registration or checking.
    pub fn errors_for(&self, decl: DeclId) -> &[GenericError] {
        self.errors.get(&decl).map_or(&[], Vec::as_slice)
    }

    /// Whether `decl` or an enclosing declaration has errors.
    pub fn is_poisoned(&self, decl: DeclId) -> bool {
        self.scope_chain(decl)
            .iter()
            .any(|d| self.errors.contains_key(d))
    }

    pub(crate) fn poisoned_error(&self, decl: DeclId, span: Span) -> GenericError {
        GenericError::new(GenericErrorKind::DeclarationPoisoned { decl }, span)
    }

    pub(crate) fn record_error(&mut self, decl: DeclId, error: GenericError) {
        tracing::debug!(?decl, kind = %error.kind, "declaration error");
        self.errors.entry(decl).or_default().push(error);
    }

    pub fn all_errors(&self) -> impl Iterator<Item = &GenericError> {
        let mut ids: Vec<_> = self.errors.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .flat_map(move |id| self.errors_for(id).iter())
    }

    // === Checked bodies ===

    pub fn checked(&self, decl: DeclId) -> Option<&Arc<CheckedBody>> {
        self.checked.get(&decl)
    }

    pub(crate) fn set_checked(&mut self, decl: DeclId, body: CheckedBody) {
        self.checked.insert(decl, Arc::new(body));
    }

    // === Scopes ===

    /// `decl` and its enclosing declarations, outermost first.
    pub fn scope_chain(&self, decl: DeclId) -> SmallVec<[DeclId; 4]> {
        let mut chain = SmallVec::new();
        let mut cur = Some(decl);
        while let Some(id) = cur {
            chain.push(id);
            cur = self.try_get(id).and_then(|d| d.parent);
        }
        chain.reverse();
        chain
    }

    /// Every parameter visible in `decl`, outermost first.
    pub fn params_in_scope(&self, decl: DeclId) -> Vec<(ParamRef, &GenericParam)> {
        self.scope_chain(decl)
            .into_iter()
            .flat_map(|d| self.get(d).param_refs())
            .collect()
    }

    /// Constraints in force inside `decl`, outermost first.
    pub fn constraints_in_scope(&self, decl: DeclId) -> Vec<&Constraint> {
        self.scope_chain(decl)
            .into_iter()
            .flat_map(|d| self.get(d).constraints.iter())
            .collect()
    }

    /// Every visible parameter bound to itself.
    pub fn identity_binding(&self, types: &TypeInterner, decl: DeclId) -> BindingSet {
        let mut binding = BindingSet::new();
        for (p, param) in self.params_in_scope(decl) {
            let bound = match param {
                GenericParam::Type { .. } => Bound::Type(types.param(p)),
                GenericParam::Value { .. } => Bound::Value(ValueArg::Param(p)),
                GenericParam::Pack { .. } => {
                    Bound::Pack(smallvec::smallvec![types.expand(types.pack(p))])
                }
            };
            binding.bind(p, bound);
        }
        binding
    }

    /// `Name<params...>` for a struct, interface or enum seen from inside.
    pub fn identity_type(&self, types: &TypeInterner, decl: DeclId) -> TypeId {
        let args: Vec<GenericArg> = self.identity_binding(types, decl).args_for(decl);
        types.named(decl, args)
    }

    /// The type `this` and `This` denote inside `decl`.
    pub fn self_type(&self, types: &TypeInterner, decl: DeclId) -> Option<TypeId> {
        for &id in self.scope_chain(decl).iter().rev() {
            let d = self.get(id);
            match (&d.kind, &d.shape) {
                (GenericDeclKind::Interface, _) => return Some(TypeId::THIS),
                (GenericDeclKind::Struct, _) => return Some(self.identity_type(types, id)),
                (GenericDeclKind::Extension, DeclShape::Extension(ext)) => {
                    return Some(ext.target)
                }
                _ => {}
            }
        }
        None
    }

    /// Binding of `decl`'s own parameters from the flattened argument list
    /// of a `Named` type; a pack takes the arguments the others leave.
    pub fn binding_for_args(&self, decl: DeclId, args: &[GenericArg]) -> BindingSet {
        let d = self.get(decl);
        let packs = d
            .params
            .iter()
            .filter(|p| p.kind() == ParamKind::Pack)
            .count();
        let per_pack = (args.len() + packs)
            .saturating_sub(d.params.len())
            .checked_div(packs)
            .unwrap_or(0);
        let mut binding = BindingSet::new();
        let mut next = 0;
        for (p, param) in d.param_refs() {
            match param {
                GenericParam::Pack { .. } => {
                    let elems = args
                        .get(next..next + per_pack)
                        .unwrap_or(&[])
                        .iter()
                        .filter_map(|a| a.as_type())
                        .collect();
                    binding.bind(p, Bound::Pack(elems));
                    next += per_pack;
                    continue;
                }
                GenericParam::Type { .. } => {
                    if let Some(GenericArg::Type(ty)) = args.get(next) {
                        binding.bind(p, Bound::Type(*ty));
                    }
                }
                GenericParam::Value { .. } => {
                    if let Some(GenericArg::Value(v)) = args.get(next) {
                        binding.bind(p, Bound::Value(*v));
                    }
                }
            }
            next += 1;
        }
        binding
    }

    /// The enclosing struct, interface or extension of a member.
    pub fn owner_of(&self, decl: DeclId) -> Option<&GenericDecl> {
        self.get(decl).parent.map(|p| self.get(p))
    }

    pub fn enum_case(&self, decl: DeclId, case: Name) -> Option<u32> {
        match &self.try_get(decl)?.shape {
            DeclShape::Enum(cases) => cases
                .iter()
                .position(|&c| c == case)
                .and_then(|i| u32::try_from(i).ok()),
            _ => None,
        }
    }
}

impl TypeNames for DeclTable {
    fn decl_name(&self, decl: DeclId) -> Name {
        self.try_get(decl).map_or(Name::EMPTY, |d| d.name)
    }

    fn param_name(&self, param: ParamRef) -> Name {
        self.param(param).map_or(Name::EMPTY, GenericParam::name)
    }

    fn enum_case_name(&self, decl: DeclId, case: u32) -> Name {
        match self.try_get(decl).map(|d| &d.shape) {
            Some(DeclShape::Enum(cases)) => {
                cases.get(case as usize).copied().unwrap_or(Name::EMPTY)
            }
            _ => Name::EMPTY,
        }
    }
}
