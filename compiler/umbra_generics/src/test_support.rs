//! Shared fixture for building small modules in unit tests.

use umbra_ir::{
    AssocTypeDecl, BinaryOp, Decl, DeclKind, ExprArena, ExprId, ExprKind, FieldDecl,
    FunctionDecl, GenericParamDecl, InterfaceDecl, Module, Name, ParamDecl, ParsedArg,
    ParsedType, SharedInterner, Span, StmtId, StmtKind, StructDecl, WhereClause,
};
use umbra_types::{DeclId, TypeInterner};

use crate::config::GenericsConfig;
use crate::decl::DeclTable;
use crate::error::GenericErrorKind;

pub(crate) struct Fixture {
    pub strings: SharedInterner,
    pub types: TypeInterner,
    pub table: DeclTable,
    pub config: GenericsConfig,
    arena: ExprArena,
    decls: Vec<Decl>,
    /// Each node gets its own span so tests can tell errors apart.
    next_pos: u32,
}

impl Fixture {
    pub fn new() -> Self {
        let strings = SharedInterner::new();
        let table = DeclTable::new(&strings);
        Fixture {
            strings,
            types: TypeInterner::new(),
            table,
            config: GenericsConfig::default(),
            arena: ExprArena::new(),
            decls: Vec::new(),
            next_pos: 0,
        }
    }

    pub fn name(&self, s: &str) -> Name {
        self.strings.intern(s)
    }

    pub fn ty(&self, s: &str) -> ParsedType {
        ParsedType::named(self.name(s))
    }

    pub fn span(&mut self) -> Span {
        self.next_pos += 2;
        Span::new(self.next_pos, self.next_pos + 1)
    }

    pub fn param(&mut self, name: &str, ty: ParsedType) -> ParamDecl {
        let span = self.span();
        ParamDecl::new(self.name(name), ty, span)
    }

    /// A function declaration; `body` is `None` for requirements.
    pub fn func(&mut self, name: &str, params: Vec<ParamDecl>, ret: ParsedType, body: Option<StmtId>) -> Decl {
        let span = self.span();
        Decl::new(
            self.name(name),
            DeclKind::Function(FunctionDecl {
                params,
                ret,
                body,
                is_static: false,
            }),
            span,
        )
    }

    pub fn type_param(&mut self, name: &str) -> GenericParamDecl {
        let span = self.span();
        GenericParamDecl::ty(self.name(name), span)
    }

    pub fn value_param(&mut self, name: &str, ty: &str) -> GenericParamDecl {
        let span = self.span();
        GenericParamDecl::value(self.name(name), self.ty(ty), span)
    }

    pub fn pack_param(&mut self, name: &str) -> GenericParamDecl {
        let span = self.span();
        GenericParamDecl::pack(self.name(name), span)
    }

    pub fn structure(&mut self, name: &str, fields: Vec<(&str, ParsedType)>) -> Decl {
        let fields = fields
            .into_iter()
            .map(|(field, ty)| FieldDecl {
                name: self.name(field),
                ty,
                span: self.span(),
            })
            .collect();
        let span = self.span();
        Decl::new(
            self.name(name),
            DeclKind::Struct(StructDecl {
                fields,
                ..StructDecl::default()
            }),
            span,
        )
    }

    /// An interface with the given requirements and associated types.
    pub fn interface(&mut self, name: &str, requirements: Vec<Decl>, assoc: &[&str]) -> Decl {
        let assoc_types = assoc
            .iter()
            .map(|a| AssocTypeDecl {
                name: self.name(a),
                bounds: Vec::new(),
                span: self.span(),
            })
            .collect();
        let span = self.span();
        Decl::new(
            self.name(name),
            DeclKind::Interface(InterfaceDecl {
                bases: Vec::new(),
                assoc_types,
                requirements,
            }),
            span,
        )
    }

    /// `struct TestStruct<T, let size : uint> { T data[size]; }`
    pub fn test_struct(&mut self) -> Decl {
        let data = ParsedType::array(
            self.ty("T"),
            ParsedArg::Type(self.ty("size")),
        );
        let generics = vec![self.type_param("T"), self.value_param("size", "uint")];
        self.structure("TestStruct", vec![("data", data)])
            .with_generics(generics)
    }

    /// `int sumInts<each T>(expand each T terms) where T == int`, summing
    /// its arguments with one `expand sum += each terms`.
    pub fn sum_ints(&mut self) -> Decl {
        let zero = self.expr(ExprKind::Int(0));
        let sum = self.name("sum");
        let init = self.stmt(StmtKind::Let {
            name: sum,
            ty: Some(self.ty("int")),
            init: Some(zero),
        });
        let target = self.ident("sum");
        let terms = self.ident("terms");
        let each = self.expr(ExprKind::Each(terms));
        let add = self.expr(ExprKind::Assign {
            op: Some(BinaryOp::Add),
            target,
            value: each,
        });
        let expand = self.expr(ExprKind::Expand(add));
        let accumulate = self.stmt(StmtKind::Expr(expand));
        let result = self.ident("sum");
        let ret = self.stmt(StmtKind::Return(Some(result)));
        let body = self.block(vec![init, accumulate, ret]);

        let param = self.param("terms", ParsedType::expand_each(self.name("T")));
        let generics = vec![self.pack_param("T")];
        let span = self.span();
        let clause = WhereClause::equals(self.ty("T"), self.ty("int"), span);
        self.func("sumInts", vec![param], self.ty("int"), Some(body))
            .with_generics(generics)
            .with_where(clause)
    }

    pub fn add(&mut self, decl: Decl) {
        self.decls.push(decl);
    }

    /// Everything added since the last call, as one module.
    pub fn module(&mut self) -> (Module, ExprArena) {
        let module = Module {
            decls: std::mem::take(&mut self.decls),
        };
        (module, std::mem::take(&mut self.arena))
    }

    pub fn register(&mut self) -> Vec<DeclId> {
        let (module, arena) = self.module();
        self.table
            .register_module(&module, arena, &self.types, &self.strings)
    }

    pub fn decl(&self, name: &str) -> DeclId {
        self.table
            .lookup(self.name(name))
            .unwrap_or_else(|| panic!("`{name}` is not declared"))
    }

    /// Error kinds recorded against `name`.
    pub fn errors(&self, name: &str) -> Vec<GenericErrorKind> {
        self.table
            .errors_for(self.decl(name))
            .iter()
            .map(|e| e.kind.clone())
            .collect()
    }

    // === Bodies ===

    pub fn expr(&mut self, kind: ExprKind) -> ExprId {
        let span = self.span();
        self.arena.alloc_expr(kind, span)
    }

    pub fn ident(&mut self, name: &str) -> ExprId {
        let name = self.name(name);
        self.expr(ExprKind::Ident(name))
    }

    pub fn call(&mut self, callee: &str, args: Vec<ExprId>) -> ExprId {
        let callee = self.name(callee);
        self.expr(ExprKind::Call {
            callee,
            type_args: Vec::new(),
            args,
        })
    }

    pub fn stmt(&mut self, kind: StmtKind) -> StmtId {
        let span = self.span();
        self.arena.alloc_stmt(kind, span)
    }

    pub fn ret(&mut self, value: ExprId) -> StmtId {
        let ret = self.stmt(StmtKind::Return(Some(value)));
        self.stmt(StmtKind::Block(vec![ret]))
    }

    pub fn block(&mut self, stmts: Vec<StmtId>) -> StmtId {
        self.stmt(StmtKind::Block(stmts))
    }

    pub fn check(&mut self) -> usize {
        crate::check::check_declarations(&mut self.table, &self.types, &self.strings, &self.config)
    }
}
