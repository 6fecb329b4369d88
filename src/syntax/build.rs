//! Constructors for syntax trees built in code (tests, tools).
//! All nodes get dummy spans unless a span is given.

use super::ast::*;
use crate::utils::Span;

impl Ident {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), span: Span::dummy() }
    }
}

impl Path {
    /// `a.b.c` split on dots
    pub fn dotted(path: &str) -> Self {
        Self {
            segments: path.split('.').map(Ident::new).collect(),
            span: Span::dummy(),
        }
    }
}

impl TypeExpr {
    /// Builtin keyword or type name, dotted for qualified names
    pub fn named(name: &str) -> Self {
        TypeExpr::Named(Path::dotted(name))
    }

    pub fn ptr(inner: TypeExpr) -> Self {
        TypeExpr::Pointer(Box::new(inner), Span::dummy())
    }

    pub fn buffer(elem: TypeExpr) -> Self {
        TypeExpr::Buffer { elem: Box::new(elem), terminator: None, span: Span::dummy() }
    }

    pub fn slice(elem: TypeExpr) -> Self {
        TypeExpr::Slice(Box::new(elem), Span::dummy())
    }

    pub fn array(elem: TypeExpr, dims: Vec<Expr>) -> Self {
        TypeExpr::Array { elem: Box::new(elem), dims, span: Span::dummy() }
    }

    pub fn nilable(inner: TypeExpr) -> Self {
        TypeExpr::Nilable(Box::new(inner), Span::dummy())
    }

    pub fn mutable(inner: TypeExpr) -> Self {
        TypeExpr::Mut(Box::new(inner), Span::dummy())
    }

    pub fn infer() -> Self {
        TypeExpr::Infer(Span::dummy())
    }
}

impl Expr {
    fn literal(kind: LiteralKind) -> Self {
        Expr::Literal(Literal { kind, span: Span::dummy() })
    }

    pub fn int(value: u128) -> Self {
        Self::literal(LiteralKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::literal(LiteralKind::Float(value))
    }

    pub fn string(value: &str) -> Self {
        Self::literal(LiteralKind::String(value.to_string()))
    }

    pub fn bool(value: bool) -> Self {
        Self::literal(LiteralKind::Bool(value))
    }

    pub fn nil() -> Self {
        Self::literal(LiteralKind::Nil)
    }

    pub fn path(path: &str) -> Self {
        Expr::Path(Path::dotted(path))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: Span::dummy() }
    }

    pub fn unary(op: UnOp, operand: Expr) -> Self {
        Expr::Unary { op, operand: Box::new(operand), span: Span::dummy() }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call { callee: Box::new(callee), args, span: Span::dummy() }
    }

    pub fn cast(ty: TypeExpr, expr: Expr) -> Self {
        Expr::Cast { ty, expr: Box::new(expr), span: Span::dummy() }
    }

    pub fn field(base: Expr, field: &str) -> Self {
        Expr::Field { base: Box::new(base), field: Ident::new(field), span: Span::dummy() }
    }

    pub fn index(base: Expr, index: Expr) -> Self {
        Expr::Index { base: Box::new(base), index: Box::new(index), span: Span::dummy() }
    }

    pub fn construct(ty: TypeExpr, args: Vec<Expr>) -> Self {
        Expr::Constructor { ty, args, span: Span::dummy() }
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Expr::Array { elements, span: Span::dummy() }
    }

    /// Same expression with its span replaced
    pub fn at(mut self, at: Span) -> Self {
        match &mut self {
            Expr::Literal(lit) => lit.span = at,
            Expr::Path(path) => path.span = at,
            Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Cast { span, .. }
            | Expr::Field { span, .. }
            | Expr::Index { span, .. }
            | Expr::Constructor { span, .. }
            | Expr::Array { span, .. } => *span = at,
        }
        self
    }
}

impl Stmt {
    pub fn block(stmts: Vec<Stmt>) -> Self {
        Stmt::Compound(Block { stmts, span: Span::dummy() })
    }

    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Stmt::Return { value, span: Span::dummy() }
    }

    pub fn local(ty: TypeExpr, name: &str, init: Option<Expr>) -> Self {
        Stmt::Binding(BindingDef::new(ty, name, init))
    }

    pub fn if_(cond: Expr, then: Stmt, otherwise: Option<Stmt>) -> Self {
        Stmt::If {
            cond,
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
            span: Span::dummy(),
        }
    }

    pub fn while_(cond: Expr, body: Stmt) -> Self {
        Stmt::While { cond, body: Box::new(body), span: Span::dummy() }
    }

    pub fn defer(body: Stmt) -> Self {
        Stmt::Defer { body: Box::new(body), span: Span::dummy() }
    }

    pub fn break_() -> Self {
        Stmt::Break { span: Span::dummy() }
    }

    pub fn continue_() -> Self {
        Stmt::Continue { span: Span::dummy() }
    }
}

impl BindingDef {
    pub fn new(ty: TypeExpr, name: &str, init: Option<Expr>) -> Self {
        Self {
            id: NodeId(0),
            name: Ident::new(name),
            ty,
            init,
            attrs: Attributes::default(),
            span: Span::dummy(),
        }
    }
}

impl FunctionDef {
    /// `ret name(params) { body }`, or a prototype when `body` is `None`
    pub fn new(ret: TypeExpr, name: &str, params: Vec<(TypeExpr, &str)>, body: Option<Vec<Stmt>>) -> Self {
        Self {
            id: NodeId(0),
            name: Ident::new(name),
            ret,
            params: params
                .into_iter()
                .map(|(ty, name)| ParamDef { name: Ident::new(name), ty, span: Span::dummy() })
                .collect(),
            variadic: Variadic::None,
            body: body.map(|stmts| Block { stmts, span: Span::dummy() }),
            attrs: Attributes::default(),
            span: Span::dummy(),
        }
    }
}

impl StructDef {
    pub fn new(name: &str, fields: Vec<(TypeExpr, &str)>, variants: Vec<StructDef>) -> Self {
        Self {
            id: NodeId(0),
            name: Ident::new(name),
            fields: fields
                .into_iter()
                .map(|(ty, name)| FieldDef { name: Ident::new(name), ty, span: Span::dummy() })
                .collect(),
            variants,
            attrs: Attributes::default(),
            span: Span::dummy(),
        }
    }
}

impl AliasDef {
    pub fn new(name: &str, target: TypeExpr) -> Self {
        Self {
            id: NodeId(0),
            name: Ident::new(name),
            target,
            attrs: Attributes::default(),
            span: Span::dummy(),
        }
    }
}

impl Item {
    fn set_id(&mut self, id: NodeId) {
        match self {
            Item::Alias(a) => a.id = id,
            Item::Struct(s) => s.id = id,
            Item::Enum(e) => e.id = id,
            Item::Binding(b) => b.id = id,
            Item::Function(f) => f.id = id,
            Item::Register(r) => r.id = id,
            Item::Module(_) | Item::Import(_) | Item::ForeignImport(_) => {}
        }
    }

    /// Mutable access to the attributes of a declaring item
    pub fn attrs_mut(&mut self) -> Option<&mut Attributes> {
        match self {
            Item::Alias(a) => Some(&mut a.attrs),
            Item::Struct(s) => Some(&mut s.attrs),
            Item::Enum(e) => Some(&mut e.attrs),
            Item::Binding(b) => Some(&mut b.attrs),
            Item::Function(f) => Some(&mut f.attrs),
            Item::Register(r) => Some(&mut r.attrs),
            Item::Module(_) | Item::Import(_) | Item::ForeignImport(_) => None,
        }
    }
}

/// Builds a [`SyntaxUnit`], numbering top-level nodes as they are added
pub struct UnitBuilder {
    file_id: usize,
    path: String,
    items: Vec<Item>,
    next_id: u32,
}

impl UnitBuilder {
    pub fn new(file_id: usize, path: &str) -> Self {
        Self { file_id, path: path.to_string(), items: Vec::new(), next_id: 1 }
    }

    /// Add any item; declaring items get a fresh node id
    pub fn item(mut self, item: impl Into<Item>) -> Self {
        let mut item = item.into();
        item.set_id(NodeId(self.next_id));
        self.next_id += 1;
        self.items.push(item);
        self
    }

    /// Add an exported item
    pub fn exported(self, item: impl Into<Item>) -> Self {
        let mut item = item.into();
        if let Some(attrs) = item.attrs_mut() {
            attrs.export = true;
        }
        self.item(item)
    }

    pub fn module(self, name: &str) -> Self {
        self.item(Item::Module(ModuleDecl { name: Path::dotted(name), span: Span::dummy() }))
    }

    pub fn import(self, path: &str, alias: Option<&str>, query: Vec<ImportQuery>) -> Self {
        self.item(Item::Import(ImportDecl {
            path: Path::dotted(path),
            alias: alias.map(Ident::new),
            query,
            export: false,
            span: Span::dummy(),
        }))
    }

    pub fn build(self) -> SyntaxUnit {
        SyntaxUnit { file_id: self.file_id, path: self.path, items: self.items }
    }
}

impl From<FunctionDef> for Item {
    fn from(def: FunctionDef) -> Self {
        Item::Function(def)
    }
}

impl From<StructDef> for Item {
    fn from(def: StructDef) -> Self {
        Item::Struct(def)
    }
}

impl From<BindingDef> for Item {
    fn from(def: BindingDef) -> Self {
        Item::Binding(def)
    }
}

impl From<AliasDef> for Item {
    fn from(def: AliasDef) -> Self {
        Item::Alias(def)
    }
}

impl From<EnumDef> for Item {
    fn from(def: EnumDef) -> Self {
        Item::Enum(def)
    }
}

impl From<RegisterDef> for Item {
    fn from(def: RegisterDef) -> Self {
        Item::Register(def)
    }
}
