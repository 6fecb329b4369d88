//! Syntax tree handed over by the parser
//!
//! The semantic core never mutates these nodes. Every node carries a span;
//! top-level items additionally carry a [`NodeId`] that keys their
//! forward-declaration stubs.

use serde::{Deserialize, Serialize};

use crate::utils::Span;

/// Identity of a top-level syntax node within one compilation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// One parsed source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxUnit {
    /// File ID used in every span of this unit
    pub file_id: usize,
    /// Path of the source file, for messages only
    pub path: String,
    pub items: Vec<Item>,
}

/// Identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// `a.b.c`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub segments: Vec<Ident>,
    pub span: Span,
}

impl Path {
    /// Dotted spelling, e.g. `std.io`
    pub fn joined(&self) -> String {
        self.segments.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(".")
    }
}

// ==================== Attributes ====================

/// Attributes attached to a declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// `export`
    #[serde(default)]
    pub export: bool,
    /// explicit `internal` linkage
    #[serde(default)]
    pub internal: bool,
    /// `foreign` or `foreign("symbol")`
    #[serde(default)]
    pub foreign: Option<ForeignAttr>,
    #[serde(default)]
    pub inline: bool,
    #[serde(default)]
    pub discardable: bool,
    #[serde(default)]
    pub call_conv: Option<CallConvAttr>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignAttr {
    /// Symbol name, when it differs from the declared name
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallConvAttr {
    Aether,
    C,
}

// ==================== Items ====================

/// Top-level items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Item {
    /// `module a.b;`
    Module(ModuleDecl),
    /// `import a.b [as c] [::{...}];`
    Import(ImportDecl),
    /// `import foreign "m";`
    ForeignImport(ForeignImportDecl),
    Alias(AliasDef),
    Struct(StructDef),
    Enum(EnumDef),
    Binding(BindingDef),
    Function(FunctionDef),
    Register(RegisterDef),
}

impl Item {
    pub fn span(&self) -> Span {
        match self {
            Item::Module(m) => m.span,
            Item::Import(i) => i.span,
            Item::ForeignImport(f) => f.span,
            Item::Alias(a) => a.span,
            Item::Struct(s) => s.span,
            Item::Enum(e) => e.span,
            Item::Binding(b) => b.span,
            Item::Function(f) => f.span,
            Item::Register(r) => r.span,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDecl {
    pub name: Path,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDecl {
    pub path: Path,
    pub alias: Option<Ident>,
    /// Empty for a plain import
    #[serde(default)]
    pub query: Vec<ImportQuery>,
    #[serde(default)]
    pub export: bool,
    pub span: Span,
}

/// One element of `import m::{...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImportQuery {
    /// `*`
    Wildcard(Span),
    /// `name`
    Name(Ident),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignImportDecl {
    pub library: String,
    pub span: Span,
}

/// `alias Name = Type;`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasDef {
    pub id: NodeId,
    pub name: Ident,
    pub target: TypeExpr,
    #[serde(default)]
    pub attrs: Attributes,
    pub span: Span,
}

/// Struct definition, also used for its nested variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDef {
    pub id: NodeId,
    pub name: Ident,
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub variants: Vec<StructDef>,
    #[serde(default)]
    pub attrs: Attributes,
    pub span: Span,
}

/// Struct field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub id: NodeId,
    pub name: Ident,
    pub underlying: Option<TypeExpr>,
    pub variants: Vec<EnumVariantDef>,
    #[serde(default)]
    pub attrs: Attributes,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumVariantDef {
    pub name: Ident,
    pub value: Option<Expr>,
    pub span: Span,
}

/// `Type name [= init];`, at module scope or inside a block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingDef {
    pub id: NodeId,
    pub name: Ident,
    /// `var` (possibly `mut var`) requests inference from the initializer
    pub ty: TypeExpr,
    pub init: Option<Expr>,
    #[serde(default)]
    pub attrs: Attributes,
    pub span: Span,
}

/// Function definition or declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub id: NodeId,
    pub name: Ident,
    pub ret: TypeExpr,
    pub params: Vec<ParamDef>,
    #[serde(default)]
    pub variadic: Variadic,
    /// `None` for a prototype
    pub body: Option<Block>,
    #[serde(default)]
    pub attrs: Attributes,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variadic {
    #[default]
    None,
    /// C-style `...`
    C,
}

/// `register Type name @ address;`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDef {
    pub id: NodeId,
    pub name: Ident,
    pub ty: TypeExpr,
    pub address: Expr,
    #[serde(default)]
    pub attrs: Attributes,
    pub span: Span,
}

// ==================== Statements ====================

/// `{ ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Compound(Block),
    /// Local binding
    Binding(BindingDef),
    /// Expression statement
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    Break { span: Span },
    Continue { span: Span },
    Return { value: Option<Expr>, span: Span },
    /// `defer stmt`
    Defer { body: Box<Stmt>, span: Span },
    /// Empty statement (;)
    Empty { span: Span },
}

// ==================== Expressions ====================

/// Expression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    /// Name or qualified name
    Path(Path),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    /// `cast<T>(expr)`
    Cast {
        ty: TypeExpr,
        expr: Box<Expr>,
        span: Span,
    },
    /// `expr.field`
    Field {
        base: Box<Expr>,
        field: Ident,
        span: Span,
    },
    /// `expr[index]`
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    /// `T(args...)`
    Constructor {
        ty: TypeExpr,
        args: Vec<Expr>,
        span: Span,
    },
    /// `[a, b, c]`
    Array { elements: Vec<Expr>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(lit) => lit.span,
            Expr::Path(path) => path.span,
            Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Cast { span, .. }
            | Expr::Field { span, .. }
            | Expr::Index { span, .. }
            | Expr::Constructor { span, .. }
            | Expr::Array { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Literal {
    pub kind: LiteralKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralKind {
    /// Magnitude; negative numbers are a unary minus over a literal
    Int(u128),
    Float(f64),
    String(String),
    Bool(bool),
    Nil,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Assign,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Assign => "=",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
    /// `&x`
    AddrOf,
    /// `*p`
    Deref,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
            UnOp::AddrOf => "&",
            UnOp::Deref => "*",
        }
    }
}

// ==================== Types ====================

/// Type as written in source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeExpr {
    /// Builtin keyword or (qualified) type name
    Named(Path),
    /// `*T`
    Pointer(Box<TypeExpr>, Span),
    /// `[*]T` or `[*:term]T`
    Buffer {
        elem: Box<TypeExpr>,
        terminator: Option<Box<Expr>>,
        span: Span,
    },
    /// `[]T`
    Slice(Box<TypeExpr>, Span),
    /// `[N][M]T`
    Array {
        elem: Box<TypeExpr>,
        dims: Vec<Expr>,
        span: Span,
    },
    /// `?T`
    Nilable(Box<TypeExpr>, Span),
    /// `fn(params...) -> ret`
    Function {
        ret: Box<TypeExpr>,
        params: Vec<TypeExpr>,
        #[serde(default)]
        variadic: Variadic,
        #[serde(default)]
        call_conv: Option<CallConvAttr>,
        span: Span,
    },
    /// `mut T`
    Mut(Box<TypeExpr>, Span),
    /// `var`
    Infer(Span),
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named(path) => path.span,
            TypeExpr::Pointer(_, span)
            | TypeExpr::Slice(_, span)
            | TypeExpr::Nilable(_, span)
            | TypeExpr::Mut(_, span)
            | TypeExpr::Infer(span) => *span,
            TypeExpr::Buffer { span, .. }
            | TypeExpr::Array { span, .. }
            | TypeExpr::Function { span, .. } => *span,
        }
    }

    /// Whether this is `var` or `mut var`
    pub fn is_inferred(&self) -> bool {
        match self {
            TypeExpr::Infer(_) => true,
            TypeExpr::Mut(inner, _) => inner.is_inferred(),
            _ => false,
        }
    }
}
