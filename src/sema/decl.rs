//! Named declarations

use std::num::NonZeroU32;

use crate::sema::context::{DeclId, ModuleId};
use crate::sema::ir::{DeferNode, Expr, Stmt};
use crate::sema::scope::ScopeId;
use crate::types::{FunctionType, QualType};
use crate::utils::Span;

/// Visibility and binding of a named declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Internal,
    Exported,
    /// Defined elsewhere (foreign)
    Imported,
    /// Exported by this module on behalf of one of its dependencies
    ReExported,
}

/// A named declaration
#[derive(Debug, Clone)]
pub struct Decl {
    pub name: String,
    pub span: Span,
    pub linkage: Linkage,
    pub module: ModuleId,
    pub kind: DeclKind,
}

/// Kind of declaration
#[derive(Debug, Clone)]
pub enum DeclKind {
    Binding(BindingDecl),
    Param(ParamDecl),
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Alias(AliasDecl),
    Field(FieldDecl),
    Register(RegisterDecl),
    /// A plain import bound to a name
    Import(ImportDecl),
}

impl DeclKind {
    /// Word used in diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            DeclKind::Binding(_) => "variable",
            DeclKind::Param(_) => "parameter",
            DeclKind::Function(_) => "function",
            DeclKind::Struct(_) => "struct",
            DeclKind::Enum(_) => "enum",
            DeclKind::Alias(_) => "alias",
            DeclKind::Field(_) => "field",
            DeclKind::Register(_) => "register",
            DeclKind::Import(_) => "module",
        }
    }

    /// Scope a qualified path can continue into
    pub fn member_scope(&self) -> Option<ScopeId> {
        match self {
            DeclKind::Struct(s) => Some(s.scope),
            DeclKind::Enum(e) => Some(e.scope),
            DeclKind::Import(i) => Some(i.scope),
            _ => None,
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self, DeclKind::Struct(_) | DeclKind::Enum(_) | DeclKind::Alias(_))
    }
}

#[derive(Debug, Clone)]
pub struct BindingDecl {
    pub ty: QualType,
    pub init: Option<Expr>,
    /// Declared at module scope
    pub global: bool,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub ty: QualType,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub ty: FunctionType,
    pub params: Vec<DeclId>,
    pub body: Option<Stmt>,
    /// Every defer statement of the body, addressed by [`DeferId`](crate::sema::ir::DeferId)
    pub defers: Vec<DeferNode>,
    pub is_foreign: bool,
    /// Symbol name for foreign functions
    pub foreign_name: Option<String>,
    pub is_inline: bool,
    pub is_discardable: bool,
    /// Declared with a body (as opposed to a prototype)
    pub has_body: bool,
}

/// Runtime discriminant of a struct variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantTag {
    /// Not assigned yet (before full analysis)
    Unassigned,
    /// Has sub-variants, never instantiated directly
    NotALeaf,
    Leaf(NonZeroU32),
}

impl VariantTag {
    pub fn leaf(self) -> Option<u32> {
        match self {
            VariantTag::Leaf(tag) => Some(tag.get()),
            VariantTag::Unassigned | VariantTag::NotALeaf => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    /// Member scope: fields and variants
    pub scope: ScopeId,
    pub fields: Vec<DeclId>,
    pub variants: Vec<DeclId>,
    /// Enclosing struct, for variants
    pub parent: Option<DeclId>,
    pub tag: VariantTag,
}

impl StructDecl {
    pub fn new(scope: ScopeId, parent: Option<DeclId>) -> Self {
        Self { scope, fields: Vec::new(), variants: Vec::new(), parent, tag: VariantTag::Unassigned }
    }

    pub fn is_leaf(&self) -> bool {
        self.variants.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub scope: ScopeId,
    pub variants: Vec<DeclId>,
}

#[derive(Debug, Clone)]
pub struct AliasDecl {
    /// Poison until analyzed, or when the alias is cyclic
    pub target: QualType,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub ty: QualType,
    pub index: usize,
    pub owner: DeclId,
}

/// Memory-mapped register at a fixed address
#[derive(Debug, Clone)]
pub struct RegisterDecl {
    pub ty: QualType,
    pub address: u64,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub module: ModuleId,
    /// Export scope of the imported module
    pub scope: ScopeId,
}
