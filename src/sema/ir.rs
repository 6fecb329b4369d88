//! Sema IR: typed, name-resolved expressions and statements

use std::num::NonZeroU32;

use bitflags::bitflags;

use crate::sema::context::DeclId;
use crate::sema::scope::ScopeId;
use crate::syntax::{BinOp, UnOp};
use crate::types::QualType;
use crate::utils::Span;

bitflags! {
    /// What an expression depends on; `ERROR` silences follow-up diagnostics
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Dependence: u8 {
        const INSTANTIATION = 1 << 0;
        const TYPE = 1 << 1;
        const VALUE = 1 << 2;
        const ERROR = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCategory {
    LValue,
    RValue,
}

/// Implicit or explicit conversion recorded in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// Load the value of an lvalue
    LValueToRValue,
    /// Drop qualifiers of a container's element (`*mut T` to `*T`)
    Qualification,
    /// `nil` to pointer, buffer or nilable
    NilToPointer,
    /// Integer constant to a concrete numeric type it fits in
    IntegerConstant,
    /// Float literal to a concrete float type
    FloatConstant,
    /// String constant to `[]u8`
    StringToSlice,
    /// String constant to `[*]u8`
    StringToBuffer,
    /// Widening integer conversion
    IntegerExtend { signed: bool },
    /// Widening float conversion (variadic promotion)
    FloatExtend,
    /// `cast<T>` between numeric types
    Numeric,
    /// `cast<T>` between pointer-like types
    PointerReinterpret,
    IntegerToPointer,
    PointerToInteger,
}

/// Typed expression
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: QualType,
    pub category: ValueCategory,
    pub span: Span,
    /// May be used as a statement without a diagnostic
    pub discardable: bool,
    pub dependence: Dependence,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Replaces an expression that failed to analyze
    Poison,
    IntLiteral(u128),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    NilLiteral,
    DeclRef(DeclId),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Cast {
        kind: CastKind,
        operand: Box<Expr>,
    },
    Field {
        base: Box<Expr>,
        field: DeclId,
        /// Byte offset inside the base struct
        offset: u64,
    },
    /// `.len` / `.ptr` of a slice
    SliceLen(Box<Expr>),
    SlicePtr(Box<Expr>),
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// Struct or builtin construction; `tag` is set for leaf variants
    Construct {
        args: Vec<Expr>,
        tag: Option<NonZeroU32>,
    },
    Array(Vec<Expr>),
    /// Operator with no meaning for its operand types; typed as poison
    UndefinedOperator(Vec<Expr>),
}

impl Expr {
    pub fn new(kind: ExprKind, ty: QualType, category: ValueCategory, span: Span) -> Self {
        Self { kind, ty, category, span, discardable: false, dependence: Dependence::empty() }
    }

    pub fn rvalue(kind: ExprKind, ty: QualType, span: Span) -> Self {
        Self::new(kind, ty, ValueCategory::RValue, span)
    }

    pub fn lvalue(kind: ExprKind, ty: QualType, span: Span) -> Self {
        Self::new(kind, ty, ValueCategory::LValue, span)
    }

    /// An erroneous expression; already diagnosed
    pub fn poison(span: Span) -> Self {
        let mut e = Self::rvalue(ExprKind::Poison, QualType::poison(span), span);
        e.dependence = Dependence::ERROR;
        e.discardable = true;
        e
    }

    /// Typed-poison node for an operator without meaning
    pub fn undefined_operator(operands: Vec<Expr>, span: Span) -> Self {
        let mut e = Self::rvalue(ExprKind::UndefinedOperator(operands), QualType::poison(span), span);
        e.dependence = Dependence::ERROR;
        e.discardable = true;
        e
    }

    /// Node whose dependence is inherited from its operands
    pub fn derived(kind: ExprKind, ty: QualType, category: ValueCategory, span: Span) -> Self {
        let mut e = Self::new(kind, ty, category, span);
        e.dependence = Self::merge_dependence(e.children());
        e
    }

    /// Direct operands
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Poison
            | ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::NilLiteral
            | ExprKind::DeclRef(_) => Vec::new(),
            ExprKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            ExprKind::Assign { target, value } => vec![target, value],
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => vec![operand],
            ExprKind::Field { base, .. } | ExprKind::SliceLen(base) | ExprKind::SlicePtr(base) => vec![base],
            ExprKind::Index { base, index } => vec![base, index],
            ExprKind::Call { callee, args } => std::iter::once(callee.as_ref()).chain(args.iter()).collect(),
            ExprKind::Construct { args, .. } => args.iter().collect(),
            ExprKind::Array(elems) | ExprKind::UndefinedOperator(elems) => elems.iter().collect(),
        }
    }

    pub fn is_lvalue(&self) -> bool {
        self.category == ValueCategory::LValue
    }

    pub fn contains_errors(&self) -> bool {
        self.dependence.contains(Dependence::ERROR)
    }

    /// Union of the operands' dependence
    pub fn merge_dependence<'a>(operands: impl IntoIterator<Item = &'a Expr>) -> Dependence {
        operands.into_iter().fold(Dependence::empty(), |acc, e| acc | e.dependence)
    }

    /// Look through implicit casts
    pub fn strip_casts(&self) -> &Expr {
        match &self.kind {
            ExprKind::Cast { operand, .. } => operand.strip_casts(),
            _ => self,
        }
    }
}

// ==================== Statements ====================

/// Index of a defer node inside its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeferId(pub(crate) u32);

/// One deferred statement and the chain it was pushed onto
#[derive(Debug, Clone)]
pub struct DeferNode {
    pub stmt: Stmt,
    pub parent: Option<DeferId>,
}

/// Deferred statements to run when control leaves early: walk from `from`
/// through parents until reaching `until` (exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferRange {
    pub from: Option<DeferId>,
    pub until: Option<DeferId>,
}

impl DeferRange {
    pub fn is_empty(&self) -> bool {
        self.from == self.until
    }

    /// Nodes to run, innermost first
    pub fn nodes(&self, defers: &[DeferNode]) -> Vec<DeferId> {
        let mut out = Vec::new();
        let mut cur = self.from;
        while let Some(id) = cur {
            if Some(id) == self.until {
                break;
            }
            out.push(id);
            cur = defers[id.0 as usize].parent;
        }
        out
    }
}

/// Typed statement
#[derive(Debug, Clone)]
pub enum Stmt {
    Compound {
        stmts: Vec<Stmt>,
        scope: ScopeId,
        /// Defers to run on normal exit from the block
        exit_defers: DeferRange,
        span: Span,
    },
    Expr(Expr),
    /// Local binding
    Decl(DeclId),
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
    Break { defers: DeferRange, span: Span },
    Continue { defers: DeferRange, span: Span },
    Return {
        value: Option<Expr>,
        defers: DeferRange,
        span: Span,
    },
    /// Position where a defer was pushed; the statement lives in the function
    Defer { id: DeferId, span: Span },
    Empty { span: Span },
}
