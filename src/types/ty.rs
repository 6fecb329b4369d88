//! Type representation

use bitflags::bitflags;

use crate::sema::{ConstValue, DeclId};
use crate::target::{CType, TargetInfo};
use crate::utils::Span;

bitflags! {
    /// Qualifiers tracked alongside a type, never inside it
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Qualifiers: u8 {
        const MUT = 1 << 0;
    }
}

/// Builtin types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Void,
    NoReturn,
    Bool,
    /// `b8`..`b64`
    SizedBool(u32),
    /// `i8`..`u64`
    Int { signed: bool, bits: u32 },
    /// Pointer-sized integers
    Isize,
    Usize,
    /// `f32`, `f64`
    Float(u32),
    /// C-FFI primitives
    C(CType),
}

impl Builtin {
    pub const I8: Builtin = Builtin::Int { signed: true, bits: 8 };
    pub const I16: Builtin = Builtin::Int { signed: true, bits: 16 };
    pub const I32: Builtin = Builtin::Int { signed: true, bits: 32 };
    pub const I64: Builtin = Builtin::Int { signed: true, bits: 64 };
    pub const U8: Builtin = Builtin::Int { signed: false, bits: 8 };
    pub const U16: Builtin = Builtin::Int { signed: false, bits: 16 };
    pub const U32: Builtin = Builtin::Int { signed: false, bits: 32 };
    pub const U64: Builtin = Builtin::Int { signed: false, bits: 64 };
    pub const F32: Builtin = Builtin::Float(32);
    pub const F64: Builtin = Builtin::Float(64);

    /// Keyword table
    pub fn from_name(name: &str) -> Option<Builtin> {
        let ty = match name {
            "void" => Builtin::Void,
            "noreturn" => Builtin::NoReturn,
            "bool" => Builtin::Bool,
            "b8" => Builtin::SizedBool(8),
            "b16" => Builtin::SizedBool(16),
            "b32" => Builtin::SizedBool(32),
            "b64" => Builtin::SizedBool(64),
            "i8" => Builtin::I8,
            "i16" => Builtin::I16,
            "i32" => Builtin::I32,
            "i64" => Builtin::I64,
            "u8" => Builtin::U8,
            "u16" => Builtin::U16,
            "u32" => Builtin::U32,
            "u64" => Builtin::U64,
            "isize" => Builtin::Isize,
            "usize" => Builtin::Usize,
            "f32" => Builtin::F32,
            "f64" => Builtin::F64,
            _ => return CType::ALL.into_iter().find(|c| c.name() == name).map(Builtin::C),
        };
        Some(ty)
    }

    /// `(signed, bits)` if this is an integer type on `target`
    pub fn integer_info(self, target: &TargetInfo) -> Option<(bool, u32)> {
        match self {
            Builtin::Int { signed, bits } => Some((signed, bits)),
            Builtin::Isize => Some((true, target.pointer_bits())),
            Builtin::Usize => Some((false, target.pointer_bits())),
            Builtin::C(c) if !c.is_float() => {
                Some((target.c_type_signed(c), (target.c_type(c).size * 8) as u32))
            }
            _ => None,
        }
    }

    /// Width in bits if this is a floating-point type on `target`
    pub fn float_bits(self, target: &TargetInfo) -> Option<u32> {
        match self {
            Builtin::Float(bits) => Some(bits),
            Builtin::C(c) if c.is_float() => Some((target.c_type(c).size * 8) as u32),
            _ => None,
        }
    }

    /// Width in bits of any numeric type
    pub fn numeric_bits(self, target: &TargetInfo) -> Option<u32> {
        self.integer_info(target).map(|(_, bits)| bits).or_else(|| self.float_bits(target))
    }

    pub fn is_bool(self) -> bool {
        matches!(self, Builtin::Bool | Builtin::SizedBool(_))
    }

    pub fn name(self) -> String {
        match self {
            Builtin::Void => "void".to_string(),
            Builtin::NoReturn => "noreturn".to_string(),
            Builtin::Bool => "bool".to_string(),
            Builtin::SizedBool(bits) => format!("b{}", bits),
            Builtin::Int { signed: true, bits } => format!("i{}", bits),
            Builtin::Int { signed: false, bits } => format!("u{}", bits),
            Builtin::Isize => "isize".to_string(),
            Builtin::Usize => "usize".to_string(),
            Builtin::Float(bits) => format!("f{}", bits),
            Builtin::C(c) => c.name().to_string(),
        }
    }
}

/// Placeholder types of literals not yet matched to a concrete type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralType {
    Int,
    Float,
    String,
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallConv {
    #[default]
    Aether,
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariadicKind {
    #[default]
    None,
    /// C `...`, arguments get default promotions
    C,
}

/// Function signature type
#[derive(Debug, Clone)]
pub struct FunctionType {
    pub ret: QualType,
    pub params: Vec<QualType>,
    pub call_conv: CallConv,
    pub variadic: VariadicKind,
    pub discardable: bool,
}

/// Unqualified type
#[derive(Debug, Clone)]
pub enum Type {
    /// Stands in for anything that already produced an error
    Poison,
    Builtin(Builtin),
    Pointer(Box<QualType>),
    /// Unbounded indirect sequence, optionally terminated by a sentinel
    Buffer {
        elem: Box<QualType>,
        terminator: Option<ConstValue>,
    },
    /// Pointer and length
    Slice(Box<QualType>),
    /// Fixed size, outermost dimension first
    Array {
        elem: Box<QualType>,
        dims: Vec<u64>,
    },
    Nilable(Box<QualType>),
    Struct(DeclId),
    Enum(DeclId),
    Function(Box<FunctionType>),
    /// Transparent name for another type
    Alias(DeclId),
    Literal(LiteralType),
}

impl Type {
    pub fn is_poison(&self) -> bool {
        matches!(self, Type::Poison)
    }

    pub fn builtin(&self) -> Option<Builtin> {
        match self {
            Type::Builtin(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Builtin(Builtin::Void))
    }

    pub fn is_noreturn(&self) -> bool {
        matches!(self, Type::Builtin(Builtin::NoReturn))
    }

    /// Element type of single-element containers
    pub fn element(&self) -> Option<&QualType> {
        match self {
            Type::Pointer(elem)
            | Type::Buffer { elem, .. }
            | Type::Slice(elem)
            | Type::Array { elem, .. }
            | Type::Nilable(elem) => Some(elem),
            _ => None,
        }
    }
}

/// A type with its qualifiers and the location it was written at
#[derive(Debug, Clone)]
pub struct QualType {
    pub ty: Type,
    pub span: Span,
    pub quals: Qualifiers,
}

impl QualType {
    pub fn new(ty: Type, span: Span) -> Self {
        Self { ty, span, quals: Qualifiers::empty() }
    }

    pub fn with_quals(ty: Type, span: Span, quals: Qualifiers) -> Self {
        Self { ty, span, quals }
    }

    pub fn poison(span: Span) -> Self {
        Self::new(Type::Poison, span)
    }

    pub fn builtin(b: Builtin, span: Span) -> Self {
        Self::new(Type::Builtin(b), span)
    }

    pub fn void() -> Self {
        Self::builtin(Builtin::Void, Span::dummy())
    }

    pub fn bool() -> Self {
        Self::builtin(Builtin::Bool, Span::dummy())
    }

    pub fn literal(kind: LiteralType, span: Span) -> Self {
        Self::new(Type::Literal(kind), span)
    }

    pub fn pointer(elem: QualType, span: Span) -> Self {
        Self::new(Type::Pointer(Box::new(elem)), span)
    }

    pub fn slice(elem: QualType, span: Span) -> Self {
        Self::new(Type::Slice(Box::new(elem)), span)
    }

    pub fn buffer(elem: QualType, span: Span) -> Self {
        Self::new(Type::Buffer { elem: Box::new(elem), terminator: None }, span)
    }

    /// `[]u8`, the type string literals take when nothing else is asked for
    pub fn byte_slice(span: Span) -> Self {
        Self::slice(Self::builtin(Builtin::U8, span), span)
    }

    pub fn is_mut(&self) -> bool {
        self.quals.contains(Qualifiers::MUT)
    }

    /// Same type without qualifiers
    pub fn unqualified(&self) -> QualType {
        Self { ty: self.ty.clone(), span: self.span, quals: Qualifiers::empty() }
    }

    pub fn add_quals(mut self, quals: Qualifiers) -> Self {
        self.quals |= quals;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table() {
        assert_eq!(Builtin::from_name("u16"), Some(Builtin::U16));
        assert_eq!(Builtin::from_name("c_long"), Some(Builtin::C(CType::Long)));
        assert_eq!(Builtin::from_name("b32"), Some(Builtin::SizedBool(32)));
        assert_eq!(Builtin::from_name("string"), None);
    }

    #[test]
    fn test_integer_info_depends_on_target() {
        let lp64 = TargetInfo::x86_64();
        let ilp32 = TargetInfo::i686();
        assert_eq!(Builtin::C(CType::Long).integer_info(&lp64), Some((true, 64)));
        assert_eq!(Builtin::C(CType::Long).integer_info(&ilp32), Some((true, 32)));
        assert_eq!(Builtin::Usize.integer_info(&ilp32), Some((false, 32)));
        assert_eq!(Builtin::F32.integer_info(&lp64), None);
        assert_eq!(Builtin::C(CType::Double).float_bits(&lp64), Some(64));
    }

    #[test]
    fn test_names_roundtrip_through_keyword_table() {
        for name in ["i8", "u64", "f32", "bool", "b16", "isize", "c_int", "noreturn"] {
            let b = Builtin::from_name(name).unwrap();
            assert_eq!(b.name(), name);
        }
    }
}
