//! Human-readable type spelling for diagnostics and dumps

use crate::sema::Context;
use crate::types::{CallConv, LiteralType, QualType, Type, VariadicKind};

impl Context {
    /// Source-like spelling, e.g. `*mut i32` or `[]u8`
    pub fn type_name(&self, qt: &QualType) -> String {
        let inner = self.unqualified_name(&qt.ty);
        if qt.is_mut() {
            format!("mut {}", inner)
        } else {
            inner
        }
    }

    fn unqualified_name(&self, ty: &Type) -> String {
        match ty {
            Type::Poison => "<error>".to_string(),
            Type::Builtin(b) => b.name(),
            Type::Pointer(elem) => format!("*{}", self.type_name(elem)),
            Type::Buffer { elem, terminator: None } => format!("[*]{}", self.type_name(elem)),
            Type::Buffer { elem, terminator: Some(term) } => {
                format!("[*:{:?}]{}", term, self.type_name(elem))
            }
            Type::Slice(elem) => format!("[]{}", self.type_name(elem)),
            Type::Array { elem, dims } => {
                let dims: String = dims.iter().map(|d| format!("[{}]", d)).collect();
                format!("{}{}", dims, self.type_name(elem))
            }
            Type::Nilable(inner) => format!("?{}", self.type_name(inner)),
            Type::Struct(id) | Type::Enum(id) | Type::Alias(id) => self.decl(*id).name.clone(),
            Type::Function(f) => {
                let mut params: Vec<String> = f.params.iter().map(|p| self.type_name(p)).collect();
                if f.variadic == VariadicKind::C {
                    params.push("...".to_string());
                }
                let conv = match f.call_conv {
                    CallConv::Aether => "",
                    CallConv::C => "extern(C) ",
                };
                format!("{}fn({}) -> {}", conv, params.join(", "), self.type_name(&f.ret))
            }
            Type::Literal(LiteralType::Int) => "integer literal".to_string(),
            Type::Literal(LiteralType::Float) => "float literal".to_string(),
            Type::Literal(LiteralType::String) => "string literal".to_string(),
            Type::Literal(LiteralType::Nil) => "nil".to_string(),
        }
    }
}
