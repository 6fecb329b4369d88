//! Size, alignment and struct layout
//!
//! A struct with variants is a tagged union. The root carries its own fields,
//! then a `u32` tag, then the payload of whichever leaf is active. A variant's
//! fields start where its parent's payload starts.
//!
//! Sizes saturate at `u64::MAX`. Array types whose byte size overflows are
//! rejected when they are resolved, see [`Context::array_size`].

use crate::sema::{Context, DeclId, DeclKind, StructDecl};
use crate::target::SizeAlign;
use crate::types::{Builtin, LiteralType, QualType, Type};

const TAG: SizeAlign = SizeAlign::new(4, 4);

/// Result of a successful field lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub decl: DeclId,
    /// Byte offset from the start of the outermost struct
    pub offset: u64,
}

fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align).saturating_mul(align)
}

impl Context {
    pub fn size_of(&self, qt: &QualType) -> u64 {
        self.layout(&self.canonical_type(qt)).size
    }

    pub fn align_of(&self, qt: &QualType) -> u64 {
        self.layout(&self.canonical_type(qt)).align
    }

    /// Byte size of an array of `elem` with the given dimensions, or `None`
    /// when it does not fit in a `u64`
    pub fn array_size(&self, elem: &QualType, dims: &[u64]) -> Option<u64> {
        dims.iter().try_fold(self.size_of(elem), |size, &dim| size.checked_mul(dim))
    }

    fn layout(&self, ty: &Type) -> SizeAlign {
        let target = &self.target;
        match ty {
            Type::Poison => SizeAlign::new(1, 1),
            Type::Builtin(b) => self.builtin_layout(*b),
            Type::Pointer(_) | Type::Buffer { .. } | Type::Function(_) => target.pointer,
            Type::Slice(_) => SizeAlign::new(target.pointer.size * 2, target.pointer.align),
            Type::Array { elem, dims } => {
                let size = self.array_size(elem, dims).unwrap_or(u64::MAX);
                SizeAlign::new(size, self.align_of(elem))
            }
            Type::Nilable(inner) => {
                let inner_ty = self.canonical_type(inner);
                if matches!(inner_ty, Type::Pointer(_) | Type::Buffer { .. } | Type::Function(_)) {
                    return target.pointer;
                }
                let inner = self.layout(&inner_ty);
                SizeAlign::new(align_up(inner.size.saturating_add(1), inner.align), inner.align)
            }
            Type::Struct(id) => self.struct_layout(*id),
            Type::Enum(_) => target.c_int,
            Type::Alias(_) => self.layout(&self.canonical_type(&QualType::new(ty.clone(), Default::default()))),
            Type::Literal(LiteralType::Int) => self.builtin_layout(Builtin::I32),
            Type::Literal(LiteralType::Float) => self.builtin_layout(Builtin::F64),
            Type::Literal(LiteralType::String) => SizeAlign::new(target.pointer.size * 2, target.pointer.align),
            Type::Literal(LiteralType::Nil) => target.pointer,
        }
    }

    fn builtin_layout(&self, b: Builtin) -> SizeAlign {
        let target = &self.target;
        match b {
            Builtin::Void | Builtin::NoReturn => SizeAlign::new(0, 1),
            Builtin::Bool => SizeAlign::new(1, 1),
            Builtin::SizedBool(bits) | Builtin::Float(bits) | Builtin::Int { bits, .. } => {
                let size = u64::from(bits / 8);
                let align = if size == 8 { target.i64_align } else { size };
                SizeAlign::new(size, align)
            }
            Builtin::Isize | Builtin::Usize => target.pointer,
            Builtin::C(c) => target.c_type(c),
        }
    }

    fn struct_decl(&self, id: DeclId) -> &StructDecl {
        match &self.decl(id).kind {
            DeclKind::Struct(s) => s,
            other => self.diag.ice(format!("expected struct, found {}", other.describe())),
        }
    }

    /// Offset where the struct's own fields begin
    fn fields_start(&self, id: DeclId) -> u64 {
        match self.struct_decl(id).parent {
            None => 0,
            Some(parent) => self.payload_start(parent),
        }
    }

    /// Offset just past the struct's own fields, and their combined alignment
    fn fields_end(&self, id: DeclId) -> (u64, u64) {
        let mut offset = self.fields_start(id);
        let mut align = 1;
        for &field in &self.struct_decl(id).fields {
            let DeclKind::Field(f) = &self.decl(field).kind else {
                self.diag.ice("struct member is not a field");
            };
            let layout = self.layout(&self.canonical_type(&f.ty));
            offset = align_up(offset, layout.align).saturating_add(layout.size);
            align = align.max(layout.align);
        }
        (offset, align)
    }

    /// Offset where the variant payload of a non-leaf struct begins
    fn payload_start(&self, id: DeclId) -> u64 {
        let (end, _) = self.fields_end(id);
        if self.struct_decl(id).parent.is_none() {
            align_up(end, TAG.align).saturating_add(TAG.size)
        } else {
            end
        }
    }

    /// Extent of the subtree rooted at `id`: furthest end and largest alignment
    fn subtree_extent(&self, id: DeclId) -> (u64, u64) {
        let decl = self.struct_decl(id);
        let (mut end, mut align) = self.fields_end(id);
        if !decl.variants.is_empty() {
            if decl.parent.is_none() {
                align = align.max(TAG.align);
                end = end.max(self.payload_start(id));
            }
            for &variant in &decl.variants {
                let (v_end, v_align) = self.subtree_extent(variant);
                end = end.max(v_end);
                align = align.max(v_align);
            }
        }
        (end, align)
    }

    fn struct_layout(&self, id: DeclId) -> SizeAlign {
        let mut root = id;
        while let Some(parent) = self.struct_decl(root).parent {
            root = parent;
        }
        let (end, align) = self.subtree_extent(root);
        SizeAlign::new(align_up(end.max(1), align), align)
    }

    /// Find a field declared directly in struct `id`.
    ///
    /// Walks the fields in declaration order, aligning the running offset to
    /// each field before comparing names.
    pub fn try_lookup_field(&self, id: DeclId, name: &str) -> Option<FieldInfo> {
        let mut offset = self.fields_start(id);
        for &field in &self.struct_decl(id).fields {
            let decl = self.decl(field);
            let DeclKind::Field(f) = &decl.kind else {
                self.diag.ice("struct member is not a field");
            };
            let layout = self.layout(&self.canonical_type(&f.ty));
            offset = align_up(offset, layout.align);
            if decl.name == name {
                return Some(FieldInfo { decl: field, offset });
            }
            offset = offset.saturating_add(layout.size);
        }
        None
    }

    /// Like [`try_lookup_field`](Self::try_lookup_field), also searching the
    /// fields a variant inherits from its enclosing structs
    pub fn lookup_field_inherited(&self, id: DeclId, name: &str) -> Option<FieldInfo> {
        let mut current = Some(id);
        while let Some(s) = current {
            if let Some(info) = self.try_lookup_field(s, name) {
                return Some(info);
            }
            current = self.struct_decl(s).parent;
        }
        None
    }

    /// All fields of a struct, inherited ones first
    pub fn all_fields(&self, id: DeclId) -> Vec<DeclId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.struct_decl(current).parent {
            chain.push(parent);
            current = parent;
        }
        chain.iter().rev().flat_map(|&s| self.struct_decl(s).fields.iter().copied()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::{Decl, FieldDecl, Linkage, ModuleId};
    use crate::types::CompareMode;
    use crate::utils::Span;
    use pretty_assertions::assert_eq;

    fn qt(b: Builtin) -> QualType {
        QualType::builtin(b, Span::dummy())
    }

    fn add_struct(cx: &mut Context, name: &str, parent: Option<DeclId>) -> DeclId {
        let scope = cx.scopes.new_scope(None);
        let id = cx.add_decl(Decl {
            name: name.to_string(),
            span: Span::dummy(),
            linkage: Linkage::Internal,
            module: ModuleId(0),
            kind: DeclKind::Struct(StructDecl::new(scope, parent)),
        });
        if let Some(parent) = parent {
            if let DeclKind::Struct(p) = &mut cx.decl_mut(parent).kind {
                p.variants.push(id);
            }
        }
        id
    }

    fn add_field(cx: &mut Context, owner: DeclId, name: &str, ty: QualType) -> DeclId {
        let index = match &cx.decl(owner).kind {
            DeclKind::Struct(s) => s.fields.len(),
            _ => unreachable!(),
        };
        let id = cx.add_decl(Decl {
            name: name.to_string(),
            span: Span::dummy(),
            linkage: Linkage::Internal,
            module: ModuleId(0),
            kind: DeclKind::Field(FieldDecl { ty, index, owner }),
        });
        if let DeclKind::Struct(s) = &mut cx.decl_mut(owner).kind {
            s.fields.push(id);
        }
        id
    }

    #[test]
    fn test_builtin_sizes() {
        let cx = Context::default();
        assert_eq!(cx.size_of(&qt(Builtin::U16)), 2);
        assert_eq!(cx.size_of(&qt(Builtin::Usize)), 8);
        assert_eq!(cx.size_of(&QualType::poison(Span::dummy())), 1);
        assert_eq!(cx.size_of(&QualType::byte_slice(Span::dummy())), 16);
    }

    #[test]
    fn test_field_offsets_are_aligned() {
        let mut cx = Context::default();
        let s = add_struct(&mut cx, "S", None);
        add_field(&mut cx, s, "a", qt(Builtin::U8));
        let b = add_field(&mut cx, s, "b", qt(Builtin::I32));
        add_field(&mut cx, s, "c", qt(Builtin::U8));
        assert_eq!(cx.try_lookup_field(s, "b"), Some(FieldInfo { decl: b, offset: 4 }));
        assert_eq!(cx.try_lookup_field(s, "c").map(|f| f.offset), Some(8));
        assert_eq!(cx.try_lookup_field(s, "missing"), None);
        let ty = QualType::new(Type::Struct(s), Span::dummy());
        assert_eq!(cx.size_of(&ty), 12);
        assert_eq!(cx.align_of(&ty), 4);
    }

    #[test]
    fn test_variant_layout() {
        let mut cx = Context::default();
        let shape = add_struct(&mut cx, "Shape", None);
        add_field(&mut cx, shape, "id", qt(Builtin::U8));
        let circle = add_struct(&mut cx, "Circle", Some(shape));
        add_field(&mut cx, circle, "r", qt(Builtin::I32));
        let square = add_struct(&mut cx, "Square", Some(shape));
        add_field(&mut cx, square, "s", qt(Builtin::I64));

        // id at 0, tag at 4..8, payload from 8
        assert_eq!(cx.try_lookup_field(circle, "r").map(|f| f.offset), Some(8));
        assert_eq!(cx.try_lookup_field(square, "s").map(|f| f.offset), Some(8));
        assert_eq!(cx.lookup_field_inherited(square, "id").map(|f| f.offset), Some(0));
        assert_eq!(cx.try_lookup_field(square, "id"), None);

        let whole = QualType::new(Type::Struct(shape), Span::dummy());
        assert_eq!(cx.size_of(&whole), 16);
        let variant = QualType::new(Type::Struct(circle), Span::dummy());
        assert_eq!(cx.size_of(&variant), cx.size_of(&whole));
        assert!(!cx.qual_type_equals(&whole, &variant, CompareMode::Exact));
    }

    #[test]
    fn test_array_size_overflow() {
        let cx = Context::default();
        let elem = qt(Builtin::I32);
        assert_eq!(cx.array_size(&elem, &[2, 3]), Some(24));
        assert_eq!(cx.array_size(&elem, &[1 << 40, 1 << 40]), None);
        let huge = QualType::new(Type::Array { elem: Box::new(elem), dims: vec![1 << 40, 1 << 40] }, Span::dummy());
        assert_eq!(cx.size_of(&huge), u64::MAX);
    }

    #[test]
    fn test_saturated_field_offsets() {
        let mut cx = Context::default();
        let s = add_struct(&mut cx, "Big", None);
        let half = QualType::new(Type::Array { elem: Box::new(qt(Builtin::U8)), dims: vec![1 << 63] }, Span::dummy());
        add_field(&mut cx, s, "a", half.clone());
        add_field(&mut cx, s, "b", half);
        add_field(&mut cx, s, "tail", qt(Builtin::I32));
        assert_eq!(cx.try_lookup_field(s, "b").map(|f| f.offset), Some(1 << 63));
        assert_eq!(cx.try_lookup_field(s, "tail").map(|f| f.offset), Some(u64::MAX));
        assert_eq!(cx.size_of(&QualType::new(Type::Struct(s), Span::dummy())), u64::MAX);
    }

    #[test]
    fn test_all_fields_parent_first() {
        let mut cx = Context::default();
        let shape = add_struct(&mut cx, "Shape", None);
        let id = add_field(&mut cx, shape, "id", qt(Builtin::U8));
        let circle = add_struct(&mut cx, "Circle", Some(shape));
        let r = add_field(&mut cx, circle, "r", qt(Builtin::I32));
        assert_eq!(cx.all_fields(circle), vec![id, r]);
    }
}
