//! Canonical types and type equality

use crate::sema::{Context, DeclKind};
use crate::types::{QualType, Type};

/// How qualifiers take part in a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Qualifiers must match exactly
    Exact,
    /// Left is the source, right the target: the target may drop `mut`
    /// but never add it
    QualifierConversion,
    /// Qualifiers are ignored at every level
    IgnoreQualifiers,
}

impl Context {
    /// Unwrap alias indirection, accumulating qualifiers along the way.
    ///
    /// Alias targets are analyzed before they can be referenced, and a cyclic
    /// alias is turned into poison, so the chain is finite. The bound below
    /// turns a violation of that into an ICE instead of a hang.
    pub fn canonical(&self, qt: &QualType) -> QualType {
        let mut ty = &qt.ty;
        let mut quals = qt.quals;
        let mut steps = 0usize;
        while let Type::Alias(id) = ty {
            let DeclKind::Alias(alias) = &self.decl(*id).kind else {
                self.diag.ice(format!("alias type refers to non-alias '{}'", self.decl(*id).name));
            };
            quals |= alias.target.quals;
            ty = &alias.target.ty;
            steps += 1;
            if steps > self.decl_count() {
                self.diag.ice("alias chain does not terminate");
            }
        }
        QualType::with_quals(ty.clone(), qt.span, quals)
    }

    /// Canonical unqualified type
    pub fn canonical_type(&self, qt: &QualType) -> Type {
        self.canonical(qt).ty
    }

    /// Whether `qt` is poison once aliases are removed
    pub fn is_poison(&self, qt: &QualType) -> bool {
        self.canonical_type(qt).is_poison()
    }

    /// Equality of qualified types; `a` is the source under
    /// [`CompareMode::QualifierConversion`]
    pub fn qual_type_equals(&self, a: &QualType, b: &QualType, mode: CompareMode) -> bool {
        let a = self.canonical(a);
        let b = self.canonical(b);
        let quals_ok = match mode {
            CompareMode::Exact => a.quals == b.quals,
            CompareMode::QualifierConversion => a.quals.contains(b.quals),
            CompareMode::IgnoreQualifiers => true,
        };
        quals_ok && self.type_equals(&a.ty, &b.ty, mode)
    }

    /// Structural equality of unqualified types; structs and enums are
    /// nominal. Poison equals nothing, itself included.
    pub fn type_equals(&self, a: &Type, b: &Type, mode: CompareMode) -> bool {
        let a = self.unalias(a);
        let b = self.unalias(b);
        match (&a, &b) {
            (Type::Poison, _) | (_, Type::Poison) => false,
            (Type::Builtin(x), Type::Builtin(y)) => x == y,
            (Type::Pointer(x), Type::Pointer(y))
            | (Type::Slice(x), Type::Slice(y))
            | (Type::Nilable(x), Type::Nilable(y)) => self.qual_type_equals(x, y, mode),
            (
                Type::Buffer { elem: x, terminator: tx },
                Type::Buffer { elem: y, terminator: ty },
            ) => tx == ty && self.qual_type_equals(x, y, mode),
            (Type::Array { elem: x, dims: dx }, Type::Array { elem: y, dims: dy }) => {
                dx == dy && self.qual_type_equals(x, y, mode)
            }
            (Type::Function(x), Type::Function(y)) => {
                x.call_conv == y.call_conv
                    && x.variadic == y.variadic
                    && x.params.len() == y.params.len()
                    && self.qual_type_equals(&x.ret, &y.ret, mode)
                    && x.params
                        .iter()
                        .zip(y.params.iter())
                        .all(|(p, q)| self.qual_type_equals(p, q, mode))
            }
            (Type::Struct(x), Type::Struct(y)) | (Type::Enum(x), Type::Enum(y)) => x == y,
            (Type::Literal(x), Type::Literal(y)) => x == y,
            _ => false,
        }
    }

    fn unalias(&self, ty: &Type) -> Type {
        match ty {
            Type::Alias(_) => self.canonical(&QualType::new(ty.clone(), Default::default())).ty,
            _ => ty.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::{AliasDecl, Decl, Linkage, ModuleId};
    use crate::types::{Builtin, Qualifiers};
    use crate::utils::Span;

    fn alias(cx: &mut Context, name: &str, target: QualType) -> QualType {
        let id = cx.add_decl(Decl {
            name: name.to_string(),
            span: Span::dummy(),
            linkage: Linkage::Internal,
            module: ModuleId(0),
            kind: DeclKind::Alias(AliasDecl { target }),
        });
        QualType::new(Type::Alias(id), Span::dummy())
    }

    fn i32() -> QualType {
        QualType::builtin(Builtin::I32, Span::dummy())
    }

    fn mut_(qt: QualType) -> QualType {
        qt.add_quals(Qualifiers::MUT)
    }

    #[test]
    fn test_canonical_unwraps_chains() {
        let mut cx = Context::default();
        let a = alias(&mut cx, "A", i32());
        let b = alias(&mut cx, "B", a.clone());
        let c = cx.canonical(&b);
        assert!(matches!(c.ty, Type::Builtin(Builtin::I32)));
        assert!(cx.qual_type_equals(&b, &i32(), CompareMode::Exact));
    }

    #[test]
    fn test_canonical_is_idempotent() {
        let mut cx = Context::default();
        let a = alias(&mut cx, "A", mut_(i32()));
        let b = alias(&mut cx, "B", QualType::pointer(a, Span::dummy()));
        for t in [i32(), b.clone(), QualType::slice(b.clone(), Span::dummy())] {
            let once = cx.canonical(&t);
            let twice = cx.canonical(&once);
            assert!(cx.qual_type_equals(&once, &twice, CompareMode::Exact));
        }
    }

    #[test]
    fn test_canonical_accumulates_qualifiers() {
        let mut cx = Context::default();
        let a = alias(&mut cx, "A", mut_(i32()));
        let c = cx.canonical(&a);
        assert!(c.is_mut());
    }

    #[test]
    fn test_poison_equals_nothing() {
        let cx = Context::default();
        let p = QualType::poison(Span::dummy());
        for mode in [CompareMode::Exact, CompareMode::QualifierConversion, CompareMode::IgnoreQualifiers] {
            assert!(!cx.qual_type_equals(&p, &p, mode));
            assert!(!cx.qual_type_equals(&p, &i32(), mode));
            assert!(!cx.qual_type_equals(&i32(), &p, mode));
        }
    }

    #[test]
    fn test_qualifier_modes() {
        let cx = Context::default();
        let ptr_mut = QualType::pointer(mut_(i32()), Span::dummy());
        let ptr = QualType::pointer(i32(), Span::dummy());
        assert!(!cx.qual_type_equals(&ptr_mut, &ptr, CompareMode::Exact));
        assert!(cx.qual_type_equals(&ptr_mut, &ptr, CompareMode::QualifierConversion));
        assert!(!cx.qual_type_equals(&ptr, &ptr_mut, CompareMode::QualifierConversion));
        assert!(cx.qual_type_equals(&ptr, &ptr_mut, CompareMode::IgnoreQualifiers));
    }

    #[test]
    fn test_array_dims_compared() {
        let cx = Context::default();
        let a = QualType::new(Type::Array { elem: Box::new(i32()), dims: vec![2, 3] }, Span::dummy());
        let b = QualType::new(Type::Array { elem: Box::new(i32()), dims: vec![3, 2] }, Span::dummy());
        assert!(cx.qual_type_equals(&a, &a.clone(), CompareMode::Exact));
        assert!(!cx.qual_type_equals(&a, &b, CompareMode::Exact));
    }
}
