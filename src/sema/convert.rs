//! Implicit conversions
//!
//! Every implicit conversion goes through [`Context::convert`]. Scoring and
//! performing share one decision procedure, so a conversion that scores as
//! possible never produces a diagnostic when performed.

use crate::sema::consteval::{evaluate, ConstValue};
use crate::sema::ir::{CastKind, Expr, ExprKind};
use crate::sema::Context;
use crate::target::CType;
use crate::types::{Builtin, CompareMode, LiteralType, QualType, Type};

/// Cost of an implicit conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Converts without touching the value category
    NoOp,
    /// Converts after loading from an lvalue
    Load,
    Impossible,
    /// The operand already contains errors; nothing was checked
    ContainsErrors,
}

impl Score {
    pub fn value(self) -> i32 {
        match self {
            Score::NoOp => 0,
            Score::Load => 1,
            Score::Impossible => -1,
            Score::ContainsErrors => -2,
        }
    }

    pub fn is_ok(self) -> bool {
        self.value() >= 0
    }
}

enum Plan {
    /// Poison on either side, accepted as is
    Poisoned,
    Errored,
    Impossible,
    Convert(Option<CastKind>),
}

impl Context {
    fn plan_conversion(&self, expr: &Expr, target: &QualType) -> Plan {
        let from = self.canonical_type(&expr.ty);
        let to = self.canonical_type(target);
        if from.is_poison() || to.is_poison() {
            return Plan::Poisoned;
        }
        if expr.contains_errors() {
            return Plan::Errored;
        }
        if self.type_equals(&from, &to, CompareMode::Exact) {
            return Plan::Convert(None);
        }
        if let Some(kind) = self.container_conversion(&from, &to) {
            return Plan::Convert(Some(kind));
        }
        if let Some(kind) = self.constant_conversion(expr, &to) {
            return Plan::Convert(Some(kind));
        }
        if let Some(kind) = self.integer_widening(&from, &to) {
            return Plan::Convert(Some(kind));
        }
        Plan::Impossible
    }

    fn container_conversion(&self, from: &Type, to: &Type) -> Option<CastKind> {
        let elements_ok = |a: &QualType, b: &QualType| self.qual_type_equals(a, b, CompareMode::QualifierConversion);
        match (from, to) {
            (Type::Literal(LiteralType::Nil), Type::Pointer(_) | Type::Buffer { .. } | Type::Nilable(_)) => {
                Some(CastKind::NilToPointer)
            }
            (Type::Pointer(a), Type::Pointer(b))
            | (Type::Slice(a), Type::Slice(b))
            | (Type::Nilable(a), Type::Nilable(b)) => elements_ok(a, b).then_some(CastKind::Qualification),
            (Type::Buffer { elem: a, terminator: ta }, Type::Buffer { elem: b, terminator: tb }) => {
                (ta == tb && elements_ok(a, b)).then_some(CastKind::Qualification)
            }
            (Type::Array { elem: a, dims: da }, Type::Array { elem: b, dims: db }) => {
                (da == db && elements_ok(a, b)).then_some(CastKind::Qualification)
            }
            _ => None,
        }
    }

    fn constant_conversion(&self, expr: &Expr, to: &Type) -> Option<CastKind> {
        if let ExprKind::FloatLiteral(_) = expr.kind {
            return to.builtin()?.float_bits(&self.target).map(|_| CastKind::FloatConstant);
        }
        match evaluate(expr)? {
            value @ ConstValue::Int(_) => {
                let needed = value.min_bit_length()?;
                let available = to.builtin()?.numeric_bits(&self.target)?;
                (available >= needed).then_some(CastKind::IntegerConstant)
            }
            ConstValue::String(_) => match to {
                Type::Slice(elem) if self.is_byte(elem) => Some(CastKind::StringToSlice),
                Type::Buffer { elem, terminator: None } if self.is_byte(elem) => Some(CastKind::StringToBuffer),
                _ => None,
            },
        }
    }

    fn integer_widening(&self, from: &Type, to: &Type) -> Option<CastKind> {
        let (signed, from_bits) = from.builtin()?.integer_info(&self.target)?;
        let (_, to_bits) = to.builtin()?.integer_info(&self.target)?;
        (from_bits <= to_bits).then_some(CastKind::IntegerExtend { signed })
    }

    fn is_byte(&self, qt: &QualType) -> bool {
        matches!(self.canonical_type(qt), Type::Builtin(Builtin::U8))
    }

    fn score_of(plan: &Plan, expr: &Expr) -> Score {
        match plan {
            Plan::Poisoned => Score::NoOp,
            Plan::Errored => Score::ContainsErrors,
            Plan::Impossible => Score::Impossible,
            Plan::Convert(_) if expr.is_lvalue() => Score::Load,
            Plan::Convert(_) => Score::NoOp,
        }
    }

    /// Score converting `expr` to `target` without changing anything
    pub fn try_convert(&self, expr: &Expr, target: &QualType) -> Score {
        Self::score_of(&self.plan_conversion(expr, target), expr)
    }

    /// Convert `expr` to `target`, inserting the casts it takes. On failure
    /// the expression comes back unchanged.
    pub fn convert(&self, expr: Expr, target: &QualType) -> (Expr, Score) {
        let plan = self.plan_conversion(&expr, target);
        let score = Self::score_of(&plan, &expr);
        let expr = match plan {
            Plan::Convert(kind) => {
                let expr = Self::lvalue_to_rvalue(expr);
                match kind {
                    Some(kind) => Self::wrap_cast(expr, kind, target.unqualified()),
                    None => expr,
                }
            }
            Plan::Poisoned | Plan::Errored | Plan::Impossible => expr,
        };
        (expr, score)
    }

    /// Like [`convert`](Self::convert), reporting an impossible conversion.
    /// The result is poison if the conversion failed.
    pub fn convert_or_error(&mut self, expr: Expr, target: &QualType) -> Expr {
        let (expr, score) = self.convert(expr, target);
        match score {
            Score::Impossible => {
                let message = format!(
                    "cannot convert from '{}' to '{}'",
                    self.type_name(&expr.ty),
                    self.type_name(target)
                );
                self.diag.error(expr.span, message);
                Expr::poison(expr.span)
            }
            Score::ContainsErrors => Expr::poison(expr.span),
            Score::NoOp | Score::Load => expr,
        }
    }

    pub fn lvalue_to_rvalue(expr: Expr) -> Expr {
        if !expr.is_lvalue() {
            return expr;
        }
        let ty = expr.ty.unqualified();
        Self::wrap_cast(expr, CastKind::LValueToRValue, ty)
    }

    fn wrap_cast(expr: Expr, kind: CastKind, ty: QualType) -> Expr {
        let span = expr.span;
        let dependence = expr.dependence;
        let mut cast = Expr::rvalue(ExprKind::Cast { kind, operand: Box::new(expr) }, ty, span);
        cast.dependence = dependence;
        cast
    }

    /// Give a literal its default concrete type: `i32` (or `i64` when it does
    /// not fit), `f64`, or `[]u8`. Anything else is returned as is.
    pub fn materialize_literal(&mut self, expr: Expr) -> Expr {
        let span = expr.span;
        let candidates = match self.canonical_type(&expr.ty) {
            Type::Literal(LiteralType::Int) => vec![Builtin::I32, Builtin::I64, Builtin::U64],
            Type::Literal(LiteralType::Float) => vec![Builtin::F64],
            Type::Literal(LiteralType::String) => {
                return self.convert_or_error(expr, &QualType::byte_slice(span));
            }
            Type::Literal(LiteralType::Nil) => {
                self.diag.error(span, "cannot infer a type for 'nil'");
                return Expr::poison(span);
            }
            _ => return expr,
        };
        for b in candidates {
            let target = QualType::builtin(b, span);
            if self.try_convert(&expr, &target).is_ok() {
                return self.convert(expr, &target).0;
            }
        }
        self.diag.error(span, "integer literal is too large for any integer type");
        Expr::poison(span)
    }

    /// Common type of a binary operator's operands.
    ///
    /// Tries both directions and keeps the cheaper one; on a tie the left
    /// operand is converted.
    pub fn common_type(&self, lhs: &Expr, rhs: &Expr) -> Option<QualType> {
        let left_to_right = self.try_convert(lhs, &rhs.ty);
        let right_to_left = self.try_convert(rhs, &lhs.ty);
        match (left_to_right.is_ok(), right_to_left.is_ok()) {
            (true, true) if right_to_left.value() < left_to_right.value() => Some(lhs.ty.unqualified()),
            (true, _) => Some(rhs.ty.unqualified()),
            (false, true) => Some(lhs.ty.unqualified()),
            (false, false) => None,
        }
    }

    /// Default argument promotion for C variadic arguments
    pub fn promote_variadic(&mut self, expr: Expr) -> Expr {
        let span = expr.span;
        let c_int = QualType::builtin(Builtin::C(CType::Int), span);
        let c_double = QualType::builtin(Builtin::C(CType::Double), span);
        let expr = match self.canonical_type(&expr.ty) {
            Type::Literal(LiteralType::Int) => {
                let wide = QualType::builtin(Builtin::C(CType::LongLong), span);
                if self.try_convert(&expr, &c_int).is_ok() {
                    return self.convert(expr, &c_int).0;
                }
                return self.convert_or_error(expr, &wide);
            }
            Type::Literal(LiteralType::Float) => return self.convert_or_error(expr, &c_double),
            Type::Literal(LiteralType::String) => {
                let bytes = QualType::buffer(QualType::builtin(Builtin::U8, span), span);
                return self.convert_or_error(expr, &bytes);
            }
            _ => Self::lvalue_to_rvalue(expr),
        };
        let Some(builtin) = self.canonical_type(&expr.ty).builtin() else {
            return expr;
        };
        if let Some((signed, bits)) = builtin.integer_info(&self.target) {
            if bits < self.target.int_bits() {
                return Self::wrap_cast(expr, CastKind::IntegerExtend { signed }, c_int);
            }
        } else if let Some(bits) = builtin.float_bits(&self.target) {
            if u64::from(bits) < self.target.c_double.size * 8 {
                return Self::wrap_cast(expr, CastKind::FloatExtend, c_double);
            }
        }
        expr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::ir::Dependence;
    use crate::types::Qualifiers;
    use crate::utils::Span;

    fn qt(b: Builtin) -> QualType {
        QualType::builtin(b, Span::dummy())
    }

    fn int(v: u128) -> Expr {
        Expr::rvalue(ExprKind::IntLiteral(v), QualType::literal(LiteralType::Int, Span::dummy()), Span::dummy())
    }

    fn string(s: &str) -> Expr {
        Expr::rvalue(
            ExprKind::StringLiteral(s.to_string()),
            QualType::literal(LiteralType::String, Span::dummy()),
            Span::dummy(),
        )
    }

    /// An opaque rvalue of type `ty`
    fn value(ty: QualType) -> Expr {
        Expr::rvalue(ExprKind::BoolLiteral(false), ty, Span::dummy())
    }

    fn cast_kind(e: &Expr) -> Option<CastKind> {
        match &e.kind {
            ExprKind::Cast { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    #[test]
    fn test_identical_is_noop() {
        let cx = Context::default();
        let (e, score) = cx.convert(value(qt(Builtin::I32)), &qt(Builtin::I32));
        assert_eq!(score, Score::NoOp);
        assert!(cast_kind(&e).is_none());
    }

    #[test]
    fn test_lvalue_scores_load_and_materializes() {
        let cx = Context::default();
        let lv = Expr::lvalue(ExprKind::BoolLiteral(false), qt(Builtin::I32), Span::dummy());
        assert_eq!(cx.try_convert(&lv, &qt(Builtin::I32)), Score::Load);
        let (e, _) = cx.convert(lv, &qt(Builtin::I32));
        assert_eq!(cast_kind(&e), Some(CastKind::LValueToRValue));
        assert!(!e.is_lvalue());
    }

    #[test]
    fn test_poison_absorbs() {
        let cx = Context::default();
        let p = Expr::poison(Span::dummy());
        assert_eq!(cx.try_convert(&p, &qt(Builtin::I32)), Score::NoOp);
        let v = value(qt(Builtin::I32));
        assert_eq!(cx.try_convert(&v, &QualType::poison(Span::dummy())), Score::NoOp);
    }

    #[test]
    fn test_error_dependent_operand() {
        let cx = Context::default();
        let mut v = value(qt(Builtin::I32));
        v.dependence |= Dependence::ERROR;
        assert_eq!(cx.try_convert(&v, &qt(Builtin::I64)), Score::ContainsErrors);
    }

    #[test]
    fn test_integer_widening() {
        let cx = Context::default();
        let (e, score) = cx.convert(value(qt(Builtin::I8)), &qt(Builtin::I32));
        assert_eq!(score, Score::NoOp);
        assert_eq!(cast_kind(&e), Some(CastKind::IntegerExtend { signed: true }));
        assert_eq!(cx.try_convert(&value(qt(Builtin::I32)), &qt(Builtin::I8)), Score::Impossible);
        assert_eq!(cx.try_convert(&value(qt(Builtin::F32)), &qt(Builtin::F64)), Score::Impossible);
    }

    #[test]
    fn test_integer_constants_by_bit_length() {
        let cx = Context::default();
        assert!(cx.try_convert(&int(255), &qt(Builtin::U8)).is_ok());
        assert_eq!(cx.try_convert(&int(256), &qt(Builtin::U8)), Score::Impossible);
        assert!(cx.try_convert(&int(1), &qt(Builtin::F32)).is_ok());
        assert_eq!(cx.try_convert(&int(1), &QualType::bool()), Score::Impossible);
    }

    #[test]
    fn test_string_constants() {
        let cx = Context::default();
        let u8_ = qt(Builtin::U8);
        let (e, _) = cx.convert(string("hi"), &QualType::byte_slice(Span::dummy()));
        assert_eq!(cast_kind(&e), Some(CastKind::StringToSlice));
        assert!(cx.try_convert(&string("hi"), &QualType::buffer(u8_, Span::dummy())).is_ok());
        let ints = QualType::slice(qt(Builtin::I32), Span::dummy());
        assert_eq!(cx.try_convert(&string("hi"), &ints), Score::Impossible);
    }

    #[test]
    fn test_pointer_qualification() {
        let cx = Context::default();
        let mut_i32 = qt(Builtin::I32).add_quals(Qualifiers::MUT);
        let ptr_mut = QualType::pointer(mut_i32, Span::dummy());
        let ptr = QualType::pointer(qt(Builtin::I32), Span::dummy());
        let (e, score) = cx.convert(value(ptr_mut.clone()), &ptr);
        assert_eq!(score, Score::NoOp);
        assert_eq!(cast_kind(&e), Some(CastKind::Qualification));
        assert_eq!(cx.try_convert(&value(ptr), &ptr_mut), Score::Impossible);
    }

    #[test]
    fn test_nil_to_pointer() {
        let cx = Context::default();
        let nil = value(QualType::literal(LiteralType::Nil, Span::dummy()));
        let ptr = QualType::pointer(qt(Builtin::I32), Span::dummy());
        assert!(cx.try_convert(&nil, &ptr).is_ok());
        assert_eq!(cx.try_convert(&nil, &qt(Builtin::I32)), Score::Impossible);
    }

    #[test]
    fn test_scored_conversions_never_diagnose() {
        let mut cx = Context::default();
        let cases = vec![
            (int(7), qt(Builtin::U8)),
            (int(300), qt(Builtin::U8)),
            (value(qt(Builtin::I16)), qt(Builtin::I64)),
            (value(qt(Builtin::I64)), qt(Builtin::I16)),
            (string("x"), QualType::byte_slice(Span::dummy())),
            (string("x"), qt(Builtin::I32)),
        ];
        for (expr, target) in cases {
            let score = cx.try_convert(&expr, &target);
            let before = cx.diag.error_count();
            cx.convert_or_error(expr, &target);
            let raised = cx.diag.error_count() - before;
            if score.is_ok() {
                assert_eq!(raised, 0);
            } else {
                assert_eq!(raised, 1);
            }
        }
    }

    #[test]
    fn test_common_type_prefers_cheaper_direction() {
        let cx = Context::default();
        let lhs = Expr::lvalue(ExprKind::BoolLiteral(false), qt(Builtin::I32), Span::dummy());
        let common = cx.common_type(&lhs, &int(1)).unwrap();
        assert!(matches!(common.ty, Type::Builtin(Builtin::I32)));

        // both directions free: the left operand converts
        let a = value(qt(Builtin::I32));
        let b = value(qt(Builtin::I32).add_quals(Qualifiers::MUT));
        let common = cx.common_type(&a, &b).unwrap();
        assert!(!common.is_mut());

        let narrow = value(qt(Builtin::I8));
        let wide = value(qt(Builtin::I64));
        assert!(matches!(cx.common_type(&narrow, &wide).unwrap().ty, Type::Builtin(Builtin::I64)));
        let f = value(qt(Builtin::F32));
        assert!(cx.common_type(&f, &wide).is_none());
    }

    #[test]
    fn test_materialize_literal_defaults() {
        let mut cx = Context::default();
        let e = cx.materialize_literal(int(5));
        assert!(matches!(e.ty.ty, Type::Builtin(Builtin::I32)));
        let big = cx.materialize_literal(int(1 << 40));
        assert!(matches!(big.ty.ty, Type::Builtin(Builtin::I64)));
        let s = cx.materialize_literal(string("hi"));
        assert!(matches!(s.ty.ty, Type::Slice(_)));
        assert!(!cx.diag.has_errors());
    }

    #[test]
    fn test_variadic_promotion() {
        let mut cx = Context::default();
        let small = cx.promote_variadic(value(qt(Builtin::I8)));
        assert!(matches!(small.ty.ty, Type::Builtin(Builtin::C(CType::Int))));
        let f = cx.promote_variadic(value(qt(Builtin::F32)));
        assert!(matches!(f.ty.ty, Type::Builtin(Builtin::C(CType::Double))));
        let wide = cx.promote_variadic(value(qt(Builtin::I64)));
        assert!(matches!(wide.ty.ty, Type::Builtin(Builtin::I64)));
        let lit = cx.promote_variadic(int(3));
        assert!(matches!(lit.ty.ty, Type::Builtin(Builtin::C(CType::Int))));
    }
}
