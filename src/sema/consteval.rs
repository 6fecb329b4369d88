//! Constant evaluation
//!
//! Best-effort folding over Sema IR. Failing to evaluate is not an error;
//! it only means the expression is not a compile-time constant.

use crate::sema::ir::{Expr, ExprKind};

/// Compile-time constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstValue {
    /// Integer magnitude
    Int(u128),
    String(String),
}

impl ConstValue {
    /// Bits needed to represent an integer constant (0 needs 0 bits)
    pub fn min_bit_length(&self) -> Option<u32> {
        match self {
            ConstValue::Int(v) => Some(u128::BITS - v.leading_zeros()),
            ConstValue::String(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<u128> {
        match self {
            ConstValue::Int(v) => Some(*v),
            ConstValue::String(_) => None,
        }
    }
}

/// Fold `expr` to a constant if it is one
pub fn evaluate(expr: &Expr) -> Option<ConstValue> {
    match &expr.kind {
        ExprKind::IntLiteral(v) => Some(ConstValue::Int(*v)),
        ExprKind::StringLiteral(s) => Some(ConstValue::String(s.clone())),
        ExprKind::Poison
        | ExprKind::FloatLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::NilLiteral
        | ExprKind::DeclRef(_)
        | ExprKind::Binary { .. }
        | ExprKind::Assign { .. }
        | ExprKind::Unary { .. }
        | ExprKind::Call { .. }
        | ExprKind::Cast { .. }
        | ExprKind::Field { .. }
        | ExprKind::SliceLen(_)
        | ExprKind::SlicePtr(_)
        | ExprKind::Index { .. }
        | ExprKind::Construct { .. }
        | ExprKind::Array(_)
        | ExprKind::UndefinedOperator(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LiteralType, QualType};
    use crate::utils::Span;

    fn lit(kind: ExprKind, ty: LiteralType) -> Expr {
        Expr::rvalue(kind, QualType::literal(ty, Span::dummy()), Span::dummy())
    }

    #[test]
    fn test_folds_int_and_string() {
        assert_eq!(evaluate(&lit(ExprKind::IntLiteral(42), LiteralType::Int)), Some(ConstValue::Int(42)));
        assert_eq!(
            evaluate(&lit(ExprKind::StringLiteral("hi".into()), LiteralType::String)),
            Some(ConstValue::String("hi".into()))
        );
    }

    #[test]
    fn test_other_kinds_are_not_constants() {
        assert_eq!(evaluate(&lit(ExprKind::FloatLiteral(1.5), LiteralType::Float)), None);
        assert_eq!(evaluate(&Expr::poison(Span::dummy())), None);
    }

    #[test]
    fn test_min_bit_length() {
        assert_eq!(ConstValue::Int(0).min_bit_length(), Some(0));
        assert_eq!(ConstValue::Int(1).min_bit_length(), Some(1));
        assert_eq!(ConstValue::Int(255).min_bit_length(), Some(8));
        assert_eq!(ConstValue::Int(256).min_bit_length(), Some(9));
        assert_eq!(ConstValue::Int(u128::MAX).min_bit_length(), Some(128));
        assert_eq!(ConstValue::String("x".into()).min_bit_length(), None);
    }
}
