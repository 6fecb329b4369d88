//! Expression analysis
//!
//! Every shape of syntax expression maps to a typed expression. Operands are
//! analyzed first; if the operator has no meaning for their types the result
//! is an [`ExprKind::UndefinedOperator`] node typed as poison, so the error
//! is reported once and absorbed by everything above it.

use log::trace;

use crate::sema::analyzer::Sema;
use crate::sema::consteval::evaluate;
use crate::sema::context::{Context, DeclId};
use crate::sema::decl::{DeclKind, VariantTag};
use crate::sema::ir::{CastKind, Dependence, Expr, ExprKind, ValueCategory};
use crate::sema::lookup::LookupResult;
use crate::syntax::{self as ast, BinOp, Ident, Literal, LiteralKind, Path, TypeExpr, UnOp};
use crate::types::{Builtin, CompareMode, FunctionType, LiteralType, QualType, Qualifiers, Type, VariadicKind};
use crate::utils::{Result, Span};

/// What an operand's type allows, as far as operators are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Integer { signed: bool },
    Float,
    Bool,
    /// Pointers, buffers, nilables, functions and `nil`
    Pointer,
    Other,
}

impl Operand {
    fn is_integer(self) -> bool {
        matches!(self, Operand::Integer { .. })
    }

    fn is_arithmetic(self) -> bool {
        matches!(self, Operand::Integer { .. } | Operand::Float)
    }
}

enum OverloadPick {
    Unique(usize),
    NoMatch,
    Ambiguous(Vec<usize>),
}

impl Context {
    fn operand_class(&self, qt: &QualType) -> Operand {
        match self.canonical_type(qt) {
            Type::Builtin(b) if b.is_bool() => Operand::Bool,
            Type::Builtin(b) => match (b.integer_info(&self.target), b.float_bits(&self.target)) {
                (Some((signed, _)), _) => Operand::Integer { signed },
                (None, Some(_)) => Operand::Float,
                (None, None) => Operand::Other,
            },
            Type::Literal(LiteralType::Int) => Operand::Integer { signed: true },
            Type::Literal(LiteralType::Float) => Operand::Float,
            Type::Literal(LiteralType::Nil)
            | Type::Pointer(_)
            | Type::Buffer { .. }
            | Type::Nilable(_)
            | Type::Function(_) => Operand::Pointer,
            _ => Operand::Other,
        }
    }

    fn is_literal_typed(&self, expr: &Expr) -> bool {
        matches!(self.canonical_type(&expr.ty), Type::Literal(_))
    }

    /// Already diagnosed: carries errors or has a poison type
    fn is_erroneous(&self, expr: &Expr) -> bool {
        expr.contains_errors() || self.is_poison(&expr.ty)
    }

    /// Load the operand and give a literal its default type
    fn concrete_operand(&mut self, expr: Expr) -> Expr {
        let expr = Self::lvalue_to_rvalue(expr);
        if self.is_literal_typed(&expr) {
            self.materialize_literal(expr)
        } else {
            expr
        }
    }
}

impl<'a> Sema<'a> {
    pub(crate) fn analyze_expr(&mut self, expr: &ast::Expr) -> Result<Expr> {
        self.analyze_expr_with_hint(expr, None)
    }

    /// Analyze `expr`; `hint` is the type the context expects, used where
    /// the expression alone does not determine its type (array literals)
    pub(crate) fn analyze_expr_with_hint(&mut self, expr: &ast::Expr, hint: Option<&QualType>) -> Result<Expr> {
        match expr {
            ast::Expr::Literal(lit) => Ok(Self::analyze_literal(lit)),
            ast::Expr::Path(path) => self.analyze_path(path),
            ast::Expr::Binary { op: BinOp::Assign, lhs, rhs, span } => self.analyze_assign(lhs, rhs, *span),
            ast::Expr::Binary { op, lhs, rhs, span } => self.analyze_binary(*op, lhs, rhs, *span),
            ast::Expr::Unary { op, operand, span } => self.analyze_unary(*op, operand, *span),
            ast::Expr::Call { callee, args, span } => self.analyze_call(callee, args, *span),
            ast::Expr::Cast { ty, expr, span } => self.analyze_cast(ty, expr, *span),
            ast::Expr::Field { base, field, span } => self.analyze_field(base, field, *span),
            ast::Expr::Index { base, index, span } => self.analyze_index(base, index, *span),
            ast::Expr::Constructor { ty, args, span } => {
                let ty = self.resolve_type(ty)?;
                self.analyze_construct(ty, args, *span)
            }
            ast::Expr::Array { elements, span } => self.analyze_array(elements, hint, *span),
        }
    }

    fn analyze_literal(lit: &Literal) -> Expr {
        let span = lit.span;
        let (kind, ty) = match &lit.kind {
            LiteralKind::Int(v) => (ExprKind::IntLiteral(*v), QualType::literal(LiteralType::Int, span)),
            LiteralKind::Float(v) => (ExprKind::FloatLiteral(*v), QualType::literal(LiteralType::Float, span)),
            LiteralKind::String(s) => (ExprKind::StringLiteral(s.clone()), QualType::literal(LiteralType::String, span)),
            LiteralKind::Bool(b) => (ExprKind::BoolLiteral(*b), QualType::builtin(Builtin::Bool, span)),
            LiteralKind::Nil => (ExprKind::NilLiteral, QualType::literal(LiteralType::Nil, span)),
        };
        Expr::rvalue(kind, ty, span)
    }

    // ==================== Names ====================

    fn analyze_path(&mut self, path: &Path) -> Result<Expr> {
        let result = self.lookup_path(path)?;
        match self.single_decl(result, path) {
            Some(decl) => self.decl_ref(decl, path.span),
            None => Ok(Expr::poison(path.span)),
        }
    }

    /// Reference to a value declaration
    fn decl_ref(&mut self, decl: DeclId, span: Span) -> Result<Expr> {
        match self.cx.decl(decl).kind {
            DeclKind::Binding(_) | DeclKind::Register(_) => {
                if !self.ensure_complete(decl)? {
                    let message = format!("'{}' is used in its own initializer", self.cx.decl(decl).name);
                    self.cx.diag.error(span, message);
                    return Ok(Expr::poison(span));
                }
            }
            // a recursive call sees the signature, which is complete
            DeclKind::Function(_) => {
                self.ensure_complete(decl)?;
            }
            _ => {}
        }

        let reference = ExprKind::DeclRef(decl);
        let mut expr = match &self.cx.decl(decl).kind {
            DeclKind::Binding(b) => Expr::lvalue(reference, b.ty.clone(), span),
            DeclKind::Param(p) => Expr::lvalue(reference, p.ty.clone(), span),
            DeclKind::Register(r) => Expr::lvalue(reference, r.ty.clone(), span),
            DeclKind::Function(f) => Expr::rvalue(reference, QualType::new(Type::Function(Box::new(f.ty.clone())), span), span),
            other => {
                let message = format!("'{}' is a {}, not a value", self.cx.decl(decl).name, other.describe());
                self.cx.diag.error(span, message);
                return Ok(Expr::poison(span));
            }
        };
        if self.cx.is_poison(&expr.ty) {
            expr.dependence |= Dependence::ERROR;
        }
        Ok(expr)
    }

    // ==================== Operators ====================

    fn analyze_assign(&mut self, lhs: &ast::Expr, rhs: &ast::Expr, span: Span) -> Result<Expr> {
        let target = self.analyze_expr(lhs)?;
        let value = self.analyze_expr_with_hint(rhs, Some(&target.ty))?;
        if self.cx.is_erroneous(&target) {
            return Ok(Expr::undefined_operator(vec![target, value], span));
        }
        if !target.is_lvalue() {
            self.cx.diag.error(target.span, "expression is not assignable");
            return Ok(Expr::undefined_operator(vec![target, value], span));
        }
        if !self.cx.canonical(&target.ty).is_mut() {
            let message = format!("cannot assign to an immutable value of type '{}'", self.cx.type_name(&target.ty));
            self.cx.diag.error(target.span, message);
            return Ok(Expr::undefined_operator(vec![target, value], span));
        }
        let value = self.cx.convert_or_error(value, &target.ty.unqualified());
        let kind = ExprKind::Assign { target: Box::new(target), value: Box::new(value) };
        let mut expr = Expr::derived(kind, QualType::void(), ValueCategory::RValue, span);
        expr.discardable = true;
        Ok(expr)
    }

    fn analyze_binary(&mut self, op: BinOp, lhs: &ast::Expr, rhs: &ast::Expr, span: Span) -> Result<Expr> {
        let lhs = self.analyze_expr(lhs)?;
        let rhs = self.analyze_expr(rhs)?;

        if matches!(op, BinOp::And | BinOp::Or) {
            let lhs = self.cx.convert_or_error(lhs, &QualType::bool());
            let rhs = self.cx.convert_or_error(rhs, &QualType::bool());
            let kind = ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
            return Ok(Expr::derived(kind, QualType::builtin(Builtin::Bool, span), ValueCategory::RValue, span));
        }
        if self.cx.is_erroneous(&lhs) || self.cx.is_erroneous(&rhs) {
            return Ok(Expr::undefined_operator(vec![lhs, rhs], span));
        }

        let (lhs, rhs) = if self.cx.is_literal_typed(&lhs) && self.cx.is_literal_typed(&rhs) {
            let lhs = self.cx.concrete_operand(lhs);
            (lhs, self.cx.concrete_operand(rhs))
        } else {
            (lhs, rhs)
        };
        let Some(common) = self.cx.common_type(&lhs, &rhs) else {
            return Ok(self.invalid_binary(op, lhs, rhs, span));
        };
        let class = self.cx.operand_class(&common);
        let result = match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => class.is_arithmetic().then(|| common.clone()),
            BinOp::Rem | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
                class.is_integer().then(|| common.clone())
            }
            BinOp::Eq | BinOp::Ne => (class != Operand::Other).then(QualType::bool),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                (class.is_arithmetic() || class == Operand::Pointer).then(QualType::bool)
            }
            BinOp::And | BinOp::Or | BinOp::Assign => self.cx.diag.ice(format!("'{}' reached arithmetic analysis", op.symbol())),
        };
        let Some(mut ty) = result else {
            return Ok(self.invalid_binary(op, lhs, rhs, span));
        };
        ty.span = span;
        let (lhs, _) = self.cx.convert(lhs, &common);
        let (rhs, _) = self.cx.convert(rhs, &common);
        let kind = ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        Ok(Expr::derived(kind, ty, ValueCategory::RValue, span))
    }

    fn invalid_binary(&mut self, op: BinOp, lhs: Expr, rhs: Expr, span: Span) -> Expr {
        let message = format!(
            "invalid operands to binary '{}' ('{}' and '{}')",
            op.symbol(),
            self.cx.type_name(&lhs.ty),
            self.cx.type_name(&rhs.ty)
        );
        self.cx.diag.error(span, message);
        Expr::undefined_operator(vec![lhs, rhs], span)
    }

    fn analyze_unary(&mut self, op: UnOp, operand: &ast::Expr, span: Span) -> Result<Expr> {
        let operand = self.analyze_expr(operand)?;
        if self.cx.is_erroneous(&operand) {
            return Ok(Expr::undefined_operator(vec![operand], span));
        }
        match op {
            UnOp::AddrOf => {
                if !operand.is_lvalue() {
                    self.cx.diag.error(operand.span, "cannot take the address of an rvalue");
                    return Ok(Expr::undefined_operator(vec![operand], span));
                }
                let ty = QualType::pointer(operand.ty.clone(), span);
                let kind = ExprKind::Unary { op, operand: Box::new(operand) };
                Ok(Expr::derived(kind, ty, ValueCategory::RValue, span))
            }
            UnOp::Deref => {
                let operand = Context::lvalue_to_rvalue(operand);
                match self.cx.canonical_type(&operand.ty) {
                    Type::Pointer(elem) => {
                        let kind = ExprKind::Unary { op, operand: Box::new(operand) };
                        Ok(Expr::derived(kind, *elem, ValueCategory::LValue, span))
                    }
                    _ => {
                        let message = format!("cannot dereference a value of type '{}'", self.cx.type_name(&operand.ty));
                        self.cx.diag.error(span, message);
                        Ok(Expr::undefined_operator(vec![operand], span))
                    }
                }
            }
            UnOp::Not => {
                let operand = self.cx.convert_or_error(operand, &QualType::bool());
                let kind = ExprKind::Unary { op, operand: Box::new(operand) };
                Ok(Expr::derived(kind, QualType::builtin(Builtin::Bool, span), ValueCategory::RValue, span))
            }
            UnOp::Neg | UnOp::BitNot => {
                let operand = self.cx.concrete_operand(operand);
                let class = self.cx.operand_class(&operand.ty);
                let valid = match op {
                    UnOp::Neg => matches!(class, Operand::Integer { signed: true } | Operand::Float),
                    _ => class.is_integer(),
                };
                if !valid {
                    let message =
                        format!("invalid operand to unary '{}' ('{}')", op.symbol(), self.cx.type_name(&operand.ty));
                    self.cx.diag.error(span, message);
                    return Ok(Expr::undefined_operator(vec![operand], span));
                }
                let ty = operand.ty.unqualified();
                let kind = ExprKind::Unary { op, operand: Box::new(operand) };
                Ok(Expr::derived(kind, ty, ValueCategory::RValue, span))
            }
        }
    }

    // ==================== Calls ====================

    fn analyze_call(&mut self, callee: &ast::Expr, args: &[ast::Expr], span: Span) -> Result<Expr> {
        let ast::Expr::Path(path) = callee else {
            let callee = self.analyze_expr(callee)?;
            return self.call_value(callee, args, span);
        };
        let candidates = match self.lookup_path(path)? {
            LookupResult::Overloads(decls) => decls,
            LookupResult::Success(decl) if self.cx.is_overloadable(decl) => vec![decl],
            LookupResult::Success(decl) if self.cx.decl(decl).kind.is_type() => {
                let ty = self.type_of_type_decl(decl, path)?;
                return self.analyze_construct(ty, args, span);
            }
            LookupResult::Success(decl) => {
                let callee = self.decl_ref(decl, path.span)?;
                return self.call_value(callee, args, span);
            }
            other => {
                self.single_decl(other, path);
                let args = self.analyze_args(args, None)?;
                return Ok(Expr::undefined_operator(args, span));
            }
        };
        self.call_overloaded(&candidates, path, args, span)
    }

    fn function_type(&self, decl: DeclId) -> FunctionType {
        match &self.cx.decl(decl).kind {
            DeclKind::Function(f) => f.ty.clone(),
            other => self.cx.diag.ice(format!("overload candidate is a {}", other.describe())),
        }
    }

    fn analyze_args(&mut self, args: &[ast::Expr], signature: Option<&FunctionType>) -> Result<Vec<Expr>> {
        let mut out = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let hint = signature.and_then(|s| s.params.get(i));
            out.push(self.analyze_expr_with_hint(arg, hint)?);
        }
        Ok(out)
    }

    /// Call through a function-typed value
    fn call_value(&mut self, callee: Expr, args: &[ast::Expr], span: Span) -> Result<Expr> {
        let callee = Context::lvalue_to_rvalue(callee);
        let signature = match self.cx.canonical_type(&callee.ty) {
            Type::Function(signature) => Some(signature),
            _ => None,
        };
        let args = self.analyze_args(args, signature.as_deref())?;
        if self.cx.is_erroneous(&callee) {
            let mut operands = vec![callee];
            operands.extend(args);
            return Ok(Expr::undefined_operator(operands, span));
        }
        let Some(signature) = signature else {
            let message = format!("a value of type '{}' is not callable", self.cx.type_name(&callee.ty));
            self.cx.diag.error(callee.span, message);
            let mut operands = vec![callee];
            operands.extend(args);
            return Ok(Expr::undefined_operator(operands, span));
        };
        self.finish_call(callee, &signature, args, "function", span)
    }

    fn call_overloaded(&mut self, candidates: &[DeclId], path: &Path, args: &[ast::Expr], span: Span) -> Result<Expr> {
        for &candidate in candidates {
            self.ensure_complete(candidate)?;
        }
        let signatures: Vec<FunctionType> = candidates.iter().map(|&c| self.function_type(c)).collect();
        let hint = match signatures.as_slice() {
            [single] => Some(single),
            _ => None,
        };
        let args = self.analyze_args(args, hint)?;
        let name = path.joined();

        let chosen = if candidates.len() == 1 {
            0
        } else if args.iter().any(|a| self.cx.is_erroneous(a)) {
            return Ok(Expr::undefined_operator(args, span));
        } else {
            match self.pick_overload(&signatures, &args) {
                OverloadPick::Unique(i) => i,
                OverloadPick::NoMatch => {
                    self.cx.diag.error(span, format!("no matching overload for call to '{}'", name));
                    self.note_candidates(candidates.iter().copied());
                    return Ok(Expr::undefined_operator(args, span));
                }
                OverloadPick::Ambiguous(best) => {
                    self.cx.diag.error(span, format!("call to '{}' is ambiguous", name));
                    self.note_candidates(best.into_iter().map(|i| candidates[i]));
                    return Ok(Expr::undefined_operator(args, span));
                }
            }
        };
        trace!("call to '{}' resolved to {:?}", name, candidates[chosen]);

        let signature = &signatures[chosen];
        let ty = QualType::new(Type::Function(Box::new(signature.clone())), path.span);
        let callee = Expr::rvalue(ExprKind::DeclRef(candidates[chosen]), ty, path.span);
        self.finish_call(callee, signature, args, &name, span)
    }

    fn note_candidates(&mut self, candidates: impl Iterator<Item = DeclId>) {
        for candidate in candidates {
            let at = self.cx.decl_span(candidate);
            self.cx.diag.note(at, "candidate declared here");
        }
    }

    /// Cheapest viable candidate by total conversion score, then by the
    /// number of arguments whose type differs from the parameter's
    fn pick_overload(&self, signatures: &[FunctionType], args: &[Expr]) -> OverloadPick {
        let mut best: Vec<usize> = Vec::new();
        let mut best_cost = (i32::MAX, usize::MAX);
        for (i, signature) in signatures.iter().enumerate() {
            let Some(cost) = self.overload_cost(signature, args) else { continue };
            if cost < best_cost {
                best_cost = cost;
                best = vec![i];
            } else if cost == best_cost {
                best.push(i);
            }
        }
        match best.as_slice() {
            [] => OverloadPick::NoMatch,
            [single] => OverloadPick::Unique(*single),
            _ => OverloadPick::Ambiguous(best),
        }
    }

    fn overload_cost(&self, signature: &FunctionType, args: &[Expr]) -> Option<(i32, usize)> {
        let fixed = signature.params.len();
        if args.len() < fixed || (args.len() > fixed && signature.variadic == VariadicKind::None) {
            return None;
        }
        let mut total = 0;
        let mut inexact = 0;
        for (arg, param) in args.iter().zip(&signature.params) {
            let score = self.cx.try_convert(arg, param);
            if !score.is_ok() {
                return None;
            }
            total += score.value();
            if !self.cx.qual_type_equals(&arg.ty, param, CompareMode::IgnoreQualifiers) {
                inexact += 1;
            }
        }
        Some((total, inexact))
    }

    /// Check arity, convert arguments and build the call
    fn finish_call(
        &mut self,
        callee: Expr,
        signature: &FunctionType,
        args: Vec<Expr>,
        name: &str,
        span: Span,
    ) -> Result<Expr> {
        let fixed = signature.params.len();
        let variadic = signature.variadic == VariadicKind::C;
        if args.len() < fixed || (args.len() > fixed && !variadic) {
            let expected = if variadic { format!("at least {}", fixed) } else { fixed.to_string() };
            let message = format!("'{}' expects {} argument(s), got {}", name, expected, args.len());
            self.cx.diag.error(span, message);
            let mut operands = vec![callee];
            operands.extend(args);
            return Ok(Expr::undefined_operator(operands, span));
        }

        let mut converted = Vec::with_capacity(args.len());
        for (i, arg) in args.into_iter().enumerate() {
            converted.push(match signature.params.get(i) {
                Some(param) => self.cx.convert_or_error(arg, &param.unqualified()),
                None => self.cx.promote_variadic(arg),
            });
        }
        let ret = self.cx.canonical_type(&signature.ret);
        let kind = ExprKind::Call { callee: Box::new(callee), args: converted };
        let mut call = Expr::derived(kind, signature.ret.unqualified(), ValueCategory::RValue, span);
        call.discardable = signature.discardable || ret.is_void() || ret.is_noreturn();
        Ok(call)
    }

    // ==================== Casts and construction ====================

    fn analyze_cast(&mut self, ty: &TypeExpr, expr: &ast::Expr, span: Span) -> Result<Expr> {
        let target = self.resolve_type(ty)?.unqualified();
        let operand = self.analyze_expr(expr)?;
        if self.cx.is_erroneous(&operand) || self.cx.is_poison(&target) {
            return Ok(Expr::undefined_operator(vec![operand], span));
        }
        if self.cx.try_convert(&operand, &target).is_ok() {
            return Ok(self.cx.convert(operand, &target).0);
        }

        let operand = self.cx.concrete_operand(operand);
        let from = self.cx.operand_class(&operand.ty);
        let to = self.cx.operand_class(&target);
        let kind = match (from, to) {
            (Operand::Integer { .. } | Operand::Float | Operand::Bool, Operand::Integer { .. } | Operand::Float) => {
                Some(CastKind::Numeric)
            }
            (Operand::Integer { .. }, Operand::Bool) => Some(CastKind::Numeric),
            (Operand::Pointer, Operand::Pointer) => Some(CastKind::PointerReinterpret),
            (Operand::Integer { .. }, Operand::Pointer) => Some(CastKind::IntegerToPointer),
            (Operand::Pointer, Operand::Integer { .. }) => Some(CastKind::PointerToInteger),
            _ => None,
        };
        let Some(kind) = kind else {
            let message = format!(
                "invalid cast from '{}' to '{}'",
                self.cx.type_name(&operand.ty),
                self.cx.type_name(&target)
            );
            self.cx.diag.error(span, message);
            return Ok(Expr::undefined_operator(vec![operand], span));
        };
        let kind = ExprKind::Cast { kind, operand: Box::new(operand) };
        Ok(Expr::derived(kind, target, ValueCategory::RValue, span))
    }

    /// `T(args...)`
    pub(crate) fn analyze_construct(&mut self, ty: QualType, args: &[ast::Expr], span: Span) -> Result<Expr> {
        let ty = ty.unqualified();
        let canonical = self.cx.canonical_type(&ty);
        match canonical {
            Type::Poison => {
                let args = self.analyze_args(args, None)?;
                Ok(Expr::undefined_operator(args, span))
            }
            Type::Struct(id) => self.construct_struct(id, ty, args, span),
            Type::Builtin(Builtin::Void | Builtin::NoReturn) | Type::Function(_) | Type::Literal(_) => {
                let message = format!("cannot construct a value of type '{}'", self.cx.type_name(&ty));
                self.cx.diag.error(span, message);
                let args = self.analyze_args(args, None)?;
                Ok(Expr::undefined_operator(args, span))
            }
            _ => {
                let [arg] = args else {
                    let message = format!("'{}' takes exactly one argument, got {}", self.cx.type_name(&ty), args.len());
                    self.cx.diag.error(span, message);
                    let args = self.analyze_args(args, None)?;
                    return Ok(Expr::undefined_operator(args, span));
                };
                let value = self.analyze_expr_with_hint(arg, Some(&ty))?;
                let value = self.cx.convert_or_error(value, &ty);
                let kind = ExprKind::Construct { args: vec![value], tag: None };
                Ok(Expr::derived(kind, ty, ValueCategory::RValue, span))
            }
        }
    }

    fn construct_struct(&mut self, id: DeclId, ty: QualType, args: &[ast::Expr], span: Span) -> Result<Expr> {
        let root = self.cx.struct_root(id);
        if !self.is_in_progress(root) {
            self.ensure_complete(root)?;
        }
        let (is_leaf, tag, is_variant) = match &self.cx.decl(id).kind {
            DeclKind::Struct(s) => (s.is_leaf(), s.tag, s.parent.is_some()),
            other => self.cx.diag.ice(format!("struct type names a {}", other.describe())),
        };
        let name = self.cx.decl(id).name.clone();
        if !is_leaf {
            self.cx.diag.error(span, format!("cannot construct '{}' directly, it has variants", name));
            let args = self.analyze_args(args, None)?;
            return Ok(Expr::undefined_operator(args, span));
        }

        let fields = self.cx.all_fields(id);
        if fields.len() != args.len() {
            let message = format!("'{}' has {} field(s) but {} argument(s) were given", name, fields.len(), args.len());
            self.cx.diag.error(span, message);
            let args = self.analyze_args(args, None)?;
            return Ok(Expr::undefined_operator(args, span));
        }
        let mut values = Vec::with_capacity(args.len());
        for (&field, arg) in fields.iter().zip(args) {
            let field_ty = match &self.cx.decl(field).kind {
                DeclKind::Field(f) => f.ty.unqualified(),
                other => self.cx.diag.ice(format!("struct member is a {}", other.describe())),
            };
            let value = self.analyze_expr_with_hint(arg, Some(&field_ty))?;
            values.push(self.cx.convert_or_error(value, &field_ty));
        }
        let tag = match tag {
            VariantTag::Leaf(tag) if is_variant => Some(tag),
            _ => None,
        };
        let kind = ExprKind::Construct { args: values, tag };
        Ok(Expr::derived(kind, ty, ValueCategory::RValue, span))
    }

    fn analyze_array(&mut self, elements: &[ast::Expr], hint: Option<&QualType>, span: Span) -> Result<Expr> {
        let mut elem_ty = hint.and_then(|h| match self.cx.canonical_type(h) {
            Type::Array { elem, dims } if dims.len() > 1 => {
                Some(QualType::new(Type::Array { elem, dims: dims[1..].to_vec() }, span))
            }
            Type::Array { elem, .. } => Some(elem.unqualified()),
            _ => None,
        });

        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            let value = self.analyze_expr_with_hint(element, elem_ty.as_ref())?;
            let value = match elem_ty.clone() {
                Some(ty) => self.cx.convert_or_error(value, &ty),
                None => {
                    let value = self.cx.concrete_operand(value);
                    elem_ty = Some(value.ty.unqualified());
                    value
                }
            };
            values.push(value);
        }
        let Some(elem_ty) = elem_ty else {
            self.cx.diag.error(span, "cannot infer the element type of an empty array literal");
            return Ok(Expr::poison(span));
        };

        let count = values.len() as u64;
        let ty = match self.cx.canonical_type(&elem_ty) {
            Type::Array { elem, dims } => Type::Array { elem, dims: std::iter::once(count).chain(dims).collect() },
            _ => Type::Array { elem: Box::new(elem_ty), dims: vec![count] },
        };
        Ok(Expr::derived(ExprKind::Array(values), QualType::new(ty, span), ValueCategory::RValue, span))
    }

    // ==================== Member access ====================

    /// `p.x` on a pointer reads through it
    fn auto_deref(&mut self, base: Expr, span: Span) -> Expr {
        match self.cx.canonical_type(&base.ty) {
            Type::Pointer(elem) => {
                let base = Context::lvalue_to_rvalue(base);
                let kind = ExprKind::Unary { op: UnOp::Deref, operand: Box::new(base) };
                Expr::derived(kind, *elem, ValueCategory::LValue, span)
            }
            _ => base,
        }
    }

    fn analyze_field(&mut self, base: &ast::Expr, field: &Ident, span: Span) -> Result<Expr> {
        let base = self.analyze_expr(base)?;
        if self.cx.is_erroneous(&base) {
            return Ok(Expr::undefined_operator(vec![base], span));
        }
        let base = self.auto_deref(base, span);
        let canonical = self.cx.canonical(&base.ty);
        match canonical.ty {
            Type::Struct(id) => {
                let root = self.cx.struct_root(id);
                if !self.is_in_progress(root) {
                    self.ensure_complete(root)?;
                }
                let Some(info) = self.cx.lookup_field_inherited(id, &field.name) else {
                    let message = format!("no field named '{}' in '{}'", field.name, self.cx.decl(id).name);
                    self.cx.diag.error(field.span, message);
                    return Ok(Expr::undefined_operator(vec![base], span));
                };
                let field_ty = match &self.cx.decl(info.decl).kind {
                    DeclKind::Field(f) => f.ty.clone(),
                    other => self.cx.diag.ice(format!("field lookup found a {}", other.describe())),
                };
                let ty = field_ty.add_quals(canonical.quals & Qualifiers::MUT);
                let category = base.category;
                let kind = ExprKind::Field { base: Box::new(base), field: info.decl, offset: info.offset };
                Ok(Expr::derived(kind, ty, category, span))
            }
            Type::Slice(_) if field.name == "len" => {
                let kind = ExprKind::SliceLen(Box::new(Context::lvalue_to_rvalue(base)));
                Ok(Expr::derived(kind, QualType::builtin(Builtin::Usize, span), ValueCategory::RValue, span))
            }
            Type::Slice(elem) if field.name == "ptr" => {
                let kind = ExprKind::SlicePtr(Box::new(Context::lvalue_to_rvalue(base)));
                Ok(Expr::derived(kind, QualType::buffer(*elem, span), ValueCategory::RValue, span))
            }
            _ => {
                let message = format!("a value of type '{}' has no field '{}'", self.cx.type_name(&base.ty), field.name);
                self.cx.diag.error(field.span, message);
                Ok(Expr::undefined_operator(vec![base], span))
            }
        }
    }

    fn analyze_index(&mut self, base: &ast::Expr, index: &ast::Expr, span: Span) -> Result<Expr> {
        let base = self.analyze_expr(base)?;
        let index = self.analyze_expr(index)?;
        if self.cx.is_erroneous(&base) || self.cx.is_erroneous(&index) {
            return Ok(Expr::undefined_operator(vec![base, index], span));
        }
        let constant = evaluate(&index).and_then(|v| v.as_int());
        let index = self.cx.convert_or_error(index, &QualType::builtin(Builtin::Usize, span));

        let canonical = self.cx.canonical(&base.ty);
        let quals = canonical.quals & Qualifiers::MUT;
        match canonical.ty {
            Type::Array { elem, dims } => {
                let length = dims.first().copied().unwrap_or(0);
                if let Some(n) = constant.filter(|&n| n >= u128::from(length)) {
                    let message = format!("index {} is out of bounds for an array of length {}", n, length);
                    self.cx.diag.error(index.span, message);
                    return Ok(Expr::undefined_operator(vec![base, index], span));
                }
                let elem_ty = if dims.len() > 1 {
                    QualType::new(Type::Array { elem, dims: dims[1..].to_vec() }, span)
                } else {
                    *elem
                };
                let category = base.category;
                let kind = ExprKind::Index { base: Box::new(base), index: Box::new(index) };
                Ok(Expr::derived(kind, elem_ty.add_quals(quals), category, span))
            }
            Type::Slice(elem) | Type::Buffer { elem, .. } => {
                let base = Context::lvalue_to_rvalue(base);
                let kind = ExprKind::Index { base: Box::new(base), index: Box::new(index) };
                Ok(Expr::derived(kind, *elem, ValueCategory::LValue, span))
            }
            _ => {
                let message = format!("cannot index a value of type '{}'", self.cx.type_name(&base.ty));
                self.cx.diag.error(span, message);
                Ok(Expr::undefined_operator(vec![base, index], span))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sema::ir::Stmt;
    use crate::sema::{analyze_module, LookupResult, ModuleId};
    use crate::syntax::{
        BindingDef, Expr as SynExpr, FunctionDef, Item, Stmt as SynStmt, StructDef, TypeExpr as Ty, UnitBuilder,
        Variadic,
    };
    use pretty_assertions::assert_eq;

    fn check(items: Vec<Item>) -> (Context, ModuleId) {
        let mut builder = UnitBuilder::new(0, "main.ae");
        for item in items {
            builder = builder.item(item);
        }
        let mut cx = Context::default();
        let m = analyze_module(&mut cx, &[builder.build()], &[]).unwrap();
        (cx, m)
    }

    fn errors(cx: &Context) -> Vec<String> {
        cx.diag.errors().map(|d| d.message.clone()).collect()
    }

    fn run(body: Vec<SynStmt>) -> Item {
        FunctionDef::new(Ty::named("void"), "run", vec![], Some(body)).into()
    }

    fn func(ret: &str, name: &str, params: Vec<(Ty, &str)>) -> Item {
        FunctionDef::new(Ty::named(ret), name, params, Some(vec![])).into()
    }

    fn local(ty: Ty, name: &str, init: SynExpr) -> SynStmt {
        SynStmt::local(ty, name, Some(init))
    }

    /// Initializer of the `index`-th statement of `run`
    fn local_init(cx: &Context, m: ModuleId, index: usize) -> Expr {
        let LookupResult::Success(run) = cx.lookup_unqualified(cx.module(m).module_scope, "run", true) else {
            panic!("no run");
        };
        let DeclKind::Function(f) = &cx.decl(run).kind else { panic!() };
        let Some(Stmt::Compound { stmts, .. }) = &f.body else { panic!() };
        let Stmt::Decl(decl) = &stmts[index] else { panic!("statement {} is not a binding", index) };
        let DeclKind::Binding(b) = &cx.decl(*decl).kind else { panic!() };
        b.init.clone().unwrap()
    }

    #[test]
    fn test_overload_prefers_exact_parameter() {
        let (cx, m) = check(vec![
            func("i32", "pick", vec![(Ty::named("i32"), "x")]),
            func("i64", "pick", vec![(Ty::named("i64"), "x")]),
            run(vec![
                local(Ty::named("i64"), "wide", SynExpr::int(1)),
                local(Ty::named("i64"), "r", SynExpr::call(SynExpr::path("pick"), vec![SynExpr::path("wide")])),
            ]),
        ]);
        assert_eq!(errors(&cx), Vec::<String>::new());
        let init = local_init(&cx, m, 1);
        let ExprKind::Call { callee, .. } = &init.kind else { panic!() };
        let ExprKind::DeclRef(chosen) = callee.kind else { panic!() };
        let DeclKind::Function(f) = &cx.decl(chosen).kind else { panic!() };
        assert!(matches!(f.ty.ret.ty, Type::Builtin(Builtin::I64)));
    }

    #[test]
    fn test_ambiguous_overload() {
        let (cx, _) = check(vec![
            func("void", "f", vec![(Ty::named("i32"), "x")]),
            func("void", "f", vec![(Ty::named("u32"), "x")]),
            run(vec![SynStmt::expr(SynExpr::call(SynExpr::path("f"), vec![SynExpr::int(1)]))]),
        ]);
        assert_eq!(errors(&cx), vec!["call to 'f' is ambiguous".to_string()]);
        assert_eq!(cx.diag.len(), 3);
    }

    #[test]
    fn test_wrong_argument_count() {
        let (cx, _) = check(vec![
            func("void", "f", vec![(Ty::named("i32"), "x")]),
            run(vec![SynStmt::expr(SynExpr::call(SynExpr::path("f"), vec![]))]),
        ]);
        assert_eq!(errors(&cx), vec!["'f' expects 1 argument(s), got 0".to_string()]);
    }

    #[test]
    fn test_variadic_promotion() {
        let mut printf = FunctionDef::new(Ty::named("c_int"), "printf", vec![(Ty::buffer(Ty::named("u8")), "fmt")], None);
        printf.variadic = Variadic::C;
        printf.attrs.foreign = Some(Default::default());
        printf.attrs.discardable = true;
        let (cx, m) = check(vec![
            printf.into(),
            run(vec![
                local(Ty::named("u8"), "small", SynExpr::int(7)),
                local(
                    Ty::named("c_int"),
                    "n",
                    SynExpr::call(SynExpr::path("printf"), vec![SynExpr::string("%d"), SynExpr::path("small")]),
                ),
            ]),
        ]);
        assert_eq!(errors(&cx), Vec::<String>::new());
        let init = local_init(&cx, m, 1);
        let ExprKind::Call { args, .. } = &init.kind else { panic!() };
        assert!(matches!(args[1].kind, ExprKind::Cast { kind: CastKind::IntegerExtend { signed: false }, .. }));
        assert!(matches!(args[1].ty.ty, Type::Builtin(Builtin::C(_))));
    }

    #[test]
    fn test_assignment_needs_mutable_lvalue() {
        let (cx, _) = check(vec![run(vec![
            local(Ty::named("i32"), "fixed", SynExpr::int(1)),
            local(Ty::mutable(Ty::named("i32")), "counter", SynExpr::int(1)),
            SynStmt::expr(SynExpr::binary(BinOp::Assign, SynExpr::path("counter"), SynExpr::int(2))),
            SynStmt::expr(SynExpr::binary(BinOp::Assign, SynExpr::path("fixed"), SynExpr::int(2))),
            SynStmt::expr(SynExpr::binary(BinOp::Assign, SynExpr::int(3), SynExpr::int(2))),
        ])]);
        assert_eq!(
            errors(&cx),
            vec![
                "cannot assign to an immutable value of type 'i32'".to_string(),
                "expression is not assignable".to_string(),
            ]
        );
    }

    #[test]
    fn test_invalid_operands_reported_once() {
        // (true + 1) * 2
        let bad = SynExpr::binary(BinOp::Add, SynExpr::bool(true), SynExpr::int(1));
        let (cx, m) = check(vec![run(vec![local(
            Ty::named("i32"),
            "x",
            SynExpr::binary(BinOp::Mul, bad, SynExpr::int(2)),
        )])]);
        assert_eq!(errors(&cx), vec!["invalid operands to binary '+' ('bool' and 'integer literal')".to_string()]);
        assert!(local_init(&cx, m, 0).contains_errors());
    }

    #[test]
    fn test_comparison_yields_bool() {
        let (cx, m) = check(vec![run(vec![
            local(Ty::named("u16"), "a", SynExpr::int(3)),
            local(Ty::named("bool"), "b", SynExpr::binary(BinOp::Lt, SynExpr::path("a"), SynExpr::int(300))),
        ])]);
        assert!(!cx.diag.has_errors());
        let init = local_init(&cx, m, 1);
        let ExprKind::Binary { lhs, rhs, .. } = &init.kind else { panic!() };
        assert!(matches!(lhs.ty.ty, Type::Builtin(Builtin::U16)));
        assert!(matches!(rhs.kind, ExprKind::Cast { kind: CastKind::IntegerConstant, .. }));
    }

    fn shapes() -> Item {
        StructDef::new(
            "Shape",
            vec![(Ty::named("i32"), "id")],
            vec![
                StructDef::new("Circle", vec![(Ty::named("i32"), "r")], vec![]),
                StructDef::new("Square", vec![(Ty::named("i32"), "s")], vec![]),
            ],
        )
        .into()
    }

    #[test]
    fn test_variant_construction_and_inherited_field() {
        let circle = SynExpr::call(SynExpr::path("Shape.Circle"), vec![SynExpr::int(1), SynExpr::int(5)]);
        let (cx, m) = check(vec![
            shapes(),
            run(vec![
                local(Ty::named("Shape.Circle"), "c", circle),
                local(Ty::named("i32"), "id", SynExpr::field(SynExpr::path("c"), "id")),
                local(Ty::named("i32"), "r", SynExpr::field(SynExpr::path("c"), "r")),
            ]),
        ]);
        assert_eq!(errors(&cx), Vec::<String>::new());
        let ExprKind::Construct { tag, args } = &local_init(&cx, m, 0).kind else { panic!() };
        assert_eq!(tag.map(|t| t.get()), Some(1));
        assert_eq!(args.len(), 2);

        let id = local_init(&cx, m, 1);
        let r = local_init(&cx, m, 2);
        let offset_of = |e: &Expr| match &e.strip_casts().kind {
            ExprKind::Field { offset, .. } => *offset,
            other => panic!("not a field access: {:?}", other),
        };
        assert_eq!(offset_of(&id), 0);
        // root field, u32 tag, then the payload
        assert_eq!(offset_of(&r), 8);
    }

    #[test]
    fn test_non_leaf_cannot_be_constructed() {
        let (cx, _) = check(vec![
            shapes(),
            run(vec![SynStmt::expr(SynExpr::call(SynExpr::path("Shape"), vec![SynExpr::int(1)]))]),
        ]);
        assert_eq!(errors(&cx), vec!["cannot construct 'Shape' directly, it has variants".to_string()]);
    }

    #[test]
    fn test_field_through_pointer_and_unknown_field() {
        let point = StructDef::new("Point", vec![(Ty::named("i32"), "x")], vec![]);
        let (cx, _) = check(vec![
            point.into(),
            FunctionDef::new(
                Ty::named("i32"),
                "get",
                vec![(Ty::ptr(Ty::named("Point")), "p")],
                Some(vec![
                    local(Ty::named("i32"), "y", SynExpr::field(SynExpr::path("p"), "y")),
                    SynStmt::ret(Some(SynExpr::field(SynExpr::path("p"), "x"))),
                ]),
            )
            .into(),
        ]);
        assert_eq!(errors(&cx), vec!["no field named 'y' in 'Point'".to_string()]);
    }

    #[test]
    fn test_slice_members() {
        let (cx, m) = check(vec![run(vec![
            local(Ty::slice(Ty::named("u8")), "s", SynExpr::string("abc")),
            local(Ty::named("usize"), "n", SynExpr::field(SynExpr::path("s"), "len")),
            local(Ty::buffer(Ty::named("u8")), "p", SynExpr::field(SynExpr::path("s"), "ptr")),
        ])]);
        assert_eq!(errors(&cx), Vec::<String>::new());
        assert!(matches!(local_init(&cx, m, 1).kind, ExprKind::SliceLen(_)));
    }

    #[test]
    fn test_constant_index_bounds() {
        let grid = Ty::array(Ty::named("i32"), vec![SynExpr::int(2), SynExpr::int(3)]);
        let (cx, m) = check(vec![
            BindingDef::new(grid, "grid", None).into(),
            run(vec![
                local(Ty::named("i32"), "ok", SynExpr::index(SynExpr::index(SynExpr::path("grid"), SynExpr::int(1)), SynExpr::int(2))),
                local(Ty::named("i32"), "bad", SynExpr::index(SynExpr::index(SynExpr::path("grid"), SynExpr::int(2)), SynExpr::int(0))),
            ]),
        ]);
        assert_eq!(errors(&cx), vec!["index 2 is out of bounds for an array of length 2".to_string()]);
        let ok = local_init(&cx, m, 0);
        assert!(ok.strip_casts().is_lvalue());
    }

    #[test]
    fn test_array_literal_types() {
        let grid_ty = Ty::array(Ty::named("i32"), vec![SynExpr::int(2), SynExpr::int(2)]);
        let nested = SynExpr::array(vec![
            SynExpr::array(vec![SynExpr::int(1), SynExpr::int(2)]),
            SynExpr::array(vec![SynExpr::int(3), SynExpr::int(4)]),
        ]);
        let (cx, m) = check(vec![run(vec![
            local(Ty::infer(), "row", SynExpr::array(vec![SynExpr::int(1), SynExpr::int(2), SynExpr::int(3)])),
            local(grid_ty, "grid", nested),
        ])]);
        assert_eq!(errors(&cx), Vec::<String>::new());
        let Type::Array { elem, dims } = cx.canonical_type(&local_init(&cx, m, 0).ty) else { panic!() };
        assert_eq!(dims, vec![3]);
        assert!(matches!(elem.ty, Type::Builtin(Builtin::I32)));
    }

    #[test]
    fn test_explicit_casts() {
        let (cx, _) = check(vec![
            StructDef::new("Point", vec![(Ty::named("i32"), "x")], vec![]).into(),
            run(vec![
                local(Ty::named("usize"), "addr", SynExpr::int(4096)),
                local(Ty::ptr(Ty::named("u8")), "p", SynExpr::cast(Ty::ptr(Ty::named("u8")), SynExpr::path("addr"))),
                local(Ty::named("u8"), "low", SynExpr::cast(Ty::named("u8"), SynExpr::path("addr"))),
                local(Ty::named("Point"), "pt", SynExpr::construct(Ty::named("Point"), vec![SynExpr::int(1)])),
                local(Ty::named("i32"), "bad", SynExpr::cast(Ty::named("i32"), SynExpr::path("pt"))),
            ]),
        ]);
        assert_eq!(errors(&cx), vec!["invalid cast from 'Point' to 'i32'".to_string()]);
    }

    #[test]
    fn test_names_that_are_not_values() {
        let (cx, _) = check(vec![
            StructDef::new("Point", vec![], vec![]).into(),
            run(vec![
                local(Ty::named("i32"), "a", SynExpr::path("Point")),
                local(Ty::named("i32"), "b", SynExpr::call(SynExpr::path("a"), vec![])),
            ]),
        ]);
        assert_eq!(
            errors(&cx),
            vec![
                "'Point' is a struct, not a value".to_string(),
                "a value of type 'i32' is not callable".to_string(),
            ]
        );
    }

    #[test]
    fn test_address_and_deref() {
        let (cx, m) = check(vec![run(vec![
            local(Ty::mutable(Ty::named("i32")), "x", SynExpr::int(1)),
            local(Ty::ptr(Ty::mutable(Ty::named("i32"))), "p", SynExpr::unary(UnOp::AddrOf, SynExpr::path("x"))),
            SynStmt::expr(SynExpr::binary(BinOp::Assign, SynExpr::unary(UnOp::Deref, SynExpr::path("p")), SynExpr::int(5))),
            local(Ty::named("i32"), "neg", SynExpr::unary(UnOp::Neg, SynExpr::int(5))),
        ])]);
        assert_eq!(errors(&cx), Vec::<String>::new());
        assert!(matches!(local_init(&cx, m, 3).ty.ty, Type::Builtin(Builtin::I32)));
    }
}
