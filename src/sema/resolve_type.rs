//! Type expressions to types

use crate::sema::analyzer::Sema;
use crate::sema::consteval::{evaluate, ConstValue};
use crate::sema::context::DeclId;
use crate::sema::declare::{call_conv, variadic_kind};
use crate::sema::decl::DeclKind;
use crate::syntax::{Path, TypeExpr};
use crate::types::{Builtin, FunctionType, QualType, Qualifiers, Type};
use crate::utils::{Error, Result};

impl<'a> Sema<'a> {
    /// Resolve a written type. Mistakes are reported and come back as poison.
    pub(crate) fn resolve_type(&mut self, texpr: &TypeExpr) -> Result<QualType> {
        let span = texpr.span();
        let qt = match texpr {
            TypeExpr::Named(path) => self.resolve_named_type(path)?,
            TypeExpr::Pointer(inner, _) => QualType::pointer(self.resolve_type(inner)?, span),
            TypeExpr::Slice(inner, _) => QualType::slice(self.resolve_type(inner)?, span),
            TypeExpr::Nilable(inner, _) => {
                let inner = self.resolve_type(inner)?;
                QualType::new(Type::Nilable(Box::new(inner)), span)
            }
            TypeExpr::Buffer { elem, terminator, .. } => {
                if let Some(term) = terminator {
                    return Err(Error::todo("terminated buffer types", term.span()));
                }
                QualType::buffer(self.resolve_type(elem)?, span)
            }
            TypeExpr::Array { elem, dims, .. } => {
                let elem = self.resolve_type(elem)?;
                let mut sizes = Vec::with_capacity(dims.len());
                for dim in dims {
                    let value = self.analyze_expr(dim)?;
                    match evaluate(&value) {
                        Some(ConstValue::Int(n)) if n > 0 && n <= u128::from(u64::MAX) => sizes.push(n as u64),
                        _ if value.contains_errors() => return Ok(QualType::poison(span)),
                        _ => {
                            self.cx.diag.error(value.span, "array dimension must be a positive integer constant");
                            return Ok(QualType::poison(span));
                        }
                    }
                }
                if self.cx.array_size(&elem, &sizes).is_none() {
                    self.cx.diag.error(span, format!("array of '{}' is too large", self.cx.type_name(&elem)));
                    return Ok(QualType::poison(span));
                }
                QualType::new(Type::Array { elem: Box::new(elem), dims: sizes }, span)
            }
            TypeExpr::Function { ret, params, variadic, call_conv: conv, .. } => {
                let ret = self.resolve_type(ret)?;
                let mut param_types = Vec::with_capacity(params.len());
                for param in params {
                    param_types.push(self.resolve_type(param)?);
                }
                let function = FunctionType {
                    ret,
                    params: param_types,
                    call_conv: call_conv(*conv, false),
                    variadic: variadic_kind(*variadic),
                    discardable: false,
                };
                QualType::new(Type::Function(Box::new(function)), span)
            }
            TypeExpr::Mut(inner, _) => self.resolve_type(inner)?.add_quals(Qualifiers::MUT),
            TypeExpr::Infer(_) => {
                self.cx.diag.error(span, "'var' is only allowed as the type of an initialized binding");
                QualType::poison(span)
            }
        };
        Ok(qt)
    }

    fn resolve_named_type(&mut self, path: &Path) -> Result<QualType> {
        if let [single] = path.segments.as_slice() {
            if let Some(builtin) = Builtin::from_name(&single.name) {
                return Ok(QualType::builtin(builtin, path.span));
            }
        }
        let result = self.lookup_path(path)?;
        let Some(decl) = self.single_decl(result, path) else {
            return Ok(QualType::poison(path.span));
        };
        self.type_of_type_decl(decl, path)
    }

    /// The type a type declaration names
    pub(crate) fn type_of_type_decl(&mut self, decl: DeclId, path: &Path) -> Result<QualType> {
        let span = path.span;
        match &self.cx.decl(decl).kind {
            DeclKind::Struct(_) => Ok(QualType::new(Type::Struct(decl), span)),
            DeclKind::Enum(_) => Ok(QualType::new(Type::Enum(decl), span)),
            DeclKind::Alias(_) => {
                if !self.ensure_complete(decl)? {
                    let message = format!("alias '{}' refers to itself", self.cx.decl(decl).name);
                    self.cx.diag.error(span, message);
                    return Ok(QualType::poison(span));
                }
                Ok(QualType::new(Type::Alias(decl), span))
            }
            other => {
                let message = format!("'{}' is a {}, not a type", path.joined(), other.describe());
                self.cx.diag.error(span, message);
                Ok(QualType::poison(span))
            }
        }
    }
}
