//! Second pass: completing declarations

use std::num::NonZeroU32;

use log::trace;

use crate::sema::analyzer::{FunctionFrame, Sema};
use crate::sema::consteval::{evaluate, ConstValue};
use crate::sema::context::{Context, DeclId};
use crate::sema::decl::{BindingDecl, Decl, DeclKind, FieldDecl, Linkage, ParamDecl, StructDecl, VariantTag};
use crate::sema::ir::Expr;
use crate::sema::scope::ScopeId;
use crate::syntax::{self as ast, Item};
use crate::types::{QualType, Qualifiers, Type};
use crate::utils::{Error, Result, Span};

impl Context {
    /// Tag the leaves of the variant tree rooted at `root` with 1, 2, ...
    /// in depth-first declaration order
    pub fn assign_variant_tags(&mut self, root: DeclId) {
        let mut next = 1;
        self.assign_tags_from(root, &mut next);
    }

    fn assign_tags_from(&mut self, id: DeclId, next: &mut u32) {
        let variants = match &self.decl(id).kind {
            DeclKind::Struct(s) => s.variants.clone(),
            other => self.diag.ice(format!("cannot tag a {}", other.describe())),
        };
        let tag = if variants.is_empty() {
            let Some(tag) = NonZeroU32::new(*next) else {
                self.diag.ice("variant tag counter wrapped to zero");
            };
            *next += 1;
            VariantTag::Leaf(tag)
        } else {
            for variant in variants {
                self.assign_tags_from(variant, next);
            }
            VariantTag::NotALeaf
        };
        if let DeclKind::Struct(s) = &mut self.decl_mut(id).kind {
            s.tag = tag;
        }
    }

    pub(crate) fn struct_root(&self, mut id: DeclId) -> DeclId {
        while let DeclKind::Struct(StructDecl { parent: Some(parent), .. }) = &self.decl(id).kind {
            id = *parent;
        }
        id
    }
}

impl<'a> Sema<'a> {
    /// Fill in the stub `decl` from its syntax
    pub(crate) fn complete_item(&mut self, decl: DeclId, item: &'a Item) -> Result<()> {
        match item {
            Item::Alias(def) => {
                let target = self.resolve_type(&def.target)?;
                if let DeclKind::Alias(alias) = &mut self.cx.decl_mut(decl).kind {
                    alias.target = target;
                }
                Ok(())
            }
            Item::Struct(def) => self.complete_struct(decl, def),
            Item::Enum(def) => Err(Error::todo("enum declarations", def.span)),
            Item::Binding(def) => {
                let (ty, init) = self.analyze_binding(def)?;
                self.cx.decl_mut(decl).kind = DeclKind::Binding(BindingDecl { ty, init, global: true });
                Ok(())
            }
            Item::Function(def) => self.complete_signature(decl, def),
            Item::Register(def) => self.complete_register(decl, def),
            Item::Module(_) | Item::Import(_) | Item::ForeignImport(_) => {
                self.cx.diag.ice("item without a declaration reached the second pass")
            }
        }
    }

    // ==================== Structs ====================

    fn complete_struct(&mut self, decl: DeclId, def: &ast::StructDef) -> Result<()> {
        let scope = self.struct_scope(decl);
        self.with_scope(scope, |sema| sema.fill_struct(decl, def))?;
        self.cx.assign_variant_tags(decl);
        Ok(())
    }

    fn struct_scope(&self, id: DeclId) -> ScopeId {
        match &self.cx.decl(id).kind {
            DeclKind::Struct(s) => s.scope,
            other => self.cx.diag.ice(format!("expected struct, found {}", other.describe())),
        }
    }

    fn fill_struct(&mut self, id: DeclId, def: &ast::StructDef) -> Result<()> {
        let scope = self.struct_scope(id);
        for field in &def.fields {
            let ty = self.resolve_type(&field.ty)?;
            let ty = self.check_by_value(ty, field.ty.span())?;
            let index = match &self.cx.decl(id).kind {
                DeclKind::Struct(s) => s.fields.len(),
                _ => 0,
            };
            let field_decl = self.cx.add_decl(Decl {
                name: field.name.name.clone(),
                span: field.name.span,
                linkage: Linkage::Internal,
                module: self.module,
                kind: DeclKind::Field(FieldDecl { ty, index, owner: id }),
            });
            if self.cx.declare_in(scope, field_decl) {
                if let DeclKind::Struct(s) = &mut self.cx.decl_mut(id).kind {
                    s.fields.push(field_decl);
                }
            }
        }

        let linkage = self.cx.decl(id).linkage;
        for variant in &def.variants {
            let variant_scope = self.cx.scopes.new_scope(Some(scope));
            let variant_decl = self.cx.add_decl(Decl {
                name: variant.name.name.clone(),
                span: variant.name.span,
                linkage,
                module: self.module,
                kind: DeclKind::Struct(StructDecl::new(variant_scope, Some(id))),
            });
            trace!("variant '{}' of '{}'", variant.name.name, self.cx.decl(id).name);
            self.cx.declare_in(scope, variant_decl);
            if let DeclKind::Struct(s) = &mut self.cx.decl_mut(id).kind {
                s.variants.push(variant_decl);
            }
            self.with_scope(variant_scope, |sema| sema.fill_struct(variant_decl, variant))?;
        }
        Ok(())
    }

    /// Reject a field type that would make a struct contain itself, and
    /// complete any struct stored by value so its layout is known
    fn check_by_value(&mut self, ty: QualType, span: Span) -> Result<QualType> {
        let mut current = self.cx.canonical_type(&ty);
        loop {
            match current {
                Type::Array { elem, .. } | Type::Nilable(elem) => current = self.cx.canonical_type(&elem),
                Type::Struct(id) => {
                    let root = self.cx.struct_root(id);
                    if self.is_in_progress(root) || !self.ensure_complete(root)? {
                        let name = self.cx.decl(id).name.clone();
                        self.cx.diag.error(span, format!("'{}' cannot contain itself by value", name));
                        return Ok(QualType::poison(span));
                    }
                    return Ok(ty);
                }
                _ => return Ok(ty),
            }
        }
    }

    // ==================== Bindings ====================

    /// Type and initializer of a binding, inferring the type from the
    /// initializer for `var`
    pub(crate) fn analyze_binding(&mut self, def: &ast::BindingDef) -> Result<(QualType, Option<Expr>)> {
        let (ty, init) = if def.ty.is_inferred() {
            let quals = match &def.ty {
                ast::TypeExpr::Mut(..) => Qualifiers::MUT,
                _ => Qualifiers::empty(),
            };
            let Some(init) = &def.init else {
                let message = format!("cannot infer the type of '{}' without an initializer", def.name.name);
                self.cx.diag.error(def.name.span, message);
                return Ok((QualType::poison(def.span), None));
            };
            let init = self.analyze_expr(init)?;
            let init = self.cx.materialize_literal(Context::lvalue_to_rvalue(init));
            let ty = init.ty.unqualified().add_quals(quals);
            (ty, Some(init))
        } else {
            let ty = self.resolve_type(&def.ty)?;
            let init = match &def.init {
                Some(init) => Some(self.analyze_initializer(init, &ty)?),
                None => None,
            };
            (ty, init)
        };

        let canonical = self.cx.canonical_type(&ty);
        if canonical.is_void() || canonical.is_noreturn() {
            let message = format!("'{}' cannot have type '{}'", def.name.name, self.cx.type_name(&ty));
            self.cx.diag.error(def.name.span, message);
            return Ok((QualType::poison(def.span), init));
        }
        Ok((ty, init))
    }

    /// Analyze `init` and convert it to `target`
    pub(crate) fn analyze_initializer(&mut self, init: &ast::Expr, target: &QualType) -> Result<Expr> {
        let value = self.analyze_expr_with_hint(init, Some(target))?;
        Ok(self.cx.convert_or_error(value, target))
    }

    fn complete_register(&mut self, decl: DeclId, def: &ast::RegisterDef) -> Result<()> {
        let ty = self.resolve_type(&def.ty)?;
        let address = self.analyze_expr(&def.address)?;
        let address = match evaluate(&address) {
            Some(ConstValue::Int(v)) if v <= u128::from(u64::MAX) => v as u64,
            _ => {
                if !address.contains_errors() {
                    self.cx.diag.error(address.span, "register address must be a constant integer");
                }
                0
            }
        };
        if let DeclKind::Register(reg) = &mut self.cx.decl_mut(decl).kind {
            reg.ty = ty;
            reg.address = address;
        }
        Ok(())
    }

    // ==================== Functions ====================

    /// Resolve the return and parameter types of a function
    fn complete_signature(&mut self, decl: DeclId, def: &ast::FunctionDef) -> Result<()> {
        let ret = self.resolve_type(&def.ret)?;
        let mut params = Vec::with_capacity(def.params.len());
        let mut param_types = Vec::with_capacity(def.params.len());
        for (index, param) in def.params.iter().enumerate() {
            let ty = self.resolve_type(&param.ty)?;
            let ty = if self.cx.canonical_type(&ty).is_void() {
                self.cx.diag.error(param.span, format!("parameter '{}' cannot have type void", param.name.name));
                QualType::poison(param.span)
            } else {
                ty
            };
            params.push(self.cx.add_decl(Decl {
                name: param.name.name.clone(),
                span: param.name.span,
                linkage: Linkage::Internal,
                module: self.module,
                kind: DeclKind::Param(ParamDecl { ty: ty.clone(), index }),
            }));
            param_types.push(ty);
        }

        let DeclKind::Function(function) = &mut self.cx.decl_mut(decl).kind else {
            self.cx.diag.ice("function stub is not a function");
        };
        function.ty.ret = ret;
        function.ty.params = param_types;
        function.params = params;
        let foreign_with_body = function.is_foreign && function.has_body;

        if foreign_with_body {
            self.cx.diag.error(def.name.span, format!("foreign function '{}' cannot have a body", def.name.name));
        }
        self.apply_entry_linkage(decl, def);
        Ok(())
    }

    /// `main` of a program module returning the platform int is the entry
    /// point and always exported
    fn apply_entry_linkage(&mut self, decl: DeclId, def: &ast::FunctionDef) {
        if def.name.name != "main" || !self.cx.module(self.module).is_program {
            return;
        }
        if def.body.is_none() || !def.params.is_empty() {
            return;
        }
        let DeclKind::Function(function) = &self.cx.decl(decl).kind else { return };
        let returns_int = self
            .cx
            .canonical_type(&function.ty.ret)
            .builtin()
            .and_then(|b| b.integer_info(&self.cx.target))
            .is_some_and(|(signed, bits)| signed && bits == self.cx.target.int_bits());
        if !returns_int {
            return;
        }
        if def.attrs.internal || def.attrs.foreign.is_some() {
            self.cx.diag.error(def.name.span, "the entry point 'main' cannot have explicit non-exported linkage");
            return;
        }
        self.cx.decl_mut(decl).linkage = Linkage::Exported;
    }

    /// Analyze a function body in a fresh function scope
    pub(crate) fn analyze_function_body(&mut self, decl: DeclId, def: &ast::FunctionDef) -> Result<()> {
        let Some(body) = &def.body else { return Ok(()) };
        let (params, ret) = match &self.cx.decl(decl).kind {
            DeclKind::Function(f) if !f.is_foreign => (f.params.clone(), f.ty.ret.clone()),
            _ => return Ok(()),
        };
        trace!("body of '{}'", def.name.name);

        let function_scope = self.new_block_scope();
        let frame = FunctionFrame::new(decl, ret);
        let (result, frame) = self.with_function(frame, |sema| {
            for &param in &params {
                sema.cx.declare_in(function_scope, param);
            }
            sema.analyze_block_in(function_scope, &body.stmts, body.span)
        });
        let body = result?;
        if let DeclKind::Function(f) = &mut self.cx.decl_mut(decl).kind {
            f.body = Some(body);
            f.defers = frame.defers;
        }
        Ok(())
    }
}
