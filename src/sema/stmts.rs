//! Statement analysis and the defer chain

use log::trace;

use crate::sema::analyzer::Sema;
use crate::sema::decl::{BindingDecl, Decl, DeclKind, Linkage};
use crate::sema::ir::{DeferId, DeferNode, DeferRange, Stmt};
use crate::sema::scope::ScopeId;
use crate::syntax::{self as ast, Block};
use crate::types::QualType;
use crate::utils::{Result, Span};

impl<'a> Sema<'a> {
    fn current_defer(&self) -> Option<DeferId> {
        self.current_function().and_then(|f| f.current_defer)
    }

    fn set_current_defer(&mut self, defer: Option<DeferId>) {
        if let Some(frame) = self.current_function_mut() {
            frame.current_defer = defer;
        }
    }

    /// Analyze `stmts` as the body of `scope`. Defers pushed inside the block
    /// are popped again when it ends.
    pub(crate) fn analyze_block_in(&mut self, scope: ScopeId, stmts: &[ast::Stmt], span: Span) -> Result<Stmt> {
        self.with_scope(scope, |sema| {
            let entry = sema.cx.scopes.defer_at_entry(scope);
            let mut out = Vec::with_capacity(stmts.len());
            for stmt in stmts {
                out.push(sema.analyze_stmt(stmt)?);
            }
            let exit_defers = DeferRange { from: sema.current_defer(), until: entry };
            sema.set_current_defer(entry);
            Ok(Stmt::Compound { stmts: out, scope, exit_defers, span })
        })
    }

    fn analyze_block(&mut self, block: &Block) -> Result<Stmt> {
        let scope = self.new_block_scope();
        self.analyze_block_in(scope, &block.stmts, block.span)
    }

    /// Branch and loop bodies get a scope of their own even without braces
    fn analyze_substatement(&mut self, stmt: &ast::Stmt) -> Result<Stmt> {
        match stmt {
            ast::Stmt::Compound(block) => self.analyze_block(block),
            other => {
                let scope = self.new_block_scope();
                self.analyze_block_in(scope, std::slice::from_ref(other), stmt_span(other))
            }
        }
    }

    fn analyze_stmt(&mut self, stmt: &ast::Stmt) -> Result<Stmt> {
        match stmt {
            ast::Stmt::Compound(block) => self.analyze_block(block),
            ast::Stmt::Binding(def) => self.analyze_local(def),
            ast::Stmt::Expr(expr) => {
                let expr = self.analyze_expr(expr)?;
                if !expr.discardable && !expr.contains_errors() {
                    let message = format!("unused result of type '{}'", self.cx.type_name(&expr.ty));
                    self.cx.diag.error(expr.span, message);
                }
                Ok(Stmt::Expr(expr))
            }
            ast::Stmt::If { cond, then, otherwise, span } => {
                let cond = self.analyze_condition(cond)?;
                let then = self.analyze_substatement(then)?;
                let otherwise = match otherwise {
                    Some(stmt) => Some(Box::new(self.analyze_substatement(stmt)?)),
                    None => None,
                };
                Ok(Stmt::If { cond, then: Box::new(then), otherwise, span: *span })
            }
            ast::Stmt::While { cond, body, span } => {
                let cond = self.analyze_condition(cond)?;
                let entry = self.current_defer();
                if let Some(frame) = self.current_function_mut() {
                    frame.loops.push(entry);
                }
                let body = self.analyze_substatement(body);
                if let Some(frame) = self.current_function_mut() {
                    frame.loops.pop();
                }
                Ok(Stmt::While { cond, body: Box::new(body?), span: *span })
            }
            ast::Stmt::Break { span } => {
                let defers = self.loop_exit(*span, "break");
                Ok(Stmt::Break { defers, span: *span })
            }
            ast::Stmt::Continue { span } => {
                let defers = self.loop_exit(*span, "continue");
                Ok(Stmt::Continue { defers, span: *span })
            }
            ast::Stmt::Return { value, span } => self.analyze_return(value.as_ref(), *span),
            ast::Stmt::Defer { body, span } => self.analyze_defer(body, *span),
            ast::Stmt::Empty { span } => Ok(Stmt::Empty { span: *span }),
        }
    }

    fn analyze_condition(&mut self, cond: &ast::Expr) -> Result<crate::sema::ir::Expr> {
        let cond = self.analyze_expr(cond)?;
        Ok(self.cx.convert_or_error(cond, &QualType::bool()))
    }

    /// Local bindings become visible after their initializer
    fn analyze_local(&mut self, def: &ast::BindingDef) -> Result<Stmt> {
        let (ty, init) = self.analyze_binding(def)?;
        let decl = self.cx.add_decl(Decl {
            name: def.name.name.clone(),
            span: def.name.span,
            linkage: Linkage::Internal,
            module: self.module,
            kind: DeclKind::Binding(BindingDecl { ty, init, global: false }),
        });
        let scope = self.current_scope();
        self.cx.declare_in(scope, decl);
        trace!("local '{}'", def.name.name);
        Ok(Stmt::Decl(decl))
    }

    /// Defers to run when `break`/`continue` leaves the innermost loop
    fn loop_exit(&mut self, span: Span, keyword: &str) -> DeferRange {
        let from = self.current_defer();
        match self.current_function().and_then(|f| f.loops.last().copied()) {
            Some(until) => DeferRange { from, until },
            None => {
                self.cx.diag.error(span, format!("'{}' outside of a loop", keyword));
                DeferRange { from, until: from }
            }
        }
    }

    fn analyze_return(&mut self, value: Option<&ast::Expr>, span: Span) -> Result<Stmt> {
        let Some(frame) = self.current_function() else {
            self.cx.diag.ice("return outside of a function body");
        };
        let ret = frame.ret.clone();
        let in_defer = frame.in_defer;
        let name = self.cx.decl(frame.decl).name.clone();
        let defers = DeferRange { from: self.current_defer(), until: None };

        if in_defer {
            self.cx.diag.error(span, "cannot return from a deferred statement");
        }
        let canonical = self.cx.canonical_type(&ret);
        let value = match value {
            Some(_) if canonical.is_noreturn() => {
                self.cx.diag.error(span, format!("function '{}' is declared noreturn and cannot return", name));
                None
            }
            None if canonical.is_noreturn() => {
                self.cx.diag.error(span, format!("function '{}' is declared noreturn and cannot return", name));
                None
            }
            Some(value) if canonical.is_void() => {
                let value = self.analyze_expr(value)?;
                if !value.contains_errors() {
                    self.cx.diag.error(value.span, format!("void function '{}' cannot return a value", name));
                }
                None
            }
            Some(value) => {
                let value = self.analyze_expr_with_hint(value, Some(&ret))?;
                Some(self.cx.convert_or_error(value, &ret.unqualified()))
            }
            None if canonical.is_void() || canonical.is_poison() => None,
            None => {
                self.cx.diag.error(span, format!("function '{}' must return a value", name));
                None
            }
        };
        Ok(Stmt::Return { value, defers, span })
    }

    fn analyze_defer(&mut self, body: &ast::Stmt, span: Span) -> Result<Stmt> {
        // The body cannot leave through loops or returns of the function
        let (loops, was_in_defer) = match self.current_function_mut() {
            Some(frame) => (std::mem::take(&mut frame.loops), std::mem::replace(&mut frame.in_defer, true)),
            None => (Vec::new(), false),
        };
        let result = self.analyze_substatement(body);
        if let Some(frame) = self.current_function_mut() {
            frame.loops = loops;
            frame.in_defer = was_in_defer;
        }
        let stmt = result?;

        let parent = self.current_defer();
        let Some(frame) = self.current_function_mut() else {
            self.cx.diag.ice("defer outside of a function body");
        };
        let id = DeferId(frame.defers.len() as u32);
        frame.defers.push(DeferNode { stmt, parent });
        frame.current_defer = Some(id);
        Ok(Stmt::Defer { id, span })
    }
}

fn stmt_span(stmt: &ast::Stmt) -> Span {
    match stmt {
        ast::Stmt::Compound(block) => block.span,
        ast::Stmt::Binding(def) => def.span,
        ast::Stmt::Expr(expr) => expr.span(),
        ast::Stmt::If { span, .. }
        | ast::Stmt::While { span, .. }
        | ast::Stmt::Break { span }
        | ast::Stmt::Continue { span }
        | ast::Stmt::Return { span, .. }
        | ast::Stmt::Defer { span, .. }
        | ast::Stmt::Empty { span } => *span,
    }
}
