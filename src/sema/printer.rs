//! Sema IR printer
//!
//! Human-readable dump of a module's declarations, for debugging.

use std::fmt;

use crate::sema::context::{Context, DeclId, ModuleId};
use crate::sema::decl::{DeclKind, FunctionDecl, Linkage};
use crate::sema::ir::{DeferId, DeferNode, Expr, ExprKind, Stmt};
use crate::types::{QualType, Type};

/// `Display` adapter printing every top-level declaration of a module
pub struct ModuleDump<'a> {
    pub cx: &'a Context,
    pub module: ModuleId,
}

impl<'a> ModuleDump<'a> {
    pub fn new(cx: &'a Context, module: ModuleId) -> Self {
        Self { cx, module }
    }
}

impl fmt::Display for ModuleDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let module = self.cx.module(self.module);
        writeln!(f, "; module {} ({} declarations)", module.name, module.decls.len())?;
        if !module.foreign_libraries.is_empty() {
            writeln!(f, "; foreign: {}", module.foreign_libraries.join(", "))?;
        }
        let mut printer = Printer { cx: self.cx, f, indent: 0, defers: &[] };
        for &decl in &module.decls {
            printer.decl(decl)?;
        }
        Ok(())
    }
}

struct Printer<'a, 'b, 'f> {
    cx: &'a Context,
    f: &'b mut fmt::Formatter<'f>,
    indent: usize,
    /// Defer nodes of the function being printed
    defers: &'a [DeferNode],
}

impl<'a> Printer<'a, '_, '_> {
    fn pad(&mut self) -> fmt::Result {
        write!(self.f, "{:width$}", "", width = self.indent * 2)
    }

    fn decl(&mut self, id: DeclId) -> fmt::Result {
        let cx = self.cx;
        let decl = cx.decl(id);
        let linkage = match decl.linkage {
            Linkage::Internal => "",
            Linkage::Exported => "export ",
            Linkage::Imported => "foreign ",
            Linkage::ReExported => "reexport ",
        };
        self.pad()?;
        match &decl.kind {
            DeclKind::Binding(b) => {
                write!(self.f, "{}let {}: {}", linkage, decl.name, cx.type_name(&b.ty))?;
                if let Some(init) = &b.init {
                    write!(self.f, " = ")?;
                    self.expr(init)?;
                }
                writeln!(self.f)
            }
            DeclKind::Function(func) => self.function(linkage, &decl.name, func),
            DeclKind::Struct(s) => {
                let ty = QualType::new(Type::Struct(id), decl.span);
                write!(self.f, "{}struct {}", linkage, decl.name)?;
                if let Some(tag) = s.tag.leaf().filter(|_| s.parent.is_some()) {
                    write!(self.f, " tag {}", tag)?;
                }
                writeln!(self.f, " ; size {}, align {}", cx.size_of(&ty), cx.align_of(&ty))?;
                self.indent += 1;
                for &field in &s.fields {
                    let offset = cx.try_lookup_field(id, &cx.decl(field).name).map(|info| info.offset);
                    if let DeclKind::Field(fd) = &cx.decl(field).kind {
                        self.pad()?;
                        write!(self.f, "{}: {}", cx.decl(field).name, cx.type_name(&fd.ty))?;
                        match offset {
                            Some(offset) => writeln!(self.f, " @{}", offset)?,
                            None => writeln!(self.f)?,
                        }
                    }
                }
                for &variant in &s.variants {
                    self.decl(variant)?;
                }
                self.indent -= 1;
                Ok(())
            }
            DeclKind::Enum(_) => writeln!(self.f, "{}enum {}", linkage, decl.name),
            DeclKind::Alias(a) => writeln!(self.f, "{}alias {} = {}", linkage, decl.name, cx.type_name(&a.target)),
            DeclKind::Register(r) => {
                writeln!(self.f, "{}register {}: {} @ {:#x}", linkage, decl.name, cx.type_name(&r.ty), r.address)
            }
            DeclKind::Import(i) => writeln!(self.f, "{}import {}", linkage, cx.module(i.module).name),
            DeclKind::Param(p) => writeln!(self.f, "param {}: {}", decl.name, cx.type_name(&p.ty)),
            DeclKind::Field(fd) => writeln!(self.f, "field {}: {}", decl.name, cx.type_name(&fd.ty)),
        }
    }

    fn function(&mut self, linkage: &str, name: &str, func: &'a FunctionDecl) -> fmt::Result {
        let cx = self.cx;
        write!(self.f, "{}fn {}(", linkage, name)?;
        for (i, &param) in func.params.iter().enumerate() {
            if i > 0 {
                write!(self.f, ", ")?;
            }
            if let DeclKind::Param(p) = &cx.decl(param).kind {
                write!(self.f, "{}: {}", cx.decl(param).name, cx.type_name(&p.ty))?;
            }
        }
        write!(self.f, ") -> {}", cx.type_name(&func.ty.ret))?;
        if let Some(symbol) = &func.foreign_name {
            write!(self.f, " = \"{}\"", symbol)?;
        }
        match &func.body {
            Some(body) => {
                write!(self.f, " ")?;
                self.defers = &func.defers;
                self.stmt(body)?;
                self.defers = &[];
                Ok(())
            }
            None => writeln!(self.f, ";"),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> fmt::Result {
        match stmt {
            Stmt::Compound { stmts, exit_defers, .. } => {
                writeln!(self.f, "{{")?;
                self.indent += 1;
                for s in stmts {
                    self.pad()?;
                    self.stmt(s)?;
                }
                let on_exit = exit_defers.nodes(self.defers);
                if !on_exit.is_empty() {
                    self.pad()?;
                    writeln!(self.f, "; exit runs {:?}", on_exit.iter().map(|d| d.0).collect::<Vec<_>>())?;
                }
                self.indent -= 1;
                self.pad()?;
                writeln!(self.f, "}}")
            }
            Stmt::Expr(e) => {
                self.expr(e)?;
                writeln!(self.f, ";")
            }
            Stmt::Decl(id) => {
                let decl = self.cx.decl(*id);
                match &decl.kind {
                    DeclKind::Binding(b) => {
                        write!(self.f, "let {}: {}", decl.name, self.cx.type_name(&b.ty))?;
                        if let Some(init) = &b.init {
                            write!(self.f, " = ")?;
                            self.expr(init)?;
                        }
                        writeln!(self.f, ";")
                    }
                    other => writeln!(self.f, "; {} {}", other.describe(), decl.name),
                }
            }
            Stmt::If { cond, then, otherwise, .. } => {
                write!(self.f, "if ")?;
                self.expr(cond)?;
                write!(self.f, " ")?;
                self.stmt(then)?;
                if let Some(otherwise) = otherwise {
                    self.pad()?;
                    write!(self.f, "else ")?;
                    self.stmt(otherwise)?;
                }
                Ok(())
            }
            Stmt::While { cond, body, .. } => {
                write!(self.f, "while ")?;
                self.expr(cond)?;
                write!(self.f, " ")?;
                self.stmt(body)
            }
            Stmt::Break { defers, .. } => writeln!(self.f, "break; runs {:?}", ids(&defers.nodes(self.defers))),
            Stmt::Continue { defers, .. } => writeln!(self.f, "continue; runs {:?}", ids(&defers.nodes(self.defers))),
            Stmt::Return { value, defers, .. } => {
                write!(self.f, "return")?;
                if let Some(value) = value {
                    write!(self.f, " ")?;
                    self.expr(value)?;
                }
                writeln!(self.f, "; runs {:?}", ids(&defers.nodes(self.defers)))
            }
            Stmt::Defer { id, .. } => {
                write!(self.f, "defer #{} ", id.0)?;
                let defers = self.defers;
                match defers.get(id.0 as usize) {
                    Some(node) => self.stmt(&node.stmt),
                    None => writeln!(self.f, "<missing>"),
                }
            }
            Stmt::Empty { .. } => writeln!(self.f, ";"),
        }
    }

    /// Prefix form, casts spelled out
    fn expr(&mut self, expr: &Expr) -> fmt::Result {
        let cx = self.cx;
        match &expr.kind {
            ExprKind::Poison => write!(self.f, "<error>"),
            ExprKind::IntLiteral(v) => write!(self.f, "{}", v),
            ExprKind::FloatLiteral(v) => write!(self.f, "{:?}", v),
            ExprKind::StringLiteral(s) => write!(self.f, "{:?}", s),
            ExprKind::BoolLiteral(b) => write!(self.f, "{}", b),
            ExprKind::NilLiteral => write!(self.f, "nil"),
            ExprKind::DeclRef(id) => write!(self.f, "{}", cx.decl(*id).name),
            ExprKind::Binary { op, lhs, rhs } => {
                write!(self.f, "({} ", op.symbol())?;
                self.expr(lhs)?;
                write!(self.f, " ")?;
                self.expr(rhs)?;
                write!(self.f, ")")
            }
            ExprKind::Assign { target, value } => {
                write!(self.f, "(= ")?;
                self.expr(target)?;
                write!(self.f, " ")?;
                self.expr(value)?;
                write!(self.f, ")")
            }
            ExprKind::Unary { op, operand } => {
                write!(self.f, "({} ", op.symbol())?;
                self.expr(operand)?;
                write!(self.f, ")")
            }
            ExprKind::Call { callee, args } => {
                write!(self.f, "(call ")?;
                self.expr(callee)?;
                self.list(args)?;
                write!(self.f, ")")
            }
            ExprKind::Cast { kind, operand } => {
                write!(self.f, "({:?}<{}> ", kind, cx.type_name(&expr.ty))?;
                self.expr(operand)?;
                write!(self.f, ")")
            }
            ExprKind::Field { base, field, offset } => {
                write!(self.f, "(. ")?;
                self.expr(base)?;
                write!(self.f, " {} @{})", cx.decl(*field).name, offset)
            }
            ExprKind::SliceLen(base) => {
                write!(self.f, "(len ")?;
                self.expr(base)?;
                write!(self.f, ")")
            }
            ExprKind::SlicePtr(base) => {
                write!(self.f, "(ptr ")?;
                self.expr(base)?;
                write!(self.f, ")")
            }
            ExprKind::Index { base, index } => {
                write!(self.f, "([] ")?;
                self.expr(base)?;
                write!(self.f, " ")?;
                self.expr(index)?;
                write!(self.f, ")")
            }
            ExprKind::Construct { args, tag } => {
                write!(self.f, "({}", cx.type_name(&expr.ty))?;
                if let Some(tag) = tag {
                    write!(self.f, " #{}", tag)?;
                }
                self.list(args)?;
                write!(self.f, ")")
            }
            ExprKind::Array(elems) => {
                write!(self.f, "(array")?;
                self.list(elems)?;
                write!(self.f, ")")
            }
            ExprKind::UndefinedOperator(operands) => {
                write!(self.f, "(<undefined>")?;
                self.list(operands)?;
                write!(self.f, ")")
            }
        }
    }

    fn list(&mut self, exprs: &[Expr]) -> fmt::Result {
        for e in exprs {
            write!(self.f, " ")?;
            self.expr(e)?;
        }
        Ok(())
    }
}

fn ids(nodes: &[DeferId]) -> Vec<u32> {
    nodes.iter().map(|d| d.0).collect()
}
