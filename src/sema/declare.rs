//! First pass: imports and forward declarations

use log::{debug, trace};

use crate::sema::analyzer::Sema;
use crate::sema::context::{DeclId, ModuleId};
use crate::sema::decl::{
    AliasDecl, BindingDecl, Decl, DeclKind, EnumDecl, FunctionDecl, ImportDecl, Linkage, RegisterDecl, StructDecl,
};
use crate::syntax::{self as ast, Attributes, CallConvAttr, ImportQuery, Item, Variadic};
use crate::types::{CallConv, FunctionType, QualType, VariadicKind};
use crate::utils::{Error, Result};

pub(crate) fn call_conv(attr: Option<CallConvAttr>, foreign: bool) -> CallConv {
    match attr {
        Some(CallConvAttr::C) => CallConv::C,
        Some(CallConvAttr::Aether) => CallConv::Aether,
        None if foreign => CallConv::C,
        None => CallConv::Aether,
    }
}

pub(crate) fn variadic_kind(variadic: Variadic) -> VariadicKind {
    match variadic {
        Variadic::None => VariadicKind::None,
        Variadic::C => VariadicKind::C,
    }
}

fn linkage(attrs: &Attributes) -> Linkage {
    if attrs.export {
        Linkage::Exported
    } else if attrs.foreign.is_some() {
        Linkage::Imported
    } else {
        Linkage::Internal
    }
}

impl<'a> Sema<'a> {
    // ==================== Imports ====================

    /// Build each file's import table and record foreign libraries
    pub(crate) fn resolve_imports(&mut self) -> Result<()> {
        debug!("resolving imports of '{}'", self.cx.module(self.module).name);
        let units = self.units;
        for (file, unit) in units.iter().enumerate() {
            for item in &unit.items {
                match item {
                    Item::Import(import) => self.resolve_import(file, import)?,
                    Item::ForeignImport(foreign) => {
                        let module = self.module;
                        self.cx.module_mut(module).foreign_libraries.push(foreign.library.clone());
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn find_dependency(&self, name: &str) -> Option<ModuleId> {
        let module = self.cx.module(self.module);
        module.dependencies.iter().copied().find(|&dep| self.cx.module(dep).name == name)
    }

    fn resolve_import(&mut self, file: usize, import: &ast::ImportDecl) -> Result<()> {
        let name = import.path.joined();
        let Some(dep) = self.find_dependency(&name) else {
            self.cx.diag.error(import.path.span, format!("module '{}' is not a dependency of this module", name));
            return Ok(());
        };
        let exports = self.cx.module(dep).export_scope;
        trace!("import '{}' in file {}", name, file);

        let wildcard = import.query.iter().any(|q| matches!(q, ImportQuery::Wildcard(_)));
        if wildcard {
            if import.query.len() > 1 {
                self.cx.diag.error(import.span, "a wildcard import cannot be combined with other imported names");
                return Ok(());
            }
            if import.export {
                self.cx.diag.error(import.span, "exporting a wildcard import is not supported");
                return Ok(());
            }
            let file_scope = self.file_scope(file);
            let imported: Vec<DeclId> =
                self.cx.scopes.iter(exports).flat_map(|(_, decls)| decls.iter().copied()).collect();
            for decl in imported {
                self.cx.declare_in(file_scope, decl);
            }
            return Ok(());
        }
        if let Some(ImportQuery::Name(ident)) = import.query.first() {
            return Err(Error::todo("importing individual names from a module", ident.span));
        }

        let bound = match (&import.alias, import.path.segments.last()) {
            (Some(alias), _) => alias.name.clone(),
            (None, Some(last)) => last.name.clone(),
            (None, None) => self.cx.diag.ice("import of an empty path"),
        };
        if self.imports[file].insert(bound.clone(), exports).is_some() {
            self.cx.diag.error(import.span, format!("'{}' is imported more than once", bound));
        }
        if import.export {
            let decl = self.cx.add_decl(Decl {
                name: bound,
                span: import.span,
                linkage: Linkage::ReExported,
                module: self.module,
                kind: DeclKind::Import(ImportDecl { module: dep, scope: exports }),
            });
            let export_scope = self.export_scope();
            self.cx.declare_in(export_scope, decl);
        }
        Ok(())
    }

    // ==================== Forward declarations ====================

    /// Declare a stub for every top-level item of every file
    pub(crate) fn forward_declare(&mut self) {
        debug!("forward declaring '{}'", self.cx.module(self.module).name);
        let units = self.units;
        for (file, unit) in units.iter().enumerate() {
            for item in &unit.items {
                self.declare_item(file, item);
            }
        }
    }

    fn declare_item(&mut self, file: usize, item: &'a Item) {
        let module_scope = self.module_scope();
        // Member scopes see the file's imports
        let file_scope = self.file_scope(file);
        let (name, attrs, node, kind) = match item {
            Item::Alias(def) => (
                &def.name,
                &def.attrs,
                def.id,
                DeclKind::Alias(AliasDecl { target: QualType::poison(def.span) }),
            ),
            Item::Struct(def) => {
                let scope = self.cx.scopes.new_scope(Some(file_scope));
                (&def.name, &def.attrs, def.id, DeclKind::Struct(StructDecl::new(scope, None)))
            }
            Item::Enum(def) => {
                let scope = self.cx.scopes.new_scope(Some(file_scope));
                (&def.name, &def.attrs, def.id, DeclKind::Enum(EnumDecl { scope, variants: Vec::new() }))
            }
            Item::Binding(def) => (
                &def.name,
                &def.attrs,
                def.id,
                DeclKind::Binding(BindingDecl { ty: QualType::poison(def.span), init: None, global: true }),
            ),
            Item::Function(def) => {
                let foreign = def.attrs.foreign.is_some();
                let function = FunctionDecl {
                    ty: FunctionType {
                        ret: QualType::poison(def.span),
                        params: Vec::new(),
                        call_conv: call_conv(def.attrs.call_conv, foreign),
                        variadic: variadic_kind(def.variadic),
                        discardable: def.attrs.discardable,
                    },
                    params: Vec::new(),
                    body: None,
                    defers: Vec::new(),
                    is_foreign: foreign,
                    foreign_name: def
                        .attrs
                        .foreign
                        .as_ref()
                        .map(|f| f.name.clone().unwrap_or_else(|| def.name.name.clone())),
                    is_inline: def.attrs.inline,
                    is_discardable: def.attrs.discardable,
                    has_body: def.body.is_some(),
                };
                (&def.name, &def.attrs, def.id, DeclKind::Function(function))
            }
            Item::Register(def) => (
                &def.name,
                &def.attrs,
                def.id,
                DeclKind::Register(RegisterDecl { ty: QualType::poison(def.span), address: 0 }),
            ),
            Item::Module(_) | Item::Import(_) | Item::ForeignImport(_) => return,
        };

        let linkage = linkage(attrs);
        if attrs.export && attrs.internal {
            self.cx.diag.error(name.span, format!("'{}' cannot be both exported and internal", name.name));
        }
        trace!("forward declare {} '{}'", kind.describe(), name.name);
        let decl = self.cx.add_decl(Decl {
            name: name.name.clone(),
            span: name.span,
            linkage,
            module: self.module,
            kind,
        });
        self.cx.declare_in(module_scope, decl);
        if linkage == Linkage::Exported {
            let export_scope = self.export_scope();
            self.cx.declare_in(export_scope, decl);
        }
        let module = self.module;
        self.cx.module_mut(module).decls.push(decl);
        self.record_stub(file, node, decl, item);
    }
}

#[cfg(test)]
mod tests {
    use crate::sema::{analyze_module, Context, DeclKind, Linkage, LookupResult};
    use crate::syntax::{
        BindingDef, Expr, FunctionDef, ImportQuery, Item, Stmt, StructDef, SyntaxUnit, TypeExpr, UnitBuilder,
    };
    use crate::utils::{Error, Span};

    fn library(cx: &mut Context) -> crate::sema::ModuleId {
        let unit = UnitBuilder::new(0, "math.ae")
            .module("math")
            .exported(FunctionDef::new(
                TypeExpr::named("i32"),
                "twice",
                vec![(TypeExpr::named("i32"), "x")],
                Some(vec![Stmt::ret(Some(Expr::binary(
                    crate::syntax::BinOp::Mul,
                    Expr::path("x"),
                    Expr::int(2),
                )))]),
            ))
            .item(FunctionDef::new(TypeExpr::named("void"), "hidden", vec![], Some(vec![])))
            .build();
        let m = analyze_module(cx, &[unit], &[]).unwrap();
        assert!(!cx.diag.has_errors());
        m
    }

    fn caller(body: Vec<Stmt>) -> FunctionDef {
        FunctionDef::new(TypeExpr::named("void"), "run", vec![], Some(body))
    }

    fn call_twice(callee: &str) -> Stmt {
        Stmt::local(TypeExpr::named("i32"), "y", Some(Expr::call(Expr::path(callee), vec![Expr::int(4)])))
    }

    #[test]
    fn test_exported_stub_reaches_export_scope() {
        let mut cx = Context::default();
        let math = library(&mut cx);
        let exports = cx.module(math).export_scope;
        assert!(matches!(cx.lookup_unqualified(exports, "twice", true), LookupResult::Success(_)));
        assert_eq!(cx.lookup_unqualified(exports, "hidden", true), LookupResult::NotFound);
        let LookupResult::Success(twice) = cx.lookup_unqualified(exports, "twice", true) else { unreachable!() };
        assert_eq!(cx.decl(twice).linkage, Linkage::Exported);
    }

    #[test]
    fn test_plain_import_qualified_call() {
        let mut cx = Context::default();
        let math = library(&mut cx);
        let unit = UnitBuilder::new(1, "main.ae")
            .import("math", None, vec![])
            .item(caller(vec![call_twice("math.twice")]))
            .build();
        analyze_module(&mut cx, &[unit], &[math]).unwrap();
        assert!(!cx.diag.has_errors(), "{:?}", cx.diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_aliased_import() {
        let mut cx = Context::default();
        let math = library(&mut cx);
        let unit = UnitBuilder::new(1, "main.ae")
            .import("math", Some("m"), vec![])
            .item(caller(vec![call_twice("m.twice")]))
            .build();
        analyze_module(&mut cx, &[unit], &[math]).unwrap();
        assert!(!cx.diag.has_errors());
    }

    #[test]
    fn test_wildcard_import_brings_exports_only() {
        let mut cx = Context::default();
        let math = library(&mut cx);
        let unit = UnitBuilder::new(1, "main.ae")
            .import("math", None, vec![ImportQuery::Wildcard(Span::dummy())])
            .item(caller(vec![call_twice("twice"), Stmt::expr(Expr::call(Expr::path("hidden"), vec![]))]))
            .build();
        analyze_module(&mut cx, &[unit], &[math]).unwrap();
        let errors: Vec<String> = cx.diag.errors().map(|d| d.message.clone()).collect();
        assert_eq!(errors, vec!["unknown name 'hidden'".to_string()]);
    }

    #[test]
    fn test_wildcard_import_visible_in_struct_bodies() {
        let mut cx = Context::default();
        let geo = UnitBuilder::new(0, "geo.ae")
            .module("geo")
            .exported(StructDef::new("Vec2", vec![(TypeExpr::named("i32"), "x")], vec![]))
            .build();
        let geo = analyze_module(&mut cx, &[geo], &[]).unwrap();
        let moving = StructDef::new("Moving", vec![(TypeExpr::named("Vec2"), "velocity")], vec![]);
        let unit = UnitBuilder::new(1, "main.ae")
            .import("geo", None, vec![ImportQuery::Wildcard(Span::dummy())])
            .item(BindingDef::new(TypeExpr::named("Vec2"), "origin", None))
            .item(StructDef::new("Body", vec![(TypeExpr::named("Vec2"), "pos")], vec![moving]))
            .build();
        analyze_module(&mut cx, &[unit], &[geo]).unwrap();
        assert!(!cx.diag.has_errors(), "{:?}", cx.diag.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_wildcard_with_other_names_is_rejected() {
        let mut cx = Context::default();
        let math = library(&mut cx);
        let query = vec![ImportQuery::Wildcard(Span::dummy()), ImportQuery::Name(crate::syntax::Ident::new("twice"))];
        let unit = UnitBuilder::new(1, "main.ae").import("math", None, query).build();
        analyze_module(&mut cx, &[unit], &[math]).unwrap();
        assert_eq!(cx.diag.error_count(), 1);
    }

    #[test]
    fn test_named_import_is_todo() {
        let mut cx = Context::default();
        let math = library(&mut cx);
        let query = vec![ImportQuery::Name(crate::syntax::Ident::new("twice"))];
        let unit = UnitBuilder::new(1, "main.ae").import("math", None, query).build();
        let err = analyze_module(&mut cx, &[unit], &[math]).unwrap_err();
        assert!(matches!(err, Error::Todo { .. }));
    }

    #[test]
    fn test_unknown_import() {
        let mut cx = Context::default();
        let unit = UnitBuilder::new(0, "main.ae").import("nowhere", None, vec![]).build();
        analyze_module(&mut cx, &[unit], &[]).unwrap();
        assert_eq!(cx.diag.error_count(), 1);
    }

    #[test]
    fn test_reexported_import() {
        let mut cx = Context::default();
        let math = library(&mut cx);
        let mut unit = UnitBuilder::new(1, "wrap.ae").module("wrap").import("math", None, vec![]).build();
        if let Item::Import(import) = &mut unit.items[1] {
            import.export = true;
        }
        let wrap = analyze_module(&mut cx, &[unit], &[math]).unwrap();
        let exports = cx.module(wrap).export_scope;
        let LookupResult::Success(decl) = cx.lookup_unqualified(exports, "math", true) else {
            panic!("re-export missing");
        };
        assert_eq!(cx.decl(decl).linkage, Linkage::ReExported);
        assert!(matches!(cx.decl(decl).kind, DeclKind::Import(_)));

        let app = UnitBuilder::new(2, "main.ae")
            .import("wrap", None, vec![])
            .item(caller(vec![call_twice("wrap.math.twice")]))
            .build();
        analyze_module(&mut cx, &[app], &[math, wrap]).unwrap();
        assert!(!cx.diag.has_errors());
    }

    #[test]
    fn test_redeclaration_keeps_second() {
        let mut cx = Context::default();
        let unit = UnitBuilder::new(0, "main.ae")
            .item(BindingDef::new(TypeExpr::named("i32"), "x", Some(Expr::int(1))))
            .item(BindingDef::new(TypeExpr::named("i64"), "x", Some(Expr::int(2))))
            .build();
        let m = analyze_module(&mut cx, &[unit], &[]).unwrap();
        let redeclarations = cx.diag.errors().filter(|d| d.message.contains("redeclaration")).count();
        assert_eq!(redeclarations, 1);
        let scope = cx.module(m).module_scope;
        let stored = cx.scopes.lookup(scope, "x");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], cx.module(m).decls[1]);
    }

    #[test]
    fn test_foreign_imports_recorded() {
        let mut cx = Context::default();
        let mut unit: SyntaxUnit = UnitBuilder::new(0, "main.ae").build();
        unit.items.push(Item::ForeignImport(crate::syntax::ForeignImportDecl {
            library: "m".to_string(),
            span: Span::dummy(),
        }));
        let m = analyze_module(&mut cx, &[unit], &[]).unwrap();
        assert_eq!(cx.module(m).foreign_libraries, vec!["m".to_string()]);
    }
}
