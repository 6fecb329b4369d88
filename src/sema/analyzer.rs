//! Declaration analyzer driver
//!
//! Analysis of one module runs in two passes. The first declares a stub for
//! every top-level item so declarations may be used before the point they
//! appear. The second fills the stubs in. Declarations referenced before the
//! second pass reaches them are completed on demand; a declaration that is
//! referenced while it is being completed is a cycle.

use std::collections::HashMap;

use log::debug;

use crate::sema::context::{Context, DeclId, ModuleId, SourceFile, PROGRAM_MODULE};
use crate::sema::ir::{DeferId, DeferNode};
use crate::sema::scope::ScopeId;
use crate::syntax::{Item, NodeId, SyntaxUnit};
use crate::types::QualType;
use crate::utils::{Error, Result};

/// Bookkeeping for the function whose body is being analyzed
pub(crate) struct FunctionFrame {
    pub decl: DeclId,
    pub ret: QualType,
    /// Every defer node pushed so far
    pub defers: Vec<DeferNode>,
    /// Innermost active defer node
    pub current_defer: Option<DeferId>,
    /// Defer chain at the entry of each enclosing loop, innermost last
    pub loops: Vec<Option<DeferId>>,
    /// Inside the body of a `defer`
    pub in_defer: bool,
}

impl FunctionFrame {
    pub fn new(decl: DeclId, ret: QualType) -> Self {
        Self { decl, ret, defers: Vec::new(), current_defer: None, loops: Vec::new(), in_defer: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Pending,
    InProgress,
    Done,
}

/// A top-level item and the file it came from
#[derive(Clone, Copy)]
pub(crate) struct PendingItem<'a> {
    pub file: usize,
    pub item: &'a Item,
}

/// Analyzer state for one module
pub struct Sema<'a> {
    pub(crate) cx: &'a mut Context,
    pub(crate) units: &'a [SyntaxUnit],
    pub(crate) module: ModuleId,
    scope_stack: Vec<ScopeId>,
    function_stack: Vec<FunctionFrame>,
    /// First-pass stubs, keyed by originating file and node
    stubs: HashMap<(usize, NodeId), DeclId>,
    /// Name to export scope of the imported module, per file
    pub(crate) imports: Vec<HashMap<String, ScopeId>>,
    pub(crate) current_file: usize,
    items: HashMap<DeclId, PendingItem<'a>>,
    progress: HashMap<DeclId, Progress>,
}

/// Analyze the units of one module. `dependencies` must be fully analyzed.
///
/// User errors are reported to `cx.diag`; an `Err` means analysis had to
/// stop, e.g. on a language feature that is not supported yet.
pub fn analyze_module(cx: &mut Context, units: &[SyntaxUnit], dependencies: &[ModuleId]) -> Result<ModuleId> {
    let name = resolve_module_name(cx, units);
    for &dep in dependencies {
        if cx.module(dep).is_program {
            return Err(Error::ProgramModuleDependedUpon { dependent: name });
        }
    }

    let module = cx.new_module(&name);
    cx.module_mut(module).dependencies = dependencies.to_vec();
    debug!("analyzing module '{}' ({} files)", name, units.len());

    let errors_before = cx.diag.error_count();
    let mut sema = Sema::new(cx, units, module);
    sema.resolve_imports()?;
    sema.forward_declare();
    if sema.cx.diag.error_count() > errors_before {
        debug!("forward declaration of '{}' failed, skipping full analysis", name);
        return Ok(module);
    }
    sema.analyze_declarations()?;
    debug!("finished module '{}'", name);
    Ok(module)
}

/// The name every unit agrees on, or the program module
fn resolve_module_name(cx: &mut Context, units: &[SyntaxUnit]) -> String {
    let mut first: Option<(String, crate::utils::Span)> = None;
    for unit in units {
        for item in &unit.items {
            let Item::Module(decl) = item else { continue };
            let name = decl.name.joined();
            if let Some((agreed, at)) = &first {
                if *agreed != name {
                    cx.diag.error(decl.span, format!("module name '{}' conflicts with '{}'", name, agreed));
                    cx.diag.note(*at, "module name first declared here");
                }
            } else {
                first = Some((name, decl.span));
            }
        }
    }
    first.map(|(name, _)| name).unwrap_or_else(|| PROGRAM_MODULE.to_string())
}

impl<'a> Sema<'a> {
    pub fn new(cx: &'a mut Context, units: &'a [SyntaxUnit], module: ModuleId) -> Self {
        let module_scope = cx.module(module).module_scope;
        for unit in units {
            let scope = cx.scopes.new_scope(Some(module_scope));
            cx.module_mut(module).files.push(SourceFile {
                path: unit.path.clone(),
                file_id: unit.file_id,
                scope,
            });
        }
        Self {
            cx,
            units,
            module,
            scope_stack: Vec::new(),
            function_stack: Vec::new(),
            stubs: HashMap::new(),
            imports: vec![HashMap::new(); units.len()],
            current_file: 0,
            items: HashMap::new(),
            progress: HashMap::new(),
        }
    }

    // ==================== Files ====================

    pub(crate) fn file_scope(&self, file: usize) -> ScopeId {
        self.cx.module(self.module).files[file].scope
    }

    pub(crate) fn module_scope(&self) -> ScopeId {
        self.cx.module(self.module).module_scope
    }

    pub(crate) fn export_scope(&self) -> ScopeId {
        self.cx.module(self.module).export_scope
    }

    // ==================== Scope stack ====================

    pub(crate) fn current_scope(&self) -> ScopeId {
        match self.scope_stack.last() {
            Some(&scope) => scope,
            None => self.cx.diag.ice("scope stack is empty"),
        }
    }

    /// Run `f` with `scope` as the current scope. The scope is popped on
    /// every exit path.
    pub(crate) fn with_scope<T>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scope_stack.push(scope);
        let result = f(self);
        match self.scope_stack.pop() {
            Some(top) if top == scope => result,
            Some(_) => self.cx.diag.ice("scope stack out of balance"),
            None => self.cx.diag.ice("scope stack underflow"),
        }
    }

    /// A fresh block scope under the current one
    pub(crate) fn new_block_scope(&mut self) -> ScopeId {
        let parent = self.current_scope();
        let defer = self.function_stack.last().and_then(|f| f.current_defer);
        self.cx.scopes.new_scope_with_defer(Some(parent), defer)
    }

    // ==================== Function stack ====================

    /// Run `f` inside `frame`, handing the frame back with the result
    pub(crate) fn with_function<T>(
        &mut self,
        frame: FunctionFrame,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> (Result<T>, FunctionFrame) {
        let decl = frame.decl;
        self.function_stack.push(frame);
        let result = f(self);
        match self.function_stack.pop() {
            Some(frame) if frame.decl == decl => (result, frame),
            Some(_) => self.cx.diag.ice("function stack out of balance"),
            None => self.cx.diag.ice("function stack underflow"),
        }
    }

    pub(crate) fn current_function(&self) -> Option<&FunctionFrame> {
        self.function_stack.last()
    }

    pub(crate) fn current_function_mut(&mut self) -> Option<&mut FunctionFrame> {
        self.function_stack.last_mut()
    }

    // ==================== Stubs ====================

    pub(crate) fn record_stub(&mut self, file: usize, node: NodeId, decl: DeclId, item: &'a Item) {
        if self.stubs.insert((file, node), decl).is_some() {
            self.cx.diag.ice(format!("node {:?} of file {} declared twice", node, file));
        }
        self.items.insert(decl, PendingItem { file, item });
        self.progress.insert(decl, Progress::Pending);
    }

    /// Stub created for `node` by the first pass
    pub(crate) fn stub(&self, file: usize, node: NodeId) -> DeclId {
        match self.stubs.get(&(file, node)) {
            Some(&decl) => decl,
            None => self.cx.diag.ice(format!("no forward declaration for node {:?} of file {}", node, file)),
        }
    }

    /// Make sure `decl` is fully analyzed. Returns `false` if it is being
    /// analyzed right now, i.e. it was reached through a cycle.
    pub(crate) fn ensure_complete(&mut self, decl: DeclId) -> Result<bool> {
        match self.progress.get(&decl) {
            None | Some(Progress::Done) => return Ok(true),
            Some(Progress::InProgress) => return Ok(false),
            Some(Progress::Pending) => {}
        }
        let Some(pending) = self.items.get(&decl).copied() else {
            self.cx.diag.ice(format!("pending declaration '{}' has no syntax", self.cx.decl(decl).name));
        };
        log::trace!("completing '{}'", self.cx.decl(decl).name);
        self.progress.insert(decl, Progress::InProgress);

        // Complete in the context of the declaring file, outside any function
        let saved_file = std::mem::replace(&mut self.current_file, pending.file);
        let saved_scopes = std::mem::take(&mut self.scope_stack);
        let saved_functions = std::mem::take(&mut self.function_stack);
        let file_scope = self.file_scope(pending.file);
        let result = self.with_scope(file_scope, |sema| sema.complete_item(decl, pending.item));
        self.current_file = saved_file;
        self.scope_stack = saved_scopes;
        self.function_stack = saved_functions;

        self.progress.insert(decl, Progress::Done);
        result.map(|_| true)
    }

    pub(crate) fn is_in_progress(&self, decl: DeclId) -> bool {
        self.progress.get(&decl) == Some(&Progress::InProgress)
    }

    // ==================== Second pass ====================

    /// Re-walk every top-level item: types first, then values and
    /// signatures, then function bodies.
    fn analyze_declarations(&mut self) -> Result<()> {
        debug!("full analysis of '{}'", self.cx.module(self.module).name);
        let units = self.units;
        let mut ordered = Vec::new();
        for types_first in [true, false] {
            for (file, unit) in units.iter().enumerate() {
                for item in &unit.items {
                    let Some(node) = declared_node(item) else { continue };
                    let is_type = matches!(item, Item::Alias(_) | Item::Struct(_) | Item::Enum(_));
                    if is_type == types_first {
                        ordered.push((file, node, item));
                    }
                }
            }
        }

        for &(file, node, _) in &ordered {
            let decl = self.stub(file, node);
            self.ensure_complete(decl)?;
        }
        for &(file, node, item) in &ordered {
            if let Item::Function(def) = item {
                let decl = self.stub(file, node);
                self.current_file = file;
                let file_scope = self.file_scope(file);
                self.with_scope(file_scope, |sema| sema.analyze_function_body(decl, def))?;
            }
        }
        Ok(())
    }
}

/// Node id of an item that declares a name
pub(crate) fn declared_node(item: &Item) -> Option<NodeId> {
    match item {
        Item::Alias(a) => Some(a.id),
        Item::Struct(s) => Some(s.id),
        Item::Enum(e) => Some(e.id),
        Item::Binding(b) => Some(b.id),
        Item::Function(f) => Some(f.id),
        Item::Register(r) => Some(r.id),
        Item::Module(_) | Item::Import(_) | Item::ForeignImport(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::UnitBuilder;

    #[test]
    fn test_module_name_agreement() {
        let mut cx = Context::default();
        let a = UnitBuilder::new(0, "a.ae").module("geo").build();
        let b = UnitBuilder::new(1, "b.ae").module("geo").build();
        let m = analyze_module(&mut cx, &[a, b], &[]).unwrap();
        assert_eq!(cx.module(m).name, "geo");
        assert!(!cx.module(m).is_program);
        assert!(!cx.diag.has_errors());
    }

    #[test]
    fn test_conflicting_module_names() {
        let mut cx = Context::default();
        let a = UnitBuilder::new(0, "a.ae").module("geo").build();
        let b = UnitBuilder::new(1, "b.ae").module("math").build();
        analyze_module(&mut cx, &[a, b], &[]).unwrap();
        assert_eq!(cx.diag.error_count(), 1);
    }

    #[test]
    fn test_no_module_name_is_program() {
        let mut cx = Context::default();
        let m = analyze_module(&mut cx, &[UnitBuilder::new(0, "main.ae").build()], &[]).unwrap();
        assert!(cx.module(m).is_program);
        assert_eq!(cx.module(m).name, PROGRAM_MODULE);
    }

    #[test]
    fn test_program_module_cannot_be_a_dependency() {
        let mut cx = Context::default();
        let program = analyze_module(&mut cx, &[UnitBuilder::new(0, "main.ae").build()], &[]).unwrap();
        let lib = UnitBuilder::new(1, "lib.ae").module("lib").build();
        let err = analyze_module(&mut cx, &[lib], &[program]).unwrap_err();
        assert!(matches!(err, Error::ProgramModuleDependedUpon { .. }));
    }

    #[test]
    #[should_panic(expected = "internal compiler error")]
    fn test_missing_stub_is_fatal() {
        let mut cx = Context::default();
        let units = [UnitBuilder::new(0, "main.ae").build()];
        let module = cx.new_module("m");
        let sema = Sema::new(&mut cx, &units, module);
        sema.stub(0, NodeId(42));
    }

    #[test]
    fn test_with_scope_pops_on_error() {
        let mut cx = Context::default();
        let units = [UnitBuilder::new(0, "main.ae").build()];
        let module = cx.new_module("m");
        let mut sema = Sema::new(&mut cx, &units, module);
        let outer = sema.file_scope(0);
        let inner = sema.cx.scopes.new_scope(Some(outer));
        let result: Result<()> = sema.with_scope(outer, |sema| {
            let inner_result: Result<()> =
                sema.with_scope(inner, |_| Err(Error::todo("test", crate::utils::Span::dummy())));
            assert!(inner_result.is_err());
            assert_eq!(sema.current_scope(), outer);
            Ok(())
        });
        assert!(result.is_ok());
        assert!(sema.scope_stack.is_empty());
    }
}
