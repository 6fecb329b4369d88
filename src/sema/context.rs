//! Compilation context
//!
//! Owns every declaration, scope and module of one compilation session.
//! Modules loaded as dependencies stay in the same arenas, so their
//! declarations can be referenced by identity from the modules importing them.

use crate::sema::decl::{Decl, DeclKind};
use crate::sema::scope::{ScopeArena, ScopeId};
use crate::target::TargetInfo;
use crate::utils::{Diagnostics, Span};

/// Index of a declaration in the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub(crate) u32);

/// Index of a module in the context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub(crate) u32);

/// Name of the module that units without a `module` declaration belong to
pub const PROGRAM_MODULE: &str = "program";

/// One source file of a module
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub file_id: usize,
    /// Holds the file's imports; parent is the module scope
    pub scope: ScopeId,
}

/// An analyzed (or being analyzed) module
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    /// No unit declared a module name
    pub is_program: bool,
    pub files: Vec<SourceFile>,
    /// Everything declared at top level, visible across the module's files
    pub module_scope: ScopeId,
    /// What importing modules see
    pub export_scope: ScopeId,
    /// In load order
    pub dependencies: Vec<ModuleId>,
    /// Top-level declarations in declaration order
    pub decls: Vec<DeclId>,
    /// `import foreign` libraries, for the linker
    pub foreign_libraries: Vec<String>,
}

fn overloadable(decl: &Decl) -> bool {
    matches!(decl.kind, DeclKind::Function(_))
}

/// Session-wide state shared by every analysis run
pub struct Context {
    pub target: TargetInfo,
    pub diag: Diagnostics,
    pub scopes: ScopeArena,
    decls: Vec<Decl>,
    modules: Vec<Module>,
}

impl Context {
    pub fn new(target: TargetInfo) -> Self {
        Self {
            target,
            diag: Diagnostics::new(),
            scopes: ScopeArena::new(),
            decls: Vec::new(),
            modules: Vec::new(),
        }
    }

    // ==================== Declarations ====================

    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.0 as usize]
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Functions may share a name slot with other functions
    pub fn is_overloadable(&self, id: DeclId) -> bool {
        overloadable(self.decl(id))
    }

    /// Declare `decl` in `scope`, reporting a redeclaration on conflict.
    /// Returns whether the declaration was accepted without conflict.
    pub fn declare_in(&mut self, scope: ScopeId, decl: DeclId) -> bool {
        let name = self.decl(decl).name.clone();
        let span = self.decl(decl).span;
        let previous: Vec<DeclId> = self.scopes.lookup(scope, &name).to_vec();
        let decls = &self.decls;
        let accepted = self.scopes.declare(scope, &name, decl, |id| overloadable(&decls[id.0 as usize]));
        if !accepted {
            self.diag.error(span, format!("redeclaration of '{}' in non-overloadable context", name));
            if let Some(&prev) = previous.first() {
                let prev_span = self.decl(prev).span;
                self.diag.note(prev_span, "previous declaration is here");
            }
        }
        accepted
    }

    // ==================== Modules ====================

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(module);
        id
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0 as usize]
    }

    /// A fresh module record with its scopes allocated
    pub fn new_module(&mut self, name: &str) -> ModuleId {
        let module_scope = self.scopes.new_scope(None);
        let export_scope = self.scopes.new_scope(None);
        self.add_module(Module {
            name: name.to_string(),
            is_program: name == PROGRAM_MODULE,
            files: Vec::new(),
            module_scope,
            export_scope,
            dependencies: Vec::new(),
            decls: Vec::new(),
            foreign_libraries: Vec::new(),
        })
    }

    /// Span of a declaration, for notes
    pub fn decl_span(&self, id: DeclId) -> Span {
        self.decl(id).span
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(TargetInfo::default())
    }
}
