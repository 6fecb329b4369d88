//! Hierarchical symbol tables
//!
//! Scopes live in an arena and point at their parent by index. Two scopes are
//! the same scope only if they have the same [`ScopeId`]; contents never
//! matter for identity.

use std::collections::HashMap;

use crate::sema::context::DeclId;
use crate::sema::ir::DeferId;

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// A scope containing name slots
#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    /// Slot index by name
    index: HashMap<String, usize>,
    /// Slots in first-declaration order
    slots: Vec<(String, Vec<DeclId>)>,
    /// Innermost defer node active when the scope was entered
    defer_at_entry: Option<DeferId>,
}

/// Arena of every scope in a session
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope under `parent`
    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.new_scope_with_defer(parent, None)
    }

    /// Create a scope that remembers the defer chain active at its entry
    pub fn new_scope_with_defer(&mut self, parent: Option<ScopeId>, defer_at_entry: Option<DeferId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            index: HashMap::new(),
            slots: Vec::new(),
            defer_at_entry,
        });
        id
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes[id.0 as usize].parent
    }

    pub fn defer_at_entry(&self, id: ScopeId) -> Option<DeferId> {
        self.scopes[id.0 as usize].defer_at_entry
    }

    /// Declarations under `name` in this scope only, in declaration order
    pub fn lookup(&self, id: ScopeId, name: &str) -> &[DeclId] {
        let scope = &self.scopes[id.0 as usize];
        match scope.index.get(name) {
            Some(&slot) => &scope.slots[slot].1,
            None => &[],
        }
    }

    /// Add `decl` to the `name` slot.
    ///
    /// Accumulates while everything in the slot, the new declaration
    /// included, is `overloadable`. Otherwise the slot is reset to hold just
    /// `decl` and `false` is returned. Declaring the same declaration twice
    /// is a no-op.
    pub fn declare(
        &mut self,
        id: ScopeId,
        name: &str,
        decl: DeclId,
        overloadable: impl Fn(DeclId) -> bool,
    ) -> bool {
        let scope = &mut self.scopes[id.0 as usize];
        let slot = match scope.index.get(name) {
            Some(&slot) => slot,
            None => {
                scope.index.insert(name.to_string(), scope.slots.len());
                scope.slots.push((name.to_string(), vec![decl]));
                return true;
            }
        };

        let decls = &mut scope.slots[slot].1;
        if decls.contains(&decl) {
            return true;
        }
        let accepted = overloadable(decl) && decls.iter().all(|&d| overloadable(d));
        if !accepted {
            decls.clear();
        }
        decls.push(decl);
        accepted
    }

    /// `(name, decls)` pairs in first-declaration order
    pub fn iter(&self, id: ScopeId) -> impl Iterator<Item = (&str, &[DeclId])> {
        let scope = &self.scopes[id.0 as usize];
        scope.slots.iter().map(|(name, decls)| (name.as_str(), decls.as_slice()))
    }

    /// Scope chain from `id` outward, `id` first
    pub fn ancestors(&self, id: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(id), move |s| self.parent(*s))
    }
}
