//! Name resolution

use log::trace;

use crate::sema::analyzer::Sema;
use crate::sema::context::{Context, DeclId};
use crate::sema::decl::DeclKind;
use crate::sema::scope::ScopeId;
use crate::syntax::Path;
use crate::utils::Result;

/// Outcome of a name lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Success(DeclId),
    NotFound,
    /// Several functions; the call site picks one
    Overloads(Vec<DeclId>),
    /// Several non-functions
    Ambiguous(Vec<DeclId>),
    /// A path segment named something without members
    NonScopeInPath(DeclId),
}

impl Context {
    /// Look `name` up starting at `scope`.
    ///
    /// Stops at the first scope with a hit. When every hit there is a
    /// function, outer scopes keep contributing functions to the overload
    /// set. With `this_scope_only` nothing outside `scope` is searched.
    pub fn lookup_unqualified(&self, scope: ScopeId, name: &str, this_scope_only: bool) -> LookupResult {
        let mut functions: Vec<DeclId> = Vec::new();
        for current in self.scopes.ancestors(scope) {
            let hits = self.scopes.lookup(current, name);
            if !hits.is_empty() {
                if hits.iter().all(|&d| self.is_overloadable(d)) {
                    for &hit in hits {
                        if !functions.contains(&hit) {
                            functions.push(hit);
                        }
                    }
                } else if functions.is_empty() {
                    return match hits {
                        [single] => LookupResult::Success(*single),
                        _ => LookupResult::Ambiguous(hits.to_vec()),
                    };
                } else {
                    // a non-function hides everything further out
                    break;
                }
            }
            if this_scope_only {
                break;
            }
        }
        match functions.as_slice() {
            [] => LookupResult::NotFound,
            [single] => LookupResult::Success(*single),
            _ => LookupResult::Overloads(functions),
        }
    }
}

impl<'a> Sema<'a> {
    /// Resolve a possibly qualified name from the current scope.
    ///
    /// The first segment is looked up normally, falling back to the file's
    /// imports. Every further segment must name a single struct, enum or
    /// module, and the last one is looked up in that scope alone.
    pub(crate) fn lookup_path(&mut self, path: &Path) -> Result<LookupResult> {
        let Some((first, rest)) = path.segments.split_first() else {
            self.cx.diag.ice("empty path");
        };
        let start = self.current_scope();
        let mut result = self.cx.lookup_unqualified(start, &first.name, false);
        if rest.is_empty() {
            trace!("lookup '{}' -> {:?}", first.name, result);
            return Ok(result);
        }

        let mut scope = match result {
            LookupResult::Success(decl) => match self.member_scope(decl)? {
                Some(scope) => scope,
                None => return Ok(LookupResult::NonScopeInPath(decl)),
            },
            LookupResult::NotFound => match self.imports[self.current_file].get(&first.name) {
                Some(&scope) => scope,
                None => return Ok(LookupResult::NotFound),
            },
            other => return Ok(other),
        };

        for (i, segment) in rest.iter().enumerate() {
            result = self.cx.lookup_unqualified(scope, &segment.name, true);
            if i + 1 == rest.len() {
                break;
            }
            scope = match result {
                LookupResult::Success(decl) => match self.member_scope(decl)? {
                    Some(scope) => scope,
                    None => return Ok(LookupResult::NonScopeInPath(decl)),
                },
                other => return Ok(other),
            };
        }
        trace!("lookup '{}' -> {:?}", path.joined(), result);
        Ok(result)
    }

    /// Scope a path continues into, completing a struct first so its
    /// variants are declared
    fn member_scope(&mut self, decl: DeclId) -> Result<Option<ScopeId>> {
        if matches!(self.cx.decl(decl).kind, DeclKind::Struct(_)) && !self.is_in_progress(decl) {
            self.ensure_complete(decl)?;
        }
        Ok(self.cx.decl(decl).kind.member_scope())
    }

    /// Reduce a lookup to a single declaration, reporting why it is not one
    pub(crate) fn single_decl(&mut self, result: LookupResult, path: &Path) -> Option<DeclId> {
        let name = path.joined();
        match result {
            LookupResult::Success(decl) => return Some(decl),
            LookupResult::NotFound => {
                self.cx.diag.error(path.span, format!("unknown name '{}'", name));
            }
            LookupResult::Overloads(_) => {
                self.cx.diag.error(path.span, format!("'{}' is overloaded and cannot be used here", name));
            }
            LookupResult::Ambiguous(candidates) => {
                self.cx.diag.error(path.span, format!("'{}' is ambiguous", name));
                for candidate in candidates {
                    let span = self.cx.decl_span(candidate);
                    self.cx.diag.note(span, "candidate declared here");
                }
            }
            LookupResult::NonScopeInPath(decl) => {
                let what = self.cx.decl(decl).kind.describe();
                let message =
                    format!("'{}' is a {}, not a struct, enum or module", self.cx.decl(decl).name, what);
                self.cx.diag.error(path.span, message);
            }
        }
        None
    }
}
