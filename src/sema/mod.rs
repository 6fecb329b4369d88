//! Semantic analysis
//!
//! Name resolution, type checking and conversion insertion over parsed
//! units, producing declarations with resolved types and Sema IR bodies.

mod analyzer;
mod consteval;
mod context;
mod convert;
mod decl;
mod declare;
mod decls;
mod exprs;
pub mod ir;
mod lookup;
mod printer;
mod resolve_type;
mod scope;
mod stmts;

pub use analyzer::{analyze_module, Sema};
pub use consteval::{evaluate, ConstValue};
pub use context::{Context, DeclId, Module, ModuleId, SourceFile, PROGRAM_MODULE};
pub use convert::Score;
pub use decl::*;
pub use lookup::LookupResult;
pub use printer::ModuleDump;
pub use scope::{ScopeArena, ScopeId};
