//! AetherLang semantic core
//!
//! Turns parsed compilation units into name-resolved, type-checked Sema IR
//! and orders separately compiled modules by their dependencies.

pub mod modules;
pub mod sema;
pub mod syntax;
pub mod target;
pub mod types;
pub mod utils;

pub use sema::{analyze_module, Context};
pub use target::TargetInfo;
pub use utils::{Diagnostic, Diagnostics, Error, Result, Severity, Span};
