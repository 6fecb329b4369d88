//! Utility module

mod diagnostics;
mod error;
mod span;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{Error, Result};
pub use span::Span;
