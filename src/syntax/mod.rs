//! Syntax tree input
//!
//! The parser lives outside this crate; this module fixes the shape of what
//! it hands over, plus small constructors for building trees in code.

mod ast;
mod build;

pub use ast::*;
pub use build::UnitBuilder;
