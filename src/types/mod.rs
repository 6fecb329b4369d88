//! Type system: representation, canonicalization, equality and layout

mod display;
mod equality;
mod layout;
mod ty;

pub use equality::CompareMode;
pub use layout::FieldInfo;
pub use ty::*;
