//! Module dependency resolution
//!
//! Separately compiled modules are described by small header files naming
//! the module and its dependencies. The resolver finds every header a build
//! needs, orders the modules so each comes after its dependencies, and
//! materializes them in that order.

mod header;
mod resolver;

pub use header::{ModuleHeader, ResolverConfig, DEFAULT_HEADER_EXTENSION};
pub use resolver::{materialize, resolve, HeaderSource, LibrarySearch, Resolved};
