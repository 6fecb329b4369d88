//! Module headers and resolver configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sema::PROGRAM_MODULE;
use crate::syntax::{Item, SyntaxUnit};
use crate::utils::{Error, Result};

/// Extension of header files searched for in library paths
pub const DEFAULT_HEADER_EXTENSION: &str = "aemod";

/// What the resolver reads from a compiled module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleHeader {
    /// `None` for the program module
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub dependency_names: Vec<String>,
}

impl ModuleHeader {
    pub fn new(name: Option<&str>, dependencies: &[&str]) -> Self {
        Self {
            module_name: name.map(str::to_string),
            dependency_names: dependencies.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Header of the module formed by `units`: the first declared module
    /// name and every plainly imported module, in order of appearance
    pub fn from_units(units: &[SyntaxUnit]) -> Self {
        let mut module_name = None;
        let mut dependency_names: Vec<String> = Vec::new();
        for item in units.iter().flat_map(|u| &u.items) {
            match item {
                Item::Module(decl) if module_name.is_none() => module_name = Some(decl.name.joined()),
                Item::Import(import) => {
                    let name = import.path.joined();
                    if !dependency_names.contains(&name) {
                        dependency_names.push(name);
                    }
                }
                _ => {}
            }
        }
        Self { module_name, dependency_names }
    }

    pub fn name(&self) -> &str {
        self.module_name.as_deref().unwrap_or(PROGRAM_MODULE)
    }

    pub fn is_program(&self) -> bool {
        self.module_name.is_none()
    }

    pub fn from_json(text: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| Error::Header { path: path.to_path_buf(), source })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&text, path)
    }
}

/// Where to look for dependency headers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Searched in order; the first hit wins
    pub library_paths: Vec<PathBuf>,
    pub extension: String,
}

impl ResolverConfig {
    pub fn new(library_paths: Vec<PathBuf>) -> Self {
        Self { library_paths, extension: DEFAULT_HEADER_EXTENSION.to_string() }
    }

    /// Add a search path unless it is already present
    pub fn add_library_path(&mut self, path: PathBuf) {
        if !self.library_paths.contains(&path) {
            self.library_paths.push(path);
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::UnitBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_header() {
        let header = ModuleHeader::from_json(r#"{"module_name":"geo","dependency_names":["math"]}"#, Path::new("geo.aemod"))
            .unwrap();
        assert_eq!(header, ModuleHeader::new(Some("geo"), &["math"]));
        assert!(!header.is_program());
    }

    #[test]
    fn test_missing_name_is_program() {
        let header = ModuleHeader::from_json("{}", Path::new("main.aemod")).unwrap();
        assert!(header.is_program());
        assert_eq!(header.name(), PROGRAM_MODULE);
        assert!(header.dependency_names.is_empty());
    }

    #[test]
    fn test_header_from_units() {
        let a = UnitBuilder::new(0, "a.ae").module("geo").import("math", None, vec![]).build();
        let b = UnitBuilder::new(1, "b.ae").import("io", None, vec![]).import("math", None, vec![]).build();
        let header = ModuleHeader::from_units(&[a, b]);
        assert_eq!(header, ModuleHeader::new(Some("geo"), &["math", "io"]));
    }

    #[test]
    fn test_malformed_header() {
        let err = ModuleHeader::from_json("{\"module_name\": 3}", Path::new("bad.aemod")).unwrap_err();
        assert!(matches!(err, Error::Header { .. }));
    }

    #[test]
    fn test_library_paths_deduplicated() {
        let mut config = ResolverConfig::default();
        config.add_library_path(PathBuf::from("lib"));
        config.add_library_path(PathBuf::from("lib"));
        assert_eq!(config.library_paths, vec![PathBuf::from("lib")]);
        assert_eq!(config.extension, "aemod");
    }
}
