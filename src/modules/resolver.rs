//! Dependency expansion, ordering and materialization

use std::collections::HashMap;
use std::path::PathBuf;

use log::{debug, trace, warn};

use crate::modules::header::{ModuleHeader, ResolverConfig};
use crate::utils::{Error, Result};

/// Finds the header of a module by name
pub trait HeaderSource {
    fn find(&self, name: &str) -> Result<Option<ModuleHeader>>;
}

/// Looks for `<name>.<ext>` in the configured library paths
pub struct LibrarySearch<'a> {
    config: &'a ResolverConfig,
}

impl<'a> LibrarySearch<'a> {
    pub fn new(config: &'a ResolverConfig) -> Self {
        Self { config }
    }

    pub fn find_module_file(&self, name: &str) -> Option<PathBuf> {
        self.config
            .library_paths
            .iter()
            .map(|dir| dir.join(format!("{}.{}", name, self.config.extension)))
            .find(|path| path.is_file())
    }
}

impl HeaderSource for LibrarySearch<'_> {
    fn find(&self, name: &str) -> Result<Option<ModuleHeader>> {
        match self.find_module_file(name) {
            Some(path) => {
                trace!("found '{}' at {}", name, path.display());
                ModuleHeader::read(&path).map(Some)
            }
            None => Ok(None),
        }
    }
}

impl HeaderSource for HashMap<String, ModuleHeader> {
    fn find(&self, name: &str) -> Result<Option<ModuleHeader>> {
        Ok(self.get(name).cloned())
    }
}

/// Headers in dependency order: every module after all of its dependencies
#[derive(Debug, Clone)]
pub struct Resolved {
    pub order: Vec<ModuleHeader>,
}

impl Resolved {
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(ModuleHeader::name).collect()
    }
}

/// Expand `roots` with every dependency reachable from them, then order the
/// result.
pub fn resolve(roots: Vec<ModuleHeader>, source: &dyn HeaderSource) -> Result<Resolved> {
    let headers = expand(roots, source)?;
    check_program_dependencies(&headers)?;
    let graph = DependencyGraph::build(&headers);
    let order = graph.topological_order()?;
    debug!("module order: {}", order.join(", "));

    let mut by_name: HashMap<String, ModuleHeader> =
        headers.into_iter().map(|h| (h.name().to_string(), h)).collect();
    let order = order.iter().filter_map(|name| by_name.remove(name.as_str())).collect();
    Ok(Resolved { order })
}

/// Load headers until every named dependency is present. Each round must
/// find everything still missing, so the loop always makes progress.
fn expand(roots: Vec<ModuleHeader>, source: &dyn HeaderSource) -> Result<Vec<ModuleHeader>> {
    let mut loaded: Vec<ModuleHeader> = Vec::new();
    for header in roots {
        if loaded.iter().any(|h| h.name() == header.name()) {
            warn!("module '{}' given more than once, keeping the first header", header.name());
            continue;
        }
        loaded.push(header);
    }

    loop {
        let mut wanted: Vec<String> = Vec::new();
        for header in &loaded {
            for dep in &header.dependency_names {
                if !loaded.iter().any(|h| h.name() == dep) && !wanted.contains(dep) {
                    wanted.push(dep.clone());
                }
            }
        }
        if wanted.is_empty() {
            return Ok(loaded);
        }
        debug!("searching for {}", wanted.join(", "));

        let mut missing = Vec::new();
        for name in wanted {
            match source.find(&name)? {
                Some(header) if header.name() == name => loaded.push(header),
                Some(header) => {
                    return Err(Error::ModuleError(format!(
                        "header found for '{}' declares module '{}'",
                        name,
                        header.name()
                    )));
                }
                None => missing.push(name),
            }
        }
        if !missing.is_empty() {
            return Err(Error::MissingModules { names: missing });
        }
    }
}

fn check_program_dependencies(headers: &[ModuleHeader]) -> Result<()> {
    for header in headers {
        for dep in &header.dependency_names {
            if headers.iter().any(|h| h.name() == dep && h.is_program()) {
                return Err(Error::ProgramModuleDependedUpon { dependent: header.name().to_string() });
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

/// Module names and their dependency edges, in first-mention order
struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    fn build(headers: &[ModuleHeader]) -> Self {
        let mut graph = Self { names: Vec::new(), index: HashMap::new(), edges: Vec::new() };
        for header in headers {
            let from = graph.node(header.name());
            for dep in &header.dependency_names {
                let to = graph.node(dep);
                if !graph.edges[from].contains(&to) {
                    graph.edges[from].push(to);
                }
            }
        }
        graph
    }

    fn node(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), i);
        self.edges.push(Vec::new());
        i
    }

    /// Depth-first post-order; a back edge is a cycle
    fn topological_order(&self) -> Result<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.names.len()];
        let mut order = Vec::with_capacity(self.names.len());
        for start in 0..self.names.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // (node, next edge to follow)
            let mut stack = vec![(start, 0)];
            marks[start] = Mark::Active;
            while let Some(top) = stack.last_mut() {
                let node = top.0;
                match self.edges[node].get(top.1).copied() {
                    Some(dep) => {
                        top.1 += 1;
                        match marks[dep] {
                            Mark::Unvisited => {
                                marks[dep] = Mark::Active;
                                stack.push((dep, 0));
                            }
                            Mark::Active => {
                                return Err(Error::DependencyCycle {
                                    from: self.names[node].clone(),
                                    to: self.names[dep].clone(),
                                });
                            }
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[node] = Mark::Done;
                        order.push(self.names[node].clone());
                        stack.pop();
                    }
                }
            }
        }
        Ok(order)
    }
}

/// Build one object per module in `resolved` order. `load` receives the
/// header and the objects of its direct dependencies, all built already.
pub fn materialize<T>(
    resolved: &Resolved,
    mut load: impl FnMut(&ModuleHeader, &[&T]) -> Result<T>,
) -> Result<Vec<T>> {
    let mut built: Vec<T> = Vec::with_capacity(resolved.order.len());
    let mut index: HashMap<&str, usize> = HashMap::new();
    for header in &resolved.order {
        let mut deps = Vec::with_capacity(header.dependency_names.len());
        for dep in &header.dependency_names {
            match index.get(dep.as_str()) {
                Some(&i) => deps.push(&built[i]),
                None => {
                    return Err(Error::ModuleError(format!(
                        "'{}' was ordered before its dependency '{}'",
                        header.name(),
                        dep
                    )))
                }
            }
        }
        let object = load(header, &deps)?;
        index.insert(header.name(), built.len());
        built.push(object);
    }
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn library(headers: &[ModuleHeader]) -> HashMap<String, ModuleHeader> {
        headers.iter().map(|h| (h.name().to_string(), h.clone())).collect()
    }

    #[test]
    fn test_program_after_its_dependencies() {
        let lib = library(&[ModuleHeader::new(Some("A"), &[]), ModuleHeader::new(Some("B"), &["A"])]);
        let program = ModuleHeader::new(None, &["B"]);
        let resolved = resolve(vec![program], &lib).unwrap();
        assert_eq!(resolved.names(), vec!["A", "B", "program"]);
    }

    #[test]
    fn test_cycle_is_reported_without_materializing() {
        let roots = vec![ModuleHeader::new(Some("X"), &["Y"]), ModuleHeader::new(Some("Y"), &["X"])];
        let err = resolve(roots, &library(&[])).unwrap_err();
        let Error::DependencyCycle { from, to } = err else { panic!("{}", err) };
        let mut pair = vec![from, to];
        pair.sort();
        assert_eq!(pair, vec!["X".to_string(), "Y".to_string()]);
    }

    #[test]
    fn test_missing_modules_are_listed() {
        let lib = library(&[ModuleHeader::new(Some("A"), &["gone"])]);
        let roots = vec![ModuleHeader::new(None, &["A", "absent"])];
        let err = resolve(roots, &lib).unwrap_err();
        let Error::MissingModules { names } = err else { panic!("{}", err) };
        assert_eq!(names, vec!["absent".to_string()]);
    }

    #[test]
    fn test_program_cannot_be_a_dependency() {
        let roots = vec![ModuleHeader::new(None, &[]), ModuleHeader::new(Some("lib"), &["program"])];
        let err = resolve(roots, &library(&[])).unwrap_err();
        assert!(matches!(err, Error::ProgramModuleDependedUpon { dependent } if dependent == "lib"));
    }

    #[test]
    fn test_diamond_orders_shared_dependency_once() {
        let lib = library(&[
            ModuleHeader::new(Some("base"), &[]),
            ModuleHeader::new(Some("left"), &["base"]),
            ModuleHeader::new(Some("right"), &["base"]),
        ]);
        let resolved = resolve(vec![ModuleHeader::new(None, &["left", "right"])], &lib).unwrap();
        assert_eq!(resolved.names(), vec!["base", "left", "right", "program"]);
    }

    #[test]
    fn test_materialize_sees_direct_dependencies() {
        let lib = library(&[ModuleHeader::new(Some("A"), &[]), ModuleHeader::new(Some("B"), &["A"])]);
        let resolved = resolve(vec![ModuleHeader::new(None, &["B", "A"])], &lib).unwrap();
        let built = materialize(&resolved, |header, deps: &[&String]| {
            let deps: Vec<&str> = deps.iter().map(|d| d.as_str()).collect();
            Ok(format!("{}({})", header.name(), deps.join(",")))
        })
        .unwrap();
        assert_eq!(built, vec!["A()".to_string(), "B(A())".to_string(), "program(B(A()),A())".to_string()]);
    }

    #[test]
    fn test_library_search_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let header = ModuleHeader::new(Some("math"), &[]);
        std::fs::write(dir.path().join("math.aemod"), serde_json::to_string(&header).unwrap()).unwrap();

        let mut config = ResolverConfig::default();
        config.add_library_path(dir.path().join("missing"));
        config.add_library_path(dir.path().to_path_buf());
        let search = LibrarySearch::new(&config);
        assert_eq!(search.find_module_file("math"), Some(dir.path().join("math.aemod")));
        assert!(search.find_module_file("geo").is_none());

        let resolved = resolve(vec![ModuleHeader::new(None, &["math"])], &search).unwrap();
        assert_eq!(resolved.names(), vec!["math", "program"]);
    }
}
