//! aethsema - AetherLang semantic checker
//!
//! Orders module headers and type-checks parsed syntax units.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use log::debug;

use aether_sema::modules::{self, LibrarySearch, ModuleHeader, ResolverConfig};
use aether_sema::sema::{analyze_module, Context, ModuleDump, ModuleId};
use aether_sema::syntax::SyntaxUnit;
use aether_sema::TargetInfo;

/// AetherLang semantic checker
#[derive(Parser, Debug)]
#[command(name = "aethsema")]
#[command(author = "Z1529")]
#[command(version = "0.1.0")]
#[command(about = "AetherLang semantic core - name resolution, type checking and module ordering")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the load order of modules described by header files
    Order {
        /// Module header files (.aemod)
        #[arg(required = true)]
        headers: Vec<PathBuf>,

        /// Library directory searched for missing dependencies
        #[arg(short = 'L', value_name = "DIR")]
        library_paths: Vec<PathBuf>,
    },
    /// Type-check JSON-encoded syntax units of the program module
    Check {
        /// Syntax units (.json)
        #[arg(required = true)]
        units: Vec<PathBuf>,

        /// Syntax units of dependency modules
        #[arg(long, value_name = "FILE", num_args = 1..)]
        deps: Vec<PathBuf>,

        /// Target description (JSON); defaults to x86_64
        #[arg(long, value_name = "FILE")]
        target: Option<PathBuf>,

        /// Library directory searched for missing dependencies
        #[arg(short = 'L', value_name = "DIR")]
        library_paths: Vec<PathBuf>,

        /// Emit diagnostics as JSON
        #[arg(long)]
        json: bool,

        /// Print the analyzed declarations
        #[arg(long)]
        dump: bool,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Order { headers, library_paths } => order(&headers, library_paths),
        Commands::Check { units, deps, target, library_paths, json, dump } => {
            check(&units, &deps, target.as_deref(), library_paths, json, dump)
        }
    };
    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{}", fatal_message(&e));
            process::exit(2);
        }
    }
}

/// Fatal error line, located when the error points at source
fn fatal_message(e: &anyhow::Error) -> String {
    match e.downcast_ref::<aether_sema::Error>().and_then(aether_sema::Error::span) {
        Some(span) => format!("Error at {}: {:#}", span, e),
        None => format!("Error: {:#}", e),
    }
}

fn order(headers: &[PathBuf], library_paths: Vec<PathBuf>) -> anyhow::Result<bool> {
    let roots = headers.iter().map(|path| ModuleHeader::read(path)).collect::<Result<Vec<_>, _>>()?;
    let config = ResolverConfig::new(library_paths);
    let resolved = modules::resolve(roots, &LibrarySearch::new(&config))?;
    for name in resolved.names() {
        println!("{}", name);
    }
    Ok(true)
}

fn read_unit(path: &Path) -> anyhow::Result<SyntaxUnit> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing syntax unit {}", path.display()))
}

/// Group units into modules by their declared module name
fn group_by_module(units: Vec<SyntaxUnit>) -> BTreeMap<String, Vec<SyntaxUnit>> {
    let mut modules: BTreeMap<String, Vec<SyntaxUnit>> = BTreeMap::new();
    for unit in units {
        let name = ModuleHeader::from_units(std::slice::from_ref(&unit)).name().to_string();
        modules.entry(name).or_default().push(unit);
    }
    modules
}

fn check(
    unit_paths: &[PathBuf],
    dep_paths: &[PathBuf],
    target: Option<&Path>,
    library_paths: Vec<PathBuf>,
    json: bool,
    dump: bool,
) -> anyhow::Result<bool> {
    let target = match target {
        Some(path) => TargetInfo::from_json_file(path)?,
        None => TargetInfo::default(),
    };
    let units = unit_paths.iter().map(|p| read_unit(p)).collect::<anyhow::Result<Vec<_>>>()?;
    let program = ModuleHeader::from_units(&units);
    let deps = dep_paths.iter().map(|p| read_unit(p)).collect::<anyhow::Result<Vec<_>>>()?;
    let mut sources = group_by_module(deps);
    let program_name = program.name().to_string();
    let mut roots = vec![program];
    roots.extend(sources.iter().filter(|(name, _)| **name != program_name).map(|(_, u)| ModuleHeader::from_units(u)));
    sources.insert(program_name, units);
    let config = ResolverConfig::new(library_paths);
    let resolved = modules::resolve(roots, &LibrarySearch::new(&config))?;
    debug!("analysis order: {}", resolved.names().join(", "));

    let mut cx = Context::new(target);
    let analyzed: Vec<ModuleId> = modules::materialize(&resolved, |header, deps: &[&ModuleId]| {
        let Some(units) = sources.get(header.name()) else {
            return Err(aether_sema::Error::ModuleError(format!("no syntax units for module '{}'", header.name())));
        };
        let deps: Vec<ModuleId> = deps.iter().map(|&&id| id).collect();
        analyze_module(&mut cx, units, &deps)
    })?;

    let diagnostics = cx.diag.take();
    if json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        for diagnostic in &diagnostics {
            eprintln!("{}", diagnostic);
        }
    }
    let failed = diagnostics.iter().any(|d| d.severity == aether_sema::Severity::Error);
    if dump {
        for &module in &analyzed {
            print!("{}", ModuleDump::new(&cx, module));
        }
    }
    Ok(!failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_sema::{Error, Span};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_todo_abort_is_located() {
        let e = anyhow::Error::from(Error::todo("enum declarations", Span::new(4, 9, 1)));
        assert_eq!(fatal_message(&e), "Error at 1:4..9: not yet supported: enum declarations");
    }

    #[test]
    fn test_resolution_error_has_no_location() {
        let e = anyhow::Error::from(Error::MissingModules { names: vec!["geo".to_string()] });
        assert!(fatal_message(&e).starts_with("Error: "));
    }
}
