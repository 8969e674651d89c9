//! The plugin registry.
//!
//! A registry maps backend names to factories plus metadata. The
//! process-wide registry is populated with the built-in backends on first
//! access and extended only by an explicit `load` step; nothing registers
//! as a side effect of an unrelated call. Tests construct private
//! registries instead of touching the global one.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{OnceLock, RwLock};

use crate::backend::{LinearBackend, QpBackend};
use crate::backends;
use crate::error::{Result, SolverError};
use crate::instance::{LinearSolver, QpSolver};
use crate::options::Options;
use crate::problem::{LinearLayout, QpLayout};

/// Factory for one capability shape.
pub enum PluginFactory {
    /// Produces linear-system backends.
    Linear(Box<dyn Fn() -> Box<dyn LinearBackend> + Send + Sync>),
    /// Produces QP backends.
    Qp(Box<dyn Fn() -> Box<dyn QpBackend> + Send + Sync>),
}

impl PluginFactory {
    fn capability(&self) -> &'static str {
        match self {
            PluginFactory::Linear(_) => "linear",
            PluginFactory::Qp(_) => "qp",
        }
    }
}

/// Descriptor a registration entry point fills in.
pub struct PluginDescriptor {
    /// Unique registry key.
    pub name: String,
    /// Plugin version, bumped on incompatible changes.
    pub version: u32,
    /// Documentation string shown by [`Registry::doc`].
    pub doc: String,
    /// Instance factory.
    pub factory: Option<PluginFactory>,
}

impl PluginDescriptor {
    fn empty() -> Self {
        Self {
            name: String::new(),
            version: 0,
            doc: String::new(),
            factory: None,
        }
    }
}

/// Registration entry point: fill the descriptor, return 0 on success.
///
/// Dynamically loaded plugin libraries export one of these under the
/// symbol `solvate_register_<name>`.
pub type RegisterFn = fn(&mut PluginDescriptor) -> i32;

/// Catalog of available backends.
#[derive(Default)]
pub struct Registry {
    plugins: BTreeMap<String, PluginDescriptor>,
    // Loaded plugin libraries must outlive the factories they registered.
    libraries: Vec<libloading::Library>,
}

impl Registry {
    /// Empty registry, for tests that register fakes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the built-in backends.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        for entry in [
            backends::dense_lu::register as RegisterFn,
            backends::dense_chol::register as RegisterFn,
            backends::ipqp::register as RegisterFn,
        ] {
            reg.register(entry)
                .expect("built-in backend registration cannot fail");
        }
        reg
    }

    /// Run a registration entry point and insert the resulting descriptor.
    pub fn register(&mut self, entry: RegisterFn) -> Result<()> {
        let mut desc = PluginDescriptor::empty();
        let status = entry(&mut desc);
        if status != 0 {
            return Err(SolverError::config(format!(
                "plugin registration entry point failed with status {}",
                status
            )));
        }
        self.insert(desc)
    }

    fn insert(&mut self, desc: PluginDescriptor) -> Result<()> {
        if desc.name.is_empty() {
            return Err(SolverError::config(
                "plugin descriptor is missing a name".to_string(),
            ));
        }
        if desc.factory.is_none() {
            return Err(SolverError::config(format!(
                "plugin '{}' registered without a factory",
                desc.name
            )));
        }
        // Two factories under one name is a configuration bug, not a
        // precedence question.
        if self.plugins.contains_key(&desc.name) {
            return Err(SolverError::config(format!(
                "backend '{}' is already registered",
                desc.name
            )));
        }
        log::debug!(
            "registered backend '{}' version {} ({})",
            desc.name,
            desc.version,
            desc.factory.as_ref().map(|f| f.capability()).unwrap_or("?"),
        );
        self.plugins.insert(desc.name.clone(), desc);
        Ok(())
    }

    /// Whether a backend is registered under `name`.
    pub fn has(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// All registered backend names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    /// Documentation for a backend: its doc string plus its option table.
    pub fn doc(&self, name: &str) -> Result<String> {
        let desc = self.lookup(name)?;
        let schema = match desc.factory.as_ref() {
            Some(PluginFactory::Linear(make)) => make().options(),
            Some(PluginFactory::Qp(make)) => make().options(),
            None => unreachable!("descriptor validated at insert"),
        };
        let mut out = format!(
            "{} (version {}, {} capability)\n{}\n",
            desc.name,
            desc.version,
            desc.factory.as_ref().map(|f| f.capability()).unwrap_or("?"),
            desc.doc
        );
        if !schema.entries().is_empty() {
            out.push_str("options:\n");
            out.push_str(&schema.describe());
        }
        Ok(out)
    }

    /// Instantiate a linear-system solver.
    ///
    /// Options are validated against the backend's schema before any
    /// workspace or backend-native allocation happens.
    pub fn create_linear(
        &self,
        name: &str,
        layout: LinearLayout,
        opts: &Options,
    ) -> Result<LinearSolver> {
        let desc = self.lookup(name)?;
        let make = match desc.factory.as_ref() {
            Some(PluginFactory::Linear(make)) => make,
            _ => {
                return Err(SolverError::config(format!(
                    "backend '{}' does not provide the linear-system capability",
                    name
                )))
            }
        };
        let backend = make();
        let resolved = backend.options().resolve(opts)?;
        LinearSolver::new(name.to_string(), layout, resolved, backend)
    }

    /// Instantiate a QP solver.
    pub fn create_qp(&self, name: &str, layout: QpLayout, opts: &Options) -> Result<QpSolver> {
        let desc = self.lookup(name)?;
        let make = match desc.factory.as_ref() {
            Some(PluginFactory::Qp(make)) => make,
            _ => {
                return Err(SolverError::config(format!(
                    "backend '{}' does not provide the QP capability",
                    name
                )))
            }
        };
        let backend = make();
        let resolved = backend.options().resolve(opts)?;
        QpSolver::new(name.to_string(), layout, resolved, backend)
    }

    /// Dynamically load a plugin library and run its registration entry
    /// point `solvate_register_<name>`.
    ///
    /// This is the one explicit load step; no other registry call loads
    /// code.
    pub fn load(&mut self, path: &Path, name: &str) -> Result<()> {
        let lib = unsafe { libloading::Library::new(path) }.map_err(|e| {
            SolverError::config(format!(
                "cannot load plugin library {}: {}",
                path.display(),
                e
            ))
        })?;
        let symbol = format!("solvate_register_{}\0", name);
        let entry: RegisterFn = unsafe {
            let sym: libloading::Symbol<'_, RegisterFn> =
                lib.get(symbol.as_bytes()).map_err(|e| {
                    SolverError::config(format!(
                        "plugin library {} does not export {}: {}",
                        path.display(),
                        symbol.trim_end_matches('\0'),
                        e
                    ))
                })?;
            *sym
        };
        // Keep the library alive for as long as its factories can be used.
        self.libraries.push(lib);
        log::info!("loaded plugin library {} for '{}'", path.display(), name);
        self.register(entry)
    }

    fn lookup(&self, name: &str) -> Result<&PluginDescriptor> {
        self.plugins.get(name).ok_or_else(|| {
            SolverError::config(format!(
                "unknown backend '{}' (registered: {})",
                name,
                self.names().join(", ")
            ))
        })
    }
}

static GLOBAL: OnceLock<RwLock<Registry>> = OnceLock::new();

/// The process-wide registry, created with the built-ins on first use.
///
/// Lookups may run concurrently; registration is expected to finish before
/// concurrent solves begin. A poisoned lock is treated as usable since the
/// registry holds no invariants a panicking reader could break.
pub fn global() -> &'static RwLock<Registry> {
    GLOBAL.get_or_init(|| RwLock::new(Registry::with_builtins()))
}
