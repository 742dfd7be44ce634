//! Lazily built registry
//!
//! Parsing the built-in definitions is the expensive part of building a
//! registry. `LazyRegistry` stores the options and extra sources and builds
//! the registry the first time it is used. A failed build is stored too, so
//! every caller sees the same error.

use std::sync::OnceLock;

use metron_core::Result;

use crate::registry::{RegistryOptions, UnitRegistry};

pub struct LazyRegistry {
    options: RegistryOptions,
    sources: Vec<String>,
    cell: OnceLock<Result<UnitRegistry>>,
}

impl Default for LazyRegistry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

impl LazyRegistry {
    pub fn new(options: RegistryOptions) -> Self {
        LazyRegistry { options, sources: Vec::new(), cell: OnceLock::new() }
    }

    /// Extra definitions, loaded after the built-ins on first use
    pub fn with_definitions(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The registry, building it on first call
    pub fn get(&self) -> Result<&UnitRegistry> {
        self.cell
            .get_or_init(|| build(&self.options, &self.sources))
            .as_ref()
            .map_err(|e| e.clone())
    }

    /// Take the registry out, building it if it was never used
    pub fn into_inner(self) -> Result<UnitRegistry> {
        match self.cell.into_inner() {
            Some(built) => built,
            None => build(&self.options, &self.sources),
        }
    }
}

fn build(options: &RegistryOptions, sources: &[String]) -> Result<UnitRegistry> {
    tracing::debug!(sources = sources.len(), "building lazy registry");
    let mut registry = UnitRegistry::with_options(options.clone())?;
    for source in sources {
        registry.load_definitions(source)?;
    }
    Ok(registry)
}
