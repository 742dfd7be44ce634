//! Metron - Physical quantities with a text-defined unit registry
//!
//! ```ignore
//! use metron::prelude::*;
//!
//! let reg = metron::default_registry()?;
//! let distance = reg.quantity(3.0, "kilometer")?;
//! let meters = distance.to(&reg, "meter")?;
//! ```
//!
//! Besides re-exporting the unit crates, this crate holds two process-wide
//! registries:
//! - the default registry, built once from the built-in definitions
//! - the application registry, used to rebuild quantities from their
//!   serialized `(magnitude, units)` form. Falls back to the default one.

use std::sync::{Arc, OnceLock, RwLock};

pub use metron_core::{
    codes, exponent_from_f64, exponent_to_f64, format_exponent, is_dimension_name, Exponent, Result,
    UnitError, UnitsContainer, DEFAULT_MAX_DENOMINATOR,
};
pub use metron_units::{
    default_contexts, parse_definition_line, parse_unit_expr, ActiveContext, Context,
    ContextDefinition, ContextGuard, ContextParams, ContextRule, ContextStack, ConversionEdge,
    ConversionGraph, ConversionKind, DefinitionLine, DefinitionTable, Direction,
    DimensionDefinition, LazyRegistry, ParsedUnits, PrefixDefinition, Quantity, QuantityRecord,
    RegistryOptions, TransformFn, UnitDefinition, UnitExpr, UnitRegistry, BOLTZMANN_CONSTANT,
    DEFAULT_DEFINITIONS, PLANCK_CONSTANT, SPEED_OF_LIGHT,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use metron_core::prelude::*;
    pub use metron_units::{
        ContextDefinition, ContextParams, ContextStack, Quantity, QuantityRecord, RegistryOptions,
        UnitRegistry,
    };
}

static DEFAULT_REGISTRY: OnceLock<Result<Arc<UnitRegistry>>> = OnceLock::new();
static APPLICATION_REGISTRY: RwLock<Option<Arc<UnitRegistry>>> = RwLock::new(None);

/// Shared registry with the built-in definitions and contexts, built on
/// first call
pub fn default_registry() -> Result<Arc<UnitRegistry>> {
    DEFAULT_REGISTRY
        .get_or_init(|| {
            tracing::debug!("building default registry");
            UnitRegistry::with_defaults().map(Arc::new)
        })
        .clone()
}

/// Registry used to rebuild deserialized quantities
pub fn application_registry() -> Result<Arc<UnitRegistry>> {
    let current = match APPLICATION_REGISTRY.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    match current {
        Some(registry) => Ok(registry),
        None => default_registry(),
    }
}

/// Replace the application registry, returning the previous one if set
pub fn set_application_registry(registry: Arc<UnitRegistry>) -> Option<Arc<UnitRegistry>> {
    tracing::debug!(units = registry.table().unit_count(), "application registry replaced");
    let mut guard = match APPLICATION_REGISTRY.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.replace(registry)
}

/// Go back to the default registry for deserialization
pub fn reset_application_registry() -> Option<Arc<UnitRegistry>> {
    tracing::debug!("application registry reset to default");
    let mut guard = match APPLICATION_REGISTRY.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.take()
}

/// Rebuild a quantity from a magnitude and a unit expression using the
/// application registry
pub fn build_quantity(magnitude: f64, units: &str) -> Result<Quantity> {
    application_registry()?.quantity(magnitude, units)
}

/// Rebuild a quantity from its serialized record
pub fn build_quantity_from_record(record: &QuantityRecord) -> Result<Quantity> {
    application_registry()?.quantity_from_record(record)
}
