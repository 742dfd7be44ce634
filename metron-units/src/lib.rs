//! Metron Units - Unit registry and conversion engine
//!
//! Provides a registry of units defined in a small text format, quantities
//! with dimensional checking, and context-scoped conversions between
//! dimensions (wavelength to frequency, temperature to energy).
//!
//! Pieces:
//! - Definition table and line parser (prefixes, base and derived units,
//!   derived dimensions)
//! - Unit-expression parser ("kilogram * meter / second ** 2")
//! - Dimensionality resolver and base-unit reduction, memoized per name
//! - Conversion graph and context stack
//! - `Quantity` arithmetic
//! - Built-in definitions and the `spectroscopy` and `boltzmann` contexts

mod parse;
mod definition;
mod table;
mod registry;
mod resolve;
mod convert;
mod graph;
mod context;
mod quantity;
mod lazy;
mod defaults;

pub use parse::{parse_unit_expr, ParsedUnits, UnitExpr};
pub use definition::{
    parse_definition_line, DefinitionLine, DimensionDefinition, PrefixDefinition, UnitDefinition,
};
pub use table::DefinitionTable;
pub use registry::{RegistryOptions, UnitRegistry};
pub use graph::{ConversionEdge, ConversionGraph, ConversionKind, Direction, TransformFn};
pub use context::{
    ActiveContext, Context, ContextDefinition, ContextGuard, ContextParams, ContextRule, ContextStack,
};
pub use quantity::{Quantity, QuantityRecord};
pub use lazy::LazyRegistry;
pub use defaults::{
    default_contexts, BOLTZMANN_CONSTANT, DEFAULT_DEFINITIONS, PLANCK_CONSTANT, SPEED_OF_LIGHT,
};
