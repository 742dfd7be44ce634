//! Unit registry - owns the definition table, contexts and memo tables
//!
//! The registry is the factory for units and quantities. Lookups take
//! `&self` and memoize through interior `RwLock` maps so one registry can be
//! shared across threads behind an `Arc`; mutation (`define`,
//! `load_definitions`, `add_context`) takes `&mut self` and clears every memo
//! table before returning.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use metron_core::{is_dimension_name, Result, UnitError, UnitsContainer};

use crate::context::{Context, ContextDefinition, ContextParams, ContextStack};
use crate::defaults::{default_contexts, DEFAULT_DEFINITIONS};
use crate::definition::{parse_definition_line, UnitDefinition};
use crate::parse::{parse_unit_expr, ParsedUnits};
use crate::quantity::{Quantity, QuantityRecord};
use crate::table::DefinitionTable;

/// Construction options for a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Load the built-in definitions
    pub load_defaults: bool,
    /// Register the built-in contexts (needs the built-in definitions)
    pub load_default_contexts: bool,
    /// Accept a trailing `s` on unit names ("meters")
    pub plural_suffixes: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        RegistryOptions {
            load_defaults: true,
            load_default_contexts: true,
            plural_suffixes: true,
        }
    }
}

impl RegistryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nothing preloaded
    pub fn empty() -> Self {
        RegistryOptions {
            load_defaults: false,
            load_default_contexts: false,
            plural_suffixes: true,
        }
    }

    pub fn with_defaults(mut self, enabled: bool) -> Self {
        self.load_defaults = enabled;
        self
    }

    pub fn with_default_contexts(mut self, enabled: bool) -> Self {
        self.load_default_contexts = enabled;
        self
    }

    pub fn with_plural_suffixes(mut self, enabled: bool) -> Self {
        self.plural_suffixes = enabled;
        self
    }
}

/// Memo tables. Only successful results are stored.
#[derive(Default)]
pub(crate) struct RegistryCache {
    pub(crate) base_units: RwLock<HashMap<String, (f64, UnitsContainer)>>,
    pub(crate) dimensionality: RwLock<HashMap<String, UnitsContainer>>,
    pub(crate) expressions: RwLock<HashMap<String, ParsedUnits>>,
    pub(crate) contexts: RwLock<HashMap<String, Arc<Context>>>,
}

impl RegistryCache {
    fn clear(&mut self) {
        clear_map(&mut self.base_units);
        clear_map(&mut self.dimensionality);
        clear_map(&mut self.expressions);
        clear_map(&mut self.contexts);
    }
}

pub(crate) fn cached<V: Clone>(lock: &RwLock<HashMap<String, V>>, key: &str) -> Option<V> {
    lock.read().ok()?.get(key).cloned()
}

pub(crate) fn remember<V>(lock: &RwLock<HashMap<String, V>>, key: &str, value: V) {
    // A poisoned lock only costs us the memoization
    if let Ok(mut map) = lock.write() {
        map.insert(key.to_string(), value);
    }
}

/// Most parsed expressions kept at once. Expressions are arbitrary caller
/// text, unlike the per-name tables, so this table starts over when full.
pub(crate) const MAX_CACHED_EXPRESSIONS: usize = 1024;

fn remember_expression(lock: &RwLock<HashMap<String, ParsedUnits>>, key: &str, value: ParsedUnits) {
    if let Ok(mut map) = lock.write() {
        if map.len() >= MAX_CACHED_EXPRESSIONS && !map.contains_key(key) {
            tracing::debug!(entries = map.len(), "expression cache full, clearing");
            map.clear();
        }
        map.insert(key.to_string(), value);
    }
}

fn clear_map<V>(lock: &mut RwLock<HashMap<String, V>>) {
    match lock.get_mut() {
        Ok(map) => map.clear(),
        Err(poisoned) => poisoned.into_inner().clear(),
    }
}

/// Registry of units, prefixes, dimensions and contexts
pub struct UnitRegistry {
    options: RegistryOptions,
    pub(crate) table: DefinitionTable,
    contexts: HashMap<String, ContextDefinition>,
    /// context name or alias -> canonical context name
    context_names: HashMap<String, String>,
    pub(crate) cache: RegistryCache,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::empty(RegistryOptions::empty())
    }

    fn empty(options: RegistryOptions) -> Self {
        UnitRegistry {
            table: DefinitionTable::new(options.plural_suffixes),
            options,
            contexts: HashMap::new(),
            context_names: HashMap::new(),
            cache: RegistryCache::default(),
        }
    }

    /// Registry with the built-in definitions and contexts
    pub fn with_defaults() -> Result<Self> {
        Self::with_options(RegistryOptions::default())
    }

    pub fn with_options(options: RegistryOptions) -> Result<Self> {
        let mut registry = Self::empty(options.clone());
        if options.load_defaults {
            registry.load_definitions(DEFAULT_DEFINITIONS)?;
            if options.load_default_contexts {
                for context in default_contexts() {
                    registry.add_context(context)?;
                }
            }
        }
        Ok(registry)
    }

    /// Registry holding only the definitions in `source`
    pub fn from_definitions(source: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.load_definitions(source)?;
        Ok(registry)
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn table(&self) -> &DefinitionTable {
        &self.table
    }

    // ========== Definitions ==========

    /// Load a block of definition lines. Either every line is applied or,
    /// on the first error, none are. Returns the number of definitions.
    pub fn load_definitions(&mut self, source: &str) -> Result<usize> {
        let mut staged = self.table.clone();
        let mut count = 0;
        for (idx, raw) in source.lines().enumerate() {
            if let Some(line) = parse_definition_line(raw, idx + 1)? {
                staged.apply(&line, idx + 1, raw)?;
                count += 1;
            }
        }
        self.table = staged;
        self.invalidate();
        tracing::debug!(
            definitions = count,
            units = self.table.unit_count(),
            prefixes = self.table.prefix_count(),
            dimensions = self.table.dimension_count(),
            "loaded definitions"
        );
        Ok(count)
    }

    /// Add or replace a single definition
    pub fn define(&mut self, line: &str) -> Result<()> {
        let parsed = parse_definition_line(line, 1)?
            .ok_or_else(|| UnitError::definition_syntax(1, line, "empty definition"))?;
        self.table.apply(&parsed, 1, line)?;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        self.cache.clear();
        tracing::debug!("cleared registry caches");
    }

    // ========== Names ==========

    pub fn contains(&self, name: &str) -> bool {
        self.table.resolve_unit(name).is_some()
    }

    /// Canonical container key for a unit name, symbol, alias or plural
    pub fn get_name(&self, name: &str) -> Result<String> {
        self.table.resolve_unit(name).ok_or_else(|| self.table.undefined(name))
    }

    /// Short symbol for a unit ("km" for "kilometers"); falls back to the
    /// canonical name when no symbol is defined
    pub fn symbol(&self, name: &str) -> Result<String> {
        let canonical = self.get_name(name)?;
        Ok(self.table.symbol_for(&canonical).unwrap_or(canonical))
    }

    /// Definition of a non-prefixed unit
    pub fn unit_definition(&self, name: &str) -> Result<&UnitDefinition> {
        let canonical = self.get_name(name)?;
        self.table.unit(&canonical).ok_or_else(|| UnitError::undefined_unit(name))
    }

    pub fn unit_names(&self) -> Vec<&str> {
        self.table.unit_names()
    }

    // ========== Parsing ==========

    /// Parse a unit expression into a leading numeric factor and a container
    /// of canonical unit names
    pub fn parse_expression(&self, expression: &str) -> Result<ParsedUnits> {
        if let Some(hit) = cached(&self.cache.expressions, expression) {
            return Ok(hit);
        }
        let expr = parse_unit_expr(expression)?;
        let parsed = expr.evaluate(&mut |name: &str| {
            if is_dimension_name(name) {
                return Err(UnitError::expression_syntax(
                    expression,
                    0,
                    format!("dimension '{}' used as a unit", name),
                ));
            }
            self.get_name(name).map(|canonical| ParsedUnits::unit(&canonical))
        })?;
        remember_expression(&self.cache.expressions, expression, parsed.clone());
        Ok(parsed)
    }

    /// Parse a unit expression that must not carry a numeric factor
    pub fn parse_units(&self, expression: &str) -> Result<UnitsContainer> {
        let parsed = self.parse_expression(expression)?;
        if parsed.factor != 1.0 {
            return Err(UnitError::expression_syntax(
                expression,
                0,
                "unit expression carries a numeric factor",
            ));
        }
        Ok(parsed.units)
    }

    // ========== Quantities ==========

    /// Quantity of `magnitude` in `units`; a numeric factor in the expression
    /// is folded into the magnitude
    pub fn quantity(&self, magnitude: f64, units: &str) -> Result<Quantity> {
        let parsed = self.parse_expression(units)?;
        Ok(Quantity::new(magnitude * parsed.factor, parsed.units))
    }

    /// Parse "2.5 * kilometer" into a quantity
    pub fn parse_quantity(&self, expression: &str) -> Result<Quantity> {
        let parsed = self.parse_expression(expression)?;
        Ok(Quantity::new(parsed.factor, parsed.units))
    }

    /// Rebuild a quantity from its serialized form
    pub fn quantity_from_record(&self, record: &QuantityRecord) -> Result<Quantity> {
        self.quantity(record.magnitude, &record.units)
    }

    // ========== Contexts ==========

    /// Register a context. Its rules are compiled immediately so unknown
    /// units are reported here rather than at first use.
    pub fn add_context(&mut self, definition: ContextDefinition) -> Result<()> {
        let compiled = Arc::new(self.compile_context(&definition)?);
        let name = definition.name().to_string();

        if let Some(previous) = self.contexts.remove(&name) {
            tracing::warn!(context = %name, "redefining context");
            // aliases since taken over by another context stay with it
            for alias in previous.aliases() {
                if self.context_names.get(alias) == Some(&name) {
                    self.context_names.remove(alias);
                }
            }
        }
        for alias in definition.aliases() {
            if let Some(owner) = self.context_names.get(alias).filter(|owner| **owner != name) {
                tracing::warn!(alias = %alias, previous = %owner, context = %name, "context alias reassigned");
            }
            self.context_names.insert(alias.clone(), name.clone());
        }
        if let Some(owner) = self.context_names.get(&name).filter(|owner| **owner != name) {
            tracing::warn!(context = %name, previous = %owner, "context name replaces an alias");
        }
        self.context_names.insert(name.clone(), name.clone());
        self.contexts.insert(name.clone(), definition);

        remember(&self.cache.contexts, &name, compiled);
        Ok(())
    }

    /// Compiled context by name or alias
    pub fn context(&self, name: &str) -> Result<Arc<Context>> {
        let canonical = self.context_names.get(name)
            .ok_or_else(|| UnitError::undefined_context(name))?;
        if let Some(hit) = cached(&self.cache.contexts, canonical) {
            return Ok(hit);
        }
        let definition = self.contexts.get(canonical)
            .ok_or_else(|| UnitError::undefined_context(name))?;
        let compiled = Arc::new(self.compile_context(definition)?);
        remember(&self.cache.contexts, canonical, compiled.clone());
        Ok(compiled)
    }

    /// Canonical names of registered contexts, sorted
    pub fn context_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.contexts.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// A new stack with the named contexts pushed in order, using their
    /// default parameters
    pub fn context_stack(&self, names: &[&str]) -> Result<ContextStack> {
        let mut stack = ContextStack::new();
        for name in names {
            stack.push(self.context(name)?, ContextParams::new());
        }
        Ok(stack)
    }

    fn compile_context(&self, definition: &ContextDefinition) -> Result<Context> {
        definition.compile(|expression| {
            let units = self.parse_units(expression)?;
            let dimension = self.dimensionality(&units)?;
            Ok((units, dimension))
        })
    }
}

impl fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitRegistry")
            .field("units", &self.table.unit_count())
            .field("prefixes", &self.table.prefix_count())
            .field("dimensions", &self.table.dimension_count())
            .field("contexts", &self.context_names())
            .finish()
    }
}
