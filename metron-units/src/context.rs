//! Contexts - named bundles of extra conversion rules
//!
//! A `ContextDefinition` is what callers build: a name, aliases, default
//! parameters and rules written as unit expressions. The registry compiles it
//! into a `Context`, whose rules are keyed by dimensionality in a
//! `ConversionGraph`. Compiled contexts are shared through `Arc` and pushed
//! onto a `ContextStack` owned by whoever performs the conversions, so
//! concurrent callers never share mutable stack state.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use metron_core::{Result, UnitError, UnitsContainer};

use crate::graph::{ConversionEdge, ConversionGraph, ConversionKind, Direction, TransformFn};

/// Named numeric parameters passed to transform functions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextParams {
    /// Context the parameters belong to, used in error reports
    context: String,
    values: BTreeMap<String, f64>,
}

impl ContextParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add or replace a parameter
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Required parameter lookup for transform functions
    pub fn param(&self, name: &str) -> Result<f64> {
        self.get(name)
            .ok_or_else(|| UnitError::undefined_parameter(self.context.clone(), name))
    }

    /// Copy of `self` with every entry of `overrides` applied on top
    pub fn merged(&self, overrides: &ContextParams) -> ContextParams {
        let mut out = self.clone();
        for (name, value) in &overrides.values {
            out.values.insert(name.clone(), *value);
        }
        out
    }

    pub(crate) fn for_context(mut self, context: &str) -> Self {
        self.context = context.to_string();
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One rule of a context, between two unit expressions
#[derive(Debug, Clone)]
pub struct ContextRule {
    pub from: String,
    pub to: String,
    pub kind: ConversionKind,
}

/// Uncompiled context, as registered with a registry
#[derive(Debug, Clone)]
pub struct ContextDefinition {
    name: String,
    aliases: Vec<String>,
    defaults: ContextParams,
    rules: Vec<ContextRule>,
}

impl ContextDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        ContextDefinition {
            name: name.into(),
            aliases: Vec::new(),
            defaults: ContextParams::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Default value for a parameter read by the transforms
    pub fn with_default(mut self, name: impl Into<String>, value: f64) -> Self {
        self.defaults.set(name, value);
        self
    }

    /// Non-linear rule. `forward` maps magnitudes in `from` to magnitudes
    /// in `to`; `backward` is its inverse.
    pub fn with_transform<F, B>(mut self, from: &str, to: &str, forward: F, backward: B) -> Self
    where
        F: Fn(f64, &ContextParams) -> Result<f64> + Send + Sync + 'static,
        B: Fn(f64, &ContextParams) -> Result<f64> + Send + Sync + 'static,
    {
        let forward: TransformFn = Arc::new(forward);
        let backward: TransformFn = Arc::new(backward);
        self.rules.push(ContextRule {
            from: from.to_string(),
            to: to.to_string(),
            kind: ConversionKind::Transform { forward, backward },
        });
        self
    }

    /// Multiplicative rule: one `from` equals `factor` of `to`
    pub fn with_factor(mut self, from: &str, to: &str, factor: f64) -> Self {
        self.rules.push(ContextRule {
            from: from.to_string(),
            to: to.to_string(),
            kind: ConversionKind::Multiplicative(factor),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn defaults(&self) -> &ContextParams {
        &self.defaults
    }

    pub fn rules(&self) -> &[ContextRule] {
        &self.rules
    }

    /// Compile against a resolver that turns a unit expression into its
    /// container and dimensionality.
    pub fn compile<R>(&self, mut resolve: R) -> Result<Context>
    where
        R: FnMut(&str) -> Result<(UnitsContainer, UnitsContainer)>,
    {
        let mut graph = ConversionGraph::new();
        for rule in &self.rules {
            let (from_units, from_dimension) = resolve(&rule.from)?;
            let (to_units, to_dimension) = resolve(&rule.to)?;
            graph.add_edge(
                from_dimension,
                to_dimension,
                ConversionEdge { from_units, to_units, kind: rule.kind.clone() },
            );
        }
        Ok(Context {
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            defaults: self.defaults.clone().for_context(&self.name),
            graph,
        })
    }
}

/// Compiled, immutable context
#[derive(Debug, Clone)]
pub struct Context {
    name: String,
    aliases: Vec<String>,
    defaults: ContextParams,
    graph: ConversionGraph,
}

impl Context {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn defaults(&self) -> &ContextParams {
        &self.defaults
    }

    pub fn graph(&self) -> &ConversionGraph {
        &self.graph
    }
}

/// A context on the stack, with the parameters bound when it was pushed
#[derive(Debug, Clone)]
pub struct ActiveContext {
    context: Arc<Context>,
    params: ContextParams,
}

impl ActiveContext {
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn name(&self) -> &str {
        self.context.name()
    }

    /// Context defaults overlaid with the push-time parameters
    pub fn params(&self) -> &ContextParams {
        &self.params
    }
}

/// Ordered stack of active contexts; lookups scan from the top down
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    active: Vec<ActiveContext>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `context`. `params` override its defaults until it is popped.
    pub fn push(&mut self, context: Arc<Context>, params: ContextParams) {
        let params = context.defaults().merged(&params).for_context(context.name());
        tracing::debug!(context = context.name(), depth = self.active.len() + 1, "pushed context");
        self.active.push(ActiveContext { context, params });
    }

    /// Deactivate the most recently pushed context
    pub fn pop(&mut self) -> Result<Arc<Context>> {
        let top = self.active.pop().ok_or(UnitError::EmptyContextStack)?;
        tracing::debug!(context = top.name(), depth = self.active.len(), "popped context");
        Ok(top.context)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active contexts, most recently pushed first
    pub fn iter(&self) -> impl Iterator<Item = &ActiveContext> {
        self.active.iter().rev()
    }

    /// Names of active contexts, most recently pushed first
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|a| a.name()).collect()
    }

    /// Push `context` for the lifetime of the returned guard.
    pub fn scoped(&mut self, context: Arc<Context>, params: ContextParams) -> ContextGuard<'_> {
        let depth = self.active.len();
        self.push(context, params);
        ContextGuard { stack: self, depth }
    }

    /// Run `f` with `context` pushed. The context is popped on every exit
    /// path, including errors returned by `f` and panics unwinding through it.
    pub fn with_context<T, F>(&mut self, context: Arc<Context>, params: ContextParams, f: F) -> T
    where
        F: FnOnce(&mut ContextStack) -> T,
    {
        let mut guard = self.scoped(context, params);
        f(&mut *guard)
    }

    /// First edge, scanning from the top, that links the two dimensionalities
    pub fn find_edge(
        &self,
        source: &UnitsContainer,
        destination: &UnitsContainer,
    ) -> Option<(&ActiveContext, &ConversionEdge, Direction)> {
        self.iter().find_map(|active| {
            active.context.graph().find(source, destination)
                .map(|(edge, direction)| (active, edge, direction))
        })
    }
}

/// Restores the stack to its depth before `ContextStack::scoped` on drop
pub struct ContextGuard<'a> {
    stack: &'a mut ContextStack,
    depth: usize,
}

impl Deref for ContextGuard<'_> {
    type Target = ContextStack;

    fn deref(&self) -> &ContextStack {
        self.stack
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut ContextStack {
        self.stack
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        while self.stack.active.len() > self.depth {
            // Cannot fail: the loop condition guarantees a non-empty stack
            let _ = self.stack.pop();
        }
    }
}
