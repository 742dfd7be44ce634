//! Conversion graph between dimensionalities
//!
//! Nodes are dimensionality signatures (`UnitsContainer`s over dimension
//! names); edges carry the conversion to apply. Only forward edges are
//! stored. A lookup in the opposite direction finds the forward edge and
//! applies it backwards.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use metron_core::{Result, UnitsContainer};

use crate::context::ContextParams;

/// Non-linear conversion function, applied to a magnitude with the active
/// context parameters
pub type TransformFn = Arc<dyn Fn(f64, &ContextParams) -> Result<f64> + Send + Sync>;

/// Which way an edge is traversed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// How a magnitude moves along an edge
#[derive(Clone)]
pub enum ConversionKind {
    /// Forward multiplies by the factor, backward divides
    Multiplicative(f64),
    Transform {
        forward: TransformFn,
        backward: TransformFn,
    },
}

impl ConversionKind {
    pub fn apply(&self, value: f64, direction: Direction, params: &ContextParams) -> Result<f64> {
        match (self, direction) {
            (ConversionKind::Multiplicative(factor), Direction::Forward) => Ok(value * factor),
            (ConversionKind::Multiplicative(factor), Direction::Backward) => Ok(value / factor),
            (ConversionKind::Transform { forward, .. }, Direction::Forward) => forward(value, params),
            (ConversionKind::Transform { backward, .. }, Direction::Backward) => backward(value, params),
        }
    }
}

impl fmt::Debug for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionKind::Multiplicative(factor) => f.debug_tuple("Multiplicative").field(factor).finish(),
            ConversionKind::Transform { .. } => f.write_str("Transform"),
        }
    }
}

/// Edge between two dimensionalities, anchored on concrete units.
///
/// The conversion function expects magnitudes in `from_units` and returns
/// magnitudes in `to_units`.
#[derive(Debug, Clone)]
pub struct ConversionEdge {
    pub from_units: UnitsContainer,
    pub to_units: UnitsContainer,
    pub kind: ConversionKind,
}

impl ConversionEdge {
    /// Units a magnitude must be in before, and is in after, traversal
    pub fn endpoints(&self, direction: Direction) -> (&UnitsContainer, &UnitsContainer) {
        match direction {
            Direction::Forward => (&self.from_units, &self.to_units),
            Direction::Backward => (&self.to_units, &self.from_units),
        }
    }

    pub fn apply(&self, value: f64, direction: Direction, params: &ContextParams) -> Result<f64> {
        self.kind.apply(value, direction, params)
    }
}

/// Directed graph keyed by (source dimensionality, destination dimensionality)
#[derive(Debug, Clone, Default)]
pub struct ConversionGraph {
    edges: HashMap<(UnitsContainer, UnitsContainer), ConversionEdge>,
}

impl ConversionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the edge between two dimensionalities
    pub fn add_edge(&mut self, source: UnitsContainer, destination: UnitsContainer, edge: ConversionEdge) {
        self.edges.insert((source, destination), edge);
    }

    /// Edge connecting `source` to `destination`, preferring a forward edge
    pub fn find(&self, source: &UnitsContainer, destination: &UnitsContainer) -> Option<(&ConversionEdge, Direction)> {
        let forward = (source.clone(), destination.clone());
        if let Some(edge) = self.edges.get(&forward) {
            return Some((edge, Direction::Forward));
        }
        let backward = (destination.clone(), source.clone());
        self.edges.get(&backward).map(|edge| (edge, Direction::Backward))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Every dimensionality touched by an edge
    pub fn nodes(&self) -> HashSet<&UnitsContainer> {
        self.edges.keys().flat_map(|(a, b)| [a, b]).collect()
    }
}
