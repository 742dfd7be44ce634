//! Conversion engine
//!
//! 1. Equal dimensionality: multiply by the ratio of base-unit factors.
//! 2. Different dimensionality: take the first context edge, scanning the
//!    stack from the top, that links the two signatures (in either
//!    direction). Convert into the edge's input units, apply the edge, then
//!    convert out of its output units.
//! 3. Otherwise fail with a dimensionality error.
//!
//! Context edges are used at most once per conversion.

use metron_core::{Result, UnitError, UnitsContainer};

use crate::context::{ContextParams, ContextStack};
use crate::registry::UnitRegistry;

impl UnitRegistry {
    /// Convert `value` between units of the same dimensionality
    pub fn convert(&self, value: f64, source: &UnitsContainer, destination: &UnitsContainer) -> Result<f64> {
        self.convert_with(value, source, destination, &ContextStack::new(), &ContextParams::new())
    }

    /// Convert `value`, consulting the active contexts in `stack`.
    /// `overrides` replace context parameters for this call only.
    pub fn convert_with(
        &self,
        value: f64,
        source: &UnitsContainer,
        destination: &UnitsContainer,
        stack: &ContextStack,
        overrides: &ContextParams,
    ) -> Result<f64> {
        if source == destination {
            return Ok(value);
        }

        let source_dimension = self.dimensionality(source)?;
        let destination_dimension = self.dimensionality(destination)?;

        if source_dimension == destination_dimension {
            let factor = self.factor_between(source, destination)?;
            tracing::trace!(%source, %destination, factor, "multiplicative conversion");
            return Ok(value * factor);
        }

        if let Some((active, edge, direction)) = stack.find_edge(&source_dimension, &destination_dimension) {
            let (input, output) = edge.endpoints(direction);
            let staged = value * self.factor_between(source, input)?;
            let params = active.params().merged(overrides);
            let transformed = edge.apply(staged, direction, &params)?;
            tracing::trace!(context = active.name(), %source, %destination, ?direction, "context conversion");
            return Ok(transformed * self.factor_between(output, destination)?);
        }

        Err(UnitError::dimensionality(
            source.clone(),
            destination.clone(),
            source_dimension,
            destination_dimension,
        ))
    }

    /// Factor such that `value * factor` converts from `source` to
    /// `destination`; both must share a dimensionality
    pub fn conversion_factor(&self, source: &UnitsContainer, destination: &UnitsContainer) -> Result<f64> {
        let source_dimension = self.dimensionality(source)?;
        let destination_dimension = self.dimensionality(destination)?;
        if source_dimension != destination_dimension {
            return Err(UnitError::dimensionality(
                source.clone(),
                destination.clone(),
                source_dimension,
                destination_dimension,
            ));
        }
        self.factor_between(source, destination)
    }

    fn factor_between(&self, source: &UnitsContainer, destination: &UnitsContainer) -> Result<f64> {
        let (source_factor, _) = self.base_units(source)?;
        let (destination_factor, _) = self.base_units(destination)?;
        Ok(source_factor / destination_factor)
    }
}
