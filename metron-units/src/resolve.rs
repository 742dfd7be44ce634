//! Dimensionality and base-unit resolution
//!
//! Both walks follow unit references down to base units and memoize the
//! result per canonical name. Definitions can only reference units that
//! already exist and redefinitions are cycle-checked, so the walks always
//! terminate.

use num_traits::One;
use metron_core::{exponent_to_f64, is_dimension_name, Exponent, Result, UnitError, UnitsContainer};

use crate::parse::{parse_unit_expr, ParsedUnits};
use crate::registry::{cached, remember, UnitRegistry};

impl UnitRegistry {
    /// Reduce a container to base units, returning the factor that converts
    /// a magnitude in `units` to a magnitude in the returned base units.
    pub fn base_units(&self, units: &UnitsContainer) -> Result<(f64, UnitsContainer)> {
        let mut factor = 1.0;
        let mut base = UnitsContainer::new();
        for (name, exponent) in units.iter() {
            let (unit_factor, unit_base) = self.base_units_of(name)?;
            factor *= unit_factor.powf(exponent_to_f64(exponent));
            base = base.multiply(&unit_base.power(*exponent)?)?;
        }
        Ok((factor, base))
    }

    /// Dimensional signature of a container of canonical unit names
    pub fn dimensionality(&self, units: &UnitsContainer) -> Result<UnitsContainer> {
        let mut signature = UnitsContainer::new();
        for (name, exponent) in units.iter() {
            let dimension = self.dimensionality_of_name(name)?;
            signature = signature.multiply(&dimension.power(*exponent)?)?;
        }
        Ok(signature)
    }

    /// Dimensional signature of an expression, which may mix unit names
    /// with dimension names: `dimensionality_of("[energy] / second")`
    pub fn dimensionality_of(&self, expression: &str) -> Result<UnitsContainer> {
        let expr = parse_unit_expr(expression)?;
        let parsed = expr.evaluate(&mut |name: &str| {
            let units = if is_dimension_name(name) {
                self.dimensionality_of_name(name)?
            } else {
                self.dimensionality_of_name(&self.get_name(name)?)?
            };
            Ok(ParsedUnits { factor: 1.0, units })
        })?;
        Ok(parsed.units)
    }

    /// True when both containers share a dimensional signature
    pub fn is_compatible(&self, a: &UnitsContainer, b: &UnitsContainer) -> Result<bool> {
        Ok(self.dimensionality(a)? == self.dimensionality(b)?)
    }

    pub fn is_dimensionless(&self, units: &UnitsContainer) -> Result<bool> {
        Ok(self.dimensionality(units)?.is_empty())
    }

    fn base_units_of(&self, key: &str) -> Result<(f64, UnitsContainer)> {
        if let Some(hit) = cached(&self.cache.base_units, key) {
            return Ok(hit);
        }

        let reduced = if let Some(unit) = self.table.unit(key) {
            if unit.is_base() {
                (1.0, UnitsContainer::single(&unit.name, Exponent::one()))
            } else {
                let (factor, base) = self.base_units(&unit.reference)?;
                (unit.scale * factor, base)
            }
        } else if let Some((prefix, unit)) = self.table.split_prefixed(key) {
            let (factor, base) = self.base_units_of(&unit.name)?;
            (prefix.factor * factor, base)
        } else {
            return Err(self.table.undefined(key));
        };

        remember(&self.cache.base_units, key, reduced.clone());
        Ok(reduced)
    }

    /// Signature of one canonical unit key or one dimension name
    fn dimensionality_of_name(&self, key: &str) -> Result<UnitsContainer> {
        if let Some(hit) = cached(&self.cache.dimensionality, key) {
            return Ok(hit);
        }

        let signature = if is_dimension_name(key) {
            let dimension = self.table.dimension(key)
                .ok_or_else(|| UnitError::undefined_unit(key))?;
            if dimension.is_base {
                UnitsContainer::single(key, Exponent::one())
            } else {
                let mut expanded = UnitsContainer::new();
                for (name, exponent) in dimension.reference.iter() {
                    expanded = expanded.multiply(&self.dimensionality_of_name(name)?.power(*exponent)?)?;
                }
                expanded
            }
        } else if let Some(unit) = self.table.unit(key) {
            match &unit.base_dimension {
                Some(dimension) => UnitsContainer::single(dimension, Exponent::one()),
                None => self.dimensionality(&unit.reference)?,
            }
        } else if let Some((_, unit)) = self.table.split_prefixed(key) {
            self.dimensionality_of_name(&unit.name)?
        } else {
            return Err(self.table.undefined(key));
        };

        remember(&self.cache.dimensionality, key, signature.clone());
        Ok(signature)
    }
}
