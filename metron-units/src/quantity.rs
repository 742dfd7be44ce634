//! Quantity type - a magnitude paired with a unit expression

use std::cmp::Ordering;
use std::fmt;

use num_rational::Ratio;
use serde::{Deserialize, Serialize};
use metron_core::{
    exponent_from_f64, exponent_to_f64, format_exponent, Exponent, Result, UnitError,
    UnitsContainer, DEFAULT_MAX_DENOMINATOR,
};

use crate::context::{ContextParams, ContextStack};
use crate::registry::UnitRegistry;

/// A physical quantity: a magnitude with an associated unit expression.
///
/// Quantities are plain values. Operations that need unit knowledge
/// (conversion, addition, comparison) take the registry explicitly.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "QuantityRecord")]
pub struct Quantity {
    /// The numeric magnitude
    pub magnitude: f64,
    /// Canonical unit names and exponents
    pub units: UnitsContainer,
}

/// Serialized form of a quantity: the magnitude and the unit expression as
/// text. Rebuild it with `UnitRegistry::quantity_from_record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityRecord {
    pub magnitude: f64,
    pub units: String,
}

impl From<Quantity> for QuantityRecord {
    fn from(quantity: Quantity) -> Self {
        QuantityRecord {
            magnitude: quantity.magnitude,
            units: quantity.units.to_string(),
        }
    }
}

impl Quantity {
    pub fn new(magnitude: f64, units: UnitsContainer) -> Self {
        Quantity { magnitude, units }
    }

    /// Pure number
    pub fn dimensionless(magnitude: f64) -> Self {
        Quantity { magnitude, units: UnitsContainer::new() }
    }

    pub fn into_parts(self) -> (f64, UnitsContainer) {
        (self.magnitude, self.units)
    }

    pub fn to_record(&self) -> QuantityRecord {
        QuantityRecord::from(self.clone())
    }

    // ========== Inspection ==========

    pub fn dimensionality(&self, registry: &UnitRegistry) -> Result<UnitsContainer> {
        registry.dimensionality(&self.units)
    }

    pub fn is_dimensionless(&self, registry: &UnitRegistry) -> Result<bool> {
        registry.is_dimensionless(&self.units)
    }

    /// Check if two quantities have the same dimensionality
    pub fn is_compatible(&self, registry: &UnitRegistry, other: &Quantity) -> Result<bool> {
        registry.is_compatible(&self.units, &other.units)
    }

    // ========== Conversion ==========

    /// Convert to the units named by `target`
    pub fn to(&self, registry: &UnitRegistry, target: &str) -> Result<Quantity> {
        let units = registry.parse_units(target)?;
        self.to_units(registry, &units)
    }

    pub fn to_units(&self, registry: &UnitRegistry, target: &UnitsContainer) -> Result<Quantity> {
        let magnitude = registry.convert(self.magnitude, &self.units, target)?;
        Ok(Quantity::new(magnitude, target.clone()))
    }

    /// Convert with the contexts in `stack` active; `overrides` replace
    /// context parameters for this call only
    pub fn to_with(
        &self,
        registry: &UnitRegistry,
        stack: &ContextStack,
        target: &str,
        overrides: &ContextParams,
    ) -> Result<Quantity> {
        let units = registry.parse_units(target)?;
        let magnitude = registry.convert_with(self.magnitude, &self.units, &units, stack, overrides)?;
        Ok(Quantity::new(magnitude, units))
    }

    /// Express in base units
    pub fn to_base_units(&self, registry: &UnitRegistry) -> Result<Quantity> {
        let (factor, base) = registry.base_units(&self.units)?;
        Ok(Quantity::new(self.magnitude * factor, base))
    }

    // ========== Arithmetic ==========

    /// Add two quantities; `other` is converted to the units of `self`
    pub fn add(&self, registry: &UnitRegistry, other: &Quantity) -> Result<Quantity> {
        let converted = other.to_units(registry, &self.units)?;
        Ok(Quantity::new(self.magnitude + converted.magnitude, self.units.clone()))
    }

    /// Subtract two quantities; the result is in the units of `self`
    pub fn sub(&self, registry: &UnitRegistry, other: &Quantity) -> Result<Quantity> {
        let converted = other.to_units(registry, &self.units)?;
        Ok(Quantity::new(self.magnitude - converted.magnitude, self.units.clone()))
    }

    /// Multiply two quantities (unit exponents are summed, never converted).
    /// Any units combine; only an exponent overflow fails.
    pub fn mul(&self, other: &Quantity) -> Result<Quantity> {
        Ok(Quantity::new(self.magnitude * other.magnitude, self.units.multiply(&other.units)?))
    }

    /// Divide two quantities
    pub fn div(&self, other: &Quantity) -> Result<Quantity> {
        Ok(Quantity::new(self.magnitude / other.magnitude, self.units.divide(&other.units)?))
    }

    /// Multiply the magnitude by a plain number
    pub fn scale(&self, factor: f64) -> Quantity {
        Quantity::new(self.magnitude * factor, self.units.clone())
    }

    pub fn neg(&self) -> Quantity {
        self.scale(-1.0)
    }

    /// Raise to an integer power
    pub fn powi(&self, exponent: i32) -> Result<Quantity> {
        Ok(Quantity::new(
            self.magnitude.powi(exponent),
            self.units.power(Ratio::from_integer(i64::from(exponent)))?,
        ))
    }

    /// Raise to a rational power. A non-integer exponent must leave every
    /// unit exponent integral: `(4 m**2) ** (1/2)` is fine, `m ** (1/2)` is not.
    pub fn pow(&self, exponent: Exponent) -> Result<Quantity> {
        let units = self.units.power(exponent)?;
        if !exponent.is_integer() && !units.is_integral() {
            return Err(UnitError::invalid_exponent(
                self.units.clone(),
                format_exponent(&exponent),
                "result would have non-integer unit exponents",
            ));
        }
        let magnitude = match i32::try_from(*exponent.numer()) {
            Ok(n) if exponent.is_integer() => self.magnitude.powi(n),
            _ => self.magnitude.powf(exponent_to_f64(&exponent)),
        };
        Ok(Quantity::new(magnitude, units))
    }

    /// Raise to a float power. Dimensionless quantities accept any
    /// exponent; otherwise the exponent must be a small rational.
    pub fn powf(&self, exponent: f64) -> Result<Quantity> {
        if self.units.is_empty() {
            return Ok(Quantity::dimensionless(self.magnitude.powf(exponent)));
        }
        let exact = exponent_from_f64(exponent, DEFAULT_MAX_DENOMINATOR).ok_or_else(|| {
            UnitError::invalid_exponent(
                self.units.clone(),
                exponent.to_string(),
                format!("not a rational with denominator <= {}", DEFAULT_MAX_DENOMINATOR),
            )
        })?;
        self.pow(exact)
    }

    /// Square root (every unit exponent must be even)
    pub fn sqrt(&self) -> Result<Quantity> {
        self.pow(Ratio::new(1, 2))
    }

    // ========== Comparison ==========

    /// Order two compatible quantities; `None` when a magnitude is NaN
    pub fn compare(&self, registry: &UnitRegistry, other: &Quantity) -> Result<Option<Ordering>> {
        let converted = other.to_units(registry, &self.units)?;
        Ok(self.magnitude.partial_cmp(&converted.magnitude))
    }

    /// Physical equality: incompatible quantities are simply unequal
    pub fn equals(&self, registry: &UnitRegistry, other: &Quantity) -> Result<bool> {
        if !self.is_compatible(registry, other)? {
            return Ok(false);
        }
        Ok(self.compare(registry, other)? == Some(Ordering::Equal))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.units.is_empty() {
            write!(f, "{}", self.magnitude)
        } else {
            write!(f, "{} {}", self.magnitude, self.units)
        }
    }
}
