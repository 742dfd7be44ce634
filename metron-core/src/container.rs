//! Normalized unit expressions
//!
//! A `UnitsContainer` is a product of named units (or dimensions) raised to
//! rational exponents, e.g. `meter / second ** 2` is `{meter: 1, second: -2}`.
//! Entries with a zero exponent are never stored, so two containers are equal
//! exactly when their non-zero exponent maps are equal.

use std::collections::BTreeMap;
use std::fmt;
use num_rational::Ratio;
use num_traits::{CheckedAdd, CheckedMul, One, Signed, Zero};

use crate::error::{Result, UnitError};
use crate::exponent::{exponent_from_f64, format_exponent, Exponent};
use crate::is_dimension_name;

/// Immutable mapping from unit name to non-zero rational exponent
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitsContainer {
    entries: BTreeMap<String, Exponent>,
}

/// Keep numerators off `i64::MIN`, which cannot be negated or reduced
fn in_range(exponent: Exponent) -> Option<Exponent> {
    if *exponent.numer() == i64::MIN {
        None
    } else {
        Some(exponent)
    }
}

impl UnitsContainer {
    /// The empty (dimensionless) container
    pub fn new() -> Self {
        Self::default()
    }

    /// Container holding a single entry
    pub fn single(name: &str, exponent: Exponent) -> Self {
        Self::from_rational_pairs([(name, exponent)])
    }

    /// Build from integer exponents, e.g. `[("meter", 1), ("second", -2)]`.
    /// A name listed twice keeps its last exponent.
    pub fn from_pairs<S, I>(pairs: I) -> Self
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, i64)>,
    {
        Self::from_rational_pairs(pairs.into_iter().map(|(name, exp)| (name, Ratio::from_integer(exp))))
    }

    /// Build from rational exponents. A name listed twice keeps its last
    /// exponent.
    pub fn from_rational_pairs<S, I>(pairs: I) -> Self
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, Exponent)>,
    {
        let mut entries = BTreeMap::new();
        for (name, exp) in pairs {
            if exp.is_zero() {
                entries.remove(name.as_ref());
            } else {
                entries.insert(name.as_ref().to_string(), exp);
            }
        }
        UnitsContainer { entries }
    }

    fn overflow(&self, exponent: &Exponent) -> UnitError {
        UnitError::invalid_exponent(
            self.clone(),
            format_exponent(exponent),
            "exponent does not fit a 64-bit rational",
        )
    }

    /// Add `exponent` to the entry for `name`, pruning it if it cancels out
    fn accumulate(&mut self, name: &str, exponent: Exponent) -> Result<()> {
        if exponent.is_zero() {
            return Ok(());
        }
        let total = self.get(name)
            .checked_add(&exponent)
            .and_then(in_range)
            .ok_or_else(|| self.overflow(&exponent))?;
        if total.is_zero() {
            self.entries.remove(name);
        } else {
            self.entries.insert(name.to_string(), total);
        }
        Ok(())
    }

    // ========== Inspection ==========

    /// Exponent of `name` (zero when absent)
    pub fn get(&self, name: &str) -> Exponent {
        self.entries.get(name).copied().unwrap_or_else(Exponent::zero)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for the dimensionless container
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Exponent)> {
        self.entries.iter().map(|(name, exp)| (name.as_str(), exp))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|name| name.as_str())
    }

    /// True when every exponent is an integer
    pub fn is_integral(&self) -> bool {
        self.entries.values().all(|exp| exp.is_integer())
    }

    /// True when every entry is a bracketed dimension name
    pub fn is_dimension_only(&self) -> bool {
        self.entries.keys().all(|name| is_dimension_name(name))
    }

    // ========== Algebra ==========

    /// Product of two containers (exponents are summed). Fails with
    /// `InvalidExponent` when a sum overflows.
    pub fn multiply(&self, other: &UnitsContainer) -> Result<UnitsContainer> {
        let mut result = self.clone();
        for (name, exp) in &other.entries {
            result.accumulate(name, *exp)?;
        }
        Ok(result)
    }

    /// Quotient of two containers (exponents are subtracted)
    pub fn divide(&self, other: &UnitsContainer) -> Result<UnitsContainer> {
        self.multiply(&other.invert()?)
    }

    /// Raise every entry to a rational power
    pub fn power(&self, exponent: Exponent) -> Result<UnitsContainer> {
        if exponent.is_zero() {
            return Ok(UnitsContainer::new());
        }
        if exponent.is_one() {
            return Ok(self.clone());
        }
        let exponent = in_range(exponent).ok_or_else(|| self.overflow(&exponent))?;
        let mut entries = BTreeMap::new();
        for (name, exp) in &self.entries {
            let raised = exp.checked_mul(&exponent)
                .and_then(in_range)
                .ok_or_else(|| self.overflow(&exponent))?;
            entries.insert(name.clone(), raised);
        }
        Ok(UnitsContainer { entries })
    }

    /// Raise to a float power, which must lie on a rational with a
    /// denominator no larger than `max_denominator`.
    pub fn power_f64(&self, exponent: f64, max_denominator: i64) -> Result<UnitsContainer> {
        let exact = exponent_from_f64(exponent, max_denominator).ok_or_else(|| {
            UnitError::invalid_exponent(
                self.clone(),
                exponent.to_string(),
                format!("not a rational with denominator <= {}", max_denominator),
            )
        })?;
        self.power(exact)
    }

    /// Negate every exponent
    pub fn invert(&self) -> Result<UnitsContainer> {
        self.power(-Exponent::one())
    }

    /// Project onto dimension entries, dropping concrete unit names.
    pub fn to_reduced_dimensions(&self) -> UnitsContainer {
        UnitsContainer {
            entries: self.entries.iter()
                .filter(|(name, _)| is_dimension_name(name))
                .map(|(name, exp)| (name.clone(), *exp))
                .collect(),
        }
    }

    /// Rename every entry through `f`, combining entries that collide
    pub fn rename<F>(&self, mut f: F) -> Result<UnitsContainer>
    where
        F: FnMut(&str) -> String,
    {
        let mut result = UnitsContainer::new();
        for (name, exp) in &self.entries {
            result.accumulate(&f(name), *exp)?;
        }
        Ok(result)
    }
}

impl fmt::Display for UnitsContainer {
    /// Canonical expression form, e.g. `kilogram * meter / second ** 2`.
    /// The output is accepted back by the unit-expression parser.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "dimensionless");
        }

        let term = |name: &str, exp: &Exponent| {
            if exp.is_one() {
                name.to_string()
            } else {
                format!("{} ** {}", name, format_exponent(exp))
            }
        };

        let numerator: Vec<String> = self.entries.iter()
            .filter(|(_, exp)| exp.is_positive())
            .map(|(name, exp)| term(name, exp))
            .collect();
        let denominator: Vec<String> = self.entries.iter()
            .filter(|(_, exp)| exp.is_negative())
            .map(|(name, exp)| term(name, &-*exp))
            .collect();

        if numerator.is_empty() {
            write!(f, "1")?;
        } else {
            write!(f, "{}", numerator.join(" * "))?;
        }
        for part in denominator {
            write!(f, " / {}", part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn velocity() -> UnitsContainer {
        UnitsContainer::from_pairs([("meter", 1), ("second", -1)])
    }

    fn force() -> UnitsContainer {
        UnitsContainer::from_pairs([("kilogram", 1), ("meter", 1), ("second", -2)])
    }

    #[test]
    fn test_zero_exponents_pruned() {
        let c = UnitsContainer::from_pairs([("meter", 1), ("second", 0)]);
        assert_eq!(c, UnitsContainer::from_pairs([("meter", 1)]));

        let cancelled = c.multiply(&UnitsContainer::from_pairs([("meter", -1)])).unwrap();
        assert!(cancelled.is_empty());
        assert_eq!(cancelled, UnitsContainer::new());

        let repeated = UnitsContainer::from_pairs([("meter", 1), ("meter", 3)]);
        assert_eq!(repeated.get("meter"), Ratio::from_integer(3));
    }

    #[test]
    fn test_order_independent_equality() {
        let a = UnitsContainer::from_pairs([("meter", 1), ("second", -1)]);
        let b = UnitsContainer::from_pairs([("second", -1), ("meter", 1)]);
        assert_eq!(a, b);

        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let hash = |c: &UnitsContainer| {
            let mut h = DefaultHasher::new();
            c.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_multiply_by_inverse_is_empty() {
        let a = force();
        assert!(a.multiply(&a.invert().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_multiply_then_divide_roundtrip() {
        let a = force();
        let b = velocity();
        let product = a.multiply(&b).unwrap();
        assert_eq!(product.multiply(&b.invert().unwrap()).unwrap(), a);
        assert_eq!(product.divide(&b).unwrap(), a);
    }

    #[test]
    fn test_power_identity_and_zero() {
        let a = force();
        assert_eq!(a.power(Exponent::one()).unwrap(), a);
        assert!(a.power(Exponent::zero()).unwrap().is_empty());
    }

    #[test]
    fn test_rational_power() {
        let area = UnitsContainer::from_pairs([("meter", 2)]);
        let root = area.power(Ratio::new(1, 2)).unwrap();
        assert_eq!(root, UnitsContainer::from_pairs([("meter", 1)]));

        let half = UnitsContainer::from_pairs([("meter", 1)]).power(Ratio::new(1, 2)).unwrap();
        assert_eq!(half.get("meter"), Ratio::new(1, 2));
        assert!(!half.is_integral());
    }

    #[test]
    fn test_exponent_overflow_is_an_error() {
        let big = UnitsContainer::from_pairs([("meter", 1i64 << 62)]);
        let err = big.multiply(&big).unwrap_err();
        assert_eq!(err.code(), crate::codes::INVALID_EXPONENT);

        let err = big.power(Ratio::from_integer(4)).unwrap_err();
        assert_eq!(err.code(), crate::codes::INVALID_EXPONENT);

        let low = UnitsContainer::from_pairs([("meter", -(1i64 << 62))]);
        assert!(low.divide(&big).is_err());
        assert!(low.multiply(&low).is_err());

        // the largest magnitudes still work
        let max = UnitsContainer::from_pairs([("meter", i64::MAX)]);
        assert_eq!(max.invert().unwrap().get("meter"), Ratio::from_integer(-i64::MAX));
        assert!(max.multiply(&max.invert().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_power_f64() {
        let area = UnitsContainer::from_pairs([("meter", 2)]);
        let root = area.power_f64(0.5, 100).unwrap();
        assert_eq!(root, UnitsContainer::from_pairs([("meter", 1)]));

        let err = area.power_f64(std::f64::consts::E, 100).unwrap_err();
        assert_eq!(err.code(), crate::codes::INVALID_EXPONENT);
    }

    #[test]
    fn test_reduced_dimensions() {
        let mixed = UnitsContainer::from_pairs([("[length]", 1), ("meter", 2), ("[time]", -1)]);
        assert_eq!(
            mixed.to_reduced_dimensions(),
            UnitsContainer::from_pairs([("[length]", 1), ("[time]", -1)])
        );
        assert!(mixed.to_reduced_dimensions().is_dimension_only());
        assert!(!mixed.is_dimension_only());
    }

    #[test]
    fn test_rename_merges_entries() {
        let c = UnitsContainer::from_pairs([("km", 1), ("kilometer", 1)]);
        let renamed = c.rename(|_| "kilometer".to_string()).unwrap();
        assert_eq!(renamed, UnitsContainer::from_pairs([("kilometer", 2)]));
    }

    #[test]
    fn test_display() {
        assert_eq!(force().to_string(), "kilogram * meter / second ** 2");
        assert_eq!(UnitsContainer::from_pairs([("second", -1)]).to_string(), "1 / second");
        assert_eq!(UnitsContainer::new().to_string(), "dimensionless");
        let root = UnitsContainer::single("meter", Ratio::new(1, 2));
        assert_eq!(root.to_string(), "meter ** (1/2)");
        let inv_root = UnitsContainer::single("second", Ratio::new(-3, 2));
        assert_eq!(inv_root.to_string(), "1 / second ** (3/2)");
    }
}
