//! Metron Core - Unit algebra types
//!
//! This crate provides the registry-independent types used throughout Metron:
//! - `UnitsContainer`: normalized product of unit names raised to rational exponents
//! - `Exponent`: exact rational exponent plus float validation helpers
//! - `UnitError`: structured errors shared by every Metron crate

mod container;
mod exponent;
mod error;

pub use container::UnitsContainer;
pub use exponent::{
    Exponent, exponent_from_f64, exponent_to_f64, format_exponent, DEFAULT_MAX_DENOMINATOR,
};
pub use error::{UnitError, Result, codes};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Exponent, UnitsContainer, UnitError, Result};
    pub use crate::error::codes;
}

/// Returns true when `name` is a dimension name such as `[length]`.
pub fn is_dimension_name(name: &str) -> bool {
    name.len() > 2 && name.starts_with('[') && name.ends_with(']')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_dimension_name() {
        assert!(is_dimension_name("[length]"));
        assert!(!is_dimension_name("meter"));
        assert!(!is_dimension_name("[]"));
        assert!(!is_dimension_name("[length"));
    }
}
