//! Structured errors
//!
//! Every failure carries the unit or dimension names involved so callers can
//! build precise messages without re-parsing anything.

use thiserror::Error;

use crate::UnitsContainer;

/// Standard error codes (machine-readable)
pub mod codes {
    pub const UNDEFINED_UNIT: &str = "UNDEFINED_UNIT";
    pub const DIMENSIONALITY: &str = "DIMENSIONALITY";
    pub const INVALID_EXPONENT: &str = "INVALID_EXPONENT";
    pub const DEFINITION_SYNTAX: &str = "DEFINITION_SYNTAX";
    pub const CYCLIC_DEFINITION: &str = "CYCLIC_DEFINITION";
    pub const EXPRESSION_SYNTAX: &str = "EXPRESSION_SYNTAX";
    pub const UNDEFINED_CONTEXT: &str = "UNDEFINED_CONTEXT";
    pub const UNDEFINED_PARAMETER: &str = "UNDEFINED_PARAMETER";
    pub const EMPTY_CONTEXT_STACK: &str = "EMPTY_CONTEXT_STACK";
}

/// Result alias used across Metron
pub type Result<T> = std::result::Result<T, UnitError>;

/// Error type for unit lookup, algebra, definition and conversion
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    /// Unit or prefix name not found in the registry
    #[error("undefined unit '{name}'{}", suggestion_hint(.suggestions))]
    UndefinedUnit {
        name: String,
        suggestions: Vec<String>,
    },

    /// Operation requires equal dimensionality, or no conversion path exists
    #[error("cannot convert from '{from_units}' ({from_dimension}) to '{to_units}' ({to_dimension})")]
    Dimensionality {
        from_units: UnitsContainer,
        to_units: UnitsContainer,
        from_dimension: UnitsContainer,
        to_dimension: UnitsContainer,
    },

    /// Exponent cannot be represented under the rational-exponent policy
    #[error("invalid exponent {exponent} for '{units}': {reason}")]
    InvalidExponent {
        units: UnitsContainer,
        exponent: String,
        reason: String,
    },

    /// Malformed definition line
    #[error("definition syntax error on line {line_number} ('{line}'): {reason}")]
    DefinitionSyntax {
        line_number: usize,
        line: String,
        reason: String,
    },

    /// Definition whose reference leads back to itself
    #[error("cyclic definition: {}", .chain.join(" -> "))]
    CyclicDefinition {
        chain: Vec<String>,
    },

    /// Malformed unit expression
    #[error("cannot parse '{expression}' at position {position}: {reason}")]
    ExpressionSyntax {
        expression: String,
        position: usize,
        reason: String,
    },

    #[error("undefined context '{name}'")]
    UndefinedContext {
        name: String,
    },

    #[error("context '{context}' has no parameter '{name}'")]
    UndefinedParameter {
        context: String,
        name: String,
    },

    #[error("context stack is empty")]
    EmptyContextStack,
}

fn suggestion_hint(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (similar: {})", suggestions.join(", "))
    }
}

impl UnitError {
    // ========== Common Error Constructors ==========

    pub fn undefined_unit(name: impl Into<String>) -> Self {
        UnitError::UndefinedUnit { name: name.into(), suggestions: Vec::new() }
    }

    pub fn dimensionality(
        from_units: UnitsContainer,
        to_units: UnitsContainer,
        from_dimension: UnitsContainer,
        to_dimension: UnitsContainer,
    ) -> Self {
        UnitError::Dimensionality { from_units, to_units, from_dimension, to_dimension }
    }

    pub fn invalid_exponent(
        units: UnitsContainer,
        exponent: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        UnitError::InvalidExponent { units, exponent: exponent.into(), reason: reason.into() }
    }

    pub fn definition_syntax(line_number: usize, line: &str, reason: impl Into<String>) -> Self {
        UnitError::DefinitionSyntax {
            line_number,
            line: line.trim().to_string(),
            reason: reason.into(),
        }
    }

    pub fn expression_syntax(expression: &str, position: usize, reason: impl Into<String>) -> Self {
        UnitError::ExpressionSyntax {
            expression: expression.to_string(),
            position,
            reason: reason.into(),
        }
    }

    pub fn undefined_context(name: impl Into<String>) -> Self {
        UnitError::UndefinedContext { name: name.into() }
    }

    pub fn undefined_parameter(context: impl Into<String>, name: impl Into<String>) -> Self {
        UnitError::UndefinedParameter { context: context.into(), name: name.into() }
    }

    /// Builder: attach "did you mean" suggestions to an `UndefinedUnit`
    pub fn with_suggestions(self, similar: Vec<String>) -> Self {
        match self {
            UnitError::UndefinedUnit { name, .. } => UnitError::UndefinedUnit { name, suggestions: similar },
            other => other,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            UnitError::UndefinedUnit { .. } => codes::UNDEFINED_UNIT,
            UnitError::Dimensionality { .. } => codes::DIMENSIONALITY,
            UnitError::InvalidExponent { .. } => codes::INVALID_EXPONENT,
            UnitError::DefinitionSyntax { .. } => codes::DEFINITION_SYNTAX,
            UnitError::CyclicDefinition { .. } => codes::CYCLIC_DEFINITION,
            UnitError::ExpressionSyntax { .. } => codes::EXPRESSION_SYNTAX,
            UnitError::UndefinedContext { .. } => codes::UNDEFINED_CONTEXT,
            UnitError::UndefinedParameter { .. } => codes::UNDEFINED_PARAMETER,
            UnitError::EmptyContextStack => codes::EMPTY_CONTEXT_STACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_unit_message() {
        let err = UnitError::undefined_unit("meterz");
        assert_eq!(err.to_string(), "undefined unit 'meterz'");

        let err = err.with_suggestions(vec!["meter".to_string(), "meters".to_string()]);
        assert_eq!(err.to_string(), "undefined unit 'meterz' (similar: meter, meters)");
        assert_eq!(err.code(), codes::UNDEFINED_UNIT);
    }

    #[test]
    fn test_dimensionality_message() {
        let err = UnitError::dimensionality(
            UnitsContainer::from_pairs([("meter", 1)]),
            UnitsContainer::from_pairs([("second", 1)]),
            UnitsContainer::from_pairs([("[length]", 1)]),
            UnitsContainer::from_pairs([("[time]", 1)]),
        );
        assert_eq!(
            err.to_string(),
            "cannot convert from 'meter' ([length]) to 'second' ([time])"
        );
    }

    #[test]
    fn test_cycle_message() {
        let err = UnitError::CyclicDefinition {
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "cyclic definition: a -> b -> a");
        assert_eq!(err.code(), codes::CYCLIC_DEFINITION);
    }

    #[test]
    fn test_with_suggestions_ignores_other_variants() {
        let err = UnitError::EmptyContextStack.with_suggestions(vec!["x".to_string()]);
        assert_eq!(err, UnitError::EmptyContextStack);
    }
}
