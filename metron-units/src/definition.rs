//! Definition records and the line-oriented definition syntax
//!
//! ```text
//! # comment
//! kilo- = 1e3 = k-                    prefix, symbol k
//! meter = [length] = m = metre        base unit, symbol m, alias metre
//! inch = 2.54 * centimeter = in       derived unit
//! gram = 1e-3 * kilogram = g
//! pi = 3.14159... = _ = π             `_` means "no symbol"
//! [velocity] = [length] / [time]      derived dimension
//! ```
//!
//! Lines are parsed here into `DefinitionLine` without looking at any
//! registry; name resolution happens when the line is applied to a table.

use metron_core::{is_dimension_name, Result, UnitError, UnitsContainer};

use crate::parse::{parse_unit_expr, ParsedUnits, UnitExpr};

/// A unit in the definition table
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDefinition {
    pub name: String,
    pub symbol: Option<String>,
    pub aliases: Vec<String>,
    /// Units this one is expressed in; empty for base units
    pub reference: UnitsContainer,
    /// Multiplier applied to `reference`; 1 for base units
    pub scale: f64,
    /// Dimension this unit is the base unit of
    pub base_dimension: Option<String>,
}

impl UnitDefinition {
    pub fn is_base(&self) -> bool {
        self.base_dimension.is_some()
    }

    /// Canonical name, symbol and aliases
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.symbol.as_deref())
            .chain(self.aliases.iter().map(|a| a.as_str()))
    }
}

/// A multiplicative prefix such as `kilo-`
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixDefinition {
    pub name: String,
    pub symbol: Option<String>,
    pub aliases: Vec<String>,
    pub factor: f64,
}

impl PrefixDefinition {
    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.symbol.as_deref())
            .chain(self.aliases.iter().map(|a| a.as_str()))
    }
}

/// A base or derived dimension
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionDefinition {
    pub name: String,
    /// Empty for base dimensions
    pub reference: UnitsContainer,
    pub is_base: bool,
}

/// One parsed, not yet applied, definition line
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionLine {
    Prefix {
        name: String,
        factor: f64,
        symbol: Option<String>,
        aliases: Vec<String>,
    },
    Dimension {
        name: String,
        reference: UnitExpr,
    },
    Unit {
        name: String,
        reference: UnitExpr,
        symbol: Option<String>,
        aliases: Vec<String>,
    },
}

impl DefinitionLine {
    pub fn name(&self) -> &str {
        match self {
            DefinitionLine::Prefix { name, .. }
            | DefinitionLine::Dimension { name, .. }
            | DefinitionLine::Unit { name, .. } => name,
        }
    }
}

/// Parse a single definition line. Blank lines and comments yield `None`.
pub fn parse_definition_line(line: &str, line_number: usize) -> Result<Option<DefinitionLine>> {
    let content = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let content = content.trim();
    if content.is_empty() {
        return Ok(None);
    }

    let syntax = |reason: String| UnitError::definition_syntax(line_number, line, reason);

    if content.starts_with('@') {
        return Err(syntax("directives are not supported".to_string()));
    }

    let parts: Vec<&str> = content.split('=').map(|p| p.trim()).collect();
    if parts.len() < 2 {
        return Err(syntax("expected 'name = value'".to_string()));
    }
    if parts.iter().any(|p| p.is_empty()) {
        return Err(syntax("empty field".to_string()));
    }

    let name = parts[0];
    let value = parts[1];

    if let Some(prefix) = name.strip_suffix('-') {
        check_identifier(prefix).map_err(&syntax)?;
        let factor = parse_numeric(value).map_err(|reason| syntax(reason))?;
        if !factor.is_finite() || factor <= 0.0 {
            return Err(syntax(format!("prefix factor must be positive, got {}", factor)));
        }
        let mut names = Vec::new();
        for extra in &parts[2..] {
            let stripped = extra
                .strip_suffix('-')
                .ok_or_else(|| syntax(format!("prefix alias '{}' must end with '-'", extra)))?;
            names.push(stripped);
        }
        let (symbol, aliases) = split_symbol(&names).map_err(&syntax)?;
        return Ok(Some(DefinitionLine::Prefix {
            name: prefix.to_string(),
            factor,
            symbol,
            aliases,
        }));
    }

    let reference = parse_unit_expr(value).map_err(|e| syntax(e.to_string()))?;

    if name.starts_with('[') {
        if !is_dimension_name(name) {
            return Err(syntax(format!("malformed dimension name '{}'", name)));
        }
        check_identifier(&name[1..name.len() - 1]).map_err(&syntax)?;
        if parts.len() > 2 {
            return Err(syntax("dimensions take no symbol or aliases".to_string()));
        }
        return Ok(Some(DefinitionLine::Dimension { name: name.to_string(), reference }));
    }

    check_identifier(name).map_err(&syntax)?;
    let (symbol, aliases) = split_symbol(&parts[2..]).map_err(&syntax)?;
    Ok(Some(DefinitionLine::Unit { name: name.to_string(), reference, symbol, aliases }))
}

/// First extra field is the symbol (`_` for none), the rest are aliases.
fn split_symbol(fields: &[&str]) -> std::result::Result<(Option<String>, Vec<String>), String> {
    let mut iter = fields.iter();
    let symbol = match iter.next() {
        Some(&"_") | None => None,
        Some(s) => {
            check_identifier(s)?;
            Some(s.to_string())
        }
    };
    let mut aliases = Vec::new();
    for alias in iter {
        check_identifier(alias)?;
        aliases.push(alias.to_string());
    }
    Ok((symbol, aliases))
}

fn check_identifier(name: &str) -> std::result::Result<(), String> {
    let valid = !name.is_empty()
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit())
        && name.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '°' | '$'));
    if valid {
        Ok(())
    } else {
        Err(format!("invalid name '{}'", name))
    }
}

/// Evaluate an expression that must be purely numeric (prefix factors)
fn parse_numeric(value: &str) -> std::result::Result<f64, String> {
    let expr = parse_unit_expr(value).map_err(|e| e.to_string())?;
    let parsed = expr
        .evaluate(&mut |n: &str| -> Result<ParsedUnits> { Err(UnitError::undefined_unit(n)) })
        .map_err(|_| format!("prefix value '{}' must be numeric", value))?;
    Ok(parsed.factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metron_core::codes;

    fn parse(line: &str) -> DefinitionLine {
        parse_definition_line(line, 1).unwrap().unwrap()
    }

    #[test]
    fn test_comments_and_blanks() {
        assert_eq!(parse_definition_line("", 1).unwrap(), None);
        assert_eq!(parse_definition_line("   ", 1).unwrap(), None);
        assert_eq!(parse_definition_line("# Length units", 1).unwrap(), None);
    }

    #[test]
    fn test_base_unit_line() {
        match parse("meter = [length] = m = metre") {
            DefinitionLine::Unit { name, reference, symbol, aliases } => {
                assert_eq!(name, "meter");
                assert_eq!(reference.as_name(), Some("[length]"));
                assert_eq!(symbol.as_deref(), Some("m"));
                assert_eq!(aliases, vec!["metre".to_string()]);
            }
            other => panic!("expected unit, got {:?}", other),
        }
    }

    #[test]
    fn test_derived_unit_with_trailing_comment() {
        match parse("inch = 2.54 * centimeter = in  # imperial") {
            DefinitionLine::Unit { name, reference, symbol, .. } => {
                assert_eq!(name, "inch");
                assert_eq!(reference.names(), vec!["centimeter"]);
                assert_eq!(symbol.as_deref(), Some("in"));
            }
            other => panic!("expected unit, got {:?}", other),
        }
    }

    #[test]
    fn test_underscore_means_no_symbol() {
        match parse("pi = 3.14159 = _ = π") {
            DefinitionLine::Unit { symbol, aliases, .. } => {
                assert_eq!(symbol, None);
                assert_eq!(aliases, vec!["π".to_string()]);
            }
            other => panic!("expected unit, got {:?}", other),
        }
    }

    #[test]
    fn test_prefix_line() {
        assert_eq!(
            parse("micro- = 1e-6 = u- = µ-"),
            DefinitionLine::Prefix {
                name: "micro".to_string(),
                factor: 1e-6,
                symbol: Some("u".to_string()),
                aliases: vec!["µ".to_string()],
            }
        );
        match parse("kibi- = 2**10 = Ki-") {
            DefinitionLine::Prefix { factor, .. } => assert_eq!(factor, 1024.0),
            other => panic!("expected prefix, got {:?}", other),
        }
    }

    #[test]
    fn test_prefix_errors() {
        assert!(parse_definition_line("kilo- = 1e3 = k", 1).is_err());
        assert!(parse_definition_line("kilo- = meter", 1).is_err());
        assert!(parse_definition_line("zero- = 0", 1).is_err());
    }

    #[test]
    fn test_dimension_line() {
        match parse("[velocity] = [length] / [time]") {
            DefinitionLine::Dimension { name, reference } => {
                assert_eq!(name, "[velocity]");
                assert_eq!(reference.names(), vec!["[length]", "[time]"]);
            }
            other => panic!("expected dimension, got {:?}", other),
        }
        assert!(parse_definition_line("[area] = [length] ** 2 = ar", 1).is_err());
    }

    #[test]
    fn test_syntax_errors_carry_line_number() {
        let err = parse_definition_line("meter", 7).unwrap_err();
        assert_eq!(err.code(), codes::DEFINITION_SYNTAX);
        match err {
            UnitError::DefinitionSyntax { line_number, line, .. } => {
                assert_eq!(line_number, 7);
                assert_eq!(line, "meter");
            }
            other => panic!("unexpected error {:?}", other),
        }

        assert!(parse_definition_line("meter = ", 1).is_err());
        assert!(parse_definition_line("2meter = 2 * meter", 1).is_err());
        assert!(parse_definition_line("foo = meter meter", 1).is_err());
        assert!(parse_definition_line("@context sp", 1).is_err());
    }

    #[test]
    fn test_unit_definition_names() {
        let def = UnitDefinition {
            name: "meter".to_string(),
            symbol: Some("m".to_string()),
            aliases: vec!["metre".to_string()],
            reference: UnitsContainer::new(),
            scale: 1.0,
            base_dimension: Some("[length]".to_string()),
        };
        assert!(def.is_base());
        assert_eq!(def.all_names().collect::<Vec<_>>(), vec!["meter", "m", "metre"]);
    }
}
