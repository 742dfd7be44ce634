//! Definition table - units, prefixes and dimensions by canonical name
//!
//! The table owns every definition plus the alias maps used for name
//! resolution. It knows nothing about caching; the registry wraps it and
//! invalidates its memo tables whenever the table changes.

use std::collections::{HashMap, HashSet};

use metron_core::{is_dimension_name, Result, UnitError, UnitsContainer};

use crate::definition::{DefinitionLine, DimensionDefinition, PrefixDefinition, UnitDefinition};
use crate::parse::{ParsedUnits, UnitExpr};

/// Number of "did you mean" suggestions attached to lookup errors
const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct DefinitionTable {
    units: HashMap<String, UnitDefinition>,
    prefixes: HashMap<String, PrefixDefinition>,
    dimensions: HashMap<String, DimensionDefinition>,
    /// name, symbol or alias -> canonical unit name
    unit_names: HashMap<String, String>,
    /// name, symbol or alias -> canonical prefix name
    prefix_names: HashMap<String, String>,
    /// base dimension -> its base unit
    base_units: HashMap<String, String>,
    plural_suffixes: bool,
}

impl DefinitionTable {
    pub fn new(plural_suffixes: bool) -> Self {
        DefinitionTable { plural_suffixes, ..Default::default() }
    }

    // ========== Lookup ==========

    pub fn unit(&self, canonical: &str) -> Option<&UnitDefinition> {
        self.units.get(canonical)
    }

    pub fn prefix(&self, canonical: &str) -> Option<&PrefixDefinition> {
        self.prefixes.get(canonical)
    }

    pub fn dimension(&self, name: &str) -> Option<&DimensionDefinition> {
        self.dimensions.get(name)
    }

    /// Base unit registered for a base dimension
    pub fn base_unit_of(&self, dimension: &str) -> Option<&str> {
        self.base_units.get(dimension).map(|s| s.as_str())
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn prefix_count(&self) -> usize {
        self.prefixes.len()
    }

    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    /// Canonical names of every defined unit, sorted
    pub fn unit_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.units.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a user-supplied name to its canonical container key.
    ///
    /// Order: exact name/symbol/alias, then longest registered prefix plus a
    /// unit, then the same two steps on the name with a plural `s` removed.
    pub fn resolve_unit(&self, name: &str) -> Option<String> {
        self.resolve_singular(name).or_else(|| {
            if !self.plural_suffixes {
                return None;
            }
            let stem = name.strip_suffix('s').filter(|s| !s.is_empty())?;
            self.resolve_singular(stem)
        })
    }

    fn resolve_singular(&self, name: &str) -> Option<String> {
        if let Some(canonical) = self.unit_names.get(name) {
            return Some(canonical.clone());
        }
        self.split_prefixed(name)
            .map(|(prefix, unit)| format!("{}{}", prefix.name, unit.name))
    }

    /// Split `name` into a prefix and a unit. Longer prefixes win, so
    /// `dam` is deca-meter rather than deci-am.
    pub fn split_prefixed(&self, name: &str) -> Option<(&PrefixDefinition, &UnitDefinition)> {
        let mut candidates: Vec<(&String, &String)> = self.prefix_names.iter()
            .filter(|(alias, _)| name.len() > alias.len() && name.starts_with(alias.as_str()))
            .collect();
        candidates.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        for (alias, prefix_name) in candidates {
            let rest = &name[alias.len()..];
            if let Some(unit_name) = self.unit_names.get(rest) {
                let prefix = self.prefixes.get(prefix_name)?;
                let unit = self.units.get(unit_name)?;
                return Some((prefix, unit));
            }
        }
        None
    }

    /// Preferred short form of a canonical key
    pub fn symbol_for(&self, canonical: &str) -> Option<String> {
        if let Some(unit) = self.units.get(canonical) {
            return Some(unit.symbol.clone().unwrap_or_else(|| unit.name.clone()));
        }
        let (prefix, unit) = self.split_prefixed(canonical)?;
        match (&prefix.symbol, &unit.symbol) {
            (Some(p), Some(u)) => Some(format!("{}{}", p, u)),
            _ => Some(canonical.to_string()),
        }
    }

    /// `UndefinedUnit` for `name`, with close matches attached
    pub fn undefined(&self, name: &str) -> UnitError {
        UnitError::undefined_unit(name).with_suggestions(self.similar_names(name))
    }

    /// Known unit names that look like `query`, best first
    pub fn similar_names(&self, query: &str) -> Vec<String> {
        let query_lower = query.to_lowercase();
        let mut matches: Vec<(&String, usize)> = self.unit_names.keys()
            .filter_map(|candidate| {
                let score = similarity_score(&query_lower, &candidate.to_lowercase());
                if score > 0 { Some((candidate, score)) } else { None }
            })
            .collect();

        matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        matches.into_iter()
            .take(MAX_SUGGESTIONS)
            .map(|(name, _)| name.clone())
            .collect()
    }

    // ========== Mutation ==========

    /// Apply one parsed definition line.
    pub fn apply(&mut self, line: &DefinitionLine, line_number: usize, raw: &str) -> Result<()> {
        match line {
            DefinitionLine::Prefix { name, factor, symbol, aliases } => {
                self.apply_prefix(name, *factor, symbol, aliases, line_number, raw)
            }
            DefinitionLine::Dimension { name, reference } => {
                self.apply_dimension(name, reference, line_number, raw)
            }
            DefinitionLine::Unit { name, reference, symbol, aliases } => {
                self.apply_unit(name, reference, symbol, aliases, line_number, raw)
            }
        }
    }

    fn apply_prefix(
        &mut self,
        name: &str,
        factor: f64,
        symbol: &Option<String>,
        aliases: &[String],
        line_number: usize,
        raw: &str,
    ) -> Result<()> {
        let definition = PrefixDefinition {
            name: name.to_string(),
            symbol: symbol.clone(),
            aliases: aliases.to_vec(),
            factor,
        };

        for alias in definition.all_names() {
            if let Some(owner) = self.prefix_names.get(alias) {
                if owner != name {
                    return Err(UnitError::definition_syntax(
                        line_number,
                        raw,
                        format!("'{}' already names prefix '{}'", alias, owner),
                    ));
                }
            }
        }

        if let Some(previous) = self.prefixes.remove(name) {
            tracing::warn!(prefix = name, "redefining prefix");
            for alias in previous.all_names() {
                self.prefix_names.remove(alias);
            }
        }
        for alias in definition.all_names() {
            self.prefix_names.insert(alias.to_string(), name.to_string());
        }
        self.prefixes.insert(name.to_string(), definition);
        Ok(())
    }

    fn apply_dimension(
        &mut self,
        name: &str,
        reference: &UnitExpr,
        line_number: usize,
        raw: &str,
    ) -> Result<()> {
        let syntax = |reason: String| UnitError::definition_syntax(line_number, raw, reason);

        let parsed = reference.evaluate(&mut |n: &str| {
            if !is_dimension_name(n) {
                return Err(syntax(format!("unit '{}' in a dimension reference", n)));
            }
            if self.dimensions.contains_key(n) {
                Ok(ParsedUnits::unit(n))
            } else {
                Err(UnitError::undefined_unit(n))
            }
        })?;
        if parsed.factor != 1.0 {
            return Err(syntax("dimension references cannot carry a numeric factor".to_string()));
        }

        if let Some(previous) = self.dimensions.get(name) {
            if previous.is_base {
                return Err(syntax(format!("{} is a base dimension", name)));
            }
            if let Some(chain) = self.find_cycle(name, &parsed.units) {
                return Err(UnitError::CyclicDefinition { chain });
            }
            tracing::warn!(dimension = name, "redefining dimension");
        }

        self.dimensions.insert(
            name.to_string(),
            DimensionDefinition { name: name.to_string(), reference: parsed.units, is_base: false },
        );
        Ok(())
    }

    fn apply_unit(
        &mut self,
        name: &str,
        reference: &UnitExpr,
        symbol: &Option<String>,
        aliases: &[String],
        line_number: usize,
        raw: &str,
    ) -> Result<()> {
        let syntax = |reason: String| UnitError::definition_syntax(line_number, raw, reason);

        let definition = match reference.as_name().filter(|n| is_dimension_name(n)) {
            Some(dimension) => {
                if let Some(existing) = self.base_units.get(dimension) {
                    if existing != name {
                        return Err(syntax(format!(
                            "{} already has base unit '{}'",
                            dimension, existing
                        )));
                    }
                }
                if self.dimensions.get(dimension).is_some_and(|d| !d.is_base) {
                    return Err(syntax(format!("{} is a derived dimension", dimension)));
                }
                UnitDefinition {
                    name: name.to_string(),
                    symbol: symbol.clone(),
                    aliases: aliases.to_vec(),
                    reference: UnitsContainer::new(),
                    scale: 1.0,
                    base_dimension: Some(dimension.to_string()),
                }
            }
            None => {
                let parsed = reference.evaluate(&mut |n: &str| {
                    if is_dimension_name(n) {
                        return Err(syntax(format!("dimension '{}' mixed into a unit reference", n)));
                    }
                    match self.resolve_unit(n) {
                        Some(canonical) => Ok(ParsedUnits::unit(&canonical)),
                        None => Err(self.undefined(n)),
                    }
                })?;
                if !parsed.factor.is_finite() || parsed.factor <= 0.0 {
                    return Err(syntax(format!("scale factor must be positive, got {}", parsed.factor)));
                }
                if self.units.contains_key(name) {
                    if let Some(chain) = self.find_cycle(name, &parsed.units) {
                        return Err(UnitError::CyclicDefinition { chain });
                    }
                }
                UnitDefinition {
                    name: name.to_string(),
                    symbol: symbol.clone(),
                    aliases: aliases.to_vec(),
                    reference: parsed.units,
                    scale: parsed.factor,
                    base_dimension: None,
                }
            }
        };

        for alias in definition.all_names() {
            if let Some(owner) = self.unit_names.get(alias) {
                if owner != name {
                    return Err(syntax(format!("'{}' already names unit '{}'", alias, owner)));
                }
            }
        }

        if let Some(previous) = self.units.remove(name) {
            tracing::warn!(unit = name, "redefining unit");
            for alias in previous.all_names() {
                self.unit_names.remove(alias);
            }
            if let Some(dimension) = &previous.base_dimension {
                self.base_units.remove(dimension);
            }
        }

        for alias in definition.all_names() {
            self.unit_names.insert(alias.to_string(), name.to_string());
        }
        if let Some(dimension) = &definition.base_dimension {
            self.base_units.insert(dimension.clone(), name.to_string());
            self.dimensions.entry(dimension.clone()).or_insert_with(|| DimensionDefinition {
                name: dimension.clone(),
                reference: UnitsContainer::new(),
                is_base: true,
            });
        }
        self.units.insert(name.to_string(), definition);
        Ok(())
    }

    // ========== Cycle detection ==========

    /// Path from `target` back to itself through `reference`, if any
    fn find_cycle(&self, target: &str, reference: &UnitsContainer) -> Option<Vec<String>> {
        let mut path = vec![target.to_string()];
        let mut visited = HashSet::new();
        let start: Vec<String> = reference.names().map(|n| n.to_string()).collect();
        if self.reaches(target, start, &mut path, &mut visited) {
            Some(path)
        } else {
            None
        }
    }

    fn reaches(
        &self,
        target: &str,
        names: Vec<String>,
        path: &mut Vec<String>,
        visited: &mut HashSet<String>,
    ) -> bool {
        for key in names {
            path.push(key.clone());
            if key == target {
                return true;
            }
            if visited.insert(key.clone()) && self.reaches(target, self.dependencies(&key), path, visited) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Names a unit, prefixed unit or dimension is directly defined in terms of
    fn dependencies(&self, key: &str) -> Vec<String> {
        if let Some(dimension) = self.dimensions.get(key) {
            return dimension.reference.names().map(|n| n.to_string()).collect();
        }
        if let Some(unit) = self.units.get(key) {
            return unit.reference.names().map(|n| n.to_string()).collect();
        }
        match self.split_prefixed(key) {
            Some((_, unit)) => vec![unit.name.clone()],
            None => Vec::new(),
        }
    }
}

/// Similarity between a lowercase query and a lowercase candidate; 0 means unrelated
fn similarity_score(query: &str, candidate: &str) -> usize {
    let mut score = if candidate.starts_with(query) {
        100
    } else if candidate.contains(query) {
        50
    } else if candidate.len() >= 3 && query.contains(candidate) {
        30
    } else {
        let shared = query.chars().zip(candidate.chars()).take_while(|(a, b)| a == b).count();
        if shared >= 3 { shared * 10 } else { 0 }
    };

    if score > 0 {
        let len_diff = query.len().abs_diff(candidate.len());
        if len_diff < 5 {
            score += 5 - len_diff;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::parse_definition_line;
    use metron_core::codes;

    fn table(source: &str) -> DefinitionTable {
        let mut table = DefinitionTable::new(true);
        for (idx, raw) in source.lines().enumerate() {
            if let Some(line) = parse_definition_line(raw, idx + 1).unwrap() {
                table.apply(&line, idx + 1, raw).unwrap();
            }
        }
        table
    }

    fn apply(table: &mut DefinitionTable, raw: &str) -> Result<()> {
        let line = parse_definition_line(raw, 1)?.expect("definition line");
        table.apply(&line, 1, raw)
    }

    const BASIC: &str = "
        kilo- = 1e3 = k-
        milli- = 1e-3 = m-
        deci- = 1e-1 = d-
        deca- = 1e1 = da-
        meter = [length] = m = metre
        second = [time] = s
        minute = 60 * second = min
        inch = 0.0254 * meter = in = inches
    ";

    #[test]
    fn test_exact_and_alias_resolution() {
        let t = table(BASIC);
        assert_eq!(t.resolve_unit("meter").as_deref(), Some("meter"));
        assert_eq!(t.resolve_unit("m").as_deref(), Some("meter"));
        assert_eq!(t.resolve_unit("metre").as_deref(), Some("meter"));
        assert_eq!(t.resolve_unit("min").as_deref(), Some("minute"));
    }

    #[test]
    fn test_prefix_resolution() {
        let t = table(BASIC);
        assert_eq!(t.resolve_unit("km").as_deref(), Some("kilometer"));
        assert_eq!(t.resolve_unit("kilometer").as_deref(), Some("kilometer"));
        assert_eq!(t.resolve_unit("ms").as_deref(), Some("millisecond"));
        // longest prefix wins
        assert_eq!(t.resolve_unit("dam").as_deref(), Some("decameter"));
        assert_eq!(t.resolve_unit("dm").as_deref(), Some("decimeter"));
    }

    #[test]
    fn test_plural_resolution() {
        let t = table(BASIC);
        assert_eq!(t.resolve_unit("meters").as_deref(), Some("meter"));
        assert_eq!(t.resolve_unit("kilometers").as_deref(), Some("kilometer"));
        assert_eq!(t.resolve_unit("inches").as_deref(), Some("inch"));

        let mut strict = DefinitionTable::new(false);
        apply(&mut strict, "meter = [length] = m").unwrap();
        assert_eq!(strict.resolve_unit("meters"), None);
    }

    #[test]
    fn test_unknown_name_suggestions() {
        let t = table(BASIC);
        assert_eq!(t.resolve_unit("furlong"), None);
        match t.undefined("mete") {
            UnitError::UndefinedUnit { suggestions, .. } => {
                assert_eq!(suggestions.first().map(|s| s.as_str()), Some("meter"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_symbol_for() {
        let t = table(BASIC);
        assert_eq!(t.symbol_for("meter").as_deref(), Some("m"));
        assert_eq!(t.symbol_for("kilometer").as_deref(), Some("km"));
        assert_eq!(t.symbol_for("nothing"), None);
    }

    #[test]
    fn test_base_unit_registration() {
        let t = table(BASIC);
        assert_eq!(t.base_unit_of("[length]"), Some("meter"));
        assert!(t.dimension("[length]").unwrap().is_base);
        assert!(t.unit("meter").unwrap().reference.is_empty());
        assert_eq!(t.unit("inch").unwrap().scale, 0.0254);
    }

    #[test]
    fn test_second_base_unit_rejected() {
        let mut t = table(BASIC);
        let err = apply(&mut t, "foot = [length] = ft").unwrap_err();
        assert_eq!(err.code(), codes::DEFINITION_SYNTAX);
        assert!(t.unit("foot").is_none());
    }

    #[test]
    fn test_undefined_reference() {
        let mut t = table(BASIC);
        let err = apply(&mut t, "furlong = 220 * yard").unwrap_err();
        assert_eq!(err.code(), codes::UNDEFINED_UNIT);
        assert!(t.unit("furlong").is_none());
    }

    #[test]
    fn test_non_positive_scale_rejected() {
        let mut t = table(BASIC);
        assert!(apply(&mut t, "nothing = 0 * meter").is_err());
    }

    #[test]
    fn test_alias_conflict() {
        let mut t = table(BASIC);
        let err = apply(&mut t, "mile = 1609.344 * meter = m").unwrap_err();
        assert!(err.to_string().contains("already names unit 'meter'"));
    }

    #[test]
    fn test_redefinition_replaces_aliases() {
        let mut t = table(BASIC);
        apply(&mut t, "inch = 0.025 * meter = in").unwrap();
        assert_eq!(t.unit("inch").unwrap().scale, 0.025);
        assert_eq!(t.resolve_unit("in").as_deref(), Some("inch"));
        // aliases of the old definition are dropped
        assert_eq!(t.resolve_unit("inches"), None);
        assert_eq!(t.unit_names().iter().filter(|n| **n == "inch").count(), 1);
    }

    #[test]
    fn test_cyclic_redefinition() {
        let mut t = table(BASIC);
        let err = apply(&mut t, "meter = 100 * decimeter").unwrap_err();
        match err {
            UnitError::CyclicDefinition { chain } => {
                assert_eq!(chain, vec!["meter", "decimeter", "meter"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(t.unit("meter").unwrap().is_base());
    }

    #[test]
    fn test_derived_dimensions() {
        let mut t = table(BASIC);
        apply(&mut t, "[velocity] = [length] / [time]").unwrap();
        let velocity = t.dimension("[velocity]").unwrap();
        assert!(!velocity.is_base);
        assert_eq!(velocity.reference, UnitsContainer::from_pairs([("[length]", 1), ("[time]", -1)]));

        assert!(apply(&mut t, "[length] = [time]").is_err());
        assert!(apply(&mut t, "[speed] = [length] / second").is_err());
        assert!(apply(&mut t, "[jerk] = [acceleration] / [time]").is_err());
        assert!(apply(&mut t, "knot = [velocity]").is_err());
    }

    #[test]
    fn test_similarity_score() {
        assert!(similarity_score("met", "meter") > similarity_score("met", "kilometer"));
        assert_eq!(similarity_score("xyz", "meter"), 0);
    }
}
