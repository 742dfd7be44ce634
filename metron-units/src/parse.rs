//! Unit expression parsing - expressions like "kilogram * meter / second ** 2"
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr     := term (('*' | '/') term)*
//! term     := ['-'] primary (('**' | '^') exponent)?
//! primary  := NUMBER | NAME | '(' expr ')'
//! exponent := ['-' | '+'] NUMBER | '(' ['-'] NUMBER ['/' NUMBER] ')'
//! ```
//!
//! Juxtaposition ("kg m") is rejected; products need an explicit `*`.
//! A leading `-` is only accepted before a number and binds looser than
//! `**`, so `-2 ** 2` is `-4`.
//! The result is an immutable `UnitExpr` tree that is evaluated against a
//! name resolver, so the same parser serves user expressions, unit
//! definitions and dimension definitions.

use num_rational::Ratio;
use metron_core::{
    exponent_from_f64, exponent_to_f64, Exponent, Result, UnitError, UnitsContainer,
    DEFAULT_MAX_DENOMINATOR,
};

/// Parsed unit expression
#[derive(Debug, Clone, PartialEq)]
pub enum UnitExpr {
    Number(f64),
    Name(String),
    Mul(Box<UnitExpr>, Box<UnitExpr>),
    Div(Box<UnitExpr>, Box<UnitExpr>),
    Pow(Box<UnitExpr>, Exponent),
}

/// A numeric factor together with the units it scales
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUnits {
    pub factor: f64,
    pub units: UnitsContainer,
}

impl ParsedUnits {
    /// Factor 1, dimensionless
    pub fn one() -> Self {
        ParsedUnits { factor: 1.0, units: UnitsContainer::new() }
    }

    pub fn number(factor: f64) -> Self {
        ParsedUnits { factor, units: UnitsContainer::new() }
    }

    /// A single unit with factor 1
    pub fn unit(name: &str) -> Self {
        ParsedUnits { factor: 1.0, units: UnitsContainer::single(name, Exponent::from_integer(1)) }
    }

    pub fn multiply(&self, other: &ParsedUnits) -> Result<ParsedUnits> {
        Ok(ParsedUnits {
            factor: self.factor * other.factor,
            units: self.units.multiply(&other.units)?,
        })
    }

    pub fn divide(&self, other: &ParsedUnits) -> Result<ParsedUnits> {
        Ok(ParsedUnits {
            factor: self.factor / other.factor,
            units: self.units.divide(&other.units)?,
        })
    }

    pub fn power(&self, exponent: Exponent) -> Result<ParsedUnits> {
        Ok(ParsedUnits {
            factor: self.factor.powf(exponent_to_f64(&exponent)),
            units: self.units.power(exponent)?,
        })
    }
}

impl UnitExpr {
    /// Evaluate the tree, mapping each name through `resolve`.
    pub fn evaluate<F>(&self, resolve: &mut F) -> Result<ParsedUnits>
    where
        F: FnMut(&str) -> Result<ParsedUnits>,
    {
        match self {
            UnitExpr::Number(n) => Ok(ParsedUnits::number(*n)),
            UnitExpr::Name(name) => resolve(name),
            UnitExpr::Mul(lhs, rhs) => {
                let left = lhs.evaluate(resolve)?;
                let right = rhs.evaluate(resolve)?;
                left.multiply(&right)
            }
            UnitExpr::Div(lhs, rhs) => {
                let left = lhs.evaluate(resolve)?;
                let right = rhs.evaluate(resolve)?;
                left.divide(&right)
            }
            UnitExpr::Pow(base, exp) => base.evaluate(resolve)?.power(*exp),
        }
    }

    /// The name, when the whole expression is a single bare name
    pub fn as_name(&self) -> Option<&str> {
        match self {
            UnitExpr::Name(name) => Some(name),
            _ => None,
        }
    }

    /// Every name referenced, in source order
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            UnitExpr::Number(_) => {}
            UnitExpr::Name(name) => out.push(name),
            UnitExpr::Mul(lhs, rhs) | UnitExpr::Div(lhs, rhs) => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
            UnitExpr::Pow(base, _) => base.collect_names(out),
        }
    }
}

/// Parse a unit expression. The empty string and `dimensionless` both
/// denote the dimensionless unit.
pub fn parse_unit_expr(input: &str) -> Result<UnitExpr> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "dimensionless" {
        return Ok(UnitExpr::Number(1.0));
    }

    let tokens = tokenize(input)?;
    let mut parser = Parser { input, tokens, pos: 0 };
    let expr = parser.parse_expr()?;

    if let Some((offset, token)) = parser.peek_entry() {
        let reason = match token {
            Token::RParen => "unbalanced ')'".to_string(),
            _ => "unexpected trailing input".to_string(),
        };
        return Err(UnitError::expression_syntax(input, *offset, reason));
    }
    Ok(expr)
}

// ============ tokenizer ============

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Name(String),
    Star,
    Slash,
    Power,
    Plus,
    Minus,
    LParen,
    RParen,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '°' || c == '$'
}

fn is_name_continue(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit()
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '*' => {
                if i + 1 < chars.len() && chars[i + 1].1 == '*' {
                    tokens.push((offset, Token::Power));
                    i += 2;
                } else {
                    tokens.push((offset, Token::Star));
                    i += 1;
                }
            }
            '·' => { tokens.push((offset, Token::Star)); i += 1; }
            '/' => { tokens.push((offset, Token::Slash)); i += 1; }
            '^' => { tokens.push((offset, Token::Power)); i += 1; }
            '+' => { tokens.push((offset, Token::Plus)); i += 1; }
            '-' => { tokens.push((offset, Token::Minus)); i += 1; }
            '(' => { tokens.push((offset, Token::LParen)); i += 1; }
            ')' => { tokens.push((offset, Token::RParen)); i += 1; }
            '[' => {
                // Dimension name: "[length]"
                let start = i;
                i += 1;
                while i < chars.len() && is_name_continue(chars[i].1) {
                    i += 1;
                }
                if i >= chars.len() || chars[i].1 != ']' || i == start + 1 {
                    return Err(UnitError::expression_syntax(input, offset, "malformed dimension name"));
                }
                i += 1;
                let end = byte_end(&chars, i, input.len());
                tokens.push((offset, Token::Name(input[offset..end].to_string())));
            }
            c if c.is_ascii_digit() || (c == '.' && i + 1 < chars.len() && chars[i + 1].1.is_ascii_digit()) => {
                i = scan_number(&chars, i);
                let end = byte_end(&chars, i, input.len());
                let text = &input[offset..end];
                let value: f64 = text.parse().map_err(|_| {
                    UnitError::expression_syntax(input, offset, format!("invalid number '{}'", text))
                })?;
                tokens.push((offset, Token::Number(value)));
            }
            c if is_name_start(c) => {
                while i < chars.len() && is_name_continue(chars[i].1) {
                    i += 1;
                }
                let end = byte_end(&chars, i, input.len());
                tokens.push((offset, Token::Name(input[offset..end].to_string())));
            }
            other => {
                return Err(UnitError::expression_syntax(
                    input,
                    offset,
                    format!("unexpected character '{}'", other),
                ));
            }
        }
    }

    Ok(tokens)
}

/// Byte offset of the char at `index`, or the end of input
fn byte_end(chars: &[(usize, char)], index: usize, len: usize) -> usize {
    chars.get(index).map(|(offset, _)| *offset).unwrap_or(len)
}

/// Advance past digits, an optional fraction and an optional exponent part
fn scan_number(chars: &[(usize, char)], mut i: usize) -> usize {
    while i < chars.len() && chars[i].1.is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i].1 == '.' {
        i += 1;
        while i < chars.len() && chars[i].1.is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i].1 == 'e' || chars[i].1 == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j].1 == '+' || chars[j].1 == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].1.is_ascii_digit() {
            while j < chars.len() && chars[j].1.is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

// ============ parser ============

/// Largest integer an `f64` token holds exactly (2^53)
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek_entry(&self) -> Option<&(usize, Token)> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    /// Byte offset of the current token (end of input when exhausted)
    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(offset, _)| *offset).unwrap_or(self.input.len())
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, reason: impl Into<String>) -> UnitError {
        UnitError::expression_syntax(self.input, self.offset(), reason)
    }

    fn parse_expr(&mut self) -> Result<UnitExpr> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    let rhs = self.parse_term()?;
                    lhs = UnitExpr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.parse_term()?;
                    lhs = UnitExpr::Div(Box::new(lhs), Box::new(rhs));
                }
                Some(Token::Number(_)) | Some(Token::Name(_)) | Some(Token::LParen) => {
                    return Err(self.error("implicit multiplication is not supported; use '*'"));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_term(&mut self) -> Result<UnitExpr> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            if !matches!(self.peek(), Some(Token::Number(_))) {
                return Err(self.error("'-' must be followed by a number"));
            }
            let term = self.parse_term()?;
            return Ok(UnitExpr::Mul(Box::new(UnitExpr::Number(-1.0)), Box::new(term)));
        }
        let base = self.parse_primary()?;
        if self.peek() == Some(&Token::Power) {
            self.pos += 1;
            let exponent = self.parse_exponent()?;
            if self.peek() == Some(&Token::Power) {
                return Err(self.error("chained exponents need parentheses"));
            }
            return Ok(UnitExpr::Pow(Box::new(base), exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<UnitExpr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(UnitExpr::Number(n)),
            Some(Token::Name(name)) => Ok(UnitExpr::Name(name)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.error("expected ')'")),
                }
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.error("expected a unit name, number or '('"))
            }
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn parse_exponent(&mut self) -> Result<Exponent> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let numerator = self.parse_signed_number()?;
            let exponent = if self.peek() == Some(&Token::Slash) {
                self.pos += 1;
                let denominator = self.parse_signed_number()?;
                self.rational_exponent(numerator, denominator)?
            } else {
                self.float_exponent(numerator)?
            };
            return match self.next() {
                Some(Token::RParen) => Ok(exponent),
                _ => Err(self.error("expected ')' after exponent")),
            };
        }
        let value = self.parse_signed_number()?;
        self.float_exponent(value)
    }

    fn parse_signed_number(&mut self) -> Result<f64> {
        let sign = match self.peek() {
            Some(Token::Minus) => { self.pos += 1; -1.0 }
            Some(Token::Plus) => { self.pos += 1; 1.0 }
            _ => 1.0,
        };
        match self.peek() {
            Some(Token::Number(n)) => {
                let value = sign * n;
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.error("expected a numeric exponent")),
        }
    }

    fn float_exponent(&self, value: f64) -> Result<Exponent> {
        exponent_from_f64(value, DEFAULT_MAX_DENOMINATOR)
            .ok_or_else(|| self.error(format!("exponent {} is not a small rational", value)))
    }

    fn rational_exponent(&self, numerator: f64, denominator: f64) -> Result<Exponent> {
        if numerator.fract() != 0.0 || denominator.fract() != 0.0 {
            return Err(self.error("rational exponents need integer parts"));
        }
        if denominator == 0.0 {
            return Err(self.error("exponent denominator is zero"));
        }
        if numerator.abs() > MAX_EXACT_INTEGER || denominator.abs() > MAX_EXACT_INTEGER {
            return Err(self.error("rational exponent parts are too large"));
        }
        Ok(Ratio::new(numerator as i64, denominator as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metron_core::codes;

    fn name(s: &str) -> Box<UnitExpr> {
        Box::new(UnitExpr::Name(s.to_string()))
    }

    /// Resolver that maps every name to itself
    fn identity(n: &str) -> Result<ParsedUnits> {
        Ok(ParsedUnits::unit(n))
    }

    #[test]
    fn test_parse_simple_name() {
        assert_eq!(parse_unit_expr("meter").unwrap(), UnitExpr::Name("meter".to_string()));
    }

    #[test]
    fn test_parse_quotient_with_power() {
        let expr = parse_unit_expr("meter / second ** 2").unwrap();
        assert_eq!(
            expr,
            UnitExpr::Div(name("meter"), Box::new(UnitExpr::Pow(name("second"), Ratio::from_integer(2))))
        );
    }

    #[test]
    fn test_caret_and_double_star_agree() {
        assert_eq!(parse_unit_expr("m^2").unwrap(), parse_unit_expr("m**2").unwrap());
    }

    #[test]
    fn test_left_associative_division() {
        // kg / m / s == kg * m^-1 * s^-1
        let parsed = parse_unit_expr("kg / m / s").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(parsed.units, UnitsContainer::from_pairs([("kg", 1), ("m", -1), ("s", -1)]));
    }

    #[test]
    fn test_parentheses_group() {
        let parsed = parse_unit_expr("kg / (m * s ** 2)").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(parsed.units, UnitsContainer::from_pairs([("kg", 1), ("m", -1), ("s", -2)]));

        let squared = parse_unit_expr("(m / s) ** 2").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(squared.units, UnitsContainer::from_pairs([("m", 2), ("s", -2)]));
    }

    #[test]
    fn test_leading_number_hoisted() {
        let parsed = parse_unit_expr("2.54 * centimeter").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(parsed.factor, 2.54);
        assert_eq!(parsed.units, UnitsContainer::from_pairs([("centimeter", 1)]));

        let sci = parse_unit_expr("1e-3 * kilogram").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(sci.factor, 1e-3);
    }

    #[test]
    fn test_numeric_power() {
        let parsed = parse_unit_expr("2 ** 10").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(parsed.factor, 1024.0);
        assert!(parsed.units.is_empty());
    }

    #[test]
    fn test_negative_and_rational_exponents() {
        let neg = parse_unit_expr("s ** -1").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(neg.units, UnitsContainer::from_pairs([("s", -1)]));

        let root = parse_unit_expr("m ** (1/2)").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(root.units.get("m"), Ratio::new(1, 2));

        let decimal = parse_unit_expr("m ** 0.5").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(decimal.units, root.units);
    }

    #[test]
    fn test_dimension_names() {
        let parsed = parse_unit_expr("[length] / [time]").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(parsed.units, UnitsContainer::from_pairs([("[length]", 1), ("[time]", -1)]));
    }

    #[test]
    fn test_dimensionless_forms() {
        assert_eq!(parse_unit_expr("").unwrap(), UnitExpr::Number(1.0));
        assert_eq!(parse_unit_expr("dimensionless").unwrap(), UnitExpr::Number(1.0));
    }

    #[test]
    fn test_juxtaposition_rejected() {
        let err = parse_unit_expr("kg m").unwrap_err();
        assert_eq!(err.code(), codes::EXPRESSION_SYNTAX);
        assert!(err.to_string().contains("implicit multiplication"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_unit_expr("meter /").is_err());
        assert!(parse_unit_expr("(meter").is_err());
        assert!(parse_unit_expr("meter)").is_err());
        assert!(parse_unit_expr("meter ** x").is_err());
        assert!(parse_unit_expr("meter ** 2 ** 2").is_err());
        assert!(parse_unit_expr("meter # second").is_err());
        assert!(parse_unit_expr("[length").is_err());
    }

    #[test]
    fn test_negative_factor() {
        let parsed = parse_unit_expr("-2.5 * km").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(parsed.factor, -2.5);
        assert_eq!(parsed.units, UnitsContainer::from_pairs([("km", 1)]));

        let squared = parse_unit_expr("-2 ** 2").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(squared.factor, -4.0);

        let inner = parse_unit_expr("m / -4").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(inner.factor, -0.25);

        assert!(parse_unit_expr("-meter").is_err());
        assert!(parse_unit_expr("meter - second").is_err());
    }

    #[test]
    fn test_oversized_rational_exponent_rejected() {
        let err = parse_unit_expr("m ** (4611686018427387904/1) * m ** (4611686018427387904/1)").unwrap_err();
        assert_eq!(err.code(), codes::EXPRESSION_SYNTAX);

        let err = parse_unit_expr("m ** (-9223372036854775808/-1)").unwrap_err();
        assert_eq!(err.code(), codes::EXPRESSION_SYNTAX);

        let err = parse_unit_expr("m ** (1/99999999999999999999)").unwrap_err();
        assert_eq!(err.code(), codes::EXPRESSION_SYNTAX);
    }

    #[test]
    fn test_exponent_overflow_during_evaluation() {
        let sum = parse_unit_expr(
            "(m ** (4503599627370496/1)) ** 1024 * (m ** (4503599627370496/1)) ** 1024",
        )
        .unwrap();
        let err = sum.evaluate(&mut identity).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_EXPONENT);

        let product = parse_unit_expr("(m ** (4503599627370496/1)) ** 4096").unwrap();
        assert_eq!(product.evaluate(&mut identity).unwrap_err().code(), codes::INVALID_EXPONENT);

        // one step below the limit is fine
        let fits = parse_unit_expr("(m ** (4503599627370496/1)) ** 1024").unwrap();
        assert_eq!(fits.evaluate(&mut identity).unwrap().units.get("m"), Ratio::from_integer(1i64 << 62));
    }

    #[test]
    fn test_irrational_exponent_rejected() {
        assert!(parse_unit_expr("meter ** 3.14159").is_err());
    }

    #[test]
    fn test_names_collected() {
        let expr = parse_unit_expr("kilogram * meter / second ** 2").unwrap();
        assert_eq!(expr.names(), vec!["kilogram", "meter", "second"]);
        assert_eq!(parse_unit_expr("meter").unwrap().as_name(), Some("meter"));
    }

    #[test]
    fn test_unicode_names() {
        let parsed = parse_unit_expr("µm * Ω").unwrap().evaluate(&mut identity).unwrap();
        assert_eq!(parsed.units, UnitsContainer::from_pairs([("µm", 1), ("Ω", 1)]));
    }
}
