//! Rational exponents
//!
//! Unit exponents are exact rationals so that square roots of areas and
//! similar operations stay representable. Floating exponents coming from
//! callers are accepted only when they sit on a small-denominator rational.

use num_rational::Ratio;

/// Exact exponent of a unit or dimension
pub type Exponent = Ratio<i64>;

/// Largest denominator accepted when converting a float into an exponent
pub const DEFAULT_MAX_DENOMINATOR: i64 = 100;

/// Maximum distance between a float and its rational approximation
const EXPONENT_TOLERANCE: f64 = 1e-9;

/// Largest continued-fraction term we are willing to multiply out
const MAX_TERM: f64 = 1e15;

/// Convert a float exponent into an exact rational.
///
/// Walks the continued-fraction convergents of `value` and returns the first
/// one within tolerance whose denominator does not exceed `max_denominator`.
/// Returns `None` for non-finite values or values with no such convergent.
pub fn exponent_from_f64(value: f64, max_denominator: i64) -> Option<Exponent> {
    if !value.is_finite() || max_denominator < 1 {
        return None;
    }

    // Convergents h/k, seeded with h(-2)=0, h(-1)=1, k(-2)=1, k(-1)=0
    let (mut h_prev, mut h) = (0i64, 1i64);
    let (mut k_prev, mut k) = (1i64, 0i64);
    let mut x = value;

    for _ in 0..64 {
        let term = x.floor();
        if term.abs() > MAX_TERM {
            return None;
        }
        let a = term as i64;

        let h_next = a.checked_mul(h)?.checked_add(h_prev)?;
        let k_next = a.checked_mul(k)?.checked_add(k_prev)?;
        if k_next > max_denominator {
            break;
        }
        h_prev = h;
        h = h_next;
        k_prev = k;
        k = k_next;

        if (h as f64 / k as f64 - value).abs() <= EXPONENT_TOLERANCE {
            return Some(Ratio::new(h, k));
        }

        let frac = x - term;
        if frac.abs() < f64::EPSILON {
            break;
        }
        x = 1.0 / frac;
    }

    None
}

/// Float value of an exponent
pub fn exponent_to_f64(exponent: &Exponent) -> f64 {
    *exponent.numer() as f64 / *exponent.denom() as f64
}

/// Render an exponent the way the unit-expression grammar reads it back:
/// integers plain, other rationals parenthesized as `(p/q)`.
pub fn format_exponent(exponent: &Exponent) -> String {
    if exponent.is_integer() {
        exponent.numer().to_string()
    } else {
        format!("({}/{})", exponent.numer(), exponent.denom())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_exponents() {
        assert_eq!(exponent_from_f64(2.0, 100), Some(Ratio::from_integer(2)));
        assert_eq!(exponent_from_f64(-3.0, 100), Some(Ratio::from_integer(-3)));
        assert_eq!(exponent_from_f64(0.0, 100), Some(Ratio::from_integer(0)));
    }

    #[test]
    fn test_simple_fractions() {
        assert_eq!(exponent_from_f64(0.5, 100), Some(Ratio::new(1, 2)));
        assert_eq!(exponent_from_f64(-0.5, 100), Some(Ratio::new(-1, 2)));
        assert_eq!(exponent_from_f64(1.0 / 3.0, 100), Some(Ratio::new(1, 3)));
        assert_eq!(exponent_from_f64(0.75, 100), Some(Ratio::new(3, 4)));
    }

    #[test]
    fn test_denominator_bound() {
        // 1/101 needs a denominator above the bound
        assert_eq!(exponent_from_f64(1.0 / 101.0, 100), None);
        assert_eq!(exponent_from_f64(1.0 / 101.0, 1000), Some(Ratio::new(1, 101)));
    }

    #[test]
    fn test_irrational_rejected() {
        assert_eq!(exponent_from_f64(std::f64::consts::PI, 100), None);
        assert_eq!(exponent_from_f64(f64::NAN, 100), None);
        assert_eq!(exponent_from_f64(f64::INFINITY, 100), None);
    }

    #[test]
    fn test_format_exponent() {
        assert_eq!(format_exponent(&Ratio::from_integer(2)), "2");
        assert_eq!(format_exponent(&Ratio::from_integer(-1)), "-1");
        assert_eq!(format_exponent(&Ratio::new(1, 2)), "(1/2)");
        assert_eq!(format_exponent(&Ratio::new(-2, 3)), "(-2/3)");
    }

    #[test]
    fn test_exponent_to_f64() {
        assert_eq!(exponent_to_f64(&Ratio::new(1, 4)), 0.25);
    }
}
