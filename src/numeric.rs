//! Numeric token classification.
//!
//! Shared by the header boundary detector and the cleaner so that
//! "is this a number" means the same thing in both places.

/// Parse a token as a finite floating point number.
///
/// Follows Rust's decimal/exponent lexical rules. `inf` and `NaN` parse as
/// floats but are not treated as data, so they come back as `None`.
pub fn parse_numeric(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Check whether a token could be converted to a numeric value
pub fn is_numeric(token: &str) -> bool {
    parse_numeric(token).is_some()
}

/// Check whether every token is numeric. Empty input is vacuously numeric.
pub fn all_numeric<I, S>(tokens: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens.into_iter().all(|token| is_numeric(token.as_ref()))
}
