//! Salary text parsing.
//!
//! Salary estimates arrive as free text ("KES 50,000 - 100,000 per month",
//! "$70000"). Parsing extracts the numeric content and applies fixed
//! fallback rules so every snapshot always carries a usable range.

use crate::types::SalaryRange;

/// Fallback bounds when a salary string has no parsable numbers.
pub const DEFAULT_SALARY_MIN: f64 = 50_000.0;
pub const DEFAULT_SALARY_MAX: f64 = 100_000.0;

/// Spread applied around a single salary figure.
const SINGLE_VALUE_SPREAD: f64 = 0.2;

/// Parse a salary string into a range.
///
/// Rules, in order:
/// - two or more numbers: first two become min/max (reordered if needed)
/// - exactly one number: ±20% around it
/// - none: 50 000 to 100 000
pub fn parse_salary_text(text: &str) -> SalaryRange {
    let numbers = extract_numbers(text);

    match numbers.as_slice() {
        [] => SalaryRange::new(DEFAULT_SALARY_MIN, DEFAULT_SALARY_MAX),
        [single] => SalaryRange::new(
            single * (1.0 - SINGLE_VALUE_SPREAD),
            single * (1.0 + SINGLE_VALUE_SPREAD),
        ),
        [a, b, ..] => {
            let (min, max) = if a <= b { (*a, *b) } else { (*b, *a) };
            SalaryRange::new(min, max)
        }
    }
}

/// Pull whole numbers out of text, tolerating thousands separators.
fn extract_numbers(text: &str) -> Vec<f64> {
    let mut numbers = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if c == ',' && !current.is_empty() {
            // thousands separator inside a number
        } else if !current.is_empty() {
            if let Ok(n) = current.parse::<f64>() {
                numbers.push(n);
            }
            current.clear();
        }
    }
    if !current.is_empty() {
        if let Ok(n) = current.parse::<f64>() {
            numbers.push(n);
        }
    }

    numbers
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
