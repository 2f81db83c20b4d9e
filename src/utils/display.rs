//! Utilities related to displaying things.

use std::fmt;

use num_format::Locale;
use num_format::ToFormattedString;

/// Utility struct for displays percentages. The first item in the struct is the
/// numerator and the second item in the struct is the denominator.
pub struct PercentageFormat(pub u64, pub u64);

impl fmt::Display for PercentageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.1 == 0 {
            f.write_str("N/A")
        } else {
            let (a, b) = (self.0 as f64, self.1 as f64);
            write!(f, "{:.2}%", a / b * 100.0)
        }
    }
}

/// Utility struct for displaying a percentage that has already been computed
/// and might be undefined. Undefined values are rendered as an empty string
/// so that they line up with the blank cells of the exported tables.
pub struct OptionalPercent(pub Option<f64>);

impl fmt::Display for OptionalPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{}%", value),
            None => Ok(()),
        }
    }
}

/// Formats a read count with thousands separators.
pub fn reads(count: u64) -> String {
    count.to_formatted_string(&Locale::en)
}

/// Rounds a value to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Computes `numerator / denominator * 100` rounded to two decimals, yielding
/// [`None`] when the denominator is zero.
pub fn percent_of(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        return None;
    }

    Some(round2(numerator as f64 / denominator as f64 * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_format() {
        assert_eq!(PercentageFormat(1, 4).to_string(), "25.00%");
        assert_eq!(PercentageFormat(1, 0).to_string(), "N/A");
    }

    #[test]
    fn test_optional_percent() {
        assert_eq!(OptionalPercent(Some(12.5)).to_string(), "12.5%");
        assert_eq!(OptionalPercent(None).to_string(), "");
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(1, 3), Some(33.33));
        assert_eq!(percent_of(2, 3), Some(66.67));
        assert_eq!(percent_of(5, 0), None);
        assert_eq!(percent_of(0, 10), Some(0.0));
    }

    #[test]
    fn test_reads() {
        assert_eq!(reads(1234567), "1,234,567");
    }
}
