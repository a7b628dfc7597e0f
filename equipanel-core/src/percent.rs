//! Percentage-literal normalization.
//!
//! Disclosure tables publish ratios as text such as `"7.61%"`. These become
//! fractions (`0.0761`). Anything else is carried through unchanged, and the
//! outcome of a whole-column cast is an explicit two-variant value instead of
//! a swallowed error.

use polars::prelude::*;
use regex::Regex;
use std::sync::OnceLock;

fn percent_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(-?\d+(?:\.\d+)?)%$").ok())
        .as_ref()
}

/// Result of normalizing one text cell.
#[derive(Debug, Clone, PartialEq)]
pub enum PercentCell {
    /// A percentage literal, converted to a fraction.
    Numeric(f64),
    /// Any other text, untouched.
    Text(String),
}

/// Parse `"X%"` (optional minus sign, digits, optional decimals) into `X / 100`.
pub fn parse_percentage(input: &str) -> Option<f64> {
    let caps = percent_pattern()?.captures(input)?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(number / 100.0)
}

pub fn normalize_cell(input: &str) -> PercentCell {
    match parse_percentage(input) {
        Some(v) => PercentCell::Numeric(v),
        None => PercentCell::Text(input.to_string()),
    }
}

/// Outcome of casting a text column to numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnCast {
    /// Every present cell was a percentage literal or a plain number.
    Numeric(Vec<Option<f64>>),
    /// At least one cell was not numeric. Percentage literals are still
    /// rewritten as fractions; every other cell is kept as is.
    Text(Vec<Option<String>>),
}

impl ColumnCast {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnCast::Numeric(_))
    }

    /// Materialize as a `Float64` or `String` column.
    pub fn into_column(self, name: &str) -> Column {
        match self {
            ColumnCast::Numeric(values) => Column::new(name.into(), values),
            ColumnCast::Text(cells) => Column::new(name.into(), cells),
        }
    }
}

/// Normalize percentage literals, then try to cast the column to numbers.
///
/// Missing cells stay missing. If any present cell is neither a percentage
/// nor a number the column stays text, with its percentage cells normalized.
pub fn cast_text_column<I, S>(cells: I) -> ColumnCast
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let normalized: Vec<Option<PercentCell>> = cells
        .into_iter()
        .map(|cell| cell.map(|text| normalize_cell(text.as_ref())))
        .collect();

    let numbers: Option<Vec<Option<f64>>> = normalized
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(PercentCell::Numeric(v)) => Some(Some(*v)),
            Some(PercentCell::Text(raw)) => raw.trim().parse::<f64>().ok().map(Some),
        })
        .collect();

    match numbers {
        Some(values) => ColumnCast::Numeric(values),
        None => ColumnCast::Text(
            normalized
                .into_iter()
                .map(|cell| {
                    cell.map(|c| match c {
                        PercentCell::Numeric(v) => v.to_string(),
                        PercentCell::Text(raw) => raw,
                    })
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_percent_literals() {
        assert_eq!(parse_percentage("7.61%"), Some(0.0761));
        assert_eq!(parse_percentage("100%"), Some(1.0));
        assert_eq!(parse_percentage("-12.5%"), Some(-0.125));
    }

    #[test]
    fn rejects_non_literals() {
        assert_eq!(parse_percentage("7.61"), None);
        assert_eq!(parse_percentage("%"), None);
        assert_eq!(parse_percentage("abc%"), None);
        assert_eq!(parse_percentage(" 5%"), None);
        assert_eq!(parse_percentage("5.%"), None);
    }

    #[test]
    fn normalize_passes_text_through() {
        assert_eq!(normalize_cell("Banking"), PercentCell::Text("Banking".into()));
        assert_eq!(normalize_cell("50%"), PercentCell::Numeric(0.5));
    }

    #[test]
    fn mixed_numbers_and_percentages_cast() {
        let cells = vec![Some("1.5%"), None, Some("0.2")];
        let ColumnCast::Numeric(v) = cast_text_column(cells) else {
            panic!("expected numeric cast");
        };
        assert!((v[0].unwrap() - 0.015).abs() < 1e-12);
        assert_eq!(v[1], None);
        assert!((v[2].unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn text_column_still_normalizes_percent_cells() {
        let cells = vec![Some("7.61%"), Some("n/a"), None, Some("-1.5%")];
        assert_eq!(
            cast_text_column(cells),
            ColumnCast::Text(vec![
                Some("0.0761".to_string()),
                Some("n/a".to_string()),
                None,
                Some("-0.015".to_string()),
            ])
        );
    }

    #[test]
    fn cast_materializes_polars_dtype() {
        let numeric = cast_text_column([Some("10%")]).into_column("roe");
        assert_eq!(numeric.dtype(), &DataType::Float64);
        let text = cast_text_column([Some("10%"), Some("n/a")]).into_column("roe");
        assert_eq!(text.dtype(), &DataType::String);
        assert_eq!(text.str().unwrap().get(0), Some("0.1"));
    }
}
