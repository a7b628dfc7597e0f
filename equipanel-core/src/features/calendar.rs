use super::{add_features, names, FeatureRegistry, FeatureRole};
use crate::domain::Panel;
use crate::error::PipelineError;
use polars::prelude::*;

/// English weekday name of a `Date` column.
pub fn weekday_name(date: &str) -> Expr {
    col(date).dt().strftime("%A")
}

/// English month name of a `Date` column.
pub fn month_name(date: &str) -> Expr {
    col(date).dt().strftime("%B")
}

/// Adds weekday name, month name and day of month derived from each row's date.
pub fn add_calendar(panel: &mut Panel, registry: &mut FeatureRegistry) -> Result<(), PipelineError> {
    let date = panel.date_key().to_string();
    add_features(
        panel,
        registry,
        FeatureRole::Calendar,
        vec![
            (names::WEEKDAY.to_string(), weekday_name(&date)),
            (names::MONTH.to_string(), month_name(&date)),
            (
                names::DAY_IN_MONTH.to_string(),
                col(date.as_str()).dt().day().cast(DataType::Int32),
            ),
        ],
    )
}
