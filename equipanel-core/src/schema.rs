use crate::config::{FeatureConfig, PriceColumns};
use crate::domain::Panel;
use crate::features::names;
use polars::prelude::*;
use std::fmt;

/// Pipeline stage a schema belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Joined,
    Cleaned,
    Engineered,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Joined => write!(f, "joined"),
            Stage::Cleaned => write!(f, "cleaned"),
            Stage::Engineered => write!(f, "engineered"),
        }
    }
}

/// Required, typed columns at a stage boundary.
#[derive(Debug, Clone)]
pub struct StageSchema {
    stage: Stage,
    schema: Schema,
}

fn keys(cols: &PriceColumns) -> Vec<Field> {
    vec![
        Field::new(cols.entity.as_str().into(), DataType::String),
        Field::new(cols.date.as_str().into(), DataType::Date),
    ]
}

fn number(name: &str) -> Field {
    Field::new(name.into(), DataType::Float64)
}

impl StageSchema {
    /// Output of the joiner: the keys and the market fields every later
    /// stage reads.
    pub fn joined(cols: &PriceColumns) -> Self {
        let mut fields = keys(cols);
        fields.extend(
            [
                &cols.open,
                &cols.high,
                &cols.low,
                &cols.close,
                &cols.volume_units,
                &cols.num_transactions,
            ]
            .into_iter()
            .map(|name| number(name)),
        );
        Self {
            stage: Stage::Joined,
            schema: Schema::from_iter(fields),
        }
    }

    /// Output of the cleaner: joined fields plus the recomputed change.
    pub fn cleaned(cols: &PriceColumns) -> Self {
        let mut fields: Vec<Field> = Self::joined(cols).schema.iter_fields().collect();
        fields.push(number(&cols.pct_change));
        Self {
            stage: Stage::Cleaned,
            schema: Schema::from_iter(fields),
        }
    }

    /// Output of the feature engine.
    pub fn engineered(cfg: &FeatureConfig, cols: &PriceColumns) -> Self {
        let mut fields = keys(cols);
        for t in 1..=cfg.lags {
            fields.push(number(&names::lagged(&names::horizon_return(1), t)));
        }
        for t in 1..=cfg.lags {
            fields.push(number(&names::lagged(&cols.num_transactions, t)));
            fields.push(number(&names::lagged(&cols.volume_units, t)));
            fields.push(number(&names::lagged(names::CURRENCY_VOLUME, t)));
        }
        fields.push(number(names::TARGET));
        for &h in &cfg.momentum_horizons {
            fields.push(number(&names::momentum(h)));
        }
        let (short, long) = cfg.momentum_spread;
        fields.push(number(&names::momentum_spread(short, long)));
        fields.extend(names::ALPHAS.into_iter().map(number));
        fields.push(Field::new(names::WEEKDAY.into(), DataType::String));
        fields.push(Field::new(names::MONTH.into(), DataType::String));
        fields.push(Field::new(names::DAY_IN_MONTH.into(), DataType::Int32));

        Self {
            stage: Stage::Engineered,
            schema: Schema::from_iter(fields),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate a panel against this schema.
    pub fn validate(&self, panel: &Panel) -> Result<(), SchemaError> {
        let actual = panel.frame().schema();

        for field in self.schema.iter_fields() {
            if !actual.contains(field.name()) {
                return Err(SchemaError::MissingColumn {
                    stage: self.stage,
                    column: field.name().to_string(),
                });
            }
        }

        for field in self.schema.iter_fields() {
            let actual_dtype = actual.get(field.name()).ok_or_else(|| SchemaError::MissingColumn {
                stage: self.stage,
                column: field.name().to_string(),
            })?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    stage: self.stage,
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchemaError {
    #[error("{stage} panel is missing required column: {column}")]
    MissingColumn { stage: Stage, column: String },

    #[error("{stage} panel column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        stage: Stage,
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
