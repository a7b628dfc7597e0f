//! Source tables in, model-ready panel out.

use crate::clean::{clean_panel, CleanReport};
use crate::config::PipelineConfig;
use crate::domain::{Panel, SourceTables};
use crate::error::PipelineError;
use crate::features::{engineer_features, FeatureReport};
use crate::join::{join_sources, JoinReport};
use crate::schema::StageSchema;
use serde::Serialize;
use tracing::info_span;

/// Stage reports of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub join: JoinReport,
    pub clean: CleanReport,
    pub features: FeatureReport,
}

/// Validate the config, then join, clean and engineer features, checking the
/// stage schema after each step. The first failure aborts the run.
pub fn build_panel(
    sources: &SourceTables,
    config: &PipelineConfig,
) -> Result<(Panel, PipelineReport), PipelineError> {
    config.validate()?;
    let cols = &config.columns;

    let (joined, join) = info_span!("join").in_scope(|| join_sources(sources, config))?;
    StageSchema::joined(cols).validate(&joined)?;

    let (cleaned, clean) = info_span!("clean").in_scope(|| clean_panel(joined, config))?;
    StageSchema::cleaned(cols).validate(&cleaned)?;

    let (panel, features) =
        info_span!("features").in_scope(|| engineer_features(cleaned, config))?;
    StageSchema::engineered(&config.features, cols).validate(&panel)?;

    Ok((panel, PipelineReport { join, clean, features }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{generate_sources, SyntheticSpec};

    #[test]
    fn synthetic_sources_build_a_panel() {
        let sources = generate_sources(&SyntheticSpec::default()).unwrap();
        let (panel, report) = build_panel(&sources, &PipelineConfig::default()).unwrap();
        assert!(panel.height() > 0);
        assert_eq!(report.join.entities, 5);
        assert_eq!(report.join.unresolved_securities.len(), 1);
        assert!(report.clean.normalized_columns.contains(&"roe".to_string()));
        assert!(panel.first_duplicate_key().unwrap().is_none());
    }

    #[test]
    fn invalid_config_stops_before_joining() {
        let sources = generate_sources(&SyntheticSpec::default()).unwrap();
        let mut config = PipelineConfig::default();
        config.features.macd_fast = 30;
        let err = build_panel(&sources, &config).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn missing_market_field_fails_schema() {
        let mut sources = generate_sources(&SyntheticSpec::default()).unwrap();
        sources.prices.rename_column("num_transactions", "trades");
        let err = build_panel(&sources, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }
}
