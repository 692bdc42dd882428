use crate::error::{DatasetError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EpsTieBreak {
    #[default]
    #[schemars(
        description = "Keep the numerically largest reported EPS among earnings rows sharing a match key."
    )]
    Maximum,

    #[schemars(
        description = "Keep the first non-missing reported EPS in the earnings table's row order."
    )]
    FirstSeen,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct SourcePaths {
    #[schemars(description = "CSV with annual balance sheets keyed by symbol and fiscalDateEnding")]
    pub balance_sheet: PathBuf,
    #[schemars(description = "CSV with annual income statements keyed by symbol and fiscalDateEnding")]
    pub income_statement: PathBuf,
    #[schemars(description = "CSV with symbol, fiscalDateEnding and reportedEPS")]
    pub earnings: PathBuf,
    #[schemars(description = "CSV with company metadata: symbol, Sector, Industry")]
    pub overview: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            balance_sheet: PathBuf::from("data/raw/balance_sheet_annual.csv"),
            income_statement: PathBuf::from("data/raw/income_statement_annual.csv"),
            earnings: PathBuf::from("data/raw/earnings_annual.csv"),
            overview: PathBuf::from("data/raw/company_overview.csv"),
        }
    }
}

impl SourcePaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            balance_sheet: dir.join("balance_sheet_annual.csv"),
            income_statement: dir.join("income_statement_annual.csv"),
            earnings: dir.join("earnings_annual.csv"),
            overview: dir.join("company_overview.csv"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct OutputPaths {
    #[schemars(description = "Merged table before the target label is attached")]
    pub merged: PathBuf,
    #[schemars(description = "Final table including year and futureEPS")]
    pub labeled: PathBuf,
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self {
            merged: PathBuf::from("data/preprocessed/preprocessed_data.csv"),
            labeled: PathBuf::from("data/preprocessed/preprocessed_data_with_target.csv"),
        }
    }
}

impl OutputPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            merged: dir.join("preprocessed_data.csv"),
            labeled: dir.join("preprocessed_data_with_target.csv"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct DatasetConfig {
    #[schemars(
        description = "Prediction horizon in years. A record at year Y is labeled with the EPS reported at year Y + horizon."
    )]
    pub horizon_years: u32,

    #[schemars(description = "How to choose between several earnings rows matching the same key")]
    pub eps_tie_break: EpsTieBreak,

    pub sources: SourcePaths,

    pub outputs: OutputPaths,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            horizon_years: 1,
            eps_tie_break: EpsTieBreak::default(),
            sources: SourcePaths::default(),
            outputs: OutputPaths::default(),
        }
    }
}

impl DatasetConfig {
    pub fn with_horizon(horizon_years: u32) -> Self {
        Self {
            horizon_years,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        validate_horizon(self.horizon_years)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DatasetConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

pub fn validate_horizon(horizon_years: u32) -> Result<()> {
    if horizon_years == 0 {
        return Err(DatasetError::InvalidHorizon(horizon_years));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DatasetConfig::from_json_str(r#"{"horizon_years": 3}"#).unwrap();
        assert_eq!(config.horizon_years, 3);
        assert_eq!(config.eps_tie_break, EpsTieBreak::Maximum);
        assert_eq!(config.sources, SourcePaths::default());
    }

    #[test]
    fn test_tie_break_from_json() {
        let config =
            DatasetConfig::from_json_str(r#"{"eps_tie_break": "first_seen"}"#).unwrap();
        assert_eq!(config.eps_tie_break, EpsTieBreak::FirstSeen);
        assert_eq!(config.horizon_years, 1);
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let result = DatasetConfig::from_json_str(r#"{"horizon_years": 0}"#);
        assert!(matches!(result, Err(DatasetError::InvalidHorizon(0))));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = DatasetConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("horizon_years"));
        assert!(schema_json.contains("eps_tie_break"));
        assert!(schema_json.contains("sources"));
    }
}
