//! # Earnings Dataset Builder
//!
//! A library for reconciling independently sourced annual financial tables
//! (balance sheet, income statement, reported EPS, company overview) into one
//! denormalized record set, labeled with the EPS reported a configurable
//! number of years later.
//!
//! ## Core Concepts
//!
//! - **Statement merge**: balance sheet and income statement rows are inner-joined on
//!   `(symbol, fiscalDateEnding)`
//! - **EPS tiers**: reported EPS is matched on the exact period end, then the year-month,
//!   then the year. Looser tiers only fill what stricter tiers left empty
//! - **Deduplication**: repeated `(symbol, year)` records collapse to one by column-wise maximum
//! - **Target label**: `futureEPS` for year `Y` is the entity's EPS at `Y + horizon`
//!
//! ## Example
//!
//! ```rust,ignore
//! use earnings_dataset_builder::*;
//!
//! let config = DatasetConfig::with_horizon(1);
//! let sources = load_sources(&config.sources)?;
//! let dataset = build_dataset(&config, sources)?;
//!
//! println!("{}", dataset.report.summary());
//! ```

pub mod config;
pub mod error;
pub mod frame;
pub mod ingestion;
pub mod labels;
pub mod merger;
pub mod report;
pub mod schema;

pub use config::{validate_horizon, DatasetConfig, EpsTieBreak, OutputPaths, SourcePaths};
pub use error::{DatasetError, Result};
pub use frame::{column_names, count_duplicate_keys, has_column};
pub use ingestion::{load_sources, read_table, write_table, MISSING_TOKENS};
pub use labels::{find_duplicate_years, LabelBuilder};
pub use merger::{MatchTier, SourceMerger};
pub use report::*;
pub use schema::*;

use log::{debug, info};
use polars::prelude::DataFrame;

/// Output of one run: the merged table before labeling, the labeled table
/// and the diagnostics gathered along the way.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub merged: DataFrame,
    pub labeled: DataFrame,
    pub report: DatasetReport,
}

pub struct DatasetBuilder {
    config: DatasetConfig,
}

impl DatasetBuilder {
    pub fn new(config: DatasetConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Runs both stages over already-parsed tables.
    pub fn build(&self, sources: SourceTables) -> Result<Dataset> {
        info!(
            "Building dataset with a {} year horizon",
            self.config.horizon_years
        );

        let merger = SourceMerger::new(self.config.eps_tie_break);
        let (merged, merge_report) = merger.merge(sources)?;

        let labeler = LabelBuilder::new(self.config.horizon_years)?;
        let (labeled, label_report) = labeler.build(merged.clone())?;

        let report = DatasetReport::new(merge_report, label_report);
        debug!("{}", report.summary());

        Ok(Dataset {
            merged,
            labeled,
            report,
        })
    }

    /// Loads the configured sources, builds the dataset and writes both
    /// output tables.
    pub fn run(&self) -> Result<Dataset> {
        let sources = load_sources(&self.config.sources)?;
        let dataset = self.build(sources)?;

        write_table(&self.config.outputs.merged, &dataset.merged)?;
        write_table(&self.config.outputs.labeled, &dataset.labeled)?;

        info!("{}", dataset.report.summary());
        Ok(dataset)
    }
}

pub fn build_dataset(config: &DatasetConfig, sources: SourceTables) -> Result<Dataset> {
    DatasetBuilder::new(config.clone())?.build(sources)
}

pub fn run_pipeline(config: &DatasetConfig) -> Result<Dataset> {
    DatasetBuilder::new(config.clone())?.run()
}
