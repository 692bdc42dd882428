use earnings_dataset_builder::{run_pipeline, DatasetConfig};
use std::env;

fn main() {
    let config = match env::args().nth(1) {
        Some(path) => DatasetConfig::from_path(&path).expect("config file should parse"),
        None => DatasetConfig::default(),
    };

    println!("Building dataset:");
    println!(" - horizon: {} year(s)", config.horizon_years);
    println!(" - EPS tie-break: {:?}", config.eps_tie_break);

    let dataset = match run_pipeline(&config) {
        Ok(dataset) => dataset,
        Err(e) => {
            eprintln!("Dataset build failed: {}", e);
            std::process::exit(1);
        }
    };

    let merge = &dataset.report.merge;
    println!("Statement join: {} rows", merge.statement_rows);
    for tier in &merge.tiers {
        println!(
            " - {:?} match: filled {}, missing EPS {:.2}%",
            tier.tier, tier.filled, tier.missing_pct
        );
    }

    let labels = &dataset.report.labels;
    for dup in &labels.duplicated_entities {
        println!(
            " - symbol: {} | records: {} | distinct years: {} | duplicate(s): {}",
            dup.entity, dup.records, dup.distinct_years, dup.duplicates
        );
    }

    println!("{}", dataset.report.summary());
    println!("Merged table written to {}", config.outputs.merged.display());
    println!("Labeled table written to {}", config.outputs.labeled.display());
}
