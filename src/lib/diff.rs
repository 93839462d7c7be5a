use rustc_hash::FxHashMap;
use itertools::Itertools;
use statistical::mean;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use log::info;

use crate::lib::aggregate::{aggregate_level, write_input_table, FeatureRecord};
use crate::lib::common::{
    check_temp_dir, verify_replicate_lists, Analysis, DiffConfig, Level, Metric,
};
use crate::lib::quant::{quant_all_replicates, Quantifier};
use crate::lib::stats::{
    benjamini_hochberg, count_distinct, paired_t_test, retained_paired, retained_unpaired,
    unpaired_t_test,
};

/// # One feature which survived filtering and testing.
/// Carries the raw value sequences for the output next to the
/// statistics, in the id order the records were produced in.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRecord {
    /// feature id
    pub id: String,
    /// two-sided p-value of the t-test
    pub pvalue: f64,
    /// raw values of sample group 1, markers included
    pub raw_s1: Vec<String>,
    /// raw values of sample group 2, markers included
    pub raw_s2: Vec<String>,
    /// mean(sample 2) - mean(sample 1) over the retained numeric values
    pub difference: f64,
}

/// the fused filter and test stage. Walks the features in ascending id
/// order and keeps one [DiffRecord] per feature which
///  - retains enough numeric values (two per sample at least),
///  - shows more than one distinct value over both samples,
///  - yields a real p-value from the configured t-test.
/// Everything else is silently skipped as untestable, an expected data
/// condition and not an error.
///
/// Unittest: TRUE
pub fn analyze_features(
    features: &FxHashMap<String, FeatureRecord>,
    analysis: Analysis,
) -> Vec<DiffRecord> {
    let mut records: Vec<DiffRecord> = Vec::new();
    for id in features.keys().sorted() {
        let record = &features[id];
        let (num1, num2) = match analysis {
            Analysis::Paired => retained_paired(&record.s1, &record.s2),
            Analysis::Unpaired => retained_unpaired(&record.s1, &record.s2),
        };
        // a single distinct value carries zero variance
        if count_distinct(&num1, &num2) == 1 {
            continue;
        }
        if num1.len() < 2 || num2.len() < 2 {
            continue;
        }
        let pvalue = match analysis {
            Analysis::Paired => paired_t_test(&num1, &num2),
            Analysis::Unpaired => unpaired_t_test(&num1, &num2),
        };
        if pvalue.is_nan() {
            continue;
        }
        records.push(DiffRecord {
            id: id.clone(),
            pvalue,
            raw_s1: record.s1.clone(),
            raw_s2: record.s2.clone(),
            difference: mean(&num2) - mean(&num1),
        });
    }
    records
}

/// this writes the final result table of one granularity into the
/// output directory, `<name>.diff.<METRIC>.<level>.txt`. One row per
/// surviving feature in ascending id order with its raw values, the
/// p-value, the FDR and the mean difference. Returns the path of the
/// written table.
///
/// Unittest: TRUE
pub fn write_results_table(
    records: &[DiffRecord],
    fdr: &[f64],
    name: &str,
    metric: Metric,
    level: Level,
    outdir: &Path,
) -> Result<PathBuf, Box<dyn Error>> {
    assert_eq!(
        records.len(),
        fdr.len(),
        "ERROR: the FDR list must match the tested features!"
    );
    let path = outdir.join(format!(
        "{}.diff.{}.{}.txt",
        name,
        metric.file_tag(),
        level.file_tag()
    ));
    let stub = level.column_stub(metric);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&path)?;
    let s1_column = format!("{}_S1", stub);
    let s2_column = format!("{}_S2", stub);
    let diff_column = format!("{}_difference", stub);
    writer.write_record(&[
        level.id_header(),
        "PValue",
        "FDR",
        s1_column.as_str(),
        s2_column.as_str(),
        diff_column.as_str(),
    ])?;
    for (record, corrected) in records.iter().zip(fdr.iter()) {
        let pvalue = record.pvalue.to_string();
        let fdr_value = corrected.to_string();
        let s1_values = record.raw_s1.join(",");
        let s2_values = record.raw_s2.join(",");
        let difference = record.difference.to_string();
        writer.write_record(&[
            record.id.as_str(),
            pvalue.as_str(),
            fdr_value.as_str(),
            s1_values.as_str(),
            s2_values.as_str(),
            difference.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(path)
}

/// the whole differential IR analysis for one configuration:
/// quantification of every replicate of both samples, then per
/// granularity of the metric the aggregation, the intermediate input
/// table, the fused filter+test stage, the FDR correction and the
/// final result table. The same pipeline serves IRI and IRC, only the
/// granularity list and the value columns differ via [Metric].
///
/// Unittest: TRUE
pub fn run_diff(cfg: &DiffConfig, quanter: &dyn Quantifier) -> Result<(), Box<dyn Error>> {
    verify_replicate_lists(cfg.s1_files.len(), cfg.s2_files.len(), cfg.analysis)?;
    fs::create_dir_all(&cfg.outdir)?;
    let scratch = check_temp_dir(&cfg.outdir);

    info!("Performing quantification for all replicates of both samples");
    let samples = quant_all_replicates(cfg, quanter, &scratch)?;

    for level in cfg.metric.levels() {
        info!(
            "Generating inputs for analysis of differential IR on {} level",
            level.feature_name()
        );
        let features = aggregate_level(&samples.s1, &samples.s2, cfg.metric, *level, &samples.flagged)?;
        let input_path = write_input_table(&features, &cfg.name, cfg.metric, *level, &scratch)?;
        info!(
            "Analysis inputs on {} level can be found in {:?}",
            level.feature_name(),
            input_path
        );

        info!(
            "Running analysis of differential IR on {} level",
            level.feature_name()
        );
        let records = analyze_features(&features, cfg.analysis);
        let pvalues: Vec<f64> = records.iter().map(|record| record.pvalue).collect();
        let fdr = benjamini_hochberg(&pvalues);
        let result_path =
            write_results_table(&records, &fdr, &cfg.name, cfg.metric, *level, &cfg.outdir)?;
        info!(
            "Differential IR results on {} level can be found in {:?}",
            level.feature_name(),
            result_path
        );
    }
    Ok(())
}
