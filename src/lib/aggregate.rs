use rustc_hash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use log::debug;

use crate::lib::common::{Level, Metric, NA_MARKER};
use crate::lib::quant::ReplicateQuant;

/// # The collected values of one feature across all replicates.
/// Raw strings as found in the engine tables, including the NA and
/// inf markers. Index within a vector is the replicate index of the
/// sample, both vectors are kept rectangular with the replicate
/// counts so that paired positions stay meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureRecord {
    /// raw values of sample group 1, one per replicate
    pub s1: Vec<String>,
    /// raw values of sample group 2, one per replicate
    pub s2: Vec<String>,
}

/// reads one engine table into feature id -> raw value, keeping only
/// the designated value column. Rows are whitespace-split, the header
/// row is recognized by its leading id field and skipped. A duplicated
/// id within one table resolves to the last occurrence.
fn read_value_column(
    table: &Path,
    column: usize,
    id_header: &str,
) -> Result<FxHashMap<String, String>, Box<dyn Error>> {
    let file = File::open(table)
        .map_err(|e| format!("could not open quantification table {:?}: {}", table, e))?;
    let reader = BufReader::new(file);
    let mut values: FxHashMap<String, String> = FxHashMap::default();
    for l in reader.lines() {
        let line = l?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() || fields[0] == id_header {
            continue;
        }
        let value = fields.get(column).ok_or_else(|| {
            format!(
                "quantification table {:?} misses column {} for feature {}",
                table,
                column + 1,
                fields[0]
            )
        })?;
        values.insert(fields[0].to_string(), value.to_string());
    }
    Ok(values)
}

/// this merges the per-replicate engine tables of one granularity into
/// per-feature records. The first replicate of sample group 1 fixes the
/// universe of feature ids, every further table of both groups is then
/// matched against it BY ID, never by row position, so differing row
/// order or coverage between replicate tables cannot shift values into
/// the wrong slot. An id missing from a later table contributes the NA
/// marker, an id outside the universe is ignored. Features flagged
/// unreliable by the engine never enter the mapping.
///
/// Unittest: TRUE
pub fn aggregate_level(
    s1: &[ReplicateQuant],
    s2: &[ReplicateQuant],
    metric: Metric,
    level: Level,
    flagged: &FxHashSet<String>,
) -> Result<FxHashMap<String, FeatureRecord>, Box<dyn Error>> {
    let column = metric.value_column(level);
    let id_header = level.id_header();
    let mut features: FxHashMap<String, FeatureRecord> = FxHashMap::default();

    for (index, replicate) in s1.iter().enumerate() {
        let values = read_value_column(&replicate.table(metric, level), column, id_header)?;
        if index == 0 {
            for (id, value) in values {
                if flagged.contains(&id) {
                    continue;
                }
                features.insert(
                    id,
                    FeatureRecord {
                        s1: vec![value],
                        s2: Vec::new(),
                    },
                );
            }
        } else {
            for (id, record) in features.iter_mut() {
                match values.get(id) {
                    Some(value) => record.s1.push(value.clone()),
                    None => record.s1.push(NA_MARKER.to_string()),
                }
            }
        }
    }
    for replicate in s2.iter() {
        let values = read_value_column(&replicate.table(metric, level), column, id_header)?;
        for (id, record) in features.iter_mut() {
            match values.get(id) {
                Some(value) => record.s2.push(value.clone()),
                None => record.s2.push(NA_MARKER.to_string()),
            }
        }
    }
    debug!(
        "aggregated {} features on {} level",
        features.len(),
        level.feature_name()
    );
    Ok(features)
}

/// this writes the aggregated values of one granularity as the
/// intermediate input table `<name>.diff.input.<METRIC>.<level>.txt`
/// into the scratch directory. Rows are sorted ascending by feature id
/// and carry one comma-joined column per sample group. Returns the
/// path of the written table.
///
/// Unittest: TRUE
pub fn write_input_table(
    features: &FxHashMap<String, FeatureRecord>,
    name: &str,
    metric: Metric,
    level: Level,
    scratch: &Path,
) -> Result<PathBuf, Box<dyn Error>> {
    let path = scratch.join(format!(
        "{}.diff.input.{}.{}.txt",
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
    writer.write_record(&[level.id_header(), s1_column.as_str(), s2_column.as_str()])?;
    for id in features.keys().sorted() {
        let record = &features[id];
        let s1_values = record.s1.join(",");
        let s2_values = record.s2.join(",");
        writer.write_record(&[id.as_str(), s1_values.as_str(), s2_values.as_str()])?;
    }
    writer.flush()?;
    Ok(path)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// one table row with the id leading and the value at the wanted
    /// 0-based column, padded with placeholder fields in between
    fn table_row(id: &str, column: usize, value: &str) -> String {
        let mut fields: Vec<String> = vec![id.to_string()];
        for _ in 1..column {
            fields.push(String::from("."));
        }
        fields.push(value.to_string());
        fields.join("\t")
    }

    /// writes an engine table for one replicate and granularity and
    /// returns the matching per-replicate record
    fn scripted_replicate(
        dir: &Path,
        run_name: &str,
        metric: Metric,
        level: Level,
        rows: &[String],
    ) -> ReplicateQuant {
        let replicate = ReplicateQuant {
            run_name: run_name.to_string(),
            dir: dir.to_path_buf(),
            filtered_ids: Vec::new(),
        };
        let header = table_row(level.id_header(), metric.value_column(level), "value");
        let mut content = header;
        for row in rows {
            content.push('\n');
            content.push_str(row);
        }
        content.push('\n');
        fs::write(replicate.table(metric, level), content)
            .expect("ERROR: could not write test table!");
        replicate
    }

    #[test]
    fn values_aggregated_per_group() {
        let dir = tempfile::tempdir().unwrap();
        let column = Metric::IRI.value_column(Level::Introns);
        let s1 = vec![
            scripted_replicate(
                dir.path(),
                "run_S1_R1",
                Metric::IRI,
                Level::Introns,
                &[
                    table_row("CIR_1", column, "0.1"),
                    table_row("CIR_2", column, "0.5"),
                ],
            ),
            scripted_replicate(
                dir.path(),
                "run_S1_R2",
                Metric::IRI,
                Level::Introns,
                &[
                    table_row("CIR_1", column, "0.2"),
                    table_row("CIR_2", column, "NA"),
                ],
            ),
        ];
        let s2 = vec![
            scripted_replicate(
                dir.path(),
                "run_S2_R1",
                Metric::IRI,
                Level::Introns,
                &[
                    table_row("CIR_1", column, "0.3"),
                    table_row("CIR_2", column, "0.6"),
                ],
            ),
            scripted_replicate(
                dir.path(),
                "run_S2_R2",
                Metric::IRI,
                Level::Introns,
                &[
                    table_row("CIR_1", column, "0.4"),
                    table_row("CIR_2", column, "inf"),
                ],
            ),
        ];
        let features = aggregate_level(
            &s1,
            &s2,
            Metric::IRI,
            Level::Introns,
            &FxHashSet::default(),
        )
        .unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(
            features["CIR_1"],
            FeatureRecord {
                s1: vec![String::from("0.1"), String::from("0.2")],
                s2: vec![String::from("0.3"), String::from("0.4")],
            }
        );
        assert_eq!(
            features["CIR_2"],
            FeatureRecord {
                s1: vec![String::from("0.5"), String::from("NA")],
                s2: vec![String::from("0.6"), String::from("inf")],
            }
        );
    }

    #[test]
    fn alignment_by_id_not_row_order() {
        let dir = tempfile::tempdir().unwrap();
        let column = Metric::IRC.value_column(Level::Junctions);
        let s1 = vec![
            scripted_replicate(
                dir.path(),
                "run_S1_R1",
                Metric::IRC,
                Level::Junctions,
                &[
                    table_row("CJ_1", column, "10"),
                    table_row("CJ_2", column, "20"),
                ],
            ),
            // rows deliberately in reversed order
            scripted_replicate(
                dir.path(),
                "run_S1_R2",
                Metric::IRC,
                Level::Junctions,
                &[
                    table_row("CJ_2", column, "21"),
                    table_row("CJ_1", column, "11"),
                ],
            ),
        ];
        let s2 = vec![
            scripted_replicate(
                dir.path(),
                "run_S2_R1",
                Metric::IRC,
                Level::Junctions,
                &[
                    table_row("CJ_1", column, "30"),
                    table_row("CJ_2", column, "40"),
                ],
            ),
            scripted_replicate(
                dir.path(),
                "run_S2_R2",
                Metric::IRC,
                Level::Junctions,
                &[
                    table_row("CJ_2", column, "41"),
                    table_row("CJ_1", column, "31"),
                ],
            ),
        ];
        let features = aggregate_level(
            &s1,
            &s2,
            Metric::IRC,
            Level::Junctions,
            &FxHashSet::default(),
        )
        .unwrap();
        assert_eq!(
            features["CJ_1"],
            FeatureRecord {
                s1: vec![String::from("10"), String::from("11")],
                s2: vec![String::from("30"), String::from("31")],
            }
        );
        assert_eq!(
            features["CJ_2"],
            FeatureRecord {
                s1: vec![String::from("20"), String::from("21")],
                s2: vec![String::from("40"), String::from("41")],
            }
        );
    }

    #[test]
    fn missing_feature_becomes_na() {
        let dir = tempfile::tempdir().unwrap();
        let column = Metric::IRI.value_column(Level::Genes);
        let s1 = vec![
            scripted_replicate(
                dir.path(),
                "run_S1_R1",
                Metric::IRI,
                Level::Genes,
                &[
                    table_row("gene_a", column, "1.0"),
                    table_row("gene_b", column, "2.0"),
                ],
            ),
            // gene_b dropped from this table, gene_c is unknown
            scripted_replicate(
                dir.path(),
                "run_S1_R2",
                Metric::IRI,
                Level::Genes,
                &[
                    table_row("gene_a", column, "1.5"),
                    table_row("gene_c", column, "9.9"),
                ],
            ),
        ];
        let s2 = vec![
            scripted_replicate(
                dir.path(),
                "run_S2_R1",
                Metric::IRI,
                Level::Genes,
                &[table_row("gene_a", column, "3.0")],
            ),
            scripted_replicate(
                dir.path(),
                "run_S2_R2",
                Metric::IRI,
                Level::Genes,
                &[
                    table_row("gene_a", column, "3.5"),
                    table_row("gene_b", column, "4.0"),
                ],
            ),
        ];
        let features = aggregate_level(
            &s1,
            &s2,
            Metric::IRI,
            Level::Genes,
            &FxHashSet::default(),
        )
        .unwrap();
        // gene_c was not in the first sample 1 replicate
        assert_eq!(features.len(), 2);
        assert_eq!(
            features["gene_b"],
            FeatureRecord {
                s1: vec![String::from("2.0"), String::from("NA")],
                s2: vec![String::from("NA"), String::from("4.0")],
            }
        );
    }

    #[test]
    fn flagged_features_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let column = Metric::IRI.value_column(Level::Introns);
        let rows_r1 = &[
            table_row("CIR_1", column, "0.1"),
            table_row("CIR_2", column, "0.5"),
        ];
        let rows_r2 = &[
            table_row("CIR_1", column, "0.2"),
            table_row("CIR_2", column, "0.6"),
        ];
        let s1 = vec![
            scripted_replicate(dir.path(), "run_S1_R1", Metric::IRI, Level::Introns, rows_r1),
            scripted_replicate(dir.path(), "run_S1_R2", Metric::IRI, Level::Introns, rows_r2),
        ];
        let s2 = vec![
            scripted_replicate(dir.path(), "run_S2_R1", Metric::IRI, Level::Introns, rows_r1),
            scripted_replicate(dir.path(), "run_S2_R2", Metric::IRI, Level::Introns, rows_r2),
        ];
        let mut flagged: FxHashSet<String> = FxHashSet::default();
        flagged.insert(String::from("CIR_2"));
        let features =
            aggregate_level(&s1, &s2, Metric::IRI, Level::Introns, &flagged).unwrap();
        assert_eq!(features.len(), 1);
        assert!(features.contains_key("CIR_1"));
        assert!(!features.contains_key("CIR_2"));
    }

    #[test]
    fn duplicated_id_resolves_last() {
        let dir = tempfile::tempdir().unwrap();
        let column = Metric::IRC.value_column(Level::Introns);
        let s1 = vec![
            scripted_replicate(
                dir.path(),
                "run_S1_R1",
                Metric::IRC,
                Level::Introns,
                &[
                    table_row("CIR_1", column, "0.1"),
                    table_row("CIR_1", column, "0.9"),
                ],
            ),
            scripted_replicate(
                dir.path(),
                "run_S1_R2",
                Metric::IRC,
                Level::Introns,
                &[table_row("CIR_1", column, "0.2")],
            ),
        ];
        let s2 = vec![
            scripted_replicate(
                dir.path(),
                "run_S2_R1",
                Metric::IRC,
                Level::Introns,
                &[table_row("CIR_1", column, "0.3")],
            ),
            scripted_replicate(
                dir.path(),
                "run_S2_R2",
                Metric::IRC,
                Level::Introns,
                &[table_row("CIR_1", column, "0.4")],
            ),
        ];
        let features = aggregate_level(
            &s1,
            &s2,
            Metric::IRC,
            Level::Introns,
            &FxHashSet::default(),
        )
        .unwrap();
        assert_eq!(features["CIR_1"].s1[0], "0.9");
    }

    #[test]
    fn missing_table_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let column = Metric::IRI.value_column(Level::Introns);
        let s1 = vec![
            scripted_replicate(
                dir.path(),
                "run_S1_R1",
                Metric::IRI,
                Level::Introns,
                &[table_row("CIR_1", column, "0.1")],
            ),
            // no table written for this replicate
            ReplicateQuant {
                run_name: String::from("run_S1_R2"),
                dir: dir.path().to_path_buf(),
                filtered_ids: Vec::new(),
            },
        ];
        let result = aggregate_level(
            &s1,
            &[],
            Metric::IRI,
            Level::Introns,
            &FxHashSet::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn short_row_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let s1 = vec![
            scripted_replicate(
                dir.path(),
                "run_S1_R1",
                Metric::IRI,
                Level::Introns,
                &[String::from("CIR_1\t0.5")],
            ),
            scripted_replicate(
                dir.path(),
                "run_S1_R2",
                Metric::IRI,
                Level::Introns,
                &[String::from("CIR_1\t0.5")],
            ),
        ];
        let result = aggregate_level(
            &s1,
            &[],
            Metric::IRI,
            Level::Introns,
            &FxHashSet::default(),
        );
        let message = result.unwrap_err().to_string();
        assert!(message.contains("misses column"));
    }

    #[test]
    fn input_table_written_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let mut features: FxHashMap<String, FeatureRecord> = FxHashMap::default();
        features.insert(
            String::from("CIR_2"),
            FeatureRecord {
                s1: vec![String::from("0.5"), String::from("NA")],
                s2: vec![String::from("0.6"), String::from("0.7")],
            },
        );
        features.insert(
            String::from("CIR_1"),
            FeatureRecord {
                s1: vec![String::from("0.1"), String::from("0.2")],
                s2: vec![String::from("0.3"), String::from("0.4")],
            },
        );
        let path = write_input_table(&features, "myrun", Metric::IRI, Level::Introns, dir.path())
            .unwrap();
        assert_eq!(
            path,
            dir.path().join("myrun.diff.input.IRI.introns.txt")
        );
        let content = fs::read_to_string(&path).unwrap();
        let expected = "CIR_id\tintron_IRI_S1\tintron_IRI_S2\n\
                        CIR_1\t0.1,0.2\t0.3,0.4\n\
                        CIR_2\t0.5,NA\t0.6,0.7\n";
        assert_eq!(content, expected);
    }
}
