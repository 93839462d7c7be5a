use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::io::Read as IoRead;
use std::path::{Path, PathBuf};
use log::debug;

/// the marker used by the quantification engine for a value
/// which could not be measured in a replicate
pub const NA_MARKER: &str = "NA";
/// the marker used by the quantification engine for a ratio
/// with an empty denominator
pub const INF_MARKER: &str = "inf";

/// # The supported quantification metrics.
/// Both describe the degree of intron retention but are derived
/// differently by the upstream engine and are not comparable with
/// each other. They also differ in the feature levels on which
/// the differential analysis can be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// intron retention intensity, a continuous ratio-style
    /// measure of the retained intron signal.
    /// Available on intron and gene level.
    IRI,
    /// intron retention coefficient, derived from read counts
    /// over junctions. Available on intron, gene and junction level.
    IRC,
}

/// # The feature granularity of a differential comparison.
/// Which levels are available depends on the metric, see [Metric].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// single candidate retained introns
    Introns,
    /// all introns of a gene combined
    Genes,
    /// single splice junctions, IRC only
    Junctions,
}

/// # The statistical design of the comparison.
/// Paired requires the same number of replicates in both samples
/// and that replicate i of sample 1 corresponds to replicate i of
/// sample 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analysis {
    /// replicates of both samples are matched pairs
    Paired,
    /// replicates of both samples are independent
    Unpaired,
}

impl Metric {
    /// the tag used within all file names, e.g. `myrun.diff.IRI.introns.txt`
    pub fn file_tag(&self) -> &'static str {
        match self {
            Metric::IRI => "IRI",
            Metric::IRC => "IRC",
        }
    }

    /// the feature levels which the differential analysis
    /// supports for this metric, in processing order
    pub fn levels(&self) -> &'static [Level] {
        match self {
            Metric::IRI => &[Level::Introns, Level::Genes],
            Metric::IRC => &[Level::Introns, Level::Genes, Level::Junctions],
        }
    }

    /// the 0-based column within the whitespace-split rows of the
    /// engine's quantification table which holds the metric value
    /// at a given level. The leading column is always the feature id.
    pub fn value_column(&self, level: Level) -> usize {
        match (*self, level) {
            (Metric::IRI, Level::Introns) => 8,
            (Metric::IRI, Level::Genes) => 8,
            (Metric::IRI, Level::Junctions) => {
                panic!("ERROR: junction level is not available for the IRI metric!")
            }
            (Metric::IRC, Level::Introns) => 5,
            (Metric::IRC, Level::Genes) => 4,
            (Metric::IRC, Level::Junctions) => 5,
        }
    }
}

impl Level {
    /// the tag used within all file names, e.g. `myrun.diff.IRI.introns.txt`
    pub fn file_tag(&self) -> &'static str {
        match self {
            Level::Introns => "introns",
            Level::Genes => "genes",
            Level::Junctions => "junctions",
        }
    }

    /// the leading id column of tables on this level.
    /// The engine emits it as first field of its header row, too,
    /// which is how the header is recognized and skipped.
    pub fn id_header(&self) -> &'static str {
        match self {
            Level::Introns => "CIR_id",
            Level::Genes => "gene_id",
            Level::Junctions => "CJ_id",
        }
    }

    /// the feature name as used in log messages
    pub fn feature_name(&self) -> &'static str {
        match self {
            Level::Introns => "intron",
            Level::Genes => "gene",
            Level::Junctions => "junction",
        }
    }

    /// the stub of the per-sample value columns in intermediate and
    /// result tables, e.g. `intron_IRI` for `intron_IRI_S1`
    ///
    /// Unittest: TRUE
    ///
    /// ```
    /// use retention::lib::common::{Level,Metric};
    /// assert_eq!(Level::Junctions.column_stub(Metric::IRC),"junction_IRC");
    /// assert_eq!(Level::Genes.column_stub(Metric::IRI),"gene_IRI");
    /// ```
    pub fn column_stub(&self, metric: Metric) -> String {
        format!("{}_{}", self.feature_name(), metric.file_tag())
    }
}

/// # The full configuration of one differential IR run.
/// Gathered from the command line and passed unchanged through
/// the whole pipeline.
#[derive(Debug, Clone)]
pub struct DiffConfig {
    /// name of the analysis, used as prefix of every produced file
    pub name: String,
    /// replicate files of sample group 1
    pub s1_files: Vec<PathBuf>,
    /// replicate files of sample group 2
    pub s2_files: Vec<PathBuf>,
    /// directory for the final result tables
    pub outdir: PathBuf,
    /// paired or unpaired design
    pub analysis: Analysis,
    /// the quantification metric to compare
    pub metric: Metric,
}

/// this verifies whether a raw table value is usable for statistics.
/// The engine writes `NA` for unmeasurable features and `inf` for
/// ratios with an empty denominator and both must stay out of any
/// computation while being kept verbatim for the output. Note that
/// Rust would happily parse `inf` into a float, so the markers are
/// checked before parsing.
///
/// Unittest: TRUE
///
/// ```
/// use retention::lib::common::numeric_value;
/// assert_eq!(numeric_value("1.5"),Some(1.5));
/// assert_eq!(numeric_value("NA"),None);
/// assert_eq!(numeric_value("inf"),None);
/// ```
pub fn numeric_value(raw: &str) -> Option<f64> {
    if raw == NA_MARKER || raw == INF_MARKER {
        return None;
    }
    raw.parse::<f64>().ok()
}

/// this splits the comma-separated replicate list from the command line
/// into paths, dropping surrounding whitespace and empty entries
///
/// Unittest: TRUE
///
/// ```
/// use retention::lib::common::split_file_list;
/// use std::path::PathBuf;
/// let files = split_file_list("a.bam, b.bam");
/// assert_eq!(files,vec![PathBuf::from("a.bam"),PathBuf::from("b.bam")]);
/// ```
pub fn split_file_list(arg: &str) -> Vec<PathBuf> {
    arg.split(',')
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// this checks the replicate lists before anything is run or written.
/// The t-tests need at least two replicates per sample and the paired
/// design additionally identical replicate numbers. The returned
/// message is thought to be logged by the caller before aborting.
///
/// Unittest: TRUE
pub fn verify_replicate_lists(
    s1_count: usize,
    s2_count: usize,
    analysis: Analysis,
) -> Result<(), String> {
    if s1_count < 2 || s2_count < 2 {
        return Err(String::from(
            "Differential IR analysis requires at least two replicates per sample. Please check input.",
        ));
    }
    if analysis == Analysis::Paired && s1_count != s2_count {
        return Err(String::from(
            "Samples must have the same number of replicates for paired analysis. Please check input.",
        ));
    }
    Ok(())
}

/// this prepares the scratch directory for the per-replicate engine
/// tables and the aggregated input tables. We try `<outdir>/temp` and
/// fall back to the output directory itself if it cannot be created.
///
/// Unittest: TRUE
pub fn check_temp_dir(outdir: &Path) -> PathBuf {
    let temp_dir = outdir.join("temp");
    let scratch = match fs::create_dir_all(&temp_dir) {
        Ok(_) => temp_dir,
        Err(e) => {
            debug!("could not create {:?} ({}), intermediate files go to the output directory", temp_dir, e);
            outdir.to_path_buf()
        }
    };
    eprintln!("INFO: intermediate files will be written to {:?}", scratch);
    scratch
}

/// adapted from here https://users.rust-lang.org/t/efficient-way-of-checking-if-two-files-have-the-same-content/74735
/// very useful in tests to verify that a produced result table is identical
/// to a previously generated one, e.g. for the rerun determinism guarantee
pub fn is_same_file(
    file1: &Path,
    file2: &Path
) -> Result<bool, std::io::Error> {
    println!("INFO: comparing file {:?} with file {:?}", file1.to_str(), file2.to_str());
    let reader1 = BufReader::new(File::open(file1)?);
    let reader2 = BufReader::new(File::open(file2)?);

    // byte to byte comparison of the two files
    let mut bytes2 = reader2.bytes();
    for b1 in reader1.bytes() {
        match bytes2.next() {
            Some(b2) => {
                if b1? != b2? {
                    return Ok(false);
                }
            }
            // first file is longer
            None => return Ok(false),
        }
    }
    // second file must be exhausted as well
    Ok(bytes2.next().is_none())
}
