use rustc_hash::FxHashSet;
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use log::{debug, info};

use crate::lib::common::{DiffConfig, Level, Metric};

/// # The outcome of one quantification engine run.
/// One value per replicate, collected in replicate order per sample.
/// It only records where the tables ended up, the tables themselves
/// are re-read later by the aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicateQuant {
    /// run name the engine was invoked with, e.g. `myrun_S1_R2`
    pub run_name: String,
    /// directory holding this replicate's tables
    pub dir: PathBuf,
    /// feature ids the engine flagged as unreliable, e.g. for
    /// insufficient coverage
    pub filtered_ids: Vec<String>,
}

impl ReplicateQuant {
    /// the path of this replicate's quantification table at the
    /// given granularity
    ///
    /// Unittest: TRUE
    ///
    /// ```
    /// use retention::lib::common::{Level,Metric};
    /// use retention::lib::quant::ReplicateQuant;
    /// use std::path::PathBuf;
    /// let replicate = ReplicateQuant {
    ///     run_name: String::from("myrun_S1_R1"),
    ///     dir: PathBuf::from("out/temp"),
    ///     filtered_ids: Vec::new(),
    /// };
    /// assert_eq!(
    ///     replicate.table(Metric::IRI,Level::Introns),
    ///     PathBuf::from("out/temp/myrun_S1_R1.quant.IRI.introns.txt")
    /// );
    /// ```
    pub fn table(&self, metric: Metric, level: Level) -> PathBuf {
        self.dir.join(format!(
            "{}.quant.{}.{}.txt",
            self.run_name,
            metric.file_tag(),
            level.file_tag()
        ))
    }
}

/// # The quantification engine as seen from the differential side.
/// The engine is a black box which gets one replicate file and has to
/// produce the per-level tables for it in the scratch directory,
/// following the naming of [ReplicateQuant::table]. Implemented by
/// [CommandQuantifier] for the real engine and by scripted stand-ins
/// in the tests.
pub trait Quantifier {
    /// quantify one replicate under the given run name
    fn quant(
        &self,
        replicate: &Path,
        run_name: &str,
        metric: Metric,
        scratch: &Path,
    ) -> Result<ReplicateQuant, Box<dyn Error>>;
}

/// # Runs the quantification engine as a subprocess.
/// The engine executable is handed over from the command line. Flagged
/// unreliable features are picked up from the optional side file
/// `<run-name>.quant.<METRIC>.filtered.txt`, one id per line, which
/// the engine may or may not write.
#[derive(Debug, Clone)]
pub struct CommandQuantifier {
    /// the engine executable to invoke
    pub program: String,
}

impl Quantifier for CommandQuantifier {
    fn quant(
        &self,
        replicate: &Path,
        run_name: &str,
        metric: Metric,
        scratch: &Path,
    ) -> Result<ReplicateQuant, Box<dyn Error>> {
        assert!(
            replicate.exists(),
            "ERROR: replicate file {:?} does not exists!",
            replicate
        );
        debug!("quantification of {:?} as {}", replicate, run_name);
        let status = Command::new(&self.program)
            .arg("quant")
            .arg("--input")
            .arg(replicate)
            .arg("--quanttype")
            .arg(metric.file_tag())
            .arg("--name")
            .arg(run_name)
            .arg("--outdir")
            .arg(scratch)
            .status()
            .map_err(|e| format!("could not launch the quantification engine {}: {}", self.program, e))?;
        if !status.success() {
            return Err(format!("quantification engine failed for {}: {}", run_name, status).into());
        }
        let filtered_ids = read_filtered_ids(
            &scratch.join(format!("{}.quant.{}.filtered.txt", run_name, metric.file_tag())),
        )?;
        Ok(ReplicateQuant {
            run_name: run_name.to_string(),
            dir: scratch.to_path_buf(),
            filtered_ids,
        })
    }
}

/// reads the engine's side file of flagged unreliable feature ids.
/// The file is optional, a missing one simply means nothing flagged.
///
/// Unittest: TRUE
fn read_filtered_ids(path: &Path) -> Result<Vec<String>, Box<dyn Error>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut ids: Vec<String> = Vec::new();
    for l in reader.lines() {
        let line = l?;
        let id = line.trim();
        if !id.is_empty() {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

/// # All quantifications of one differential run.
/// The two per-sample collections keep replicate order, the flagged
/// set is the union over every replicate of both samples.
#[derive(Debug)]
pub struct QuantifiedSamples {
    /// per-replicate results of sample group 1, in list order
    pub s1: Vec<ReplicateQuant>,
    /// per-replicate results of sample group 2, in list order
    pub s2: Vec<ReplicateQuant>,
    /// union of all engine-flagged unreliable feature ids
    pub flagged: FxHashSet<String>,
}

/// one sample group, strictly sequential in replicate order
fn quant_group(
    files: &[PathBuf],
    name: &str,
    sample_tag: &str,
    metric: Metric,
    quanter: &dyn Quantifier,
    scratch: &Path,
    flagged: &mut FxHashSet<String>,
) -> Result<Vec<ReplicateQuant>, Box<dyn Error>> {
    let mut replicates: Vec<ReplicateQuant> = Vec::new();
    for (index, replicate) in files.iter().enumerate() {
        let run_name = format!("{}_{}_R{}", name, sample_tag, index + 1);
        info!("Sample: {}", run_name);
        let result = quanter.quant(replicate, &run_name, metric, scratch)?;
        flagged.extend(result.filtered_ids.iter().cloned());
        replicates.push(result);
    }
    Ok(replicates)
}

/// this invokes the engine once per replicate file, sample group 1
/// first, then sample group 2, each in list order. Any engine failure
/// aborts the whole run, a partially quantified replicate set would
/// bias the aggregation.
///
/// Unittest: TRUE
pub fn quant_all_replicates(
    cfg: &DiffConfig,
    quanter: &dyn Quantifier,
    scratch: &Path,
) -> Result<QuantifiedSamples, Box<dyn Error>> {
    let mut flagged: FxHashSet<String> = FxHashSet::default();
    let s1 = quant_group(
        &cfg.s1_files,
        &cfg.name,
        "S1",
        cfg.metric,
        quanter,
        scratch,
        &mut flagged,
    )?;
    let s2 = quant_group(
        &cfg.s2_files,
        &cfg.name,
        "S2",
        cfg.metric,
        quanter,
        scratch,
        &mut flagged,
    )?;
    Ok(QuantifiedSamples { s1, s2, flagged })
}
