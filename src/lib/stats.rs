use statistical::{mean, standard_deviation, variance};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::lib::common::numeric_value;

/// this extracts the numeric values of a feature for the paired design.
/// Both sequences are walked by matching index and an index survives
/// only if the values of both samples are numeric there, which keeps
/// the positional correspondence between the paired replicates intact.
/// The returned vectors therefore always have equal length.
///
/// Unittest: TRUE
///
/// ```
/// use retention::lib::stats::retained_paired;
/// let s1 = vec!["1.0".to_string(),"NA".to_string(),"2.0".to_string()];
/// let s2 = vec!["3.0".to_string(),"4.0".to_string(),"NA".to_string()];
/// assert_eq!(retained_paired(&s1,&s2),(vec![1.0],vec![3.0]));
/// ```
pub fn retained_paired(s1: &[String], s2: &[String]) -> (Vec<f64>, Vec<f64>) {
    let mut num1: Vec<f64> = Vec::new();
    let mut num2: Vec<f64> = Vec::new();
    for (raw1, raw2) in s1.iter().zip(s2.iter()) {
        if let (Some(value1), Some(value2)) = (numeric_value(raw1), numeric_value(raw2)) {
            num1.push(value1);
            num2.push(value2);
        }
    }
    (num1, num2)
}

/// this extracts the numeric values of a feature for the unpaired
/// design. Each sample keeps all of its numeric values independently,
/// so the vectors may differ in length.
///
/// Unittest: TRUE
pub fn retained_unpaired(s1: &[String], s2: &[String]) -> (Vec<f64>, Vec<f64>) {
    let num1: Vec<f64> = s1.iter().filter_map(|raw| numeric_value(raw)).collect();
    let num2: Vec<f64> = s2.iter().filter_map(|raw| numeric_value(raw)).collect();
    (num1, num2)
}

/// this counts the distinct values over both samples combined.
/// A feature where this yields 1 carries zero variance and cannot
/// be tested. Comparison is plain float equality on purpose, the
/// values stem from identical text representations.
///
/// Unittest: TRUE
///
/// ```
/// use retention::lib::stats::count_distinct;
/// assert_eq!(count_distinct(&[0.5,0.5],&[0.5,0.5]),1);
/// assert_eq!(count_distinct(&[0.5,0.5],&[0.5,0.7]),2);
/// ```
pub fn count_distinct(s1: &[f64], s2: &[f64]) -> usize {
    let mut distinct: Vec<f64> = Vec::new();
    for value in s1.iter().chain(s2.iter()) {
        if !distinct.contains(value) {
            distinct.push(*value);
        }
    }
    distinct.len()
}

/// the two-sided p-value of a t statistic with the given degrees of
/// freedom. A NaN statistic stays NaN so the caller can drop the
/// feature, an infinite statistic (zero variance with a non-zero
/// shift) maps to a p-value of 0.
fn two_sided_p(t_stat: f64, freedom: f64) -> f64 {
    if t_stat.is_nan() {
        return f64::NAN;
    }
    if t_stat.is_infinite() {
        return 0.0;
    }
    let t_dist = StudentsT::new(0.0, 1.0, freedom)
        .expect("ERROR: invalid degrees of freedom for the t-distribution!");
    2.0 * (1.0 - t_dist.cdf(t_stat.abs()))
}

/// dependent t-test for two same-length value lists of matched pairs,
/// as used for the paired design. Returns the two-sided p-value with
/// n-1 degrees of freedom. All-zero differences yield NaN.
///
/// Unittest: TRUE
pub fn paired_t_test(s1: &[f64], s2: &[f64]) -> f64 {
    assert_eq!(
        s1.len(),
        s2.len(),
        "ERROR: the paired test requires equally sized value lists!"
    );
    assert!(
        s1.len() >= 2,
        "ERROR: the paired test requires at least two value pairs!"
    );
    let diffs: Vec<f64> = s1.iter().zip(s2.iter()).map(|(a, b)| a - b).collect();
    let n = diffs.len() as f64;
    // sample standard deviation, zero for identical pairs
    let sd = standard_deviation(&diffs, None);
    let t_stat = mean(&diffs) / (sd / n.sqrt());
    two_sided_p(t_stat, n - 1.0)
}

/// independent two-sample t-test with pooled variance (Student),
/// as used for the unpaired design. Returns the two-sided p-value
/// with n1+n2-2 degrees of freedom.
///
/// Unittest: TRUE
pub fn unpaired_t_test(s1: &[f64], s2: &[f64]) -> f64 {
    assert!(
        s1.len() >= 2 && s2.len() >= 2,
        "ERROR: the unpaired test requires at least two values per sample!"
    );
    let n1 = s1.len() as f64;
    let n2 = s2.len() as f64;
    let pooled = ((n1 - 1.0) * variance(s1, None) + (n2 - 1.0) * variance(s2, None))
        / (n1 + n2 - 2.0);
    let se = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
    let t_stat = (mean(s1) - mean(s2)) / se;
    two_sided_p(t_stat, n1 + n2 - 2.0)
}

/// Benjamini-Hochberg FDR correction over a list of p-values.
/// The returned vector has the same length and the same positional
/// correspondence as the input, nothing is dropped. Computed as a
/// step-up: p*m/rank on the ascending p-values, then a cumulative
/// minimum from the worst rank down, clipped at 1. The input must
/// not contain NaN, those have to be removed beforehand.
///
/// Unittest: TRUE
///
/// ```
/// use retention::lib::stats::benjamini_hochberg;
/// let fdr = benjamini_hochberg(&[0.25,0.5,0.125]);
/// assert_eq!(fdr,vec![0.375,0.5,0.375]);
/// ```
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.len();
    if m == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| {
        pvalues[a]
            .partial_cmp(&pvalues[b])
            .expect("ERROR: p-values must not contain NaN!")
    });
    let mut corrected = vec![0.0_f64; m];
    let mut running_min = 1.0_f64;
    for rank in (0..m).rev() {
        let index = order[rank];
        let raw = pvalues[index] * m as f64 / (rank + 1) as f64;
        if raw < running_min {
            running_min = raw;
        }
        corrected[index] = running_min;
    }
    corrected
}
