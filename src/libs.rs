
//! # Differential intron-retention libraries
//!
//! Author: Emanuel Schmid-Siegert
//!
//! This libraries are a collection of functions and structures which
//! help comparing intron retention between two biological samples with
//! replicates. They are used in the DiffIR suite which takes per-replicate
//! quantifications of retained introns and derives for every feature
//! (intron, gene or splice junction) a significance of the difference
//! between both samples.
//!
//! The quantification itself is delegated to an external engine which is
//! run once per replicate. Everything downstream of the produced tables
//! lives here:
//!  - common: shared types, naming contract and input verification
//!  - quant: invocation of the quantification engine per replicate
//!  - aggregate: merging per-replicate tables into per-feature records
//!  - stats: t-tests and the FDR correction
//!  - diff: the pipeline driver with the result writers
//!

/// shared types, naming contract and input verification
pub mod lib {
    pub mod common;
    /// invocation of the quantification engine per replicate
    pub mod quant;
    /// merging per-replicate tables into per-feature records
    pub mod aggregate;
    /// t-tests and the FDR correction
    pub mod stats;
    /// the pipeline driver with the result writers
    pub mod diff;
}
