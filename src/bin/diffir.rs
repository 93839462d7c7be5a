//! ## diffir ##
//! ------------
//! This tool identifies differential intron retention between two biological
//! samples from RNA-seq data. Each sample is represented by at least two
//! replicate files which are first quantified one by one through an external
//! quantification engine. The per-replicate retention values are then merged
//! per feature (intron, gene or splice junction), tested with a paired or
//! unpaired t-test and corrected for multiple testing (Benjamini-Hochberg).
//! One sorted tab-delimited result table is written per feature level.
use clap::{app_from_crate,crate_name,crate_description,crate_authors,crate_version,Arg};
use std::env;
use std::path::PathBuf;
use std::process;
use chrono::Local;

// our library which is within the same project
extern crate retention;
use retention::lib::common::{*};
use retention::lib::diff::{*};
use retention::lib::quant::{*};

extern crate pretty_env_logger;
#[macro_use] extern crate log;

fn main() {
    pretty_env_logger::init();

    // keep the executed command for debugging, clap does not provide it
    let args: Vec<String> = env::args().collect();
    let args_string = args.join(" ");
    let matches = app_from_crate!()
    .about("This tool compares intron retention between two samples with replicates. \
        Each replicate is quantified through the external engine, afterwards the replicate values are \
        collected per feature and sample, untestable features are removed and the remaining ones are \
        tested for a significant difference. \n\
        Replicate lists are comma-separated and need at least two entries per sample. \n\
        The paired design (-t P) additionally requires the same number of replicates in both samples, \n\
        with replicate i of sample 1 matching replicate i of sample 2. \n\
        The program produces per feature level a tab-delimited table with p-value, FDR, the raw replicate \
        values of both samples and the mean difference, sorted by feature id.")
    .arg(Arg::with_name("NAME")
            .short("n")
            .long("name")
            .value_name("STRING")
            .help("name of the analysis, prefix of all produced files")
            .takes_value(true)
            .required(true))
    .arg(Arg::with_name("S1")
            .short("a")
            .long("s1files")
            .value_name("FILES")
            .help("comma-separated replicate files of sample group 1")
            .takes_value(true)
            .required(true))
    .arg(Arg::with_name("S2")
            .short("b")
            .long("s2files")
            .value_name("FILES")
            .help("comma-separated replicate files of sample group 2")
            .takes_value(true)
            .required(true))
    .arg(Arg::with_name("OUTDIR")
            .short("o")
            .long("outdir")
            .value_name("DIR")
            .help("directory for the result tables, created if missing")
            .takes_value(true)
            .required(false)
            .default_value("."))
    .arg(Arg::with_name("TYPE")
            .short("t")
            .long("analysistype")
            .value_name("P|U")
            .help("paired (P) or unpaired (U) design")
            .takes_value(true)
            .possible_values(&["P","U"])
            .required(false)
            .default_value("U"))
    .arg(Arg::with_name("QUANT")
            .short("q")
            .long("quanttype")
            .value_name("IRI|IRC")
            .help("quantification metric to compare")
            .takes_value(true)
            .possible_values(&["IRI","IRC"])
            .required(false)
            .default_value("IRI"))
    .arg(Arg::with_name("ENGINE")
            .short("e")
            .long("engine")
            .value_name("CMD")
            .help("quantification engine executable, invoked once per replicate")
            .takes_value(true)
            .required(false)
            .default_value("irtools"))
    .get_matches();

    ////////////////////
    //  prep options  //
    ////////////////////
    let name     = matches.value_of("NAME").unwrap();
    let s1_arg   = matches.value_of("S1").unwrap();
    let s2_arg   = matches.value_of("S2").unwrap();
    let outdir   = matches.value_of("OUTDIR").unwrap();
    let engine   = matches.value_of("ENGINE").unwrap();
    let analysis = match matches.value_of("TYPE").unwrap() {
        "P" => Analysis::Paired,
        "U" => Analysis::Unpaired,
        _   => panic!("ERROR: analysis type must be P or U!"),
    };
    let metric   = match matches.value_of("QUANT").unwrap() {
        "IRI" => Metric::IRI,
        "IRC" => Metric::IRC,
        _     => panic!("ERROR: quantification type must be IRI or IRC!"),
    };

    eprintln!("INFO: differential IR analysis \"{}\" started on {}", name, Local::now().to_rfc2822());
    debug!("command: {}", args_string);

    let cfg = DiffConfig {
        name: name.to_string(),
        s1_files: split_file_list(s1_arg),
        s2_files: split_file_list(s2_arg),
        outdir: PathBuf::from(outdir),
        analysis,
        metric,
    };

    // bad replicate lists are not an error of the program, they abort
    // cleanly before anything is quantified or written
    if let Err(message) = verify_replicate_lists(cfg.s1_files.len(), cfg.s2_files.len(), cfg.analysis) {
        eprintln!("INFO: Run Aborted: {}", message);
        process::exit(1);
    }

    ////////////////////
    //  run analysis  //
    ////////////////////
    let quanter = CommandQuantifier { program: engine.to_string() };
    run_diff(&cfg, &quanter).expect("ERROR: differential IR analysis failed!");
    eprintln!("INFO: differential IR analysis \"{}\" finished", name);
}
