//! Command-line driver for the race detector.
//!
//! Exit codes: 0 when no race candidates are found, 1 on lexical, parse, or
//! semantic errors (reported to stderr), 2 when one or more candidates are
//! reported on stdout.

use clap::{crate_version, App, Arg};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use smallrace::{Database, DbOptions};
use std::fs;
use std::process;
use std::time::Instant;

fn main() {
    let matches = App::new("smallrace")
        .version(crate_version!())
        .about("Static data race detector for SMALL programs with spawn/await")
        .arg(
            Arg::with_name("file")
                .help("Path to a .small source file")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("timing")
                .long("timing")
                .help("Report elapsed time for the analysis and each pass"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = SimpleLogger::new().with_level(level).init();

    let path = matches.value_of("file").expect("file argument is required");
    process::exit(run(path, matches.is_present("timing")));
}

fn run(path: &str, timing: bool) -> i32 {
    let start = Instant::now();

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("ERROR: cannot read {}: {}", path, err);
            return 1;
        }
    };

    let mut db = Database::new(DbOptions { timing });
    if let Err(diag) = db.parse(&text) {
        eprintln!("{}", diag.annotate(path, &text));
        return 1;
    }
    let warnings = db.race_result().clone();

    if timing {
        println!("The analysis took {} ms.", start.elapsed().as_millis());
    }

    if warnings.is_empty() {
        println!("No race candidates found.");
        return 0;
    }

    println!("{} race candidate(s) found:\n", warnings.len());
    for warning in warnings.iter() {
        println!("{}\n", warning);
    }
    2
}
