//! Minimize a PDF
//!
//! Copies the pages of a PDF into a fresh document, leaving out every object
//! the pages do not reach, and writes the result.
//!
//! Usage:
//!   cargo run --release --bin pdf_minimize -- input.pdf
//!   cargo run --release --bin pdf_minimize -- input.pdf -o small.pdf --pages 1,3-5
//!   cargo run --release --bin pdf_minimize -- input.pdf --keep-info --json
//!
//! Without `-o` the output goes next to the input as `<stem>.min.pdf`.
//! Set `RUST_LOG=debug` for per-object tracing.

use pdf_minimizer::{MinimizeOptions, Minimizer, PageSelection};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

struct CliConfig {
    input: PathBuf,
    output: PathBuf,
    options: MinimizeOptions,
    json: bool,
    verbose: bool,
}

impl CliConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut input = None;
        let mut output = None;
        let mut options = MinimizeOptions::new().with_producer(format!("pdf_minimizer {}", pdf_minimizer::VERSION));
        let mut json = false;
        let mut verbose = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-o" | "--output" => {
                    i += 1;
                    let path = args.get(i).ok_or("-o needs a path")?;
                    output = Some(PathBuf::from(path));
                },
                "--pages" => {
                    i += 1;
                    let list = args.get(i).ok_or("--pages needs a list such as 1,3-5")?;
                    let pages = PageSelection::parse_ranges(list)
                        .ok_or_else(|| format!("invalid page list '{}'", list))?;
                    options = options.with_pages(pages);
                },
                "--keep-info" => {
                    options = options.with_keep_info(true);
                },
                "--json" => {
                    json = true;
                },
                "--verbose" | "-v" => {
                    verbose = true;
                },
                "--help" | "-h" => {
                    return Err(usage());
                },
                arg if arg.starts_with('-') => {
                    return Err(format!("unknown option '{}'\n{}", arg, usage()));
                },
                arg => {
                    if input.is_some() {
                        return Err(format!("unexpected argument '{}'\n{}", arg, usage()));
                    }
                    input = Some(PathBuf::from(arg));
                },
            }
            i += 1;
        }

        let input = input.ok_or_else(usage)?;
        let output = output.unwrap_or_else(|| {
            let stem = input.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
            input.with_file_name(format!("{}.min.pdf", stem))
        });

        Ok(Self {
            input,
            output,
            options,
            json,
            verbose,
        })
    }
}

fn usage() -> String {
    "usage: pdf_minimize INPUT [-o OUTPUT] [--pages 1,3-5] [--keep-info] [--json] [-v]".to_string()
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match CliConfig::from_args() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        },
    };

    let input = match fs::read(&config.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        },
    };

    let start = Instant::now();
    let (output, report) = match Minimizer::new(config.options).run(&input) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error minimizing {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        },
    };
    let elapsed = start.elapsed();

    if let Err(e) = fs::write(&config.output, &output) {
        eprintln!("Error writing {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    if config.json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error encoding report: {}", e);
                return ExitCode::FAILURE;
            },
        }
    } else {
        println!(
            "{} -> {}: {} pages, {} -> {} bytes ({:+} saved)",
            config.input.display(),
            config.output.display(),
            report.page_count,
            report.input_bytes,
            report.output_bytes,
            report.bytes_saved()
        );
        if config.verbose {
            println!(
                "  objects: {} -> {}, dropped references: {}, time: {:.2}ms",
                report.source_objects,
                report.output_objects,
                report.dropped_references,
                elapsed.as_secs_f64() * 1000.0
            );
        }
    }

    ExitCode::SUCCESS
}
