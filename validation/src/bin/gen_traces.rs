use std::fs;
use std::path::Path;

use jtframe_validation::trace::{self, TraceVector};

const DEFAULT_FILES: usize = 8;
const DEFAULT_OPS: usize = 500;
const VECTORS_PER_FILE: usize = 4;

fn parse_arg(args: &[String], index: usize, default: usize) -> usize {
    match args.get(index) {
        None => default,
        Some(arg) => arg.parse().unwrap_or_else(|_| {
            eprintln!("Invalid number: {}", arg);
            std::process::exit(1);
        }),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 3 {
        eprintln!("Usage: gen_traces [files] [ops-per-slot]");
        eprintln!("Examples:");
        eprintln!("  gen_traces            # {DEFAULT_FILES} files, {DEFAULT_OPS} ops per slot");
        eprintln!("  gen_traces 2 10000");
        std::process::exit(1);
    }
    let files = parse_arg(&args, 1, DEFAULT_FILES);
    let ops = parse_arg(&args, 2, DEFAULT_OPS);

    let out_dir = Path::new("test_data/traces");
    fs::create_dir_all(out_dir).expect("Failed to create output directory");

    for file in 0..files {
        let vectors: Vec<TraceVector> = (0..VECTORS_PER_FILE)
            .map(|i| {
                let seed = (file * VECTORS_PER_FILE + i) as u64;
                trace::generate(&format!("trace_{seed:04}"), seed, ops)
            })
            .collect();
        let out_path = out_dir.join(format!("traces_{file:03}.json.gz"));
        trace::save(&out_path, &vectors).expect("Failed to write output file");
        println!(
            "Generated {} vectors ({} ops each) -> {}",
            vectors.len(),
            ops * 2,
            out_path.display()
        );
    }
}
