// mapset: Set operations and comparison of alignment results.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use std::path::PathBuf;

use clap::Parser;

use mapset::{Config, Error, Format, Operation};

#[derive(Parser)]
#[command(version)]
#[command(about = "Set operations and comparison of alignment results")]
pub struct Cli {
    // Operation
    #[arg(help = "One of {union,intersection,difference,compare,join,merge-map,display-compact}")]
    pub operation: String,

    // Master input
    #[arg(long = "i1", required = false, help = "Input file 1 (master)")]
    pub input_1: Option<PathBuf>,

    // Slave input, stdin if not given
    #[arg(long = "i2", required = false, help = "Input file 2 (slave), stdin if not given")]
    pub input_2: Option<PathBuf>,

    // Memory-map input files
    #[arg(long = "mmap-input", default_value_t = false)]
    pub mmap_input: bool,

    // Output file path
    #[arg(short = 'o', long = "output", required = false)]
    pub out_file: Option<PathBuf>,

    // Input format, guessed if not given
    #[arg(short = 'f', long = "format", required = false, help = "Input format {map,sam,fasta,fastq}")]
    pub format: Option<String>,

    // Paired-end reads
    #[arg(short = 'p', long = "paired-end", default_value_t = false)]
    pub paired_end: bool,

    // Both inputs contain the same reads (merge-map)
    #[arg(short = 's', long = "files-same-reads", default_value_t = true)]
    pub files_same_reads: bool,

    // The slave may lack reads of the master (merge-map)
    #[arg(long = "files-different-reads", default_value_t = false)]
    pub files_different_reads: bool,

    // Threshold for range comparison
    #[arg(long = "eq-th", default_value_t = 0.5, help = "Equality threshold, relative to read length if <= 1.0")]
    pub eq_threshold: f64,

    // Compare positions exactly
    #[arg(long = "strict", default_value_t = false)]
    pub strict: bool,

    // Worker threads (merge-map, display-compact)
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    pub num_threads: usize,

    // Verbosity
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Builds the run configuration, parsing the operation and format.
    pub fn to_config(&self) -> Result<Config, Error> {
        let operation: Operation = self.operation.parse()?;
        let format: Option<Format> = self.format.as_deref().map(|x| x.parse()).transpose()?;
        Ok(Config {
            operation,
            input_1: self.input_1.clone(),
            input_2: self.input_2.clone(),
            output: self.out_file.clone(),
            format,
            mmap_input: self.mmap_input,
            paired_end: self.paired_end,
            files_contain_same_reads: self.files_same_reads && !self.files_different_reads,
            eq_threshold: self.eq_threshold,
            strict: self.strict,
            num_threads: self.num_threads,
            verbose: self.verbose,
        })
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn parse_set_operation() {
        use super::Cli;
        use clap::Parser;
        use mapset::{Format, Operation};

        let cli = Cli::try_parse_from(["mapset", "intersection", "--i1", "a.map", "--i2", "b.sam", "--strict", "-f", "sam", "-o", "out.map"]).unwrap();
        let config = cli.to_config().unwrap();

        assert_eq!(config.operation, Operation::Intersection);
        assert_eq!(config.input_1, Some("a.map".into()));
        assert_eq!(config.input_2, Some("b.sam".into()));
        assert_eq!(config.output, Some("out.map".into()));
        assert_eq!(config.format, Some(Format::Sam));
        assert!(config.strict);
        assert!(config.files_contain_same_reads);
        assert_eq!(config.eq_threshold, 0.5);
        assert_eq!(config.num_threads, 1);
    }

    #[test]
    fn parse_merge_map_flags() {
        use super::Cli;
        use clap::Parser;
        use mapset::Operation;

        let cli = Cli::try_parse_from(["mapset", "m", "--i1", "a.map", "--files-different-reads", "-t", "8", "-p", "--eq-th", "20"]).unwrap();
        let config = cli.to_config().unwrap();

        assert_eq!(config.operation, Operation::MergeMap);
        assert!(!config.files_contain_same_reads);
        assert!(config.paired_end);
        assert_eq!(config.num_threads, 8);
        assert_eq!(config.eq_threshold, 20.0);
        assert_eq!(config.input_2, None);
    }

    #[test]
    fn reject_unknown_operation_and_format() {
        use super::Cli;
        use clap::Parser;

        let cli = Cli::try_parse_from(["mapset", "xor", "--i1", "a.map"]).unwrap();
        assert!(cli.to_config().is_err());

        let cli = Cli::try_parse_from(["mapset", "union", "--i1", "a.map", "-f", "bam"]).unwrap();
        assert!(cli.to_config().is_err());
    }
}
