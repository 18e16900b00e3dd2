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

use crate::compare::Comparator;
use crate::{Error, Format, Operation};

/// Settings for one run, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub operation: Operation,
    /// Master input, required except for display-compact.
    pub input_1: Option<PathBuf>,
    /// Slave input, stdin if None.
    pub input_2: Option<PathBuf>,
    /// Output file, stdout if None.
    pub output: Option<PathBuf>,
    /// Input format, guessed from the input if None.
    pub format: Option<Format>,
    pub mmap_input: bool,
    pub paired_end: bool,
    /// Both inputs list exactly the same reads (merge-map).
    pub files_contain_same_reads: bool,
    pub eq_threshold: f64,
    pub strict: bool,
    pub num_threads: usize,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            operation: Operation::Union,
            input_1: None,
            input_2: None,
            output: None,
            format: None,
            mmap_input: false,
            paired_end: false,
            files_contain_same_reads: true,
            eq_threshold: 0.5,
            strict: false,
            num_threads: 1,
            verbose: false,
        }
    }
}

impl Config {
    /// Checks the settings before any input is opened.
    pub fn validate(&self) -> Result<(), Error> {
        if self.input_1.is_none() && self.operation != Operation::DisplayCompact {
            return Err(Error::MissingInput)
        }
        if self.num_threads == 0 {
            return Err(Error::InvalidArgument("number of threads must be at least 1".to_string()))
        }
        if !self.eq_threshold.is_finite() || self.eq_threshold < 0.0 {
            return Err(Error::InvalidArgument(format!("invalid equality threshold {}", self.eq_threshold)))
        }
        Ok(())
    }

    /// The comparator used for the whole run.
    pub fn comparator(&self) -> Comparator {
        if self.strict {
            Comparator::strict()
        } else {
            Comparator::range(self.eq_threshold)
        }
    }
}
