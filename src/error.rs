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

//! Errors returned by the mapset library.
//!
//! Every failure is fatal for the run that produced it: nothing in the
//! library retries or recovers. The binary logs the error and exits with a
//! non-zero status, library callers can inspect [Error::category] to decide
//! what to report.

use std::path::PathBuf;

/// Broad classes of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unsupported format, unknown operation, missing required input.
    Configuration,
    /// Malformed record in one of the inputs.
    Parse,
    /// The two input streams cannot be synchronized.
    Divergence,
    /// Cannot open, map or write a file.
    Resource,
    /// Internal invariant broken, this is a bug.
    Invariant,
}

/// Reason why two streams could not be synchronized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Divergence {
    /// Master ran out while slave still had records.
    #[error("<<Slave>> contains more/different reads from <<Master>>")]
    SlaveHasExtraReads,

    /// Slave ran out while looking for the master's current read.
    #[error("<<Slave>> is not contained in <<Master>> (looking for '{tag}')")]
    SlaveMissingRead { tag: String },

    /// Inputs declared to contain the same reads disagree on a tag.
    #[error("<<Master>> and <<Slave>> are not synchronized ('{master}' vs '{slave}')")]
    NotSynchronized { master: String, slave: String },

    /// The same read is paired-end in one input and single-end in the other.
    #[error("<<Master>> and <<Slave>> disagree on the number of ends of '{tag}' ({master} vs {slave})")]
    EndCountMismatch { tag: String, master: usize, slave: usize },
}

/// Errors that can occur in mapset.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file type not supported: {0}")]
    UnsupportedFormat(String),

    #[error("unknown operation '{0}' in {{union,intersection,difference,compare,join,merge-map,display-compact}}")]
    UnknownOperation(String),

    #[error("input file 1 required (--i1)")]
    MissingInput,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("fatal error parsing file <<{input}>> (record {record}): {message}")]
    Parse {
        input: String,
        record: u64,
        message: String,
    },

    #[error(transparent)]
    Divergence(#[from] Divergence),

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    /// Wraps an `io::Error` with the path it happened on.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnsupportedFormat(_)
            | Error::UnknownOperation(_)
            | Error::MissingInput
            | Error::InvalidArgument(_) => ErrorCategory::Configuration,
            Error::Parse { .. } => ErrorCategory::Parse,
            Error::Divergence(_) => ErrorCategory::Divergence,
            Error::Io { .. } => ErrorCategory::Resource,
            Error::Invariant(_) => ErrorCategory::Invariant,
        }
    }

    /// True when the error was caused by the inputs or the invocation, and
    /// rerunning with corrected inputs can succeed.
    pub fn is_input_error(&self) -> bool {
        self.category() != ErrorCategory::Invariant
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from("<stream>"),
        }
    }
}
