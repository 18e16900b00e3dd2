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

//! mapset is a library and a command-line client for:
//!
//!   - Computing the union, intersection or difference of the alignments
//!     reported for the same reads by two mapping runs.
//!   - Comparing or joining two mapping runs read by read.
//!   - Merging two mapping runs with a pool of worker threads.
//!   - Displaying a compact summary of a mapping run.
//!
//! The following input formats are supported:
//!   - GEM MAP (input and output)
//!   - [SAM](https://samtools.github.io/hts-specs/SAMv1.pdf) (input only)
//!   - FASTA/FASTQ (input only, reads without alignments)
//!
//! All output is written in the MAP format.
//!
//! ## Usage
//!
//! ### Command line
//!
//! `mapset <OPERATION> --i1 <FILE> [--i2 <FILE>] [ARGS]` where OPERATION is
//! one of `union`, `intersection`, `difference`, `compare`, `join`,
//! `merge-map` or `display-compact`. If `--i2` is not given the second
//! input is read from stdin.
//!
//! ### Rust API
//!
//! The two inputs are read through anything that implements
//! [TemplateSource](sync::TemplateSource), most commonly a
//! [Parser](parser::Parser) over a [Read](std::io::Read). The stream level
//! functions [set_operation_from_read_to_write] and
//! [report_from_read_to_write] drive the synchronization of the two
//! inputs and write the results to a [Write](std::io::Write).
//!
//! Single records can be combined directly with
//! [combine](setops::combine), [compare](setops::compare) and
//! [join](setops::join).
//!
//! ## Comparing alignments
//!
//! Two alignments are considered equal if they are on the same sequence and
//! strand and, in strict mode, start at the same position. Without strict
//! mode the start positions can differ by a tolerance derived from the
//! equality threshold: a threshold of at most 1.0 is a fraction of the
//! current read's length, a larger threshold is an absolute number of bases.
//!

use std::io::Read;
use std::io::Write;

use indexmap::IndexMap;
use log::{info, warn};

pub mod compare;
pub mod config;
pub mod error;
pub mod input;
pub mod merge;
pub mod parser;
pub mod printer;
pub mod setops;
pub mod sync;

pub use compare::Comparator;
pub use config::Config;
pub use error::Error;

use printer::Printer;
use setops::{ReportOp, SetOp};
use sync::{SyncEvent, TemplateSource};

/// Supported input formats.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Map,
    Sam,
    /// FASTA and FASTQ.
    Fasta,
}

impl std::str::FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "map" => Ok(Format::Map),
            "sam" => Ok(Format::Sam),
            "fasta" | "fastq" | "fa" | "fq" => Ok(Format::Fasta),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Operations offered by the command line client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Union,
    Intersection,
    Difference,
    Compare,
    Join,
    MergeMap,
    DisplayCompact,
}

impl Operation {
    /// The set operation this maps to, if any.
    pub fn set_op(&self) -> Option<SetOp> {
        match self {
            Operation::Union => Some(SetOp::Union),
            Operation::Intersection => Some(SetOp::Intersection),
            Operation::Difference => Some(SetOp::Difference),
            _ => None,
        }
    }

    /// The per-read report this maps to, if any.
    pub fn report_op(&self) -> Option<ReportOp> {
        match self {
            Operation::Compare => Some(ReportOp::Compare),
            Operation::Join => Some(ReportOp::Join),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Operation::Union => "Union",
            Operation::Intersection => "Intersection",
            Operation::Difference => "Difference",
            Operation::Compare => "Compare",
            Operation::Join => "Join",
            Operation::MergeMap => "Merge-map",
            Operation::DisplayCompact => "Display-compact",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Operation {
    type Err = Error;

    /// Parses the operation name case-insensitively.
    ///
    /// Names that match nothing are guessed from their first letter. The
    /// guess is logged as a warning.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let exact = match s.to_ascii_lowercase().as_str() {
            "intersection" | "intersecction" => Some(Operation::Intersection),
            "union" => Some(Operation::Union),
            "difference" => Some(Operation::Difference),
            "compare" => Some(Operation::Compare),
            "join" => Some(Operation::Join),
            "merge-map" => Some(Operation::MergeMap),
            "display-compact" => Some(Operation::DisplayCompact),
            _ => None,
        };
        if let Some(op) = exact {
            return Ok(op)
        }

        let guess = match s.chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('i') => Operation::Intersection,
            Some('u') => Operation::Union,
            Some('d') => Operation::Difference,
            Some('c') => Operation::Compare,
            Some('p') | Some('j') => Operation::Join,
            Some('m') => Operation::MergeMap,
            _ => return Err(Error::UnknownOperation(s.to_string())),
        };
        warn!("Assuming '{}' ...", guess);
        Ok(guess)
    }
}

/// Strand of a [Mapping].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

/// Type of a [Mismatch].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MismatchKind {
    /// Substitution of a single base.
    Mismatch,
    /// Bases present in the read but not in the reference.
    Insertion,
    /// Bases present in the reference but not in the read.
    Deletion,
}

/// A difference between the read and the reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mismatch {
    pub kind: MismatchKind,
    /// 0-based offset in the aligned part of the read.
    pub position: u64,
    /// Substituted base, `N` for indels.
    pub base: u8,
    pub size: u64,
}

/// One placement of a read end on the reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Mapping {
    pub seq_name: String,
    /// 1-based start position.
    pub position: u64,
    pub strand: Strand,
    /// Number of reference bases covered.
    pub base_length: u64,
    pub score: Option<u64>,
    pub mismatches: Vec<Mismatch>,
}

impl Mapping {
    /// Number of mismatch events, used as the stratum of the mapping.
    pub fn distance(&self) -> usize {
        self.mismatches.len()
    }

    /// Number of read bases covered.
    pub fn read_span(&self) -> u64 {
        let (ins, del) = self.mismatches.iter().fold((0, 0), |(ins, del), mm| match mm.kind {
            MismatchKind::Insertion => (ins + mm.size, del),
            MismatchKind::Deletion => (ins, del + mm.size),
            MismatchKind::Mismatch => (ins, del),
        });
        (self.base_length + ins).saturating_sub(del)
    }
}

/// Alignment results for one read end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    pub tag: String,
    pub read: String,
    pub qualities: String,
    /// Mappings in the order they were parsed. May contain duplicates.
    pub maps: Vec<Mapping>,
    /// Number of mappings per stratum.
    pub counters: Vec<u64>,
    pub attributes: IndexMap<String, String>,
    pub max_complete_strata: u64,
}

impl Alignment {
    pub fn new(tag: &str) -> Self {
        Alignment{ tag: tag.to_string(), ..Default::default() }
    }

    pub fn read_length(&self) -> u64 {
        self.read.len() as u64
    }

    /// Replaces the counters with ones derived from the current maps.
    pub fn recompute_counters(&mut self) {
        self.counters = counters_from_maps(&self.maps);
    }
}

/// Counts mappings per stratum.
pub fn counters_from_maps(maps: &[Mapping]) -> Vec<u64> {
    let mut counters: Vec<u64> = Vec::new();
    maps.iter().for_each(|map| {
        let stratum = map.distance();
        if counters.len() <= stratum {
            counters.resize(stratum + 1, 0);
        }
        counters[stratum] += 1;
    });
    counters
}

/// One map of a paired-end read: the index of each end in the maps of the
/// corresponding alignment, None for an unmapped end.
pub type MapPair = [Option<usize>; 2];

/// Alignment results for one read: one alignment for single-end reads, two
/// for paired-end reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub tag: String,
    pub alignments: Vec<Alignment>,
    /// Paired maps, empty for single-end reads.
    pub pairs: Vec<MapPair>,
    pub counters: Vec<u64>,
    pub attributes: IndexMap<String, String>,
}

impl Template {
    pub fn new(tag: &str) -> Self {
        Template{ tag: tag.to_string(), ..Default::default() }
    }

    /// Wraps a single-end alignment.
    pub fn from_alignment(alignment: Alignment) -> Self {
        Template {
            tag: alignment.tag.clone(),
            counters: alignment.counters.clone(),
            attributes: alignment.attributes.clone(),
            alignments: vec![alignment],
            pairs: Vec::new(),
        }
    }

    /// Returns the alignment in slot `idx`, creating empty alignments for
    /// every missing slot up to and including `idx`.
    pub fn alignment_mut_dyn(&mut self, idx: usize) -> &mut Alignment {
        while self.alignments.len() <= idx {
            let alignment = Alignment::new(&self.tag);
            self.alignments.push(alignment);
        }
        &mut self.alignments[idx]
    }

    pub fn is_paired(&self) -> bool {
        self.alignments.len() > 1
    }

    /// Sum of the read lengths of all ends.
    pub fn total_length(&self) -> u64 {
        self.alignments.iter().map(|aln| aln.read_length()).sum()
    }

    /// Number of maps, counting a paired map once.
    pub fn num_maps(&self) -> usize {
        if self.is_paired() {
            self.pairs.len()
        } else {
            self.alignments.iter().map(|aln| aln.maps.len()).sum()
        }
    }

    /// The maps of both ends of `pair`.
    pub fn pair_ends(&self, pair: &MapPair) -> [Option<&Mapping>; 2] {
        let end = |idx: usize| {
            pair[idx].and_then(|map| self.alignments.get(idx).and_then(|aln| aln.maps.get(map)))
        };
        [end(0), end(1)]
    }

    /// Pairs the maps of the two ends in the order they are stored. The end
    /// with fewer maps is left unmapped in the remaining pairs.
    pub fn pair_ends_by_order(&mut self) {
        let len_1 = self.alignments.first().map(|aln| aln.maps.len()).unwrap_or(0);
        let len_2 = self.alignments.get(1).map(|aln| aln.maps.len()).unwrap_or(0);
        self.pairs = (0..len_1.max(len_2)).map(|idx| {
            [(idx < len_1).then_some(idx), (idx < len_2).then_some(idx)]
        }).collect();
    }

    pub fn max_complete_strata(&self) -> u64 {
        self.alignments.first().map(|aln| aln.max_complete_strata).unwrap_or(0)
    }

    /// Recomputes the alignment counters from their maps.
    ///
    /// Template counters of single-end reads are those of the alignment.
    /// For paired-end reads they count the paired maps, the stratum of a
    /// pair being the summed distance of its ends.
    pub fn recompute_counters(&mut self) {
        self.alignments.iter_mut().for_each(|aln| aln.recompute_counters());
        if !self.is_paired() {
            self.counters = self.alignments.first().map(|aln| aln.counters.clone()).unwrap_or_default();
            return
        }

        let mut counters: Vec<u64> = Vec::new();
        self.pairs.iter().for_each(|pair| {
            let stratum: usize = self.pair_ends(pair).iter().flatten().map(|map| map.distance()).sum();
            if counters.len() <= stratum {
                counters.resize(stratum + 1, 0);
            }
            counters[stratum] += 1;
        });
        self.counters = counters;
    }
}

/// Applies a set operation to every read in two synchronized inputs.
///
/// Reads are matched by tag. `master` drives the synchronization: master
/// reads missing from `slave` are written unchanged for [SetOp::Union] and
/// [SetOp::Difference] and dropped otherwise. Reads in `slave` that are not
/// in `master` are fatal if `master` runs out first.
///
/// Returns the number of records written.
///
/// ## Usage
///
/// ```rust
/// use mapset::{set_operation_from_read_to_write, Comparator};
/// use mapset::parser::Parser;
/// use mapset::setops::SetOp;
/// use mapset::Format;
/// use std::io::Cursor;
///
/// let master = b"read1\tACGTACGTAC\tIIIIIIIIII\t1\tchr1:+:100:10\n".to_vec();
/// let slave = b"read1\tACGTACGTAC\tIIIIIIIIII\t1:1\tchr1:+:100:10,chr2:-:200:4A5\n".to_vec();
///
/// let mut master = Parser::new(Cursor::new(master), Some(Format::Map), false).unwrap();
/// let mut slave = Parser::new(Cursor::new(slave), Some(Format::Map), false).unwrap();
///
/// let mut output: Vec<u8> = Vec::new();
/// let n = set_operation_from_read_to_write(SetOp::Union, &Comparator::strict(), &mut master, &mut slave, &mut output).unwrap();
///
/// assert_eq!(n, 1);
/// assert_eq!(output, b"read1\tACGTACGTAC\tIIIIIIIIII\t1:1\tchr1:+:100:10,chr2:-:200:4A5\n".to_vec());
/// ```
///
pub fn set_operation_from_read_to_write<M, S, W>(
    op: SetOp,
    comparator: &Comparator,
    master: &mut M,
    slave: &mut S,
    conn_out: &mut W,
) -> Result<u64, Error>
where
    M: TemplateSource,
    S: TemplateSource,
    W: Write,
{
    let mut printer = Printer::new(conn_out);
    let mut written: u64 = 0;

    loop {
        let event = sync::read_template_sync(master, slave, op, &mut |unmatched: &Template| {
            written += 1;
            printer.print_template(unmatched)
        })?;

        match event {
            SyncEvent::BothDone => break,
            SyncEvent::Sync(template_master, template_slave) => {
                let context = comparator.context(template_master.total_length());
                let res = setops::combine(&template_master, &template_slave, op, comparator, context)?;
                printer.print_template(&res)?;
                written += 1;
            },
        }
    }

    printer.flush()?;
    info!("{:?}: wrote {} records", op, written);
    Ok(written)
}

/// Writes a join or compare report for every read in `master`.
///
/// `slave` must contain every read in `master`, in the same order, and may
/// contain other reads in between that are skipped.
///
/// ## Usage
///
/// ```rust
/// use mapset::{report_from_read_to_write, Comparator};
/// use mapset::parser::Parser;
/// use mapset::setops::ReportOp;
/// use mapset::Format;
/// use std::io::Cursor;
///
/// let master = b"r1\tACGT\tIIII\t1\tchr1:+:100:4\n".to_vec();
/// let slave = b"r0\tACGT\tIIII\t0\t-\nr1\tACGT\tIIII\t0:1\tchr2:+:50:2A1\n".to_vec();
///
/// let mut master = Parser::new(Cursor::new(master), Some(Format::Map), false).unwrap();
/// let mut slave = Parser::new(Cursor::new(slave), Some(Format::Map), false).unwrap();
///
/// let mut output: Vec<u8> = Vec::new();
/// report_from_read_to_write(ReportOp::Join, &Comparator::strict(), &mut master, &mut slave, &mut output).unwrap();
///
/// assert_eq!(output, b"r1\t1\t0:1\tchr1:+:100:4\tchr2:+:50:2A1\n".to_vec());
/// ```
///
pub fn report_from_read_to_write<M, S, W>(
    op: ReportOp,
    comparator: &Comparator,
    master: &mut M,
    slave: &mut S,
    conn_out: &mut W,
) -> Result<u64, Error>
where
    M: TemplateSource,
    S: TemplateSource,
    W: Write,
{
    let mut printer = Printer::new(conn_out);
    let mut written: u64 = 0;

    while let SyncEvent::Sync(template_master, template_slave) = sync::read_template_common_map(master, slave)? {
        match op {
            ReportOp::Join => {
                let record = setops::join(&template_master, &template_slave);
                printer.print_join(&record)?;
            },
            ReportOp::Compare => {
                let context = comparator.context(template_master.total_length());
                let record = setops::compare(&template_master, &template_slave, comparator, context)?;
                printer.print_compare(&record)?;
            },
        }
        written += 1;
    }

    printer.flush()?;
    info!("{:?}: wrote {} records", op, written);
    Ok(written)
}

/// Runs the operation selected in `config`.
///
/// Opens the inputs and the output, and dispatches to the stream level
/// function for the operation. Returns the number of records written.
pub fn run(
    config: &Config,
) -> Result<u64, Error> {
    config.validate()?;
    info!("Performing '{}'", config.operation);

    let mut conn_out = input::open_output(config.output.as_deref())?;

    let written = match config.operation {
        Operation::DisplayCompact => {
            let conn_in = input::open_input(config.input_1.as_deref(), config.mmap_input)?;
            let reader = parser::Parser::new(conn_in, config.format, config.paired_end)?.with_name("Input");
            merge::display_compact(reader, config.num_threads, &mut conn_out)?
        },
        Operation::MergeMap => {
            let (master, slave) = open_master_and_slave(config)?;
            merge::merge_map(master, slave, config.files_contain_same_reads, config.num_threads, &mut conn_out)?
        },
        op => {
            let (mut master, mut slave) = open_master_and_slave(config)?;
            let comparator = config.comparator();
            if let Some(set_op) = op.set_op() {
                set_operation_from_read_to_write(set_op, &comparator, &mut master, &mut slave, &mut conn_out)?
            } else if let Some(report_op) = op.report_op() {
                report_from_read_to_write(report_op, &comparator, &mut master, &mut slave, &mut conn_out)?
            } else {
                return Err(Error::Invariant(format!("no handler for operation '{}'", op)))
            }
        },
    };

    conn_out.flush()?;
    Ok(written)
}

type Input = parser::Parser<Box<dyn Read + Send>>;

/// Opens `--i1` as master and `--i2` as slave. Without `--i2` the slave is
/// read from stdin.
fn open_master_and_slave(
    config: &Config,
) -> Result<(Input, Input), Error> {
    let path_1 = config.input_1.as_deref().ok_or(Error::MissingInput)?;
    let conn_1 = input::open_input(Some(path_1), config.mmap_input)?;
    let conn_2 = input::open_input(config.input_2.as_deref(), config.mmap_input)?;

    let master = parser::Parser::new(conn_1, config.format, config.paired_end)?.with_name("Master");
    let slave = parser::Parser::new(conn_2, config.format, config.paired_end)?.with_name("Slave");
    Ok((master, slave))
}
