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

//! Printer for writing [Template] records and reports as MAP text.
//!
//! Every call writes one complete record. I/O errors are returned as
//! [Error::Io].
//!
//! ## Usage
//!
//! ### Print templates parsed from MAP input
//!
//! ```rust
//! use mapset::Format;
//! use mapset::parser::Parser;
//! use mapset::printer::Printer;
//! use std::io::Cursor;
//!
//! let mut data: Vec<u8> = b"r1\tACGT\tIIII\t1\tchr1:+:100:4\n".to_vec();
//! data.append(&mut b"r2\tTTGA\tIIII\t0:1\tchr2:-:7:1C2\n".to_vec());
//!
//! let reader = Parser::new(Cursor::new(data.clone()), Some(Format::Map), false).unwrap();
//!
//! let mut output: Vec<u8> = Vec::new();
//! let mut printer = Printer::new(&mut output);
//! for template in reader {
//!     printer.print_template(&template.unwrap()).unwrap();
//! }
//! assert_eq!(printer.records_written(), 2);
//!
//! assert_eq!(output, data);
//! ```
//!
//! ### Print a compact summary
//!
//! ```rust
//! use mapset::{Alignment, Mapping, Template};
//! use mapset::printer::Printer;
//!
//! let mut aln = Alignment::new("r1");
//! aln.read = "ACGTACGT".to_string();
//! aln.maps.push(Mapping{ seq_name: "chr1".to_string(), position: 3, base_length: 8, ..Default::default() });
//! aln.maps.push(Mapping{ seq_name: "chrM".to_string(), position: 9, base_length: 8, ..Default::default() });
//! aln.recompute_counters();
//!
//! let mut output: Vec<u8> = Vec::new();
//! Printer::new(&mut output).print_compact(&Template::from_alignment(aln)).unwrap();
//!
//! assert_eq!(output, b"End1::r1[8]\t2\tchr1,chrM\n".to_vec());
//! ```
//!

use std::io::Write;

use crate::setops::{CompareRecord, JoinRecord};
use crate::{Error, Template};

use map::format_compact_lines;
use map::format_compare_line;
use map::format_join_line;
use map::format_map_line;

// Format specific implementations
pub mod map;

pub struct Printer<W: Write> {
    conn: W,
    records: u64,
}

impl<W: Write> Printer<W> {
    pub fn new(
        conn: W,
    ) -> Self {
        Printer{ conn, records: 0 }
    }

    /// Writes `template` as a MAP line.
    pub fn print_template(
        &mut self,
        template: &Template,
    ) -> Result<(), Error> {
        format_map_line(template, &mut self.conn)?;
        self.records += 1;
        Ok(())
    }

    pub fn print_join(
        &mut self,
        record: &JoinRecord,
    ) -> Result<(), Error> {
        format_join_line(record, &mut self.conn)?;
        self.records += 1;
        Ok(())
    }

    pub fn print_compare(
        &mut self,
        record: &CompareRecord,
    ) -> Result<(), Error> {
        format_compare_line(record, &mut self.conn)?;
        self.records += 1;
        Ok(())
    }

    /// Writes the compact summary of every end of `template`.
    pub fn print_compact(
        &mut self,
        template: &Template,
    ) -> Result<(), Error> {
        format_compact_lines(template, &mut self.conn)?;
        self.records += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.records
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.conn.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.conn
    }
}
