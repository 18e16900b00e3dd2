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
use needletail::parser::SequenceRecord;

use crate::parser::normalize_tag;
use crate::Alignment;

type E = Box<dyn std::error::Error>;

/// Convert a FASTA or FASTQ record to an alignment without maps.
///
/// FASTA records have an empty quality string.
///
pub fn read_fastx(
    record: &SequenceRecord,
) -> Result<Alignment, E> {
    let id = std::str::from_utf8(record.id())?;
    let mut alignment = Alignment::new(&normalize_tag(id));
    alignment.read = String::from_utf8(record.seq().into_owned())?;
    alignment.qualities = match record.qual() {
        Some(qual) => std::str::from_utf8(qual)?.to_string(),
        None => String::new(),
    };
    Ok(alignment)
}
