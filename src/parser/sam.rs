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
use std::io::Read;

use bstr::ByteSlice;
use noodles_sam as sam;
use noodles_sam::alignment::record::cigar::op::Kind;

use crate::parser::normalize_tag;
use crate::{Alignment, Mapping, Mismatch, MismatchKind, Strand};

type E = Box<dyn std::error::Error>;

/// One SAM record and the segment it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamEnd {
    pub alignment: Alignment,
    pub first_segment: bool,
    pub last_segment: bool,
}

fn reverse_complement(seq: &[u8]) -> String {
    seq.iter().rev().map(|base| match base {
        b'A' => 'T',
        b'C' => 'G',
        b'G' => 'C',
        b'T' => 'A',
        b'a' => 't',
        b'c' => 'g',
        b'g' => 'c',
        b't' => 'a',
        other => *other as char,
    }).collect()
}

/// Parse a line from a [SAM](https://samtools.github.io/hts-specs/SAMv1.pdf) file.
///
/// Unmapped records produce an alignment without maps. For mapped records
/// the CIGAR is converted to mismatch events and the `AS:i` tag, if
/// present, is the score of the mapping. Reads on the reverse strand are
/// stored in their original orientation.
///
/// Returns the [alignment](Alignment) on the line and its segment flags.
///
pub fn read_sam<R: Read>(
    conn: &mut R,
) -> Result<SamEnd, E> {
    let mut contents: Vec<u8> = Vec::new();
    conn.read_to_end(&mut contents)?;

    let record = sam::Record::try_from(contents.as_slice())?;
    let fields: Vec<&[u8]> = contents.split_str("\t").collect();
    if fields.len() < 11 {
        return Err(format!("expected at least 11 columns, found {}", fields.len()).into())
    }

    let query_name: String = record.name().ok_or("missing read name")?.to_string();
    let flags = record.flags()?;
    let reverse = flags.is_reverse_complemented();

    let mut alignment = Alignment::new(&normalize_tag(&query_name));
    let (seq, qual) = (fields[9], fields[10]);
    if seq != b"*" {
        alignment.read = if reverse { reverse_complement(seq) } else { seq.to_str_lossy().to_string() };
    }
    if qual != b"*" {
        alignment.qualities = if reverse { qual.iter().rev().map(|x| *x as char).collect() } else { qual.to_str_lossy().to_string() };
    }

    let mut score: Option<u64> = None;
    for field in fields.iter().skip(11) {
        let mut parts = field.splitn_str(3, ":");
        let (Some(key), Some(kind), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("malformed optional field '{}'", field.to_str_lossy()).into())
        };
        if key == b"AS" && kind == b"i" {
            score = value.to_str()?.parse::<i64>().ok().map(|x| x.max(0) as u64);
        }
        alignment.attributes.insert(key.to_str_lossy().to_string(), format!("{}:{}", kind.to_str_lossy(), value.to_str_lossy()));
    }

    if !flags.is_unmapped() {
        let seq_name: String = record.reference_sequence_name().ok_or("mapped record without reference sequence name")?.to_string();
        let position = record.alignment_start().transpose()?.ok_or("mapped record without position")?;

        let mut mismatches: Vec<Mismatch> = Vec::new();
        let mut read_pos: u64 = 0;
        let mut ref_span: u64 = 0;
        let mut seq_pos: u64 = 0;
        let read_bytes: &[u8] = if seq == b"*" { &[] } else { seq };
        for op in record.cigar().iter() {
            let op = op?;
            let len = op.len() as u64;
            match op.kind() {
                Kind::Match | Kind::SequenceMatch => {
                    read_pos += len;
                    seq_pos += len;
                    ref_span += len;
                },
                Kind::SequenceMismatch => {
                    (0..len).for_each(|offset| {
                        let base = read_bytes.get((seq_pos + offset) as usize).copied().unwrap_or(b'N');
                        mismatches.push(Mismatch{ kind: MismatchKind::Mismatch, position: read_pos + offset, base, size: 1 });
                    });
                    read_pos += len;
                    seq_pos += len;
                    ref_span += len;
                },
                Kind::Insertion => {
                    mismatches.push(Mismatch{ kind: MismatchKind::Insertion, position: read_pos, base: b'N', size: len });
                    read_pos += len;
                    seq_pos += len;
                },
                Kind::Deletion | Kind::Skip => {
                    mismatches.push(Mismatch{ kind: MismatchKind::Deletion, position: read_pos, base: b'N', size: len });
                    ref_span += len;
                },
                Kind::SoftClip => seq_pos += len,
                Kind::HardClip | Kind::Pad => {},
            }
        }

        alignment.maps.push(Mapping {
            seq_name,
            position: usize::from(position) as u64,
            strand: if reverse { Strand::Reverse } else { Strand::Forward },
            base_length: ref_span,
            score,
            mismatches,
        });
    }
    alignment.recompute_counters();

    Ok(SamEnd {
        alignment,
        first_segment: flags.is_first_segment(),
        last_segment: flags.is_last_segment(),
    })
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn read_sam_single() {
        use super::read_sam;
        use crate::{Mapping, Strand};

        let data: Vec<u8> = b"ERR4035126.1\t0\tOZ038621.1\t4541508\t60\t10M\t*\t0\t0\tAGTATTTAGT\tFJ<<JJFJAA\tNM:i:0\tMD:Z:10\tAS:i:10".to_vec();

        let got = read_sam(&mut data.as_slice()).unwrap();

        let expected = Mapping{ seq_name: "OZ038621.1".to_string(), position: 4541508, strand: Strand::Forward, base_length: 10, score: Some(10), mismatches: vec![] };
        assert_eq!(got.alignment.tag, "ERR4035126.1");
        assert_eq!(got.alignment.read, "AGTATTTAGT");
        assert_eq!(got.alignment.qualities, "FJ<<JJFJAA");
        assert_eq!(got.alignment.maps, vec![expected]);
        assert_eq!(got.alignment.counters, vec![1]);
        assert_eq!(got.alignment.attributes.get("MD").unwrap(), "Z:10");
        assert!(!got.first_segment);
    }

    #[test]
    fn read_sam_reverse_strand_restores_read() {
        use super::read_sam;
        use crate::Strand;

        let data: Vec<u8> = b"r1\t16\tchr1\t100\t60\t4M\t*\t0\t0\tAACG\tABCD".to_vec();

        let got = read_sam(&mut data.as_slice()).unwrap();

        assert_eq!(got.alignment.read, "CGTT");
        assert_eq!(got.alignment.qualities, "DCBA");
        assert_eq!(got.alignment.maps[0].strand, Strand::Reverse);
        assert_eq!(got.alignment.maps[0].score, None);
    }

    #[test]
    fn read_sam_indels_and_clips() {
        use super::read_sam;
        use crate::{Mismatch, MismatchKind};

        let data: Vec<u8> = b"r1\t0\tchr1\t100\t60\t2S3M1I2M2D1X\t*\t0\t0\tGGACGTACG\t*".to_vec();

        let got = read_sam(&mut data.as_slice()).unwrap();
        let map = &got.alignment.maps[0];

        let expected = vec![
            Mismatch{ kind: MismatchKind::Insertion, position: 3, base: b'N', size: 1 },
            Mismatch{ kind: MismatchKind::Deletion, position: 6, base: b'N', size: 2 },
            Mismatch{ kind: MismatchKind::Mismatch, position: 6, base: b'G', size: 1 },
        ];
        assert_eq!(map.mismatches, expected);
        assert_eq!(map.base_length, 8);
        assert_eq!(got.alignment.counters, vec![0, 0, 0, 1]);
        assert_eq!(got.alignment.qualities, "");
    }

    #[test]
    fn read_sam_unmapped() {
        use super::read_sam;

        let data: Vec<u8> = b"ERR4035126.1178767/1\t4\t*\t0\t0\t*\t*\t0\t0\tACTTGGCTCA\tAAFFFJJJJJ\tAS:i:0\tXS:i:0".to_vec();

        let got = read_sam(&mut data.as_slice()).unwrap();

        assert_eq!(got.alignment.tag, "ERR4035126.1178767");
        assert!(got.alignment.maps.is_empty());
        assert!(got.alignment.counters.is_empty());
        assert_eq!(got.alignment.read_length(), 10);
    }

    #[test]
    fn read_sam_paired_flags() {
        use super::read_sam;

        let first: Vec<u8> = b"p1\t67\tchr1\t100\t60\t4M\t=\t200\t104\tACGT\tIIII".to_vec();
        let last: Vec<u8> = b"p1\t131\tchr1\t200\t60\t4M\t=\t100\t-104\tTTTT\tIIII".to_vec();

        let got_first = read_sam(&mut first.as_slice()).unwrap();
        let got_last = read_sam(&mut last.as_slice()).unwrap();

        assert!(got_first.first_segment && !got_first.last_segment);
        assert!(got_last.last_segment && !got_last.first_segment);
    }
}
