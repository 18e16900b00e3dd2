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
use std::io::Write;

use crate::setops::{CompareRecord, JoinRecord};
use crate::{Mapping, MismatchKind, Strand, Template};

/// Format counters as `:`-separated counts.
///
/// A `+` follows the last complete stratum, replacing the separator when
/// more counters follow. Empty counters are written as `0`. With `compact`
/// set, runs of two or more zeros are written as `0xN`.
///
pub fn format_counters(
    counters: &[u64],
    max_complete_strata: u64,
    compact: bool,
) -> String {
    if counters.is_empty() {
        return "0".to_string()
    }

    let mut formatted: String = String::new();
    let mut idx = 0;
    while idx < counters.len() {
        if idx > 0 {
            formatted += if max_complete_strata > 0 && idx as u64 == max_complete_strata { "+" } else { ":" };
        }
        let mut run = counters[idx..].iter().take_while(|x| **x == 0).count();
        if (idx as u64) < max_complete_strata {
            run = run.min(max_complete_strata as usize - idx);
        }
        if compact && run >= 2 {
            formatted += &format!("0x{}", run);
            idx += run;
        } else {
            formatted += &counters[idx].to_string();
            idx += 1;
        }
    }
    if max_complete_strata > 0 && max_complete_strata == counters.len() as u64 {
        formatted.push('+');
    }
    formatted
}

/// Format the mismatches of `map` as a GEM CIGAR string.
pub fn format_cigar(
    map: &Mapping,
) -> String {
    let mut formatted: String = String::new();
    let mut cursor: u64 = 0;
    map.mismatches.iter().for_each(|mm| {
        if mm.position > cursor {
            formatted += &(mm.position - cursor).to_string();
            cursor = mm.position;
        }
        match mm.kind {
            MismatchKind::Mismatch => {
                formatted.push(mm.base as char);
                cursor += 1;
            },
            MismatchKind::Insertion => {
                formatted += &format!(">{}-", mm.size);
                cursor += mm.size;
            },
            MismatchKind::Deletion => {
                formatted += &format!(">{}+", mm.size);
            },
        }
    });

    let remaining = map.read_span().saturating_sub(cursor);
    if remaining > 0 || formatted.is_empty() {
        formatted += &remaining.to_string();
    }
    formatted
}

/// Format a single map as `SEQ:STRAND:POS:CIGAR`.
pub fn format_mapping(
    map: &Mapping,
) -> String {
    let strand = match map.strand {
        Strand::Forward => '+',
        Strand::Reverse => '-',
    };
    format!("{}:{}:{}:{}", map.seq_name, strand, map.position, format_cigar(map))
}

/// Format the maps column of `template`.
///
/// Paired-end maps are written pair by pair as `END1::END2`, with `-` for
/// an unmapped end.
pub fn format_maps(
    template: &Template,
) -> String {
    if template.num_maps() == 0 {
        return "-".to_string()
    }

    if !template.is_paired() {
        return template.alignments[0].maps.iter().map(format_mapping).collect::<Vec<String>>().join(",")
    }

    template.pairs.iter().map(|pair| {
        let [first, second] = template.pair_ends(pair).map(|end| end.map(format_mapping).unwrap_or("-".to_string()));
        format!("{}::{}", first, second)
    }).collect::<Vec<String>>().join(",")
}

fn format_ends(
    template: &Template,
    field: impl Fn(&crate::Alignment) -> &str,
) -> String {
    template.alignments.iter().map(field).collect::<Vec<&str>>().join(" ")
}

/// Format a template as a MAP line.
///
/// Writes bytes containing the formatted line containing the contents of
/// `template` to `conn`.
///
pub fn format_map_line<W: Write>(
    template: &Template,
    conn: &mut W,
) -> std::io::Result<()> {
    let mut formatted: String = String::new();

    formatted += &template.tag;
    formatted += "\t";
    formatted += &format_ends(template, |aln| aln.read.as_str());
    formatted += "\t";
    formatted += &format_ends(template, |aln| aln.qualities.as_str());
    formatted += "\t";
    formatted += &format_counters(&template.counters, template.max_complete_strata(), false);
    formatted += "\t";
    formatted += &format_maps(template);
    formatted += "\n";

    conn.write_all(formatted.as_bytes())
}

/// Format a join record as `TAG, COUNTERS(A), COUNTERS(B), MAPS(A), MAPS(B)`.
pub fn format_join_line<W: Write>(
    record: &JoinRecord,
    conn: &mut W,
) -> std::io::Result<()> {
    let formatted = format!(
        "{}\t{}\t{}\t{}\t{}\n",
        record.master.tag,
        format_counters(&record.master.counters, record.master.max_complete_strata(), false),
        format_counters(&record.slave.counters, record.slave.max_complete_strata(), false),
        format_maps(record.master),
        format_maps(record.slave),
    );
    conn.write_all(formatted.as_bytes())
}

/// Format a compare record as `TAG`, the counters of A-B, B-A and A∩B,
/// and the maps of A-B, B-A and A∩B.
pub fn format_compare_line<W: Write>(
    record: &CompareRecord,
    conn: &mut W,
) -> std::io::Result<()> {
    let parts = [&record.master_only, &record.slave_only, &record.common];

    let mut formatted: String = record.tag.clone();
    parts.iter().for_each(|part| {
        formatted += "\t";
        formatted += &format_counters(&part.counters, part.max_complete_strata(), false);
    });
    parts.iter().for_each(|part| {
        formatted += "\t";
        formatted += &format_maps(part);
    });
    formatted += "\n";

    conn.write_all(formatted.as_bytes())
}

/// Format one compact summary line per end of `template`.
///
/// Each line is `End<n>::TAG[READ_LENGTH]`, the compact counters and the
/// sequence names of the maps.
pub fn format_compact_lines<W: Write>(
    template: &Template,
    conn: &mut W,
) -> std::io::Result<()> {
    let mut formatted: String = String::new();
    template.alignments.iter().enumerate().for_each(|(idx, aln)| {
        formatted += &format!("End{}::{}[{}]\t", idx + 1, aln.tag, aln.read_length());
        formatted += &format_counters(&aln.counters, aln.max_complete_strata, true);
        formatted += "\t";
        formatted += &aln.maps.iter().map(|map| map.seq_name.as_str()).collect::<Vec<&str>>().join(",");
        formatted += "\n";
    });
    conn.write_all(formatted.as_bytes())
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn format_counters_plain_and_compact() {
        use super::format_counters;

        assert_eq!(format_counters(&[], 0, false), "0");
        assert_eq!(format_counters(&[1, 0, 2], 0, false), "1:0:2");
        assert_eq!(format_counters(&[0, 1, 2, 3], 2, false), "0:1+2:3");
        assert_eq!(format_counters(&[0, 0, 0, 1], 0, true), "0x3:1");
        assert_eq!(format_counters(&[1, 0, 1], 0, true), "1:0:1");
        assert_eq!(format_counters(&[0, 0, 0, 1], 0, false), "0:0:0:1");
        assert_eq!(format_counters(&[1], 1, false), "1+");
        assert_eq!(format_counters(&[0, 2], 2, false), "0:2+");
        assert_eq!(format_counters(&[0, 0, 0, 1], 2, true), "0x2+0:1");
    }

    #[test]
    fn format_cigar_all_events() {
        use super::format_cigar;
        use crate::parser::map::read_cigar;
        use crate::Mapping;

        let (mismatches, base_length) = read_cigar("5A3>2+4>1-2").unwrap();
        let map = Mapping{ seq_name: "chr1".to_string(), base_length, mismatches, ..Default::default() };

        assert_eq!(format_cigar(&map), "5A3>2+4>1-2");

        let map = Mapping{ base_length: 151, ..Default::default() };
        assert_eq!(format_cigar(&map), "151");
    }

    #[test]
    fn format_map_line_single_end() {
        use super::format_map_line;
        use crate::parser::map::read_map;

        let data: Vec<u8> = b"read1\tACGTACGTAC\tIIIIIIIIII\t1:0:1\tchr1:+:100:10,chr2:-:5:3G6".to_vec();
        let template = read_map(&mut data.as_slice()).unwrap();

        let mut got: Vec<u8> = Vec::new();
        format_map_line(&template, &mut got).unwrap();

        let mut expected = data.clone();
        expected.push(b'\n');
        assert_eq!(got, expected);
    }

    #[test]
    fn format_map_line_paired_end() {
        use super::format_map_line;
        use crate::parser::map::read_map;

        let data: Vec<u8> = b"pair\tACGT TTGCA\tIIII JJJJJ\t1+1\tchr1:+:10:4::chr1:-:200:5,chr3:+:7:2A1::-".to_vec();
        let template = read_map(&mut data.as_slice()).unwrap();

        let mut got: Vec<u8> = Vec::new();
        format_map_line(&template, &mut got).unwrap();

        let mut expected = data.clone();
        expected.push(b'\n');
        assert_eq!(got, expected);
    }

    #[test]
    fn format_map_line_complete_strata_at_end() {
        use super::format_map_line;
        use crate::parser::map::read_map;

        let data: Vec<u8> = b"read1\tACGT\tIIII\t1+\tchr1:+:10:4".to_vec();
        let template = read_map(&mut data.as_slice()).unwrap();
        assert_eq!(template.max_complete_strata(), 1);

        let mut got: Vec<u8> = Vec::new();
        format_map_line(&template, &mut got).unwrap();

        let mut expected = data.clone();
        expected.push(b'\n');
        assert_eq!(got, expected);
    }

    #[test]
    fn format_map_line_paired_end_keeps_pairing() {
        use super::format_map_line;
        use crate::parser::map::read_map;

        let data: Vec<u8> = b"pair\tACGT TTGCA\tIIII JJJJJ\t2\tchr1:+:10:4::-,-::chr2:-:9:5".to_vec();
        let template = read_map(&mut data.as_slice()).unwrap();

        let mut got: Vec<u8> = Vec::new();
        format_map_line(&template, &mut got).unwrap();

        let mut expected = data.clone();
        expected.push(b'\n');
        assert_eq!(got, expected);
    }

    #[test]
    fn format_map_line_unmapped() {
        use super::format_map_line;
        use crate::{Alignment, Template};

        let mut aln = Alignment::new("r9");
        aln.read = "ACGT".to_string();
        let template = Template::from_alignment(aln);

        let mut got: Vec<u8> = Vec::new();
        format_map_line(&template, &mut got).unwrap();

        assert_eq!(got, b"r9\tACGT\t\t0\t-\n".to_vec());
    }

    #[test]
    fn format_compact_lines_per_end() {
        use super::format_compact_lines;
        use crate::parser::map::read_map;

        let data: Vec<u8> = b"pair\tACGT TTGCA\tIIII JJJJJ\t1+1\tchr1:+:10:4::chr1:-:200:5,chr3:+:7:A1A1A::-".to_vec();
        let template = read_map(&mut data.as_slice()).unwrap();

        let mut got: Vec<u8> = Vec::new();
        format_compact_lines(&template, &mut got).unwrap();

        let expected = b"End1::pair[4]\t1+0x2:1\tchr1,chr3\nEnd2::pair[5]\t1+\tchr1\n".to_vec();
        assert_eq!(got, expected);
    }
}
