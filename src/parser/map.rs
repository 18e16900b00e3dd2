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

use crate::parser::normalize_tag;
use crate::{MapPair, Mapping, Mismatch, MismatchKind, Strand, Template};

type E = Box<dyn std::error::Error>;

// Longest counters column accepted
const MAX_STRATA: usize = 1 << 16;

/// Parse a line from a GEM MAP file.
///
/// A line has five tab-separated columns: the tag, the read, the quality
/// string, the counters and the maps. Paired-end lines separate the two
/// reads and quality strings with a space and the two ends of each map
/// with `::`.
///
/// Returns the [template](Template) on the line.
///
pub fn read_map<R: Read>(
    conn: &mut R,
) -> Result<Template, E> {
    let separator: char = '\t';
    let mut contents: String = String::new();
    conn.read_to_string(&mut contents)?;

    let mut records = contents.split(separator);

    let tag = normalize_tag(records.next().ok_or("empty line")?);
    let reads: Vec<&str> = records.next().ok_or("missing READ column")?.split(' ').collect();
    let quals_field = records.next().ok_or("missing QUALS column")?;
    let (counters, mcs) = read_counters(records.next().ok_or("missing COUNTERS column")?)?;
    let maps_field = records.next().ok_or("missing MAPS column")?;
    if records.next().is_some() {
        return Err("too many columns".into())
    }

    let n_ends = reads.len();
    if n_ends > 2 {
        return Err(format!("{} reads on a line, at most 2 are supported", n_ends).into())
    }
    let quals: Vec<&str> = if quals_field.is_empty() { vec![""; n_ends] } else { quals_field.split(' ').collect() };
    if quals.len() != n_ends {
        return Err("different number of reads and quality strings".into())
    }

    let mut template = Template::new(&tag);
    reads.iter().zip(quals.iter()).enumerate().for_each(|(idx, (read, qual))| {
        let aln = template.alignment_mut_dyn(idx);
        aln.read = read.to_string();
        aln.qualities = qual.to_string();
        aln.max_complete_strata = mcs;
    });

    if maps_field != "-" {
        for token in maps_field.split(',') {
            if n_ends == 1 {
                template.alignments[0].maps.push(read_mapping(token)?);
            } else {
                let (end_1, end_2) = token.split_once("::").ok_or_else(|| format!("map '{}' is not paired", token))?;
                let mut pair: MapPair = [None, None];
                for (idx, end) in [end_1, end_2].into_iter().enumerate() {
                    if end != "-" {
                        let maps = &mut template.alignments[idx].maps;
                        maps.push(read_mapping(end)?);
                        pair[idx] = Some(maps.len() - 1);
                    }
                }
                template.pairs.push(pair);
            }
        }
    }

    if n_ends == 1 {
        template.alignments[0].counters = counters.clone();
    } else {
        template.alignments.iter_mut().for_each(|aln| aln.recompute_counters());
    }
    template.counters = counters;

    Ok(template)
}

/// Parse the counters column.
///
/// Returns the counters and the maximum complete strata marked by `+`.
/// Runs of zeros written as `0xN` are expanded.
pub fn read_counters(
    field: &str,
) -> Result<(Vec<u64>, u64), E> {
    let mut counters: Vec<u64> = Vec::new();
    let mut mcs: u64 = 0;

    let mut rest = field;
    while !rest.is_empty() {
        let end = rest.find(|c: char| c == ':' || c == '+').unwrap_or(rest.len());
        let token = &rest[..end];
        if let Some(run) = token.strip_prefix("0x") {
            let n = run.parse::<usize>()?;
            if n > MAX_STRATA - counters.len() {
                return Err(format!("run of {} zeros is longer than the {} supported strata", run, MAX_STRATA).into())
            }
            counters.extend(std::iter::repeat(0).take(n));
        } else {
            if counters.len() == MAX_STRATA {
                return Err(format!("more than {} strata", MAX_STRATA).into())
            }
            counters.push(token.parse::<u64>()?);
        }
        if rest[end..].starts_with('+') {
            mcs = counters.len() as u64;
        }
        rest = if end < rest.len() { &rest[(end + 1)..] } else { "" };
    }

    if counters.is_empty() {
        return Err("empty COUNTERS column".into())
    }
    Ok((counters, mcs))
}

/// Parse one map in the `SEQ:STRAND:POS:CIGAR` format.
pub fn read_mapping(
    token: &str,
) -> Result<Mapping, E> {
    // sequence names can contain ':'
    let mut fields = token.rsplitn(4, ':');
    let cigar = fields.next().ok_or("missing CIGAR")?;
    let pos = fields.next().ok_or("missing POS")?;
    let strand = fields.next().ok_or("missing STRAND")?;
    let seq_name = fields.next().ok_or_else(|| format!("malformed map '{}'", token))?;

    let strand = match strand {
        "+" | "F" => Strand::Forward,
        "-" | "R" => Strand::Reverse,
        _ => return Err(format!("invalid strand '{}' in map '{}'", strand, token).into()),
    };
    let (mismatches, base_length) = read_cigar(cigar)?;

    Ok(Mapping {
        seq_name: seq_name.to_string(),
        position: pos.parse::<u64>()?,
        strand,
        base_length,
        score: None,
        mismatches,
    })
}

/// Parse a GEM CIGAR string.
///
/// Numbers are runs of matching bases, single bases are substitutions,
/// `>N+` is a deletion of N bases and `>N-` an insertion of N bases.
///
/// Returns the mismatches and the number of reference bases covered.
pub fn read_cigar(
    cigar: &str,
) -> Result<(Vec<Mismatch>, u64), E> {
    let mut mismatches: Vec<Mismatch> = Vec::new();
    let mut read_pos: u64 = 0;
    let mut ref_span: u64 = 0;

    let bytes = cigar.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        let start = idx;
        match bytes[idx] {
            b'0'..=b'9' => {
                while idx < bytes.len() && bytes[idx].is_ascii_digit() {
                    idx += 1;
                }
                let n = cigar[start..idx].parse::<u64>()?;
                read_pos += n;
                ref_span += n;
            },
            b'>' => {
                idx += 1;
                while idx < bytes.len() && bytes[idx].is_ascii_digit() {
                    idx += 1;
                }
                let size = cigar[(start + 1)..idx].parse::<u64>()?;
                let kind = match bytes.get(idx) {
                    Some(b'+') => MismatchKind::Deletion,
                    Some(b'-') => MismatchKind::Insertion,
                    _ => return Err(format!("indel without '+' or '-' in CIGAR '{}'", cigar).into()),
                };
                idx += 1;
                mismatches.push(Mismatch{ kind, position: read_pos, base: b'N', size });
                match kind {
                    MismatchKind::Deletion => ref_span += size,
                    _ => read_pos += size,
                }
            },
            base if base.is_ascii_alphabetic() => {
                idx += 1;
                mismatches.push(Mismatch{ kind: MismatchKind::Mismatch, position: read_pos, base: base.to_ascii_uppercase(), size: 1 });
                read_pos += 1;
                ref_span += 1;
            },
            other => return Err(format!("unexpected character '{}' in CIGAR '{}'", other as char, cigar).into()),
        }
    }

    Ok((mismatches, ref_span))
}
