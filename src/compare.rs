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

//! Equality of mappings.
//!
//! A [Comparator] is built once from the run configuration. The tolerance
//! used by range comparisons depends on the read being compared and is
//! carried in a [CmpContext] that is created for every pair of templates
//! and passed to each comparison.

use std::cmp::Ordering;

use roaring::RoaringBitmap;

use crate::{Mapping, Template};

fn pair_greedy<T>(
    a: &[T],
    b: &[T],
    equal: impl Fn(&T, &T) -> bool,
) -> Vec<Option<usize>> {
    let mut used = RoaringBitmap::new();
    a.iter().map(|x| {
        let hit = b.iter().enumerate().find(|(idx, y)| {
            !used.contains(*idx as u32) && equal(x, y)
        }).map(|(idx, _)| idx);
        if let Some(idx) = hit {
            used.insert(idx as u32);
        }
        hit
    }).collect()
}

/// How start positions are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CmpMode {
    /// Start positions must be identical.
    Strict,
    /// Start positions can differ by the tolerance.
    #[default]
    Range,
}

/// Per-pair comparison state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CmpContext {
    /// Maximum difference in start positions, in bases.
    pub tolerance: u64,
}

/// Compares mappings and sets of mappings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparator {
    pub mode: CmpMode,
    pub eq_threshold: f64,
}

impl Default for Comparator {
    fn default() -> Self {
        Comparator::range(0.5)
    }
}

impl Comparator {
    pub fn new(mode: CmpMode, eq_threshold: f64) -> Self {
        Comparator{ mode, eq_threshold }
    }

    pub fn strict() -> Self {
        Comparator::new(CmpMode::Strict, 0.5)
    }

    pub fn range(eq_threshold: f64) -> Self {
        Comparator::new(CmpMode::Range, eq_threshold)
    }

    /// Position tolerance for a read of `read_length` bases.
    ///
    /// Thresholds up to 1.0 are relative to the read length, larger ones
    /// are absolute. The result is truncated.
    ///
    /// ## Usage
    /// ```rust
    /// use mapset::Comparator;
    ///
    /// assert_eq!(Comparator::range(0.1).tolerance(100), 10);
    /// assert_eq!(Comparator::range(10.0).tolerance(100), 10);
    /// assert_eq!(Comparator::range(0.5).tolerance(75), 37);
    /// ```
    ///
    pub fn tolerance(&self, read_length: u64) -> u64 {
        if self.eq_threshold <= 1.0 {
            (self.eq_threshold * read_length as f64) as u64
        } else {
            self.eq_threshold as u64
        }
    }

    /// Context for comparing the mappings of one read.
    pub fn context(&self, read_length: u64) -> CmpContext {
        CmpContext{ tolerance: self.tolerance(read_length) }
    }

    /// Orders two mappings by sequence name, strand and start position.
    ///
    /// In range mode positions within the tolerance compare as equal.
    /// Mismatches are not considered.
    pub fn compare_mapping(
        &self,
        a: &Mapping,
        b: &Mapping,
        ctx: CmpContext,
    ) -> Ordering {
        let by_name = a.seq_name.cmp(&b.seq_name);
        if by_name != Ordering::Equal {
            return by_name
        }
        let by_strand = a.strand.cmp(&b.strand);
        if by_strand != Ordering::Equal {
            return by_strand
        }
        match self.mode {
            CmpMode::Strict => a.position.cmp(&b.position),
            CmpMode::Range => {
                if a.position.abs_diff(b.position) <= ctx.tolerance {
                    Ordering::Equal
                } else {
                    a.position.cmp(&b.position)
                }
            },
        }
    }

    pub fn mappings_equal(
        &self,
        a: &Mapping,
        b: &Mapping,
        ctx: CmpContext,
    ) -> bool {
        self.compare_mapping(a, b, ctx) == Ordering::Equal
    }

    /// Pairs every mapping in `a` with the first unpaired equal mapping in
    /// `b`.
    ///
    /// Each mapping in `b` is used at most once, so duplicates pair up one
    /// to one. Returns the index in `b` paired with each element of `a`.
    pub fn pair_maps(
        &self,
        a: &[Mapping],
        b: &[Mapping],
        ctx: CmpContext,
    ) -> Vec<Option<usize>> {
        pair_greedy(a, b, |map_a, map_b| self.mappings_equal(map_a, map_b, ctx))
    }

    /// Pairs the paired maps of two paired-end templates one to one.
    ///
    /// Two paired maps are equal when both ends are equal, or unmapped in
    /// both.
    pub fn pair_map_pairs(
        &self,
        a: &Template,
        b: &Template,
        ctx: CmpContext,
    ) -> Vec<Option<usize>> {
        let ends_a: Vec<[Option<&Mapping>; 2]> = a.pairs.iter().map(|pair| a.pair_ends(pair)).collect();
        let ends_b: Vec<[Option<&Mapping>; 2]> = b.pairs.iter().map(|pair| b.pair_ends(pair)).collect();
        pair_greedy(&ends_a, &ends_b, |pair_a, pair_b| {
            pair_a.iter().zip(pair_b.iter()).all(|ends| match ends {
                (Some(map_a), Some(map_b)) => self.mappings_equal(map_a, map_b, ctx),
                (None, None) => true,
                _ => false,
            })
        })
    }

    /// Compares two sets of mappings.
    ///
    /// The sets are equal if every mapping in one pairs with a mapping in
    /// the other. Otherwise shorter sets order first, and sets of the same
    /// size are ordered by their first unpaired mappings.
    pub fn compare_mapping_set(
        &self,
        a: &[Mapping],
        b: &[Mapping],
        ctx: CmpContext,
    ) -> Ordering {
        let by_len = a.len().cmp(&b.len());
        if by_len != Ordering::Equal {
            return by_len
        }

        let pairs = self.pair_maps(a, b, ctx);
        let Some(first_unpaired_a) = pairs.iter().position(|hit| hit.is_none()) else {
            return Ordering::Equal
        };

        let paired_b: Vec<bool> = pairs.iter().fold(vec![false; b.len()], |mut paired, hit| {
            if let Some(idx) = hit {
                paired[*idx] = true;
            }
            paired
        });
        let first_unpaired_b = paired_b.iter().position(|paired| !paired).unwrap_or(0);

        self.compare_mapping(&a[first_unpaired_a], &b[first_unpaired_b], ctx)
    }
}
