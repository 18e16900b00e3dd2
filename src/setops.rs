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

//! Set operations on the mappings of two templates for the same read.
//!
//! Mapping lists are treated as multisets: a mapping in one list cancels at
//! most one equal mapping in the other. Paired-end templates are combined
//! end by end.

use crate::compare::{CmpContext, Comparator};
use crate::error::Divergence;
use crate::{Alignment, Error, MapPair, Mapping, Template};

/// Set operations over two templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    /// Mappings of A followed by the mappings of B not in A.
    Union,
    /// Mappings of A that are in B.
    Intersection,
    /// Mappings of A that are not in B.
    Difference,
}

impl SetOp {
    /// Whether master reads without a slave counterpart are written out.
    pub fn emits_unmatched_master(&self) -> bool {
        matches!(self, SetOp::Union | SetOp::Difference)
    }
}

/// Per-read reports over two templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOp {
    Join,
    Compare,
}

/// Both templates of a read side by side.
#[derive(Debug, Clone, Copy)]
pub struct JoinRecord<'a> {
    pub master: &'a Template,
    pub slave: &'a Template,
}

/// Partition of the mappings of a read into A-B, B-A and A∩B.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareRecord {
    pub tag: String,
    pub master_only: Template,
    pub slave_only: Template,
    pub common: Template,
}

/// Applies `op` to the maps of two lists.
pub fn combine_maps(
    a: &[Mapping],
    b: &[Mapping],
    op: SetOp,
    comparator: &Comparator,
    ctx: CmpContext,
) -> Vec<Mapping> {
    match op {
        SetOp::Union => {
            let pairs = comparator.pair_maps(b, a, ctx);
            let mut res: Vec<Mapping> = a.to_vec();
            res.extend(b.iter().zip(pairs.iter()).filter(|(_, hit)| hit.is_none()).map(|(map, _)| map.clone()));
            res
        },
        SetOp::Intersection => {
            let pairs = comparator.pair_maps(a, b, ctx);
            a.iter().zip(pairs.iter()).filter(|(_, hit)| hit.is_some()).map(|(map, _)| map.clone()).collect()
        },
        SetOp::Difference => {
            let pairs = comparator.pair_maps(a, b, ctx);
            a.iter().zip(pairs.iter()).filter(|(_, hit)| hit.is_none()).map(|(map, _)| map.clone()).collect()
        },
    }
}

fn combine_alignment(
    a: &Alignment,
    b: &Alignment,
    op: SetOp,
    comparator: &Comparator,
    ctx: CmpContext,
) -> Alignment {
    let maps_b = b.maps.as_slice();

    let mut res = Alignment {
        tag: a.tag.clone(),
        read: a.read.clone(),
        qualities: a.qualities.clone(),
        maps: combine_maps(&a.maps, maps_b, op, comparator, ctx),
        counters: Vec::new(),
        attributes: a.attributes.clone(),
        max_complete_strata: a.max_complete_strata,
    };
    res.recompute_counters();
    res
}

fn select_pairs<'a>(
    a: &'a Template,
    b: &'a Template,
    op: SetOp,
    comparator: &Comparator,
    ctx: CmpContext,
) -> Vec<(&'a Template, &'a MapPair)> {
    let keep = |template: &'a Template, pairs: Vec<Option<usize>>, matched: bool| {
        template.pairs.iter().zip(pairs).filter(move |(_, hit)| hit.is_some() == matched).map(move |(pair, _)| (template, pair))
    };
    match op {
        SetOp::Union => {
            let mut res: Vec<(&Template, &MapPair)> = a.pairs.iter().map(|pair| (a, pair)).collect();
            res.extend(keep(b, comparator.pair_map_pairs(b, a, ctx), false));
            res
        },
        SetOp::Intersection => keep(a, comparator.pair_map_pairs(a, b, ctx), true).collect(),
        SetOp::Difference => keep(a, comparator.pair_map_pairs(a, b, ctx), false).collect(),
    }
}

fn combine_paired(
    a: &Template,
    b: &Template,
    op: SetOp,
    comparator: &Comparator,
    ctx: CmpContext,
) -> Template {
    let mut res = Template {
        tag: a.tag.clone(),
        alignments: a.alignments.iter().map(|aln| Alignment {
            tag: aln.tag.clone(),
            read: aln.read.clone(),
            qualities: aln.qualities.clone(),
            maps: Vec::new(),
            counters: Vec::new(),
            attributes: aln.attributes.clone(),
            max_complete_strata: aln.max_complete_strata,
        }).collect(),
        pairs: Vec::new(),
        counters: Vec::new(),
        attributes: a.attributes.clone(),
    };

    for (template, pair) in select_pairs(a, b, op, comparator, ctx) {
        let mut res_pair: MapPair = [None, None];
        for (idx, map) in template.pair_ends(pair).into_iter().enumerate() {
            if let (Some(map), Some(aln)) = (map, res.alignments.get_mut(idx)) {
                aln.maps.push(map.clone());
                res_pair[idx] = Some(aln.maps.len() - 1);
            }
        }
        res.pairs.push(res_pair);
    }
    res.recompute_counters();
    res
}

/// Applies `op` to two templates for the same read.
///
/// The result takes its tag, reads, qualities and attributes from `a`.
/// Paired-end templates are combined by their paired maps. Counters are
/// derived from the resulting maps.
///
/// Fails with [Divergence::EndCountMismatch] if `a` and `b` have a
/// different number of ends.
///
/// ## Usage
/// ```rust
/// use mapset::{Alignment, Mapping, Template};
/// use mapset::compare::Comparator;
/// use mapset::setops::{combine, SetOp};
///
/// let mut aln = Alignment::new("r1");
/// aln.read = "ACGT".to_string();
/// aln.maps.push(Mapping{ seq_name: "chr1".to_string(), position: 7, ..Default::default() });
/// let a = Template::from_alignment(aln);
/// let b = Template::from_alignment(Alignment::new("r1"));
///
/// let cmp = Comparator::strict();
/// let res = combine(&a, &b, SetOp::Intersection, &cmp, cmp.context(a.total_length())).unwrap();
///
/// assert_eq!(res.num_maps(), 0);
/// assert!(res.counters.is_empty());
/// assert_eq!(res.alignments[0].read, "ACGT");
/// ```
///
pub fn combine(
    a: &Template,
    b: &Template,
    op: SetOp,
    comparator: &Comparator,
    ctx: CmpContext,
) -> Result<Template, Error> {
    if a.alignments.len() != b.alignments.len() {
        return Err(Divergence::EndCountMismatch{ tag: a.tag.clone(), master: a.alignments.len(), slave: b.alignments.len() }.into())
    }
    if a.is_paired() {
        return Ok(combine_paired(a, b, op, comparator, ctx))
    }

    let mut res = Template {
        tag: a.tag.clone(),
        alignments: a.alignments.iter().zip(b.alignments.iter()).map(|(aln_a, aln_b)| {
            combine_alignment(aln_a, aln_b, op, comparator, ctx)
        }).collect(),
        pairs: Vec::new(),
        counters: Vec::new(),
        attributes: a.attributes.clone(),
    };
    res.recompute_counters();
    Ok(res)
}

/// Puts two templates side by side.
pub fn join<'a>(
    a: &'a Template,
    b: &'a Template,
) -> JoinRecord<'a> {
    JoinRecord{ master: a, slave: b }
}

/// Splits the mappings of two templates into A-B, B-A and A∩B.
///
/// A∩B holds the copies from `a`.
pub fn compare(
    a: &Template,
    b: &Template,
    comparator: &Comparator,
    ctx: CmpContext,
) -> Result<CompareRecord, Error> {
    Ok(CompareRecord {
        tag: a.tag.clone(),
        master_only: combine(a, b, SetOp::Difference, comparator, ctx)?,
        slave_only: combine(b, a, SetOp::Difference, comparator, ctx)?,
        common: combine(a, b, SetOp::Intersection, comparator, ctx)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::{Alignment, Mapping, Strand, Template};

    fn map(seq: &str, pos: u64) -> Mapping {
        Mapping{ seq_name: seq.to_string(), strand: Strand::Forward, position: pos, base_length: 100, ..Default::default() }
    }

    fn template(maps: Vec<Mapping>) -> Template {
        let mut aln = Alignment::new("r1");
        aln.read = "A".repeat(100);
        aln.maps = maps;
        aln.recompute_counters();
        Template::from_alignment(aln)
    }

    fn paired(end_1: Vec<Mapping>, end_2: Vec<Mapping>) -> Template {
        let mut template = Template::new("r1");
        template.alignment_mut_dyn(0).maps = end_1;
        template.alignment_mut_dyn(1).maps = end_2;
        template.alignments.iter_mut().for_each(|aln| aln.read = "A".repeat(50));
        template.pair_ends_by_order();
        template.recompute_counters();
        template
    }

    #[test]
    fn set_cardinalities() {
        use super::{combine, SetOp};
        use crate::Comparator;

        let cmp = Comparator::strict();
        let a = template(vec![map("chr1", 1), map("chr2", 1), map("chr3", 1)]);
        let b = template(vec![map("chr2", 1), map("chr4", 1)]);
        let ctx = cmp.context(a.total_length());

        let union = combine(&a, &b, SetOp::Union, &cmp, ctx).unwrap();
        let inter = combine(&a, &b, SetOp::Intersection, &cmp, ctx).unwrap();
        let diff = combine(&a, &b, SetOp::Difference, &cmp, ctx).unwrap();

        assert_eq!(union.num_maps(), 4);
        assert_eq!(inter.num_maps(), 1);
        assert_eq!(diff.num_maps(), 2);
        assert_eq!(union.num_maps(), a.num_maps() + b.num_maps() - inter.num_maps());
        assert_eq!(diff.num_maps() + inter.num_maps(), a.num_maps());
    }

    #[test]
    fn idempotence() {
        use super::{combine, SetOp};
        use crate::Comparator;

        let cmp = Comparator::range(0.5);
        let a = template(vec![map("chr1", 1), map("chr2", 300)]);
        let ctx = cmp.context(a.total_length());

        assert_eq!(combine(&a, &a, SetOp::Union, &cmp, ctx).unwrap().alignments[0].maps, a.alignments[0].maps);
        assert_eq!(combine(&a, &a, SetOp::Intersection, &cmp, ctx).unwrap().alignments[0].maps, a.alignments[0].maps);
        assert!(combine(&a, &a, SetOp::Difference, &cmp, ctx).unwrap().alignments[0].maps.is_empty());
    }

    #[test]
    fn duplicates_cancel_one_to_one() {
        use super::{combine, SetOp};
        use crate::Comparator;

        let cmp = Comparator::strict();
        let a = template(vec![map("chr1", 1), map("chr1", 1)]);
        let b = template(vec![map("chr1", 1)]);
        let ctx = cmp.context(a.total_length());

        assert_eq!(combine(&a, &b, SetOp::Difference, &cmp, ctx).unwrap().alignments[0].maps, vec![map("chr1", 1)]);
        assert_eq!(combine(&a, &b, SetOp::Intersection, &cmp, ctx).unwrap().num_maps(), 1);
        assert_eq!(combine(&a, &b, SetOp::Union, &cmp, ctx).unwrap().num_maps(), 2);
    }

    #[test]
    fn range_intersection_keeps_master_copy() {
        use super::{combine, SetOp};
        use crate::Comparator;

        let cmp = Comparator::range(0.1);
        let a = template(vec![map("chr1", 1000)]);
        let b = template(vec![map("chr1", 1007)]);
        let ctx = cmp.context(a.total_length());

        let res = combine(&a, &b, SetOp::Intersection, &cmp, ctx).unwrap();
        assert_eq!(res.alignments[0].maps, vec![map("chr1", 1000)]);
        assert_eq!(res.counters, vec![1]);
    }

    #[test]
    fn threshold_duality() {
        use super::{combine, SetOp};
        use crate::Comparator;

        let a = template(vec![map("chr1", 1000)]);
        let b = template(vec![map("chr1", 1010)]);

        let relative = Comparator::range(0.1);
        let absolute = Comparator::range(10.0);

        let got_relative = combine(&a, &b, SetOp::Intersection, &relative, relative.context(a.total_length())).unwrap();
        let got_absolute = combine(&a, &b, SetOp::Intersection, &absolute, absolute.context(a.total_length())).unwrap();

        assert_eq!(got_relative, got_absolute);
        assert_eq!(got_relative.num_maps(), 1);
    }

    #[test]
    fn paired_templates_combine_by_pair() {
        use super::{combine, SetOp};
        use crate::Comparator;

        let cmp = Comparator::strict();
        let a = paired(vec![map("chr1", 1)], vec![map("chr1", 300)]);
        let b = paired(vec![map("chr1", 1)], vec![map("chr1", 301)]);
        let ctx = cmp.context(a.total_length());

        let res = combine(&a, &b, SetOp::Intersection, &cmp, ctx).unwrap();
        assert_eq!(res.alignments.len(), 2);
        assert!(res.pairs.is_empty());
        assert!(res.alignments.iter().all(|aln| aln.maps.is_empty()));
        assert!(res.counters.is_empty());

        let res = combine(&a, &b, SetOp::Union, &cmp, ctx).unwrap();
        assert_eq!(res.pairs, vec![[Some(0), Some(0)], [Some(1), Some(1)]]);
        assert_eq!(res.alignments[0].maps, vec![map("chr1", 1), map("chr1", 1)]);
        assert_eq!(res.alignments[1].maps, vec![map("chr1", 300), map("chr1", 301)]);
        assert_eq!(res.counters, vec![2]);

        let res = combine(&a, &b, SetOp::Difference, &cmp, ctx).unwrap();
        assert_eq!(res, a);
    }

    #[test]
    fn paired_union_with_itself_is_unchanged() {
        use super::{combine, SetOp};
        use crate::Comparator;

        let cmp = Comparator::range(0.5);
        let a = paired(vec![map("chr1", 1), map("chr2", 5)], vec![map("chr1", 300)]);
        let ctx = cmp.context(a.total_length());

        let res = combine(&a, &a, SetOp::Union, &cmp, ctx).unwrap();
        assert_eq!(res, a);
        assert_eq!(res.counters, vec![2]);
        assert_eq!(res.pairs, vec![[Some(0), Some(0)], [Some(1), None]]);
    }

    #[test]
    fn different_number_of_ends_is_an_error() {
        use super::{combine, compare, SetOp};
        use crate::error::{Divergence, Error};
        use crate::Comparator;

        let cmp = Comparator::strict();
        let a = paired(vec![map("chr1", 1)], vec![map("chr1", 300)]);
        let b = template(vec![map("chr1", 1)]);
        let ctx = cmp.context(a.total_length());

        let got = combine(&a, &b, SetOp::Union, &cmp, ctx);
        let expected = Divergence::EndCountMismatch{ tag: "r1".to_string(), master: 2, slave: 1 };
        assert!(matches!(got, Err(Error::Divergence(ref x)) if *x == expected));

        assert!(combine(&b, &a, SetOp::Intersection, &cmp, ctx).is_err());
        assert!(compare(&a, &b, &cmp, ctx).is_err());
    }

    #[test]
    fn compare_partitions_maps() {
        use super::compare;
        use crate::Comparator;

        let cmp = Comparator::strict();
        let a = template(vec![map("chr1", 1), map("chr2", 1)]);
        let b = template(vec![map("chr2", 1), map("chr3", 1)]);

        let got = compare(&a, &b, &cmp, cmp.context(a.total_length())).unwrap();

        assert_eq!(got.tag, "r1");
        assert_eq!(got.master_only.alignments[0].maps, vec![map("chr1", 1)]);
        assert_eq!(got.slave_only.alignments[0].maps, vec![map("chr3", 1)]);
        assert_eq!(got.common.alignments[0].maps, vec![map("chr2", 1)]);
    }

    #[test]
    fn join_keeps_both_sides() {
        use super::join;

        let a = template(vec![map("chr1", 1)]);
        let b = template(vec![]);

        let got = join(&a, &b);
        assert_eq!(got.master.num_maps(), 1);
        assert_eq!(got.slave.num_maps(), 0);
    }
}
