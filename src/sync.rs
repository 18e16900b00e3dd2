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

//! Synchronization of two template streams by tag.
//!
//! The master stream drives: every master template is either paired with
//! the slave template that has the same tag or handled as unmatched. The
//! slave is expected to list its reads in the same order as the master.

use std::collections::VecDeque;
use std::io::Read;

use log::debug;

use crate::error::Divergence;
use crate::parser::Parser;
use crate::setops::SetOp;
use crate::{Error, Template};

/// A stream of templates.
pub trait TemplateSource {
    /// Returns the next template, or `Ok(None)` once the stream is
    /// exhausted.
    fn next_template(&mut self) -> Result<Option<Template>, Error>;
}

impl<R: Read> TemplateSource for Parser<R> {
    fn next_template(&mut self) -> Result<Option<Template>, Error> {
        self.read_template()
    }
}

impl TemplateSource for VecDeque<Template> {
    fn next_template(&mut self) -> Result<Option<Template>, Error> {
        Ok(self.pop_front())
    }
}

/// Result of one synchronization step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Master and slave templates with the same tag.
    Sync(Template, Template),
    /// Both streams are exhausted.
    BothDone,
}

/// Advances both streams to the next common tag for a set operation.
///
/// Master templates with no slave counterpart are passed to `unmatched`
/// when `op` keeps them ([SetOp::Union] and [SetOp::Difference]) and
/// dropped otherwise. This happens both when the slave skips a tag and
/// when the slave runs out before the master.
///
/// Fails with [Divergence::SlaveHasExtraReads] when the master runs out
/// first, either while the slave still has templates or while searching
/// for the current slave tag.
pub fn read_template_sync<M, S, F>(
    master: &mut M,
    slave: &mut S,
    op: SetOp,
    unmatched: &mut F,
) -> Result<SyncEvent, Error>
where
    M: TemplateSource + ?Sized,
    S: TemplateSource + ?Sized,
    F: FnMut(&Template) -> Result<(), Error>,
{
    let Some(mut template_master) = master.next_template()? else {
        if slave.next_template()?.is_some() {
            return Err(Divergence::SlaveHasExtraReads.into())
        }
        return Ok(SyncEvent::BothDone)
    };

    let Some(template_slave) = slave.next_template()? else {
        // Slave exhausted, the rest of the master has no counterpart
        let mut next = Some(template_master);
        while let Some(template) = next {
            if op.emits_unmatched_master() {
                unmatched(&template)?;
            }
            next = master.next_template()?;
        }
        return Ok(SyncEvent::BothDone)
    };

    while template_master.tag != template_slave.tag {
        debug!("'{}' not in slave", template_master.tag);
        if op.emits_unmatched_master() {
            unmatched(&template_master)?;
        }
        template_master = master.next_template()?.ok_or(Divergence::SlaveHasExtraReads)?;
    }

    Ok(SyncEvent::Sync(template_master, template_slave))
}

/// Advances the slave to the tag of the next master template.
///
/// Slave templates with other tags are skipped. Fails with
/// [Divergence::SlaveMissingRead] when the slave runs out before the tag
/// is found.
pub fn read_template_common_map<M, S>(
    master: &mut M,
    slave: &mut S,
) -> Result<SyncEvent, Error>
where
    M: TemplateSource + ?Sized,
    S: TemplateSource + ?Sized,
{
    let Some(template_master) = master.next_template()? else {
        return Ok(SyncEvent::BothDone)
    };

    loop {
        let Some(template_slave) = slave.next_template()? else {
            return Err(Divergence::SlaveMissingRead{ tag: template_master.tag.clone() }.into())
        };
        if template_slave.tag == template_master.tag {
            return Ok(SyncEvent::Sync(template_master, template_slave))
        }
        debug!("skipping slave '{}'", template_slave.tag);
    }
}

// Tests
#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use crate::Template;

    fn stream(tags: &[&str]) -> VecDeque<Template> {
        tags.iter().map(|tag| Template::new(tag)).collect()
    }

    fn tags_of(event: &super::SyncEvent) -> Option<(String, String)> {
        match event {
            super::SyncEvent::Sync(a, b) => Some((a.tag.clone(), b.tag.clone())),
            super::SyncEvent::BothDone => None,
        }
    }

    #[test]
    fn sync_identical_streams() {
        use super::{read_template_sync, SyncEvent};
        use crate::setops::SetOp;

        let mut master = stream(&["a", "b"]);
        let mut slave = stream(&["a", "b"]);
        let mut emitted: Vec<String> = Vec::new();
        let mut emit = |t: &Template| -> Result<(), crate::Error> { emitted.push(t.tag.clone()); Ok(()) };

        let first = read_template_sync(&mut master, &mut slave, SetOp::Union, &mut emit).unwrap();
        let second = read_template_sync(&mut master, &mut slave, SetOp::Union, &mut emit).unwrap();
        let third = read_template_sync(&mut master, &mut slave, SetOp::Union, &mut emit).unwrap();

        assert_eq!(tags_of(&first), Some(("a".to_string(), "a".to_string())));
        assert_eq!(tags_of(&second), Some(("b".to_string(), "b".to_string())));
        assert_eq!(third, SyncEvent::BothDone);
        assert!(emitted.is_empty());
    }

    #[test]
    fn sync_skips_master_only_reads() {
        use super::read_template_sync;
        use crate::setops::SetOp;

        let master = stream(&["r1", "r2", "r3"]);
        let slave = stream(&["r1", "r3"]);

        for (op, expected) in [(SetOp::Union, vec!["r2"]), (SetOp::Difference, vec!["r2"]), (SetOp::Intersection, vec![])] {
            let mut master = master.clone();
            let mut slave = slave.clone();
            let mut emitted: Vec<String> = Vec::new();
            let mut emit = |t: &Template| -> Result<(), crate::Error> { emitted.push(t.tag.clone()); Ok(()) };

            read_template_sync(&mut master, &mut slave, op, &mut emit).unwrap();
            let got = read_template_sync(&mut master, &mut slave, op, &mut emit).unwrap();

            assert_eq!(tags_of(&got), Some(("r3".to_string(), "r3".to_string())));
            assert_eq!(emitted, expected);
        }

        // untouched originals
        assert_eq!(master.len(), 3);
        assert_eq!(slave.len(), 2);
    }

    #[test]
    fn sync_flushes_master_when_slave_is_done() {
        use super::{read_template_sync, SyncEvent};
        use crate::setops::SetOp;

        let mut master = stream(&["a", "b", "c"]);
        let mut slave = stream(&["a"]);
        let mut emitted: Vec<String> = Vec::new();
        let mut emit = |t: &Template| -> Result<(), crate::Error> { emitted.push(t.tag.clone()); Ok(()) };

        read_template_sync(&mut master, &mut slave, SetOp::Difference, &mut emit).unwrap();
        let got = read_template_sync(&mut master, &mut slave, SetOp::Difference, &mut emit).unwrap();

        assert_eq!(got, SyncEvent::BothDone);
        assert_eq!(emitted, vec!["b".to_string(), "c".to_string()]);
        assert!(master.is_empty());
    }

    #[test]
    fn sync_fails_when_master_runs_out_first() {
        use super::read_template_sync;
        use crate::error::{Divergence, Error};
        use crate::setops::SetOp;

        let mut emit = |_: &Template| -> Result<(), crate::Error> { Ok(()) };

        let mut master = stream(&[]);
        let mut slave = stream(&["x"]);
        let got = read_template_sync(&mut master, &mut slave, SetOp::Union, &mut emit);
        assert!(matches!(got, Err(Error::Divergence(Divergence::SlaveHasExtraReads))));

        let mut master = stream(&["a", "b"]);
        let mut slave = stream(&["x"]);
        let got = read_template_sync(&mut master, &mut slave, SetOp::Intersection, &mut emit);
        assert!(matches!(got, Err(Error::Divergence(Divergence::SlaveHasExtraReads))));
    }

    #[test]
    fn sync_both_empty() {
        use super::{read_template_sync, SyncEvent};
        use crate::setops::SetOp;

        let mut emit = |_: &Template| -> Result<(), crate::Error> { Ok(()) };
        let got = read_template_sync(&mut stream(&[]), &mut stream(&[]), SetOp::Union, &mut emit).unwrap();

        assert_eq!(got, SyncEvent::BothDone);
    }

    #[test]
    fn common_map_skips_slave_only_reads() {
        use super::{read_template_common_map, SyncEvent};

        let mut master = stream(&["b", "d"]);
        let mut slave = stream(&["a", "b", "c", "d", "e"]);

        let first = read_template_common_map(&mut master, &mut slave).unwrap();
        let second = read_template_common_map(&mut master, &mut slave).unwrap();
        let third = read_template_common_map(&mut master, &mut slave).unwrap();

        assert_eq!(tags_of(&first), Some(("b".to_string(), "b".to_string())));
        assert_eq!(tags_of(&second), Some(("d".to_string(), "d".to_string())));
        assert_eq!(third, SyncEvent::BothDone);
        assert_eq!(slave.len(), 1);
    }

    #[test]
    fn common_map_fails_when_slave_lacks_tag() {
        use super::read_template_common_map;
        use crate::error::{Divergence, Error};

        let mut master = stream(&["a", "z"]);
        let mut slave = stream(&["a", "b"]);

        read_template_common_map(&mut master, &mut slave).unwrap();
        let got = read_template_common_map(&mut master, &mut slave);

        match got {
            Err(Error::Divergence(Divergence::SlaveMissingRead{ tag })) => assert_eq!(tag, "z"),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
