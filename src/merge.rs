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

//! Worker pools for merge-map and display-compact.
//!
//! Workers share the inputs through one lock so that every record is read
//! by exactly one worker, and write whole records through a locked
//! [Printer]. Records are written in the order the workers finish them,
//! which with more than one worker need not be the input order.

use std::io::Write;
use std::sync::Mutex;

use log::{debug, info};

use crate::compare::Comparator;
use crate::error::Divergence;
use crate::printer::Printer;
use crate::setops::{combine, SetOp};
use crate::sync::TemplateSource;
use crate::{Error, Template};

fn poisoned(what: &str) -> Error {
    Error::Invariant(format!("{} lock poisoned by a panicked worker", what))
}

/// One unit of work for a merge worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull {
    /// Master and slave templates for the same read.
    Pair(Template, Template),
    /// Master template with no slave counterpart.
    MasterOnly(Template),
}

struct ProviderState<M, S> {
    master: M,
    slave: S,
    pending_slave: Option<Template>,
    slave_done: bool,
    failed: bool,
}

impl<M: TemplateSource, S: TemplateSource> ProviderState<M, S> {
    fn next_same_reads(&mut self) -> Result<Option<Pull>, Error> {
        let Some(template_master) = self.master.next_template()? else {
            if self.slave.next_template()?.is_some() {
                return Err(Divergence::SlaveHasExtraReads.into())
            }
            return Ok(None)
        };
        let Some(template_slave) = self.slave.next_template()? else {
            return Err(Divergence::SlaveMissingRead{ tag: template_master.tag }.into())
        };
        if template_master.tag != template_slave.tag {
            return Err(Divergence::NotSynchronized{ master: template_master.tag, slave: template_slave.tag }.into())
        }
        Ok(Some(Pull::Pair(template_master, template_slave)))
    }

    fn next_different_reads(&mut self) -> Result<Option<Pull>, Error> {
        let Some(template_master) = self.master.next_template()? else {
            if self.pending_slave.is_some() || (!self.slave_done && self.slave.next_template()?.is_some()) {
                return Err(Divergence::SlaveHasExtraReads.into())
            }
            return Ok(None)
        };

        let candidate = match self.pending_slave.take() {
            Some(template) => Some(template),
            None if self.slave_done => None,
            None => self.slave.next_template()?,
        };
        match candidate {
            None => {
                self.slave_done = true;
                Ok(Some(Pull::MasterOnly(template_master)))
            },
            Some(template_slave) if template_slave.tag == template_master.tag => {
                Ok(Some(Pull::Pair(template_master, template_slave)))
            },
            Some(template_slave) => {
                self.pending_slave = Some(template_slave);
                Ok(Some(Pull::MasterOnly(template_master)))
            },
        }
    }
}

/// Hands out master/slave pairs to the merge workers.
///
/// With `same_reads` set both inputs must list the same reads in the same
/// order. Otherwise the slave may lack reads, and masters with no slave
/// counterpart are handed out alone. After the first error every worker
/// gets `Ok(None)`.
pub struct PairProvider<M, S> {
    state: Mutex<ProviderState<M, S>>,
    same_reads: bool,
}

impl<M: TemplateSource, S: TemplateSource> PairProvider<M, S> {
    pub fn new(
        master: M,
        slave: S,
        same_reads: bool,
    ) -> Self {
        let state = ProviderState{ master, slave, pending_slave: None, slave_done: false, failed: false };
        PairProvider{ state: Mutex::new(state), same_reads }
    }

    /// Returns the next unit of work, or `Ok(None)` when both inputs are
    /// exhausted.
    pub fn next_pair(&self) -> Result<Option<Pull>, Error> {
        let mut state = self.state.lock().map_err(|_| poisoned("input"))?;
        if state.failed {
            return Ok(None)
        }
        let res = if self.same_reads { state.next_same_reads() } else { state.next_different_reads() };
        if res.is_err() {
            state.failed = true;
        }
        res
    }

    /// Stops handing out work.
    pub fn abort(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.failed = true;
        }
    }
}

/// Merges the maps of `slave` into `master`.
///
/// Slave maps already in the master, compared strictly and one to one, are
/// not added again. Counters are derived from the merged maps.
pub fn merge_templates(
    master: &Template,
    slave: &Template,
) -> Result<Template, Error> {
    let comparator = Comparator::strict();
    combine(master, slave, SetOp::Union, &comparator, comparator.context(master.total_length()))
}

fn join_workers(
    handles: Vec<std::thread::ScopedJoinHandle<'_, Result<u64, Error>>>,
) -> Result<u64, Error> {
    handles.into_iter().map(|handle| {
        handle.join().unwrap_or_else(|_| Err(Error::Invariant("worker thread panicked".to_string())))
    }).sum::<Result<u64, Error>>()
}

/// Merges two inputs using `num_threads` workers.
///
/// Returns the number of templates written.
///
/// ## Usage
///
/// ```rust
/// use mapset::Format;
/// use mapset::merge::merge_map;
/// use mapset::parser::Parser;
/// use std::io::Cursor;
///
/// let master = b"r1\tACGT\tIIII\t1\tchr1:+:10:4\n".to_vec();
/// let slave = b"r1\tACGT\tIIII\t2\tchr1:+:10:4,chr2:-:3:4\n".to_vec();
///
/// let master = Parser::new(Cursor::new(master), Some(Format::Map), false).unwrap();
/// let slave = Parser::new(Cursor::new(slave), Some(Format::Map), false).unwrap();
///
/// let mut output: Vec<u8> = Vec::new();
/// let n = merge_map(master, slave, true, 2, &mut output).unwrap();
///
/// assert_eq!(n, 1);
/// assert_eq!(output, b"r1\tACGT\tIIII\t2\tchr1:+:10:4,chr2:-:3:4\n".to_vec());
/// ```
///
pub fn merge_map<M, S, W>(
    master: M,
    slave: S,
    same_reads: bool,
    num_threads: usize,
    conn_out: &mut W,
) -> Result<u64, Error>
where
    M: TemplateSource + Send,
    S: TemplateSource + Send,
    W: Write + Send,
{
    let provider = PairProvider::new(master, slave, same_reads);
    let sink = Mutex::new(Printer::new(conn_out));

    let written = std::thread::scope(|scope| {
        let handles = (0..num_threads.max(1)).map(|worker| {
            let provider = &provider;
            let sink = &sink;
            scope.spawn(move || -> Result<u64, Error> {
                debug!("Merge worker {} started", worker);
                let mut written: u64 = 0;
                let res = (|| -> Result<(), Error> {
                    while let Some(pull) = provider.next_pair()? {
                        let merged = match pull {
                            Pull::Pair(template_master, template_slave) => merge_templates(&template_master, &template_slave)?,
                            Pull::MasterOnly(template_master) => template_master,
                        };
                        sink.lock().map_err(|_| poisoned("output"))?.print_template(&merged)?;
                        written += 1;
                    }
                    Ok(())
                })();
                if res.is_err() {
                    provider.abort();
                }
                debug!("Merge worker {} finished after {} records", worker, written);
                res.map(|_| written)
            })
        }).collect::<Vec<_>>();
        join_workers(handles)
    })?;

    sink.into_inner().map_err(|_| poisoned("output"))?.flush()?;
    info!("Merge-map: wrote {} records", written);
    Ok(written)
}

/// Writes the compact summary of every template in `input` using
/// `num_threads` workers.
///
/// Returns the number of templates summarized.
pub fn display_compact<T, W>(
    input: T,
    num_threads: usize,
    conn_out: &mut W,
) -> Result<u64, Error>
where
    T: TemplateSource + Send,
    W: Write + Send,
{
    let source = Mutex::new(Some(input));
    let sink = Mutex::new(Printer::new(conn_out));

    let next = |source: &Mutex<Option<T>>| -> Result<Option<Template>, Error> {
        let mut guard = source.lock().map_err(|_| poisoned("input"))?;
        let Some(input) = guard.as_mut() else {
            return Ok(None)
        };
        let res = input.next_template();
        if !matches!(res, Ok(Some(_))) {
            // exhausted or failed, stop the other workers
            *guard = None;
        }
        res
    };

    let written = std::thread::scope(|scope| {
        let handles = (0..num_threads.max(1)).map(|worker| {
            let source = &source;
            let sink = &sink;
            scope.spawn(move || -> Result<u64, Error> {
                debug!("Display worker {} started", worker);
                let mut written: u64 = 0;
                while let Some(template) = next(source)? {
                    sink.lock().map_err(|_| poisoned("output"))?.print_compact(&template)?;
                    written += 1;
                }
                debug!("Display worker {} finished after {} records", worker, written);
                Ok(written)
            })
        }).collect::<Vec<_>>();
        join_workers(handles)
    })?;

    sink.into_inner().map_err(|_| poisoned("output"))?.flush()?;
    info!("Display-compact: wrote {} records", written);
    Ok(written)
}
