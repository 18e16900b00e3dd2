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

// Format specific implementations
pub mod fasta;
pub mod map;
pub mod sam;

use crate::Alignment;
use crate::Error;
use crate::Format;
use crate::Template;

use crate::parser::fasta::read_fastx;
use crate::parser::map::read_map;
use crate::parser::sam::{read_sam, SamEnd};

use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;

use log::debug;
use needletail::FastxReader;

enum Backend<R: Read> {
    Lines(BufReader<R>),
    // None for an empty input
    Fastx(Option<Box<dyn FastxReader>>),
}

/// Reads templates from MAP, SAM or FASTA/FASTQ input.
///
/// The format is either given or guessed from the first line. Blank lines
/// are skipped, and so is the SAM header.
///
/// In SAM input consecutive records with the same tag belong to the same
/// template. With `paired` set, records flagged as the last segment go to
/// the second end and the maps of the two ends are paired in record order.
pub struct Parser<R: Read> {
    backend: Backend<R>,
    line: Vec<u8>,
    pending: Option<SamEnd>,
    pub format: Format,
    paired: bool,
    name: String,
    records: u64,
}

impl<R: Read + Send + 'static> Parser<R> {
    pub fn new(
        conn: R,
        format: Option<Format>,
        paired: bool,
    ) -> Result<Self, Error> {
        let mut reader = BufReader::new(conn);

        let buf = reader.fill_buf()?;
        let is_empty = buf.is_empty();
        let format = match format {
            Some(format) => format,
            None if is_empty => Format::Map,
            None => guess_format(buf).ok_or_else(|| {
                let first_line: String = buf.iter().take_while(|x| **x != b'\n').take(32).map(|x| *x as char).collect();
                Error::UnsupportedFormat(format!("cannot recognize input starting with '{}'", first_line))
            })?,
        };
        debug!("Reading input as {:?}", format);

        let backend = match format {
            Format::Fasta if is_empty => Backend::Fastx(None),
            Format::Fasta => {
                let reader = needletail::parse_fastx_reader(reader).map_err(|e| Error::Parse{ input: "Input".to_string(), record: 0, message: e.to_string() })?;
                Backend::Fastx(Some(reader))
            },
            _ => Backend::Lines(reader),
        };

        Ok(Self {
            backend,
            line: Vec::new(),
            pending: None,
            format,
            paired,
            name: "Input".to_string(),
            records: 0,
        })
    }
}

impl<R: Read> Parser<R> {
    /// Sets the name used for this input in error messages.
    pub fn with_name(
        mut self,
        name: &str,
    ) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of physical records consumed so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    fn parse_error(
        &self,
        message: impl ToString,
    ) -> Error {
        Error::Parse{ input: self.name.clone(), record: self.records, message: message.to_string() }
    }

    /// Reads the next non-empty line into `self.line`.
    ///
    /// Returns false at the end of the input.
    fn next_line(
        &mut self,
    ) -> Result<bool, Error> {
        let Backend::Lines(reader) = &mut self.backend else {
            return Err(Error::Invariant("line reader used on a FASTA/FASTQ input".to_string()))
        };
        loop {
            self.line.clear();
            let n = reader.read_until(b'\n', &mut self.line).map_err(|e| Error::io(e, self.name.as_str()))?;
            if n == 0 {
                return Ok(false)
            }
            while matches!(self.line.last(), Some(b'\n') | Some(b'\r')) {
                self.line.pop();
            }
            if self.line.is_empty() || (self.format == Format::Sam && self.line[0] == b'@') {
                continue
            }
            self.records += 1;
            return Ok(true)
        }
    }

    fn next_sam_end(
        &mut self,
    ) -> Result<Option<SamEnd>, Error> {
        if !self.next_line()? {
            return Ok(None)
        }
        let end = read_sam(&mut self.line.as_slice()).map_err(|e| self.parse_error(e))?;
        Ok(Some(end))
    }

    fn add_sam_end(
        &self,
        template: &mut Template,
        end: SamEnd,
    ) {
        let slot = if self.paired && end.last_segment && !end.first_segment { 1 } else { 0 };
        let aln = template.alignment_mut_dyn(slot);
        if aln.read.is_empty() {
            aln.read = end.alignment.read;
            aln.qualities = end.alignment.qualities;
        }
        aln.maps.extend(end.alignment.maps);
        end.alignment.attributes.into_iter().for_each(|(key, value)| {
            aln.attributes.entry(key).or_insert(value);
        });
    }

    fn read_sam_template(
        &mut self,
    ) -> Result<Option<Template>, Error> {
        let first = match self.pending.take() {
            Some(end) => end,
            None => match self.next_sam_end()? {
                Some(end) => end,
                None => return Ok(None),
            },
        };

        let mut template = Template::new(&first.alignment.tag);
        self.add_sam_end(&mut template, first);
        while let Some(end) = self.next_sam_end()? {
            if end.alignment.tag != template.tag {
                self.pending = Some(end);
                break
            }
            self.add_sam_end(&mut template, end);
        }

        if self.paired {
            template.alignment_mut_dyn(1);
            template.pair_ends_by_order();
        }
        template.recompute_counters();
        Ok(Some(template))
    }

    fn next_fastx(
        &mut self,
    ) -> Result<Option<Alignment>, Error> {
        let Backend::Fastx(reader) = &mut self.backend else {
            return Err(Error::Invariant("FASTA/FASTQ reader used on a line based input".to_string()))
        };
        let Some(reader) = reader.as_mut() else {
            return Ok(None)
        };
        let res = match reader.next() {
            None => return Ok(None),
            Some(Err(e)) => Err(e.to_string()),
            Some(Ok(record)) => read_fastx(&record).map_err(|e| e.to_string()),
        };
        self.records += 1;
        res.map(Some).map_err(|e| self.parse_error(e))
    }

    fn read_fastx_template(
        &mut self,
    ) -> Result<Option<Template>, Error> {
        let Some(first) = self.next_fastx()? else {
            return Ok(None)
        };
        if !self.paired {
            return Ok(Some(Template::from_alignment(first)))
        }

        let second = self.next_fastx()?.ok_or_else(|| self.parse_error(format!("missing second end of '{}'", first.tag)))?;
        let mut template = Template::new(&first.tag);
        template.alignments = vec![first, second];
        Ok(Some(template))
    }

    /// Reads the next template.
    ///
    /// Returns `Ok(None)` at the end of the input, also on every later call.
    pub fn read_template(
        &mut self,
    ) -> Result<Option<Template>, Error> {
        match self.format {
            Format::Map => {
                if !self.next_line()? {
                    return Ok(None)
                }
                let template = read_map(&mut self.line.as_slice()).map_err(|e| self.parse_error(e))?;
                if self.paired && !template.is_paired() {
                    return Err(self.parse_error(format!("expected a paired-end record for '{}'", template.tag)))
                }
                Ok(Some(template))
            },
            Format::Sam => self.read_sam_template(),
            Format::Fasta => self.read_fastx_template(),
        }
    }

    /// Reads the next single-end alignment.
    pub fn read_alignment(
        &mut self,
    ) -> Result<Option<Alignment>, Error> {
        let Some(mut template) = self.read_template()? else {
            return Ok(None)
        };
        if template.is_paired() {
            return Err(self.parse_error(format!("'{}' is a paired-end record", template.tag)))
        }
        template.alignments.pop().map(Some).ok_or_else(|| Error::Invariant(format!("template '{}' has no alignments", template.tag)))
    }
}

impl<R: Read> Iterator for Parser<R> {
    type Item = Result<Template, Error>;

    fn next(
        &mut self,
    ) -> Option<Result<Template, Error>> {
        self.read_template().transpose()
    }
}

/// Strips the pair suffix `/1` or `/2` and anything after the first
/// whitespace from a read name.
pub fn normalize_tag(
    name: &str,
) -> String {
    let name = name.split_whitespace().next().unwrap_or("");
    let name = name.strip_suffix("/1").or_else(|| name.strip_suffix("/2")).unwrap_or(name);
    name.to_string()
}

/// Guesses the format from the first bytes of the input.
pub fn guess_format(
    bytes: &[u8],
) -> Option<Format> {
    let first_line: &[u8] = match bytes.iter().position(|x| *x == b'\n') {
        Some(linebreak) => &bytes[0..linebreak],
        None => bytes,
    };

    if first_line.len() > 2 {
        let sam_header: bool = first_line[0] == b'@' && [b"HD", b"SQ", b"RG", b"PG", b"CO"].iter().any(|code| first_line[1..3] == code[..]);
        if sam_header {
            return Some(Format::Sam)
        }
    }

    if first_line.first() == Some(&b'>') || first_line.first() == Some(&b'@') {
        return Some(Format::Fasta)
    }

    let line = first_line.iter().map(|x| *x as char).collect::<String>();
    let records: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();

    if records.len() >= 11 && records[1].parse::<u16>().is_ok() && records[3].parse::<u64>().is_ok() {
        return Some(Format::Sam)
    }

    if records.len() == 5 {
        return Some(Format::Map)
    }

    None
}
