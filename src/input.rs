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

//! Opening input and output streams.
//!
//! Inputs are files, memory-mapped files or stdin. Gzip compressed inputs,
//! including concatenated gzip members, are detected from their first bytes
//! and decompressed on the fly. Output goes to a buffered file or stdout.

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::debug;
use memmap2::Mmap;

use crate::Error;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn is_gzip<R: BufRead>(
    reader: &mut R,
) -> std::io::Result<bool> {
    let buf = reader.fill_buf()?;
    Ok(buf.len() >= 2 && buf[0..2] == GZIP_MAGIC)
}

fn maybe_decompress<R: BufRead + Send + 'static>(
    mut reader: R,
    path: &Path,
) -> Result<Box<dyn Read + Send>, Error> {
    if is_gzip(&mut reader).map_err(|e| Error::io(e, path))? {
        debug!("Decompressing {}", path.display());
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Opens `path` for reading, or stdin if `path` is None.
///
/// With `mmap` set the file is memory-mapped instead of read through a
/// buffer. Stdin is never memory-mapped.
pub fn open_input(
    path: Option<&Path>,
    mmap: bool,
) -> Result<Box<dyn Read + Send>, Error> {
    let Some(path) = path else {
        debug!("Reading from stdin");
        return maybe_decompress(BufReader::new(std::io::stdin()), Path::new("<stdin>"))
    };

    let file = File::open(path).map_err(|e| Error::io(e, path))?;
    if mmap {
        // SAFETY: the file is opened read-only and not modified while mapped.
        let mapped = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(e, path))?;
        maybe_decompress(Cursor::new(mapped), path)
    } else {
        maybe_decompress(BufReader::new(file), path)
    }
}

/// Opens `path` for writing, or stdout if `path` is None.
pub fn open_output(
    path: Option<&Path>,
) -> Result<Box<dyn Write + Send>, Error> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(|e| Error::io(e, path))?;
            Ok(Box::new(BufWriter::new(file)))
        },
        None => Ok(Box::new(BufWriter::new(std::io::stdout()))),
    }
}

// Tests
#[cfg(test)]
mod tests {

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("mapset-input-{}-{}", std::process::id(), name))
    }

    #[test]
    fn open_plain_and_mmap_input() {
        use super::open_input;
        use std::io::Read;

        let path = temp_path("plain.map");
        std::fs::write(&path, b"r1\tACGT\tIIII\t0\t-\n").unwrap();

        for mmap in [false, true] {
            let mut got = String::new();
            open_input(Some(&path), mmap).unwrap().read_to_string(&mut got).unwrap();
            assert_eq!(got, "r1\tACGT\tIIII\t0\t-\n");
        }

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn open_concatenated_gzip_input() {
        use super::open_input;
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::{Read, Write};

        let mut bytes: Vec<u8> = Vec::new();
        for member in [b"r1\tACGT\tIIII\t0\t-\n".as_slice(), b"r2\tACGT\tIIII\t0\t-\n".as_slice()] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(member).unwrap();
            bytes.append(&mut encoder.finish().unwrap());
        }
        let path = temp_path("members.map.gz");
        std::fs::write(&path, &bytes).unwrap();

        let mut got = String::new();
        open_input(Some(&path), false).unwrap().read_to_string(&mut got).unwrap();
        assert_eq!(got, "r1\tACGT\tIIII\t0\t-\nr2\tACGT\tIIII\t0\t-\n");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn open_missing_input_is_resource_error() {
        use super::open_input;
        use crate::error::ErrorCategory;

        let got = open_input(Some(&temp_path("does-not-exist")), false);

        match got {
            Err(e) => assert_eq!(e.category(), ErrorCategory::Resource),
            Ok(_) => panic!("opened a missing file"),
        }
    }

    #[test]
    fn open_output_file() {
        use super::open_output;
        use std::io::Write;

        let path = temp_path("out.map");
        {
            let mut conn = open_output(Some(&path)).unwrap();
            conn.write_all(b"r1\tACGT\tIIII\t0\t-\n").unwrap();
            conn.flush().unwrap();
        }

        assert_eq!(std::fs::read(&path).unwrap(), b"r1\tACGT\tIIII\t0\t-\n".to_vec());
        std::fs::remove_file(&path).unwrap();
    }
}
