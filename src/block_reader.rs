//! Opens a (possibly gzip-compressed) sequencing file and yields
//! record-aligned byte blocks. Decompression auto-detection reuses
//! `niffler`, the same crate used elsewhere in this workspace for
//! fastq/fasta reading; everything past the decompressed byte stream —
//! block-boundary scanning, carry-over, `ShortRead` — is implemented
//! here directly rather than delegated to a record-level fastq crate,
//! since that boundary logic is itself the thing this module provides.

use std::io::Read;

use crate::config::InputFormat;
use crate::error::{IoOpenError, ReadError};

pub struct BlockReader {
    reader: Box<dyn Read + Send>,
    file_name: String,
    capacity: usize,
    carry: Vec<u8>,
    record_lines: usize,
    eof: bool,
}

impl BlockReader {
    pub fn open(path: &str, format: InputFormat, capacity: usize) -> Result<Self, IoOpenError> {
        let file =
            std::fs::File::open(path).map_err(|_| IoOpenError::CannotOpen(path.to_string()))?;
        let (reader, _compression) = niffler::get_reader(Box::new(file))
            .map_err(|_| IoOpenError::CannotOpen(path.to_string()))?;
        let record_lines = match format {
            InputFormat::Fastq => 4,
            InputFormat::Fasta => 2,
        };
        Ok(BlockReader {
            reader,
            file_name: path.to_string(),
            capacity,
            carry: Vec::new(),
            record_lines,
            eof: false,
        })
    }

    /// Fills `buf` with the next record-aligned block. Returns `Ok(false)`
    /// once both the carry-over and the underlying file are exhausted
    /// (clean `Eof`); `buf` is left empty in that case.
    pub fn next_block(&mut self, buf: &mut Vec<u8>) -> Result<bool, ReadError> {
        buf.clear();
        buf.extend_from_slice(&self.carry);
        self.carry.clear();

        let filled = buf.len();
        buf.resize(self.capacity, 0);
        let to_read = self.capacity - filled;
        let mut total_read = 0usize;

        while total_read < to_read {
            let n = self
                .reader
                .read(&mut buf[filled + total_read..self.capacity])
                .map_err(|source| ReadError::Io {
                    file: self.file_name.clone(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            total_read += n;
        }
        buf.truncate(filled + total_read);

        if buf.is_empty() {
            self.eof = true;
            return Ok(false);
        }

        let full = buf.len() == self.capacity;

        match last_complete_record_boundary(buf, self.record_lines) {
            Some(pos) => {
                self.carry.extend_from_slice(&buf[pos + 1..]);
                buf.truncate(pos + 1);
                Ok(true)
            }
            None => {
                if full {
                    Err(ReadError::ShortRead {
                        file: self.file_name.clone(),
                        capacity: self.capacity,
                    })
                } else {
                    // Reached true end-of-file with a trailing record that
                    // has no final newline; emit it as the last block.
                    self.eof = true;
                    Ok(true)
                }
            }
        }
    }

    pub fn is_eof(&self) -> bool {
        self.eof && self.carry.is_empty()
    }
}

/// Finds the byte offset of the last `\n` that completes a whole record
/// (a multiple of `record_lines` newlines seen so far).
fn last_complete_record_boundary(buf: &[u8], record_lines: usize) -> Option<usize> {
    let mut count = 0usize;
    let mut last = None;
    for (i, &b) in buf.iter().enumerate() {
        if b == b'\n' {
            count += 1;
            if count % record_lines == 0 {
                last = Some(i);
            }
        }
    }
    last
}
