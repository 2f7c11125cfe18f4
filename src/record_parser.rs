//! Splits a record-aligned block (as produced by `block_reader`) into
//! individual fastq/fasta records, each exposing its barcode/UMI (or
//! biological read) sequence as a byte slice, by walking the buffer
//! line-by-line rather than re-parsing with a record-oriented fastq crate.

use crate::config::InputFormat;

/// A single parsed record. `header` and `quality` are kept (as slices
/// into the block, not copied) purely for the filtered-reads exporter's
/// benefit; barcode/UMI extraction and k-mer enumeration only ever touch
/// `sequence`.
pub struct Record<'a> {
    pub header: &'a [u8],
    pub sequence: &'a [u8],
    pub quality: Option<&'a [u8]>,
}

/// Iterates fixed-line-count records (4 for fastq, 2 for fasta) out of a
/// single block of bytes.
pub struct RecordParser<'a> {
    buf: &'a [u8],
    pos: usize,
    format: InputFormat,
}

impl<'a> RecordParser<'a> {
    pub fn new(buf: &'a [u8], format: InputFormat) -> Self {
        RecordParser { buf, pos: 0, format }
    }

    fn next_line(&mut self) -> Option<&'a [u8]> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let start = self.pos;
        let line = match self.buf[self.pos..].iter().position(|&b| b == b'\n') {
            Some(rel) => {
                let end = start + rel;
                self.pos = end + 1;
                &self.buf[start..end]
            }
            None => {
                self.pos = self.buf.len();
                &self.buf[start..]
            }
        };
        Some(strip_trailing_cr(line))
    }
}

/// Drops a trailing `\r` so Windows line endings in the underlying file
/// don't leak into the sequence/header/quality slices as an extra byte.
fn strip_trailing_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

impl<'a> Iterator for RecordParser<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Record<'a>> {
        match self.format {
            InputFormat::Fastq => {
                let header = self.next_line()?;
                let sequence = self.next_line().unwrap_or(&[]);
                let _plus = self.next_line();
                let quality = self.next_line();
                Some(Record {
                    header,
                    sequence,
                    quality,
                })
            }
            InputFormat::Fasta => {
                let header = self.next_line()?;
                let sequence = self.next_line().unwrap_or(&[]);
                Some(Record {
                    header,
                    sequence,
                    quality: None,
                })
            }
        }
    }
}
