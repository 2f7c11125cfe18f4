//! Filtered-reads exporter, gated by `export_filtered_input`. Reuses the
//! `gzp::ParCompress<Gzip>` usage pattern for writing a gzip-compressed
//! fastq stream; re-emits only the records whose selection bitmap flag
//! is set.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use gzp::deflate::Gzip;
use gzp::par::compress::{ParCompress, ParCompressBuilder};
use gzp::ZWriter;

use crate::config::InputFormat;

/// One record as seen by the exporter: header/sequence/(quality) slices
/// straight out of `record_parser`, plus whether relabelling selected it.
pub struct ExportableRecord<'a> {
    pub header: &'a [u8],
    pub sequence: &'a [u8],
    pub quality: Option<&'a [u8]>,
}

/// Opens `<stem>.dedup.{fasta|fastq}.gz` under `out_dir` for writing.
pub fn open_exporter(out_dir: &str, stem: &str, format: InputFormat) -> std::io::Result<FilteredExporter> {
    let ext = match format {
        InputFormat::Fastq => "fastq",
        InputFormat::Fasta => "fasta",
    };
    let path = Path::new(out_dir).join(format!("{stem}.dedup.{ext}.gz"));
    let file = File::create(path)?;
    let writer: ParCompress<Gzip> = ParCompressBuilder::new().from_writer(BufWriter::new(file));
    Ok(FilteredExporter { writer, format })
}

pub struct FilteredExporter {
    writer: ParCompress<Gzip>,
    format: InputFormat,
}

impl FilteredExporter {
    /// Re-emits one selected record in its original format.
    pub fn export(&mut self, record: &ExportableRecord) -> std::io::Result<()> {
        match self.format {
            InputFormat::Fastq => {
                self.writer.write_all(record.header)?;
                self.writer.write_all(b"\n")?;
                self.writer.write_all(record.sequence)?;
                self.writer.write_all(b"\n+\n")?;
                self.writer
                    .write_all(record.quality.unwrap_or(&[b'I'; 0]))?;
                self.writer.write_all(b"\n")?;
            }
            InputFormat::Fasta => {
                self.writer.write_all(record.header)?;
                self.writer.write_all(b"\n")?;
                self.writer.write_all(record.sequence)?;
                self.writer.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> std::io::Result<()> {
        self.writer.finish().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn exports_selected_fastq_record_and_gzips_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter =
            open_exporter(dir.path().to_str().unwrap(), "lib1", InputFormat::Fastq).unwrap();
        exporter
            .export(&ExportableRecord {
                header: b"@r1",
                sequence: b"ACGT",
                quality: Some(b"IIII"),
            })
            .unwrap();
        exporter.finish().unwrap();

        let path = dir.path().join("lib1.dedup.fastq.gz");
        let mut gz = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut gz).unwrap();
        assert!(!gz.is_empty());
        // gzip magic bytes
        assert_eq!(&gz[0..2], &[0x1f, 0x8b]);
    }
}
