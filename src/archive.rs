use crate::error::ArchiveError;
use chrono::{Datelike, Local, Timelike};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Default download name for the finished archive.
pub const ARCHIVE_FILE_NAME: &str = "coupa_invoice_scans.zip";

/// In-memory ZIP being filled by the fetch loop.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    names: HashSet<String>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            names: HashSet::new(),
        }
    }

    /// Add an entry stamped with the current local time. Returns the name actually used,
    /// which gets a ` (n)` suffix when `filename` is already taken.
    pub fn add(&mut self, filename: &str, bytes: &[u8]) -> Result<String, ArchiveError> {
        let name = self.unique_name(filename);
        let opts = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(local_zip_time());
        self.writer.start_file(name.as_str(), opts)?;
        self.writer.write_all(bytes)?;
        self.names.insert(name.clone());
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Write the central directory and hand back the archive bytes.
    pub fn finish(self) -> Result<FinishedArchive, ArchiveError> {
        let entries = self.names.len();
        let bytes = self.writer.finish()?.into_inner();
        Ok(FinishedArchive { bytes, entries })
    }

    fn unique_name(&self, filename: &str) -> String {
        if !self.names.contains(filename) {
            return filename.to_string();
        }
        let (stem, ext) = match filename.rfind('.') {
            Some(idx) => filename.split_at(idx),
            None => (filename, ""),
        };
        let mut counter = 2u32;
        loop {
            let candidate = format!("{} ({}){}", stem, counter, ext);
            if !self.names.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A complete ZIP, ready to be saved or sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedArchive {
    bytes: Vec<u8>,
    entries: usize,
}

impl FinishedArchive {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn entries(&self) -> usize {
        self.entries
    }
}

/// Current local time as a ZIP timestamp; falls back to the ZIP epoch if out of range.
fn local_zip_time() -> zip::DateTime {
    let now = Local::now();
    zip::DateTime::from_date_and_time(
        now.year().clamp(1980, 2107) as u16,
        now.month() as u8,
        now.day() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second().min(59) as u8,
    )
    .unwrap_or_default()
}
