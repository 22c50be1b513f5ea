//! Turns a finished run into something a user can take away: the archive on
//! disk and a table of the invoices that failed.

use crate::archive::{FinishedArchive, ARCHIVE_FILE_NAME};
use crate::downloader::BatchDownloadResult;
use crate::error::ReportError;
use crate::types::{DownloadedScan, FailedDownload, DOWNLOAD_STATUS_COLUMN};
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};

/// Failed rows in tabular form: original headers plus `Download Status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl FailureTable {
    /// `None` when nothing failed. Every failure carries the fields of one
    /// source table in column order, so columns are matched by position and
    /// repeated header names stay separate columns.
    pub fn from_failures(failures: &[FailedDownload]) -> Option<Self> {
        let first = failures.first()?;
        let mut headers: Vec<String> = first.fields.iter().map(|(h, _)| h.clone()).collect();
        let width = headers.len();
        let rows = failures
            .iter()
            .map(|failure| {
                let mut row: Vec<String> = failure
                    .fields
                    .iter()
                    .map(|(_, v)| v.clone())
                    .chain(std::iter::repeat(String::new()))
                    .take(width)
                    .collect();
                row.push(failure.status.clone());
                row
            })
            .collect();
        headers.push(DOWNLOAD_STATUS_COLUMN.to_string());
        Some(Self { headers, rows })
    }

    pub fn render(&self) -> String {
        render_table(&self.headers, &self.rows)
    }

    /// Write as `.csv` or `.xlsx`, chosen by the file extension.
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => self.write_csv(path),
            "xlsx" => self.write_xlsx(path),
            other => Err(ReportError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), ReportError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write_xlsx(&self, path: &Path) -> Result<(), ReportError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Failed Invoices")?;

        let header_format = Format::new().set_bold();
        for (col, header) in self.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
        }
        for (row_idx, row) in self.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                worksheet.write_string((row_idx + 1) as u32, col as u16, value)?;
            }
        }
        workbook.save(path)?;
        Ok(())
    }
}

/// Plain-text table with padded columns.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }
    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };
    let mut out = line(headers);
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in rows {
        out.push('\n');
        out.push_str(&line(row.as_slice()));
    }
    out
}

/// Outcome of a run as shown to the user.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    /// Present until taken; [`crate::session::Session`] moves it into its own slot.
    pub archive: Option<FinishedArchive>,
    pub archive_entries: usize,
    pub downloaded: Vec<DownloadedScan>,
    pub failures: Vec<FailedDownload>,
    pub failure_table: Option<FailureTable>,
    pub total: usize,
    pub cancelled: bool,
}

impl DownloadReport {
    /// Hand out the archive once.
    pub fn take_archive(&mut self) -> Option<FinishedArchive> {
        self.archive.take()
    }

    pub fn summary(&self) -> String {
        let mut s = format!(
            "{} of {} invoices downloaded",
            self.downloaded.len(),
            self.total
        );
        if !self.failures.is_empty() {
            s.push_str(&format!(", {} failed", self.failures.len()));
        }
        if self.cancelled {
            s.push_str(" (cancelled)");
        }
        s
    }
}

pub fn finalize(result: BatchDownloadResult) -> DownloadReport {
    let failure_table = FailureTable::from_failures(&result.failures);
    DownloadReport {
        archive_entries: result.archive.entries(),
        archive: Some(result.archive),
        downloaded: result.downloaded,
        failures: result.failures,
        failure_table,
        total: result.total,
        cancelled: result.cancelled,
    }
}

/// Where the archive goes when no output path is given: Downloads (or Desktop),
/// with a numeric suffix instead of overwriting an existing file.
pub fn default_archive_path() -> Result<PathBuf, ReportError> {
    let dir = dirs::download_dir()
        .or_else(dirs::desktop_dir)
        .ok_or(ReportError::NoDownloadDir)?;
    Ok(unused_path(&dir, ARCHIVE_FILE_NAME))
}

fn unused_path(dir: &Path, file_name: &str) -> PathBuf {
    let mut path = dir.join(file_name);
    let (stem, ext) = match file_name.rfind('.') {
        Some(idx) => file_name.split_at(idx),
        None => (file_name, ""),
    };
    let mut counter = 2u32;
    while path.exists() {
        path = dir.join(format!("{}_{}{}", stem, counter, ext));
        counter += 1;
    }
    path
}

/// Write the archive bytes to `path`.
pub fn save_archive(archive: &FinishedArchive, path: &Path) -> Result<(), ReportError> {
    std::fs::write(path, archive.bytes()).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(id: &str, supplier: &str, status: &str) -> FailedDownload {
        FailedDownload {
            invoice_id: id.to_string(),
            fields: vec![
                ("Invoice ID".to_string(), id.to_string()),
                ("Supplier".to_string(), supplier.to_string()),
            ],
            status: status.to_string(),
            response_body: None,
        }
    }

    #[test]
    fn finalize_exposes_archive_once() {
        let result = BatchDownloadResult {
            archive: crate::archive::ArchiveBuilder::new().finish().unwrap(),
            downloaded: vec![],
            failures: vec![failure("1", "Acme", "Failed (404)")],
            total: 1,
            cancelled: false,
        };
        let mut report = finalize(result);
        assert_eq!(report.summary(), "0 of 1 invoices downloaded, 1 failed");
        assert!(report.failure_table.is_some());
        assert!(report.take_archive().is_some());
        assert!(report.take_archive().is_none());
    }

    #[test]
    fn no_failures_means_no_table() {
        assert!(FailureTable::from_failures(&[]).is_none());
    }

    #[test]
    fn table_appends_download_status() {
        let table = FailureTable::from_failures(&[
            failure("1", "Acme", "Failed (404)"),
            failure("2", "Globex", "Failed (500)"),
        ])
        .unwrap();
        assert_eq!(table.headers, vec!["Invoice ID", "Supplier", "Download Status"]);
        assert_eq!(table.rows[1], vec!["2", "Globex", "Failed (500)"]);
    }

    #[test]
    fn repeated_headers_keep_every_column() {
        let failed = FailedDownload {
            invoice_id: "1".to_string(),
            fields: vec![
                ("Invoice ID".to_string(), "1".to_string()),
                ("Note".to_string(), "first".to_string()),
                ("Note".to_string(), "second".to_string()),
            ],
            status: "Failed (404)".to_string(),
            response_body: None,
        };
        let table = FailureTable::from_failures(&[failed]).unwrap();
        assert_eq!(
            table.headers,
            vec!["Invoice ID", "Note", "Note", "Download Status"]
        );
        assert_eq!(table.rows, vec![vec!["1", "first", "second", "Failed (404)"]]);
    }

    #[test]
    fn render_aligns_columns() {
        let table = FailureTable::from_failures(&[failure("1", "Acme", "Failed (404)")]).unwrap();
        let text = table.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Invoice ID | Supplier | Download Status");
        assert_eq!(lines[2], "1          | Acme     | Failed (404)");
    }

    #[test]
    fn unused_path_adds_counter() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unused_path(dir.path(), "a.zip"), dir.path().join("a.zip"));
        std::fs::write(dir.path().join("a.zip"), b"").unwrap();
        assert_eq!(unused_path(dir.path(), "a.zip"), dir.path().join("a_2.zip"));
    }

    #[test]
    fn saves_csv_and_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let table = FailureTable::from_failures(&[failure("1", "Acme, Inc", "Failed (404)")]).unwrap();
        let path = dir.path().join("failed.csv");
        table.save(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "Invoice ID,Supplier,Download Status\n1,\"Acme, Inc\",Failed (404)\n"
        );
        assert!(matches!(
            table.save(&dir.path().join("failed.txt")),
            Err(ReportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn saves_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let table = FailureTable::from_failures(&[failure("1", "Acme", "Failed (404)")]).unwrap();
        let path = dir.path().join("failed.xlsx");
        table.save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], &[0x50, 0x4B, 0x03, 0x04]);
    }
}
