//! The fetch-and-package loop: one request per unique invoice id, successes
//! into the archive, everything else into failure records.

use crate::archive::{ArchiveBuilder, FinishedArchive};
use crate::coupa::{ScanResponse, ScanSource};
use crate::error::PipelineError;
use crate::sanitize::{date_part, sanitize_optional};
use crate::types::{
    ColumnMap, DownloadedScan, FailedDownload, FetchOutcome, InvoiceRow, InvoiceTable,
    LogicalColumn, Progress,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct BatchDownloadResult {
    pub archive: FinishedArchive,
    pub downloaded: Vec<DownloadedScan>,
    pub failures: Vec<FailedDownload>,
    /// Number of unique invoice ids the run was asked to process.
    pub total: usize,
    /// Set when the cancel flag stopped the run early.
    pub cancelled: bool,
}

/// A blank cell counts as missing, same as an absent column.
fn present_field<'a>(
    columns: &ColumnMap,
    row: &'a InvoiceRow,
    column: LogicalColumn,
) -> Option<&'a str> {
    row.field(columns, column).filter(|v| !v.trim().is_empty())
}

/// `"{supplier} - {invoice #} - {created date}.pdf"`, each part sanitized.
pub fn scan_filename(columns: &ColumnMap, row: &InvoiceRow) -> String {
    let supplier = sanitize_optional(present_field(columns, row, LogicalColumn::Supplier));
    let invoice_num = sanitize_optional(present_field(columns, row, LogicalColumn::InvoiceNumber));
    let created_date = sanitize_optional(
        present_field(columns, row, LogicalColumn::CreatedDate).map(date_part),
    );
    format!("{} - {} - {}.pdf", supplier, invoice_num, created_date)
}

/// Fetch the scan of every unique invoice id in `table` and package the PDFs.
///
/// Per-invoice failures never stop the loop. `cancel` is checked before each
/// request; `on_progress` is called once per processed id.
pub fn fetch_and_package<S, F>(
    table: &InvoiceTable,
    source: &S,
    cancel: Option<&AtomicBool>,
    mut on_progress: F,
) -> Result<BatchDownloadResult, PipelineError>
where
    S: ScanSource + ?Sized,
    F: FnMut(Progress<'_>),
{
    let ids = table
        .unique_invoice_ids()
        .ok_or(PipelineError::ColumnMissing)?;
    let total = ids.len();
    tracing::info!(total, "downloading invoice scans");

    let mut builder = ArchiveBuilder::new();
    let mut downloaded = Vec::new();
    let mut failures = Vec::new();
    let mut cancelled = false;

    for (i, invoice_id) in ids.iter().enumerate() {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            tracing::warn!(processed = i, total, "download cancelled");
            cancelled = true;
            break;
        }

        let row = table
            .find_row(invoice_id)
            .ok_or_else(|| PipelineError::Inconsistent(invoice_id.clone()))?;
        let filename = scan_filename(&table.columns, row);

        let outcome = match source.retrieve_image_scan(invoice_id) {
            Ok(ScanResponse::Pdf(bytes)) => {
                let name = builder.add(&filename, &bytes)?;
                tracing::info!(%invoice_id, file = %name, size = bytes.len(), "downloaded");
                FetchOutcome::Downloaded(DownloadedScan {
                    invoice_id: invoice_id.clone(),
                    filename: name,
                    size: bytes.len(),
                })
            }
            Ok(ScanResponse::Rejected { status, body }) => {
                tracing::warn!(%invoice_id, status, response = %body, "failed");
                FetchOutcome::Failed(FailedDownload {
                    invoice_id: invoice_id.clone(),
                    fields: table.row_fields(row),
                    status: format!("Failed ({})", status),
                    response_body: Some(body),
                })
            }
            Err(e) => {
                tracing::warn!(%invoice_id, error = %e, "error fetching invoice");
                FetchOutcome::Failed(FailedDownload {
                    invoice_id: invoice_id.clone(),
                    fields: table.row_fields(row),
                    status: format!("Failed ({})", e),
                    response_body: None,
                })
            }
        };

        on_progress(Progress {
            processed: i + 1,
            total,
            outcome: &outcome,
        });

        match outcome {
            FetchOutcome::Downloaded(scan) => downloaded.push(scan),
            FetchOutcome::Failed(failure) => failures.push(failure),
        }
    }

    let archive = builder.finish()?;
    tracing::info!(
        downloaded = downloaded.len(),
        failed = failures.len(),
        "all invoices processed"
    );
    Ok(BatchDownloadResult {
        archive,
        downloaded,
        failures,
        total,
        cancelled,
    })
}
