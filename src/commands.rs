use crate::archive::FinishedArchive;
use crate::cli::{Commands, ConnectArgs, DownloadArgs, InspectArgs};
use crate::csv_ingest::ingest_bytes;
use crate::error::{AppError, PipelineError};
use crate::report::{default_archive_path, render_table, save_archive, DownloadReport};
use crate::session::{ConnectionStatus, Session};
use crate::types::{FetchOutcome, InvoiceTable, LogicalColumn};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub fn dispatch(command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Connect(args) => connect(args),
        Commands::Inspect(args) => inspect(args),
        Commands::Download(args) => download(args),
    }
}

fn read_table(path: &Path) -> Result<InvoiceTable, AppError> {
    let bytes = fs::read(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ingest_bytes(&bytes)?)
}

pub fn connect(args: ConnectArgs) -> Result<(), AppError> {
    let config = args.coupa.into_config()?;
    let instance = config.instance.clone();
    let mut session = Session::new(config)?;
    match session.connect()? {
        ConnectionStatus::Connected => println!("Connected to Coupa instance `{}`.", instance),
        ConnectionStatus::NoToken => {
            println!("Connected but no token returned. Check API scope.")
        }
    }
    Ok(())
}

pub fn inspect(args: InspectArgs) -> Result<(), AppError> {
    let table = read_table(&args.csv)?;
    println!("CSV parsed: {} rows, {} columns.", table.rows.len(), table.headers.len());

    for column in LogicalColumn::ALL {
        match table.columns.header(column) {
            Some(header) => println!("  {:<13} -> {}", column.key(), header),
            None => println!("  {:<13} -> (not found)", column.key()),
        }
    }

    let preview: Vec<Vec<String>> = table
        .rows
        .iter()
        .take(args.rows)
        .map(|row| row.values().to_vec())
        .collect();
    println!();
    println!("{}", render_table(&table.headers, &preview));

    match table.unique_invoice_ids() {
        Some(ids) => println!("\n{} unique invoice ids ready to fetch.", ids.len()),
        None => eprintln!("\n'Invoice ID' column not found, cannot fetch PDFs."),
    }
    Ok(())
}

fn make_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {bar:30} {pos}/{len} invoices ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn download(args: DownloadArgs) -> Result<(), AppError> {
    let config = args.coupa.into_config()?;
    let table = read_table(&args.csv)?;
    if !table.columns.contains(LogicalColumn::InvoiceId) {
        return Err(PipelineError::ColumnMissing.into());
    }

    let mut session = Session::new(config)?;
    if session.connect()? == ConnectionStatus::NoToken {
        return Err(PipelineError::NotConnected.into());
    }

    let pb = make_progress_bar();
    let result = session.download_table(&table, None, |progress| {
        pb.set_length(progress.total as u64);
        pb.set_position(progress.processed as u64);
        let id = progress.outcome.invoice_id();
        match progress.outcome {
            FetchOutcome::Downloaded(_) => pb.set_message(format!("downloaded {}", id)),
            FetchOutcome::Failed(failure) => {
                pb.set_message(format!("failed {} {}", id, failure.status))
            }
        }
    });
    pb.finish_and_clear();
    let report = result?;

    write_outputs(
        &report,
        session.take_archive(),
        args.output,
        args.report.as_deref(),
        args.open,
    )
}

/// Summary and failure report are written before the archive; either output
/// failing leaves the other one written.
fn write_outputs(
    report: &DownloadReport,
    archive: Option<FinishedArchive>,
    output: Option<PathBuf>,
    report_path: Option<&Path>,
    open: bool,
) -> Result<(), AppError> {
    println!("{}", report.summary());
    let mut report_saved = Ok(());
    if let Some(table) = &report.failure_table {
        eprintln!("{} invoices failed.", report.failures.len());
        println!("{}", table.render());
        if let Some(path) = report_path {
            report_saved = table.save(path);
            if report_saved.is_ok() {
                println!("Failure report written to {}", path.display());
            }
        }
    }

    let archived = write_archive(archive, output, open);
    report_saved?;
    archived
}

fn write_archive(
    archive: Option<FinishedArchive>,
    output: Option<PathBuf>,
    open: bool,
) -> Result<(), AppError> {
    let archive = match archive {
        Some(archive) if archive.entries() > 0 => archive,
        _ => {
            println!("No PDFs were downloaded, no archive written.");
            return Ok(());
        }
    };
    let path = match output {
        Some(path) => path,
        None => default_archive_path()?,
    };
    save_archive(&archive, &path)?;
    println!("Saved {} PDFs to {}", archive.entries(), path.display());
    if open {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        opener::open(dir).map_err(|e| AppError::Open {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveBuilder;
    use crate::downloader::BatchDownloadResult;
    use crate::error::ReportError;
    use crate::report::finalize;
    use crate::types::FailedDownload;

    fn report_with_one_of_each() -> DownloadReport {
        let mut builder = ArchiveBuilder::new();
        builder.add("Acme - INV-1 - 2025-01-01.pdf", b"%PDF-1.4").unwrap();
        finalize(BatchDownloadResult {
            archive: builder.finish().unwrap(),
            downloaded: vec![],
            failures: vec![FailedDownload {
                invoice_id: "2".to_string(),
                fields: vec![("Invoice ID".to_string(), "2".to_string())],
                status: "Failed (404)".to_string(),
                response_body: None,
            }],
            total: 2,
            cancelled: false,
        })
    }

    #[test]
    fn failure_report_survives_unwritable_archive_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = report_with_one_of_each();
        let archive = report.take_archive();
        let report_path = dir.path().join("failed.csv");

        let err = write_outputs(
            &report,
            archive,
            Some(dir.path().join("missing").join("out.zip")),
            Some(&report_path),
            false,
        )
        .unwrap_err();

        assert!(matches!(err, AppError::Report(ReportError::Io { .. })));
        let written = std::fs::read_to_string(&report_path).unwrap();
        assert_eq!(written, "Invoice ID,Download Status\n2,Failed (404)\n");
    }

    #[test]
    fn archive_survives_unwritable_report_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = report_with_one_of_each();
        let archive = report.take_archive();
        let out = dir.path().join("scans.zip");
        let bad_report = dir.path().join("missing").join("failed.csv");

        let err = write_outputs(&report, archive, Some(out.clone()), Some(&bad_report), false)
            .unwrap_err();

        assert!(matches!(err, AppError::Report(_)));
        assert!(out.exists());
    }

    #[test]
    fn writes_archive_to_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = report_with_one_of_each();
        let archive = report.take_archive();
        let out = dir.path().join("scans.zip");

        write_outputs(&report, archive, Some(out.clone()), None, false).unwrap();

        assert!(out.exists());
    }

    #[test]
    fn empty_archive_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let report = report_with_one_of_each();
        let out = dir.path().join("scans.zip");
        let empty = ArchiveBuilder::new().finish().unwrap();

        write_outputs(&report, Some(empty), Some(out.clone()), None, false).unwrap();

        assert!(!out.exists());
    }
}
