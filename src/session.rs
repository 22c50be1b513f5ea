//! Per-user session: the Coupa client, the bearer token and the archive of the
//! last run waiting to be collected.

use crate::archive::FinishedArchive;
use crate::config::CoupaConfig;
use crate::coupa::{BearerToken, CoupaClient, TokenGrant};
use crate::csv_ingest::ingest_bytes;
use crate::downloader::fetch_and_package;
use crate::error::{AuthError, PipelineError};
use crate::report::{finalize, DownloadReport};
use crate::types::{InvoiceTable, LogicalColumn, Progress};
use std::sync::atomic::AtomicBool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    /// The token endpoint answered 2xx but returned no token.
    NoToken,
}

pub struct Session {
    client: CoupaClient,
    token: Option<BearerToken>,
    auth_attempted: bool,
    pending_archive: Option<FinishedArchive>,
}

impl Session {
    pub fn new(config: CoupaConfig) -> Result<Self, AuthError> {
        Ok(Self::with_client(CoupaClient::new(config)?))
    }

    pub fn with_client(client: CoupaClient) -> Self {
        Self {
            client,
            token: None,
            auth_attempted: false,
            pending_archive: None,
        }
    }

    /// Acquire a token unless one is already held.
    pub fn connect(&mut self) -> Result<ConnectionStatus, AuthError> {
        if self.token.is_some() {
            return Ok(ConnectionStatus::Connected);
        }
        self.auth_attempted = true;
        match self.client.acquire_token()? {
            TokenGrant::Granted(token) => {
                self.token = Some(token);
                Ok(ConnectionStatus::Connected)
            }
            TokenGrant::Missing => Ok(ConnectionStatus::NoToken),
        }
    }

    /// Parse an uploaded CSV and run [`Session::download_table`] on it.
    pub fn download<F>(
        &mut self,
        csv_bytes: &[u8],
        cancel: Option<&AtomicBool>,
        on_progress: F,
    ) -> Result<DownloadReport, PipelineError>
    where
        F: FnMut(Progress<'_>),
    {
        let table = ingest_bytes(csv_bytes)?;
        self.download_table(&table, cancel, on_progress)
    }

    /// Fetch and package every invoice in `table`.
    ///
    /// A missing invoice id column is reported before any request is made. The
    /// token is acquired automatically at most once per session. The previous
    /// run's archive is dropped; the new one waits in [`Session::take_archive`].
    pub fn download_table<F>(
        &mut self,
        table: &InvoiceTable,
        cancel: Option<&AtomicBool>,
        on_progress: F,
    ) -> Result<DownloadReport, PipelineError>
    where
        F: FnMut(Progress<'_>),
    {
        if !table.columns.contains(LogicalColumn::InvoiceId) {
            return Err(PipelineError::ColumnMissing);
        }
        self.pending_archive = None;

        if self.token.is_none() && !self.auth_attempted {
            self.connect()?;
        }
        let token = self.token.as_ref().ok_or(PipelineError::NotConnected)?;

        let result = fetch_and_package(table, &self.client.authorized(token), cancel, on_progress)?;
        let mut report = finalize(result);
        self.pending_archive = report.take_archive();
        Ok(report)
    }

    /// The last run's archive, handed out once.
    pub fn take_archive(&mut self) -> Option<FinishedArchive> {
        self.pending_archive.take()
    }
}
