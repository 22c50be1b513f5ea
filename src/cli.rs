use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::{
    CoupaConfig, ENV_BASE_URL, ENV_IDENTIFIER, ENV_INSTANCE, ENV_SECRET, ENV_TIMEOUT_SECS,
};
use crate::error::ConfigError;

/// Top-level CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "coupa-invoice-downloader",
    version,
    about = "Upload an invoice CSV and download the invoice PDFs in bulk from Coupa"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check the credentials by requesting an access token.
    Connect(ConnectArgs),
    /// Parse a CSV and show which columns were recognised.
    Inspect(InspectArgs),
    /// Download the PDF scan of every invoice in a CSV into one ZIP archive.
    Download(DownloadArgs),
}

/// Coupa connection settings; each falls back to its environment variable.
#[derive(Debug, Clone, Args)]
pub struct CoupaArgs {
    /// OAuth2 client identifier.
    #[arg(long, env = ENV_IDENTIFIER, hide_env_values = true)]
    pub identifier: Option<String>,
    /// OAuth2 client secret.
    #[arg(long, env = ENV_SECRET, hide_env_values = true)]
    pub secret: Option<String>,
    /// Coupa instance name (the `acme` in acme.coupahost.com).
    #[arg(long, env = ENV_INSTANCE)]
    pub instance: Option<String>,
    /// Override the API base URL.
    #[arg(long, env = ENV_BASE_URL, value_name = "URL")]
    pub base_url: Option<String>,
    /// Per-request timeout (HTTP client default when omitted).
    #[arg(long, env = ENV_TIMEOUT_SECS, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,
}

impl CoupaArgs {
    pub fn into_config(self) -> Result<CoupaConfig, ConfigError> {
        Ok(
            CoupaConfig::from_parts(self.identifier, self.secret, self.instance)?
                .with_base_url(self.base_url)
                .with_timeout(self.timeout_secs.map(Duration::from_secs)),
        )
    }
}

#[derive(Debug, Args)]
pub struct ConnectArgs {
    #[command(flatten)]
    pub coupa: CoupaArgs,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Invoice CSV (comma or tab separated).
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,
    /// Number of rows to preview.
    #[arg(long, default_value_t = 5)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Invoice CSV (comma or tab separated).
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,
    /// Where to write the ZIP (defaults to Downloads/coupa_invoice_scans.zip).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
    /// Also write the failed invoices to a .csv or .xlsx file.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
    /// Open the folder containing the archive when done.
    #[arg(long)]
    pub open: bool,
    #[command(flatten)]
    pub coupa: CoupaArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_download_with_flags() {
        let cli = Cli::try_parse_from([
            "coupa-invoice-downloader",
            "-vv",
            "download",
            "invoices.csv",
            "--output",
            "out.zip",
            "--identifier",
            "id",
            "--secret",
            "s",
            "--instance",
            "acme",
            "--timeout-secs",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Download(args) => {
                assert_eq!(args.csv, PathBuf::from("invoices.csv"));
                assert_eq!(args.output, Some(PathBuf::from("out.zip")));
                let config = args.coupa.into_config().unwrap();
                assert_eq!(config.instance, "acme");
                assert_eq!(config.timeout, Some(Duration::from_secs(30)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let parsed = Cli::try_parse_from([
            "coupa-invoice-downloader",
            "connect",
            "--timeout-secs",
            "0",
        ]);
        assert!(parsed.is_err());
    }
}
