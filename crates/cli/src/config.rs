//! Where snapshots come from: Azure by default, a local directory on request.

use std::path::PathBuf;
use std::time::Duration;

use batchloc_core::LocatorConfig;
use batchloc_storage::{AzureBlobStore, AzureConfig, BlobStore, FsBlobStore, StorageError};
use clap::Args;
use tracing::{info, warn};

/// Snapshot source options, shared by every command that reads snapshots.
#[derive(Debug, Clone, Args)]
pub(crate) struct SourceArgs {
    /// Azure storage account name
    #[arg(long, env = "AZURE_STORAGE_ACCOUNT", default_value = "solodbdata")]
    pub account: String,

    /// Account URL, overriding the one derived from --account (e.g. an emulator)
    #[arg(long, env = "AZURE_STORAGE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Blob container holding the snapshots
    #[arg(long, env = "AZURE_STORAGE_CONTAINER", default_value = "production")]
    pub container: String,

    /// Shared access signature for the container
    #[arg(long, env = "AZURE_SAS_TOKEN", hide_env_values = true)]
    pub sas_token: Option<String>,

    /// Only consider listed blobs under this prefix
    #[arg(long, env = "AZURE_STORAGE_PREFIX")]
    pub prefix: Option<String>,

    /// Never list the container; probe candidate paths only
    #[arg(long, env = "BATCHLOC_NO_LISTING")]
    pub no_listing: bool,

    /// Read snapshots from a local directory instead of Azure
    #[arg(long, env = "BATCHLOC_SNAPSHOT_DIR")]
    pub snapshot_dir: Option<PathBuf>,

    /// Retries for transient HTTP failures
    #[arg(long, default_value = "3")]
    pub retries: u32,

    /// Download timeout in seconds (listing and probes use their own shorter limits)
    #[arg(long, default_value = "120")]
    pub timeout_secs: u64,
}

impl SourceArgs {
    pub(crate) fn locator_config(&self) -> LocatorConfig {
        LocatorConfig {
            prefix: self.prefix.clone().filter(|p| !p.is_empty()),
            allow_listing: !self.no_listing,
        }
    }

    pub(crate) fn azure_config(&self) -> AzureConfig {
        let mut config = AzureConfig::new(&self.account, &self.container);
        config.endpoint = self.endpoint.clone().filter(|e| !e.is_empty());
        config.sas_token = self.sas_token.clone();
        config.retries = self.retries;
        config.download_timeout = Duration::from_secs(self.timeout_secs);
        config
    }

    /// Open the configured store.
    pub(crate) fn open_store(&self) -> Result<Box<dyn BlobStore>, StorageError> {
        if let Some(dir) = &self.snapshot_dir {
            let store = FsBlobStore::new(dir)?;
            info!(store = %store.describe(), "using local snapshot directory");
            return Ok(Box::new(store));
        }

        if self.sas_token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            warn!("AZURE_SAS_TOKEN is not set; requests are sent unauthenticated");
        }
        let store = AzureBlobStore::new(self.azure_config())?;
        info!(store = %store.describe(), "using Azure blob container");
        Ok(Box::new(store))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        source: SourceArgs,
    }

    fn parse(args: &[&str]) -> SourceArgs {
        let mut argv = vec!["batchloc"];
        argv.extend_from_slice(args);
        Harness::parse_from(argv).source
    }

    #[test]
    fn azure_settings_carry_over() {
        let source = parse(&[
            "--account",
            "acct",
            "--container",
            "snap",
            "--sas-token",
            "sig=1",
            "--retries",
            "5",
            "--timeout-secs",
            "30",
        ]);
        let config = source.azure_config();
        assert_eq!(config.account_url(), "https://acct.blob.core.windows.net");
        assert_eq!(config.container, "snap");
        assert_eq!(config.sas_token.as_deref(), Some("sig=1"));
        assert_eq!(config.retries, 5);
        assert_eq!(config.download_timeout, Duration::from_secs(30));
        assert_eq!(config.probe_timeout, Duration::from_secs(20));
    }

    #[test]
    fn listing_and_prefix() {
        let source = parse(&["--no-listing", "--prefix", ""]);
        let locator = source.locator_config();
        assert!(!locator.allow_listing);
        assert_eq!(locator.prefix, None);
    }

    #[test]
    fn missing_snapshot_dir_is_an_error() {
        let source = parse(&["--snapshot-dir", "/definitely/not/a/real/dir"]);
        assert!(source.open_store().is_err());
    }
}
