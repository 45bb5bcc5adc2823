//! Azure Blob Storage store, addressed by account, container and SAS token.
//!
//! Uses `ureq` (sync). Every request carries its own timeout; transport
//! failures and 5xx responses are retried a fixed number of times with a
//! linear back-off before the error is surfaced.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};
use ureq::http::Response;
use ureq::Body;
use url::Url;

use crate::error::StorageError;
use crate::listing::{parse_list_page, ListPage};
use crate::traits::BlobStore;

const PAGE_SIZE: u32 = 5000;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Connection settings for [`AzureBlobStore`].
#[derive(Debug, Clone)]
pub struct AzureConfig {
    /// Storage account name, used to build `https://{account}.blob.core.windows.net`.
    pub account: String,
    /// Explicit account URL (emulators, sovereign clouds). Overrides `account`.
    pub endpoint: Option<String>,
    pub container: String,
    /// Shared access signature query string, with or without the leading `?`.
    pub sas_token: Option<String>,
    pub list_timeout: Duration,
    pub probe_timeout: Duration,
    pub download_timeout: Duration,
    /// Extra attempts after the first one.
    pub retries: u32,
}

impl AzureConfig {
    pub fn new(account: &str, container: &str) -> Self {
        AzureConfig {
            account: account.to_string(),
            endpoint: None,
            container: container.to_string(),
            sas_token: None,
            list_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(20),
            download_timeout: Duration::from_secs(120),
            retries: 3,
        }
    }

    /// The account URL every request is built from.
    pub fn account_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.core.windows.net", self.account),
        }
    }
}

/// Blob store backed by an Azure Storage container.
pub struct AzureBlobStore {
    config: AzureConfig,
    base: Url,
    sas_token: Option<String>,
    agent: ureq::Agent,
}

impl AzureBlobStore {
    pub fn new(config: AzureConfig) -> Result<Self, StorageError> {
        let account_url = config.account_url();
        let base = Url::parse(&account_url).map_err(|e| {
            StorageError::Backend(format!("invalid account URL '{}': {}", account_url, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(StorageError::Backend(format!(
                "account URL '{}' cannot carry a path",
                account_url
            )));
        }
        if config.container.is_empty() {
            return Err(StorageError::Backend("container name is empty".to_string()));
        }

        let sas_token = config
            .sas_token
            .as_deref()
            .map(|t| t.trim().trim_start_matches('?').to_string())
            .filter(|t| !t.is_empty());

        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();

        Ok(AzureBlobStore {
            config,
            base,
            sas_token,
            agent: ureq::Agent::new_with_config(agent_config),
        })
    }

    /// URL of a blob: each path segment percent-encoded, `/` kept, SAS appended verbatim.
    pub fn blob_url(&self, path: &str) -> String {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.config.container)
                .extend(path.split('/'));
        }
        self.with_sas(url)
    }

    /// URL of one listing page.
    pub fn list_url(&self, prefix: Option<&str>, marker: Option<&str>) -> String {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.config.container);
        }
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("restype", "container")
                .append_pair("comp", "list")
                .append_pair("maxresults", &PAGE_SIZE.to_string());
            if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
                query.append_pair("prefix", prefix);
            }
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }
        self.with_sas(url)
    }

    fn with_sas(&self, url: Url) -> String {
        let url = url.to_string();
        match &self.sas_token {
            None => url,
            Some(sas) if url.contains('?') => format!("{}&{}", url, sas),
            Some(sas) => format!("{}?{}", url, sas),
        }
    }

    /// Send a request, retrying transport errors and 5xx responses.
    fn send_with_retries<F>(
        &self,
        operation: &'static str,
        path: &str,
        mut send: F,
    ) -> Result<Response<Body>, StorageError>
    where
        F: FnMut() -> Result<Response<Body>, ureq::Error>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let retry_left = attempt <= self.config.retries;
            match send() {
                Ok(response) if response.status().is_server_error() && retry_left => {
                    warn!(
                        operation,
                        path,
                        status = response.status().as_u16(),
                        attempt,
                        "server error, retrying"
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if retry_left => {
                    warn!(operation, path, attempt, error = %e, "transport error, retrying");
                }
                Err(e) => {
                    return Err(StorageError::Transport {
                        operation,
                        path: path.to_string(),
                        attempts: attempt,
                        message: e.to_string(),
                    })
                }
            }
            std::thread::sleep(RETRY_BACKOFF * attempt);
        }
    }

    fn list_page(&self, prefix: Option<&str>, marker: Option<&str>) -> Result<ListPage, StorageError> {
        let container = &self.config.container;
        let url = self.list_url(prefix, marker);
        let mut response = self.send_with_retries("LIST", container, || {
            self.agent
                .get(url.as_str())
                .config()
                .timeout_global(Some(self.config.list_timeout))
                .build()
                .call()
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(StorageError::Http {
                operation: "LIST",
                path: container.clone(),
                status,
            });
        }

        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_string()
            .map_err(|e| StorageError::Transport {
                operation: "LIST",
                path: container.clone(),
                attempts: 1,
                message: format!("failed to read listing body: {}", e),
            })?;

        let page = parse_list_page(&body)?;
        debug!(
            container = %container,
            page_len = page.names.len(),
            more = page.next_marker.is_some(),
            "listed page"
        );
        Ok(page)
    }
}

impl BlobStore for AzureBlobStore {
    /// Follows `NextMarker` until the listing is exhausted. A failure on the
    /// first page is an error; a failure on a later page ends the listing
    /// with the names gathered so far.
    fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;
        let mut pages: u32 = 0;

        loop {
            let page = match self.list_page(prefix, marker.as_deref()) {
                Ok(page) => page,
                Err(e) if pages > 0 => {
                    warn!(
                        container = %self.config.container,
                        pages,
                        blobs = names.len(),
                        error = %e,
                        "listing page failed; keeping the pages already fetched"
                    );
                    break;
                }
                Err(e) => return Err(e),
            };
            pages += 1;
            names.extend(page.names);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(names)
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let url = self.blob_url(path);

        let head = self.send_with_retries("HEAD", path, || {
            self.agent
                .head(url.as_str())
                .config()
                .timeout_global(Some(self.config.probe_timeout))
                .build()
                .call()
        })?;
        let head_status = head.status().as_u16();
        debug!(path, status = head_status, "HEAD probe");
        if matches!(head_status, 200 | 206) {
            return Ok(true);
        }

        // Some SAS policies reject HEAD but allow reads; a one-byte GET settles it.
        let ranged = self.send_with_retries("GET", path, || {
            self.agent
                .get(url.as_str())
                .header("Range", "bytes=0-0")
                .config()
                .timeout_global(Some(self.config.probe_timeout))
                .build()
                .call()
        })?;
        let get_status = ranged.status().as_u16();
        debug!(path, status = get_status, "ranged GET probe");
        match get_status {
            200 | 206 => Ok(true),
            404 => Ok(false),
            status if head_status == 404 => {
                debug!(path, status, "ranged GET inconclusive after HEAD 404");
                Ok(false)
            }
            status => Err(StorageError::Http {
                operation: "GET",
                path: path.to_string(),
                status,
            }),
        }
    }

    fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let url = self.blob_url(path);
        let mut response = self.send_with_retries("GET", path, || {
            self.agent
                .get(url.as_str())
                .config()
                .timeout_global(Some(self.config.download_timeout))
                .build()
                .call()
        })?;

        match response.status().as_u16() {
            200 => {}
            404 => {
                return Err(StorageError::NotFound {
                    path: path.to_string(),
                })
            }
            status => {
                return Err(StorageError::Http {
                    operation: "GET",
                    path: path.to_string(),
                    status,
                })
            }
        }

        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(|e| StorageError::Transport {
                operation: "GET",
                path: path.to_string(),
                attempts: 1,
                message: format!("failed to read body: {}", e),
            })?;
        Ok(Bytes::from(body))
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.config.account_url(), self.config.container)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store(sas: Option<&str>) -> AzureBlobStore {
        let mut config = AzureConfig::new("acct", "production");
        config.sas_token = sas.map(|s| s.to_string());
        AzureBlobStore::new(config).unwrap()
    }

    #[test]
    fn account_url_from_account_name() {
        let config = AzureConfig::new("solo", "c");
        assert_eq!(config.account_url(), "https://solo.blob.core.windows.net");
    }

    #[test]
    fn endpoint_overrides_account() {
        let mut config = AzureConfig::new("ignored", "c");
        config.endpoint = Some("http://127.0.0.1:10000/devstoreaccount1/".to_string());
        assert_eq!(config.account_url(), "http://127.0.0.1:10000/devstoreaccount1");
    }

    #[test]
    fn blob_url_keeps_slashes_and_encodes_segments() {
        let s = store(Some("?sv=2022&sig=abc%3D"));
        assert_eq!(
            s.blob_url("tables/run step.parquet"),
            "https://acct.blob.core.windows.net/production/tables/run%20step.parquet?sv=2022&sig=abc%3D"
        );
    }

    #[test]
    fn blob_url_without_sas() {
        let s = store(None);
        assert_eq!(
            s.blob_url("run.parquet"),
            "https://acct.blob.core.windows.net/production/run.parquet"
        );
    }

    #[test]
    fn list_url_carries_paging_params_then_sas() {
        let s = store(Some("sig=x"));
        let url = s.list_url(Some("delta/"), Some("2!88"));
        assert!(url.starts_with(
            "https://acct.blob.core.windows.net/production?restype=container&comp=list&maxresults=5000"
        ));
        assert!(url.contains("&prefix=delta%2F"));
        assert!(url.contains("&marker=2%2188"));
        assert!(url.ends_with("&sig=x"));
    }

    #[test]
    fn empty_prefix_is_omitted() {
        let s = store(None);
        assert!(!s.list_url(Some(""), None).contains("prefix"));
    }

    #[test]
    fn empty_container_rejected() {
        let config = AzureConfig::new("acct", "");
        assert!(matches!(
            AzureBlobStore::new(config),
            Err(StorageError::Backend(_))
        ));
    }

    #[test]
    fn describe_names_container() {
        assert_eq!(
            store(None).describe(),
            "https://acct.blob.core.windows.net/production"
        );
    }
}
