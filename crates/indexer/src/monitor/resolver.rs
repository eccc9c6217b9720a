use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use common::error::NetworkError;

use super::bounded::run_bounded;
use super::types::{ResolutionStage, ResolvedEndpoint};
use crate::celocli::{NodeCandidates, ValidatorDirectorySource};
use crate::config::MetadataConfig;
use crate::metrics::IndexerPrometheusMetrics;
use crate::persistence::Store;
use crate::util::{non_empty_trimmed, snippet};

const METADATA_ACCEPT: &str = "application/json, text/plain, */*";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataDocument {
    #[serde(default)]
    rpc_url: Option<String>,
}

/// HTTP client for validator metadata documents
#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    http: reqwest::Client,
    timeout_ms: u64,
}

impl MetadataFetcher {
    pub fn new(config: &MetadataConfig) -> Result<Self, NetworkError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(METADATA_ACCEPT));

        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| NetworkError::connection_failed("metadata client", e))?;

        Ok(Self {
            http,
            timeout_ms: config.fetch_timeout_ms,
        })
    }

    /// Trimmed `rpcUrl` of the document at `url`, `None` when absent or empty
    pub async fn rpc_url(&self, url: &str) -> Result<Option<String>, NetworkError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout {
                    endpoint: url.to_string(),
                    timeout_ms: self.timeout_ms,
                }
            } else {
                NetworkError::connection_failed(url, e)
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NetworkError::connection_failed(url, e))?;

        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status_code: status.as_u16(),
                message: snippet(&body),
            });
        }

        let document: MetadataDocument =
            serde_json::from_str(&body).map_err(|e| NetworkError::InvalidResponse {
                details: format!("{e}: {}", snippet(&body)),
            })?;

        Ok(non_empty_trimmed(document.rpc_url.as_deref()))
    }
}

/// Three-stage RPC URL discovery for elected validators
///
/// Stages are tried in order: the on-chain metadata pointer, the document it
/// points to, then the last URL recorded in the RPC history. Every failure
/// falls through to the next stage; resolution never fails a cycle.
pub struct EndpointResolver {
    directory: Arc<dyn ValidatorDirectorySource>,
    fetcher: MetadataFetcher,
    store: Arc<dyn Store>,
    nodes: NodeCandidates,
    metrics: Arc<IndexerPrometheusMetrics>,
}

impl EndpointResolver {
    pub fn new(
        directory: Arc<dyn ValidatorDirectorySource>,
        fetcher: MetadataFetcher,
        store: Arc<dyn Store>,
        nodes: NodeCandidates,
        metrics: Arc<IndexerPrometheusMetrics>,
    ) -> Self {
        Self {
            directory,
            fetcher,
            store,
            nodes,
            metrics,
        }
    }

    async fn metadata_endpoint(&self, address: &str) -> Option<String> {
        let pointer = match self
            .nodes
            .try_each("account:show", |node| async move {
                self.directory.metadata_url(address, &node).await
            })
            .await
        {
            Ok((Some(pointer), _)) => pointer,
            Ok((None, _)) => {
                debug!(validator = %address, "No metadata pointer registered");
                return None;
            }
            Err(e) => {
                warn!(validator = %address, error = %e, "Metadata pointer lookup failed");
                return None;
            }
        };

        match self.fetcher.rpc_url(&pointer).await {
            Ok(Some(url)) => Some(url),
            Ok(None) => {
                debug!(validator = %address, metadata = %pointer, "Metadata document has no rpcUrl");
                None
            }
            Err(e) => {
                warn!(
                    validator = %address,
                    metadata = %pointer,
                    error = %snippet(&e.to_string()),
                    "Metadata document fetch failed"
                );
                None
            }
        }
    }

    /// Resolve the endpoint of one validator
    pub async fn resolve(&self, network_id: i64, address: &str) -> Option<ResolvedEndpoint> {
        if let Some(url) = self.metadata_endpoint(address).await {
            self.metrics
                .record_resolution(ResolutionStage::Metadata.as_label());
            return Some(ResolvedEndpoint {
                url,
                stage: ResolutionStage::Metadata,
            });
        }

        match self
            .store
            .latest_rpc_url_for_address(network_id, address)
            .await
        {
            Ok(Some(url)) => {
                if let Some(url) = non_empty_trimmed(Some(&url)) {
                    self.metrics
                        .record_resolution(ResolutionStage::Stored.as_label());
                    return Some(ResolvedEndpoint {
                        url,
                        stage: ResolutionStage::Stored,
                    });
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(validator = %address, error = %e, "Stored RPC lookup failed");
            }
        }

        self.metrics.record_resolution("none");
        debug!(validator = %address, "No RPC endpoint found");
        None
    }

    /// Resolve every address with at most `width` resolutions in flight
    pub async fn resolve_all(
        &self,
        network_id: i64,
        addresses: &[String],
        width: usize,
    ) -> Vec<(String, Option<ResolvedEndpoint>)> {
        let results = run_bounded(addresses.iter().cloned(), width, |address| async move {
            let endpoint = self.resolve(network_id, &address).await;
            (address, endpoint)
        })
        .await;

        let resolved = results.iter().filter(|(_, e)| e.is_some()).count();
        info!(
            total = addresses.len(),
            resolved,
            "Resolved validator RPC endpoints"
        );
        results
    }
}
