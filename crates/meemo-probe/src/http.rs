//! HTTP link classifier.
//!
//! Sends one `HEAD` request per URL and classifies the link from the
//! response's `Content-Type`. Probes run concurrently up to
//! [`ProbeConfig::max_concurrent`], each bounded by [`ProbeConfig::timeout`].
//! Results come back in input order.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tracing::{debug, info, instrument, warn};

use meemo_core::{ContentKind, Error, ExternalLink, LinkClassifier, Result};

use crate::config::ProbeConfig;

/// [`LinkClassifier`] backed by `HEAD` requests.
#[derive(Debug, Clone)]
pub struct HttpLinkClassifier {
    client: Client,
    config: ProbeConfig,
}

impl HttpLinkClassifier {
    pub fn new(config: ProbeConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        info!(
            timeout_secs = config.timeout.as_secs(),
            max_concurrent = config.max_concurrent,
            "Initializing link classifier"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ProbeConfig::from_env()?)
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }
}

#[async_trait]
impl LinkClassifier for HttpLinkClassifier {
    /// Probes are spawned onto the runtime, so a caller that stops waiting
    /// does not cancel them; their results are simply discarded.
    #[instrument(skip(self, urls), fields(url_count = urls.len()))]
    async fn classify(&self, urls: &[String]) -> Result<Vec<ExternalLink>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let client = self.client.clone();
        let timeout = self.config.timeout;
        let max_concurrent = self.config.max_concurrent;
        let urls = urls.to_vec();

        let task = tokio::spawn(async move {
            stream::iter(urls)
                .map(|url| classify_one(&client, timeout, url))
                .buffered(max_concurrent)
                .collect::<Vec<_>>()
                .await
        });

        let links = task
            .await
            .map_err(|e| Error::Internal(format!("link classification task failed: {}", e)))?;

        debug!(
            result_count = links.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Link classification complete"
        );
        Ok(links)
    }
}

/// Classify a single URL. Never fails: probe errors yield `Unknown`.
async fn classify_one(client: &Client, timeout: Duration, url: String) -> ExternalLink {
    if !is_probeable(&url) {
        debug!(url = %url, "Skipping probe for non-HTTP link");
        return ExternalLink::unknown(url);
    }

    match probe(client, timeout, &url).await {
        Ok(kind) => {
            info!(url = %url, kind = %kind, "External content type");
            ExternalLink::new(url, kind)
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to fetch external content");
            ExternalLink::unknown(url)
        }
    }
}

async fn probe(client: &Client, timeout: Duration, url: &str) -> Result<ContentKind> {
    let response = client
        .head(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Error::Probe(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Probe(format!("unexpected status {}", status)));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    Ok(ContentKind::from_mime(content_type))
}

/// Only `http` and `https` URLs are probed.
pub fn is_probeable(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
