//! Mock link classifier for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meemo_core::{ContentKind, LinkClassifier};
//! use meemo_probe::mock::MockLinkClassifier;
//!
//! let classifier = MockLinkClassifier::new()
//!     .with_kind("http://img.example/pic.png", ContentKind::Image);
//! let links = classifier.classify(&["http://img.example/pic.png".to_string()]).await?;
//! assert!(links[0].kind.is_image());
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use meemo_core::{ContentKind, Error, ExternalLink, LinkClassifier, Result};

/// Classifier that answers from a fixed table and records every call.
#[derive(Clone, Default)]
pub struct MockLinkClassifier {
    kinds: Arc<HashMap<String, ContentKind>>,
    fail: bool,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockLinkClassifier {
    /// Every URL classifies as `Unknown` unless configured otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `url` as `kind`.
    pub fn with_kind(mut self, url: impl Into<String>, kind: ContentKind) -> Self {
        Arc::make_mut(&mut self.kinds).insert(url.into(), kind);
        self
    }

    /// Make every call fail as if the classifier could not run.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// URL batches passed to `classify`, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LinkClassifier for MockLinkClassifier {
    async fn classify(&self, urls: &[String]) -> Result<Vec<ExternalLink>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(urls.to_vec());
        }

        if self.fail {
            return Err(Error::Internal("mock classifier failure".to_string()));
        }

        Ok(urls
            .iter()
            .map(|url| {
                let kind = self.kinds.get(url).copied().unwrap_or_default();
                ExternalLink::new(url.clone(), kind)
            })
            .collect())
    }
}
