//! # meemo-probe
//!
//! External link classification for meemo.
//!
//! This crate provides:
//! - [`HttpLinkClassifier`], which probes URLs with concurrent `HEAD`
//!   requests and classifies images by `Content-Type`
//! - [`ProbeConfig`], loaded from the environment
//! - A deterministic mock classifier (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use meemo_core::LinkClassifier;
//! use meemo_probe::HttpLinkClassifier;
//!
//! #[tokio::main]
//! async fn main() {
//!     let classifier = HttpLinkClassifier::from_env().unwrap();
//!     let links = classifier
//!         .classify(&["https://example.com/cat.png".to_string()])
//!         .await
//!         .unwrap();
//!     println!("{:?}", links);
//! }
//! ```

pub mod config;
pub mod http;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::{ConfigError, ProbeConfig};
pub use http::{is_probeable, HttpLinkClassifier};
