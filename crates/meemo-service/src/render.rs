//! Display markup for notes ("facelift").
//!
//! Rendering rewrites raw content in three passes, each working on the
//! output of the one before:
//!
//! 1. `#tag` tokens become links to the tag search view.
//! 2. Classified URLs become image embeds or links with a shortened label.
//! 3. `[file name]` tokens become links to the attachment.
//!
//! The stored note is never modified.

use std::collections::HashMap;

use regex::{Captures, NoExpand, Regex, RegexBuilder};

use meemo_core::defaults::{FILES_URL_PREFIX, PRETTY_URL_ELLIPSIS, PRETTY_URL_LENGTH};
use meemo_core::{Attachment, Error, ExternalLink, Result};

use crate::config::ServiceConfig;

#[derive(Debug, Clone)]
pub struct Renderer {
    files_url_prefix: String,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(FILES_URL_PREFIX)
    }
}

impl Renderer {
    pub fn new(files_url_prefix: impl Into<String>) -> Self {
        Self {
            files_url_prefix: files_url_prefix.into(),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.files_url_prefix.clone())
    }

    /// Render `content` into display markup.
    pub fn render(
        &self,
        user_id: &str,
        content: &str,
        tags: &[String],
        links: &[ExternalLink],
        attachments: &[Attachment],
    ) -> Result<String> {
        let mut data = content.to_string();

        for tag in tags.iter().filter(|t| !t.is_empty()) {
            let pattern = case_insensitive(&format!(r"(?m)#{}(#|\s|$)", regex::escape(tag)))?;
            let escaped = tag.replace('$', "$$");
            let replacement = format!("[#{0}](#search?#{0})${{1}}", escaped);
            data = pattern
                .replace_all(&data, replacement.as_str())
                .trim()
                .to_string();
        }

        data = replace_links(&data, links)?;

        for attachment in attachments {
            let url = self.attachment_url(user_id, &attachment.identifier);
            let markup = if attachment.kind.is_image() {
                format!("![{0}]({0})", url)
            } else {
                format!("[{0}]({0})", url)
            };
            let pattern =
                case_insensitive(&format!(r"\[{}\]", regex::escape(&attachment.file_name)))?;
            data = pattern
                .replace_all(&data, NoExpand(&markup))
                .into_owned();
        }

        Ok(data)
    }

    /// Retrieval path of an attachment.
    pub fn attachment_url(&self, user_id: &str, identifier: &str) -> String {
        format!("{}/{}/{}", self.files_url_prefix, user_id, identifier)
    }
}

/// Visible label for a non-image link: the URL without its scheme,
/// shortened to [`PRETTY_URL_LENGTH`] characters.
pub fn pretty_label(url: &str) -> String {
    let rest = match url.find("://") {
        Some(i) => &url[i + 3..],
        None => url.split_once(':').map(|(_, r)| r).unwrap_or(url),
    };

    if rest.chars().count() > PRETTY_URL_LENGTH {
        let mut label: String = rest.chars().take(PRETTY_URL_LENGTH).collect();
        label.push_str(PRETTY_URL_ELLIPSIS);
        label
    } else {
        rest.to_string()
    }
}

/// Replace every classified URL in one pass.
///
/// Alternatives are ordered longest first, so a URL that is a prefix of
/// another never splits it, and inserted markup is not scanned again.
fn replace_links(content: &str, links: &[ExternalLink]) -> Result<String> {
    let mut ordered: Vec<&ExternalLink> = links.iter().filter(|l| !l.url.is_empty()).collect();
    if ordered.is_empty() {
        return Ok(content.to_string());
    }
    ordered.sort_by(|a, b| b.url.len().cmp(&a.url.len()));

    let mut markup: HashMap<String, String> = HashMap::new();
    for link in &ordered {
        markup.entry(link.url.to_lowercase()).or_insert_with(|| {
            if link.kind.is_image() {
                format!("![{0}]({0})", link.url)
            } else {
                format!("[{}]({})", pretty_label(&link.url), link.url)
            }
        });
    }

    let alternation = ordered
        .iter()
        .map(|l| regex::escape(&l.url))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = case_insensitive(&alternation)?;

    Ok(pattern
        .replace_all(content, |caps: &Captures| {
            let found = &caps[0];
            markup
                .get(&found.to_lowercase())
                .cloned()
                .unwrap_or_else(|| found.to_string())
        })
        .into_owned())
}

fn case_insensitive(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Internal(format!("render pattern failed to compile: {}", e)))
}
