//! URL and hashtag extraction from raw note content.
//!
//! Extraction runs as two explicit passes:
//!
//! 1. [`extract_urls`] scans each line for URLs.
//! 2. [`extract_tags`] masks every URL found in pass 1 with a neutral
//!    placeholder and only then scans for `#tag` tokens, so a fragment like
//!    `http://x.com/a#frag` never yields the tag `frag`.
//!
//! Both functions are pure. Neither deduplicates tags; callers that persist
//! tags run [`dedup_tags`] first.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Matches a URL preceded by start-of-line or whitespace. Group 2 is the URL.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(^|[ \t\r\n])",
        r"((ftp|http|https|gopher|mailto|news|nntp|telnet|wais|file|prospero|aim|webcal):",
        r"(([A-Za-z0-9$_.+!*(),;/?:@&~=-])|%[A-Fa-f0-9]{2}){2,}",
        r"(#([a-zA-Z0-9$_.+!*(),;/?:@&~=%-]*))?",
        r"([A-Za-z0-9$_+!*();/?:~-]))",
    ))
    .expect("URL pattern is valid")
});

/// `#` followed by ASCII letters, digits, or Latin-1 Supplement / Latin
/// Extended-A letters.
static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"#([\x{00C0}-\x{017F}a-zA-Z0-9]+)").expect("tag pattern is valid")
});

/// Text substituted for URLs before tag scanning.
pub const URL_PLACEHOLDER: &str = " --URL_PLACEHOLDER-- ";

/// Extract URLs from content, deduplicated in first-occurrence order.
///
/// Matches never span lines, and trailing sentence punctuation such as `.`
/// or `,` is left out of the match.
///
/// ```
/// use meemo_core::extract_urls;
///
/// let urls = extract_urls("a http://x.com b http://x.com");
/// assert_eq!(urls, vec!["http://x.com".to_string()]);
/// ```
pub fn extract_urls(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for line in content.split('\n') {
        for cap in URL_PATTERN.captures_iter(line) {
            let Some(m) = cap.get(2) else { continue };
            let url = m.as_str().trim();
            if seen.insert(url.to_string()) {
                urls.push(url.to_string());
            }
        }
    }

    urls
}

/// Replace every URL in `content` with [`URL_PLACEHOLDER`].
///
/// Replacement is literal, global and case-insensitive. Longer URLs are
/// masked first so a URL that is a prefix of another cannot split it.
pub fn mask_urls(content: &str, urls: &[String]) -> String {
    let mut ordered: Vec<&String> = urls.iter().collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut masked = content.to_string();
    for url in ordered {
        let pattern = RegexBuilder::new(&regex::escape(url))
            .case_insensitive(true)
            .build();
        match pattern {
            Ok(re) => {
                masked = re
                    .replace_all(&masked, regex::NoExpand(URL_PLACEHOLDER))
                    .into_owned();
            }
            // An escaped literal only fails to compile when it is too large;
            // fall back to exact-case replacement.
            Err(_) => masked = masked.replace(url.as_str(), URL_PLACEHOLDER),
        }
    }
    masked
}

/// Extract lower-cased hashtag names from content, in order of appearance.
///
/// Duplicates are kept.
///
/// ```
/// use meemo_core::extract_tags;
///
/// let tags = extract_tags("see http://x.com/a#frag and #Real");
/// assert_eq!(tags, vec!["real".to_string()]);
/// ```
pub fn extract_tags(content: &str) -> Vec<String> {
    let urls = extract_urls(content);
    let masked = mask_urls(content, &urls);

    let mut tags = Vec::new();
    for line in masked.split('\n') {
        for cap in TAG_PATTERN.captures_iter(line) {
            if let Some(name) = cap.get(1) {
                tags.push(name.as_str().to_lowercase());
            }
        }
    }
    tags
}

/// Remove duplicate tags, keeping the first occurrence of each.
pub fn dedup_tags<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Extract the deduplicated tag list stored alongside a note.
pub fn extract_unique_tags(content: &str) -> Vec<String> {
    dedup_tags(extract_tags(content))
}
