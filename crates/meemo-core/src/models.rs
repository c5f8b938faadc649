//! Core data models for meemo.
//!
//! These types are shared across all meemo crates. Field names serialize in
//! camelCase because the same shapes travel over the wire and inside
//! archive envelopes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Best-effort content type of an external link or attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    /// Anything that is not known to be an image, including values written
    /// by other systems that this version does not understand.
    #[default]
    #[serde(other)]
    Unknown,
}

impl ContentKind {
    pub fn is_image(self) -> bool {
        matches!(self, ContentKind::Image)
    }

    /// Classify from a `Content-Type` header value.
    pub fn from_mime(content_type: &str) -> Self {
        if content_type.trim_start().to_ascii_lowercase().starts_with("image/") {
            ContentKind::Image
        } else {
            ContentKind::Unknown
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentKind::Image => write!(f, "image"),
            ContentKind::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// NOTE TYPES
// =============================================================================

/// An external URL found in note content, annotated with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: ContentKind,
}

impl ExternalLink {
    pub fn new(url: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    pub fn unknown(url: impl Into<String>) -> Self {
        Self::new(url, ContentKind::Unknown)
    }
}

/// A file attached to a note, referenced from content as `[file_name]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub file_name: String,
    pub identifier: String,
    #[serde(rename = "type", default)]
    pub kind: ContentKind,
}

/// A stored note ("thing").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub user_id: String,
    pub content: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub modified_at: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    /// `None` for notes stored before link classification existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_content: Option<Vec<ExternalLink>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub acl: Vec<String>,
}

/// A note together with its display markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedNote {
    #[serde(flatten)]
    pub note: Note,
    pub rich_content: String,
}

/// Fields for inserting a note.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub content: String,
    pub tags: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub external_content: Vec<ExternalLink>,
}

/// Fields for overwriting a stored note.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub content: String,
    pub tags: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub external_content: Option<Vec<ExternalLink>>,
    /// `None` keeps the stored access list.
    pub acl: Option<Vec<String>>,
    /// `None` keeps the stored modification time.
    pub modified_at: Option<i64>,
}

/// Filter for note listings.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    /// Case-insensitive substring of the raw content.
    pub text: Option<String>,
    /// Tag that must be present on the note.
    pub tag: Option<String>,
}

impl NoteFilter {
    pub fn matches(&self, note: &Note) -> bool {
        if let Some(ref text) = self.text {
            if !note.content.to_lowercase().contains(&text.to_lowercase()) {
                return false;
            }
        }
        if let Some(ref tag) = self.tag {
            let tag = tag.to_lowercase();
            if !note.tags.iter().any(|t| *t == tag) {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// TAG TYPES
// =============================================================================

/// A tag record held by the tag index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    pub id: Uuid,
    pub name: String,
    /// Number of times the tag has been upserted.
    pub usage: u64,
    /// Epoch milliseconds of the last upsert.
    pub last_used_at: i64,
}

// =============================================================================
// DIRECTORY TYPES
// =============================================================================

/// Canonical user profile resolved by the directory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub email: String,
}

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_from_mime() {
        assert_eq!(ContentKind::from_mime("image/png"), ContentKind::Image);
        assert_eq!(ContentKind::from_mime("Image/JPEG"), ContentKind::Image);
        assert_eq!(
            ContentKind::from_mime("text/html; charset=utf-8"),
            ContentKind::Unknown
        );
        assert_eq!(ContentKind::from_mime(""), ContentKind::Unknown);
    }

    #[test]
    fn test_content_kind_unrecognised_value_is_unknown() {
        let kind: ContentKind = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(kind, ContentKind::Unknown);
        assert_eq!(serde_json::to_string(&ContentKind::Image).unwrap(), "\"image\"");
    }

    #[test]
    fn test_attachment_wire_format() {
        let json = r#"{"fileName":"cat.png","identifier":"abc123","type":"image"}"#;
        let attachment: Attachment = serde_json::from_str(json).unwrap();
        assert_eq!(attachment.file_name, "cat.png");
        assert!(attachment.kind.is_image());

        let value = serde_json::to_value(&attachment).unwrap();
        assert_eq!(value["fileName"], "cat.png");
        assert_eq!(value["type"], "image");
    }

    #[test]
    fn test_legacy_note_has_no_external_content() {
        let json = serde_json::json!({
            "id": Uuid::nil(),
            "userId": "alice",
            "content": "old",
            "createdAt": 1,
            "modifiedAt": 2,
        });
        let note: Note = serde_json::from_value(json).unwrap();
        assert!(note.external_content.is_none());
        assert!(note.attachments.is_empty());
    }

    #[test]
    fn test_rendered_note_flattens() {
        let note = Note {
            id: Uuid::nil(),
            user_id: "alice".into(),
            content: "#a".into(),
            created_at: 1,
            modified_at: 1,
            tags: vec!["a".into()],
            external_content: Some(vec![]),
            attachments: vec![],
            acl: vec!["alice".into()],
        };
        let rendered = RenderedNote {
            note,
            rich_content: "[#a](#search?#a)".into(),
        };
        let value = serde_json::to_value(&rendered).unwrap();
        assert_eq!(value["content"], "#a");
        assert_eq!(value["richContent"], "[#a](#search?#a)");
    }

    #[test]
    fn test_filter_matches_text_and_tag() {
        let mut note = Note {
            id: Uuid::nil(),
            user_id: "alice".into(),
            content: "Buy Milk #shopping".into(),
            created_at: 1,
            modified_at: 1,
            tags: vec!["shopping".into()],
            external_content: None,
            attachments: vec![],
            acl: vec![],
        };
        let filter = NoteFilter {
            text: Some("milk".into()),
            tag: Some("Shopping".into()),
        };
        assert!(filter.matches(&note));

        note.tags.clear();
        assert!(!filter.matches(&note));
        assert!(NoteFilter::default().matches(&note));
    }
}
