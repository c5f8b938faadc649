//! Integration tests for bundle export, import and inspection.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use meemo_core::{Attachment, ContentKind, Error, NoteStore};
use meemo_db::{AttachmentStore, MemoryNoteStore, MemoryTagIndex};
use meemo_probe::mock::MockLinkClassifier;
use meemo_service::{inspect_bundle, ArchiveExchange, NoteService, ServiceConfig};
use tempfile::TempDir;

struct Fixture {
    _root: TempDir,
    work: PathBuf,
    scratch: PathBuf,
    notes: Arc<MemoryNoteStore>,
    tags: Arc<MemoryTagIndex>,
    files: AttachmentStore,
    service: NoteService,
    exchange: ArchiveExchange,
}

fn fixture() -> Fixture {
    let root = TempDir::new().unwrap();
    let work = root.path().join("work");
    let scratch = root.path().join("scratch");
    std::fs::create_dir_all(&work).unwrap();
    std::fs::create_dir_all(&scratch).unwrap();

    let notes = Arc::new(MemoryNoteStore::new());
    let tags = Arc::new(MemoryTagIndex::new());
    let files = AttachmentStore::new(root.path().join("files"));
    let classifier =
        MockLinkClassifier::new().with_kind("http://img.example/pic.png", ContentKind::Image);

    let service = NoteService::new(notes.clone(), tags.clone(), Arc::new(classifier));
    let exchange =
        ArchiveExchange::new(notes.clone(), tags.clone(), files.clone()).with_scratch_dir(&scratch);

    Fixture {
        _root: root,
        work,
        scratch,
        notes,
        tags,
        files,
        service,
        exchange,
    }
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

/// Write a plain tar bundle with the given entries.
fn write_bundle(path: &Path, entries: &[(&str, &[u8])]) {
    let mut builder = tar::Builder::new(File::create(path).unwrap());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().flush().unwrap();
}

#[tokio::test]
async fn test_export_then_import_round_trip() {
    let f = fixture();

    let identifier = f.files.store("alice", b"\x89PNG fake").await.unwrap();
    let attachment = Attachment {
        file_name: "pic.png".to_string(),
        identifier: identifier.clone(),
        kind: ContentKind::Image,
    };
    f.service
        .add("alice", "#a http://img.example/pic.png", vec![attachment])
        .await
        .unwrap();

    let bundle = f.work.join("export.tar");
    let exported = f.exchange.export("alice", &bundle).await.unwrap();
    assert_eq!(exported.notes, 1);
    assert_eq!(exported.attachments, 1);

    let summary = f.exchange.import("bob", &bundle).await.unwrap();
    assert_eq!(summary.note_ids.len(), 1);
    assert_eq!(summary.attachments, 1);

    let imported = f.notes.get_all_lean("bob").await.unwrap();
    assert_eq!(imported.len(), 1);
    let note = &imported[0];
    assert_eq!(note.tags, vec!["a".to_string()]);
    assert_eq!(note.attachments.len(), 1);
    assert_eq!(note.content, "#a http://img.example/pic.png");

    // Classification travels with the bundle.
    let links = note.external_content.clone().unwrap();
    assert_eq!(links.len(), 1);
    assert!(links[0].kind.is_image());

    let original = &f.notes.get_all_lean("alice").await.unwrap()[0];
    assert_eq!(note.created_at, original.created_at);
    assert_eq!(note.modified_at, original.modified_at);

    assert_eq!(
        f.files.read("bob", &identifier).await.unwrap(),
        b"\x89PNG fake"
    );
    assert_eq!(f.tags.names("bob").await, vec!["a".to_string()]);

    assert!(!bundle.exists(), "uploaded bundle is removed");
    assert!(dir_is_empty(&f.scratch), "scratch workspace is removed");
}

#[tokio::test]
async fn test_exchange_built_from_config_uses_configured_dirs() {
    let f = fixture();
    let identifier = f.files.store("alice", b"report").await.unwrap();
    let attachment = Attachment {
        file_name: "report.txt".to_string(),
        identifier: identifier.clone(),
        kind: ContentKind::Unknown,
    };
    f.service
        .add("alice", "see [report.txt]", vec![attachment])
        .await
        .unwrap();
    let bundle = f.work.join("export.tar");
    f.exchange.export("alice", &bundle).await.unwrap();

    let other = TempDir::new().unwrap();
    let config = ServiceConfig::default()
        .with_attachment_dir(other.path().join("files"))
        .with_scratch_dir(other.path().join("scratch"));
    std::fs::create_dir_all(other.path().join("scratch")).unwrap();

    let exchange = ArchiveExchange::from_config(f.notes.clone(), f.tags.clone(), &config);
    let summary = exchange.import("carol", &bundle).await.unwrap();
    assert_eq!(summary.attachments, 1);

    let files = AttachmentStore::new(other.path().join("files"));
    assert_eq!(files.read("carol", &identifier).await.unwrap(), b"report");
    assert!(!f.files.exists("carol", &identifier).await.unwrap());
    assert!(dir_is_empty(&other.path().join("scratch")));
}

#[tokio::test]
async fn test_import_rejects_envelope_without_things_array() {
    let f = fixture();
    let bundle = f.work.join("bad.tar");
    write_bundle(
        &bundle,
        &[
            ("things.json", br#"{"notes": []}"#),
            ("attachments/abc", b"data"),
        ],
    );

    let err = f.exchange.import("bob", &bundle).await.unwrap_err();
    assert!(err.is_validation());
    assert!(matches!(err, Error::InvalidArchive(_)));

    assert!(!bundle.exists());
    assert!(dir_is_empty(&f.scratch));
    assert!(f.files.list("bob").await.unwrap().is_empty());
    assert_eq!(f.notes.count("bob").await, 0);
}

#[tokio::test]
async fn test_import_rejects_non_json_envelope() {
    let f = fixture();
    let bundle = f.work.join("bad.tar");
    write_bundle(&bundle, &[("things.json", b"not json at all")]);

    let err = f.exchange.import("bob", &bundle).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArchive(ref msg) if msg.contains("not JSON")));
    assert!(!bundle.exists());
    assert!(dir_is_empty(&f.scratch));
}

#[tokio::test]
async fn test_import_rejects_bundle_without_envelope() {
    let f = fixture();
    let bundle = f.work.join("empty.tar");
    write_bundle(&bundle, &[("attachments/abc", b"data")]);

    let err = f.exchange.import("bob", &bundle).await.unwrap_err();
    assert!(err.is_validation());
    assert!(!bundle.exists());
    assert!(dir_is_empty(&f.scratch));
}

#[tokio::test]
async fn test_import_cleans_up_after_unpack_failure() {
    let f = fixture();
    let bundle = f.work.join("garbage.tar");
    std::fs::write(&bundle, vec![7u8; 2048]).unwrap();

    let err = f.exchange.import("bob", &bundle).await.unwrap_err();
    assert!(err.is_validation());
    assert!(!bundle.exists());
    assert!(dir_is_empty(&f.scratch));
}

#[tokio::test]
async fn test_import_recomputes_tags_and_normalizes_timestamps() {
    let f = fixture();
    let bundle = f.work.join("legacy.tar");
    let envelope = serde_json::json!({
        "things": [
            {
                "content": "#Real note",
                "tags": ["bogus"],
                "createdAt": "2020-01-01T00:00:00Z"
            },
            {
                "content": "second",
                "createdAt": 1000,
                "modifiedAt": 2000
            }
        ]
    });
    write_bundle(
        &bundle,
        &[("things.json", envelope.to_string().as_bytes())],
    );

    let summary = f.exchange.import("bob", &bundle).await.unwrap();
    assert_eq!(summary.note_ids.len(), 2);

    let notes = f.notes.get_all_lean("bob").await.unwrap();
    let second = &notes[0];
    assert_eq!((second.created_at, second.modified_at), (1000, 2000));
    assert_eq!(second.external_content, Some(Vec::new()));

    let first = &notes[1];
    assert_eq!(first.tags, vec!["real".to_string()]);
    assert_eq!(first.created_at, 1_577_836_800_000);
    assert_eq!(first.modified_at, first.created_at);

    assert_eq!(f.tags.names("bob").await, vec!["real".to_string()]);
}

#[tokio::test]
async fn test_import_stops_at_first_failing_entry() {
    let f = fixture();
    let bundle = f.work.join("partial.tar");
    let envelope = serde_json::json!({
        "things": [
            { "content": "one", "createdAt": 1 },
            { "content": "two", "createdAt": "yesterday" },
            { "content": "three", "createdAt": 3 }
        ]
    });
    write_bundle(
        &bundle,
        &[("things.json", envelope.to_string().as_bytes())],
    );

    let err = f.exchange.import("bob", &bundle).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // Entries before the failure are kept.
    let notes = f.notes.get_all_lean("bob").await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "one");
    assert!(!bundle.exists());
}

#[tokio::test]
async fn test_import_stops_on_tag_index_failure() {
    let f = fixture();
    f.tags.fail_on("broken").await;
    let bundle = f.work.join("tags.tar");
    let envelope = serde_json::json!({
        "things": [
            { "content": "#fine", "createdAt": 1 },
            { "content": "#broken", "createdAt": 2 },
            { "content": "#never", "createdAt": 3 }
        ]
    });
    write_bundle(
        &bundle,
        &[("things.json", envelope.to_string().as_bytes())],
    );

    let err = f.exchange.import("bob", &bundle).await.unwrap_err();
    assert!(matches!(err, Error::Upstream(_)));
    assert_eq!(f.notes.count("bob").await, 1);
    assert_eq!(f.tags.names("bob").await, vec!["fine".to_string()]);
}

#[tokio::test]
async fn test_import_accepts_gzip_bundle() {
    let f = fixture();
    let bundle = f.work.join("bundle.tar.gz");

    let encoder = GzEncoder::new(File::create(&bundle).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let envelope = br##"{"things":[{"content":"#zipped","createdAt":5}]}"##;
    let mut header = tar::Header::new_gnu();
    header.set_size(envelope.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "things.json", &envelope[..])
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap();

    let summary = f.exchange.import("bob", &bundle).await.unwrap();
    assert_eq!(summary.note_ids.len(), 1);
    assert_eq!(f.tags.names("bob").await, vec!["zipped".to_string()]);
}

#[tokio::test]
async fn test_import_skips_unsafe_entry_paths() {
    let f = fixture();
    let bundle = f.work.join("unsafe.tar");

    // tar::Builder refuses `..` in names, so write the raw header bytes.
    let mut builder = tar::Builder::new(File::create(&bundle).unwrap());
    let data = b"escape";
    let mut header = tar::Header::new_old();
    {
        let name = b"attachments/../../escape";
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
    }
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append(&header, &data[..]).unwrap();

    let envelope = br#"{"things":[]}"#;
    let mut header = tar::Header::new_gnu();
    header.set_size(envelope.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "things.json", &envelope[..])
        .unwrap();
    builder.into_inner().unwrap().flush().unwrap();

    let summary = f.exchange.import("bob", &bundle).await.unwrap();
    assert!(summary.note_ids.is_empty());
    assert_eq!(summary.attachments, 0);
    assert!(!f.work.join("escape").exists());
}

#[tokio::test]
async fn test_import_rejects_unsafe_user_id() {
    let f = fixture();
    let bundle = f.work.join("ok.tar");
    write_bundle(&bundle, &[("things.json", br#"{"things":[]}"#)]);

    let err = f.exchange.import("../bob", &bundle).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(!bundle.exists());
}

#[tokio::test]
async fn test_inspect_bundle_reports_contents() {
    let f = fixture();
    let bundle = f.work.join("inspect.tar");
    let envelope = serde_json::json!({
        "things": [
            {
                "content": "#b http://x.com/#notatag #a",
                "attachments": [
                    { "fileName": "x.png", "identifier": "present", "type": "image" },
                    { "fileName": "y.txt", "identifier": "missing", "type": "unknown" }
                ]
            },
            { "content": "#a again" },
            { "noContent": true }
        ]
    });
    write_bundle(
        &bundle,
        &[
            ("things.json", envelope.to_string().as_bytes()),
            ("attachments/present", b"x"),
        ],
    );

    let report = inspect_bundle(&bundle).await.unwrap();
    assert_eq!(report.notes, 2);
    assert_eq!(report.invalid_entries, 1);
    assert_eq!(report.tags, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(
        report.attachments,
        vec!["missing".to_string(), "present".to_string()]
    );
    assert_eq!(report.missing_attachments, vec!["missing".to_string()]);

    // Inspection never consumes the bundle.
    assert!(bundle.exists());
}
