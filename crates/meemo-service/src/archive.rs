//! Bulk export and import of a user's notes as a tar bundle.
//!
//! A bundle holds one JSON envelope at [`ENVELOPE_FILE_NAME`] and one
//! entry per attachment file under [`ATTACHMENT_PREFIX`]. Export writes
//! plain tar; import and inspection also accept gzip-compressed tar.
//!
//! Import is staged through a scratch workspace. Attachments are unpacked
//! there first and only moved into the user's attachment directory once
//! the envelope has been validated. The scratch directory and the uploaded
//! bundle are removed when the workspace is dropped, whatever the outcome.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use flate2::read::GzDecoder;
use serde::Serialize;
use tar::{Archive, Builder, Header};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use meemo_core::defaults::{ATTACHMENT_PREFIX, ENVELOPE_FILE_NAME};
use meemo_core::{
    extract_unique_tags, now_millis, parse_envelope, ArchiveEnvelope, Error, ImportedThing,
    NewNote, NoteStore, Result, TagIndex,
};
use meemo_db::{validate_segment, AttachmentStore};

use crate::config::ServiceConfig;
use crate::notes::upsert_tags;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub notes: usize,
    pub attachments: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Ids of the created notes, in envelope order.
    pub note_ids: Vec<Uuid>,
    pub attachments: usize,
}

/// What a bundle contains, read without importing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleReport {
    pub notes: usize,
    /// Envelope entries that would fail to import.
    pub invalid_entries: usize,
    /// Tags re-extracted from note content, sorted.
    pub tags: Vec<String>,
    /// Attachment identifiers referenced by notes, sorted.
    pub attachments: Vec<String>,
    /// Referenced attachments with no file in the bundle, sorted.
    pub missing_attachments: Vec<String>,
}

pub struct ArchiveExchange {
    notes: Arc<dyn NoteStore>,
    tags: Arc<dyn TagIndex>,
    attachments: AttachmentStore,
    scratch_dir: Option<PathBuf>,
}

impl ArchiveExchange {
    pub fn new(
        notes: Arc<dyn NoteStore>,
        tags: Arc<dyn TagIndex>,
        attachments: AttachmentStore,
    ) -> Self {
        Self {
            notes,
            tags,
            attachments,
            scratch_dir: None,
        }
    }

    /// Attachments live under `config.attachment_dir`; import workspaces
    /// go to `config.scratch_dir` when set.
    pub fn from_config(
        notes: Arc<dyn NoteStore>,
        tags: Arc<dyn TagIndex>,
        config: &ServiceConfig,
    ) -> Self {
        let exchange = Self::new(notes, tags, AttachmentStore::new(config.attachment_dir.clone()));
        match config.scratch_dir {
            Some(ref dir) => exchange.with_scratch_dir(dir.clone()),
            None => exchange,
        }
    }

    /// Create import workspaces under `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Write every note of `user_id` and its attachment directory to a
    /// plain tar bundle at `dest`.
    #[instrument(skip(self, dest), fields(subsystem = "archive", op = "export"))]
    pub async fn export(&self, user_id: &str, dest: &Path) -> Result<ExportSummary> {
        let start = Instant::now();
        let notes = self.notes.get_all_lean(user_id).await?;
        let envelope = serde_json::to_vec_pretty(&ArchiveEnvelope::from_notes(&notes))?;
        let user_dir = self.attachments.user_dir(user_id)?;
        let dest = dest.to_path_buf();

        let attachments = tokio::task::spawn_blocking(move || {
            pack_bundle(&dest, &envelope, Some(&user_dir), false)
        })
        .await
        .map_err(|e| Error::Internal(format!("export task failed: {}", e)))??;

        info!(
            user_id,
            notes = notes.len(),
            attachments,
            duration_ms = start.elapsed().as_millis() as u64,
            "Export complete"
        );
        Ok(ExportSummary {
            notes: notes.len(),
            attachments,
        })
    }

    /// Import an uploaded bundle into `user_id`'s corpus.
    ///
    /// Tags are always re-extracted from content. Entries are processed in
    /// order and the first failing entry stops the import; notes created
    /// before it are kept. The uploaded file is deleted in every case.
    #[instrument(skip(self, upload), fields(subsystem = "archive", op = "import"))]
    pub async fn import(&self, user_id: &str, upload: &Path) -> Result<ImportSummary> {
        let start = Instant::now();
        let workspace = ImportWorkspace::new(self.scratch_dir.as_deref(), upload)?;
        validate_segment(user_id, "user id")?;

        let staged = workspace.attachments_dir();
        let unpacked = unpack_in_background(upload.to_path_buf(), Some(staged.clone())).await?;

        let envelope = unpacked.envelope.ok_or_else(|| {
            Error::InvalidArchive(format!("bundle has no {}", ENVELOPE_FILE_NAME))
        })?;
        let things = parse_envelope(&envelope)?;

        for identifier in &unpacked.attachments {
            self.attachments
                .adopt(user_id, &staged.join(identifier), identifier)
                .await?;
        }

        let now = now_millis();
        let mut note_ids = Vec::with_capacity(things.len());
        for (index, value) in things.into_iter().enumerate() {
            let note_id = self.import_thing(user_id, value, now).await.map_err(|e| {
                warn!(user_id, index, error = %e, "Import stopped at failing entry");
                e
            })?;
            note_ids.push(note_id);
        }

        info!(
            user_id,
            result_count = note_ids.len(),
            attachments = unpacked.attachments.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Import complete"
        );
        Ok(ImportSummary {
            note_ids,
            attachments: unpacked.attachments.len(),
        })
    }

    async fn import_thing(&self, user_id: &str, value: serde_json::Value, now: i64) -> Result<Uuid> {
        let thing = ImportedThing::from_value(value)?;
        let (created_at, modified_at) = thing.timestamps(now)?;
        let tags = extract_unique_tags(&thing.content);

        upsert_tags(self.tags.as_ref(), user_id, &tags).await?;

        self.notes
            .add_full(
                user_id,
                NewNote {
                    content: thing.content,
                    tags,
                    attachments: thing.attachments.unwrap_or_default(),
                    external_content: thing.external_content.unwrap_or_default(),
                },
                created_at,
                modified_at,
            )
            .await
    }
}

/// Read a bundle without importing or deleting it.
pub async fn inspect_bundle(bundle: &Path) -> Result<BundleReport> {
    let unpacked = unpack_in_background(bundle.to_path_buf(), None).await?;
    let envelope = unpacked
        .envelope
        .ok_or_else(|| Error::InvalidArchive(format!("bundle has no {}", ENVELOPE_FILE_NAME)))?;

    let mut notes = 0;
    let mut invalid_entries = 0;
    let mut tags = BTreeSet::new();
    let mut referenced = BTreeSet::new();

    for value in parse_envelope(&envelope)? {
        match ImportedThing::from_value(value) {
            Ok(thing) => {
                notes += 1;
                tags.extend(extract_unique_tags(&thing.content));
                referenced.extend(
                    thing
                        .attachments
                        .unwrap_or_default()
                        .into_iter()
                        .map(|a| a.identifier),
                );
            }
            Err(e) => {
                debug!(error = %e, "Invalid bundle entry");
                invalid_entries += 1;
            }
        }
    }

    let present: BTreeSet<&String> = unpacked.attachments.iter().collect();
    let missing_attachments = referenced
        .iter()
        .filter(|id| !present.contains(id))
        .cloned()
        .collect();

    Ok(BundleReport {
        notes,
        invalid_entries,
        tags: tags.into_iter().collect(),
        attachments: referenced.into_iter().collect(),
        missing_attachments,
    })
}

// =============================================================================
// IMPORT WORKSPACE
// =============================================================================

/// Scratch space for one import. Dropping it removes the scratch directory
/// and the uploaded bundle.
struct ImportWorkspace {
    upload: PathBuf,
    scratch: TempDir,
}

impl ImportWorkspace {
    fn new(scratch_root: Option<&Path>, upload: &Path) -> Result<Self> {
        let upload = upload.to_path_buf();
        match create_scratch(scratch_root) {
            Ok(scratch) => Ok(Self { upload, scratch }),
            Err(e) => {
                remove_upload(&upload);
                Err(e)
            }
        }
    }

    fn attachments_dir(&self) -> PathBuf {
        self.scratch.path().join("attachments")
    }
}

impl Drop for ImportWorkspace {
    fn drop(&mut self) {
        remove_upload(&self.upload);
        debug!(scratch = %self.scratch.path().display(), "Removing import workspace");
    }
}

fn create_scratch(root: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("meemo-import-");
    let scratch = match root {
        Some(root) => {
            std::fs::create_dir_all(root)?;
            builder.tempdir_in(root)?
        }
        None => builder.tempdir()?,
    };
    Ok(scratch)
}

fn remove_upload(upload: &Path) {
    if let Err(e) = std::fs::remove_file(upload) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %upload.display(), error = %e, "Failed to remove uploaded bundle");
        }
    }
}

// =============================================================================
// TAR HELPERS
// =============================================================================

#[derive(Debug, Default)]
pub(crate) struct UnpackedBundle {
    pub envelope: Option<Vec<u8>>,
    /// Attachment identifiers present in the bundle, in entry order.
    pub attachments: Vec<String>,
}

async fn unpack_in_background(
    bundle: PathBuf,
    attachments_out: Option<PathBuf>,
) -> Result<UnpackedBundle> {
    tokio::task::spawn_blocking(move || unpack_bundle(&bundle, attachments_out.as_deref()))
        .await
        .map_err(|e| Error::Internal(format!("unpack task failed: {}", e)))?
}

/// Read a plain or gzip-compressed bundle.
///
/// Attachment entries are written to `attachments_out` when given, with
/// the `attachments/` prefix stripped. Entries with unsafe paths and
/// entries outside the bundle layout are skipped.
pub(crate) fn unpack_bundle(bundle: &Path, attachments_out: Option<&Path>) -> Result<UnpackedBundle> {
    let mut file = File::open(bundle)?;
    let mut magic = [0u8; 2];
    let gzipped = file.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC;
    file.seek(SeekFrom::Start(0))?;

    let reader: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut archive = Archive::new(reader);

    if let Some(dir) = attachments_out {
        std::fs::create_dir_all(dir)?;
    }

    let attachment_dir_name = ATTACHMENT_PREFIX.trim_end_matches('/');
    let mut unpacked = UnpackedBundle::default();

    for entry in archive.entries().map_err(unreadable)? {
        let mut entry = entry.map_err(unreadable)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path().map_err(unreadable)?.into_owned();
        let Some(parts) = plain_components(&path) else {
            warn!(entry = %path.display(), "Skipping bundle entry with unsafe path");
            continue;
        };

        match parts.as_slice() {
            [name] if name == ENVELOPE_FILE_NAME => {
                let mut data = Vec::new();
                entry.read_to_end(&mut data).map_err(unreadable)?;
                unpacked.envelope = Some(data);
            }
            [dir, name] if dir == attachment_dir_name => {
                if let Some(out) = attachments_out {
                    entry.unpack(out.join(name)).map_err(unreadable)?;
                }
                unpacked.attachments.push(name.clone());
            }
            _ => debug!(entry = %path.display(), "Skipping unrecognized bundle entry"),
        }
    }

    Ok(unpacked)
}

/// Write a bundle holding `envelope` and every regular file directly in
/// `attachment_dir`.
///
/// With `skip_unreadable`, an attachment that cannot be read is logged and
/// left out instead of failing the bundle. Returns the number of
/// attachments packed.
pub(crate) fn pack_bundle(
    dest: &Path,
    envelope: &[u8],
    attachment_dir: Option<&Path>,
    skip_unreadable: bool,
) -> Result<usize> {
    let mut builder = Builder::new(File::create(dest)?);

    let mut header = Header::new_gnu();
    header.set_size(envelope.len() as u64);
    header.set_mode(0o644);
    header.set_mtime((now_millis() / 1000).max(0) as u64);
    header.set_cksum();
    builder.append_data(&mut header, ENVELOPE_FILE_NAME, envelope)?;

    let mut packed = 0;
    if let Some(dir) = attachment_dir {
        for (name, path) in attachment_files(dir)? {
            let entry_name = format!("{}{}", ATTACHMENT_PREFIX, name);
            match builder.append_path_with_name(&path, &entry_name) {
                Ok(()) => packed += 1,
                Err(e) if skip_unreadable => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable attachment");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    builder.into_inner()?.sync_all()?;
    Ok(packed)
}

/// Regular files directly inside `dir`, sorted by name. A missing
/// directory has no files.
fn attachment_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            files.push((name.to_string(), entry.path()));
        }
    }
    files.sort();
    Ok(files)
}

/// The normal components of `path`, or `None` if it climbs out of or is
/// anchored outside the extraction root.
fn plain_components(path: &Path) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts)
}

fn unreadable(e: std::io::Error) -> Error {
    Error::InvalidArchive(format!("failed to read bundle: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_plain_components() {
        assert_eq!(
            plain_components(Path::new("./attachments/abc")),
            Some(vec!["attachments".to_string(), "abc".to_string()])
        );
        assert_eq!(plain_components(Path::new("../etc/passwd")), None);
        assert_eq!(plain_components(Path::new("/etc/passwd")), None);
    }

    #[test]
    fn test_pack_then_unpack() {
        let dir = TempDir::new().unwrap();
        let files = dir.path().join("files");
        std::fs::create_dir_all(&files).unwrap();
        std::fs::write(files.join("abc"), b"png bytes").unwrap();

        let bundle = dir.path().join("bundle.tar");
        let packed = pack_bundle(&bundle, br#"{"things":[]}"#, Some(&files), false).unwrap();
        assert_eq!(packed, 1);

        let out = dir.path().join("out");
        let unpacked = unpack_bundle(&bundle, Some(&out)).unwrap();
        assert_eq!(unpacked.envelope.as_deref(), Some(&br#"{"things":[]}"#[..]));
        assert_eq!(unpacked.attachments, vec!["abc".to_string()]);
        assert_eq!(std::fs::read(out.join("abc")).unwrap(), b"png bytes");
    }

    #[test]
    fn test_unpack_gzip_bundle() {
        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("bundle.tar.gz");

        let encoder = flate2::write::GzEncoder::new(
            File::create(&bundle).unwrap(),
            flate2::Compression::default(),
        );
        let mut builder = Builder::new(encoder);
        let data = br#"{"things":[{"content":"hi"}]}"#;
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "things.json", &data[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap().flush().unwrap();

        let unpacked = unpack_bundle(&bundle, None).unwrap();
        assert_eq!(unpacked.envelope.as_deref(), Some(&data[..]));
    }

    #[test]
    fn test_unpack_garbage_is_invalid_archive() {
        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("bundle.tar");
        std::fs::write(&bundle, vec![7u8; 1024]).unwrap();

        let err = unpack_bundle(&bundle, None).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_missing_attachment_dir_packs_envelope_only() {
        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("bundle.tar");
        let packed =
            pack_bundle(&bundle, b"{}", Some(&dir.path().join("nope")), false).unwrap();
        assert_eq!(packed, 0);
    }
}
