//! Durable storage for extracted attachments.
//!
//! The store owns the download directory: it validates the directory up
//! front (created if missing, probed for writability, both fail closed) and
//! writes one file per attachment. An attachment without a filename gets a
//! synthesized `<subjectSlug>_<timestamp>` name with second-granularity
//! timestamps; filenames from the wire are reduced to their final path
//! component so a hostile `../../name` cannot escape the directory.

use crate::error::{Error, Result};
use crate::extract::Attachment;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fallback slug when a message carries no subject.
const NO_SUBJECT: &str = "NoSubject";

/// Name of the probe file used to verify the directory is writable.
const WRITE_PROBE: &str = ".write_test";

/// Validated persistence sink rooted at the download directory.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    dir: PathBuf,
}

impl AttachmentStore {
    /// Opens the store, creating the directory when missing and probing it
    /// for writability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutputDir`] when the directory cannot be created or
    /// written to. This is a fatal, run-level failure: nothing can be
    /// persisted.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| Error::OutputDir {
                path: dir.clone(),
                source,
            })?;

        let probe = dir.join(WRITE_PROBE);
        tokio::fs::write(&probe, b"ok")
            .await
            .map_err(|source| Error::OutputDir {
                path: dir.clone(),
                source,
            })?;
        tokio::fs::remove_file(&probe)
            .await
            .map_err(|source| Error::OutputDir {
                path: dir.clone(),
                source,
            })?;

        debug!(dir = %dir.display(), "Validated download directory");

        Ok(Self { dir })
    }

    /// Returns the directory this store writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes one attachment and returns the path it was saved under.
    ///
    /// `subject_hint` feeds the synthesized name when the attachment has no
    /// filename of its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SaveAttachment`] on write failure; scoped to this
    /// attachment, the caller decides whether to continue.
    pub async fn save(&self, attachment: &Attachment, subject_hint: Option<&str>) -> Result<PathBuf> {
        let filename = match attachment.filename.as_deref().map(sanitize_filename) {
            Some(name) if !name.is_empty() => name,
            _ => synthesize_name(subject_hint, Utc::now()),
        };

        let path = self.dir.join(filename);

        tokio::fs::write(&path, &attachment.payload)
            .await
            .map_err(|source| Error::SaveAttachment {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), bytes = attachment.payload.len(), "Saved attachment");

        Ok(path)
    }
}

/// Reduces a wire-supplied filename to a safe single path component.
fn sanitize_filename(raw: &str) -> String {
    let final_component = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw);

    final_component
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Builds the fallback name `<subjectSlug>_<timestamp>`.
fn synthesize_name(subject_hint: Option<&str>, now: DateTime<Utc>) -> String {
    let slug = subject_slug(subject_hint);
    format!("{}_{}", slug, now.format("%Y%m%d_%H%M%S"))
}

/// Turns a decoded subject into a filesystem-friendly slug.
///
/// Whitespace becomes `_`, path-hostile characters are dropped, and overly
/// long subjects are truncated. Messages without a subject slug to
/// `NoSubject`.
fn subject_slug(subject: Option<&str>) -> String {
    let Some(subject) = subject else {
        return NO_SUBJECT.to_string();
    };

    let mut slug: String = subject
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    slug.truncate(80);

    if slug.is_empty() {
        NO_SUBJECT.to_string()
    } else {
        slug
    }
}
