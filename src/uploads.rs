//! Storage for files attached to a request.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use finrouter_common::ArtifactKind;

use crate::capabilities::Artifacts;

/// Writes uploaded files into a single directory under unique names.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one file as `{uuid}-{filename}` and return its path.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create uploads directory: {}", self.dir.display()))?;
        let path = self
            .dir
            .join(format!("{}-{}", uuid::Uuid::new_v4(), sanitize_filename(filename)));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload: {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Stored upload");
        Ok(path)
    }

    /// Save a file and slot it into `artifacts`. A later file of the same
    /// kind replaces an earlier one.
    pub async fn attach(
        &self,
        artifacts: &mut Artifacts,
        filename: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<ArtifactKind> {
        let kind = classify(filename, content_type);
        let stored_name = match kind {
            ArtifactKind::Image => image_file_name(filename, content_type),
            ArtifactKind::Document => filename.to_string(),
        };
        let path = self.save(&stored_name, bytes).await?;
        match kind {
            ArtifactKind::Image => artifacts.image = Some(path),
            ArtifactKind::Document => artifacts.document = Some(path),
        }
        Ok(kind)
    }
}

/// Content types mentioning `image` are images. Without a content type the
/// extension decides; everything else is a document.
pub fn classify(filename: &str, content_type: Option<&str>) -> ArtifactKind {
    let is_image = match content_type.filter(|ct| !ct.is_empty()) {
        Some(ct) => ct.contains("image"),
        None => mime_guess::from_path(filename)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE),
    };
    if is_image {
        ArtifactKind::Image
    } else {
        ArtifactKind::Document
    }
}

/// Image readers infer the media type from the path, so an image whose name
/// carries no image extension gets one derived from its content type.
fn image_file_name(filename: &str, content_type: Option<&str>) -> String {
    let has_image_ext = mime_guess::from_path(filename)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE);
    if has_image_ext {
        return filename.to_string();
    }
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let Some(exts) = mime_guess::get_mime_extensions_str(&essence) else {
        return filename.to_string();
    };
    // Prefer an extension that maps back to the same type.
    let ext = exts
        .iter()
        .find(|ext| {
            mime_guess::from_ext(ext)
                .first()
                .is_some_and(|mime| mime.essence_str() == essence)
        })
        .or_else(|| exts.first());
    match ext {
        Some(ext) => format!("{}.{}", filename, ext),
        None => filename.to_string(),
    }
}

/// Keep only the final path component and drop characters that are awkward
/// in file names.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_content_type() {
        assert_eq!(classify("x.bin", Some("image/png")), ArtifactKind::Image);
        assert_eq!(classify("photo.png", Some("application/pdf")), ArtifactKind::Document);
        assert_eq!(classify("a.txt", Some("text/plain")), ArtifactKind::Document);
    }

    #[test]
    fn test_classify_guesses_without_content_type() {
        assert_eq!(classify("chart.jpeg", None), ArtifactKind::Image);
        assert_eq!(classify("report.txt", Some("")), ArtifactKind::Document);
        assert_eq!(classify("noext", None), ArtifactKind::Document);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\docs\\q3 report.txt"), "q3_report.txt");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[tokio::test]
    async fn test_save_uses_unique_prefixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));
        let a = store.save("report.txt", b"one").await.unwrap();
        let b = store.save("report.txt", b"two").await.unwrap();
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("-report.txt"));
        assert_eq!(name.len(), 36 + 1 + "report.txt".len());
        assert_eq!(std::fs::read(&b).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_attach_fills_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let mut artifacts = Artifacts::default();
        let kind = store
            .attach(&mut artifacts, "chart.png", Some("image/png"), b"png")
            .await
            .unwrap();
        assert_eq!(kind, ArtifactKind::Image);
        store
            .attach(&mut artifacts, "notes.txt", Some("text/plain"), b"notes")
            .await
            .unwrap();
        assert!(artifacts.image.is_some());
        assert!(artifacts.document.as_ref().unwrap().starts_with(dir.path()));
    }

    #[test]
    fn test_image_file_name_adds_extension_from_content_type() {
        assert_eq!(image_file_name("blob", Some("image/png")), "blob.png");
        assert_eq!(image_file_name("scan.bin", Some("image/png; q=1")), "scan.bin.png");
        assert_eq!(image_file_name("chart.jpg", Some("image/png")), "chart.jpg");
        assert_eq!(image_file_name("blob", Some("image")), "blob");
    }

    #[tokio::test]
    async fn test_attach_extensionless_image_is_readable_as_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let mut artifacts = Artifacts::default();
        let kind = store
            .attach(&mut artifacts, "blob", Some("image/png"), b"png")
            .await
            .unwrap();
        assert_eq!(kind, ArtifactKind::Image);

        let image = artifacts.image.unwrap();
        assert!(image.to_string_lossy().ends_with("-blob.png"));
        let guessed = mime_guess::from_path(&image).first().unwrap();
        assert_eq!(guessed.essence_str(), "image/png");
    }

    #[tokio::test]
    async fn test_attach_document_keeps_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        let mut artifacts = Artifacts::default();
        store
            .attach(&mut artifacts, "notes", Some("text/plain"), b"notes")
            .await
            .unwrap();
        assert!(artifacts.document.unwrap().to_string_lossy().ends_with("-notes"));
    }
}
