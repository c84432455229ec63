//! Receiving uploaded documents.
//!
//! Every upload gets its own temporary directory. The uploaded file and the
//! CSV we derive from it both live there, and the whole directory is removed
//! when the [`Upload`] is dropped, whether or not processing succeeded.

use tempfile::TempDir;

use crate::prelude::*;

/// File name used when the client doesn't send a usable one.
const FALLBACK_FILE_NAME: &str = "upload.pdf";

/// Prefix for our per-request directories.
const REQUEST_DIR_PREFIX: &str = "pdf-ocr-csv-";

/// An uploaded document, stored on disk for the lifetime of one request.
#[derive(Debug)]
pub struct Upload {
    /// The request directory. Deleted on drop.
    dir: TempDir,

    /// Where we stored the uploaded bytes.
    path: PathBuf,

    /// The trimmed page range, if any.
    page_range: Option<String>,
}

impl Upload {
    /// Store an upload in a fresh directory under `scratch_root` (or the
    /// system temporary directory).
    #[instrument(level = "debug", skip(bytes, page_range), fields(bytes = bytes.len()))]
    pub async fn receive(
        scratch_root: Option<&Path>,
        file_name: Option<&str>,
        bytes: &[u8],
        page_range: Option<&str>,
    ) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(REQUEST_DIR_PREFIX);
        let dir = match scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .context("Failed to create request directory")?;

        let path = dir.path().join(sanitize_file_name(file_name));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload to {:?}", path))?;
        debug!(path = %path.display(), "Stored upload");

        Ok(Self {
            dir,
            path,
            page_range: normalize_page_range(page_range),
        })
    }

    /// Path of the stored upload.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The request directory, which also receives our output.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// The page range to analyze, or `None` for the whole document.
    pub fn page_range(&self) -> Option<&str> {
        self.page_range.as_deref()
    }
}

/// Trim a page range, treating blank input as "all pages".
///
/// The range itself is not validated; the analysis service does that.
pub fn normalize_page_range(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|range| !range.is_empty())
        .map(str::to_owned)
}

/// Keep only the last component of a client-supplied file name, so it can't
/// point outside the request directory.
fn sanitize_file_name(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_page_ranges_mean_all_pages() {
        assert_eq!(normalize_page_range(None), None);
        assert_eq!(normalize_page_range(Some("")), None);
        assert_eq!(normalize_page_range(Some("   \t")), None);
        assert_eq!(normalize_page_range(Some(" 1-3 ")), Some("1-3".to_owned()));
        assert_eq!(normalize_page_range(Some("2,4")), Some("2,4".to_owned()));
    }

    #[test]
    fn file_names_are_reduced_to_their_last_component() {
        assert_eq!(sanitize_file_name(Some("doc.pdf")), "doc.pdf");
        assert_eq!(sanitize_file_name(Some("../../etc/passwd")), "passwd");
        assert_eq!(sanitize_file_name(Some("C:\\Users\\me\\scan.pdf")), "scan.pdf");
        assert_eq!(sanitize_file_name(Some("dir/")), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_file_name(Some("..")), FALLBACK_FILE_NAME);
        assert_eq!(sanitize_file_name(None), FALLBACK_FILE_NAME);
    }

    #[tokio::test]
    async fn receive_writes_bytes_and_cleans_up_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let upload = Upload::receive(Some(root.path()), Some("doc.pdf"), b"%PDF", Some(" "))
            .await
            .unwrap();

        assert_eq!(upload.path().file_name().unwrap(), "doc.pdf");
        assert!(upload.path().starts_with(root.path()));
        assert_eq!(std::fs::read(upload.path()).unwrap(), b"%PDF");
        assert_eq!(upload.page_range(), None);

        let dir = upload.dir().to_owned();
        drop(upload);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn identical_file_names_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let first = Upload::receive(Some(root.path()), Some("doc.pdf"), b"one", None)
            .await
            .unwrap();
        let second = Upload::receive(Some(root.path()), Some("doc.pdf"), b"two", None)
            .await
            .unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"one");
        assert_eq!(std::fs::read(second.path()).unwrap(), b"two");
    }

    #[tokio::test]
    async fn missing_scratch_root_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("missing");
        assert!(
            Upload::receive(Some(&missing), Some("doc.pdf"), b"%PDF", None)
                .await
                .is_err()
        );
    }
}
