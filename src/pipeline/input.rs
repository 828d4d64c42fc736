//! Input resolution: turn a user-supplied path or URL into a local PDF file.
//!
//! URLs (arXiv links are the common case) are downloaded into a `TempDir`
//! that lives as long as the returned [`ResolvedInput`], so pdfium gets a
//! real file path and cleanup happens on drop. Local files are checked for
//! existence, read permission and the `%PDF` magic bytes before any PDF
//! library sees them.

use crate::error::InputError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// pdfium accepts a header preceded by junk, as long as it starts within
/// the first KiB.
const HEADER_SEARCH_BYTES: usize = 1024;

/// True when `%PDF` starts within the first [`HEADER_SEARCH_BYTES`].
fn has_pdf_header(bytes: &[u8]) -> bool {
    let span = HEADER_SEARCH_BYTES + PDF_MAGIC.len() - 1;
    let head = &bytes[..bytes.len().min(span)];
    head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

/// The first four bytes, zero-padded, for error messages.
fn leading_bytes(bytes: &[u8]) -> [u8; 4] {
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    magic
}

/// The resolved input — either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the `TempDir` keeps the download alive.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the PDF regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, InputError> {
    if input.trim().is_empty() {
        return Err(InputError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

/// Validate a local file: exists, readable, `%PDF` header in the first KiB.
pub fn resolve_local(path: &Path) -> Result<ResolvedInput, InputError> {
    let path = path.to_path_buf();
    if !path.is_file() {
        return Err(InputError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(InputError::PermissionDenied { path });
        }
        Err(_) => return Err(InputError::FileNotFound { path }),
    };

    let span = HEADER_SEARCH_BYTES + PDF_MAGIC.len() - 1;
    let mut head = Vec::with_capacity(span);
    if let Err(e) = (&mut file)
        .take(span as u64)
        .read_to_end(&mut head)
    {
        return Err(InputError::Internal(format!(
            "Failed to read '{}': {}",
            path.display(),
            e
        )));
    }
    if !has_pdf_header(&head) {
        let magic = leading_bytes(&head);
        return Err(InputError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL into a temporary directory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, InputError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| InputError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            InputError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            InputError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(InputError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| InputError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let temp_dir = TempDir::new().map_err(|e| InputError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url));

    if !has_pdf_header(&bytes) {
        return Err(InputError::NotAPdf {
            path: file_path,
            magic: leading_bytes(&bytes),
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| InputError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
///
/// arXiv serves `/pdf/1706.03762` without an extension; those get `.pdf`
/// appended so the temp file is recognisable in logs.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty())
        .map(|last| {
            if last.to_ascii_lowercase().ends_with(".pdf") {
                last
            } else {
                format!("{last}.pdf")
            }
        })
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://arxiv.org/pdf/1706.03762"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("paper.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_variants() {
        assert_eq!(
            filename_from_url("https://example.com/papers/attention.pdf"),
            "attention.pdf"
        );
        assert_eq!(
            filename_from_url("https://arxiv.org/pdf/1706.03762"),
            "1706.03762.pdf"
        );
        assert_eq!(filename_from_url("https://example.com/"), "downloaded.pdf");
    }

    #[test]
    fn local_missing_file_is_not_found() {
        let err = resolve_local(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, InputError::FileNotFound { .. }), "got {err:?}");
    }

    #[test]
    fn local_non_pdf_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let err = resolve_local(f.path()).unwrap_err();
        match err {
            InputError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn local_truncated_file_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        assert!(matches!(
            resolve_local(f.path()),
            Err(InputError::NotAPdf { .. })
        ));
    }

    #[test]
    fn local_pdf_header_is_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.4\n").unwrap();
        let resolved = resolve_local(f.path()).expect("valid header");
        assert_eq!(resolved.path(), f.path());
    }

    #[test]
    fn header_after_leading_junk_is_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"\xEF\xBB\xBF\r\n%PDF-1.7\n").unwrap();
        assert!(resolve_local(f.path()).is_ok());
    }

    #[test]
    fn header_beyond_first_kib_is_rejected() {
        let mut bytes = vec![b' '; HEADER_SEARCH_BYTES];
        bytes.extend_from_slice(b"%PDF-1.4\n");
        assert!(!has_pdf_header(&bytes));
        assert!(has_pdf_header(&bytes[1..]));
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        assert!(matches!(
            resolve_input("  ", 5).await,
            Err(InputError::InvalidInput { .. })
        ));
    }
}
