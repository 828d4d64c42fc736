//! PDF text extraction: per-page text → one normalised [`DocumentText`].
//!
//! The PDF library sits behind [`PdfTextBackend`] so the normalisation and
//! failure policy here can be exercised without a native pdfium build. The
//! default backend, [`PdfiumBackend`], runs inside `spawn_blocking` because
//! pdfium is not async-safe.
//!
//! Failure policy: any backend error is logged and reported as *absence*
//! (`None`). No partial text is ever returned, and extraction is not retried;
//! a corrupt PDF does not get better on the second read.

use crate::error::ExtractError;
use pdfium_render::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Environment variable naming an explicit pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Source of per-page text for a PDF file.
pub trait PdfTextBackend: Send + Sync {
    /// Text of every page, in page order.
    fn page_texts(&self, path: &Path, password: Option<&str>) -> Result<Vec<String>, ExtractError>;
}

/// Whitespace-normalised paper text.
///
/// Only [`DocumentText::from_pages`] / [`DocumentText::normalize`] create
/// one, so every value holds: non-empty, no leading/trailing whitespace,
/// words separated by exactly one ASCII space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentText {
    text: String,
    page_count: usize,
}

impl DocumentText {
    /// Collapse every whitespace run to one space and trim.
    ///
    /// Returns `None` when nothing but whitespace remains.
    pub fn normalize(raw: &str) -> Option<Self> {
        Self::from_pages(std::iter::once(raw))
    }

    /// Concatenate page texts in order, then normalise.
    ///
    /// Pages are joined without a separator, like reading the text layer
    /// straight through; page text normally ends in a newline, so words do
    /// not fuse across the boundary.
    pub fn from_pages<I, S>(pages: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::new();
        let mut page_count = 0;
        for page in pages {
            joined.push_str(page.as_ref());
            page_count += 1;
        }
        let text = joined.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            None
        } else {
            Some(Self { text, page_count })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters (not bytes); the unit all thresholds use.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Number of pages the text was assembled from.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl AsRef<str> for DocumentText {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for DocumentText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Extracts normalised text from a PDF through a [`PdfTextBackend`].
#[derive(Clone)]
pub struct TextExtractor {
    backend: Arc<dyn PdfTextBackend>,
    password: Option<String>,
}

impl TextExtractor {
    pub fn new(backend: Arc<dyn PdfTextBackend>) -> Self {
        Self {
            backend,
            password: None,
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Extract and normalise the text of `pdf_path`.
    ///
    /// Returns `None` when the file cannot be read, has no pages, or has no
    /// extractable text. Errors are logged here; callers only see absence.
    pub async fn extract(&self, pdf_path: &Path) -> Option<DocumentText> {
        info!("Opening PDF: {}", pdf_path.display());
        let backend = Arc::clone(&self.backend);
        let path = pdf_path.to_path_buf();
        let password = self.password.clone();

        let joined = tokio::task::spawn_blocking(move || {
            backend.page_texts(&path, password.as_deref())
        })
        .await
        .map_err(|e| ExtractError::Internal(format!("Extraction task panicked: {}", e)))
        .and_then(|r| r);

        let pages = match joined {
            Ok(pages) => pages,
            Err(e) => {
                error!("Error processing PDF {}: {}", pdf_path.display(), e);
                return None;
            }
        };

        let raw_chars: usize = pages.iter().map(|p| p.chars().count()).sum();
        info!(
            "Extracted {} raw characters from {} pages",
            raw_chars,
            pages.len()
        );

        match DocumentText::from_pages(&pages) {
            Some(text) => {
                debug!("Normalised to {} characters", text.char_count());
                Some(text)
            }
            None => {
                warn!(
                    "No extractable text in {} ({} pages)",
                    pdf_path.display(),
                    pages.len()
                );
                None
            }
        }
    }
}

/// pdfium-backed [`PdfTextBackend`].
///
/// The library is bound per call: from the explicit path if configured,
/// else `PDFIUM_LIB_PATH`, else the working directory, else the system
/// library. A missing library is an [`ExtractError::Bind`], never a panic.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    lib_path: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load pdfium from this file or directory instead of searching.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lib_path = Some(path.into());
        self
    }

    fn bind(&self) -> Result<Pdfium, ExtractError> {
        let explicit = self
            .lib_path
            .clone()
            .or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from));

        if let Some(path) = explicit {
            let lib = if path.is_dir() {
                PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&path))
            } else {
                path
            };
            return Pdfium::bind_to_library(&lib)
                .map(Pdfium::new)
                .map_err(|e| ExtractError::Bind(format!("{}: {:?}", lib.display(), e)));
        }

        let local = PathBuf::from(Pdfium::pdfium_platform_library_name_at_path("./"));
        Pdfium::bind_to_library(&local)
            .or_else(|_| Pdfium::bind_to_system_library())
            .map(Pdfium::new)
            .map_err(|e| ExtractError::Bind(format!("{:?}", e)))
    }
}

impl PdfTextBackend for PdfiumBackend {
    fn page_texts(&self, path: &Path, password: Option<&str>) -> Result<Vec<String>, ExtractError> {
        let pdfium = self.bind()?;

        let document = pdfium.load_pdf_from_file(path, password).map_err(|e| {
            let detail = format!("{:?}", e);
            if detail.to_ascii_lowercase().contains("password") {
                ExtractError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            } else {
                ExtractError::Open {
                    path: path.to_path_buf(),
                    detail,
                }
            }
        })?;

        let pages = document.pages();
        info!("Extracting text from {} pages...", pages.len());

        let mut texts = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page.text().map_err(|e| ExtractError::Page {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;
            texts.push(text.all());
        }
        Ok(texts)
    }
}
