//! Vision Extraction
//! Sends slip images to a vision-capable model and returns its raw text reply.

pub mod client;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

pub use client::OpenAiVisionClient;

/// Instruction sent with every slip image.
pub const EXTRACTION_PROMPT: &str = "Analyze the image and provide the results in a table with \
columns 'Amount Wagered' and 'Amount Won' and 'Date'. Use MM/DD/YYYY for dates. \
DO NOT INCLUDE ANYTHING ELSE IN THE RESPONSE EXCEPT THE TABLE";

/// An uploaded slip photo.
#[derive(Debug, Clone)]
pub struct SlipImage {
    /// File name or other label used in reports.
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SlipImage {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading slip image {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, mime_for_path(path), bytes))
    }
}

/// Guess an image MIME type from the file extension. Unknown extensions are sent as JPEG.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Anything that can turn a slip image into the model's text reply.
#[async_trait]
pub trait SlipExtractor: Send + Sync {
    async fn extract(&self, image: &SlipImage) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("slip.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("slip.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("slip.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("slip")), "image/jpeg");
    }

    #[test]
    fn test_prompt_names_expected_columns() {
        for column in ["Amount Wagered", "Amount Won", "Date"] {
            assert!(EXTRACTION_PROMPT.contains(column));
        }
    }
}
