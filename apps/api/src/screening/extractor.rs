//! Text Extractor: turns a stored résumé file into plain text.
//!
//! Formats are dispatched through `DECODERS`; adding a format means adding a
//! row. Unsupported types yield an empty string rather than an error so the
//! pipeline can still run (the length gate rejects it downstream). Only I/O
//! failures are errors.

use std::path::Path;

use tracing::{debug, warn};

use crate::screening::error::ExtractionError;

pub const PDF: &str = "application/pdf";
pub const PLAIN_TEXT: &str = "text/plain";

/// Decodes a whole file's bytes into text.
type Decoder = fn(&[u8]) -> Result<String, String>;

const DECODERS: &[(&str, Decoder)] = &[(PDF, decode_pdf), (PLAIN_TEXT, decode_plain_text)];

/// Lower-cased media type without parameters: `Text/Plain; charset=utf-8` → `text/plain`.
pub fn normalize_media_type(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn decoder_for(media_type: &str) -> Option<Decoder> {
    let media_type = normalize_media_type(media_type);
    DECODERS
        .iter()
        .find(|(kind, _)| *kind == media_type)
        .map(|(_, decoder)| *decoder)
}

pub fn is_supported(media_type: &str) -> bool {
    decoder_for(media_type).is_some()
}

/// Infers a media type from the file extension. Unknown extensions map to "".
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => PDF,
        Some("txt") => PLAIN_TEXT,
        _ => "",
    }
}

/// Reads `path` and decodes it according to `declared_media_type`.
pub async fn extract_text(path: &Path, declared_media_type: &str) -> Result<String, ExtractionError> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => {}
        Ok(false) => return Err(ExtractionError::NotFound(path.to_path_buf())),
        Err(source) => {
            return Err(ExtractionError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    let Some(decoder) = decoder_for(declared_media_type) else {
        debug!(
            "No decoder for media type '{}'; extracted text is empty",
            declared_media_type
        );
        return Ok(String::new());
    };

    let bytes = tokio::fs::read(path).await.map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ExtractionError::NotFound(path.to_path_buf())
        } else {
            ExtractionError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let size = bytes.len();

    // PDF decoding is CPU-bound and can panic on malformed input.
    match tokio::task::spawn_blocking(move || decoder(&bytes)).await {
        Ok(Ok(text)) => {
            debug!(
                "Extracted {} chars from {} ({} bytes)",
                text.chars().count(),
                path.display(),
                size
            );
            Ok(text)
        }
        Ok(Err(e)) => {
            warn!("Could not decode {}: {e}", path.display());
            Ok(String::new())
        }
        Err(e) => {
            warn!("Decoder aborted on {}: {e}", path.display());
            Ok(String::new())
        }
    }
}

fn decode_pdf(bytes: &[u8]) -> Result<String, String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| format!("PDF extraction failed: {e}"))
}

fn decode_plain_text(bytes: &[u8]) -> Result<String, String> {
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
