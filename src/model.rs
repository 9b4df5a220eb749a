//! # Result Model
//!
//! [`CompressedResult`] is the record that crosses the process boundary between a compression
//! run and the results commands. Its binary content is carried as a base64 data URL so the
//! whole collection serializes to plain JSON:
//!
//! ```json
//! [{"preview":"data:image/jpeg;base64,/9j/...","name":"cat.jpg","type":"image/jpeg","originalSize":3145728,"newSize":101376}]
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{ReduceError, ReduceResult};

/// One compressed image, as persisted in the handoff slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressedResult {
    /// Compressed bytes as a `data:<mime>;base64,<payload>` URL.
    pub preview: String,
    /// File name used for downloads and archive entries.
    pub name: String,
    /// MIME type of the compressed bytes.
    #[serde(rename = "type")]
    pub mime: String,
    /// Size of the selected file before compression.
    pub original_size: u64,
    /// Size of the compressed bytes. Informational, may exceed the target.
    pub new_size: u64,
}

impl CompressedResult {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, original_size: u64, bytes: &[u8]) -> Self {
        let mime = mime.into();
        Self {
            preview: data_url::encode(&mime, bytes),
            name: name.into(),
            mime,
            original_size,
            new_size: bytes.len() as u64,
        }
    }

    /// Decode the compressed bytes carried in `preview`.
    pub fn bytes(&self) -> ReduceResult<Vec<u8>> {
        let (_, bytes) = data_url::decode(&self.preview)
            .map_err(|e| e.with_context(format!("decoding stored result '{}'", self.name)))?;
        Ok(bytes)
    }

    /// Bytes saved by this result; negative when compression grew the file.
    pub fn saved(&self) -> i64 {
        self.original_size as i64 - self.new_size as i64
    }
}

/// Encoding and decoding of base64 data URLs.
pub mod data_url {
    use super::*;

    /// Build `data:<mime>;base64,<payload>`.
    pub fn encode(mime: &str, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
    }

    /// Split a base64 data URL into its MIME type and decoded bytes.
    pub fn decode(url: &str) -> ReduceResult<(String, Vec<u8>)> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ReduceError::validation("preview", "must start with 'data:'", truncate(url)))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ReduceError::validation("preview", "missing ',' separator", truncate(url)))?;
        let mime = header.strip_suffix(";base64").ok_or_else(|| {
            ReduceError::validation("preview", "only base64 data URLs are supported", truncate(url))
        })?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| ReduceError::external("base64", e))?;
        Ok((mime.to_string(), bytes))
    }

    fn truncate(url: &str) -> String {
        url.chars().take(32).collect()
    }
}
