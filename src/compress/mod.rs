//! # Compression Adapter
//!
//! The seam between the batch orchestrator and whatever actually shrinks an image. The
//! orchestrator only knows the [`Compressor`] trait; [`TargetSizeCompressor`] is the production
//! implementation and tests plug in scripted compressors.
//!
//! Compression is best-effort: an implementation tries to get under
//! [`CompressionConstraints::max_bytes`] but may return larger output, and callers treat the
//! resulting size as informational.

pub mod target_size;

use async_trait::async_trait;

use crate::error::ReduceResult;
use crate::selection::SourceImage;

pub use target_size::TargetSizeCompressor;

/// Per-call limits handed to a compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConstraints {
    /// Desired upper bound on the output size in bytes.
    pub max_bytes: u64,
    /// Longest side the output may have. Set to the source's own longest side so nothing is
    /// ever upscaled.
    pub max_dimension: u32,
    /// Keep the dimensions and only trade encoder quality.
    pub preserve_resolution: bool,
    /// Encode attempts before the best attempt so far is returned.
    pub max_iterations: u32,
}

/// Output of one successful compression call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Encode attempts spent, 0 when the source was returned untouched.
    pub iterations: u32,
}

/// Abstract image compressor.
/// Implement this trait to plug a different encoder into the batch orchestrator.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress one image. Failures affect only this image.
    async fn compress(
        &self,
        image: SourceImage,
        constraints: CompressionConstraints,
    ) -> ReduceResult<CompressedImage>;
}
