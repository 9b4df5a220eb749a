//! # Target-Size Compressor
//!
//! Best-effort compressor built on the `image` codecs and the `reduce-scale` resizer.
//!
//! ## Search
//!
//! Each iteration encodes the current candidate and stops as soon as it fits under the byte
//! ceiling:
//!
//! 1. JPEG output lowers the encoder quality first, from 90 down to 40 in steps of 10
//! 2. Once quality is exhausted (immediately for PNG), dimensions shrink by a factor derived
//!    from how far the last attempt overshot, unless resolution is preserved
//! 3. After `max_iterations` attempts, or when nothing is left to lower, the smallest attempt
//!    is returned
//!
//! PNG input stays PNG. Every other decodable format is re-encoded as JPEG and its file
//! extension becomes `.jpg`. When the best attempt is still not smaller than a source of the
//! same format, the source bytes are returned unchanged.

use async_trait::async_trait;
use fast_image_resize::Resizer;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use reduce_scale::cpu::scale_rgba_cpu;
use reduce_scale::presets::{build_plan, ResampleFilter, ScalePlan, ScaleTarget, Size};
use tracing::{debug, warn};

use crate::compress::{CompressedImage, CompressionConstraints, Compressor};
use crate::error::{ReduceError, ReduceResult};
use crate::selection::SourceImage;

const INITIAL_QUALITY: u8 = 90;
const MIN_QUALITY: u8 = 40;
const QUALITY_STEP: u8 = 10;
const MIN_SHRINK: f64 = 0.5;
const MAX_SHRINK: f64 = 0.9;

/// Encoders the compressor can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// PNG stays PNG, everything else becomes JPEG.
    pub fn for_mime(mime: &str) -> Self {
        if mime == "image/png" {
            OutputFormat::Png
        } else {
            OutputFormat::Jpeg
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    /// Name of the output file: unchanged unless the format changed.
    pub fn output_name(self, name: &str, source_mime: &str) -> String {
        if source_mime == self.mime() {
            return name.to_string();
        }
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => format!("{}.{}", stem, self.extension()),
            _ => format!("{}.{}", name, self.extension()),
        }
    }

    fn encode(self, rgba: &[u8], size: Size, opaque: bool, quality: u8) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Vec::new();
        match self {
            OutputFormat::Jpeg => {
                let rgb = flatten_on_white(rgba);
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
                encoder.encode(&rgb, size.w, size.h, ExtendedColorType::Rgb8)?;
            }
            OutputFormat::Png => {
                let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
                if opaque {
                    let rgb: Vec<u8> = rgba.chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]).collect();
                    encoder.write_image(&rgb, size.w, size.h, ExtendedColorType::Rgb8)?;
                } else {
                    encoder.write_image(rgba, size.w, size.h, ExtendedColorType::Rgba8)?;
                }
            }
        }
        Ok(buf)
    }
}

/// Composite RGBA over a white background for encoders without alpha.
fn flatten_on_white(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        let a = px[3] as u32;
        for &c in &px[..3] {
            rgb.push(((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8);
        }
    }
    rgb
}

/// Production [`Compressor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TargetSizeCompressor {
    filter: ResampleFilter,
}

impl TargetSizeCompressor {
    pub fn new(filter: ResampleFilter) -> Self {
        Self { filter }
    }
}

#[async_trait]
impl Compressor for TargetSizeCompressor {
    async fn compress(
        &self,
        image: SourceImage,
        constraints: CompressionConstraints,
    ) -> ReduceResult<CompressedImage> {
        let filter = self.filter;
        let name = image.name().to_string();
        tokio::task::spawn_blocking(move || compress_blocking(image, constraints, filter))
            .await
            .map_err(|e| ReduceError::encode(name, format!("compression task failed: {}", e)))?
    }
}

struct Attempt {
    bytes: Vec<u8>,
    size: Size,
    iteration: u32,
}

/// Synchronous search, run on the blocking pool.
pub fn compress_blocking(
    image: SourceImage,
    constraints: CompressionConstraints,
    filter: ResampleFilter,
) -> ReduceResult<CompressedImage> {
    let name = image.name().to_string();
    let source_mime = image.mime();
    let format = OutputFormat::for_mime(source_mime);
    let output_name = format.output_name(&name, source_mime);

    let decoded = image::load_from_memory(image.bytes())
        .map_err(|e| ReduceError::decode(&name, e.to_string()))?;
    let src = Size {
        w: decoded.width(),
        h: decoded.height(),
    };
    let mut plan = build_plan(src, ScaleTarget::MaxLongSide(constraints.max_dimension.max(1)));
    let same_format = format.mime() == source_mime;

    if plan.is_identity() && same_format && image.size() <= constraints.max_bytes {
        debug!(name = %name, size = image.size(), "already under target, keeping source");
        return Ok(untouched(image, output_name, src));
    }

    let opaque = !decoded.color().has_alpha();
    let rgba = decoded.to_rgba8();
    drop(decoded);

    let mut resizer = Resizer::new();
    let mut scaled: Option<(Size, Vec<u8>)> = None;
    let mut quality = INITIAL_QUALITY;
    let mut best: Option<Attempt> = None;

    for iteration in 1..=constraints.max_iterations.max(1) {
        if scaled.as_ref().map(|(size, _)| *size) != Some(plan.out) {
            let pixels = scale_rgba_cpu(&mut resizer, rgba.as_raw(), src, &plan, filter)
                .map_err(|e| ReduceError::encode(&name, e.to_string()))?;
            scaled = Some((plan.out, pixels));
        }
        let Some((size, pixels)) = scaled.as_ref() else {
            break;
        };
        let bytes = format
            .encode(pixels, *size, opaque, quality)
            .map_err(|e| ReduceError::encode(&name, e.to_string()))?;
        let len = bytes.len() as u64;
        debug!(
            name = %name,
            iteration,
            width = size.w,
            height = size.h,
            quality,
            bytes = len,
            "encode attempt"
        );

        if best.as_ref().is_none_or(|b| bytes.len() < b.bytes.len()) {
            best = Some(Attempt {
                bytes,
                size: *size,
                iteration,
            });
        }
        if len <= constraints.max_bytes {
            break;
        }

        if format == OutputFormat::Jpeg && quality > MIN_QUALITY {
            quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
        } else if !constraints.preserve_resolution && !plan.at_floor() {
            plan = next_plan(&plan, len, constraints.max_bytes);
        } else {
            break;
        }
    }

    let best = best.ok_or_else(|| ReduceError::encode(&name, "no encode attempt was made"))?;
    if same_format && best.bytes.len() as u64 >= image.size() {
        debug!(name = %name, "compressed output not smaller than source, keeping source");
        return Ok(untouched(image, output_name, src));
    }
    if best.bytes.len() as u64 > constraints.max_bytes {
        warn!(
            name = %name,
            bytes = best.bytes.len(),
            target = constraints.max_bytes,
            "target size not reached"
        );
    }
    Ok(CompressedImage {
        name: output_name,
        mime: format.mime().to_string(),
        bytes: best.bytes,
        width: best.size.w,
        height: best.size.h,
        iterations: best.iteration,
    })
}

/// Shrink by roughly the square root of the overshoot, since size tracks pixel area.
fn next_plan(plan: &ScalePlan, len: u64, max_bytes: u64) -> ScalePlan {
    let ratio = max_bytes as f64 / len.max(1) as f64;
    plan.shrink(ratio.sqrt().clamp(MIN_SHRINK, MAX_SHRINK))
}

fn untouched(image: SourceImage, name: String, size: Size) -> CompressedImage {
    let mime = image.mime().to_string();
    CompressedImage {
        name,
        mime,
        bytes: image.into_bytes(),
        width: size.w,
        height: size.h,
        iterations: 0,
    }
}
