// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out, tightly packed rows on both sides.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::presets::{ResampleFilter, ScalePlan, Size};

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall { expected: usize, actual: usize },
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall { expected, actual } => {
                write!(f, "Source buffer too small: expected {} bytes, got {}", expected, actual)
            }
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}

/// Resize tightly packed RGBA8 pixels to `plan.out`.
///
/// Identity plans return a copy of the source without touching the resizer. Alpha is
/// premultiplied during convolution so transparent edges do not bleed dark fringes.
pub fn scale_rgba_cpu(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src: Size,
    plan: &ScalePlan,
    filter: ResampleFilter,
) -> Result<Vec<u8>, ScaleError> {
    let src_len = (src.w as usize) * (src.h as usize) * 4;
    if src_rgba.len() < src_len {
        return Err(ScaleError::BufferTooSmall {
            expected: src_len,
            actual: src_rgba.len(),
        });
    }
    if plan.out == src {
        return Ok(src_rgba[..src_len].to_vec());
    }

    let src_view = TypedImageRef::<U8x4>::from_buffer(src.w, src.h, &src_rgba[..src_len])?;

    let mut dst = vec![0u8; (plan.out.w as usize) * (plan.out.h as usize) * 4];
    {
        let mut dst_image = TypedImage::<U8x4>::from_buffer(plan.out.w, plan.out.h, dst.as_mut_slice())?;
        let opts = ResizeOptions::new()
            .resize_alg(filter.to_alg())
            .use_alpha(true);
        resizer.resize_typed::<U8x4>(&src_view, &mut dst_image, &opts)?;
    }

    Ok(dst)
}
