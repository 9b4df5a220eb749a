// SPDX-License-Identifier: MIT
//! # Scale Plans
//!
//! Computes output dimensions for a reduction attempt. A compressor starts from the plan built
//! for its maximum-dimension hint and, when the encoded output is still above the byte ceiling,
//! asks for progressively smaller plans with [`ScalePlan::shrink`].
//!
//! All computations use floating-point for precision but round to integers, and clamp to a
//! minimum of 1px so a shrink sequence can never reach an empty image.

use fast_image_resize as fir;

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    /// Length of the longest side.
    pub fn long_side(self) -> u32 {
        self.w.max(self.h)
    }

    /// Number of pixels covered by this size.
    pub fn area(self) -> u64 {
        self.w as u64 * self.h as u64
    }
}

/// Defines the size constraint applied when building a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleTarget {
    /// Clamp the longest side to a maximum value, derive the other side proportionally.
    MaxLongSide(u32),
    /// Keep the input dimensions.
    Original,
}

/// Output dimensions computed for one reduction attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Final computed output dimensions
    pub out: Size,
}

impl ScalePlan {
    /// True when the plan leaves the input dimensions untouched.
    pub fn is_identity(&self) -> bool {
        self.input == self.out
    }

    /// Scale factor relative to the input, 1.0 for an identity plan.
    pub fn factor(&self) -> f64 {
        self.out.long_side() as f64 / self.input.long_side().max(1) as f64
    }

    /// Derive a smaller plan by multiplying the current output by `factor` (0 < factor < 1).
    ///
    /// Guarantees progress: if rounding would keep the same dimensions, the longest side is
    /// reduced by one pixel, down to the 1px floor.
    pub fn shrink(&self, factor: f64) -> ScalePlan {
        let factor = factor.clamp(0.01, 1.0);
        let current = self.out;
        let target_long = ((current.long_side() as f64) * factor).round() as u32;
        let target_long = if target_long >= current.long_side() {
            current.long_side().saturating_sub(1)
        } else {
            target_long
        }
        .max(1);
        let (w, h) = fit_preserve(self.input, target_long);
        ScalePlan {
            input: self.input,
            out: Size { w, h },
        }
    }

    /// True when the plan cannot shrink any further.
    pub fn at_floor(&self) -> bool {
        self.out.long_side() <= 1
    }
}

/// Compute a plan from input dimensions and a target constraint.
///
/// # Performance
/// O(1) computation with minimal floating-point operations
pub fn build_plan(input: Size, target: ScaleTarget) -> ScalePlan {
    let out = match target {
        ScaleTarget::Original => input,
        ScaleTarget::MaxLongSide(max_side) => {
            let (w, h) = fit_preserve(input, max_side);
            Size { w, h }
        }
    };
    ScalePlan { input, out }
}

/// Fit image within max_long on its longest side while preserving aspect ratio.
/// Never upscales - returns original dimensions if already smaller than max_long.
fn fit_preserve(input: Size, max_long: u32) -> (u32, u32) {
    let (w, h) = (input.w as f64, input.h as f64);
    let long = w.max(h).max(1.0);
    let s = (max_long as f64 / long).min(1.0);
    (
        ((w * s).round() as u32).max(1),
        ((h * s).round() as u32).max(1),
    )
}

/// Resampling filters offered for downscaling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ResampleFilter {
    /// Fastest, blocky output
    Nearest,
    /// Fast with acceptable quality
    Bilinear,
    /// Sharp, good default for photos
    CatmullRom,
    /// Highest quality, slowest
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    /// Map to the fast_image_resize algorithm.
    pub fn to_alg(self) -> fir::ResizeAlg {
        match self {
            ResampleFilter::Nearest => fir::ResizeAlg::Nearest,
            ResampleFilter::Bilinear => fir::ResizeAlg::Convolution(fir::FilterType::Bilinear),
            ResampleFilter::CatmullRom => fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom),
            ResampleFilter::Lanczos3 => fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_long_side_never_upscales() {
        let plan = build_plan(Size { w: 300, h: 200 }, ScaleTarget::MaxLongSide(1000));
        assert!(plan.is_identity());
        assert_eq!(plan.factor(), 1.0);
    }

    #[test]
    fn max_long_side_preserves_aspect() {
        let plan = build_plan(Size { w: 1000, h: 3000 }, ScaleTarget::MaxLongSide(600));
        assert_eq!(plan.out, Size { w: 200, h: 600 });
    }

    #[test]
    fn shrink_always_makes_progress() {
        let mut plan = build_plan(Size { w: 3, h: 2 }, ScaleTarget::Original);
        let mut steps = 0;
        while !plan.at_floor() {
            let next = plan.shrink(0.99);
            assert!(next.out.long_side() < plan.out.long_side());
            plan = next;
            steps += 1;
        }
        assert_eq!(steps, 2);
        assert_eq!(plan.out, Size { w: 1, h: 1 });
    }

    #[test]
    fn shrink_is_relative_to_the_current_output() {
        let plan = build_plan(Size { w: 2000, h: 1000 }, ScaleTarget::MaxLongSide(1000));
        let next = plan.shrink(0.5);
        assert_eq!(next.out, Size { w: 500, h: 250 });
        assert_eq!(next.input, plan.input);
    }
}
