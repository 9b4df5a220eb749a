// SPDX-License-Identifier: MIT
//! # reduce-scale: Dimension Planning and Resizing for Image Reduction
//!
//! This crate provides the geometry half of target-size image reduction: deciding which output
//! dimensions to try, and resampling RGBA pixels into those dimensions.
//!
//! ## Key Components
//!
//! - [`presets`]: Scale plan computation (clamp longest side, shrink steps, resampling filters)
//! - [`cpu`]: CPU-based RGBA resizing using SIMD acceleration via fast_image_resize
//!
//! ## Guarantees
//!
//! - **No upscaling**: a plan never produces dimensions larger than its input
//! - **Aspect preserving**: both sides scale by the same factor
//! - **Never empty**: every side is clamped to at least 1px
//!
//! ## Usage Example
//!
//! ```rust
//! use reduce_scale::presets::{build_plan, ScaleTarget, Size};
//!
//! let plan = build_plan(Size { w: 4000, h: 3000 }, ScaleTarget::MaxLongSide(2000));
//! assert_eq!((plan.out.w, plan.out.h), (2000, 1500));
//!
//! // Shrink the previous attempt by 10% when the encoded file is still too large
//! let smaller = plan.shrink(0.9);
//! assert_eq!((smaller.out.w, smaller.out.h), (1800, 1350));
//! ```

pub mod cpu;
pub mod presets;
