//! # Run Configuration
//!
//! Configuration structures and validation for a reduction run. This is the common interface
//! between the CLI argument parser and the core library.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `target` | `TargetSize` | 10-2000 KB | Desired upper bound per compressed file |
//! | `preserve_resolution` | `bool` | true/false | Never reduce dimensions, only quality |
//! | `max_iterations` | `u32` | 1-50 | Encode attempts per image |
//! | `filter` | `ResampleFilter` | enum | Resampling filter for downscaling |
//! | `data_dir` | `PathBuf` | writable dir | Where the handoff slot lives |
//!
//! ## Data Directory Resolution
//!
//! 1. `--data-dir` flag (or `REDUCE_DATA_DIR`, handled by clap)
//! 2. Platform data directory + `image-reducer` (e.g. `~/.local/share/image-reducer`)
//!
//! ## Examples
//!
//! ```rust
//! use image_reducer::config::{ReduceConfig, TargetSize};
//!
//! let mut config = ReduceConfig::default();
//! config.target = TargetSize::from_kb(250).unwrap();
//! config.preserve_resolution = true;
//! assert!(config.validate().is_ok());
//!
//! let compressor = config.to_compressor();
//! # let _ = compressor;
//! ```

use std::path::PathBuf;

use reduce_scale::presets::ResampleFilter;

use crate::compress::TargetSizeCompressor;
use crate::config::target::TargetSize;
use crate::error::{ReduceError, ReduceResult};

/// Name of the application directory under the platform data directory.
pub const APP_DIR_NAME: &str = "image-reducer";

/// Encode attempts per image when not configured otherwise.
pub const DEFAULT_MAX_ITERATIONS: u32 = 15;

const MAX_ITERATIONS_LIMIT: u32 = 50;

/// Configuration for a reduction run.
#[derive(Debug, Clone)]
pub struct ReduceConfig {
    /// Desired upper bound per compressed file.
    pub target: TargetSize,

    /// Prefer quality: keep the original dimensions and only lower encoder quality.
    ///
    /// Output may end up larger than the target when this is set.
    pub preserve_resolution: bool,

    /// Encode attempts per image before the best attempt is returned.
    pub max_iterations: u32,

    /// Resampling filter used when dimensions are reduced.
    pub filter: ResampleFilter,

    /// Directory holding the handoff slot file.
    pub data_dir: PathBuf,
}

impl Default for ReduceConfig {
    /// Default values:
    /// - `target`: 100 KB
    /// - `preserve_resolution`: false (favor hitting the target)
    /// - `max_iterations`: 15
    /// - `filter`: Lanczos3
    /// - `data_dir`: platform data directory, or `./.image-reducer` when none exists
    fn default() -> Self {
        Self {
            target: TargetSize::default(),
            preserve_resolution: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            filter: ResampleFilter::default(),
            data_dir: default_data_dir().unwrap_or_else(|| PathBuf::from(".image-reducer")),
        }
    }
}

impl ReduceConfig {
    pub fn new(
        target: TargetSize,
        preserve_resolution: bool,
        max_iterations: u32,
        filter: ResampleFilter,
        data_dir: Option<PathBuf>,
    ) -> ReduceResult<Self> {
        let data_dir = match data_dir.or_else(default_data_dir) {
            Some(dir) => dir,
            None => {
                return Err(ReduceError::config(
                    "data_dir",
                    "",
                    "no platform data directory found",
                )
                .with_recovery_suggestion("Pass --data-dir or set REDUCE_DATA_DIR"));
            }
        };
        Ok(Self {
            target,
            preserve_resolution,
            max_iterations,
            filter,
            data_dir,
        })
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> ReduceResult<()> {
        TargetSize::from_bytes(self.target.bytes())?;
        if !(1..=MAX_ITERATIONS_LIMIT).contains(&self.max_iterations) {
            return Err(ReduceError::validation(
                "max_iterations",
                format!("must be between 1 and {}", MAX_ITERATIONS_LIMIT),
                self.max_iterations.to_string(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(ReduceError::config("data_dir", "", "must not be empty"));
        }
        if self.data_dir.is_file() {
            return Err(ReduceError::config(
                "data_dir",
                self.data_dir.display().to_string(),
                "exists and is not a directory",
            ));
        }
        Ok(())
    }

    /// Build the compressor this configuration describes.
    pub fn to_compressor(&self) -> TargetSizeCompressor {
        TargetSizeCompressor::new(self.filter)
    }
}

/// Platform data directory joined with the application directory name.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME))
}
