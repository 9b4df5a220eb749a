//! # Target Size Control
//!
//! The target size is the user's desired upper bound on each compressed file. It is advisory:
//! compressors try to reach it but may return larger output.
//!
//! | Bound | Value |
//! |-------|-------|
//! | Minimum | 10 KB |
//! | Maximum | 2000 KB |
//! | Step | 10 KB |
//! | Default | 100 KB |
//!
//! One KB is 1024 bytes. Two constructors mirror the two places the bound is enforced:
//! [`TargetSize::clamp_kb`] behaves like the selector control (never produces an invalid value),
//! while [`TargetSize::from_kb`] and [`TargetSize::from_bytes`] reject invalid input so a value
//! that bypassed the control is caught before any work starts.

use std::fmt;

use crate::error::{ReduceError, ReduceResult};

/// A validated target-size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetSize {
    bytes: u64,
}

impl TargetSize {
    pub const MIN_KB: u32 = 10;
    pub const MAX_KB: u32 = 2000;
    pub const STEP_KB: u32 = 10;
    pub const DEFAULT_KB: u32 = 100;
    pub const BYTES_PER_KB: u64 = 1024;

    /// Validate a selector value in KB. Values outside the range or off the 10 KB step are
    /// rejected.
    pub fn from_kb(kb: u32) -> ReduceResult<Self> {
        if !(Self::MIN_KB..=Self::MAX_KB).contains(&kb) {
            return Err(ReduceError::validation(
                "target_kb",
                format!("must be between {} and {}", Self::MIN_KB, Self::MAX_KB),
                kb.to_string(),
            )
            .with_recovery_suggestion("Pick a target between 10 KB and 2000 KB"));
        }
        if kb % Self::STEP_KB != 0 {
            return Err(ReduceError::validation(
                "target_kb",
                format!("must be a multiple of {}", Self::STEP_KB),
                kb.to_string(),
            )
            .with_recovery_suggestion(format!(
                "Try {} KB",
                Self::clamp_kb(kb as i64).kb()
            )));
        }
        Ok(Self {
            bytes: kb as u64 * Self::BYTES_PER_KB,
        })
    }

    /// Re-validate a raw byte ceiling at request time.
    pub fn from_bytes(bytes: u64) -> ReduceResult<Self> {
        let min = Self::MIN_KB as u64 * Self::BYTES_PER_KB;
        let max = Self::MAX_KB as u64 * Self::BYTES_PER_KB;
        if !(min..=max).contains(&bytes) {
            return Err(ReduceError::validation(
                "target_bytes",
                format!("must be between {} and {}", min, max),
                bytes.to_string(),
            ));
        }
        Ok(Self { bytes })
    }

    /// Behave like the selector control: clamp into range and snap to the nearest step.
    pub fn clamp_kb(kb: i64) -> Self {
        let clamped = kb.clamp(Self::MIN_KB as i64, Self::MAX_KB as i64);
        let step = Self::STEP_KB as i64;
        let snapped = ((clamped + step / 2) / step * step).clamp(Self::MIN_KB as i64, Self::MAX_KB as i64);
        Self {
            bytes: snapped as u64 * Self::BYTES_PER_KB,
        }
    }

    pub fn bytes(self) -> u64 {
        self.bytes
    }

    /// Whole KB, rounded down for byte ceilings that are not KB aligned.
    pub fn kb(self) -> u32 {
        (self.bytes / Self::BYTES_PER_KB) as u32
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self {
            bytes: Self::DEFAULT_KB as u64 * Self::BYTES_PER_KB,
        }
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} KB", self.kb())
    }
}
