//! # Image Selection
//!
//! The bounded set of images waiting to be compressed. Holds at most [`MAX_SELECTION`]
//! images; extra candidates are clipped and the caller gets a notice saying how many were
//! accepted.
//!
//! Each image is decoded far enough to learn its format and dimensions when it is selected, so
//! files that are not images are rejected here instead of failing mid-batch.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use image::ImageReader;
use tracing::{debug, warn};

use crate::config::TargetSize;
use crate::error::{ReduceError, ReduceResult};

/// Maximum number of images in one selection.
pub const MAX_SELECTION: usize = 10;

/// Locally unique handle used to remove an image from the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageHandle(u64);

impl ImageHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One selected file before compression.
#[derive(Clone)]
pub struct SourceImage {
    handle: ImageHandle,
    name: String,
    mime: &'static str,
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl SourceImage {
    /// Probe `bytes` for an image header and record its dimensions.
    pub fn from_bytes(handle: ImageHandle, name: impl Into<String>, bytes: Vec<u8>) -> ReduceResult<Self> {
        let name = name.into();
        let reader = ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| ReduceError::selection(&name, e.to_string()))?;
        let format = reader
            .format()
            .ok_or_else(|| ReduceError::selection(&name, "not a recognized image format"))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| ReduceError::selection(&name, e.to_string()))?;
        Ok(Self {
            handle,
            name,
            mime: format.to_mime_type(),
            bytes,
            width,
            height,
        })
    }

    pub fn handle(&self) -> ImageHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Byte size of the selected file.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Largest dimension; compressors are never asked to go above it.
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("size", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Result of adding candidates to a selection.
#[derive(Debug, Default)]
pub struct AddOutcome {
    /// Handles of the images that joined the selection, in candidate order.
    pub accepted: Vec<ImageHandle>,
    /// Candidates that could not be read as images.
    pub rejected: Vec<ReduceError>,
    /// Valid images dropped because the selection was full.
    pub clipped: usize,
    /// User-facing message when candidates were clipped.
    pub notice: Option<String>,
}

/// Ordered, bounded set of selected images.
#[derive(Debug, Default)]
pub struct Selection {
    images: Vec<SourceImage>,
    next_handle: u64,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn remaining(&self) -> usize {
        MAX_SELECTION - self.images.len()
    }

    pub fn images(&self) -> &[SourceImage] {
        &self.images
    }

    /// Add named byte buffers, clipping at the selection limit.
    ///
    /// Non-images are rejected before the limit applies, so they never take a slot from a
    /// later valid image.
    pub fn add_many<I>(&mut self, candidates: I) -> AddOutcome
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let remaining = self.remaining();
        let mut outcome = AddOutcome::default();
        for (name, bytes) in candidates {
            self.offer(&mut outcome, name, bytes);
        }
        note_clipped(&mut outcome, remaining);
        outcome
    }

    /// Read files from disk and add them. Unreadable files count as rejected.
    pub fn add_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> AddOutcome {
        let remaining = self.remaining();
        let mut outcome = AddOutcome::default();
        for path in paths {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            match std::fs::read(path) {
                Ok(bytes) => self.offer(&mut outcome, name, bytes),
                Err(e) => {
                    let e = ReduceError::io_at("read image", path, e);
                    warn!(error = %e, "rejected selection candidate");
                    outcome.rejected.push(e);
                }
            }
        }
        note_clipped(&mut outcome, remaining);
        outcome
    }

    fn offer(&mut self, outcome: &mut AddOutcome, name: String, bytes: Vec<u8>) {
        let result = if self.remaining() == 0 {
            // full: only valid images count as clipped
            SourceImage::from_bytes(ImageHandle(self.next_handle), name, bytes).map(|_| None)
        } else {
            self.add(name, bytes).map(Some)
        };
        match result {
            Ok(Some(handle)) => outcome.accepted.push(handle),
            Ok(None) => outcome.clipped += 1,
            Err(e) => {
                warn!(error = %e, "rejected selection candidate");
                outcome.rejected.push(e);
            }
        }
    }

    /// Add a single image.
    pub fn add(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> ReduceResult<ImageHandle> {
        let name = name.into();
        if self.images.len() >= MAX_SELECTION {
            return Err(ReduceError::selection(
                name,
                format!("selection already holds {} images", MAX_SELECTION),
            ));
        }
        let handle = ImageHandle(self.next_handle);
        let image = SourceImage::from_bytes(handle, name, bytes)?;
        self.next_handle += 1;
        debug!(
            handle = %handle,
            name = image.name(),
            width = image.width(),
            height = image.height(),
            size = image.size(),
            "image selected"
        );
        self.images.push(image);
        Ok(handle)
    }

    pub fn remove(&mut self, handle: ImageHandle) -> Option<SourceImage> {
        let index = self.images.iter().position(|img| img.handle == handle)?;
        Some(self.images.remove(index))
    }

    /// Hand the whole selection over for a batch, leaving it empty.
    pub fn take(&mut self) -> Vec<SourceImage> {
        std::mem::take(&mut self.images)
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}

fn note_clipped(outcome: &mut AddOutcome, remaining: usize) {
    if outcome.clipped == 0 {
        return;
    }
    outcome.notice = Some(if remaining == 0 {
        format!("You have already reached the {} image limit.", MAX_SELECTION)
    } else {
        format!(
            "You can only add {} more image(s). {} were added.",
            remaining,
            outcome.accepted.len()
        )
    });
    warn!(clipped = outcome.clipped, "selection limit reached, extra candidates dropped");
}

/// Images already smaller than the target.
///
/// Compressing these wastes work and may even make them larger, so callers must confirm with
/// the user before submitting a batch when this is non-empty.
pub fn upscale_risk(images: &[SourceImage], target: TargetSize) -> Vec<&SourceImage> {
    images.iter().filter(|img| img.size() < target.bytes()).collect()
}
