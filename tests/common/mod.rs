//! Common test utilities and helpers for the image reducer tests
//!
//! This module provides generated test images and a scripted compressor
//! for exercising the batch pipeline without real encoding.

#![allow(dead_code)]

/// Generated images in memory
pub mod test_images {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
    use image_reducer::selection::{ImageHandle, SourceImage};

    /// Deterministic noise, which compresses poorly
    pub fn noise_rgb(width: u32, height: u32) -> RgbImage {
        let mut state: u32 = 0x1234_5678;
        RgbImage::from_fn(width, height, |_, _| {
            let mut next = || {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            };
            image::Rgb([next(), next(), next()])
        })
    }

    /// Smooth gradient, which compresses well
    pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
            ])
        })
    }

    pub fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), format)
            .expect("encode test image");
        buf
    }

    pub fn noise_png(width: u32, height: u32) -> Vec<u8> {
        encode(DynamicImage::ImageRgb8(noise_rgb(width, height)), ImageFormat::Png)
    }

    pub fn noise_jpeg(width: u32, height: u32) -> Vec<u8> {
        encode(DynamicImage::ImageRgb8(noise_rgb(width, height)), ImageFormat::Jpeg)
    }

    pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        encode(DynamicImage::ImageRgb8(gradient_rgb(width, height)), ImageFormat::Png)
    }

    pub fn gradient_bmp(width: u32, height: u32) -> Vec<u8> {
        encode(DynamicImage::ImageRgb8(gradient_rgb(width, height)), ImageFormat::Bmp)
    }

    /// Half-transparent RGBA noise as PNG
    pub fn translucent_png(width: u32, height: u32) -> Vec<u8> {
        let rgb = noise_rgb(width, height);
        let rgba = RgbaImage::from_fn(width, height, |x, y| {
            let p = rgb.get_pixel(x, y);
            image::Rgba([p[0], p[1], p[2], 128])
        });
        encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png)
    }

    /// A small PNG padded with trailing bytes to exactly `size` bytes. The header stays
    /// readable, so it selects fine and reports the padded size.
    pub fn padded_png(size: usize) -> Vec<u8> {
        let mut bytes = gradient_png(16, 16);
        assert!(bytes.len() <= size, "padding target below PNG size");
        bytes.resize(size, 0);
        bytes
    }

    pub fn source(id: u64, name: &str, bytes: Vec<u8>) -> SourceImage {
        SourceImage::from_bytes(ImageHandle::new(id), name, bytes).expect("valid test image")
    }

    /// `count` small PNG sources named `img-<i>.png`
    pub fn sources(count: usize) -> Vec<SourceImage> {
        (0..count)
            .map(|i| source(i as u64, &format!("img-{}.png", i), gradient_png(8, 8)))
            .collect()
    }
}

/// Scripted compressor for deterministic batch tests
pub mod mock_compressor {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use image_reducer::compress::{CompressedImage, CompressionConstraints, Compressor};
    use image_reducer::error::{ReduceError, ReduceResult};
    use image_reducer::selection::SourceImage;

    /// Shrinks every image to `min(size, max_bytes)` bytes and fails for scripted names.
    #[derive(Clone, Default)]
    pub struct ScriptedCompressor {
        failing: HashSet<String>,
        calls: Arc<Mutex<Vec<(String, CompressionConstraints)>>>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl ScriptedCompressor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail for the image with this name
        pub fn failing_on(mut self, name: &str) -> Self {
            self.failing.insert(name.to_string());
            self
        }

        /// Names of the images compressed so far, in call order
        pub fn call_names(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(name, _)| name.clone())
                .collect()
        }

        pub fn calls(&self) -> Vec<(String, CompressionConstraints)> {
            self.calls.lock().unwrap().clone()
        }

        /// Highest number of concurrent compress calls observed
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Compressor for ScriptedCompressor {
        async fn compress(
            &self,
            image: SourceImage,
            constraints: CompressionConstraints,
        ) -> ReduceResult<CompressedImage> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls
                .lock()
                .unwrap()
                .push((image.name().to_string(), constraints));

            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(image.name()) {
                return Err(ReduceError::encode(image.name(), "scripted failure"));
            }
            let size = image.size().min(constraints.max_bytes) as usize;
            Ok(CompressedImage {
                name: image.name().to_string(),
                mime: image.mime().to_string(),
                bytes: vec![7u8; size],
                width: image.width(),
                height: image.height(),
                iterations: 1,
            })
        }
    }
}
