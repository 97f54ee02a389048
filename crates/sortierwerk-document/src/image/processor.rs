// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, width-bounded downscale, and JPEG encoding for
// the refine stage. Operates on in-memory images using the `image` crate.

use image::DynamicImage;
use sortierwerk_core::error::{Result, SortierwerkError};
use tracing::{debug, info, instrument};

/// JPEG quality used for refined page images and resized photos.
pub const REFINED_JPEG_QUALITY: u8 = 85;

/// Image processing pipeline operating on a single in-memory image.
///
/// Operations are non-destructive: each method consumes `self` and returns
/// a new `ImageProcessor` wrapping the transformed image, enabling chaining.
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| {
            SortierwerkError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data).map_err(|err| {
            SortierwerkError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    // -- Transformations ------------------------------------------------------

    /// Downscale so the width does not exceed `max_width`, preserving the
    /// aspect ratio. Images at or below the limit pass through untouched;
    /// nothing is ever upscaled. Uses Lanczos3 filtering.
    #[instrument(skip(self), fields(max_width))]
    pub fn shrink_to_width(self, max_width: u32) -> Self {
        let width = self.image.width();
        if width <= max_width || max_width == 0 {
            debug!(width, max_width, "Within bounds, no resize");
            return self;
        }

        let ratio = max_width as f64 / width as f64;
        let new_height = ((self.image.height() as f64) * ratio) as u32;
        info!(
            from_w = width,
            from_h = self.image.height(),
            to_w = max_width,
            to_h = new_height,
            "Downscaling image"
        );

        let resized = self.image.resize_exact(
            max_width,
            new_height.max(1),
            image::imageops::FilterType::Lanczos3,
        );
        Self { image: resized }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder)
            .map_err(|err| SortierwerkError::ImageError(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
