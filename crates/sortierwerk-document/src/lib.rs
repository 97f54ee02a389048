// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sortierwerk-document — Document processing for the Sortierwerk engine.
//
// Provides PDF operations (read, rasterise, flatten, merge, assemble), image
// processing (decode, downscale, JPEG encode), Office archive sanitisation,
// and optional OCR for searchable flattened output.

pub mod image;
pub mod office;
pub mod pdf;

#[cfg(feature = "ocr")]
pub mod ocr;

// Re-export the primary structs so callers can use
// `sortierwerk_document::PdfReader` etc.
pub use image::processor::ImageProcessor;
pub use pdf::raster::PageRasterizer;
pub use pdf::reader::PdfReader;
pub use pdf::writer::PdfAssembler;

#[cfg(feature = "ocr")]
pub use ocr::OcrEngine;
