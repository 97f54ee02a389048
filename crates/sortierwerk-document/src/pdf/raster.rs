// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterisation via Pdfium, bound dynamically at runtime.

use std::path::Path;

use image::DynamicImage;
use pdfium_render::prelude::*;
use sortierwerk_core::error::{Result, SortierwerkError};
use tracing::{debug, instrument};

/// Renders PDF pages to raster images through the system Pdfium library.
///
/// The binding is resolved at construction time, so a missing or broken
/// Pdfium installation surfaces as a per-call error instead of a link-time
/// failure. One rasterizer per worker thread; the underlying library calls
/// are serialised internally.
pub struct PageRasterizer {
    pdfium: Pdfium,
}

impl PageRasterizer {
    /// Bind to the system Pdfium library.
    ///
    /// # Errors
    ///
    /// Returns `SortierwerkError::Render` when no usable Pdfium library can
    /// be located at runtime.
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_system_library().map_err(|err| {
            SortierwerkError::Render(format!("PDF render library unavailable: {err}"))
        })?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Render every page of `path` at the given DPI, invoking `on_page`
    /// with `(page_index, total_pages, image)` for each.
    ///
    /// Rendering stops at the first callback error, which makes the
    /// callback the natural place for cancellation checkpoints.
    ///
    /// # Errors
    ///
    /// Returns `SortierwerkError::Render` if the document cannot be opened
    /// or a page fails to render, or the first error from `on_page`.
    #[instrument(skip(self, on_page), fields(path = %path.as_ref().display(), dpi))]
    pub fn render_each(
        &self,
        path: impl AsRef<Path>,
        dpi: u32,
        mut on_page: impl FnMut(usize, usize, DynamicImage) -> Result<()>,
    ) -> Result<()> {
        let path_ref = path.as_ref();
        let document = self.pdfium.load_pdf_from_file(path_ref, None).map_err(|err| {
            SortierwerkError::Render(format!("cannot open {}: {}", path_ref.display(), err))
        })?;

        let total = document.pages().len() as usize;
        let config = render_config(dpi);
        debug!(total, "Rendering pages");

        for (index, page) in document.pages().iter().enumerate() {
            let bitmap = page.render_with_config(&config).map_err(|err| {
                SortierwerkError::Render(format!(
                    "page {} of {} failed to render: {}",
                    index + 1,
                    path_ref.display(),
                    err
                ))
            })?;
            on_page(index, total, bitmap.as_image())?;
        }

        Ok(())
    }

    /// Render a single page (0-indexed) at the given DPI.
    ///
    /// # Errors
    ///
    /// Returns `SortierwerkError::Render` if the document cannot be opened,
    /// the index is out of range, or rendering fails.
    #[instrument(skip(self), fields(path = %path.as_ref().display(), page_index, dpi))]
    pub fn render_page(
        &self,
        path: impl AsRef<Path>,
        page_index: usize,
        dpi: u32,
    ) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let document = self.pdfium.load_pdf_from_file(path_ref, None).map_err(|err| {
            SortierwerkError::Render(format!("cannot open {}: {}", path_ref.display(), err))
        })?;

        let pages = document.pages();
        let page = pages.get(page_index as u16).map_err(|err| {
            SortierwerkError::Render(format!(
                "page {} not available in {}: {}",
                page_index + 1,
                path_ref.display(),
                err
            ))
        })?;

        let bitmap = page.render_with_config(&render_config(dpi)).map_err(|err| {
            SortierwerkError::Render(format!(
                "page {} of {} failed to render: {}",
                page_index + 1,
                path_ref.display(),
                err
            ))
        })?;

        Ok(bitmap.as_image())
    }
}

/// Pdfium renders at 72 DPI natively; scale up from there.
fn render_config(dpi: u32) -> PdfRenderConfig {
    PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0)
}
