// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF flattening — re-render a PDF as page images, destroying active
// content, hidden layers, and copy-protection while keeping the visual
// document. The OCR variant adds a recognised invisible text layer so the
// flattened result stays searchable.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use sortierwerk_core::control::ControlGate;
use sortierwerk_core::error::{Result, SortierwerkError};
use sortierwerk_core::events::SlotReporter;
use tempfile::TempDir;
use tracing::{debug, info, instrument};

use crate::image::processor::{ImageProcessor, REFINED_JPEG_QUALITY};
use crate::pdf::raster::PageRasterizer;
use crate::pdf::reader::PdfReader;
use crate::pdf::writer::PdfAssembler;

#[cfg(feature = "ocr")]
use crate::ocr::OcrEngine;

/// Flatten `source` into a page-image PDF at `dest`.
///
/// Every page is rendered at `dpi`, re-encoded as a JPEG, and reassembled
/// into a single PDF with pages at their original physical size.
///
/// # Errors
///
/// Returns `SortierwerkError::Stopped` when cancelled through the gate,
/// `Render` when Pdfium is unavailable or a page fails to render, and
/// `PdfError` when the source has no renderable pages or merging fails.
#[instrument(skip(gate, slot), fields(source = %source.display(), dpi))]
pub fn flatten_pdf(
    source: &Path,
    dest: &Path,
    dpi: u32,
    gate: &ControlGate,
    slot: &SlotReporter,
) -> Result<()> {
    let title = page_title(dest);
    assemble_from_pages(source, dest, dpi, gate, slot, |page| {
        let jpeg = ImageProcessor::from_dynamic(page).to_jpeg_bytes(REFINED_JPEG_QUALITY)?;
        let mut assembler = PdfAssembler::new(&title, dpi);
        assembler.add_image_page(&jpeg)?;
        Ok(assembler.finish())
    })
}

/// Flatten `source` and add an invisible OCR text layer per page.
///
/// Identical to [`flatten_pdf`] except each rendered page is run through
/// the OCR engine and the recognised lines are embedded invisibly, so the
/// output is both flat and searchable.
///
/// # Errors
///
/// As [`flatten_pdf`], plus `SortierwerkError::OcrError` when recognition
/// fails on a page.
#[cfg(feature = "ocr")]
#[instrument(skip(engine, gate, slot), fields(source = %source.display(), dpi))]
pub fn ocr_pdf(
    source: &Path,
    dest: &Path,
    dpi: u32,
    engine: &OcrEngine,
    gate: &ControlGate,
    slot: &SlotReporter,
) -> Result<()> {
    let title = page_title(dest);
    assemble_from_pages(source, dest, dpi, gate, slot, |page| {
        let lines = engine.recognize_lines(&page)?;
        let jpeg = ImageProcessor::from_dynamic(page).to_jpeg_bytes(REFINED_JPEG_QUALITY)?;
        let mut assembler = PdfAssembler::new(&title, dpi);
        assembler.add_searchable_page(&jpeg, &lines)?;
        Ok(assembler.finish())
    })
}

/// Render every page of `source`, convert each into a single-page PDF via
/// `build_page`, and merge the parts into `dest`.
///
/// Per-page intermediates are spilled to a temp directory beside the
/// destination; its RAII guard cleans up on success, failure, and
/// cancellation alike. Page progress is reported every fifth page plus the
/// last, then "Merging..." marks the reassembly step.
fn assemble_from_pages(
    source: &Path,
    dest: &Path,
    dpi: u32,
    gate: &ControlGate,
    slot: &SlotReporter,
    mut build_page: impl FnMut(DynamicImage) -> Result<Vec<u8>>,
) -> Result<()> {
    let work_dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let temp = TempDir::new_in(work_dir)?;

    let rasterizer = PageRasterizer::new()?;
    let mut page_files: Vec<PathBuf> = Vec::new();

    rasterizer.render_each(source, dpi, |index, total, page| {
        gate.check(slot)?;

        let page_pdf = build_page(page)?;
        let path = temp.path().join(format!("page_{index:05}.pdf"));
        std::fs::write(&path, &page_pdf)?;
        page_files.push(path);

        if index % 5 == 0 || index + 1 == total {
            let percent = (index + 1) as f32 * 100.0 / total as f32;
            slot.update(Some(percent), format!("Page {}/{}", index + 1, total));
        }
        Ok(())
    })?;

    gate.check(slot)?;
    slot.force(Some(100.0), "Merging...");

    let mut buffers = Vec::with_capacity(page_files.len());
    for file in &page_files {
        buffers.push(std::fs::read(file)?);
    }
    let (first, rest) = buffers.split_first().ok_or_else(|| {
        SortierwerkError::PdfError(format!("{}: produced no pages", source.display()))
    })?;

    let base = PdfReader::from_bytes(first)?;
    let slices: Vec<&[u8]> = rest.iter().map(Vec::as_slice).collect();
    let merged = base.merge(&slices)?;
    std::fs::write(dest, &merged)?;

    info!(
        pages = page_files.len(),
        output_bytes = merged.len(),
        dest = %dest.display(),
        "Flattened PDF written"
    );
    debug!(temp = %temp.path().display(), "Dropping page intermediates");
    Ok(())
}

fn page_title(dest: &Path) -> String {
    dest.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document")
        .to_owned()
}
