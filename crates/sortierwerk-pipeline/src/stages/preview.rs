// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preview stage: render the first page of the first master PDF at the
// requested DPI so the operator can judge quality before a full batch.
//
// The output is a single-page PDF in the workspace root named
// PREVIEW_{unix seconds}.pdf; stale previews from earlier runs are
// deleted first. Runs to completion once started; there is nothing worth
// interrupting in a single page.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, instrument};

use sortierwerk_core::{ColorHint, EventSink, Result};
use sortierwerk_document::image::processor::REFINED_JPEG_QUALITY;
use sortierwerk_document::{ImageProcessor, PageRasterizer, PdfAssembler};

use crate::workspace::Workspace;

const PREVIEW_PREFIX: &str = "PREVIEW_";

/// Generate a one-page preview PDF, returning its path.
///
/// Returns `Ok(None)` when the masters folder holds no PDF to sample.
#[instrument(skip_all, fields(workspace = %workspace.root().display(), dpi))]
pub fn run(sink: &EventSink, workspace: &Workspace, dpi: u32) -> Result<Option<PathBuf>> {
    let Some(pdf) = first_pdf(&workspace.masters_dir())? else {
        sink.status_change_raw("PREVIEW", "No PDF found.", ColorHint::Red);
        sink.done();
        return Ok(None);
    };

    remove_stale_previews(workspace.root());
    let out = workspace
        .root()
        .join(format!("{PREVIEW_PREFIX}{}.pdf", Local::now().timestamp()));

    let rasterizer = PageRasterizer::new()?;
    let page = rasterizer.render_page(&pdf, 0, dpi)?;
    let jpeg = ImageProcessor::from_dynamic(page).to_jpeg_bytes(REFINED_JPEG_QUALITY)?;
    let mut assembler = PdfAssembler::new("Preview", dpi);
    assembler.add_image_page(&jpeg)?;
    assembler.write_to_file(&out)?;

    sink.notify("Preview Ready", "Opening preview...", Some(out.clone()));
    sink.status_change_raw("PREVIEW", "Preview Generated", ColorHint::Green);
    sink.done();
    info!(source = %pdf.display(), preview = %out.display(), "preview written");
    Ok(Some(out))
}

/// First PDF in the masters folder by filename order, or `None` when the
/// folder is absent or holds no PDFs.
fn first_pdf(masters: &Path) -> Result<Option<PathBuf>> {
    if !masters.exists() {
        return Ok(None);
    }
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(masters)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();
    Ok(pdfs.into_iter().next())
}

/// Delete previews left by earlier runs. Failures only get logged; a
/// lingering stale file must not block a fresh preview.
fn remove_stale_previews(root: &Path) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(PREVIEW_PREFIX) && name.ends_with(".pdf") {
            if let Err(err) = std::fs::remove_file(entry.path()) {
                debug!(file = %name, %err, "stale preview not removed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_pdf_is_lexicographic_and_case_blind() {
        let dir = tempfile::tempdir().expect("temp dir");
        for name in ["[0002]_b.PDF", "[0003]_a.pdf", "[0001]_z.jpg"] {
            std::fs::write(dir.path().join(name), b"x").expect("fixture");
        }

        let found = first_pdf(dir.path()).expect("scan").expect("a pdf");
        assert_eq!(found, dir.path().join("[0002]_b.PDF"));
    }

    #[test]
    fn missing_masters_folder_yields_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(
            first_pdf(&dir.path().join("absent"))
                .expect("scan")
                .is_none()
        );
    }

    #[test]
    fn stale_previews_are_cleared() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("PREVIEW_123.pdf"), b"old").expect("fixture");
        std::fs::write(dir.path().join("PREVIEW_456.pdf"), b"old").expect("fixture");
        std::fs::write(dir.path().join("manifest.json"), b"{}").expect("fixture");

        remove_stale_previews(dir.path());
        assert!(!dir.path().join("PREVIEW_123.pdf").exists());
        assert!(!dir.path().join("PREVIEW_456.pdf").exists());
        assert!(dir.path().join("manifest.json").exists());
    }
}
