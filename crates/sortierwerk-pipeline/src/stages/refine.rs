// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Refine stage: run every stored master through the configured content
// transformations on a bounded worker pool.
//
// Routing is by extension. PDFs are flattened or given an OCR text layer,
// images are downscaled and optionally wrapped into single-page PDFs,
// Office archives get their author metadata scrubbed. Whatever happens,
// every master ends the stage with an artifact in the redistribution
// cache: when a transform fails or none applies, the file is copied
// verbatim into its routed folder under its own name.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crossbeam_channel::unbounded;
use tracing::{info, instrument, warn};

use sortierwerk_core::types::{
    ArtifactKind, FileOutcome, PdfMode, PipelineStage, RefineOptions, RefineReport, StatCategory,
};
use sortierwerk_core::{
    ColorHint, ControlGate, EngineConfig, EventSink, Result, SlotReporter, SortierwerkError,
};
use sortierwerk_document::ImageProcessor;
use sortierwerk_document::image::processor::REFINED_JPEG_QUALITY;
use sortierwerk_document::office::sanitizer::scrub_creator_metadata;
use sortierwerk_document::pdf::flatten;
use sortierwerk_document::pdf::writer::image_to_pdf;

#[cfg(feature = "ocr")]
use sortierwerk_document::OcrEngine;
#[cfg(feature = "ocr")]
use sortierwerk_document::ocr;

use crate::pool;
use crate::store;
use crate::workspace::Workspace;

/// Shared, read-only state handed to every pool worker.
struct TaskContext<'a> {
    sink: &'a EventSink,
    gate: &'a ControlGate,
    options: &'a RefineOptions,
    resize_width: u32,
    cache_root: PathBuf,
    #[cfg(feature = "ocr")]
    engine: Option<&'a OcrEngine>,
}

/// Run the refine stage over every file in the masters folder.
#[instrument(skip_all, fields(workspace = %workspace.root().display()))]
pub fn run(
    sink: &EventSink,
    gate: &ControlGate,
    workspace: &Workspace,
    options: &RefineOptions,
    config: &EngineConfig,
) -> Result<RefineReport> {
    options.validate()?;
    ensure_ocr_usable(options)?;
    #[cfg(feature = "ocr")]
    let engine = match options.pdf_mode {
        PdfMode::Ocr => Some(OcrEngine::with_defaults()?),
        _ => None,
    };

    let started = Instant::now();
    sink.log(format!(
        "Refinement Start. Opts: resize={}, img2pdf={}, sanitize={}, pdf_mode={}, dpi={}",
        options.resize, options.img2pdf, options.sanitize, options.pdf_mode, options.dpi
    ));
    store::save_status(workspace, PipelineStage::Processing, "Refining...")?;

    let files = masters(workspace)?;
    let total = files.len();
    std::fs::create_dir_all(workspace.ready_dir())?;

    let workers = pool::worker_count(config.max_threads);
    if config.max_threads > 0 {
        sink.log(format!("Manual Worker Override: {workers}"));
    } else {
        sink.log(format!("Auto-Throttled Workers: {workers}"));
    }
    sink.worker_config(workers);

    let (task_tx, task_rx) = unbounded::<PathBuf>();
    let (out_tx, out_rx) = unbounded::<FileOutcome>();
    // The whole queue is loaded before any worker starts, so the senders
    // can be dropped here and workers drain until the channel is empty.
    for file in files {
        let _ = task_tx.send(file);
    }
    drop(task_tx);

    let ctx = TaskContext {
        sink,
        gate,
        options,
        resize_width: config.resize_width,
        cache_root: workspace.ready_dir(),
        #[cfg(feature = "ocr")]
        engine: engine.as_ref(),
    };
    let ctx = &ctx;

    let mut report = RefineReport::default();
    std::thread::scope(|scope| {
        for worker_id in 0..workers {
            let task_rx = task_rx.clone();
            let out_tx = out_tx.clone();
            let slot = SlotReporter::new(sink.clone(), worker_id);
            scope.spawn(move || {
                for path in task_rx.iter() {
                    if ctx.gate.is_stopped() {
                        break;
                    }
                    match process_file(ctx, &slot, &path) {
                        Ok(outcome) => {
                            let _ = out_tx.send(outcome);
                        }
                        // Only Stopped escapes process_file.
                        Err(_) => break,
                    }
                }
            });
        }
        drop(out_tx);

        for (done, outcome) in out_rx.iter().enumerate() {
            sink.progress_main(
                done as f32 / total as f32 * 100.0,
                format!("Refining {}/{}", done + 1, total),
            );
            report.outcomes.push(outcome);
        }
    });

    if gate.is_stopped() {
        return Err(SortierwerkError::Stopped);
    }

    store::merge_stat_time(workspace, StatCategory::Batch, started.elapsed().as_secs_f64())?;
    store::save_status(workspace, PipelineStage::Processed, "Complete")?;

    sink.job_data(workspace.root());
    sink.progress_main(100.0, "Done");
    sink.done();
    sink.notify(
        "Batch Complete",
        "Batch processing finished.",
        Some(workspace.ready_dir()),
    );
    info!(
        total,
        succeeded = report.succeeded(),
        failed = report.failed(),
        reclaimed = report.bytes_reclaimed(),
        "refine complete"
    );
    Ok(report)
}

/// Files in the masters folder, sorted for a stable processing order.
fn masters(workspace: &Workspace) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(workspace.masters_dir())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(feature = "ocr")]
fn ensure_ocr_usable(options: &RefineOptions) -> Result<()> {
    if options.pdf_mode == PdfMode::Ocr && !ocr::models_available() {
        return Err(SortierwerkError::OcrError(format!(
            "recognition models not found in {}",
            ocr::model_directory().display()
        )));
    }
    Ok(())
}

#[cfg(not(feature = "ocr"))]
fn ensure_ocr_usable(options: &RefineOptions) -> Result<()> {
    if options.pdf_mode == PdfMode::Ocr {
        return Err(SortierwerkError::Config(
            "OCR mode requires a build with the ocr feature".to_owned(),
        ));
    }
    Ok(())
}

// -- Per-file processing ----------------------------------------------------

/// Where one master's artifacts land in the redistribution cache.
struct Route {
    /// Routed cache folder for this file.
    dir: PathBuf,
    /// `dir` plus the original filename; target of the verbatim net.
    verbatim: PathBuf,
    /// The artifact whose presence and size the outcome reports. Differs
    /// from `verbatim` only when img2pdf runs without resize.
    primary: PathBuf,
}

fn route_for(ctx: &TaskContext<'_>, path: &Path, name: &str) -> Route {
    let ext = extension_of(path);
    let kind = match ext.as_str() {
        "pdf" => match ctx.options.pdf_mode {
            PdfMode::Flatten => ArtifactKind::Flattened,
            PdfMode::Ocr => ArtifactKind::Ocr,
            PdfMode::None => ArtifactKind::Standard,
        },
        "jpg" | "jpeg" | "png" if ctx.options.resize || ctx.options.img2pdf => {
            ArtifactKind::Resized
        }
        "docx" | "xlsx" if ctx.options.sanitize => ArtifactKind::Sanitized,
        _ => ArtifactKind::Standard,
    };

    let dir = ctx.cache_root.join(kind.dir_name());
    let verbatim = dir.join(name);
    let primary = if kind == ArtifactKind::Resized && !ctx.options.resize {
        // img2pdf without resize: the wrapped PDF is the only product.
        dir.join(format!("{}.pdf", stem_of(path)))
    } else {
        verbatim.clone()
    };
    Route { dir, verbatim, primary }
}

/// Transform one master, guaranteeing an artifact lands in its routed
/// cache folder.
///
/// # Errors
///
/// Only `SortierwerkError::Stopped` escapes. Every other failure is
/// recorded on the returned outcome after the verbatim net has run.
fn process_file(ctx: &TaskContext<'_>, slot: &SlotReporter, path: &Path) -> Result<FileOutcome> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    ctx.sink.status_change(
        PipelineStage::Processing,
        format!("Refining: {name}"),
        ColorHint::Blue,
    );

    let orig_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let route = route_for(ctx, path, &name);

    let mut error = None;
    match std::fs::create_dir_all(&route.dir) {
        Ok(()) => transform(ctx, slot, path, &route, &mut error)?,
        Err(err) => error = Some(err.to_string()),
    }
    if let Some(msg) = &error {
        ctx.sink.log_error(format!("Err {name}: {msg}"));
    }

    if !route.primary.exists() && !route.verbatim.exists() {
        if let Err(err) = std::fs::copy(path, &route.verbatim) {
            warn!(file = %path.display(), %err, "verbatim fallback copy failed");
            if error.is_none() {
                error = Some(err.to_string());
            }
        }
    }

    let artifact = if route.primary.exists() {
        Some(&route.primary)
    } else if route.verbatim.exists() {
        Some(&route.verbatim)
    } else {
        None
    };
    let new_size = artifact
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(FileOutcome {
        file: name,
        orig_size,
        new_size,
        ok: artifact.is_some(),
        error,
    })
}

/// Run the routed transforms, propagating stops and recording the first
/// non-stop failure into `error`.
fn transform(
    ctx: &TaskContext<'_>,
    slot: &SlotReporter,
    path: &Path,
    route: &Route,
    error: &mut Option<String>,
) -> Result<()> {
    let ext = extension_of(path);
    match ext.as_str() {
        "pdf" => match ctx.options.pdf_mode {
            PdfMode::Flatten => absorb(
                flatten::flatten_pdf(path, &route.verbatim, ctx.options.dpi, ctx.gate, slot),
                error,
            ),
            PdfMode::Ocr => absorb(ocr_to(ctx, slot, path, &route.verbatim), error),
            PdfMode::None => Ok(()),
        },
        "jpg" | "jpeg" | "png" => {
            if ctx.options.resize {
                absorb(resize_image(ctx, slot, path, &route.verbatim), error)?;
            }
            if ctx.options.img2pdf {
                let target = route.dir.join(format!("{}.pdf", stem_of(path)));
                absorb(wrap_image(ctx, slot, path, &target), error)?;
            }
            Ok(())
        }
        "docx" | "xlsx" if ctx.options.sanitize => {
            ctx.gate.check(slot)?;
            slot.update(Some(50.0), "Sanitizing...");
            absorb(
                scrub_creator_metadata(path, &route.verbatim).map(|_| ()),
                error,
            )
        }
        _ => Ok(()),
    }
}

/// Downscale into a JPEG at the original filename, never upscaling.
fn resize_image(
    ctx: &TaskContext<'_>,
    slot: &SlotReporter,
    source: &Path,
    dest: &Path,
) -> Result<()> {
    ctx.gate.check(slot)?;
    slot.update(Some(50.0), "Processing Image...");
    let jpeg = ImageProcessor::open(source)?
        .shrink_to_width(ctx.resize_width)
        .to_jpeg_bytes(REFINED_JPEG_QUALITY)?;
    std::fs::write(dest, jpeg)?;
    Ok(())
}

/// Wrap the full-size source image into a single-page PDF.
fn wrap_image(
    ctx: &TaskContext<'_>,
    slot: &SlotReporter,
    source: &Path,
    dest: &Path,
) -> Result<()> {
    ctx.gate.check(slot)?;
    slot.update(Some(50.0), "Converting...");
    let bytes = std::fs::read(source)?;
    let pdf = image_to_pdf(stem_of(source), &bytes)?;
    std::fs::write(dest, pdf)?;
    Ok(())
}

#[cfg(feature = "ocr")]
fn ocr_to(
    ctx: &TaskContext<'_>,
    slot: &SlotReporter,
    source: &Path,
    dest: &Path,
) -> Result<()> {
    let engine = ctx.engine.ok_or_else(|| {
        SortierwerkError::OcrError("recognition engine was not initialised".to_owned())
    })?;
    flatten::ocr_pdf(source, dest, ctx.options.dpi, engine, ctx.gate, slot)
}

#[cfg(not(feature = "ocr"))]
fn ocr_to(
    _ctx: &TaskContext<'_>,
    _slot: &SlotReporter,
    _source: &Path,
    _dest: &Path,
) -> Result<()> {
    // Unreachable in practice; run() rejects OCR mode on non-ocr builds.
    Err(SortierwerkError::Config(
        "OCR mode requires a build with the ocr feature".to_owned(),
    ))
}

/// Propagate stops, swallow other failures into `error`.
fn absorb(step: Result<()>, error: &mut Option<String>) -> Result<()> {
    match step {
        Ok(()) => Ok(()),
        Err(SortierwerkError::Stopped) => Err(SortierwerkError::Stopped),
        Err(err) => {
            if error.is_none() {
                *error = Some(err.to_string());
            }
            Ok(())
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_owned())
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
