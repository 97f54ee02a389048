// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Organize stage: export one copy of every unique document into a flat
// folder, plus a CSV listing where the duplicates lived.
//
// Each master resolves to its preferred artifact (or the stored master)
// and is copied out under its original filename, with the extension
// swapped when refinement changed the format and a numeric suffix when
// two masters share a name. Quarantined files surface in their own
// subfolder so nothing silently disappears.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, instrument, warn};

use sortierwerk_core::types::{
    ExportPriority, ManifestEntry, PipelineStage, StatCategory, sanitize_filename,
};
use sortierwerk_core::{ControlGate, EventSink, Result, SlotReporter, SortierwerkError};

use crate::resolver;
use crate::store;
use crate::workspace::{DUPLICATES_REPORT, Workspace};

/// Run the organize stage, returning the output folder.
#[instrument(skip_all, fields(workspace = %workspace.root().display(), %priority))]
pub fn run(
    sink: &EventSink,
    gate: &ControlGate,
    workspace: &Workspace,
    priority: ExportPriority,
) -> Result<PathBuf> {
    let started = Instant::now();
    let out_dir = workspace.organized_dir();
    std::fs::create_dir_all(workspace.unique_masters_dir())?;
    std::fs::create_dir_all(workspace.organized_quarantine_dir())?;

    sink.log(format!("Unique Export ({priority})"));
    let manifest = store::load_manifest(workspace)?;
    let total = manifest.len();

    sink.worker_config(1);
    let slot = SlotReporter::new(sink.clone(), 0);

    let mut writer = csv::Writer::from_path(out_dir.join(DUPLICATES_REPORT))
        .map_err(|err| SortierwerkError::Export(err.to_string()))?;
    writer
        .write_record(["Master_Filename", "Duplicate_Location"])
        .map_err(|err| SortierwerkError::Export(err.to_string()))?;

    for (index, (_, entry)) in manifest.iter().enumerate() {
        gate.check(&slot)?;
        sink.progress_main(index as f32 / total as f32 * 100.0, "Exporting Unique...");
        slot.force(None, format!("Exporting: {}", entry.display_name()));

        match entry {
            ManifestEntry::Quarantine { orig_name, .. } => {
                surface_quarantined(workspace, orig_name)?;
            }
            ManifestEntry::Ok {
                master,
                copies,
                name,
                uid,
                ..
            } => {
                if let Some(source) = resolver::resolve_source(workspace, uid, priority) {
                    let out_name = output_name(name, &source);
                    let target = collision_free(&workspace.unique_masters_dir(), &out_name);
                    std::fs::copy(&source, &target)?;
                } else {
                    warn!(%uid, "no artifact or master on disk, skipping");
                }

                if copies.len() > 1 {
                    for copy in copies {
                        if copy != master {
                            writer
                                .write_record([name.as_str(), copy.as_str()])
                                .map_err(|err| SortierwerkError::Export(err.to_string()))?;
                        }
                    }
                }
            }
        }
    }
    writer
        .flush()
        .map_err(|err| SortierwerkError::Export(err.to_string()))?;

    store::merge_stat_time(workspace, StatCategory::Organize, started.elapsed().as_secs_f64())?;
    store::save_status(workspace, PipelineStage::Organized, "Done")?;

    sink.job_data(workspace.root());
    sink.progress_main(100.0, "Done");
    sink.done();
    sink.notify("Organization Complete", "Files organized.", Some(out_dir.clone()));
    info!(total, "organize complete");
    Ok(out_dir)
}

/// Copy every quarantine file belonging to `orig_name` into the organized
/// quarantine folder, keeping the stored collision-proof filename.
///
/// Quarantine filenames embed the sanitized original name, so the match
/// runs against the sanitized form.
fn surface_quarantined(workspace: &Workspace, orig_name: &str) -> Result<()> {
    let needle = sanitize_filename(orig_name);
    for entry in std::fs::read_dir(workspace.quarantine_dir())?.filter_map(|e| e.ok()) {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.contains(&needle) {
            std::fs::copy(
                entry.path(),
                workspace.organized_quarantine_dir().join(&file_name),
            )?;
        }
    }
    Ok(())
}

/// Output filename for a resolved source: the manifest name, with its
/// extension swapped to the source's when refinement changed the format.
fn output_name(name: &str, source: &Path) -> String {
    let name_path = Path::new(name);
    let source_ext = source.extension().and_then(|e| e.to_str());
    if source_ext == name_path.extension().and_then(|e| e.to_str()) {
        return name.to_owned();
    }
    let stem = name_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    match source_ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_owned(),
    }
}

/// First non-existing `{stem}_{n}{.ext}` variant of `name` under `dir`.
fn collision_free(dir: &Path, name: &str) -> PathBuf {
    let target = dir.join(name);
    if !target.exists() {
        return target;
    }
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let suffix = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let mut counter = 1;
    loop {
        let candidate = dir.join(format!("{stem}_{counter}{suffix}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
