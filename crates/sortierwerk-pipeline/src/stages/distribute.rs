// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Distribute stage: rebuild the original folder tree with every copy
// replaced by its refined artifact.
//
// Each manifest entry resolves to a source (preferred artifact, stored
// master, or a file from an external override folder matched by id tag)
// and that source is copied to every recorded copy location under
// Final_Delivery, with the extension following the source format.
// Quarantined files are mirrored into a marked subfolder afterwards.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, instrument};

use sortierwerk_core::types::{ExportPriority, ManifestEntry, PipelineStage, StatCategory};
use sortierwerk_core::{ControlGate, EventSink, Result, SlotReporter, SortierwerkError};

use crate::resolver;
use crate::store;
use crate::workspace::{DELIVERY_QUARANTINE_DIR, Workspace};

/// Run the distribute stage, returning the delivery folder.
#[instrument(skip_all, fields(workspace = %workspace.root().display(), %priority))]
pub fn run(
    sink: &EventSink,
    gate: &ControlGate,
    workspace: &Workspace,
    external_source: Option<&Path>,
    priority: ExportPriority,
) -> Result<PathBuf> {
    if !workspace.manifest_path().exists() {
        sink.log_error("CRITICAL: Manifest missing.");
        return Err(SortierwerkError::ManifestMissing(
            workspace.manifest_path().display().to_string(),
        ));
    }

    let started = Instant::now();
    let delivery = workspace.delivery_dir();
    sink.log(format!("Reconstruction Start ({priority})"));
    store::save_status(workspace, PipelineStage::Distributing, "Reconstructing...")?;

    let manifest = store::load_manifest(workspace)?;
    let total = manifest.len();
    let external = match external_source {
        Some(dir) => external_files(dir)?,
        None => Vec::new(),
    };

    sink.worker_config(1);
    let slot = SlotReporter::new(sink.clone(), 0);

    for (index, (_, entry)) in manifest.iter().enumerate() {
        gate.check(&slot)?;
        sink.progress_main(
            index as f32 / total as f32 * 100.0,
            format!("Recon {}", index + 1),
        );
        slot.force(None, format!("Copying: {}", entry.display_name()));

        let ManifestEntry::Ok { copies, uid, id, .. } = entry else {
            continue;
        };

        let source = if external_source.is_some() {
            external
                .iter()
                .find(|(name, _)| name.starts_with(id.as_str()))
                .map(|(_, path)| path.clone())
        } else {
            resolver::resolve_source(workspace, uid, priority)
        };
        let Some(source) = source else {
            debug!(%uid, "no source resolved, skipping entry");
            continue;
        };

        let source_ext = source.extension().unwrap_or_default();
        for copy in copies {
            let target = delivery.join(copy);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&source, target.with_extension(source_ext))?;
        }
    }

    mirror_quarantine(workspace, &delivery)?;

    store::merge_stat_time(
        workspace,
        StatCategory::Distribute,
        started.elapsed().as_secs_f64(),
    )?;
    store::save_status(workspace, PipelineStage::Distributed, "Done")?;

    sink.job_data(workspace.root());
    sink.progress_main(100.0, "Done");
    sink.done();
    sink.notify(
        "Distribution Complete",
        "Reconstruction finished.",
        Some(delivery.clone()),
    );
    info!(total, "distribute complete");
    Ok(delivery)
}

/// Files in the external override folder, name-sorted so id-prefix
/// matching picks a stable winner.
fn external_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files: Vec<(String, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect();
    files.sort();
    Ok(files)
}

/// Copy the workspace quarantine into a marked folder under the delivery
/// tree so unprocessable files stay visible to the recipient.
fn mirror_quarantine(workspace: &Workspace, delivery: &Path) -> Result<()> {
    let quarantine = workspace.quarantine_dir();
    if !quarantine.exists() {
        return Ok(());
    }
    let mirror = delivery.join(DELIVERY_QUARANTINE_DIR);
    std::fs::create_dir_all(&mirror)?;
    for entry in std::fs::read_dir(quarantine)?.filter_map(|e| e.ok()) {
        if entry.path().is_file() {
            std::fs::copy(entry.path(), mirror.join(entry.file_name()))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
