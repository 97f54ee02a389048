// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON persistence for a workspace's manifest, stats, and status files.
//
// All three files are pretty-printed so operators can inspect a workspace
// with a text editor; they are small enough that atomicity is not a concern
// beyond writing them whole.

use std::fs;

use chrono::Local;
use tracing::debug;

use sortierwerk_core::types::{JobStatus, PipelineStage, StatCategory, WorkspaceStats};
use sortierwerk_core::{Result, SortierwerkError};

use crate::manifest::Manifest;
use crate::workspace::Workspace;

/// Load the workspace manifest.
///
/// # Errors
///
/// Returns `SortierwerkError::ManifestMissing` when no manifest has been
/// written yet; stages that require one surface this to the operator.
pub fn load_manifest(workspace: &Workspace) -> Result<Manifest> {
    let path = workspace.manifest_path();
    if !path.exists() {
        return Err(SortierwerkError::ManifestMissing(
            path.display().to_string(),
        ));
    }
    let raw = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_manifest(workspace: &Workspace, manifest: &Manifest) -> Result<()> {
    let raw = serde_json::to_string_pretty(manifest)?;
    fs::write(workspace.manifest_path(), raw)?;
    Ok(())
}

/// Load stats, defaulting to zeroes when the file does not exist.
pub fn load_stats(workspace: &Workspace) -> Result<WorkspaceStats> {
    let path = workspace.stats_path();
    if !path.exists() {
        return Ok(WorkspaceStats::default());
    }
    let raw = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_stats(workspace: &Workspace, stats: &WorkspaceStats) -> Result<()> {
    let raw = serde_json::to_string_pretty(stats)?;
    fs::write(workspace.stats_path(), raw)?;
    Ok(())
}

/// Add elapsed seconds into one stat category.
///
/// A no-op when the workspace has no stats file yet: only ingest creates
/// one, and a timing delta without a baseline is meaningless.
pub fn merge_stat_time(workspace: &Workspace, category: StatCategory, seconds: f64) -> Result<()> {
    if !workspace.stats_path().exists() {
        debug!(?category, "no stats file, skipping time merge");
        return Ok(());
    }
    let mut stats = load_stats(workspace)?;
    stats.add_time(category, seconds);
    save_stats(workspace, &stats)
}

/// Write the status file, stamping the current local time.
pub fn save_status(
    workspace: &Workspace,
    stage: PipelineStage,
    details: impl Into<String>,
) -> Result<()> {
    let status = JobStatus {
        stage,
        details: details.into(),
        last_update: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };
    let raw = serde_json::to_string_pretty(&status)?;
    fs::write(workspace.status_path(), raw)?;
    Ok(())
}

/// Load the status file, `None` when no stage has run yet.
pub fn load_status(workspace: &Workspace) -> Result<Option<JobStatus>> {
    let path = workspace.status_path();
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
