// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Best-source resolution for export stages.
//
// Organize and Distribute both ask the same question: "which on-disk file is
// the best version of master X?". Derived artifacts may carry a different
// extension than the master (an image refined into a PDF, say), so lookup is
// two-tier: exact uid filename first, then first entry with a matching stem.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::trace;

use sortierwerk_core::types::{ArtifactKind, ExportPriority};

use crate::workspace::Workspace;

/// Pick the artifact that best satisfies `priority` for one master `uid`.
///
/// `Auto` walks the artifact folders in refinement precedence and falls back
/// to the stored master; forced modes search exactly one folder before the
/// master fallback, except `ForceOriginal`, which only ever answers with the
/// master. Returns `None` when nothing usable exists on disk.
pub fn resolve_source(
    workspace: &Workspace,
    uid: &str,
    priority: ExportPriority,
) -> Option<PathBuf> {
    let master = workspace.masters_dir().join(uid);
    let found = match priority {
        ExportPriority::Auto => ArtifactKind::AUTO_PRECEDENCE
            .iter()
            .find_map(|kind| find_in_dir(&workspace.artifact_dir(*kind), uid)),
        ExportPriority::ForceOcr => find_in_dir(&workspace.artifact_dir(ArtifactKind::Ocr), uid),
        ExportPriority::ForceFlattened => {
            find_in_dir(&workspace.artifact_dir(ArtifactKind::Flattened), uid)
        }
        ExportPriority::ForceOriginal => None,
    };
    if let Some(path) = found {
        trace!(uid, path = %path.display(), "resolved derived artifact");
        return Some(path);
    }
    master.exists().then_some(master)
}

/// Exact uid match, then first directory entry sharing the uid's stem.
fn find_in_dir(dir: &Path, uid: &str) -> Option<PathBuf> {
    let exact = dir.join(uid);
    if exact.exists() {
        return Some(exact);
    }
    let stem = Path::new(uid).file_stem()?.to_owned();
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.file_stem() == Some(stem.as_os_str()) && path.is_file())
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
