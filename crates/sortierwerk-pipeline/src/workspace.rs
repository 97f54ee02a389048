// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Workspace directory layout.
//
// A workspace is one ingest job's isolated working directory. The numbered
// folder names and the three JSON files are contract surface: external
// tooling reads a finished workspace by these exact names.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use sortierwerk_core::types::ArtifactKind;
use sortierwerk_core::{Result, SortierwerkError};

pub const QUARANTINE_DIR: &str = "00_Quarantine";
pub const MASTERS_DIR: &str = "01_Master_Files";
pub const READY_DIR: &str = "02_Ready_For_Redistribution";
pub const ORGANIZED_DIR: &str = "03_Organized_Output";
pub const UNIQUE_MASTERS_DIR: &str = "Unique_Masters";
pub const ORGANIZED_QUARANTINE_DIR: &str = "Quarantine";
pub const REPORTS_DIR: &str = "04_Reports";
pub const DELIVERY_DIR: &str = "Final_Delivery";
pub const DELIVERY_QUARANTINE_DIR: &str = "_QUARANTINED_FILES";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const STATS_FILE: &str = "stats.json";
pub const STATUS_FILE: &str = "status.json";
pub const DUPLICATES_REPORT: &str = "duplicates_report.csv";
pub const INVENTORY_REPORT: &str = "Full_Inventory_Manifest.csv";

/// Handle on one job's working directory under a workspaces root.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create `{source name}_{timestamp}` under `workspaces_root` with the
    /// quarantine and master folders ready for ingest.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directories cannot be created.
    pub fn create(workspaces_root: &Path, source_dir: &Path) -> Result<Self> {
        let source_name = source_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_owned());
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let root = workspaces_root.join(format!("{source_name}_{stamp}"));
        std::fs::create_dir_all(root.join(MASTERS_DIR))?;
        std::fs::create_dir_all(root.join(QUARANTINE_DIR))?;
        info!(workspace = %root.display(), "created workspace");
        Ok(Self { root })
    }

    /// Wrap an existing workspace directory.
    ///
    /// # Errors
    ///
    /// Returns `SortierwerkError::Workspace` if `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SortierwerkError::Workspace(format!(
                "not a workspace directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.root.join(QUARANTINE_DIR)
    }

    pub fn masters_dir(&self) -> PathBuf {
        self.root.join(MASTERS_DIR)
    }

    /// Staging root for derived artifacts.
    pub fn ready_dir(&self) -> PathBuf {
        self.root.join(READY_DIR)
    }

    /// Cache folder for one artifact kind under the staging root.
    pub fn artifact_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.ready_dir().join(kind.dir_name())
    }

    pub fn organized_dir(&self) -> PathBuf {
        self.root.join(ORGANIZED_DIR)
    }

    pub fn unique_masters_dir(&self) -> PathBuf {
        self.organized_dir().join(UNIQUE_MASTERS_DIR)
    }

    pub fn organized_quarantine_dir(&self) -> PathBuf {
        self.organized_dir().join(ORGANIZED_QUARANTINE_DIR)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    pub fn delivery_dir(&self) -> PathBuf {
        self.root.join(DELIVERY_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.root.join(STATS_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join(STATUS_FILE)
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_names_after_source_with_timestamp() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("Scans Q3");
        std::fs::create_dir(&source).expect("source dir");

        let workspace =
            Workspace::create(&dir.path().join("Workspaces"), &source).expect("create workspace");
        let name = workspace
            .root()
            .file_name()
            .and_then(|n| n.to_str())
            .expect("workspace name");

        assert!(name.starts_with("Scans Q3_"), "got: {name}");
        // %Y%m%d_%H%M%S
        assert_eq!(name.len(), "Scans Q3_".len() + 15);
        assert!(workspace.masters_dir().is_dir());
        assert!(workspace.quarantine_dir().is_dir());
    }

    #[test]
    fn open_rejects_missing_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(Workspace::open(dir.path().join("absent")).is_err());
        assert!(Workspace::open(dir.path()).is_ok());
    }

    #[test]
    fn layout_paths_use_the_contract_names() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workspace = Workspace::open(dir.path()).expect("open workspace");

        assert!(workspace.quarantine_dir().ends_with("00_Quarantine"));
        assert!(workspace.masters_dir().ends_with("01_Master_Files"));
        assert!(
            workspace
                .artifact_dir(ArtifactKind::Ocr)
                .ends_with("02_Ready_For_Redistribution/OCR")
        );
        assert!(
            workspace
                .unique_masters_dir()
                .ends_with("03_Organized_Output/Unique_Masters")
        );
        assert!(workspace.manifest_path().ends_with("manifest.json"));
    }
}
