// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Debug export stage: bundle the engine configuration and the active
// job's bookkeeping files into a zip an operator can attach to a support
// request.
//
// The bundle is streamed straight into the archive. Missing files are
// skipped; a file that exists but cannot be read becomes an _ERROR.txt
// entry holding the error text, so the bundle itself reports what could
// not be collected.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, instrument, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use sortierwerk_core::{EngineConfig, EventSink, Result, SortierwerkError};

use crate::workspace::Workspace;

/// Write the debug bundle, returning the zip path.
///
/// `dest` is probed for writability first; an unwritable destination
/// falls back to the system temp directory rather than failing.
#[instrument(skip_all, fields(dest = %dest.display()))]
pub fn run(
    sink: &EventSink,
    config: &EngineConfig,
    workspace: Option<&Workspace>,
    dest: &Path,
) -> Result<PathBuf> {
    let base = writable_or_temp(dest);
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let zip_path = base.join(format!("Debug_Bundle_{stamp}.zip"));

    let file = File::create(&zip_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("config.json", options).map_err(zip_err)?;
    zip.write_all(serde_json::to_string_pretty(config)?.as_bytes())?;

    if let Some(workspace) = workspace {
        bundle_file(
            &mut zip,
            options,
            &workspace.manifest_path(),
            "current_job_manifest.json",
        )?;
        bundle_file(
            &mut zip,
            options,
            &workspace.stats_path(),
            "current_job_stats.json",
        )?;
        bundle_file(
            &mut zip,
            options,
            &workspace.status_path(),
            "current_job_status.json",
        )?;
    }

    let mut inner = zip.finish().map_err(zip_err)?;
    inner.flush()?;

    let zip_name = zip_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    sink.notify("Debug Export", format!("Saved to {zip_name}"), Some(base));
    sink.done();
    info!(path = %zip_path.display(), "debug bundle written");
    Ok(zip_path)
}

/// `dest` if a probe file can be written there, else the system temp dir.
fn writable_or_temp(dest: &Path) -> PathBuf {
    let probe = dest.join("write_test.tmp");
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            dest.to_path_buf()
        }
        Err(err) => {
            warn!(dir = %dest.display(), %err, "destination not writable, using temp dir");
            std::env::temp_dir()
        }
    }
}

/// Add one file to the bundle under `entry_name`. Absent files are
/// skipped; unreadable files become an error-text entry instead.
fn bundle_file<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    options: SimpleFileOptions,
    source: &Path,
    entry_name: &str,
) -> Result<()> {
    if !source.exists() {
        return Ok(());
    }
    match std::fs::read(source) {
        Ok(data) => {
            zip.start_file(entry_name, options).map_err(zip_err)?;
            zip.write_all(&data)?;
        }
        Err(err) => {
            zip.start_file(format!("{entry_name}_ERROR.txt"), options)
                .map_err(zip_err)?;
            zip.write_all(err.to_string().as_bytes())?;
        }
    }
    Ok(())
}

fn zip_err(err: zip::result::ZipError) -> SortierwerkError {
    SortierwerkError::Export(err.to_string())
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn entry_names(path: &Path) -> Vec<String> {
        let file = File::open(path).expect("open zip");
        let archive = ZipArchive::new(file).expect("parse zip");
        archive.file_names().map(str::to_owned).collect()
    }

    #[test]
    fn bundle_holds_config_and_job_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workspace = Workspace::create(&dir.path().join("ws"), &dir.path().join("in"))
            .expect("workspace");
        std::fs::write(workspace.manifest_path(), b"{}").expect("manifest");
        std::fs::write(workspace.stats_path(), b"{}").expect("stats");
        // No status.json: the entry should simply be absent.

        let (sink, _rx) = sortierwerk_core::events::channel();
        let zip_path = run(
            &sink,
            &EngineConfig::default(),
            Some(&workspace),
            dir.path(),
        )
        .expect("bundle");

        let mut names = entry_names(&zip_path);
        names.sort();
        assert_eq!(
            names,
            vec![
                "config.json",
                "current_job_manifest.json",
                "current_job_stats.json",
            ]
        );
    }

    #[test]
    fn unreadable_file_becomes_an_error_entry() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workspace = Workspace::create(&dir.path().join("ws"), &dir.path().join("in"))
            .expect("workspace");
        // A directory at the manifest path exists but cannot be read as a file.
        std::fs::create_dir(workspace.manifest_path()).expect("dir at manifest path");

        let (sink, _rx) = sortierwerk_core::events::channel();
        let zip_path = run(
            &sink,
            &EngineConfig::default(),
            Some(&workspace),
            dir.path(),
        )
        .expect("bundle");

        let file = File::open(&zip_path).expect("open zip");
        let mut archive = ZipArchive::new(file).expect("parse zip");
        let mut entry = archive
            .by_name("current_job_manifest.json_ERROR.txt")
            .expect("error entry");
        let mut text = String::new();
        entry.read_to_string(&mut text).expect("read error text");
        assert!(!text.is_empty());
    }

    #[test]
    fn unwritable_destination_falls_back_to_temp() {
        let dir = tempfile::tempdir().expect("temp dir");
        let base = writable_or_temp(&dir.path().join("does/not/exist"));
        assert_eq!(base, std::env::temp_dir());

        let base = writable_or_temp(dir.path());
        assert_eq!(base, dir.path());
        assert!(!dir.path().join("write_test.tmp").exists());
    }
}
