// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ingest stage: scan a source tree into a fresh deduplicated workspace.
//
// Two passes. The scan pass fingerprints every supported file and groups
// copies by digest (first seen becomes the master); unusable files are
// copied into quarantine as they occur. The tagging pass then numbers the
// masters in manifest order and copies each into the workspace. A stop
// anywhere leaves the workspace directory on disk but persists no manifest
// or stats, and the status never advances past Scanning, so a half-scanned
// job cannot look finished.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, instrument, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use sortierwerk_core::types::{
    HashVerdict, IngestMode, ManifestEntry, PipelineStage, WorkspaceStats, is_supported_extension,
    master_id, master_uid, sanitize_filename,
};
use sortierwerk_core::{ControlGate, EventSink, Result, SlotReporter};

use crate::hasher;
use crate::manifest::Manifest;
use crate::store;
use crate::workspace::Workspace;

/// Run the ingest stage, returning the freshly created workspace.
#[instrument(skip_all, fields(source = %source_dir.display(), %mode))]
pub fn run(
    sink: &EventSink,
    gate: &ControlGate,
    workspaces_root: &Path,
    source_dir: &Path,
    mode: IngestMode,
) -> Result<Workspace> {
    let started = Instant::now();
    let workspace = Workspace::create(workspaces_root, source_dir)?;
    sink.job_data(workspace.root());
    sink.log(format!("Inventory Start: {}", source_dir.display()));
    store::save_status(&workspace, PipelineStage::Scanning, "Ingesting...")?;

    let files = enumerate_sources(source_dir);
    let total = files.len();
    info!(total, "enumerated source files");

    sink.worker_config(1);
    let slot = SlotReporter::new(sink.clone(), 0);

    let mut manifest = Manifest::new();
    let mut quarantined: u64 = 0;

    for (index, path) in files.iter().enumerate() {
        gate.check(&slot)?;
        sink.progress_main(
            index as f32 / total as f32 * 100.0,
            format!("Scanning {index}/{total}"),
        );
        let name = display_name(path);
        slot.update(None, format!("Hashing: {name}"));

        match hasher::fingerprint(path, mode) {
            HashVerdict::Hashed(fingerprint) => {
                let rel = relative_to(path, source_dir);
                if let Some(ManifestEntry::Ok { copies, .. }) =
                    manifest.get_mut(&fingerprint.digest)
                {
                    copies.push(rel);
                } else {
                    manifest.insert(
                        fingerprint.digest.clone(),
                        ManifestEntry::Ok {
                            master: rel.clone(),
                            copies: vec![rel],
                            name,
                            root: source_dir.display().to_string(),
                            uid: String::new(),
                            id: String::new(),
                            trust: fingerprint.trust,
                        },
                    );
                }
            }
            HashVerdict::Quarantined { reason } => {
                sink.log_error(format!("Quarantine: {name}"));
                quarantine_file(&workspace, path, &name);
                manifest.insert(
                    Uuid::new_v4().to_string(),
                    ManifestEntry::Quarantine {
                        orig_name: name,
                        error_reason: reason,
                    },
                );
                quarantined += 1;
            }
        }
    }

    gate.check(&slot)?;
    sink.log("Tagging...");
    let tagged = tag_masters(
        gate,
        &slot,
        &mut manifest,
        source_dir,
        &workspace.masters_dir(),
    )?;

    let masters = tagged as u64;
    let stats = WorkspaceStats {
        ingest_time: started.elapsed().as_secs_f64(),
        masters,
        quarantined,
        total_scanned: total as u64,
        ..WorkspaceStats::default()
    };
    store::save_manifest(&workspace, &manifest)?;
    store::save_stats(&workspace, &stats)?;
    store::save_status(
        &workspace,
        PipelineStage::Ingested,
        format!("Masters: {masters}"),
    )?;

    sink.log(format!("Done. Masters: {masters}"));
    sink.job_data(workspace.root());
    sink.done();
    info!(masters, quarantined, total, "ingest complete");
    Ok(workspace)
}

/// Number the masters in manifest order and copy each into the workspace.
/// Checked at the gate per master, so a stop during tagging halts before
/// the next copy and nothing gets persisted by the caller.
fn tag_masters(
    gate: &ControlGate,
    slot: &SlotReporter,
    manifest: &mut Manifest,
    source_dir: &Path,
    masters_dir: &Path,
) -> Result<usize> {
    let mut ordinal = 0usize;
    for (_, entry) in manifest.iter_mut() {
        gate.check(slot)?;
        if let ManifestEntry::Ok {
            master, name, uid, id, ..
        } = entry
        {
            ordinal += 1;
            *uid = master_uid(ordinal, name);
            *id = master_id(ordinal);
            std::fs::copy(source_dir.join(&*master), masters_dir.join(&*uid))?;
        }
    }
    Ok(ordinal)
}

/// Supported files under `source_dir`, walked in sorted order so uid
/// numbering is reproducible across runs.
fn enumerate_sources(source_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_supported_extension(path))
        .collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Copy an unusable file into quarantine under a collision-proof name.
/// Copy failures are logged and swallowed: the manifest entry is what
/// matters, and the source file stays where it was.
fn quarantine_file(workspace: &Workspace, path: &Path, name: &str) {
    let target = workspace
        .quarantine_dir()
        .join(format!("{}_{}", Uuid::new_v4(), sanitize_filename(name)));
    if let Err(err) = std::fs::copy(path, &target) {
        warn!(file = %path.display(), %err, "quarantine copy failed");
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sortierwerk_core::events::{AppEvent, channel};
    use sortierwerk_core::types::{PipelineStage, TrustTag};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<AppEvent>) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// a.csv, a byte-identical copy under sub/, a distinct b.jpg, and a
    /// zero-byte PDF destined for quarantine.
    fn seeded_source(root: &Path) -> PathBuf {
        let source = root.join("Scans");
        std::fs::create_dir_all(source.join("sub")).expect("source tree");
        std::fs::write(source.join("a.csv"), b"alpha,1\nbeta,2\n").expect("fixture");
        std::fs::write(source.join("sub/a_copy.csv"), b"alpha,1\nbeta,2\n").expect("fixture");
        std::fs::write(source.join("b.jpg"), b"\xFF\xD8\xFF\xE0 not much").expect("fixture");
        std::fs::write(source.join("empty.pdf"), b"").expect("fixture");
        source
    }

    #[test]
    fn full_run_groups_copies_and_numbers_masters() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = seeded_source(dir.path());
        let (sink, mut rx) = channel();
        let gate = sortierwerk_core::ControlGate::new();

        let workspace = run(
            &sink,
            &gate,
            &dir.path().join("Workspaces"),
            &source,
            IngestMode::Lightning,
        )
        .expect("ingest");

        let manifest = store::load_manifest(&workspace).expect("manifest");
        assert_eq!(manifest.master_count(), 2);
        assert_eq!(manifest.quarantine_count(), 1);

        // Scan order is sorted, so a.csv is the first master.
        let first = manifest
            .iter()
            .find_map(|(_, entry)| match entry {
                ManifestEntry::Ok { uid, copies, trust, .. } if uid.contains("a.csv") => {
                    Some((uid.clone(), copies.clone(), *trust))
                }
                _ => None,
            })
            .expect("a.csv entry");
        assert_eq!(first.0, "[0001]_a.csv");
        assert_eq!(first.1, vec!["a.csv".to_owned(), "sub/a_copy.csv".to_owned()]);
        assert_eq!(first.2, TrustTag::Binary);

        assert_eq!(
            std::fs::read(workspace.masters_dir().join("[0001]_a.csv")).expect("master bytes"),
            b"alpha,1\nbeta,2\n".to_vec()
        );
        assert!(workspace.masters_dir().join("[0002]_b.jpg").is_file());
        let quarantined: Vec<String> = std::fs::read_dir(workspace.quarantine_dir())
            .expect("quarantine dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(quarantined.len(), 1);
        assert!(quarantined[0].ends_with("_empty.pdf"), "got: {quarantined:?}");

        let stats = store::load_stats(&workspace).expect("stats");
        assert_eq!(stats.masters, 2);
        assert_eq!(stats.quarantined, 1);
        assert_eq!(stats.total_scanned, 4);

        let status = store::load_status(&workspace)
            .expect("status")
            .expect("present");
        assert_eq!(status.stage, PipelineStage::Ingested);
        assert_eq!(status.details, "Masters: 2");

        let events = drain(&mut rx);
        assert!(matches!(events.first(), Some(AppEvent::JobData { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            AppEvent::Log { message, .. } if message.starts_with("Inventory Start: ")
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            AppEvent::Log { message, .. } if message == "Quarantine: empty.pdf"
        )));
        let tail = &events[events.len() - 3..];
        assert!(matches!(
            &tail[0],
            AppEvent::Log { message, .. } if message == "Done. Masters: 2"
        ));
        assert!(matches!(&tail[1], AppEvent::JobData { .. }));
        assert_eq!(tail[2], AppEvent::Done);
    }

    #[test]
    fn paused_scan_can_be_stopped_at_the_gate() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = seeded_source(dir.path());
        let (sink, mut rx) = channel();
        let gate = sortierwerk_core::ControlGate::new();
        gate.pause();

        let result = std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                run(
                    &sink,
                    &gate,
                    &dir.path().join("Workspaces"),
                    &source,
                    IngestMode::Lightning,
                )
            });

            // The first checkpoint reports the pause before blocking.
            loop {
                match rx.blocking_recv().expect("event before pause marker") {
                    AppEvent::SlotUpdate { label, .. } if label == "Paused..." => break,
                    AppEvent::Done => panic!("stage finished through an active pause"),
                    _ => {}
                }
            }
            gate.stop();
            handle.join().expect("ingest thread")
        });
        assert!(result.is_err_and(|err| err.is_stopped()));

        // The workspace exists but never looks finished: no manifest, no
        // stats, status still Scanning. Done is the dispatcher's job.
        let roots: Vec<PathBuf> = std::fs::read_dir(dir.path().join("Workspaces"))
            .expect("workspaces root")
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        assert_eq!(roots.len(), 1);
        let workspace = Workspace::open(&roots[0]).expect("open workspace");
        assert!(!workspace.manifest_path().exists());
        assert!(!workspace.stats_path().exists());
        let status = store::load_status(&workspace)
            .expect("status")
            .expect("present");
        assert_eq!(status.stage, PipelineStage::Scanning);
        assert!(!drain(&mut rx).contains(&AppEvent::Done));
    }

    #[test]
    fn stop_during_tagging_copies_no_masters() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("src");
        let masters_dir = dir.path().join("masters");
        std::fs::create_dir_all(&source).expect("source dir");
        std::fs::create_dir_all(&masters_dir).expect("masters dir");
        std::fs::write(source.join("a.csv"), b"alpha").expect("fixture");
        std::fs::write(source.join("b.csv"), b"beta").expect("fixture");

        let mut manifest = Manifest::new();
        for (digest, file) in [("digest-a", "a.csv"), ("digest-b", "b.csv")] {
            manifest.insert(
                digest.to_owned(),
                ManifestEntry::Ok {
                    master: file.to_owned(),
                    copies: vec![file.to_owned()],
                    name: file.to_owned(),
                    root: source.display().to_string(),
                    uid: String::new(),
                    id: String::new(),
                    trust: TrustTag::Binary,
                },
            );
        }

        let (sink, mut rx) = channel();
        let gate = sortierwerk_core::ControlGate::new();
        gate.pause();

        let result = std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                let slot = SlotReporter::new(sink.clone(), 0);
                tag_masters(&gate, &slot, &mut manifest, &source, &masters_dir)
            });

            loop {
                match rx.blocking_recv().expect("event before pause marker") {
                    AppEvent::SlotUpdate { label, .. } if label == "Paused..." => break,
                    _ => {}
                }
            }
            // Parked at the gate ahead of the first copy.
            assert_eq!(
                std::fs::read_dir(&masters_dir).expect("masters dir").count(),
                0
            );
            gate.stop();
            handle.join().expect("tagging thread")
        });
        assert!(result.is_err_and(|err| err.is_stopped()));

        // No master landed and no entry was numbered.
        assert_eq!(
            std::fs::read_dir(&masters_dir).expect("masters dir").count(),
            0
        );
        assert!(manifest.iter().all(|(_, entry)| matches!(
            entry,
            ManifestEntry::Ok { uid, .. } if uid.is_empty()
        )));
    }

    #[test]
    fn enumeration_filters_and_sorts() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir(dir.path().join("sub")).expect("subdir");
        for name in ["z.pdf", "a.jpg", "skip.txt", "sub/b.docx"] {
            std::fs::write(dir.path().join(name), b"x").expect("fixture");
        }

        let files = enumerate_sources(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|path| relative_to(path, dir.path()))
            .collect();
        assert_eq!(names, vec!["a.jpg", "sub/b.docx", "z.pdf"]);
    }

    #[test]
    fn relative_paths_survive_foreign_roots() {
        let path = Path::new("/elsewhere/doc.pdf");
        assert_eq!(relative_to(path, Path::new("/data")), "/elsewhere/doc.pdf");
        assert_eq!(
            relative_to(Path::new("/data/x/doc.pdf"), Path::new("/data")),
            "x/doc.pdf"
        );
    }
}
