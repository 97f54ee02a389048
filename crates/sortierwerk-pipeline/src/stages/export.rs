// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Full export stage: write the entire manifest as a spreadsheet-friendly
// CSV, one row per recorded copy plus one per quarantined file.
//
// The file opens with a UTF-8 BOM so Excel decodes special characters,
// and a permission failure maps to a dedicated error because the usual
// cause is the previous export still being open in a spreadsheet.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use sortierwerk_core::types::ManifestEntry;
use sortierwerk_core::{ControlGate, EventSink, Result, SortierwerkError};

use crate::store;
use crate::workspace::{INVENTORY_REPORT, QUARANTINE_DIR, Workspace};

/// UTF-8 byte-order mark; Excel needs it to pick the right decoder.
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Write the full inventory CSV, returning its path.
#[instrument(skip_all, fields(workspace = %workspace.root().display()))]
pub fn run(sink: &EventSink, gate: &ControlGate, workspace: &Workspace) -> Result<PathBuf> {
    let manifest = store::load_manifest(workspace)?;
    let reports = workspace.reports_dir();
    std::fs::create_dir_all(&reports)?;
    let csv_path = reports.join(INVENTORY_REPORT);

    sink.log("Generating Full Inventory CSV...");

    let mut file = File::create(&csv_path).map_err(|err| locked(err, &csv_path))?;
    file.write_all(UTF8_BOM)
        .map_err(|err| locked(err, &csv_path))?;
    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record([
            "ID",
            "Status",
            "Original_Filename",
            "Original_Path_Structure",
            "Master_Location_In_Workplace",
            "Hash_Type",
            "Hash",
            "Copy_Count",
            "Error_Details",
        ])
        .map_err(|err| csv_locked(err, &csv_path))?;

    let total = manifest.len();
    for (index, (digest, entry)) in manifest.iter().enumerate() {
        if gate.is_stopped() {
            return Err(SortierwerkError::Stopped);
        }
        sink.progress_main(index as f32 / total as f32 * 100.0, "Writing CSV...");

        match entry {
            ManifestEntry::Quarantine {
                orig_name,
                error_reason,
            } => {
                writer
                    .write_record([
                        "?",
                        "QUARANTINE",
                        orig_name.as_str(),
                        "N/A - Quarantined",
                        QUARANTINE_DIR,
                        "Binary",
                        digest,
                        "0",
                        error_reason.as_str(),
                    ])
                    .map_err(|err| csv_locked(err, &csv_path))?;
            }
            ManifestEntry::Ok {
                master,
                copies,
                name,
                id,
                trust,
                ..
            } => {
                let copy_count = copies.len().to_string();
                for copy in copies {
                    writer
                        .write_record([
                            id.as_str(),
                            "OK",
                            name.as_str(),
                            copy.as_str(),
                            master.as_str(),
                            trust.as_str(),
                            digest,
                            copy_count.as_str(),
                            "",
                        ])
                        .map_err(|err| csv_locked(err, &csv_path))?;
                }
            }
        }
    }
    writer.flush().map_err(|err| locked(err, &csv_path))?;

    sink.log(format!("Exported: {INVENTORY_REPORT}"));
    sink.job_data(workspace.root());
    sink.progress_main(100.0, "Done");
    sink.done();
    sink.notify("CSV Exported", "Inventory saved.", Some(reports));
    info!(entries = total, path = %csv_path.display(), "inventory exported");
    Ok(csv_path)
}

/// Map a permission failure on the CSV file to the locked-file error; the
/// usual cause is the previous export still open in a spreadsheet.
fn locked(err: std::io::Error, path: &Path) -> SortierwerkError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        SortierwerkError::ExportLocked(path.display().to_string())
    } else {
        SortierwerkError::Io(err)
    }
}

fn csv_locked(err: csv::Error, path: &Path) -> SortierwerkError {
    if let csv::ErrorKind::Io(io) = err.kind() {
        if io.kind() == std::io::ErrorKind::PermissionDenied {
            return SortierwerkError::ExportLocked(path.display().to_string());
        }
    }
    SortierwerkError::Export(err.to_string())
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
