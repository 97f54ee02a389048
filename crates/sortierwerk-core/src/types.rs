// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types shared across the Sortierwerk engine.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SortierwerkError};

// -- Filenames --------------------------------------------------------------

/// File extensions the ingest scanner accepts (lowercase, no dot).
pub const SUPPORTED_EXTENSIONS: [&str; 9] = [
    "pdf", "doc", "docx", "jpg", "jpeg", "png", "xls", "xlsx", "csv",
];

/// Whether a path carries one of the supported extensions.
pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Replace filesystem-reserved characters with underscores.
///
/// Applied to every display name before it becomes part of a workspace or
/// quarantine filename, so names from foreign filesystems stay portable.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect()
}

/// Numbered tag for the `n`-th master, 1-based: `[0001]`.
pub fn master_id(n: usize) -> String {
    format!("[{n:04}]")
}

/// Workspace filename for a master: numbered tag plus sanitized name.
pub fn master_uid(n: usize, name: &str) -> String {
    format!("[{n:04}]_{}", sanitize_filename(name))
}

// -- Fingerprinting ---------------------------------------------------------

/// How aggressively ingest fingerprints file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IngestMode {
    /// Binary hashing only; PDFs are never parsed.
    Lightning,
    /// Text-hash PDFs over their first three pages.
    #[default]
    Standard,
    /// Text-hash PDFs over every page.
    Deep,
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lightning => "Lightning",
            Self::Standard => "Standard",
            Self::Deep => "Deep",
        };
        write!(f, "{name}")
    }
}

/// Confidence label attached to every fingerprint.
///
/// Smart tags mean the digest was derived from extracted PDF text and will
/// match re-saved or re-compressed copies of the same document; `Binary`
/// means a plain content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustTag {
    #[serde(rename = "Smart-Standard")]
    SmartStandard,
    #[serde(rename = "Smart-Deep")]
    SmartDeep,
    Binary,
}

impl TrustTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmartStandard => "Smart-Standard",
            Self::SmartDeep => "Smart-Deep",
            Self::Binary => "Binary",
        }
    }
}

impl fmt::Display for TrustTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A trust-tagged content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Hex-encoded digest; doubles as the manifest key.
    pub digest: String,
    pub trust: TrustTag,
}

/// Verdict for one scanned file. Fingerprinting is total: a file that
/// cannot be hashed is quarantined with a reason instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashVerdict {
    Hashed(Fingerprint),
    Quarantined { reason: String },
}

// -- Manifest entries -------------------------------------------------------

/// One manifest record, keyed externally by its content fingerprint (or by
/// a synthetic UUID for quarantined files).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ManifestEntry {
    /// A fingerprinted document group: one master plus every duplicate.
    #[serde(rename = "OK")]
    Ok {
        /// Relative path (within the scan root) of the first-seen copy.
        master: String,
        /// Every relative path sharing this fingerprint, master included.
        copies: Vec<String>,
        /// Display filename of the master copy.
        name: String,
        /// Absolute path of the original scan root.
        root: String,
        /// Workspace filename of the stored master: `[0001]_name.ext`.
        uid: String,
        /// Numbered tag from ingestion order: `[0001]`.
        id: String,
        /// Trust level of the fingerprint that grouped these copies.
        trust: TrustTag,
    },
    /// A file that could not be fingerprinted; a copy sits in quarantine.
    #[serde(rename = "QUARANTINE")]
    Quarantine {
        /// Display filename of the offending file.
        orig_name: String,
        /// Human-readable reason it was quarantined.
        error_reason: String,
    },
}

impl ManifestEntry {
    pub fn is_quarantined(&self) -> bool {
        matches!(self, Self::Quarantine { .. })
    }

    /// Display filename regardless of variant.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ok { name, .. } => name,
            Self::Quarantine { orig_name, .. } => orig_name,
        }
    }
}

// -- Refinement -------------------------------------------------------------

/// Derived-artifact cache folders under the redistribution staging dir.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Verbatim copy of the master.
    Standard,
    /// Rasterized page-image PDF.
    Flattened,
    /// Searchable PDF with a recognized text layer.
    Ocr,
    /// Downscaled JPEG.
    Resized,
    /// Metadata-scrubbed Office archive.
    Sanitized,
}

impl ArtifactKind {
    /// Resolution order used when the export priority is `Auto`: the most
    /// refined artifact wins, verbatim copy last.
    pub const AUTO_PRECEDENCE: [ArtifactKind; 5] = [
        ArtifactKind::Ocr,
        ArtifactKind::Flattened,
        ArtifactKind::Resized,
        ArtifactKind::Sanitized,
        ArtifactKind::Standard,
    ];

    /// Cache directory name for this artifact kind.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Flattened => "Flattened",
            Self::Ocr => "OCR",
            Self::Resized => "Resized",
            Self::Sanitized => "Sanitized",
        }
    }
}

/// Which artifact the export stages should prefer for each master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExportPriority {
    /// Most refined available artifact, falling back to the master.
    #[default]
    Auto,
    /// OCR artifact, else the master.
    ForceOcr,
    /// Flattened artifact, else the master.
    ForceFlattened,
    /// Always the stored master.
    ForceOriginal,
}

impl fmt::Display for ExportPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Auto => "Auto (Best Available)",
            Self::ForceOcr => "Force: OCR",
            Self::ForceFlattened => "Force: Flattened",
            Self::ForceOriginal => "Force: Original",
        };
        write!(f, "{label}")
    }
}

/// PDF treatment requested for a refine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PdfMode {
    /// Leave PDFs alone (verbatim copies only).
    #[default]
    None,
    /// Rasterize every page into a flat image PDF.
    Flatten,
    /// Rasterize and add a recognized, invisible text layer.
    Ocr,
}

impl fmt::Display for PdfMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Flatten => "flatten",
            Self::Ocr => "ocr",
        };
        write!(f, "{label}")
    }
}

/// Options for a refine run, validated before any file is touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineOptions {
    /// Downscale oversized images to the configured width.
    pub resize: bool,
    /// Wrap standalone images into single-page PDFs.
    pub img2pdf: bool,
    /// Scrub author metadata out of docx/xlsx archives.
    pub sanitize: bool,
    pub pdf_mode: PdfMode,
    /// Render resolution for flatten/OCR, in dots per inch.
    pub dpi: u32,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            resize: false,
            img2pdf: false,
            sanitize: false,
            pdf_mode: PdfMode::None,
            dpi: 300,
        }
    }
}

impl RefineOptions {
    /// Validate option ranges.
    ///
    /// # Errors
    ///
    /// Returns `SortierwerkError::Config` if the DPI falls outside the
    /// renderable 72..=1200 range.
    pub fn validate(&self) -> Result<()> {
        if !(72..=1200).contains(&self.dpi) {
            return Err(SortierwerkError::Config(format!(
                "DPI must be between 72 and 1200, got {}",
                self.dpi
            )));
        }
        Ok(())
    }
}

/// Result of one refine task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    /// Workspace filename of the processed master.
    pub file: String,
    /// Size of the source file in bytes.
    pub orig_size: u64,
    /// Size of the produced artifact in bytes.
    pub new_size: u64,
    pub ok: bool,
    /// Failure detail when `ok` is false.
    pub error: Option<String>,
}

/// Aggregated results of a refine run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineReport {
    pub outcomes: Vec<FileOutcome>,
}

impl RefineReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Net bytes saved by successful refinements. Negative when artifacts
    /// grew, which rasterization at high DPI routinely causes.
    pub fn bytes_reclaimed(&self) -> i64 {
        self.outcomes
            .iter()
            .filter(|o| o.ok)
            .map(|o| o.orig_size as i64 - o.new_size as i64)
            .sum()
    }
}

// -- Workspace bookkeeping --------------------------------------------------

/// Named accumulator in [`WorkspaceStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCategory {
    Ingest,
    Batch,
    Organize,
    Distribute,
}

/// Cumulative per-workspace statistics, persisted as `stats.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceStats {
    /// Wall-clock seconds spent in ingest runs.
    #[serde(default)]
    pub ingest_time: f64,
    /// Wall-clock seconds spent in refine runs.
    #[serde(default)]
    pub batch_time: f64,
    #[serde(default)]
    pub organize_time: f64,
    #[serde(default)]
    pub dist_time: f64,
    /// Unique masters found by the last ingest.
    #[serde(default)]
    pub masters: u64,
    /// Files quarantined by the last ingest.
    #[serde(default)]
    pub quarantined: u64,
    /// Total files scanned by the last ingest.
    #[serde(default)]
    pub total_scanned: u64,
}

impl WorkspaceStats {
    /// Add elapsed seconds to one timing category.
    pub fn add_time(&mut self, category: StatCategory, secs: f64) {
        match category {
            StatCategory::Ingest => self.ingest_time += secs,
            StatCategory::Batch => self.batch_time += secs,
            StatCategory::Organize => self.organize_time += secs,
            StatCategory::Distribute => self.dist_time += secs,
        }
    }
}

/// Pipeline stage recorded in `status.json` and surfaced in status banners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    #[serde(rename = "SCANNING")]
    Scanning,
    #[serde(rename = "INGESTED")]
    Ingested,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "PROCESSED")]
    Processed,
    #[serde(rename = "ORGANIZED")]
    Organized,
    #[serde(rename = "DISTRIBUTING")]
    Distributing,
    #[serde(rename = "DISTRIBUTED")]
    Distributed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scanning => "SCANNING",
            Self::Ingested => "INGESTED",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Organized => "ORGANIZED",
            Self::Distributing => "DISTRIBUTING",
            Self::Distributed => "DISTRIBUTED",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contents of a workspace `status.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub stage: PipelineStage,
    /// Free-form progress summary, e.g. "Found 12 masters".
    pub details: String,
    /// Local timestamp formatted `%Y-%m-%d %H:%M:%S`.
    pub last_update: String,
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_filename("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("Report Q3 (final).pdf"), "Report Q3 (final).pdf");
    }

    #[test]
    fn master_uid_pads_and_sanitizes() {
        assert_eq!(master_id(7), "[0007]");
        assert_eq!(master_uid(7, "a/b.pdf"), "[0007]_a_b.pdf");
        assert_eq!(master_uid(1234, "x.pdf"), "[1234]_x.pdf");
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(is_supported_extension(Path::new("scan.PDF")));
        assert!(is_supported_extension(Path::new("photo.JpEg")));
        assert!(!is_supported_extension(Path::new("notes.txt")));
        assert!(!is_supported_extension(Path::new("no_extension")));
    }

    #[test]
    fn trust_tag_serializes_with_hyphenated_names() {
        let json = serde_json::to_string(&TrustTag::SmartStandard).expect("serialize tag");
        assert_eq!(json, "\"Smart-Standard\"");
        let back: TrustTag = serde_json::from_str("\"Smart-Deep\"").expect("deserialize tag");
        assert_eq!(back, TrustTag::SmartDeep);
    }

    #[test]
    fn manifest_entry_round_trips_with_status_tag() {
        let entry = ManifestEntry::Quarantine {
            orig_name: "broken.pdf".into(),
            error_reason: "Read-Error: denied".into(),
        };
        let json = serde_json::to_string(&entry).expect("serialize entry");
        assert!(json.contains("\"status\":\"QUARANTINE\""));
        let back: ManifestEntry = serde_json::from_str(&json).expect("deserialize entry");
        assert_eq!(back, entry);
    }

    #[test]
    fn refine_options_rejects_out_of_range_dpi() {
        let mut opts = RefineOptions::default();
        assert!(opts.validate().is_ok());
        opts.dpi = 71;
        assert!(opts.validate().is_err());
        opts.dpi = 1201;
        assert!(opts.validate().is_err());
        opts.dpi = 72;
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn report_reclaims_only_successful_outcomes() {
        let report = RefineReport {
            outcomes: vec![
                FileOutcome {
                    file: "[0001]_a.pdf".into(),
                    orig_size: 1000,
                    new_size: 400,
                    ok: true,
                    error: None,
                },
                FileOutcome {
                    file: "[0002]_b.pdf".into(),
                    orig_size: 500,
                    new_size: 0,
                    ok: false,
                    error: Some("render failed".into()),
                },
            ],
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.bytes_reclaimed(), 600);
    }

    #[test]
    fn stats_accumulate_per_category() {
        let mut stats = WorkspaceStats::default();
        stats.add_time(StatCategory::Ingest, 1.5);
        stats.add_time(StatCategory::Ingest, 2.0);
        stats.add_time(StatCategory::Distribute, 0.5);
        assert!((stats.ingest_time - 3.5).abs() < f64::EPSILON);
        assert!((stats.dist_time - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.batch_time, 0.0);
    }
}
