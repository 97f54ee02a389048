// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Sortierwerk.

use thiserror::Error;

/// Top-level error type for all Sortierwerk operations.
#[derive(Debug, Error)]
pub enum SortierwerkError {
    // -- Cancellation --
    /// The shared stop flag was raised; the current stage must unwind
    /// without persisting success state.
    #[error("stopped by user")]
    Stopped,

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("page rendering failed: {0}")]
    Render(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    // -- Pipeline errors --
    #[error("manifest missing: {0}")]
    ManifestMissing(String),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("export file locked: {0}")]
    ExportLocked(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("configuration error: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SortierwerkError {
    /// Whether this is the cooperative stop signal rather than a fault.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Result type alias for Sortierwerk operations.
pub type Result<T> = std::result::Result<T, SortierwerkError>;
