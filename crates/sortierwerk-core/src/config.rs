// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::types::{ExportPriority, IngestMode};

/// Engine settings persisted as JSON.
///
/// Missing keys fall back to their defaults and unknown keys are ignored,
/// so config files written by older builds keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum pixel width images are downscaled to during refine.
    pub resize_width: u32,
    /// Manual worker-pool override; 0 selects automatic sizing from
    /// installed memory and CPU count.
    pub max_threads: usize,
    /// Default artifact priority for organize and distribute.
    pub export_priority: ExportPriority,
    /// Default fingerprinting mode for ingest.
    pub ingest_mode: IngestMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resize_width: 1920,
            max_threads: 0,
            export_priority: ExportPriority::Auto,
            ingest_mode: IngestMode::Standard,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file, falling back to defaults when
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "config file absent, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Persist configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
