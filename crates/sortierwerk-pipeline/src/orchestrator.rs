// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orchestrator: the engine's public face. Owns the configuration, the
// shared control gate, and the sending half of the event channel, and
// runs each stage with uniform stop and error handling.
//
// Contract: every operation emits exactly one Done on the event channel,
// on success, user stop, and failure alike. Stages emit their own Done on
// the success path (some follow it with a notification); the dispatch
// here covers the stop and error exits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};

use sortierwerk_core::types::{ExportPriority, IngestMode, RefineOptions, RefineReport};
use sortierwerk_core::{
    AppEvent, ControlGate, EngineConfig, EventSink, Result, SortierwerkError, events,
};

use crate::stages;
use crate::workspace::Workspace;

/// Runs pipeline stages against workspaces and reports through events.
///
/// Operations block the calling thread until the stage finishes; the
/// control gate from [`control`] lets another thread pause, resume, or
/// stop a running stage. A stopped operation returns `Ok(None)`.
///
/// [`control`]: Orchestrator::control
pub struct Orchestrator {
    config: EngineConfig,
    gate: Arc<ControlGate>,
    sink: EventSink,
}

impl Orchestrator {
    /// Create an orchestrator and the receiving end of its event channel.
    pub fn new(config: EngineConfig) -> (Self, UnboundedReceiver<AppEvent>) {
        let (sink, rx) = events::channel();
        (
            Self {
                config,
                gate: Arc::new(ControlGate::new()),
                sink,
            },
            rx,
        )
    }

    /// Shared gate for pausing, resuming, or stopping the running stage.
    pub fn control(&self) -> Arc<ControlGate> {
        Arc::clone(&self.gate)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mutable settings access, for applying operator changes between runs.
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    /// Scan `source_dir` into a fresh deduplicated workspace under
    /// `workspaces_root`.
    pub fn ingest(
        &self,
        workspaces_root: &Path,
        source_dir: &Path,
        mode: IngestMode,
    ) -> Result<Option<Workspace>> {
        self.run_stage("Ingest", |sink, gate| {
            stages::ingest::run(sink, gate, workspaces_root, source_dir, mode)
        })
    }

    /// Run the configured content transformations over every master.
    pub fn refine(
        &self,
        workspace: &Workspace,
        options: &RefineOptions,
    ) -> Result<Option<RefineReport>> {
        self.run_stage("Batch", |sink, gate| {
            stages::refine::run(sink, gate, workspace, options, &self.config)
        })
    }

    /// Export one copy of every unique document plus the duplicates CSV.
    pub fn organize(&self, workspace: &Workspace) -> Result<Option<PathBuf>> {
        self.run_stage("Unique export", |sink, gate| {
            stages::organize::run(sink, gate, workspace, self.priority())
        })
    }

    /// Rebuild the original folder tree from the preferred artifacts, or
    /// from `external_source` files matched by id tag when given.
    pub fn distribute(
        &self,
        workspace: &Workspace,
        external_source: Option<&Path>,
    ) -> Result<Option<PathBuf>> {
        self.run_stage("Reconstruction", |sink, gate| {
            stages::distribute::run(sink, gate, workspace, external_source, self.priority())
        })
    }

    /// Write the full inventory CSV into the workspace reports folder.
    pub fn full_export(&self, workspace: &Workspace) -> Result<Option<PathBuf>> {
        self.run_stage("Inventory export", |sink, gate| {
            stages::export::run(sink, gate, workspace)
        })
    }

    /// Render a one-page preview of the first master PDF.
    ///
    /// `Ok(None)` also covers the no-PDF case, which is reported through
    /// a status event rather than an error.
    pub fn preview(&self, workspace: &Workspace, dpi: u32) -> Result<Option<PathBuf>> {
        let result = self.run_stage("Preview", |sink, _gate| {
            stages::preview::run(sink, workspace, dpi)
        })?;
        Ok(result.flatten())
    }

    /// Bundle configuration and job bookkeeping into a support zip.
    pub fn debug_export(
        &self,
        workspace: Option<&Workspace>,
        dest: &Path,
    ) -> Result<Option<PathBuf>> {
        self.run_stage("Debug export", |sink, _gate| {
            stages::debug::run(sink, &self.config, workspace, dest)
        })
    }

    fn priority(&self) -> ExportPriority {
        self.config.export_priority
    }

    /// Re-arm the gate, run one stage, and normalise its exits: stopped
    /// becomes `Ok(None)` after a log line and the terminal Done, faults
    /// surface as an operator-phrased Error event before propagating.
    fn run_stage<T>(
        &self,
        label: &str,
        stage: impl FnOnce(&EventSink, &ControlGate) -> Result<T>,
    ) -> Result<Option<T>> {
        self.gate.reset();
        match stage(&self.sink, &self.gate) {
            Ok(value) => Ok(Some(value)),
            Err(SortierwerkError::Stopped) => {
                info!(stage = label, "stage stopped by user");
                self.sink.log(format!("{label} stopped by user."));
                self.sink.done();
                Ok(None)
            }
            Err(err) => {
                error!(stage = label, %err, "stage failed");
                self.sink.error(operator_message(label, &err));
                self.sink.done();
                Err(err)
            }
        }
    }
}

/// Phrase a stage failure for the operator. Two conditions carry fixed
/// wording that consuming UIs match on.
fn operator_message(label: &str, err: &SortierwerkError) -> String {
    match err {
        SortierwerkError::ManifestMissing(_) => "Manifest missing.".to_owned(),
        SortierwerkError::ExportLocked(_) => {
            "Could not write CSV.\nPlease close the file in Excel and try again.".to_owned()
        }
        other => format!("{label} failed: {other}"),
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_messages_use_the_fixed_wordings() {
        let missing = SortierwerkError::ManifestMissing("x".into());
        assert_eq!(operator_message("Batch", &missing), "Manifest missing.");

        let locked = SortierwerkError::ExportLocked("report.csv".into());
        assert_eq!(
            operator_message("Inventory export", &locked),
            "Could not write CSV.\nPlease close the file in Excel and try again."
        );

        let other = SortierwerkError::Workspace("bad root".into());
        assert_eq!(
            operator_message("Batch", &other),
            "Batch failed: workspace error: bad root"
        );
    }

    #[test]
    fn stopped_stage_reports_and_returns_none() {
        let (orchestrator, mut rx) = Orchestrator::new(EngineConfig::default());
        let result: Result<Option<()>> =
            orchestrator.run_stage("Batch", |_sink, _gate| Err(SortierwerkError::Stopped));

        assert!(matches!(result, Ok(None)));
        assert!(matches!(
            rx.try_recv().expect("log event"),
            AppEvent::Log { message, .. } if message == "Batch stopped by user."
        ));
        assert_eq!(rx.try_recv().expect("done event"), AppEvent::Done);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failed_stage_emits_error_then_done_and_propagates() {
        let (orchestrator, mut rx) = Orchestrator::new(EngineConfig::default());
        let result: Result<Option<()>> = orchestrator.run_stage("Ingest", |_sink, _gate| {
            Err(SortierwerkError::Config("bad dpi".into()))
        });

        assert!(matches!(result, Err(SortierwerkError::Config(_))));
        assert!(matches!(
            rx.try_recv().expect("error event"),
            AppEvent::Error { message } if message == "Ingest failed: configuration error: bad dpi"
        ));
        assert_eq!(rx.try_recv().expect("done event"), AppEvent::Done);
    }

    #[test]
    fn gate_is_rearmed_before_each_stage() {
        let (orchestrator, _rx) = Orchestrator::new(EngineConfig::default());
        let gate = orchestrator.control();
        gate.stop();

        let result = orchestrator.run_stage("Preview", |_sink, gate| {
            assert!(!gate.is_stopped(), "stale stop must not leak in");
            Ok(())
        });
        assert!(matches!(result, Ok(Some(()))));
    }
}
