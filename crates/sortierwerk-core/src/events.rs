// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Outbound event channel between the engine and its presentation layer.

use std::cell::Cell;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::types::PipelineStage;

/// Severity attached to [`AppEvent::Log`] lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Error,
}

/// Color hint for status banners in the consuming UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorHint {
    Blue,
    Green,
    Red,
}

/// One message on the engine's outbound channel.
///
/// Every stage invocation terminates with exactly one `Done`, on success,
/// user stop, and failure alike; consumers key their busy state off it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
    /// Operator-facing log line.
    Log { message: String, level: LogLevel },
    /// Overall stage progress for the main progress bar, 0.0..=100.0.
    ProgressMain { percent: f32, label: String },
    /// Worker pool size for the stage about to run (UI slot allocation).
    WorkerConfig { pool_size: usize },
    /// Per-worker activity line; `percent` is `None` for status-only text.
    SlotUpdate {
        worker_id: usize,
        label: String,
        percent: Option<f32>,
    },
    /// Stage banner change with a color hint.
    StatusChange {
        stage: String,
        message: String,
        color: ColorHint,
    },
    /// The active workspace changed or its persisted contents were updated.
    JobData { workspace: PathBuf },
    /// Desktop-style notification; `open_path` may point at a result file.
    Notification {
        title: String,
        message: String,
        open_path: Option<PathBuf>,
    },
    /// Stage-fatal error, phrased for the operator.
    Error { message: String },
    /// Terminal event: exactly one per stage invocation, on every path.
    Done,
}

/// Create a connected sink/receiver pair.
pub fn channel() -> (EventSink, UnboundedReceiver<AppEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}

/// Cloneable sending half of the event channel.
///
/// Sends never block and never fail the engine: a dropped receiver simply
/// discards events while the stage runs to completion.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<AppEvent>,
}

impl EventSink {
    pub fn emit(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(AppEvent::Log {
            message: message.into(),
            level: LogLevel::Info,
        });
    }

    pub fn log_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::Log {
            message: message.into(),
            level: LogLevel::Error,
        });
    }

    pub fn progress_main(&self, percent: f32, label: impl Into<String>) {
        self.emit(AppEvent::ProgressMain {
            percent,
            label: label.into(),
        });
    }

    pub fn worker_config(&self, pool_size: usize) {
        self.emit(AppEvent::WorkerConfig { pool_size });
    }

    pub fn status_change(&self, stage: PipelineStage, message: impl Into<String>, color: ColorHint) {
        self.emit(AppEvent::StatusChange {
            stage: stage.as_str().to_owned(),
            message: message.into(),
            color,
        });
    }

    /// Status banner for pseudo-stages that never reach `status.json`,
    /// e.g. preview generation.
    pub fn status_change_raw(
        &self,
        stage: impl Into<String>,
        message: impl Into<String>,
        color: ColorHint,
    ) {
        self.emit(AppEvent::StatusChange {
            stage: stage.into(),
            message: message.into(),
            color,
        });
    }

    pub fn job_data(&self, workspace: impl Into<PathBuf>) {
        self.emit(AppEvent::JobData {
            workspace: workspace.into(),
        });
    }

    pub fn notify(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
        open_path: Option<PathBuf>,
    ) {
        self.emit(AppEvent::Notification {
            title: title.into(),
            message: message.into(),
            open_path,
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(AppEvent::Error {
            message: message.into(),
        });
    }

    pub fn done(&self) {
        self.emit(AppEvent::Done);
    }
}

// -- Slot reporting ---------------------------------------------------------

/// Minimum interval between throttled slot updates per worker.
const SLOT_UPDATE_INTERVAL: Duration = Duration::from_millis(100);

/// Per-worker slot progress reporter.
///
/// Rate-limits updates so a tight page loop cannot flood the channel.
/// Pause markers and end-of-task lines bypass the limit via [`force`].
///
/// [`force`]: SlotReporter::force
pub struct SlotReporter {
    sink: EventSink,
    worker_id: usize,
    interval: Duration,
    last_emit: Cell<Option<Instant>>,
}

impl SlotReporter {
    pub fn new(sink: EventSink, worker_id: usize) -> Self {
        Self {
            sink,
            worker_id,
            interval: SLOT_UPDATE_INTERVAL,
            last_emit: Cell::new(None),
        }
    }

    #[cfg(test)]
    fn with_interval(sink: EventSink, worker_id: usize, interval: Duration) -> Self {
        Self {
            sink,
            worker_id,
            interval,
            last_emit: Cell::new(None),
        }
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Throttled activity update; dropped if one was sent within the
    /// rate-limit window.
    pub fn update(&self, percent: Option<f32>, label: impl Into<String>) {
        let now = Instant::now();
        let due = match self.last_emit.get() {
            None => true,
            Some(prev) => now.duration_since(prev) >= self.interval,
        };
        if due {
            self.send(percent, label.into(), now);
        }
    }

    /// Unthrottled update for messages that must always land: pause
    /// markers, per-file completion lines, idle resets.
    pub fn force(&self, percent: Option<f32>, label: impl Into<String>) {
        self.send(percent, label.into(), Instant::now());
    }

    fn send(&self, percent: Option<f32>, label: String, at: Instant) {
        self.sink.emit(AppEvent::SlotUpdate {
            worker_id: self.worker_id,
            label,
            percent,
        });
        self.last_emit.set(Some(at));
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_helpers_emit_expected_variants() {
        let (sink, mut rx) = channel();
        sink.log("scanning");
        sink.progress_main(50.0, "halfway");
        sink.done();

        assert_eq!(
            rx.try_recv().expect("log event"),
            AppEvent::Log {
                message: "scanning".into(),
                level: LogLevel::Info,
            }
        );
        assert_eq!(
            rx.try_recv().expect("progress event"),
            AppEvent::ProgressMain {
                percent: 50.0,
                label: "halfway".into(),
            }
        );
        assert_eq!(rx.try_recv().expect("done event"), AppEvent::Done);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn emit_survives_dropped_receiver() {
        let (sink, rx) = channel();
        drop(rx);
        sink.log("nobody listening");
        sink.done();
    }

    #[test]
    fn slot_updates_are_throttled() {
        let (sink, mut rx) = channel();
        let slot = SlotReporter::with_interval(sink, 2, Duration::from_secs(3600));

        slot.update(Some(10.0), "first");
        slot.update(Some(20.0), "suppressed");
        slot.update(Some(30.0), "also suppressed");

        assert_eq!(
            rx.try_recv().expect("first update"),
            AppEvent::SlotUpdate {
                worker_id: 2,
                label: "first".into(),
                percent: Some(10.0),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn forced_updates_bypass_the_throttle() {
        let (sink, mut rx) = channel();
        let slot = SlotReporter::with_interval(sink, 0, Duration::from_secs(3600));

        slot.update(Some(10.0), "first");
        slot.force(None, "Paused...");
        slot.force(Some(100.0), "done");

        let mut labels = Vec::new();
        while let Ok(AppEvent::SlotUpdate { label, .. }) = rx.try_recv() {
            labels.push(label);
        }
        assert_eq!(labels, vec!["first", "Paused...", "done"]);
    }
}
