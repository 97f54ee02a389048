// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cooperative pause/stop control shared by all stages and workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, SortierwerkError};
use crate::events::SlotReporter;

/// Shared cancellation and pause control.
///
/// Carries two signals: a toggleable pause gate and a stop flag that is
/// terminal for the current stage invocation. Workers call [`check`] at
/// file and page boundaries; a paused check blocks the calling thread
/// until resumed, then re-examines the stop flag. The orchestrator calls
/// [`reset`] before each stage so a stop never leaks into the next run.
///
/// [`check`]: ControlGate::check
/// [`reset`]: ControlGate::reset
#[derive(Debug, Default)]
pub struct ControlGate {
    stopped: AtomicBool,
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl ControlGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the stop flag and wake any paused workers so they observe it.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let mut paused = self.lock_paused();
        *paused = false;
        self.resumed.notify_all();
    }

    /// Halt all workers at their next checkpoint.
    pub fn pause(&self) {
        *self.lock_paused() = true;
    }

    /// Release paused workers.
    pub fn resume(&self) {
        let mut paused = self.lock_paused();
        *paused = false;
        self.resumed.notify_all();
    }

    /// Re-arm the gate for a fresh stage invocation.
    pub fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
        self.resume();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        *self.lock_paused()
    }

    /// Cooperative checkpoint.
    ///
    /// Reports "Paused..." on the worker's slot before blocking so the
    /// operator sees which workers actually halted.
    ///
    /// # Errors
    ///
    /// Returns `SortierwerkError::Stopped` once the stop flag is raised,
    /// including when it is raised mid-pause.
    pub fn check(&self, slot: &SlotReporter) -> Result<()> {
        if self.is_stopped() {
            return Err(SortierwerkError::Stopped);
        }
        let mut paused = self.lock_paused();
        if *paused {
            slot.force(None, "Paused...");
            while *paused && !self.is_stopped() {
                paused = self
                    .resumed
                    .wait(paused)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if self.is_stopped() {
                return Err(SortierwerkError::Stopped);
            }
        }
        Ok(())
    }

    // A poisoned pause mutex only means another worker panicked while
    // flipping the bool; the bool itself stays usable.
    fn lock_paused(&self) -> MutexGuard<'_, bool> {
        self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
