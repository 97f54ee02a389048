// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sortierwerk — Core types, events, and control primitives shared across all crates.

pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod types;

pub use config::EngineConfig;
pub use control::ControlGate;
pub use error::{Result, SortierwerkError};
pub use events::{AppEvent, ColorHint, EventSink, LogLevel, SlotReporter};
pub use types::*;
