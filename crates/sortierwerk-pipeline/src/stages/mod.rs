// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline stage implementations.
//
// Each stage is a free function over the event sink, control gate, and a
// workspace. Stages emit their own success-path events (including the
// terminal Done); the orchestrator owns gate reset plus the stop and error
// exits, so every invocation ends in exactly one Done either way.

pub mod debug;
pub mod distribute;
pub mod export;
pub mod ingest;
pub mod organize;
pub mod preview;
pub mod refine;
