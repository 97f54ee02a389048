// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sortierwerk-pipeline — The staged document engine for Sortierwerk.
//
// Ingests source trees into content-addressed workspaces, refines the stored
// masters through the document toolkit, and exports or reconstructs the
// results. The [`Orchestrator`] is the embedding surface: it owns the event
// channel and the control gate and runs one stage at a time.

pub mod hasher;
pub mod manifest;
pub mod orchestrator;
pub mod pool;
pub mod resolver;
pub mod stages;
pub mod store;
pub mod workspace;

pub use manifest::Manifest;
pub use orchestrator::Orchestrator;
pub use workspace::Workspace;
