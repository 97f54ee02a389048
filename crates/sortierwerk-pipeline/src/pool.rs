// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Worker pool sizing for the refine stage.
//
// Rasterizing PDF pages holds whole rendered bitmaps in memory, so the pool
// is sized off installed RAM first and CPU count second: a machine with many
// cores but little memory must not run many render workers.

use sysinfo::System;
use tracing::debug;

const GIB: u64 = 1024 * 1024 * 1024;

/// Number of refine workers to run.
///
/// A manual override (> 0) is taken unchanged. Otherwise total installed
/// memory selects a tier (< 8 GiB → 1, < 16 GiB → 2, else 4; detection
/// failure → 2), capped at the logical CPU count and floored at one.
pub fn worker_count(manual_override: usize) -> usize {
    if manual_override > 0 {
        return manual_override;
    }
    let mut system = System::new();
    system.refresh_memory();
    let total = system.total_memory();
    let workers = memory_tier(total).min(num_cpus::get().max(1)).max(1);
    debug!(total_bytes = total, workers, "auto-sized worker pool");
    workers
}

/// RAM tier for automatic sizing; 0 bytes means detection failed.
fn memory_tier(total_bytes: u64) -> usize {
    if total_bytes == 0 {
        2
    } else if total_bytes < 8 * GIB {
        1
    } else if total_bytes < 16 * GIB {
        2
    } else {
        4
    }
}

// ---------------------------------------------------------------------------
// ---------------------------------------------------------------------------
