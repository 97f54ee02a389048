// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — reading, merging, rasterising, flattening, and assembling PDFs.

pub mod flatten;
pub mod raster;
pub mod reader;
pub mod writer;

pub use raster::PageRasterizer;
pub use reader::PdfReader;
pub use writer::PdfAssembler;
