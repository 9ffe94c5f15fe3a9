// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document: the image side of Scanwerk.
//
// Geometry and perspective rectification, per-frame document detection, page
// enhancement, redaction, PDF assembly (printpdf) and inspection (lopdf), and
// the `Scanner` that ties them together for the frame loop.

pub mod geometry;
pub mod image;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `scanwerk_document::Scanner` etc.
pub use crate::geometry::Quadrilateral;
pub use crate::image::ImageProcessor;
pub use crate::pdf::{PdfReader, PdfWriter};
pub use crate::scan::{
    AddPage, Detection, DocumentDetector, FrameReport, RedactionLayer, RedactionRect,
    SavedDocument, ScanEnhancer, ScanSession, Scanner,
};
