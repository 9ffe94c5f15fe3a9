// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline: detection, enhancement, redaction, and the scan session
// that collects committed pages.

pub mod detect;
pub mod enhance;
pub mod redact;
pub mod scanner;
pub mod session;

pub use detect::{Detection, DocumentDetector};
pub use enhance::ScanEnhancer;
pub use redact::{RedactionLayer, RedactionRect};
pub use scanner::{FrameReport, PageCandidate, Scanner};
pub use session::{AddPage, Page, SavedDocument, ScanSession};
