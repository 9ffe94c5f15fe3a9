// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: opens saved documents with `lopdf` to confirm what was written.

use std::path::Path;

use lopdf::{Document, Object};
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument};

/// Read-only view of an existing PDF.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            ScanwerkError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self { document })
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            ScanwerkError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Width and height in points of a page (1-indexed), from its MediaBox.
    pub fn page_size_pt(&self, page_number: u32) -> Result<(f32, f32)> {
        let pages = self.document.get_pages();
        let page_id = *pages.get(&page_number).ok_or_else(|| {
            ScanwerkError::PdfError(format!(
                "page {} out of range (document has {} pages)",
                page_number,
                pages.len()
            ))
        })?;

        let malformed = |what: &str| ScanwerkError::PdfError(format!("page {page_number}: {what}"));
        let page = self
            .document
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|_| malformed("page object is not a dictionary"))?;
        let media_box = page
            .get(b"MediaBox")
            .and_then(Object::as_array)
            .map_err(|_| malformed("missing MediaBox"))?;

        let coords: Vec<f32> = media_box
            .iter()
            .map(|value| value.as_float().map_err(|_| malformed("non-numeric MediaBox")))
            .collect::<Result<_>>()?;
        match coords.as_slice() {
            [x0, y0, x1, y1] => Ok(((x1 - x0).abs(), (y1 - y0).abs())),
            _ => Err(malformed("MediaBox must have four entries")),
        }
    }
}
