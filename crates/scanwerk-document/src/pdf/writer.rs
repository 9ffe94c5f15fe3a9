// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: accumulates full-bleed image pages using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: images are registered as XObjects on
// the `PdfDocument`, each page is a `PdfPage` holding a `Vec<Op>`, and the
// whole document is serialised via `PdfDocument::save()`.

use image::DynamicImage;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use scanwerk_core::PaperSize;
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument};

/// Resolution the page images are declared at; scaling is derived from it.
const IMAGE_DPI: f32 = 300.0;

/// An in-progress multi-page document where every page is one image
/// stretched edge to edge.
pub struct PdfWriter {
    paper_size: PaperSize,
    doc: PdfDocument,
}

impl PdfWriter {
    /// Start an empty document with the given page format.
    pub fn new(paper_size: PaperSize, title: &str) -> Self {
        Self {
            paper_size,
            doc: PdfDocument::new(title),
        }
    }

    /// Start an empty A4 document.
    pub fn a4(title: &str) -> Self {
        Self::new(PaperSize::A4, title)
    }

    pub fn page_count(&self) -> usize {
        self.doc.pages.len()
    }

    /// Paper dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    // -- Pages ----------------------------------------------------------------

    /// Append a page showing `image` scaled to cover the whole page.
    ///
    /// The aspect ratio is not preserved: the image origin sits at the page
    /// origin and both axes stretch to the paper size.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn add_image_page(&mut self, image: &DynamicImage) -> Result<usize> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ScanwerkError::ImageError("page image is empty".into()));
        }

        let rgb = image.to_rgb8();
        let (img_width, img_height) = rgb.dimensions();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: img_width as usize,
            height: img_height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = self.doc.add_image(&raw);

        let (page_w, page_h) = self.page_dimensions();
        let img_w_pt = img_width as f32 / IMAGE_DPI * 72.0;
        let img_h_pt = img_height as f32 / IMAGE_DPI * 72.0;
        let scale_x = page_w.into_pt().0 / img_w_pt;
        let scale_y = page_h.into_pt().0 / img_h_pt;

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                dpi: Some(IMAGE_DPI),
                rotate: None,
            },
        }];
        self.doc.pages.push(PdfPage::new(page_w, page_h, ops));

        debug!(scale_x, scale_y, pages = self.page_count(), "Image page appended");
        Ok(self.page_count())
    }

    // -- Output ---------------------------------------------------------------

    /// Serialise the document as it stands. The writer stays usable.
    #[instrument(skip(self), fields(pages = self.page_count()))]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = self.doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(count = warnings.len(), "printpdf reported warnings");
        }
        info!(bytes = bytes.len(), "PDF serialised");
        bytes
    }
}
