// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Redaction layer: operator-drawn rectangles blanked out of a page before it
// is committed.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use scanwerk_core::Point;
use tracing::{debug, info};

/// Fill applied to redacted regions.
const REDACTION_FILL: Luma<u8> = Luma([255]);

/// Outline of the rectangle being dragged.
const DRAG_OUTLINE: Rgb<u8> = Rgb([0, 0, 255]);

/// Axis-aligned rectangle in page coordinates. Both bounds are inclusive and
/// `min <= max` on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactionRect {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl RedactionRect {
    /// Rectangle spanned by two opposite corners given in any order.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        Self {
            x_min: a.0.min(b.0),
            y_min: a.1.min(b.1),
            x_max: a.0.max(b.0),
            y_max: a.1.max(b.1),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }

    /// The part of this rectangle inside a `width` x `height` image, or
    /// `None` when they do not overlap.
    pub fn clipped_to(self, width: u32, height: u32) -> Option<Self> {
        let (Ok(w), Ok(h)) = (i32::try_from(width), i32::try_from(height)) else {
            return None;
        };
        if w == 0 || h == 0 || self.x_max < 0 || self.y_max < 0 || self.x_min >= w || self.y_min >= h {
            return None;
        }
        Some(Self {
            x_min: self.x_min.max(0),
            y_min: self.y_min.max(0),
            x_max: self.x_max.min(w - 1),
            y_max: self.y_max.min(h - 1),
        })
    }

    /// Only valid on a rectangle already clipped to an image.
    fn to_rect(self) -> Rect {
        let width = (self.x_max - self.x_min + 1) as u32;
        let height = (self.y_max - self.y_min + 1) as u32;
        Rect::at(self.x_min, self.y_min).of_size(width, height)
    }
}

/// Snap a pointer position to the pixel grid.
fn pixel(p: Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

/// Edit-mode state for one page candidate.
#[derive(Debug, Default)]
pub struct RedactionLayer {
    editing: bool,
    rects: Vec<RedactionRect>,
    drag_start: Option<(i32, i32)>,
    /// Candidate with the committed rectangles already filled in.
    working: Option<GrayImage>,
}

impl RedactionLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Committed rectangles in insertion order.
    pub fn rects(&self) -> &[RedactionRect] {
        &self.rects
    }

    // -- Mode -----------------------------------------------------------------

    /// Enter edit mode on a fresh copy of `candidate`.
    pub fn begin_edit(&mut self, candidate: Option<&GrayImage>) {
        self.editing = true;
        self.drag_start = None;
        self.reset_for(candidate);
        info!("Redaction editing started");
    }

    /// Leave edit mode. Rectangles drawn so far are discarded.
    pub fn end_edit(&mut self, candidate: Option<&GrayImage>) {
        self.editing = false;
        self.drag_start = None;
        self.reset_for(candidate);
        info!("Redaction editing ended");
    }

    /// Drop all rectangles and restart from `candidate`. A drag in progress
    /// carries over to the new candidate.
    pub fn reset_for(&mut self, candidate: Option<&GrayImage>) {
        self.rects.clear();
        self.working = candidate.cloned();
    }

    // -- Pointer --------------------------------------------------------------

    /// Start a drag. Ignored outside edit mode.
    pub fn pointer_down(&mut self, at: Point) -> bool {
        if !self.editing {
            return false;
        }
        self.drag_start = Some(pixel(at));
        true
    }

    /// Preview of the drag in progress: the working image in colour with the
    /// pending rectangle outlined in blue. Returns `None` when not dragging.
    pub fn pointer_move(&self, at: Point) -> Option<RgbImage> {
        if !self.editing {
            return None;
        }
        let start = self.drag_start?;
        let working = self.working.as_ref()?;

        let mut preview = DynamicImage::ImageLuma8(working.clone()).to_rgb8();
        let Some(rect) = RedactionRect::from_corners(start, pixel(at))
            .clipped_to(working.width(), working.height())
        else {
            return Some(preview);
        };
        let rect = rect.to_rect();
        draw_hollow_rect_mut(&mut preview, rect, DRAG_OUTLINE);
        if rect.width() > 2 && rect.height() > 2 {
            let inner = Rect::at(rect.left() + 1, rect.top() + 1)
                .of_size(rect.width() - 2, rect.height() - 2);
            draw_hollow_rect_mut(&mut preview, inner, DRAG_OUTLINE);
        }
        Some(preview)
    }

    /// Finish the drag: store the normalised rectangle, clipped to the page,
    /// and blank it on the working image. A drag that misses the page adds
    /// nothing.
    pub fn pointer_up(&mut self, at: Point) -> Option<RedactionRect> {
        if !self.editing {
            return None;
        }
        let start = self.drag_start.take()?;
        let working = self.working.as_mut()?;
        let Some(rect) = RedactionRect::from_corners(start, pixel(at))
            .clipped_to(working.width(), working.height())
        else {
            debug!("Drag ended outside the page");
            return None;
        };
        draw_filled_rect_mut(working, rect.to_rect(), REDACTION_FILL);
        self.rects.push(rect);
        debug!(?rect, total = self.rects.len(), "Redaction added");
        Some(rect)
    }

    // -- Rendering ------------------------------------------------------------

    /// `candidate` with every committed rectangle filled white. Parts of a
    /// rectangle outside the image are ignored.
    pub fn render_preview(&self, candidate: &GrayImage) -> GrayImage {
        let mut out = candidate.clone();
        for rect in &self.rects {
            if let Some(rect) = rect.clipped_to(out.width(), out.height()) {
                draw_filled_rect_mut(&mut out, rect.to_rect(), REDACTION_FILL);
            }
        }
        out
    }

    /// The incrementally updated working image, if a candidate was supplied.
    pub fn working_preview(&self) -> Option<&GrayImage> {
        self.working.as_ref()
    }
}
