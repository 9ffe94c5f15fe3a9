// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The scanner: pipeline state shared by the frame loop and operator commands.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{AppConfig, Point, RefreshPolicy, Region, SessionState};
use tracing::debug;

use crate::geometry::Quadrilateral;
use crate::image::ImageProcessor;
use crate::scan::detect::{Detection, DocumentDetector};
use crate::scan::redact::{RedactionLayer, RedactionRect};
use crate::scan::session::{AddPage, SavedDocument, ScanSession};

/// The most recent rendered page and where it came from.
#[derive(Debug, Clone)]
pub struct PageCandidate {
    pub quad: Quadrilateral,
    pub image: GrayImage,
}

/// What one frame did to the scanner.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    /// Outline found this frame, in full-frame coordinates.
    pub quad: Option<Quadrilateral>,
    /// The page candidate was replaced.
    pub candidate_replaced: bool,
    /// Redaction rectangles were dropped because the candidate changed.
    pub redactions_cleared: usize,
}

/// Owns every piece of pipeline state. Frames and commands are applied one at
/// a time by a single owner.
pub struct Scanner {
    detector: DocumentDetector,
    candidate: Option<PageCandidate>,
    redaction: RedactionLayer,
    session: ScanSession,
    policy: RefreshPolicy,
    roi_size: (u32, u32),
}

impl Scanner {
    pub fn new(
        detector: DocumentDetector,
        session: ScanSession,
        policy: RefreshPolicy,
        roi_size: (u32, u32),
    ) -> Self {
        Self {
            detector,
            candidate: None,
            redaction: RedactionLayer::new(),
            session,
            policy,
            roi_size,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            DocumentDetector::new(config.detection.clone(), config.scan_threshold),
            ScanSession::new(&config.destination_dir, config.paper_size),
            config.refresh_policy,
            (config.roi_width, config.roi_height),
        )
    }

    // -- Inspection -----------------------------------------------------------

    pub fn candidate(&self) -> Option<&PageCandidate> {
        self.candidate.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.redaction.is_editing()
    }

    pub fn redactions(&self) -> &[RedactionRect] {
        self.redaction.rects()
    }

    pub fn page_count(&self) -> usize {
        self.session.page_count()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn destination(&self) -> &Path {
        self.session.destination()
    }

    /// Detection region for a frame of the given size.
    pub fn roi_for(&self, frame_width: u32, frame_height: u32) -> Region {
        Region::centered(frame_width, frame_height, self.roi_size.0, self.roi_size.1)
    }

    /// The page as it would be committed now: candidate plus redactions.
    pub fn preview(&self) -> Option<GrayImage> {
        self.candidate
            .as_ref()
            .map(|candidate| self.redaction.render_preview(&candidate.image))
    }

    /// Camera frame with the detection region and current outline drawn on.
    pub fn annotated_frame(&self, frame: &RgbImage, quad: Option<&Quadrilateral>) -> RgbImage {
        let roi = self.roi_for(frame.width(), frame.height());
        ImageProcessor::from_rgb(frame.clone())
            .annotate(roi, quad)
            .into_rgb()
    }

    // -- Frames ---------------------------------------------------------------

    /// Run detection on one camera frame and refresh the candidate.
    pub fn process_frame(&mut self, frame: &RgbImage) -> FrameReport {
        let roi = self.roi_for(frame.width(), frame.height());
        match self.detector.detect(frame, roi) {
            Some(detection) => self.accept_detection(detection),
            None => FrameReport::default(),
        }
    }

    fn accept_detection(&mut self, detection: Detection) -> FrameReport {
        let mut report = FrameReport {
            quad: Some(detection.quad),
            ..FrameReport::default()
        };

        if self.policy == RefreshPolicy::FreezeWhileEditing && self.redaction.is_editing() {
            debug!("Candidate frozen while editing");
            return report;
        }

        report.redactions_cleared = self.redaction.rects().len();
        self.redaction.reset_for(Some(&detection.page));
        self.candidate = Some(PageCandidate {
            quad: detection.quad,
            image: detection.page,
        });
        report.candidate_replaced = true;
        if report.redactions_cleared > 0 {
            debug!(
                cleared = report.redactions_cleared,
                "New candidate replaced redacted page"
            );
        }
        report
    }

    // -- Commands -------------------------------------------------------------

    /// Flip edit mode. Returns the new state.
    pub fn toggle_edit(&mut self) -> Result<bool> {
        let candidate = self
            .candidate
            .as_ref()
            .map(|c| &c.image)
            .ok_or(ScanwerkError::NoCandidate)?;
        if self.redaction.is_editing() {
            self.redaction.end_edit(Some(candidate));
        } else {
            self.redaction.begin_edit(Some(candidate));
        }
        Ok(self.redaction.is_editing())
    }

    pub fn pointer_down(&mut self, at: Point) -> bool {
        self.redaction.pointer_down(at)
    }

    pub fn pointer_move(&self, at: Point) -> Option<RgbImage> {
        self.redaction.pointer_move(at)
    }

    pub fn pointer_up(&mut self, at: Point) -> Option<RedactionRect> {
        self.redaction.pointer_up(at)
    }

    /// Commit the current preview as the next page. Redactions stay in place.
    pub fn add_page(&mut self) -> Result<AddPage> {
        let preview = self.preview();
        self.session.add_page(preview.as_ref())
    }

    pub fn save(&mut self) -> Result<SavedDocument> {
        self.session.save()
    }

    pub fn discard(&mut self) -> usize {
        self.session.discard()
    }

    pub fn set_destination(&mut self, destination: impl Into<PathBuf>) -> Result<()> {
        self.session.set_destination(destination)
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("has_candidate", &self.candidate.is_some())
            .field("editing", &self.redaction.is_editing())
            .field("pages", &self.session.page_count())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point as PixelPoint;
    use scanwerk_core::PaperSize;

    fn page_frame(offset: i32) -> RgbImage {
        let mut frame = RgbImage::from_pixel(400, 300, Rgb([20, 20, 25]));
        let poly = [(80, 60), (320, 70), (310, 240), (90, 230)]
            .map(|(x, y)| PixelPoint::new(x + offset, y));
        draw_polygon_mut(&mut frame, &poly, Rgb([240, 240, 235]));
        frame
    }

    fn scanner(dir: &Path, policy: RefreshPolicy) -> Scanner {
        Scanner::new(
            DocumentDetector::default(),
            ScanSession::new(dir, PaperSize::A4),
            policy,
            (400, 300),
        )
    }

    #[test]
    fn blank_frame_keeps_no_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scanner = scanner(dir.path(), RefreshPolicy::ContinuousRefresh);
        let report = scanner.process_frame(&RgbImage::from_pixel(400, 300, Rgb([90, 90, 90])));
        assert!(report.quad.is_none());
        assert!(scanner.candidate().is_none());
        assert!(matches!(scanner.toggle_edit(), Err(ScanwerkError::NoCandidate)));
        assert_eq!(scanner.add_page().expect("no-op"), AddPage::NoCandidate);
        assert_eq!(scanner.page_count(), 0);
    }

    #[test]
    fn committed_page_carries_redactions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scanner = scanner(dir.path(), RefreshPolicy::ContinuousRefresh);
        assert!(scanner.process_frame(&page_frame(0)).candidate_replaced);

        assert!(scanner.toggle_edit().expect("candidate present"));
        scanner.pointer_down(Point::new(5.0, 5.0));
        scanner.pointer_up(Point::new(2.0, 9.0)).expect("rect");

        let added = scanner.add_page().expect("add");
        assert_eq!(added, AddPage::Added { page_number: 1, session_started: true });
        let page = &scanner.session().pages()[0];
        assert_eq!(page.image().get_pixel(3, 7).0[0], 255);
        assert_eq!(scanner.redactions().len(), 1, "commit must not clear redactions");

        assert!(!scanner.toggle_edit().expect("candidate present"));
        assert!(scanner.redactions().is_empty());
    }

    #[test]
    fn continuous_refresh_drops_redactions_on_new_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scanner = scanner(dir.path(), RefreshPolicy::ContinuousRefresh);
        scanner.process_frame(&page_frame(0));
        scanner.toggle_edit().expect("candidate present");
        scanner.pointer_down(Point::new(10.0, 10.0));
        scanner.pointer_up(Point::new(30.0, 30.0));

        let report = scanner.process_frame(&page_frame(10));
        assert!(report.candidate_replaced);
        assert_eq!(report.redactions_cleared, 1);
        assert!(scanner.redactions().is_empty());
        assert!(scanner.is_editing());
    }

    #[test]
    fn drag_survives_redetection_between_down_and_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scanner = scanner(dir.path(), RefreshPolicy::ContinuousRefresh);
        scanner.process_frame(&page_frame(0));
        scanner.toggle_edit().expect("candidate present");

        scanner.pointer_down(Point::new(10.0, 10.0));
        assert!(scanner.process_frame(&page_frame(0)).candidate_replaced);
        let rect = scanner.pointer_up(Point::new(30.0, 30.0)).expect("drag completes");
        assert_eq!(rect, RedactionRect { x_min: 10, y_min: 10, x_max: 30, y_max: 30 });
        assert_eq!(scanner.redactions().len(), 1);
        assert_eq!(scanner.preview().expect("preview").get_pixel(20, 20).0[0], 255);
    }

    #[test]
    fn freeze_policy_holds_candidate_while_editing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scanner = scanner(dir.path(), RefreshPolicy::FreezeWhileEditing);
        scanner.process_frame(&page_frame(0));
        let before = scanner.candidate().expect("candidate").quad;
        scanner.toggle_edit().expect("candidate present");
        scanner.pointer_down(Point::new(10.0, 10.0));
        scanner.pointer_up(Point::new(30.0, 30.0));

        let report = scanner.process_frame(&page_frame(10));
        assert!(report.quad.is_some());
        assert!(!report.candidate_replaced);
        assert_eq!(scanner.candidate().expect("candidate").quad, before);
        assert_eq!(scanner.redactions().len(), 1);

        scanner.toggle_edit().expect("candidate present");
        assert!(scanner.process_frame(&page_frame(10)).candidate_replaced);
    }

    #[test]
    fn save_after_pages_resets_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut scanner = scanner(dir.path(), RefreshPolicy::ContinuousRefresh);
        scanner.process_frame(&page_frame(0));
        scanner.add_page().expect("add");
        scanner.add_page().expect("add");

        let saved = scanner.save().expect("save");
        assert_eq!(saved.page_count, 2);
        assert_eq!(scanner.page_count(), 0);
        assert_eq!(scanner.session_state(), SessionState::Idle);
        assert!(matches!(scanner.save(), Err(ScanwerkError::EmptySession)));
    }
}
