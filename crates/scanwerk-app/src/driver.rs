// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame loop: reads the camera at a fixed cadence, runs detection, and applies
// operator commands between ticks. Every state change becomes a status line
// that is published, logged, and narrated.

use std::path::PathBuf;
use std::time::Duration;

use image::{DynamicImage, RgbImage};
use scanwerk_bridge::{CameraSource, PlatformBridge};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::human_errors::{Severity, humanize_error};
use scanwerk_core::{AppConfig, ScanStatus};
use scanwerk_document::{AddPage, FrameReport, ImageProcessor, Scanner};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::command::Command;
use crate::narration::Narrator;
use crate::services::config_store::persist_config;

/// Largest size the camera preview is scaled to for display.
const PREVIEW_BOX: (u32, u32) = (1280, 720);

const EDIT_HINT: &str = "Select the portion that you want to exclude in scanning.";

/// What the display layer shows, refreshed as frames and drags arrive.
#[derive(Debug, Clone, Default)]
pub struct FrameView {
    /// Camera frame with the detection region and outline drawn on.
    pub camera: Option<RgbImage>,
    /// The page as it would be committed, or the drag preview while drawing.
    pub page: Option<DynamicImage>,
}

/// Whether the loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Driver {
    scanner: Scanner,
    camera: Box<dyn CameraSource>,
    camera_index: u32,
    bridge: Box<dyn PlatformBridge>,
    narrator: Narrator,
    config: AppConfig,
    data_dir: PathBuf,
    status: watch::Sender<ScanStatus>,
    view: watch::Sender<FrameView>,
}

impl Driver {
    pub fn new(
        config: AppConfig,
        data_dir: PathBuf,
        bridge: Box<dyn PlatformBridge>,
        narrator: Narrator,
    ) -> Self {
        let scanner = Scanner::from_config(&config);
        let camera = bridge.camera(&config);
        let camera_index = config.camera_index;
        let (status, _) = watch::channel(ScanStatus {
            message: String::new(),
            session: scanner.session_state(),
            page_count: 0,
            editing: false,
            camera_index,
        });
        let (view, _) = watch::channel(FrameView::default());

        Self {
            scanner,
            camera,
            camera_index,
            bridge,
            narrator,
            config,
            data_dir,
            status,
            view,
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ScanStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<FrameView> {
        self.view.subscribe()
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Announce startup and acquire the configured camera. A missing camera
    /// is reported but does not stop the loop.
    pub fn start(&mut self) {
        info!(platform = self.bridge.platform_name(), "Scanner starting");
        self.publish("Initializing scanner application");
        if let Err(err) = self.camera.open(self.camera_index) {
            self.report(&err);
        }
    }

    /// Run until `Exit`, the command channel closes, or a fatal error.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> Result<()> {
        self.start();

        let period = Duration::from_millis(self.config.frame_interval_ms.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => match self.apply(command) {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Exit) => break Ok(()),
                        Err(err) => break Err(err),
                    },
                    None => {
                        debug!("command channel closed");
                        break Ok(());
                    }
                },
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        };

        self.shutdown();
        outcome
    }

    /// Release the camera and let narration finish what is queued.
    pub fn shutdown(mut self) -> usize {
        self.camera.release();
        let spoken = self.narrator.shutdown();
        info!(spoken, "Scanner stopped");
        spoken
    }

    // -- Frames ---------------------------------------------------------------

    /// One camera cycle. Missing or unreadable frames skip the tick.
    pub fn tick(&mut self) -> Option<FrameReport> {
        let frame = match self.camera.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(err) => {
                debug!(error = %err, "frame skipped");
                return None;
            }
        };

        let report = self.scanner.process_frame(&frame);
        if self.view.receiver_count() > 0 {
            let camera = self.scanner.annotated_frame(&frame, report.quad.as_ref());
            let camera = ImageProcessor::from_rgb(camera)
                .fit_within(PREVIEW_BOX.0, PREVIEW_BOX.1)
                .into_rgb();
            let refresh_page = report.candidate_replaced;
            let page = refresh_page
                .then(|| self.scanner.preview().map(DynamicImage::ImageLuma8))
                .flatten();
            self.view.send_modify(|view| {
                view.camera = Some(camera);
                if refresh_page {
                    view.page = page;
                }
            });
        }
        Some(report)
    }

    // -- Commands -------------------------------------------------------------

    /// Apply one operator command. Recoverable failures become status text;
    /// only fatal ones are returned.
    #[instrument(skip(self), fields(pages = self.scanner.page_count()))]
    pub fn apply(&mut self, command: Command) -> Result<Flow> {
        match self.execute(command) {
            Ok(flow) => Ok(flow),
            Err(err) if humanize_error(&err).severity == Severity::Fatal => {
                error!(error = %err, "fatal error; stopping");
                self.publish(humanize_error(&err).message);
                Err(err)
            }
            Err(err) => {
                self.report(&err);
                Ok(Flow::Continue)
            }
        }
    }

    fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::AddPage => match self.scanner.add_page()? {
                AddPage::NoCandidate => {
                    self.report(&ScanwerkError::NoCandidate);
                }
                AddPage::Added {
                    page_number,
                    session_started,
                } => {
                    if session_started {
                        self.publish("Starting a new scan session");
                    }
                    self.publish(format!("Page added to PDF. Total pages: {page_number}"));
                }
            },

            Command::SavePdf => {
                let saved = self.scanner.save()?;
                info!(
                    path = %saved.path.display(),
                    pages = saved.page_count,
                    bytes = saved.bytes,
                    "Document saved"
                );
                self.publish("PDF saved successfully");
            }

            Command::Discard => {
                let dropped = self.scanner.discard();
                self.publish(format!("Scan discarded. {dropped} pages removed"));
            }

            Command::ToggleEdit => {
                let editing = self.scanner.toggle_edit()?;
                self.refresh_page_view();
                if editing {
                    self.publish_narrated(
                        "Modify mode activated",
                        format!("Modify mode activated. {EDIT_HINT}"),
                    );
                } else {
                    self.publish("Modify mode deactivated");
                }
            }

            Command::PointerDown(at) => {
                self.scanner.pointer_down(at);
            }

            Command::PointerMove(at) => {
                if let Some(drag) = self.scanner.pointer_move(at) {
                    self.view
                        .send_modify(|view| view.page = Some(DynamicImage::ImageRgb8(drag)));
                }
            }

            Command::PointerUp(at) => {
                if let Some(rect) = self.scanner.pointer_up(at) {
                    debug!(?rect, "Region excluded");
                    self.refresh_page_view();
                }
            }

            Command::SwitchCamera => {
                self.camera.release();
                self.camera_index = self.config.next_camera(self.camera_index);
                self.camera.open(self.camera_index)?;
                self.publish(format!("Switched to camera {}", self.camera_index));
            }

            Command::SelectFolder(path) => {
                self.scanner.set_destination(&path)?;
                self.config.destination_dir = path;
                if let Err(err) = persist_config(&self.data_dir, &self.config) {
                    warn!(error = %err, "could not save settings");
                }
                self.publish(format!(
                    "Selected folder: {}",
                    self.config.destination_dir.display()
                ));
            }

            Command::OpenFolder => {
                self.bridge.open_folder(self.scanner.destination())?;
            }

            Command::Exit => {
                info!("Exit requested");
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    fn refresh_page_view(&self) {
        let page = self.scanner.preview().map(DynamicImage::ImageLuma8);
        self.view.send_modify(|view| view.page = page);
    }

    // -- Status ---------------------------------------------------------------

    fn report(&self, err: &ScanwerkError) {
        let human = humanize_error(err);
        warn!(error = %err, suggestion = %human.suggestion, "{}", human.message);
        self.publish(human.message);
    }

    fn publish(&self, message: impl Into<String>) {
        let message = message.into();
        self.publish_narrated(message.clone(), message);
    }

    /// Show `message` and speak `spoken`, which may carry extra guidance.
    fn publish_narrated(&self, message: impl Into<String>, spoken: impl Into<String>) {
        let message = message.into();
        info!(status = %message, "status");
        self.status.send_replace(ScanStatus {
            message,
            session: self.scanner.session_state(),
            page_count: self.scanner.page_count(),
            editing: self.scanner.is_editing(),
            camera_index: self.camera_index,
        });
        self.narrator.enqueue(spoken);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_polygon_mut;
    use imageproc::point::Point as PixelPoint;
    use scanwerk_bridge::{FolderOpener, SpeechSink};
    use scanwerk_core::{Point, SessionState};
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    fn page_frame() -> RgbImage {
        let mut frame = RgbImage::from_pixel(400, 300, Rgb([20, 20, 25]));
        let poly = [(80, 60), (320, 70), (310, 240), (90, 230)].map(|(x, y)| PixelPoint::new(x, y));
        draw_polygon_mut(&mut frame, &poly, Rgb([240, 240, 235]));
        frame
    }

    struct FakeCamera {
        frame: Option<RgbImage>,
        opened: Arc<Mutex<Vec<u32>>>,
        index: Option<u32>,
    }

    impl CameraSource for FakeCamera {
        fn open(&mut self, index: u32) -> Result<()> {
            self.opened.lock().expect("lock").push(index);
            self.index = Some(index);
            Ok(())
        }

        fn read_frame(&mut self) -> Result<Option<RgbImage>> {
            match self.index {
                Some(_) => Ok(self.frame.clone()),
                None => Err(ScanwerkError::CameraUnavailable("closed".into())),
            }
        }

        fn release(&mut self) {
            self.index = None;
        }

        fn current_index(&self) -> Option<u32> {
            self.index
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        heard: Arc<Mutex<Vec<String>>>,
    }

    impl SpeechSink for RecordingSink {
        fn speak(&mut self, text: &str) -> Result<()> {
            self.heard.lock().expect("lock").push(text.to_owned());
            Ok(())
        }
    }

    struct FakeBridge {
        frame: Option<RgbImage>,
        opened: Arc<Mutex<Vec<u32>>>,
    }

    impl FolderOpener for FakeBridge {
        fn open_folder(&self, _path: &Path) -> Result<()> {
            Err(ScanwerkError::PlatformUnavailable)
        }
    }

    impl PlatformBridge for FakeBridge {
        fn platform_name(&self) -> &str {
            "test"
        }

        fn camera(&self, _config: &AppConfig) -> Box<dyn CameraSource> {
            Box::new(FakeCamera {
                frame: self.frame.clone(),
                opened: Arc::clone(&self.opened),
                index: None,
            })
        }

        fn speech(&self, _config: &AppConfig) -> Box<dyn SpeechSink> {
            Box::new(RecordingSink::default())
        }
    }

    struct Harness {
        driver: Driver,
        heard: Arc<Mutex<Vec<String>>>,
        opened: Arc<Mutex<Vec<u32>>>,
        dest: tempfile::TempDir,
        data: tempfile::TempDir,
    }

    /// A driver that has not been started; `run` starts it.
    fn unstarted(frame: Option<RgbImage>) -> Harness {
        let dest = tempfile::tempdir().expect("tempdir");
        let data = tempfile::tempdir().expect("tempdir");
        let sink = RecordingSink::default();
        let heard = Arc::clone(&sink.heard);
        let opened = Arc::new(Mutex::new(Vec::new()));
        let config = AppConfig {
            destination_dir: dest.path().to_path_buf(),
            ..AppConfig::default()
        };
        let bridge = FakeBridge {
            frame,
            opened: Arc::clone(&opened),
        };
        let narrator = Narrator::spawn(Box::new(sink)).expect("spawn");
        let driver = Driver::new(config, data.path().to_path_buf(), Box::new(bridge), narrator);
        Harness {
            driver,
            heard,
            opened,
            dest,
            data,
        }
    }

    fn harness(frame: Option<RgbImage>) -> Harness {
        let mut h = unstarted(frame);
        h.driver.start();
        h
    }

    fn message(driver: &Driver) -> String {
        driver.subscribe_status().borrow().message.clone()
    }

    #[test]
    fn add_page_without_document_reports_and_keeps_count() {
        let mut h = harness(None);
        assert!(h.driver.tick().is_none());
        assert_eq!(h.driver.apply(Command::AddPage).expect("apply"), Flow::Continue);
        assert_eq!(message(&h.driver), "No document detected yet");
        assert_eq!(h.driver.scanner().page_count(), 0);
    }

    #[test]
    fn scan_two_pages_and_save() {
        let mut h = harness(Some(page_frame()));
        let report = h.driver.tick().expect("frame");
        assert!(report.candidate_replaced);

        h.driver.apply(Command::AddPage).expect("apply");
        h.driver.apply(Command::AddPage).expect("apply");
        let status = h.driver.subscribe_status().borrow().clone();
        assert_eq!(status.message, "Page added to PDF. Total pages: 2");
        assert_eq!(status.session, SessionState::Active);

        h.driver.apply(Command::SavePdf).expect("apply");
        assert_eq!(message(&h.driver), "PDF saved successfully");
        let pdfs = std::fs::read_dir(h.dest.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "pdf"))
            .count();
        assert_eq!(pdfs, 1);

        h.driver.apply(Command::SavePdf).expect("apply");
        assert_eq!(message(&h.driver), "No document scanned yet or no pages added");

        h.driver.shutdown();
        let heard = h.heard.lock().expect("lock").clone();
        assert_eq!(
            heard,
            vec![
                "Initializing scanner application",
                "Starting a new scan session",
                "Page added to PDF. Total pages: 1",
                "Page added to PDF. Total pages: 2",
                "PDF saved successfully",
                "No document scanned yet or no pages added",
            ]
        );
    }

    #[test]
    fn edit_mode_narrates_guidance_and_records_drags() {
        let mut h = harness(Some(page_frame()));
        let view = h.driver.subscribe_view();
        h.driver.tick();
        assert!(view.borrow().camera.is_some());

        h.driver.apply(Command::ToggleEdit).expect("apply");
        assert_eq!(message(&h.driver), "Modify mode activated");
        assert!(h.driver.subscribe_status().borrow().editing);

        h.driver.apply(Command::PointerDown(Point::new(50.0, 50.0))).expect("apply");
        h.driver.apply(Command::PointerMove(Point::new(30.0, 70.0))).expect("apply");
        assert!(matches!(view.borrow().page, Some(DynamicImage::ImageRgb8(_))));
        h.driver.apply(Command::PointerUp(Point::new(10.0, 80.0))).expect("apply");
        assert_eq!(h.driver.scanner().redactions().len(), 1);
        assert!(matches!(view.borrow().page, Some(DynamicImage::ImageLuma8(_))));

        h.driver.apply(Command::ToggleEdit).expect("apply");
        assert_eq!(message(&h.driver), "Modify mode deactivated");

        h.driver.shutdown();
        let heard = h.heard.lock().expect("lock").clone();
        assert!(heard.contains(&format!("Modify mode activated. {EDIT_HINT}")));
    }

    #[test]
    fn toggle_edit_without_document_is_reported() {
        let mut h = harness(None);
        h.driver.apply(Command::ToggleEdit).expect("apply");
        assert_eq!(message(&h.driver), "No document detected yet");
        assert!(!h.driver.scanner().is_editing());
    }

    #[test]
    fn switch_camera_releases_then_opens_next() {
        let mut h = harness(Some(page_frame()));
        h.driver.apply(Command::SwitchCamera).expect("apply");
        assert_eq!(message(&h.driver), "Switched to camera 0");
        h.driver.apply(Command::SwitchCamera).expect("apply");
        assert_eq!(*h.opened.lock().expect("lock"), vec![1, 0, 1]);
        assert_eq!(h.driver.subscribe_status().borrow().camera_index, 1);
    }

    #[test]
    fn select_folder_persists_destination() {
        let mut h = harness(None);
        let target = h.dest.path().join("invoices");
        h.driver.apply(Command::SelectFolder(target.clone())).expect("apply");
        assert!(target.is_dir());
        assert_eq!(h.driver.scanner().destination(), target.as_path());
        let saved = crate::services::config_store::load_config(h.data.path()).expect("persisted");
        assert_eq!(saved.destination_dir, target);
    }

    #[test]
    fn open_folder_failure_is_not_fatal() {
        let mut h = harness(None);
        assert_eq!(h.driver.apply(Command::OpenFolder).expect("apply"), Flow::Continue);
        assert_eq!(message(&h.driver), "This feature isn't available on this system");
    }

    #[tokio::test]
    async fn run_stops_on_exit() {
        let h = unstarted(Some(page_frame()));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Command::AddPage).expect("send");
        tx.send(Command::Exit).expect("send");
        let status = h.driver.subscribe_status();
        h.driver.run(rx).await.expect("run");
        assert_eq!(status.borrow().message, "No document detected yet");
        assert_eq!(*h.opened.lock().expect("lock"), vec![1], "camera opened once");
        assert_eq!(
            *h.heard.lock().expect("lock"),
            vec!["Initializing scanner application", "No document detected yet"]
        );
    }

    #[tokio::test]
    async fn run_stops_when_commands_close() {
        let h = unstarted(None);
        let (tx, rx) = mpsc::unbounded_channel::<Command>();
        drop(tx);
        h.driver.run(rx).await.expect("run");
    }
}
