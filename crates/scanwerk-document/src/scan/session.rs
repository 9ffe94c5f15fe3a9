// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan session: accumulates committed pages into one PDF document.
//
// Idle until the first page is accepted, Active while pages accumulate, and
// back to Idle after a successful save or a discard.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::{DynamicImage, GrayImage};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{PaperSize, SessionId, SessionState};
use tracing::{debug, info, instrument, warn};

use crate::image::ImageProcessor;
use crate::pdf::{PdfReader, PdfWriter};

const DOCUMENT_TITLE: &str = "Scanned Document";

/// Suffixed names tried when several saves land in the same second.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A committed page. Never modified after creation.
#[derive(Debug, Clone)]
pub struct Page {
    number: usize,
    image: GrayImage,
}

impl Page {
    /// 1-based position in the document.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }
}

/// Result of [`ScanSession::add_page`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPage {
    /// Nothing to commit; the session is unchanged.
    NoCandidate,
    Added {
        page_number: usize,
        /// This page opened a new session.
        session_started: bool,
    },
}

/// A document written by [`ScanSession::save`].
#[derive(Debug, Clone)]
pub struct SavedDocument {
    pub path: PathBuf,
    pub bytes: usize,
    pub page_count: usize,
}

/// The document currently being assembled.
pub struct ScanSession {
    id: Option<SessionId>,
    pages: Vec<Page>,
    writer: Option<PdfWriter>,
    paper_size: PaperSize,
    destination: PathBuf,
}

impl ScanSession {
    pub fn new(destination: impl Into<PathBuf>, paper_size: PaperSize) -> Self {
        Self {
            id: None,
            pages: Vec::new(),
            writer: None,
            paper_size,
            destination: destination.into(),
        }
    }

    // -- Inspection -----------------------------------------------------------

    pub fn state(&self) -> SessionState {
        if self.writer.is_some() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Change where temp images and saved documents go, creating the directory
    /// if it does not exist. Applies to the open session too.
    pub fn set_destination(&mut self, destination: impl Into<PathBuf>) -> Result<()> {
        let destination = destination.into();
        std::fs::create_dir_all(&destination)?;
        info!(path = %destination.display(), "Destination directory set");
        self.destination = destination;
        Ok(())
    }

    // -- Transitions ----------------------------------------------------------

    /// Commit `preview` as the next page.
    ///
    /// The image takes a round trip through a temp file in the destination
    /// directory; the file is removed before this returns, on every path.
    #[instrument(skip_all, fields(pages = self.pages.len()))]
    pub fn add_page(&mut self, preview: Option<&GrayImage>) -> Result<AddPage> {
        let Some(preview) = preview else {
            debug!("No page candidate; nothing added");
            return Ok(AddPage::NoCandidate);
        };

        let page_image = self.stage_through_temp_file(preview)?;

        let session_started = self.writer.is_none();
        let paper_size = self.paper_size;
        let writer = self
            .writer
            .get_or_insert_with(|| PdfWriter::new(paper_size, DOCUMENT_TITLE));
        if let Err(err) = writer.add_image_page(&page_image) {
            if session_started {
                self.writer = None;
            }
            return Err(err);
        }

        if session_started {
            let id = SessionId::new();
            info!(session = %id, "Starting a new scan session");
            self.id = Some(id);
        }

        let page_number = self.pages.len() + 1;
        self.pages.push(Page {
            number: page_number,
            image: page_image.to_luma8(),
        });
        info!(page_number, "Page added to PDF");

        Ok(AddPage::Added {
            page_number,
            session_started,
        })
    }

    fn stage_through_temp_file(&self, preview: &GrayImage) -> Result<DynamicImage> {
        std::fs::create_dir_all(&self.destination)?;
        let prefix = format!("temp_{}_", Local::now().format("%H-%M-%S"));
        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".png")
            .tempfile_in(&self.destination)?;

        ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(preview.clone())).save_png(temp.path())?;
        let staged = ImageProcessor::open(temp.path())?.into_dynamic();
        debug!(path = %temp.path().display(), "Page image staged");
        Ok(staged)
    }

    /// Write the document to the destination directory and close the session.
    ///
    /// The file appears under its final name only once fully written. On
    /// failure the session keeps its pages so the save can be retried.
    #[instrument(skip_all, fields(pages = self.pages.len()))]
    pub fn save(&mut self) -> Result<SavedDocument> {
        let writer = match &self.writer {
            Some(writer) if !self.pages.is_empty() => writer,
            _ => return Err(ScanwerkError::EmptySession),
        };

        let bytes = writer.to_bytes();
        let written = PdfReader::from_bytes(&bytes)?.page_count();
        if written != self.pages.len() {
            return Err(ScanwerkError::PdfError(format!(
                "document has {} pages, expected {}",
                written,
                self.pages.len()
            )));
        }

        std::fs::create_dir_all(&self.destination)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.destination)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;

        // Never replace an earlier document; take the next free suffix instead.
        let stamp = Local::now().format("%m-%d-%y_%H-%M-%S").to_string();
        let mut attempt = 0;
        let path = loop {
            let path = self.destination.join(document_file_name(&stamp, attempt));
            match temp.persist_noclobber(&path) {
                Ok(_) => break path,
                Err(err)
                    if err.error.kind() == std::io::ErrorKind::AlreadyExists
                        && attempt < MAX_NAME_ATTEMPTS =>
                {
                    debug!(path = %path.display(), "document name taken");
                    temp = err.file;
                    attempt += 1;
                }
                Err(err) => return Err(ScanwerkError::Io(err.error)),
            }
        };

        let saved = SavedDocument {
            path,
            bytes: bytes.len(),
            page_count: written,
        };
        info!(path = %saved.path.display(), pages = saved.page_count, "PDF saved successfully");
        self.reset();
        Ok(saved)
    }

    /// Abandon the open session without writing anything.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pages.len();
        if dropped > 0 {
            warn!(pages = dropped, "Scan session discarded");
        }
        self.reset();
        dropped
    }

    fn reset(&mut self) {
        self.id = None;
        self.pages.clear();
        self.writer = None;
    }
}

/// `scanned_document_<mm-dd-yy_HH-MM-SS>.pdf`, then `..._1.pdf`, `..._2.pdf`.
fn document_file_name(stamp: &str, attempt: u32) -> String {
    match attempt {
        0 => format!("scanned_document_{stamp}.pdf"),
        n => format!("scanned_document_{stamp}_{n}.pdf"),
    }
}
