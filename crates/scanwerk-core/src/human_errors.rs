// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable status messages for scanner errors.
//
// Every error is mapped to a short sentence suitable for the status line and
// for narration, plus a suggestion. The severity drives whether the frame loop
// keeps going (everything except `Fatal`).

use crate::error::ScanwerkError;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Retried automatically on the next frame (camera hiccup, bad geometry).
    Transient,
    /// The operator must do something first (point at a document, add a page).
    ActionRequired,
    /// Retrying will not help (unreadable image, broken configuration).
    Permanent,
    /// The scanner cannot continue.
    Fatal,
}

/// A human-readable error with a status message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Status line text; also what gets narrated.
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    /// Whether the frame loop retries on its own.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: impl Into<String>, retriable: bool, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable,
            severity,
        }
    }
}

/// Convert a `ScanwerkError` into operator-facing status text.
pub fn humanize_error(err: &ScanwerkError) -> HumanError {
    match err {
        ScanwerkError::NoCandidate => HumanError::new(
            "No document detected yet",
            "Place the page inside the blue frame on a dark background.",
            false,
            Severity::ActionRequired,
        ),

        ScanwerkError::EmptySession => HumanError::new(
            "No document scanned yet or no pages added",
            "Add at least one page before saving.",
            false,
            Severity::ActionRequired,
        ),

        ScanwerkError::CameraUnavailable(detail) => HumanError::new(
            "Camera not available",
            format!("Check the camera is connected or switch to another one. ({detail})"),
            true,
            Severity::Transient,
        ),

        ScanwerkError::GeometryDegenerate(_) => HumanError::new(
            "Document edges unclear",
            "Hold the page flat and keep all four corners in view.",
            true,
            Severity::Transient,
        ),

        ScanwerkError::ImageError(_) => HumanError::new(
            "The page image could not be processed",
            "Try adding the page again.",
            false,
            Severity::Permanent,
        ),

        ScanwerkError::PdfError(_) => HumanError::new(
            "The PDF could not be written",
            "Try saving again, or choose a different folder.",
            false,
            Severity::Permanent,
        ),

        ScanwerkError::InvalidCommand(detail) => HumanError::new(
            "Unknown command",
            format!("Check the command and try again. ({detail})"),
            false,
            Severity::ActionRequired,
        ),

        ScanwerkError::Narration(_) => HumanError::new(
            "Voice feedback unavailable",
            "Scanning continues; status is still shown on screen.",
            true,
            Severity::Transient,
        ),

        ScanwerkError::Serialization(_) => HumanError::new(
            "Settings could not be read",
            "Default settings are being used.",
            false,
            Severity::Permanent,
        ),

        ScanwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "No permission to write to the selected folder",
                "Select a different folder.",
                false,
                Severity::ActionRequired,
            ),
            std::io::ErrorKind::OutOfMemory => HumanError::new(
                "Out of memory",
                "Close other applications and restart the scanner.",
                false,
                Severity::Fatal,
            ),
            _ => HumanError::new(
                "A file could not be read or written",
                "Try again. If this keeps happening, the disk may be full.",
                true,
                Severity::Transient,
            ),
        },

        ScanwerkError::PlatformUnavailable => HumanError::new(
            "This feature isn't available on this system",
            "Open the folder from your file manager instead.",
            false,
            Severity::Permanent,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_uses_save_failure_text() {
        let human = humanize_error(&ScanwerkError::EmptySession);
        assert_eq!(human.message, "No document scanned yet or no pages added");
        assert_eq!(human.severity, Severity::ActionRequired);
    }

    #[test]
    fn camera_failure_is_retried() {
        let human = humanize_error(&ScanwerkError::CameraUnavailable("read failed".into()));
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn degenerate_geometry_is_not_fatal() {
        let human = humanize_error(&ScanwerkError::GeometryDegenerate("collinear".into()));
        assert_ne!(human.severity, Severity::Fatal);
    }

    #[test]
    fn out_of_memory_is_fatal() {
        let err = ScanwerkError::Io(std::io::Error::from(std::io::ErrorKind::OutOfMemory));
        assert_eq!(humanize_error(&err).severity, Severity::Fatal);
    }
}
