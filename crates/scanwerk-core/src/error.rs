// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
///
/// The first four variants are operator-facing conditions: they are handled
/// where they occur and surfaced as status text, never as a crash.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Operator-facing scan conditions --
    #[error("no document detected")]
    NoCandidate,

    #[error("no pages have been added to the scan session")]
    EmptySession,

    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("degenerate document geometry: {0}")]
    GeometryDegenerate(String),

    // -- Document errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Operator surface --
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("narration failed: {0}")]
    Narration(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
