// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Recording and export system.
//!
//! This module provides:
//! - Variable-length quantity encoding
//! - The track buffer with delta time and running status
//! - Event transcoding
//! - Standard MIDI file output
//! - The capture loop tying them together

pub mod capture;
pub mod export;
pub mod track;
pub mod transcode;
pub mod vlq;

pub use capture::{
    CaptureLoop, CaptureState, CaptureSummary, Finished, RecordError, StopReason, StopToken,
};
pub use export::{ExportError, SmfWriter, TimeDivision};
pub use track::{FinalizedTrack, Track};
pub use transcode::{Outcome, Transcoder};
