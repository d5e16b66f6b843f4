// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Record a live MIDI input port to a Standard MIDI File.
//!
//! Events are transcoded into a single format 0 track as they arrive, using
//! running status to keep the file small. The file header is written up
//! front and the track length is patched in once recording stops.

pub mod config;
pub mod midi;
pub mod recording;
pub mod shutdown;
pub mod timing;

pub use config::{RecorderConfig, RecordingSettings};
pub use recording::{CaptureLoop, RecordError, SmfWriter, StopReason, StopToken};
