// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! This module provides the recording clock that turns elapsed time into ticks.

pub mod clock;

pub use clock::{QueueTempo, SequencerClock};
