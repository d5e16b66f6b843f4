// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI input side of the recorder.
//!
//! This module defines the events the recorder understands and the
//! [`EventSource`] trait that delivers them, so the capture loop can run
//! against a real input port or a scripted source in tests.

pub mod event;
pub mod input;

use std::time::Duration;

use thiserror::Error;

pub use event::{Event, EventKind, QueueId, Tick, Timestamp};
pub use input::{list_ports, print_ports, MidiInputSource, PortInfo};

/// Errors raised while acquiring or reading an event source
#[derive(Debug, Error)]
pub enum SourceError {
    /// The MIDI subsystem could not be opened
    #[error("cannot open MIDI input: {0}")]
    Init(String),
    /// No input port matched the requested name or index
    #[error("MIDI port {0:?} not found")]
    PortNotFound(String),
    /// More than one port was requested
    #[error("only one port allowed, got {0:?}")]
    MultiplePorts(String),
    /// Connecting to the port failed
    #[error("cannot connect from port {port:?}: {reason}")]
    Connect { port: String, reason: String },
    /// Reading from an already connected source failed
    #[error("MIDI input failed: {0}")]
    Read(String),
}

/// Result of waiting on an event source
#[derive(Debug, Clone, PartialEq)]
pub enum Poll {
    /// Every event that was immediately available (never empty)
    Events(Vec<Event>),
    /// The wait expired before anything arrived
    TimedOut,
    /// No more events will ever arrive
    Closed,
}

/// Source of timestamped events for a recording.
///
/// Implementations own the clock that stamps events.
pub trait EventSource {
    /// Wait for the next batch of events.
    ///
    /// `None` waits indefinitely. Once something arrives, everything else that
    /// is already pending is returned in the same batch.
    fn poll(&mut self, timeout: Option<Duration>) -> Result<Poll, SourceError>;

    /// Current tick of the recording clock
    fn current_tick(&self) -> Tick;

    /// Identifier of the clock that stamps this source's events
    fn queue_id(&self) -> QueueId;
}

/// MIDI message constants
pub mod messages {
    // Channel Voice Messages (upper nibble, lower nibble is channel 0-15)
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLY_AFTERTOUCH: u8 = 0xA0;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_AFTERTOUCH: u8 = 0xD0;
    pub const PITCH_BEND: u8 = 0xE0;

    // System Common Messages
    pub const SYSEX_START: u8 = 0xF0;
    pub const SYSEX_END: u8 = 0xF7;

    // SMF meta event status
    pub const META: u8 = 0xFF;

    // Controller numbers used for parameter numbers
    pub const DATA_ENTRY_MSB: u8 = 0x06;
    pub const DATA_ENTRY_LSB: u8 = 0x26;
    pub const NRPN_LSB: u8 = 0x62;
    pub const NRPN_MSB: u8 = 0x63;
    pub const RPN_LSB: u8 = 0x64;
    pub const RPN_MSB: u8 = 0x65;
}
