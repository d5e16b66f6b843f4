// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Track body buffer.
//!
//! Holds the bytes of the single `MTrk` chunk while recording, together with
//! the delta-time and running-status state needed to encode the next event.

use super::vlq;
use crate::midi::event::Tick;
use crate::midi::messages;

/// End-of-track meta event body (type 0x2F, length 0)
const END_OF_TRACK: [u8; 3] = [messages::META, 0x2F, 0x00];

/// Track being recorded
#[derive(Debug, Clone, Default)]
pub struct Track {
    /// Encoded track body
    data: Vec<u8>,
    /// Tick of the most recent event, relative to the baseline
    last_tick: Tick,
    /// Current running status (0 = none)
    last_command: u8,
    /// Tick of the first accepted event
    baseline: Option<Tick>,
}

impl Track {
    /// Create an empty track
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes appended so far
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Encoded bytes so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Tick of the most recent event, relative to the baseline
    pub fn last_tick(&self) -> Tick {
        self.last_tick
    }

    /// Current running-status byte (0 when cleared)
    pub fn last_command(&self) -> u8 {
        self.last_command
    }

    /// Recording baseline, if an event has been accepted yet
    pub fn baseline(&self) -> Option<Tick> {
        self.baseline
    }

    /// Fix the baseline to `tick` unless it is already set.
    ///
    /// Returns true when this call set it.
    pub fn anchor(&mut self, tick: Tick) -> bool {
        if self.baseline.is_some() {
            return false;
        }
        self.baseline = Some(tick);
        true
    }

    /// Append one raw byte
    pub fn append_byte(&mut self, byte: u8) {
        self.data.push(byte);
    }

    /// Append a variable-length quantity
    pub fn append_vlq(&mut self, value: u32) {
        vlq::encode_into(&mut self.data, value);
    }

    /// Append the delta time from the previous event to `event_tick`.
    ///
    /// Events that arrive out of order get a delta of 0 and do not move
    /// `last_tick` backwards.
    pub fn append_delta(&mut self, event_tick: Tick) {
        let tick = self.relative(event_tick);
        let diff = tick.saturating_sub(self.last_tick);
        self.append_vlq(diff);
        self.last_tick = self.last_tick.max(tick);
    }

    /// Append a status byte unless running status makes it redundant.
    ///
    /// System and meta status bytes (0xF0 and above) clear running status.
    pub fn append_status(&mut self, cmd: u8) {
        if cmd != self.last_command {
            self.append_byte(cmd);
        }
        self.last_command = if cmd < messages::SYSEX_START { cmd } else { 0 };
    }

    /// Append a meta event at delta 0. Running status is left untouched.
    pub fn append_meta(&mut self, kind: u8, payload: &[u8]) {
        self.append_vlq(0);
        self.append_byte(messages::META);
        self.append_byte(kind);
        self.append_vlq(payload.len() as u32);
        self.data.extend_from_slice(payload);
    }

    /// Append a Set Tempo meta event
    pub fn append_tempo(&mut self, usecs_per_quarter: u32) {
        let bytes = usecs_per_quarter.to_be_bytes();
        self.append_meta(0x51, &bytes[1..]);
    }

    /// Append a Time Signature meta event
    pub fn append_time_signature(&mut self, numerator: u8, denominator_exponent: u8) {
        // 24 MIDI clocks per click, 8 notated 32nd notes per quarter
        self.append_meta(0x58, &[numerator, denominator_exponent, 24, 8]);
    }

    /// Close the track at `current_tick`.
    ///
    /// Appends the final delta (so the track lasts as long as the recording)
    /// and the end-of-track event. Consumes the track, so it can only happen once.
    pub fn finalize(mut self, current_tick: Tick) -> FinalizedTrack {
        let before = self.size();
        let tick = self.relative(current_tick);
        self.append_vlq(tick.saturating_sub(self.last_tick));
        self.data.extend_from_slice(&END_OF_TRACK);
        let extra_bytes = self.size() - before;
        FinalizedTrack {
            data: self.data,
            extra_bytes,
        }
    }

    fn relative(&self, tick: Tick) -> Tick {
        tick.saturating_sub(self.baseline.unwrap_or(0))
    }
}

/// Track closed by its end-of-track event, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTrack {
    data: Vec<u8>,
    extra_bytes: usize,
}

impl FinalizedTrack {
    /// Total body length, end-of-track included
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Bytes added by finalization
    pub fn extra_bytes(&self) -> usize {
        self.extra_bytes
    }

    /// Complete track body
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
