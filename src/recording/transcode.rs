// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Event to SMF byte transcoding.
//!
//! Each accepted event becomes one or more track messages: a delta time, a
//! status byte (left out under running status) and the data bytes.

use tracing::trace;

use super::track::Track;
use crate::midi::event::{Event, EventKind, QueueId};
use crate::midi::messages;

/// What happened to an event offered to the transcoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Bytes were appended to the track
    Recorded,
    /// Accepted but nothing to store
    Ignored,
    /// Stamped by a foreign clock, not in ticks, or addressed to another port
    Rejected,
}

/// Writes events into a track
#[derive(Debug, Clone, Copy)]
pub struct Transcoder {
    queue: QueueId,
    port: u8,
}

impl Transcoder {
    /// Transcoder accepting events stamped by `queue` and addressed to `port`
    pub fn new(queue: QueueId, port: u8) -> Self {
        Self { queue, port }
    }

    /// Transcode one event into `track`
    pub fn record(&self, track: &mut Track, event: &Event) -> Outcome {
        if event.queue != self.queue || event.port != self.port {
            return Outcome::Rejected;
        }
        let Some(tick) = event.tick() else {
            return Outcome::Rejected;
        };

        match event.kind {
            EventKind::Other => return Outcome::Ignored,
            EventKind::SysEx(ref payload) if payload.is_empty() => return Outcome::Ignored,
            EventKind::NoteOn {
                channel,
                note,
                velocity,
            } => voice(track, tick, messages::NOTE_ON, channel, &[note, velocity]),
            EventKind::NoteOff {
                channel,
                note,
                velocity,
            } => voice(track, tick, messages::NOTE_OFF, channel, &[note, velocity]),
            EventKind::KeyPressure {
                channel,
                note,
                velocity,
            } => voice(
                track,
                tick,
                messages::POLY_AFTERTOUCH,
                channel,
                &[note, velocity],
            ),
            EventKind::Controller {
                channel,
                param,
                value,
            } => voice(
                track,
                tick,
                messages::CONTROL_CHANGE,
                channel,
                &[param, value],
            ),
            EventKind::ProgramChange { channel, value } => {
                voice(track, tick, messages::PROGRAM_CHANGE, channel, &[value])
            }
            EventKind::ChannelPressure { channel, value } => {
                voice(track, tick, messages::CHANNEL_AFTERTOUCH, channel, &[value])
            }
            EventKind::PitchBend { channel, value } => {
                let raw = (value as i32 + 8192) as u32;
                voice(
                    track,
                    tick,
                    messages::PITCH_BEND,
                    channel,
                    &[raw as u8, (raw >> 7) as u8],
                )
            }
            EventKind::Control14 {
                channel,
                param,
                value,
            } => {
                let param = param & 0x7F;
                controller(track, tick, channel, param, (value >> 7) as u8);
                // Controllers 0-31 have their LSB partner at +32
                if param < 0x20 {
                    controller(track, tick, channel, param + 0x20, value as u8);
                }
            }
            EventKind::NonRegisteredParam {
                channel,
                param,
                value,
            } => parameter(
                track,
                tick,
                channel,
                [messages::NRPN_LSB, messages::NRPN_MSB],
                param,
                value,
            ),
            EventKind::RegisteredParam {
                channel,
                param,
                value,
            } => parameter(
                track,
                tick,
                channel,
                [messages::RPN_LSB, messages::RPN_MSB],
                param,
                value,
            ),
            EventKind::SysEx(ref payload) => {
                delta(track, tick);
                if payload.first() == Some(&messages::SYSEX_START) {
                    track.append_status(messages::SYSEX_START);
                } else {
                    track.append_status(messages::SYSEX_END);
                }
                track.append_vlq(payload.len() as u32);
                for byte in payload {
                    track.append_byte(*byte);
                }
            }
        }

        Outcome::Recorded
    }
}

/// Delta time of a message at `tick`. The first message fixes the baseline.
fn delta(track: &mut Track, tick: u32) {
    if track.anchor(tick) {
        trace!(tick, "recording baseline fixed");
    }
    track.append_delta(tick);
}

/// Channel voice message with 7-bit data bytes
fn voice(track: &mut Track, tick: u32, status: u8, channel: u8, data: &[u8]) {
    delta(track, tick);
    track.append_status(status | (channel & 0x0F));
    for byte in data {
        track.append_byte(byte & 0x7F);
    }
}

fn controller(track: &mut Track, tick: u32, channel: u8, param: u8, value: u8) {
    voice(
        track,
        tick,
        messages::CONTROL_CHANGE,
        channel,
        &[param, value],
    );
}

/// Parameter number (LSB, MSB) followed by data entry (MSB, LSB)
fn parameter(track: &mut Track, tick: u32, channel: u8, numbers: [u8; 2], param: u16, value: u16) {
    controller(track, tick, channel, numbers[0], param as u8);
    controller(track, tick, channel, numbers[1], (param >> 7) as u8);
    controller(track, tick, channel, messages::DATA_ENTRY_MSB, (value >> 7) as u8);
    controller(track, tick, channel, messages::DATA_ENTRY_LSB, value as u8);
}
