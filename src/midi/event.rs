// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timestamped MIDI events as delivered to the recorder.

use std::time::Duration;

use super::messages;

/// Smallest unit of the recording clock
pub type Tick = u32;

/// Identifies the clock an event was stamped with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueId(pub u32);

/// When an event happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// Tick of the recording clock
    Tick(Tick),
    /// Wall-clock time (not recordable)
    Real(Duration),
}

/// What happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    KeyPressure { channel: u8, note: u8, velocity: u8 },
    Controller { channel: u8, param: u8, value: u8 },
    ProgramChange { channel: u8, value: u8 },
    ChannelPressure { channel: u8, value: u8 },
    /// Pitch offset from center, -8192..=8191
    PitchBend { channel: u8, value: i16 },
    /// 14-bit controller write (MSB controller number, 0..=16383 value)
    Control14 { channel: u8, param: u8, value: u16 },
    NonRegisteredParam { channel: u8, param: u16, value: u16 },
    RegisteredParam { channel: u8, param: u16, value: u16 },
    /// Raw System Exclusive payload, written verbatim
    SysEx(Vec<u8>),
    /// Anything the recorder does not store
    Other,
}

impl EventKind {
    /// Parse one complete raw MIDI message.
    ///
    /// Note On with velocity 0 is kept as Note On. Messages that are too short
    /// or not stored in a track come back as [`EventKind::Other`].
    pub fn from_bytes(data: &[u8]) -> Self {
        let Some(&status) = data.first() else {
            return EventKind::Other;
        };

        if status == messages::SYSEX_START {
            return EventKind::SysEx(data.to_vec());
        }
        if status > messages::SYSEX_START {
            return EventKind::Other;
        }

        let channel = status & 0x0F;
        let byte = |i: usize| data.get(i).map(|b| b & 0x7F);

        match (status & 0xF0, byte(1), byte(2)) {
            (messages::NOTE_OFF, Some(note), Some(velocity)) => EventKind::NoteOff {
                channel,
                note,
                velocity,
            },
            (messages::NOTE_ON, Some(note), Some(velocity)) => EventKind::NoteOn {
                channel,
                note,
                velocity,
            },
            (messages::POLY_AFTERTOUCH, Some(note), Some(velocity)) => EventKind::KeyPressure {
                channel,
                note,
                velocity,
            },
            (messages::CONTROL_CHANGE, Some(param), Some(value)) => EventKind::Controller {
                channel,
                param,
                value,
            },
            (messages::PROGRAM_CHANGE, Some(value), _) => {
                EventKind::ProgramChange { channel, value }
            }
            (messages::CHANNEL_AFTERTOUCH, Some(value), _) => {
                EventKind::ChannelPressure { channel, value }
            }
            (messages::PITCH_BEND, Some(lsb), Some(msb)) => {
                let raw = ((msb as i16) << 7) | lsb as i16;
                EventKind::PitchBend {
                    channel,
                    value: raw - 8192,
                }
            }
            _ => EventKind::Other,
        }
    }
}

/// A timestamped event addressed to one of our ports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Clock that produced `time`
    pub queue: QueueId,
    /// Destination port number on our side
    pub port: u8,
    pub time: Timestamp,
    pub kind: EventKind,
}

impl Event {
    /// Create an event stamped in ticks
    pub fn at_tick(queue: QueueId, port: u8, tick: Tick, kind: EventKind) -> Self {
        Self {
            queue,
            port,
            time: Timestamp::Tick(tick),
            kind,
        }
    }

    /// Tick timestamp, if the event has one
    pub fn tick(&self) -> Option<Tick> {
        match self.time {
            Timestamp::Tick(tick) => Some(tick),
            Timestamp::Real(_) => None,
        }
    }
}
