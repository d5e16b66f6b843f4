// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Recording clock.
//!
//! Ticks are derived from elapsed wall-clock time. SMPTE resolutions are
//! expressed as an equivalent quarter-note tempo and resolution, so both modes
//! share one conversion.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crate::config::{FrameRate, Tempo};
use crate::midi::event::{QueueId, Tick};

static NEXT_QUEUE: AtomicU32 = AtomicU32::new(1);

/// Tempo and resolution of the tick clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTempo {
    /// Microseconds per quarter note
    pub usecs_per_quarter: u32,
    /// Ticks per quarter note
    pub ppq: u32,
}

impl QueueTempo {
    /// Clock parameters for a tempo and tick resolution
    pub fn new(tempo: Tempo, ticks: u16) -> Self {
        let ticks = ticks as u32;
        match tempo {
            Tempo::Metrical { bpm } => Self {
                usecs_per_quarter: 60_000_000 / bpm as u32,
                ppq: ticks,
            },
            // ticks/s = fps * ticks
            Tempo::Smpte { fps } => match fps {
                FrameRate::Fps24 => Self {
                    usecs_per_quarter: 500_000,
                    ppq: 12 * ticks,
                },
                FrameRate::Fps25 => Self {
                    usecs_per_quarter: 400_000,
                    ppq: 10 * ticks,
                },
                FrameRate::Fps29 => Self {
                    usecs_per_quarter: 100_000_000,
                    ppq: 2997 * ticks,
                },
                FrameRate::Fps30 => Self {
                    usecs_per_quarter: 500_000,
                    ppq: 15 * ticks,
                },
            },
        }
    }

    /// Ticks elapsed after `elapsed`, saturating at `Tick::MAX`
    pub fn ticks_in(&self, elapsed: Duration) -> Tick {
        let ticks = elapsed.as_micros() * self.ppq as u128 / self.usecs_per_quarter as u128;
        Tick::try_from(ticks).unwrap_or(Tick::MAX)
    }
}

/// Running tick clock
#[derive(Debug, Clone, Copy)]
pub struct SequencerClock {
    id: QueueId,
    tempo: QueueTempo,
    origin: Instant,
}

impl SequencerClock {
    /// Start a new clock at tick 0
    pub fn start(tempo: QueueTempo) -> Self {
        Self::start_at(tempo, Instant::now())
    }

    /// Start a new clock whose tick 0 is `origin`
    pub fn start_at(tempo: QueueTempo, origin: Instant) -> Self {
        Self {
            id: QueueId(NEXT_QUEUE.fetch_add(1, Ordering::Relaxed)),
            tempo,
            origin,
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Tick at `instant` (0 for instants before the origin)
    pub fn tick_at(&self, instant: Instant) -> Tick {
        self.tempo
            .ticks_in(instant.saturating_duration_since(self.origin))
    }

    /// Current tick
    pub fn now(&self) -> Tick {
        self.tick_at(Instant::now())
    }
}
