// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Recorder configuration.
//!
//! [`RecorderConfig`] is the loosely typed form read from a TOML or YAML file
//! and overridden by command-line flags. [`RecorderConfig::validate`] turns it
//! into [`RecordingSettings`], which only holds values a file can be written with.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Default metrical tempo
pub const DEFAULT_BPM: u16 = 120;
/// Default ticks per quarter note
pub const DEFAULT_METRICAL_TICKS: u16 = 384;
/// Default ticks per SMPTE frame
pub const DEFAULT_SMPTE_TICKS: u16 = 40;
/// Largest ticks-per-frame an SMPTE division can carry
pub const MAX_SMPTE_TICKS: u16 = 0xFF;
/// Largest metrical division
pub const MAX_TICKS: u16 = 0x7FFF;

/// Configuration errors, all detected before recording starts
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid tempo {0} (must be 4-6000 bpm)")]
    InvalidTempo(u32),
    #[error("invalid number of frames/s {0} (must be 24, 25, 29 or 30)")]
    InvalidFrameRate(u32),
    #[error("invalid number of ticks {0} (must be 1-32767)")]
    InvalidTicks(u32),
    #[error("invalid time signature ({0})")]
    InvalidTimeSignature(String),
    #[error("no source port specified")]
    MissingPort,
    #[error("no output file specified")]
    MissingOutput,
}

/// SMPTE frame rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRate {
    Fps24,
    Fps25,
    /// 30 drop-frame (29.97)
    Fps29,
    Fps30,
}

impl FrameRate {
    /// Nominal frames per second as stored in the file header
    pub fn frames(self) -> u8 {
        match self {
            FrameRate::Fps24 => 24,
            FrameRate::Fps25 => 25,
            FrameRate::Fps29 => 29,
            FrameRate::Fps30 => 30,
        }
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            24 => Ok(FrameRate::Fps24),
            25 => Ok(FrameRate::Fps25),
            29 => Ok(FrameRate::Fps29),
            30 => Ok(FrameRate::Fps30),
            other => Err(ConfigError::InvalidFrameRate(other)),
        }
    }
}

/// How ticks relate to time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tempo {
    /// Beats per minute, ticks count fractions of a quarter note
    Metrical { bpm: u16 },
    /// Ticks count fractions of an SMPTE frame
    Smpte { fps: FrameRate },
}

impl Tempo {
    /// Validated metrical tempo
    pub fn metrical(bpm: u32) -> Result<Self, ConfigError> {
        if !(4..=6000).contains(&bpm) {
            return Err(ConfigError::InvalidTempo(bpm));
        }
        Ok(Tempo::Metrical { bpm: bpm as u16 })
    }

    /// Validated SMPTE timing
    pub fn smpte(fps: u32) -> Result<Self, ConfigError> {
        Ok(Tempo::Smpte {
            fps: FrameRate::try_from(fps)?,
        })
    }

    pub fn is_smpte(&self) -> bool {
        matches!(self, Tempo::Smpte { .. })
    }

    /// Microseconds per quarter note (metrical timing only)
    pub fn usecs_per_quarter(&self) -> Option<u32> {
        match self {
            Tempo::Metrical { bpm } => Some(60_000_000 / *bpm as u32),
            Tempo::Smpte { .. } => None,
        }
    }
}

/// Time signature written at the start of metrical recordings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    numerator: u8,
    denominator: u8,
    exponent: u8,
}

impl TimeSignature {
    /// Create a time signature; both parts must be 1-64
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        if !(1..=64).contains(&numerator) || !(1..=64).contains(&denominator) {
            return None;
        }
        Some(Self {
            numerator: numerator as u8,
            denominator: denominator as u8,
            exponent: denominator.ilog2() as u8,
        })
    }

    pub fn numerator(&self) -> u8 {
        self.numerator
    }

    pub fn denominator(&self) -> u8 {
        self.denominator
    }

    /// Denominator as a power of two
    pub fn exponent(&self) -> u8 {
        self.exponent
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
            exponent: 2,
        }
    }
}

impl FromStr for TimeSignature {
    type Err = ConfigError;

    /// Parse `"nn:dd"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidTimeSignature(s.to_string());
        let (num, den) = s.split_once(':').ok_or_else(invalid)?;
        let num: u32 = num.trim().parse().map_err(|_| invalid())?;
        let den: u32 = den.trim().parse().map_err(|_| invalid())?;
        Self::new(num, den).ok_or_else(invalid)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

/// Root configuration, as read from a file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RecorderConfig {
    /// Source port, by index or name
    pub port: Option<String>,
    /// File to record to
    pub output: Option<PathBuf>,
    /// Metrical tempo in beats per minute
    pub bpm: Option<u32>,
    /// SMPTE frames per second (takes precedence over `bpm`)
    pub fps: Option<u32>,
    /// Ticks per beat or per frame
    pub ticks: Option<u32>,
    /// Time signature as `"nn:dd"`
    pub time_signature: Option<String>,
    /// Stop this many milliseconds after the last event (0 = disabled)
    pub timeout_ms: u64,
    /// One track per channel (accepted, not supported)
    pub split_channels: bool,
}

impl RecorderConfig {
    /// Load a configuration file; `.yaml`/`.yml` files are YAML, anything else TOML
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            Self::from_yaml(&contents)
        } else {
            Self::from_toml(&contents)
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse from a TOML string
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Parse from a YAML string
    pub fn from_yaml(text: &str) -> Result<Self, String> {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    /// Check every setting and produce the values recording runs with
    pub fn validate(&self) -> Result<RecordingSettings, ConfigError> {
        let tempo = match (self.fps, self.bpm) {
            (Some(fps), _) => Tempo::smpte(fps)?,
            (None, Some(bpm)) => Tempo::metrical(bpm)?,
            (None, None) => Tempo::Metrical { bpm: DEFAULT_BPM },
        };

        let ticks = match self.ticks {
            Some(ticks) if ticks < 1 || ticks > MAX_TICKS as u32 => {
                return Err(ConfigError::InvalidTicks(ticks));
            }
            Some(ticks) => ticks as u16,
            None if tempo.is_smpte() => DEFAULT_SMPTE_TICKS,
            None => DEFAULT_METRICAL_TICKS,
        };
        let ticks = if tempo.is_smpte() && ticks > MAX_SMPTE_TICKS {
            warn!(ticks, "ticks per frame limited to {}", MAX_SMPTE_TICKS);
            MAX_SMPTE_TICKS
        } else {
            ticks
        };

        let time_signature = match &self.time_signature {
            Some(text) => text.parse()?,
            None => TimeSignature::default(),
        };

        let timeout = match self.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(RecordingSettings {
            tempo,
            ticks,
            time_signature,
            timeout,
        })
    }
}

/// Validated recording parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSettings {
    pub tempo: Tempo,
    /// Ticks per quarter note, or per frame in SMPTE mode
    pub ticks: u16,
    pub time_signature: TimeSignature,
    /// Stop after this much silence once something was recorded
    pub timeout: Option<Duration>,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            tempo: Tempo::Metrical { bpm: DEFAULT_BPM },
            ticks: DEFAULT_METRICAL_TICKS,
            time_signature: TimeSignature::default(),
            timeout: None,
        }
    }
}
