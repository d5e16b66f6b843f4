// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Standard MIDI file output.
//!
//! Writes a format 0 file with a single track. The header goes out before
//! recording starts with a placeholder track length, which is patched once the
//! track body has been flushed.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;

use super::track::FinalizedTrack;
use crate::config::{FrameRate, RecordingSettings, Tempo};

/// Errors while writing the file
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("track length patched before the header was written")]
    HeaderMissing,
    #[error("track length already patched")]
    AlreadyPatched,
    #[error("track of {0} bytes does not fit in a chunk")]
    TrackTooLong(usize),
}

/// Header time-division field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeDivision {
    /// Ticks per quarter note (1-32767)
    Metrical(u16),
    /// Frames per second and ticks per frame
    Smpte { fps: FrameRate, ticks: u8 },
}

impl TimeDivision {
    /// Division for validated settings
    pub fn from_settings(settings: &RecordingSettings) -> Self {
        match settings.tempo {
            Tempo::Metrical { .. } => TimeDivision::Metrical(settings.ticks),
            Tempo::Smpte { fps } => TimeDivision::Smpte {
                fps,
                ticks: settings.ticks.min(0xFF) as u8,
            },
        }
    }

    /// Encoded 16-bit field. SMPTE stores the negated frame rate in the high byte.
    pub fn to_bits(self) -> u16 {
        match self {
            TimeDivision::Metrical(ticks) => ticks & 0x7FFF,
            TimeDivision::Smpte { fps, ticks } => {
                ((0x100 - fps.frames() as u16) << 8) | ticks as u16
            }
        }
    }

    /// Decode a header field
    pub fn from_bits(bits: u16) -> Option<Self> {
        if bits & 0x8000 == 0 {
            return Some(TimeDivision::Metrical(bits));
        }
        let frames = 0x100 - (bits >> 8);
        let fps = FrameRate::try_from(frames as u32).ok()?;
        Some(TimeDivision::Smpte {
            fps,
            ticks: (bits & 0xFF) as u8,
        })
    }
}

/// Writer for a single-track MIDI file
pub struct SmfWriter<W: Write + Seek> {
    writer: W,
    /// Position of the track length field
    length_offset: Option<u64>,
    patched: bool,
}

impl SmfWriter<BufWriter<File>> {
    /// Create (or truncate) the output file
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Seek> SmfWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            length_offset: None,
            patched: false,
        }
    }

    /// Write the header chunk and the track chunk header with a zero length
    pub fn write_header(&mut self, division: TimeDivision) -> io::Result<()> {
        // MThd, length 6
        self.writer.write_all(b"MThd")?;
        self.writer.write_all(&6u32.to_be_bytes())?;
        // Format 0
        self.writer.write_all(&0u16.to_be_bytes())?;
        // One track
        self.writer.write_all(&1u16.to_be_bytes())?;
        self.writer.write_all(&division.to_bits().to_be_bytes())?;

        self.writer.write_all(b"MTrk")?;
        self.length_offset = Some(self.writer.stream_position()?);
        self.writer.write_all(&0u32.to_be_bytes())?;
        Ok(())
    }

    /// Write the whole track body
    pub fn flush(&mut self, track: &FinalizedTrack) -> io::Result<()> {
        self.writer.write_all(track.as_bytes())
    }

    /// Store the final track length in the placeholder and return to the end
    pub fn patch_length(&mut self, track: &FinalizedTrack) -> Result<(), ExportError> {
        let offset = self.length_offset.ok_or(ExportError::HeaderMissing)?;
        if self.patched {
            return Err(ExportError::AlreadyPatched);
        }
        let size =
            u32::try_from(track.size()).map_err(|_| ExportError::TrackTooLong(track.size()))?;

        let saved = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(offset))?;
        self.writer.write_all(&size.to_be_bytes())?;
        self.writer.seek(SeekFrom::Start(saved))?;
        self.patched = true;
        Ok(())
    }

    /// Flush buffered output and hand back the underlying stream
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
