// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Recording session.
//!
//! [`CaptureLoop`] owns the track, the output writer and the event source for
//! one recording. It waits for batches of events, transcodes them, and when a
//! stop condition is reached closes the track and patches the file.

use std::io::{Seek, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::export::{ExportError, SmfWriter, TimeDivision};
use super::track::Track;
use super::transcode::{Outcome, Transcoder};
use crate::config::{ConfigError, RecordingSettings};
use crate::midi::input::RECORD_PORT;
use crate::midi::{EventSource, Poll, SourceError};

/// Longest single wait, so stop requests are noticed without events arriving
pub const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that abort a recording
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("cannot write MIDI file: {0}")]
    Export(#[from] ExportError),
    #[error("recording already {0:?}")]
    InvalidState(CaptureState),
}

impl From<std::io::Error> for RecordError {
    fn from(err: std::io::Error) -> Self {
        RecordError::Export(ExportError::Io(err))
    }
}

/// Capture loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Set up, header not written yet
    Idle,
    /// Waiting for and transcoding events
    Recording,
    /// Stop condition reached, finalization pending
    Draining,
    /// File complete
    Finalized,
}

/// Why recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stop was requested through the [`StopToken`]
    Requested,
    /// Nothing arrived for the configured timeout after recording something
    Timeout,
    /// The source will deliver no more events
    SourceClosed,
    /// The source failed; what was recorded is kept
    SourceFailed,
}

/// Shared flag used to ask a capture loop to stop.
///
/// The loop checks it once per iteration, after the current batch.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Statistics of a finished recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Events written to the track
    pub events: usize,
    /// Events dropped by the acceptance filter
    pub rejected: usize,
    /// Final track chunk length
    pub track_bytes: usize,
    pub reason: StopReason,
}

/// A finished recording and its released output stream
#[derive(Debug)]
pub struct Finished<W> {
    pub summary: CaptureSummary,
    pub output: W,
}

/// One recording session
pub struct CaptureLoop<S: EventSource, W: Write + Seek> {
    source: S,
    /// Output, released once finalization ends (or the header cannot be written)
    writer: Option<SmfWriter<W>>,
    transcoder: Transcoder,
    track: Track,
    settings: RecordingSettings,
    stop: StopToken,
    state: CaptureState,
    recorded: usize,
    rejected: usize,
    /// Time waited without receiving anything
    silence: Duration,
}

impl<S: EventSource, W: Write + Seek> CaptureLoop<S, W> {
    /// Set up a session. In metrical mode the track starts with the tempo and
    /// time signature meta events.
    pub fn new(source: S, writer: SmfWriter<W>, settings: RecordingSettings, stop: StopToken) -> Self {
        let mut track = Track::new();
        if let Some(usecs) = settings.tempo.usecs_per_quarter() {
            track.append_tempo(usecs);
            track.append_time_signature(
                settings.time_signature.numerator(),
                settings.time_signature.exponent(),
            );
        }

        let transcoder = Transcoder::new(source.queue_id(), RECORD_PORT);

        Self {
            source,
            writer: Some(writer),
            transcoder,
            track,
            settings,
            stop,
            state: CaptureState::Idle,
            recorded: 0,
            rejected: 0,
            silence: Duration::ZERO,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Events recorded so far
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    /// Track being recorded
    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Write the file header and start accepting events
    pub fn start(&mut self) -> Result<(), RecordError> {
        if self.state != CaptureState::Idle {
            return Err(RecordError::InvalidState(self.state));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or(RecordError::InvalidState(self.state))?;
        if let Err(err) = writer.write_header(TimeDivision::from_settings(&self.settings)) {
            self.writer = None;
            return Err(err.into());
        }
        self.state = CaptureState::Recording;
        info!(
            tempo = ?self.settings.tempo,
            ticks = self.settings.ticks,
            "recording started"
        );
        Ok(())
    }

    /// Wait for one batch of events and transcode it.
    ///
    /// Returns the stop reason once recording should end.
    pub fn step(&mut self) -> Result<Option<StopReason>, RecordError> {
        if self.state != CaptureState::Recording {
            return Err(RecordError::InvalidState(self.state));
        }

        let wait = self.next_wait();
        let poll = match self.source.poll(Some(wait)) {
            Ok(poll) => poll,
            Err(err) => {
                warn!(error = %err, "event source failed, stopping");
                return Ok(Some(StopReason::SourceFailed));
            }
        };

        match poll {
            Poll::Events(events) => {
                self.silence = Duration::ZERO;
                for event in &events {
                    match self.transcoder.record(&mut self.track, event) {
                        Outcome::Recorded => self.recorded += 1,
                        Outcome::Ignored => {}
                        Outcome::Rejected => {
                            self.rejected += 1;
                            debug!(?event, "discarded event");
                        }
                    }
                }
                debug!(
                    batch = events.len(),
                    track_bytes = self.track.size(),
                    "transcoded batch"
                );
            }
            Poll::TimedOut => {
                self.silence += wait;
                if let Some(timeout) = self.settings.timeout {
                    if self.recorded > 0 && self.silence >= timeout {
                        return Ok(Some(StopReason::Timeout));
                    }
                }
            }
            Poll::Closed => return Ok(Some(StopReason::SourceClosed)),
        }

        if self.stop.is_stop_requested() {
            return Ok(Some(StopReason::Requested));
        }
        Ok(None)
    }

    /// Record until a stop condition, then finalize the file
    pub fn run(mut self) -> Result<Finished<W>, RecordError> {
        if self.state == CaptureState::Idle {
            self.start()?;
        }

        let reason = loop {
            if let Some(reason) = self.step()? {
                break reason;
            }
        };
        debug!(?reason, "recording stopped");

        self.finalize(reason)
    }

    /// Close the track at the source's current tick, write it out and patch
    /// the track length.
    ///
    /// The output is released on return, whether or not writing succeeded.
    pub fn finalize(&mut self, reason: StopReason) -> Result<Finished<W>, RecordError> {
        if !matches!(self.state, CaptureState::Recording | CaptureState::Draining) {
            return Err(RecordError::InvalidState(self.state));
        }
        let mut writer = self
            .writer
            .take()
            .ok_or(RecordError::InvalidState(self.state))?;
        self.state = CaptureState::Draining;

        let current_tick = self.source.current_tick();
        let track = std::mem::take(&mut self.track).finalize(current_tick);

        writer.flush(&track)?;
        writer.patch_length(&track)?;
        let output = writer.finish()?;

        let summary = CaptureSummary {
            events: self.recorded,
            rejected: self.rejected,
            track_bytes: track.size(),
            reason,
        };
        info!(
            events = summary.events,
            track_bytes = summary.track_bytes,
            ?reason,
            "recording finalized"
        );
        self.state = CaptureState::Finalized;

        Ok(Finished { summary, output })
    }

    fn next_wait(&self) -> Duration {
        match self.settings.timeout {
            Some(timeout) if self.recorded > 0 => timeout
                .saturating_sub(self.silence)
                .min(STOP_CHECK_INTERVAL)
                .max(Duration::from_millis(1)),
            _ => STOP_CHECK_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FrameRate, Tempo, TimeSignature};
    use crate::midi::event::{Event, EventKind, QueueId, Tick};
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::io::{self, Cursor, Seek, SeekFrom, Write};
    use std::rc::Rc;

    const QUEUE: QueueId = QueueId(3);

    enum Step {
        Poll(Poll),
        Fail,
    }

    struct ScriptedSource {
        steps: VecDeque<Step>,
        now: Tick,
        waits: Vec<Duration>,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>, now: Tick) -> Self {
            Self {
                steps: steps.into(),
                now,
                waits: Vec::new(),
            }
        }
    }

    impl EventSource for ScriptedSource {
        fn poll(&mut self, timeout: Option<Duration>) -> Result<Poll, SourceError> {
            if let Some(t) = timeout {
                self.waits.push(t);
            }
            match self.steps.pop_front() {
                Some(Step::Poll(poll)) => Ok(poll),
                Some(Step::Fail) => Err(SourceError::Read("device unplugged".to_string())),
                None => Ok(Poll::Closed),
            }
        }

        fn current_tick(&self) -> Tick {
            self.now
        }

        fn queue_id(&self) -> QueueId {
            QUEUE
        }
    }

    fn note_on(tick: Tick) -> Event {
        Event::at_tick(
            QUEUE,
            0,
            tick,
            EventKind::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100,
            },
        )
    }

    fn session(
        steps: Vec<Step>,
        now: Tick,
        settings: RecordingSettings,
    ) -> CaptureLoop<ScriptedSource, Cursor<Vec<u8>>> {
        CaptureLoop::new(
            ScriptedSource::new(steps, now),
            SmfWriter::new(Cursor::new(Vec::new())),
            settings,
            StopToken::new(),
        )
    }

    fn track_body(bytes: &[u8]) -> &[u8] {
        let len = u32::from_be_bytes([bytes[18], bytes[19], bytes[20], bytes[21]]) as usize;
        assert_eq!(bytes.len(), 22 + len);
        &bytes[22..]
    }

    #[test]
    fn test_session_starts_idle() {
        let capture = session(vec![], 0, RecordingSettings::default());
        assert_eq!(capture.state(), CaptureState::Idle);
        // Tempo and time signature prelude
        assert_eq!(capture.track().size(), 15);
    }

    #[test]
    fn test_smpte_has_no_prelude() {
        let settings = RecordingSettings {
            tempo: Tempo::Smpte {
                fps: FrameRate::Fps25,
            },
            ticks: 40,
            ..Default::default()
        };
        let finished = session(vec![], 0, settings).run().unwrap();
        let bytes = finished.output.into_inner();
        assert_eq!(&bytes[12..14], &[0xE7, 0x28]);
        assert_eq!(track_body(&bytes), &[0x00, 0xFF, 0x2F, 0x00]);
    }

    #[test]
    fn test_closed_source_finalizes() {
        let steps = vec![Step::Poll(Poll::Events(vec![note_on(0)]))];
        let finished = session(steps, 0, RecordingSettings::default()).run().unwrap();
        assert_eq!(finished.summary.reason, StopReason::SourceClosed);
        assert_eq!(finished.summary.events, 1);

        let bytes = finished.output.into_inner();
        let body = track_body(&bytes);
        assert_eq!(&body[15..], &[0x00, 0x90, 60, 100, 0x00, 0xFF, 0x2F, 0x00]);
        assert_eq!(finished.summary.track_bytes, body.len());
    }

    #[test]
    fn test_timeout_needs_a_recorded_event() {
        let settings = RecordingSettings {
            timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let steps = vec![
            Step::Poll(Poll::TimedOut),
            Step::Poll(Poll::TimedOut),
            Step::Poll(Poll::Events(vec![note_on(10)])),
            Step::Poll(Poll::TimedOut),
            Step::Poll(Poll::Events(vec![note_on(20)])),
        ];
        let finished = session(steps, 30, settings).run().unwrap();
        assert_eq!(finished.summary.reason, StopReason::Timeout);
        assert_eq!(finished.summary.events, 1);
    }

    #[test]
    fn test_long_timeout_waits_in_slices() {
        let settings = RecordingSettings {
            timeout: Some(Duration::from_millis(250)),
            ..Default::default()
        };
        let mut steps = vec![Step::Poll(Poll::Events(vec![note_on(0)]))];
        steps.extend((0..5).map(|_| Step::Poll(Poll::TimedOut)));
        let mut capture = session(steps, 0, settings);
        capture.start().unwrap();

        let mut reason = None;
        for _ in 0..4 {
            reason = capture.step().unwrap();
            if reason.is_some() {
                break;
            }
        }
        assert_eq!(reason, Some(StopReason::Timeout));
        assert_eq!(
            capture.source.waits,
            vec![
                STOP_CHECK_INTERVAL,
                Duration::from_millis(100),
                Duration::from_millis(100),
                Duration::from_millis(50),
            ]
        );
    }

    #[test]
    fn test_no_timeout_keeps_waiting() {
        let mut steps: Vec<Step> = (0..10).map(|_| Step::Poll(Poll::TimedOut)).collect();
        steps.insert(0, Step::Poll(Poll::Events(vec![note_on(0)])));
        let mut capture = session(steps, 0, RecordingSettings::default());
        capture.start().unwrap();
        for _ in 0..11 {
            assert_eq!(capture.step().unwrap(), None);
        }
        assert_eq!(capture.state(), CaptureState::Recording);
    }

    #[test]
    fn test_stop_checked_after_batch() {
        let steps = vec![
            Step::Poll(Poll::Events(vec![note_on(0), note_on(5), note_on(9)])),
            Step::Poll(Poll::Events(vec![note_on(20)])),
        ];
        let mut capture = session(steps, 9, RecordingSettings::default());
        capture.stop.request_stop();
        let finished = capture.run().unwrap();
        assert_eq!(finished.summary.reason, StopReason::Requested);
        assert_eq!(finished.summary.events, 3);
    }

    #[test]
    fn test_source_failure_keeps_recorded_data() {
        let steps = vec![
            Step::Poll(Poll::Events(vec![note_on(100)])),
            Step::Fail,
        ];
        let finished = session(steps, 196, RecordingSettings::default())
            .run()
            .unwrap();
        assert_eq!(finished.summary.reason, StopReason::SourceFailed);

        let bytes = finished.output.into_inner();
        let body = track_body(&bytes);
        // Final delta is measured from the baseline (tick 100)
        assert_eq!(&body[15..], &[0x00, 0x90, 60, 100, 96, 0xFF, 0x2F, 0x00]);
    }

    #[test]
    fn test_rejected_events_counted() {
        let foreign = Event::at_tick(QueueId(99), 0, 0, note_on(0).kind);
        let steps = vec![Step::Poll(Poll::Events(vec![foreign, note_on(0)]))];
        let finished = session(steps, 0, RecordingSettings::default()).run().unwrap();
        assert_eq!(finished.summary.events, 1);
        assert_eq!(finished.summary.rejected, 1);
    }

    #[test]
    fn test_time_signature_prelude() {
        let settings = RecordingSettings {
            tempo: Tempo::Metrical { bpm: 90 },
            time_signature: TimeSignature::new(6, 8).unwrap(),
            ..Default::default()
        };
        let finished = session(vec![], 0, settings).run().unwrap();
        let bytes = finished.output.into_inner();
        let body = track_body(&bytes);
        // 60_000_000 / 90 = 666_666 = 0x0A2C2A
        assert_eq!(
            &body[..15],
            &[
                0x00, 0xFF, 0x51, 0x03, 0x0A, 0x2C, 0x2A, //
                0x00, 0xFF, 0x58, 0x04, 6, 3, 24, 8,
            ]
        );
    }

    #[test]
    fn test_finalize_reaches_terminal_state() {
        let mut capture = session(vec![], 0, RecordingSettings::default());
        capture.start().unwrap();
        let reason = capture.step().unwrap().unwrap();
        assert_eq!(reason, StopReason::SourceClosed);

        let finished = capture.finalize(reason).unwrap();
        assert_eq!(capture.state(), CaptureState::Finalized);
        assert_eq!(finished.summary.track_bytes, 15 + 4);
        assert!(matches!(
            capture.finalize(reason),
            Err(RecordError::InvalidState(CaptureState::Finalized))
        ));
    }

    #[test]
    fn test_finalize_before_start_fails() {
        let mut capture = session(vec![], 0, RecordingSettings::default());
        assert!(matches!(
            capture.finalize(StopReason::Requested),
            Err(RecordError::InvalidState(CaptureState::Idle))
        ));
    }

    /// Where the output stream starts failing
    #[derive(Debug, Clone, Copy)]
    enum Fault {
        /// Writes that would go past this many bytes fail
        WriteAfter(usize),
        /// Absolute seeks fail
        SeekStart,
    }

    struct FaultyOutput {
        inner: Cursor<Vec<u8>>,
        fault: Fault,
        drops: Rc<Cell<usize>>,
    }

    impl Write for FaultyOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Fault::WriteAfter(limit) = self.fault {
                if self.inner.position() as usize + buf.len() > limit {
                    return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
                }
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for FaultyOutput {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            if let (Fault::SeekStart, SeekFrom::Start(_)) = (self.fault, pos) {
                return Err(io::Error::new(io::ErrorKind::Other, "seek failed"));
            }
            self.inner.seek(pos)
        }
    }

    impl Drop for FaultyOutput {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn faulty_session(
        fault: Fault,
        steps: Vec<Step>,
    ) -> (CaptureLoop<ScriptedSource, FaultyOutput>, Rc<Cell<usize>>) {
        let drops = Rc::new(Cell::new(0));
        let output = FaultyOutput {
            inner: Cursor::new(Vec::new()),
            fault,
            drops: drops.clone(),
        };
        let capture = CaptureLoop::new(
            ScriptedSource::new(steps, 0),
            SmfWriter::new(output),
            RecordingSettings::default(),
            StopToken::new(),
        );
        (capture, drops)
    }

    fn is_io_error<T>(result: Result<T, RecordError>) -> bool {
        matches!(result, Err(RecordError::Export(ExportError::Io(_))))
    }

    #[test]
    fn test_header_write_failure_releases_output() {
        let (mut capture, drops) = faulty_session(Fault::WriteAfter(0), vec![]);
        assert!(is_io_error(capture.start()));
        assert_eq!(drops.get(), 1);
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn test_track_flush_failure_releases_output() {
        let steps = vec![Step::Poll(Poll::Events(vec![note_on(0)]))];
        // Header fits, track body does not
        let (mut capture, drops) = faulty_session(Fault::WriteAfter(22), steps);
        capture.start().unwrap();
        assert_eq!(capture.step().unwrap(), None);
        let reason = capture.step().unwrap().unwrap();

        assert!(is_io_error(capture.finalize(reason)));
        assert_eq!(drops.get(), 1);
        assert_eq!(capture.state(), CaptureState::Draining);
        assert!(matches!(
            capture.finalize(reason),
            Err(RecordError::InvalidState(CaptureState::Draining))
        ));
    }

    #[test]
    fn test_length_patch_failure_releases_output() {
        let steps = vec![Step::Poll(Poll::Events(vec![note_on(0)]))];
        let (capture, drops) = faulty_session(Fault::SeekStart, steps);
        assert!(is_io_error(capture.run()));
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_run_propagates_header_failure() {
        let (capture, drops) = faulty_session(Fault::WriteAfter(10), vec![]);
        assert!(is_io_error(capture.run()));
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_start_twice_fails() {
        let mut capture = session(vec![], 0, RecordingSettings::default());
        capture.start().unwrap();
        assert!(matches!(
            capture.start(),
            Err(RecordError::InvalidState(CaptureState::Recording))
        ));
    }

    #[test]
    fn test_stop_token_shared() {
        let token = StopToken::new();
        let clone = token.clone();
        assert!(!token.is_stop_requested());
        clone.request_stop();
        assert!(token.is_stop_requested());
    }
}
