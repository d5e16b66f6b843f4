// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI input port handling.
//!
//! Connects to one input port through midir. Messages are stamped with the
//! recording clock in the driver callback and handed to the capture loop over
//! a channel.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};
use tracing::{debug, info};

use super::event::{Event, EventKind, QueueId, Tick};
use super::{EventSource, Poll, SourceError};
use crate::timing::{QueueTempo, SequencerClock};

/// Client name announced to the MIDI system
pub const CLIENT_NAME: &str = "smfrec";

/// Our single input port; every event is addressed to it
pub const RECORD_PORT: u8 = 0;

/// Event source reading from a midir input connection
pub struct MidiInputSource {
    _connection: MidiInputConnection<()>,
    receiver: Receiver<Event>,
    clock: SequencerClock,
    port_name: String,
}

impl MidiInputSource {
    /// Connect to the port matching `port` and start the recording clock.
    ///
    /// `port` is either a port index as printed by [`print_ports`] or part of a
    /// port name (case-insensitive). Only a single port is accepted.
    pub fn connect(port: &str, tempo: QueueTempo) -> Result<Self, SourceError> {
        if port.contains(',') {
            return Err(SourceError::MultiplePorts(port.to_string()));
        }

        let mut midi_in = open_input()?;
        midi_in.ignore(Ignore::TimeAndActiveSense);

        let input_port = find_port(&midi_in, port)?;
        let port_name = midi_in
            .port_name(&input_port)
            .unwrap_or_else(|_| port.to_string());

        let (tx, rx): (Sender<Event>, Receiver<Event>) = mpsc::channel();
        let clock = SequencerClock::start(tempo);
        let queue = clock.id();

        let connection = midi_in
            .connect(
                &input_port,
                "smfrec port 0",
                move |_stamp, data, _| {
                    let tick = clock.tick_at(Instant::now());
                    let kind = EventKind::from_bytes(data);
                    // The receiver only goes away once recording has finished
                    let _ = tx.send(Event::at_tick(queue, RECORD_PORT, tick, kind));
                },
                (),
            )
            .map_err(|e| SourceError::Connect {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        info!(port = %port_name, "connected to MIDI input");

        Ok(Self {
            _connection: connection,
            receiver: rx,
            clock,
            port_name,
        })
    }

    /// Name of the connected port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn drain(&self, first: Event) -> Poll {
        let mut events = vec![first];
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        debug!(count = events.len(), "received batch");
        Poll::Events(events)
    }
}

impl EventSource for MidiInputSource {
    fn poll(&mut self, timeout: Option<Duration>) -> Result<Poll, SourceError> {
        let first = match timeout {
            None => match self.receiver.recv() {
                Ok(event) => event,
                Err(_) => return Ok(Poll::Closed),
            },
            Some(timeout) => match self.receiver.recv_timeout(timeout) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => return Ok(Poll::TimedOut),
                Err(RecvTimeoutError::Disconnected) => return Ok(Poll::Closed),
            },
        };
        Ok(self.drain(first))
    }

    fn current_tick(&self) -> Tick {
        self.clock.now()
    }

    fn queue_id(&self) -> QueueId {
        self.clock.id()
    }
}

fn open_input() -> Result<MidiInput, SourceError> {
    MidiInput::new(CLIENT_NAME).map_err(|e| SourceError::Init(e.to_string()))
}

/// Find a port by index or by case-insensitive name fragment
fn find_port(midi_in: &MidiInput, query: &str) -> Result<MidiInputPort, SourceError> {
    let ports = midi_in.ports();
    let query = query.trim();

    if let Ok(index) = query.parse::<usize>() {
        if let Some(port) = ports.get(index) {
            return Ok(port.clone());
        }
    }

    let wanted = query.to_lowercase();
    ports
        .into_iter()
        .find(|p| {
            midi_in
                .port_name(p)
                .map(|name| name.to_lowercase().contains(&wanted))
                .unwrap_or(false)
        })
        .ok_or_else(|| SourceError::PortNotFound(query.to_string()))
}

/// An input port as listed for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub index: usize,
    pub client: String,
    pub port: String,
}

impl PortInfo {
    /// Split a backend port name of the form `client:port` at the first
    /// colon. Names without one are taken as the client name.
    pub fn from_name(index: usize, name: &str) -> Self {
        let (client, port) = name.split_once(':').unwrap_or((name, ""));
        Self {
            index,
            client: client.trim().to_string(),
            port: port.trim().to_string(),
        }
    }
}

/// List all available MIDI input ports
pub fn list_ports() -> Result<Vec<PortInfo>, SourceError> {
    let midi_in = open_input()?;
    let ports = midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(i, port)| {
            let name = midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown {}", i));
            PortInfo::from_name(i, &name)
        })
        .collect();
    Ok(ports)
}

/// Print all available MIDI input ports to stdout
pub fn print_ports() -> Result<(), SourceError> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No MIDI input ports found.");
    } else {
        println!(" Port  {:<32} Port name", "Client name");
        for info in ports {
            println!("{:>5}  {:<32.32} {}", info.index, info.client, info.port);
        }
    }
    Ok(())
}
