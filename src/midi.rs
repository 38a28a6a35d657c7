use std::sync::Arc;
use anyhow::anyhow;
use crossbeam_queue::SegQueue;
use midi_msg::{ChannelVoiceMsg, MidiMsg};
use midir::{Ignore, InitError, MidiInput, MidiInputConnection, MidiInputPort, MidiInputPorts, MidiOutput, MidiOutputConnection};
use read_input::InputBuild;
use read_input::prelude::input;

use crate::pitch::PitchClass;

pub const CLIENT_NAME: &str = "melodymatch";

#[derive(Clone)]
pub enum MidiScenario {
    NoInputPorts(String),
    InputPortSelected { in_port: MidiInputPort },
    MultipleInputPorts { in_ports: MidiInputPorts },
}

impl MidiScenario {
    pub fn new(midi_in: &mut Result<MidiInput, InitError>) -> Self {
        match midi_in {
            Ok(midi_in) => {
                midi_in.ignore(Ignore::TimeAndActiveSensing);
                let in_ports = midi_in.ports();
                match in_ports.len() {
                    0 => MidiScenario::NoInputPorts(
                        "No MIDI input device found".to_string(),
                    ),
                    1 => MidiScenario::InputPortSelected {
                        in_port: in_ports[0].clone(),
                    },
                    _ => MidiScenario::MultipleInputPorts {
                        in_ports: in_ports.clone(),
                    },
                }
            }
            Err(e) => MidiScenario::NoInputPorts(e.to_string()),
        }
    }

    /// Resolves to a single port, asking on the console when there is a choice.
    pub fn choose_port(self, midi_in: &MidiInput) -> anyhow::Result<MidiInputPort> {
        match self {
            MidiScenario::NoInputPorts(reason) => Err(anyhow!(reason)),
            MidiScenario::InputPortSelected { in_port } => Ok(in_port),
            MidiScenario::MultipleInputPorts { in_ports } => Ok(user_pick_element(
                in_ports.into_iter(),
                |p| midi_in.port_name(p).unwrap_or_else(|_| "(unnamed port)".to_owned()),
            )),
        }
    }
}

/// Lists `choices` numbered from 1 and reads a pick from the console.
pub fn user_pick_element<T, S: Fn(&T) -> String>(choices: impl Iterator<Item=T>, show: S) -> T {
    let mut choices = choices.collect::<Vec<_>>();
    for (i, item) in choices.iter().enumerate() {
        println!("{:>2}) {}", i + 1, show(item));
    }
    let choice: usize = input()
        .msg("Select MIDI input: ")
        .inside(1..=choices.len())
        .get();
    choices.swap_remove(choice - 1)
}

/// Raw bytes as delivered by the device, with midir's microsecond stamp.
#[derive(Clone, Debug)]
pub struct TimedMidi {
    pub stamp_us: u64,
    pub bytes: Vec<u8>,
}

impl TimedMidi {
    pub fn time_ms(&self) -> u64 {
        self.stamp_us / 1000
    }
}

/// Start the input connection. The returned value needs to remain in scope until we
/// are finished receiving MIDI input.
pub fn start_input(input2session: Arc<SegQueue<TimedMidi>>, midi_in: MidiInput, in_port: &MidiInputPort) -> anyhow::Result<MidiInputConnection<()>> {
    midi_in.connect(in_port, "melodymatch-read-input", move |stamp_us, message, _| {
        input2session.push(TimedMidi {stamp_us, bytes: message.to_vec()});
    }, ()).map_err(|e| anyhow!("could not connect to MIDI input: {e}"))
}

/// Connects to the first output port so input can be echoed to it.
/// `Ok(None)` when the system has no output port.
pub fn open_passthrough() -> anyhow::Result<Option<MidiOutputConnection>> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    let out_ports = midi_out.ports();
    match out_ports.first() {
        None => Ok(None),
        Some(port) => {
            let name = midi_out.port_name(port).unwrap_or_default();
            let conn = midi_out
                .connect(port, "melodymatch-passthrough")
                .map_err(|e| anyhow!("could not connect to MIDI output: {e}"))?;
            log::info!("echoing input to {name}");
            Ok(Some(conn))
        }
    }
}

/// A live keyboard connection. Input stops when this is dropped.
pub struct KeyboardConnection {
    pub port_name: String,
    pub input2session: Arc<SegQueue<TimedMidi>>,
    pub passthrough: Option<MidiOutputConnection>,
    _conn_in: MidiInputConnection<()>,
}

pub fn open_keyboard(echo: bool) -> anyhow::Result<KeyboardConnection> {
    let mut midi_in = MidiInput::new(CLIENT_NAME);
    let scenario = MidiScenario::new(&mut midi_in);
    let midi_in = midi_in?;
    let in_port = scenario.choose_port(&midi_in)?;
    let port_name = midi_in.port_name(&in_port).unwrap_or_default();
    let input2session = Arc::new(SegQueue::new());
    let conn_in = start_input(input2session.clone(), midi_in, &in_port)?;
    log::info!("listening to {port_name}");

    let passthrough = if echo {
        open_passthrough().unwrap_or_else(|e| {
            log::warn!("continuing without passthrough: {e}");
            None
        })
    } else {
        None
    };
    Ok(KeyboardConnection {port_name, input2session, passthrough, _conn_in: conn_in})
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum KeyEvent {
    NoteOn(PitchClass),
    NoteOff(PitchClass),
    Other,
}

impl KeyEvent {
    /// `None` for bytes that do not parse as a MIDI message, and for
    /// system real-time traffic (clock, active sensing) that no player sent.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match MidiMsg::from_midi(bytes) {
            Ok((MidiMsg::SystemRealTime { .. }, _len)) => None,
            Ok((msg, _len)) => Some(Self::from_msg(&msg)),
            Err(e) => {
                log::warn!("skipping unparseable MIDI bytes {bytes:?}: {e:?}");
                None
            }
        }
    }

    pub fn from_msg(msg: &MidiMsg) -> Self {
        match msg {
            MidiMsg::ChannelVoice { channel: _, msg } => match msg {
                ChannelVoiceMsg::NoteOn { note, velocity } if *velocity > 0 => {
                    KeyEvent::NoteOn(PitchClass::from_midi(*note as i64))
                }
                ChannelVoiceMsg::NoteOn { note, velocity: _ }
                | ChannelVoiceMsg::NoteOff { note, velocity: _ } => {
                    KeyEvent::NoteOff(PitchClass::from_midi(*note as i64))
                }
                _ => KeyEvent::Other,
            },
            _ => KeyEvent::Other,
        }
    }
}
