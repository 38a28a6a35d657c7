use std::sync::Arc;
use std::time::Duration;
use crossbeam_queue::SegQueue;
use midir::MidiOutputConnection;

use crate::midi::{KeyEvent, TimedMidi};
use crate::session::{KeyboardSession, NoteOffResult};

const IDLE_WAIT_MS: u64 = 1;

/// Applies one raw message to the session. Only note-offs produce a result.
pub fn apply_midi(session: &mut KeyboardSession, msg: &TimedMidi) -> Option<NoteOffResult> {
    match KeyEvent::decode(&msg.bytes)? {
        KeyEvent::NoteOn(pitch) => {
            session.handle_note_on(pitch, msg.time_ms());
            None
        }
        KeyEvent::NoteOff(pitch) => Some(session.handle_note_off(pitch, msg.time_ms())),
        KeyEvent::Other => {
            session.handle_other_event();
            None
        }
    }
}

/// Owns the session and pulls device input through it one message at a time.
pub struct SessionDriver {
    session: KeyboardSession,
    input2session: Arc<SegQueue<TimedMidi>>,
    passthrough: Option<MidiOutputConnection>,
}

impl SessionDriver {
    pub fn new(session: KeyboardSession, input2session: Arc<SegQueue<TimedMidi>>) -> Self {
        SessionDriver {session, input2session, passthrough: None}
    }

    pub fn with_passthrough(mut self, passthrough: Option<MidiOutputConnection>) -> Self {
        self.passthrough = passthrough;
        self
    }

    /// Processes everything currently queued. Returns the name of a melody
    /// whose match ends the session, leaving later messages in the queue.
    pub fn drain(&mut self) -> Option<String> {
        while let Some(msg) = self.input2session.pop() {
            if let Some(out) = self.passthrough.as_mut() {
                if let Err(e) = out.send(&msg.bytes) {
                    log::warn!("passthrough failed: {e}");
                }
            }
            if let Some(result) = apply_midi(&mut self.session, &msg) {
                for name in result.reported() {
                    log::info!("matched {name}");
                    println!("Success! {name}");
                }
                if let Some(name) = result.terminated() {
                    log::info!("matched {name}, stopping");
                    return Some(name.to_owned());
                }
            }
        }
        None
    }

    /// Blocks until a terminating melody is played.
    pub fn run(&mut self) -> String {
        loop {
            if let Some(name) = self.drain() {
                return name;
            }
            std::thread::sleep(Duration::from_millis(IDLE_WAIT_MS));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::melody::builtin_melodies;
    use crate::midi::TimedMidi;
    use crate::runtime::{apply_midi, SessionDriver};
    use crate::session::KeyboardSession;
    use crossbeam_queue::SegQueue;
    use std::sync::Arc;

    fn note(status: u8, note: u8, velocity: u8, ms: u64) -> TimedMidi {
        TimedMidi {stamp_us: ms * 1000, bytes: vec![status, note, velocity]}
    }

    #[test]
    fn test_apply_midi() {
        let mut session = KeyboardSession::default();
        assert!(apply_midi(&mut session, &note(0x90, 50, 90, 0)).is_none());
        assert_eq!(session.active_notes().len(), 1);
        let result = apply_midi(&mut session, &note(0x90, 50, 0, 30)).unwrap();
        assert_eq!(result.chord.unwrap().to_string(), "D");
        assert!(apply_midi(&mut session, &note(0xB0, 64, 127, 40)).is_none());
    }

    #[test]
    fn test_drain_stops_on_terminate() {
        let queue = Arc::new(SegQueue::new());
        let mut session = KeyboardSession::default();
        for m in builtin_melodies().unwrap() {
            session.register_melody(m).unwrap();
        }
        // Happy Birthday in two different octaves, then one extra note.
        for (i, pitch) in [62, 74, 64, 50, 67, 65, 60].iter().enumerate() {
            let t = i as u64 * 300;
            queue.push(note(0x90, *pitch, 100, t));
            queue.push(note(0x80, *pitch, 0, t + 150));
        }
        let mut driver = SessionDriver::new(session, queue.clone());
        assert_eq!(driver.drain(), Some("Happy Birthday".to_owned()));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_drain_empty_queue() {
        let mut driver = SessionDriver::new(KeyboardSession::default(), Arc::new(SegQueue::new()));
        assert_eq!(driver.drain(), None);
    }
}
