// Play a melody, then touch a pedal or any other control to print it in
// melody-file syntax.

use melodymatch::config::{init_logging, ListenerConfig};
use melodymatch::midi::open_keyboard;
use melodymatch::pitch::format_atoms;
use melodymatch::runtime::SessionDriver;
use melodymatch::{ChordAtom, ChordEvent, ChordFilter, ChordObserver, KeyboardSession};

#[derive(Default)]
struct ChordCollector {
    saved: Vec<ChordAtom>,
}

impl ChordObserver for ChordCollector {
    fn on_chord(&mut self, chord: &ChordEvent) {
        self.saved.push(chord.atom());
    }

    fn on_other_event(&mut self) {
        if !self.saved.is_empty() {
            println!("{}", format_atoms(self.saved.iter()));
            self.saved.clear();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = ListenerConfig::from_args(std::env::args().skip(1))?.without_melodies()?;
    init_logging(config.verbose);

    let session = KeyboardSession::new(ChordFilter::new(config.min_hold_ms))
        .with_observer(Box::new(ChordCollector::default()));
    let mut keyboard = open_keyboard(config.echo)?;
    let mut driver = SessionDriver::new(session, keyboard.input2session.clone())
        .with_passthrough(keyboard.passthrough.take());
    println!("Initialized on {}", keyboard.port_name);
    driver.run();
    Ok(())
}
