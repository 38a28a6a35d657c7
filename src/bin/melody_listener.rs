use melodymatch::config::{init_logging, ListenerConfig};
use melodymatch::midi::open_keyboard;
use melodymatch::runtime::SessionDriver;
use melodymatch::{ChordFilter, KeyboardSession};

fn main() -> anyhow::Result<()> {
    let config = ListenerConfig::from_args(std::env::args().skip(1))?;
    init_logging(config.verbose);

    let mut session = KeyboardSession::new(ChordFilter::new(config.min_hold_ms));
    for melody in config.load_melodies()? {
        session.register_melody(melody)?;
    }

    let mut keyboard = open_keyboard(config.echo)?;
    let mut driver = SessionDriver::new(session, keyboard.input2session.clone())
        .with_passthrough(keyboard.passthrough.take());
    println!("Initialized on {}", keyboard.port_name);
    let name = driver.run();
    println!("Terminating due to success of: {name}");
    Ok(())
}
