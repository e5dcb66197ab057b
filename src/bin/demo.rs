//! polyvoice-demo - scripted walkthrough of the voice allocator
//!
//! Feeds a canned MIDI byte stream through the runtime and prints every
//! command that would reach the synthesis engine.

use std::time::Duration;

use polyvoice::{MidiConfig, MidiRuntime, SynthCommand};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let mut config = MidiConfig::default();
    config.patch_load_pace = Duration::ZERO; // no engine to pace here

    // A chord, a fifth note that forces a steal, a drum hit, some pedal
    // work, and a pitch bend.
    let script: Vec<u8> = vec![
        0x90, 60, 100, // C4 on
        0x90, 64, 100, // E4 on
        0x90, 67, 100, // G4 on
        0x90, 72, 100, // C5 on - channel 1's four voices are now full
        0x90, 76, 100, // E5 on - steals the voice holding C4
        0x99, 36, 120, // kick drum on channel 10
        0xB0, 0x40, 127, // sustain pedal down
        0x80, 64, 0, // E4 off - deferred
        0xB0, 0x40, 0, // pedal up - E4 releases now
        0xE0, 0x7F, 0x7F, // pitch wheel all the way up
    ];

    let mut runtime = MidiRuntime::new(config, script, Vec::<SynthCommand>::new());

    runtime.tick(); // deferred setup: reset + voice ranges + patch loads
    let dispatched = runtime.tick();

    println!("dispatched {} events\n", dispatched);
    for command in runtime.allocator().engine() {
        println!("  {:?}", command);
    }

    println!(
        "\nactive voices (oldest first): {:?}",
        runtime.allocator().active_voices()
    );

    Ok(())
}
