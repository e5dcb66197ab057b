// Purpose - external interfaces: MIDI byte decoding and transport seam

pub mod midi;
pub mod transport;

pub use midi::MidiEvent;
pub use transport::MidiTransport;
