pub mod config;
pub mod engine; // Voice allocation, stealing, sustain, dispatch
pub mod io;
pub mod runtime; // Deferred setup and the periodic tick
pub mod synth; // Commands toward the synthesis engine

pub use config::{ConfigError, MidiConfig};
pub use engine::{Dispatcher, VoiceAllocator};
pub use runtime::MidiRuntime;
pub use synth::{SynthCommand, SynthEngine, VoiceSlot};
