#[cfg(feature = "rtrb")]
use rtrb::Producer;

/// Voice slot identifier in the synthesis engine's global slot space.
pub type VoiceSlot = u16;

/// Semantic commands sent to the synthesis engine.
///
/// The engine owns its own wire encoding; the allocator only decides which
/// voices do what.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthCommand {
    /// Drop all engine state; issued before voice ranges are reassigned.
    Reset,
    /// Start `note` on one voice. Velocity is normalized to 0.0..=1.0.
    PlayNote {
        voice: VoiceSlot,
        note: u8,
        velocity: f32,
    },
    /// Silence one voice.
    ReleaseVoice { voice: VoiceSlot },
    /// Bend the listed voices, or every voice when `voices` is `None`.
    /// Amount is in the engine's normalized bend range.
    PitchBend {
        voices: Option<Vec<VoiceSlot>>,
        amount: f32,
    },
    /// Load a patch into a block of voices.
    LoadPatch {
        voices: Vec<VoiceSlot>,
        patch: u16,
    },
    /// Trigger a fixed-duration percussion sound on one voice.
    PlayOneShot {
        voice: VoiceSlot,
        patch: u16,
        velocity: f32,
    },
}

/// Sink for synthesis commands.
pub trait SynthEngine {
    fn send(&mut self, command: SynthCommand);
}

/// Capture commands in order; used by tests and offline rendering.
impl SynthEngine for Vec<SynthCommand> {
    fn send(&mut self, command: SynthCommand) {
        self.push(command);
    }
}

/// Lossy push into a ring buffer toward the audio thread. A full queue
/// drops the command rather than blocking the MIDI callback.
#[cfg(feature = "rtrb")]
impl SynthEngine for Producer<SynthCommand> {
    fn send(&mut self, command: SynthCommand) {
        let _ = self.push(command);
    }
}
