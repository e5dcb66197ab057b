// Purpose: command surface toward the synthesis engine
// The engine itself (oscillators, envelopes, patch data) is an external
// collaborator; this layer only names what it is asked to do.

pub mod command;

pub use command::{SynthCommand, SynthEngine, VoiceSlot};
