//! Routes decoded MIDI messages to the voice allocator.
//!
//! The dispatcher is the recurring callback: each `pump` drains whatever
//! the transport has buffered, decodes it message by message, and calls
//! into the allocator. It never blocks waiting for more input.

use crate::{
    engine::allocator::VoiceAllocator,
    io::{
        midi::{decode_message, MidiEvent},
        transport::MidiTransport,
    },
    synth::SynthEngine,
};

/// Divisor turning a centered 14-bit pitch wheel value into the engine's
/// normalized bend amount (full wheel throw = 2 semitones of a 6-semitone
/// engine range).
pub const PITCH_BEND_SCALE: f32 = 8192.0 * 6.0;

/// Decodes the transport's byte stream and drives the allocator.
///
/// Holds bytes left over from a poll that ended mid-message; the message
/// completes on the next poll instead of being dropped.
#[derive(Debug, Default)]
pub struct Dispatcher {
    pending: Vec<u8>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process everything currently buffered, re-polling the transport
    /// whenever the working buffer runs dry. Returns the number of events
    /// dispatched.
    pub fn pump<T, E>(&mut self, transport: &mut T, allocator: &mut VoiceAllocator<E>) -> usize
    where
        T: MidiTransport,
        E: SynthEngine,
    {
        let mut dispatched = 0;
        loop {
            let decoded = decode_message(&self.pending);
            if decoded.consumed == 0 {
                // Empty or partial message; see if the transport has more.
                if transport.poll(&mut self.pending) == 0 {
                    break;
                }
                continue;
            }

            if let Some(event) = decoded.event {
                route(event, allocator);
                dispatched += 1;
            }
            self.pending.drain(..decoded.consumed);
        }
        dispatched
    }
}

fn route<E: SynthEngine>(event: MidiEvent, allocator: &mut VoiceAllocator<E>) {
    match event {
        MidiEvent::NoteOn {
            channel,
            note,
            velocity,
        } => allocator.note_on(channel, note, velocity as f32 / 127.0),
        MidiEvent::NoteOff { channel, note } => allocator.note_off(channel, note),
        MidiEvent::ProgramChange { channel, patch } => allocator.set_patch(channel, patch as u16),
        MidiEvent::PitchBend { channel, value } => {
            allocator.pitch_bend(channel, value as f32 / PITCH_BEND_SCALE)
        }
        MidiEvent::SustainPedal { channel, down } => allocator.sustain_pedal(channel, down),
    }
}
