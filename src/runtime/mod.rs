//! Scheduler glue: deferred setup, then the recurring MIDI callback.
//!
//! An external timer owns the cadence; it just calls [`MidiRuntime::tick`]
//! periodically. The first tick runs voice setup (the synthesis engine
//! needs time to finish its own initialization before it can take patch
//! loads), and every later tick pumps the dispatcher.

use crate::{
    config::{ConfigError, MidiConfig},
    engine::{allocator::VoiceAllocator, dispatch::Dispatcher},
    io::transport::MidiTransport,
    synth::SynthEngine,
};

/// Owns the transport, dispatcher, and allocator; the single entry point
/// a scheduler needs.
pub struct MidiRuntime<T: MidiTransport, E: SynthEngine> {
    transport: T,
    dispatcher: Dispatcher,
    allocator: VoiceAllocator<E>,
    ready: bool,
}

impl<T: MidiTransport, E: SynthEngine> MidiRuntime<T, E> {
    pub fn new(config: MidiConfig, transport: T, engine: E) -> Self {
        Self {
            transport,
            dispatcher: Dispatcher::new(),
            allocator: VoiceAllocator::new(config, engine),
            ready: false,
        }
    }

    /// Periodic entry point. The first call performs deferred setup and
    /// returns; later calls process buffered MIDI. Returns the number of
    /// events dispatched.
    pub fn tick(&mut self) -> usize {
        if !self.ready {
            self.allocator.rebuild_voices();
            self.ready = true;
            log::debug!("voice setup complete, MIDI dispatch installed");
            return 0;
        }
        self.dispatcher.pump(&mut self.transport, &mut self.allocator)
    }

    /// Configuration surface: change a channel's voice count.
    pub fn set_polyphony(&mut self, channel: u8, voices: usize) -> Result<(), ConfigError> {
        self.allocator.set_polyphony(channel, voices)
    }

    /// Configuration surface: change a channel's patch.
    pub fn set_patch(&mut self, channel: u8, patch: u16) {
        self.allocator.set_patch(channel, patch);
    }

    pub fn allocator(&self) -> &VoiceAllocator<E> {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut VoiceAllocator<E> {
        &mut self.allocator
    }
}
