use std::collections::{BTreeMap, HashMap};
use std::thread;

use crate::{
    config::{ConfigError, MidiConfig},
    engine::{registry::VoiceRegistry, sustain::SustainTracker},
    synth::{SynthCommand, SynthEngine, VoiceSlot},
};

/*
Voice Allocation
================

Every MIDI channel owns a small fixed block of voice slots (at most ten).
A note-on has to pick one of them; `find_voice` applies three rules in
order, scanning the channel's block in registry order:

  1. Re-trigger:  a slot already holding this note is reused as-is, so a
                  repeated note-on before the note-off retriggers the same
                  voice instead of eating a second slot.
  2. Free slot:   the first slot with no assigned note is taken.
  3. Steal:       otherwise the channel's oldest sounding slot is
                  reassigned.

"Oldest" is tracked by `active`, a sequence of slots ordered by most recent
(re)assignment, oldest first. Stealing moves the victim to the end of that
sequence, so consecutive steals rotate through the channel's block instead
of hammering one slot. Stealing never crosses channel boundaries: the scan
only considers slots in the requesting channel's block.

The pools are tiny, so everything is a linear scan. The order of `active`
carries the steal policy; do not replace it with a set.
*/

/// Maps note on/off events onto a fixed pool of synthesizer voice slots
/// and emits the matching commands to the synthesis engine.
///
/// Owns all allocation state; construct one at startup and drive it from
/// the dispatcher and configuration surface.
pub struct VoiceAllocator<E: SynthEngine> {
    engine: E,
    config: MidiConfig,
    registry: VoiceRegistry,
    /// Sounding slots, oldest assignment first.
    active: Vec<VoiceSlot>,
    /// Note held by each sounding slot. Domain is exactly `active`.
    note_for_voice: HashMap<VoiceSlot, u8>,
    sustain: SustainTracker,
    patches: BTreeMap<u8, u16>,
    polyphony: BTreeMap<u8, usize>,
}

impl<E: SynthEngine> VoiceAllocator<E> {
    /// Create an allocator with an empty registry. Nothing routes until
    /// `rebuild_voices` runs (the runtime defers it until the synthesis
    /// engine is ready).
    pub fn new(config: MidiConfig, engine: E) -> Self {
        let registry = VoiceRegistry::empty(config.percussion_channel);
        let patches = config.patches.clone();
        let polyphony = config.polyphony.clone();
        Self {
            engine,
            config,
            registry,
            active: Vec::new(),
            note_for_voice: HashMap::new(),
            sustain: SustainTracker::default(),
            patches,
            polyphony,
        }
    }

    /// Reset the engine, reassign voice blocks from the polyphony map, and
    /// reload each melodic channel's patch. Discards all sounding voices.
    pub fn rebuild_voices(&mut self) {
        self.engine.send(SynthCommand::Reset);
        self.registry = VoiceRegistry::build(&self.polyphony, self.config.percussion_channel);
        self.active.clear();
        self.note_for_voice.clear();
        log::debug!(
            "voice registry rebuilt for {} channels",
            self.registry.channels().count()
        );

        let melodic: Vec<u8> = self
            .registry
            .channels()
            .filter(|&c| !self.registry.is_percussion(c))
            .collect();
        for channel in melodic {
            self.load_patch(channel);
        }
    }

    /// Pick the slot that will play `note` on `channel`, assigning or
    /// stealing as needed. `None` means the channel is unrouteable.
    fn find_voice(&mut self, channel: u8, note: u8) -> Option<VoiceSlot> {
        let slots = self.registry.voices(channel)?;

        for &slot in slots {
            // Already holding this exact note? Re-trigger it.
            if self.note_for_voice.get(&slot) == Some(&note) {
                return Some(slot);
            }

            // Free slot? Take it.
            if !self.note_for_voice.contains_key(&slot) {
                self.active.push(slot);
                self.note_for_voice.insert(slot, note);
                return Some(slot);
            }
        }

        // No free slot: steal the channel's oldest sounding voice and mark
        // it as the newest so the next steal picks a different one.
        let pos = self.active.iter().position(|s| slots.contains(s))?;
        let slot = self.active.remove(pos);
        self.active.push(slot);
        self.note_for_voice.insert(slot, note);
        log::debug!("stole voice {} on channel {} for note {}", slot, channel, note);
        Some(slot)
    }

    /// Start a note. Velocity is normalized to 0.0..=1.0. On the
    /// percussion channel the note number selects a one-shot sound from
    /// the PCM bank instead of a pitch.
    pub fn note_on(&mut self, channel: u8, note: u8, velocity: f32) {
        let Some(voice) = self.find_voice(channel, note) else {
            log::trace!("dropping note {} on unrouteable channel {}", note, channel);
            return;
        };

        if self.registry.is_percussion(channel) {
            let patch = note as u16 % self.config.pcm_patches;
            self.engine.send(SynthCommand::PlayOneShot {
                voice,
                patch,
                velocity,
            });
        } else {
            self.engine.send(SynthCommand::PlayNote {
                voice,
                note,
                velocity,
            });
        }
    }

    /// Release a note. While the sustain pedal is down the release is
    /// deferred and the voice keeps sounding. A note with no assigned
    /// voice (stolen earlier, or never routed) is a silent no-op.
    pub fn note_off(&mut self, channel: u8, note: u8) {
        if self.sustain.is_down(channel) {
            self.sustain.defer(channel, note);
            return;
        }

        let Some(slots) = self.registry.voices(channel) else {
            return;
        };
        for &slot in slots {
            if self.note_for_voice.get(&slot) == Some(&note) {
                self.active.retain(|&s| s != slot);
                self.note_for_voice.remove(&slot);
                self.engine.send(SynthCommand::ReleaseVoice { voice: slot });
                return;
            }
        }
    }

    /// Update the pedal flag; on pedal-up, release every deferred note.
    pub fn sustain_pedal(&mut self, channel: u8, down: bool) {
        self.sustain.set_down(channel, down);
        if !down {
            for note in self.sustain.drain(channel) {
                self.note_off(channel, note);
            }
        }
    }

    /// Bend the channel's sounding voices, or everything when the channel
    /// has none.
    pub fn pitch_bend(&mut self, channel: u8, amount: f32) {
        let voices: Vec<VoiceSlot> = self
            .registry
            .voices(channel)
            .map(|slots| {
                slots
                    .iter()
                    .copied()
                    .filter(|s| self.note_for_voice.contains_key(s))
                    .collect()
            })
            .unwrap_or_default();

        let voices = if voices.is_empty() { None } else { Some(voices) };
        self.engine.send(SynthCommand::PitchBend { voices, amount });
    }

    /// Record the channel's patch and push it to the channel's voices.
    /// Serves both the program-change message and the configuration
    /// surface.
    pub fn set_patch(&mut self, channel: u8, patch: u16) {
        self.patches.insert(channel, patch);
        self.load_patch(channel);
    }

    /// Change a channel's voice count and rebuild the registry. Zero
    /// voices is rejected without touching any state.
    pub fn set_polyphony(&mut self, channel: u8, voices: usize) -> Result<(), ConfigError> {
        if voices == 0 {
            return Err(ConfigError::ZeroVoices { channel });
        }
        self.polyphony.insert(channel, voices);
        self.rebuild_voices();
        Ok(())
    }

    fn load_patch(&mut self, channel: u8) {
        let Some(slots) = self.registry.voices(channel) else {
            return;
        };
        let voices = slots.to_vec();
        let patch = self.patches.get(&channel).copied().unwrap_or(0);

        // Pace patch loads so the engine's command queue can drain.
        thread::sleep(self.config.patch_load_pace);
        self.engine.send(SynthCommand::LoadPatch { voices, patch });
    }

    /// Sounding slots, oldest assignment first.
    pub fn active_voices(&self) -> &[VoiceSlot] {
        &self.active
    }

    /// The note a sounding slot currently holds.
    pub fn note_for(&self, voice: VoiceSlot) -> Option<u8> {
        self.note_for_voice.get(&voice).copied()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_allocator() -> VoiceAllocator<Vec<SynthCommand>> {
        let mut config = MidiConfig::default();
        config.patch_load_pace = Duration::ZERO;
        let mut allocator = VoiceAllocator::new(config, Vec::new());
        allocator.rebuild_voices();
        allocator.engine_mut().clear();
        allocator
    }

    fn assert_invariants<E: SynthEngine>(allocator: &VoiceAllocator<E>) {
        // Each slot appears at most once, and the note map's domain is
        // exactly the active sequence.
        let mut seen = allocator.active.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), allocator.active.len());
        assert_eq!(allocator.note_for_voice.len(), allocator.active.len());
        for slot in &allocator.active {
            assert!(allocator.note_for_voice.contains_key(slot));
        }
    }

    #[test]
    fn notes_fill_slots_in_registry_order() {
        let mut allocator = test_allocator();
        allocator.note_on(1, 60, 1.0);
        allocator.note_on(1, 64, 1.0);

        assert_eq!(allocator.active_voices(), &[0, 1]);
        assert_eq!(allocator.note_for(0), Some(60));
        assert_eq!(allocator.note_for(1), Some(64));
        assert_eq!(
            allocator.engine()[..],
            [
                SynthCommand::PlayNote {
                    voice: 0,
                    note: 60,
                    velocity: 1.0,
                },
                SynthCommand::PlayNote {
                    voice: 1,
                    note: 64,
                    velocity: 1.0,
                },
            ]
        );
        assert_invariants(&allocator);
    }

    #[test]
    fn repeated_note_on_retriggers_the_same_slot() {
        let mut allocator = test_allocator();
        allocator.note_on(1, 60, 1.0);
        allocator.note_on(1, 60, 0.5);

        assert_eq!(allocator.active_voices(), &[0]);
        assert_eq!(
            allocator.engine()[..],
            [
                SynthCommand::PlayNote {
                    voice: 0,
                    note: 60,
                    velocity: 1.0,
                },
                SynthCommand::PlayNote {
                    voice: 0,
                    note: 60,
                    velocity: 0.5,
                },
            ]
        );
        assert_invariants(&allocator);
    }

    #[test]
    fn fifth_note_steals_the_oldest_slot() {
        let mut allocator = test_allocator();
        for note in [60, 64, 67, 72] {
            allocator.note_on(1, note, 1.0);
        }
        allocator.note_on(1, 76, 1.0);

        // Slot 0 (oldest, held note 60) is stolen and becomes the newest.
        assert_eq!(allocator.active_voices(), &[1, 2, 3, 0]);
        assert_eq!(allocator.note_for(0), Some(76));
        assert_eq!(
            allocator.engine().last(),
            Some(&SynthCommand::PlayNote {
                voice: 0,
                note: 76,
                velocity: 1.0,
            })
        );
        assert_invariants(&allocator);
    }

    #[test]
    fn consecutive_steals_rotate_through_the_block() {
        let mut allocator = test_allocator();
        for note in [60, 61, 62, 63] {
            allocator.note_on(1, note, 1.0);
        }
        allocator.note_on(1, 70, 1.0); // steals slot 0
        allocator.note_on(1, 71, 1.0); // steals slot 1, not slot 0 again

        assert_eq!(allocator.active_voices(), &[2, 3, 0, 1]);
        assert_eq!(allocator.note_for(0), Some(70));
        assert_eq!(allocator.note_for(1), Some(71));
        assert_invariants(&allocator);
    }

    #[test]
    fn note_off_frees_the_slot() {
        let mut allocator = test_allocator();
        allocator.note_on(1, 60, 1.0);
        allocator.note_off(1, 60);

        assert!(allocator.active_voices().is_empty());
        assert_eq!(allocator.note_for(0), None);
        assert_eq!(
            allocator.engine().last(),
            Some(&SynthCommand::ReleaseVoice { voice: 0 })
        );
        assert_invariants(&allocator);
    }

    #[test]
    fn note_off_for_stolen_note_is_a_no_op() {
        let mut allocator = test_allocator();
        for note in [60, 64, 67, 72, 76] {
            allocator.note_on(1, note, 1.0);
        }
        allocator.engine_mut().clear();

        // Note 60's slot was stolen by note 76; nothing to release.
        allocator.note_off(1, 60);
        assert!(allocator.engine().is_empty());
        assert_eq!(allocator.active_voices().len(), 4);
        assert_invariants(&allocator);
    }

    #[test]
    fn unrouteable_channel_drops_silently() {
        let mut allocator = test_allocator();
        allocator.note_on(7, 60, 1.0);
        allocator.note_off(7, 60);

        assert!(allocator.engine().is_empty());
        assert!(allocator.active_voices().is_empty());
    }

    #[test]
    fn sustain_defers_release_until_pedal_up() {
        let mut allocator = test_allocator();
        allocator.sustain_pedal(1, true);
        allocator.note_on(1, 60, 1.0);
        allocator.engine_mut().clear();

        allocator.note_off(1, 60);
        assert!(allocator.engine().is_empty(), "release leaked past pedal");
        assert_eq!(allocator.active_voices(), &[0]);

        allocator.sustain_pedal(1, false);
        assert_eq!(
            allocator.engine()[..],
            [SynthCommand::ReleaseVoice { voice: 0 }]
        );
        assert!(allocator.active_voices().is_empty());
        assert_invariants(&allocator);
    }

    #[test]
    fn pedal_up_drains_every_deferred_note() {
        let mut allocator = test_allocator();
        allocator.sustain_pedal(1, true);
        for note in [60, 64, 67] {
            allocator.note_on(1, note, 1.0);
            allocator.note_off(1, note);
        }
        allocator.engine_mut().clear();

        allocator.sustain_pedal(1, false);
        let mut released: Vec<VoiceSlot> = allocator
            .engine()
            .iter()
            .map(|c| match c {
                SynthCommand::ReleaseVoice { voice } => *voice,
                other => panic!("unexpected command {:?}", other),
            })
            .collect();
        released.sort_unstable();
        assert_eq!(released, vec![0, 1, 2]);
        assert!(allocator.active_voices().is_empty());
        assert_invariants(&allocator);
    }

    #[test]
    fn sustain_is_per_channel() {
        let mut allocator = test_allocator();
        allocator.set_polyphony(2, 2).unwrap();
        allocator.engine_mut().clear();

        allocator.sustain_pedal(1, true);
        allocator.note_on(2, 60, 1.0);
        allocator.note_off(2, 60);

        // Channel 2's pedal is up; its release goes straight through.
        assert!(matches!(
            allocator.engine().last(),
            Some(SynthCommand::ReleaseVoice { .. })
        ));
    }

    #[test]
    fn deferred_note_whose_voice_was_stolen_releases_as_no_op() {
        let mut allocator = test_allocator();
        allocator.sustain_pedal(1, true);
        allocator.note_on(1, 60, 1.0);
        allocator.note_off(1, 60); // deferred
        for note in [61, 62, 63, 64] {
            allocator.note_on(1, note, 1.0); // note 64 steals slot 0
        }
        allocator.engine_mut().clear();

        allocator.sustain_pedal(1, false);
        assert!(allocator.engine().is_empty());
        assert_eq!(allocator.active_voices().len(), 4);
        assert_invariants(&allocator);
    }

    #[test]
    fn percussion_notes_play_one_shots_from_the_pcm_bank() {
        let mut allocator = test_allocator();
        allocator.note_on(10, 36, 0.8);
        allocator.note_on(10, 40, 0.8);

        assert_eq!(
            allocator.engine()[..],
            [
                SynthCommand::PlayOneShot {
                    voice: 110,
                    patch: 36 % 29,
                    velocity: 0.8,
                },
                SynthCommand::PlayOneShot {
                    voice: 111,
                    patch: 40 % 29,
                    velocity: 0.8,
                },
            ]
        );
    }

    #[test]
    fn percussion_note_wraps_to_bank_size() {
        let mut allocator = test_allocator();
        allocator.note_on(10, 29, 1.0);
        assert_eq!(
            allocator.engine().last(),
            Some(&SynthCommand::PlayOneShot {
                voice: 110,
                patch: 0,
                velocity: 1.0,
            })
        );
    }

    #[test]
    fn percussion_and_melodic_channels_never_share_slots() {
        let mut allocator = test_allocator();
        for note in [60, 64, 67, 72, 76] {
            allocator.note_on(1, note, 1.0); // saturates channel 1, steals
        }
        for note in 36..48 {
            allocator.note_on(10, note, 1.0); // saturates percussion, steals
        }

        for &slot in allocator.active_voices() {
            let percussion = (110..120).contains(&slot);
            let melodic = (0..4).contains(&slot);
            assert!(percussion || melodic, "slot {} outside both blocks", slot);
        }
        // Channel 1 still holds exactly its four slots.
        let melodic_count = allocator
            .active_voices()
            .iter()
            .filter(|s| (0..4).contains(*s))
            .count();
        assert_eq!(melodic_count, 4);
        assert_invariants(&allocator);
    }

    #[test]
    fn pitch_bend_targets_the_channels_sounding_voices() {
        let mut allocator = test_allocator();
        allocator.note_on(1, 60, 1.0);
        allocator.note_on(1, 64, 1.0);
        allocator.engine_mut().clear();

        allocator.pitch_bend(1, 0.1);
        assert_eq!(
            allocator.engine()[..],
            [SynthCommand::PitchBend {
                voices: Some(vec![0, 1]),
                amount: 0.1,
            }]
        );
    }

    #[test]
    fn pitch_bend_goes_global_when_channel_is_silent() {
        let mut allocator = test_allocator();
        allocator.pitch_bend(1, -0.05);
        assert_eq!(
            allocator.engine()[..],
            [SynthCommand::PitchBend {
                voices: None,
                amount: -0.05,
            }]
        );
    }

    #[test]
    fn set_patch_reloads_the_channels_voices() {
        let mut allocator = test_allocator();
        allocator.set_patch(1, 7);
        assert_eq!(
            allocator.engine()[..],
            [SynthCommand::LoadPatch {
                voices: vec![0, 1, 2, 3],
                patch: 7,
            }]
        );
    }

    #[test]
    fn set_patch_on_unrouteable_channel_only_records_it() {
        let mut allocator = test_allocator();
        allocator.set_patch(7, 3);
        assert!(allocator.engine().is_empty());

        // The recorded patch is honored once the channel gets voices.
        allocator.set_polyphony(7, 2).unwrap();
        assert!(allocator.engine().contains(&SynthCommand::LoadPatch {
            voices: vec![4, 5],
            patch: 3,
        }));
    }

    #[test]
    fn rebuild_resets_engine_and_reloads_patches() {
        let mut allocator = test_allocator();
        allocator.note_on(1, 60, 1.0);
        allocator.engine_mut().clear();

        allocator.set_polyphony(1, 6).unwrap();
        assert_eq!(allocator.engine().first(), Some(&SynthCommand::Reset));
        assert!(allocator.engine().contains(&SynthCommand::LoadPatch {
            voices: vec![0, 1, 2, 3, 4, 5],
            patch: 0,
        }));
        assert!(allocator.active_voices().is_empty());
        assert_eq!(allocator.note_for(0), None);
    }

    #[test]
    fn zero_polyphony_is_rejected_without_side_effects() {
        let mut allocator = test_allocator();
        allocator.note_on(1, 60, 1.0);
        allocator.engine_mut().clear();

        let err = allocator.set_polyphony(1, 0);
        assert_eq!(err, Err(ConfigError::ZeroVoices { channel: 1 }));
        assert!(allocator.engine().is_empty());
        assert_eq!(allocator.active_voices(), &[0]);
    }

    #[test]
    fn allocation_before_setup_routes_nothing() {
        let mut config = MidiConfig::default();
        config.patch_load_pace = Duration::ZERO;
        let mut allocator = VoiceAllocator::new(config, Vec::<SynthCommand>::new());

        allocator.note_on(1, 60, 1.0);
        assert!(allocator.engine().is_empty());
    }
}
