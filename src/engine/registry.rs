//! Static mapping of MIDI channel to its block of voice slots.

use std::collections::BTreeMap;

use crate::synth::VoiceSlot;

/// First slot of the fixed percussion block.
pub const PERCUSSION_BASE: VoiceSlot = 110;
/// Percussion always gets ten slots, one per simultaneous drum hit,
/// regardless of the polyphony map.
pub const PERCUSSION_VOICES: usize = 10;

/// Channel -> ordered voice slots. Order within a channel is allocation
/// priority order; blocks for different channels never overlap.
#[derive(Debug, Clone)]
pub struct VoiceRegistry {
    voices_for_channel: BTreeMap<u8, Vec<VoiceSlot>>,
    percussion_channel: u8,
}

impl VoiceRegistry {
    /// An empty registry: every channel is unrouteable until `build` runs.
    pub fn empty(percussion_channel: u8) -> Self {
        Self {
            voices_for_channel: BTreeMap::new(),
            percussion_channel,
        }
    }

    /// Assign each melodic channel a contiguous block sized by its
    /// requested polyphony, and the percussion channel its fixed block.
    pub fn build(polyphony: &BTreeMap<u8, usize>, percussion_channel: u8) -> Self {
        let mut voices_for_channel = BTreeMap::new();
        voices_for_channel.insert(
            percussion_channel,
            (PERCUSSION_BASE..PERCUSSION_BASE + PERCUSSION_VOICES as VoiceSlot).collect(),
        );

        let mut next_slot: VoiceSlot = 0;
        for (&channel, &count) in polyphony {
            if channel == percussion_channel {
                continue;
            }
            voices_for_channel.insert(channel, (next_slot..next_slot + count as VoiceSlot).collect());
            next_slot += count as VoiceSlot;
        }

        Self {
            voices_for_channel,
            percussion_channel,
        }
    }

    /// The channel's slots in priority order, or `None` for an unrouteable
    /// channel.
    pub fn voices(&self, channel: u8) -> Option<&[VoiceSlot]> {
        self.voices_for_channel.get(&channel).map(Vec::as_slice)
    }

    pub fn is_percussion(&self, channel: u8) -> bool {
        channel == self.percussion_channel
    }

    /// Registered channels in ascending order.
    pub fn channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.voices_for_channel.keys().copied()
    }
}
