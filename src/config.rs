//! Configuration for the voice allocator.
//!
//! Defaults match a small hardware synth setup: four-note polyphony on
//! channel 1, drum sounds on channel 10.

use std::collections::BTreeMap;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of one-shot PCM patches in the percussion bank. Note numbers on
/// the percussion channel wrap modulo this count.
pub const PCM_PATCHES: u16 = 29;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct MidiConfig {
    /// Requested voice count per channel. The percussion channel ignores
    /// this and always gets its fixed block.
    pub polyphony: BTreeMap<u8, usize>,
    /// Initial patch per channel.
    pub patches: BTreeMap<u8, u16>,
    /// Channel where note number selects a drum sound instead of a pitch.
    pub percussion_channel: u8,
    /// Size of the percussion one-shot patch bank.
    pub pcm_patches: u16,
    /// Pause before each patch-load command. The engine's command queue
    /// overflows if loads are issued back to back.
    pub patch_load_pace: Duration,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            polyphony: BTreeMap::from([(1, 4)]),
            patches: BTreeMap::from([(1, 0)]),
            percussion_channel: 10,
            pcm_patches: PCM_PATCHES,
            patch_load_pace: Duration::from_millis(100),
        }
    }
}

/// Error type for the configuration interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A channel cannot be configured with zero voices.
    ZeroVoices { channel: u8 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ZeroVoices { channel } => {
                write!(f, "channel {} cannot have zero voices", channel)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
