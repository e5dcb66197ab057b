//! Per-channel sustain pedal state.

use std::collections::{HashMap, HashSet};
use std::mem;

#[derive(Debug, Default)]
struct ChannelSustain {
    down: bool,
    deferred: HashSet<u8>,
}

/// Tracks the pedal flag and the notes whose release has been deferred
/// while the pedal is down.
#[derive(Debug, Default)]
pub struct SustainTracker {
    channels: HashMap<u8, ChannelSustain>,
}

impl SustainTracker {
    pub fn is_down(&self, channel: u8) -> bool {
        self.channels.get(&channel).is_some_and(|s| s.down)
    }

    /// Set the pedal flag only; draining deferred notes is the caller's
    /// responsibility so release side effects run through the normal path.
    pub fn set_down(&mut self, channel: u8, down: bool) {
        self.channels.entry(channel).or_default().down = down;
    }

    /// Remember a note whose note-off arrived while the pedal was down.
    pub fn defer(&mut self, channel: u8, note: u8) {
        self.channels.entry(channel).or_default().deferred.insert(note);
    }

    /// Take the channel's full deferred set. The set is emptied in one move
    /// so each note releases exactly once even if releasing re-enters
    /// sustain bookkeeping.
    pub fn drain(&mut self, channel: u8) -> HashSet<u8> {
        self.channels
            .get_mut(&channel)
            .map(|s| mem::take(&mut s.deferred))
            .unwrap_or_default()
    }
}
