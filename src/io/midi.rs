//! MIDI channel message decoding.
//!
//! Messages arrive as a flat byte stream: one status byte followed by up to
//! two data bytes depending on the message type. `decode_message` consumes
//! exactly one message worth of bytes at a time so a dispatcher can walk a
//! buffer without any out-of-band framing.

/// A decoded MIDI channel message.
///
/// Channels use external MIDI numbering (1-16), mapped from the status
/// byte's low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ProgramChange { channel: u8, patch: u8 },
    /// 14-bit pitch wheel position, re-centered to -8192..=8191.
    PitchBend { channel: u8, value: i16 },
    /// Sustain pedal (CC 64). Nonzero value means pedal down.
    SustainPedal { channel: u8, down: bool },
}

/// Result of attempting to decode one message from the front of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// The decoded event, or `None` for messages we recognize the length of
    /// but do not act on.
    pub event: Option<MidiEvent>,
    /// Bytes consumed from the buffer. Zero means the buffer holds only a
    /// partial message and more bytes are needed.
    pub consumed: usize,
}

impl Decoded {
    const PENDING: Decoded = Decoded {
        event: None,
        consumed: 0,
    };
}

/// Byte length of the message starting with `status`, per the MIDI spec:
/// program change and channel pressure carry one data byte, system bytes
/// stand alone, everything else carries two.
fn message_len(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 2,
        0xF0 => 1,
        _ => 3,
    }
}

/// Decode one message from the front of `buf`.
///
/// Unrecognized but well-formed messages are skipped by their full length.
/// A stray data byte (no status bit) is skipped one byte at a time until
/// the next message boundary.
pub fn decode_message(buf: &[u8]) -> Decoded {
    let Some(&status) = buf.first() else {
        return Decoded::PENDING;
    };

    if status < 0x80 {
        // Mid-message garbage; resync by skipping to the next status byte.
        return Decoded {
            event: None,
            consumed: 1,
        };
    }

    let needed = message_len(status);
    if buf.len() < needed {
        return Decoded::PENDING;
    }

    let channel = (status & 0x0F) + 1;
    let event = match status & 0xF0 {
        0x90 => {
            let note = buf[1] & 0x7F;
            let velocity = buf[2] & 0x7F;
            if velocity == 0 {
                // Note on with zero velocity is a release by convention.
                Some(MidiEvent::NoteOff { channel, note })
            } else {
                Some(MidiEvent::NoteOn {
                    channel,
                    note,
                    velocity,
                })
            }
        }
        0x80 => Some(MidiEvent::NoteOff {
            channel,
            note: buf[1] & 0x7F,
        }),
        0xC0 => Some(MidiEvent::ProgramChange {
            channel,
            patch: buf[1] & 0x7F,
        }),
        0xE0 => {
            let lsb = (buf[1] & 0x7F) as i16;
            let msb = (buf[2] & 0x7F) as i16;
            Some(MidiEvent::PitchBend {
                channel,
                value: ((msb << 7) | lsb) - 8192,
            })
        }
        0xB0 if buf[1] & 0x7F == 0x40 => Some(MidiEvent::SustainPedal {
            channel,
            down: buf[2] & 0x7F != 0,
        }),
        0xB0 => None, // other controllers
        _ => {
            log::trace!("ignoring MIDI status {:#04x}", status);
            None
        }
    };

    Decoded {
        event,
        consumed: needed,
    }
}
