#[cfg(feature = "rtrb")]
use rtrb::Consumer;

/// Source of raw MIDI bytes.
///
/// `poll` is non-blocking: it appends whatever the transport currently has
/// buffered and returns the number of bytes added. The dispatcher calls it
/// repeatedly until it returns zero.
pub trait MidiTransport {
    fn poll(&mut self, buf: &mut Vec<u8>) -> usize;
}

#[cfg(feature = "rtrb")]
impl MidiTransport for Consumer<u8> {
    fn poll(&mut self, buf: &mut Vec<u8>) -> usize {
        let mut count = 0;
        while let Ok(byte) = self.pop() {
            buf.push(byte);
            count += 1;
        }
        count
    }
}

/// A preloaded byte buffer as a transport. Each poll drains everything it
/// holds; useful for tests and offline runs.
impl MidiTransport for Vec<u8> {
    fn poll(&mut self, buf: &mut Vec<u8>) -> usize {
        let count = self.len();
        buf.append(self);
        count
    }
}
