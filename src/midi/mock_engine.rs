use super::engine::{ByteLink, MidiError, PacketLink, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    incoming_bytes: VecDeque<u8>,
    incoming_packets: VecDeque<[u8; 4]>,
    sent_bytes: Vec<u8>,
    sent_packets: Vec<[u8; 4]>,
    flushes: usize,
    fail_writes: bool,
}

/// In-memory link for tests and simulations.
///
/// Clones share state, so a test can keep one handle while a transport owns
/// the other.
#[derive(Debug, Clone, Default)]
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state().incoming_bytes.extend(bytes.iter().copied());
    }

    pub fn push_packet(&self, packet: [u8; 4]) {
        self.state().incoming_packets.push_back(packet);
    }

    pub fn sent_bytes(&self) -> Vec<u8> {
        self.state().sent_bytes.clone()
    }

    pub fn sent_packets(&self) -> Vec<[u8; 4]> {
        self.state().sent_packets.clone()
    }

    pub fn clear_sent(&self) {
        let mut state = self.state();
        state.sent_bytes.clear();
        state.sent_packets.clear();
    }

    pub fn flushes(&self) -> usize {
        self.state().flushes
    }

    /// Makes every subsequent write fail, as a full output buffer would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }
}

impl ByteLink for MockLink {
    fn read_byte(&mut self) -> Option<u8> {
        self.state().incoming_bytes.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(MidiError::SendError("mock output full".to_string()));
        }
        state.sent_bytes.extend_from_slice(bytes);
        Ok(())
    }
}

impl PacketLink for MockLink {
    fn read_packet(&mut self) -> Option<[u8; 4]> {
        self.state().incoming_packets.pop_front()
    }

    fn write_packet(&mut self, packet: [u8; 4]) -> Result<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(MidiError::SendError("mock output full".to_string()));
        }
        state.sent_packets.push(packet);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.state().flushes += 1;
        Ok(())
    }
}
