use std::collections::VecDeque;
use std::fmt;

use jtframe_core::core::{ChannelRequest, ChannelResponse, MemoryChannel};
use jtframe_core::device::Sdram;

pub mod trace;

// --- CheckedSdram: channel wrapper that checks every read against a reference image ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    /// A read returned something other than the reference payload.
    DataMismatch { addr: u32, expected: u32, actual: u32 },
    /// `data_ready` with no read accepted and outstanding.
    UnexpectedData { data: u32 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Violation::DataMismatch {
                addr,
                expected,
                actual,
            } => write!(
                f,
                "read 0x{addr:06X}: expected 0x{expected:08X}, got 0x{actual:08X}"
            ),
            Violation::UnexpectedData { data } => {
                write!(f, "data_ready (0x{data:08X}) with no read outstanding")
            }
        }
    }
}

/// Wraps a channel and keeps a word image of what it should contain.
///
/// Writes go into the image when the channel accepts them. Each
/// `data_ready` is matched against the oldest accepted read.
pub struct CheckedSdram<C: MemoryChannel = Sdram> {
    inner: C,
    reference: Vec<u16>,
    outstanding: VecDeque<u32>,
    violations: Vec<Violation>,
    checked_reads: u64,
}

impl<C: MemoryChannel> CheckedSdram<C> {
    /// `reference` must match the wrapped channel's contents word for word.
    /// Addresses wrap at its length.
    ///
    /// # Panics
    ///
    /// If `reference` is empty.
    pub fn new(inner: C, reference: Vec<u16>) -> Self {
        assert!(!reference.is_empty(), "empty reference image");
        Self {
            inner,
            reference,
            outstanding: VecDeque::new(),
            violations: Vec::new(),
            checked_reads: 0,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    pub fn reference(&self) -> &[u16] {
        &self.reference
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn take_violations(&mut self) -> Vec<Violation> {
        std::mem::take(&mut self.violations)
    }

    pub fn checked_reads(&self) -> u64 {
        self.checked_reads
    }

    /// Panic listing every violation, if there are any.
    pub fn assert_clean(&self) {
        if self.violations.is_empty() {
            return;
        }
        let lines: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        panic!(
            "{} channel violations:\n  {}",
            lines.len(),
            lines.join("\n  ")
        );
    }

    fn index(&self, addr: u32) -> usize {
        addr as usize % self.reference.len()
    }

    fn word(&self, addr: u32) -> u16 {
        self.reference[self.index(addr)]
    }

    fn expected_payload(&self, addr: u32) -> u32 {
        (self.word(addr.wrapping_add(1)) as u32) << 16 | self.word(addr) as u32
    }
}

impl CheckedSdram<Sdram> {
    /// Wrap `sdram`, taking its current contents as the reference.
    pub fn from_sdram(sdram: Sdram) -> Self {
        let reference = sdram.words().to_vec();
        Self::new(sdram, reference)
    }

    /// Load bytes into both the channel and the reference.
    pub fn load(&mut self, word_addr: u32, bytes: &[u8]) {
        self.inner.load(word_addr, bytes);
        for (i, _) in bytes.chunks(2).enumerate() {
            let addr = word_addr.wrapping_add(i as u32);
            let index = self.index(addr);
            self.reference[index] = self.inner.read_word(addr);
        }
    }

    pub fn write_word(&mut self, addr: u32, word: u16) {
        self.inner.write_word(addr, word);
        let index = self.index(addr);
        self.reference[index] = word;
    }
}

impl<C: MemoryChannel> MemoryChannel for CheckedSdram<C> {
    fn response(&self) -> ChannelResponse {
        self.inner.response()
    }

    fn clock(&mut self, request: &ChannelRequest) {
        self.inner.clock(request);
        let response = self.inner.response();

        if response.ack {
            if request.wr {
                let index = self.index(request.addr);
                self.reference[index] = request
                    .write_mask
                    .merge(self.reference[index], request.write_data);
            } else if request.rd {
                self.outstanding.push_back(request.addr);
            }
        }

        if response.data_ready {
            match self.outstanding.pop_front() {
                Some(addr) => {
                    self.checked_reads += 1;
                    let expected = self.expected_payload(addr);
                    if response.data != expected {
                        self.violations.push(Violation::DataMismatch {
                            addr,
                            expected,
                            actual: response.data,
                        });
                    }
                }
                None => self.violations.push(Violation::UnexpectedData {
                    data: response.data,
                }),
            }
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.outstanding.clear();
    }
}
