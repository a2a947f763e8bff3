//! HIPPO frame synchronization.
//!
//! A HIPPO frame on the wire is `0x81`, two message id bytes, the payload,
//! an additive checksum and the `0x82` end marker. Logical bytes with the
//! high bit set are stuffed: the receiver emits `0x80` followed by the byte
//! with the high bit cleared, so `0x81` never appears raw inside a frame.
//! The checksum byte makes the sum of all logical frame bytes, markers
//! included, come out to zero mod 256.

use lazy_static::lazy_static;
use std::collections::{HashMap, VecDeque};

/// Start-of-frame marker.
pub const FRAME_START: u8 = 0x81;
/// End-of-frame marker.
pub const FRAME_END: u8 = 0x82;
/// Escape byte; the byte following it is OR-ed with 0x80.
pub const STUFF_MARK: u8 = 0x80;

/// Smallest complete frame: start marker, two id bytes, checksum, end marker.
const MIN_FRAME: usize = 5;

lazy_static! {
    /// Payload lengths per message id, data bytes only (no header, checksum
    /// or end marker). Taken from the receiver documentation; ids missing
    /// here are framed by scanning for the raw end marker instead.
    pub static ref PAYLOAD_LEN: HashMap<u16, usize> = HashMap::from([
        (0x1201, 4),
        (0x1203, 24),
        (0x1204, 16),
        (0x1401, 9),
        (0x1402, 31),
        (0x1601, 3),
        (0x1602, 9),
        (0x2201, 31),
        (0x2202, 5),
        (0x2601, 16),
        (0x2602, 16),
        (0x2812, 26),
        (0x2813, 50),
        (0x2814, 26),
        (0x2816, 74),
        (0x2901, 11),
        (0x2902, 21),
        (0x2903, 5),
        (0x2904, 7),
        (0x2905, 5),
        (0x2907, 25),
        (0x2908, 9),
        (0x3002, 46),
        (0x3003, 101),
        (0x3101, 28),
        (0x3201, 18),
        (0x3203, 15),
        (0x3301, 7),
        (0x3603, 9),
        (0x3604, 9),
        (0x3605, 2),
        (0x3607, 10),
        (0x3608, 9),
        (0x3F01, 13),
    ]);
}

/// One framed HIPPO message, unstuffed and length-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Two-byte message id, high byte first.
    pub message_id: u16,
    /// Logical payload bytes between the id and the checksum.
    pub payload: Vec<u8>,
    /// Whether the additive checksum summed to zero.
    pub checksum_valid: bool,
}

/// Counters kept by the frame reader; none of these conditions is fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Complete frames surfaced, valid or not.
    pub frames: u64,
    /// Bytes discarded while hunting for a start marker.
    pub noise_bytes: u64,
    /// Frames abandoned because the end marker was missing or early.
    pub sync_losses: u64,
    /// Complete frames whose checksum did not sum to zero.
    pub checksum_failures: u64,
}

#[derive(Clone, Copy)]
enum Scan {
    /// Hunting for a start marker.
    Scanning,
    /// Accumulating logical bytes of a frame.
    InFrame {
        /// Total logical frame length implied by the id, 0 while unknown.
        expected: usize,
        /// The previous wire byte was the escape byte.
        unstuff_next: bool,
    },
}

/// Incremental push parser that locates HIPPO frames in a byte stream.
///
/// Feed arbitrary chunks with [`push`](Self::push) and drain complete frames
/// with [`poll`](Self::poll). The reader never fails; corrupted input only
/// moves counters and resynchronization happens at the next start marker.
pub struct FrameReader {
    scan: Scan,
    data: Vec<u8>,
    pending: VecDeque<RawFrame>,
    stats: FrameStats,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Creates a reader in the scanning state.
    pub fn new() -> Self {
        Self {
            scan: Scan::Scanning,
            data: Vec::with_capacity(128),
            pending: VecDeque::new(),
            stats: FrameStats::default(),
        }
    }

    /// Appends raw wire bytes, completing any frames they close off.
    pub fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.feed(b);
        }
    }

    /// Returns the next checksum-valid frame, if one is buffered.
    ///
    /// Checksum failures have already been counted and are skipped here.
    pub fn poll(&mut self) -> Option<RawFrame> {
        while let Some(frame) = self.pending.pop_front() {
            if frame.checksum_valid {
                return Some(frame);
            }
        }
        None
    }

    /// Returns the next buffered frame regardless of checksum validity.
    pub fn read_frame(&mut self) -> Option<RawFrame> {
        self.pending.pop_front()
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    fn feed(&mut self, byte: u8) {
        let (expected, unstuff_next) = match self.scan {
            Scan::Scanning => {
                if byte != FRAME_START {
                    self.stats.noise_bytes += 1;
                    return;
                }
                self.data.clear();
                self.data.push(FRAME_START);
                self.scan = Scan::InFrame {
                    expected: 0,
                    unstuff_next: false,
                };
                return;
            }
            Scan::InFrame {
                expected,
                unstuff_next,
            } => (expected, unstuff_next),
        };

        if byte == STUFF_MARK {
            self.scan = Scan::InFrame {
                expected,
                unstuff_next: true,
            };
            return;
        }
        let logical = if unstuff_next { byte | 0x80 } else { byte };
        self.data.push(logical);

        let mut expected = expected;
        if self.data.len() == 3 {
            let id = u16::from(self.data[1]) << 8 | u16::from(self.data[2]);
            // Header, checksum and end marker around the payload.
            expected = PAYLOAD_LEN.get(&id).map(|n| n + 5).unwrap_or(0);
        }
        self.scan = Scan::InFrame {
            expected,
            unstuff_next: false,
        };

        if logical == FRAME_END && (expected == 0 || self.data.len() == expected) {
            if self.data.len() < MIN_FRAME {
                self.desync();
            } else {
                self.complete();
            }
        } else if expected != 0 && self.data.len() >= expected {
            // The frame should have ended here but the marker never came.
            log::debug!(
                "frame of 0x{:02X}{:02X} ran past its expected end, resyncing",
                self.data[1],
                self.data[2]
            );
            self.desync();
        }
    }

    fn desync(&mut self) {
        self.stats.sync_losses += 1;
        self.data.clear();
        self.scan = Scan::Scanning;
    }

    fn complete(&mut self) {
        self.scan = Scan::Scanning;
        let sum = self.data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        let message_id = u16::from(self.data[1]) << 8 | u16::from(self.data[2]);
        let payload = self.data[3..self.data.len() - 2].to_vec();
        self.stats.frames += 1;
        if sum != 0 {
            self.stats.checksum_failures += 1;
            log::debug!(
                "dropping frame of 0x{message_id:04X}: checksum residue {sum:#04x}"
            );
        }
        self.pending.push_back(RawFrame {
            message_id,
            payload,
            checksum_valid: sum == 0,
        });
    }
}

/// Encodes a logical message as a stuffed HIPPO frame, checksum included.
///
/// The inverse of [`FrameReader`]; used by conformance tests and receiver
/// simulators to produce byte-exact wire input.
pub fn encode_frame(message_id: u16, payload: &[u8]) -> Vec<u8> {
    let id_hi = (message_id >> 8) as u8;
    let id_lo = (message_id & 0xFF) as u8;
    let mut sum = FRAME_START
        .wrapping_add(id_hi)
        .wrapping_add(id_lo)
        .wrapping_add(FRAME_END);
    for &b in payload {
        sum = sum.wrapping_add(b);
    }
    let checksum = 0u8.wrapping_sub(sum);

    let mut out = vec![FRAME_START];
    let mut put = |b: u8| {
        if b & 0x80 != 0 {
            out.push(STUFF_MARK);
            out.push(b & 0x7F);
        } else {
            out.push(b);
        }
    };
    put(id_hi);
    put(id_lo);
    for &b in payload {
        put(b);
    }
    put(checksum);
    out.push(FRAME_END);
    out
}
