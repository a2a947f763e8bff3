//! The translation driver wiring frames through decode, state update and
//! sentence emission.

use std::io::{ErrorKind, Read, Write};

use thiserror::Error;

use crate::frame::{FrameReader, FrameStats};
use crate::hippo::decode;
use crate::nmea::encode_trigger;
use crate::state::NavigationState;

/// Terminal failures of a [`Translator::run`] loop. Everything decode-side
/// is absorbed into counters; only boundary I/O can end the stream.
#[derive(Error, Debug)]
pub enum TranslateError {
    /// The input byte source failed.
    #[error("reading input stream: {0}")]
    Input(#[source] std::io::Error),
    /// The sentence sink failed.
    #[error("writing NMEA output: {0}")]
    Output(#[source] std::io::Error),
}

/// Counters describing one translation session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslateStats {
    /// Complete frames recognized in the byte stream.
    pub frames: u64,
    /// Bytes discarded while hunting for frame sync.
    pub noise_bytes: u64,
    /// Frames abandoned after losing sync mid-frame.
    pub sync_losses: u64,
    /// Frames dropped for a bad additive checksum.
    pub checksum_failures: u64,
    /// Supported messages dropped for a malformed payload.
    pub malformed: u64,
    /// Frames carrying a message id outside the supported five.
    pub unsupported: u64,
    /// NMEA sentences emitted.
    pub sentences: u64,
}

impl TranslateStats {
    fn merge(decode_side: Self, frame_side: FrameStats) -> Self {
        Self {
            frames: frame_side.frames,
            noise_bytes: frame_side.noise_bytes,
            sync_losses: frame_side.sync_losses,
            checksum_failures: frame_side.checksum_failures,
            ..decode_side
        }
    }
}

/// Drives the whole pipeline: bytes in, NMEA sentences out.
///
/// At most one message is ever in flight through decode, aggregate and
/// encode, so the session state needs no synchronization; construct one
/// `Translator` per input stream.
pub struct Translator {
    reader: FrameReader,
    state: NavigationState,
    stats: TranslateStats,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    /// Creates a translator with a fresh, all-unknown navigation state.
    pub fn new() -> Self {
        Self {
            reader: FrameReader::new(),
            state: NavigationState::new(),
            stats: TranslateStats::default(),
        }
    }

    /// The aggregated navigation state as of the last pushed byte.
    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    /// Session counters, frame-level and decode-level combined.
    pub fn stats(&self) -> TranslateStats {
        TranslateStats::merge(self.stats, self.reader.stats())
    }

    /// Feeds a chunk of raw receiver bytes and returns every sentence it
    /// completes, in production order. Corrupt or unsupported input only
    /// advances counters; the returned list is then simply shorter.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.reader.push(bytes);
        let mut out = Vec::new();
        while let Some(frame) = self.reader.poll() {
            match decode(&frame) {
                Ok(Some(msg)) => {
                    self.state.apply(&msg);
                    let sentences = encode_trigger(&msg, &self.state);
                    self.stats.sentences += sentences.len() as u64;
                    out.extend(sentences);
                }
                Ok(None) => {
                    self.stats.unsupported += 1;
                    log::debug!("ignoring unsupported message 0x{:04X}", frame.message_id);
                }
                Err(err) => {
                    self.stats.malformed += 1;
                    log::debug!("dropping malformed message: {err}");
                }
            }
        }
        out
    }

    /// Pumps `input` to `output` until the input stream is exhausted.
    ///
    /// Timeouts and interrupts on the input are retried, which lets a serial
    /// port with a read timeout behave like a live stream. Each batch of
    /// sentences is flushed before more input is read, so the sink never
    /// sees a partial sentence, even when an error ends the loop.
    pub fn run<R: Read, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<TranslateStats, TranslateError> {
        let mut buf = [0u8; 2048];
        loop {
            let n = match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err)
                    if err.kind() == ErrorKind::TimedOut
                        || err.kind() == ErrorKind::Interrupted =>
                {
                    continue
                }
                Err(err) => return Err(TranslateError::Input(err)),
            };
            for sentence in self.push(&buf[..n]) {
                output
                    .write_all(sentence.as_bytes())
                    .map_err(TranslateError::Output)?;
            }
            output.flush().map_err(TranslateError::Output)?;
        }
        Ok(self.stats())
    }
}
