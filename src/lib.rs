#![deny(missing_docs)]
//! # HIPPO to NMEA translator
//! Translates the proprietary binary HIPPO GPS receiver protocol into
//! standard NMEA 0183 sentences (RMC, VTG, GSA, GGA, ZDA, GSV).
//!
//! The pipeline frames and validates HIPPO messages out of a raw byte
//! stream, decodes the five supported message types, folds them into a
//! running [`NavigationState`] and renders checksummed sentences from that
//! state, since no single HIPPO message carries everything a given NMEA
//! sentence needs. Feed bytes to a [`Translator`] and write out whatever
//! sentences come back; corrupted input never aborts the stream.

mod driver;
mod frame;
mod hippo;
mod nmea;
mod state;

pub use driver::{TranslateError, TranslateStats, Translator};
pub use frame::{encode_frame, FrameReader, FrameStats, RawFrame};
pub use hippo::{
    decode, ChannelFlags, ChannelHealth, ChannelMeasurement, DecodeError, FastFix, FixFlags,
    FixSource, GpsFix, HippoMessage, TimeAndConstellation, TimeOnly, UtcTime,
};
pub use nmea::{checksum, encode_trigger};
pub use state::{NavigationState, Satellite, UpdateMarks};

/// Translates a complete byte buffer in one call.
///
/// Convenience wrapper over [`Translator`] for fixed captures; live streams
/// should keep a `Translator` and push chunks as they arrive so state
/// carries over between reads.
pub fn translate_buffer(buf: &[u8]) -> Vec<String> {
    Translator::new().push(buf)
}
