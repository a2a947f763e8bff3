//! Decoders for the five HIPPO message types the translator understands.
//!
//! Field offsets, endianness and fixed-point scales follow the receiver
//! documentation and are pinned down by the conformance tests in this
//! module; they must not be re-derived from observed traffic.

use bitfield_struct::bitfield;
use thiserror::Error;

use crate::frame::RawFrame;

/// Fast fix data with raw dead reckoning.
pub const MSG_FAST_FIX: u16 = 0x3002;
/// GPS fix message.
pub const MSG_GPS_FIX: u16 = 0x3101;
/// UTC time and constellation summary.
pub const MSG_TIME_CONSTELLATION: u16 = 0x3201;
/// UTC time.
pub const MSG_TIME: u16 = 0x3203;
/// GPS channel measurement short status.
pub const MSG_CHANNEL_SHORT: u16 = 0x3301;

/// Semicircle scale for latitude and longitude: 2^31 / 180.
const SEMICIRCLE_PER_DEG: f64 = 11_930_464.711_1;
/// Heading scale: 2^15 counts per 180 degrees.
const HEADING_PER_DEG: f64 = 32_768.0 / 180.0;
/// DOP values arrive as u16 in units of 1/256.
const DOP_SCALE: f64 = 1.0 / 256.0;

/// Validity bits shared by the fast fix and GPS fix status words.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct FixFlags {
    /// Latitude/longitude fields hold a usable value.
    pub position_valid: bool,
    /// Altitude field holds a usable value.
    pub altitude_valid: bool,
    /// Heading field holds a usable value.
    pub heading_valid: bool,
    /// Speed field holds a usable value.
    pub speed_valid: bool,
    #[bits(4)]
    _reserved: u8,
}

/// Fix source byte of the GPS fix message.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct FixSource {
    /// Receiver-specific source code of the current fix.
    #[bits(6)]
    pub source: u8,
    /// 0 for a full 3D fix, 1 for an altitude-hold 2D fix.
    #[bits(2)]
    pub altitude_hold: u8,
}

/// Per-channel tracking flags of the channel measurement message.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ChannelFlags {
    /// Satellite is above the horizon per the current almanac.
    pub visible: bool,
    _b1: bool,
    /// Channel has tracked this satellite at some point.
    pub has_tracked: bool,
    _b3: bool,
    /// Channel is currently tracking the satellite.
    pub tracking: bool,
    _b5: bool,
    /// Measurement meets the elevation/SNR mask.
    pub meets_mask: bool,
    _b7: bool,
}

/// Almanac and ephemeris age nibbles of the channel measurement message.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ChannelHealth {
    /// 0 = none, 1 = old, 2 = current.
    #[bits(2)]
    pub almanac: u8,
    /// 0 = none, 1 = old, 2 = decoded, 3 = verified.
    #[bits(2)]
    pub ephemeris: u8,
    #[bits(4)]
    _reserved: u8,
}

/// Calendar date and UTC time of day as carried by the time messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcTime {
    /// Four-digit year.
    pub year: u16,
    /// Month, 1-12.
    pub month: u8,
    /// Day of month, 1-31.
    pub day: u8,
    /// Hour, 0-23.
    pub hour: u8,
    /// Minute, 0-59.
    pub minute: u8,
    /// Second, 0-60.
    pub second: u8,
    /// UTC offset code reported by the receiver.
    pub offset: u8,
}

/// Fast fix data (0x3002): position, velocity and time of week.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FastFix {
    /// Validity bits for the fields below.
    pub flags: FixFlags,
    /// Age of the fix in seconds; 254 means older, 255 means GPS unavailable.
    pub fix_age: u8,
    /// GPS time of week in milliseconds.
    pub time_of_week: u32,
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
    /// Altitude above mean sea level in meters.
    pub altitude: f64,
    /// Heading in degrees true.
    pub heading: f64,
    /// Speed over ground in cm/s.
    pub speed: u16,
}

/// GPS fix (0x3101): position, velocity and fix source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    /// Fix source and altitude-hold code.
    pub source: FixSource,
    /// Validity bits for the fields below.
    pub flags: FixFlags,
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
    /// Altitude above mean sea level in meters.
    pub altitude: f64,
    /// Heading in degrees true.
    pub heading: f64,
    /// Speed over ground in cm/s.
    pub speed: u16,
}

/// UTC time and constellation summary (0x3201).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAndConstellation {
    /// UTC calendar date and time.
    pub date_time: UtcTime,
    /// Position dilution of precision.
    pub pdop: f64,
    /// Horizontal dilution of precision.
    pub hdop: f64,
    /// Vertical dilution of precision.
    pub vdop: f64,
    /// Number of visible satellites.
    pub visible: u8,
}

/// UTC time (0x3203).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOnly {
    /// GPS time of week in milliseconds.
    pub time_of_week: u32,
    /// GPS week number.
    pub week: u16,
    /// UTC calendar date and time.
    pub date_time: UtcTime,
}

/// Channel measurement short status (0x3301), one satellite per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMeasurement {
    /// Receiver channel index, 0-11.
    pub channel: u8,
    /// Satellite PRN id.
    pub prn: u8,
    /// Tracking flags.
    pub flags: ChannelFlags,
    /// Signal-to-noise ratio.
    pub snr: u8,
    /// Azimuth, receiver units.
    pub azimuth: u8,
    /// Elevation, receiver units.
    pub elevation: u8,
    /// Almanac and ephemeris age.
    pub health: ChannelHealth,
}

/// A decoded HIPPO message, one variant per supported message id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HippoMessage {
    /// Fast fix data (0x3002).
    FastFix(FastFix),
    /// GPS fix (0x3101).
    GpsFix(GpsFix),
    /// UTC time and constellation summary (0x3201).
    TimeAndConstellation(TimeAndConstellation),
    /// UTC time (0x3203).
    TimeOnly(TimeOnly),
    /// Channel measurement short status (0x3301).
    ChannelMeasurement(ChannelMeasurement),
}

/// Decode-time failures; all of them are absorbed by the driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A supported message id arrived with the wrong payload length.
    #[error("message 0x{id:04X}: payload length {got}, expected {want}")]
    MalformedPayload {
        /// Offending message id.
        id: u16,
        /// Length actually received.
        got: usize,
        /// Length the id requires.
        want: usize,
    },
}

/// Decodes a validated frame into a typed message.
///
/// Returns `Ok(None)` for message ids outside the supported five; those are
/// not errors, the driver simply ignores them.
pub fn decode(frame: &RawFrame) -> Result<Option<HippoMessage>, DecodeError> {
    let p = frame.payload.as_slice();
    let msg = match frame.message_id {
        MSG_FAST_FIX => {
            expect_len(frame, 46)?;
            HippoMessage::FastFix(FastFix {
                flags: FixFlags::from_bits(p[0]),
                fix_age: p[2],
                time_of_week: u32_le(p, 3),
                latitude: semicircles_to_deg(i32_le(p, 7)),
                longitude: semicircles_to_deg(i32_le(p, 11)),
                altitude: f64::from(i16_le(p, 15)),
                heading: counts_to_heading(u16_le(p, 17)),
                speed: u16_le(p, 19),
            })
        }
        MSG_GPS_FIX => {
            expect_len(frame, 28)?;
            HippoMessage::GpsFix(GpsFix {
                source: FixSource::from_bits(p[4]),
                flags: FixFlags::from_bits(p[5]),
                latitude: semicircles_to_deg(i32_le(p, 6)),
                longitude: semicircles_to_deg(i32_le(p, 10)),
                altitude: f64::from(i16_le(p, 14)),
                heading: counts_to_heading(u16_le(p, 16)),
                speed: u16_le(p, 18),
            })
        }
        MSG_TIME_CONSTELLATION => {
            expect_len(frame, 18)?;
            HippoMessage::TimeAndConstellation(TimeAndConstellation {
                date_time: UtcTime {
                    year: u16_le(p, 0),
                    month: p[2],
                    day: p[3],
                    hour: p[4],
                    minute: p[5],
                    second: p[6],
                    offset: p[7],
                },
                pdop: f64::from(u16_le(p, 8)) * DOP_SCALE,
                hdop: f64::from(u16_le(p, 10)) * DOP_SCALE,
                vdop: f64::from(u16_le(p, 12)) * DOP_SCALE,
                visible: p[17] & 0x0F,
            })
        }
        MSG_TIME => {
            expect_len(frame, 15)?;
            HippoMessage::TimeOnly(TimeOnly {
                time_of_week: u32_le(p, 1),
                week: u16_le(p, 5),
                date_time: UtcTime {
                    year: u16_le(p, 8),
                    month: p[10],
                    day: p[11],
                    hour: p[12],
                    minute: p[13],
                    second: p[14],
                    offset: p[7],
                },
            })
        }
        MSG_CHANNEL_SHORT => {
            expect_len(frame, 7)?;
            HippoMessage::ChannelMeasurement(ChannelMeasurement {
                channel: p[0],
                prn: p[1],
                flags: ChannelFlags::from_bits(p[2]),
                snr: p[3],
                azimuth: p[4],
                elevation: p[5],
                health: ChannelHealth::from_bits(p[6]),
            })
        }
        _ => return Ok(None),
    };
    Ok(Some(msg))
}

fn expect_len(frame: &RawFrame, want: usize) -> Result<(), DecodeError> {
    if frame.payload.len() != want {
        return Err(DecodeError::MalformedPayload {
            id: frame.message_id,
            got: frame.payload.len(),
            want,
        });
    }
    Ok(())
}

fn u16_le(p: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([p[off], p[off + 1]])
}

fn i16_le(p: &[u8], off: usize) -> i16 {
    i16::from_le_bytes([p[off], p[off + 1]])
}

fn u32_le(p: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([p[off], p[off + 1], p[off + 2], p[off + 3]])
}

fn i32_le(p: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([p[off], p[off + 1], p[off + 2], p[off + 3]])
}

fn semicircles_to_deg(raw: i32) -> f64 {
    f64::from(raw) / SEMICIRCLE_PER_DEG
}

fn counts_to_heading(raw: u16) -> f64 {
    f64::from(raw) / HEADING_PER_DEG
}

/// Converts degrees to the receiver's semicircle encoding.
///
/// The inverse of the position decode, kept next to the scale constant so
/// simulators and tests stay in lockstep with the decoder.
pub fn deg_to_semicircles(deg: f64) -> i32 {
    (deg * SEMICIRCLE_PER_DEG).round() as i32
}

/// Converts degrees true to the receiver's heading counts.
pub fn heading_to_counts(deg: f64) -> u16 {
    (deg * HEADING_PER_DEG).round() as u16
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame(id: u16, payload: Vec<u8>) -> RawFrame {
        RawFrame {
            message_id: id,
            payload,
            checksum_valid: true,
        }
    }

    fn fast_fix_payload() -> Vec<u8> {
        let mut p = vec![0u8; 46];
        p[0] = 0x0F; // all fields valid
        p[2] = 3; // fix age
        p[3..7].copy_from_slice(&45_296_789u32.to_le_bytes()); // 12:34:56.789
        p[7..11].copy_from_slice(&deg_to_semicircles(60.1699).to_le_bytes());
        p[11..15].copy_from_slice(&deg_to_semicircles(24.9384).to_le_bytes());
        p[15..17].copy_from_slice(&25i16.to_le_bytes());
        p[17..19].copy_from_slice(&heading_to_counts(90.0).to_le_bytes());
        p[19..21].copy_from_slice(&500u16.to_le_bytes());
        p
    }

    #[test]
    fn decode_fast_fix() {
        let msg = decode(&frame(MSG_FAST_FIX, fast_fix_payload()))
            .unwrap()
            .unwrap();
        let HippoMessage::FastFix(fix) = msg else {
            panic!("wrong variant: {msg:?}");
        };
        assert!(fix.flags.position_valid());
        assert!(fix.flags.speed_valid());
        assert_eq!(fix.fix_age, 3);
        assert_eq!(fix.time_of_week, 45_296_789);
        assert!((fix.latitude - 60.1699).abs() < 1e-6);
        assert!((fix.longitude - 24.9384).abs() < 1e-6);
        assert_eq!(fix.altitude, 25.0);
        assert!((fix.heading - 90.0).abs() < 1e-2);
        assert_eq!(fix.speed, 500);
    }

    #[test]
    fn decode_fast_fix_southern_hemisphere() {
        let mut p = fast_fix_payload();
        p[7..11].copy_from_slice(&deg_to_semicircles(-33.8688).to_le_bytes());
        let msg = decode(&frame(MSG_FAST_FIX, p)).unwrap().unwrap();
        let HippoMessage::FastFix(fix) = msg else {
            panic!("wrong variant");
        };
        assert!((fix.latitude + 33.8688).abs() < 1e-6);
    }

    #[test]
    fn decode_gps_fix() {
        let mut p = vec![0u8; 28];
        p[4] = 0x40 | 17; // altitude hold + source 17
        p[5] = 0x0F;
        p[6..10].copy_from_slice(&deg_to_semicircles(51.4778).to_le_bytes());
        p[10..14].copy_from_slice(&deg_to_semicircles(-0.0015).to_le_bytes());
        p[14..16].copy_from_slice(&(-12i16).to_le_bytes());
        p[16..18].copy_from_slice(&heading_to_counts(271.5).to_le_bytes());
        p[18..20].copy_from_slice(&1234u16.to_le_bytes());
        let msg = decode(&frame(MSG_GPS_FIX, p)).unwrap().unwrap();
        let HippoMessage::GpsFix(fix) = msg else {
            panic!("wrong variant");
        };
        assert_eq!(fix.source.source(), 17);
        assert_eq!(fix.source.altitude_hold(), 1);
        assert!((fix.latitude - 51.4778).abs() < 1e-6);
        assert!((fix.longitude + 0.0015).abs() < 1e-6);
        assert_eq!(fix.altitude, -12.0);
        assert!((fix.heading - 271.5).abs() < 1e-2);
        assert_eq!(fix.speed, 1234);
    }

    #[test]
    fn decode_time_and_constellation() {
        let mut p = vec![0u8; 18];
        p[0..2].copy_from_slice(&2019u16.to_le_bytes());
        p[2] = 7;
        p[3] = 14;
        p[4] = 12;
        p[5] = 34;
        p[6] = 56;
        p[7] = 18;
        p[8..10].copy_from_slice(&(2 * 256u16).to_le_bytes()); // pdop 2.0
        p[10..12].copy_from_slice(&384u16.to_le_bytes()); // hdop 1.5
        p[12..14].copy_from_slice(&(3 * 256u16).to_le_bytes()); // vdop 3.0
        p[17] = 0xF8; // upper bits must be masked off
        let msg = decode(&frame(MSG_TIME_CONSTELLATION, p)).unwrap().unwrap();
        let HippoMessage::TimeAndConstellation(tc) = msg else {
            panic!("wrong variant");
        };
        assert_eq!(tc.date_time.year, 2019);
        assert_eq!(tc.date_time.month, 7);
        assert_eq!(tc.date_time.day, 14);
        assert_eq!((tc.date_time.hour, tc.date_time.minute), (12, 34));
        assert_eq!(tc.pdop, 2.0);
        assert_eq!(tc.hdop, 1.5);
        assert_eq!(tc.vdop, 3.0);
        assert_eq!(tc.visible, 8);
    }

    #[test]
    fn decode_time_only() {
        let mut p = vec![0u8; 15];
        p[1..5].copy_from_slice(&86_400_000u32.to_le_bytes());
        p[5..7].copy_from_slice(&2062u16.to_le_bytes());
        p[7] = 18;
        p[8..10].copy_from_slice(&2019u16.to_le_bytes());
        p[10] = 7;
        p[11] = 15;
        p[12] = 0;
        p[13] = 0;
        p[14] = 1;
        let msg = decode(&frame(MSG_TIME, p)).unwrap().unwrap();
        let HippoMessage::TimeOnly(t) = msg else {
            panic!("wrong variant");
        };
        assert_eq!(t.time_of_week, 86_400_000);
        assert_eq!(t.week, 2062);
        assert_eq!(t.date_time.year, 2019);
        assert_eq!(t.date_time.offset, 18);
    }

    #[test]
    fn decode_channel_measurement() {
        let p = vec![4, 23, 0x15, 42, 128, 63, 0x09];
        let msg = decode(&frame(MSG_CHANNEL_SHORT, p)).unwrap().unwrap();
        let HippoMessage::ChannelMeasurement(ch) = msg else {
            panic!("wrong variant");
        };
        assert_eq!(ch.channel, 4);
        assert_eq!(ch.prn, 23);
        assert!(ch.flags.visible());
        assert!(ch.flags.has_tracked());
        assert!(ch.flags.tracking());
        assert!(!ch.flags.meets_mask());
        assert_eq!(ch.snr, 42);
        assert_eq!(ch.azimuth, 128);
        assert_eq!(ch.elevation, 63);
        assert_eq!(ch.health.almanac(), 1);
        assert_eq!(ch.health.ephemeris(), 2);
    }

    #[test]
    fn unsupported_id_is_not_an_error() {
        assert_eq!(decode(&frame(0x2901, vec![0; 11])).unwrap(), None);
    }

    #[test]
    fn short_payload_is_malformed() {
        let err = decode(&frame(MSG_CHANNEL_SHORT, vec![0; 6])).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedPayload {
                id: MSG_CHANNEL_SHORT,
                got: 6,
                want: 7,
            }
        );
    }
}
