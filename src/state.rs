//! Running navigation state fed by decoded HIPPO messages.
//!
//! No single HIPPO message carries everything an NMEA sentence needs, so the
//! translator keeps the latest known value of every navigation field here.
//! Each field group is only ever overwritten by the message types that own
//! it; everything starts out unknown and stays unknown until a message
//! carrying it arrives.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::hippo::{HippoMessage, UtcTime};

/// Last known report for one satellite, keyed by PRN in the state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Satellite {
    /// Satellite PRN id.
    pub prn: u8,
    /// Receiver channel that last reported this satellite.
    pub channel: u8,
    /// Satellite is above the horizon.
    pub visible: bool,
    /// Channel is currently tracking the satellite.
    pub tracking: bool,
    /// Channel has tracked the satellite at some point.
    pub has_tracked: bool,
    /// Measurement meets the elevation/SNR mask.
    pub meets_mask: bool,
    /// Signal-to-noise ratio.
    pub snr: u8,
    /// Azimuth, receiver units.
    pub azimuth: u8,
    /// Elevation, receiver units.
    pub elevation: u8,
}

/// Monotonic update markers, one per field group, bumped on every overwrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateMarks {
    /// Position, altitude and velocity fields.
    pub position: u64,
    /// UTC clock and time-of-week fields.
    pub time: u64,
    /// Fix quality, DOP and visible-count fields.
    pub quality: u64,
    /// Satellite table.
    pub satellites: u64,
}

/// The translator's single mutable record of everything known so far.
///
/// Created once per session with all fields unknown and mutated in place by
/// [`apply`](Self::apply); the NMEA encoder only ever reads it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationState {
    /// Latitude in degrees, positive north.
    pub latitude: Option<f64>,
    /// Longitude in degrees, positive east.
    pub longitude: Option<f64>,
    /// Receiver marked the position fields usable.
    pub position_valid: bool,
    /// Altitude above mean sea level in meters.
    pub altitude: Option<f64>,
    /// Receiver marked the altitude field usable.
    pub altitude_valid: bool,
    /// Heading in degrees true.
    pub heading: Option<f64>,
    /// Receiver marked the heading field usable.
    pub heading_valid: bool,
    /// Speed over ground in cm/s.
    pub speed: Option<u16>,
    /// Receiver marked the speed field usable.
    pub speed_valid: bool,
    /// Age of the last fix in seconds.
    pub fix_age: Option<u8>,
    /// GPS time of week in milliseconds.
    pub time_of_week: Option<u32>,
    /// UTC calendar date and time, once a time message supplied one.
    pub utc: Option<NaiveDateTime>,
    /// Receiver-specific fix source code.
    pub fix_source: Option<u8>,
    /// 0 for a 3D fix, nonzero for altitude hold.
    pub altitude_hold: Option<u8>,
    /// NMEA fix quality indicator (0 = no fix, 1 = GPS fix).
    pub fix_quality: Option<u8>,
    /// Position dilution of precision.
    pub pdop: Option<f64>,
    /// Horizontal dilution of precision.
    pub hdop: Option<f64>,
    /// Vertical dilution of precision.
    pub vdop: Option<f64>,
    /// Visible satellite count reported by the constellation summary.
    pub visible_count: Option<u8>,
    /// Satellite table keyed by PRN, partial-update merged.
    pub satellites: BTreeMap<u8, Satellite>,
    /// Per-group overwrite counters.
    pub marks: UpdateMarks,
}

impl NavigationState {
    /// Creates a state with every field unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one decoded message, overwriting exactly the fields its type
    /// owns. Never fails; a message reaching this point is already valid.
    pub fn apply(&mut self, msg: &HippoMessage) {
        match msg {
            HippoMessage::FastFix(fix) => {
                self.set_position(
                    fix.flags.position_valid(),
                    fix.latitude,
                    fix.longitude,
                    fix.flags.altitude_valid(),
                    fix.altitude,
                );
                self.set_velocity(
                    fix.flags.heading_valid(),
                    fix.heading,
                    fix.flags.speed_valid(),
                    fix.speed,
                );
                self.fix_age = Some(fix.fix_age);
                self.time_of_week = Some(fix.time_of_week);
                self.marks.time += 1;
            }
            HippoMessage::GpsFix(fix) => {
                self.set_position(
                    fix.flags.position_valid(),
                    fix.latitude,
                    fix.longitude,
                    fix.flags.altitude_valid(),
                    fix.altitude,
                );
                self.set_velocity(
                    fix.flags.heading_valid(),
                    fix.heading,
                    fix.flags.speed_valid(),
                    fix.speed,
                );
                self.fix_source = Some(fix.source.source());
                self.altitude_hold = Some(fix.source.altitude_hold());
                self.fix_quality = Some(u8::from(fix.flags.position_valid()));
                self.marks.quality += 1;
            }
            HippoMessage::TimeAndConstellation(tc) => {
                self.set_utc(&tc.date_time);
                self.pdop = Some(tc.pdop);
                self.hdop = Some(tc.hdop);
                self.vdop = Some(tc.vdop);
                self.visible_count = Some(tc.visible);
                self.marks.quality += 1;
            }
            HippoMessage::TimeOnly(t) => {
                self.set_utc(&t.date_time);
                self.time_of_week = Some(t.time_of_week);
            }
            HippoMessage::ChannelMeasurement(ch) => {
                // Merge by PRN: one message reports one satellite, the rest
                // of the table keeps its last known entries.
                self.satellites.insert(
                    ch.prn,
                    Satellite {
                        prn: ch.prn,
                        channel: ch.channel,
                        visible: ch.flags.visible(),
                        tracking: ch.flags.tracking(),
                        has_tracked: ch.flags.has_tracked(),
                        meets_mask: ch.flags.meets_mask(),
                        snr: ch.snr,
                        azimuth: ch.azimuth,
                        elevation: ch.elevation,
                    },
                );
                self.marks.satellites += 1;
            }
        }
    }

    /// Satellites currently marked visible, in PRN order.
    pub fn visible_satellites(&self) -> Vec<&Satellite> {
        self.satellites.values().filter(|s| s.visible).collect()
    }

    /// Number of satellites currently being tracked.
    pub fn tracked_count(&self) -> usize {
        self.satellites.values().filter(|s| s.tracking).count()
    }

    fn set_position(&mut self, pos_valid: bool, lat: f64, lon: f64, alt_valid: bool, alt: f64) {
        self.latitude = Some(lat);
        self.longitude = Some(lon);
        self.position_valid = pos_valid;
        self.altitude = Some(alt);
        self.altitude_valid = alt_valid;
        self.marks.position += 1;
    }

    fn set_velocity(&mut self, heading_valid: bool, heading: f64, speed_valid: bool, speed: u16) {
        self.heading = Some(heading);
        self.heading_valid = heading_valid;
        self.speed = Some(speed);
        self.speed_valid = speed_valid;
    }

    fn set_utc(&mut self, t: &UtcTime) {
        let date = NaiveDate::from_ymd_opt(i32::from(t.year), u32::from(t.month), u32::from(t.day));
        let time = NaiveTime::from_hms_opt(
            u32::from(t.hour),
            u32::from(t.minute),
            u32::from(t.second),
        );
        match (date, time) {
            (Some(date), Some(time)) => {
                self.utc = Some(NaiveDateTime::new(date, time));
                self.marks.time += 1;
            }
            _ => log::debug!(
                "discarding out-of-range UTC time {}-{}-{} {}:{}:{}",
                t.year,
                t.month,
                t.day,
                t.hour,
                t.minute,
                t.second
            ),
        }
    }
}
