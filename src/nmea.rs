//! NMEA 0183 sentence rendering from the navigation state.
//!
//! Every builder reads the current [`NavigationState`] and never fails:
//! fields still unknown render as empty (two adjacent commas), never as zero
//! or placeholder text, so downstream consumers can tell missing data apart
//! from measured zeros. Sentences are wrapped as `$body*HH\r\n` where `HH`
//! is the XOR of all body bytes in uppercase hex.

use crate::hippo::HippoMessage;
use crate::state::NavigationState;

/// Talker id prefixed to every sentence type.
pub const TALKER: &str = "GP";

/// cm/s to knots.
const CMS_TO_KNOTS: f64 = 0.019_438_44;
/// cm/s to km/h.
const CMS_TO_KMH: f64 = 0.036;

/// XOR checksum over the sentence body (the bytes between `$` and `*`).
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

fn wrap(kind: &str, fields: &[String]) -> String {
    let body = format!("{}{},{}", TALKER, kind, fields.join(","));
    format!("${}*{:02X}\r\n", body, checksum(&body))
}

/// `hhmmss` from the UTC clock, falling back to `hhmmss.sss` derived from
/// the GPS time of week, or empty if neither has been seen.
fn time_of_day(state: &NavigationState) -> String {
    if let Some(utc) = state.utc {
        return utc.format("%H%M%S").to_string();
    }
    match state.time_of_week {
        Some(tow) => {
            let ms = tow % 1000;
            let secs = tow / 1000;
            format!(
                "{:02}{:02}{:02}.{:03}",
                secs / 3600 % 24,
                secs / 60 % 60,
                secs % 60,
                ms
            )
        }
        None => String::new(),
    }
}

/// `ddmm.mmm` style latitude with its hemisphere letter, or empty fields.
fn latitude_fields(state: &NavigationState) -> (String, String) {
    match state.latitude {
        Some(lat) if state.position_valid => {
            let deg = lat.abs().trunc();
            let min = (lat.abs() - deg) * 60.0;
            (
                format!("{:02}{:06.3}", deg as u32, min),
                if lat >= 0.0 { "N" } else { "S" }.to_string(),
            )
        }
        _ => (String::new(), String::new()),
    }
}

/// `dddmm.mmm` style longitude with its hemisphere letter, or empty fields.
fn longitude_fields(state: &NavigationState) -> (String, String) {
    match state.longitude {
        Some(lon) if state.position_valid => {
            let deg = lon.abs().trunc();
            let min = (lon.abs() - deg) * 60.0;
            (
                format!("{:03}{:06.3}", deg as u32, min),
                if lon >= 0.0 { "E" } else { "W" }.to_string(),
            )
        }
        _ => (String::new(), String::new()),
    }
}

fn speed_knots(state: &NavigationState) -> String {
    match state.speed {
        Some(speed) if state.speed_valid => format!("{:.1}", f64::from(speed) * CMS_TO_KNOTS),
        _ => String::new(),
    }
}

fn course(state: &NavigationState) -> String {
    match state.heading {
        Some(heading) if state.heading_valid => format!("{:.1}", heading),
        _ => String::new(),
    }
}

fn dop(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_default()
}

/// RMC, recommended minimum specific GNSS data.
pub fn rmc(state: &NavigationState) -> String {
    let (lat, ns) = latitude_fields(state);
    let (lon, ew) = longitude_fields(state);
    let date = state
        .utc
        .map(|utc| utc.format("%d%m%y").to_string())
        .unwrap_or_default();
    wrap(
        "RMC",
        &[
            time_of_day(state),
            if state.position_valid { "A" } else { "V" }.to_string(),
            lat,
            ns,
            lon,
            ew,
            speed_knots(state),
            course(state),
            date,
            String::new(), // magnetic variation
            String::new(),
            if state.position_valid { "A" } else { "N" }.to_string(),
        ],
    )
}

/// VTG, track made good and ground speed.
pub fn vtg(state: &NavigationState) -> String {
    let kmh = match state.speed {
        Some(speed) if state.speed_valid => format!("{:.1}", f64::from(speed) * CMS_TO_KMH),
        _ => String::new(),
    };
    wrap(
        "VTG",
        &[
            course(state),
            "T".to_string(),
            String::new(), // magnetic course
            "M".to_string(),
            speed_knots(state),
            "N".to_string(),
            kmh,
            "K".to_string(),
            if state.speed_valid { "A" } else { "N" }.to_string(),
        ],
    )
}

/// GSA, DOP and active satellites.
pub fn gsa(state: &NavigationState) -> String {
    let fix_type = match state.altitude_hold {
        None => String::new(),
        Some(0) => "3".to_string(),
        Some(_) => "2".to_string(),
    };
    let mut fields = vec!["A".to_string(), fix_type];
    let tracked: Vec<u8> = state
        .satellites
        .values()
        .filter(|s| s.tracking)
        .map(|s| s.prn)
        .take(12)
        .collect();
    for slot in 0..12 {
        fields.push(
            tracked
                .get(slot)
                .map(|prn| format!("{:02}", prn))
                .unwrap_or_default(),
        );
    }
    fields.push(dop(state.pdop));
    fields.push(dop(state.hdop));
    fields.push(dop(state.vdop));
    wrap("GSA", &fields)
}

/// GGA, global positioning system fix data.
pub fn gga(state: &NavigationState) -> String {
    let (lat, ns) = latitude_fields(state);
    let (lon, ew) = longitude_fields(state);
    let in_use = if state.satellites.is_empty() {
        String::new()
    } else {
        format!("{:02}", state.tracked_count())
    };
    let altitude = match state.altitude {
        Some(alt) if state.altitude_valid => format!("{:.1}", alt),
        _ => String::new(),
    };
    wrap(
        "GGA",
        &[
            time_of_day(state),
            lat,
            ns,
            lon,
            ew,
            state
                .fix_quality
                .map(|q| q.to_string())
                .unwrap_or_default(),
            in_use,
            dop(state.hdop),
            altitude,
            "M".to_string(),
            String::new(), // geoidal separation, not carried by HIPPO
            "M".to_string(),
            String::new(), // differential age
            String::new(), // differential station id
        ],
    )
}

/// ZDA, time and date.
pub fn zda(state: &NavigationState) -> String {
    let (time, day, month, year) = match state.utc {
        Some(utc) => (
            utc.format("%H%M%S").to_string(),
            utc.format("%d").to_string(),
            utc.format("%m").to_string(),
            utc.format("%Y").to_string(),
        ),
        None => Default::default(),
    };
    wrap(
        "ZDA",
        &[
            time,
            day,
            month,
            year,
            String::new(), // local zone hours
            String::new(), // local zone minutes
        ],
    )
}

/// GSV, satellites in view; one sentence per up to four satellites.
///
/// Returns no sentences at all while the satellite table holds no visible
/// entries. The SNR field is only populated for satellites the receiver is
/// actively tracking.
pub fn gsv(state: &NavigationState) -> Vec<String> {
    let visible = state.visible_satellites();
    if visible.is_empty() {
        return Vec::new();
    }
    let total = visible.len().div_ceil(4);
    visible
        .chunks(4)
        .enumerate()
        .map(|(index, chunk)| {
            let mut fields = vec![
                total.to_string(),
                (index + 1).to_string(),
                format!("{:02}", visible.len()),
            ];
            for sat in chunk {
                fields.push(format!("{:02}", sat.prn));
                fields.push(format!("{:02}", sat.elevation));
                fields.push(format!("{:03}", sat.azimuth));
                fields.push(if sat.tracking {
                    format!("{:02}", sat.snr)
                } else {
                    String::new()
                });
            }
            wrap("GSV", &fields)
        })
        .collect()
}

/// Renders the fixed sentence set a decoded message triggers, in the order
/// the protocol mapping defines.
pub fn encode_trigger(msg: &HippoMessage, state: &NavigationState) -> Vec<String> {
    match msg {
        HippoMessage::FastFix(_) => vec![rmc(state), vtg(state)],
        HippoMessage::GpsFix(_) => vec![gsa(state), gga(state)],
        HippoMessage::TimeAndConstellation(_) => vec![zda(state), gsa(state)],
        HippoMessage::TimeOnly(_) => vec![zda(state)],
        HippoMessage::ChannelMeasurement(_) => gsv(state),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hippo::{ChannelFlags, ChannelHealth, ChannelMeasurement, FastFix, FixFlags};
    use crate::state::NavigationState;
    use regex::Regex;

    /// Splits a wrapped sentence and verifies its checksum trailer.
    fn fields_of(sentence: &str) -> Vec<String> {
        let re = Regex::new(r"^\$(GP[A-Z]{3}),(.*)\*([0-9A-F]{2})\r\n$").unwrap();
        let caps = re.captures(sentence).expect("well-formed sentence");
        let body = format!("{},{}", &caps[1], &caps[2]);
        assert_eq!(
            u8::from_str_radix(&caps[3], 16).unwrap(),
            checksum(&body),
            "checksum mismatch in {sentence:?}"
        );
        caps[2].split(',').map(str::to_string).collect()
    }

    fn fixed_state() -> NavigationState {
        let mut state = NavigationState::new();
        state.apply(&HippoMessage::FastFix(FastFix {
            flags: FixFlags::from_bits(0x0F),
            fix_age: 1,
            time_of_week: 45_296_789,
            latitude: 60.1699,
            longitude: 24.9384,
            altitude: 25.0,
            heading: 90.0,
            speed: 500,
        }));
        state
    }

    fn sat(prn: u8, flags: u8, snr: u8) -> HippoMessage {
        HippoMessage::ChannelMeasurement(ChannelMeasurement {
            channel: prn % 12,
            prn,
            flags: ChannelFlags::from_bits(flags),
            snr,
            azimuth: 100,
            elevation: 45,
            health: ChannelHealth::from_bits(0),
        })
    }

    #[test]
    fn rmc_renders_position_and_speed() {
        let fields = fields_of(&rmc(&fixed_state()));
        assert_eq!(
            fields,
            vec![
                "123456.789",
                "A",
                "6010.194",
                "N",
                "02456.304",
                "E",
                "9.7",
                "90.0",
                "", // date unknown until a time message arrives
                "",
                "",
                "A",
            ]
        );
    }

    #[test]
    fn rmc_empty_before_any_fix() {
        let fields = fields_of(&rmc(&NavigationState::new()));
        assert_eq!(
            fields,
            vec!["", "V", "", "", "", "", "", "", "", "", "", "N"]
        );
    }

    #[test]
    fn vtg_converts_both_speed_units() {
        let fields = fields_of(&vtg(&fixed_state()));
        assert_eq!(
            fields,
            vec!["90.0", "T", "", "M", "9.7", "N", "18.0", "K", "A"]
        );
    }

    #[test]
    fn gga_renders_empty_dop_before_constellation_summary() {
        let state = fixed_state();
        let fields = fields_of(&gga(&state));
        // hdop (index 7) must be empty, not zero.
        assert_eq!(fields[7], "");
        assert_eq!(fields[8], "25.0");
        assert_eq!(fields[9], "M");
    }

    #[test]
    fn gsa_pads_to_twelve_satellite_slots() {
        let mut state = NavigationState::new();
        state.apply(&sat(3, 0x15, 30));
        state.apply(&sat(17, 0x15, 44));
        let fields = fields_of(&gsa(&state));
        assert_eq!(fields.len(), 17);
        assert_eq!(fields[0], "A");
        assert_eq!(fields[1], ""); // fix type unknown before a GPS fix
        assert_eq!(fields[2..4].to_vec(), vec!["03", "17"]);
        assert!(fields[4..14].iter().all(String::is_empty));
        assert!(fields[14..17].iter().all(String::is_empty)); // DOPs unknown
    }

    #[test]
    fn zda_before_clock_is_all_empty() {
        let fields = fields_of(&zda(&NavigationState::new()));
        assert_eq!(fields, vec![""; 6]);
    }

    #[test]
    fn gsv_chunks_visible_satellites() {
        let mut state = NavigationState::new();
        for prn in [2u8, 5, 9, 12, 25, 29] {
            state.apply(&sat(prn, 0x15, 30 + prn));
        }
        state.apply(&sat(31, 0x01, 0)); // visible but not tracking
        let sentences = gsv(&state);
        assert_eq!(sentences.len(), 2);
        let first = fields_of(&sentences[0]);
        let second = fields_of(&sentences[1]);
        assert_eq!(first[..3].to_vec(), vec!["2", "1", "07"]);
        assert_eq!(second[..3].to_vec(), vec!["2", "2", "07"]);
        assert_eq!(first[3..7].to_vec(), vec!["02", "45", "100", "32"]);
        // Second sentence carries the remaining three satellites.
        assert_eq!(second.len(), 3 + 3 * 4);
        // The untracked satellite reports no SNR.
        assert_eq!(second[second.len() - 1], "");
    }

    #[test]
    fn gsv_silent_without_satellites() {
        assert!(gsv(&NavigationState::new()).is_empty());
    }

    #[test]
    fn checksum_matches_nmea_reference() {
        // Worked example: XOR over "GPZDA,,,,,,".
        let body = "GPZDA,,,,,,";
        let expected = body.bytes().fold(0u8, |a, b| a ^ b);
        assert_eq!(checksum(body), expected);
        assert!(zda(&NavigationState::new()).contains(&format!("*{:02X}", expected)));
    }
}
