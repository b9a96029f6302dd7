//! Conversions from raw protocol values to display values.

use std::fmt;

/// Raw volumes below this are shown as silence.
pub const MIN_AUDIBLE_VOLUME: f64 = 0.000_000_029_802_32;

/// Color shown for tracks that have no custom color.
pub const DEFAULT_COLOR: &str = "#9DA5A5";

const FLAG_FOLDER: i64 = 1;
const FLAG_MUTE: i64 = 8;
const FLAG_SOLO: i64 = 16;
const FLAG_RECORD_ARM: i64 = 64;

/// `0` is -inf dB and `1` is 0 dB.
pub fn volume_to_string(volume: f64) -> String {
    if !(volume >= MIN_AUDIBLE_VOLUME) {
        return "-inf dB".to_string();
    }
    format!("{:.2} dB", 20.0 * volume.log10())
}

pub fn pan_to_string(pan: f64) -> String {
    if pan.abs() < 0.001 {
        "center".to_string()
    } else if pan > 0.0 {
        format!("{}%R", (pan * 100.0).round())
    } else {
        format!("{}%L", (pan * -100.0).round())
    }
}

/// Bits of the combined flags field on `TRACK` rows.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackFlags {
    pub folder: bool,
    pub muted: bool,
    pub soloed: bool,
    pub record_armed: bool,
}

impl TrackFlags {
    pub fn from_bits(bits: i64) -> TrackFlags {
        TrackFlags {
            folder: bits & FLAG_FOLDER != 0,
            muted: bits & FLAG_MUTE != 0,
            soloed: bits & FLAG_SOLO != 0,
            record_armed: bits & FLAG_RECORD_ARM != 0,
        }
    }
}

/// Send rows only carry a mute bit.
pub fn send_muted(bits: i64) -> bool {
    bits & FLAG_MUTE != 0
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Color {
    Default,
    Rgb(u32),
}

impl Color {
    /// `0` and negative values mean the track uses the default color. The remote side may set
    /// a high "custom color" bit that is not part of the RGB value.
    pub fn from_raw(raw: i64) -> Color {
        if raw > 0 {
            Color::Rgb((raw & 0xFF_FFFF) as u32)
        } else {
            Color::Default
        }
    }

    pub fn from_field(field: Option<&str>) -> Color {
        field
            .and_then(|f| f.trim().parse::<i64>().ok())
            .map(Color::from_raw)
            .unwrap_or(Color::Default)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::Default
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Color::Default => f.write_str(DEFAULT_COLOR),
            Color::Rgb(rgb) => write!(f, "#{:06x}", rgb),
        }
    }
}
