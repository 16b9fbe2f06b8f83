//! # Scene time handling
//!
//! Two time sources exist in the benchmark archive:
//!
//! * The **file-name stamp**: every scene file is named
//!   `<source>_<YYYYmmddHHMMSS>.nc` where the stamp is the scene's median
//!   observation time. Pairing files across sources compares these stamps,
//!   which avoids opening every file during consistency checks.
//! * The **time axis** inside a file: a `time` variable with a CF-style
//!   `units` attribute (`"<unit> since <date>"`). The geostationary sources
//!   use it as the auxiliary axis for nearest-time selection.
//!
//! Both are decoded into [`hifitime::Epoch`] values at second resolution.
use std::sync::LazyLock;

use camino::Utf8Path;
use hifitime::{Duration, Epoch};
use regex::Regex;

use crate::sprdata_errors::SprError;

static FILENAME_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})\.nc$").unwrap());

static TIME_UNITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(seconds|minutes|hours|days)\s+since\s+(\d{4})-(\d{2})-(\d{2})[T ](\d{2}):(\d{2}):(\d{2})",
    )
    .unwrap()
});

/// Median observation time of a scene file, parsed from its file name.
///
/// Arguments
/// -----------------
/// * `path` – Path to a scene file named `<source>_<YYYYmmddHHMMSS>.nc`.
///
/// Return
/// ----------
/// * The stamp as an [`Epoch`] (UTC), or [`SprError::MissingTimestamp`] when
///   the file name carries no stamp.
pub fn median_time(path: &Utf8Path) -> Result<Epoch, SprError> {
    let name = path.file_name().unwrap_or_default();
    let caps = FILENAME_STAMP
        .captures(name)
        .ok_or_else(|| SprError::MissingTimestamp(path.to_path_buf()))?;
    let field = |i: usize| caps[i].parse::<u32>().unwrap();
    Epoch::maybe_from_gregorian_utc(
        field(1) as i32,
        field(2) as u8,
        field(3) as u8,
        field(4) as u8,
        field(5) as u8,
        field(6) as u8,
        0,
    )
    .map_err(|_| SprError::MissingTimestamp(path.to_path_buf()))
}

/// Format an [`Epoch`] as the `YYYYmmddHHMMSS` file-name stamp.
pub fn timestamp(time: Epoch) -> String {
    let (year, month, day, hour, minute, second, _) = time.to_gregorian_utc();
    format!("{year:04}{month:02}{day:02}{hour:02}{minute:02}{second:02}")
}

/// Decode a CF-style time axis (`values` + `"<unit> since <date>"`) into epochs.
///
/// Arguments
/// -----------------
/// * `values` – Raw offsets read from the `time` variable.
/// * `units` – The variable's `units` attribute.
///
/// Return
/// ----------
/// * One [`Epoch`] per offset, or [`SprError::TimeDecoding`] when the units
///   string is not understood.
pub fn decode_time_axis(values: &[f64], units: &str) -> Result<Vec<Epoch>, SprError> {
    let caps = TIME_UNITS
        .captures(units)
        .ok_or_else(|| SprError::TimeDecoding(format!("unsupported units '{units}'")))?;
    let seconds_per_unit = match &caps[1] {
        "seconds" => 1.0,
        "minutes" => 60.0,
        "hours" => 3600.0,
        "days" => 86400.0,
        _ => unreachable!(),
    };
    let field = |i: usize| caps[i].parse::<u32>().unwrap();
    let base = Epoch::maybe_from_gregorian_utc(
        field(2) as i32,
        field(3) as u8,
        field(4) as u8,
        field(5) as u8,
        field(6) as u8,
        field(7) as u8,
        0,
    )
    .map_err(|_| SprError::TimeDecoding(format!("invalid reference date in '{units}'")))?;
    Ok(values
        .iter()
        .map(|offset| base + Duration::from_seconds(offset * seconds_per_unit))
        .collect())
}

/// Index of the axis entry closest to `reference`, ties broken by the first
/// occurrence.
pub fn closest_time_step(axis: &[Epoch], reference: Epoch) -> Option<usize> {
    let mut best: Option<(usize, Duration)> = None;
    for (ind, time) in axis.iter().enumerate() {
        let dist = (*time - reference).abs();
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((ind, dist)),
        }
    }
    best.map(|(ind, _)| ind)
}
