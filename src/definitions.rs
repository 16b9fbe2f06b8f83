//! # Shared vocabularies of the SPR benchmark
//!
//! Closed enumerations for the fixed parameter sets of the benchmark dataset
//! (reference sensor, viewing geometry, data split, size subset, evaluation
//! domain) together with the per-source axis sizes and the ancillary-variable
//! catalog. All enums parse case-insensitively from their on-disk spelling and
//! reject anything else with a descriptive [`SprError`].
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::sprdata_errors::SprError;

/// Names of the retrieval-input sources loaded when no explicit list is given.
///
/// The passive-microwave entry is substituted with the configured reference
/// sensor by the dataset adapters.
pub const ALL_INPUTS: [&str; 4] = ["gmi", "geo", "geo_ir", "ancillary"];

/// Ancillary (meteorological and surface) variables available per scene.
pub const ANCILLARY_VARIABLES: [&str; 15] = [
    "wet_bulb_temperature",
    "two_meter_temperature",
    "lapse_rate",
    "total_column_water_vapor",
    "surface_temperature",
    "moisture_convergence",
    "leaf_area_index",
    "snow_depth",
    "orographic_wind",
    "10m_wind",
    "land_fraction",
    "ice_fraction",
    "quality_flag",
    "sunglint_angle",
    "airlifting_index",
];

/// Number of GMI channels in the benchmark files.
pub const N_GMI_CHANNELS: usize = 13;

/// Number of ATMS channels in the benchmark files.
pub const N_ATMS_CHANNELS: usize = 9;

/// Number of geostationary imager channels.
pub const N_GEO_CHANNELS: usize = 16;

/// Length of the geostationary imager time axis.
pub const N_GEO_TIME_STEPS: usize = 8;

/// Length of the geostationary IR time axis (half-hourly steps).
pub const N_GEO_IR_TIME_STEPS: usize = 16;

/// The passive-microwave instrument defining the benchmark's primary
/// observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ReferenceSensor {
    Gmi,
    Atms,
}

impl ReferenceSensor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceSensor::Gmi => "gmi",
            ReferenceSensor::Atms => "atms",
        }
    }

    /// Number of channels the sensor's observation files carry.
    pub fn n_channels(&self) -> usize {
        match self {
            ReferenceSensor::Gmi => N_GMI_CHANNELS,
            ReferenceSensor::Atms => N_ATMS_CHANNELS,
        }
    }
}

impl FromStr for ReferenceSensor {
    type Err = SprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gmi" => Ok(ReferenceSensor::Gmi),
            "atms" => Ok(ReferenceSensor::Atms),
            _ => Err(SprError::InvalidReferenceSensor(s.to_string())),
        }
    }
}

impl TryFrom<String> for ReferenceSensor {
    type Error = SprError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for ReferenceSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether observations are resampled onto a regular grid or kept in native
/// sensor-swath form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Geometry {
    Gridded,
    OnSwath,
}

impl Geometry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Geometry::Gridded => "gridded",
            Geometry::OnSwath => "on_swath",
        }
    }
}

impl FromStr for Geometry {
    type Err = SprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gridded" => Ok(Geometry::Gridded),
            "on_swath" => Ok(Geometry::OnSwath),
            _ => Err(SprError::InvalidGeometry(s.to_string())),
        }
    }
}

impl TryFrom<String> for Geometry {
    type Error = SprError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Benchmark data splits.
///
/// The dataset adapters accept the first three; `Evaluation` exists for file
/// resolution over the per-domain evaluation scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Split {
    Training,
    Validation,
    Testing,
    Evaluation,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Training => "training",
            Split::Validation => "validation",
            Split::Testing => "testing",
            Split::Evaluation => "evaluation",
        }
    }
}

impl FromStr for Split {
    type Err = SprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "training" => Ok(Split::Training),
            "validation" => Ok(Split::Validation),
            "testing" => Ok(Split::Testing),
            "evaluation" => Ok(Split::Evaluation),
            _ => Err(SprError::InvalidSplit(s.to_string())),
        }
    }
}

impl TryFrom<String> for Split {
    type Error = SprError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size subsets of the training data.
///
/// Each subset selects a deterministic prefix of the time-sorted scene list,
/// so smaller subsets nest inside larger ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Subset {
    Xs,
    S,
    M,
    L,
    Xl,
}

impl Subset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subset::Xs => "xs",
            Subset::S => "s",
            Subset::M => "m",
            Subset::L => "l",
            Subset::Xl => "xl",
        }
    }

    /// Fraction of the full scene list the subset keeps.
    pub fn fraction(&self) -> f64 {
        match self {
            Subset::Xs => 1.0 / 16.0,
            Subset::S => 1.0 / 8.0,
            Subset::M => 1.0 / 4.0,
            Subset::L => 1.0 / 2.0,
            Subset::Xl => 1.0,
        }
    }

    /// Number of files the subset keeps out of `n_files`.
    ///
    /// At least one file is kept as long as the full list is non-empty.
    pub fn n_files(&self, n_files: usize) -> usize {
        if n_files == 0 {
            return 0;
        }
        ((n_files as f64 * self.fraction()).ceil() as usize).clamp(1, n_files)
    }
}

impl FromStr for Subset {
    type Err = SprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xs" => Ok(Subset::Xs),
            "s" => Ok(Subset::S),
            "m" => Ok(Subset::M),
            "l" => Ok(Subset::L),
            "xl" => Ok(Subset::Xl),
            _ => Err(SprError::InvalidSubset(s.to_string())),
        }
    }
}

impl TryFrom<String> for Subset {
    type Error = SprError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regional domains of the evaluation split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Domain {
    Austria,
    Conus,
    Korea,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Austria => "austria",
            Domain::Conus => "conus",
            Domain::Korea => "korea",
        }
    }
}

impl FromStr for Domain {
    type Err = SprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "austria" => Ok(Domain::Austria),
            "conus" => Ok(Domain::Conus),
            "korea" => Ok(Domain::Korea),
            _ => Err(SprError::InvalidDomain(s.to_string())),
        }
    }
}

impl TryFrom<String> for Domain {
    type Error = SprError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
