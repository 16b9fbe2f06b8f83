//! # Retrieval-input descriptors
//!
//! One descriptor exists per input source of the benchmark: the
//! passive-microwave reference sensor ([`PmwConfig`]), the geostationary
//! multi-channel imager ([`GeoConfig`]), the geostationary IR imager
//! ([`GeoIrConfig`]), and the ancillary-variable bundle
//! ([`AncillaryConfig`]). A descriptor knows three things:
//!
//! 1. which slice of a raw scene it selects (channels, time steps, variable
//!    names),
//! 2. how many feature rows that selection contributes, available *before*
//!    any file is opened so batches can be sized up front,
//! 3. how to load and normalize its slice of a [`Scene`] into named arrays
//!    whose leading dimension equals the declared feature count.
//!
//! Descriptors are built through [`InputConfig::parse`] from a bare source
//! name, a `{"name": ..., options...}` map, or an already-built config. The
//! registry of recognized names is the explicit `match` in
//! [`InputConfig::parse`]; unknown names and malformed options fail at parse
//! time, never at load time.
//!
//! Selection composition for the geostationary sources: time steps are
//! resolved first (either an explicit ordered index set, or the single step
//! closest to the target time), channels second, and the two leading axes
//! collapse into one feature axis in time-major order.
use camino::Utf8Path;
use hifitime::Epoch;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{ArrayD, Axis, IxDyn};
use serde::Deserialize;

use crate::definitions::{
    ReferenceSensor, ALL_INPUTS, ANCILLARY_VARIABLES, N_GEO_CHANNELS, N_GEO_IR_TIME_STEPS,
    N_GEO_TIME_STEPS,
};
use crate::scene::Scene;
use crate::sprdata_errors::SprError;
use crate::stats::Stats;
use crate::time::closest_time_step;

/// Ordered mapping output-array name → feature count.
pub type FeatureMap = IndexMap<String, usize>;

/// Ordered mapping output-array name → loaded array.
pub type ArrayMap = IndexMap<String, ArrayD<f32>>;

/// Normalization applied to observation arrays after selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Normalize {
    MinMax,
    Standardize,
}

impl std::str::FromStr for Normalize {
    type Err = SprError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minmax" => Ok(Normalize::MinMax),
            "standardize" => Ok(Normalize::Standardize),
            _ => Err(SprError::InvalidNormalization(s.to_string())),
        }
    }
}

impl TryFrom<String> for Normalize {
    type Error = SprError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Normalize an array along its leading (channel) axis.
///
/// Arguments
/// -----------------
/// * `data` – Array of shape `(channels, ...)`; NaN entries pass through the
///   transform untouched.
/// * `stats` – One statistics row per channel, or a single row broadcast
///   over all channels.
/// * `mode` – `MinMax` maps `stats.min → 0` and `stats.max → 1`,
///   `Standardize` maps to zero mean and unit deviation, `None` is the
///   identity.
/// * `nan` – When given, every NaN entry of the result is replaced by this
///   value; otherwise NaNs propagate.
///
/// Return
/// ----------
/// * The transformed array, same shape as the input.
pub fn normalize(
    data: ArrayD<f32>,
    stats: &Stats,
    mode: Option<Normalize>,
    nan: Option<f32>,
) -> Result<ArrayD<f32>, SprError> {
    let mut data = data;
    if let Some(mode) = mode {
        if data.ndim() == 0 {
            return Err(SprError::DimensionMismatch(
                "cannot normalize a zero-dimensional array".to_string(),
            ));
        }
        let n_channels = data.shape()[0];
        if stats.len() != 1 && stats.len() != n_channels {
            return Err(SprError::DimensionMismatch(format!(
                "{} statistics rows for {} channels",
                stats.len(),
                n_channels
            )));
        }
        for (ind, mut row) in data.axis_iter_mut(Axis(0)).enumerate() {
            let (min, max, mean, std_dev) = stats.row(ind);
            match mode {
                Normalize::MinMax => row.mapv_inplace(|x| (x - min) / (max - min)),
                Normalize::Standardize => row.mapv_inplace(|x| (x - mean) / std_dev),
            }
        }
    }
    Ok(substitute_nan(data, nan))
}

/// Replace NaN entries when a substitute is configured.
fn substitute_nan(mut data: ArrayD<f32>, nan: Option<f32>) -> ArrayD<f32> {
    if let Some(fill) = nan {
        data.mapv_inplace(|x| if x.is_nan() { fill } else { x });
    }
    data
}

/// Time-step selection of the geostationary sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeSelection {
    /// Collapse the time axis to the single step closest to the target time.
    Nearest,
    /// Explicit ordered time-step indices, no interpolation.
    Steps(Vec<usize>),
}

impl TimeSelection {
    /// Leading-axis rows the selection contributes.
    pub fn n_steps(&self) -> usize {
        match self {
            TimeSelection::Nearest => 1,
            TimeSelection::Steps(steps) => steps.len(),
        }
    }

    /// Resolve to concrete axis indices against a scene's time axis.
    fn resolve(&self, axis: &[Epoch], target_time: Epoch) -> Result<Vec<usize>, SprError> {
        match self {
            TimeSelection::Nearest => {
                let ind = closest_time_step(axis, target_time).ok_or_else(|| {
                    SprError::TimeDecoding("empty time axis in geostationary scene".to_string())
                })?;
                Ok(vec![ind])
            }
            TimeSelection::Steps(steps) => Ok(steps.clone()),
        }
    }

    fn from_options(
        source: &str,
        time_steps: Option<Vec<usize>>,
        nearest: bool,
        n_available: usize,
    ) -> Result<Self, SprError> {
        match (time_steps, nearest) {
            (Some(_), true) => Err(SprError::InvalidInputConfig {
                source: source.to_string(),
                reason: "'time_steps' and 'nearest' are mutually exclusive".to_string(),
            }),
            (Some(steps), false) => {
                if steps.is_empty() {
                    return Err(SprError::InvalidInputConfig {
                        source: source.to_string(),
                        reason: "'time_steps' must not be empty".to_string(),
                    });
                }
                if let Some(&bad) = steps.iter().find(|&&s| s >= n_available) {
                    return Err(SprError::InvalidInputConfig {
                        source: source.to_string(),
                        reason: format!(
                            "time step {bad} out of range for a time axis of {n_available}"
                        ),
                    });
                }
                Ok(TimeSelection::Steps(steps))
            }
            // No explicit steps: collapse to the best-aligned step.
            (None, _) => Ok(TimeSelection::Nearest),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct PmwOptions {
    channels: Option<Vec<usize>>,
    #[serde(default = "default_true")]
    include_angles: bool,
    normalize: Option<Normalize>,
    nan: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeoOptions {
    time_steps: Option<Vec<usize>>,
    channels: Option<Vec<usize>>,
    #[serde(default)]
    nearest: bool,
    normalize: Option<Normalize>,
    nan: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeoIrOptions {
    time_steps: Option<Vec<usize>>,
    #[serde(default)]
    nearest: bool,
    normalize: Option<Normalize>,
    nan: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct AncillaryOptions {
    variables: Option<Vec<String>>,
    normalize: Option<Normalize>,
    nan: Option<f32>,
}

/// Passive-microwave input (the reference sensor's observations).
#[derive(Debug, Clone)]
pub struct PmwConfig {
    pub sensor: ReferenceSensor,
    /// Selected channel indices, order preserved.
    pub channels: Vec<usize>,
    /// Whether to also load the per-channel earth-incidence angles.
    pub include_angles: bool,
    pub normalize: Option<Normalize>,
    pub nan: Option<f32>,
    pub stats: Option<Stats>,
}

impl PmwConfig {
    /// All channels of `sensor`, angles included, no normalization.
    pub fn new(sensor: ReferenceSensor) -> Self {
        PmwConfig {
            sensor,
            channels: (0..sensor.n_channels()).collect(),
            include_angles: true,
            normalize: None,
            nan: None,
            stats: None,
        }
    }

    pub fn with_channels(mut self, channels: Vec<usize>) -> Result<Self, SprError> {
        validate_indices(self.sensor.as_str(), "channel", &channels, self.sensor.n_channels())?;
        self.channels = channels;
        Ok(self)
    }

    pub fn with_include_angles(mut self, include_angles: bool) -> Self {
        self.include_angles = include_angles;
        self
    }

    pub fn with_normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = Some(normalize);
        self
    }

    pub fn with_nan(mut self, nan: f32) -> Self {
        self.nan = Some(nan);
        self
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = Some(stats);
        self
    }

    fn from_options(sensor: ReferenceSensor, options: PmwOptions) -> Result<Self, SprError> {
        let mut cfg = PmwConfig::new(sensor).with_include_angles(options.include_angles);
        if let Some(channels) = options.channels {
            cfg = cfg.with_channels(channels)?;
        }
        cfg.normalize = options.normalize;
        cfg.nan = options.nan;
        Ok(cfg)
    }
}

/// Geostationary multi-channel imager input.
#[derive(Debug, Clone)]
pub struct GeoConfig {
    pub selection: TimeSelection,
    /// Selected channel indices, order preserved.
    pub channels: Vec<usize>,
    pub normalize: Option<Normalize>,
    pub nan: Option<f32>,
    pub stats: Option<Stats>,
}

impl GeoConfig {
    /// All channels at the time step closest to the target time.
    pub fn new() -> Self {
        GeoConfig {
            selection: TimeSelection::Nearest,
            channels: (0..N_GEO_CHANNELS).collect(),
            normalize: None,
            nan: None,
            stats: None,
        }
    }

    pub fn with_time_steps(mut self, time_steps: Vec<usize>) -> Result<Self, SprError> {
        self.selection =
            TimeSelection::from_options("geo", Some(time_steps), false, N_GEO_TIME_STEPS)?;
        Ok(self)
    }

    pub fn with_channels(mut self, channels: Vec<usize>) -> Result<Self, SprError> {
        validate_indices("geo", "channel", &channels, N_GEO_CHANNELS)?;
        self.channels = channels;
        Ok(self)
    }

    pub fn with_normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = Some(normalize);
        self
    }

    pub fn with_nan(mut self, nan: f32) -> Self {
        self.nan = Some(nan);
        self
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = Some(stats);
        self
    }

    fn from_options(options: GeoOptions) -> Result<Self, SprError> {
        let mut cfg = GeoConfig::new();
        cfg.selection = TimeSelection::from_options(
            "geo",
            options.time_steps,
            options.nearest,
            N_GEO_TIME_STEPS,
        )?;
        if let Some(channels) = options.channels {
            cfg = cfg.with_channels(channels)?;
        }
        cfg.normalize = options.normalize;
        cfg.nan = options.nan;
        Ok(cfg)
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Geostationary IR imager input (single channel, dense time axis).
#[derive(Debug, Clone)]
pub struct GeoIrConfig {
    pub selection: TimeSelection,
    pub normalize: Option<Normalize>,
    pub nan: Option<f32>,
    pub stats: Option<Stats>,
}

impl GeoIrConfig {
    /// The time step closest to the target time.
    pub fn new() -> Self {
        GeoIrConfig {
            selection: TimeSelection::Nearest,
            normalize: None,
            nan: None,
            stats: None,
        }
    }

    pub fn with_time_steps(mut self, time_steps: Vec<usize>) -> Result<Self, SprError> {
        self.selection =
            TimeSelection::from_options("geo_ir", Some(time_steps), false, N_GEO_IR_TIME_STEPS)?;
        Ok(self)
    }

    pub fn with_normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = Some(normalize);
        self
    }

    pub fn with_nan(mut self, nan: f32) -> Self {
        self.nan = Some(nan);
        self
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = Some(stats);
        self
    }

    fn from_options(options: GeoIrOptions) -> Result<Self, SprError> {
        let mut cfg = GeoIrConfig::new();
        cfg.selection = TimeSelection::from_options(
            "geo_ir",
            options.time_steps,
            options.nearest,
            N_GEO_IR_TIME_STEPS,
        )?;
        cfg.normalize = options.normalize;
        cfg.nan = options.nan;
        Ok(cfg)
    }
}

impl Default for GeoIrConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Ancillary (meteorological and surface) variable bundle.
#[derive(Debug, Clone)]
pub struct AncillaryConfig {
    /// Selected variable names, order preserved.
    pub variables: Vec<String>,
    pub normalize: Option<Normalize>,
    pub nan: Option<f32>,
    pub stats: Option<Stats>,
}

impl AncillaryConfig {
    /// All ancillary variables, no normalization.
    pub fn new() -> Self {
        AncillaryConfig {
            variables: ANCILLARY_VARIABLES.iter().map(|&v| v.to_string()).collect(),
            normalize: None,
            nan: None,
            stats: None,
        }
    }

    pub fn with_variables(mut self, variables: Vec<String>) -> Result<Self, SprError> {
        if variables.is_empty() {
            return Err(SprError::InvalidInputConfig {
                source: "ancillary".to_string(),
                reason: "'variables' must not be empty".to_string(),
            });
        }
        for name in &variables {
            if !ANCILLARY_VARIABLES.contains(&name.as_str()) {
                return Err(SprError::InvalidInputConfig {
                    source: "ancillary".to_string(),
                    reason: format!(
                        "unknown variable '{name}' (available: {})",
                        ANCILLARY_VARIABLES.iter().join(", ")
                    ),
                });
            }
        }
        self.variables = variables;
        Ok(self)
    }

    pub fn with_normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = Some(normalize);
        self
    }

    pub fn with_nan(mut self, nan: f32) -> Self {
        self.nan = Some(nan);
        self
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Positions of the selected variables in the full ancillary catalog.
    fn catalog_indices(&self) -> Result<Vec<usize>, SprError> {
        self.variables
            .iter()
            .map(|name| {
                ANCILLARY_VARIABLES
                    .iter()
                    .position(|&v| v == name)
                    .ok_or_else(|| SprError::InvalidInputConfig {
                        source: "ancillary".to_string(),
                        reason: format!("unknown variable '{name}'"),
                    })
            })
            .collect()
    }

    fn from_options(options: AncillaryOptions) -> Result<Self, SprError> {
        let mut cfg = AncillaryConfig::new();
        if let Some(variables) = options.variables {
            cfg = cfg.with_variables(variables)?;
        }
        cfg.normalize = options.normalize;
        cfg.nan = options.nan;
        Ok(cfg)
    }
}

impl Default for AncillaryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A retrieval-input specification before parsing: a bare source name, a
/// `{"name": ..., options...}` map, or an already-built descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InputSpec {
    Name(String),
    Options(serde_json::Map<String, serde_json::Value>),
    #[serde(skip)]
    Config(Box<InputConfig>),
}

impl From<&str> for InputSpec {
    fn from(name: &str) -> Self {
        InputSpec::Name(name.to_string())
    }
}

impl From<String> for InputSpec {
    fn from(name: String) -> Self {
        InputSpec::Name(name)
    }
}

impl From<InputConfig> for InputSpec {
    fn from(config: InputConfig) -> Self {
        InputSpec::Config(Box::new(config))
    }
}

/// A parsed retrieval-input descriptor.
#[derive(Debug, Clone)]
pub enum InputConfig {
    Pmw(PmwConfig),
    Geo(GeoConfig),
    GeoIr(GeoIrConfig),
    Ancillary(AncillaryConfig),
}

impl InputConfig {
    /// Parse one input specification into its concrete descriptor.
    ///
    /// Source names are matched case-insensitively; unknown names fail with
    /// [`SprError::UnknownInputSource`], malformed or unknown options with a
    /// parse error. Already-built descriptors pass through unchanged.
    pub fn parse(spec: impl Into<InputSpec>) -> Result<InputConfig, SprError> {
        match spec.into() {
            InputSpec::Name(name) => Self::from_name(&name, serde_json::Map::new()),
            InputSpec::Options(mut map) => {
                let name = match map.remove("name") {
                    Some(serde_json::Value::String(name)) => name,
                    _ => {
                        return Err(SprError::InvalidInputConfig {
                            source: "<unnamed>".to_string(),
                            reason: "input map must carry a string 'name' entry".to_string(),
                        })
                    }
                };
                Self::from_name(&name, map)
            }
            InputSpec::Config(config) => Ok(*config),
        }
    }

    /// The name → constructor registry.
    fn from_name(
        name: &str,
        options: serde_json::Map<String, serde_json::Value>,
    ) -> Result<InputConfig, SprError> {
        let options = serde_json::Value::Object(options);
        match name.to_ascii_lowercase().as_str() {
            "gmi" => Ok(InputConfig::Pmw(PmwConfig::from_options(
                ReferenceSensor::Gmi,
                serde_json::from_value(options)?,
            )?)),
            "atms" => Ok(InputConfig::Pmw(PmwConfig::from_options(
                ReferenceSensor::Atms,
                serde_json::from_value(options)?,
            )?)),
            "geo" => Ok(InputConfig::Geo(GeoConfig::from_options(
                serde_json::from_value(options)?,
            )?)),
            "geo_ir" => Ok(InputConfig::GeoIr(GeoIrConfig::from_options(
                serde_json::from_value(options)?,
            )?)),
            "ancillary" => Ok(InputConfig::Ancillary(AncillaryConfig::from_options(
                serde_json::from_value(options)?,
            )?)),
            _ => Err(SprError::UnknownInputSource(name.to_string())),
        }
    }

    /// Source name the descriptor answers to.
    pub fn name(&self) -> &str {
        match self {
            InputConfig::Pmw(cfg) => cfg.sensor.as_str(),
            InputConfig::Geo(_) => "geo",
            InputConfig::GeoIr(_) => "geo_ir",
            InputConfig::Ancillary(_) => "ancillary",
        }
    }

    /// Feature counts per output array, computed without any file I/O.
    ///
    /// The leading dimension of every array [`InputConfig::load_data`]
    /// returns equals the corresponding entry.
    pub fn features(&self) -> FeatureMap {
        let mut features = FeatureMap::new();
        match self {
            InputConfig::Pmw(cfg) => {
                let n = cfg.channels.len();
                features.insert(format!("obs_{}", cfg.sensor), n);
                if cfg.include_angles {
                    features.insert(format!("eia_{}", cfg.sensor), n);
                }
            }
            InputConfig::Geo(cfg) => {
                features.insert(
                    "obs_geo".to_string(),
                    cfg.selection.n_steps() * cfg.channels.len(),
                );
            }
            InputConfig::GeoIr(cfg) => {
                features.insert("obs_geo_ir".to_string(), cfg.selection.n_steps());
            }
            InputConfig::Ancillary(cfg) => {
                features.insert("ancillary".to_string(), cfg.variables.len());
            }
        }
        features
    }

    /// Total feature rows over all output arrays.
    pub fn n_features(&self) -> usize {
        self.features().values().sum()
    }

    pub fn stats(&self) -> Option<&Stats> {
        match self {
            InputConfig::Pmw(cfg) => cfg.stats.as_ref(),
            InputConfig::Geo(cfg) => cfg.stats.as_ref(),
            InputConfig::GeoIr(cfg) => cfg.stats.as_ref(),
            InputConfig::Ancillary(cfg) => cfg.stats.as_ref(),
        }
    }

    pub fn set_stats(&mut self, stats: Stats) {
        match self {
            InputConfig::Pmw(cfg) => cfg.stats = Some(stats),
            InputConfig::Geo(cfg) => cfg.stats = Some(stats),
            InputConfig::GeoIr(cfg) => cfg.stats = Some(stats),
            InputConfig::Ancillary(cfg) => cfg.stats = Some(stats),
        }
    }

    /// Whether loading will need statistics that are not attached yet.
    pub fn needs_stats(&self) -> bool {
        let normalize = match self {
            InputConfig::Pmw(cfg) => cfg.normalize,
            InputConfig::Geo(cfg) => cfg.normalize,
            InputConfig::GeoIr(cfg) => cfg.normalize,
            InputConfig::Ancillary(cfg) => cfg.normalize,
        };
        normalize.is_some() && self.stats().is_none()
    }

    /// Load and normalize this source's slice of a scene.
    ///
    /// Arguments
    /// -----------------
    /// * `scene` – A loaded scene of this source (spatial, or tabular after
    ///   sample extraction).
    /// * `target_time` – The paired target scene's median time; resolves the
    ///   `nearest` time selection of the geostationary sources.
    ///
    /// Return
    /// ----------
    /// * Ordered map output-array name → array of shape
    ///   `(features, ...sample/spatial axes)`. Without normalization the
    ///   values stay in physical units (NaN marks invalid observations);
    ///   with normalization the values are scaled per §[`normalize`] and
    ///   NaN-substituted when a `nan` value is configured.
    pub fn load_data(&self, scene: &Scene, target_time: Epoch) -> Result<ArrayMap, SprError> {
        match self {
            InputConfig::Pmw(cfg) => load_pmw(cfg, scene),
            InputConfig::Geo(cfg) => load_geo(cfg, scene, target_time),
            InputConfig::GeoIr(cfg) => load_geo_ir(cfg, scene, target_time),
            InputConfig::Ancillary(cfg) => load_ancillary(cfg, scene),
        }
    }

    /// Open `path` and delegate to [`InputConfig::load_data`].
    pub fn load_file(&self, path: &Utf8Path, target_time: Epoch) -> Result<ArrayMap, SprError> {
        self.load_data(&Scene::open(path)?, target_time)
    }
}

/// Parse an ordered sequence of input specifications.
///
/// Order is preserved; a source requested twice is a configuration error
/// (repeated sources would double-count features and silently overwrite each
/// other in name-keyed sample maps).
pub fn parse_retrieval_inputs<I, S>(specs: I) -> Result<Vec<InputConfig>, SprError>
where
    I: IntoIterator<Item = S>,
    S: Into<InputSpec>,
{
    let mut inputs = Vec::new();
    for spec in specs {
        let config = InputConfig::parse(spec)?;
        if inputs.iter().any(|other: &InputConfig| other.name() == config.name()) {
            return Err(SprError::DuplicateInputSource(config.name().to_string()));
        }
        inputs.push(config);
    }
    Ok(inputs)
}

/// Default descriptor set: all known sources, with the passive-microwave
/// slot filled by `sensor`.
pub fn default_retrieval_inputs(sensor: ReferenceSensor) -> Result<Vec<InputConfig>, SprError> {
    parse_retrieval_inputs(ALL_INPUTS.iter().map(|&name| {
        if name == "gmi" {
            sensor.as_str()
        } else {
            name
        }
    }))
}

/// Feature counts of a parsed or unparsed input sequence.
///
/// With `stack = false` the per-array counts are returned in input order;
/// with `stack = true` they are summed into the width of the stacked input
/// tensor. Callable before any file I/O.
pub fn calculate_input_features<I, S>(specs: I, stack: bool) -> Result<InputFeatures, SprError>
where
    I: IntoIterator<Item = S>,
    S: Into<InputSpec>,
{
    let inputs = parse_retrieval_inputs(specs)?;
    let mut features = FeatureMap::new();
    for input in &inputs {
        for (name, count) in input.features() {
            features.insert(name, count);
        }
    }
    if stack {
        Ok(InputFeatures::Stacked(features.values().sum()))
    } else {
        Ok(InputFeatures::PerArray(features))
    }
}

/// Result of [`calculate_input_features`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFeatures {
    PerArray(FeatureMap),
    Stacked(usize),
}

impl InputFeatures {
    /// Total feature count in either mode.
    pub fn total(&self) -> usize {
        match self {
            InputFeatures::PerArray(map) => map.values().sum(),
            InputFeatures::Stacked(total) => *total,
        }
    }

    /// Per-array counts; `None` in stacked mode.
    pub fn per_array(&self) -> Option<&FeatureMap> {
        match self {
            InputFeatures::PerArray(map) => Some(map),
            InputFeatures::Stacked(_) => None,
        }
    }
}

fn validate_indices(
    source: &str,
    what: &str,
    indices: &[usize],
    n_available: usize,
) -> Result<(), SprError> {
    if indices.is_empty() {
        return Err(SprError::InvalidInputConfig {
            source: source.to_string(),
            reason: format!("'{what}s' must not be empty"),
        });
    }
    if let Some(&bad) = indices.iter().find(|&&ind| ind >= n_available) {
        return Err(SprError::InvalidInputConfig {
            source: source.to_string(),
            reason: format!("{what} {bad} out of range for {n_available} available"),
        });
    }
    Ok(())
}

/// Select rows along the leading axis, with a shape check against the file.
fn select_rows(
    data: &ArrayD<f32>,
    indices: &[usize],
    axis: usize,
    what: &str,
) -> Result<ArrayD<f32>, SprError> {
    let available = data.shape().get(axis).copied().unwrap_or(0);
    if let Some(&bad) = indices.iter().find(|&&ind| ind >= available) {
        return Err(SprError::DimensionMismatch(format!(
            "{what} {bad} out of range for an axis of {available}"
        )));
    }
    Ok(data.select(Axis(axis), indices))
}

fn load_pmw(cfg: &PmwConfig, scene: &Scene) -> Result<ArrayMap, SprError> {
    let mut out = ArrayMap::new();

    let obs = select_rows(
        &scene.require("observations")?.data,
        &cfg.channels,
        0,
        "channel",
    )?;
    let obs = if cfg.normalize.is_some() {
        let stats = cfg
            .stats
            .as_ref()
            .ok_or_else(|| SprError::MissingStats(cfg.sensor.to_string()))?
            .select(&cfg.channels)?;
        normalize(obs, &stats, cfg.normalize, cfg.nan)?
    } else {
        substitute_nan(obs, cfg.nan)
    };
    out.insert(format!("obs_{}", cfg.sensor), obs);

    if cfg.include_angles {
        let eia = select_rows(
            &scene.require("earth_incidence_angle")?.data,
            &cfg.channels,
            0,
            "channel",
        )?;
        // Angles stay in physical units; only the NaN policy applies.
        out.insert(format!("eia_{}", cfg.sensor), substitute_nan(eia, cfg.nan));
    }

    Ok(out)
}

fn load_geo(cfg: &GeoConfig, scene: &Scene, target_time: Epoch) -> Result<ArrayMap, SprError> {
    let time_axis = scene.time().ok_or_else(|| {
        SprError::TimeDecoding(format!("no time axis in geo scene {}", scene.path()))
    })?;
    let steps = cfg.selection.resolve(time_axis, target_time)?;

    let data = &scene.require("observations")?.data;
    let picked = select_rows(data, &steps, 0, "time step")?;
    let picked = select_rows(&picked, &cfg.channels, 1, "channel")?;

    // Collapse (time, channel) into the feature axis, time-major.
    let mut shape = vec![steps.len() * cfg.channels.len()];
    shape.extend_from_slice(&picked.shape()[2..]);
    let merged = picked
        .into_shape_with_order(IxDyn(&shape))
        .map_err(|err| SprError::DimensionMismatch(err.to_string()))?;

    let merged = if cfg.normalize.is_some() {
        let stats = cfg
            .stats
            .as_ref()
            .ok_or_else(|| SprError::MissingStats("geo".to_string()))?
            .select(&cfg.channels)?
            .tile(steps.len())?;
        normalize(merged, &stats, cfg.normalize, cfg.nan)?
    } else {
        substitute_nan(merged, cfg.nan)
    };

    let mut out = ArrayMap::new();
    out.insert("obs_geo".to_string(), merged);
    Ok(out)
}

fn load_geo_ir(cfg: &GeoIrConfig, scene: &Scene, target_time: Epoch) -> Result<ArrayMap, SprError> {
    let time_axis = scene.time().ok_or_else(|| {
        SprError::TimeDecoding(format!("no time axis in geo_ir scene {}", scene.path()))
    })?;
    let steps = cfg.selection.resolve(time_axis, target_time)?;

    let picked = select_rows(&scene.require("observations")?.data, &steps, 0, "time step")?;
    let picked = if cfg.normalize.is_some() {
        let stats = cfg
            .stats
            .as_ref()
            .ok_or_else(|| SprError::MissingStats("geo_ir".to_string()))?;
        normalize(picked, stats, cfg.normalize, cfg.nan)?
    } else {
        substitute_nan(picked, cfg.nan)
    };

    let mut out = ArrayMap::new();
    out.insert("obs_geo_ir".to_string(), picked);
    Ok(out)
}

fn load_ancillary(cfg: &AncillaryConfig, scene: &Scene) -> Result<ArrayMap, SprError> {
    let mut rows = Vec::with_capacity(cfg.variables.len());
    for name in &cfg.variables {
        rows.push(scene.require(name)?.data.view());
    }
    let stacked = ndarray::stack(Axis(0), &rows)
        .map_err(|err| SprError::DimensionMismatch(err.to_string()))?;

    let stacked = if cfg.normalize.is_some() {
        let stats = cfg
            .stats
            .as_ref()
            .ok_or_else(|| SprError::MissingStats("ancillary".to_string()))?
            .select(&cfg.catalog_indices()?)?;
        normalize(stacked, &stats, cfg.normalize, cfg.nan)?
    } else {
        substitute_nan(stacked, cfg.nan)
    };

    let mut out = ArrayMap::new();
    out.insert("ancillary".to_string(), stacked);
    Ok(out)
}
