//! # Dataset adapters
//!
//! Two adapters expose the benchmark as indexable `(input, target)` samples:
//!
//! * [`SprTabular`] – every valid sample of a split loaded into memory at
//!   construction; optional in-dataset batching and per-epoch reshuffling.
//! * [`SprSpatial`] – file-backed spatial scenes, loaded independently per
//!   access, with optional flip augmentation.
//!
//! [`Tensors`] is the shared sample container: a single stacked array, or an
//! ordered name → array map, or a list of either. [`apply`] maps an array
//! transform over every leaf of such a container.
use indexmap::IndexMap;
use ndarray::{ArrayD, Axis};

use crate::sprdata_errors::SprError;

pub mod spatial;
pub mod tabular;

pub use spatial::{SprSpatial, SprSpatialBuilder};
pub use tabular::{SprTabular, SprTabularBuilder};

/// A container of sample tensors.
///
/// The container shape is closed: every case an adapter can produce is a
/// variant here, so a transform applied through [`apply`] can never meet an
/// unsupported payload.
#[derive(Debug, Clone)]
pub enum Tensors {
    Array(ArrayD<f32>),
    Map(IndexMap<String, Tensors>),
    List(Vec<Tensors>),
}

impl Tensors {
    /// The contained array, when the container is a single array.
    pub fn as_array(&self) -> Option<&ArrayD<f32>> {
        match self {
            Tensors::Array(array) => Some(array),
            _ => None,
        }
    }

    /// The contained name → tensor map, when the container is a map.
    pub fn as_map(&self) -> Option<&IndexMap<String, Tensors>> {
        match self {
            Tensors::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<ArrayD<f32>> for Tensors {
    fn from(array: ArrayD<f32>) -> Self {
        Tensors::Array(array)
    }
}

impl From<IndexMap<String, ArrayD<f32>>> for Tensors {
    fn from(map: IndexMap<String, ArrayD<f32>>) -> Self {
        Tensors::Map(map.into_iter().map(|(k, v)| (k, Tensors::Array(v))).collect())
    }
}

/// Apply an array transform to every leaf of a tensor container.
pub fn apply<F>(tensors: Tensors, transform: &F) -> Tensors
where
    F: Fn(ArrayD<f32>) -> ArrayD<f32>,
{
    match tensors {
        Tensors::Array(array) => Tensors::Array(transform(array)),
        Tensors::Map(map) => Tensors::Map(
            map.into_iter()
                .map(|(name, value)| (name, apply(value, transform)))
                .collect(),
        ),
        Tensors::List(items) => Tensors::List(
            items
                .into_iter()
                .map(|value| apply(value, transform))
                .collect(),
        ),
    }
}

/// Flip an array along its trailing spatial axes.
///
/// `horizontal` inverts the second-to-last axis, `vertical` the last; axes
/// the array does not have are skipped.
pub(crate) fn flip(mut array: ArrayD<f32>, horizontal: bool, vertical: bool) -> ArrayD<f32> {
    let ndim = array.ndim();
    if horizontal && ndim >= 2 {
        array.invert_axis(Axis(ndim - 2));
    }
    if vertical && ndim >= 1 {
        array.invert_axis(Axis(ndim - 1));
    }
    array
}

/// `"target"` plus the requested input sources, in input order.
pub(crate) fn source_names(inputs: &[crate::input::InputConfig]) -> Vec<String> {
    let mut names = vec!["target".to_string()];
    names.extend(inputs.iter().map(|input| input.name().to_string()));
    names
}

/// Load statistics files for every input that requests normalization but
/// carries no statistics handle yet.
pub(crate) fn attach_stats(
    store: &crate::data::DataStore,
    geometry: crate::definitions::Geometry,
    inputs: &mut [crate::input::InputConfig],
) -> Result<(), SprError> {
    for input in inputs.iter_mut() {
        if input.needs_stats() {
            let path = store.stats_file(geometry, input.name());
            if !path.is_file() {
                return Err(SprError::MissingStats(input.name().to_string()));
            }
            input.set_stats(crate::stats::Stats::from_file(&path)?);
        }
    }
    Ok(())
}

/// Concatenate the arrays of a name → array map along `axis`, in map order.
pub(crate) fn stack_arrays(
    arrays: &IndexMap<String, ArrayD<f32>>,
    axis: usize,
) -> Result<ArrayD<f32>, SprError> {
    let views: Vec<_> = arrays.values().map(|array| array.view()).collect();
    ndarray::concatenate(Axis(axis), &views)
        .map_err(|err| SprError::DimensionMismatch(err.to_string()))
}
