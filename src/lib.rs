//! # sprdata: SPR benchmark data access
//!
//! Reproducible access to the SPR satellite-precipitation-retrieval
//! benchmark dataset: per-source file resolution and download, median-time
//! alignment across sources, valid-sample extraction, normalization, and
//! assembly into fixed-shape `ndarray` tensors paired with a precipitation
//! target.
//!
//! ## Usage example
//!
//! ```no_run
//! use sprdata::definitions::{Geometry, ReferenceSensor, Split};
//! use sprdata::dataset::SprTabular;
//! use sprdata::input::calculate_input_features;
//!
//! # fn run() -> Result<(), sprdata::sprdata_errors::SprError> {
//! // Size the model input before touching any file.
//! let inputs = ["gmi", "ancillary"];
//! let n_features = calculate_input_features(inputs, true)?.total();
//!
//! // Load the training split into memory, batched and shuffled.
//! let mut dataset = SprTabular::builder(
//!     ReferenceSensor::Gmi,
//!     Geometry::Gridded,
//!     Split::Training,
//! )
//! .retrieval_input(inputs)
//! .batch_size(256)
//! .stack(true)
//! .build()?;
//!
//! let (input, target) = dataset.get(0)?;
//! assert_eq!(input.as_array().unwrap().shape()[1], n_features);
//! assert_eq!(target.shape()[0], 256);
//! # Ok(()) }
//! ```

pub mod data;
pub mod dataset;
pub mod definitions;
pub mod input;
pub mod scene;
pub mod sprdata_errors;
pub mod stats;
pub mod target;
pub mod time;

pub use data::DataStore;
pub use dataset::{SprSpatial, SprTabular, Tensors};
pub use definitions::{Domain, Geometry, ReferenceSensor, Split, Subset};
pub use input::{calculate_input_features, parse_retrieval_inputs, InputConfig, InputSpec};
pub use sprdata_errors::SprError;
pub use target::TargetConfig;
