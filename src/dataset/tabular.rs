//! # Tabular dataset adapter
//!
//! [`SprTabular`] loads **every valid sample of a split into memory at
//! construction**: each target scene contributes the samples its validity
//! mask accepts, each requested input source contributes the matching
//! feature columns, and everything is concatenated into one in-memory table.
//! Access then only permutes and slices indices, so per-sample cost is
//! negligible compared to the file-backed spatial adapter.
//!
//! Pairing between a target scene and its input scenes is verified through
//! the median-time stamp of the file names; a mismatch means the local
//! archive is incomplete or corrupted and construction fails.
//!
//! The sample permutation is owned by the dataset and regenerated whenever
//! index 0 is fetched with shuffling enabled, which marks the start of a new
//! pass. `get` takes `&mut self` for exactly this reason: permutation state
//! is confined to a single thread.
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use log::info;
use ndarray::{Array1, Array2, ArrayD, Axis, Ix2, IxDyn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::DataStore;
use crate::definitions::{Geometry, ReferenceSensor, Split, Subset};
use crate::input::{default_retrieval_inputs, parse_retrieval_inputs, InputConfig, InputSpec};
use crate::scene::Scene;
use crate::sprdata_errors::SprError;
use crate::target::TargetConfig;
use crate::time::median_time;

use super::{attach_stats, source_names, stack_arrays, Tensors};

/// Seed of the shuffling generator; fixed so sample order is reproducible
/// across processes.
const SHUFFLE_SEED: u64 = 42;

/// Builder for [`SprTabular`].
#[derive(Debug)]
pub struct SprTabularBuilder {
    reference_sensor: ReferenceSensor,
    geometry: Geometry,
    split: Split,
    subset: Subset,
    batch_size: Option<usize>,
    shuffle: bool,
    retrieval_input: Option<Vec<InputSpec>>,
    target_config: Option<TargetConfig>,
    stack: bool,
    subsample: Option<f64>,
    data_path: Option<Utf8PathBuf>,
    download: bool,
}

impl SprTabularBuilder {
    pub fn new(reference_sensor: ReferenceSensor, geometry: Geometry, split: Split) -> Self {
        SprTabularBuilder {
            reference_sensor,
            geometry,
            split,
            subset: Subset::Xl,
            batch_size: None,
            shuffle: true,
            retrieval_input: None,
            target_config: None,
            stack: false,
            subsample: None,
            data_path: None,
            download: true,
        }
    }

    pub fn subset(mut self, subset: Subset) -> Self {
        self.subset = subset;
        self
    }

    /// Return batches of this many samples instead of single samples.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Retrieval inputs to load; defaults to all known sources.
    pub fn retrieval_input<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<InputSpec>,
    {
        self.retrieval_input = Some(specs.into_iter().map(Into::into).collect());
        self
    }

    pub fn target_config(mut self, target_config: TargetConfig) -> Self {
        self.target_config = Some(target_config);
        self
    }

    /// Concatenate all input arrays along the feature axis.
    pub fn stack(mut self, stack: bool) -> Self {
        self.stack = stack;
        self
    }

    /// Fraction of the dataset served per pass.
    pub fn subsample(mut self, subsample: f64) -> Self {
        self.subsample = Some(subsample);
        self
    }

    pub fn data_path(mut self, data_path: Utf8PathBuf) -> Self {
        self.data_path = Some(data_path);
        self
    }

    /// Whether to download missing files at construction (default: yes).
    pub fn download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    /// Resolve files, verify pairing, and load the split into memory.
    pub fn build(self) -> Result<SprTabular, SprError> {
        if self.split == Split::Evaluation {
            return Err(SprError::InvalidSplit(
                "evaluation (dataset adapters serve training/validation/testing)".to_string(),
            ));
        }
        if let Some(fraction) = self.subsample {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(SprError::InvalidInputConfig {
                    source: "subsample".to_string(),
                    reason: format!("fraction {fraction} outside (0, 1]"),
                });
            }
        }

        let store = DataStore::new(self.data_path)?;
        let mut inputs = match self.retrieval_input {
            Some(specs) => parse_retrieval_inputs(specs)?,
            None => default_retrieval_inputs(self.reference_sensor)?,
        };
        let target_config = self.target_config.unwrap_or_default();

        #[cfg(feature = "download")]
        if self.download {
            for source in source_names(&inputs) {
                store.download_missing(
                    self.reference_sensor,
                    self.geometry,
                    self.split,
                    self.subset,
                    None,
                    &source,
                    true,
                )?;
            }
        }
        #[cfg(not(feature = "download"))]
        let _ = self.download;

        attach_stats(&store, self.geometry, &mut inputs)?;

        let names = source_names(&inputs);
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let files = store.get_local_files(
            self.reference_sensor,
            self.geometry,
            self.split,
            self.subset,
            None,
            &name_refs,
        )?;

        let target_files = &files["target"];
        if target_files.is_empty() {
            return Err(SprError::NoTargetFiles);
        }
        for input in &inputs {
            if files[input.name()].len() != target_files.len() {
                return Err(SprError::InconsistentScenes(input.name().to_string()));
            }
        }

        let mut target_values: Vec<f32> = Vec::new();
        let mut input_chunks: IndexMap<String, Vec<ArrayD<f32>>> = IndexMap::new();

        for (ind, target_file) in target_files.iter().enumerate() {
            let target_scene = Scene::open(target_file)?;
            let mask = target_config.get_mask(&target_scene)?;
            let extracted = target_scene.extract_samples(&mask)?;
            target_values.extend(target_config.load_reference_precip(&extracted)?.iter());

            let ref_time = median_time(target_file)?;
            for input in &inputs {
                let input_file = &files[input.name()][ind];
                if median_time(input_file)? != ref_time {
                    return Err(SprError::TimestampMismatch {
                        input_file: input_file.clone(),
                        target_file: target_file.clone(),
                    });
                }
                let input_scene = Scene::open(input_file)?.extract_samples(&mask)?;
                for (name, array) in input.load_data(&input_scene, ref_time)? {
                    input_chunks.entry(name).or_default().push(array);
                }
            }
        }

        let mut input_data = IndexMap::new();
        for (name, chunks) in input_chunks {
            let views: Vec<_> = chunks.iter().map(|chunk| chunk.view()).collect();
            let merged = ndarray::concatenate(Axis(1), &views)
                .map_err(|err| SprError::DimensionMismatch(err.to_string()))?
                .into_dimensionality::<Ix2>()
                .map_err(|err| SprError::DimensionMismatch(err.to_string()))?;
            input_data.insert(name, merged);
        }

        let n_samples = target_values.len();
        info!(
            "tabular {} dataset: {} valid samples from {} scenes",
            self.split,
            n_samples,
            target_files.len()
        );

        let mut dataset = SprTabular {
            batch_size: self.batch_size,
            shuffle: self.shuffle,
            stack: self.stack,
            subsample: self.subsample,
            retrieval_input: inputs,
            target_config,
            target: Array1::from_vec(target_values),
            input_data,
            indices: (0..n_samples).collect(),
            rng: StdRng::seed_from_u64(SHUFFLE_SEED),
        };
        if dataset.shuffle {
            dataset.indices.shuffle(&mut dataset.rng);
        }
        Ok(dataset)
    }
}

/// In-memory tabular view of one benchmark split.
#[derive(Debug)]
pub struct SprTabular {
    batch_size: Option<usize>,
    shuffle: bool,
    stack: bool,
    subsample: Option<f64>,
    retrieval_input: Vec<InputConfig>,
    target_config: TargetConfig,
    /// Reference precipitation, one entry per valid sample.
    target: Array1<f32>,
    /// Output-array name → `(features, samples)` table.
    input_data: IndexMap<String, Array2<f32>>,
    indices: Vec<usize>,
    rng: StdRng,
}

impl SprTabular {
    pub fn builder(
        reference_sensor: ReferenceSensor,
        geometry: Geometry,
        split: Split,
    ) -> SprTabularBuilder {
        SprTabularBuilder::new(reference_sensor, geometry, split)
    }

    /// Total number of valid samples held in memory.
    pub fn n_samples(&self) -> usize {
        self.target.len()
    }

    /// Parsed descriptors of the loaded inputs.
    pub fn retrieval_input(&self) -> &[InputConfig] {
        &self.retrieval_input
    }

    pub fn target_config(&self) -> &TargetConfig {
        &self.target_config
    }

    /// Number of indexable entries: batches when batching, samples
    /// otherwise, scaled by the subsample fraction.
    pub fn len(&self) -> usize {
        let mut n_samples = self.n_samples() as f64;
        if let Some(fraction) = self.subsample {
            n_samples *= fraction;
        }
        match self.batch_size {
            None => n_samples.ceil() as usize,
            Some(batch_size) => (n_samples / batch_size as f64).ceil() as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch one sample or batch.
    ///
    /// Fetching index 0 with shuffling enabled starts a new pass and
    /// regenerates the sample permutation; within a pass, repeated reads of
    /// one index return identical content. Past-the-end indices fail with
    /// [`SprError::IndexOutOfBounds`].
    ///
    /// Return
    /// ----------
    /// * `(input, target)`. Without batching, input arrays have shape
    ///   `(features,)` and the target is a scalar array; with batching the
    ///   shapes are `(batch, features)` and `(batch,)`. With `stack` the
    ///   input is one array concatenated along the feature axis, otherwise a
    ///   name → array map in input order.
    pub fn get(&mut self, ind: usize) -> Result<(Tensors, ArrayD<f32>), SprError> {
        let len = self.len();
        if ind >= len {
            return Err(SprError::IndexOutOfBounds { index: ind, len });
        }
        if ind == 0 && self.shuffle {
            self.indices.shuffle(&mut self.rng);
        }

        let (arrays, target) = match self.batch_size {
            None => {
                let sample = self.indices[ind];
                let target = ArrayD::from_elem(IxDyn(&[]), self.target[sample]);
                let mut arrays = IndexMap::new();
                for (name, table) in &self.input_data {
                    arrays.insert(name.clone(), table.column(sample).to_owned().into_dyn());
                }
                (arrays, target)
            }
            Some(batch_size) => {
                let start = ind * batch_size;
                let end = (start + batch_size).min(self.indices.len());
                let samples = &self.indices[start..end];
                let target = self.target.select(Axis(0), samples).into_dyn();
                let mut arrays = IndexMap::new();
                for (name, table) in &self.input_data {
                    // (features, batch) → (batch, features)
                    let batch = table.select(Axis(1), samples).reversed_axes();
                    arrays.insert(name.clone(), batch.into_dyn());
                }
                (arrays, target)
            }
        };

        let input = if self.stack {
            let axis = if self.batch_size.is_none() { 0 } else { 1 };
            Tensors::Array(stack_arrays(&arrays, axis)?)
        } else {
            Tensors::from(arrays)
        };
        Ok((input, target))
    }
}

