//! # Spatial dataset adapter
//!
//! [`SprSpatial`] serves whole scenes: construction only resolves and
//! verifies file lists, and every access independently opens the target
//! scene and the matching scene of each requested input. This keeps the
//! memory footprint flat and makes the adapter safe to clone into a pool of
//! data-loading workers: the file lists are shared immutable slices, and
//! each clone owns its random generator, reseeded per worker through
//! [`SprSpatial::worker_init`].
//!
//! Scene pairing is verified once at construction: the set of median-time
//! stamps must match exactly between the target and every input source.
//! A mismatch signals an incomplete or corrupted local archive and fails
//! construction rather than silently dropping scenes.
use std::sync::Arc;

use ahash::AHashSet;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use log::info;
use ndarray::ArrayD;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::DataStore;
use crate::definitions::{Geometry, ReferenceSensor, Split, Subset};
use crate::input::{default_retrieval_inputs, parse_retrieval_inputs, InputConfig, InputSpec};
use crate::sprdata_errors::SprError;
use crate::target::TargetConfig;
use crate::time::median_time;

use super::{apply, attach_stats, flip, source_names, stack_arrays, Tensors};

/// Builder for [`SprSpatial`].
#[derive(Debug)]
pub struct SprSpatialBuilder {
    reference_sensor: ReferenceSensor,
    geometry: Geometry,
    split: Split,
    subset: Subset,
    retrieval_input: Option<Vec<InputSpec>>,
    target_config: Option<TargetConfig>,
    stack: bool,
    augment: bool,
    data_path: Option<Utf8PathBuf>,
    download: bool,
}

impl SprSpatialBuilder {
    pub fn new(reference_sensor: ReferenceSensor, geometry: Geometry, split: Split) -> Self {
        SprSpatialBuilder {
            reference_sensor,
            geometry,
            split,
            subset: Subset::Xl,
            retrieval_input: None,
            target_config: None,
            stack: false,
            augment: true,
            data_path: None,
            download: true,
        }
    }

    pub fn subset(mut self, subset: Subset) -> Self {
        self.subset = subset;
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

    /// Random horizontal/vertical flips of input and target (default: on).
    pub fn augment(mut self, augment: bool) -> Self {
        self.augment = augment;
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

    /// Resolve file lists and verify scene pairing across sources.
    pub fn build(self) -> Result<SprSpatial, SprError> {
        if self.split == Split::Evaluation {
            return Err(SprError::InvalidSplit(
                "evaluation (dataset adapters serve training/validation/testing)".to_string(),
            ));
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
        let mut files = store.get_local_files(
            self.reference_sensor,
            self.geometry,
            self.split,
            self.subset,
            None,
            &name_refs,
        )?;

        let target_files: Arc<[Utf8PathBuf]> = files
            .shift_remove("target")
            .unwrap_or_default()
            .into();
        if target_files.is_empty() {
            return Err(SprError::NoTargetFiles);
        }

        let target_times = scene_times(&target_files)?;
        let mut input_files = IndexMap::new();
        for input in &inputs {
            let source_files: Arc<[Utf8PathBuf]> = files
                .shift_remove(input.name())
                .unwrap_or_default()
                .into();
            if scene_times(&source_files)? != target_times {
                return Err(SprError::InconsistentScenes(input.name().to_string()));
            }
            input_files.insert(input.name().to_string(), source_files);
        }

        info!(
            "spatial {} dataset: {} scenes, {} input sources",
            self.split,
            target_files.len(),
            inputs.len()
        );

        let mut dataset = SprSpatial {
            stack: self.stack,
            augment: self.augment,
            retrieval_input: inputs,
            target_config,
            target_files,
            input_files,
            rng: StdRng::seed_from_u64(0),
        };
        dataset.worker_init(0);
        Ok(dataset)
    }
}

/// File-backed spatial view of one benchmark split.
#[derive(Debug, Clone)]
pub struct SprSpatial {
    stack: bool,
    augment: bool,
    retrieval_input: Vec<InputConfig>,
    target_config: TargetConfig,
    target_files: Arc<[Utf8PathBuf]>,
    input_files: IndexMap<String, Arc<[Utf8PathBuf]>>,
    rng: StdRng,
}

impl SprSpatial {
    pub fn builder(
        reference_sensor: ReferenceSensor,
        geometry: Geometry,
        split: Split,
    ) -> SprSpatialBuilder {
        SprSpatialBuilder::new(reference_sensor, geometry, split)
    }

    /// Number of scenes in the split.
    pub fn len(&self) -> usize {
        self.target_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target_files.is_empty()
    }

    /// Parsed descriptors of the loaded inputs.
    pub fn retrieval_input(&self) -> &[InputConfig] {
        &self.retrieval_input
    }

    pub fn target_config(&self) -> &TargetConfig {
        &self.target_config
    }

    /// Reseed the augmentation generator for one worker of a loading pool.
    ///
    /// Each worker must call this with its own id after cloning the dataset;
    /// the seed mixes OS entropy with the id so workers draw disjoint
    /// augmentation streams.
    pub fn worker_init(&mut self, worker_id: u64) {
        let entropy: u64 = rand::rng().random();
        self.rng = StdRng::seed_from_u64(entropy.wrapping_add(worker_id));
    }

    /// Load one scene.
    ///
    /// Opens the target scene and the paired scene of every requested input,
    /// optionally applies a shared random horizontal/vertical flip to inputs
    /// and target, and optionally stacks the inputs along the feature axis.
    ///
    /// Return
    /// ----------
    /// * `(input, target)`: input arrays shaped `(features, ...spatial)`,
    ///   target shaped like the scene's precipitation field (no pixel-level
    ///   subselection; validity is a target-quality concern the consumer
    ///   masks with).
    pub fn get(&mut self, ind: usize) -> Result<(Tensors, ArrayD<f32>), SprError> {
        let len = self.len();
        if ind >= len {
            return Err(SprError::IndexOutOfBounds { index: ind, len });
        }

        let target_file = &self.target_files[ind];
        let target_scene = crate::scene::Scene::open(target_file)?;
        let target_time = median_time(target_file)?;
        let mut target = self.target_config.load_reference_precip(&target_scene)?;

        let mut arrays = IndexMap::new();
        for input in &self.retrieval_input {
            let path = &self.input_files[input.name()][ind];
            for (name, array) in input.load_file(path, target_time)? {
                arrays.insert(name, array);
            }
        }

        let mut input = if self.stack {
            Tensors::Array(stack_arrays(&arrays, 0)?)
        } else {
            Tensors::from(arrays)
        };

        if self.augment {
            let flip_h = self.rng.random_bool(0.5);
            let flip_v = self.rng.random_bool(0.5);
            input = apply(input, &|array| flip(array, flip_h, flip_v));
            target = flip(target, flip_h, flip_v);
        }

        Ok((input, target))
    }
}

/// Median-time stamps of a file list, as a set of unix seconds.
fn scene_times(files: &[Utf8PathBuf]) -> Result<AHashSet<i64>, SprError> {
    files
        .iter()
        .map(|path| Ok(median_time(path)?.to_unix_seconds().round() as i64))
        .collect()
}

// Worker pools move clones across threads.
#[allow(dead_code)]
fn assert_spatial_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SprSpatial>();
}

#[cfg(test)]
mod spatial_test {
    use super::*;

    #[test]
    fn test_scene_times_are_a_set() {
        let files = vec![
            Utf8PathBuf::from("geo_20230105120000.nc"),
            Utf8PathBuf::from("geo_20230105140000.nc"),
        ];
        let reversed: Vec<Utf8PathBuf> = files.iter().rev().cloned().collect();
        assert_eq!(scene_times(&files).unwrap(), scene_times(&reversed).unwrap());
    }

    #[test]
    fn test_scene_times_require_stamps() {
        let files = vec![Utf8PathBuf::from("geo.nc")];
        assert!(matches!(
            scene_times(&files),
            Err(SprError::MissingTimestamp(_))
        ));
    }
}
