//! # Normalization statistics
//!
//! Precomputed per-channel (or per-variable) `min`, `max`, `mean`, and
//! `std_dev` values used to normalize retrieval inputs. One stats file exists
//! per source and geometry under `spr/stats/<geometry>/<source>.nc`; each of
//! the four variables is a vector with one entry per channel, or a single
//! entry when the source has no channel axis.
use camino::Utf8Path;
use ndarray::Array1;

use crate::sprdata_errors::SprError;

/// Per-channel normalization statistics for one input source.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    min: Array1<f32>,
    max: Array1<f32>,
    mean: Array1<f32>,
    std_dev: Array1<f32>,
}

impl Stats {
    /// Build statistics from raw vectors; all four must share one length.
    pub fn new(
        min: Vec<f32>,
        max: Vec<f32>,
        mean: Vec<f32>,
        std_dev: Vec<f32>,
    ) -> Result<Self, SprError> {
        let len = min.len();
        if len == 0 || max.len() != len || mean.len() != len || std_dev.len() != len {
            return Err(SprError::DimensionMismatch(format!(
                "statistics vectors must share one non-zero length, got {}/{}/{}/{}",
                min.len(),
                max.len(),
                mean.len(),
                std_dev.len()
            )));
        }
        Ok(Stats {
            min: Array1::from_vec(min),
            max: Array1::from_vec(max),
            mean: Array1::from_vec(mean),
            std_dev: Array1::from_vec(std_dev),
        })
    }

    /// Scalar statistics, broadcast over any leading dimension.
    pub fn scalar(min: f32, max: f32, mean: f32, std_dev: f32) -> Self {
        Stats {
            min: Array1::from_vec(vec![min]),
            max: Array1::from_vec(vec![max]),
            mean: Array1::from_vec(vec![mean]),
            std_dev: Array1::from_vec(vec![std_dev]),
        }
    }

    /// Read statistics from a stats file.
    ///
    /// The file must contain the 1-D variables `min`, `max`, `mean`, and
    /// `std_dev`.
    pub fn from_file(path: &Utf8Path) -> Result<Self, SprError> {
        let file = netcdf::open(path.as_std_path())?;
        let read = |name: &str| -> Result<Vec<f32>, SprError> {
            let var = file.variable(name).ok_or_else(|| SprError::MissingVariable {
                variable: name.to_string(),
                path: path.to_path_buf(),
            })?;
            Ok(var.get_values(..)?)
        };
        Stats::new(read("min")?, read("max")?, read("mean")?, read("std_dev")?)
    }

    /// Number of channel rows.
    pub fn len(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// Statistics row for channel `ind`; a length-1 instance broadcasts.
    pub fn row(&self, ind: usize) -> (f32, f32, f32, f32) {
        let ind = if self.len() == 1 { 0 } else { ind };
        (
            self.min[ind],
            self.max[ind],
            self.mean[ind],
            self.std_dev[ind],
        )
    }

    /// Subset of rows in the given order (channel or variable selection).
    pub fn select(&self, indices: &[usize]) -> Result<Self, SprError> {
        if let Some(&bad) = indices.iter().find(|&&ind| ind >= self.len()) {
            return Err(SprError::DimensionMismatch(format!(
                "statistics index {bad} out of range for {} rows",
                self.len()
            )));
        }
        let pick = |arr: &Array1<f32>| indices.iter().map(|&ind| arr[ind]).collect::<Vec<_>>();
        Stats::new(
            pick(&self.min),
            pick(&self.max),
            pick(&self.mean),
            pick(&self.std_dev),
        )
    }

    /// Repeat the whole row block `n` times (time-step × channel layouts).
    pub fn tile(&self, n: usize) -> Result<Self, SprError> {
        if n == 0 {
            return Err(SprError::DimensionMismatch(
                "cannot tile statistics zero times".to_string(),
            ));
        }
        let rep = |arr: &Array1<f32>| {
            let mut out = Vec::with_capacity(arr.len() * n);
            for _ in 0..n {
                out.extend(arr.iter().copied());
            }
            out
        };
        Stats::new(
            rep(&self.min),
            rep(&self.max),
            rep(&self.mean),
            rep(&self.std_dev),
        )
    }
}
