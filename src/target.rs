//! # Target descriptor
//!
//! [`TargetConfig`] names the reference precipitation variable and the
//! quality requirements a sample must meet to enter the benchmark: finite,
//! non-negative precipitation whose radar quality index reaches the
//! configured threshold.
use ndarray::ArrayD;
use serde::Deserialize;

use crate::scene::Scene;
use crate::sprdata_errors::SprError;

/// Gauge-corrected radar quality index variable of the target scenes.
const RQI_VARIABLE: &str = "radar_quality_index";

/// Quality requirements for the retrieval target.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TargetConfig {
    /// Name of the reference precipitation variable.
    pub target: String,
    /// Minimum radar quality index for a sample to count as valid.
    pub min_rqi: f32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            target: "surface_precip".to_string(),
            min_rqi: 1.0,
        }
    }
}

impl TargetConfig {
    /// Validity mask over the target variable: `true` where a sample is
    /// usable.
    ///
    /// A sample is usable when its precipitation value is finite and
    /// non-negative and, when the scene carries a radar quality index, that
    /// index reaches `min_rqi`.
    pub fn get_mask(&self, scene: &Scene) -> Result<ArrayD<bool>, SprError> {
        let precip = &scene.require(&self.target)?.data;
        let mut mask = precip.mapv(|value| value.is_finite() && value >= 0.0);

        if let Some(rqi) = scene.variable(RQI_VARIABLE) {
            if rqi.data.shape() != precip.shape() {
                return Err(SprError::DimensionMismatch(format!(
                    "'{RQI_VARIABLE}' shape {:?} does not match '{}' shape {:?}",
                    rqi.data.shape(),
                    self.target,
                    precip.shape()
                )));
            }
            ndarray::Zip::from(&mut mask)
                .and(&rqi.data)
                .for_each(|usable, &quality| *usable = *usable && quality >= self.min_rqi);
        }

        Ok(mask)
    }

    /// Extract the reference precipitation variable, independent of masking.
    pub fn load_reference_precip(&self, scene: &Scene) -> Result<ArrayD<f32>, SprError> {
        Ok(scene.require(&self.target)?.data.clone())
    }
}
