//! # In-memory scenes
//!
//! A [`Scene`] is the decoded form of one on-disk scene file: an ordered map
//! of variable name → [`Variable`] (dimension names plus an [`ArrayD<f32>`]),
//! and the decoded `time` axis when the file carries one. Declared fill
//! values are converted to NaN on read, so invalid or out-of-swath entries
//! are always NaN in memory.
//!
//! [`Scene::extract_samples`] turns a spatial scene into tabular form: the
//! trailing spatial axes of every variable are flattened into one `samples`
//! axis keeping only the entries a boolean mask marks as valid, while leading
//! (channel/time) axes are preserved.
use camino::{Utf8Path, Utf8PathBuf};
use hifitime::Epoch;
use indexmap::IndexMap;
use log::debug;
use ndarray::{ArrayD, IxDyn};

use crate::sprdata_errors::SprError;
use crate::time::decode_time_axis;

/// One data variable: dimension names and the values in row-major order.
#[derive(Debug, Clone)]
pub struct Variable {
    pub dims: Vec<String>,
    pub data: ArrayD<f32>,
}

impl Variable {
    pub fn new(dims: Vec<String>, data: ArrayD<f32>) -> Self {
        Variable { dims, data }
    }
}

/// A loaded scene file.
#[derive(Debug, Clone)]
pub struct Scene {
    path: Utf8PathBuf,
    variables: IndexMap<String, Variable>,
    time: Option<Vec<Epoch>>,
}

impl Scene {
    /// Assemble a scene from already-decoded parts.
    pub fn from_parts(variables: IndexMap<String, Variable>, time: Option<Vec<Epoch>>) -> Self {
        Scene {
            path: Utf8PathBuf::new(),
            variables,
            time,
        }
    }

    /// Read every data variable of a scene file.
    ///
    /// The `time` variable is decoded into epochs via its `units` attribute;
    /// all other variables are read as `f32` with declared `_FillValue` /
    /// `missing_value` entries replaced by NaN.
    pub fn open(path: &Utf8Path) -> Result<Self, SprError> {
        let file = netcdf::open(path.as_std_path())?;
        let mut variables = IndexMap::new();
        let mut time = None;

        for var in file.variables() {
            let name = var.name();
            if name == "time" {
                let offsets: Vec<f64> = var.get_values(..)?;
                let units = string_attribute(&var, "units").ok_or_else(|| {
                    SprError::TimeDecoding(format!("no units on time axis of {path}"))
                })?;
                time = Some(decode_time_axis(&offsets, &units)?);
                continue;
            }

            let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
            let dims: Vec<String> = var
                .dimensions()
                .iter()
                .map(|d| d.name().to_string())
                .collect();
            let mut values: Vec<f32> = var.get_values(..)?;
            if let Some(fill) = float_attribute(&var, "_FillValue")
                .or_else(|| float_attribute(&var, "missing_value"))
            {
                for value in values.iter_mut() {
                    if *value == fill {
                        *value = f32::NAN;
                    }
                }
            }
            let data = ArrayD::from_shape_vec(IxDyn(&shape), values)
                .map_err(|err| SprError::DimensionMismatch(err.to_string()))?;
            variables.insert(name, Variable::new(dims, data));
        }

        debug!(
            "loaded scene {path} ({} variables, time axis: {})",
            variables.len(),
            time.as_ref().map_or(0, Vec::len)
        );
        Ok(Scene {
            path: path.to_path_buf(),
            variables,
            time,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Variable lookup that reports the scene's path on failure.
    pub fn require(&self, name: &str) -> Result<&Variable, SprError> {
        self.variables.get(name).ok_or_else(|| SprError::MissingVariable {
            variable: name.to_string(),
            path: self.path.clone(),
        })
    }

    /// The auxiliary time axis, when the file carries one.
    pub fn time(&self) -> Option<&[Epoch]> {
        self.time.as_deref()
    }

    /// Restrict the scene to the samples a mask marks as valid.
    ///
    /// Arguments
    /// -----------------
    /// * `mask` – Boolean array over the spatial axes (the trailing axes of
    ///   every variable); `true` keeps a sample.
    ///
    /// Return
    /// ----------
    /// * A scene whose variables have shape `(leading axes..., samples)`.
    ///   Variables whose trailing axes do not match the mask shape are a
    ///   dimension error.
    pub fn extract_samples(&self, mask: &ArrayD<bool>) -> Result<Scene, SprError> {
        let spatial = mask.shape().to_vec();
        let n_spatial: usize = spatial.iter().product();
        let flat_mask: Vec<bool> = mask.iter().copied().collect();
        let n_valid = flat_mask.iter().filter(|&&keep| keep).count();

        let mut variables = IndexMap::new();
        for (name, var) in &self.variables {
            let shape = var.data.shape();
            if shape.len() < spatial.len() || shape[shape.len() - spatial.len()..] != spatial[..] {
                return Err(SprError::DimensionMismatch(format!(
                    "variable '{name}' with shape {shape:?} does not end with the mask shape {spatial:?}"
                )));
            }
            let lead = &shape[..shape.len() - spatial.len()];
            let n_lead: usize = lead.iter().product();

            let flat: Vec<f32> = var.data.iter().copied().collect();
            let mut out = Vec::with_capacity(n_lead * n_valid);
            for block in 0..n_lead {
                let base = block * n_spatial;
                for (offset, keep) in flat_mask.iter().enumerate() {
                    if *keep {
                        out.push(flat[base + offset]);
                    }
                }
            }

            let mut new_shape = lead.to_vec();
            new_shape.push(n_valid);
            let mut new_dims: Vec<String> =
                var.dims[..var.dims.len() - spatial.len()].to_vec();
            new_dims.push("samples".to_string());
            let data = ArrayD::from_shape_vec(IxDyn(&new_shape), out)
                .map_err(|err| SprError::DimensionMismatch(err.to_string()))?;
            variables.insert(name.clone(), Variable::new(new_dims, data));
        }

        Ok(Scene {
            path: self.path.clone(),
            variables,
            time: self.time.clone(),
        })
    }
}

fn string_attribute(var: &netcdf::Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value() {
        Ok(netcdf::AttributeValue::Str(s)) => Some(s),
        _ => None,
    }
}

fn float_attribute(var: &netcdf::Variable, name: &str) -> Option<f32> {
    match var.attribute(name)?.value() {
        Ok(netcdf::AttributeValue::Float(v)) => Some(v),
        Ok(netcdf::AttributeValue::Double(v)) => Some(v as f32),
        Ok(netcdf::AttributeValue::Floats(v)) => v.first().copied(),
        Ok(netcdf::AttributeValue::Doubles(v)) => v.first().map(|&v| v as f32),
        _ => None,
    }
}

#[cfg(test)]
mod scene_test {
    use super::*;
    use ndarray::Array;

    fn test_scene() -> Scene {
        let mut variables = IndexMap::new();
        // Two channels over a 2x3 grid.
        let obs = Array::from_shape_vec(
            IxDyn(&[2, 2, 3]),
            (0..12).map(|v| v as f32).collect(),
        )
        .unwrap();
        variables.insert(
            "observations".to_string(),
            Variable::new(
                vec!["channels".into(), "y".into(), "x".into()],
                obs,
            ),
        );
        let precip =
            Array::from_shape_vec(IxDyn(&[2, 3]), (0..6).map(|v| v as f32).collect()).unwrap();
        variables.insert(
            "surface_precip".to_string(),
            Variable::new(vec!["y".into(), "x".into()], precip),
        );
        Scene::from_parts(variables, None)
    }

    #[test]
    fn test_extract_samples_keeps_leading_axes() {
        let scene = test_scene();
        let mask = Array::from_shape_vec(
            IxDyn(&[2, 3]),
            vec![true, false, true, false, false, true],
        )
        .unwrap();
        let extracted = scene.extract_samples(&mask).unwrap();

        let obs = &extracted.require("observations").unwrap().data;
        assert_eq!(obs.shape(), &[2, 3]);
        assert_eq!(obs[[0, 0]], 0.0);
        assert_eq!(obs[[0, 1]], 2.0);
        assert_eq!(obs[[0, 2]], 5.0);
        assert_eq!(obs[[1, 0]], 6.0);

        let precip = &extracted.require("surface_precip").unwrap().data;
        assert_eq!(precip.shape(), &[3]);
        assert_eq!(precip[[2]], 5.0);
    }

    #[test]
    fn test_extract_samples_rejects_mismatched_mask() {
        let scene = test_scene();
        let mask = Array::from_shape_vec(IxDyn(&[3, 2]), vec![true; 6]).unwrap();
        assert!(matches!(
            scene.extract_samples(&mask),
            Err(SprError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_require_reports_missing_variable() {
        let scene = test_scene();
        assert!(matches!(
            scene.require("earth_incidence_angle"),
            Err(SprError::MissingVariable { .. })
        ));
    }
}
