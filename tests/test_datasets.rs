//! End-to-end properties of the tabular and spatial dataset adapters.
mod common;

use approx::assert_abs_diff_eq;
use ndarray::ArrayD;

use sprdata::definitions::{Geometry, ReferenceSensor, Split};
use sprdata::input::calculate_input_features;
use sprdata::{SprError, SprSpatial, SprTabular};

const INPUTS: [&str; 2] = ["gmi", "ancillary"];

fn tabular(root: &camino::Utf8Path) -> sprdata::dataset::SprTabularBuilder {
    SprTabular::builder(ReferenceSensor::Gmi, Geometry::Gridded, Split::Training)
        .retrieval_input(INPUTS)
        .data_path(root.to_path_buf())
        .download(false)
}

fn spatial(root: &camino::Utf8Path) -> sprdata::dataset::SprSpatialBuilder {
    SprSpatial::builder(ReferenceSensor::Gmi, Geometry::Gridded, Split::Training)
        .retrieval_input(INPUTS)
        .data_path(root.to_path_buf())
        .download(false)
}

#[test]
fn test_tabular_loads_valid_samples() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let mut dataset = tabular(&root).shuffle(false).build().unwrap();
    assert_eq!(dataset.n_samples(), common::VALID_SAMPLES);
    assert_eq!(dataset.len(), common::VALID_SAMPLES);

    let (input, target) = dataset.get(0).unwrap();
    // Unbatched: scalar target, (features,) input vectors.
    assert_eq!(target.ndim(), 0);
    let map = input.as_map().unwrap();
    assert_eq!(map["obs_gmi"].as_array().unwrap().shape(), &[13]);
    assert_eq!(map["eia_gmi"].as_array().unwrap().shape(), &[13]);
    assert_eq!(map["ancillary"].as_array().unwrap().shape(), &[15]);

    // Without shuffling, sample 0 is the first valid pixel of scene 0: the
    // first three pixels are invalidated, so pixel (0, 3) leads.
    assert_abs_diff_eq!(
        target.iter().next().copied().unwrap(),
        common::precip_value(0, 0, 3),
        epsilon = 1e-6
    );
    // That pixel carries the fill value on GMI channel 0.
    assert!(map["obs_gmi"].as_array().unwrap()[[0]].is_nan());
    assert_abs_diff_eq!(
        map["obs_gmi"].as_array().unwrap()[[1]],
        common::gmi_value(1, 0, 3),
        epsilon = 1e-4
    );
}

#[test]
fn test_tabular_batched_and_stacked() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let n_features = calculate_input_features(INPUTS, true).unwrap().total();
    assert_eq!(n_features, 13 + 13 + 15);

    let mut dataset = tabular(&root).batch_size(32).stack(true).build().unwrap();
    assert_eq!(dataset.len(), common::VALID_SAMPLES.div_ceil(32));

    let (input, target) = dataset.get(0).unwrap();
    let stacked = input.as_array().unwrap();
    assert_eq!(stacked.shape(), &[32, n_features]);
    assert_eq!(target.shape(), &[32]);

    // The final batch is short, not dropped.
    let last = dataset.len() - 1;
    let (input, target) = dataset.get(last).unwrap();
    let remainder = common::VALID_SAMPLES - 32 * last;
    assert_eq!(input.as_array().unwrap().shape(), &[remainder, n_features]);
    assert_eq!(target.shape(), &[remainder]);
}

#[test]
fn test_tabular_repeated_access_is_stable_within_a_pass() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let mut dataset = tabular(&root).build().unwrap();
    let (_, first) = dataset.get(0).unwrap();
    let (_, again) = dataset.get(1).unwrap();
    let (_, again_2) = dataset.get(1).unwrap();
    assert_eq!(again, again_2);
    // Index 0 starts a new pass and repermutes, so no assertion on `first`
    // beyond it existing.
    assert_eq!(first.ndim(), 0);
}

#[test]
fn test_tabular_shuffle_is_deterministic_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let mut a = tabular(&root).build().unwrap();
    let mut b = tabular(&root).build().unwrap();
    for ind in 0..8 {
        let (_, target_a) = a.get(ind).unwrap();
        let (_, target_b) = b.get(ind).unwrap();
        assert_eq!(target_a, target_b);
    }
}

#[test]
fn test_tabular_subsample_shortens_passes() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let mut dataset = tabular(&root).subsample(0.5).batch_size(16).build().unwrap();
    let expected = (common::VALID_SAMPLES as f64 * 0.5 / 16.0).ceil() as usize;
    assert_eq!(dataset.len(), expected);
    assert!(dataset.get(expected - 1).is_ok());
    assert!(matches!(
        dataset.get(expected),
        Err(SprError::IndexOutOfBounds { .. })
    ));
}

#[test]
fn test_tabular_exhaustion_is_not_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let mut dataset = tabular(&root).build().unwrap();
    let len = dataset.len();
    match dataset.get(len) {
        Err(SprError::IndexOutOfBounds { index, len: reported }) => {
            assert_eq!(index, len);
            assert_eq!(reported, len);
        }
        other => panic!("expected an exhaustion error, got {other:?}"),
    }
}

#[test]
fn test_tabular_missing_target_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    // Nothing written: an empty archive has no target files.
    assert!(matches!(
        tabular(&root).build(),
        Err(SprError::NoTargetFiles)
    ));
}

#[test]
fn test_tabular_requested_input_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);
    std::fs::remove_dir_all(root.join("spr/gmi/training/gridded/geo_ir")).unwrap();

    let result = SprTabular::builder(ReferenceSensor::Gmi, Geometry::Gridded, Split::Training)
        .retrieval_input(["gmi", "geo_ir"])
        .data_path(root.to_path_buf())
        .download(false)
        .build();
    assert!(matches!(result, Err(SprError::InconsistentScenes(_))));
}

#[test]
fn test_tabular_timestamp_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    // Restamp one GMI scene: the file count still matches, the pairing no
    // longer does.
    let gmi_dir = root.join("spr/gmi/training/gridded/gmi");
    let times = common::scene_times();
    let old = gmi_dir.join(format!("gmi_{}.nc", sprdata::time::timestamp(times[0])));
    let new = gmi_dir.join("gmi_20190101000000.nc");
    std::fs::rename(&old, &new).unwrap();

    assert!(matches!(
        tabular(&root).build(),
        Err(SprError::TimestampMismatch { .. })
    ));
}

#[test]
fn test_spatial_scene_access() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let mut dataset = spatial(&root).augment(false).build().unwrap();
    assert_eq!(dataset.len(), common::N_SCENES);

    let (input, target) = dataset.get(0).unwrap();
    assert_eq!(target.shape(), &[common::GRID, common::GRID]);
    let map = input.as_map().unwrap();
    assert_eq!(
        map["obs_gmi"].as_array().unwrap().shape(),
        &[13, common::GRID, common::GRID]
    );
    assert_eq!(
        map["ancillary"].as_array().unwrap().shape(),
        &[15, common::GRID, common::GRID]
    );
    // No pixel-level subselection: the invalid pixels are still present.
    assert!(target.iter().any(|v| v.is_nan()));
}

#[test]
fn test_spatial_stacking() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let n_features = calculate_input_features(INPUTS, true).unwrap().total();
    let mut dataset = spatial(&root).augment(false).stack(true).build().unwrap();
    let (input, _) = dataset.get(1).unwrap();
    assert_eq!(
        input.as_array().unwrap().shape(),
        &[n_features, common::GRID, common::GRID]
    );
}

#[test]
fn test_spatial_augmentation_flips_input_and_target_jointly() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let mut plain = spatial(&root).augment(false).build().unwrap();
    let (plain_input, plain_target) = plain.get(0).unwrap();
    let plain_obs = plain_input.as_map().unwrap()["obs_gmi"]
        .as_array()
        .unwrap()
        .clone();

    let flips = |array: &ArrayD<f32>, h: bool, v: bool| -> ArrayD<f32> {
        let mut out = array.clone();
        let ndim = out.ndim();
        if h {
            out.invert_axis(ndarray::Axis(ndim - 2));
        }
        if v {
            out.invert_axis(ndarray::Axis(ndim - 1));
        }
        out
    };
    let eq_nan = |a: &ArrayD<f32>, b: &ArrayD<f32>| {
        a.iter()
            .zip(b.iter())
            .all(|(x, y)| (x.is_nan() && y.is_nan()) || x == y)
    };

    let mut augmented = spatial(&root).build().unwrap();
    for _ in 0..8 {
        let (input, target) = augmented.get(0).unwrap();
        let obs = input.as_map().unwrap()["obs_gmi"].as_array().unwrap();

        // Whatever flip was drawn, input and target must agree on it.
        let mut matched = false;
        for h in [false, true] {
            for v in [false, true] {
                if eq_nan(&flips(&plain_target, h, v), &target) {
                    assert!(eq_nan(&flips(&plain_obs, h, v), obs));
                    matched = true;
                }
            }
        }
        assert!(matched, "augmented target is not a flip of the plain target");
    }
}

#[test]
fn test_spatial_consistency_check() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let gmi_dir = root.join("spr/gmi/training/gridded/gmi");
    let times = common::scene_times();
    let old = gmi_dir.join(format!("gmi_{}.nc", sprdata::time::timestamp(times[1])));
    std::fs::rename(&old, gmi_dir.join("gmi_20190101000000.nc")).unwrap();

    assert!(matches!(
        spatial(&root).build(),
        Err(SprError::InconsistentScenes(_))
    ));
}

#[test]
fn test_spatial_index_out_of_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let mut dataset = spatial(&root).augment(false).build().unwrap();
    assert!(matches!(
        dataset.get(common::N_SCENES),
        Err(SprError::IndexOutOfBounds { .. })
    ));
}

#[test]
fn test_evaluation_split_rejected_by_adapters() {
    let dir = tempfile::tempdir().unwrap();
    let root = common::utf8_root(&dir);
    common::write_archive(&root);

    let result = SprTabular::builder(ReferenceSensor::Gmi, Geometry::Gridded, Split::Evaluation)
        .data_path(root.to_path_buf())
        .download(false)
        .build();
    assert!(matches!(result, Err(SprError::InvalidSplit(_))));
}
