//! Synthetic benchmark archive for integration tests.
//!
//! Writes a miniature but structurally faithful copy of the archive tree:
//! three scenes per source over an 8x8 grid, consistent median-time stamps
//! across sources, and the per-source statistics files. The numeric content
//! is deterministic so tests can assert exact values.
#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use hifitime::{Duration, Epoch};

use sprdata::definitions::{
    ANCILLARY_VARIABLES, N_GEO_CHANNELS, N_GEO_IR_TIME_STEPS, N_GEO_TIME_STEPS, N_GMI_CHANNELS,
};
use sprdata::time::timestamp;

pub const GRID: usize = 8;
pub const N_SCENES: usize = 3;

/// Pixels excluded per scene: one NaN, one negative, one low-quality.
pub const INVALID_PER_SCENE: usize = 3;

/// Valid samples the whole training split contributes.
pub const VALID_SAMPLES: usize = N_SCENES * (GRID * GRID - INVALID_PER_SCENE);

/// Median times of the three scenes, two hours apart.
pub fn scene_times() -> Vec<Epoch> {
    let base = Epoch::from_gregorian_utc(2023, 1, 5, 12, 0, 0, 0);
    (0..N_SCENES)
        .map(|ind| base + Duration::from_seconds(ind as f64 * 7200.0))
        .collect()
}

fn units_for(time: Epoch) -> String {
    let (year, month, day, hour, minute, second, _) = time.to_gregorian_utc();
    format!("minutes since {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")
}

fn source_dir(root: &Utf8Path, source: &str) -> Utf8PathBuf {
    root.join("spr/gmi/training/gridded").join(source)
}

fn scene_path(root: &Utf8Path, source: &str, time: Epoch) -> Utf8PathBuf {
    source_dir(root, source).join(format!("{source}_{}.nc", timestamp(time)))
}

fn pixel(y: usize, x: usize) -> f32 {
    (y * GRID + x) as f32
}

/// Reference precipitation of one scene pixel (before invalidation).
pub fn precip_value(scene: usize, y: usize, x: usize) -> f32 {
    scene as f32 * 10.0 + pixel(y, x) * 0.1
}

/// GMI brightness temperature of one channel/pixel.
pub fn gmi_value(channel: usize, y: usize, x: usize) -> f32 {
    150.0 + channel as f32 * 5.0 + pixel(y, x) * 0.01
}

fn write_target(path: &Utf8Path, scene: usize) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path.as_std_path())?;
    file.add_dimension("y", GRID)?;
    file.add_dimension("x", GRID)?;

    let mut precip = vec![0.0f32; GRID * GRID];
    let mut rqi = vec![1.0f32; GRID * GRID];
    for y in 0..GRID {
        for x in 0..GRID {
            precip[y * GRID + x] = precip_value(scene, y, x);
        }
    }
    // Three unusable pixels: missing, physically invalid, low quality.
    precip[0] = f32::NAN;
    precip[1] = -1.0;
    rqi[2] = 0.5;

    let mut var = file.add_variable::<f32>("surface_precip", &["y", "x"])?;
    var.put_values(&precip, ..)?;
    let mut var = file.add_variable::<f32>("radar_quality_index", &["y", "x"])?;
    var.put_values(&rqi, ..)?;
    Ok(())
}

fn write_gmi(path: &Utf8Path) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path.as_std_path())?;
    file.add_dimension("channels", N_GMI_CHANNELS)?;
    file.add_dimension("y", GRID)?;
    file.add_dimension("x", GRID)?;

    let mut obs = vec![0.0f32; N_GMI_CHANNELS * GRID * GRID];
    let mut eia = vec![0.0f32; N_GMI_CHANNELS * GRID * GRID];
    for c in 0..N_GMI_CHANNELS {
        for y in 0..GRID {
            for x in 0..GRID {
                let ind = (c * GRID + y) * GRID + x;
                obs[ind] = gmi_value(c, y, x);
                eia[ind] = 52.0 - c as f32 * 0.5;
            }
        }
    }
    // Out-of-swath pixel on channel 0, marked with the declared fill value.
    obs[3] = -9999.0;

    let mut var = file.add_variable::<f32>("observations", &["channels", "y", "x"])?;
    var.put_attribute("_FillValue", -9999.0f32)?;
    var.put_values(&obs, ..)?;
    let mut var =
        file.add_variable::<f32>("earth_incidence_angle", &["channels", "y", "x"])?;
    var.put_values(&eia, ..)?;
    Ok(())
}

fn write_geo(path: &Utf8Path, median: Epoch) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path.as_std_path())?;
    file.add_dimension("time", N_GEO_TIME_STEPS)?;
    file.add_dimension("channels", N_GEO_CHANNELS)?;
    file.add_dimension("y", GRID)?;
    file.add_dimension("x", GRID)?;

    // Quarter-hourly steps from one hour before to 45 minutes after median.
    let offsets: Vec<f64> = (0..N_GEO_TIME_STEPS)
        .map(|ind| ind as f64 * 15.0 - 60.0)
        .collect();
    let mut var = file.add_variable::<f64>("time", &["time"])?;
    var.put_attribute("units", units_for(median))?;
    var.put_values(&offsets, ..)?;

    let mut obs = vec![0.0f32; N_GEO_TIME_STEPS * N_GEO_CHANNELS * GRID * GRID];
    for t in 0..N_GEO_TIME_STEPS {
        for c in 0..N_GEO_CHANNELS {
            for y in 0..GRID {
                for x in 0..GRID {
                    let ind = ((t * N_GEO_CHANNELS + c) * GRID + y) * GRID + x;
                    obs[ind] = 200.0 + c as f32 + t as f32 * 0.1 + pixel(y, x) * 0.001;
                }
            }
        }
    }
    let mut var =
        file.add_variable::<f32>("observations", &["time", "channels", "y", "x"])?;
    var.put_values(&obs, ..)?;
    Ok(())
}

fn write_geo_ir(path: &Utf8Path, median: Epoch) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path.as_std_path())?;
    file.add_dimension("time", N_GEO_IR_TIME_STEPS)?;
    file.add_dimension("y", GRID)?;
    file.add_dimension("x", GRID)?;

    // Half-hourly steps centered on the median time (step 8 = median).
    let offsets: Vec<f64> = (0..N_GEO_IR_TIME_STEPS)
        .map(|ind| ind as f64 * 30.0 - 240.0)
        .collect();
    let mut var = file.add_variable::<f64>("time", &["time"])?;
    var.put_attribute("units", units_for(median))?;
    var.put_values(&offsets, ..)?;

    let mut obs = vec![0.0f32; N_GEO_IR_TIME_STEPS * GRID * GRID];
    for t in 0..N_GEO_IR_TIME_STEPS {
        for y in 0..GRID {
            for x in 0..GRID {
                obs[(t * GRID + y) * GRID + x] = 230.0 + t as f32 + pixel(y, x) * 0.01;
            }
        }
    }
    let mut var = file.add_variable::<f32>("observations", &["time", "y", "x"])?;
    var.put_values(&obs, ..)?;
    Ok(())
}

fn write_ancillary(path: &Utf8Path) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path.as_std_path())?;
    file.add_dimension("y", GRID)?;
    file.add_dimension("x", GRID)?;

    for (ind, name) in ANCILLARY_VARIABLES.iter().enumerate() {
        let mut values = vec![0.0f32; GRID * GRID];
        for y in 0..GRID {
            for x in 0..GRID {
                values[y * GRID + x] = ind as f32 * 10.0 + pixel(y, x) * 0.1;
            }
        }
        let mut var = file.add_variable::<f32>(name, &["y", "x"])?;
        var.put_values(&values, ..)?;
    }
    Ok(())
}

fn write_stats(path: &Utf8Path, n_rows: usize) -> Result<(), netcdf::Error> {
    let mut file = netcdf::create(path.as_std_path())?;
    file.add_dimension("channels", n_rows)?;

    let min: Vec<f32> = (0..n_rows).map(|c| 100.0 + c as f32).collect();
    let max: Vec<f32> = (0..n_rows).map(|c| 300.0 + c as f32).collect();
    let mean: Vec<f32> = (0..n_rows).map(|c| 200.0 + c as f32).collect();
    let std_dev: Vec<f32> = vec![50.0; n_rows];
    for (name, values) in [
        ("min", &min),
        ("max", &max),
        ("mean", &mean),
        ("std_dev", &std_dev),
    ] {
        let mut var = file.add_variable::<f32>(name, &["channels"])?;
        var.put_values(values, ..)?;
    }
    Ok(())
}

/// Write the full synthetic archive (gmi/gridded/training) under `root`.
pub fn write_archive(root: &Utf8Path) {
    for source in ["target", "gmi", "geo", "geo_ir", "ancillary"] {
        std::fs::create_dir_all(source_dir(root, source)).unwrap();
    }
    let stats_dir = root.join("spr/stats/gridded");
    std::fs::create_dir_all(&stats_dir).unwrap();

    for (scene, &time) in scene_times().iter().enumerate() {
        write_target(&scene_path(root, "target", time), scene).unwrap();
        write_gmi(&scene_path(root, "gmi", time)).unwrap();
        write_geo(&scene_path(root, "geo", time), time).unwrap();
        write_geo_ir(&scene_path(root, "geo_ir", time), time).unwrap();
        write_ancillary(&scene_path(root, "ancillary", time)).unwrap();
    }

    write_stats(&stats_dir.join("gmi.nc"), N_GMI_CHANNELS).unwrap();
    write_stats(&stats_dir.join("geo.nc"), N_GEO_CHANNELS).unwrap();
    write_stats(&stats_dir.join("geo_ir.nc"), 1).unwrap();
    write_stats(&stats_dir.join("ancillary.nc"), ANCILLARY_VARIABLES.len()).unwrap();
}

/// Archive root as a `Utf8Path`.
pub fn utf8_root(dir: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8Path::from_path(dir.path()).unwrap().to_path_buf()
}
