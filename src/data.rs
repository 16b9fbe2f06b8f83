//! # Benchmark archive access
//!
//! [`DataStore`] resolves the local directory tree of the benchmark archive
//! and, with the `download` feature, mirrors missing scene files from the
//! remote archive.
//!
//! Layout
//! -----------------
//! ```text
//! <data_path>/spr/<sensor>/<split>[/<domain>]/<geometry>/<source>/<source>_<stamp>.nc
//! <data_path>/spr/stats/<geometry>/<source>.nc
//! ```
//!
//! Scene files within a source directory are ordered by name, which orders
//! them by their median-time stamp; the size subsets keep a deterministic
//! prefix of that ordering so that smaller subsets nest inside larger ones.
//!
//! Downloads
//! -----------------
//! The remote archive serves plain directory indexes. `download_missing`
//! fetches the index of one source directory, extracts the `*.nc` links, and
//! downloads whatever the local tree lacks. With the `progress` feature a
//! progress bar tracks the transfer; otherwise completion is logged.
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;

use crate::definitions::{Domain, Geometry, ReferenceSensor, Split, Subset};
use crate::sprdata_errors::SprError;

/// Remote archive root; override with the `SPR_DATA_URL` environment
/// variable.
const DEFAULT_BASE_URL: &str = "https://rain.atmos.colostate.edu/spr";

/// Local and remote access to the benchmark archive.
#[derive(Debug, Clone)]
pub struct DataStore {
    data_path: Utf8PathBuf,
    base_url: String,
    #[cfg(feature = "download")]
    http_client: ureq::Agent,
}

impl DataStore {
    /// Open a store rooted at `data_path`.
    ///
    /// Without an explicit path the `SPR_DATA_PATH` environment variable is
    /// consulted, then the user cache directory. The root is created when
    /// absent.
    pub fn new(data_path: Option<Utf8PathBuf>) -> Result<Self, SprError> {
        let data_path = match data_path {
            Some(path) => path,
            None => default_data_path()?,
        };
        std::fs::create_dir_all(&data_path)?;

        let base_url =
            std::env::var("SPR_DATA_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        #[cfg(feature = "download")]
        let http_client = {
            let config = ureq::Agent::config_builder()
                .timeout_global(Some(std::time::Duration::from_secs(300)))
                .build();
            config.into()
        };

        Ok(DataStore {
            data_path,
            base_url,
            #[cfg(feature = "download")]
            http_client,
        })
    }

    pub fn data_path(&self) -> &Utf8Path {
        &self.data_path
    }

    /// Archive-relative directory of one source.
    fn relative_dir(
        &self,
        sensor: ReferenceSensor,
        geometry: Geometry,
        split: Split,
        domain: Option<Domain>,
        source: &str,
    ) -> Result<Utf8PathBuf, SprError> {
        let mut dir = Utf8PathBuf::from("spr").join(sensor.as_str()).join(split.as_str());
        if split == Split::Evaluation {
            let domain = domain.ok_or_else(|| {
                SprError::InvalidDomain("the evaluation split requires a domain".to_string())
            })?;
            dir = dir.join(domain.as_str());
        }
        Ok(dir.join(geometry.as_str()).join(source))
    }

    /// Resolve the local scene files of the requested sources.
    ///
    /// Arguments
    /// -----------------
    /// * `sources` – Source names, typically `"target"` plus the requested
    ///   retrieval inputs.
    ///
    /// Return
    /// ----------
    /// * Ordered map source → name-sorted file list, truncated to the subset
    ///   fraction. A source without a local directory maps to an empty list;
    ///   deciding whether that is fatal is up to the caller.
    pub fn get_local_files(
        &self,
        sensor: ReferenceSensor,
        geometry: Geometry,
        split: Split,
        subset: Subset,
        domain: Option<Domain>,
        sources: &[&str],
    ) -> Result<IndexMap<String, Vec<Utf8PathBuf>>, SprError> {
        let mut files = IndexMap::new();
        for &source in sources {
            let dir = self
                .data_path
                .join(self.relative_dir(sensor, geometry, split, domain, source)?);
            let mut scene_files = Vec::new();
            if dir.is_dir() {
                for entry in dir.read_dir_utf8()? {
                    let entry = entry?;
                    let path = entry.path();
                    if path.extension() == Some("nc") {
                        scene_files.push(path.to_path_buf());
                    }
                }
            }
            let scene_files: Vec<Utf8PathBuf> = scene_files.into_iter().sorted().collect();
            let n_kept = subset.n_files(scene_files.len());
            debug!(
                "resolved {}/{} local files for source '{source}' under {dir}",
                n_kept,
                scene_files.len()
            );
            files.insert(source.to_string(), scene_files[..n_kept].to_vec());
        }
        Ok(files)
    }

    /// Path of the normalization-statistics file of one source.
    pub fn stats_file(&self, geometry: Geometry, source: &str) -> Utf8PathBuf {
        self.data_path
            .join("spr/stats")
            .join(geometry.as_str())
            .join(format!("{source}.nc"))
    }

    /// Download the scene files of one source that are missing locally.
    ///
    /// Arguments
    /// -----------------
    /// * `source` – Source directory to mirror (`"target"` or an input name).
    /// * `progress_bar` – Draw a progress bar (requires the `progress`
    ///   feature; logged otherwise).
    #[cfg(feature = "download")]
    pub fn download_missing(
        &self,
        sensor: ReferenceSensor,
        geometry: Geometry,
        split: Split,
        subset: Subset,
        domain: Option<Domain>,
        source: &str,
        progress_bar: bool,
    ) -> Result<(), SprError> {
        use log::info;

        let relative = self.relative_dir(sensor, geometry, split, domain, source)?;
        let remote_dir = format!("{}/{relative}", self.base_url);
        let local_dir = self.data_path.join(&relative);
        std::fs::create_dir_all(&local_dir)?;

        let listing = self.remote_listing(&remote_dir)?;
        let n_kept = subset.n_files(listing.len());
        let missing: Vec<&String> = listing[..n_kept]
            .iter()
            .filter(|name| !local_dir.join(name.as_str()).exists())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        info!(
            "downloading {} missing files for source '{source}' from {remote_dir}",
            missing.len()
        );

        #[cfg(feature = "progress")]
        let bar = progress_bar.then(|| {
            let bar = indicatif::ProgressBar::new(missing.len() as u64);
            bar.set_style(
                indicatif::ProgressStyle::with_template(
                    "{msg} [{bar:40}] {pos}/{len} ({eta})",
                )
                .expect("indicatif template")
                .progress_chars("=> "),
            );
            bar.set_message(source.to_string());
            bar
        });
        #[cfg(not(feature = "progress"))]
        let _ = progress_bar;

        for name in missing {
            self.download_file(&format!("{remote_dir}/{name}"), &local_dir.join(name.as_str()))?;
            #[cfg(feature = "progress")]
            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }
        #[cfg(feature = "progress")]
        if let Some(bar) = &bar {
            bar.finish();
        }
        Ok(())
    }

    /// Scene-file names listed in a remote directory index, sorted.
    #[cfg(feature = "download")]
    fn remote_listing(&self, remote_dir: &str) -> Result<Vec<String>, SprError> {
        use std::sync::LazyLock;

        static NC_LINK: LazyLock<regex::Regex> =
            LazyLock::new(|| regex::Regex::new(r#"href="([^"/]+\.nc)""#).unwrap());

        let index = self
            .http_client
            .get(remote_dir)
            .call()?
            .body_mut()
            .read_to_string()
            .map_err(|_| SprError::DownloadFailed(remote_dir.to_string()))?;

        Ok(NC_LINK
            .captures_iter(&index)
            .map(|caps| caps[1].to_string())
            .sorted()
            .dedup()
            .collect())
    }

    #[cfg(feature = "download")]
    fn download_file(&self, url: &str, path: &Utf8Path) -> Result<(), SprError> {
        debug!("downloading {url}");
        let mut response = self.http_client.get(url).call()?;
        let mut reader = response.body_mut().as_reader();
        // Write to a temporary name so an interrupted transfer never leaves
        // a file the consistency checks would accept.
        let partial = path.with_extension("nc.part");
        let mut file = std::fs::File::create(&partial)?;
        std::io::copy(&mut reader, &mut file)
            .map_err(|_| SprError::DownloadFailed(url.to_string()))?;
        std::fs::rename(&partial, path)?;
        Ok(())
    }
}

fn default_data_path() -> Result<Utf8PathBuf, SprError> {
    if let Ok(path) = std::env::var("SPR_DATA_PATH") {
        return Ok(Utf8PathBuf::from(path));
    }
    let base = directories::BaseDirs::new().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no home directory to derive a data path from; set SPR_DATA_PATH",
        )
    })?;
    let cache = Utf8Path::from_path(base.cache_dir()).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "cache directory is not valid UTF-8; set SPR_DATA_PATH",
        )
    })?;
    Ok(cache.join("sprdata"))
}
