use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SprError {
    #[error("Invalid reference sensor: {0} (expected one of ['gmi', 'atms'])")]
    InvalidReferenceSensor(String),

    #[error("Invalid geometry: {0} (expected one of ['gridded', 'on_swath'])")]
    InvalidGeometry(String),

    #[error("Invalid split: {0} (expected one of ['training', 'validation', 'testing', 'evaluation'])")]
    InvalidSplit(String),

    #[error("Invalid subset: {0} (expected one of ['xs', 's', 'm', 'l', 'xl'])")]
    InvalidSubset(String),

    #[error("Invalid evaluation domain: {0} (expected one of ['austria', 'conus', 'korea'])")]
    InvalidDomain(String),

    #[error("Unknown retrieval input source: {0}")]
    UnknownInputSource(String),

    #[error("Retrieval input source requested more than once: {0}")]
    DuplicateInputSource(String),

    #[error("Invalid input configuration for '{source}': {reason}")]
    InvalidInputConfig { source: String, reason: String },

    #[error("Invalid normalization mode: {0} (expected 'minmax' or 'standardize')")]
    InvalidNormalization(String),

    #[error("Normalization requested for '{0}' but no statistics are available")]
    MissingStats(String),

    #[error("No target files found; check the data path or enable 'download'")]
    NoTargetFiles,

    #[error("Variable '{variable}' not found in {path}")]
    MissingVariable {
        variable: String,
        path: Utf8PathBuf,
    },

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Unable to decode time axis: {0}")]
    TimeDecoding(String),

    #[error("No median-time stamp in file name: {0}")]
    MissingTimestamp(Utf8PathBuf),

    #[error(
        "Input file {input_file} is inconsistent with its reference file {target_file}; \
         the local dataset is likely incomplete or corrupted"
    )]
    TimestampMismatch {
        input_file: Utf8PathBuf,
        target_file: Utf8PathBuf,
    },

    #[error("Scene times available for input '{0}' are inconsistent with the target scenes")]
    InconsistentScenes(String),

    #[error("Index {index} is out of bounds for a dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("NetCDF error: {0}")]
    NetcdfError(#[from] netcdf::Error),

    #[error("Invalid input specification: {0}")]
    JsonError(#[from] serde_json::Error),

    #[cfg(feature = "download")]
    #[error("HTTP ureq error: {0}")]
    UreqHttpError(#[from] Box<ureq::Error>),

    #[cfg(feature = "download")]
    #[error("Download of {0} failed")]
    DownloadFailed(String),
}

#[cfg(feature = "download")]
impl From<ureq::Error> for SprError {
    fn from(err: ureq::Error) -> Self {
        SprError::UreqHttpError(Box::new(err))
    }
}
