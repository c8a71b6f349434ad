use lane_scan::{LaneScanError, LaneScanIoError};

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] LaneScanIoError),
    #[error("failed to read image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Pipeline(#[from] LaneScanError),
    #[error("{0}")]
    Usage(String),
}

pub type CliResult<T> = Result<T, CliError>;
