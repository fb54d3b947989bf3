use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum QwError {
    #[error("Unable to create container file {1}: {0}")]
    CreateFailed(#[source] std::io::Error, PathBuf),

    #[error("I/O error while writing container {1}: {0}")]
    WriteFailed(#[source] std::io::Error, PathBuf),

    #[error("I/O error while reading container {1}: {0}")]
    ReadFailed(#[source] std::io::Error, PathBuf),

    #[error("Container {1} is not a valid JSON document: {0}")]
    InvalidDocument(#[source] serde_json::Error, PathBuf),

    #[error("Container {1} is not valid base64 text: {0}")]
    InvalidEncoding(#[source] base64::DecodeError, PathBuf),

    #[error(transparent)]
    JsonSerdeError(#[from] serde_json::Error),

    #[error("Zip archive error for {1}: {0}")]
    ZipError(#[source] zip::result::ZipError, PathBuf),

    #[error("Bundle {0} must contain exactly one entry, found {1}")]
    UnexpectedBundleLayout(PathBuf, usize),

    #[error("Container {0} already has the bundle extension, bundling would overwrite it")]
    BundleOverwritesSource(PathBuf),

    #[error("Container path {0} has no file name")]
    MissingFileName(PathBuf),
}

pub type QwResult<T> = Result<T, QwError>;
