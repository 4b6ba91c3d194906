use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpratError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to decode image '{path}': {reason}")]
    ImageDecode { path: String, reason: String },

    #[error("no layout fits within the configured limits")]
    NoFit,

    #[error("cache I/O failure: {0}")]
    CacheIo(String),

    #[error("dimension overflow computing {what} for sprite '{path}'")]
    Overflow { what: &'static str, path: String },

    #[error("nothing to lay out: input set is empty")]
    Empty,
}

pub type Result<T> = std::result::Result<T, SpratError>;
