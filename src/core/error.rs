//! Error types for the lodgrid crate

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid grid configuration: {0}")]
    Config(String),

    #[error("cell coordinate overflow: {0}")]
    CoordOverflow(String),

    #[error("mesh load error: {0}")]
    Load(#[from] tobj::LoadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported mesh format: {0}")]
    UnsupportedFormat(String),

    #[error("simplification error: {0}")]
    Simplify(String),

    #[error("build error: {0}")]
    Build(String),
}
