//! Error type shared by every module of the crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building geometry, selecting voxels or running a searchlight
#[derive(Debug, Error)]
pub enum SurfingError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("NIfTI error: {0}")]
    Nifti(String),

    #[error("surface format error: {0}")]
    SurfaceFormat(String),

    #[error("vertex count mismatch: {what} has {found} vertices, expected {expected}")]
    VertexCountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("face {face} references vertex {vertex}, but surface has {nvertices} vertices")]
    InvalidFace {
        face: usize,
        vertex: usize,
        nvertices: usize,
    },

    #[error("affine transformation is not invertible")]
    SingularAffine,

    #[error("invalid mask: {0}")]
    InvalidMask(String),

    #[error("node {node} out of range (surface has {nvertices} vertices)")]
    NodeOutOfRange { node: usize, nvertices: usize },

    #[error("invalid radius: {0}")]
    InvalidRadius(String),

    #[error("unknown distance metric '{0}'")]
    UnknownMetric(String),

    #[error("query engine has not been trained on a dataset")]
    NotTrained,

    #[error("no neighborhood with id {0}")]
    UnknownId(usize),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SurfingError>;

impl SurfingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SurfingError::Io {
            path: path.into(),
            source,
        }
    }
}
