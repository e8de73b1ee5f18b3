//! Surface inputs accepted by the selection entry points

use std::path::{Path, PathBuf};

use super::{read_asc, Surface};
use crate::error::Result;

/// A surface given as an ASCII file or an in-memory mesh
#[derive(Clone, Debug)]
pub enum SurfaceSource<'a> {
    Path(PathBuf),
    Mesh(&'a Surface),
}

impl SurfaceSource<'_> {
    /// Load or clone the surface
    pub fn resolve(&self) -> Result<Surface> {
        match self {
            SurfaceSource::Path(path) => read_asc(path),
            SurfaceSource::Mesh(s) => Ok((*s).clone()),
        }
    }
}

impl<'a> From<&'a Surface> for SurfaceSource<'a> {
    fn from(s: &'a Surface) -> Self {
        SurfaceSource::Mesh(s)
    }
}

impl<'a> From<&'a Path> for SurfaceSource<'a> {
    fn from(p: &'a Path) -> Self {
        SurfaceSource::Path(p.to_path_buf())
    }
}

impl<'a> From<&'a PathBuf> for SurfaceSource<'a> {
    fn from(p: &'a PathBuf) -> Self {
        SurfaceSource::Path(p.clone())
    }
}

impl From<PathBuf> for SurfaceSource<'_> {
    fn from(p: PathBuf) -> Self {
        SurfaceSource::Path(p)
    }
}
