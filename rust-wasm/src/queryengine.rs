//! Query engines: neighbourhood id to feature indices of a trained dataset
//!
//! - `SurfaceVerticesQueryEngine`: neighbourhoods from a surface voxel selection
//! - `IndexQueryEngine`: spheres around each voxel of the dataset
//!
//! Features are returned in ascending order so surface and volume neighbourhoods
//! over the same voxels slice a dataset identically.

use std::collections::BTreeMap;

use crate::config::SelectionConfig;
use crate::dataset::Dataset;
use crate::error::{Result, SurfingError};
use crate::surf::SurfaceSource;
use crate::volgeom::{VolGeom, VolumeSource};
use crate::volsurf::VolSurf;
use crate::voxel_selection::{lattice_extent, voxel_selection, within_radius_sq, VoxelSelection};

/// Lookup from neighbourhood id to dataset features
pub trait QueryEngine {
    /// Bind the engine to a dataset's feature layout
    fn train(&mut self, dataset: &Dataset) -> Result<()>;

    /// Neighbourhood ids, ascending
    fn ids(&self) -> Vec<usize>;

    /// Feature indices of neighbourhood `id`, ascending
    fn query_byid(&self, id: usize) -> Result<&[usize]>;
}

/// Fortran-order voxel index to feature index, for a dataset on `shape`
fn feature_lookup(dataset: &Dataset, shape: [usize; 3]) -> Result<Vec<Option<usize>>> {
    if dataset.shape() != shape {
        return Err(SurfingError::Dataset(format!(
            "dataset volume shape {:?} does not match geometry {:?}",
            dataset.shape(), shape
        )));
    }
    let mut lookup = vec![None; shape[0] * shape[1] * shape[2]];
    for (feature, lin) in dataset.feature_linear_indices().into_iter().enumerate() {
        lookup[lin] = Some(feature);
    }
    Ok(lookup)
}

/// Neighbourhoods taken from a [`VoxelSelection`], keyed by node id
#[derive(Clone, Debug)]
pub struct SurfaceVerticesQueryEngine {
    selection: VoxelSelection,
    features: Option<BTreeMap<usize, Vec<usize>>>,
}

impl SurfaceVerticesQueryEngine {
    pub fn new(selection: VoxelSelection) -> Self {
        SurfaceVerticesQueryEngine { selection, features: None }
    }

    pub fn selection(&self) -> &VoxelSelection {
        &self.selection
    }

    pub fn is_trained(&self) -> bool {
        self.features.is_some()
    }
}

impl QueryEngine for SurfaceVerticesQueryEngine {
    fn train(&mut self, dataset: &Dataset) -> Result<()> {
        let lookup = feature_lookup(dataset, self.selection.volgeom().shape())?;

        let mut features = BTreeMap::new();
        let mut dropped = 0usize;
        for (node, voxels) in self.selection.iter() {
            let mut f: Vec<usize> = voxels.iter().filter_map(|&lin| lookup[lin]).collect();
            dropped += voxels.len() - f.len();
            f.sort_unstable();
            features.insert(node, f);
        }
        if dropped > 0 {
            tracing::debug!(dropped, "selected voxels without a dataset feature");
        }

        self.features = Some(features);
        Ok(())
    }

    fn ids(&self) -> Vec<usize> {
        self.selection.keys().collect()
    }

    fn query_byid(&self, id: usize) -> Result<&[usize]> {
        let features = self.features.as_ref().ok_or(SurfingError::NotTrained)?;
        features.get(&id).map(Vec::as_slice).ok_or(SurfingError::UnknownId(id))
    }
}

/// Voxel offsets within a ball of `radius` millimetres
#[derive(Clone, Debug, PartialEq)]
pub struct Sphere {
    radius: f64,
    element_sizes: [f64; 3],
    offsets: Vec<[i64; 3]>,
}

impl Sphere {
    /// Ball of `radius` mm on a grid with voxel sizes `element_sizes`
    pub fn new(radius: f64, element_sizes: [f64; 3]) -> Result<Self> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(SurfingError::InvalidRadius(format!("sphere radius {}", radius)));
        }
        if element_sizes.iter().any(|&s| !s.is_finite() || s <= 0.0) {
            return Err(SurfingError::InvalidRadius(format!("element sizes {:?}", element_sizes)));
        }

        let r_sq = radius * radius;
        let extent = |d: usize| lattice_extent(radius, element_sizes[d]);
        let (ex, ey, ez) = (extent(0), extent(1), extent(2));

        let mut offsets = Vec::new();
        for dk in -ez..=ez {
            let z = dk as f64 * element_sizes[2];
            for dj in -ey..=ey {
                let y = dj as f64 * element_sizes[1];
                for di in -ex..=ex {
                    let x = di as f64 * element_sizes[0];
                    if within_radius_sq(x * x + y * y + z * z, r_sq) {
                        offsets.push([di, dj, dk]);
                    }
                }
            }
        }

        Ok(Sphere { radius, element_sizes, offsets })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn element_sizes(&self) -> [f64; 3] {
        self.element_sizes
    }

    pub fn offsets(&self) -> &[[i64; 3]] {
        &self.offsets
    }

    /// Voxels of the ball centred on `center` that fall inside `shape`
    pub fn neighbors(&self, center: [usize; 3], shape: [usize; 3]) -> Vec<[usize; 3]> {
        self.offsets
            .iter()
            .filter_map(|off| {
                let mut ijk = [0usize; 3];
                for d in 0..3 {
                    let v = center[d] as i64 + off[d];
                    if v < 0 || v >= shape[d] as i64 {
                        return None;
                    }
                    ijk[d] = v as usize;
                }
                Some(ijk)
            })
            .collect()
    }
}

/// Volume searchlight neighbourhoods: a sphere around every feature's voxel
///
/// Ids are feature indices of the trained dataset.
#[derive(Clone, Debug)]
pub struct IndexQueryEngine {
    sphere: Sphere,
    features: Option<Vec<Vec<usize>>>,
}

impl IndexQueryEngine {
    pub fn new(sphere: Sphere) -> Self {
        IndexQueryEngine { sphere, features: None }
    }

    pub fn sphere(&self) -> &Sphere {
        &self.sphere
    }
}

impl QueryEngine for IndexQueryEngine {
    fn train(&mut self, dataset: &Dataset) -> Result<()> {
        let shape = dataset.shape();
        let lookup = feature_lookup(dataset, shape)?;
        let [nx, ny, _] = shape;

        let features = dataset
            .voxel_indices()
            .iter()
            .map(|&center| {
                let mut f: Vec<usize> = self
                    .sphere
                    .neighbors(center, shape)
                    .into_iter()
                    .filter_map(|ijk| lookup[ijk[0] + ijk[1] * nx + ijk[2] * nx * ny])
                    .collect();
                f.sort_unstable();
                f
            })
            .collect();

        self.features = Some(features);
        Ok(())
    }

    fn ids(&self) -> Vec<usize> {
        self.features.as_ref().map_or_else(Vec::new, |f| (0..f.len()).collect())
    }

    fn query_byid(&self, id: usize) -> Result<&[usize]> {
        let features = self.features.as_ref().ok_or(SurfingError::NotTrained)?;
        features.get(id).map(Vec::as_slice).ok_or(SurfingError::UnknownId(id))
    }
}

/// Build a surface query engine in one call
///
/// Resolves the volume (applying `config.volume_mask`) and the surfaces, runs
/// the voxel selection and wraps it. `source` defaults to the intermediate surface.
pub fn disc_surface_queryengine<'a>(
    config: &SelectionConfig,
    volume: impl Into<VolumeSource<'a>>,
    inner: impl Into<SurfaceSource<'a>>,
    outer: impl Into<SurfaceSource<'a>>,
    source: Option<SurfaceSource<'a>>,
) -> Result<SurfaceVerticesQueryEngine> {
    config.validate()?;
    let volgeom = VolGeom::from_any(volume, &config.volume_mask.to_mask_spec())?;
    let volsurf = VolSurf::from_sources(volgeom, outer, inner)?;
    let source = source.map(|s| s.resolve()).transpose()?;

    let selection = voxel_selection(
        &volsurf,
        config.radius,
        source.as_ref(),
        config.source_nodes.as_deref(),
        config.distance_metric,
    )?;
    Ok(SurfaceVerticesQueryEngine::new(selection))
}
