//! Volume inputs accepted by the selection entry points

use std::path::{Path, PathBuf};

use ndarray::Array3;

use super::{Affine, VolGeom};
use crate::dataset::Dataset;
use crate::error::{Result, SurfingError};
use crate::nifti_io::{self, NiftiData};

/// How voxels of the source volume restrict the geometry
#[derive(Clone, Debug, Default, PartialEq)]
pub enum MaskSpec {
    /// No mask from voxel values. Dataset sources still keep only their own features.
    #[default]
    None,
    /// Keep voxels that are non-zero in any volume
    NonZero,
    /// Keep voxels that are non-zero in the given 4D volume
    Volume(usize),
    /// Keep voxels whose value in the first volume equals this integer
    Value(i64),
    /// Explicit boolean mask, indexed `[i, j, k]`; must match the volume shape
    Explicit(Array3<bool>),
}

/// A volume given as a file, an in-memory image, a dataset or a ready geometry
#[derive(Clone, Debug)]
pub enum VolumeSource<'a> {
    Path(PathBuf),
    Image(&'a NiftiData),
    Dataset(&'a Dataset),
    Geometry(&'a VolGeom),
}

impl<'a> From<&'a Path> for VolumeSource<'a> {
    fn from(p: &'a Path) -> Self {
        VolumeSource::Path(p.to_path_buf())
    }
}

impl From<PathBuf> for VolumeSource<'_> {
    fn from(p: PathBuf) -> Self {
        VolumeSource::Path(p)
    }
}

impl<'a> From<&'a PathBuf> for VolumeSource<'a> {
    fn from(p: &'a PathBuf) -> Self {
        VolumeSource::Path(p.clone())
    }
}

impl<'a> From<&'a NiftiData> for VolumeSource<'a> {
    fn from(img: &'a NiftiData) -> Self {
        VolumeSource::Image(img)
    }
}

impl<'a> From<&'a Dataset> for VolumeSource<'a> {
    fn from(ds: &'a Dataset) -> Self {
        VolumeSource::Dataset(ds)
    }
}

impl<'a> From<&'a VolGeom> for VolumeSource<'a> {
    fn from(vg: &'a VolGeom) -> Self {
        VolumeSource::Geometry(vg)
    }
}

impl VolumeSource<'_> {
    pub(crate) fn resolve_volgeom(&self, mask: &MaskSpec) -> Result<VolGeom> {
        match self {
            VolumeSource::Path(path) => {
                let img = nifti_io::read_nifti_file(path)?;
                volgeom_from_image(&img, mask)
            }
            VolumeSource::Image(img) => volgeom_from_image(img, mask),
            VolumeSource::Dataset(ds) => volgeom_from_dataset(ds, mask),
            VolumeSource::Geometry(vg) => volgeom_from_geometry(vg, mask),
        }
    }
}

fn check_explicit_shape(mask: &Array3<bool>, shape: [usize; 3]) -> Result<()> {
    let dim = mask.dim();
    if [dim.0, dim.1, dim.2] != shape {
        return Err(SurfingError::InvalidMask(format!(
            "mask shape {:?} does not match volume shape {:?}",
            [dim.0, dim.1, dim.2], shape
        )));
    }
    Ok(())
}

fn explicit_flat(mask: &Array3<bool>, shape: [usize; 3]) -> Result<Vec<bool>> {
    check_explicit_shape(mask, shape)?;
    let mut flat = Vec::with_capacity(shape[0] * shape[1] * shape[2]);
    for k in 0..shape[2] {
        for j in 0..shape[1] {
            for i in 0..shape[0] {
                flat.push(mask[[i, j, k]]);
            }
        }
    }
    Ok(flat)
}

pub(crate) fn volgeom_from_image(img: &NiftiData, mask: &MaskSpec) -> Result<VolGeom> {
    let (nx, ny, nz, nt) = img.dims;
    let shape = [nx, ny, nz];
    let affine = Affine::new(img.affine)?;
    let n = img.nvoxels();

    let flat = match mask {
        MaskSpec::None => None,
        MaskSpec::NonZero => {
            let mut m = vec![false; n];
            for t in 0..nt {
                for (keep, &v) in m.iter_mut().zip(img.volume(t)?) {
                    *keep |= v != 0.0;
                }
            }
            Some(m)
        }
        MaskSpec::Volume(t) => {
            if *t >= nt {
                return Err(SurfingError::InvalidMask(format!(
                    "mask volume {} requested, image has {} volumes", t, nt
                )));
            }
            Some(img.volume(*t)?.iter().map(|&v| v != 0.0).collect())
        }
        MaskSpec::Value(value) => {
            let target = *value as f64;
            Some(img.volume(0)?.iter().map(|&v| v == target).collect())
        }
        MaskSpec::Explicit(m) => Some(explicit_flat(m, shape)?),
    };

    Ok(VolGeom::new(shape, affine, flat)?.with_nt(nt))
}

fn volgeom_from_dataset(ds: &Dataset, mask: &MaskSpec) -> Result<VolGeom> {
    let shape = ds.shape();
    let affine = Affine::new(ds.affine())?;
    let nsamples = ds.nsamples();
    let samples = ds.samples();

    let keep_feature: Vec<bool> = match mask {
        MaskSpec::None | MaskSpec::Explicit(_) => vec![true; ds.nfeatures()],
        MaskSpec::NonZero => samples
            .columns()
            .into_iter()
            .map(|col| col.iter().any(|&v| v != 0.0))
            .collect(),
        MaskSpec::Volume(t) => {
            if *t >= nsamples {
                return Err(SurfingError::InvalidMask(format!(
                    "mask volume {} requested, dataset has {} samples", t, nsamples
                )));
            }
            samples.row(*t).iter().map(|&v| v != 0.0).collect()
        }
        MaskSpec::Value(value) => {
            if nsamples == 0 {
                return Err(SurfingError::InvalidMask("dataset has no samples to compare against".into()));
            }
            let target = *value as f64;
            samples.row(0).iter().map(|&v| v == target).collect()
        }
    };

    let explicit = match mask {
        MaskSpec::Explicit(m) => Some(explicit_flat(m, shape)?),
        _ => None,
    };

    let nvoxels = shape[0] * shape[1] * shape[2];
    let mut flat = vec![false; nvoxels];
    for (lin, keep) in ds.feature_linear_indices().into_iter().zip(keep_feature) {
        let in_explicit = explicit.as_ref().map_or(true, |m| m[lin]);
        flat[lin] = keep && in_explicit;
    }

    Ok(VolGeom::new(shape, affine, Some(flat))?.with_nt(nsamples))
}

fn volgeom_from_geometry(vg: &VolGeom, mask: &MaskSpec) -> Result<VolGeom> {
    match mask {
        MaskSpec::None => Ok(vg.clone()),
        MaskSpec::Explicit(m) => {
            let extra = explicit_flat(m, vg.shape())?;
            let combined = match vg.mask() {
                Some(base) => base.iter().zip(&extra).map(|(&a, &b)| a && b).collect(),
                None => extra,
            };
            Ok(VolGeom::new(vg.shape(), *vg.affine(), Some(combined))?.with_nt(vg.nt()))
        }
        other => Err(SurfingError::InvalidMask(format!(
            "{:?} needs voxel values, but only a geometry was given", other
        ))),
    }
}
