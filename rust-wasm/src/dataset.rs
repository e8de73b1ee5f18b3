//! Sample-by-feature datasets built from 4D volumes
//!
//! Each 3D volume becomes one sample; each voxel kept by the mask becomes one
//! feature. Features are ordered by their Fortran-order linear voxel index.

use ndarray::{Array2, Axis};

use crate::error::{Result, SurfingError};
use crate::nifti_io;
use crate::volgeom::{source::volgeom_from_image, MaskSpec, VolumeSource};

/// Samples plus the voxel each feature came from
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    samples: Array2<f64>,
    voxel_indices: Vec<[usize; 3]>,
    shape: [usize; 3],
    affine: [f64; 16],
}

impl Dataset {
    pub fn new(
        samples: Array2<f64>,
        voxel_indices: Vec<[usize; 3]>,
        shape: [usize; 3],
        affine: [f64; 16],
    ) -> Result<Self> {
        if samples.ncols() != voxel_indices.len() {
            return Err(SurfingError::Dataset(format!(
                "{} feature columns but {} voxel indices",
                samples.ncols(), voxel_indices.len()
            )));
        }
        if let Some(bad) = voxel_indices.iter().find(|ijk| (0..3).any(|d| ijk[d] >= shape[d])) {
            return Err(SurfingError::Dataset(format!(
                "voxel {:?} outside volume shape {:?}", bad, shape
            )));
        }
        Ok(Dataset { samples, voxel_indices, shape, affine })
    }

    pub fn samples(&self) -> &Array2<f64> {
        &self.samples
    }

    pub fn nsamples(&self) -> usize {
        self.samples.nrows()
    }

    pub fn nfeatures(&self) -> usize {
        self.samples.ncols()
    }

    /// Voxel coordinates `[i, j, k]` of each feature
    pub fn voxel_indices(&self) -> &[[usize; 3]] {
        &self.voxel_indices
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Row-major 4x4 voxel-to-world affine of the source image
    pub fn affine(&self) -> [f64; 16] {
        self.affine
    }

    /// Fortran-order linear voxel index of each feature
    pub fn feature_linear_indices(&self) -> Vec<usize> {
        let [nx, ny, _] = self.shape;
        self.voxel_indices
            .iter()
            .map(|ijk| ijk[0] + ijk[1] * nx + ijk[2] * nx * ny)
            .collect()
    }

    /// New dataset restricted to the given feature columns, in the given order
    pub fn select_features(&self, features: &[usize]) -> Result<Dataset> {
        if let Some(&bad) = features.iter().find(|&&f| f >= self.nfeatures()) {
            return Err(SurfingError::Dataset(format!(
                "feature {} out of range ({} features)", bad, self.nfeatures()
            )));
        }
        Ok(Dataset {
            samples: self.samples.select(Axis(1), features),
            voxel_indices: features.iter().map(|&f| self.voxel_indices[f]).collect(),
            shape: self.shape,
            affine: self.affine,
        })
    }

    /// New dataset restricted to the given samples, in the given order
    pub fn select_samples(&self, samples: &[usize]) -> Result<Dataset> {
        if let Some(&bad) = samples.iter().find(|&&s| s >= self.nsamples()) {
            return Err(SurfingError::Dataset(format!(
                "sample {} out of range ({} samples)", bad, self.nsamples()
            )));
        }
        Ok(Dataset {
            samples: self.samples.select(Axis(0), samples),
            voxel_indices: self.voxel_indices.clone(),
            shape: self.shape,
            affine: self.affine,
        })
    }
}

/// Build a dataset from a volume, keeping the voxels selected by `mask`
///
/// A dataset source is returned restricted to the mask, so any `VolumeSource`
/// other than a bare geometry can be used.
pub fn fmri_dataset<'a>(source: impl Into<VolumeSource<'a>>, mask: &MaskSpec) -> Result<Dataset> {
    let img = match source.into() {
        VolumeSource::Path(path) => nifti_io::read_nifti_file(&path)?,
        VolumeSource::Image(img) => img.clone(),
        VolumeSource::Dataset(ds) => {
            let vg = VolumeSource::Dataset(ds).resolve_volgeom(mask)?;
            let keep: Vec<usize> = ds
                .feature_linear_indices()
                .into_iter()
                .enumerate()
                .filter(|&(_, lin)| vg.contains_lin(lin))
                .map(|(f, _)| f)
                .collect();
            return ds.select_features(&keep);
        }
        VolumeSource::Geometry(_) => {
            return Err(SurfingError::Dataset("a geometry carries no voxel values".into()));
        }
    };

    let vg = volgeom_from_image(&img, mask)?;
    let features = vg.masked_indices();
    let nt = img.dims.3;

    let mut samples = Array2::<f64>::zeros((nt, features.len()));
    for t in 0..nt {
        let volume = img.volume(t)?;
        for (f, &lin) in features.iter().enumerate() {
            samples[[t, f]] = volume[lin];
        }
    }

    let voxel_indices = features.iter().map(|&lin| vg.lin2ijk(lin)).collect();
    tracing::debug!(nsamples = nt, nfeatures = features.len(), "built dataset");

    Dataset::new(samples, voxel_indices, vg.shape(), img.affine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nifti_io::NiftiData;

    const IDENTITY: [f64; 16] = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ];

    fn image() -> NiftiData {
        // 2x2x1, two volumes
        NiftiData::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 6.0, 7.0], (2, 2, 1, 2), IDENTITY).unwrap()
    }

    #[test]
    fn test_fmri_dataset_layout() {
        let ds = fmri_dataset(&image(), &MaskSpec::None).unwrap();
        assert_eq!(ds.nsamples(), 2);
        assert_eq!(ds.nfeatures(), 4);
        assert_eq!(ds.voxel_indices()[2], [0, 1, 0]);
        assert_eq!(ds.samples()[[1, 3]], 7.0);
        assert_eq!(ds.feature_linear_indices(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_fmri_dataset_masked() {
        let ds = fmri_dataset(&image(), &MaskSpec::Volume(1)).unwrap();
        assert_eq!(ds.feature_linear_indices(), vec![0, 2, 3]);
        assert_eq!(ds.samples().row(0).to_vec(), vec![0.0, 2.0, 3.0]);

        // Re-masking a dataset only drops features
        let again = fmri_dataset(&ds, &MaskSpec::Volume(0)).unwrap();
        assert_eq!(again.feature_linear_indices(), vec![2, 3]);
    }

    #[test]
    fn test_select_features() {
        let ds = fmri_dataset(&image(), &MaskSpec::None).unwrap();
        let sub = ds.select_features(&[3, 1]).unwrap();
        assert_eq!(sub.nfeatures(), 2);
        assert_eq!(sub.voxel_indices(), &[[1, 1, 0], [1, 0, 0]]);
        assert_eq!(sub.samples()[[0, 0]], 3.0);
        assert!(ds.select_features(&[4]).is_err());
        assert_eq!(ds.select_samples(&[1]).unwrap().nsamples(), 1);
    }

    #[test]
    fn test_new_checks_columns() {
        let err = Dataset::new(Array2::zeros((1, 2)), vec![[0, 0, 0]], [1, 1, 1], IDENTITY);
        assert!(matches!(err, Err(SurfingError::Dataset(_))));
    }
}
