//! Searchlight: apply a measure to every neighbourhood of a query engine
//!
//! Output has one column per neighbourhood and one row per measure value.

use ndarray::{Array1, Array2, Axis};

use crate::dataset::Dataset;
use crate::error::{Result, SurfingError};
use crate::queryengine::QueryEngine;

/// Computation applied to the dataset restricted to one neighbourhood
pub trait Measure: Send + Sync {
    fn call(&self, dataset: &Dataset) -> Result<Array1<f64>>;
}

/// Number of features in the neighbourhood
#[derive(Clone, Copy, Debug, Default)]
pub struct VoxelCountMeasure;

impl Measure for VoxelCountMeasure {
    fn call(&self, dataset: &Dataset) -> Result<Array1<f64>> {
        Ok(Array1::from_elem(1, dataset.nfeatures() as f64))
    }
}

/// Mean over features, one value per sample; NaN for an empty neighbourhood
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanMeasure;

impl Measure for MeanMeasure {
    fn call(&self, dataset: &Dataset) -> Result<Array1<f64>> {
        Ok(dataset
            .samples()
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::from_elem(dataset.nsamples(), f64::NAN)))
    }
}

/// Reduction applied to the stacked searchlight output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Postproc {
    /// Average over rows, giving a single row
    MeanSample,
}

impl Postproc {
    fn apply(&self, results: Array2<f64>) -> Array2<f64> {
        match self {
            Postproc::MeanSample => {
                let n = results.ncols();
                match results.mean_axis(Axis(0)) {
                    Some(mean) => mean.insert_axis(Axis(0)),
                    None => Array2::from_elem((1, n), f64::NAN),
                }
            }
        }
    }
}

/// Runs a [`Measure`] over the neighbourhoods of a [`QueryEngine`]
pub struct Searchlight<Q, M> {
    queryengine: Q,
    measure: M,
    roi_ids: Option<Vec<usize>>,
    postproc: Option<Postproc>,
}

impl<Q: QueryEngine + Sync, M: Measure> Searchlight<Q, M> {
    pub fn new(measure: M, queryengine: Q) -> Self {
        Searchlight { queryengine, measure, roi_ids: None, postproc: None }
    }

    /// Only visit these neighbourhoods, in this order
    pub fn with_roi_ids(mut self, ids: Vec<usize>) -> Self {
        self.roi_ids = Some(ids);
        self
    }

    pub fn with_postproc(mut self, postproc: Postproc) -> Self {
        self.postproc = Some(postproc);
        self
    }

    pub fn queryengine(&self) -> &Q {
        &self.queryengine
    }

    /// Train the query engine on `dataset` and evaluate every neighbourhood
    ///
    /// Returns a `(k, n)` matrix for `n` neighbourhoods and a measure yielding
    /// `k` values, or `(1, n)` after [`Postproc::MeanSample`].
    pub fn run(&mut self, dataset: &Dataset) -> Result<Array2<f64>> {
        self.queryengine.train(dataset)?;
        let ids = match &self.roi_ids {
            Some(ids) => ids.clone(),
            None => self.queryengine.ids(),
        };
        tracing::info!(neighbourhoods = ids.len(), nfeatures = dataset.nfeatures(), "running searchlight");

        let columns = self.evaluate(dataset, &ids)?;

        let k = columns.first().map_or(0, Array1::len);
        if let Some((i, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != k) {
            return Err(SurfingError::Dataset(format!(
                "measure returned {} values for neighbourhood {}, expected {}",
                col.len(), ids[i], k
            )));
        }

        let mut results = Array2::<f64>::zeros((k, ids.len()));
        for (mut dst, col) in results.columns_mut().into_iter().zip(&columns) {
            dst.assign(col);
        }

        Ok(match self.postproc {
            Some(p) => p.apply(results),
            None => results,
        })
    }

    #[cfg(feature = "parallel")]
    fn evaluate(&self, dataset: &Dataset, ids: &[usize]) -> Result<Vec<Array1<f64>>> {
        use rayon::prelude::*;
        ids.par_iter().map(|&id| self.evaluate_one(dataset, id)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate(&self, dataset: &Dataset, ids: &[usize]) -> Result<Vec<Array1<f64>>> {
        ids.iter().map(|&id| self.evaluate_one(dataset, id)).collect()
    }

    fn evaluate_one(&self, dataset: &Dataset, id: usize) -> Result<Array1<f64>> {
        let features = self.queryengine.query_byid(id)?;
        self.measure.call(&dataset.select_features(features)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fmri_dataset;
    use crate::nifti_io::NiftiData;
    use crate::queryengine::{IndexQueryEngine, Sphere};
    use crate::volgeom::MaskSpec;

    const IDENTITY: [f64; 16] = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ];

    fn dataset() -> Dataset {
        // 3x3x1, two samples: second sample is the first plus 10
        let first: Vec<f64> = (0..9).map(|v| v as f64).collect();
        let second: Vec<f64> = first.iter().map(|v| v + 10.0).collect();
        let data = [first, second].concat();
        let img = NiftiData::new(data, (3, 3, 1, 2), IDENTITY).unwrap();
        fmri_dataset(&img, &MaskSpec::None).unwrap()
    }

    fn volume_searchlight<M: Measure>(measure: M) -> Searchlight<IndexQueryEngine, M> {
        Searchlight::new(measure, IndexQueryEngine::new(Sphere::new(1.0, [1.0; 3]).unwrap()))
    }

    #[test]
    fn test_voxel_counts() {
        let out = volume_searchlight(VoxelCountMeasure).run(&dataset()).unwrap();
        assert_eq!(out.dim(), (1, 9));
        // Corners see 3 voxels, edges 4, the centre 5
        assert_eq!(out.row(0).to_vec(), vec![3.0, 4.0, 3.0, 4.0, 5.0, 4.0, 3.0, 4.0, 3.0]);
    }

    #[test]
    fn test_mean_measure_and_postproc() {
        let ds = dataset();
        let out = volume_searchlight(MeanMeasure).run(&ds).unwrap();
        assert_eq!(out.dim(), (2, 9));
        // Centre: mean of 1, 3, 4, 5, 7
        assert_eq!(out[[0, 4]], 4.0);
        assert_eq!(out[[1, 4]], 14.0);

        let averaged = volume_searchlight(MeanMeasure)
            .with_postproc(Postproc::MeanSample)
            .run(&ds)
            .unwrap();
        assert_eq!(averaged.dim(), (1, 9));
        assert_eq!(averaged[[0, 4]], 9.0);
    }

    #[test]
    fn test_roi_ids() {
        let mut sl = volume_searchlight(VoxelCountMeasure).with_roi_ids(vec![4, 0]);
        let out = sl.run(&dataset()).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![5.0, 3.0]);
        assert_eq!(sl.queryengine().ids().len(), 9);

        let mut bad = volume_searchlight(VoxelCountMeasure).with_roi_ids(vec![9]);
        assert!(matches!(bad.run(&dataset()), Err(SurfingError::UnknownId(9))));
    }

    #[test]
    fn test_empty_neighbourhood_mean_is_nan() {
        let ds = dataset().select_features(&[]).unwrap();
        let out = MeanMeasure.call(&ds).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.is_nan()));
    }
}
