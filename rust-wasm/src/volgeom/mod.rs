//! Volume geometry: grid shape, voxel-to-world affine and optional mask
//!
//! Linear voxel indices use Fortran order (x varies fastest) to match NIfTI:
//! index = i + j*nx + k*nx*ny

mod affine;
pub(crate) mod source;

pub use affine::Affine;
pub use source::{MaskSpec, VolumeSource};

use crate::error::{Result, SurfingError};

/// Shape, affine and mask of a voxel grid
#[derive(Clone, Debug, PartialEq)]
pub struct VolGeom {
    shape: [usize; 3],
    nt: usize,
    affine: Affine,
    mask: Option<Vec<bool>>,
}

impl VolGeom {
    /// Create a geometry; `mask` (if any) is in Fortran order and must cover the grid
    pub fn new(shape: [usize; 3], affine: Affine, mask: Option<Vec<bool>>) -> Result<Self> {
        let nvoxels = shape[0] * shape[1] * shape[2];
        if let Some(m) = &mask {
            if m.len() != nvoxels {
                return Err(SurfingError::InvalidMask(format!(
                    "mask has {} elements, volume {}x{}x{} has {}",
                    m.len(), shape[0], shape[1], shape[2], nvoxels
                )));
            }
        }
        Ok(VolGeom { shape, nt: 1, affine, mask })
    }

    /// Resolve any volume representation into a geometry, applying `mask`
    pub fn from_any<'a>(source: impl Into<VolumeSource<'a>>, mask: &MaskSpec) -> Result<Self> {
        source.into().resolve_volgeom(mask)
    }

    pub(crate) fn with_nt(mut self, nt: usize) -> Self {
        self.nt = nt.max(1);
        self
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Number of volumes along the 4th dimension of the source image
    pub fn nt(&self) -> usize {
        self.nt
    }

    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    pub fn mask(&self) -> Option<&[bool]> {
        self.mask.as_deref()
    }

    /// Total number of voxels in the grid
    pub fn nvoxels(&self) -> usize {
        self.shape[0] * self.shape[1] * self.shape[2]
    }

    /// Number of voxels inside the mask (all voxels if unmasked)
    pub fn nvoxels_mask(&self) -> usize {
        match &self.mask {
            Some(m) => m.iter().filter(|&&v| v).count(),
            None => self.nvoxels(),
        }
    }

    #[inline]
    pub fn ijk2lin(&self, ijk: [usize; 3]) -> usize {
        ijk[0] + ijk[1] * self.shape[0] + ijk[2] * self.shape[0] * self.shape[1]
    }

    #[inline]
    pub fn lin2ijk(&self, lin: usize) -> [usize; 3] {
        let nx = self.shape[0];
        let nxy = nx * self.shape[1];
        [lin % nx, (lin % nxy) / nx, lin / nxy]
    }

    /// World coordinates of a voxel centre
    #[inline]
    pub fn ijk2xyz(&self, ijk: [usize; 3]) -> [f64; 3] {
        self.affine.apply([ijk[0] as f64, ijk[1] as f64, ijk[2] as f64])
    }

    #[inline]
    pub fn lin2xyz(&self, lin: usize) -> [f64; 3] {
        self.ijk2xyz(self.lin2ijk(lin))
    }

    /// Voxel whose centre is nearest to a world coordinate, if it lies in the grid
    pub fn xyz2ijk(&self, p: [f64; 3]) -> Option<[usize; 3]> {
        let v = self.affine.apply_inverse(p);
        let mut ijk = [0usize; 3];
        for d in 0..3 {
            let r = v[d].round();
            if r < 0.0 || r >= self.shape[d] as f64 {
                return None;
            }
            ijk[d] = r as usize;
        }
        Some(ijk)
    }

    pub fn contains_ijk(&self, ijk: [usize; 3]) -> bool {
        ijk.iter().zip(self.shape.iter()).all(|(&i, &n)| i < n) && self.in_mask(self.ijk2lin(ijk))
    }

    /// True if `lin` is inside the grid and the mask
    pub fn contains_lin(&self, lin: usize) -> bool {
        lin < self.nvoxels() && self.in_mask(lin)
    }

    #[inline]
    fn in_mask(&self, lin: usize) -> bool {
        self.mask.as_ref().map_or(true, |m| m[lin])
    }

    /// Linear indices of all voxels in the mask, ascending
    pub fn masked_indices(&self) -> Vec<usize> {
        (0..self.nvoxels()).filter(|&lin| self.in_mask(lin)).collect()
    }

    /// Inclusive voxel index range whose centres may fall in an axis-aligned world box
    ///
    /// Returns `None` when the box misses the grid entirely.
    pub fn voxel_box(&self, lo: [f64; 3], hi: [f64; 3]) -> Option<([usize; 3], [usize; 3])> {
        let mut vmin = [f64::INFINITY; 3];
        let mut vmax = [f64::NEG_INFINITY; 3];
        for corner in 0..8 {
            let p = [
                if corner & 1 == 0 { lo[0] } else { hi[0] },
                if corner & 2 == 0 { lo[1] } else { hi[1] },
                if corner & 4 == 0 { lo[2] } else { hi[2] },
            ];
            let v = self.affine.apply_inverse(p);
            for d in 0..3 {
                vmin[d] = vmin[d].min(v[d]);
                vmax[d] = vmax[d].max(v[d]);
            }
        }

        let mut first = [0usize; 3];
        let mut last = [0usize; 3];
        for d in 0..3 {
            let top = self.shape[d] as f64 - 1.0;
            let a = vmin[d].floor().max(0.0);
            let b = vmax[d].ceil().min(top);
            if self.shape[d] == 0 || a > b {
                return None;
            }
            first[d] = a as usize;
            last[d] = b as usize;
        }
        Some((first, last))
    }
}
