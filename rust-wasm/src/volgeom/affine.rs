//! 4x4 affine transform between voxel indices and world coordinates

use crate::error::{Result, SurfingError};

/// Pivots smaller than this (relative to the largest entry) make the matrix singular
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Voxel-to-world affine with its precomputed inverse
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    forward: [[f64; 4]; 4],
    inverse: [[f64; 4]; 4],
}

impl Affine {
    /// Build from a row-major 4x4 matrix, as stored in `NiftiData::affine`
    pub fn new(m: [f64; 16]) -> Result<Self> {
        let mut forward = [[0.0; 4]; 4];
        for r in 0..4 {
            for c in 0..4 {
                forward[r][c] = m[r * 4 + c];
            }
        }
        if forward.iter().flatten().any(|v| !v.is_finite()) {
            return Err(SurfingError::SingularAffine);
        }
        let inverse = invert(&forward).ok_or(SurfingError::SingularAffine)?;
        Ok(Affine { forward, inverse })
    }

    pub fn identity() -> Self {
        let mut id = [[0.0; 4]; 4];
        for (i, row) in id.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Affine { forward: id, inverse: id }
    }

    /// Diagonal scaling plus translation, the common case for resampled volumes
    pub fn from_scale_translation(scale: [f64; 3], translation: [f64; 3]) -> Result<Self> {
        Affine::new([
            scale[0], 0.0, 0.0, translation[0],
            0.0, scale[1], 0.0, translation[1],
            0.0, 0.0, scale[2], translation[2],
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    /// Voxel coordinates (possibly fractional) to world coordinates
    #[inline]
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        transform(&self.forward, p)
    }

    /// World coordinates to (fractional) voxel coordinates
    #[inline]
    pub fn apply_inverse(&self, p: [f64; 3]) -> [f64; 3] {
        transform(&self.inverse, p)
    }

    /// Spatial part of column `c` (0..3), or the translation for `c == 3`
    pub fn column(&self, c: usize) -> [f64; 3] {
        [self.forward[0][c], self.forward[1][c], self.forward[2][c]]
    }

    /// Length of one voxel step along each voxel axis, in world units
    pub fn element_sizes(&self) -> [f64; 3] {
        let norm = |v: [f64; 3]| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        [norm(self.column(0)), norm(self.column(1)), norm(self.column(2))]
    }

    /// Volume of one voxel in world units
    pub fn voxel_volume(&self) -> f64 {
        let m = &self.forward;
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        det.abs()
    }
}

#[inline]
fn transform(m: &[[f64; 4]; 4], p: [f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (r, o) in out.iter_mut().enumerate() {
        *o = m[r][0] * p[0] + m[r][1] * p[1] + m[r][2] * p[2] + m[r][3];
    }
    out
}

/// Gauss-Jordan elimination with partial pivoting
fn invert(m: &[[f64; 4]; 4]) -> Option<[[f64; 4]; 4]> {
    let scale = m.iter().flatten().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return None;
    }

    let mut a = *m;
    let mut inv = [[0.0; 4]; 4];
    for (i, row) in inv.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))?;
        if a[pivot_row][col].abs() <= SINGULAR_TOLERANCE * scale {
            return None;
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        for c in 0..4 {
            a[col][c] /= pivot;
            inv[col][c] /= pivot;
        }

        for r in 0..4 {
            if r == col {
                continue;
            }
            let factor = a[r][col];
            if factor == 0.0 {
                continue;
            }
            for c in 0..4 {
                a[r][c] -= factor * a[col][c];
                inv[r][c] -= factor * inv[col][c];
            }
        }
    }

    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_inverse() {
        let aff = Affine::new([
            0.0, -2.0, 0.0, 10.0,
            3.0, 0.0, 0.0, -4.0,
            0.0, 0.0, 1.5, 7.0,
            0.0, 0.0, 0.0, 1.0,
        ]).unwrap();

        let p = [1.0, 2.0, 3.0];
        let q = aff.apply_inverse(aff.apply(p));
        for d in 0..3 {
            assert!((p[d] - q[d]).abs() < 1e-12, "axis {}: {} vs {}", d, p[d], q[d]);
        }
        assert_eq!(aff.element_sizes(), [3.0, 2.0, 1.5]);
        assert!((aff.voxel_volume() - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_affine_rejected() {
        let flat = [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        assert!(matches!(Affine::new(flat), Err(SurfingError::SingularAffine)));
        assert!(matches!(Affine::new([0.0; 16]), Err(SurfingError::SingularAffine)));
    }

    #[test]
    fn test_translation_column() {
        let aff = Affine::from_scale_translation([3.0, 3.0, 3.0], [-10.0, 5.0, 0.5]).unwrap();
        assert_eq!(aff.column(3), [-10.0, 5.0, 0.5]);
        assert_eq!(aff.apply([1.0, 1.0, 1.0]), [-7.0, 8.0, 3.5]);
        assert_eq!(Affine::identity().apply_inverse([4.0, 5.0, 6.0]), [4.0, 5.0, 6.0]);
    }
}
