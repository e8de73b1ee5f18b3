//! Point-to-segment distances and per-node voxel ownership

use crate::volgeom::VolGeom;

/// Relative slack on a squared radius; distances within it count as on the radius
const RADIUS_SLACK: f64 = 1e-9;

/// True if a squared distance lies within a squared radius, up to rounding
///
/// Shared by every voxel-in-radius test so that voxels exactly on the radius
/// are kept whether their distance came from world coordinates or lattice offsets.
#[inline]
pub(crate) fn within_radius_sq(d_sq: f64, r_sq: f64) -> bool {
    d_sq <= r_sq * (1.0 + RADIUS_SLACK)
}

/// Largest lattice step count along an axis with voxel size `step` inside `radius`
#[inline]
pub(crate) fn lattice_extent(radius: f64, step: f64) -> i64 {
    (radius * (1.0 + RADIUS_SLACK) / step).floor() as i64
}

/// Closed line segment between an inner and an outer surface vertex
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    a: [f64; 3],
    dir: [f64; 3],
    len_sq: f64,
}

impl Segment {
    pub fn new(a: [f64; 3], b: [f64; 3]) -> Self {
        let dir = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let len_sq = dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2];
        Segment { a, dir, len_sq }
    }

    /// Squared Euclidean distance from `p` to the nearest point of the segment
    ///
    /// The projection parameter is clamped to [0, 1]; a zero-length segment is a point.
    #[inline]
    pub fn distance_sq(&self, p: [f64; 3]) -> f64 {
        let ap = [p[0] - self.a[0], p[1] - self.a[1], p[2] - self.a[2]];
        let t = if self.len_sq > 0.0 {
            ((ap[0] * self.dir[0] + ap[1] * self.dir[1] + ap[2] * self.dir[2]) / self.len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let c = [
            self.a[0] + t * self.dir[0],
            self.a[1] + t * self.dir[1],
            self.a[2] + t * self.dir[2],
        ];
        let d = [p[0] - c[0], p[1] - c[1], p[2] - c[2]];
        d[0] * d[0] + d[1] * d[1] + d[2] * d[2]
    }

    pub fn length(&self) -> f64 {
        self.len_sq.sqrt()
    }

    /// Axis-aligned world box around the segment, grown by `margin` on every side
    pub fn bounds(&self, margin: f64) -> ([f64; 3], [f64; 3]) {
        let mut lo = [0.0; 3];
        let mut hi = [0.0; 3];
        for d in 0..3 {
            let b = self.a[d] + self.dir[d];
            lo[d] = self.a[d].min(b) - margin;
            hi[d] = self.a[d].max(b) + margin;
        }
        (lo, hi)
    }

    /// Masked voxels within `radius` of the segment as `(distance², linear index)`
    ///
    /// Unsorted; the caller orders them.
    pub fn voxels_within(&self, volgeom: &VolGeom, radius: f64) -> Vec<(f64, usize)> {
        let (lo, hi) = self.bounds(radius * (1.0 + RADIUS_SLACK));
        let Some((first, last)) = volgeom.voxel_box(lo, hi) else {
            return Vec::new();
        };

        let r_sq = radius * radius;
        let mut found = Vec::new();
        for k in first[2]..=last[2] {
            for j in first[1]..=last[1] {
                for i in first[0]..=last[0] {
                    let ijk = [i, j, k];
                    let lin = volgeom.ijk2lin(ijk);
                    if !volgeom.contains_lin(lin) {
                        continue;
                    }
                    let d_sq = self.distance_sq(volgeom.ijk2xyz(ijk));
                    if within_radius_sq(d_sq, r_sq) {
                        found.push((d_sq, lin));
                    }
                }
            }
        }
        found
    }

    /// Largest squared distance from the segment to any voxel centre of the grid
    pub fn max_distance_sq_to_grid(&self, volgeom: &VolGeom) -> f64 {
        let [nx, ny, nz] = volgeom.shape();
        if nx == 0 || ny == 0 || nz == 0 {
            return 0.0;
        }
        // Distance to a convex set is convex, so the maximum over the grid box is at a corner
        let mut worst: f64 = 0.0;
        for corner in 0..8 {
            let ijk = [
                if corner & 1 == 0 { 0 } else { nx - 1 },
                if corner & 2 == 0 { 0 } else { ny - 1 },
                if corner & 4 == 0 { 0 } else { nz - 1 },
            ];
            worst = worst.max(self.distance_sq(volgeom.ijk2xyz(ijk)));
        }
        worst
    }
}

/// Voxels assigned to the node whose segment is nearest, within a reach
///
/// Ties go to the lowest node index. Voxels farther than `reach` from every
/// segment have no owner.
pub struct OwnerMap {
    reach: f64,
    owned: Vec<Vec<(f64, usize)>>,
}

impl OwnerMap {
    pub fn build(volgeom: &VolGeom, segments: &[Segment], reach: f64) -> Self {
        let mut best: Vec<(f64, usize)> = vec![(f64::INFINITY, usize::MAX); volgeom.nvoxels()];
        for (node, seg) in segments.iter().enumerate() {
            for (d_sq, lin) in seg.voxels_within(volgeom, reach) {
                if d_sq < best[lin].0 {
                    best[lin] = (d_sq, node);
                }
            }
        }

        let mut owned: Vec<Vec<(f64, usize)>> = vec![Vec::new(); segments.len()];
        for (lin, &(d_sq, node)) in best.iter().enumerate() {
            if node != usize::MAX {
                owned[node].push((d_sq, lin));
            }
        }

        tracing::debug!(reach, nodes = segments.len(), "built voxel owner map");
        OwnerMap { reach, owned }
    }

    pub fn reach(&self) -> f64 {
        self.reach
    }

    /// `(distance², linear index)` of the voxels owned by `node`
    pub fn owned(&self, node: usize) -> &[(f64, usize)] {
        &self.owned[node]
    }
}
