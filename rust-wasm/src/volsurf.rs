//! Pairing of a volume with inner and outer cortical surfaces
//!
//! Node `n` owns the segment from `inner[n]` to `outer[n]`; voxel selection
//! measures distances to these segments.

use crate::error::Result;
use crate::surf::{Surface, SurfaceSource};
use crate::volgeom::VolGeom;

/// Volume geometry plus two parallel surfaces
#[derive(Clone, Debug, PartialEq)]
pub struct VolSurf {
    volgeom: VolGeom,
    outer: Surface,
    inner: Surface,
}

impl VolSurf {
    /// Combine a geometry with outer (pial) and inner (white) surfaces
    pub fn new(volgeom: VolGeom, outer: Surface, inner: Surface) -> Result<Self> {
        outer.check_parallel(&inner, "inner surface")?;
        Ok(VolSurf { volgeom, outer, inner })
    }

    /// Like [`VolSurf::new`], loading surfaces given as files
    pub fn from_sources<'a>(
        volgeom: VolGeom,
        outer: impl Into<SurfaceSource<'a>>,
        inner: impl Into<SurfaceSource<'a>>,
    ) -> Result<Self> {
        VolSurf::new(volgeom, outer.into().resolve()?, inner.into().resolve()?)
    }

    pub fn volgeom(&self) -> &VolGeom {
        &self.volgeom
    }

    pub fn outer(&self) -> &Surface {
        &self.outer
    }

    pub fn inner(&self) -> &Surface {
        &self.inner
    }

    pub fn nvertices(&self) -> usize {
        self.inner.nvertices()
    }

    /// Endpoints `(inner, outer)` of the segment owned by `node`
    #[inline]
    pub fn segment(&self, node: usize) -> ([f64; 3], [f64; 3]) {
        (self.inner.vertex(node), self.outer.vertex(node))
    }

    /// Surface at fraction `w` from inner (0) to outer (1)
    pub fn intermediate(&self, w: f64) -> Result<Surface> {
        self.inner.interpolate(&self.outer, w)
    }
}
