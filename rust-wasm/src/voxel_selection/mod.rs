//! Voxel selection: which voxels belong to each surface node's neighbourhood
//!
//! Every node owns the segment between its inner and outer surface vertex. A
//! voxel joins a node's neighbourhood when its centre lies within the radius of
//! that segment, measured either in straight lines (Euclidean) or along the
//! source surface (Dijkstra).
//!
//! Each neighbourhood is sorted by distance, then by linear voxel index.

mod geometry;

pub use geometry::Segment;
use geometry::OwnerMap;
pub(crate) use geometry::{lattice_extent, within_radius_sq};

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SurfingError};
use crate::surf::{geodesic_distances, Surface};
use crate::volgeom::VolGeom;
use crate::volsurf::VolSurf;

/// Factor by which the search radius grows while looking for a voxel count
const GROWTH: f64 = 1.5;

/// How distances from a node to a voxel are measured
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DistanceMetric {
    /// Straight-line distance to the node's segment
    #[default]
    Euclidean,
    /// Path length along the source surface to the voxel's nearest node, plus
    /// the straight-line distance from that node's segment
    Dijkstra,
}

impl FromStr for DistanceMetric {
    type Err = SurfingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "e" | "euclidean" | "euclidian" => Ok(DistanceMetric::Euclidean),
            "d" | "dijkstra" => Ok(DistanceMetric::Dijkstra),
            _ => Err(SurfingError::UnknownMetric(s.to_string())),
        }
    }
}

impl TryFrom<String> for DistanceMetric {
    type Error = SurfingError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DistanceMetric> for String {
    fn from(m: DistanceMetric) -> String {
        m.to_string()
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Euclidean => write!(f, "euclidean"),
            DistanceMetric::Dijkstra => write!(f, "dijkstra"),
        }
    }
}

/// Neighbourhood size: a distance in millimetres, or a number of voxels
///
/// In configuration files an integer is a voxel count and a float a distance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Radius {
    Count(usize),
    Distance(f64),
}

impl Radius {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Radius::Count(0) => Err(SurfingError::InvalidRadius("voxel count must be at least 1".into())),
            Radius::Distance(r) if !r.is_finite() || r <= 0.0 => {
                Err(SurfingError::InvalidRadius(format!("distance must be positive and finite, got {}", r)))
            }
            _ => Ok(()),
        }
    }
}

impl From<f64> for Radius {
    fn from(r: f64) -> Self {
        Radius::Distance(r)
    }
}

impl From<usize> for Radius {
    fn from(n: usize) -> Self {
        Radius::Count(n)
    }
}

impl fmt::Display for Radius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Radius::Count(n) => write!(f, "{} voxels", n),
            Radius::Distance(r) => write!(f, "{} mm", r),
        }
    }
}

/// Node id to voxel linear indices, for the nodes a selection was run on
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelSelection {
    volgeom: VolGeom,
    radius: Radius,
    metric: DistanceMetric,
    map: BTreeMap<usize, Vec<usize>>,
}

impl VoxelSelection {
    /// Node ids, ascending
    pub fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.keys().copied()
    }

    /// Voxels around `node`, nearest first; `None` if the node was not selected on
    pub fn get(&self, node: usize) -> Option<&[usize]> {
        self.map.get(&node).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.map.iter().map(|(&node, voxels)| (node, voxels.as_slice()))
    }

    /// Number of voxels in each neighbourhood
    pub fn voxel_counts(&self) -> BTreeMap<usize, usize> {
        self.map.iter().map(|(&node, voxels)| (node, voxels.len())).collect()
    }

    pub fn volgeom(&self) -> &VolGeom {
        &self.volgeom
    }

    pub fn radius(&self) -> Radius {
        self.radius
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Fortran-order volume flagging every voxel that is in some neighbourhood
    pub fn get_mask(&self) -> Vec<bool> {
        let mut mask = vec![false; self.volgeom.nvoxels()];
        for voxels in self.map.values() {
            for &lin in voxels {
                mask[lin] = true;
            }
        }
        mask
    }

    /// Copy keeping only voxels set in `mask` (Fortran order, one flag per voxel)
    pub fn masked(&self, mask: &[bool]) -> Result<VoxelSelection> {
        let nvoxels = self.volgeom.nvoxels();
        if mask.len() != nvoxels {
            return Err(SurfingError::InvalidMask(format!(
                "mask has {} elements, volume has {}", mask.len(), nvoxels
            )));
        }

        let combined = match self.volgeom.mask() {
            Some(base) => base.iter().zip(mask).map(|(&a, &b)| a && b).collect(),
            None => mask.to_vec(),
        };
        let volgeom = VolGeom::new(self.volgeom.shape(), *self.volgeom.affine(), Some(combined))?
            .with_nt(self.volgeom.nt());

        let map = self
            .map
            .iter()
            .map(|(&node, voxels)| (node, voxels.iter().copied().filter(|&lin| mask[lin]).collect()))
            .collect();

        Ok(VoxelSelection { volgeom, radius: self.radius, metric: self.metric, map })
    }
}

/// Configures and runs a voxel selection over a [`VolSurf`]
///
/// ```ignore
/// let sel = VoxelSelector::new(&vs, 10.0)
///     .metric(DistanceMetric::Dijkstra)
///     .source_nodes(&[0, 5, 9])
///     .run()?;
/// ```
#[derive(Clone, Debug)]
pub struct VoxelSelector<'a> {
    volsurf: &'a VolSurf,
    radius: Radius,
    metric: DistanceMetric,
    source_surface: Option<&'a Surface>,
    source_nodes: Option<&'a [usize]>,
}

impl<'a> VoxelSelector<'a> {
    pub fn new(volsurf: &'a VolSurf, radius: impl Into<Radius>) -> Self {
        VoxelSelector {
            volsurf,
            radius: radius.into(),
            metric: DistanceMetric::default(),
            source_surface: None,
            source_nodes: None,
        }
    }

    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Surface whose vertices are the centre nodes; defaults to the
    /// intermediate surface halfway between inner and outer
    pub fn source_surface(mut self, surface: &'a Surface) -> Self {
        self.source_surface = Some(surface);
        self
    }

    /// Restrict the selection to these nodes; duplicates are ignored
    pub fn source_nodes(mut self, nodes: &'a [usize]) -> Self {
        self.source_nodes = Some(nodes);
        self
    }

    pub fn run(&self) -> Result<VoxelSelection> {
        self.radius.validate()?;
        let vs = self.volsurf;
        let volgeom = vs.volgeom();
        let nvertices = vs.nvertices();

        let source: Cow<'_, Surface> = match self.source_surface {
            Some(s) => {
                vs.inner().check_parallel(s, "source surface")?;
                Cow::Borrowed(s)
            }
            None => Cow::Owned(vs.intermediate(0.5)?),
        };

        let nodes: Vec<usize> = match self.source_nodes {
            Some(requested) => {
                let unique: BTreeSet<usize> = requested.iter().copied().collect();
                if let Some(&node) = unique.iter().find(|&&n| n >= nvertices) {
                    return Err(SurfingError::NodeOutOfRange { node, nvertices });
                }
                unique.into_iter().collect()
            }
            None => (0..nvertices).collect(),
        };

        let segments: Vec<Segment> = (0..nvertices)
            .map(|n| {
                let (inner, outer) = vs.segment(n);
                Segment::new(inner, outer)
            })
            .collect();

        tracing::debug!(
            nodes = nodes.len(),
            radius = %self.radius,
            metric = %self.metric,
            voxels = volgeom.nvoxels_mask(),
            "starting voxel selection"
        );

        let found = match self.metric {
            DistanceMetric::Euclidean => {
                for_each_node(&nodes, |node| euclidean_voxels(volgeom, &segments[node], self.radius))
            }
            DistanceMetric::Dijkstra => dijkstra_selection(volgeom, &segments, &source, &nodes, self.radius),
        };

        let map: BTreeMap<usize, Vec<usize>> = nodes.into_iter().zip(found).collect();
        let total: usize = map.values().map(Vec::len).sum();
        let empty = map.values().filter(|v| v.is_empty()).count();
        if empty > 0 {
            tracing::warn!(empty, "nodes with no voxel in range");
        }
        tracing::info!(nodes = map.len(), total_voxels = total, metric = %self.metric, "voxel selection done");

        Ok(VoxelSelection {
            volgeom: volgeom.clone(),
            radius: self.radius,
            metric: self.metric,
            map,
        })
    }
}

/// Select voxels around nodes of `volsurf`
///
/// `source_surf` defaults to the intermediate surface and `source_nodes` to
/// every node.
pub fn voxel_selection(
    volsurf: &VolSurf,
    radius: impl Into<Radius>,
    source_surf: Option<&Surface>,
    source_nodes: Option<&[usize]>,
    metric: DistanceMetric,
) -> Result<VoxelSelection> {
    let mut selector = VoxelSelector::new(volsurf, radius).metric(metric);
    if let Some(s) = source_surf {
        selector = selector.source_surface(s);
    }
    if let Some(nodes) = source_nodes {
        selector = selector.source_nodes(nodes);
    }
    selector.run()
}

/// Apply `f` to every node, in parallel when the `parallel` feature is on
#[cfg(feature = "parallel")]
fn for_each_node<F>(nodes: &[usize], f: F) -> Vec<Vec<usize>>
where
    F: Fn(usize) -> Vec<usize> + Sync + Send,
{
    use rayon::prelude::*;
    nodes.par_iter().map(|&n| f(n)).collect()
}

#[cfg(not(feature = "parallel"))]
fn for_each_node<F>(nodes: &[usize], f: F) -> Vec<Vec<usize>>
where
    F: Fn(usize) -> Vec<usize>,
{
    nodes.iter().map(|&n| f(n)).collect()
}

/// Order `(distance, index)` pairs and keep at most `limit` indices
fn nearest_first(mut found: Vec<(f64, usize)>, limit: Option<usize>) -> Vec<usize> {
    found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    if let Some(n) = limit {
        found.truncate(n);
    }
    found.into_iter().map(|(_, lin)| lin).collect()
}

/// Radius of a ball holding about `n` voxels
fn initial_radius(volgeom: &VolGeom, n: usize) -> f64 {
    let volume = volgeom.affine().voxel_volume().abs();
    (3.0 * n as f64 * volume / (4.0 * std::f64::consts::PI)).cbrt()
}

fn euclidean_voxels(volgeom: &VolGeom, segment: &Segment, radius: Radius) -> Vec<usize> {
    match radius {
        Radius::Distance(r) => nearest_first(segment.voxels_within(volgeom, r), None),
        Radius::Count(n) => {
            let limit = segment.max_distance_sq_to_grid(volgeom).sqrt();
            let mut r = initial_radius(volgeom, n);
            loop {
                let found = segment.voxels_within(volgeom, r);
                // Everything not found is farther than r, so the n nearest are all here
                if found.len() >= n || r >= limit {
                    return nearest_first(found, Some(n));
                }
                r *= GROWTH;
            }
        }
    }
}

/// Voxels within `radius` of `center` along the surface, as `(distance, index)`
fn dijkstra_voxels(
    neighbors: &[Vec<(usize, f64)>],
    owners: &OwnerMap,
    center: usize,
    radius: f64,
) -> Vec<(f64, usize)> {
    let mut found = Vec::new();
    for (node, path) in geodesic_distances(neighbors, center, radius) {
        for &(d_sq, lin) in owners.owned(node) {
            let d = path + d_sq.sqrt();
            if d <= radius {
                found.push((d, lin));
            }
        }
    }
    found
}

fn dijkstra_selection(
    volgeom: &VolGeom,
    segments: &[Segment],
    source: &Surface,
    nodes: &[usize],
    radius: Radius,
) -> Vec<Vec<usize>> {
    let neighbors = source.neighbors();

    match radius {
        Radius::Distance(r) => {
            let owners = OwnerMap::build(volgeom, segments, r);
            for_each_node(nodes, |c| nearest_first(dijkstra_voxels(&neighbors, &owners, c, r), None))
        }
        Radius::Count(n) => dijkstra_by_count(volgeom, segments, &neighbors, nodes, n),
    }
}

/// Grow a shared reach until every node has `n` voxels or no more can be found
fn dijkstra_by_count(
    volgeom: &VolGeom,
    segments: &[Segment],
    neighbors: &[Vec<(usize, f64)>],
    nodes: &[usize],
    n: usize,
) -> Vec<Vec<usize>> {
    // Past this reach every voxel is owned and every connected node is reached
    let path_total: f64 = neighbors.iter().flatten().map(|&(_, len)| len).sum::<f64>() / 2.0;
    let nearest_segment = segments
        .iter()
        .map(|s| s.max_distance_sq_to_grid(volgeom).sqrt())
        .fold(f64::INFINITY, f64::min);
    let bound = path_total + if nearest_segment.is_finite() { nearest_segment } else { 0.0 };

    let mut result: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    let mut pending: Vec<usize> = nodes.to_vec();
    let mut reach = initial_radius(volgeom, n);

    while !pending.is_empty() {
        let last_round = reach >= bound;
        let owners = OwnerMap::build(volgeom, segments, reach);

        let mut still_pending = Vec::new();
        for &c in &pending {
            let found = dijkstra_voxels(neighbors, &owners, c, reach);
            if found.len() >= n || last_round {
                result.insert(c, nearest_first(found, Some(n)));
            } else {
                still_pending.push(c);
            }
        }
        tracing::trace!(reach = owners.reach(), remaining = still_pending.len(), "growing surface reach");

        pending = still_pending;
        reach *= GROWTH;
    }

    nodes.iter().map(|c| result.remove(c).unwrap_or_default()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volgeom::Affine;

    fn grid(n: usize) -> VolGeom {
        VolGeom::new([n, n, n], Affine::identity(), None).unwrap()
    }

    /// Single triangle; node 0 sits on voxel (5,5,5) in both surfaces unless `column` is set
    fn small_volsurf(column: bool) -> VolSurf {
        let verts = |z0: f64| vec![[5.0, 5.0, z0], [0.0, 0.0, 0.0], [10.0, 0.0, 0.0]];
        let faces = vec![[0, 1, 2]];
        let (zi, zo) = if column { (4.0, 6.0) } else { (5.0, 5.0) };
        let inner = Surface::new(verts(zi), faces.clone()).unwrap();
        let outer = Surface::new(verts(zo), faces).unwrap();
        VolSurf::new(grid(11), outer, inner).unwrap()
    }

    /// Strip folded back on itself: a bottom bank at z=2 and a top bank at z=6,
    /// joined at x=10. Inner and outer coincide.
    fn hairpin() -> VolSurf {
        let mut path = Vec::new();
        for x in 0..=10 {
            path.push([x as f64, 2.0]);
        }
        for z in 3..=5 {
            path.push([10.0, z as f64]);
        }
        for x in (0..=10).rev() {
            path.push([x as f64, 6.0]);
        }

        let mut vertices = Vec::new();
        for &[x, z] in &path {
            vertices.push([x, 0.0, z]);
            vertices.push([x, 1.0, z]);
        }
        let mut faces = Vec::new();
        for t in 0..path.len() - 1 {
            let a = 2 * t;
            faces.push([a, a + 2, a + 1]);
            faces.push([a + 1, a + 2, a + 3]);
        }
        let s = Surface::new(vertices, faces).unwrap();
        let vg = VolGeom::new([12, 3, 9], Affine::identity(), None).unwrap();
        VolSurf::new(vg, s.clone(), s).unwrap()
    }

    #[test]
    fn test_metric_names() {
        assert_eq!("Euclidean".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert_eq!("euclidian".parse::<DistanceMetric>().unwrap(), DistanceMetric::Euclidean);
        assert_eq!("d".parse::<DistanceMetric>().unwrap(), DistanceMetric::Dijkstra);
        assert!(matches!("manhattan".parse::<DistanceMetric>(), Err(SurfingError::UnknownMetric(_))));
        assert_eq!(DistanceMetric::Dijkstra.to_string(), "dijkstra");
    }

    #[test]
    fn test_invalid_radius() {
        let vs = small_volsurf(false);
        for r in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = voxel_selection(&vs, r, None, None, DistanceMetric::Euclidean);
            assert!(matches!(err, Err(SurfingError::InvalidRadius(_))), "radius {}", r);
        }
        let err = voxel_selection(&vs, 0usize, None, None, DistanceMetric::Euclidean);
        assert!(matches!(err, Err(SurfingError::InvalidRadius(_))));
    }

    #[test]
    fn test_point_and_column_counts() {
        let point = voxel_selection(&small_volsurf(false), 1.0, None, Some(&[0]), DistanceMetric::Euclidean).unwrap();
        let voxels = point.get(0).unwrap();
        assert_eq!(voxels.len(), 7);
        // Centre voxel first
        assert_eq!(voxels[0], point.volgeom().ijk2lin([5, 5, 5]));

        let column = voxel_selection(&small_volsurf(true), 1.0, None, Some(&[0]), DistanceMetric::Euclidean).unwrap();
        assert_eq!(column.get(0).unwrap().len(), 17);
    }

    #[test]
    fn test_voxels_unique_and_in_range() {
        let vs = small_volsurf(true);
        let sel = VoxelSelector::new(&vs, 3.0).run().unwrap();
        assert_eq!(sel.len(), 3);
        for (_, voxels) in sel.iter() {
            let unique: BTreeSet<_> = voxels.iter().collect();
            assert_eq!(unique.len(), voxels.len());
            assert!(voxels.iter().all(|&lin| lin < sel.volgeom().nvoxels()));
        }
    }

    #[test]
    fn test_sorted_by_distance_then_index() {
        let vs = small_volsurf(false);
        let sel = VoxelSelector::new(&vs, 2.0).source_nodes(&[0]).run().unwrap();
        let vg = sel.volgeom();
        let d = |lin: usize| {
            let p = vg.lin2xyz(lin);
            (p[0] - 5.0).powi(2) + (p[1] - 5.0).powi(2) + (p[2] - 5.0).powi(2)
        };
        for w in sel.get(0).unwrap().windows(2) {
            assert!(d(w[0]) < d(w[1]) || (d(w[0]) == d(w[1]) && w[0] < w[1]));
        }
    }

    #[test]
    fn test_selection_is_repeatable() {
        let vs = hairpin();
        let a = VoxelSelector::new(&vs, 2.5).run().unwrap();
        let b = VoxelSelector::new(&vs, 2.5).run().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_nodes_deduplicated_and_all_present() {
        let inner = Surface::new(
            vec![[5.0, 5.0, 5.0], [100.0, 100.0, 100.0], [0.0, 0.0, 0.0]],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let vs = VolSurf::new(grid(11), inner.clone(), inner).unwrap();
        let sel = VoxelSelector::new(&vs, 1.0).source_nodes(&[1, 0, 1]).run().unwrap();
        assert_eq!(sel.keys().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(sel.get(1), Some(&[][..]));
        assert_eq!(sel.get(2), None);
        assert_eq!(sel.voxel_counts()[&0], 7);
    }

    #[test]
    fn test_node_out_of_range() {
        let vs = small_volsurf(false);
        let err = VoxelSelector::new(&vs, 1.0).source_nodes(&[0, 3]).run();
        assert!(matches!(err, Err(SurfingError::NodeOutOfRange { node: 3, nvertices: 3 })));
    }

    #[test]
    fn test_source_surface_mismatch() {
        let vs = small_volsurf(false);
        let other = Surface::new(vec![[0.0; 3]; 4], vec![[0, 1, 2]]).unwrap();
        let err = VoxelSelector::new(&vs, 1.0).source_surface(&other).run();
        assert!(matches!(err, Err(SurfingError::VertexCountMismatch { .. })));
    }

    #[test]
    fn test_mask_restricts_voxels() {
        let vs = small_volsurf(false);
        let mut mask = vec![false; 11 * 11 * 11];
        let vg = vs.volgeom().clone();
        mask[vg.ijk2lin([5, 5, 5])] = true;
        mask[vg.ijk2lin([5, 5, 6])] = true;
        let masked_vg = VolGeom::new([11, 11, 11], Affine::identity(), Some(mask.clone())).unwrap();
        let masked_vs = VolSurf::new(masked_vg, vs.outer().clone(), vs.inner().clone()).unwrap();

        let sel = VoxelSelector::new(&masked_vs, 1.0).source_nodes(&[0]).run().unwrap();
        assert_eq!(sel.get(0).unwrap(), &[vg.ijk2lin([5, 5, 5]), vg.ijk2lin([5, 5, 6])]);

        // Masking afterwards gives the same neighbourhoods
        let full = VoxelSelector::new(&vs, 1.0).source_nodes(&[0]).run().unwrap();
        let after = full.masked(&mask).unwrap();
        assert_eq!(after.get(0), sel.get(0));
        assert_eq!(after.get_mask(), mask);
        assert!(full.masked(&[true]).is_err());
    }

    #[test]
    fn test_count_radius() {
        let vs = small_volsurf(false);
        let seven = VoxelSelector::new(&vs, 7usize).source_nodes(&[0]).run().unwrap();
        let one = VoxelSelector::new(&vs, 1.0).source_nodes(&[0]).run().unwrap();
        assert_eq!(seven.get(0), one.get(0));

        let ten = VoxelSelector::new(&vs, 10usize).source_nodes(&[0]).run().unwrap();
        assert_eq!(ten.get(0).unwrap().len(), 10);
        assert_eq!(&ten.get(0).unwrap()[..7], one.get(0).unwrap());
    }

    #[test]
    fn test_count_radius_capped_by_mask() {
        let vs = small_volsurf(false);
        let vg = vs.volgeom();
        let mut mask = vec![false; vg.nvoxels()];
        for lin in [0, 500, 1330] {
            mask[lin] = true;
        }
        let masked_vg = VolGeom::new(vg.shape(), *vg.affine(), Some(mask)).unwrap();
        let masked_vs = VolSurf::new(masked_vg, vs.outer().clone(), vs.inner().clone()).unwrap();
        for metric in [DistanceMetric::Euclidean, DistanceMetric::Dijkstra] {
            let sel = VoxelSelector::new(&masked_vs, 10usize).metric(metric).source_nodes(&[0]).run().unwrap();
            assert_eq!(sel.get(0).unwrap().len(), 3, "{}", metric);
        }
    }

    #[test]
    fn test_dijkstra_skips_far_bank() {
        let vs = hairpin();
        let vg = vs.volgeom();
        let across = vg.ijk2lin([0, 0, 5]);
        let own = vg.ijk2lin([0, 0, 2]);

        let euclidean = VoxelSelector::new(&vs, 3.0).source_nodes(&[0]).run().unwrap();
        assert!(euclidean.get(0).unwrap().contains(&across));

        let dijkstra = VoxelSelector::new(&vs, 3.0)
            .metric(DistanceMetric::Dijkstra)
            .source_nodes(&[0])
            .run()
            .unwrap();
        let voxels = dijkstra.get(0).unwrap();
        assert_eq!(voxels[0], own);
        assert!(!voxels.contains(&across));
        assert!(voxels.contains(&vg.ijk2lin([2, 0, 2])));
    }

    #[test]
    fn test_dijkstra_within_euclidean() {
        let vs = hairpin();
        let euclidean = VoxelSelector::new(&vs, 2.5).run().unwrap();
        let dijkstra = VoxelSelector::new(&vs, 2.5).metric(DistanceMetric::Dijkstra).run().unwrap();
        for (node, voxels) in dijkstra.iter() {
            let e: BTreeSet<_> = euclidean.get(node).unwrap().iter().collect();
            assert!(voxels.iter().all(|lin| e.contains(lin)), "node {}", node);
        }
    }

    #[test]
    fn test_dijkstra_count_radius() {
        let vs = hairpin();
        let sel = VoxelSelector::new(&vs, 5usize)
            .metric(DistanceMetric::Dijkstra)
            .source_nodes(&[0, 20])
            .run()
            .unwrap();
        for (_, voxels) in sel.iter() {
            assert_eq!(voxels.len(), 5);
        }
        assert_eq!(sel.get(0).unwrap()[0], vs.volgeom().ijk2lin([0, 0, 2]));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_single_thread() {
        let pool = |threads: usize| rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
        let single = pool(1);
        let many = pool(4);

        let vs = hairpin();
        for metric in [DistanceMetric::Euclidean, DistanceMetric::Dijkstra] {
            for radius in [Radius::Distance(2.5), Radius::Count(6)] {
                let run = || VoxelSelector::new(&vs, radius).metric(metric).run().unwrap();
                let sequential = single.install(run);
                let parallel = many.install(run);
                assert_eq!(sequential.len(), vs.nvertices());
                assert_eq!(parallel, sequential, "{} {}", metric, radius);
            }
        }
    }
}
