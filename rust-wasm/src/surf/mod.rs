//! Triangulated surfaces
//!
//! - `generate`: synthetic planes and spheres
//! - `asc`: FreeSurfer ASCII read/write
//! - `source`: file-or-mesh inputs resolved at the API boundary

mod asc;
mod generate;
mod source;

pub use asc::{from_asc_string, read_asc, to_asc_string, write_asc};
pub use generate::{generate_plane, generate_sphere};
pub use source::SurfaceSource;

use std::ops::{Add, Mul, Sub};

use crate::error::{Result, SurfingError};
use crate::priority_queue::DistanceQueue;

/// Vertices and triangular faces of a mesh
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    vertices: Vec<[f64; 3]>,
    faces: Vec<[usize; 3]>,
}

impl Surface {
    /// Create a surface, checking that every face references an existing vertex
    pub fn new(vertices: Vec<[f64; 3]>, faces: Vec<[usize; 3]>) -> Result<Self> {
        let nvertices = vertices.len();
        for (face, tri) in faces.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&v| v >= nvertices) {
                return Err(SurfingError::InvalidFace { face, vertex, nvertices });
            }
        }
        Ok(Surface { vertices, faces })
    }

    pub fn nvertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn nfaces(&self) -> usize {
        self.faces.len()
    }

    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    pub fn vertex(&self, i: usize) -> [f64; 3] {
        self.vertices[i]
    }

    /// Fails unless `other` has the same number of vertices
    pub fn check_parallel(&self, other: &Surface, what: &'static str) -> Result<()> {
        if self.nvertices() != other.nvertices() {
            return Err(SurfingError::VertexCountMismatch {
                what,
                expected: self.nvertices(),
                found: other.nvertices(),
            });
        }
        Ok(())
    }

    /// Vertex-wise sum of two parallel surfaces; faces are taken from `self`
    pub fn try_add(&self, other: &Surface) -> Result<Surface> {
        self.check_parallel(other, "added surface")?;
        let vertices = self
            .vertices
            .iter()
            .zip(&other.vertices)
            .map(|(a, b)| [a[0] + b[0], a[1] + b[1], a[2] + b[2]])
            .collect();
        Ok(Surface { vertices, faces: self.faces.clone() })
    }

    /// Point at fraction `w` along each vertex pair (`w = 0` gives `self`)
    pub fn interpolate(&self, other: &Surface, w: f64) -> Result<Surface> {
        (self.clone() * (1.0 - w)).try_add(&(other.clone() * w))
    }

    fn map_vertices(mut self, f: impl Fn([f64; 3]) -> [f64; 3]) -> Surface {
        for v in self.vertices.iter_mut() {
            *v = f(*v);
        }
        self
    }

    /// Neighbours of each vertex with Euclidean edge lengths
    ///
    /// Edges come from face sides; each neighbour appears once per vertex.
    pub fn neighbors(&self) -> Vec<Vec<(usize, f64)>> {
        let mut neighbor_lists: Vec<Vec<(usize, f64)>> = vec![Vec::new(); self.nvertices()];

        for &[v0, v1, v2] in &self.faces {
            for &(a, b) in &[(v0, v1), (v1, v2), (v2, v0)] {
                if a == b || neighbor_lists[a].iter().any(|&(n, _)| n == b) {
                    continue;
                }
                let len = distance(self.vertices[a], self.vertices[b]);
                neighbor_lists[a].push((b, len));
                neighbor_lists[b].push((a, len));
            }
        }

        neighbor_lists
    }
}

impl Mul<f64> for Surface {
    type Output = Surface;

    fn mul(self, s: f64) -> Surface {
        self.map_vertices(|v| [v[0] * s, v[1] * s, v[2] * s])
    }
}

impl Add<f64> for Surface {
    type Output = Surface;

    fn add(self, s: f64) -> Surface {
        self.map_vertices(|v| [v[0] + s, v[1] + s, v[2] + s])
    }
}

impl Add<[f64; 3]> for Surface {
    type Output = Surface;

    fn add(self, t: [f64; 3]) -> Surface {
        self.map_vertices(|v| [v[0] + t[0], v[1] + t[1], v[2] + t[2]])
    }
}

impl Sub<[f64; 3]> for Surface {
    type Output = Surface;

    fn sub(self, t: [f64; 3]) -> Surface {
        self.map_vertices(|v| [v[0] - t[0], v[1] - t[1], v[2] - t[2]])
    }
}

#[inline]
pub(crate) fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Shortest path lengths along mesh edges from `source`, up to `max_distance`
///
/// `neighbors` is the output of [`Surface::neighbors`]. Returns `(node, distance)`
/// pairs in order of increasing distance; `source` itself comes first at 0.
pub fn geodesic_distances(
    neighbors: &[Vec<(usize, f64)>],
    source: usize,
    max_distance: f64,
) -> Vec<(usize, f64)> {
    let mut best = vec![f64::INFINITY; neighbors.len()];
    let mut done = vec![false; neighbors.len()];
    let mut reached = Vec::new();
    let mut queue = DistanceQueue::new();

    best[source] = 0.0;
    queue.push(0.0, source);

    while let Some((dist, node)) = queue.pop() {
        if done[node] {
            continue;
        }
        done[node] = true;
        reached.push((node, dist));

        for &(next, len) in &neighbors[node] {
            let candidate = dist + len;
            if candidate <= max_distance && candidate < best[next] {
                best[next] = candidate;
                queue.push(candidate, next);
            }
        }
    }

    reached
}
