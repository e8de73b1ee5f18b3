//! Synthetic surfaces: planes and geodesic spheres

use std::collections::HashMap;

use super::Surface;

/// Create a flat rectangular grid surface
///
/// # Arguments
/// * `x00` - Position of the first vertex
/// * `x01` - Step between neighbouring vertices along the first direction
/// * `x10` - Step between neighbouring vertices along the second direction
/// * `n01`, `n10` - Number of vertices along each direction
///
/// Vertex `(i, j)` has index `i + j*n01`, so a plane spanned by the first two
/// affine columns of a volume numbers its nodes like the voxels of one slice.
pub fn generate_plane(x00: [f64; 3], x01: [f64; 3], x10: [f64; 3], n01: usize, n10: usize) -> Surface {
    let mut vertices = Vec::with_capacity(n01 * n10);
    for j in 0..n10 {
        for i in 0..n01 {
            let (fi, fj) = (i as f64, j as f64);
            vertices.push([
                x00[0] + fi * x01[0] + fj * x10[0],
                x00[1] + fi * x01[1] + fj * x10[1],
                x00[2] + fi * x01[2] + fj * x10[2],
            ]);
        }
    }

    let idx = |i: usize, j: usize| i + j * n01;
    let mut faces = Vec::with_capacity(2 * n01.saturating_sub(1) * n10.saturating_sub(1));
    for j in 0..n10.saturating_sub(1) {
        for i in 0..n01.saturating_sub(1) {
            faces.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
            faces.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
        }
    }

    Surface { vertices, faces }
}

/// Create a geodesic unit sphere
///
/// Every edge of an icosahedron is split into `density` segments and the new
/// points are projected onto the sphere, giving `10*density^2 + 2` vertices
/// and `20*density^2` faces. `density = 0` is treated as 1.
pub fn generate_sphere(density: usize) -> Surface {
    let d = density.max(1);
    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;

    let corners: [[f64; 3]; 12] = [
        [-1.0,  phi, 0.0], [ 1.0,  phi, 0.0], [-1.0, -phi, 0.0], [ 1.0, -phi, 0.0],
        [ 0.0, -1.0,  phi], [ 0.0,  1.0,  phi], [ 0.0, -1.0, -phi], [ 0.0,  1.0, -phi],
        [ phi, 0.0, -1.0], [ phi, 0.0,  1.0], [-phi, 0.0, -1.0], [-phi, 0.0,  1.0],
    ];

    let ico_faces: [[usize; 3]; 20] = [
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    // A point on the icosahedron is keyed by its integer barycentric weights over
    // icosahedron corners, so points on shared edges map to the same vertex.
    type Key = [(usize, usize); 3];
    let mut index_of: HashMap<Key, usize> = HashMap::new();
    let mut vertices: Vec<[f64; 3]> = Vec::with_capacity(10 * d * d + 2);

    let mut vertex_for = |weights: [(usize, usize); 3], verts: &mut Vec<[f64; 3]>| -> usize {
        let mut key: Key = [(usize::MAX, 0); 3];
        let mut n = 0;
        let mut sorted = weights;
        sorted.sort();
        for (corner, w) in sorted {
            if w > 0 {
                key[n] = (corner, w);
                n += 1;
            }
        }
        if let Some(&idx) = index_of.get(&key) {
            return idx;
        }

        let mut p = [0.0; 3];
        for &(corner, w) in key.iter().take(n) {
            let c = corners[corner];
            for a in 0..3 {
                p[a] += c[a] * w as f64;
            }
        }
        let norm = (p[0].powi(2) + p[1].powi(2) + p[2].powi(2)).sqrt();
        let idx = verts.len();
        verts.push([p[0] / norm, p[1] / norm, p[2] / norm]);
        index_of.insert(key, idx);
        idx
    };

    let mut faces: Vec<[usize; 3]> = Vec::with_capacity(20 * d * d);
    for &[a, b, c] in &ico_faces {
        // grid[i][j] = point with weights (d-i-j, i, j) on corners (a, b, c)
        let mut grid: Vec<Vec<usize>> = Vec::with_capacity(d + 1);
        for i in 0..=d {
            let row = (0..=d - i)
                .map(|j| vertex_for([(a, d - i - j), (b, i), (c, j)], &mut vertices))
                .collect();
            grid.push(row);
        }

        for i in 0..d {
            for j in 0..d - i {
                faces.push([grid[i][j], grid[i + 1][j], grid[i][j + 1]]);
                if i + j + 1 < d {
                    faces.push([grid[i + 1][j], grid[i + 1][j + 1], grid[i][j + 1]]);
                }
            }
        }
    }

    Surface { vertices, faces }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_counts() {
        for d in [1, 2, 4, 10] {
            let s = generate_sphere(d);
            assert_eq!(s.nvertices(), 10 * d * d + 2, "density {}", d);
            assert_eq!(s.nfaces(), 20 * d * d, "density {}", d);
        }
        assert_eq!(generate_sphere(0).nvertices(), 12);
    }

    #[test]
    fn test_vertices_on_unit_sphere() {
        let s = generate_sphere(3);
        for v in s.vertices() {
            let norm = (v[0].powi(2) + v[1].powi(2) + v[2].powi(2)).sqrt();
            assert!((norm - 1.0).abs() < 1e-10, "Vertex not on unit sphere: norm = {}", norm);
        }
    }

    #[test]
    fn test_sphere_is_closed() {
        // Every edge of a closed triangle mesh is shared by exactly two faces
        let s = generate_sphere(3);
        let mut edges: HashMap<(usize, usize), usize> = HashMap::new();
        for &[a, b, c] in s.faces() {
            for (p, q) in [(a, b), (b, c), (c, a)] {
                *edges.entry((p.min(q), p.max(q))).or_insert(0) += 1;
            }
        }
        assert!(edges.values().all(|&n| n == 2));
    }

    #[test]
    fn test_sphere_is_deterministic() {
        assert_eq!(generate_sphere(4), generate_sphere(4));
    }

    #[test]
    fn test_plane_layout() {
        let p = generate_plane([1.0, 2.0, 3.0], [2.0, 0.0, 0.0], [0.0, 3.0, 0.0], 4, 3);
        assert_eq!(p.nvertices(), 12);
        assert_eq!(p.nfaces(), 2 * 3 * 2);
        assert_eq!(p.vertex(0), [1.0, 2.0, 3.0]);
        assert_eq!(p.vertex(1), [3.0, 2.0, 3.0]);
        assert_eq!(p.vertex(4), [1.0, 5.0, 3.0]);
        assert_eq!(p.vertex(11), [7.0, 8.0, 3.0]);
    }

    #[test]
    fn test_degenerate_plane_has_no_faces() {
        let p = generate_plane([0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], 3, 1);
        assert_eq!(p.nvertices(), 3);
        assert_eq!(p.nfaces(), 0);
    }
}
