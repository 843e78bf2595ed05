//! Synthetic meshes shared by the unit tests.

use std::collections::HashMap;
use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::mesh::Mesh;

/// Planar grid of `nx` x `ny` square cells in the z = 0 plane, each cell
/// split along its (i, j)-(i+1, j+1) diagonal. Vertex (i, j) has index
/// `j * (nx + 1) + i`.
pub(crate) fn grid(nx: usize, ny: usize, spacing: f64) -> Mesh {
    let (positions, triangles) = grid_parts(nx, ny, spacing);
    Mesh::from_triangles(positions, &triangles).expect("grid should build")
}

fn grid_parts(nx: usize, ny: usize, spacing: f64) -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let mut positions = Vec::new();
    for j in 0..=ny {
        for i in 0..=nx {
            positions.push(Vector3::new(i as f64 * spacing, j as f64 * spacing, 0.0));
        }
    }
    let index = |i: usize, j: usize| j * (nx + 1) + i;
    let mut triangles = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            let a = index(i, j);
            let b = index(i + 1, j);
            let c = index(i + 1, j + 1);
            let d = index(i, j + 1);
            triangles.push([a, b, c]);
            triangles.push([a, c, d]);
        }
    }
    (positions, triangles)
}

/// 4 x 4 grid where vertex (1, 0) is moved onto the diagonal of its cell,
/// flattening exactly one triangle to zero area.
pub(crate) fn grid_with_sliver() -> Mesh {
    let (mut positions, triangles) = grid_parts(4, 4, 1.0);
    positions[1] = Vector3::new(0.5, 0.5, 0.0);
    Mesh::from_triangles(positions, &triangles).expect("sliver grid should build")
}

fn octahedron_parts() -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let positions = vec![
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(-1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, -1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(0.0, 0.0, -1.0),
    ];
    let triangles = vec![
        [0, 2, 4],
        [2, 1, 4],
        [1, 3, 4],
        [3, 0, 4],
        [2, 0, 5],
        [1, 2, 5],
        [3, 1, 5],
        [0, 3, 5],
    ];
    (positions, triangles)
}

/// Regular octahedron with outward-facing triangles. Faces 0-3 surround +z,
/// faces 4-7 surround -z; {0, 2, 5, 7} and {1, 3, 4, 6} are the two color
/// classes of its (bipartite) dual graph.
pub(crate) fn octahedron() -> Mesh {
    let (positions, triangles) = octahedron_parts();
    Mesh::from_triangles(positions, &triangles).expect("octahedron should build")
}

/// Octahedron refined `level` times by midpoint subdivision and projected
/// onto the unit sphere.
pub(crate) fn icosphere(level: usize) -> Mesh {
    ellipsoid(level, Vector3::new(1.0, 1.0, 1.0))
}

/// Refined octahedron projected onto the unit sphere, then scaled per axis.
pub(crate) fn ellipsoid(level: usize, radii: Vector3<f64>) -> Mesh {
    let (positions, triangles) = ellipsoid_parts(level, radii);
    Mesh::from_triangles(positions, &triangles).expect("ellipsoid should build")
}

/// [`icosphere`] plus one trailing vertex that no face uses.
pub(crate) fn icosphere_with_stray_vertex(level: usize) -> Mesh {
    let (mut positions, triangles) = ellipsoid_parts(level, Vector3::new(1.0, 1.0, 1.0));
    positions.push(Vector3::new(3.0, 0.0, 0.0));
    Mesh::from_triangles(positions, &triangles).expect("sphere with stray vertex should build")
}

fn ellipsoid_parts(level: usize, radii: Vector3<f64>) -> (Vec<Vector3<f64>>, Vec<[usize; 3]>) {
    let (mut positions, mut triangles) = octahedron_parts();
    for _ in 0..level {
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut refined = Vec::with_capacity(triangles.len() * 4);
        let mut midpoint = |a: usize, b: usize, positions: &mut Vec<Vector3<f64>>| {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                positions.push((positions[a] + positions[b]) * 0.5);
                positions.len() - 1
            })
        };
        for [a, b, c] in triangles {
            let ab = midpoint(a, b, &mut positions);
            let bc = midpoint(b, c, &mut positions);
            let ca = midpoint(c, a, &mut positions);
            refined.push([a, ab, ca]);
            refined.push([ab, b, bc]);
            refined.push([ca, bc, c]);
            refined.push([ab, bc, ca]);
        }
        triangles = refined;
    }
    let positions = positions
        .into_iter()
        .map(|p| p.normalize().component_mul(&radii))
        .collect();
    (positions, triangles)
}

/// Fan of eight triangles around vertex 0 at the origin. The rim alternates
/// between heights `height` and `-height`, so the center's angle sum
/// exceeds 2π once `height` is large enough.
pub(crate) fn saddle_fan(height: f64) -> Mesh {
    let mut positions = vec![Vector3::zeros()];
    for k in 0..8 {
        let angle = PI * k as f64 / 4.0;
        let z = if k % 2 == 0 { height } else { -height };
        positions.push(Vector3::new(angle.cos(), angle.sin(), z));
    }
    let triangles: Vec<[usize; 3]> = (0..8).map(|k| [0, 1 + k, 1 + (k + 1) % 8]).collect();
    Mesh::from_triangles(positions, &triangles).expect("saddle fan should build")
}

/// Open cylinder of radius 1 around the z axis.
pub(crate) fn cylinder(segments: usize, rings: usize, height: f64) -> Mesh {
    let mut positions = Vec::new();
    for r in 0..=rings {
        let z = height * r as f64 / rings as f64;
        for s in 0..segments {
            let angle = 2.0 * PI * s as f64 / segments as f64;
            positions.push(Vector3::new(angle.cos(), angle.sin(), z));
        }
    }
    let index = |s: usize, r: usize| r * segments + s % segments;
    let mut triangles = Vec::new();
    for r in 0..rings {
        for s in 0..segments {
            let a = index(s, r);
            let b = index(s + 1, r);
            let c = index(s + 1, r + 1);
            let d = index(s, r + 1);
            triangles.push([a, b, c]);
            triangles.push([a, c, d]);
        }
    }
    Mesh::from_triangles(positions, &triangles).expect("cylinder should build")
}
