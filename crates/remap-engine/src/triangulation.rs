//! Delaunay triangulation over scattered source points.
//!
//! The mesh is built with the Bowyer-Watson incremental algorithm over the
//! normalized (longitude, latitude) plane. Treating angular coordinates as
//! planar mirrors the source grids this pipeline consumes: triangles never
//! wrap across the antimeridian, and target pixels falling in the wrap gap or
//! beyond the poleward-most source ring resolve as outside the hull. See the
//! crate docs for the consequences of that policy.

use std::collections::HashMap;

use crate::error::{RemapError, Result};
use crate::points::GridPoints;

/// A planar simplicial mesh over a source point set.
///
/// Triangle vertex indices refer to the *original* source ordering, so
/// barycentric weights can be applied directly to source field arrays.
/// Exact duplicate coordinates are collapsed to their first occurrence.
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// Deduplicated working coordinates.
    verts: Vec<[f64; 2]>,
    /// Original source index of each working vertex.
    source_idx: Vec<usize>,
    /// Counter-clockwise triangles, indices into `verts`.
    triangles: Vec<[usize; 3]>,
    /// `neighbors[t][k]` is the triangle across edge (v[k], v[k+1]) of `t`.
    neighbors: Vec<[Option<usize>; 3]>,
    /// Coordinate span, used to scale degeneracy tolerances.
    span: f64,
}

impl Triangulation {
    /// Triangulate a source point set.
    ///
    /// Fails fast with [`RemapError::DegenerateGeometry`] when fewer than
    /// four points are given or when all points are collinear.
    pub fn build(points: &GridPoints) -> Result<Self> {
        if points.len() < 4 {
            return Err(RemapError::DegenerateGeometry(format!(
                "need at least 4 source points, got {}",
                points.len()
            )));
        }

        let (verts, source_idx) = dedup(points);
        if verts.len() < 3 {
            return Err(RemapError::DegenerateGeometry(format!(
                "only {} distinct coordinates among {} points",
                verts.len(),
                points.len()
            )));
        }

        let span = coordinate_span(&verts);
        if all_collinear(&verts, span) {
            return Err(RemapError::DegenerateGeometry(
                "source points are collinear".to_string(),
            ));
        }

        let triangles = bowyer_watson(&verts, span);
        if triangles.is_empty() {
            return Err(RemapError::DegenerateGeometry(
                "triangulation produced no simplices".to_string(),
            ));
        }
        let neighbors = build_neighbors(&triangles);

        Ok(Self {
            verts,
            source_idx,
            triangles,
            neighbors,
            span,
        })
    }

    /// Number of simplices in the mesh.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Find the triangle containing `p`, or `None` when `p` lies outside the
    /// convex hull.
    ///
    /// Walks the adjacency graph from `hint` (a previously located triangle
    /// works well for spatially coherent queries) and falls back to a linear
    /// scan if the walk does not settle. Deterministic for a fixed mesh:
    /// points exactly on a shared edge resolve to whichever adjacent triangle
    /// the walk reaches first.
    pub fn locate(&self, p: [f64; 2], hint: usize) -> Option<usize> {
        let mut t = hint.min(self.triangles.len() - 1);
        let max_steps = 2 * self.triangles.len() + 16;

        for _ in 0..max_steps {
            let tri = self.triangles[t];
            let mut crossed = false;
            for k in 0..3 {
                let a = self.verts[tri[k]];
                let b = self.verts[tri[(k + 1) % 3]];
                if orient2d(a, b, p) < 0.0 {
                    match self.neighbors[t][k] {
                        Some(next) => {
                            t = next;
                            crossed = true;
                            break;
                        }
                        // Crossed a hull edge: the point is outside.
                        None => return None,
                    }
                }
            }
            if !crossed {
                return Some(t);
            }
        }

        self.scan_containing(p)
    }

    /// Barycentric decomposition of `p` within triangle `t`.
    ///
    /// Returns the three *source* point indices and their weights. The
    /// weights always sum to 1; for points inside the triangle each lies in
    /// [0, 1] up to rounding at the edges.
    pub fn barycentric(&self, t: usize, p: [f64; 2]) -> ([usize; 3], [f64; 3]) {
        let [ia, ib, ic] = self.triangles[t];
        let a = self.verts[ia];
        let b = self.verts[ib];
        let c = self.verts[ic];

        let det = (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]);
        let wb = ((p[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (p[1] - a[1])) / det;
        let wc = ((b[0] - a[0]) * (p[1] - a[1]) - (p[0] - a[0]) * (b[1] - a[1])) / det;
        let wa = 1.0 - wb - wc;

        (
            [self.source_idx[ia], self.source_idx[ib], self.source_idx[ic]],
            [wa, wb, wc],
        )
    }

    /// Linear-scan fallback when the adjacency walk cycles on degenerate
    /// geometry. First containing triangle in mesh order wins.
    fn scan_containing(&self, p: [f64; 2]) -> Option<usize> {
        let eps = -1e-12 * self.span;
        self.triangles.iter().position(|tri| {
            (0..3).all(|k| {
                let a = self.verts[tri[k]];
                let b = self.verts[tri[(k + 1) % 3]];
                orient2d(a, b, p) >= eps
            })
        })
    }
}

/// Twice the signed area of triangle (a, b, c); positive when counter-clockwise.
fn orient2d(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

/// Collapse exact duplicate coordinates, keeping first occurrences.
fn dedup(points: &GridPoints) -> (Vec<[f64; 2]>, Vec<usize>) {
    let mut seen: HashMap<(u64, u64), usize> = HashMap::new();
    let mut verts = Vec::with_capacity(points.len());
    let mut source_idx = Vec::with_capacity(points.len());

    for (i, &[lon, lat]) in points.coords().iter().enumerate() {
        let key = (lon.to_bits(), lat.to_bits());
        if seen.insert(key, i).is_none() {
            verts.push([lon, lat]);
            source_idx.push(i);
        }
    }
    (verts, source_idx)
}

fn coordinate_span(verts: &[[f64; 2]]) -> f64 {
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for v in verts {
        for d in 0..2 {
            min[d] = min[d].min(v[d]);
            max[d] = max[d].max(v[d]);
        }
    }
    (max[0] - min[0]).max(max[1] - min[1]).max(f64::MIN_POSITIVE)
}

fn all_collinear(verts: &[[f64; 2]], span: f64) -> bool {
    let tol = 1e-12 * span * span;
    let a = verts[0];
    let Some(&b) = verts.iter().find(|v| {
        let dx = v[0] - a[0];
        let dy = v[1] - a[1];
        dx * dx + dy * dy > 0.0
    }) else {
        return true;
    };
    verts
        .iter()
        .all(|&p| orient2d(a, b, p).abs() <= tol)
}

/// Incremental Bowyer-Watson insertion with a bounding super-triangle.
fn bowyer_watson(verts: &[[f64; 2]], span: f64) -> Vec<[usize; 3]> {
    let m = verts.len();

    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for v in verts {
        for d in 0..2 {
            min[d] = min[d].min(v[d]);
            max[d] = max[d].max(v[d]);
        }
    }
    let cx = (min[0] + max[0]) / 2.0;
    let cy = (min[1] + max[1]) / 2.0;
    let r = 20.0 * span.max(1.0);

    // Working vertex list: mesh vertices followed by the three super vertices.
    let mut work: Vec<[f64; 2]> = verts.to_vec();
    work.push([cx - r, cy - r / 2.0]);
    work.push([cx + r, cy - r / 2.0]);
    work.push([cx, cy + r]);

    let mut triangles: Vec<[usize; 3]> = vec![make_ccw(&work, [m, m + 1, m + 2])];

    for pi in 0..m {
        let p = work[pi];

        // Triangles whose circumcircle strictly contains the new point.
        let mut bad = Vec::new();
        for (t, tri) in triangles.iter().enumerate() {
            if in_circumcircle(work[tri[0]], work[tri[1]], work[tri[2]], p) {
                bad.push(t);
            }
        }

        // The cavity boundary: edges belonging to exactly one bad triangle,
        // kept in their CCW orientation.
        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        for &t in &bad {
            let tri = triangles[t];
            for k in 0..3 {
                let e = sorted_edge(tri[k], tri[(k + 1) % 3]);
                *edge_count.entry(e).or_insert(0) += 1;
            }
        }
        let mut boundary = Vec::new();
        for &t in &bad {
            let tri = triangles[t];
            for k in 0..3 {
                let (u, v) = (tri[k], tri[(k + 1) % 3]);
                if edge_count[&sorted_edge(u, v)] == 1 {
                    boundary.push((u, v));
                }
            }
        }

        // Remove the cavity (descending order keeps indices valid) and
        // re-triangulate it as a fan around the new point.
        for &t in bad.iter().rev() {
            triangles.swap_remove(t);
        }
        for (u, v) in boundary {
            triangles.push([u, v, pi]);
        }
    }

    // Strip every triangle that touches the super-triangle.
    triangles.retain(|tri| tri.iter().all(|&v| v < m));
    triangles
}

fn sorted_edge(u: usize, v: usize) -> (usize, usize) {
    if u < v {
        (u, v)
    } else {
        (v, u)
    }
}

fn make_ccw(verts: &[[f64; 2]], tri: [usize; 3]) -> [usize; 3] {
    if orient2d(verts[tri[0]], verts[tri[1]], verts[tri[2]]) < 0.0 {
        [tri[0], tri[2], tri[1]]
    } else {
        tri
    }
}

/// Strict circumcircle containment for a counter-clockwise triangle.
fn in_circumcircle(a: [f64; 2], b: [f64; 2], c: [f64; 2], p: [f64; 2]) -> bool {
    let ax = a[0] - p[0];
    let ay = a[1] - p[1];
    let bx = b[0] - p[0];
    let by = b[1] - p[1];
    let cx = c[0] - p[0];
    let cy = c[1] - p[1];

    let det = (ax * ax + ay * ay) * (bx * cy - cx * by)
        - (bx * bx + by * by) * (ax * cy - cx * ay)
        + (cx * cx + cy * cy) * (ax * by - bx * ay);

    det > 0.0
}

/// Shared-edge adjacency for the point-location walk.
fn build_neighbors(triangles: &[[usize; 3]]) -> Vec<[Option<usize>; 3]> {
    let mut by_edge: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();
    for (t, tri) in triangles.iter().enumerate() {
        for k in 0..3 {
            let e = sorted_edge(tri[k], tri[(k + 1) % 3]);
            by_edge.entry(e).or_default().push((t, k));
        }
    }

    let mut neighbors = vec![[None; 3]; triangles.len()];
    for users in by_edge.values() {
        if let [(t1, k1), (t2, k2)] = users[..] {
            neighbors[t1][k1] = Some(t2);
            neighbors[t2][k2] = Some(t1);
        }
    }
    neighbors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> GridPoints {
        GridPoints::new([(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)])
    }

    #[test]
    fn square_triangulates_into_two_simplices() {
        let tri = Triangulation::build(&square()).unwrap();
        assert_eq!(tri.num_triangles(), 2);
    }

    #[test]
    fn rejects_too_few_points() {
        let points = GridPoints::new([(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        assert!(matches!(
            Triangulation::build(&points),
            Err(RemapError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn rejects_collinear_points() {
        let points = GridPoints::new([(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        assert!(matches!(
            Triangulation::build(&points),
            Err(RemapError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn locates_interior_point_and_rejects_exterior() {
        let tri = Triangulation::build(&square()).unwrap();

        let inside = tri.locate([5.0, 5.0], 0);
        assert!(inside.is_some());

        assert!(tri.locate([100.0, 100.0], 0).is_none());
        assert!(tri.locate([-1.0, 5.0], 0).is_none());
    }

    #[test]
    fn barycentric_weights_sum_to_one() {
        let tri = Triangulation::build(&square()).unwrap();
        for p in [[5.0, 5.0], [1.0, 2.0], [9.9, 0.1], [3.0, 3.0]] {
            let t = tri.locate(p, 0).unwrap();
            let (_, w) = tri.barycentric(t, p);
            assert!((w[0] + w[1] + w[2] - 1.0).abs() < 1e-12);
            for wi in w {
                assert!(wi >= -1e-9 && wi <= 1.0 + 1e-9);
            }
        }
    }

    #[test]
    fn vertices_reproduce_themselves() {
        let points = square();
        let tri = Triangulation::build(&points).unwrap();
        for i in 0..points.len() {
            let p = points.coord(i);
            let t = tri.locate(p, 0).expect("vertex must lie in the mesh");
            let (idx, w) = tri.barycentric(t, p);
            // The weight mass concentrates entirely on the queried vertex.
            let mass: f64 = idx
                .iter()
                .zip(w.iter())
                .filter(|(j, _)| **j == i)
                .map(|(_, wi)| *wi)
                .sum();
            assert!((mass - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn duplicate_coordinates_collapse_to_first() {
        let points = GridPoints::new([
            (0.0, 0.0),
            (10.0, 0.0),
            (0.0, 10.0),
            (10.0, 10.0),
            (10.0, 0.0), // exact duplicate of index 1
        ]);
        let tri = Triangulation::build(&points).unwrap();
        let t = tri.locate([9.0, 1.0], 0).unwrap();
        let (idx, _) = tri.barycentric(t, [9.0, 1.0]);
        assert!(!idx.contains(&4), "duplicates must map to the first index");
    }

    #[test]
    fn irregular_cloud_covers_its_hull() {
        let points = GridPoints::new([
            (0.0, 0.0),
            (4.0, 1.0),
            (8.0, 0.5),
            (1.0, 4.5),
            (5.0, 5.0),
            (9.0, 4.0),
            (2.0, 8.0),
            (7.0, 9.0),
        ]);
        let tri = Triangulation::build(&points).unwrap();
        // Interior probes all land in some triangle.
        for p in [[2.0, 2.0], [5.0, 4.0], [6.0, 7.0], [3.0, 5.0]] {
            assert!(tri.locate(p, 0).is_some(), "{p:?} should be inside");
        }
    }
}
