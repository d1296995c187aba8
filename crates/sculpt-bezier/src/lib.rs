#![warn(missing_docs)]

//! Cubic Bezier evaluation for the sculpt core.
//!
//! Every patch in a sculpt surface is a bicubic tensor-product Bezier
//! patch. This crate evaluates the boundary curves and the patches into
//! regular point grids that the tessellator turns into polygons.
//!
//! # Key types
//!
//! - [`CubicBezier`]: a cubic curve from 4 control points
//! - [`BicubicPatch`]: a 4x4 control grid
//! - [`PointGrid`]: a row-major grid of evaluated points
//!
//! # Algorithms
//!
//! - Bernstein blending for single parameter values
//! - Two-pass separable subdivision for patches: rows first, then the
//!   columns of the intermediate grid
//! - Turning-angle driven adaptive subdivision for curves

use sculpt_math::{Point3, Transform, Vec3};
use thiserror::Error;

/// Errors from Bezier evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BezierError {
    /// Subdivision count must be at least 1.
    #[error("invalid subdivision count {0}: must be at least 1")]
    InvalidSubdivision(usize),

    /// Wrong number of control points for the requested shape.
    #[error("expected {expected} control points, got {found}")]
    InvalidPointCount {
        /// Number of points the shape needs.
        expected: usize,
        /// Number of points supplied.
        found: usize,
    },
}

/// Result alias for Bezier operations.
pub type Result<T> = std::result::Result<T, BezierError>;

/// Cubic Bernstein basis values at `t`.
pub fn bernstein(t: f64) -> [f64; 4] {
    let mt = 1.0 - t;
    [mt * mt * mt, 3.0 * mt * mt * t, 3.0 * mt * t * t, t * t * t]
}

fn blend(points: &[Point3; 4], t: f64) -> Point3 {
    let b = bernstein(t);
    let mut acc = Vec3::zeros();
    for (p, w) in points.iter().zip(b) {
        acc += p.coords * w;
    }
    Point3::from(acc)
}

/// Sample a cubic at `n + 1` evenly spaced parameters.
///
/// The first and last samples are the end control points bit for bit.
fn sample(points: &[Point3; 4], n: usize) -> Result<Vec<Point3>> {
    if n < 1 {
        return Err(BezierError::InvalidSubdivision(n));
    }
    let mut out = Vec::with_capacity(n + 1);
    out.push(points[0]);
    for i in 1..n {
        out.push(blend(points, i as f64 / n as f64));
    }
    out.push(points[3]);
    Ok(out)
}

// =============================================================================
// Curves
// =============================================================================

/// A cubic Bezier curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    /// Control points `[P0, P1, P2, P3]`.
    pub points: [Point3; 4],
}

impl CubicBezier {
    /// Create a curve from its 4 control points.
    pub fn new(points: [Point3; 4]) -> Self {
        Self { points }
    }

    /// Create a curve from a slice that must hold exactly 4 points.
    pub fn from_slice(points: &[Point3]) -> Result<Self> {
        let points: [Point3; 4] = points.try_into().map_err(|_| BezierError::InvalidPointCount {
            expected: 4,
            found: points.len(),
        })?;
        Ok(Self { points })
    }

    /// Evaluate at `t` in `[0, 1]`.
    pub fn eval(&self, t: f64) -> Point3 {
        blend(&self.points, t)
    }

    /// The curve with every control point transformed.
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self::new(self.points.map(|p| transform.apply_point(&p)))
    }

    /// Sample the curve into `n + 1` points at `t = i / n`.
    pub fn subdivide(&self, n: usize) -> Result<Vec<Point3>> {
        sample(&self.points, n)
    }

    /// Length of the polyline through `n + 1` samples.
    pub fn arc_length(&self, n: usize) -> Result<f64> {
        let pts = self.subdivide(n)?;
        Ok(pts.windows(2).map(|w| (w[1] - w[0]).norm()).sum())
    }

    /// Largest angle (radians) between consecutive segments of the
    /// `n`-segment polyline. Zero-length segments are skipped.
    pub fn max_turning_angle(&self, n: usize) -> Result<f64> {
        let pts = self.subdivide(n)?;
        let segments: Vec<Vec3> = pts
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|v| v.norm() > f64::EPSILON)
            .collect();
        Ok(segments
            .windows(2)
            .map(|w| w[0].angle(&w[1]))
            .fold(0.0, f64::max))
    }

    /// Smallest subdivision count (starting at 2) whose polyline turns by at
    /// most `max_angle` radians between consecutive segments.
    ///
    /// Stops at `limit` if the threshold is never reached.
    pub fn adaptive_subdivisions(&self, max_angle: f64, limit: usize) -> usize {
        let limit = limit.max(2);
        let mut n = 2;
        while n < limit {
            match self.max_turning_angle(n) {
                Ok(angle) if angle <= max_angle => return n,
                _ => n += 1,
            }
        }
        limit
    }
}

// =============================================================================
// Point grids
// =============================================================================

/// A row-major grid of points.
#[derive(Debug, Clone, PartialEq)]
pub struct PointGrid {
    rows: usize,
    cols: usize,
    points: Vec<Point3>,
}

impl PointGrid {
    /// Build a grid from row-major points.
    pub fn new(rows: usize, cols: usize, points: Vec<Point3>) -> Result<Self> {
        if points.len() != rows * cols {
            return Err(BezierError::InvalidPointCount {
                expected: rows * cols,
                found: points.len(),
            });
        }
        Ok(Self { rows, cols, points })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the grid holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Point3 {
        assert!(row < self.rows && col < self.cols, "grid index out of bounds");
        self.points[row * self.cols + col]
    }

    /// Row-major index of `(row, col)`.
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Points of one row.
    pub fn row(&self, row: usize) -> &[Point3] {
        &self.points[row * self.cols..(row + 1) * self.cols]
    }

    /// All points, row-major.
    pub fn points(&self) -> &[Point3] {
        &self.points
    }
}

// =============================================================================
// Patches
// =============================================================================

/// A bicubic Bezier patch from a 4x4 control grid.
///
/// `points[row][col]`: the `u` parameter runs along a row, `v` across rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BicubicPatch {
    /// Control points, row-major.
    pub points: [[Point3; 4]; 4],
}

impl BicubicPatch {
    /// Create a patch from its 4x4 control grid.
    pub fn new(points: [[Point3; 4]; 4]) -> Self {
        Self { points }
    }

    /// Create a patch from 16 row-major points.
    pub fn from_row_major(points: &[Point3]) -> Result<Self> {
        if points.len() != 16 {
            return Err(BezierError::InvalidPointCount {
                expected: 16,
                found: points.len(),
            });
        }
        let mut grid = [[Point3::origin(); 4]; 4];
        for (i, p) in points.iter().enumerate() {
            grid[i / 4][i % 4] = *p;
        }
        Ok(Self::new(grid))
    }

    /// The patch with every control point transformed.
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self::new(self.points.map(|row| row.map(|p| transform.apply_point(&p))))
    }

    /// Evaluate at `(u, v)` in `[0, 1]^2`.
    pub fn eval(&self, u: f64, v: f64) -> Point3 {
        let column: [Point3; 4] = self.points.map(|row| blend(&row, u));
        blend(&column, v)
    }

    /// Subdivide into an `(n + 1) x (n + 1)` grid.
    ///
    /// First pass evaluates each of the 4 control rows into `n + 1` points,
    /// second pass evaluates each column of that `4 x (n + 1)` intermediate.
    pub fn subdivide(&self, n: usize) -> Result<PointGrid> {
        let intermediate = self
            .points
            .iter()
            .map(|row| sample(row, n))
            .collect::<Result<Vec<_>>>()?;

        let size = n + 1;
        let mut out = vec![Point3::origin(); size * size];
        for col in 0..size {
            let column = [
                intermediate[0][col],
                intermediate[1][col],
                intermediate[2][col],
                intermediate[3][col],
            ];
            for (row, p) in sample(&column, n)?.into_iter().enumerate() {
                out[row * size + col] = p;
            }
        }
        PointGrid::new(size, size, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wavy() -> CubicBezier {
        CubicBezier::new([
            Point3::new(0.3, -1.2, 4.0),
            Point3::new(1.7, 2.9, -0.5),
            Point3::new(3.1, -2.2, 1.5),
            Point3::new(5.9, 0.4, 2.25),
        ])
    }

    fn flat_grid() -> Vec<Point3> {
        (0..16)
            .map(|i| Point3::new((i % 4) as f64, (i / 4) as f64, 0.0))
            .collect()
    }

    #[test]
    fn test_bernstein_partition_of_unity() {
        for i in 0..=10 {
            let sum: f64 = bernstein(i as f64 / 10.0).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_subdivide_endpoints_exact() {
        let c = wavy();
        for n in [1, 2, 3, 7, 48] {
            let pts = c.subdivide(n).unwrap();
            assert_eq!(pts.len(), n + 1);
            assert_eq!(pts[0], c.points[0]);
            assert_eq!(pts[n], c.points[3]);
        }
    }

    #[test]
    fn test_subdivide_rejects_zero() {
        assert_eq!(
            wavy().subdivide(0),
            Err(BezierError::InvalidSubdivision(0))
        );
    }

    #[test]
    fn test_degenerate_curve_yields_coincident_points() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let pts = CubicBezier::new([p; 4]).subdivide(5).unwrap();
        assert_eq!(pts.len(), 6);
        for q in pts {
            assert_relative_eq!(q, p, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_midpoint_of_symmetric_curve() {
        let c = CubicBezier::new([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ]);
        assert_relative_eq!(c.eval(0.5), Point3::new(0.5, 0.75, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_arc_length_of_straight_curve() {
        let c = CubicBezier::new([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ]);
        assert_relative_eq!(c.arc_length(8).unwrap(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(c.max_turning_angle(8).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_adaptive_subdivisions_monotone_in_threshold() {
        let c = wavy();
        let coarse = c.adaptive_subdivisions(0.5, 5000);
        let fine = c.adaptive_subdivisions(0.1, 5000);
        assert!(coarse >= 2);
        assert!(fine > coarse);
        assert!(fine < 5000);
        assert!(c.max_turning_angle(fine).unwrap() <= 0.1);
    }

    #[test]
    fn test_adaptive_subdivisions_straight_line_is_minimal() {
        let c = CubicBezier::new([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(2.0, 2.0, 2.0),
            Point3::new(3.0, 3.0, 3.0),
        ]);
        assert_eq!(c.adaptive_subdivisions(0.01, 100), 2);
    }

    #[test]
    fn test_from_slice_wrong_count() {
        let err = CubicBezier::from_slice(&[Point3::origin(); 3]).unwrap_err();
        assert_eq!(err, BezierError::InvalidPointCount { expected: 4, found: 3 });
    }

    #[test]
    fn test_patch_grid_size() {
        let patch = BicubicPatch::from_row_major(&flat_grid()).unwrap();
        for n in [1, 4, 9] {
            let grid = patch.subdivide(n).unwrap();
            assert_eq!(grid.rows(), n + 1);
            assert_eq!(grid.cols(), n + 1);
            assert_eq!(grid.len(), (n + 1) * (n + 1));
        }
    }

    #[test]
    fn test_flat_patch_stays_flat_and_keeps_corners() {
        let pts = flat_grid();
        let patch = BicubicPatch::from_row_major(&pts).unwrap();
        let grid = patch.subdivide(4).unwrap();
        for p in grid.points() {
            assert_eq!(p.z, 0.0);
        }
        assert_eq!(grid.get(0, 0), pts[0]);
        assert_eq!(grid.get(0, 4), pts[3]);
        assert_eq!(grid.get(4, 0), pts[12]);
        assert_eq!(grid.get(4, 4), pts[15]);
        // Evenly spaced control points give evenly spaced samples.
        assert_relative_eq!(grid.get(2, 1), Point3::new(0.75, 1.5, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_subdivide_matches_direct_eval() {
        let mut pts = flat_grid();
        pts[5].z = 2.0;
        pts[10].z = -1.5;
        pts[3].y += 0.7;
        let patch = BicubicPatch::from_row_major(&pts).unwrap();
        let grid = patch.subdivide(6).unwrap();
        for row in 0..=6 {
            for col in 0..=6 {
                let expected = patch.eval(col as f64 / 6.0, row as f64 / 6.0);
                assert_relative_eq!(grid.get(row, col), expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_patch_boundary_row_matches_curve() {
        let mut pts = flat_grid();
        pts[1].z = 1.0;
        pts[2].z = -1.0;
        let patch = BicubicPatch::from_row_major(&pts).unwrap();
        let grid = patch.subdivide(5).unwrap();
        let curve = CubicBezier::from_slice(&pts[0..4]).unwrap();
        for (a, b) in grid.row(0).iter().zip(curve.subdivide(5).unwrap()) {
            assert_relative_eq!(*a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_patch_transformed() {
        let patch = BicubicPatch::from_row_major(&flat_grid()).unwrap();
        let moved = patch.transformed(&Transform::translation(0.0, 0.0, 5.0));
        let grid = moved.subdivide(2).unwrap();
        assert!(grid.points().iter().all(|p| (p.z - 5.0).abs() < 1e-12));
    }

    #[test]
    fn test_patch_from_row_major_wrong_count() {
        assert!(BicubicPatch::from_row_major(&flat_grid()[..15]).is_err());
    }
}
