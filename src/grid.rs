//! Model grid geometry.
//!
//! Provides the north-up affine transform shared by all rasters of a model
//! run, plus the read-only grid snapshot derived from the landmask raster
//! at session construction.
//!
//! # Example
//!
//! ```
//! use pcr_coupler::grid::GridTransform;
//!
//! // 0.5 degree cells, origin at (5.0 E, 62.0 N)
//! let transform = GridTransform::new(5.0, 62.0, 0.5, 0.5);
//!
//! // Point in the second column, first row
//! assert_eq!(transform.index(5.75, 61.75), (0, 1));
//! ```

/// North-up affine transform of a regular grid.
///
/// The origin is the outer corner of the top-left cell: `x_origin` is the
/// western edge, `y_origin` the northern edge. Rows increase southward,
/// columns eastward. Rotated grids are not supported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    /// X coordinate of the western grid edge
    pub x_origin: f64,
    /// Y coordinate of the northern grid edge
    pub y_origin: f64,
    /// Cell width in map units
    pub dx: f64,
    /// Cell height in map units (positive)
    pub dy: f64,
}

impl GridTransform {
    /// Create a new transform.
    pub fn new(x_origin: f64, y_origin: f64, dx: f64, dy: f64) -> Self {
        Self {
            x_origin,
            y_origin,
            dx,
            dy,
        }
    }

    /// Map a coordinate to signed (row, col) indices.
    ///
    /// Points outside the grid yield negative indices or indices at or
    /// beyond the shape; callers check against the grid extent.
    pub fn index(&self, x: f64, y: f64) -> (isize, isize) {
        let col = ((x - self.x_origin) / self.dx).floor() as isize;
        let row = ((self.y_origin - y) / self.dy).floor() as isize;
        (row, col)
    }

    /// Coordinate of the center of cell (row, col).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.x_origin + (col as f64 + 0.5) * self.dx;
        let y = self.y_origin - (row as f64 + 0.5) * self.dy;
        (x, y)
    }

    /// Bounding box of a grid with `(rows, cols)` cells under this transform.
    pub fn bounds(&self, shape: (usize, usize)) -> BoundingBox {
        let (rows, cols) = shape;
        BoundingBox {
            xmin: self.x_origin,
            ymin: self.y_origin - rows as f64 * self.dy,
            xmax: self.x_origin + cols as f64 * self.dx,
            ymax: self.y_origin,
        }
    }
}

/// Axis-aligned bounding box in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Western edge
    pub xmin: f64,
    /// Southern edge
    pub ymin: f64,
    /// Eastern edge
    pub xmax: f64,
    /// Northern edge
    pub ymax: f64,
}

impl BoundingBox {
    /// Check if a point lies within the box (edges inclusive).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }
}

/// Read-only snapshot of the model grid, derived from the landmask raster.
///
/// Computed once at session construction and never recomputed; the landmask
/// file must not change afterwards.
#[derive(Debug, Clone, Copy)]
pub struct GridSpec {
    /// Affine transform of the grid
    pub transform: GridTransform,
    /// (rows, cols)
    pub shape: (usize, usize),
    /// Bounding box of the full grid
    pub bounds: BoundingBox,
}

impl GridSpec {
    /// Derive a grid snapshot from a transform and shape.
    pub fn new(transform: GridTransform, shape: (usize, usize)) -> Self {
        Self {
            transform,
            shape,
            bounds: transform.bounds(shape),
        }
    }

    /// Cell resolution as (dx, dy).
    pub fn resolution(&self) -> (f64, f64) {
        (self.transform.dx, self.transform.dy)
    }

    /// Check if signed (row, col) indices fall inside the grid.
    pub fn contains_index(&self, row: isize, col: isize) -> bool {
        let (rows, cols) = self.shape;
        row >= 0 && (row as usize) < rows && col >= 0 && (col as usize) < cols
    }
}

impl std::fmt::Display for GridSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} cells, res ({}, {}), bounds [{}, {}] x [{}, {}]",
            self.shape.0,
            self.shape.1,
            self.transform.dx,
            self.transform.dy,
            self.bounds.xmin,
            self.bounds.xmax,
            self.bounds.ymin,
            self.bounds.ymax
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_index_inside() {
        let t = GridTransform::new(0.0, 10.0, 1.0, 1.0);
        assert_eq!(t.index(0.5, 9.5), (0, 0));
        assert_eq!(t.index(3.5, 7.5), (2, 3));
    }

    #[test]
    fn test_index_outside() {
        let t = GridTransform::new(0.0, 10.0, 1.0, 1.0);
        let (row, col) = t.index(-0.5, 10.5);
        assert!(row < 0);
        assert!(col < 0);
    }

    #[test]
    fn test_cell_center_round_trip() {
        let t = GridTransform::new(5.0, 62.0, 0.5, 0.25);
        let (x, y) = t.cell_center(3, 7);
        assert_eq!(t.index(x, y), (3, 7));
    }

    #[test]
    fn test_bounds() {
        let t = GridTransform::new(5.0, 62.0, 0.5, 0.5);
        let b = t.bounds((4, 6));
        assert!((b.xmin - 5.0).abs() < TOL);
        assert!((b.xmax - 8.0).abs() < TOL);
        assert!((b.ymax - 62.0).abs() < TOL);
        assert!((b.ymin - 60.0).abs() < TOL);
    }

    #[test]
    fn test_bbox_contains() {
        let b = BoundingBox {
            xmin: 0.0,
            ymin: 0.0,
            xmax: 2.0,
            ymax: 2.0,
        };
        assert!(b.contains(1.0, 1.0));
        assert!(b.contains(0.0, 2.0));
        assert!(!b.contains(2.5, 1.0));
    }

    #[test]
    fn test_grid_spec() {
        let spec = GridSpec::new(GridTransform::new(0.0, 4.0, 1.0, 1.0), (4, 5));
        assert_eq!(spec.resolution(), (1.0, 1.0));
        assert!(spec.contains_index(3, 4));
        assert!(!spec.contains_index(4, 0));
        assert!(!spec.contains_index(-1, 0));
    }
}
