//! Drainage direction network.
//!
//! Holds the model's local drain direction (LDD) grid and the one-step
//! routing kernel used by the coupled flux aggregation. LDD codes follow
//! the numeric keypad layout with north up:
//!
//! ```text
//! 7 8 9
//! 4 5 6
//! 1 2 3
//! ```
//!
//! Code 5 is the pit (outlet) value: water at a pit has no downstream
//! neighbor. Setting a cell's code to 5 therefore suppresses routing out
//! of that cell, which is how coupled cells are detached from the model's
//! own river network before a run.

use ndarray::Array2;

use crate::grid::GridTransform;
use crate::raster::RasterData;

/// LDD code of a pit (outlet) cell.
pub const LDD_PIT: u8 = 5;

/// Selection of cells for a routing edit.
#[derive(Debug, Clone)]
pub enum RoutingCells {
    /// Every non-nodata cell of the grid
    All,
    /// The cells of the session's coupling map
    Coupled,
    /// An explicit list of (row, col) indices
    Cells(Vec<(usize, usize)>),
}

/// In-memory drainage direction grid.
///
/// Built once at session construction from the LDD raster; the routing
/// editor never modifies this structure, only the on-disk copy handed to
/// the engine.
#[derive(Debug, Clone)]
pub struct DrainageNetwork {
    codes: Array2<u8>,
    transform: GridTransform,
    nodata: u8,
}

impl DrainageNetwork {
    /// Build a drainage network from a decoded LDD raster.
    ///
    /// Values outside 1..=9 (including the raster's nodata) are stored as
    /// the given nodata code.
    pub fn from_raster(raster: &RasterData, nodata: u8) -> Self {
        let codes = raster.data.mapv(|v| {
            if raster.is_nodata(v) {
                nodata
            } else {
                let code = v as i64;
                if (1..=9).contains(&code) {
                    code as u8
                } else {
                    nodata
                }
            }
        });
        Self {
            codes,
            transform: raster.transform,
            nodata,
        }
    }

    /// (rows, cols) of the network.
    pub fn shape(&self) -> (usize, usize) {
        self.codes.dim()
    }

    /// Grid transform of the LDD raster.
    pub fn transform(&self) -> GridTransform {
        self.transform
    }

    /// Nodata code.
    pub fn nodata(&self) -> u8 {
        self.nodata
    }

    /// LDD code at (row, col).
    pub fn code(&self, row: usize, col: usize) -> u8 {
        self.codes[[row, col]]
    }

    /// Number of pit cells.
    pub fn pit_count(&self) -> usize {
        self.codes.iter().filter(|&&c| c == LDD_PIT).count()
    }

    /// Downstream neighbor of (row, col).
    ///
    /// Returns `None` for pits, nodata cells, and directions pointing
    /// outside the grid.
    pub fn downstream_of(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let code = self.codes[[row, col]];
        if code == self.nodata || code == LDD_PIT || !(1..=9).contains(&code) {
            return None;
        }
        // Keypad layout: 7/8/9 north, 1/2/3 south, 1/4/7 west, 3/6/9 east
        let dr: isize = match code {
            7 | 8 | 9 => -1,
            1 | 2 | 3 => 1,
            _ => 0,
        };
        let dc: isize = match code {
            1 | 4 | 7 => -1,
            3 | 6 | 9 => 1,
            _ => 0,
        };
        let (rows, cols) = self.shape();
        let r = row as isize + dr;
        let c = col as isize + dc;
        if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
            return None;
        }
        Some((r as usize, c as usize))
    }

    /// Route a grid of per-cell values exactly one step downstream.
    ///
    /// The result at each cell is the sum of the values flowing in from
    /// its immediate upstream neighbors. Pit cells keep their own value
    /// (the outlet accumulates), nodata cells contribute zero, and values
    /// whose direction points across the grid edge leave the domain.
    pub fn route_downstream(&self, values: &Array2<f64>) -> Array2<f64> {
        assert_eq!(
            values.dim(),
            self.codes.dim(),
            "value grid shape must match the drainage grid"
        );
        let mut routed = Array2::zeros(values.dim());
        let (rows, cols) = self.shape();
        for row in 0..rows {
            for col in 0..cols {
                let code = self.codes[[row, col]];
                if code == self.nodata {
                    continue;
                }
                let v = values[[row, col]];
                if v == 0.0 {
                    continue;
                }
                if code == LDD_PIT {
                    routed[[row, col]] += v;
                } else if let Some((r, c)) = self.downstream_of(row, col) {
                    routed[[r, c]] += v;
                }
            }
        }
        routed
    }
}

/// Set the LDD code to [`LDD_PIT`] at the selected cells of a raw code
/// grid, skipping nodata cells. Cells outside the selection are untouched;
/// `None` selects every cell.
///
/// Works on the f64 grid of a decoded raster so the edited grid can be
/// written back with the same codec.
pub fn apply_pits(codes: &mut Array2<f64>, cells: Option<&[(usize, usize)]>, nodata: f64) {
    match cells {
        None => {
            codes.mapv_inplace(|v| if v == nodata { v } else { f64::from(LDD_PIT) });
        }
        Some(indices) => {
            for &(row, col) in indices {
                if codes[[row, col]] != nodata {
                    codes[[row, col]] = f64::from(LDD_PIT);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn network(codes: Array2<f64>, nodata: u8) -> DrainageNetwork {
        let raster = RasterData {
            data: codes,
            transform: GridTransform::new(0.0, 3.0, 1.0, 1.0),
            nodata: f64::from(nodata),
        };
        DrainageNetwork::from_raster(&raster, nodata)
    }

    #[test]
    fn test_downstream_directions() {
        // All eight directions around the center of a 3x3 grid
        let dd = network(
            array![[3., 2., 1.], [6., 5., 4.], [9., 8., 7.]],
            255,
        );
        assert_eq!(dd.downstream_of(0, 0), Some((1, 1))); // 3 = SE
        assert_eq!(dd.downstream_of(0, 1), Some((1, 1))); // 2 = S
        assert_eq!(dd.downstream_of(0, 2), Some((1, 1))); // 1 = SW
        assert_eq!(dd.downstream_of(1, 0), Some((1, 1))); // 6 = E
        assert_eq!(dd.downstream_of(1, 2), Some((1, 1))); // 4 = W
        assert_eq!(dd.downstream_of(2, 0), Some((1, 1))); // 9 = NE
        assert_eq!(dd.downstream_of(2, 1), Some((1, 1))); // 8 = N
        assert_eq!(dd.downstream_of(2, 2), Some((1, 1))); // 7 = NW
        assert_eq!(dd.downstream_of(1, 1), None); // pit
    }

    #[test]
    fn test_downstream_off_grid() {
        let dd = network(array![[8., 8.], [2., 2.]], 255);
        // 8 = N in the top row leaves the grid
        assert_eq!(dd.downstream_of(0, 0), None);
        // 2 = S in the bottom row leaves the grid
        assert_eq!(dd.downstream_of(1, 1), None);
    }

    #[test]
    fn test_route_converging_flow() {
        let dd = network(
            array![[3., 2., 1.], [6., 5., 4.], [9., 8., 7.]],
            255,
        );
        let values = Array2::from_elem((3, 3), 1.0);
        let routed = dd.route_downstream(&values);
        // Everything converges on the pit, which also keeps its own value
        assert_eq!(routed[[1, 1]], 9.0);
        assert_eq!(routed[[0, 0]], 0.0);
        assert_eq!(routed.sum(), 9.0);
    }

    #[test]
    fn test_route_nodata_contributes_zero() {
        let dd = network(array![[255., 2.], [5., 5.]], 255);
        let values = array![[10.0, 1.0], [0.0, 0.0]];
        let routed = dd.route_downstream(&values);
        // nodata cell's 10.0 vanishes, the S-flowing 1.0 lands below
        assert_eq!(routed[[1, 1]], 1.0);
        assert_eq!(routed.sum(), 1.0);
    }

    #[test]
    fn test_route_chain_moves_one_step_only() {
        // 6 -> 6 -> pit in one row
        let dd = network(array![[6., 6., 5.]], 255);
        let values = array![[1.0, 0.0, 0.0]];
        let routed = dd.route_downstream(&values);
        // Exactly one step: value sits at the middle cell, not the pit
        assert_eq!(routed[[0, 1]], 1.0);
        assert_eq!(routed[[0, 2]], 0.0);
    }

    #[test]
    fn test_apply_pits_explicit_cells() {
        let mut codes = array![[2., 255.], [6., 8.]];
        apply_pits(&mut codes, Some(&[(0, 0), (0, 1)]), 255.0);
        assert_eq!(codes[[0, 0]], 5.0);
        // nodata never overwritten
        assert_eq!(codes[[0, 1]], 255.0);
        // unselected cells untouched
        assert_eq!(codes[[1, 0]], 6.0);
        assert_eq!(codes[[1, 1]], 8.0);
    }

    #[test]
    fn test_apply_pits_all() {
        let mut codes = array![[2., 255.], [6., 8.]];
        apply_pits(&mut codes, None, 255.0);
        assert_eq!(codes, array![[5., 255.], [5., 5.]]);
    }

    #[test]
    fn test_from_raster_clamps_invalid_codes() {
        let dd = network(array![[12., 0.], [4., 255.]], 255);
        assert_eq!(dd.code(0, 0), 255);
        assert_eq!(dd.code(0, 1), 255);
        assert_eq!(dd.code(1, 0), 4);
        assert_eq!(dd.code(1, 1), 255);
    }

    #[test]
    fn test_pit_count() {
        let dd = network(array![[5., 2.], [5., 255.]], 255);
        assert_eq!(dd.pit_count(), 2);
    }
}
