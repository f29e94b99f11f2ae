//! Coupling roles and masks.
//!
//! The external coupling layer decides which model cells exchange water
//! with the partner model and in which role. It hands the session a
//! [`CouplingMap`]: the list of coupled cells plus a grid-shaped role
//! mask. The map must be set before routing suppression or flux
//! aggregation is requested.

use ndarray::Array2;
use thiserror::Error;

/// Role code of an uncoupled cell.
pub const ROLE_NONE: u8 = 0;
/// Role code of a cell contributing runoff to the partner model.
pub const ROLE_RUNOFF: u8 = 1;
/// Role code of a cell contributing routed discharge to the partner model.
pub const ROLE_DISCHARGE: u8 = 2;

/// Error type for coupling map construction.
#[derive(Debug, Error)]
pub enum CouplingError {
    /// A coupled index lies outside the mask
    #[error("Coupled cell ({row}, {col}) outside the {rows}x{cols} mask")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// The role mask does not match the model grid
    #[error("Coupling mask shape {actual:?} does not match the model grid {expected:?}")]
    MaskShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Cell-to-role association supplied by the coupling layer.
#[derive(Debug, Clone)]
pub struct CouplingMap {
    indices: Vec<(usize, usize)>,
    mask: Array2<u8>,
}

impl CouplingMap {
    /// Create a coupling map from coupled cell indices and a role mask.
    ///
    /// # Errors
    /// `IndexOutOfBounds` if any index falls outside the mask shape.
    pub fn new(indices: Vec<(usize, usize)>, mask: Array2<u8>) -> Result<Self, CouplingError> {
        let (rows, cols) = mask.dim();
        for &(row, col) in &indices {
            if row >= rows || col >= cols {
                return Err(CouplingError::IndexOutOfBounds {
                    row,
                    col,
                    rows,
                    cols,
                });
            }
        }
        Ok(Self { indices, mask })
    }

    /// The coupled cell indices.
    pub fn indices(&self) -> &[(usize, usize)] {
        &self.indices
    }

    /// The grid-shaped role mask (values [`ROLE_NONE`], [`ROLE_RUNOFF`],
    /// [`ROLE_DISCHARGE`]).
    pub fn mask(&self) -> &Array2<u8> {
        &self.mask
    }

    /// Number of cells tagged with a given role.
    pub fn role_count(&self, role: u8) -> usize {
        self.mask.iter().filter(|&&r| r == role).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_valid_map() {
        let mask = array![[1u8, 0], [2, 0]];
        let map = CouplingMap::new(vec![(0, 0), (1, 0)], mask).unwrap();
        assert_eq!(map.indices().len(), 2);
        assert_eq!(map.role_count(ROLE_RUNOFF), 1);
        assert_eq!(map.role_count(ROLE_DISCHARGE), 1);
        assert_eq!(map.role_count(ROLE_NONE), 2);
    }

    #[test]
    fn test_index_out_of_bounds() {
        let mask = array![[1u8, 0], [2, 0]];
        let result = CouplingMap::new(vec![(2, 0)], mask);
        assert!(matches!(
            result,
            Err(CouplingError::IndexOutOfBounds { .. })
        ));
    }
}
