use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CellError {
    #[error("Cell matrix is not invertible")]
    NotInvertible,
    #[error("Cutoff must be positive and finite, got {0}")]
    InvalidCutoff(f64),
    #[error("Cell is degenerate: non-finite entries or zero face spacing")]
    DegenerateCell,
    #[error("Supercell factor {0} is out of range")]
    FactorOverflow(f64),
}

/// Largest replication count along one lattice direction.
pub const MAX_SUPERCELL_FACTOR: i32 = i32::MAX;

/// Periodic cell with lattice vectors stored as the columns of `h`.
#[derive(Clone, Debug)]
pub struct Cell {
    h: Matrix3<f64>,
    h_inv: Matrix3<f64>,
}

impl Cell {
    pub fn new(h: Matrix3<f64>) -> Result<Self, CellError> {
        if h.iter().any(|x| !x.is_finite()) {
            return Err(CellError::DegenerateCell);
        }
        let h_inv = h.try_inverse().ok_or(CellError::NotInvertible)?;
        Ok(Self { h, h_inv })
    }

    /// Builds a cell from lattice vectors given as rows (ASE layout).
    pub fn from_lattice_vectors(rows: &[[f64; 3]; 3]) -> Result<Self, CellError> {
        // Transpose row-major input to internal column-major
        let h = Matrix3::new(
            rows[0][0], rows[1][0], rows[2][0], //
            rows[0][1], rows[1][1], rows[2][1], //
            rows[0][2], rows[1][2], rows[2][2],
        );
        Self::new(h)
    }

    pub fn to_cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.h * frac
    }

    pub fn h(&self) -> &Matrix3<f64> {
        &self.h
    }

    /// Returns the perpendicular widths of the cell (distances between parallel faces).
    /// d_i = 1 / |h_inv.row(i)|
    pub fn perpendicular_widths(&self) -> Vector3<f64> {
        Vector3::new(
            1.0 / self.h_inv.row(0).norm(),
            1.0 / self.h_inv.row(1).norm(),
            1.0 / self.h_inv.row(2).norm(),
        )
    }

    /// Periodic images needed along each lattice direction to cover `r_cut`:
    /// f_i = ceil(r_cut / d_i), at least 1 for any positive cutoff.
    ///
    /// Fails instead of clamping when a face spacing is not finite and positive, or when a
    /// factor does not fit in `1..=MAX_SUPERCELL_FACTOR`.
    pub fn supercell_factors(&self, r_cut: f64) -> Result<Vector3<i32>, CellError> {
        if !r_cut.is_finite() || r_cut <= 0.0 {
            return Err(CellError::InvalidCutoff(r_cut));
        }
        let widths = self.perpendicular_widths();
        let mut factors = Vector3::zeros();
        for (f, &d) in factors.iter_mut().zip(widths.iter()) {
            if !d.is_finite() || d <= 0.0 {
                return Err(CellError::DegenerateCell);
            }
            let n = (r_cut / d).ceil();
            if !(1.0..=f64::from(MAX_SUPERCELL_FACTOR)).contains(&n) {
                return Err(CellError::FactorOverflow(n));
            }
            *f = n as i32;
        }
        Ok(factors)
    }

    /// Cartesian translation of the periodic image at integer `shift`.
    pub fn lattice_translation(&self, shift: &Vector3<i32>) -> Vector3<f64> {
        self.to_cartesian(&shift.map(f64::from))
    }
}
