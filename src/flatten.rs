//! Per-geometry transforms. Each function looks at a single [`Geometry`] only, so they can
//! run for many geometries concurrently.

use crate::cell::{Cell, CellError};
use crate::error::{FeaturizeError, Result};
use crate::geometry::Geometry;
use nalgebra::Vector3;

/// One atom row: `[Z, x, y, z]`.
pub type AtomRow = [f64; 4];

/// `(Z, x, y, z)` rows in record order. `index` is only used to name the geometry in the
/// error when it has no atoms.
pub fn flatten_atoms(geometry: &Geometry, index: usize) -> Result<Vec<AtomRow>> {
    if geometry.is_empty() {
        return Err(FeaturizeError::EmptyGeometry { index });
    }
    Ok(geometry
        .numbers()
        .iter()
        .zip(geometry.positions())
        .map(|(&z, p)| [f64::from(z), p.x, p.y, p.z])
        .collect())
}

/// `assigned` repeated once per atom. Any source index carried by the record is ignored.
pub fn crystal_index_row(geometry: &Geometry, assigned: i32) -> Vec<i32> {
    vec![assigned; geometry.len()]
}

pub fn cell_of(geometry: &Geometry) -> [[f64; 3]; 3] {
    *geometry.cell()
}

pub fn supercell_factors(
    geometry: &Geometry,
    r_cut: f64,
) -> std::result::Result<[i32; 3], CellError> {
    let cell = Cell::from_lattice_vectors(geometry.cell())?;
    let f = cell.supercell_factors(r_cut)?;
    Ok([f.x, f.y, f.z])
}

/// Replicates the geometry over periodic images with shifts in `[-f_i, f_i]` along each
/// lattice direction, where `f` are its supercell factors.
///
/// The unshifted image comes first, so the leading `geometry.len()` rows are the input
/// atoms; the remaining images follow in lexicographic shift order.
///
/// Fails with [`CellError::FactorOverflow`] when the image count does not fit in memory.
pub fn supercell_atoms(
    geometry: &Geometry,
    r_cut: f64,
) -> std::result::Result<Vec<AtomRow>, CellError> {
    let cell = Cell::from_lattice_vectors(geometry.cell())?;
    let f = cell.supercell_factors(r_cut)?;

    let n_rows = image_count(&f)
        .and_then(|n| n.checked_mul(geometry.len()))
        .filter(|&n| n <= isize::MAX as usize / std::mem::size_of::<AtomRow>())
        .ok_or_else(|| {
            let per_axis = f.map(|x| 2.0 * f64::from(x) + 1.0);
            CellError::FactorOverflow(per_axis.x * per_axis.y * per_axis.z)
        })?;

    let mut shifts = vec![Vector3::zeros()];
    for i in -f.x..=f.x {
        for j in -f.y..=f.y {
            for k in -f.z..=f.z {
                if (i, j, k) != (0, 0, 0) {
                    shifts.push(Vector3::new(i, j, k));
                }
            }
        }
    }

    let mut rows = Vec::with_capacity(n_rows);
    for shift in &shifts {
        let t = cell.lattice_translation(shift);
        for (&z, p) in geometry.numbers().iter().zip(geometry.positions()) {
            let q = p + t;
            rows.push([f64::from(z), q.x, q.y, q.z]);
        }
    }
    Ok(rows)
}

/// `(2f_x + 1)(2f_y + 1)(2f_z + 1)`, or `None` on overflow.
fn image_count(f: &Vector3<i32>) -> Option<usize> {
    f.iter().try_fold(1usize, |acc, &x| {
        let side = usize::try_from(x).ok()?.checked_mul(2)?.checked_add(1)?;
        acc.checked_mul(side)
    })
}
