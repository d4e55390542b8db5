use crate::config::{self, BatchOptions, EmptyGeometryPolicy};
use crate::error::{FeaturizeError, Result};
use crate::flatten::{self, AtomRow};
use crate::geometry::Geometry;
use rayon::prelude::*;
use tracing::{debug, info_span};

/// Geometries of a batch concatenated into flat arrays.
///
/// Atoms of geometry `i` occupy rows `geometry_offsets[i]..geometry_offsets[i + 1]` of
/// `atoms`, and every one of those rows has `crystal_index == i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedBatch {
    pub atoms: Vec<AtomRow>,
    pub cells: Vec<[[f64; 3]; 3]>,
    pub crystal_index: Vec<i32>,
    pub supercell_factors: Vec<[i32; 3]>,
    pub geometry_offsets: Vec<i32>,
}

struct FlatGeometry<'a> {
    geometry: &'a Geometry,
    atoms: Vec<AtomRow>,
    cell: [[f64; 3]; 3],
    supercell_factors: [i32; 3],
}

/// `Ok(None)` for an empty geometry that the policy skips.
fn flatten_geometry(
    geometry: &Geometry,
    index: usize,
    r_cut: f64,
    policy: EmptyGeometryPolicy,
) -> Result<Option<FlatGeometry<'_>>> {
    if geometry.is_empty() && policy == EmptyGeometryPolicy::Skip {
        return Ok(None);
    }
    let atoms = flatten::flatten_atoms(geometry, index)?;
    let supercell_factors = flatten::supercell_factors(geometry, r_cut)
        .map_err(|source| FeaturizeError::Cell { index, source })?;
    Ok(Some(FlatGeometry {
        geometry,
        atoms,
        cell: flatten::cell_of(geometry),
        supercell_factors,
    }))
}

/// Flattens every geometry and concatenates the results in input order.
///
/// Per-geometry work runs on the rayon pool when `options.parallel` is set and the batch
/// is at least [`config::get_parallel_threshold`] geometries long. Results are always
/// gathered in input order, and on failure the error of the first failing geometry is
/// returned.
pub fn assemble_batch(
    geometries: &[Geometry],
    r_cut: f64,
    options: BatchOptions,
) -> Result<FlattenedBatch> {
    let _span = info_span!("assemble_batch", n_geometries = geometries.len()).entered();

    if !r_cut.is_finite() || r_cut <= 0.0 {
        return Err(FeaturizeError::InvalidCutoff(r_cut));
    }

    let per_geometry: Vec<Result<Option<FlatGeometry<'_>>>> = {
        let _s = info_span!("flatten_geometries").entered();
        let policy = options.empty_geometry;
        if options.parallel && geometries.len() >= config::get_parallel_threshold() {
            geometries
                .par_iter()
                .enumerate()
                .map(|(i, g)| flatten_geometry(g, i, r_cut, policy))
                .collect()
        } else {
            geometries
                .iter()
                .enumerate()
                .map(|(i, g)| flatten_geometry(g, i, r_cut, policy))
                .collect()
        }
    };
    let flat: Vec<FlatGeometry<'_>> = per_geometry
        .into_iter()
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();

    let _s = info_span!("concatenate").entered();
    let n_kept = flat.len();
    let total_atoms: usize = flat.iter().map(|f| f.atoms.len()).sum();
    if i32::try_from(total_atoms).is_err() {
        return Err(FeaturizeError::TooManyAtoms(total_atoms));
    }
    if n_kept < geometries.len() {
        debug!(
            skipped = geometries.len() - n_kept,
            "dropped empty geometries"
        );
    }

    let mut batch = FlattenedBatch {
        atoms: Vec::with_capacity(total_atoms),
        cells: Vec::with_capacity(n_kept),
        crystal_index: Vec::with_capacity(total_atoms),
        supercell_factors: Vec::with_capacity(n_kept),
        geometry_offsets: Vec::with_capacity(n_kept + 1),
    };
    batch.geometry_offsets.push(0);

    // Offsets come from the same row counts, in the same order, as the concatenation.
    // Crystal indices number kept geometries, so skipped ones leave no gap.
    let mut offset: i32 = 0;
    for (i, f) in flat.into_iter().enumerate() {
        let n_atoms = f.atoms.len() as i32;
        batch
            .crystal_index
            .extend(flatten::crystal_index_row(f.geometry, i as i32));
        batch.atoms.extend(f.atoms);
        batch.cells.push(f.cell);
        batch.supercell_factors.push(f.supercell_factors);
        offset += n_atoms;
        batch.geometry_offsets.push(offset);
    }

    debug!(
        n_atoms = batch.atoms.len(),
        n_geometries = batch.cells.len(),
        "batch assembled"
    );
    Ok(batch)
}

impl FlattenedBatch {
    pub fn num_geometries(&self) -> usize {
        self.cells.len()
    }

    pub fn num_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Atom rows of geometry `i`.
    pub fn geometry(&self, i: usize) -> Option<&[AtomRow]> {
        let start = *self.geometry_offsets.get(i)? as usize;
        let end = *self.geometry_offsets.get(i + 1)? as usize;
        self.atoms.get(start..end)
    }

    /// Checks the layout invariants the featurizer relies on.
    pub fn validate(&self) -> Result<()> {
        let n_atoms = self.atoms.len();
        let n_geom = self.cells.len();

        if self.crystal_index.len() != n_atoms {
            return Err(FeaturizeError::InconsistentBatch(format!(
                "atoms has {} rows but crystal_index has {}",
                n_atoms,
                self.crystal_index.len()
            )));
        }
        if self.supercell_factors.len() != n_geom || self.geometry_offsets.len() != n_geom + 1 {
            return Err(FeaturizeError::InconsistentBatch(format!(
                "{} cells, {} supercell factors, {} offsets",
                n_geom,
                self.supercell_factors.len(),
                self.geometry_offsets.len()
            )));
        }
        if self.geometry_offsets[0] != 0 {
            return Err(FeaturizeError::InconsistentBatch(
                "geometry_offsets must start at 0".to_string(),
            ));
        }
        if self.geometry_offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(FeaturizeError::InconsistentBatch(
                "geometry_offsets must be non-decreasing".to_string(),
            ));
        }
        if self.geometry_offsets[n_geom] as usize != n_atoms {
            return Err(FeaturizeError::InconsistentBatch(format!(
                "last offset {} does not match {} atoms",
                self.geometry_offsets[n_geom], n_atoms
            )));
        }
        for (g, w) in self.geometry_offsets.windows(2).enumerate() {
            let rows = &self.crystal_index[w[0] as usize..w[1] as usize];
            if rows.iter().any(|&c| c != g as i32) {
                return Err(FeaturizeError::InconsistentBatch(format!(
                    "crystal_index disagrees with offsets for geometry {}",
                    g
                )));
            }
        }
        Ok(())
    }
}
