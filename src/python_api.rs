use crate::config::{self, BatchOptions, EmptyGeometryPolicy};
use crate::error::FeaturizeError;
use crate::geometry::Geometry;
use crate::interactions::{ChemicalSystem, InteractionKey, InteractionMap, Pair, Triple};
use crate::knots::BsplineConfig;
use nalgebra::Vector3;
use numpy::{PyArrayMethods, PyReadonlyArray1, PyReadonlyArray2, PyUntypedArrayMethods};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyTuple};
use std::collections::HashMap;

impl From<FeaturizeError> for PyErr {
    fn from(e: FeaturizeError) -> Self {
        pyo3::exceptions::PyValueError::new_err(e.to_string())
    }
}

fn get_positions(positions: &PyReadonlyArray2<'_, f64>) -> PyResult<Vec<Vector3<f64>>> {
    if positions.shape()[1] != 3 {
        return Err(pyo3::exceptions::PyValueError::new_err(
            "Positions must be (N, 3)",
        ));
    }

    if let Ok(slice) = positions.as_slice()
        && let Ok(cast_slice) = bytemuck::try_cast_slice::<f64, Vector3<f64>>(slice)
    {
        return Ok(cast_slice.to_vec());
    }

    // Fallback: copy row by row
    let pos_view = positions.as_array();
    Ok(pos_view
        .rows()
        .into_iter()
        .map(|row| Vector3::new(row[0], row[1], row[2]))
        .collect())
}

fn extract_ase_geometry(atoms: &Bound<'_, PyAny>) -> PyResult<Geometry> {
    let numbers_obj = atoms.call_method0("get_atomic_numbers")?;
    let numbers: PyReadonlyArray1<i64> = numbers_obj.extract()?;
    let numbers = numbers
        .as_array()
        .iter()
        .map(|&z| {
            u8::try_from(z).map_err(|_| {
                pyo3::exceptions::PyValueError::new_err(format!("Invalid atomic number {}", z))
            })
        })
        .collect::<PyResult<Vec<u8>>>()?;

    let pos_obj = atoms.call_method0("get_positions")?;
    let positions: PyReadonlyArray2<f64> = pos_obj.extract()?;
    let positions = get_positions(&positions)?;

    // ASE cell rows are lattice vectors; kept as-is
    let cell_obj = atoms.call_method0("get_cell")?;
    let cell_array_obj = cell_obj.call_method0("__array__")?;
    let cell_array: PyReadonlyArray2<f64> = cell_array_obj.extract()?;
    let c = cell_array.as_array();
    if c.shape() != [3, 3] {
        return Err(pyo3::exceptions::PyValueError::new_err("Cell must be 3x3"));
    }
    let cell = [
        [c[[0, 0]], c[[0, 1]], c[[0, 2]]],
        [c[[1, 0]], c[[1, 1]], c[[1, 2]]],
        [c[[2, 0]], c[[2, 1]], c[[2, 2]]],
    ];

    Ok(Geometry::new(numbers, positions, cell)?)
}

fn extract_interactions_map(map: &Bound<'_, PyDict>) -> PyResult<InteractionMap> {
    let one_body: Vec<String> = match map.get_item(1)? {
        Some(v) => v.extract()?,
        None => Vec::new(),
    };
    let two_body: Vec<Pair> = match map.get_item(2)? {
        Some(v) => v.extract()?,
        None => Vec::new(),
    };
    let three_body: Option<Vec<Triple>> = match map.get_item(3)? {
        Some(v) => Some(v.extract()?),
        None => None,
    };
    Ok(InteractionMap::new(one_body, two_body, three_body)?)
}

fn extract_knots_map(knots_map: &Bound<'_, PyDict>) -> PyResult<HashMap<Pair, Vec<f64>>> {
    let mut out = HashMap::with_capacity(knots_map.len());
    for (key, value) in knots_map.iter() {
        // 3-body knot entries are not part of the 2-body table
        let Ok(pair) = key.extract::<Pair>() else {
            continue;
        };
        let knots: PyReadonlyArray1<f64> = value.extract()?;
        out.insert(pair, knots.as_array().iter().copied().collect());
    }
    Ok(out)
}

fn interaction_to_py<'py>(py: Python<'py>, key: &InteractionKey) -> PyResult<Bound<'py, PyAny>> {
    Ok(match *key {
        InteractionKey::One(a) => (a as i64).into_pyobject(py)?.into_any(),
        InteractionKey::Two(a, b) => PyTuple::new(py, [a as i64, b as i64])?.into_any(),
        InteractionKey::Three(a, b, c) => {
            PyTuple::new(py, [a as i64, b as i64, c as i64])?.into_any()
        }
    })
}

/// Returns `(interactions_map, n2b_knots_map, n2b_num_knots, atoms_array, cell_array,
/// crystal_index, supercell_factors, geom_posn)` for a list of ASE `Atoms`.
#[pyfunction]
#[pyo3(signature = (
    interactions_map,
    knots_map,
    r_cut,
    geometries,
    parallel = true,
    skip_empty = false
))]
fn get_data_for_ultra_fast_featurization<'py>(
    py: Python<'py>,
    interactions_map: &Bound<'py, PyDict>,
    knots_map: &Bound<'py, PyDict>,
    r_cut: f64,
    geometries: Vec<Bound<'py, PyAny>>,
    parallel: bool,
    skip_empty: bool,
) -> PyResult<Bound<'py, PyTuple>> {
    let map = extract_interactions_map(interactions_map)?;
    let knots = extract_knots_map(knots_map)?;
    let config = BsplineConfig::new(ChemicalSystem::from_interactions_map(map), knots, r_cut)?;

    let geoms = geometries
        .iter()
        .map(extract_ase_geometry)
        .collect::<PyResult<Vec<_>>>()?;

    let options = BatchOptions {
        empty_geometry: if skip_empty {
            EmptyGeometryPolicy::Skip
        } else {
            EmptyGeometryPolicy::Reject
        },
        parallel,
    };
    let data =
        py.allow_threads(|| crate::prepare_featurization_data_with(&config, &geoms, options))?;

    let (interactions, knot_table, num_knots, atoms, cells, crystal_index, factors, offsets) =
        data.into_parts();

    let interactions = interactions
        .iter()
        .map(|k| interaction_to_py(py, k))
        .collect::<PyResult<Vec<_>>>()?;

    let (n_pairs, max_num_knots) = knot_table.shape();
    let n_atoms = atoms.len();
    let n_geom = cells.len();

    let items: Vec<Bound<'py, PyAny>> = vec![
        PyTuple::new(py, interactions)?.into_any(),
        numpy::PyArray1::from_vec(py, knot_table.into_values())
            .reshape((n_pairs, max_num_knots))?
            .into_any(),
        numpy::PyArray1::from_vec(py, num_knots).into_any(),
        numpy::PyArray1::from_vec(py, atoms.into_flattened())
            .reshape((n_atoms, 4))?
            .into_any(),
        numpy::PyArray1::from_vec(py, cells.into_flattened().into_flattened())
            .reshape((n_geom, 3, 3))?
            .into_any(),
        numpy::PyArray1::from_vec(py, crystal_index).into_any(),
        numpy::PyArray1::from_vec(py, factors.into_flattened())
            .reshape((n_geom, 3))?
            .into_any(),
        numpy::PyArray1::from_vec(py, offsets).into_any(),
    ];
    PyTuple::new(py, items)
}

#[pyfunction]
fn get_num_threads() -> usize {
    rayon::current_num_threads()
}

#[pyfunction]
fn set_num_threads(n: usize) -> PyResult<()> {
    // Note: build_global can only be called once.
    // If it fails, we ignore it (already initialized).
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build_global();
    Ok(())
}

#[pyfunction]
fn get_parallel_threshold() -> usize {
    config::get_parallel_threshold()
}

#[pyfunction]
fn set_parallel_threshold(val: usize) {
    config::set_parallel_threshold(val);
}

#[pyfunction]
#[pyo3(signature = (level=None))]
fn init_logging(level: Option<String>) {
    crate::init_logging(level.as_deref());
}

#[pymodule]
fn ufbatch_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(get_data_for_ultra_fast_featurization, m)?)?;
    m.add_function(wrap_pyfunction!(get_num_threads, m)?)?;
    m.add_function(wrap_pyfunction!(set_num_threads, m)?)?;
    m.add_function(wrap_pyfunction!(get_parallel_threshold, m)?)?;
    m.add_function(wrap_pyfunction!(set_parallel_threshold, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    Ok(())
}
