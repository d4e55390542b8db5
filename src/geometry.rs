use crate::elements;
use crate::error::{FeaturizeError, Result};
use nalgebra::Vector3;

/// One atomic structure: atomic numbers, Cartesian positions and a periodic cell whose
/// rows are the lattice vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    numbers: Vec<u8>,
    positions: Vec<Vector3<f64>>,
    cell: [[f64; 3]; 3],
    source_index: Option<usize>,
}

impl Geometry {
    pub fn new(
        numbers: Vec<u8>,
        positions: Vec<Vector3<f64>>,
        cell: [[f64; 3]; 3],
    ) -> Result<Self> {
        if numbers.len() != positions.len() {
            return Err(FeaturizeError::ShapeMismatch(format!(
                "{} atomic numbers but {} positions",
                numbers.len(),
                positions.len()
            )));
        }
        Ok(Self {
            numbers,
            positions,
            cell,
            source_index: None,
        })
    }

    pub fn from_symbols<S: AsRef<str>>(
        symbols: &[S],
        positions: &[[f64; 3]],
        cell: [[f64; 3]; 3],
    ) -> Result<Self> {
        let numbers = symbols
            .iter()
            .map(|s| elements::atomic_number(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let positions = positions.iter().map(|p| Vector3::from(*p)).collect();
        Self::new(numbers, positions, cell)
    }

    /// Attaches an index assigned by whoever produced the record. Batching ignores it and
    /// numbers geometries by their position in the input instead.
    pub fn with_source_index(mut self, index: usize) -> Self {
        self.source_index = Some(index);
        self
    }

    pub fn numbers(&self) -> &[u8] {
        &self.numbers
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn cell(&self) -> &[[f64; 3]; 3] {
        &self.cell
    }

    pub fn source_index(&self) -> Option<usize> {
        self.source_index
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}
