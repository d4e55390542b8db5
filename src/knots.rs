use crate::error::{FeaturizeError, Result};
use crate::interactions::{ChemicalSystem, InteractionMap, Pair};
use std::collections::HashMap;

/// Number of repeated knots clamping each end of a cubic B-spline.
pub const CLAMP_KNOTS: usize = 3;

/// B-spline basis configuration: interaction map, per-pair knot sequences and cutoff.
#[derive(Debug, Clone)]
pub struct BsplineConfig {
    chemical_system: ChemicalSystem,
    knots_map: HashMap<Pair, Vec<f64>>,
    r_cut: f64,
}

impl BsplineConfig {
    pub fn new(
        chemical_system: ChemicalSystem,
        knots_map: HashMap<Pair, Vec<f64>>,
        r_cut: f64,
    ) -> Result<Self> {
        if !r_cut.is_finite() || r_cut <= 0.0 {
            return Err(FeaturizeError::InvalidCutoff(r_cut));
        }
        Ok(Self {
            chemical_system,
            knots_map,
            r_cut,
        })
    }

    /// Gives every 2-body pair the same clamped uniform knot sequence; `r_cut = r_max`.
    pub fn uniform(
        chemical_system: ChemicalSystem,
        r_min: f64,
        r_max: f64,
        n_intervals: usize,
    ) -> Result<Self> {
        let knots = uniform_knots(r_min, r_max, n_intervals)?;
        let knots_map = chemical_system
            .interactions_map()
            .two_body()
            .iter()
            .map(|pair| (pair.clone(), knots.clone()))
            .collect();
        Self::new(chemical_system, knots_map, r_max)
    }

    pub fn chemical_system(&self) -> &ChemicalSystem {
        &self.chemical_system
    }

    pub fn interactions_map(&self) -> &InteractionMap {
        self.chemical_system.interactions_map()
    }

    pub fn knots_map(&self) -> &HashMap<Pair, Vec<f64>> {
        &self.knots_map
    }

    pub fn r_cut(&self) -> f64 {
        self.r_cut
    }

    fn knots_for(&self, pair: &Pair) -> Result<&[f64]> {
        self.knots_map
            .get(pair)
            .map(Vec::as_slice)
            .ok_or_else(|| FeaturizeError::MissingKnotData(pair.0.clone(), pair.1.clone()))
    }
}

/// Clamped uniform knots: `r_min` x3, `n_intervals + 1` evenly spaced points, `r_max` x3.
pub fn uniform_knots(r_min: f64, r_max: f64, n_intervals: usize) -> Result<Vec<f64>> {
    if !(r_min.is_finite() && r_max.is_finite()) || r_min >= r_max || n_intervals == 0 {
        return Err(FeaturizeError::ShapeMismatch(format!(
            "Invalid knot range [{}, {}] with {} intervals",
            r_min, r_max, n_intervals
        )));
    }
    let step = (r_max - r_min) / n_intervals as f64;
    let mut knots = Vec::with_capacity(n_intervals + 1 + 2 * CLAMP_KNOTS);
    knots.extend(std::iter::repeat_n(r_min, CLAMP_KNOTS));
    knots.extend((0..n_intervals).map(|i| r_min + step * i as f64));
    knots.push(r_max);
    knots.extend(std::iter::repeat_n(r_max, CLAMP_KNOTS));
    Ok(knots)
}

/// Ragged per-pair knot sequences packed into a zero-padded row-major matrix.
///
/// Row `i` belongs to the `i`-th 2-body pair of the interaction map. Only the first
/// `knot_counts(..)[i]` entries of a row are knots; the tail is exactly `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct KnotTable {
    values: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl KnotTable {
    pub fn build(config: &BsplineConfig) -> Result<Self> {
        let pairs = config.interactions_map().two_body();

        let mut max_num_knots = 0;
        for pair in pairs {
            max_num_knots = max_num_knots.max(config.knots_for(pair)?.len());
        }

        let mut values = vec![0.0; pairs.len() * max_num_knots];
        for (row, pair) in values.chunks_exact_mut(max_num_knots.max(1)).zip(pairs) {
            let knots = config.knots_for(pair)?;
            row[..knots.len()].copy_from_slice(knots);
        }

        Ok(Self {
            values,
            n_rows: pairs.len(),
            n_cols: max_num_knots,
        })
    }

    /// `(num_pairs, max_num_knots)`
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    /// Full padded row.
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        (i < self.n_rows).then(|| &self.values[i * self.n_cols..(i + 1) * self.n_cols])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// True (unpadded) knot count of each 2-body pair, in interaction-map order.
pub fn knot_counts(config: &BsplineConfig) -> Result<Vec<i32>> {
    config
        .interactions_map()
        .two_body()
        .iter()
        .map(|pair| {
            let n = config.knots_for(pair)?.len();
            i32::try_from(n).map_err(|_| {
                FeaturizeError::ShapeMismatch(format!("{} knots do not fit in an i32", n))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn s(v: &str) -> String {
        v.to_string()
    }

    fn hh_oh_config(n_hh: usize, n_oh: usize) -> BsplineConfig {
        let map = InteractionMap::new(
            vec![s("H"), s("O")],
            vec![(s("H"), s("H")), (s("O"), s("H"))],
            None,
        )
        .unwrap();
        let mut knots = HashMap::new();
        knots.insert((s("H"), s("H")), (1..=n_hh).map(|k| k as f64).collect());
        knots.insert((s("O"), s("H")), (1..=n_oh).map(|k| 0.5 * k as f64).collect());
        BsplineConfig::new(ChemicalSystem::from_interactions_map(map), knots, 6.0).unwrap()
    }

    #[test]
    fn test_ragged_rows_zero_padded() {
        let config = hh_oh_config(5, 7);
        let table = KnotTable::build(&config).unwrap();
        let counts = knot_counts(&config).unwrap();

        assert_eq!(table.shape(), (2, 7));
        assert_eq!(counts, vec![5, 7]);
        assert_eq!(table.row(0).unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0, 0.0, 0.0]);
        assert_eq!(&table.row(0).unwrap()[5..7], &[0.0, 0.0]);
        assert_relative_eq!(table.row(1).unwrap()[6], 3.5);
        assert!(table.row(2).is_none());

        for (i, &n) in counts.iter().enumerate() {
            assert!(table.row(i).unwrap()[n as usize..].iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_missing_pair() {
        let mut config = hh_oh_config(5, 5);
        config.knots_map.remove(&(s("O"), s("H")));
        assert_eq!(
            KnotTable::build(&config),
            Err(FeaturizeError::MissingKnotData(s("O"), s("H")))
        );
        assert!(knot_counts(&config).is_err());
    }

    #[test]
    fn test_pair_lookup_is_ordered() {
        // (H, O) is a different key from (O, H).
        let map = InteractionMap::new(vec![s("H"), s("O")], vec![(s("H"), s("O"))], None).unwrap();
        let mut knots = HashMap::new();
        knots.insert((s("O"), s("H")), vec![1.0, 2.0]);
        let config =
            BsplineConfig::new(ChemicalSystem::from_interactions_map(map), knots, 5.0).unwrap();
        assert!(matches!(
            KnotTable::build(&config),
            Err(FeaturizeError::MissingKnotData(..))
        ));
    }

    #[test]
    fn test_no_pairs() {
        let map = InteractionMap::new(vec![s("H")], vec![], None).unwrap();
        let config =
            BsplineConfig::new(ChemicalSystem::from_interactions_map(map), HashMap::new(), 5.0)
                .unwrap();
        let table = KnotTable::build(&config).unwrap();
        assert_eq!(table.shape(), (0, 0));
        assert!(table.values().is_empty());
        assert!(knot_counts(&config).unwrap().is_empty());
    }

    #[test]
    fn test_uniform_knots() {
        let knots = uniform_knots(0.0, 6.0, 3).unwrap();
        assert_eq!(knots, vec![0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 6.0, 6.0, 6.0, 6.0]);
        assert!(uniform_knots(2.0, 1.0, 3).is_err());
        assert!(uniform_knots(0.0, 1.0, 0).is_err());
    }

    #[test]
    fn test_uniform_config() {
        let system = ChemicalSystem::new(&["Si", "O"], 2).unwrap();
        let config = BsplineConfig::uniform(system, 0.5, 5.5, 10).unwrap();
        assert_relative_eq!(config.r_cut(), 5.5);
        assert_eq!(config.knots_map().len(), 3);
        assert_eq!(knot_counts(&config).unwrap(), vec![17, 17, 17]);
        assert_eq!(KnotTable::build(&config).unwrap().shape(), (3, 17));
    }

    #[test]
    fn test_invalid_cutoff() {
        let system = ChemicalSystem::new(&["H"], 2).unwrap();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                BsplineConfig::new(system.clone(), HashMap::new(), bad),
                Err(FeaturizeError::InvalidCutoff(_))
            ));
        }
    }
}
