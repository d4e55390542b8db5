pub mod batch;
pub mod cell;
pub mod config;
pub mod elements;
pub mod error;
pub mod flatten;
pub mod geometry;
pub mod interactions;
pub mod knots;

#[cfg(feature = "python")]
mod python_api;

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

pub use crate::batch::{FlattenedBatch, assemble_batch};
pub use crate::config::{BatchOptions, EmptyGeometryPolicy};
pub use crate::error::{FeaturizeError, Result};
pub use crate::flatten::AtomRow;
pub use crate::geometry::Geometry;
pub use crate::interactions::{ChemicalSystem, InteractionKey, InteractionMap};
pub use crate::knots::{BsplineConfig, KnotTable};

use tracing::{debug, info_span};
use tracing_subscriber::EnvFilter;

/// Everything the featurizer needs for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturizationData {
    pub interactions: Vec<InteractionKey>,
    pub knots: KnotTable,
    pub num_knots: Vec<i32>,
    pub batch: FlattenedBatch,
}

/// Positional bundle handed to the featurizer. The field order is part of its contract:
/// interactions, knot table, knot counts, atoms, cells, crystal index, supercell factors,
/// geometry offsets.
pub type FeaturizationParts = (
    Vec<InteractionKey>,
    KnotTable,
    Vec<i32>,
    Vec<AtomRow>,
    Vec<[[f64; 3]; 3]>,
    Vec<i32>,
    Vec<[i32; 3]>,
    Vec<i32>,
);

impl FeaturizationData {
    pub fn into_parts(self) -> FeaturizationParts {
        let FlattenedBatch {
            atoms,
            cells,
            crystal_index,
            supercell_factors,
            geometry_offsets,
        } = self.batch;
        (
            self.interactions,
            self.knots,
            self.num_knots,
            atoms,
            cells,
            crystal_index,
            supercell_factors,
            geometry_offsets,
        )
    }
}

/// Builds the featurizer inputs for `geometries` with default [`BatchOptions`].
pub fn prepare_featurization_data(
    config: &BsplineConfig,
    geometries: &[Geometry],
) -> Result<FeaturizationData> {
    prepare_featurization_data_with(config, geometries, BatchOptions::default())
}

/// Canonicalizes the interaction map and packs the knot table once, then flattens and
/// concatenates the geometries. Either every array is produced or an error is returned.
pub fn prepare_featurization_data_with(
    config: &BsplineConfig,
    geometries: &[Geometry],
    options: BatchOptions,
) -> Result<FeaturizationData> {
    let _span = info_span!(
        "prepare_featurization_data",
        n_geometries = geometries.len()
    )
    .entered();

    let interactions = {
        let _s = info_span!("canonicalize_interactions").entered();
        interactions::canonicalize(config.interactions_map())?
    };

    let (knots, num_knots) = {
        let _s = info_span!("knot_table").entered();
        (KnotTable::build(config)?, knots::knot_counts(config)?)
    };
    debug!(
        n_interactions = interactions.len(),
        shape = ?knots.shape(),
        "knot table built"
    );

    let batch = assemble_batch(geometries, config.r_cut(), options)?;
    batch.validate()?;

    Ok(FeaturizationData {
        interactions,
        knots,
        num_knots,
        batch,
    })
}

/// Installs a global fmt subscriber. `RUST_LOG` takes precedence over `level`, which
/// defaults to `info`. Later calls leave the first subscriber in place.
pub fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .with_thread_ids(true)
        .try_init();
}
