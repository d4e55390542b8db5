use nalgebra::Vector3;
use proptest::prelude::*;
use ufbatch_rs::config::set_parallel_threshold;
use ufbatch_rs::{BatchOptions, EmptyGeometryPolicy, Geometry, assemble_batch};

const BOX: [[f64; 3]; 3] = [[7.0, 0.0, 0.0], [1.0, 7.0, 0.0], [0.0, 0.5, 7.0]];

fn batch_of(sizes: &[usize]) -> Vec<Geometry> {
    sizes
        .iter()
        .enumerate()
        .map(|(g, &n)| {
            let numbers = (0..n).map(|i| ((g + i) % 10 + 1) as u8).collect();
            let positions = (0..n)
                .map(|i| Vector3::new(g as f64, i as f64, 0.25 * i as f64))
                .collect();
            Geometry::new(numbers, positions, BOX).unwrap()
        })
        .collect()
}

fn serial(empty_geometry: EmptyGeometryPolicy) -> BatchOptions {
    BatchOptions {
        empty_geometry,
        parallel: false,
    }
}

proptest! {
    #[test]
    fn offsets_partition_atoms(sizes in prop::collection::vec(1usize..12, 0..20)) {
        // Every batch size takes the rayon path when parallel is requested
        set_parallel_threshold(0);

        let geoms = batch_of(&sizes);
        let options = BatchOptions { parallel: true, ..Default::default() };
        let batch = assemble_batch(&geoms, 3.0, options).unwrap();
        let reference = assemble_batch(&geoms, 3.0, serial(EmptyGeometryPolicy::Reject)).unwrap();
        prop_assert_eq!(&batch, &reference);

        prop_assert_eq!(batch.geometry_offsets[0], 0);
        prop_assert_eq!(*batch.geometry_offsets.last().unwrap() as usize, batch.atoms.len());
        prop_assert_eq!(batch.geometry_offsets.len(), sizes.len() + 1);
        prop_assert_eq!(batch.crystal_index.len(), batch.atoms.len());
        prop_assert_eq!(batch.cells.len(), sizes.len());
        prop_assert_eq!(batch.supercell_factors.len(), sizes.len());

        for (i, w) in batch.geometry_offsets.windows(2).enumerate() {
            // Strictly increasing: no geometry is empty
            prop_assert!(w[1] > w[0]);
            prop_assert_eq!((w[1] - w[0]) as usize, sizes[i]);
        }

        for (k, &c) in batch.crystal_index.iter().enumerate() {
            prop_assert!(c >= 0 && (c as usize) < sizes.len());
            let (start, end) = (
                batch.geometry_offsets[c as usize] as usize,
                batch.geometry_offsets[c as usize + 1] as usize,
            );
            prop_assert!(start <= k && k < end);
            // x coordinate encodes the owning geometry
            prop_assert_eq!(batch.atoms[k][1], c as f64);
        }

        prop_assert!(batch.validate().is_ok());
    }

    #[test]
    fn skipped_empties_leave_contiguous_indices(
        sizes in prop::collection::vec(0usize..6, 0..20),
        parallel in any::<bool>(),
    ) {
        set_parallel_threshold(0);

        let geoms = batch_of(&sizes);
        let kept: Vec<usize> = (0..sizes.len()).filter(|&g| sizes[g] > 0).collect();
        let options = BatchOptions { empty_geometry: EmptyGeometryPolicy::Skip, parallel };
        let batch = assemble_batch(&geoms, 3.0, options).unwrap();
        let reference = assemble_batch(&geoms, 3.0, serial(EmptyGeometryPolicy::Skip)).unwrap();
        prop_assert_eq!(&batch, &reference);

        prop_assert_eq!(batch.geometry_offsets.len(), kept.len() + 1);
        prop_assert_eq!(batch.cells.len(), kept.len());
        prop_assert_eq!(batch.atoms.len(), sizes.iter().sum::<usize>());

        for (c, w) in batch.geometry_offsets.windows(2).enumerate() {
            prop_assert_eq!((w[1] - w[0]) as usize, sizes[kept[c]]);
        }

        // Indices run 0, 0, .., 1, 1, .. without gaps where empties were dropped
        let mut expected = 0;
        for (k, &c) in batch.crystal_index.iter().enumerate() {
            if k > 0 && c != batch.crystal_index[k - 1] {
                expected += 1;
            }
            prop_assert_eq!(c, expected);
            prop_assert_eq!(batch.atoms[k][1], kept[c as usize] as f64);
        }

        prop_assert!(batch.validate().is_ok());
    }
}
