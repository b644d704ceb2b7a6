//! Property-based tests for format conversion.
//!
//! These validate the round-trip and structural invariants that must hold
//! for any dense input of a supported width, not just hand-picked fixtures.

use proptest::prelude::*;

use kern_core::Tensor;
use kern_providers::{create_transfer_registry, SystemMemoryAllocator};
use kern_sparse::{
    coo_1d_indices, dense_to_sparse_coo, dense_to_sparse_csr, scan_for_sparse_matches,
    sparse_coo_to_dense, sparse_csr_to_dense,
};

// Mostly-zero matrices so sparse layouts are actually exercised.
fn sparse_matrix_strategy() -> impl Strategy<Value = (usize, usize, Vec<f32>)> {
    (1usize..8, 1usize..8).prop_flat_map(|(rows, cols)| {
        let size = rows * cols;
        prop::collection::vec(
            prop_oneof![4 => Just(0.0f32), 1 => -100.0f32..100.0f32],
            size..=size,
        )
        .prop_map(move |data| (rows, cols, data))
    })
}

fn ascending_indices_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(0i64..64, 0..16).prop_map(|s| s.into_iter().collect())
}

proptest! {
    #[test]
    fn test_dense_coo_linear_round_trip((rows, cols, data) in sparse_matrix_strategy()) {
        let transfers = create_transfer_registry().unwrap();
        let cpu = SystemMemoryAllocator::new();
        let dense = Tensor::from_slice(&data, vec![rows, cols]).unwrap();

        let sparse = dense_to_sparse_coo(&transfers, &dense, &cpu, &cpu, true).unwrap();
        let back = sparse_coo_to_dense(&transfers, &sparse, &cpu, &cpu).unwrap();
        prop_assert_eq!(back.to_vec::<f32>().unwrap(), data);
    }

    #[test]
    fn test_dense_coo_2d_round_trip((rows, cols, data) in sparse_matrix_strategy()) {
        let transfers = create_transfer_registry().unwrap();
        let cpu = SystemMemoryAllocator::new();
        let dense = Tensor::from_slice(&data, vec![rows, cols]).unwrap();

        let sparse = dense_to_sparse_coo(&transfers, &dense, &cpu, &cpu, false).unwrap();
        let back = sparse_coo_to_dense(&transfers, &sparse, &cpu, &cpu).unwrap();
        prop_assert_eq!(back.to_vec::<f32>().unwrap(), data);
    }

    #[test]
    fn test_dense_csr_round_trip_and_invariants((rows, cols, data) in sparse_matrix_strategy()) {
        let transfers = create_transfer_registry().unwrap();
        let cpu = SystemMemoryAllocator::new();
        let dense = Tensor::from_slice(&data, vec![rows, cols]).unwrap();

        let sparse = dense_to_sparse_csr(&transfers, &dense, &cpu, &cpu).unwrap();
        let view = sparse.as_csr().unwrap();

        // Structural invariants of every produced CSR.
        prop_assert_eq!(view.outer.len(), rows + 1);
        prop_assert_eq!(view.outer[0], 0);
        prop_assert_eq!(view.outer[rows], sparse.nnz() as i64);
        prop_assert!(view.outer.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(view.inner.iter().all(|&c| c >= 0 && c < cols as i64));

        let back = sparse_csr_to_dense(&transfers, &sparse, &cpu, &cpu).unwrap();
        prop_assert_eq!(back.to_vec::<f32>().unwrap(), data);
    }

    #[test]
    fn test_csr_and_coo_agree_on_nonzero_set((rows, cols, data) in sparse_matrix_strategy()) {
        let transfers = create_transfer_registry().unwrap();
        let cpu = SystemMemoryAllocator::new();
        let dense = Tensor::from_slice(&data, vec![rows, cols]).unwrap();

        let coo = dense_to_sparse_coo(&transfers, &dense, &cpu, &cpu, true).unwrap();
        let csr = dense_to_sparse_csr(&transfers, &dense, &cpu, &cpu).unwrap();

        let coo_flat = coo_1d_indices(&coo).unwrap().to_vec();
        let csr_flat = coo_1d_indices(&csr).unwrap().to_vec();
        prop_assert_eq!(coo_flat, csr_flat);
    }

    #[test]
    fn test_two_pointer_matches_intersection(
        a in ascending_indices_strategy(),
        b in ascending_indices_strategy(),
    ) {
        let mut hits = Vec::new();
        scan_for_sparse_matches(&a, &b, |ai, bi| hits.push((ai, bi)));

        let expected: Vec<(usize, usize)> = a
            .iter()
            .enumerate()
            .filter_map(|(ai, v)| b.iter().position(|w| w == v).map(|bi| (ai, bi)))
            .collect();
        prop_assert_eq!(hits, expected);
    }
}
