//! Property-based tests for the core tensor types.
//!
//! These validate constructor invariants and typed-access guarantees over
//! generated shapes and data rather than hand-picked fixtures.

use proptest::prelude::*;

use kern_core::{CoreError, DataType, Device, SparseTensor, Tensor, TensorData};

fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..8, 1..3)
}

fn tensor_strategy() -> impl Strategy<Value = (Vec<usize>, Vec<f32>)> {
    shape_strategy().prop_flat_map(|shape| {
        let size: usize = shape.iter().product();
        prop::collection::vec(-100.0f32..100.0, size..=size)
            .prop_map(move |data| (shape.clone(), data))
    })
}

proptest! {
    #[test]
    fn test_from_slice_round_trip((shape, data) in tensor_strategy()) {
        let t = Tensor::from_slice(&data, shape.clone()).unwrap();
        prop_assert_eq!(t.shape(), shape.as_slice());
        prop_assert_eq!(t.numel(), data.len());
        prop_assert_eq!(t.size_in_bytes(), data.len() * 4);
        prop_assert_eq!(t.to_vec::<f32>().unwrap(), data);
    }

    #[test]
    fn test_storage_size_always_validated(
        (shape, data) in tensor_strategy(),
        extra in 1usize..16,
    ) {
        // Any byte length other than numel * width is rejected.
        let mut bytes = Vec::with_capacity(data.len() * 4 + extra);
        for v in &data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend(std::iter::repeat(0u8).take(extra));

        let result = Tensor::from_bytes(DataType::F32, shape, Device::CPU, bytes);
        prop_assert!(
            matches!(result, Err(CoreError::StorageSize { .. })),
            "expected StorageSize error, got {:?}",
            result
        );
    }

    #[test]
    fn test_typed_access_requires_matching_dtype((shape, data) in tensor_strategy()) {
        let t = Tensor::from_slice(&data, shape).unwrap();
        prop_assert!(t.to_vec::<i32>().is_err());
        prop_assert!(t.to_vec::<f64>().is_err());
        prop_assert!(t.to_vec::<f32>().is_ok());
    }

    #[test]
    fn test_coo_index_length_invariant(
        values in prop::collection::vec(-100.0f32..100.0, 1..16),
        shorten in 1usize..4,
    ) {
        let nnz = values.len();
        let mut bytes = Vec::with_capacity(nnz * 4);
        for v in &values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let data = TensorData::Bytes(bytes);

        let ok = SparseTensor::new_coo(
            DataType::F32,
            vec![nnz, nnz],
            Device::CPU,
            data.clone(),
            (0..nnz as i64).collect(),
            true,
        );
        prop_assert!(ok.is_ok());

        // One index per value is required; shorter index storage is rejected.
        let missing = nnz.saturating_sub(shorten.min(nnz));
        let bad = SparseTensor::new_coo(
            DataType::F32,
            vec![nnz, nnz],
            Device::CPU,
            data,
            (0..missing as i64).collect(),
            true,
        );
        prop_assert!(bad.is_err());
    }
}
