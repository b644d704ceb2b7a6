//! Index-layout conversions between COO and CSR, with optional transpose.
//!
//! These helpers rewrite index arrays only; values stay in their original
//! storage order. The transpose path additionally emits a value-permutation
//! vector mapping each new storage position to the original offset that
//! supplies its value, so callers apply the permutation once when
//! materializing values instead of paying a second full data pass.
//!
//! Index arrays are always host-accessible, so nothing here stages across
//! devices. Borrowed results are returned where the input layout already
//! matches.

use std::borrow::Cow;
use std::collections::BTreeMap;

use kern_core::{SparseFormat, SparseTensor};
use tracing::debug;

use crate::error::{Result, SparseError};

/// CSR index tables produced by a maybe-convert or transpose call.
///
/// `value_permutation` is present only for transposed results:
/// `value_permutation[i]` is the original storage offset whose value belongs
/// at new position `i`.
#[derive(Debug, Default)]
pub struct CsrIndices<'a> {
    /// Column index per nonzero.
    pub inner: Cow<'a, [i64]>,
    /// Row offset table.
    pub outer: Cow<'a, [i64]>,
    /// New-position to original-offset mapping, transpose results only.
    pub value_permutation: Option<Vec<usize>>,
}

/// Flatten interleaved (row, col) COO pairs into linear indices.
pub fn convert_2d_coo_indices_to_1d(cols: i64, indices: &[i64]) -> Result<Vec<i64>> {
    if indices.len() % 2 != 0 {
        return Err(SparseError::CorruptTensor(format!(
            "2-D COO index storage has odd length {}",
            indices.len()
        )));
    }
    Ok(indices
        .chunks_exact(2)
        .map(|pair| pair[0] * cols + pair[1])
        .collect())
}

/// Expand CSR inner/outer tables into linear COO indices.
pub fn convert_csr_to_coo_indices(cols: i64, inner: &[i64], outer: &[i64]) -> Result<Vec<i64>> {
    // Fully sparse.
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    if *outer.last().unwrap_or(&0) != inner.len() as i64 {
        return Err(SparseError::CorruptTensor(format!(
            "outer table ends at {}, inner indices hold {} entries",
            outer.last().unwrap_or(&0),
            inner.len()
        )));
    }

    let mut out = Vec::with_capacity(inner.len());
    let mut inner_ind = 0usize;
    for i in 1..outer.len() {
        if outer[i] < outer[i - 1] {
            return Err(SparseError::CorruptTensor(
                "outer table is not nondecreasing".into(),
            ));
        }
        let row_offset = (i - 1) as i64 * cols;
        for _ in outer[i - 1]..outer[i] {
            out.push(row_offset + inner[inner_ind]);
            inner_ind += 1;
        }
    }
    Ok(out)
}

/// Return linear COO indices for a sparse tensor, converting from 2-D COO or
/// CSR layouts when necessary.
///
/// Already-linear COO indices are borrowed unchanged, as are CSR inner
/// indices of a single-row matrix, for which the inner table already is the
/// flat index list. Column vectors go through the general expansion: their
/// inner table holds column indices, not flat positions.
pub fn coo_1d_indices(input: &SparseTensor) -> Result<Cow<'_, [i64]>> {
    match input.format() {
        SparseFormat::Coo => {
            let view = input.as_coo()?;
            if view.linear {
                Ok(Cow::Borrowed(view.indices))
            } else {
                let [_, cols] = matrix_dims(input)?;
                Ok(Cow::Owned(convert_2d_coo_indices_to_1d(
                    cols,
                    view.indices,
                )?))
            }
        }
        SparseFormat::Csr => {
            let [rows, cols] = matrix_dims(input)?;
            let view = input.as_csr()?;
            if rows == 1 {
                Ok(Cow::Borrowed(view.inner))
            } else {
                Ok(Cow::Owned(convert_csr_to_coo_indices(
                    cols, view.inner, view.outer,
                )?))
            }
        }
    }
}

fn matrix_dims(input: &SparseTensor) -> Result<[i64; 2]> {
    match input.dense_shape() {
        [rows, cols] => Ok([*rows as i64, *cols as i64]),
        other => Err(SparseError::UnsupportedRank(other.len())),
    }
}

fn coo_pairs(indices: &[i64], cols: i64, linear: bool) -> impl Iterator<Item = (i64, i64)> + '_ {
    let step = if linear { 1 } else { 2 };
    indices.chunks_exact(step).map(move |chunk| {
        if chunk.len() == 1 {
            let row = chunk[0] / cols;
            (row, chunk[0] - row * cols)
        } else {
            (chunk[0], chunk[1])
        }
    })
}

/// Return CSR index tables for a sparse tensor, converting from COO when
/// necessary.
///
/// `dims` is the logical (rows, cols) pair the caller is operating under.
/// For a degenerate vector the COO indices are passed through as the inner
/// table of a single row. For a matrix, rows absent from the COO input
/// receive zero-width boundary entries so the outer table always has
/// `rows + 1` entries.
pub fn csr_indices<'a>(dims: [i64; 2], input: &'a SparseTensor) -> Result<CsrIndices<'a>> {
    match input.format() {
        SparseFormat::Csr => {
            let view = input.as_csr()?;
            Ok(CsrIndices {
                inner: Cow::Borrowed(view.inner),
                outer: Cow::Borrowed(view.outer),
                value_permutation: None,
            })
        }
        SparseFormat::Coo => {
            let view = input.as_coo()?;
            // Fully sparse matrix.
            if view.indices.is_empty() {
                return Ok(CsrIndices::default());
            }

            if dims[0] == 1 || dims[1] == 1 {
                if !view.linear {
                    return Err(SparseError::InvalidArgument(
                        "COO indices must be linear for vectors".into(),
                    ));
                }
                return Ok(CsrIndices {
                    inner: Cow::Borrowed(view.indices),
                    outer: Cow::Owned(vec![0, view.indices.len() as i64]),
                    value_permutation: None,
                });
            }

            let (rows, cols) = (dims[0], dims[1]);
            let nnz = if view.linear {
                view.indices.len()
            } else {
                view.indices.len() / 2
            };
            let mut inner = Vec::with_capacity(nnz);
            let mut outer = Vec::with_capacity(rows as usize + 1);
            outer.push(0);
            let mut row = 0i64;
            for (cur_row, cur_col) in coo_pairs(view.indices, cols, view.linear) {
                while row < cur_row {
                    outer.push(inner.len() as i64);
                    row += 1;
                }
                inner.push(cur_col);
            }
            // Boundary entries for the rows still missing.
            while row < rows {
                outer.push(inner.len() as i64);
                row += 1;
            }
            debug!("COO -> CSR indices ({} nonzeros, {} rows)", nnz, rows);
            Ok(CsrIndices {
                inner: Cow::Owned(inner),
                outer: Cow::Owned(outer),
                value_permutation: None,
            })
        }
    }
}

/// Ordered (new row -> (new col -> original offset)) conversion map. The
/// inner map keeps each new row's entries sorted by destination column, and
/// keying it by the source (row, col) coordinate makes duplicates detectable
/// at insertion.
type TransposeMap = BTreeMap<i64, BTreeMap<i64, usize>>;

fn insert_transposed(map: &mut TransposeMap, row: i64, col: i64, offset: usize) -> Result<()> {
    if map.entry(col).or_default().insert(row, offset).is_some() {
        return Err(SparseError::CorruptTensor(format!(
            "duplicate coordinate ({}, {}) in transpose input",
            row, col
        )));
    }
    Ok(())
}

fn emit_transposed(map: &TransposeMap, new_rows: i64, nnz: usize) -> CsrIndices<'static> {
    let mut inner = Vec::with_capacity(nnz);
    let mut outer = Vec::with_capacity(new_rows as usize + 1);
    let mut permutation = Vec::with_capacity(nnz);

    outer.push(0);
    let mut row = 0i64;
    for (&new_row, entries) in map {
        let sz = inner.len() as i64;
        while row < new_row {
            outer.push(sz);
            row += 1;
        }
        for (&new_col, &offset) in entries {
            inner.push(new_col);
            permutation.push(offset);
        }
    }
    let sz = inner.len() as i64;
    while row < new_rows {
        outer.push(sz);
        row += 1;
    }

    CsrIndices {
        inner: Cow::Owned(inner),
        outer: Cow::Owned(outer),
        value_permutation: Some(permutation),
    }
}

/// Return CSR index tables for the transpose of a sparse matrix.
///
/// `dims` is the original (rows, cols) pair; the result describes the
/// `cols x rows` transpose. Duplicate (row, col) coordinates in the input
/// are a hard error: they indicate malformed input and are never silently
/// overwritten. Degenerate vectors are not transposed; their indices pass
/// through as a single-row CSR and the caller swaps dims itself.
pub fn csr_indices_transposed<'a>(
    dims: [i64; 2],
    input: &'a SparseTensor,
) -> Result<CsrIndices<'a>> {
    let (rows, cols) = (dims[0], dims[1]);

    match input.format() {
        SparseFormat::Csr => {
            let view = input.as_csr()?;
            // Fully sparse.
            if view.inner.is_empty() {
                return Ok(CsrIndices::default());
            }
            if rows == 1 || cols == 1 {
                // Vectors are not transposed.
                return Ok(CsrIndices {
                    inner: Cow::Borrowed(view.inner),
                    outer: Cow::Borrowed(view.outer),
                    value_permutation: None,
                });
            }

            let mut map = TransposeMap::new();
            let mut offset = 0usize;
            for i in 1..view.outer.len() {
                let row = (i - 1) as i64;
                for _ in view.outer[i - 1]..view.outer[i] {
                    let col = *view.inner.get(offset).ok_or_else(|| {
                        SparseError::CorruptTensor(format!(
                            "outer table references offset {} beyond {} inner entries",
                            offset,
                            view.inner.len()
                        ))
                    })?;
                    insert_transposed(&mut map, row, col, offset)?;
                    offset += 1;
                }
            }
            debug!("CSR transpose: {}x{} -> {}x{}", rows, cols, cols, rows);
            Ok(emit_transposed(&map, cols, view.inner.len()))
        }
        SparseFormat::Coo => {
            let view = input.as_coo()?;
            // Fully sparse.
            if view.indices.is_empty() {
                return Ok(CsrIndices::default());
            }
            if rows == 1 || cols == 1 {
                if !view.linear {
                    return Err(SparseError::InvalidArgument(
                        "COO indices must be linear for vectors".into(),
                    ));
                }
                return Ok(CsrIndices {
                    inner: Cow::Borrowed(view.indices),
                    outer: Cow::Owned(vec![0, view.indices.len() as i64]),
                    value_permutation: None,
                });
            }

            let nnz = if view.linear {
                view.indices.len()
            } else {
                view.indices.len() / 2
            };
            let mut map = TransposeMap::new();
            for (offset, (cur_row, cur_col)) in
                coo_pairs(view.indices, cols, view.linear).enumerate()
            {
                insert_transposed(&mut map, cur_row, cur_col, offset)?;
            }
            debug!("COO transpose: {}x{} -> {}x{}", rows, cols, cols, rows);
            Ok(emit_transposed(&map, cols, nnz))
        }
    }
}

/// Walk two ascending index sequences with a two-pointer merge, invoking
/// `match_cb` with the pair of storage offsets whenever indices coincide.
/// Linear in the combined length.
pub fn scan_for_sparse_matches<F>(a_indices: &[i64], b_indices: &[i64], mut match_cb: F)
where
    F: FnMut(usize, usize),
{
    let mut a_ind = 0;
    let mut b_ind = 0;
    while a_ind < a_indices.len() && b_ind < b_indices.len() {
        let a_v = a_indices[a_ind];
        let b_v = b_indices[b_ind];
        if a_v == b_v {
            match_cb(a_ind, b_ind);
            a_ind += 1;
            b_ind += 1;
        } else if a_v < b_v {
            a_ind += 1;
        } else {
            b_ind += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kern_core::{DataType, Device, TensorData};

    fn f32_values(values: &[f32]) -> TensorData {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        TensorData::Bytes(bytes)
    }

    fn worked_example_csr() -> SparseTensor {
        // 2x3 [[0,5,0],[3,0,7]]
        SparseTensor::new_csr(
            DataType::F32,
            vec![2, 3],
            Device::CPU,
            f32_values(&[5.0, 3.0, 7.0]),
            vec![1, 0, 2],
            vec![0, 1, 3],
        )
        .unwrap()
    }

    #[test]
    fn test_csr_to_coo_linear() -> Result<()> {
        let csr = worked_example_csr();
        let linear = coo_1d_indices(&csr)?;
        assert_eq!(linear.as_ref(), &[1, 3, 5]);
        Ok(())
    }

    #[test]
    fn test_2d_coo_flatten() -> Result<()> {
        let flat = convert_2d_coo_indices_to_1d(3, &[0, 1, 1, 0, 1, 2])?;
        assert_eq!(flat, vec![1, 3, 5]);
        assert!(convert_2d_coo_indices_to_1d(3, &[0, 1, 1]).is_err());
        Ok(())
    }

    #[test]
    fn test_coo_to_csr_with_missing_rows() -> Result<()> {
        // 4x3 with nonzeros only in rows 1 and 3.
        let coo = SparseTensor::new_coo(
            DataType::F32,
            vec![4, 3],
            Device::CPU,
            f32_values(&[1.0, 2.0]),
            vec![4, 11],
            true,
        )?;
        let csr = csr_indices([4, 3], &coo)?;
        assert_eq!(csr.inner.as_ref(), &[1, 2]);
        assert_eq!(csr.outer.as_ref(), &[0, 0, 1, 1, 2]);
        assert!(csr.value_permutation.is_none());
        Ok(())
    }

    #[test]
    fn test_transpose_worked_example() -> Result<()> {
        let csr = worked_example_csr();
        let transposed = csr_indices_transposed([2, 3], &csr)?;
        assert_eq!(transposed.outer.as_ref(), &[0, 1, 2, 3]);
        assert_eq!(transposed.inner.as_ref(), &[1, 0, 1]);
        assert_eq!(transposed.value_permutation, Some(vec![1, 0, 2]));
        Ok(())
    }

    #[test]
    fn test_transpose_round_trip() -> Result<()> {
        let csr = worked_example_csr();
        let once = csr_indices_transposed([2, 3], &csr)?;
        let intermediate = SparseTensor::new_csr(
            DataType::F32,
            vec![3, 2],
            Device::CPU,
            f32_values(&[3.0, 5.0, 7.0]),
            once.inner.to_vec(),
            once.outer.to_vec(),
        )?;
        let twice = csr_indices_transposed([3, 2], &intermediate)?;
        assert_eq!(twice.inner.as_ref(), &[1, 0, 2]);
        assert_eq!(twice.outer.as_ref(), &[0, 1, 3]);
        Ok(())
    }

    #[test]
    fn test_transpose_rejects_duplicates() -> Result<()> {
        let coo = SparseTensor::new_coo(
            DataType::F32,
            vec![2, 3],
            Device::CPU,
            f32_values(&[1.0, 2.0]),
            vec![4, 4],
            true,
        )?;
        assert!(matches!(
            csr_indices_transposed([2, 3], &coo),
            Err(SparseError::CorruptTensor(_))
        ));

        // Same coordinate given as 2-D pairs.
        let coo_2d = SparseTensor::new_coo(
            DataType::F32,
            vec![2, 3],
            Device::CPU,
            f32_values(&[1.0, 2.0]),
            vec![1, 1, 1, 1],
            false,
        )?;
        assert!(matches!(
            csr_indices_transposed([2, 3], &coo_2d),
            Err(SparseError::CorruptTensor(_))
        ));
        Ok(())
    }

    #[test]
    fn test_transpose_rejects_duplicate_csr_columns() -> Result<()> {
        // Row 0 lists column 1 twice.
        let csr = SparseTensor::new_csr(
            DataType::F32,
            vec![2, 3],
            Device::CPU,
            f32_values(&[1.0, 2.0, 3.0]),
            vec![1, 1, 2],
            vec![0, 2, 3],
        )?;
        assert!(matches!(
            csr_indices_transposed([2, 3], &csr),
            Err(SparseError::CorruptTensor(_))
        ));
        Ok(())
    }

    #[test]
    fn test_vector_passthrough() -> Result<()> {
        let coo = SparseTensor::new_coo(
            DataType::F32,
            vec![1, 5],
            Device::CPU,
            f32_values(&[1.0, 2.0]),
            vec![0, 3],
            true,
        )?;
        let csr = csr_indices([1, 5], &coo)?;
        assert_eq!(csr.inner.as_ref(), &[0, 3]);
        assert_eq!(csr.outer.as_ref(), &[0, 2]);

        let transposed = csr_indices_transposed([1, 5], &coo)?;
        assert_eq!(transposed.inner.as_ref(), &[0, 3]);
        assert!(transposed.value_permutation.is_none());
        Ok(())
    }

    #[test]
    fn test_two_pointer_matches() {
        let a = [1i64, 4, 6, 9];
        let b = [2i64, 4, 9, 12];
        let mut hits = Vec::new();
        scan_for_sparse_matches(&a, &b, |ai, bi| hits.push((ai, bi)));
        assert_eq!(hits, vec![(1, 1), (3, 2)]);

        hits.clear();
        scan_for_sparse_matches(&a, &[], |ai, bi| hits.push((ai, bi)));
        assert!(hits.is_empty());
    }
}
