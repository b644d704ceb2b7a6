//! Width-generic dense scans.
//!
//! A dense buffer is scanned once, element by element, recording the indices
//! and values of nonzeros. Element types never matter here beyond their byte
//! width: a value is nonzero when its raw bits are, which handles signed,
//! unsigned, and floating types (including the 2-byte float formats)
//! uniformly. Strings take a separate reference-based path so payloads are
//! copied once, at final materialization, rather than per scan.

use kern_core::{Tensor, TensorData};

use crate::error::{Result, SparseError};

/// Zero test applied during dense scans.
pub(crate) trait NotZero {
    fn not_zero(&self) -> bool;
}

impl NotZero for String {
    fn not_zero(&self) -> bool {
        !self.is_empty()
    }
}

impl<T: NotZero + ?Sized> NotZero for &T {
    fn not_zero(&self) -> bool {
        (**self).not_zero()
    }
}

/// A fixed-width element viewed as its raw little-endian bit pattern.
pub(crate) trait Word: Copy + Eq + NotZero + 'static {
    const WIDTH: usize;

    fn from_le(bytes: &[u8]) -> Self;
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_word {
    ($ty:ty) => {
        impl NotZero for $ty {
            fn not_zero(&self) -> bool {
                *self != 0
            }
        }

        impl Word for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn from_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                <$ty>::from_le_bytes(buf)
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    };
}

impl_word!(u8);
impl_word!(u16);
impl_word!(u32);
impl_word!(u64);

/// Nonzero values gathered by a scan, tagged by element width.
///
/// One variant per supported width plus a borrowed-string variant; the
/// width-dispatch happens once, in [`scan_dense_coo`] / [`scan_dense_csr`],
/// and every variant shares the same generic scan routine.
pub(crate) enum ValueBuffer<'a> {
    W1(Vec<u8>),
    W2(Vec<u16>),
    W4(Vec<u32>),
    W8(Vec<u64>),
    Str(Vec<&'a String>),
}

impl ValueBuffer<'_> {
    pub(crate) fn nnz(&self) -> usize {
        match self {
            ValueBuffer::W1(v) => v.len(),
            ValueBuffer::W2(v) => v.len(),
            ValueBuffer::W4(v) => v.len(),
            ValueBuffer::W8(v) => v.len(),
            ValueBuffer::Str(v) => v.len(),
        }
    }

    /// Materialize the gathered values as tensor storage. This is the single
    /// point where string payloads are copied.
    pub(crate) fn into_tensor_data(self) -> TensorData {
        fn to_bytes<W: Word>(words: Vec<W>) -> TensorData {
            let mut bytes = Vec::with_capacity(words.len() * W::WIDTH);
            for w in words {
                w.write_le(&mut bytes);
            }
            TensorData::Bytes(bytes)
        }

        match self {
            ValueBuffer::W1(v) => TensorData::Bytes(v),
            ValueBuffer::W2(v) => to_bytes(v),
            ValueBuffer::W4(v) => to_bytes(v),
            ValueBuffer::W8(v) => to_bytes(v),
            ValueBuffer::Str(v) => TensorData::Strings(v.into_iter().cloned().collect()),
        }
    }
}

fn words<W: Word>(bytes: &[u8]) -> impl Iterator<Item = W> + '_ {
    bytes.chunks_exact(W::WIDTH).map(W::from_le)
}

fn record_csr<T: NotZero>(
    elements: impl Iterator<Item = T>,
    rows: i64,
    cols: i64,
    values: &mut Vec<T>,
    inner: &mut Vec<i64>,
    outer: &mut Vec<i64>,
) {
    outer.push(0);
    let mut row = 0i64;
    for (index, v) in elements.enumerate() {
        let index = index as i64;
        let cur_row = index / cols;
        if cur_row != row {
            outer.push(inner.len() as i64);
            row = cur_row;
        }
        if v.not_zero() {
            inner.push(index - cur_row * cols);
            values.push(v);
        }
    }
    // Boundary entries for trailing (or all, when the tensor is empty) rows.
    while (outer.len() as i64) < rows + 1 {
        outer.push(inner.len() as i64);
    }
}

fn record_coo<T: NotZero>(
    elements: impl Iterator<Item = T>,
    cols: i64,
    linear: bool,
    values: &mut Vec<T>,
    indices: &mut Vec<i64>,
) {
    for (index, v) in elements.enumerate() {
        if v.not_zero() {
            let index = index as i64;
            if linear {
                indices.push(index);
            } else {
                let row = index / cols;
                indices.push(row);
                indices.push(index - row * cols);
            }
            values.push(v);
        }
    }
}

/// Scan a host-resident dense tensor into COO values and indices.
pub(crate) fn scan_dense_coo<'a>(
    src: &'a Tensor,
    cols: i64,
    linear: bool,
) -> Result<(ValueBuffer<'a>, Vec<i64>)> {
    let mut indices = Vec::new();
    if src.is_string() {
        let mut values = Vec::new();
        record_coo(src.strings()?.iter(), cols, linear, &mut values, &mut indices);
        return Ok((ValueBuffer::Str(values), indices));
    }

    let bytes = src.data_bytes()?;
    let buffer = match src.dtype().byte_width() {
        Some(1) => {
            let mut values = Vec::new();
            record_coo(words::<u8>(bytes), cols, linear, &mut values, &mut indices);
            ValueBuffer::W1(values)
        }
        Some(2) => {
            let mut values = Vec::new();
            record_coo(words::<u16>(bytes), cols, linear, &mut values, &mut indices);
            ValueBuffer::W2(values)
        }
        Some(4) => {
            let mut values = Vec::new();
            record_coo(words::<u32>(bytes), cols, linear, &mut values, &mut indices);
            ValueBuffer::W4(values)
        }
        Some(8) => {
            let mut values = Vec::new();
            record_coo(words::<u64>(bytes), cols, linear, &mut values, &mut indices);
            ValueBuffer::W8(values)
        }
        other => return Err(SparseError::UnsupportedElementWidth(other.unwrap_or(0))),
    };
    Ok((buffer, indices))
}

/// Scan a host-resident dense tensor into CSR values and index tables.
pub(crate) fn scan_dense_csr<'a>(
    src: &'a Tensor,
    rows: i64,
    cols: i64,
) -> Result<(ValueBuffer<'a>, Vec<i64>, Vec<i64>)> {
    let mut inner = Vec::new();
    let mut outer = Vec::with_capacity(rows as usize + 1);
    if src.is_string() {
        let mut values = Vec::new();
        record_csr(
            src.strings()?.iter(),
            rows,
            cols,
            &mut values,
            &mut inner,
            &mut outer,
        );
        return Ok((ValueBuffer::Str(values), inner, outer));
    }

    let bytes = src.data_bytes()?;
    let buffer = match src.dtype().byte_width() {
        Some(1) => {
            let mut values = Vec::new();
            record_csr(words::<u8>(bytes), rows, cols, &mut values, &mut inner, &mut outer);
            ValueBuffer::W1(values)
        }
        Some(2) => {
            let mut values = Vec::new();
            record_csr(words::<u16>(bytes), rows, cols, &mut values, &mut inner, &mut outer);
            ValueBuffer::W2(values)
        }
        Some(4) => {
            let mut values = Vec::new();
            record_csr(words::<u32>(bytes), rows, cols, &mut values, &mut inner, &mut outer);
            ValueBuffer::W4(values)
        }
        Some(8) => {
            let mut values = Vec::new();
            record_csr(words::<u64>(bytes), rows, cols, &mut values, &mut inner, &mut outer);
            ValueBuffer::W8(values)
        }
        other => return Err(SparseError::UnsupportedElementWidth(other.unwrap_or(0))),
    };
    Ok((buffer, inner, outer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csr_scan_worked_example() -> Result<()> {
        let dense = Tensor::from_slice(&[0.0f32, 5.0, 0.0, 3.0, 0.0, 7.0], vec![2, 3])
            .map_err(SparseError::Core)?;
        let (values, inner, outer) = scan_dense_csr(&dense, 2, 3)?;
        assert_eq!(values.nnz(), 3);
        assert_eq!(inner, vec![1, 0, 2]);
        assert_eq!(outer, vec![0, 1, 3]);
        match values.into_tensor_data() {
            TensorData::Bytes(b) => {
                let decoded: Vec<f32> = b
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                assert_eq!(decoded, vec![5.0, 3.0, 7.0]);
            }
            TensorData::Strings(_) => unreachable!(),
        }
        Ok(())
    }

    #[test]
    fn test_coo_scan_linear_and_pairs() -> Result<()> {
        let dense = Tensor::from_slice(&[0.0f32, 5.0, 0.0, 3.0, 0.0, 7.0], vec![2, 3])
            .map_err(SparseError::Core)?;
        let (_, linear) = scan_dense_coo(&dense, 3, true)?;
        assert_eq!(linear, vec![1, 3, 5]);
        let (_, pairs) = scan_dense_coo(&dense, 3, false)?;
        assert_eq!(pairs, vec![0, 1, 1, 0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_negative_zero_raw_bits_are_nonzero() -> Result<()> {
        // -0.0f32 has a nonzero bit pattern; the raw-bit test keeps it.
        let dense = Tensor::from_slice(&[-0.0f32, 0.0], vec![2]).map_err(SparseError::Core)?;
        let (values, indices) = scan_dense_coo(&dense, 2, true)?;
        assert_eq!(values.nnz(), 1);
        assert_eq!(indices, vec![0]);
        Ok(())
    }

    #[test]
    fn test_not_zero_through_references() {
        // The string scans iterate by reference.
        let full = String::from("x");
        let empty = String::new();
        assert!((&full).not_zero());
        assert!(!(&empty).not_zero());
        assert!(7u16.not_zero());
        assert!(!0u64.not_zero());
    }

    #[test]
    fn test_string_scan_skips_empty() -> Result<()> {
        let dense = Tensor::from_strings(
            vec![2, 2],
            vec!["a".into(), String::new(), String::new(), "d".into()],
        )
        .map_err(SparseError::Core)?;
        let (values, inner, outer) = scan_dense_csr(&dense, 2, 2)?;
        assert_eq!(values.nnz(), 2);
        assert_eq!(inner, vec![0, 1]);
        assert_eq!(outer, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn test_empty_rows_get_boundaries() -> Result<()> {
        let dense =
            Tensor::from_slice(&[0u8, 0, 0, 0, 9, 0], vec![3, 2]).map_err(SparseError::Core)?;
        let (_, inner, outer) = scan_dense_csr(&dense, 3, 2)?;
        assert_eq!(inner, vec![0]);
        assert_eq!(outer, vec![0, 0, 0, 1]);
        Ok(())
    }
}
