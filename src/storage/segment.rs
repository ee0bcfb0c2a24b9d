use std::sync::atomic::{AtomicU64, Ordering};

use super::{OutOfBoundsErr, Result};
use crate::initialization::ParamGen;

/// The column-factor matrix `H`, flattened item-major: the `width` factors of
/// item `j` live at offsets `j * width .. (j + 1) * width`.
///
/// It is shared by every connection of the hosting process without locks.
/// Each value is stored as the bits of an `f64` inside an `AtomicU64`, so single
/// values never tear, but a multi-value read may interleave with a concurrent
/// write. The token discipline keeps a single writer per item at a time.
#[derive(Debug)]
pub struct ColumnSegment {
    width: usize,
    params: Box<[AtomicU64]>,
}

impl ColumnSegment {
    /// Creates a new `ColumnSegment` full of zeros.
    ///
    /// # Arguments
    /// * `items` - The amount of columns of the rating matrix.
    /// * `width` - The embedding dimension.
    ///
    /// # Returns
    /// A new `ColumnSegment` instance.
    pub fn zeroed(items: usize, width: usize) -> Self {
        let params = (0..items * width).map(|_| AtomicU64::new(0)).collect();
        Self { width, params }
    }

    /// Returns the total amount of values in the segment.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Fails unless `len` values starting at `offset` lie inside the segment.
    pub fn check(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.params.len() => Ok(()),
            _ => Err(OutOfBoundsErr {
                offset,
                len,
                capacity: self.params.len(),
            }),
        }
    }

    /// Overwrites the segment front to back with the values of `param_gen`
    /// until either one runs out.
    ///
    /// # Returns
    /// The amount of values written.
    pub fn fill<PG: ParamGen>(&self, param_gen: &mut PG) -> usize {
        let mut written = 0;

        while written < self.params.len() {
            let Some(params) = param_gen.sample(self.width.max(1)) else {
                break;
            };

            if params.is_empty() {
                break;
            }

            for (slot, value) in self.params[written..].iter().zip(&params) {
                slot.store(value.to_bits(), Ordering::Relaxed);
            }

            written = (written + params.len()).min(self.params.len());
        }

        written
    }

    /// Reads a single value.
    pub fn get(&self, offset: usize) -> Result<f64> {
        self.check(offset, 1)?;
        Ok(f64::from_bits(self.params[offset].load(Ordering::Relaxed)))
    }

    /// Overwrites a single value.
    pub fn put(&self, offset: usize, value: f64) -> Result<()> {
        self.check(offset, 1)?;
        self.params[offset].store(value.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Copies `out.len()` contiguous values starting at `offset` into `out`.
    ///
    /// # Arguments
    /// * `offset` - The first value to read.
    /// * `out` - A mutable slice where the values will be copied.
    ///
    /// # Returns
    /// An `OutOfBoundsErr` if the range doesn't fit in the segment.
    pub fn read(&self, offset: usize, out: &mut [f64]) -> Result<()> {
        self.check(offset, out.len())?;

        for (slot, value) in self.params[offset..].iter().zip(out) {
            *value = f64::from_bits(slot.load(Ordering::Relaxed));
        }

        Ok(())
    }

    /// Overwrites `values.len()` contiguous values starting at `offset`.
    ///
    /// # Arguments
    /// * `offset` - The first value to write.
    /// * `values` - The new values.
    ///
    /// # Returns
    /// An `OutOfBoundsErr` if the range doesn't fit in the segment.
    pub fn write(&self, offset: usize, values: &[f64]) -> Result<()> {
        self.check(offset, values.len())?;

        for (slot, value) in self.params[offset..].iter().zip(values) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }

        Ok(())
    }

    /// Copies the whole segment.
    pub fn snapshot(&self) -> Vec<f64> {
        self.params
            .iter()
            .map(|slot| f64::from_bits(slot.load(Ordering::Relaxed)))
            .collect()
    }
}
