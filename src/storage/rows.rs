use crate::initialization::ParamGen;

/// The local row-factor shard `W`: one embedding of `width` values per owned row,
/// indexed by the row's position inside the process's segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFactors {
    width: usize,
    params: Vec<f64>,
}

impl RowFactors {
    /// Creates a new `RowFactors` shard full of zeros.
    ///
    /// # Arguments
    /// * `rows` - The amount of locally owned rows.
    /// * `width` - The embedding dimension.
    pub fn zeroed(rows: usize, width: usize) -> Self {
        Self {
            width,
            params: vec![0.; rows * width],
        }
    }

    /// Overwrites the shard front to back with the values of `param_gen`.
    ///
    /// # Returns
    /// The amount of values written.
    pub fn fill<PG: ParamGen>(&mut self, param_gen: &mut PG) -> usize {
        param_gen.fill(&mut self.params)
    }

    pub fn rows(&self) -> usize {
        self.params.len().checked_div(self.width).unwrap_or_default()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the embedding of local row `row`.
    ///
    /// # Panics
    /// If `row` is out of bounds.
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.width;
        &self.params[start..start + self.width]
    }

    /// Returns the embedding of local row `row` for in-place updates.
    ///
    /// # Panics
    /// If `row` is out of bounds.
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let start = row * self.width;
        &mut self.params[start..start + self.width]
    }

    /// Copies the embedding of local row `row`.
    pub fn read_row_factor(&self, row: usize) -> Vec<f64> {
        self.row(row).to_vec()
    }

    /// Overwrites the embedding of local row `row`.
    ///
    /// # Panics
    /// If `row` is out of bounds or `values` isn't `width` long.
    pub fn write_row_factor(&mut self, row: usize, values: &[f64]) {
        self.row_mut(row).copy_from_slice(values);
    }

    /// Freezes the shard, tagging every local row with its original index.
    ///
    /// # Arguments
    /// * `rows` - The original index of every local row, in local order.
    pub fn into_snapshot(self, rows: Vec<usize>) -> ShardSnapshot {
        ShardSnapshot {
            rows: rows.into_iter().map(|row| row as u64).collect(),
            width: self.width,
            factors: self.params,
        }
    }
}

/// A published, read-only copy of a process's row factors.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardSnapshot {
    rows: Vec<u64>,
    width: usize,
    factors: Vec<f64>,
}

impl ShardSnapshot {
    /// Rebuilds a snapshot received from a peer.
    ///
    /// # Returns
    /// `None` if `factors` doesn't hold exactly `width` values per row.
    pub fn new(rows: Vec<u64>, width: usize, factors: Vec<f64>) -> Option<Self> {
        (rows.len() * width == factors.len()).then_some(Self {
            rows,
            width,
            factors,
        })
    }

    /// Returns the original index of every row in the snapshot, fixed at
    /// 64 bits so it travels as is.
    pub fn rows(&self) -> &[u64] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    /// Returns the embedding of the `local`-th row of the snapshot.
    pub fn row(&self, local: usize) -> &[f64] {
        let start = local * self.width;
        &self.factors[start..start + self.width]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::ConstParamGen;

    #[test]
    fn write_then_read_row() {
        let mut factors = RowFactors::zeroed(3, 2);
        factors.write_row_factor(1, &[0.5, -1.]);

        assert_eq!(factors.read_row_factor(1), [0.5, -1.]);
        assert_eq!(factors.row(0), [0., 0.]);
        assert_eq!(factors.rows(), 3);
    }

    #[test]
    fn fill_and_snapshot() {
        let mut factors = RowFactors::zeroed(2, 3);
        factors.fill(&mut ConstParamGen::new(1., 6));

        let snapshot = factors.into_snapshot(vec![4, 9]);
        assert_eq!(snapshot.rows(), [4, 9]);
        assert_eq!(snapshot.row(1), [1., 1., 1.]);
    }

    #[test]
    fn mismatched_snapshot_is_rejected() {
        assert!(ShardSnapshot::new(vec![0, 1], 2, vec![0.; 3]).is_none());
        assert!(ShardSnapshot::new(vec![], 2, vec![]).is_some());
    }
}
