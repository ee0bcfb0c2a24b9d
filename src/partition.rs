use std::cmp::Reverse;

use crate::error::{NomadErr, Result};

/// The row assignment table: which original rows each process owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    groups: Vec<Vec<usize>>,
    loads: Vec<usize>,
}

impl Partition {
    /// Splits the rows into `parts` groups whose summed density is as even as possible.
    ///
    /// Rows are visited from the densest to the sparsest (ties by ascending row
    /// index) and each one lands on the group with the smallest running load,
    /// the first such group when several are tied.
    ///
    /// # Arguments
    /// * `density` - The amount of observed ratings of every row.
    /// * `parts` - The amount of groups to produce, one per process.
    ///
    /// # Returns
    /// The partition, or a `Configuration` error if `parts` is zero or
    /// exceeds the amount of rows.
    pub fn balanced(density: &[usize], parts: usize) -> Result<Self> {
        if parts == 0 || parts > density.len() {
            return Err(NomadErr::Configuration(format!(
                "can't split {} rows into {parts} partitions",
                density.len()
            )));
        }

        let mut order: Vec<usize> = (0..density.len()).collect();
        order.sort_by_key(|&row| Reverse(density[row]));

        let mut groups = vec![Vec::new(); parts];
        let mut loads = vec![0; parts];

        for row in order {
            let lightest = loads
                .iter()
                .enumerate()
                .min_by_key(|&(part, load)| (*load, part))
                .map(|(part, _)| part)
                .unwrap_or_default();

            loads[lightest] += density[row];
            groups[lightest].push(row);
        }

        groups.iter_mut().for_each(|group| group.sort_unstable());
        Ok(Self { groups, loads })
    }

    /// Returns the amount of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns the original row indices owned by `part`, in ascending order.
    pub fn rows(&self, part: usize) -> &[usize] {
        &self.groups[part]
    }

    /// Returns the summed density of every group.
    pub fn loads(&self) -> &[usize] {
        &self.loads
    }
}
