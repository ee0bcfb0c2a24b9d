use std::iter;

use super::ParamGen;

/// Yields one fixed value a bounded amount of times, handy for seeding
/// factors with a known state.
#[derive(Debug, Clone, Copy)]
pub struct ConstParamGen {
    value: f64,
    left: usize,
}

impl ConstParamGen {
    /// # Arguments
    /// * `value` - The value every sample takes.
    /// * `total` - How many values the generator hands out before running dry.
    pub fn new(value: f64, total: usize) -> Self {
        Self { value, left: total }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f64>> {
        let take = n.min(self.left);
        if take == 0 && self.left == 0 {
            return None;
        }

        self.left -= take;
        Some(iter::repeat_n(self.value, take).collect())
    }
}
