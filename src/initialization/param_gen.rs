/// A source of initial values for the factor matrices.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// The samples, or `None` once the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f64>>;

    /// Overwrites `out` front to back with samples until either one runs out.
    ///
    /// # Returns
    /// The amount of values written.
    fn fill(&mut self, out: &mut [f64]) -> usize {
        let mut written = 0;

        while written < out.len() {
            let Some(sample) = self.sample(out.len() - written) else {
                break;
            };

            if sample.is_empty() {
                break;
            }

            out[written..written + sample.len()].copy_from_slice(&sample);
            written += sample.len();
        }

        written
    }
}
