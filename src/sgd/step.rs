use super::Regularization;

/// Returns the inner product of two equally long embeddings.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Applies one regularized gradient step on a single observed rating.
///
/// Both embeddings are updated simultaneously: each one's new value is
/// computed from the other's value before the step.
///
/// # Arguments
/// * `w` - The row embedding, updated in place.
/// * `h` - The column embedding, updated in place.
/// * `rating` - The observed value.
/// * `lr` - The step size.
/// * `lambda` - The regularization strength.
/// * `regularization` - The penalty applied to both embeddings.
///
/// # Returns
/// The prediction error `w·h - rating` before the step.
pub fn gradient_step(
    w: &mut [f64],
    h: &mut [f64],
    rating: f64,
    lr: f64,
    lambda: f64,
    regularization: Regularization,
) -> f64 {
    let err = dot(w, h) - rating;
    let w_penalty = regularization.coefficient(lambda, w);
    let h_penalty = regularization.coefficient(lambda, h);

    for (wk, hk) in w.iter_mut().zip(h.iter_mut()) {
        let (w0, h0) = (*wk, *hk);
        *wk = w0 - lr * (err * h0 + w_penalty * w0);
        *hk = h0 - lr * (err * w0 + h_penalty * h0);
    }

    err
}
