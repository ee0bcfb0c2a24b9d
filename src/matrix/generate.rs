use ndarray::Array2;
use rand::{Rng, seq::SliceRandom};

/// The fraction of the blankable cells that is always left unobserved.
const MIN_BLANK_RATIO: f64 = 0.35;

/// Generates a synthetic sparse rating matrix.
///
/// Every cell starts with an integer rating in `1..=5`, then a random amount
/// between 35% and 100% of the `rows * cols - max(rows, cols)` blankable
/// cells is zeroed. A cell is never zeroed if that would leave its row or its
/// column without ratings, so fewer cells may end up blank than drawn.
///
/// # Arguments
/// * `rows` - The amount of users.
/// * `cols` - The amount of items.
/// * `rng` - The random number generator.
///
/// # Returns
/// The generated matrix.
pub fn generate_ratings<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Array2<f64> {
    let mut values = Array2::from_shape_fn((rows, cols), |_| rng.random_range(1..=5) as f64);

    let blankable = (rows * cols).saturating_sub(rows.max(cols));
    let at_least = (MIN_BLANK_RATIO * blankable as f64) as usize;
    let target = rng.random_range(at_least..=blankable);

    let mut row_counts = vec![cols; rows];
    let mut col_counts = vec![rows; cols];

    let mut cells: Vec<(usize, usize)> = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .collect();
    cells.shuffle(rng);

    let mut blanked = 0;
    for (r, c) in cells {
        if blanked == target {
            break;
        }

        if row_counts[r] > 1 && col_counts[c] > 1 {
            values[[r, c]] = 0.;
            row_counts[r] -= 1;
            col_counts[c] -= 1;
            blanked += 1;
        }
    }

    values
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn every_row_and_column_keeps_a_rating() {
        let mut rng = StdRng::seed_from_u64(7);

        for (rows, cols) in [(4, 3), (10, 10), (1, 6), (25, 4)] {
            let values = generate_ratings(rows, cols, &mut rng);

            assert_eq!(values.dim(), (rows, cols));
            assert!(values.rows().into_iter().all(|r| r.iter().any(|&v| v != 0.)));
            assert!(values.columns().into_iter().all(|c| c.iter().any(|&v| v != 0.)));
            assert!(values.iter().all(|&v| v == 0. || (1. ..=5.).contains(&v)));
        }
    }

    #[test]
    fn some_cells_are_blank() {
        let mut rng = StdRng::seed_from_u64(11);
        let values = generate_ratings(20, 20, &mut rng);

        let blank = values.iter().filter(|&&v| v == 0.).count();
        assert!(blank >= (0.35 * (400 - 20) as f64) as usize);
    }
}
